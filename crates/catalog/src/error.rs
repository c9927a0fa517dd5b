#[derive(Debug)]
pub enum TransportError {
    Timeout,
    Http(reqwest::Error),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "catalog request timed out"),
            TransportError::Http(err) => write!(f, "catalog HTTP error: {}", err),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Http(value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    BadStatus(u16),
    InvalidPayload(String),
    MissingField { field: &'static str, index: usize },
    ShortWalk { collected: u64, expected: u64 },
    Overrun { collected: u64, expected: u64 },
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamError::BadStatus(status) => write!(f, "catalog returned status {}", status),
            UpstreamError::InvalidPayload(reason) => {
                write!(f, "catalog returned invalid payload: {}", reason)
            }
            UpstreamError::MissingField { field, index } => {
                write!(f, "catalog item {} is missing field {}", index, field)
            }
            UpstreamError::ShortWalk {
                collected,
                expected,
            } => write!(
                f,
                "catalog returned an empty page after {} of {} items",
                collected, expected
            ),
            UpstreamError::Overrun {
                collected,
                expected,
            } => write!(
                f,
                "catalog returned {} items but reported a total of {}",
                collected, expected
            ),
        }
    }
}

impl std::error::Error for UpstreamError {}

#[derive(Debug)]
pub enum CatalogError {
    Transport(TransportError),
    Upstream(UpstreamError),
    InconsistentTotal {
        expected: u64,
        found: u64,
        offset: u64,
    },
}

impl CatalogError {
    /// Only transport failures may succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::Transport(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CatalogError::Transport(TransportError::Timeout))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::Transport(TransportError::Timeout) => "timeout",
            CatalogError::Transport(TransportError::Http(_)) => "transport",
            CatalogError::Upstream(_) => "upstream",
            CatalogError::InconsistentTotal { .. } => "inconsistent_total",
        }
    }
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Transport(err) => write!(f, "{}", err),
            CatalogError::Upstream(err) => write!(f, "{}", err),
            CatalogError::InconsistentTotal {
                expected,
                found,
                offset,
            } => write!(
                f,
                "catalog total changed from {} to {} at offset {}",
                expected, found, offset
            ),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for CatalogError {
    fn from(value: TransportError) -> Self {
        CatalogError::Transport(value)
    }
}

impl From<UpstreamError> for CatalogError {
    fn from(value: UpstreamError) -> Self {
        CatalogError::Upstream(value)
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(value: reqwest::Error) -> Self {
        CatalogError::Transport(value.into())
    }
}
