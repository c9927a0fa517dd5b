#[derive(Debug)]
pub enum StoreError {
    Timeout,
    UniqueViolation(String),
    /// A value the column or its constraints rejected, named by column or
    /// constraint where the server reports one.
    InvalidValue(String),
    InvalidRecord,
    Sqlx(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Timeout => write!(f, "store operation timed out"),
            StoreError::UniqueViolation(constraint) => {
                write!(f, "unique constraint {} violated", constraint)
            }
            StoreError::InvalidValue(subject) => write!(f, "value rejected by {}", subject),
            StoreError::InvalidRecord => write!(f, "store returned a non-object record"),
            StoreError::Sqlx(err) => write!(f, "store sql error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {}

/// SQLSTATE codes for values the schema refuses: not-null and check
/// violations, datatype mismatch, malformed text and out-of-range numbers.
const REJECTED_VALUE_CODES: &[&str] = &["23502", "23514", "42804", "22P02", "22003"];

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &value {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unknown");
                return StoreError::UniqueViolation(constraint.to_string());
            }
            if db_err
                .code()
                .is_some_and(|code| REJECTED_VALUE_CODES.contains(&&*code))
            {
                let subject = db_err
                    .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                    .and_then(|pg| pg.column())
                    .or_else(|| db_err.constraint())
                    .unwrap_or("value");
                return StoreError::InvalidValue(subject.to_string());
            }
        }
        StoreError::Sqlx(value)
    }
}

#[derive(Debug)]
pub enum MutationError {
    EmptyMutation,
    InvalidField(String),
    DuplicateIdentifier(String),
    NotFound(String),
    Store(StoreError),
}

impl MutationError {
    pub fn kind(&self) -> &'static str {
        match self {
            MutationError::EmptyMutation => "empty_mutation",
            MutationError::InvalidField(_) => "invalid_field",
            MutationError::DuplicateIdentifier(_) => "duplicate_identifier",
            MutationError::NotFound(_) => "not_found",
            MutationError::Store(_) => "store",
        }
    }
}

impl std::fmt::Display for MutationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationError::EmptyMutation => write!(f, "no updatable fields supplied"),
            MutationError::InvalidField(field) => write!(f, "invalid value for {}", field),
            MutationError::DuplicateIdentifier(id) => write!(f, "duplicate identifier: {}", id),
            MutationError::NotFound(id) => write!(f, "no record: {}", id),
            MutationError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for MutationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MutationError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for MutationError {
    fn from(value: StoreError) -> Self {
        MutationError::Store(value)
    }
}
