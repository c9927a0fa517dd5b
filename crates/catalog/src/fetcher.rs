use std::future::Future;
use std::time::Duration;

use parkbook_contracts::{CatalogItem, CatalogPage, MAX_PAGE_LIMIT};

use crate::error::{CatalogError, TransportError, UpstreamError};
use crate::resource::CatalogQuery;

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub page_limit: u64,
    pub page_timeout: Duration,
    pub walk_timeout: Duration,
}

impl CatalogClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            page_limit: MAX_PAGE_LIMIT,
            page_timeout: Duration::from_secs(5),
            walk_timeout: Duration::from_secs(60),
        }
    }
}

/// Performs exactly one bounded request against the catalog. Implementations
/// never retry.
pub trait PageFetcher {
    fn fetch(
        &self,
        query: &CatalogQuery,
        limit: u64,
        offset: u64,
    ) -> impl Future<Output = Result<CatalogPage, CatalogError>> + Send;
}

#[derive(Clone)]
pub struct HttpPageFetcher {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(config: &CatalogClientConfig) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(config.page_timeout)
            .build()
            .map_err(|err| CatalogError::Transport(TransportError::Http(err)))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    fn resource_url(&self, query: &CatalogQuery) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            query.resource.path
        )
    }
}

impl PageFetcher for HttpPageFetcher {
    async fn fetch(
        &self,
        query: &CatalogQuery,
        limit: u64,
        offset: u64,
    ) -> Result<CatalogPage, CatalogError> {
        let resp = self
            .http
            .get(self.resource_url(query))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("limit", limit), ("start", offset)])
            .query(&query.filters)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::BadStatus(status.as_u16()).into());
        }

        let body = resp.json::<serde_json::Value>().await.map_err(|err| {
            if err.is_decode() {
                CatalogError::Upstream(UpstreamError::InvalidPayload(
                    "response body is not JSON".to_string(),
                ))
            } else {
                CatalogError::from(err)
            }
        })?;

        Ok(parse_page(body, limit, offset)?)
    }
}

pub(crate) fn parse_page(
    body: serde_json::Value,
    limit: u64,
    offset: u64,
) -> Result<CatalogPage, UpstreamError> {
    let serde_json::Value::Object(mut body) = body else {
        return Err(UpstreamError::InvalidPayload(
            "response body is not an object".to_string(),
        ));
    };

    let reported_total = match body.get("total") {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        // the live API sends the total as a decimal string
        Some(serde_json::Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
        None => {
            return Err(UpstreamError::InvalidPayload(
                "missing total".to_string(),
            ));
        }
    }
    .ok_or_else(|| {
        UpstreamError::InvalidPayload("total is not a non-negative integer".to_string())
    })?;

    let Some(serde_json::Value::Array(data)) = body.remove("data") else {
        return Err(UpstreamError::InvalidPayload(
            "missing data array".to_string(),
        ));
    };

    let items = data
        .into_iter()
        .enumerate()
        .map(|(idx, value)| match value {
            serde_json::Value::Object(fields) => Ok(CatalogItem::new(fields)),
            _ => Err(UpstreamError::InvalidPayload(format!(
                "data[{}] is not an object",
                idx
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CatalogPage {
        items,
        reported_total,
        offset,
        limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_page_accepts_numeric_and_string_totals() {
        let numeric = parse_page(
            serde_json::json!({"total": 2, "data": [{"parkCode": "a"}, {"parkCode": "b"}]}),
            50,
            0,
        )
        .expect("numeric total should parse");
        assert_eq!(numeric.reported_total, 2);
        assert_eq!(numeric.items.len(), 2);

        let string = parse_page(
            serde_json::json!({"total": "474", "limit": "50", "start": "50", "data": []}),
            50,
            50,
        )
        .expect("string total should parse");
        assert_eq!(string.reported_total, 474);
        assert_eq!(string.offset, 50);
        assert!(string.items.is_empty());
    }

    #[test]
    fn parse_page_rejects_missing_fields() {
        let no_total = parse_page(serde_json::json!({"data": []}), 50, 0).unwrap_err();
        assert_eq!(
            no_total,
            UpstreamError::InvalidPayload("missing total".to_string())
        );

        let no_data = parse_page(serde_json::json!({"total": 3}), 50, 0).unwrap_err();
        assert_eq!(
            no_data,
            UpstreamError::InvalidPayload("missing data array".to_string())
        );
    }

    #[test]
    fn parse_page_rejects_malformed_values() {
        assert!(parse_page(serde_json::json!([]), 50, 0).is_err());
        assert!(parse_page(serde_json::json!({"total": -1, "data": []}), 50, 0).is_err());
        assert!(parse_page(serde_json::json!({"total": "many", "data": []}), 50, 0).is_err());
        assert!(parse_page(serde_json::json!({"total": 1, "data": {}}), 50, 0).is_err());

        let err = parse_page(serde_json::json!({"total": 2, "data": [{}, "x"]}), 50, 0)
            .unwrap_err();
        assert_eq!(
            err,
            UpstreamError::InvalidPayload("data[1] is not an object".to_string())
        );
    }
}
