use serde::{Deserialize, Serialize};

/// Largest page size the upstream catalog honors.
pub const MAX_PAGE_LIMIT: u64 = 50;

/// One catalog record as returned by the upstream. Only the projected fields
/// are ever inspected; everything else is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogItem(serde_json::Map<String, serde_json::Value>);

impl CatalogItem {
    pub fn new(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(fields)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub items: Vec<CatalogItem>,
    pub reported_total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// A fully materialized catalog walk. `items`, `codes` and `names` are
/// positionally aligned.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    pub items: Vec<CatalogItem>,
    pub codes: Vec<String>,
    pub names: Vec<String>,
}

impl AggregateResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// De-duplicated state codes taken from each item's comma separated
    /// `states` field, in first-seen order.
    pub fn state_codes(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for item in &self.items {
            let Some(states) = item.str_field("states") else {
                continue;
            };
            for code in states.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if seen.insert(code.to_string()) {
                    out.push(code.to_string());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(value: serde_json::Value) -> CatalogItem {
        serde_json::from_value(value).expect("item must deserialize")
    }

    #[test]
    fn catalog_item_round_trips_unknown_fields() {
        let raw = serde_json::json!({
            "parkCode": "yose",
            "fullName": "Yosemite National Park",
            "latLong": "lat:37.84, long:-119.55"
        });
        let parsed = item(raw.clone());

        assert_eq!(parsed.str_field("parkCode"), Some("yose"));
        assert_eq!(parsed.str_field("missing"), None);
        assert!(parsed.field("latLong").is_some_and(|v| v.is_string()));
        assert_eq!(serde_json::to_value(&parsed).expect("serialize"), raw);
    }

    #[test]
    fn state_codes_dedupes_in_first_seen_order() {
        let result = AggregateResult {
            items: vec![
                item(serde_json::json!({"states": "FL"})),
                item(serde_json::json!({"states": "CA,NV"})),
                item(serde_json::json!({"name": "no states"})),
                item(serde_json::json!({"states": "NV, FL,AZ"})),
            ],
            codes: Vec::new(),
            names: Vec::new(),
        };

        assert_eq!(result.state_codes(), vec!["FL", "CA", "NV", "AZ"]);
    }

    #[test]
    fn empty_aggregate_reports_empty() {
        let result = AggregateResult::default();
        assert!(result.is_empty());
        assert_eq!(result.len(), 0);
        assert!(result.state_codes().is_empty());
    }
}
