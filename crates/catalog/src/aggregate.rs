use std::time::{Duration, Instant};

use parkbook_contracts::{AggregateResult, CatalogItem, MAX_PAGE_LIMIT};
use tracing::Instrument;

use crate::error::{CatalogError, TransportError, UpstreamError};
use crate::fetcher::{CatalogClientConfig, HttpPageFetcher, PageFetcher};
use crate::resource::{CatalogQuery, CatalogResource};

pub type CatalogClient = CatalogAggregator<HttpPageFetcher>;

/// Walks a paginated catalog collection to completion. Pages are fetched
/// strictly one after another; a walk either yields every item the upstream
/// reported or fails.
#[derive(Clone)]
pub struct CatalogAggregator<F> {
    fetcher: F,
    page_limit: u64,
    walk_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedWalk {
    pub result: AggregateResult,
    /// Pages fetched, including the one that completed the total.
    pub pages: u32,
}

struct Walk {
    items: Vec<CatalogItem>,
    reported_total: u64,
    pages: u32,
}

impl CatalogAggregator<HttpPageFetcher> {
    pub fn from_config(config: &CatalogClientConfig) -> Result<Self, CatalogError> {
        let fetcher = HttpPageFetcher::new(config)?;
        Ok(Self::new(fetcher, config.page_limit, config.walk_timeout))
    }
}

impl<F> CatalogAggregator<F>
where
    F: PageFetcher + Sync,
{
    pub fn new(fetcher: F, page_limit: u64, walk_timeout: Duration) -> Self {
        Self {
            fetcher,
            page_limit: page_limit.clamp(1, MAX_PAGE_LIMIT),
            walk_timeout,
        }
    }

    pub fn page_limit(&self) -> u64 {
        self.page_limit
    }

    pub async fn fetch_all(
        &self,
        resource: CatalogResource,
    ) -> Result<AggregateResult, CatalogError> {
        self.fetch_query(&CatalogQuery::new(resource)).await
    }

    pub async fn fetch_filtered(
        &self,
        resource: CatalogResource,
        filters: &[(&str, &str)],
    ) -> Result<AggregateResult, CatalogError> {
        let query = filters
            .iter()
            .fold(CatalogQuery::new(resource), |query, (key, value)| {
                query.filter(*key, *value)
            });
        self.fetch_query(&query).await
    }

    pub async fn fetch_query(&self, query: &CatalogQuery) -> Result<AggregateResult, CatalogError> {
        self.fetch_walk(query).await.map(|walk| walk.result)
    }

    /// Like [`fetch_query`](Self::fetch_query), also reporting how many pages
    /// the walk took.
    pub async fn fetch_walk(&self, query: &CatalogQuery) -> Result<CompletedWalk, CatalogError> {
        let span = tracing::info_span!(
            "catalog.fetch_all",
            resource = query.resource.path,
            nested = query.nested.map(|nested| nested.field),
            filters = query.filters.len(),
            page_limit = self.page_limit,
            reported_total = tracing::field::Empty,
            pages = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        async {
            let started = Instant::now();
            let walk = tokio::time::timeout(self.walk_timeout, self.walk(query))
                .await
                .map_err(|_| CatalogError::Transport(TransportError::Timeout))
                .and_then(|res| res);
            let result = walk.and_then(|walk| {
                let span = tracing::Span::current();
                span.record("reported_total", walk.reported_total);
                span.record("pages", walk.pages);

                let items = match query.nested {
                    Some(nested) => unnest(nested.field, walk.items)?,
                    None => walk.items,
                };
                Ok(CompletedWalk {
                    result: project(query.projection(), items)?,
                    pages: walk.pages,
                })
            });

            let latency_ms = started.elapsed().as_millis() as u64;
            tracing::Span::current().record("latency_ms", latency_ms);
            match &result {
                Ok(_) => {
                    tracing::Span::current().record("outcome", "ok");
                }
                Err(err) => {
                    tracing::Span::current().record("outcome", err.kind());
                    tracing::warn!(error = %err, "catalog walk failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn walk(&self, query: &CatalogQuery) -> Result<Walk, CatalogError> {
        let mut offset = 0u64;
        let mut items: Vec<CatalogItem> = Vec::new();
        let mut reported_total: Option<u64> = None;
        let mut pages = 0u32;

        loop {
            let page = self.fetcher.fetch(query, self.page_limit, offset).await?;
            pages += 1;

            let total = match reported_total {
                None => {
                    reported_total = Some(page.reported_total);
                    page.reported_total
                }
                Some(expected) if expected != page.reported_total => {
                    return Err(CatalogError::InconsistentTotal {
                        expected,
                        found: page.reported_total,
                        offset,
                    });
                }
                Some(expected) => expected,
            };

            let page_len = page.items.len();
            tracing::debug!(offset, items = page_len, total, "catalog page fetched");
            items.extend(page.items);

            let collected = items.len() as u64;
            if collected > total {
                return Err(UpstreamError::Overrun {
                    collected,
                    expected: total,
                }
                .into());
            }
            if collected == total {
                return Ok(Walk {
                    items,
                    reported_total: total,
                    pages,
                });
            }
            // an empty page before the total is reached would loop forever
            if page_len == 0 {
                return Err(UpstreamError::ShortWalk {
                    collected,
                    expected: total,
                }
                .into());
            }

            offset += self.page_limit;
        }
    }
}

/// Flattens the array stored under `field` on every item, in walk order. An
/// item without the field contributes nothing.
fn unnest(
    field: &'static str,
    items: Vec<CatalogItem>,
) -> Result<Vec<CatalogItem>, CatalogError> {
    let mut out = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let Some(value) = item.field(field) else {
            continue;
        };
        let serde_json::Value::Array(children) = value else {
            return Err(UpstreamError::InvalidPayload(format!(
                "item {} field {} is not an array",
                index, field
            ))
            .into());
        };
        for child in children {
            let serde_json::Value::Object(fields) = child else {
                return Err(UpstreamError::InvalidPayload(format!(
                    "item {} field {} holds a non-object",
                    index, field
                ))
                .into());
            };
            out.push(CatalogItem::new(fields.clone()));
        }
    }
    Ok(out)
}

fn project(
    resource: CatalogResource,
    items: Vec<CatalogItem>,
) -> Result<AggregateResult, CatalogError> {
    let mut codes = Vec::with_capacity(items.len());
    let mut names = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let code = item
            .str_field(resource.code_field)
            .ok_or(UpstreamError::MissingField {
                field: resource.code_field,
                index,
            })?;
        let name = item
            .str_field(resource.name_field)
            .ok_or(UpstreamError::MissingField {
                field: resource.name_field,
                index,
            })?;
        codes.push(code.to_string());
        names.push(name.to_string());
    }

    Ok(AggregateResult {
        items,
        codes,
        names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use parkbook_contracts::CatalogPage;

    #[derive(Default)]
    struct SyntheticFetcher {
        size: u64,
        total_override: Option<(u64, u64)>,
        fail_at: Option<u64>,
        empty_from: Option<u64>,
        delay: Option<Duration>,
        calls: Mutex<Vec<u64>>,
    }

    impl SyntheticFetcher {
        fn with_size(size: u64) -> Self {
            Self {
                size,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<u64> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    fn park(idx: u64) -> CatalogItem {
        let mut value = serde_json::json!({
            "id": format!("id-{idx}"),
            "parkCode": format!("p{idx:03}"),
            "fullName": format!("Park {idx}"),
        });
        // even parks list one activity, odd parks list none
        if idx % 2 == 0 {
            value["activities"] = serde_json::json!([
                {"id": format!("act-{idx}"), "name": format!("Activity {idx}")}
            ]);
        }
        serde_json::from_value(value).expect("synthetic item must deserialize")
    }

    impl PageFetcher for SyntheticFetcher {
        async fn fetch(
            &self,
            _query: &CatalogQuery,
            limit: u64,
            offset: u64,
        ) -> Result<CatalogPage, CatalogError> {
            self.calls.lock().expect("calls lock").push(offset);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_at == Some(offset) {
                return Err(CatalogError::Transport(TransportError::Timeout));
            }

            let reported_total = match self.total_override {
                Some((at, total)) if at == offset => total,
                _ => self.size,
            };

            let end = if self.empty_from.is_some_and(|from| offset >= from) {
                offset
            } else {
                (offset + limit).min(self.size)
            };

            Ok(CatalogPage {
                items: (offset..end).map(park).collect(),
                reported_total,
                offset,
                limit,
            })
        }
    }

    fn aggregator(fetcher: SyntheticFetcher) -> CatalogAggregator<SyntheticFetcher> {
        CatalogAggregator::new(fetcher, 50, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn walk_collects_every_item_with_aligned_projections() {
        for size in [0u64, 1, 49, 50, 51, 100, 137, 499, 500] {
            let agg = aggregator(SyntheticFetcher::with_size(size));
            let result = agg
                .fetch_all(CatalogResource::PARKS)
                .await
                .expect("walk should succeed");

            assert_eq!(result.items.len() as u64, size);
            assert_eq!(result.codes.len() as u64, size);
            assert_eq!(result.names.len() as u64, size);
            for (idx, item) in result.items.iter().enumerate() {
                assert_eq!(item.str_field("parkCode"), Some(result.codes[idx].as_str()));
                assert_eq!(item.str_field("fullName"), Some(result.names[idx].as_str()));
            }

            let expected_calls = size.div_ceil(50).max(1);
            let calls = agg.fetcher.calls();
            assert_eq!(calls.len() as u64, expected_calls, "size {size}");
            assert_eq!(
                calls,
                (0..expected_calls).map(|k| k * 50).collect::<Vec<_>>()
            );
        }
    }

    #[tokio::test]
    async fn changed_total_on_second_page_fails_the_walk() {
        let agg = aggregator(SyntheticFetcher {
            total_override: Some((50, 121)),
            ..SyntheticFetcher::with_size(120)
        });

        let err = agg.fetch_all(CatalogResource::PARKS).await.unwrap_err();
        match err {
            CatalogError::InconsistentTotal {
                expected,
                found,
                offset,
            } => {
                assert_eq!(expected, 120);
                assert_eq!(found, 121);
                assert_eq!(offset, 50);
            }
            other => panic!("expected inconsistent total, got {other:?}"),
        }
        assert_eq!(agg.fetcher.calls(), vec![0, 50]);
    }

    #[tokio::test]
    async fn transport_failure_stops_the_walk() {
        let agg = aggregator(SyntheticFetcher {
            fail_at: Some(100),
            ..SyntheticFetcher::with_size(300)
        });

        let err = agg.fetch_all(CatalogResource::PARKS).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.is_timeout());
        assert_eq!(agg.fetcher.calls(), vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn empty_page_before_total_is_an_upstream_error() {
        let agg = aggregator(SyntheticFetcher {
            empty_from: Some(50),
            ..SyntheticFetcher::with_size(75)
        });

        let err = agg.fetch_all(CatalogResource::PARKS).await.unwrap_err();
        match err {
            CatalogError::Upstream(UpstreamError::ShortWalk {
                collected,
                expected,
            }) => {
                assert_eq!(collected, 50);
                assert_eq!(expected, 75);
            }
            other => panic!("expected short walk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn more_items_than_reported_is_an_upstream_error() {
        let agg = aggregator(SyntheticFetcher {
            total_override: Some((0, 10)),
            ..SyntheticFetcher::with_size(30)
        });

        let err = agg.fetch_all(CatalogResource::PARKS).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Upstream(UpstreamError::Overrun {
                collected: 30,
                expected: 10
            })
        ));
    }

    #[tokio::test]
    async fn item_without_projected_field_is_rejected() {
        let agg = aggregator(SyntheticFetcher::with_size(3));

        let err = agg.fetch_all(CatalogResource::ACTIVITIES).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Upstream(UpstreamError::MissingField {
                field: "name",
                index: 0
            })
        ));
    }

    #[tokio::test]
    async fn walk_deadline_surfaces_as_transport_timeout() {
        let agg = CatalogAggregator::new(
            SyntheticFetcher {
                delay: Some(Duration::from_millis(200)),
                ..SyntheticFetcher::with_size(10)
            },
            50,
            Duration::from_millis(20),
        );

        let err = agg.fetch_all(CatalogResource::PARKS).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn fetch_walk_reports_pages_fetched() {
        for (size, pages) in [(0u64, 1u32), (50, 1), (100, 2), (123, 3)] {
            let agg = aggregator(SyntheticFetcher::with_size(size));
            let walk = agg
                .fetch_walk(&CatalogQuery::new(CatalogResource::PARKS))
                .await
                .expect("walk should succeed");
            assert_eq!(walk.pages, pages, "size {size}");
            assert_eq!(walk.result.len() as u64, size);
        }
    }

    #[tokio::test]
    async fn nested_projection_flattens_child_arrays_in_walk_order() {
        let agg = aggregator(SyntheticFetcher::with_size(5));
        let query = CatalogQuery::new(CatalogResource::PARKS)
            .nested("activities", CatalogResource::ACTIVITIES);

        let result = agg.fetch_query(&query).await.expect("walk should succeed");
        assert_eq!(result.codes, vec!["act-0", "act-2", "act-4"]);
        assert_eq!(result.names, vec!["Activity 0", "Activity 2", "Activity 4"]);
        assert_eq!(result.items.len(), 3);
    }

    #[tokio::test]
    async fn nested_field_that_is_not_an_array_is_rejected() {
        let agg = aggregator(SyntheticFetcher::with_size(2));
        let query = CatalogQuery::new(CatalogResource::PARKS)
            .nested("fullName", CatalogResource::ACTIVITIES);

        let err = agg.fetch_query(&query).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Upstream(UpstreamError::InvalidPayload(_))
        ));
    }

    #[test]
    fn page_limit_is_clamped_to_upstream_maximum() {
        let agg = CatalogAggregator::new(
            SyntheticFetcher::default(),
            500,
            Duration::from_secs(1),
        );
        assert_eq!(agg.page_limit(), MAX_PAGE_LIMIT);

        let agg = CatalogAggregator::new(SyntheticFetcher::default(), 0, Duration::from_secs(1));
        assert_eq!(agg.page_limit(), 1);
    }
}
