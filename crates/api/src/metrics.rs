use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
static CATALOG_WALKS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static CATALOG_WALK_PAGES: OnceLock<HistogramVec> = OnceLock::new();
static MUTATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

fn register_collector<T>(collector: T) -> T
where
    T: prometheus::core::Collector + Clone + 'static,
{
    let _ = registry().register(Box::new(collector.clone()));
    collector
}

fn http_requests_total() -> &'static IntCounterVec {
    HTTP_REQUESTS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new("parkbook_http_requests_total", "API HTTP request count."),
                &["route", "method", "status"],
            )
            .expect("create parkbook_http_requests_total"),
        )
    })
}

fn http_request_duration_seconds() -> &'static HistogramVec {
    HTTP_REQUEST_DURATION_SECONDS.get_or_init(|| {
        register_collector(
            HistogramVec::new(
                HistogramOpts::new(
                    "parkbook_http_request_duration_seconds",
                    "API HTTP request duration in seconds.",
                )
                .buckets(vec![
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
                ]),
                &["route", "method", "outcome"],
            )
            .expect("create parkbook_http_request_duration_seconds"),
        )
    })
}

fn catalog_walks_total() -> &'static IntCounterVec {
    CATALOG_WALKS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "parkbook_catalog_walks_total",
                    "Completed or failed catalog walks.",
                ),
                &["resource", "outcome"],
            )
            .expect("create parkbook_catalog_walks_total"),
        )
    })
}

fn catalog_walk_pages() -> &'static HistogramVec {
    CATALOG_WALK_PAGES.get_or_init(|| {
        register_collector(
            HistogramVec::new(
                HistogramOpts::new(
                    "parkbook_catalog_walk_pages",
                    "Pages fetched per successful catalog walk.",
                )
                .buckets(vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0]),
                &["resource"],
            )
            .expect("create parkbook_catalog_walk_pages"),
        )
    })
}

fn mutations_total() -> &'static IntCounterVec {
    MUTATIONS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new("parkbook_mutations_total", "Entity mutation attempts."),
                &["entity", "outcome"],
            )
            .expect("create parkbook_mutations_total"),
        )
    })
}

pub fn observe_http_request(route: &str, method: &str, status: u16, duration: Duration) {
    let status_str = status.to_string();
    http_requests_total()
        .with_label_values(&[route, method, status_str.as_str()])
        .inc();

    let outcome = if (200..400).contains(&status) {
        "success"
    } else {
        "error"
    };
    http_request_duration_seconds()
        .with_label_values(&[route, method, outcome])
        .observe(duration.as_secs_f64());
}

pub fn observe_catalog_walk(resource: &str, outcome: &str) {
    catalog_walks_total()
        .with_label_values(&[resource, outcome])
        .inc();
}

pub fn observe_catalog_pages(resource: &str, pages: u64) {
    catalog_walk_pages()
        .with_label_values(&[resource])
        .observe(pages as f64);
}

pub fn observe_mutation(entity: &str, outcome: &str) {
    mutations_total().with_label_values(&[entity, outcome]).inc();
}

pub fn render() -> Result<(Vec<u8>, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_output_includes_observed_series() {
        observe_catalog_walk("parks", "ok");
        observe_catalog_pages("parks", 3);
        observe_mutation("user", "not_found");
        observe_http_request("/v1/parks", "GET", 200, Duration::from_millis(12));

        let (body, content_type) = render().expect("render should succeed");
        let body = String::from_utf8(body).expect("metrics are utf-8");

        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("parkbook_catalog_walks_total{outcome=\"ok\",resource=\"parks\"}"));
        assert!(body.contains("parkbook_catalog_walk_pages_bucket"));
        assert!(body.contains("parkbook_mutations_total{entity=\"user\",outcome=\"not_found\"}"));
        assert!(body.contains("parkbook_http_requests_total"));
    }
}
