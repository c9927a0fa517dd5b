pub mod aggregate;
pub mod error;
pub mod fetcher;
pub mod resource;
pub mod retry;

pub use aggregate::{CatalogAggregator, CatalogClient, CompletedWalk};
pub use error::{CatalogError, TransportError, UpstreamError};
pub use fetcher::{CatalogClientConfig, HttpPageFetcher, PageFetcher};
pub use resource::{CatalogQuery, CatalogResource, NestedProjection};
pub use retry::RetryPolicy;
