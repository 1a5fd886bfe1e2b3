//! Harvest services: taxonomy, classification, query planning, collection
//! access, downloading, and result accumulation

pub mod classifier;
pub mod collection_client;
pub mod downloader;
pub mod metadata_store;
pub mod query_planner;
pub mod retry;
pub mod taxonomy;

pub use classifier::Classifier;
pub use collection_client::{CollectionApi, FetchError, FetchErrorKind, MetCollectionClient};
pub use downloader::{Downloader, DownloaderError, DownloaderSettings};
pub use metadata_store::{CommitRefusal, MetadataStore};
pub use query_planner::{Query, QueryPlanner};
pub use retry::RetryPolicy;
pub use taxonomy::{SubPeriod, Taxonomy, TaxonomyError};
