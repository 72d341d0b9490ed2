pub mod config;
pub mod error;
pub mod http_client;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod positions;
pub mod scrape;
pub mod source;
pub mod stats;
pub mod store;
pub mod watermark;
