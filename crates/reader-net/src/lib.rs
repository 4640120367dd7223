pub mod account;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;
mod listing;
pub mod models;
pub mod pipeline;
pub mod refresh;
pub mod transport;

pub use error::{ApiError, ApiResult, TransportError};
pub use pipeline::RequestPipeline;
