pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod permalink;
pub mod pipeline;
pub mod retry;
pub mod session;
pub mod sheet;
pub mod throttle;
pub mod transport;
mod utils;

pub use crate::api::{ApiClient, FetchCaps};
pub use crate::config::Credentials;
pub use crate::error::{Error, ErrorKind};
pub use crate::pipeline::{Pipeline, RunOptions, RunSummary, Stage};
pub use crate::retry::RetryPolicy;
pub use crate::session::RedditSession;
pub use crate::sheet::{read_urls, InputCells, SheetWriter};
pub use crate::throttle::Throttle;
pub use crate::transport::{ApiRequest, HttpError, Transport};
