//! Upstream API access.
//!
//! # Data Flow
//! ```text
//! UpstreamRequest (endpoint template + params)
//!     → executor.rs (resolve URL, inject auth, one HTTP attempt)
//!     → pool.rs (shared reqwest client, bounded concurrency)
//!     → response.rs (decode JSON/text) or error.rs (classified failure)
//! ```
//!
//! # Design Decisions
//! - One shared client for every upstream; each upstream binds its own
//!   base URL and credentials in an `HttpExecutor`
//! - The executor trait is the seam where tests substitute fakes

pub mod error;
pub mod executor;
pub mod pool;
pub mod request;
pub mod response;

pub use error::{ErrorKind, UpstreamError, UpstreamResult, ValidationStage};
pub use executor::{HttpExecutor, RequestExecutor, UpstreamAuth};
pub use pool::HttpClientPool;
pub use request::UpstreamRequest;
pub use response::{ParsedResponse, ResponseBody};
