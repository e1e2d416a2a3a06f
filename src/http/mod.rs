//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, span, metrics)
//!     → nasa.rs / rick_and_morty.rs (typed handlers over services)
//!     → response.rs (upstream error → status + JSON body)
//!     → Send to client
//! ```

pub mod nasa;
pub mod request;
pub mod response;
pub mod rick_and_morty;
pub mod server;

pub use request::{RequestId, RequestIdExt, X_REQUEST_ID};
pub use response::{ApiError, ErrorBody};
pub use server::{AppState, HttpServer};
