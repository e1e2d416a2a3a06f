//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a named dependency:
//!     → caller.rs (look up the circuit, fail fast when open)
//!     → retries.rs (re-attempt transient failures with backoff.rs delays)
//!     → upstream executor (one attempt)
//!     → circuit_breaker.rs (record the outcome per FailurePolicy)
//! ```
//!
//! # Design Decisions
//! - Every outbound call has a per-attempt deadline set by the executor
//! - Only connection failures and timeouts are retried
//! - Circuits live in one shared registry, keyed by dependency name

pub mod backoff;
pub mod caller;
pub mod circuit_breaker;
pub mod clock;
pub mod registry;
pub mod retries;

pub use caller::{CircuitOutcome, FailurePolicy, ResilientCaller};
pub use circuit_breaker::{CircuitBreaker, CircuitMetrics, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::{CircuitBreakerRegistry, OverallStatus, RegistrySummary};
pub use retries::{RetryPolicy, RetryingClient};
