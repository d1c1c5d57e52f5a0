//! Songci Core - Common infrastructure for the annotation pipeline
//!
//! Rate limiting, retry with backoff, work distribution, shutdown handling,
//! progress reporting and logging shared by the pipeline crates.

pub mod http;
pub mod logging;
pub mod progress;
pub mod rate_limiter;
pub mod retry;
pub mod shutdown;
pub mod work_queue;

// Re-exports for convenience
pub use http::{HttpError, SHARED_RUNTIME};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use rate_limiter::RateLimiter;
pub use retry::{RetryPolicy, retry_with_backoff};
pub use shutdown::{install_signal_handlers, is_shutdown_requested};
pub use work_queue::WorkQueue;
