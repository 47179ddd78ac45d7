mod clients;
pub mod feedback;
pub mod retry;
mod telemetry;

pub use clients::*;
pub use feedback::{ProgressMessage, retry_with_feedback};
pub use retry::{AttemptResult, RetryPolicy, retry_with_backoff, retry_with_policy};
pub use telemetry::*;
