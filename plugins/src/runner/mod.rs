pub mod closure;
pub mod retry;
pub mod router;

pub use closure::FnRunner;
pub use retry::{ExponentialBackoff, LinearRetry, RetryStrategy, RetryingRunner};
pub use router::UsesRouter;
