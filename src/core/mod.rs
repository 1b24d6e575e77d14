//! Core data models, errors and run-control primitives

mod credentials;
pub mod dates;
mod errors;
mod models;
pub mod retry;
mod throttle;

pub use credentials::*;
pub use errors::*;
pub use models::*;
pub use retry::{Pause, RetryPolicy, TokioPause};
pub use throttle::*;
