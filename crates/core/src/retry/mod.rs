//! Retry governor for provider calls.
//!
//! Every provider call goes through [`with_retry`], which classifies the
//! failure and decides between backing off, failing fast, or passing the
//! error through.

mod error;
mod governor;
mod policy;

pub use error::GenerationError;
pub use governor::{with_retry, with_retry_notify, RetryEvent};
pub use policy::RetryPolicy;
