//! HTTP plumbing shared by every remote collaborator.
//!
//! All outbound requests go through [`resilient_get`] (or [`resilient_send`] for
//! non-GET calls), which layers bounded retries, `Retry-After` handling, and a
//! per-call timeout on top of `reqwest`. Requests are sent with a randomly chosen
//! client identity, and a [`Throttler`] bounds how many run at once.

mod client;
mod identity;
mod resilient_http;
mod throttler;

pub use client::{ClientOptions, build_client};
pub use identity::random_user_agent;
pub use resilient_http::{DEFAULT_RATE_LIMIT_DELAY, parse_retry_after, resilient_get, resilient_send};
pub use throttler::{PauseGuard, Throttler};
