//! Application Services
//!
//! Services that hold the live state and route inbound traffic.
//!
//! - `LiveSession`: Connection state, active topic, live buffer and rating
//! - `MessageRouter`: Topic filtering and acknowledgement handling

mod router;
mod session;

pub use router::{ClientContext, MessageRouter, RateSuccessCallback, RatingCallback, RouteOutcome};
pub use session::{IntentLink, LiveClientError, LiveSession};
