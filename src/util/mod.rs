//! Utility functions and helpers.

mod ids;
mod logging;

pub use ids::{ConnectionId, RequestId};
pub use logging::init_logging;
