//! Request dispatch and HTTP forwarding.

mod dispatcher;
mod forward;

pub use dispatcher::Dispatcher;
pub use forward::ForwardError;
