//! Public types for the Bifrost API.

mod method;
mod request;
mod response;

pub use method::Method;
pub use request::RequestDescriptor;
pub use response::{AdapterResponse, UpstreamResponse};
