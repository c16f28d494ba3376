//! Gateway: the dispatch engine and its builder

mod builder;
mod dispatch;

pub use builder::{Bifrost, GatewayBuilder};
pub use dispatch::Gateway;
