//! Router builders.

mod common;
mod resource;

pub use common::common_routes;
pub use resource::{api_router, resource_routes};
