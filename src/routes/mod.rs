mod common;
mod direct;

pub use common::common_routes;
pub use direct::direct_routes;
