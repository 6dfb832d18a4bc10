//! HTTP handlers for the Ext Direct router and its API descriptor.

pub mod direct;
pub use direct::*;
