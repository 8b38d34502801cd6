//! HTTP API handlers for scones-gateway

pub mod health;
pub mod invoke;

pub use health::health_routes;
pub use invoke::invoke_routes;
