//! HTTP API handlers for inkbase-cs

pub mod artists;
pub mod consents;
pub mod customers;
pub mod health;
pub mod owner;
pub mod public;
pub mod tokens;

pub use health::health_routes;
pub use owner::OWNER_HEADER;
