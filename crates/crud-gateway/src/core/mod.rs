pub mod builder;
pub mod executor;
pub mod gateway;
pub mod identifier;
pub mod limits;
pub mod placeholders;
pub mod pool;
pub mod schema;
pub mod types;

pub use gateway::{Gateway, GatewayConfig};
