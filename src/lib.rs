pub mod admin;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod node;
pub mod pool;
pub mod protocol;
pub mod sandbox;
pub mod scheduler;
pub mod shutdown;
