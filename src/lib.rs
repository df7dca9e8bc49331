pub mod common;
pub mod configs;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod transport;
