pub mod engine;

pub use engine::{ConnectionHandle, RelayEngine};
