pub mod errors;
pub mod logger;
pub mod types;

pub use errors::{RelayError, RelayResult};
pub use types::{AnyError, AnyResult, ConnectionId, SessionCode, SessionId};
