pub mod errors;
pub mod id;
pub mod types;

pub use errors::{ConfigError, HubError};
pub use id::{new_id, ConnectionId};
pub use types::{ChannelKind, Identity};

pub type Result<T> = std::result::Result<T, HubError>;
