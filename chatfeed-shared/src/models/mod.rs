pub mod channel;
pub mod errors;
pub mod message;
pub mod timestamp;

pub use channel::Channel;
pub use errors::ValidationError;
pub use message::{Message, PostMessageRequest};
pub use timestamp::Timestamp;
