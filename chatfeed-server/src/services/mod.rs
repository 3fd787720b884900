//! Chat backend contract and its in-process implementation.

pub mod chat_service;
pub mod in_memory_chat_service;

pub use chat_service::{
    ChatService, ChatServiceError, ChatServiceResult, LiveMessages, SharedChatService,
};
pub use in_memory_chat_service::InMemoryChatService;
