pub mod backend;
pub mod critique_client;
pub mod extraction;
pub mod openai_backend;

pub use backend::{
    BackendError, ChatMessage, CompletionRequest, CompletionResponse, CritiqueBackend, MessageRole,
};
pub use critique_client::{CallFailure, CritiqueClient, Role};
pub use extraction::ParserChain;
pub use openai_backend::OpenAiBackend;
