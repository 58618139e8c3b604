//! Wire types for the upstream chat-completion API

mod openai;

pub use openai::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Role, StreamChunk,
    UpstreamErrorBody,
};
