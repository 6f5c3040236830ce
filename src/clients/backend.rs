//! 远程评析能力的抽象
//!
//! 后端只负责“给定消息，返回文本或失败”；重试、超时、缓存和结构化提取
//! 都在 `CritiqueClient` 中完成。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

/// 一条对话消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// 一次补全请求
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// 请求严格 JSON 输出
    pub json_mode: bool,
}

/// 补全响应
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            input_tokens: None,
            output_tokens: None,
        }
    }
}

/// 后端错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("传输失败: {0}")]
    Transport(String),
    #[error("请求频率限制: {0}")]
    RateLimited(String),
    #[error("返回内容为空")]
    EmptyContent,
}

/// 远程评析后端
#[async_trait]
pub trait CritiqueBackend: Send + Sync {
    /// 该模型是否支持严格 JSON 模式
    ///
    /// 默认：Claude / Anthropic 系列不支持，其余支持
    fn supports_strict_json(&self, model: &str) -> bool {
        let model = model.to_lowercase();
        !(model.starts_with("claude") || model.starts_with("anthropic"))
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[async_trait]
    impl CritiqueBackend for Dummy {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, BackendError> {
            Ok(CompletionResponse::text("{}"))
        }
    }

    #[test]
    fn test_default_strict_json_support() {
        assert!(Dummy.supports_strict_json("gpt-4o"));
        assert!(!Dummy.supports_strict_json("claude-3-5-sonnet"));
        assert!(!Dummy.supports_strict_json("Anthropic/claude"));
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&ChatMessage::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }
}
