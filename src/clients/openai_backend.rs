//! OpenAI 兼容后端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点，兼容 OpenAI API 的服务均可使用

use super::backend::{
    BackendError, ChatMessage, CompletionRequest, CompletionResponse, CritiqueBackend,
    MessageRole,
};
use crate::config::Config;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
}

impl OpenAiBackend {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
        }
    }

    fn build_messages(
        messages: &[ChatMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>, BackendError> {
        messages
            .iter()
            .map(|message| match message.role {
                MessageRole::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(message.content.as_str())
                    .build()
                    .map(ChatCompletionRequestMessage::System),
                MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.as_str())
                    .build()
                    .map(ChatCompletionRequestMessage::User),
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::Transport(format!("构建消息失败: {}", e)))
    }

    /// top_p 为默认值 1.0 时不发送
    fn build_request(
        request: &CompletionRequest,
    ) -> Result<CreateChatCompletionRequest, BackendError> {
        let messages = Self::build_messages(&request.messages)?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&request.model)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens);
        if (request.top_p - DEFAULT_TOP_P).abs() > f32::EPSILON {
            args.top_p(request.top_p);
        }
        if request.json_mode {
            args.response_format(ResponseFormat::JsonObject);
        }
        args.build()
            .map_err(|e| BackendError::Transport(format!("构建请求失败: {}", e)))
    }
}

const DEFAULT_TOP_P: f32 = 1.0;

/// 频率限制与其他传输错误分开上报
fn classify_error(message: String) -> BackendError {
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("429") {
        BackendError::RateLimited(message)
    } else {
        BackendError::Transport(message)
    }
}

#[async_trait]
impl CritiqueBackend for OpenAiBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, BackendError> {
        debug!(
            "调用 LLM API，模型: {}，JSON 模式: {}",
            request.model, request.json_mode
        );

        let api_request = Self::build_request(request)?;

        let response = self.client.chat().create(api_request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            classify_error(e.to_string())
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or(BackendError::EmptyContent)?;

        let (input_tokens, output_tokens) = response
            .usage
            .map(|usage| (Some(usage.prompt_tokens), Some(usage.completion_tokens)))
            .unwrap_or((None, None));

        debug!("LLM API 调用成功，返回 {} 字符", content.len());

        Ok(CompletionResponse {
            content: content.trim().to_string(),
            input_tokens,
            output_tokens,
        })
    }
}
