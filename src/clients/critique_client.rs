//! 评析调用客户端
//!
//! 在后端之上负责：缓存读穿、单次超时、指数退避重试、结构化提取。
//! 每次尝试（包括缓存命中）都会记录一条 `LlmCallMeta`。

use super::backend::{BackendError, ChatMessage, CompletionRequest, CritiqueBackend};
use super::extraction::ParserChain;
use crate::config::ModelConfig;
use crate::error::LlmError;
use crate::infrastructure::cache::{CacheKey, CacheStore};
use crate::models::{LlmCallMeta, StructuredOutput};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use crate::models::Role;

/// 一次调用最终失败的原因
pub type CallFailure = LlmError;

pub struct CritiqueClient {
    backend: Arc<dyn CritiqueBackend>,
    cache: Option<Arc<dyn CacheStore>>,
    parsers: ParserChain,
}

/// 第 `retry` 次重试前的等待时间（从 0 计）
pub fn backoff_delay(config: &ModelConfig, retry: u32) -> Duration {
    let factor = 2u64.saturating_pow(retry);
    let delay = config
        .backoff_base_ms
        .saturating_mul(factor)
        .min(config.backoff_max_ms);
    Duration::from_millis(delay)
}

fn new_call_id(role: Role) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", role.as_str(), &suffix[..8])
}

impl CritiqueClient {
    pub fn new(backend: Arc<dyn CritiqueBackend>, cache: Option<Arc<dyn CacheStore>>) -> Self {
        Self {
            backend,
            cache,
            parsers: ParserChain::default(),
        }
    }

    /// 调用模型并提取结构化结果
    ///
    /// # 参数
    /// - `role`: 主分析或审核
    /// - `messages`: 系统消息 + 用户消息
    /// - `config`: 该角色的模型配置
    /// - `calls`: 每次尝试的元数据追加到这里
    pub async fn invoke<T: StructuredOutput>(
        &self,
        role: Role,
        messages: &[ChatMessage],
        config: &ModelConfig,
        calls: &mut Vec<LlmCallMeta>,
    ) -> Result<T, CallFailure> {
        let key = CacheKey::compute(&config.model, messages, config.temperature);

        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(&key).and_then(T::from_value) {
                info!("💾 [{}] 命中缓存 (模型: {})", role.as_str(), config.model);
                calls.push(LlmCallMeta {
                    call_id: new_call_id(role),
                    role,
                    model: config.model.clone(),
                    attempt: 0,
                    latency_ms: 0,
                    input_tokens: None,
                    output_tokens: None,
                    cached: true,
                    error: None,
                });
                return Ok(value);
            }
        }

        let request = CompletionRequest {
            model: config.model.clone(),
            messages: messages.to_vec(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            json_mode: config
                .json_mode
                .unwrap_or_else(|| self.backend.supports_strict_json(&config.model)),
        };

        let total_attempts = config.retries + 1;
        let mut last_error = None;

        for attempt in 1..=total_attempts {
            if attempt > 1 {
                let delay = backoff_delay(config, attempt - 2);
                debug!("[{}] 等待 {}ms 后重试", role.as_str(), delay.as_millis());
                tokio::time::sleep(delay).await;
            }

            let started = Instant::now();
            let outcome = self.attempt::<T>(&request, config).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let (input_tokens, output_tokens) = match &outcome {
                Ok((_, _, tokens)) => *tokens,
                Err(_) => (None, None),
            };
            calls.push(LlmCallMeta {
                call_id: new_call_id(role),
                role,
                model: config.model.clone(),
                attempt,
                latency_ms,
                input_tokens,
                output_tokens,
                cached: false,
                error: outcome.as_ref().err().map(|e| e.to_string()),
            });

            match outcome {
                Ok((result, value, _)) => {
                    if let Some(cache) = &self.cache {
                        if let Err(e) = cache.put(&key, &value) {
                            warn!("⚠️ [{}] 缓存写入失败: {}", role.as_str(), e);
                        }
                    }
                    debug!(
                        "[{}] 第 {}/{} 次调用成功 ({}ms)",
                        role.as_str(),
                        attempt,
                        total_attempts,
                        latency_ms
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        "⚠️ [{}] 第 {}/{} 次调用失败: {}",
                        role.as_str(),
                        attempt,
                        total_attempts,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::EmptyContent {
            model: config.model.clone(),
        }))
    }

    /// 单次尝试：调用、超时、提取、校验结构
    async fn attempt<T: StructuredOutput>(
        &self,
        request: &CompletionRequest,
        config: &ModelConfig,
    ) -> Result<(T, serde_json::Value, (Option<u32>, Option<u32>)), LlmError> {
        let model = config.model.clone();
        let timeout = Duration::from_millis(config.timeout_ms);

        let response = match tokio::time::timeout(timeout, self.backend.complete(request)).await {
            Err(_) => {
                return Err(LlmError::Timeout {
                    model,
                    timeout_ms: config.timeout_ms,
                })
            }
            Ok(Err(BackendError::Transport(message))) => {
                return Err(LlmError::Transport { model, message })
            }
            Ok(Err(BackendError::RateLimited(message))) => {
                return Err(LlmError::RateLimited { model, message })
            }
            Ok(Err(BackendError::EmptyContent)) => return Err(LlmError::EmptyContent { model }),
            Ok(Ok(response)) => response,
        };

        if response.content.trim().is_empty() {
            return Err(LlmError::EmptyContent { model });
        }

        let unparseable = || LlmError::Unparseable {
            model: config.model.clone(),
            response_len: response.content.len(),
        };
        let (strategy, value) = self.parsers.extract(&response.content).ok_or_else(unparseable)?;
        debug!("结构化提取策略: {}", strategy);
        let result = T::from_value(value.clone()).ok_or_else(unparseable)?;

        Ok((
            result,
            value,
            (response.input_tokens, response.output_tokens),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::backend::CompletionResponse;
    use crate::infrastructure::cache::MemoryCache;
    use crate::models::CritiqueResult;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 按脚本依次返回结果
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, BackendError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Result<&str, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CritiqueBackend for Scripted {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(BackendError::EmptyContent));
            reply.map(CompletionResponse::text)
        }
    }

    fn fast_config(retries: u32) -> ModelConfig {
        ModelConfig {
            retries,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
            timeout_ms: 200,
            ..ModelConfig::default()
        }
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::system("sys"), ChatMessage::user("text")]
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = ModelConfig {
            backoff_base_ms: 1000,
            backoff_max_ms: 8000,
            ..ModelConfig::default()
        };
        assert_eq!(backoff_delay(&config, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&config, 2), Duration::from_millis(4000));
        assert_eq!(backoff_delay(&config, 5), Duration::from_millis(8000));
        assert_eq!(backoff_delay(&config, 64), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn test_retries_until_parse_succeeds() {
        let backend = Scripted::new(vec![
            Err(BackendError::Transport("reset".into())),
            Ok("not json at all"),
            Ok("```json\n{\"summary\": \"fine\"}\n```"),
        ]);
        let client = CritiqueClient::new(backend.clone(), None);
        let mut calls = Vec::new();
        let result: CritiqueResult = client
            .invoke(Role::Primary, &messages(), &fast_config(2), &mut calls)
            .await
            .unwrap();
        assert_eq!(result.summary, "fine");
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls.iter().map(|c| c.attempt).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(calls[0].error.is_some());
        assert!(calls[2].succeeded());
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_a_parse_failure() {
        let backend = Scripted::new(vec![Ok("{\"unrelated\": 1}")]);
        let client = CritiqueClient::new(backend, None);
        let mut calls = Vec::new();
        let err = client
            .invoke::<CritiqueResult>(Role::Primary, &messages(), &fast_config(0), &mut calls)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Unparseable { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseFailure);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_backend() {
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let first = Scripted::new(vec![Ok("{\"summary\": \"cached\"}")]);
        let client = CritiqueClient::new(first.clone(), Some(cache.clone()));
        let mut calls = Vec::new();
        let _: Value = client
            .invoke(Role::Primary, &messages(), &fast_config(0), &mut calls)
            .await
            .unwrap();

        let second = Scripted::new(vec![]);
        let client = CritiqueClient::new(second.clone(), Some(cache));
        let mut calls = Vec::new();
        let value: Value = client
            .invoke(Role::Primary, &messages(), &fast_config(0), &mut calls)
            .await
            .unwrap();
        assert_eq!(value["summary"], "cached");
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].cached);
        assert_eq!(calls[0].attempt, 0);
    }

    #[tokio::test]
    async fn test_all_attempts_fail() {
        let backend = Scripted::new(vec![
            Err(BackendError::RateLimited("429".into())),
            Err(BackendError::RateLimited("429".into())),
        ]);
        let client = CritiqueClient::new(backend.clone(), None);
        let mut calls = Vec::new();
        let err = client
            .invoke::<Value>(Role::Audit, &messages(), &fast_config(1), &mut calls)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert!(calls.iter().all(|c| !c.succeeded()));
    }
}
