//! Run 管理器 - 编排层
//!
//! ## 核心功能
//!
//! 1. **提交**：校验输入，创建 Run 并登记到注册表
//! 2. **并发控制**：使用 Semaphore 限制同时运行的 Run 数量
//! 3. **查询**：poll 返回状态，fetch 返回结果
//! 4. **取消 / 清理**：cancel 只设置标记，由执行任务自行结束
//!
//! 每个 Run 是一个 tokio 任务；未拿到许可前保持 Pending。

use crate::clients::backend::CritiqueBackend;
use crate::clients::OpenAiBackend;
use crate::config::Config;
use crate::error::{AppError, AppResult, ErrorKind, InputError, RunError};
use crate::infrastructure::{CacheStore, FsCache};
use crate::models::{Run, RunOutput, RunState, RunStatus};
use crate::orchestrator::registry::{RunHandle, RunRegistry};
use crate::utils::logging;
use crate::workflow::{CritiqueFlow, RunCtx};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 编排器
pub struct Orchestrator {
    config: Config,
    registry: RunRegistry,
    flow: Arc<CritiqueFlow>,
    semaphore: Arc<Semaphore>,
}

impl Orchestrator {
    /// 使用给定后端和注册表创建编排器
    ///
    /// 启用缓存时在 `cache_dir` 下创建文件缓存；创建失败只告警
    pub fn new(config: Config, backend: Arc<dyn CritiqueBackend>, registry: RunRegistry) -> Self {
        let cache: Option<Arc<dyn CacheStore>> = if config.enable_cache {
            match FsCache::new(&config.cache_dir) {
                Ok(cache) => Some(Arc::new(cache)),
                Err(e) => {
                    warn!("⚠️ 无法创建缓存目录，缓存已禁用: {}", e);
                    None
                }
            }
        } else {
            None
        };
        Self::with_cache(config, backend, registry, cache)
    }

    /// 使用显式缓存创建编排器
    pub fn with_cache(
        config: Config,
        backend: Arc<dyn CritiqueBackend>,
        registry: RunRegistry,
        cache: Option<Arc<dyn CacheStore>>,
    ) -> Self {
        let permits = config.max_concurrent_runs.max(1);
        Self {
            config,
            registry,
            flow: Arc::new(CritiqueFlow::new(backend, cache)),
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// 使用 OpenAI 兼容后端
    pub fn from_config(config: Config) -> Self {
        let backend = Arc::new(OpenAiBackend::new(&config));
        logging::log_startup(
            config.max_concurrent_runs,
            &config.primary.model,
            config.enable_audit.then_some(config.audit.model.as_str()),
        );
        Self::new(config, backend, RunRegistry::new())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// 提交文本，返回 Run 编号
    ///
    /// 输入不合法时直接返回错误，不创建 Run。`config` 为 None 时使用编排器配置。
    pub async fn submit(
        &self,
        text: &str,
        requirements: Option<&str>,
        config: Option<Config>,
    ) -> AppResult<String> {
        let config = config.unwrap_or_else(|| self.config.clone());

        let actual = text.chars().count();
        if actual > config.max_input_chars {
            return Err(InputError::TooLong {
                max: config.max_input_chars,
                actual,
            }
            .into());
        }
        if text.trim().is_empty() {
            return Err(InputError::Empty.into());
        }

        let run = Run::new(
            text.to_string(),
            requirements.map(str::to_string),
            config,
        );
        let run_id = run.id.clone();
        let (handle, finished) = RunHandle::new(run);
        self.registry.insert(run_id.clone(), handle.clone()).await;
        info!("[运行 {}] 📥 已提交 ({} 个字符)", run_id, actual);

        let semaphore = self.semaphore.clone();
        let flow = self.flow.clone();
        let id = run_id.clone();
        tokio::spawn(async move {
            let permit = tokio::select! {
                permit = semaphore.acquire_owned() => permit.ok(),
                _ = handle.cancelled() => None,
            };

            let ctx = RunCtx::new(id.clone(), handle.run.clone(), handle.cancel_flag());
            if permit.is_none() || handle.is_cancel_requested() {
                ctx.with_run(|run| run.cancel()).await;
                info!("[运行 {}] ⏹ 排队期间已取消", id);
                let _ = finished.send(true);
                return;
            }

            let task = tokio::spawn({
                let flow = flow.clone();
                let ctx = ctx.clone();
                async move { flow.run(&ctx).await }
            });
            if let Err(e) = task.await {
                error!("[运行 {}] 任务执行失败: {}", id, e);
                ctx.with_run(|run| run.fail(ErrorKind::Internal, format!("任务执行失败: {}", e)))
                    .await;
            }
            drop(permit);
            let _ = finished.send(true);
        });

        Ok(run_id)
    }

    async fn handle(&self, run_id: &str) -> AppResult<RunHandle> {
        self.registry
            .get(run_id)
            .await
            .ok_or_else(|| AppError::run_not_found(run_id))
    }

    /// 查询状态
    pub async fn poll(&self, run_id: &str) -> AppResult<RunStatus> {
        let handle = self.handle(run_id).await?;
        let status = handle.run.lock().await.status();
        Ok(status)
    }

    /// 获取结果
    pub async fn fetch(&self, run_id: &str) -> AppResult<RunOutput> {
        let handle = self.handle(run_id).await?;
        let run = handle.run.lock().await;
        let run_id = run_id.to_string();
        match (&run.state, &run.output) {
            (RunState::Completed, Some(output)) => Ok(output.clone()),
            (RunState::Error { kind, message }, _) => Err(RunError::Failed {
                run_id,
                kind: *kind,
                message: message.clone(),
            }
            .into()),
            (RunState::Cancelled, _) => Err(RunError::Cancelled { run_id }.into()),
            (state, _) => Err(RunError::NotReady {
                run_id,
                state: state.label().to_string(),
            }
            .into()),
        }
    }

    /// 请求取消；已结束的 Run 不受影响
    pub async fn cancel(&self, run_id: &str) -> AppResult<()> {
        let handle = self.handle(run_id).await?;
        if handle.run.lock().await.is_terminal() {
            return Ok(());
        }
        handle.request_cancel();
        info!("[运行 {}] ⏹ 已请求取消", run_id);
        Ok(())
    }

    /// 从注册表移除已结束的 Run
    pub async fn purge(&self, run_id: &str) -> AppResult<()> {
        let handle = self.handle(run_id).await?;
        if !handle.run.lock().await.is_terminal() {
            return Err(RunError::StillActive {
                run_id: run_id.to_string(),
            }
            .into());
        }
        self.registry.remove(run_id).await;
        Ok(())
    }

    /// 等待 Run 结束并返回最终状态
    pub async fn wait(&self, run_id: &str) -> AppResult<RunStatus> {
        let handle = self.handle(run_id).await?;
        handle.finished().await;
        let status = handle.run.lock().await.status();
        Ok(status)
    }
}
