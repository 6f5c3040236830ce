//! Run 处理上下文
//!
//! 封装"我正在处理哪个 Run"以及对它的受控修改

use crate::error::ErrorKind;
use crate::models::{Run, Stage};
use crate::utils::logging;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 流程中断原因
#[derive(Debug, Clone, PartialEq)]
pub enum Halt {
    /// 调用方请求取消
    Cancelled,
    /// 致命失败
    Failed { kind: ErrorKind, message: String },
}

/// Run 处理上下文
///
/// 只有持有该上下文的任务会修改 Run；外部只能设置取消标记
#[derive(Debug, Clone)]
pub struct RunCtx {
    pub run_id: String,
    run: Arc<Mutex<Run>>,
    cancelled: Arc<AtomicBool>,
}

impl RunCtx {
    pub fn new(run_id: String, run: Arc<Mutex<Run>>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            run_id,
            run,
            cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 取消检查点
    pub fn checkpoint(&self) -> Result<(), Halt> {
        if self.is_cancelled() {
            Err(Halt::Cancelled)
        } else {
            Ok(())
        }
    }

    /// 进入新阶段（先检查取消）
    pub async fn enter(&self, stage: Stage) -> Result<(), Halt> {
        self.checkpoint()?;
        let progress = self
            .with_run(|run| {
                run.advance(stage);
                run.progress
            })
            .await;
        logging::log_stage(&self.run_id, stage.label(), progress);
        Ok(())
    }

    /// 在锁内修改 Run
    pub async fn with_run<R>(&self, f: impl FnOnce(&mut Run) -> R) -> R {
        let mut run = self.run.lock().await;
        f(&mut run)
    }

    /// 把中断原因落到 Run 上
    pub async fn settle(&self, halt: Halt) {
        self.with_run(|run| match halt {
            Halt::Cancelled => run.cancel(),
            Halt::Failed { kind, message } => run.fail(kind, message),
        })
        .await;
    }
}

impl Display for RunCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[运行 {}]", self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::RunState;

    fn ctx() -> (RunCtx, Arc<AtomicBool>) {
        let run = Run::new("Some text.".into(), None, Config::default());
        let cancelled = Arc::new(AtomicBool::new(false));
        (
            RunCtx::new(run.id.clone(), Arc::new(Mutex::new(run)), cancelled.clone()),
            cancelled,
        )
    }

    #[tokio::test]
    async fn test_enter_advances_stage() {
        let (ctx, _) = ctx();
        ctx.enter(Stage::Requirements).await.unwrap();
        let status = ctx.with_run(|run| run.status()).await;
        assert_eq!(status.stage, Some(Stage::Requirements));
        assert!((status.progress - 0.20).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_enter_refuses_after_cancel() {
        let (ctx, cancelled) = ctx();
        cancelled.store(true, Ordering::SeqCst);
        assert_eq!(ctx.enter(Stage::PreAnalysis).await, Err(Halt::Cancelled));
        ctx.settle(Halt::Cancelled).await;
        let state = ctx.with_run(|run| run.state.clone()).await;
        assert_eq!(state, RunState::Cancelled);
    }

    #[test]
    fn test_display() {
        let (ctx, _) = ctx();
        assert!(ctx.to_string().starts_with("[运行 "));
    }
}
