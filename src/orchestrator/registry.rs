//! Run 注册表
//!
//! 显式的共享状态：由调用方创建并传入编排器，多个编排器可以共用一个注册表

use crate::models::Run;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify, RwLock};

/// 单个 Run 的句柄
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub run: Arc<Mutex<Run>>,
    cancelled: Arc<AtomicBool>,
    wake: Arc<Notify>,
    finished: watch::Receiver<bool>,
}

impl RunHandle {
    /// 返回句柄和结束信号的发送端（由执行任务持有）
    pub fn new(run: Run) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                run: Arc::new(Mutex::new(run)),
                cancelled: Arc::new(AtomicBool::new(false)),
                wake: Arc::new(Notify::new()),
                finished: rx,
            },
            tx,
        )
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// 设置取消标记并唤醒仍在排队的任务
    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 等待取消请求
    pub async fn cancelled(&self) {
        while !self.is_cancel_requested() {
            self.wake.notified().await;
        }
    }

    /// 等待执行任务结束
    pub async fn finished(&self) {
        let mut rx = self.finished.clone();
        // 发送端被丢弃时同样视为结束
        let _ = rx.wait_for(|done| *done).await;
    }
}

/// Run 注册表
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<String, RunHandle>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, run_id: String, handle: RunHandle) {
        self.runs.write().await.insert(run_id, handle);
    }

    pub async fn get(&self, run_id: &str) -> Option<RunHandle> {
        self.runs.read().await.get(run_id).cloned()
    }

    pub async fn remove(&self, run_id: &str) -> Option<RunHandle> {
        self.runs.write().await.remove(run_id)
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 按编号排序的全部 Run 编号
    pub async fn run_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.runs.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_insert_get_remove() {
        let registry = RunRegistry::new();
        let run = Run::new("Text.".into(), None, Config::default());
        let id = run.id.clone();
        let (handle, _tx) = RunHandle::new(run);
        registry.insert(id.clone(), handle).await;

        assert_eq!(registry.len().await, 1);
        assert!(registry.get(&id).await.is_some());
        assert!(registry.get("missing").await.is_none());
        assert!(registry.remove(&id).await.is_some());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let (handle, _tx) = RunHandle::new(Run::new("Text.".into(), None, Config::default()));
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        handle.request_cancel();
        task.await.unwrap();
        assert!(handle.is_cancel_requested());
    }

    #[tokio::test]
    async fn test_finished_signal() {
        let (handle, tx) = RunHandle::new(Run::new("Text.".into(), None, Config::default()));
        tx.send(true).unwrap();
        handle.finished().await;

        let (handle, tx) = RunHandle::new(Run::new("Text.".into(), None, Config::default()));
        drop(tx);
        handle.finished().await;
    }
}
