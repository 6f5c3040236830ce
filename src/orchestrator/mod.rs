//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责 Run 的登记、并发调度和对外查询，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `registry` - Run 注册表
//! - 显式共享状态，由调用方创建后传入
//! - 每个 Run 一个句柄：Run 本身、取消标记、结束信号
//!
//! ### `run_manager` - 编排器
//! - 输入校验（长度 / 空文本）
//! - 控制并发数量（Semaphore）
//! - submit / poll / fetch / cancel / purge / wait
//!
//! ## 层次关系
//!
//! ```text
//! run_manager (处理多个 Run)
//!     ↓
//! workflow::CritiqueFlow (处理单个 Run)
//!     ↓
//! services (能力层：预分析 / 标准 / 提示词 / 报告)
//!     ↓
//! clients + infrastructure (模型调用、缓存、归档)
//! ```

pub mod registry;
pub mod run_manager;

pub use registry::{RunHandle, RunRegistry};
pub use run_manager::Orchestrator;
