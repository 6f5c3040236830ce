//! # Prose Critique
//!
//! 文本评析流水线：对一段英文或俄文散文做确定性预分析，再由模型给出结构化评析，
//! 并由第二个模型审核评析本身。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有磁盘资源，只暴露读写能力
//! - `FsCache` / `MemoryCache` - 内容寻址的模型响应缓存
//! - `RunArchive` - 已完成 Run 的归档
//!
//! ### ② 客户端层（Clients）
//! - `clients/` - 远程模型调用
//! - `CritiqueBackend` - 后端抽象，`OpenAiBackend` 为默认实现
//! - `CritiqueClient` - 超时、重试、缓存、结构化提取
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 纯函数：语言检测、分句、启发式、评判标准、提示词、报告
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一个 Run"的完整处理流程
//! - `RunCtx` - 上下文封装（阶段切换 + 取消检查）
//! - `CritiqueFlow` - 流程编排（预分析 → 标准 → 主分析 → 审核 → 报告）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/` - Run 注册表、并发控制、submit / poll / fetch / cancel

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{CritiqueBackend, CritiqueClient, OpenAiBackend};
pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind};
pub use models::{RunOutput, RunState, RunStatus, Stage};
pub use orchestrator::{Orchestrator, RunRegistry};
pub use workflow::{CritiqueFlow, RunCtx};
