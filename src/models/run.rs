use super::analysis::DeterministicAnalysis;
use super::audit::AuditResult;
use super::critique::CritiqueResult;
use super::requirements::RequirementSet;
use crate::config::Config;
use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PreAnalysis,
    Requirements,
    PrimaryCritique,
    Audit,
    ReportAssembly,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::PreAnalysis => "pre_analysis",
            Stage::Requirements => "requirements",
            Stage::PrimaryCritique => "primary_critique",
            Stage::Audit => "audit",
            Stage::ReportAssembly => "report_assembly",
        }
    }

    /// 进入该阶段时的进度
    pub fn progress(&self) -> f32 {
        match self {
            Stage::PreAnalysis => 0.10,
            Stage::Requirements => 0.20,
            Stage::PrimaryCritique => 0.30,
            Stage::Audit => 0.60,
            Stage::ReportAssembly => 0.85,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Run 状态机
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// 等待并发许可
    Pending,
    Running { stage: Stage },
    Completed,
    Error { kind: ErrorKind, message: String },
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Error { .. } | RunState::Cancelled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Running { .. } => "running",
            RunState::Completed => "completed",
            RunState::Error { .. } => "error",
            RunState::Cancelled => "cancelled",
        }
    }
}

/// 远程调用角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Primary,
    Audit,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Audit => "audit",
        }
    }
}

/// 单次 LLM 调用尝试的元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmCallMeta {
    pub call_id: String,
    pub role: Role,
    pub model: String,
    /// 从 1 开始；缓存命中时为 0
    pub attempt: u32,
    pub latency_ms: u64,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub cached: bool,
    /// None 表示成功
    pub error: Option<String>,
}

impl LlmCallMeta {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// poll 返回的状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub run_id: String,
    pub state: RunState,
    pub stage: Option<Stage>,
    pub progress: f32,
    pub error: Option<(ErrorKind, String)>,
}

/// fetch 返回的最终产物
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutput {
    /// Markdown 叙述报告
    pub narrative_document: String,
    /// JSON 结构化报告
    pub structured_document: Value,
}

/// 一次完整的评析运行
///
/// 只由持有它的任务修改；进入终态后不再变化
#[derive(Debug, Clone)]
pub struct Run {
    pub id: String,
    pub input_text: String,
    pub input_hash: String,
    /// 调用方提供的原始标准文本
    pub supplied_requirements: Option<String>,
    pub requirements: Option<RequirementSet>,
    pub config: Config,
    pub state: RunState,
    pub progress: f32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub analysis: Option<DeterministicAnalysis>,
    pub critique: Option<CritiqueResult>,
    pub audit: Option<AuditResult>,
    pub audit_note: Option<String>,
    pub llm_calls: Vec<LlmCallMeta>,
    /// 主分析提示词（展示格式）
    pub primary_prompt: Option<String>,
    pub output: Option<RunOutput>,
}

impl Run {
    pub fn new(input_text: String, supplied_requirements: Option<String>, config: Config) -> Self {
        Self {
            id: new_run_id(),
            input_hash: text_hash(&input_text),
            input_text,
            supplied_requirements,
            requirements: None,
            config,
            state: RunState::Pending,
            progress: 0.0,
            created_at: Utc::now(),
            completed_at: None,
            analysis: None,
            critique: None,
            audit: None,
            audit_note: None,
            llm_calls: Vec::new(),
            primary_prompt: None,
            output: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn stage(&self) -> Option<Stage> {
        match self.state {
            RunState::Running { stage } => Some(stage),
            _ => None,
        }
    }

    /// 进入新阶段；进度只增不减
    pub fn advance(&mut self, stage: Stage) {
        if self.is_terminal() {
            return;
        }
        self.state = RunState::Running { stage };
        self.progress = self.progress.max(stage.progress());
    }

    pub fn complete(&mut self, output: RunOutput) {
        if self.is_terminal() {
            return;
        }
        self.output = Some(output);
        self.state = RunState::Completed;
        self.progress = 1.0;
        self.completed_at = Some(Utc::now());
    }

    /// 失败的 Run 不保留任何部分结果
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.discard_results();
        self.state = RunState::Error {
            kind,
            message: message.into(),
        };
        self.completed_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.discard_results();
        self.state = RunState::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    fn discard_results(&mut self) {
        self.critique = None;
        self.audit = None;
        self.output = None;
    }

    /// 从创建到结束（或当前）的耗时
    pub fn duration_ms(&self) -> i64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.created_at).num_milliseconds()
    }

    pub fn status(&self) -> RunStatus {
        let error = match &self.state {
            RunState::Error { kind, message } => Some((*kind, message.clone())),
            _ => None,
        };
        RunStatus {
            run_id: self.id.clone(),
            state: self.state.clone(),
            stage: self.stage(),
            progress: self.progress,
            error,
        }
    }
}

/// 形如 `20260101_120000_1a2b3c4d` 的 Run 编号
pub fn new_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
}

/// 文本 SHA-256 的前 16 个十六进制字符
pub fn text_hash(text: &str) -> String {
    let digest = hex::encode(Sha256::digest(text.as_bytes()));
    digest[..16].to_string()
}
