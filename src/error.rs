//! 错误类型
//!
//! 分层结构：`AppError` 汇总各子领域错误；`ErrorKind` 是对外暴露的稳定错误种类，
//! 通过 poll / fetch 返回给调用方。

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 输入校验错误（不会创建 Run）
    #[error("输入错误: {0}")]
    Input(#[from] InputError),
    /// Run 生命周期相关错误
    #[error("运行错误: {0}")]
    Run(#[from] RunError),
    /// LLM 调用错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 缓存 / 归档读写错误
    #[error("缓存错误: {0}")]
    Cache(#[from] CacheError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 输入校验错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    /// 文本超过硬性长度上限
    #[error("输入文本超过 {max} 个字符的上限（实际 {actual} 个字符），请缩短文本")]
    TooLong { max: usize, actual: usize },
    /// 文本去除空白后为空
    #[error("输入文本为空")]
    Empty,
}

/// Run 查询 / 控制错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RunError {
    /// 找不到该 Run
    #[error("找不到运行: {run_id}")]
    NotFound { run_id: String },
    /// Run 尚未完成
    #[error("运行 {run_id} 尚未完成 (当前状态: {state})")]
    NotReady { run_id: String, state: String },
    /// Run 以失败告终
    #[error("运行 {run_id} 失败 [{kind}]: {message}")]
    Failed {
        run_id: String,
        kind: ErrorKind,
        message: String,
    },
    /// Run 已被取消
    #[error("运行 {run_id} 已取消")]
    Cancelled { run_id: String },
    /// 只能清理已结束的 Run
    #[error("运行 {run_id} 仍在进行中，无法清理")]
    StillActive { run_id: String },
}

/// LLM 服务错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LlmError {
    /// 单次调用超时
    #[error("LLM 调用超时 (模型: {model}, {timeout_ms}ms)")]
    Timeout { model: String, timeout_ms: u64 },
    /// 传输层失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    Transport { model: String, message: String },
    /// 请求频率限制
    #[error("LLM 请求频率限制 (模型: {model}): {message}")]
    RateLimited { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 结构化提取全部失败
    #[error("无法从 LLM 响应中提取 JSON (模型: {model}, 响应长度: {response_len})")]
    Unparseable { model: String, response_len: usize },
}

/// 缓存 / 归档错误
#[derive(Debug, Error)]
pub enum CacheError {
    /// 写入失败
    #[error("写入失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 序列化失败
    #[error("序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 对外暴露的稳定错误种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 输入长度 / 空输入
    InputError,
    /// 分析降级（仅作标注，从不致命）
    AnalysisDegraded,
    /// 超时 / 传输 / 限流
    RemoteCallFailure,
    /// 结构化提取失败
    ParseFailure,
    /// 审核阶段失败（从不致命）
    AuditFailure,
    /// 其他内部错误
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputError => "input_error",
            ErrorKind::AnalysisDegraded => "analysis_degraded",
            ErrorKind::RemoteCallFailure => "remote_call_failure",
            ErrorKind::ParseFailure => "parse_failure",
            ErrorKind::AuditFailure => "audit_failure",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LlmError {
    /// 映射为对外错误种类：解析失败单独归类，其余均视为远程调用失败
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Unparseable { .. } => ErrorKind::ParseFailure,
            _ => ErrorKind::RemoteCallFailure,
        }
    }
}

impl AppError {
    /// 对外错误种类
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Input(_) => ErrorKind::InputError,
            AppError::Run(RunError::Failed { kind, .. }) => *kind,
            AppError::Llm(e) => e.kind(),
            _ => ErrorKind::Internal,
        }
    }

    // ========== 便捷构造函数 ==========

    /// 创建 Run 未找到错误
    pub fn run_not_found(run_id: impl Into<String>) -> Self {
        AppError::Run(RunError::NotFound {
            run_id: run_id.into(),
        })
    }

    /// 创建缓存写入错误
    pub fn cache_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Cache(CacheError::WriteFailed {
            path: path.into(),
            source,
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Cache(CacheError::Serialize(err))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_kind_mapping() {
        let timeout = LlmError::Timeout {
            model: "gpt-4o".into(),
            timeout_ms: 10,
        };
        assert_eq!(timeout.kind(), ErrorKind::RemoteCallFailure);

        let parse = LlmError::Unparseable {
            model: "gpt-4o".into(),
            response_len: 3,
        };
        assert_eq!(parse.kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::RemoteCallFailure).unwrap();
        assert_eq!(json, "\"remote_call_failure\"");
        assert_eq!(ErrorKind::AuditFailure.to_string(), "audit_failure");
    }

    #[test]
    fn test_input_error_is_input_kind() {
        let err: AppError = InputError::TooLong {
            max: 8192,
            actual: 9000,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InputError);
        assert!(err.to_string().contains("8192"));
    }
}
