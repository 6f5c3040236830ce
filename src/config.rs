use crate::error::{AppResult, ConfigError};
use crate::utils::logging::redact;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 单个角色（主分析 / 审核）的模型配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// 单次调用超时（毫秒）
    pub timeout_ms: u64,
    /// 失败后的重试次数（不含首次调用）
    pub retries: u32,
    /// 指数退避的基数（毫秒）
    pub backoff_base_ms: u64,
    /// 退避上限（毫秒）
    pub backoff_max_ms: u64,
    /// 强制开启 / 关闭 JSON 模式；None 表示由后端自行判断
    pub json_mode: Option<bool>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.3,
            top_p: 1.0,
            max_tokens: 16384,
            timeout_ms: 120_000,
            retries: 2,
            backoff_base_ms: 1_000,
            backoff_max_ms: 8_000,
            json_mode: None,
        }
    }
}

impl ModelConfig {
    /// 审核角色的默认配置
    pub fn audit_default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 8192,
            timeout_ms: 90_000,
            ..Self::default()
        }
    }
}

/// 启发式分析参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// 代词回指检查向前看的句子数
    pub coreference_window: usize,
    /// n-gram 重复的最小出现次数
    pub ngram_min_count: usize,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            coreference_window: 2,
            ngram_min_count: 3,
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 输入文本的硬性字符上限
    pub max_input_chars: usize,
    /// 叙述报告的软性字符上限
    pub max_report_chars: usize,
    /// 同时执行的 Run 数量
    pub max_concurrent_runs: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub primary: ModelConfig,
    pub audit: ModelConfig,
    pub enable_audit: bool,
    // --- 存储 ---
    pub enable_cache: bool,
    pub cache_dir: String,
    /// 完成的 Run 归档目录；None 表示不归档
    pub runs_dir: Option<String>,
    pub heuristics: HeuristicsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_input_chars: 8192,
            max_report_chars: 65536,
            max_concurrent_runs: 4,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            primary: ModelConfig::default(),
            audit: ModelConfig::audit_default(),
            enable_audit: true,
            enable_cache: false,
            cache_dir: "workspace/cache".to_string(),
            runs_dir: Some("workspace/runs".to_string()),
            heuristics: HeuristicsConfig::default(),
        }
    }
}

impl Config {
    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，再叠加环境变量
    ///
    /// 文件中缺失的字段使用默认值
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: display.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|source| {
            ConfigError::TomlParseFailed {
                path: display,
                source,
            }
        })?;
        Ok(config.with_env_overrides())
    }

    /// 解析 TOML 文本
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// 用 `var` 查到的值覆盖对应字段，查不到或解析失败时保留原值
    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var("MAX_CONCURRENT_RUNS").and_then(|v| v.parse().ok()) {
            self.max_concurrent_runs = v;
        }
        if let Some(v) = var("VERBOSE_LOGGING").and_then(|v| v.parse().ok()) {
            self.verbose_logging = v;
        }
        if let Some(v) = var("ENABLE_AUDIT").and_then(|v| v.parse().ok()) {
            self.enable_audit = v;
        }
        if let Some(v) = var("ENABLE_CACHE").and_then(|v| v.parse().ok()) {
            self.enable_cache = v;
        }
        if let Some(v) = var("LLM_API_KEY") {
            self.llm_api_key = v;
        }
        if let Some(v) = var("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Some(v) = var("PRIMARY_MODEL") {
            self.primary.model = v;
        }
        if let Some(v) = var("AUDIT_MODEL") {
            self.audit.model = v;
        }
        if let Some(v) = var("CACHE_DIR") {
            self.cache_dir = v;
        }
        if let Some(v) = var("RUNS_DIR") {
            self.runs_dir = Some(v);
        }
        self
    }

    /// 用于日志输出的脱敏副本
    pub fn redacted(&self) -> Self {
        Self {
            llm_api_key: redact(&self.llm_api_key, 4),
            ..self.clone()
        }
    }
}
