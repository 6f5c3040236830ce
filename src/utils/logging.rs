/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅器
///
/// `RUST_LOG` 优先；否则默认 `prose_critique=info`，详细模式下为 `debug`。
/// 重复调用是安全的。
pub fn init(verbose: bool) {
    let default_level = if verbose {
        "prose_critique=debug"
    } else {
        "prose_critique=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_concurrent`: 最大并发 Run 数
/// - `primary_model`: 主分析模型
/// - `audit_model`: 审核模型（未启用审核时为 None）
pub fn log_startup(max_concurrent: usize, primary_model: &str, audit_model: Option<&str>) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 文本评析流水线");
    info!("📊 最大并发数: {}", max_concurrent);
    info!("🤖 主分析模型: {}", primary_model);
    match audit_model {
        Some(model) => info!("🔍 审核模型: {}", model),
        None => info!("🔍 审核: 已禁用"),
    }
    info!("{}", "=".repeat(60));
}

/// 记录 Run 开始信息
///
/// # 参数
/// - `run_id`: Run 编号
/// - `char_count`: 输入字符数
/// - `preview`: 文本预览
pub fn log_run_start(run_id: &str, char_count: usize, preview: &str) {
    info!("\n{}", "=".repeat(60));
    info!("[运行 {}] 📝 开始处理 ({} 个字符)", run_id, char_count);
    info!("[运行 {}] 📄 {}", run_id, truncate_text(preview, 60));
    info!("{}", "=".repeat(60));
}

/// 记录阶段切换
pub fn log_stage(run_id: &str, stage: &str, progress: f32) {
    info!(
        "[运行 {}] ▶ 阶段 {} ({:.0}%)",
        run_id,
        stage,
        progress * 100.0
    );
}

/// 记录 Run 完成信息
///
/// # 参数
/// - `run_id`: Run 编号
/// - `duration_secs`: 耗时（秒）
/// - `llm_calls`: LLM 调用次数
/// - `audited`: 是否带有审核结果
pub fn log_run_complete(run_id: &str, duration_secs: f64, llm_calls: usize, audited: bool) {
    info!("\n{}", "─".repeat(60));
    info!(
        "[运行 {}] ✓ 完成: 耗时 {:.1}s, LLM 调用 {} 次, 审核: {}",
        run_id,
        duration_secs,
        llm_calls,
        if audited { "有" } else { "无" }
    );
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() > max_len {
        flat.chars().take(max_len).collect::<String>() + "..."
    } else {
        flat
    }
}

/// 掩码敏感字符串，只保留末尾 `keep` 个字符
pub fn redact(secret: &str, keep: usize) -> String {
    let total = secret.chars().count();
    if total == 0 {
        return String::new();
    }
    if total <= keep {
        return "*".repeat(total);
    }
    let tail: String = secret.chars().skip(total - keep).collect();
    format!("{}{}", "*".repeat(8), tail)
}
