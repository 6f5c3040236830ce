use anyhow::{bail, Context, Result};
use prose_critique::config::Config;
use prose_critique::models::RunState;
use prose_critique::utils::logging;
use prose_critique::Orchestrator;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// 用法: prose_critique <文本文件> [评判标准文件]
#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = match std::env::var("PROSE_CRITIQUE_CONFIG") {
        Ok(path) => Config::load(&path)?,
        Err(_) => Config::from_env(),
    };

    // 初始化日志
    logging::init(config.verbose_logging);
    info!("配置: {:?}", config.redacted());

    let mut args = std::env::args().skip(1);
    let Some(input_path) = args.next().map(PathBuf::from) else {
        bail!("用法: prose_critique <文本文件> [评判标准文件]");
    };
    let text = tokio::fs::read_to_string(&input_path)
        .await
        .with_context(|| format!("读取输入文件失败: {}", input_path.display()))?;
    let requirements = match args.next() {
        Some(path) => Some(
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("读取评判标准文件失败: {}", path))?,
        ),
        None => None,
    };

    let orchestrator = Orchestrator::from_config(config);
    let run_id = orchestrator
        .submit(&text, requirements.as_deref(), None)
        .await?;

    // 轮询进度
    let mut last_progress = -1.0f32;
    loop {
        let status = orchestrator.poll(&run_id).await?;
        if status.progress > last_progress {
            info!(
                "[运行 {}] 进度 {:.0}% ({})",
                run_id,
                status.progress * 100.0,
                status.state.label()
            );
            last_progress = status.progress;
        }
        if status.state.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let status = orchestrator.wait(&run_id).await?;
    if let RunState::Error { kind, message } = &status.state {
        error!("[运行 {}] ❌ 失败 [{}]: {}", run_id, kind, message);
    }
    let output = orchestrator.fetch(&run_id).await?;

    let (md_path, json_path) = output_paths(&input_path);
    tokio::fs::write(&md_path, &output.narrative_document)
        .await
        .with_context(|| format!("写入报告失败: {}", md_path.display()))?;
    tokio::fs::write(
        &json_path,
        serde_json::to_string_pretty(&output.structured_document)?,
    )
    .await
    .with_context(|| format!("写入结构化结果失败: {}", json_path.display()))?;

    info!("✓ 报告已保存至: {}", md_path.display());
    info!("✓ 结构化结果已保存至: {}", json_path.display());
    Ok(())
}

/// `<stem>.critique.md` 和 `<stem>.critique.json`，与输入文件同目录
fn output_paths(input: &Path) -> (PathBuf, PathBuf) {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "text".to_string());
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    (
        dir.join(format!("{}.critique.md", stem)),
        dir.join(format!("{}.critique.json", stem)),
    )
}
