//! 评析流程 - 流程层
//!
//! 核心职责：定义"一个 Run"的完整处理流程
//!
//! 流程顺序：
//! 1. 确定性预分析
//! 2. 评判标准（调用方提供或自动生成）
//! 3. 主分析（致命）
//! 4. 审核（失败时降级）
//! 5. 报告组装 → 归档

use crate::clients::backend::CritiqueBackend;
use crate::clients::critique_client::{CritiqueClient, Role};
use crate::config::HeuristicsConfig;
use crate::error::ErrorKind;
use crate::infrastructure::{CacheStore, RunArchive};
use crate::models::{
    AuditResult, CritiqueResult, DeterministicAnalysis, Language, RequirementSet, RunState, Stage,
};
use crate::services::analyzer::analyze;
use crate::services::prompts::{
    build_audit_messages, build_primary_messages, format_prompt_for_display,
};
use crate::services::report::{assemble_report, ReportInput};
use crate::services::requirements::resolve_requirements;
use crate::utils::logging;
use crate::workflow::run_ctx::{Halt, RunCtx};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 评析流程
///
/// - 编排完整的单个 Run 处理流程
/// - 决定何时调用模型、何时降级
/// - 不持有 Run 注册表
pub struct CritiqueFlow {
    backend: Arc<dyn CritiqueBackend>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl CritiqueFlow {
    pub fn new(backend: Arc<dyn CritiqueBackend>, cache: Option<Arc<dyn CacheStore>>) -> Self {
        Self { backend, cache }
    }

    /// 执行流程，返回最终状态
    pub async fn run(&self, ctx: &RunCtx) -> RunState {
        match self.execute(ctx).await {
            Ok(()) => {}
            Err(Halt::Cancelled) => {
                warn!("{} ⏹ 已取消，丢弃结果", ctx);
                ctx.settle(Halt::Cancelled).await;
            }
            Err(Halt::Failed { kind, message }) => {
                error!("{} ❌ 失败 [{}]: {}", ctx, kind, message);
                ctx.settle(Halt::Failed { kind, message }).await;
            }
        }
        ctx.with_run(|run| run.state.clone()).await
    }

    async fn execute(&self, ctx: &RunCtx) -> Result<(), Halt> {
        let (text, supplied, config) = ctx
            .with_run(|run| {
                (
                    run.input_text.clone(),
                    run.supplied_requirements.clone(),
                    run.config.clone(),
                )
            })
            .await;
        logging::log_run_start(&ctx.run_id, text.chars().count(), &text);

        let client = CritiqueClient::new(
            self.backend.clone(),
            if config.enable_cache {
                self.cache.clone()
            } else {
                None
            },
        );

        let (analysis, requirements) =
            prepare(ctx, &text, supplied.as_deref(), &config.heuristics).await?;
        let language = analysis.language;

        // ========== 阶段 3: 主分析 ==========
        ctx.enter(Stage::PrimaryCritique).await?;
        let messages = build_primary_messages(&text, &analysis, &requirements);
        let display = format_prompt_for_display(&messages, language);
        ctx.with_run(|run| run.primary_prompt = Some(display)).await;

        let mut calls = Vec::new();
        let outcome = client
            .invoke::<CritiqueResult>(Role::Primary, &messages, &config.primary, &mut calls)
            .await;
        ctx.with_run(|run| run.llm_calls.append(&mut calls)).await;
        ctx.checkpoint()?;

        let critique = outcome.map_err(|e| Halt::Failed {
            kind: e.kind(),
            message: e.to_string(),
        })?;
        info!(
            "{} ✓ 主分析完成: 局部问题 {} 个, 全局问题 {} 个, 总分 {:.1}",
            ctx,
            critique.local_issues.len(),
            critique.global_issues.len(),
            critique.quality_scores.overall
        );

        // ========== 阶段 4: 审核 ==========
        let (audit, audit_note) = if config.enable_audit {
            ctx.enter(Stage::Audit).await?;
            self.audit(ctx, &client, &text, language, &critique, &config.audit)
                .await?
        } else {
            (None, Some(audit_disabled_note(language).to_string()))
        };

        // ========== 阶段 5: 报告 ==========
        ctx.enter(Stage::ReportAssembly).await?;
        let finished_at = Utc::now();
        let (output, llm_call_count) = ctx
            .with_run(|run| {
                let output = assemble_report(&ReportInput {
                    run_id: &run.id,
                    input_hash: &run.input_hash,
                    input_text: &run.input_text,
                    analysis: &analysis,
                    requirements: &requirements,
                    critique: &critique,
                    audit: audit.as_ref(),
                    audit_note: audit_note.as_deref(),
                    primary_prompt: run.primary_prompt.as_deref().unwrap_or_default(),
                    llm_calls: &run.llm_calls,
                    created_at: run.created_at,
                    finished_at,
                    max_report_chars: config.max_report_chars,
                });
                (output, run.llm_calls.len())
            })
            .await;
        ctx.checkpoint()?;

        let structured = output.structured_document.clone();
        let audited = audit.is_some();
        let duration_ms = ctx
            .with_run(|run| {
                run.critique = Some(critique);
                run.audit = audit;
                run.audit_note = audit_note;
                run.complete(output);
                run.duration_ms()
            })
            .await;
        logging::log_run_complete(
            &ctx.run_id,
            duration_ms as f64 / 1000.0,
            llm_call_count,
            audited,
        );

        if let Some(dir) = &config.runs_dir {
            if let Err(e) = RunArchive::new(dir).save(&ctx.run_id, &structured).await {
                warn!("{} ⚠️ 归档失败: {}", ctx, e);
            }
        }

        Ok(())
    }

    /// 审核阶段：失败只降级，取消仍然中断
    async fn audit(
        &self,
        ctx: &RunCtx,
        client: &CritiqueClient,
        text: &str,
        language: Language,
        critique: &CritiqueResult,
        model: &crate::config::ModelConfig,
    ) -> Result<(Option<AuditResult>, Option<String>), Halt> {
        let critique_json = serde_json::to_string_pretty(critique).map_err(|e| Halt::Failed {
            kind: ErrorKind::Internal,
            message: e.to_string(),
        })?;
        let messages = build_audit_messages(text, language, &critique_json);

        let mut calls = Vec::new();
        let outcome = client
            .invoke::<AuditResult>(Role::Audit, &messages, model, &mut calls)
            .await;
        ctx.with_run(|run| run.llm_calls.append(&mut calls)).await;
        ctx.checkpoint()?;

        match outcome {
            Ok(audit) => {
                info!(
                    "{} ✓ 审核完成: {} (置信度 {:.2})",
                    ctx,
                    audit.audit_verdict.as_str(),
                    audit.confidence_score
                );
                Ok((Some(audit), None))
            }
            Err(e) => {
                warn!("{} ⚠️ 审核失败，继续生成报告: {}", ctx, e);
                Ok((
                    None,
                    Some(format!("{} ({}): {}", ErrorKind::AuditFailure, e.kind(), e)),
                ))
            }
        }
    }
}

/// 阶段 1 和 2：确定性预分析与评判标准
///
/// 两者各自在算出后立即写入 Run，之后的任何中断都不会让 Run 缺少它们
async fn prepare(
    ctx: &RunCtx,
    text: &str,
    supplied: Option<&str>,
    heuristics: &HeuristicsConfig,
) -> Result<(DeterministicAnalysis, RequirementSet), Halt> {
    // ========== 阶段 1: 预分析 ==========
    ctx.enter(Stage::PreAnalysis).await?;
    let analysis = analyze(text, heuristics);
    for note in &analysis.degradation_notes {
        warn!("{} ⚠️ 预分析降级: {}", ctx, note);
    }
    ctx.with_run(|run| run.analysis = Some(analysis.clone())).await;

    // ========== 阶段 2: 评判标准 ==========
    ctx.enter(Stage::Requirements).await?;
    let requirements = resolve_requirements(supplied, &analysis, text);
    info!(
        "{} 📋 评判标准 {} 条 ({:?})",
        ctx,
        requirements.len(),
        requirements.origin
    );
    ctx.with_run(|run| run.requirements = Some(requirements.clone())).await;

    Ok((analysis, requirements))
}

fn audit_disabled_note(language: Language) -> &'static str {
    match language {
        Language::English => "Audit disabled by configuration.",
        Language::Russian => "Аудит отключён в настройках.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{RequirementOrigin, Run};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    fn ctx() -> (RunCtx, Arc<AtomicBool>) {
        let run = Run::new(
            "The storm broke over the hills. It lasted all night.".into(),
            None,
            Config::default(),
        );
        let cancelled = Arc::new(AtomicBool::new(false));
        (
            RunCtx::new(run.id.clone(), Arc::new(Mutex::new(run)), cancelled.clone()),
            cancelled,
        )
    }

    #[tokio::test]
    async fn test_prepare_attaches_analysis_and_requirements() {
        let (ctx, _) = ctx();
        let text = ctx.with_run(|run| run.input_text.clone()).await;
        let (analysis, requirements) = prepare(&ctx, &text, None, &HeuristicsConfig::default())
            .await
            .unwrap();

        ctx.with_run(|run| {
            assert_eq!(run.stage(), Some(Stage::Requirements));
            assert_eq!(run.analysis.as_ref(), Some(&analysis));
            assert_eq!(run.requirements.as_ref(), Some(&requirements));
        })
        .await;
        assert_eq!(requirements.origin, RequirementOrigin::Generated);
    }

    #[tokio::test]
    async fn test_prepare_uses_supplied_requirements() {
        let (ctx, _) = ctx();
        let (_, requirements) = prepare(
            &ctx,
            "Short text.",
            Some("Keep it tense\n\nAvoid adverbs"),
            &HeuristicsConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(requirements.origin, RequirementOrigin::Supplied);
        assert_eq!(requirements.criteria, vec!["Keep it tense", "Avoid adverbs"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_attaches_nothing() {
        let (ctx, cancelled) = ctx();
        cancelled.store(true, Ordering::SeqCst);
        let result = prepare(&ctx, "Text.", None, &HeuristicsConfig::default()).await;
        assert_eq!(result.err(), Some(Halt::Cancelled));
        ctx.with_run(|run| {
            assert!(run.analysis.is_none());
            assert!(run.requirements.is_none());
        })
        .await;
    }
}
