//! 报告组装
//!
//! 纯函数：相同的运行产物得到逐字节相同的叙述文档和结构化文档。

use crate::models::{
    AuditResult, CritiqueResult, DeterministicAnalysis, Language, LlmCallMeta, RequirementSet,
    RunOutput,
};
use chrono::{DateTime, Utc};
use serde_json::json;

/// 组装报告所需的全部产物
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub run_id: &'a str,
    pub input_hash: &'a str,
    pub input_text: &'a str,
    pub analysis: &'a DeterministicAnalysis,
    pub requirements: &'a RequirementSet,
    pub critique: &'a CritiqueResult,
    pub audit: Option<&'a AuditResult>,
    pub audit_note: Option<&'a str>,
    /// 展示格式的主分析提示词
    pub primary_prompt: &'a str,
    pub llm_calls: &'a [LlmCallMeta],
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub max_report_chars: usize,
}

/// 组装叙述文档（Markdown）和结构化文档（JSON）
pub fn assemble_report(input: &ReportInput<'_>) -> RunOutput {
    let language = input.analysis.language;
    let blocks = vec![
        overview_block(input),
        outline_block(input.critique, language),
        local_issues_block(input.critique, language),
        global_issues_block(input.critique, language),
        scores_block(input.critique, language),
        cliches_block(input.critique, language),
        reader_questions_block(input.critique, language),
        suggestions_block(input.critique, language),
        strengths_block(input.critique, language),
        audit_block(input.audit, input.audit_note, language),
        input_text_block(input.input_text, language),
        prompt_block(input.primary_prompt, language),
        llm_calls_block(input.llm_calls, language),
    ];

    let marker = truncation_marker(input.max_report_chars, language);
    let narrative_document = cap_blocks(&blocks, input.max_report_chars, &marker);

    RunOutput {
        narrative_document,
        structured_document: structured_document(input),
    }
}

fn pick(language: Language, en: &'static str, ru: &'static str) -> &'static str {
    match language {
        Language::English => en,
        Language::Russian => ru,
    }
}

fn structured_document(input: &ReportInput<'_>) -> serde_json::Value {
    json!({
        "analysis": input.analysis,
        "requirements": input.requirements,
        "critique": input.critique,
        "audit": input.audit,
        "audit_note": input.audit_note,
        "metadata": {
            "run_id": input.run_id,
            "input_hash": input.input_hash,
            "language": input.analysis.language.code(),
            "created_at": input.created_at.to_rfc3339(),
            "completed_at": input.finished_at.to_rfc3339(),
            "duration_ms": (input.finished_at - input.created_at).num_milliseconds(),
            "llm_calls": input.llm_calls,
        },
    })
}

fn overview_block(input: &ReportInput<'_>) -> String {
    let lang = input.analysis.language;
    let overview = &input.critique.text_overview;
    let analysis = input.analysis;
    let r = &analysis.readability;

    let mut lines = vec![
        format!(
            "# {}",
            pick(lang, "Prose Critique Report", "Критический разбор текста")
        ),
        String::new(),
        format!("- {}: `{}`", pick(lang, "Run", "Запуск"), input.run_id),
        format!("- {}: `{}`", pick(lang, "Text hash", "Хеш текста"), input.input_hash),
        format!("- {}: {}", pick(lang, "Language", "Язык"), lang.name()),
        String::new(),
        format!("## {}", pick(lang, "Overview", "Обзор")),
        String::new(),
        format!("- {}: {}", pick(lang, "Genre", "Жанр"), overview.genre_guess),
        format!("- {}: {}", pick(lang, "Tone", "Тон"), overview.tone),
        format!(
            "- {}: {}",
            pick(lang, "Audience", "Аудитория"),
            overview.apparent_audience
        ),
    ];
    if !input.critique.summary.is_empty() {
        lines.push(String::new());
        lines.push(input.critique.summary.clone());
    }

    lines.push(String::new());
    lines.push(format!(
        "### {}",
        pick(lang, "Pre-analysis metrics", "Метрики предварительного анализа")
    ));
    lines.push(String::new());
    lines.push(format!(
        "- {}: {} / {} / {} / {}",
        pick(
            lang,
            "Paragraphs / sentences / words / characters",
            "Абзацы / предложения / слова / символы"
        ),
        analysis.paragraph_count,
        analysis.sentence_count,
        analysis.word_count,
        analysis.char_count
    ));
    lines.push(format!(
        "- {}: {:.1}",
        pick(lang, "Average sentence length", "Средняя длина предложения"),
        r.avg_sentence_length
    ));
    lines.push(format!(
        "- {}: {} ({}: {})",
        pick(lang, "Long sentences", "Длинные предложения"),
        r.long_sentence_count,
        pick(lang, "very long", "очень длинные"),
        r.very_long_sentence_count
    ));
    lines.push(format!(
        "- {}: {:.4}",
        pick(lang, "Vocabulary richness", "Богатство словаря"),
        r.vocabulary_richness
    ));
    if let Some(flesch) = r.flesch_reading_ease {
        lines.push(format!("- Flesch Reading Ease: {:.1}", flesch));
    }
    lines.push(format!(
        "- {}: {}",
        pick(lang, "Repeated phrases", "Повторяющиеся фразы"),
        analysis.ngram_repetitions.len() + analysis.word_repetitions.len()
    ));
    lines.push(format!(
        "- {}: {}",
        pick(lang, "Pronoun reference flags", "Отметки о местоимениях"),
        analysis.coreference_flags.len()
    ));
    lines.push(format!(
        "- {}: {}",
        pick(lang, "Dangling modifier flags", "Отметки о висячих оборотах"),
        analysis.dangling_modifier_flags.len()
    ));
    for note in &analysis.degradation_notes {
        lines.push(format!("- {}: {}", pick(lang, "Note", "Примечание"), note));
    }

    lines.push(String::new());
    lines.push(format!(
        "### {} ({})",
        pick(lang, "Evaluation criteria", "Критерии оценки"),
        match input.requirements.origin {
            crate::models::RequirementOrigin::Supplied => pick(lang, "supplied", "заданы автором"),
            crate::models::RequirementOrigin::Generated => {
                pick(lang, "generated", "сгенерированы")
            }
        }
    ));
    lines.push(String::new());
    lines.push(input.requirements.to_prompt_text());

    lines.join("\n")
}

fn outline_block(critique: &CritiqueResult, lang: Language) -> String {
    let mut out = format!("## {}", pick(lang, "Structure", "Структура"));
    if critique.structural_outline.is_empty() {
        out.push_str(&format!(
            "\n\n_{}_",
            pick(lang, "No structural notes.", "Нет заметок о структуре.")
        ));
        return out;
    }
    out.push('\n');
    for item in &critique.structural_outline {
        out.push_str(&format!(
            "\n- ¶{}: **{}**. {}",
            item.paragraph_index, item.intent, item.summary
        ));
    }
    out
}

fn local_issues_block(critique: &CritiqueResult, lang: Language) -> String {
    let mut out = format!("## {}", pick(lang, "Local issues", "Локальные проблемы"));
    if critique.local_issues.is_empty() {
        out.push_str(&format!(
            "\n\n_{}_",
            pick(lang, "No local issues reported.", "Локальных проблем не найдено.")
        ));
        return out;
    }
    for issue in &critique.local_issues {
        out.push_str(&format!(
            "\n\n### {} {} · ¶{} · {}",
            issue.severity.icon(),
            issue.severity.as_str(),
            issue.paragraph_index,
            issue.issue_type
        ));
        if !issue.sentence.is_empty() {
            out.push_str(&format!("\n\n> {}", issue.sentence));
        }
        out.push_str(&format!("\n\n{}", issue.description));
        if !issue.suggestion.is_empty() {
            out.push_str(&format!(
                "\n\n*{}:* {}",
                pick(lang, "Direction", "Направление"),
                issue.suggestion
            ));
        }
    }
    out
}

fn global_issues_block(critique: &CritiqueResult, lang: Language) -> String {
    let mut out = format!("## {}", pick(lang, "Global issues", "Глобальные проблемы"));
    if critique.global_issues.is_empty() {
        out.push_str(&format!(
            "\n\n_{}_",
            pick(lang, "No global issues reported.", "Глобальных проблем не найдено.")
        ));
        return out;
    }
    for issue in &critique.global_issues {
        out.push_str(&format!(
            "\n\n### {} {} · {}\n\n{}",
            issue.severity.icon(),
            issue.severity.as_str(),
            issue.category.as_str(),
            issue.description
        ));
        if !issue.evidence.is_empty() {
            out.push_str(&format!("\n\n> {}", issue.evidence));
        }
    }
    out
}

/// 十格进度条，如 `[=======---]`
fn score_bar(score: f64) -> String {
    let filled = score.round().clamp(0.0, 10.0) as usize;
    format!("[{}{}]", "=".repeat(filled), "-".repeat(10 - filled))
}

fn scores_block(critique: &CritiqueResult, lang: Language) -> String {
    let mut lines = vec![
        format!("## {}", pick(lang, "Scores", "Оценки")),
        String::new(),
        format!(
            "| {} | {} | |",
            pick(lang, "Dimension", "Измерение"),
            pick(lang, "Score", "Оценка")
        ),
        "| --- | --- | --- |".to_string(),
    ];
    for (name, score) in critique.quality_scores.entries() {
        lines.push(format!("| {} | {:.1} | `{}` |", name, score, score_bar(score)));
    }
    lines.join("\n")
}

fn cliches_block(critique: &CritiqueResult, lang: Language) -> String {
    let mut out = format!("## {}", pick(lang, "Clichés", "Клише"));
    if critique.cliche_detection.is_empty() {
        out.push_str(&format!(
            "\n\n_{}_",
            pick(lang, "No clichés detected.", "Клише не обнаружены.")
        ));
        return out;
    }
    out.push('\n');
    for item in &critique.cliche_detection {
        out.push_str(&format!("\n- \"{}\" ({})", item.phrase, item.location));
        if !item.suggestion.is_empty() {
            out.push_str(&format!(": {}", item.suggestion));
        }
    }
    out
}

fn reader_questions_block(critique: &CritiqueResult, lang: Language) -> String {
    let mut out = format!("## {}", pick(lang, "Reader questions", "Вопросы читателя"));
    if critique.reader_questions.is_empty() {
        out.push_str(&format!(
            "\n\n_{}_",
            pick(lang, "No open reader questions.", "Вопросов читателя нет.")
        ));
        return out;
    }
    out.push('\n');
    for item in &critique.reader_questions {
        out.push_str(&format!(
            "\n- [{}] {} ({})",
            item.question_type.as_str(),
            item.question,
            item.location
        ));
    }
    out
}

fn suggestions_block(critique: &CritiqueResult, lang: Language) -> String {
    let mut out = format!(
        "## {}",
        pick(lang, "Improvement directions", "Направления улучшения")
    );
    if critique.improvement_suggestions.is_empty() {
        out.push_str(&format!(
            "\n\n_{}_",
            pick(lang, "No suggestions.", "Рекомендаций нет.")
        ));
        return out;
    }
    out.push('\n');
    for item in &critique.improvement_suggestions {
        out.push_str(&format!(
            "\n- {} **{}**: {}",
            item.priority.icon(),
            item.category,
            item.suggestion
        ));
    }
    out
}

fn strengths_block(critique: &CritiqueResult, lang: Language) -> String {
    let mut out = format!("## {}", pick(lang, "Strengths", "Сильные стороны"));
    if critique.strengths.is_empty() {
        out.push_str(&format!(
            "\n\n_{}_",
            pick(lang, "None listed.", "Не указаны.")
        ));
        return out;
    }
    out.push('\n');
    for strength in &critique.strengths {
        out.push_str(&format!("\n- {}", strength));
    }
    out
}

fn audit_block(audit: Option<&AuditResult>, note: Option<&str>, lang: Language) -> String {
    let mut out = format!("## {}", pick(lang, "Audit", "Аудит"));
    let audit = match audit {
        Some(audit) => audit,
        None => {
            out.push_str(&format!(
                "\n\n**{}**",
                pick(lang, "Audit unavailable.", "Аудит недоступен.")
            ));
            if let Some(note) = note {
                out.push(' ');
                out.push_str(note);
            }
            return out;
        }
    };

    out.push_str(&format!(
        "\n\n- {}: {}\n- {}: {:.2}",
        pick(lang, "Verdict", "Вердикт"),
        audit.audit_verdict.as_str(),
        pick(lang, "Confidence", "Уверенность"),
        audit.confidence_score
    ));
    if !audit.summary.is_empty() {
        out.push_str(&format!("\n\n{}", audit.summary));
    }

    if !audit.disagreements.is_empty() {
        out.push_str(&format!(
            "\n\n### {}\n",
            pick(lang, "Disagreements", "Разногласия")
        ));
        for item in &audit.disagreements {
            out.push_str(&format!(
                "\n- {} \"{}\": {}",
                item.severity.icon(),
                item.claim,
                item.issue
            ));
            if !item.evidence.is_empty() {
                out.push_str(&format!(" (> {})", item.evidence));
            }
        }
    }
    if !audit.missed_issues.is_empty() {
        out.push_str(&format!(
            "\n\n### {}\n",
            pick(lang, "Missed issues", "Пропущенные проблемы")
        ));
        for item in &audit.missed_issues {
            out.push_str(&format!("\n- {} {}", item.severity.icon(), item.description));
            if !item.evidence.is_empty() {
                out.push_str(&format!(" (> {})", item.evidence));
            }
        }
    }
    if !audit.hallucinations.is_empty() {
        out.push_str(&format!(
            "\n\n### {}\n",
            pick(lang, "Hallucinations", "Галлюцинации")
        ));
        for item in &audit.hallucinations {
            out.push_str(&format!("\n- \"{}\": {}", item.claim, item.why_hallucinated));
        }
    }
    if !audit.weak_critiques.is_empty() {
        out.push_str(&format!(
            "\n\n### {}\n",
            pick(lang, "Weak points", "Слабые места разбора")
        ));
        for item in &audit.weak_critiques {
            out.push_str(&format!("\n- \"{}\": {}", item.claim, item.why_weak));
        }
    }
    out
}

fn input_text_block(text: &str, lang: Language) -> String {
    format!(
        "## {}\n\n```text\n{}\n```",
        pick(lang, "Input text", "Исходный текст"),
        text
    )
}

fn prompt_block(prompt: &str, lang: Language) -> String {
    format!(
        "## {}\n\n```text\n{}\n```",
        pick(lang, "Primary prompt", "Основной промпт"),
        prompt
    )
}

fn llm_calls_block(calls: &[LlmCallMeta], lang: Language) -> String {
    let mut lines = vec![
        format!("## {}", pick(lang, "Model calls", "Вызовы моделей")),
        String::new(),
        "| # | role | model | attempt | latency_ms | tokens in/out | cached | error |".to_string(),
        "| --- | --- | --- | --- | --- | --- | --- | --- |".to_string(),
    ];
    for (i, call) in calls.iter().enumerate() {
        let tokens = match (call.input_tokens, call.output_tokens) {
            (Some(input), Some(output)) => format!("{}/{}", input, output),
            _ => "-".to_string(),
        };
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            i + 1,
            call.role.as_str(),
            call.model,
            call.attempt,
            call.latency_ms,
            tokens,
            if call.cached { "yes" } else { "no" },
            call.error.as_deref().unwrap_or("")
        ));
    }
    lines.join("\n")
}

fn truncation_marker(max_chars: usize, lang: Language) -> String {
    match lang {
        Language::English => format!(
            "\n\n---\n\n*[Report truncated: exceeded {} characters]*",
            max_chars
        ),
        Language::Russian => format!(
            "\n\n---\n\n*[Отчёт обрезан: превышен лимит {} символов]*",
            max_chars
        ),
    }
}

/// 按上限拼接块
///
/// 放不下的块在能容纳的最后一个段落边界处截断，随后追加截断标记，其余块丢弃
fn cap_blocks(blocks: &[String], max_chars: usize, marker: &str) -> String {
    let full = blocks.join("\n\n");
    if full.chars().count() <= max_chars {
        return full;
    }

    let budget = max_chars.saturating_sub(marker.chars().count());
    let mut out = String::new();
    let mut used = 0;
    for block in blocks {
        let sep = if out.is_empty() { 0 } else { 2 };
        let len = block.chars().count();
        if used + sep + len <= budget {
            if sep > 0 {
                out.push_str("\n\n");
            }
            out.push_str(block);
            used += sep + len;
            continue;
        }

        let remaining = budget.saturating_sub(used + sep);
        if let Some(prefix) = fitting_prefix(block, remaining) {
            if sep > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&prefix);
        }
        break;
    }
    out.push_str(marker);
    out
}

const FENCE: &str = "```";
const FENCE_CLOSE: &str = "\n```";

/// 块内能放进 `max_chars` 的最长段落前缀
///
/// 截断点落在代码块内部时补上闭合围栏，围栏长度计入上限
fn fitting_prefix(block: &str, max_chars: usize) -> Option<String> {
    let close_len = FENCE_CLOSE.chars().count();
    block
        .match_indices("\n\n")
        .map(|(idx, _)| {
            let prefix = &block[..idx];
            if prefix.matches(FENCE).count() % 2 == 1 {
                (prefix, prefix.chars().count() + close_len, true)
            } else {
                (prefix, prefix.chars().count(), false)
            }
        })
        .filter(|(_, len, _)| *len <= max_chars)
        .last()
        .map(|(prefix, _, open)| {
            if open {
                format!("{}{}", prefix, FENCE_CLOSE)
            } else {
                prefix.to_string()
            }
        })
}
