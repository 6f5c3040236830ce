//! 提示词构建（英文 / 俄文）
//!
//! 提示词语言跟随检测到的文本语言。主分析提示词同时以展示格式写入报告，
//! 因此所有构建函数都必须是确定性的。

use crate::clients::backend::{ChatMessage, MessageRole};
use crate::models::{DeterministicAnalysis, Language, RequirementOrigin, RequirementSet};

/// 主分析输出结构
pub const PRIMARY_OUTPUT_SCHEMA: &str = r#"{
  "text_overview": {
    "genre_guess": "<string>",
    "tone": "<string>",
    "apparent_audience": "<string>",
    "language": "<string>",
    "word_count": "<int>",
    "paragraph_count": "<int>"
  },
  "structural_outline": [
    {"paragraph_index": 0, "intent": "<string>", "summary": "<string>"}
  ],
  "local_issues": [
    {
      "paragraph_index": 0,
      "sentence": "<exact quote>",
      "issue_type": "<grammar|style|clarity|logic|word_choice|punctuation|redundancy|other>",
      "severity": "<minor|moderate|major|critical>",
      "description": "<explanation>",
      "suggestion": "<direction, not a rewrite>"
    }
  ],
  "global_issues": [
    {
      "category": "<logic|pacing|voice|pov_consistency|character_consistency|contradictions|tone|other>",
      "severity": "<minor|moderate|major|critical>",
      "description": "<explanation>",
      "evidence": "<quote or reference>"
    }
  ],
  "quality_scores": {
    "clarity": "<0.0-10.0>",
    "conciseness": "<0.0-10.0>",
    "vividness": "<0.0-10.0>",
    "originality": "<0.0-10.0>",
    "coherence": "<0.0-10.0>",
    "engagement": "<0.0-10.0>",
    "overall": "<0.0-10.0>"
  },
  "cliche_detection": [
    {"phrase": "<phrase>", "location": "<paragraph N, sentence M>", "suggestion": "<direction>"}
  ],
  "reader_questions": [
    {
      "question": "<what is unclear>",
      "location": "<paragraph N, sentence M>",
      "type": "<unclear_reference|missing_antecedent|undefined_term|logical_gap>"
    }
  ],
  "improvement_suggestions": [
    {"category": "<string>", "suggestion": "<string>", "priority": "<minor|moderate|major|critical>"}
  ],
  "strengths": ["<string>"],
  "summary": "<overall summary of the critique>"
}"#;

/// 审核输出结构
pub const AUDIT_OUTPUT_SCHEMA: &str = r#"{
  "audit_verdict": "<agree|mostly_agree|mixed|mostly_disagree|disagree>",
  "confidence_score": "<0.0-1.0>",
  "disagreements": [
    {
      "claim": "<claim made by the critique>",
      "issue": "<what is wrong with it>",
      "evidence": "<quote from the original text>",
      "severity": "<minor|moderate|major|critical>"
    }
  ],
  "missed_issues": [
    {
      "description": "<issue the critique did not mention>",
      "evidence": "<quote from the original text>",
      "severity": "<minor|moderate|major|critical>"
    }
  ],
  "hallucinations": [
    {"claim": "<claim with no basis in the text>", "why_hallucinated": "<explanation>"}
  ],
  "weak_critiques": [
    {"claim": "<vague or generic claim>", "why_weak": "<explanation>"}
  ],
  "summary": "<overall assessment of the critique>"
}"#;

const SYSTEM_PRIMARY_EN: &str = "You are a senior literary editor and prose critic.
Your job is to write a detailed, structured critique of the text you are given.

Rules:
1. Never rewrite or correct the text. Analyze and critique only.
2. Support every claim with a short quote from the text.
3. Be specific. Generic praise and generic complaints are useless to the author.
4. Score honestly. Most competent texts land between 4 and 7.
5. Collect reader questions: places where a first-time reader cannot tell who is meant, what a term means or why something happens.
6. Look for clichés, tautologies and stock phrasing.
7. Check logic, pacing, voice, point of view and character consistency.
8. Point out contradictions and pronouns without a clear antecedent.
9. Phrase improvement suggestions as short directions, never as replacement text.
10. If evaluation criteria are given, address every one of them explicitly; earlier criteria matter more.
11. Respond with a single JSON object that follows the schema. No prose before or after it and no code fences.";

const SYSTEM_PRIMARY_RU: &str = "Вы опытный литературный редактор и критик прозы.
Ваша задача: написать подробный структурированный разбор присланного текста.

Правила:
1. Никогда не переписывайте и не исправляйте текст. Только анализ и критика.
2. Подкрепляйте каждое утверждение короткой цитатой из текста.
3. Будьте конкретны. Общие похвалы и общие претензии автору бесполезны.
4. Оценивайте честно. Большинство добротных текстов получают от 4 до 7.
5. Собирайте вопросы читателя: места, где при первом чтении непонятно, о ком речь, что значит термин или почему что-то происходит.
6. Ищите клише, тавтологии и штампы.
7. Проверьте логику, темп, голос, точку зрения и последовательность персонажей.
8. Отмечайте противоречия и местоимения без ясного антецедента.
9. Формулируйте рекомендации как короткие указания, а не как готовый текст.
10. Если даны критерии оценки, разберите каждый явно; более ранние критерии важнее.
11. Ответьте одним JSON-объектом по схеме. Без текста до или после и без блоков кода.";

const SYSTEM_AUDIT_EN: &str = "You are an adversarial reviewer auditing a literary critique written by another model.

Your tasks:
1. Check every factual claim in the critique against the original text.
2. Report hallucinations: claims about the text that are false.
3. Report issues the critique missed.
4. Flag vague critique points that lack evidence.
5. Confirm that every quote in the critique actually appears in the text.
6. Judge whether the scores match the issues found.
7. Give a confidence score between 0.0 and 1.0 for your own audit.
8. Respond with a single JSON object that follows the schema. No prose before or after it and no code fences.";

const SYSTEM_AUDIT_RU: &str = "Вы придирчивый рецензент, проверяющий литературный разбор, написанный другой моделью.

Ваши задачи:
1. Сверить каждое фактическое утверждение разбора с исходным текстом.
2. Указать галлюцинации: ложные утверждения о тексте.
3. Указать проблемы, которые разбор пропустил.
4. Отметить расплывчатые пункты без доказательств.
5. Убедиться, что каждая цитата в разборе действительно есть в тексте.
6. Оценить, соответствуют ли оценки найденным проблемам.
7. Дать оценку уверенности в собственном аудите от 0.0 до 1.0.
8. Ответьте одним JSON-объектом по схеме. Без текста до или после и без блоков кода.";

struct PrimaryLabels {
    intro: &'static str,
    text_open: &'static str,
    text_close: &'static str,
    supplied_open: &'static str,
    generated_open: &'static str,
    criteria_close: &'static str,
    analysis_open: &'static str,
    analysis_close: &'static str,
    schema_intro: &'static str,
    reminder: &'static str,
}

const PRIMARY_EN: PrimaryLabels = PrimaryLabels {
    intro: "Critique the following prose text.",
    text_open: "--- TEXT ---",
    text_close: "--- END TEXT ---",
    supplied_open: "--- AUTHOR REQUIREMENTS ---",
    generated_open: "--- EVALUATION CRITERIA (generated from pre-analysis) ---",
    criteria_close: "--- END CRITERIA ---",
    analysis_open: "--- PRE-ANALYSIS (deterministic, for reference; flags are hints, not verdicts) ---",
    analysis_close: "--- END PRE-ANALYSIS ---",
    schema_intro: "Return the critique as one JSON object with this schema:",
    reminder: "Quote short spans as evidence. Reference a paragraph index for every local issue. Score each dimension from 0 to 10.",
};

const PRIMARY_RU: PrimaryLabels = PrimaryLabels {
    intro: "Составьте критический разбор следующего прозаического текста.",
    text_open: "--- ТЕКСТ ---",
    text_close: "--- КОНЕЦ ТЕКСТА ---",
    supplied_open: "--- ТРЕБОВАНИЯ АВТОРА ---",
    generated_open: "--- КРИТЕРИИ ОЦЕНКИ (по результатам предварительного анализа) ---",
    criteria_close: "--- КОНЕЦ КРИТЕРИЕВ ---",
    analysis_open: "--- ПРЕДВАРИТЕЛЬНЫЙ АНАЛИЗ (детерминированный, для справки; отметки являются подсказками, а не выводами) ---",
    analysis_close: "--- КОНЕЦ ПРЕДВАРИТЕЛЬНОГО АНАЛИЗА ---",
    schema_intro: "Верните разбор одним JSON-объектом по схеме:",
    reminder: "Приводите короткие цитаты как доказательства. Для каждой локальной проблемы указывайте индекс абзаца. Оценивайте каждое измерение от 0 до 10.",
};

/// 构建主分析消息
pub fn build_primary_messages(
    text: &str,
    analysis: &DeterministicAnalysis,
    requirements: &RequirementSet,
) -> Vec<ChatMessage> {
    let (system, labels) = match analysis.language {
        Language::English => (SYSTEM_PRIMARY_EN, &PRIMARY_EN),
        Language::Russian => (SYSTEM_PRIMARY_RU, &PRIMARY_RU),
    };

    let criteria_open = match requirements.origin {
        RequirementOrigin::Supplied => labels.supplied_open,
        RequirementOrigin::Generated => labels.generated_open,
    };

    let user = [
        labels.intro.to_string(),
        String::new(),
        labels.text_open.to_string(),
        text.to_string(),
        labels.text_close.to_string(),
        String::new(),
        criteria_open.to_string(),
        requirements.to_prompt_text(),
        labels.criteria_close.to_string(),
        String::new(),
        labels.analysis_open.to_string(),
        deterministic_summary(analysis),
        labels.analysis_close.to_string(),
        String::new(),
        labels.schema_intro.to_string(),
        PRIMARY_OUTPUT_SCHEMA.to_string(),
        String::new(),
        labels.reminder.to_string(),
    ]
    .join("\n");

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// 构建审核消息
pub fn build_audit_messages(text: &str, language: Language, critique_json: &str) -> Vec<ChatMessage> {
    let (system, user) = match language {
        Language::English => (
            SYSTEM_AUDIT_EN,
            format!(
                "Audit the critique below against the original text.\n\n--- ORIGINAL TEXT ---\n{}\n--- END ORIGINAL TEXT ---\n\n--- CRITIQUE ---\n{}\n--- END CRITIQUE ---\n\nReturn the audit as one JSON object with this schema:\n{}\n\nIf the critique is excellent, say so, but keep looking for problems.",
                text, critique_json, AUDIT_OUTPUT_SCHEMA
            ),
        ),
        Language::Russian => (
            SYSTEM_AUDIT_RU,
            format!(
                "Проверьте разбор ниже, сверяя его с исходным текстом.\n\n--- ИСХОДНЫЙ ТЕКСТ ---\n{}\n--- КОНЕЦ ИСХОДНОГО ТЕКСТА ---\n\n--- РАЗБОР ---\n{}\n--- КОНЕЦ РАЗБОРА ---\n\nВерните аудит одним JSON-объектом по схеме:\n{}\n\nЕсли разбор отличный, скажите об этом, но всё равно ищите проблемы.",
                text, critique_json, AUDIT_OUTPUT_SCHEMA
            ),
        ),
    };
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// 以可读形式展示完整提示词（写入报告）
pub fn format_prompt_for_display(messages: &[ChatMessage], language: Language) -> String {
    let (system_header, user_header) = match language {
        Language::English => ("=== SYSTEM PROMPT ===", "=== USER PROMPT ==="),
        Language::Russian => ("=== СИСТЕМНЫЙ ПРОМПТ ===", "=== ПОЛЬЗОВАТЕЛЬСКИЙ ПРОМПТ ==="),
    };
    messages
        .iter()
        .map(|m| {
            let header = match m.role {
                MessageRole::System => system_header,
                MessageRole::User => user_header,
            };
            format!("{}\n\n{}", header, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 预分析摘要（嵌入主分析提示词）
pub fn deterministic_summary(analysis: &DeterministicAnalysis) -> String {
    let ru = analysis.language.is_russian();
    let r = &analysis.readability;
    let mut lines = Vec::new();

    if ru {
        lines.push(format!(
            "Язык: {} (уверенность: {:.2})",
            analysis.language, analysis.language_confidence
        ));
        lines.push(format!(
            "Абзацев: {}, предложений: {}, слов: {}, символов: {}",
            analysis.paragraph_count,
            analysis.sentence_count,
            analysis.word_count,
            analysis.char_count
        ));
        lines.push(String::new());
        lines.push("Читаемость:".to_string());
        lines.push(format!("  Средняя длина предложения: {:.1} слов", r.avg_sentence_length));
        lines.push(format!("  Длинных предложений (>25 слов): {}", r.long_sentence_count));
        lines.push(format!(
            "  Очень длинных предложений (>40 слов): {}",
            r.very_long_sentence_count
        ));
        lines.push(format!("  Богатство словаря: {:.4}", r.vocabulary_richness));
    } else {
        lines.push(format!(
            "Language: {} (confidence: {:.2})",
            analysis.language, analysis.language_confidence
        ));
        lines.push(format!(
            "Paragraphs: {}, sentences: {}, words: {}, characters: {}",
            analysis.paragraph_count,
            analysis.sentence_count,
            analysis.word_count,
            analysis.char_count
        ));
        lines.push(String::new());
        lines.push("Readability:".to_string());
        lines.push(format!("  Average sentence length: {:.1} words", r.avg_sentence_length));
        lines.push(format!("  Long sentences (>25 words): {}", r.long_sentence_count));
        lines.push(format!(
            "  Very long sentences (>40 words): {}",
            r.very_long_sentence_count
        ));
        lines.push(format!("  Vocabulary richness: {:.4}", r.vocabulary_richness));
    }
    if let Some(flesch) = r.flesch_reading_ease {
        lines.push(format!("  Flesch Reading Ease: {:.1}", flesch));
    }

    let repetitions: Vec<_> = analysis
        .ngram_repetitions
        .iter()
        .chain(analysis.word_repetitions.iter())
        .take(10)
        .collect();
    if !repetitions.is_empty() {
        lines.push(String::new());
        lines.push(if ru { "Повторы:" } else { "Repetitions:" }.to_string());
        for item in repetitions {
            lines.push(format!(
                "  \"{}\" x{} ({} {:?})",
                item.phrase,
                item.count,
                if ru { "абз." } else { "para." },
                item.locations
            ));
        }
    }

    if !analysis.coreference_flags.is_empty() {
        lines.push(String::new());
        lines.push(
            if ru {
                "Возможные проблемы с местоимениями:"
            } else {
                "Possible pronoun reference issues:"
            }
            .to_string(),
        );
        for flag in analysis.coreference_flags.iter().take(10) {
            lines.push(format!(
                "  [{}] {}{} / {}{}: {}",
                flag.pronoun,
                if ru { "абз." } else { "para." },
                flag.paragraph_index,
                if ru { "предл." } else { "sent." },
                flag.sentence_index,
                flag.issue
            ));
        }
    }

    if !analysis.dangling_modifier_flags.is_empty() {
        lines.push(String::new());
        lines.push(
            if ru {
                "Возможные висячие обороты:"
            } else {
                "Possible dangling modifiers:"
            }
            .to_string(),
        );
        for flag in analysis.dangling_modifier_flags.iter().take(5) {
            lines.push(format!(
                "  {}{}: \"{}\"",
                if ru { "предл." } else { "sent." },
                flag.sentence_index,
                flag.modifier
            ));
        }
    }

    if !analysis.degradation_notes.is_empty() {
        lines.push(String::new());
        for note in &analysis.degradation_notes {
            lines.push(format!("Note: {}", note));
        }
    }

    lines.join("\n")
}
