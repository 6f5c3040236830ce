use super::heuristics::{
    compute_readability, detect_ngram_repetitions, detect_word_repetitions, CoreferenceDetector,
    DanglingModifierDetector, FlagDetector,
};
use super::language::detect_language;
use super::segmentation::{segment, tokenize_words};
use crate::config::HeuristicsConfig;
use crate::models::DeterministicAnalysis;
use tracing::debug;

/// 确定性预分析
///
/// 纯函数：相同输入总是得到相同结果；异常情况只记录降级说明，从不返回错误
pub fn analyze(text: &str, heuristics: &HeuristicsConfig) -> DeterministicAnalysis {
    let mut notes = Vec::new();

    let (language, language_confidence) = detect_language(text);
    if !text.chars().any(char::is_alphabetic) {
        notes.push(
            "No alphabetic characters found; language defaulted to English and the text was treated as a single sentence"
                .to_string(),
        );
    } else if language_confidence < 0.5 {
        notes.push(format!(
            "Low language detection confidence ({:.2}); heuristics may be unreliable",
            language_confidence
        ));
    }

    let doc = segment(text, language);
    let word_count: usize = doc.sentences().map(|s| tokenize_words(s.text).len()).sum();

    let readability = compute_readability(&doc);
    let ngram_repetitions = detect_ngram_repetitions(&doc, heuristics.ngram_min_count);
    let word_repetitions = detect_word_repetitions(&doc);
    let coreference_flags = CoreferenceDetector::new(heuristics.coreference_window).flags(&doc);
    let dangling_modifier_flags = DanglingModifierDetector::default().flags(&doc);

    debug!(
        "预分析: 语言 {} ({:.2}), {} 段 / {} 句 / {} 词, 代词标记 {}, 修饰语标记 {}",
        language,
        language_confidence,
        doc.paragraphs.len(),
        doc.sentence_count(),
        word_count,
        coreference_flags.len(),
        dangling_modifier_flags.len()
    );

    DeterministicAnalysis {
        language,
        language_confidence,
        paragraph_count: doc.paragraphs.len(),
        sentence_count: doc.sentence_count(),
        word_count,
        char_count: text.chars().count(),
        paragraphs: doc.paragraphs.iter().map(|p| p.text.clone()).collect(),
        ngram_repetitions,
        word_repetitions,
        readability,
        coreference_flags,
        dangling_modifier_flags,
        degradation_notes: notes,
    }
}
