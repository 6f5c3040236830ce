//! 确定性启发式：可读性、重复、代词回指、悬垂修饰语
//!
//! 这里产出的都是“提示”，不是结论；是否真有问题由后续的 LLM 评析判断。

use super::language::is_stopword;
use super::segmentation::tokenize_words;
use crate::models::{
    CoreferenceFlag, DanglingModifierFlag, Language, ReadabilityMetrics, RepetitionItem,
    SegmentedText,
};
use crate::utils::logging::truncate_text;
use once_cell::sync::Lazy;
use phf::{phf_set, Set};
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};

pub const LONG_SENTENCE_WORDS: usize = 25;
pub const VERY_LONG_SENTENCE_WORDS: usize = 40;
pub const MAX_NGRAM_ITEMS: usize = 30;
pub const MAX_WORD_ITEMS: usize = 20;
pub const MAX_COREFERENCE_FLAGS: usize = 20;
pub const MAX_DANGLING_FLAGS: usize = 15;

/// 标记检测器：从切分后的文本中找出可疑位置
pub trait FlagDetector {
    type Flag;

    fn flags(&self, doc: &SegmentedText) -> Vec<Self::Flag>;
}

// ========== 可读性 ==========

/// 计算可读性指标
///
/// 英文额外给出 Flesch reading ease；俄文只给句长 / 词长统计
pub fn compute_readability(doc: &SegmentedText) -> ReadabilityMetrics {
    let sentence_words: Vec<Vec<&str>> = doc
        .sentences()
        .map(|s| tokenize_words(s.text))
        .collect();
    let words: Vec<&str> = sentence_words.iter().flatten().copied().collect();

    if words.is_empty() || sentence_words.is_empty() {
        return ReadabilityMetrics::default();
    }

    let word_count = words.len() as f64;
    let sentence_count = sentence_words.len() as f64;
    let lengths: Vec<usize> = sentence_words.iter().map(Vec::len).collect();

    let long_sentence_count = lengths.iter().filter(|l| **l > LONG_SENTENCE_WORDS).count();
    let very_long_sentence_count = lengths
        .iter()
        .filter(|l| **l > VERY_LONG_SENTENCE_WORDS)
        .count();
    let total_chars: usize = words.iter().map(|w| w.chars().count()).sum();
    let unique: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();

    let avg_sentence_length = word_count / sentence_count;
    let flesch_reading_ease = match doc.language {
        Language::English => {
            let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();
            Some(round_to(
                206.835 - 1.015 * avg_sentence_length - 84.6 * (syllables as f64 / word_count),
                1,
            ))
        }
        Language::Russian => None,
    };

    ReadabilityMetrics {
        avg_sentence_length: round_to(avg_sentence_length, 1),
        avg_word_length: round_to(total_chars as f64 / word_count, 2),
        long_sentence_count,
        very_long_sentence_count,
        long_sentence_ratio: round_to(long_sentence_count as f64 / sentence_count, 4),
        max_sentence_length: lengths.iter().copied().max().unwrap_or(0),
        vocabulary_richness: round_to(unique.len() as f64 / word_count, 4),
        flesch_reading_ease,
    }
}

/// 英文音节数：元音组计数，词尾不发音的 e 扣除，最少为 1
pub fn count_syllables(word: &str) -> usize {
    let word = word.to_lowercase();
    let mut count = 0;
    let mut prev_vowel = false;
    for c in word.chars() {
        let vowel = "aeiouy".contains(c);
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }
    if word.ends_with('e') && count > 1 {
        count -= 1;
    }
    count.max(1)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

// ========== 重复检测 ==========

/// 全文小写词流，附带所在段落序号
fn token_stream(doc: &SegmentedText) -> Vec<(String, usize)> {
    doc.sentences()
        .flat_map(|s| {
            tokenize_words(s.text)
                .into_iter()
                .map(move |w| (w.to_lowercase(), s.paragraph_index))
        })
        .collect()
}

fn collect_items(
    occurrences: HashMap<String, Vec<usize>>,
    min_count: usize,
    limit: usize,
) -> Vec<RepetitionItem> {
    let mut items: Vec<RepetitionItem> = occurrences
        .into_iter()
        .filter(|(_, locations)| locations.len() >= min_count)
        .map(|(phrase, locations)| RepetitionItem {
            phrase,
            count: locations.len(),
            locations: locations
                .into_iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        })
        .collect();
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.phrase.cmp(&b.phrase)));
    items.truncate(limit);
    items
}

/// 2-gram 与 3-gram 重复；全由停用词组成的 n-gram 跳过
pub fn detect_ngram_repetitions(doc: &SegmentedText, min_count: usize) -> Vec<RepetitionItem> {
    let tokens = token_stream(doc);
    let mut occurrences: HashMap<String, Vec<usize>> = HashMap::new();

    for n in [2usize, 3] {
        for window in tokens.windows(n) {
            if window.iter().all(|(w, _)| is_stopword(doc.language, w)) {
                continue;
            }
            let phrase = window
                .iter()
                .map(|(w, _)| w.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            occurrences.entry(phrase).or_default().push(window[0].1);
        }
    }

    collect_items(occurrences, min_count, MAX_NGRAM_ITEMS)
}

/// 单词重复阈值随文本长度增长
pub fn word_repetition_threshold(word_count: usize) -> usize {
    5 + word_count / 200
}

/// 实词重复（排除停用词和短于 3 个字符的词）
pub fn detect_word_repetitions(doc: &SegmentedText) -> Vec<RepetitionItem> {
    let tokens = token_stream(doc);
    let threshold = word_repetition_threshold(tokens.len());
    let mut occurrences: HashMap<String, Vec<usize>> = HashMap::new();

    for (word, paragraph) in tokens {
        if word.chars().count() < 3 || is_stopword(doc.language, &word) {
            continue;
        }
        occurrences.entry(word).or_default().push(paragraph);
    }

    collect_items(occurrences, threshold, MAX_WORD_ITEMS)
}

// ========== 代词回指 ==========

static PRONOUNS_EN: Set<&'static str> = phf_set! {
    "he", "she", "it", "they", "him", "her", "them", "his", "its", "their",
};

static PRONOUNS_RU: Set<&'static str> = phf_set! {
    "он", "она", "оно", "они", "его", "её", "ее", "их", "ему", "ей", "им",
    "ним", "ней", "них",
};

/// 首字母大写但不能充当先行词的词（小写形式）
static NON_ANTECEDENTS_EN: Set<&'static str> = phf_set! {
    "the", "this", "that", "these", "those", "there", "here", "my", "your",
    "our", "we", "you", "i", "what", "which", "who", "how", "when", "where",
    "why", "and", "but", "or", "so", "if", "as", "in", "on", "at", "to",
    "for", "not", "no", "yes", "then", "now", "a", "an", "one", "after",
    "before", "while", "still", "yet", "just", "only", "even", "maybe",
};

static NON_ANTECEDENTS_RU: Set<&'static str> = phf_set! {
    "это", "тот", "та", "то", "те", "мой", "мне", "ваш", "наш", "мы", "вы",
    "я", "что", "кто", "как", "где", "когда", "зачем", "почему", "и", "но",
    "или", "если", "да", "нет", "вот", "уже", "потом", "тогда", "теперь",
    "здесь", "там", "а", "в", "на", "с", "по", "не",
};

static DETERMINERS_EN: Set<&'static str> = phf_set! {
    "the", "a", "an", "this", "that", "these", "those",
};

fn is_pronoun(language: Language, lower: &str) -> bool {
    match language {
        Language::English => PRONOUNS_EN.contains(lower),
        Language::Russian => PRONOUNS_RU.contains(lower),
    }
}

/// 句内按顺序判定每个词是否可作先行词
fn antecedent_marks(language: Language, words: &[&str]) -> Vec<bool> {
    let mut marks = Vec::with_capacity(words.len());
    for (i, word) in words.iter().enumerate() {
        let lower = word.to_lowercase();
        if is_pronoun(language, &lower) {
            marks.push(false);
            continue;
        }
        let capitalized = word.chars().next().is_some_and(char::is_uppercase);
        let function_word = match language {
            Language::English => NON_ANTECEDENTS_EN.contains(lower.as_str()),
            Language::Russian => NON_ANTECEDENTS_RU.contains(lower.as_str()),
        } || is_stopword(language, &lower);

        let named = capitalized && !function_word;
        let determined = language == Language::English
            && i > 0
            && DETERMINERS_EN.contains(words[i - 1].to_lowercase().as_str())
            && !function_word;
        marks.push(named || determined);
    }
    marks
}

/// 代词回指检测
///
/// 代词之前（同句内或前 `window` 句）没有合理先行词时标记。
/// 大写的代词本身不算先行词。
#[derive(Debug, Clone, Copy)]
pub struct CoreferenceDetector {
    pub window: usize,
    pub max_flags: usize,
}

impl CoreferenceDetector {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            max_flags: MAX_COREFERENCE_FLAGS,
        }
    }
}

impl FlagDetector for CoreferenceDetector {
    type Flag = CoreferenceFlag;

    fn flags(&self, doc: &SegmentedText) -> Vec<CoreferenceFlag> {
        let language = doc.language;
        let sentences: Vec<_> = doc.sentences().collect();
        let tokenized: Vec<Vec<&str>> = sentences.iter().map(|s| tokenize_words(s.text)).collect();
        let marks: Vec<Vec<bool>> = tokenized
            .iter()
            .map(|words| antecedent_marks(language, words))
            .collect();
        let has_antecedent: Vec<bool> = marks.iter().map(|m| m.iter().any(|b| *b)).collect();

        let mut flags = Vec::new();
        for (idx, sentence) in sentences.iter().enumerate() {
            let window_start = idx.saturating_sub(self.window);
            let window_has = has_antecedent[window_start..idx].iter().any(|b| *b);
            let mut seen_in_sentence = false;
            let mut flagged: HashSet<String> = HashSet::new();

            for (word, is_antecedent) in tokenized[idx].iter().zip(&marks[idx]) {
                if *is_antecedent {
                    seen_in_sentence = true;
                    continue;
                }
                let lower = word.to_lowercase();
                if !is_pronoun(language, &lower) || seen_in_sentence || window_has {
                    continue;
                }
                if !flagged.insert(lower.clone()) {
                    continue;
                }
                let issue = match language {
                    Language::English => format!(
                        "Pronoun '{}' has no clear antecedent in the preceding {} sentence(s)",
                        lower, self.window
                    ),
                    Language::Russian => format!(
                        "Местоимение «{}» без явного антецедента в предыдущих предложениях ({})",
                        lower, self.window
                    ),
                };
                flags.push(CoreferenceFlag {
                    pronoun: lower,
                    paragraph_index: sentence.paragraph_index,
                    sentence_index: sentence.sentence_index,
                    context: truncate_text(sentence.text, 100),
                    issue,
                });
                if flags.len() >= self.max_flags {
                    return flags;
                }
            }
        }
        flags
    }
}

// ========== 悬垂修饰语 ==========

static DANGLING_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(Having\s+\w+|Being\s+\w+|Walking\s+\w+|Looking\s+\w+|Running\s+\w+|Sitting\s+\w+|Standing\s+\w+|Lying\s+\w+|Made\s+\w+|Born\s+\w+|Driven\s+\w+|Raised\s+\w+|\w+ing\s+(?:to|at|in|on|with|from)\s+\w+),\s+(?:the\s+\w+|a\s+\w+|an\s+\w+|it\s+)",
    )
    .unwrap()
});

static DANGLING_RU: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(Будучи\s+\w+|Имея\s+\w+|Находясь\s+\w+|Являясь\s+\w+|\w+(?:вши|вшись|ши|в)\s+\w+),\s+(\w+)",
    )
    .unwrap()
});

static PERSONAL_PRONOUNS_RU: Set<&'static str> = phf_set! {
    "я", "ты", "он", "она", "оно", "мы", "вы", "они",
};

/// 句首分词 / 动名词短语 + 逗号的悬垂修饰语检测
#[derive(Debug, Clone, Copy)]
pub struct DanglingModifierDetector {
    pub max_flags: usize,
}

impl Default for DanglingModifierDetector {
    fn default() -> Self {
        Self {
            max_flags: MAX_DANGLING_FLAGS,
        }
    }
}

impl DanglingModifierDetector {
    fn matched_modifier(&self, language: Language, sentence: &str) -> Option<String> {
        let body = sentence.trim_start_matches(|c: char| !c.is_alphanumeric());
        match language {
            Language::English => DANGLING_EN
                .captures(body)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
            Language::Russian => {
                let caps = DANGLING_RU.captures(body)?;
                let subject = caps.get(2)?.as_str().to_lowercase();
                if PERSONAL_PRONOUNS_RU.contains(subject.as_str()) {
                    return None;
                }
                caps.get(1).map(|m| m.as_str().to_string())
            }
        }
    }
}

impl FlagDetector for DanglingModifierDetector {
    type Flag = DanglingModifierFlag;

    fn flags(&self, doc: &SegmentedText) -> Vec<DanglingModifierFlag> {
        let issue = match doc.language {
            Language::English => {
                "Possible dangling modifier: the introductory phrase may not modify the subject that follows"
            }
            Language::Russian => {
                "Возможный висячий оборот: вводная конструкция может не относиться к следующему за ней подлежащему"
            }
        };

        doc.sentences()
            .filter_map(|s| {
                self.matched_modifier(doc.language, s.text)
                    .map(|modifier| DanglingModifierFlag {
                        modifier,
                        paragraph_index: s.paragraph_index,
                        sentence_index: s.sentence_index,
                        sentence: truncate_text(s.text, 150),
                        issue: issue.to_string(),
                    })
            })
            .take(self.max_flags)
            .collect()
    }
}
