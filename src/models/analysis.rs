use serde::{Deserialize, Serialize};

/// 文本语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ru")]
    Russian,
}

impl Language {
    /// ISO 639-1 代码
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Russian => "ru",
        }
    }

    /// 语言名称（英文）
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Russian => "Russian",
        }
    }

    pub fn is_russian(&self) -> bool {
        matches!(self, Language::Russian)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// 段落及其句子
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    pub sentences: Vec<String>,
}

/// 切分后的文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedText {
    pub language: Language,
    pub paragraphs: Vec<Paragraph>,
}

/// 按全文顺序编号的句子
#[derive(Debug, Clone, Copy)]
pub struct SentenceRef<'a> {
    pub paragraph_index: usize,
    /// 全文范围内的句子序号
    pub sentence_index: usize,
    pub text: &'a str,
}

impl SegmentedText {
    /// 全文句子迭代器
    pub fn sentences(&self) -> impl Iterator<Item = SentenceRef<'_>> {
        self.paragraphs
            .iter()
            .enumerate()
            .flat_map(|(paragraph_index, paragraph)| {
                paragraph
                    .sentences
                    .iter()
                    .map(move |sentence| (paragraph_index, sentence.as_str()))
            })
            .enumerate()
            .map(|(sentence_index, (paragraph_index, text))| SentenceRef {
                paragraph_index,
                sentence_index,
                text,
            })
    }

    pub fn sentence_count(&self) -> usize {
        self.paragraphs.iter().map(|p| p.sentences.len()).sum()
    }
}

/// 重复的短语或单词
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepetitionItem {
    pub phrase: String,
    pub count: usize,
    /// 出现过的段落序号（升序，去重）
    pub locations: Vec<usize>,
}

/// 可读性指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReadabilityMetrics {
    pub avg_sentence_length: f64,
    pub avg_word_length: f64,
    /// 超过 25 个词的句子数
    pub long_sentence_count: usize,
    /// 超过 40 个词的句子数
    pub very_long_sentence_count: usize,
    pub long_sentence_ratio: f64,
    pub max_sentence_length: usize,
    /// 不同词数 / 总词数
    pub vocabulary_richness: f64,
    /// 仅英文
    pub flesch_reading_ease: Option<f64>,
}

/// 可能缺少先行词的代词
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreferenceFlag {
    pub pronoun: String,
    pub paragraph_index: usize,
    pub sentence_index: usize,
    pub context: String,
    pub issue: String,
}

/// 可能的悬垂修饰语
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DanglingModifierFlag {
    pub modifier: String,
    pub paragraph_index: usize,
    pub sentence_index: usize,
    pub sentence: String,
    pub issue: String,
}

/// 确定性预分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeterministicAnalysis {
    pub language: Language,
    pub language_confidence: f64,
    pub paragraph_count: usize,
    pub sentence_count: usize,
    pub word_count: usize,
    pub char_count: usize,
    pub paragraphs: Vec<String>,
    pub ngram_repetitions: Vec<RepetitionItem>,
    pub word_repetitions: Vec<RepetitionItem>,
    pub readability: ReadabilityMetrics,
    pub coreference_flags: Vec<CoreferenceFlag>,
    pub dangling_modifier_flags: Vec<DanglingModifierFlag>,
    /// 降级说明（从不致命）
    pub degradation_notes: Vec<String>,
}

impl DeterministicAnalysis {
    pub fn has_repetitions(&self) -> bool {
        !self.ngram_repetitions.is_empty() || !self.word_repetitions.is_empty()
    }

    /// 平均每段词数
    pub fn avg_paragraph_words(&self) -> f64 {
        if self.paragraph_count == 0 {
            0.0
        } else {
            self.word_count as f64 / self.paragraph_count as f64
        }
    }
}
