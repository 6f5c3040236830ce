use super::lenient;
use super::StructuredOutput;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 问题严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Minor,
    Moderate,
    Major,
    Critical,
}

impl Severity {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "minor" | "low" => Some(Severity::Minor),
            "moderate" | "medium" => Some(Severity::Moderate),
            "major" | "high" => Some(Severity::Major),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Major => "major",
            Severity::Critical => "critical",
        }
    }

    /// 报告中使用的标记
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Minor => "[.]",
            Severity::Moderate => "[!]",
            Severity::Major => "[!!]",
            Severity::Critical => "[!!!]",
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Severity::from_label(&lenient::label(deserializer)?).unwrap_or_default())
    }
}

/// 优先级字段缺省为 moderate
pub(crate) fn moderate_severity<'de, D>(deserializer: D) -> Result<Severity, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Severity::from_label(&lenient::label(deserializer)?).unwrap_or(Severity::Moderate))
}

/// 全局问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GlobalIssueCategory {
    Logic,
    Pacing,
    Voice,
    PovConsistency,
    CharacterConsistency,
    Contradictions,
    Tone,
    #[default]
    Other,
}

impl GlobalIssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalIssueCategory::Logic => "logic",
            GlobalIssueCategory::Pacing => "pacing",
            GlobalIssueCategory::Voice => "voice",
            GlobalIssueCategory::PovConsistency => "pov_consistency",
            GlobalIssueCategory::CharacterConsistency => "character_consistency",
            GlobalIssueCategory::Contradictions => "contradictions",
            GlobalIssueCategory::Tone => "tone",
            GlobalIssueCategory::Other => "other",
        }
    }
}

impl<'de> Deserialize<'de> for GlobalIssueCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match lenient::label(deserializer)?.as_str() {
            "logic" => GlobalIssueCategory::Logic,
            "pacing" => GlobalIssueCategory::Pacing,
            "voice" => GlobalIssueCategory::Voice,
            "pov_consistency" | "pov" => GlobalIssueCategory::PovConsistency,
            "character_consistency" => GlobalIssueCategory::CharacterConsistency,
            "contradictions" | "contradiction" => GlobalIssueCategory::Contradictions,
            "tone" => GlobalIssueCategory::Tone,
            _ => GlobalIssueCategory::Other,
        })
    }
}

/// 读者疑问类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReaderQuestionType {
    #[default]
    UnclearReference,
    MissingAntecedent,
    UndefinedTerm,
    LogicalGap,
}

impl ReaderQuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderQuestionType::UnclearReference => "unclear_reference",
            ReaderQuestionType::MissingAntecedent => "missing_antecedent",
            ReaderQuestionType::UndefinedTerm => "undefined_term",
            ReaderQuestionType::LogicalGap => "logical_gap",
        }
    }
}

impl<'de> Deserialize<'de> for ReaderQuestionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match lenient::label(deserializer)?.as_str() {
            "missing_antecedent" => ReaderQuestionType::MissingAntecedent,
            "undefined_term" => ReaderQuestionType::UndefinedTerm,
            "logical_gap" => ReaderQuestionType::LogicalGap,
            _ => ReaderQuestionType::UnclearReference,
        })
    }
}

/// 文本概览
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TextOverview {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub genre_guess: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub tone: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub apparent_audience: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub language: String,
    #[serde(deserialize_with = "lenient::usize_or_zero")]
    pub word_count: usize,
    #[serde(deserialize_with = "lenient::usize_or_zero")]
    pub paragraph_count: usize,
}

/// 结构大纲条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StructuralOutlineItem {
    #[serde(deserialize_with = "lenient::usize_or_zero")]
    pub paragraph_index: usize,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub intent: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub summary: String,
}

/// 局部问题（句子级）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LocalIssue {
    #[serde(deserialize_with = "lenient::usize_or_zero")]
    pub paragraph_index: usize,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub sentence: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub issue_type: String,
    pub severity: Severity,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub description: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub suggestion: String,
}

/// 全局问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalIssue {
    pub category: GlobalIssueCategory,
    pub severity: Severity,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub description: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub evidence: String,
}

/// 七项质量评分（0-10）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QualityScores {
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub clarity: f64,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub conciseness: f64,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub vividness: f64,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub originality: f64,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub coherence: f64,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub engagement: f64,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub overall: f64,
}

impl QualityScores {
    /// 按固定顺序列出 (名称, 分数)
    pub fn entries(&self) -> [(&'static str, f64); 7] {
        [
            ("clarity", self.clarity),
            ("conciseness", self.conciseness),
            ("vividness", self.vividness),
            ("originality", self.originality),
            ("coherence", self.coherence),
            ("engagement", self.engagement),
            ("overall", self.overall),
        ]
    }

    fn clamp(&mut self) {
        for score in [
            &mut self.clarity,
            &mut self.conciseness,
            &mut self.vividness,
            &mut self.originality,
            &mut self.coherence,
            &mut self.engagement,
            &mut self.overall,
        ] {
            *score = score.clamp(0.0, 10.0);
        }
    }
}

/// 陈词滥调
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClicheItem {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub phrase: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub location: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub suggestion: String,
}

/// 读者疑问
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReaderQuestion {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub question: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub location: String,
    #[serde(rename = "type")]
    pub question_type: ReaderQuestionType,
}

/// 改进建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImprovementSuggestion {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub category: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub suggestion: String,
    #[serde(deserialize_with = "moderate_severity")]
    pub priority: Severity,
}

impl Default for ImprovementSuggestion {
    fn default() -> Self {
        Self {
            category: String::new(),
            suggestion: String::new(),
            priority: Severity::Moderate,
        }
    }
}

/// 主分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CritiqueResult {
    #[serde(deserialize_with = "lenient::or_default")]
    pub text_overview: TextOverview,
    #[serde(deserialize_with = "lenient::skip_invalid")]
    pub structural_outline: Vec<StructuralOutlineItem>,
    #[serde(deserialize_with = "lenient::skip_invalid")]
    pub local_issues: Vec<LocalIssue>,
    #[serde(deserialize_with = "lenient::skip_invalid")]
    pub global_issues: Vec<GlobalIssue>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub quality_scores: QualityScores,
    #[serde(deserialize_with = "lenient::skip_invalid")]
    pub cliche_detection: Vec<ClicheItem>,
    #[serde(deserialize_with = "lenient::skip_invalid")]
    pub reader_questions: Vec<ReaderQuestion>,
    #[serde(deserialize_with = "lenient::skip_invalid")]
    pub improvement_suggestions: Vec<ImprovementSuggestion>,
    #[serde(deserialize_with = "lenient::skip_invalid")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub summary: String,
}

const CRITIQUE_KEYS: &[&str] = &[
    "text_overview",
    "structural_outline",
    "local_issues",
    "global_issues",
    "quality_scores",
    "cliche_detection",
    "reader_questions",
    "improvement_suggestions",
    "strengths",
    "summary",
];

impl StructuredOutput for CritiqueResult {
    fn from_value(value: Value) -> Option<Self> {
        let object = super::unwrap_single_key(value, CRITIQUE_KEYS)?;
        let mut critique: CritiqueResult = serde_json::from_value(object).ok()?;
        critique.quality_scores.clamp();
        Some(critique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_critique() {
        let value = json!({
            "text_overview": {"genre_guess": "fantasy", "tone": "light", "word_count": "120"},
            "local_issues": [
                {"paragraph_index": 0, "sentence": "It was dark.", "severity": "MAJOR", "description": "cliché"},
                "garbage"
            ],
            "global_issues": [{"category": "weird", "severity": "unknown"}],
            "quality_scores": {"clarity": "7", "overall": 12, "vividness": null},
            "reader_questions": [{"question": "Who is he?", "type": "missing_antecedent"}],
            "improvement_suggestions": [{"suggestion": "Trim."}],
            "strengths": ["voice", 3],
            "summary": "Solid."
        });
        let critique = CritiqueResult::from_value(value).unwrap();
        assert_eq!(critique.text_overview.word_count, 120);
        assert_eq!(critique.local_issues.len(), 1);
        assert_eq!(critique.local_issues[0].severity, Severity::Major);
        assert_eq!(critique.global_issues[0].category, GlobalIssueCategory::Other);
        assert_eq!(critique.global_issues[0].severity, Severity::Minor);
        assert_eq!(critique.quality_scores.clarity, 7.0);
        assert_eq!(critique.quality_scores.overall, 10.0);
        assert_eq!(
            critique.reader_questions[0].question_type,
            ReaderQuestionType::MissingAntecedent
        );
        assert_eq!(critique.improvement_suggestions[0].priority, Severity::Moderate);
        assert_eq!(critique.strengths, vec!["voice"]);
    }

    #[test]
    fn test_wrapped_object_is_unwrapped() {
        let value = json!({"result": {"summary": "ok", "strengths": ["a"]}});
        let critique = CritiqueResult::from_value(value).unwrap();
        assert_eq!(critique.summary, "ok");
    }

    #[test]
    fn test_unrelated_object_is_rejected() {
        assert!(CritiqueResult::from_value(json!({"error": "nope"})).is_none());
        assert!(CritiqueResult::from_value(json!([1, 2])).is_none());
    }
}
