use super::critique::Severity;
use super::lenient;
use super::StructuredOutput;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 审核结论，按分歧程度递增排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditVerdict {
    #[default]
    Agree,
    MostlyAgree,
    Mixed,
    MostlyDisagree,
    Disagree,
}

impl AuditVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditVerdict::Agree => "agree",
            AuditVerdict::MostlyAgree => "mostly_agree",
            AuditVerdict::Mixed => "mixed",
            AuditVerdict::MostlyDisagree => "mostly_disagree",
            AuditVerdict::Disagree => "disagree",
        }
    }
}

impl<'de> Deserialize<'de> for AuditVerdict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match lenient::label(deserializer)?.as_str() {
            "mostly_agree" => AuditVerdict::MostlyAgree,
            "mixed" => AuditVerdict::Mixed,
            "mostly_disagree" => AuditVerdict::MostlyDisagree,
            "disagree" => AuditVerdict::Disagree,
            _ => AuditVerdict::Agree,
        })
    }
}

/// 审核者不同意的论断
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditDisagreement {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub claim: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub issue: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub evidence: String,
    #[serde(deserialize_with = "super::critique::moderate_severity")]
    pub severity: Severity,
}

impl Default for AuditDisagreement {
    fn default() -> Self {
        Self {
            claim: String::new(),
            issue: String::new(),
            evidence: String::new(),
            severity: Severity::Moderate,
        }
    }
}

/// 主分析遗漏的问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditMissedIssue {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub description: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub evidence: String,
    #[serde(deserialize_with = "super::critique::moderate_severity")]
    pub severity: Severity,
}

impl Default for AuditMissedIssue {
    fn default() -> Self {
        Self {
            description: String::new(),
            evidence: String::new(),
            severity: Severity::Moderate,
        }
    }
}

/// 无文本依据的论断
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuditHallucination {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub claim: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub why_hallucinated: String,
}

/// 空泛的批评
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuditWeakCritique {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub claim: String,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub why_weak: String,
}

/// 审核结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuditResult {
    #[serde(alias = "verdict")]
    pub audit_verdict: AuditVerdict,
    /// [0, 1]
    #[serde(alias = "confidence", deserialize_with = "lenient::f64_or_zero")]
    pub confidence_score: f64,
    #[serde(deserialize_with = "lenient::skip_invalid")]
    pub disagreements: Vec<AuditDisagreement>,
    #[serde(deserialize_with = "lenient::skip_invalid")]
    pub missed_issues: Vec<AuditMissedIssue>,
    #[serde(deserialize_with = "lenient::skip_invalid")]
    pub hallucinations: Vec<AuditHallucination>,
    #[serde(deserialize_with = "lenient::skip_invalid")]
    pub weak_critiques: Vec<AuditWeakCritique>,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub summary: String,
}

const AUDIT_KEYS: &[&str] = &[
    "audit_verdict",
    "verdict",
    "confidence_score",
    "confidence",
    "disagreements",
    "missed_issues",
    "hallucinations",
    "weak_critiques",
    "summary",
];

impl StructuredOutput for AuditResult {
    fn from_value(value: Value) -> Option<Self> {
        let object = super::unwrap_single_key(value, AUDIT_KEYS)?;
        let mut audit: AuditResult = serde_json::from_value(object).ok()?;
        // 有些模型按百分比给出置信度
        if audit.confidence_score > 1.0 && audit.confidence_score <= 100.0 {
            audit.confidence_score /= 100.0;
        }
        audit.confidence_score = audit.confidence_score.clamp(0.0, 1.0);
        Some(audit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_ordering() {
        assert!(AuditVerdict::Agree < AuditVerdict::MostlyAgree);
        assert!(AuditVerdict::MostlyAgree < AuditVerdict::Mixed);
        assert!(AuditVerdict::Mixed < AuditVerdict::MostlyDisagree);
        assert!(AuditVerdict::MostlyDisagree < AuditVerdict::Disagree);
    }

    #[test]
    fn test_parse_audit_with_aliases() {
        let value = json!({
            "verdict": "Mostly Disagree",
            "confidence": "0.8",
            "hallucinations": [{"claim": "the dragon", "why_hallucinated": "no dragon"}],
            "disagreements": [{"claim": "x"}]
        });
        let audit = AuditResult::from_value(value).unwrap();
        assert_eq!(audit.audit_verdict, AuditVerdict::MostlyDisagree);
        assert_eq!(audit.confidence_score, 0.8);
        assert_eq!(audit.hallucinations.len(), 1);
        assert_eq!(audit.disagreements[0].severity, Severity::Moderate);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let audit = AuditResult::from_value(json!({"confidence_score": 85})).unwrap();
        assert!((audit.confidence_score - 0.85).abs() < 1e-9);
        let audit = AuditResult::from_value(json!({"confidence_score": -2})).unwrap();
        assert_eq!(audit.confidence_score, 0.0);
    }
}
