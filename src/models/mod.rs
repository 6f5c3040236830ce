pub mod analysis;
pub mod audit;
pub mod critique;
pub mod lenient;
pub mod requirements;
pub mod run;

pub use analysis::{
    CoreferenceFlag, DanglingModifierFlag, DeterministicAnalysis, Language, Paragraph,
    ReadabilityMetrics, RepetitionItem, SegmentedText, SentenceRef,
};
pub use audit::{AuditResult, AuditVerdict};
pub use critique::{CritiqueResult, QualityScores, Severity};
pub use requirements::{RequirementOrigin, RequirementSet};
pub use run::{LlmCallMeta, Role, Run, RunOutput, RunState, RunStatus, Stage};

use serde_json::{Map, Value};

/// 从模型输出的 JSON 构造强类型结果
pub trait StructuredOutput: Sized {
    /// 结构不符合时返回 None
    fn from_value(value: Value) -> Option<Self>;
}

impl StructuredOutput for Value {
    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

/// 取出目标对象
///
/// 含有任一已知字段的对象直接返回；形如 `{"result": {...}}` 的单键包装对象
/// 取其内层；其他情况返回 None
pub(crate) fn unwrap_single_key(value: Value, known_keys: &[&str]) -> Option<Value> {
    let object: Map<String, Value> = match value {
        Value::Object(object) => object,
        _ => return None,
    };
    if known_keys.iter().any(|key| object.contains_key(*key)) {
        return Some(Value::Object(object));
    }
    if object.len() == 1 {
        if let Some(inner @ Value::Object(_)) = object.into_iter().next().map(|(_, v)| v) {
            return unwrap_single_key(inner, known_keys);
        }
    }
    None
}
