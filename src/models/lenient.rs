//! 宽松反序列化辅助函数
//!
//! 模型输出并不总是严格符合结构：数字可能以字符串给出，字段可能为 null，
//! 列表中可能混入无法解析的元素。这里的函数把这些情况统一折算为默认值，
//! 而不是让整个结果解析失败。

use serde::de::{DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

/// 数字或数字字符串 → f64；无法识别时为 0.0
pub fn f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct NumberVisitor;

    impl<'de> Visitor<'de> for NumberVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or a numeric string")
        }

        fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<f64, E> {
            Ok(if value.is_finite() { value } else { 0.0 })
        }

        fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<f64, E> {
            Ok(value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0))
        }

        fn visit_bool<E: serde::de::Error>(self, _: bool) -> Result<f64, E> {
            Ok(0.0)
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<f64, E> {
            Ok(0.0)
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<f64, E> {
            Ok(0.0)
        }
    }

    deserializer.deserialize_any(NumberVisitor)
}

/// 数字或数字字符串 → usize；负数、小数向下折算
pub fn usize_or_zero<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64_or_zero(deserializer)?;
    Ok(if value > 0.0 { value.floor() as usize } else { 0 })
}

/// 字符串；数字和布尔值转换为文本，null 为空串
pub fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct TextVisitor;

    impl<'de> Visitor<'de> for TextVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a scalar")
        }

        fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_string<E: serde::de::Error>(self, value: String) -> Result<String, E> {
            Ok(value)
        }

        fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_bool<E: serde::de::Error>(self, value: bool) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<String, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            let mut parts = Vec::new();
            while let Some(item) = seq.next_element::<Value>()? {
                if let Value::String(s) = item {
                    parts.push(s);
                }
            }
            Ok(parts.join("; "))
        }

        fn visit_map<A>(self, mut map: A) -> Result<String, A::Error>
        where
            A: serde::de::MapAccess<'de>,
        {
            while map.next_entry::<Value, Value>()?.is_some() {}
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(TextVisitor)
}

/// 列表：跳过无法解析的元素；非数组时为空列表
pub fn skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// 嵌套对象：解析失败时使用默认值
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// 枚举标签：统一为小写下划线形式，非字符串时为空串
pub fn label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => normalize_label(&s),
        _ => String::new(),
    })
}

/// "Mostly Agree" / "mostly-agree" → "mostly_agree"
pub fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Sample {
        #[serde(deserialize_with = "f64_or_zero")]
        score: f64,
        #[serde(deserialize_with = "usize_or_zero")]
        index: usize,
        #[serde(deserialize_with = "string_or_empty")]
        note: String,
        #[serde(deserialize_with = "skip_invalid")]
        items: Vec<u32>,
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let sample: Sample =
            serde_json::from_str(r#"{"score": "7.5", "index": "3", "note": 12}"#).unwrap();
        assert_eq!(sample.score, 7.5);
        assert_eq!(sample.index, 3);
        assert_eq!(sample.note, "12");
    }

    #[test]
    fn test_nulls_and_garbage_fall_back() {
        let sample: Sample = serde_json::from_str(
            r#"{"score": null, "index": -4, "note": null, "items": [1, "x", 3, {"a": 1}]}"#,
        )
        .unwrap();
        assert_eq!(sample.score, 0.0);
        assert_eq!(sample.index, 0);
        assert_eq!(sample.note, "");
        assert_eq!(sample.items, vec![1, 3]);
    }

    #[test]
    fn test_non_array_list_is_empty() {
        let sample: Sample = serde_json::from_str(r#"{"items": "none"}"#).unwrap();
        assert!(sample.items.is_empty());
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label(" Mostly Agree "), "mostly_agree");
        assert_eq!(normalize_label("mostly-disagree"), "mostly_disagree");
    }
}
