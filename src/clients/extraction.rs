//! 结构化输出提取
//!
//! 模型返回的文本依次交给各个解析策略，第一个成功的结果生效。

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCED_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").unwrap());

/// 单个解析策略
pub trait StructuredParser: Send + Sync {
    fn name(&self) -> &'static str;

    /// 只返回 JSON 对象
    fn parse(&self, raw: &str) -> Option<Value>;
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// 整段文本就是 JSON
pub struct StrictJsonParser;

impl StructuredParser for StrictJsonParser {
    fn name(&self) -> &'static str {
        "strict_json"
    }

    fn parse(&self, raw: &str) -> Option<Value> {
        parse_object(raw)
    }
}

/// Markdown 代码块中的 JSON
pub struct FencedBlockParser;

impl StructuredParser for FencedBlockParser {
    fn name(&self) -> &'static str {
        "fenced_block"
    }

    fn parse(&self, raw: &str) -> Option<Value> {
        FENCED_BLOCK_RE
            .captures_iter(raw)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| parse_object(m.as_str()))
    }
}

/// 括号配对扫描，保留最大的合法对象
pub struct BalancedObjectParser;

impl BalancedObjectParser {
    /// 所有顶层 `{...}` 片段（忽略字符串内的括号）
    fn candidates(raw: &str) -> Vec<&str> {
        let mut spans = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (idx, ch) in raw.char_indices() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    in_string = false;
                }
                continue;
            }
            match ch {
                '"' if depth > 0 => in_string = true,
                '{' => {
                    if depth == 0 {
                        start = idx;
                    }
                    depth += 1;
                }
                '}' if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(&raw[start..=idx]);
                    }
                }
                _ => {}
            }
        }
        spans
    }
}

impl StructuredParser for BalancedObjectParser {
    fn name(&self) -> &'static str {
        "balanced_object"
    }

    fn parse(&self, raw: &str) -> Option<Value> {
        Self::candidates(raw)
            .into_iter()
            .filter_map(|span| parse_object(span).map(|value| (span.len(), value)))
            .max_by_key(|(len, _)| *len)
            .map(|(_, value)| value)
    }
}

/// 有序的解析策略链
pub struct ParserChain {
    parsers: Vec<Box<dyn StructuredParser>>,
}

impl Default for ParserChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(StrictJsonParser),
            Box::new(FencedBlockParser),
            Box::new(BalancedObjectParser),
        ])
    }
}

impl ParserChain {
    pub fn new(parsers: Vec<Box<dyn StructuredParser>>) -> Self {
        Self { parsers }
    }

    /// 返回 (策略名, 对象)
    pub fn extract(&self, raw: &str) -> Option<(&'static str, Value)> {
        self.parsers
            .iter()
            .find_map(|parser| parser.parse(raw).map(|value| (parser.name(), value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_json() {
        let (name, value) = ParserChain::default().extract(" {\"a\": 1}\n").unwrap();
        assert_eq!(name, "strict_json");
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_fenced_block() {
        let raw = "Here is the critique:\n```json\n{\"summary\": \"ok\"}\n```\nThanks.";
        let (name, value) = ParserChain::default().extract(raw).unwrap();
        assert_eq!(name, "fenced_block");
        assert_eq!(value["summary"], "ok");
    }

    #[test]
    fn test_balanced_scan_keeps_largest_object() {
        let raw = "Note {\"x\": 1} and the result {\"summary\": \"a } in a string\", \"n\": {\"k\": 2}} end";
        let (name, value) = ParserChain::default().extract(raw).unwrap();
        assert_eq!(name, "balanced_object");
        assert_eq!(value["summary"], "a } in a string");
        assert_eq!(value["n"]["k"], 2);
    }

    #[test]
    fn test_malformed_candidates_are_skipped() {
        let raw = "{not json} {\"ok\": true}";
        let (_, value) = ParserChain::default().extract(raw).unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn test_nothing_found() {
        assert!(ParserChain::default().extract("no structure here").is_none());
        assert!(ParserChain::default().extract("[1, 2, 3]").is_none());
    }
}
