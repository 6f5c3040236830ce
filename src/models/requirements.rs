use serde::{Deserialize, Serialize};

/// 评判标准的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementOrigin {
    /// 调用方提供
    Supplied,
    /// 根据预分析自动生成
    Generated,
}

/// 有序的评判标准列表，靠前的条目权重更高
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSet {
    pub origin: RequirementOrigin,
    pub criteria: Vec<String>,
}

impl RequirementSet {
    /// 由调用方文本构造，每个非空行是一条标准；全空时返回 None
    pub fn supplied(text: &str) -> Option<Self> {
        let criteria: Vec<String> = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        if criteria.is_empty() {
            None
        } else {
            Some(Self {
                origin: RequirementOrigin::Supplied,
                criteria,
            })
        }
    }

    pub fn generated(criteria: Vec<String>) -> Self {
        Self {
            origin: RequirementOrigin::Generated,
            criteria,
        }
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// 用于提示词的文本形式
    ///
    /// 调用方提供的标准原样保留；自动生成的标准加序号
    pub fn to_prompt_text(&self) -> String {
        match self.origin {
            RequirementOrigin::Supplied => self.criteria.join("\n"),
            RequirementOrigin::Generated => self
                .criteria
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{}. {}", i + 1, c))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
