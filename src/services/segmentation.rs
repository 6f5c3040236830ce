//! 文本切分：段落、句子、词

use crate::models::{Language, Paragraph, SegmentedText};
use once_cell::sync::Lazy;
use phf::{phf_set, Set};
use regex::Regex;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+(?:[-'’][\p{L}\p{N}]+)*").unwrap());

/// 英文缩写（小写，不含末尾句点）
static ABBREVIATIONS_EN: Set<&'static str> = phf_set! {
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "mt",
    "e.g", "i.e", "a.m", "p.m", "vol", "fig", "gen", "col", "lt", "etc",
};

/// 俄文缩写；"т. е." 这类带空格的形式在比较前去掉空格
static ABBREVIATIONS_RU: Set<&'static str> = phf_set! {
    "т.е", "т.д", "т.п", "т.к", "др", "гг", "г", "стр", "и.о", "напр",
    "ок", "см", "ср", "им", "ул", "д", "св", "тыс", "млн", "руб",
};

/// 可以出现在句末的俄文缩写：后接大写词时句子在此结束
static CLOSING_ABBREVIATIONS_RU: Set<&'static str> = phf_set! {
    "т.д", "т.п", "др",
};

/// 可以出现在句末的英文缩写
static CLOSING_ABBREVIATIONS_EN: Set<&'static str> = phf_set! {
    "etc",
};

const TERMINALS: &[char] = &['.', '!', '?', '…'];
const CLOSERS: &[char] = &['"', '\'', '”', '’', '»', ')', ']'];
const OPENERS: &[char] = &['"', '“', '„', '«', '(', '\''];
const DASHES: &[char] = &['—', '–', '-'];

/// 句子切分规则
#[derive(Debug, Clone, Copy)]
pub struct SentenceRules {
    abbreviations: &'static Set<&'static str>,
    closing_abbreviations: &'static Set<&'static str>,
    /// 终止标点后的对话破折号在后接大写词时视为句子边界
    dialogue_dash: bool,
}

impl SentenceRules {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::English => Self {
                abbreviations: &ABBREVIATIONS_EN,
                closing_abbreviations: &CLOSING_ABBREVIATIONS_EN,
                dialogue_dash: false,
            },
            Language::Russian => Self {
                abbreviations: &ABBREVIATIONS_RU,
                closing_abbreviations: &CLOSING_ABBREVIATIONS_RU,
                dialogue_dash: true,
            },
        }
    }

    /// `chars[at]` 是终止标点后的第一个非空白字符
    ///
    /// "— Почему? — спросила она." 中破折号后是作者的小写插话，仍属同一句
    fn starts_sentence(&self, chars: &[char], at: usize) -> bool {
        let c = chars[at];
        if c.is_uppercase() || OPENERS.contains(&c) {
            return true;
        }
        if !(self.dialogue_dash && DASHES.contains(&c)) {
            return false;
        }
        chars[at + 1..]
            .iter()
            .find(|c| c.is_alphanumeric())
            .is_some_and(|c| c.is_uppercase())
    }

    /// 句点是否属于缩写；`before` 是句点之前的文本，`next` 是其后第一个字符
    ///
    /// "т. д."、"etc." 这类可在句末出现的缩写后接大写词时仍算句子结束，
    /// 代价是 "и др. Пушкин" 这种写法会被切开
    fn is_abbreviation_period(&self, before: &str, next: char) -> bool {
        if next.is_uppercase() && self.ends_with(before, self.closing_abbreviations) {
            return false;
        }
        self.ends_with_abbreviation(before)
    }

    fn ends_with_abbreviation(&self, before: &str) -> bool {
        let Some(last) = last_token(before) else {
            return false;
        };

        // 单字母缩写名，如 "J. R. Tolkien"；代词 "I" 除外
        let mut letters = last.chars();
        if let (Some(first), None) = (letters.next(), letters.next()) {
            if first.is_uppercase() && first != 'I' {
                return true;
            }
        }

        self.ends_with(before, self.abbreviations)
    }

    /// 末尾词（或与前一个词拼接后，如 "т. е." → "т.е"）是否在表中
    fn ends_with(&self, before: &str, table: &Set<&'static str>) -> bool {
        let mut tokens = before.split_whitespace().rev();
        let last = match tokens.next() {
            Some(token) => strip_leading_punct(token),
            None => return false,
        };
        if last.is_empty() {
            return false;
        }

        let lower = last.to_lowercase();
        if table.contains(lower.as_str()) {
            return true;
        }

        if let Some(prev) = tokens.next() {
            let joined = format!("{}{}", strip_leading_punct(prev), last).to_lowercase();
            if table.contains(joined.as_str()) {
                return true;
            }
        }
        false
    }
}

fn strip_leading_punct(token: &str) -> &str {
    token.trim_start_matches(|c: char| !c.is_alphanumeric())
}

fn last_token(text: &str) -> Option<&str> {
    text.split_whitespace()
        .next_back()
        .map(strip_leading_punct)
        .filter(|token| !token.is_empty())
}

/// 按空行切分段落，丢弃空段落
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

/// 按规则切分句子，句内空白压缩为单个空格
pub fn split_sentences(text: &str, rules: &SentenceRules) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if !TERMINALS.contains(&chars[i]) {
            i += 1;
            continue;
        }

        // 连续的终止符与收尾引号
        let mut end = i + 1;
        while end < chars.len() && TERMINALS.contains(&chars[end]) {
            end += 1;
        }
        while end < chars.len() && CLOSERS.contains(&chars[end]) {
            end += 1;
        }

        let mut next = end;
        while next < chars.len() && chars[next].is_whitespace() {
            next += 1;
        }
        if next == end || next >= chars.len() {
            i = end;
            continue;
        }

        let single_period = chars[i] == '.' && end - i == 1;
        let before: String = chars[start..i].iter().collect();
        if rules.starts_sentence(&chars, next)
            && !(single_period && rules.is_abbreviation_period(&before, chars[next]))
        {
            push_sentence(&mut sentences, &chars[start..end]);
            start = next;
        }
        i = next;
    }

    if start < chars.len() {
        push_sentence(&mut sentences, &chars[start..]);
    }
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, chars: &[char]) {
    let raw: String = chars.iter().collect();
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        sentences.push(normalized);
    }
}

/// 词：字母 / 数字串，允许词内连字符和撇号
pub fn tokenize_words(text: &str) -> Vec<&str> {
    WORD_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// 完整切分
///
/// 不含任何字母的文本退化为一个段落、一个句子
pub fn segment(text: &str, language: Language) -> SegmentedText {
    let rules = SentenceRules::for_language(language);

    if !text.chars().any(char::is_alphabetic) {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        return SegmentedText {
            language,
            paragraphs: vec![Paragraph {
                text: collapsed.clone(),
                sentences: vec![collapsed],
            }],
        };
    }

    let paragraphs = split_paragraphs(text)
        .into_iter()
        .map(|text| {
            let sentences = split_sentences(&text, &rules);
            Paragraph { text, sentences }
        })
        .filter(|p| !p.sentences.is_empty())
        .collect();

    SegmentedText {
        language,
        paragraphs,
    }
}
