//! 语言检测（确定性，不调用 LLM）

use crate::models::Language;
use phf::{phf_set, Set};

/// 西里尔字母占比超过该值即判定为俄语
const CYRILLIC_RATIO_THRESHOLD: f64 = 0.3;

/// 英文停用词命中率达到该值即视为满分
const STOPWORD_SATURATION: f64 = 0.25;

static STOPWORDS_EN: Set<&'static str> = phf_set! {
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "will", "would", "shall",
    "should", "may", "might", "must", "can", "could", "to", "of", "in",
    "for", "on", "with", "at", "by", "from", "as", "into", "through",
    "during", "before", "after", "above", "below", "between", "out",
    "off", "over", "under", "again", "further", "then", "once", "and",
    "but", "or", "nor", "not", "no", "so", "if", "it", "its", "this",
    "that", "these", "those", "he", "she", "they", "we", "you", "i",
    "me", "him", "her", "us", "them", "my", "your", "his", "our",
    "their", "what", "which", "who", "whom", "how", "when", "where",
    "why", "all", "each", "every", "both", "few", "more", "most",
    "other", "some", "such", "only", "own", "same", "than", "too",
    "very", "just", "about", "up",
};

static STOPWORDS_RU: Set<&'static str> = phf_set! {
    "и", "в", "на", "с", "не", "что", "он", "она", "они", "мы", "вы",
    "я", "это", "но", "по", "к", "из", "у", "за", "от", "до", "о",
    "же", "ли", "бы", "да", "нет", "так", "как", "все", "был", "была",
    "было", "были", "быть", "его", "её", "их", "ее", "мой", "мне",
    "мной", "тот", "та", "то", "те", "этот", "эта", "эти", "этого",
    "для", "при", "через", "после", "перед", "между", "во", "со",
    "уже", "ещё", "еще", "тоже", "также", "только", "если", "чем",
    "когда", "где", "кто", "чей", "свой", "себя", "сам", "сама",
    "весь", "вся", "всё", "вот", "ни", "даже",
};

/// 小写词是否为该语言的停用词
pub fn is_stopword(language: Language, word: &str) -> bool {
    match language {
        Language::English => STOPWORDS_EN.contains(word),
        Language::Russian => STOPWORDS_RU.contains(word),
    }
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё')
}

/// 检测文本主要语言
///
/// # 返回
/// (语言, 置信度)。没有任何字母时返回 (English, 0.0)
pub fn detect_language(text: &str) -> (Language, f64) {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return (Language::English, 0.0);
    }

    let cyrillic = letters.iter().filter(|c| is_cyrillic(**c)).count();
    let cyrillic_ratio = cyrillic as f64 / letters.len() as f64;
    if cyrillic_ratio > CYRILLIC_RATIO_THRESHOLD {
        return (Language::Russian, round4(cyrillic_ratio));
    }

    // 词典法：拉丁字母占比 × 停用词命中率
    let latin = letters.iter().filter(|c| c.is_ascii_alphabetic()).count();
    let latin_ratio = latin as f64 / letters.len() as f64;

    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let stop_ratio = if words.is_empty() {
        0.0
    } else {
        let hits = words
            .iter()
            .filter(|w| is_stopword(Language::English, w))
            .count();
        hits as f64 / words.len() as f64
    };

    let dictionary_score = (stop_ratio / STOPWORD_SATURATION).min(1.0);
    let confidence = latin_ratio * (0.5 + 0.5 * dictionary_score);
    (Language::English, round4(confidence))
}

/// 常见语言代码的可读名称
pub fn language_name(code: &str) -> String {
    match code {
        "en" => "English".to_string(),
        "ru" => "Russian".to_string(),
        "de" => "German".to_string(),
        "fr" => "French".to_string(),
        "es" => "Spanish".to_string(),
        "it" => "Italian".to_string(),
        "pt" => "Portuguese".to_string(),
        other => other.to_uppercase(),
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_russian() {
        let (lang, conf) = detect_language("Он шёл по улице. Он остановился.");
        assert_eq!(lang, Language::Russian);
        assert!(conf > 0.9);
    }

    #[test]
    fn test_detect_english_with_dictionary_confidence() {
        let (lang, conf) =
            detect_language("The cat sat on the mat and it was happy with the sun.");
        assert_eq!(lang, Language::English);
        assert!(conf > 0.9, "confidence {}", conf);
    }

    #[test]
    fn test_latin_without_stopwords_has_lower_confidence() {
        let (_, strong) = detect_language("The dog and the cat are in the house.");
        let (_, weak) = detect_language("Xylophone quasar zeppelin.");
        assert!(weak < strong);
        assert!(weak >= 0.5);
    }

    #[test]
    fn test_mixed_text_below_threshold_is_english() {
        // 少量西里尔字母不改变判定
        let (lang, _) = detect_language("The word мир means peace in another language.");
        assert_eq!(lang, Language::English);
    }

    #[test]
    fn test_no_letters() {
        assert_eq!(detect_language("12345 ... !!!"), (Language::English, 0.0));
        assert_eq!(detect_language(""), (Language::English, 0.0));
    }

    #[test]
    fn test_language_name() {
        assert_eq!(language_name("ru"), "Russian");
        assert_eq!(language_name("xx"), "XX");
    }

    #[test]
    fn test_stopwords() {
        assert!(is_stopword(Language::English, "the"));
        assert!(is_stopword(Language::Russian, "и"));
        assert!(!is_stopword(Language::English, "dragon"));
    }
}
