//! 评判标准的自动生成
//!
//! 调用方没有提供标准时，根据预分析结果生成一份有序列表：
//! 15 条基础标准在前，随后是由预分析触发的条件标准和由词汇信号触发的文本类型标准。

use super::segmentation::tokenize_words;
use crate::models::{DeterministicAnalysis, Language, RequirementSet};
use tracing::info;

const BASELINE_EN: [&str; 15] = [
    "Comprehensibility: Can a general reader follow the text on first reading? Point to the exact phrases that would make them stop and reread.",
    "Pathos and pomposity: Look for solemn, bombastic or melodramatic phrasing the content has not earned. Quote it and explain what makes it feel inflated.",
    "Clichés: Find stock phrases, worn metaphors and filler. Name each one and describe what a fresher angle would achieve, without rewriting it.",
    "Logical consistency: Check for contradictions and impossibilities inside the text's own world. Cite both sides of every contradiction.",
    "Terminology load: Flag jargon, invented terms and archaisms that are used without explanation. Judge whether context alone makes them clear.",
    "Realism of description: Assess whether physical details, actions and scene logistics are plausible. Note any detail that breaks the reader's trust.",
    "Pacing: Evaluate transitions, rushed passages and digressions. Identify where the text drags or skips ahead.",
    "Pronoun clarity: Verify that every pronoun has one obvious antecedent. List each case where he, she, it or they could point to more than one entity.",
    "Redundancy: Identify tautologies, restated ideas and sentences that could go without losing information.",
    "Voice consistency: Track narrative register, tense and person. Report every unmotivated shift.",
    "Dialogue: If dialogue is present, judge whether it sounds like speech and whether the speakers are distinguishable.",
    "Emotional impact: Decide whether the text earns the emotional response it aims for, or falls flat or overshoots.",
    "Sentence complexity: Flag sentences whose structure obscures their meaning. Indicate where a split would help, without supplying the rewrite.",
    "Style and register: Check that word choice fits the apparent genre and audience. Note ornate or affected vocabulary that gets in the way.",
    "Structural coherence: Outline what each paragraph does and whether the sequence builds toward a point.",
];

const BASELINE_RU: [&str; 15] = [
    "Понятность: Понятен ли текст при первом чтении? Укажите конкретные фразы, которые заставят читателя остановиться и перечитать.",
    "Пафос и напыщенность: Найдите торжественные, высокопарные или мелодраматичные обороты, не оправданные содержанием. Процитируйте их и объясните, что создаёт ощущение фальши.",
    "Клише: Найдите штампы, затёртые метафоры и слова-паразиты. Назовите каждое и опишите, чего мог бы добиться более свежий образ, не переписывая текст.",
    "Логическая непротиворечивость: Проверьте противоречия и невозможности внутри мира текста. Для каждого противоречия приведите обе стороны.",
    "Терминологическая нагрузка: Отметьте жаргон, выдуманные термины и архаизмы без пояснения. Оцените, проясняет ли их контекст.",
    "Реалистичность описаний: Оцените правдоподобие физических деталей, действий и логистики сцен. Отметьте детали, подрывающие доверие читателя.",
    "Темп: Оцените переходы, скомканные фрагменты и отступления. Укажите, где текст затягивается или перескакивает.",
    "Ясность местоимений: Убедитесь, что у каждого местоимения один очевидный антецедент. Перечислите случаи, где «он», «она», «оно» или «они» могут относиться к нескольким объектам.",
    "Избыточность: Найдите тавтологии, повторённые мысли и предложения, которые можно убрать без потери информации.",
    "Единство голоса: Проследите регистр, время и лицо повествования. Отметьте каждый немотивированный сдвиг.",
    "Диалоги: Если в тексте есть диалоги, оцените, звучат ли они как живая речь и различимы ли голоса персонажей.",
    "Эмоциональное воздействие: Решите, добивается ли текст задуманной эмоциональной реакции или недотягивает либо перебарщивает.",
    "Сложность предложений: Отметьте предложения, структура которых затемняет смысл. Укажите, где помогло бы разбиение, не предлагая готовой переработки.",
    "Стиль и регистр: Проверьте, соответствует ли лексика жанру и аудитории. Отметьте вычурные или манерные слова, мешающие чтению.",
    "Структурная связность: Опишите функцию каждого абзаца и то, ведёт ли их последовательность к какой-то цели.",
];

/// 文本类型信号：词干前缀匹配（`exact` 时整词匹配）
struct MarkerSet {
    en: &'static [&'static str],
    ru: &'static [&'static str],
    exact: bool,
}

const FANTASY_MARKERS: MarkerSet = MarkerSet {
    en: &[
        "fairy", "elf", "elves", "wizard", "magic", "potion", "castle", "dragon", "spell",
        "enchant", "nymph", "sorcer", "wondrous",
    ],
    ru: &[
        "фея", "фей", "эльф", "маг", "волшеб", "зелье", "снадобье", "замок", "дракон",
        "заклина", "нимф", "чудес", "колдов",
    ],
    exact: false,
};

const CHILDREN_MARKERS: MarkerSet = MarkerSet {
    en: &[
        "little", "bunny", "kitten", "puppy", "cottage", "meadow", "teddy", "tale", "mommy",
        "daddy",
    ],
    ru: &[
        "феечк", "котик", "зайчик", "дорожк", "полянк", "тропинк", "избушк", "сказк", "ёжик",
        "мишк",
    ],
    exact: false,
};

const ARCHAIC_MARKERS: MarkerSet = MarkerSet {
    en: &[
        "hath", "thou", "thee", "doth", "wherefore", "forsooth", "thine", "whilst", "ere",
        "betwixt", "perchance", "methinks",
    ],
    ru: &[
        "эдакую", "нынче", "токмо", "оный", "сей", "дабы", "ибо", "чело", "уста", "молвил",
        "рёк", "запамятовала", "дивно", "сделалась", "отнюдь",
    ],
    exact: true,
};

/// 文本类型信号至少出现的次数
const LEXICAL_MIN_HITS: usize = 2;

impl MarkerSet {
    fn count(&self, language: Language, tokens: &[String]) -> usize {
        let markers = match language {
            Language::English => self.en,
            Language::Russian => self.ru,
        };
        tokens
            .iter()
            .filter(|token| {
                markers.iter().any(|m| {
                    if self.exact {
                        token.as_str() == *m
                    } else {
                        token.starts_with(m)
                    }
                })
            })
            .count()
    }
}

/// 对话信号：引号和对话破折号的数量
fn dialogue_signals(text: &str) -> usize {
    let quotes = text
        .chars()
        .filter(|c| matches!(c, '"' | '“' | '«'))
        .count();
    let dashes = text
        .lines()
        .filter(|line| line.trim_start().starts_with(|c: char| matches!(c, '—' | '–')))
        .count()
        + text.matches(" — ").count();
    quotes + dashes
}

/// 由预分析结果触发的条件标准
fn conditional_criteria(analysis: &DeterministicAnalysis) -> Vec<String> {
    let ru = analysis.language.is_russian();
    let r = &analysis.readability;
    let mut criteria = Vec::new();

    if r.long_sentence_ratio > 0.15 {
        criteria.push(if ru {
            format!(
                "Сложность предложений (по данным анализа): {} из {} предложений длиннее 25 слов. Оцените, можно ли разбить их без потери смысла.",
                r.long_sentence_count, analysis.sentence_count
            )
        } else {
            format!(
                "Sentence complexity (measured): {} of {} sentences exceed 25 words. Assess whether they can be split without losing meaning.",
                r.long_sentence_count, analysis.sentence_count
            )
        });
    }

    if r.very_long_sentence_count > 0 {
        criteria.push(if ru {
            format!(
                "Упрощение: {} предложений длиннее 40 слов. Проверьте каждое на перегруженность придаточными.",
                r.very_long_sentence_count
            )
        } else {
            format!(
                "Simplification: {} sentences exceed 40 words. Check each one for stacked clauses.",
                r.very_long_sentence_count
            )
        });
    }

    if r.vocabulary_richness < 0.6 && analysis.word_count > 50 {
        criteria.push(if ru {
            format!(
                "Повторы лексики: богатство словаря {:.2} (ожидается больше 0.60). Проверьте, не перегружен ли текст одними и теми же словами.",
                r.vocabulary_richness
            )
        } else {
            format!(
                "Lexical repetition: vocabulary richness is {:.2} (expected above 0.60). Check whether the same words carry too much of the text.",
                r.vocabulary_richness
            )
        });
    }

    if r.vocabulary_richness > 0.9 && analysis.word_count > 100 {
        criteria.push(if ru {
            "Вычурность: очень высокое лексическое разнообразие. Проверьте, не вызвано ли оно редкими словами там, где подошли бы простые.".to_string()
        } else {
            "Ornateness: lexical diversity is very high. Check whether rare words are used where plain ones would serve.".to_string()
        });
    }

    if analysis.has_repetitions() {
        let top: Vec<String> = analysis
            .ngram_repetitions
            .iter()
            .chain(analysis.word_repetitions.iter())
            .take(5)
            .map(|item| format!("\"{}\" ({}x)", item.phrase, item.count))
            .collect();
        criteria.push(if ru {
            format!(
                "Повторяющиеся фразы: {}. Оцените, намеренны ли повторы или их стоит устранить.",
                top.join(", ")
            )
        } else {
            format!(
                "Repeated phrases: {}. Judge whether the repetition is deliberate or should be removed.",
                top.join(", ")
            )
        });
    }

    if !analysis.coreference_flags.is_empty() {
        criteria.push(if ru {
            format!(
                "Ясность местоимений (по данным анализа): {} местоимений без очевидного антецедента. Для каждого установите, к кому или чему оно относится.",
                analysis.coreference_flags.len()
            )
        } else {
            format!(
                "Pronoun clarity (measured): {} pronouns lack an obvious antecedent. Establish who or what each one refers to.",
                analysis.coreference_flags.len()
            )
        });
    }

    if !analysis.dangling_modifier_flags.is_empty() {
        criteria.push(if ru {
            format!(
                "Согласование оборотов: {} возможных висячих оборотов. Проверьте, относятся ли причастные и деепричастные обороты к правильному подлежащему.",
                analysis.dangling_modifier_flags.len()
            )
        } else {
            format!(
                "Modifier clarity: {} possible dangling modifiers. Verify that each introductory phrase attaches to the right subject.",
                analysis.dangling_modifier_flags.len()
            )
        });
    }

    if analysis.word_count < 100 {
        criteria.push(if ru {
            "Фрагмент: текст короче 100 слов и может быть вырван из контекста. Не снижайте оценку за незавершённость.".to_string()
        } else {
            "Fragment: the text is under 100 words and may be an excerpt. Do not penalize it for incompleteness.".to_string()
        });
    }

    if analysis.paragraph_count > 5 && analysis.avg_paragraph_words() < 15.0 {
        criteria.push(if ru {
            "Структура с короткими абзацами: много коротких абзацев, вероятно, текст насыщен диалогами. Оцените, как диалоги двигают повествование.".to_string()
        } else {
            "Dialogue-heavy structure: many short paragraphs suggest heavy dialogue. Evaluate how the exchanges move the narrative.".to_string()
        });
    }

    criteria
}

/// 由词汇信号触发的文本类型标准
fn lexical_criteria(language: Language, text: &str) -> Vec<String> {
    let ru = language.is_russian();
    let tokens: Vec<String> = tokenize_words(text)
        .into_iter()
        .map(str::to_lowercase)
        .collect();
    let mut criteria = Vec::new();

    if dialogue_signals(text) >= LEXICAL_MIN_HITS {
        criteria.push(if ru {
            "Реплики: в тексте есть диалог. Оцените естественность реплик, различимость голосов и вклад диалога в сюжет.".to_string()
        } else {
            "Speech: the text contains dialogue. Assess how natural the lines are, how distinct the voices are and what the exchanges add to the plot.".to_string()
        });
    }

    if FANTASY_MARKERS.count(language, &tokens) >= LEXICAL_MIN_HITS {
        criteria.push(if ru {
            "Сказочные элементы: оцените внутреннюю логику волшебного мира и баланс между стилизацией и ясностью.".to_string()
        } else {
            "Fantasy elements: assess the internal logic of the magic and the balance between whimsy and clarity.".to_string()
        });
    }

    if CHILDREN_MARKERS.count(language, &tokens) >= LEXICAL_MIN_HITS {
        criteria.push(if ru {
            "Детская аудитория: проверьте, соответствуют ли лексика и конструкции возрасту вероятных читателей.".to_string()
        } else {
            "Young audience: check whether vocabulary and sentence structure suit the likely age of the readers.".to_string()
        });
    }

    let archaic = ARCHAIC_MARKERS.count(language, &tokens);
    if archaic >= LEXICAL_MIN_HITS {
        criteria.push(if ru {
            format!(
                "Архаичная лексика: найдено {} архаизмов. Оцените их уместность, не мешают ли они пониманию и выдержана ли стилизация.",
                archaic
            )
        } else {
            format!(
                "Archaic register: {} archaic words found. Assess whether they fit, whether they block comprehension and whether the stylization is consistent.",
                archaic
            )
        });
    }

    criteria
}

/// 根据预分析自动生成评判标准
///
/// 确定性：相同输入总得到相同列表；基础标准总在最前，共 15 到 28 条
pub fn generate_requirements(analysis: &DeterministicAnalysis, text: &str) -> RequirementSet {
    let baseline: &[&str] = match analysis.language {
        Language::English => &BASELINE_EN,
        Language::Russian => &BASELINE_RU,
    };
    let conditional = conditional_criteria(analysis);
    let lexical = lexical_criteria(analysis.language, text);

    info!(
        "自动生成评判标准 {} 条 (基础 {} + 条件 {} + 文本类型 {})",
        baseline.len() + conditional.len() + lexical.len(),
        baseline.len(),
        conditional.len(),
        lexical.len()
    );

    let criteria = baseline
        .iter()
        .map(|c| c.to_string())
        .chain(conditional)
        .chain(lexical)
        .collect();
    RequirementSet::generated(criteria)
}

/// 调用方提供了非空标准时原样使用，否则自动生成
pub fn resolve_requirements(
    supplied: Option<&str>,
    analysis: &DeterministicAnalysis,
    text: &str,
) -> RequirementSet {
    supplied
        .and_then(RequirementSet::supplied)
        .unwrap_or_else(|| generate_requirements(analysis, text))
}
