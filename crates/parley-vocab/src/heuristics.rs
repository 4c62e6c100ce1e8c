//! Pattern-matching guesses about words pulled from free text.
//!
//! None of this is a linguistic model. Everything goes through
//! [`VocabHeuristics`] so the pool can be given a different implementation.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::word::{Category, PartOfSpeech};

/// Minimum token length, in characters.
pub const MIN_TOKEN_CHARS: usize = 3;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Latin}+").expect("token pattern compiles"));

static SUFFIXES: LazyLock<Vec<(Regex, PartOfSpeech)>> = LazyLock::new(|| {
    [
        (r"(?:ement|amment|emment|mente|ly)$", PartOfSpeech::Adverb),
        (
            r"(?:tion|sion|ción|sión|ité|dad|ment|eur|ance|ence|isme|ism|ness|ship|aje|age)$",
            PartOfSpeech::Noun,
        ),
        (
            r"(?:eux|euse|ible|able|ique|ive|oso|osa|ful|ous|ical|ant)$",
            PartOfSpeech::Adjective,
        ),
        (r"(?:er|ir|oir|re|ar|ing|ed|ize)$", PartOfSpeech::Verb),
    ]
    .into_iter()
    .map(|(pattern, pos)| (Regex::new(pattern).expect("suffix pattern compiles"), pos))
    .collect()
});

const STOP_WORDS: &[&str] = &[
    // fr
    "les", "des", "une", "est", "sont", "mais", "que", "qui", "quoi", "pour", "dans", "avec",
    "sans", "pas", "sur", "sous", "par", "plus", "moins", "nous", "vous", "ils", "elle",
    "elles", "son", "sa", "ses", "mes", "tes", "nos", "vos", "leur", "leurs", "cette", "ces",
    "cet", "aux", "être", "avoir", "fait", "très", "bien", "tout", "tous", "toute", "comme",
    "donc", "car", "lui", "moi", "toi", "ici", "aussi", "encore", "alors", "quand", "oui",
    "non", "ont", "était", "suis", "sommes", "êtes",
    // es
    "los", "las", "del", "por", "para", "con", "sin", "una", "uno", "unos", "unas", "pero",
    "como", "más", "muy", "ese", "esa", "esto", "este", "esta", "son", "hay", "sus", "nos",
    "ellos", "ellas", "usted", "tiene", "también", "porque", "cuando",
    // en
    "the", "and", "for", "are", "but", "not", "you", "with", "this", "that", "have", "has",
    "had", "from", "was", "were", "they", "them", "their", "there", "what", "which", "who",
    "will", "would", "can", "could", "his", "her", "its", "our", "your", "all", "any", "been",
    "into", "than", "then", "also", "just", "very",
];

const BUSINESS_KEYWORDS: &[&str] = &[
    "marché", "entreprise", "réunion", "client", "clients", "vente", "ventes", "bureau",
    "contrat", "prix", "budget", "affaires", "société", "empresa", "mercado", "reunión",
    "cliente", "ventas", "oficina", "contrato", "precio", "negocio", "business", "market",
    "company", "meeting", "customer", "sales", "office", "contract", "price",
];

const ACADEMIC_KEYWORDS: &[&str] = &[
    "université", "recherche", "étude", "études", "théorie", "analyse", "science",
    "professeur", "universidad", "investigación", "estudio", "teoría", "análisis", "ciencia",
    "university", "research", "study", "theory", "analysis", "professor", "thesis",
];

const CASUAL_KEYWORDS: &[&str] = &[
    "salut", "sympa", "cool", "copain", "copine", "fête", "week", "hola", "amigo", "amiga",
    "fiesta", "genial", "hey", "buddy", "party", "awesome", "fun",
];

/// Word-level guesses used when a word enters the pool from free text.
pub trait VocabHeuristics: Send + Sync {
    /// Candidate words, lowercased, de-duplicated in first-seen order.
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Difficulty on the 1–5 scale.
    fn difficulty(&self, word: &str) -> u8;

    fn category(&self, word: &str, source_text: &str) -> Category;

    fn part_of_speech(&self, word: &str) -> PartOfSpeech;
}

/// Length/diacritic/keyword/suffix heuristics for French, Spanish and English.
#[derive(Clone, Debug)]
pub struct DefaultHeuristics {
    stop_words: HashSet<&'static str>,
}

impl Default for DefaultHeuristics {
    fn default() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }
}

impl DefaultHeuristics {
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }
}

impl VocabHeuristics for DefaultHeuristics {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        TOKEN
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
            .filter(|w| !self.is_stop_word(w))
            .filter(|w| seen.insert(w.clone()))
            .collect()
    }

    fn difficulty(&self, word: &str) -> u8 {
        let base: u8 = match word.chars().count() {
            0..=4 => 1,
            5..=6 => 2,
            7..=8 => 3,
            9..=11 => 4,
            _ => 5,
        };
        let accented = word.chars().any(|c| c.is_alphabetic() && !c.is_ascii());
        (base + u8::from(accented)).clamp(1, 5)
    }

    fn category(&self, word: &str, source_text: &str) -> Category {
        let source = source_text.to_lowercase();
        let hits = |keywords: &[&str]| {
            keywords.contains(&word)
                || TOKEN
                    .find_iter(&source)
                    .any(|m| keywords.contains(&m.as_str()))
        };
        if hits(BUSINESS_KEYWORDS) {
            Category::Business
        } else if hits(ACADEMIC_KEYWORDS) {
            Category::Academic
        } else if hits(CASUAL_KEYWORDS) {
            Category::Casual
        } else if self.difficulty(word) >= 5 {
            Category::Advanced
        } else {
            Category::Common
        }
    }

    fn part_of_speech(&self, word: &str) -> PartOfSpeech {
        SUFFIXES
            .iter()
            .find(|(pattern, _)| pattern.is_match(word))
            .map(|(_, pos)| *pos)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_keeps_accents_and_drops_short_and_stop_words() {
        let h = DefaultHeuristics::default();
        assert_eq!(
            h.tokenize("Le marché est difficile mais le système fonctionne"),
            vec!["marché", "difficile", "système", "fonctionne"]
        );
        assert_eq!(h.tokenize("Je comprends le problème"), vec!["comprends", "problème"]);
    }

    #[test]
    fn tokenize_dedupes_and_splits_on_apostrophes() {
        let h = DefaultHeuristics::default();
        assert_eq!(
            h.tokenize("L'économie, l'économie! Año 2024: niño"),
            vec!["économie", "año", "niño"]
        );
    }

    #[test]
    fn difficulty_grows_with_length_and_diacritics() {
        let h = DefaultHeuristics::default();
        assert_eq!(h.difficulty("chat"), 1);
        assert_eq!(h.difficulty("merci"), 2);
        assert_eq!(h.difficulty("marché"), 3);
        assert_eq!(h.difficulty("fonctionne"), 4);
        assert_eq!(h.difficulty("développement"), 5);
        assert!(h.difficulty("système") > h.difficulty("systeme"));
    }

    #[test]
    fn category_matches_source_keywords() {
        let h = DefaultHeuristics::default();
        let text = "Le marché est difficile mais le système fonctionne";
        assert_eq!(h.category("difficile", text), Category::Business);
        assert_eq!(h.category("thèse", "À l'université, la recherche avance"), Category::Academic);
        assert_eq!(h.category("soirée", "Salut ! La fête était sympa"), Category::Casual);
        assert_eq!(h.category("chat", "Le chat dort"), Category::Common);
        assert_eq!(h.category("anticonstitutionnel", "rien"), Category::Advanced);
    }

    #[test]
    fn part_of_speech_by_suffix() {
        let h = DefaultHeuristics::default();
        assert_eq!(h.part_of_speech("rapidement"), PartOfSpeech::Adverb);
        assert_eq!(h.part_of_speech("situation"), PartOfSpeech::Noun);
        assert_eq!(h.part_of_speech("heureux"), PartOfSpeech::Adjective);
        assert_eq!(h.part_of_speech("parler"), PartOfSpeech::Verb);
        assert_eq!(h.part_of_speech("chat"), PartOfSpeech::Unknown);
    }
}
