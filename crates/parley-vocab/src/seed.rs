//! Curated frequency lists used to seed a pool before the first turn.

use crate::word::Category;

/// Leading entries of every list that are function words (articles,
/// pronouns, auxiliaries) and never seeded.
pub const SKIP_TOP: usize = 12;

const FRENCH: &[&str] = &[
    "le", "la", "de", "et", "un", "être", "avoir", "que", "pour", "dans", "ce", "il",
    "bonjour", "merci", "maison", "temps", "travail", "jour", "ville", "ami", "famille",
    "manger", "parler", "voyage", "argent", "question", "problème", "école", "marché",
    "prix", "bureau", "entreprise", "réunion", "client", "projet", "semaine", "matin",
    "soir", "restaurant", "voiture", "comprendre", "apprendre", "système", "difficile",
    "heureusement", "développement",
];

const SPANISH: &[&str] = &[
    "el", "la", "de", "que", "y", "a", "en", "un", "ser", "se", "no", "haber",
    "hola", "gracias", "casa", "tiempo", "trabajo", "día", "ciudad", "amigo", "familia",
    "comer", "hablar", "viaje", "dinero", "pregunta", "problema", "escuela", "mercado",
    "precio", "oficina", "empresa", "reunión", "cliente", "proyecto", "semana", "mañana",
    "noche", "restaurante", "coche", "entender", "aprender", "sistema", "difícil",
    "desarrollo",
];

const ENGLISH: &[&str] = &[
    "the", "be", "to", "of", "and", "a", "in", "that", "have", "it", "for", "not",
    "hello", "thanks", "house", "time", "work", "day", "city", "friend", "family", "eat",
    "speak", "travel", "money", "question", "problem", "school", "market", "price",
    "office", "company", "meeting", "customer", "project", "week", "morning", "evening",
    "restaurant", "car", "understand", "learn", "system", "difficult", "development",
];

const BUSINESS: &[&str] = &[
    "travail", "argent", "marché", "prix", "bureau", "entreprise", "réunion", "client",
    "projet", "trabajo", "dinero", "mercado", "precio", "oficina", "empresa", "reunión",
    "cliente", "proyecto", "work", "money", "market", "price", "office", "company",
    "meeting", "customer", "project",
];

/// One seedable word with its derived attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedWord {
    pub word: &'static str,
    pub frequency: u32,
    pub difficulty: u8,
    pub category: Category,
}

pub fn frequency_list(language: &str) -> Option<&'static [&'static str]> {
    match language {
        "fr" => Some(FRENCH),
        "es" => Some(SPANISH),
        "en" => Some(ENGLISH),
        _ => None,
    }
}

/// Seed words for `language`, most frequent first. Empty for unknown languages.
///
/// Frequency is `len - index` over the full list; difficulty is the rank
/// quintile (1..=5) among the kept words.
pub fn seed_words(language: &str) -> Vec<SeedWord> {
    let Some(list) = frequency_list(language) else {
        return Vec::new();
    };
    let kept = list.len().saturating_sub(SKIP_TOP);
    list.iter()
        .enumerate()
        .skip(SKIP_TOP)
        .map(|(index, &word)| {
            let rank = index - SKIP_TOP;
            SeedWord {
                word,
                frequency: (list.len() - index) as u32,
                difficulty: (1 + rank * 5 / kept.max(1)).min(5) as u8,
                category: if BUSINESS.contains(&word) {
                    Category::Business
                } else {
                    Category::Common
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_function_words() {
        let words = seed_words("fr");
        assert_eq!(words.len(), FRENCH.len() - SKIP_TOP);
        assert_eq!(words[0].word, "bonjour");
        assert!(words.iter().all(|w| w.word != "le" && w.word != "être"));
    }

    #[test]
    fn frequency_descends_and_difficulty_ascends() {
        let words = seed_words("es");
        for pair in words.windows(2) {
            assert!(pair[0].frequency > pair[1].frequency);
            assert!(pair[0].difficulty <= pair[1].difficulty);
        }
        assert_eq!(words.first().map(|w| w.difficulty), Some(1));
        assert_eq!(words.last().map(|w| w.difficulty), Some(5));
    }

    #[test]
    fn business_allow_list_sets_category() {
        let words = seed_words("en");
        let market = words.iter().find(|w| w.word == "market").unwrap();
        assert_eq!(market.category, Category::Business);
        let friend = words.iter().find(|w| w.word == "friend").unwrap();
        assert_eq!(friend.category, Category::Common);
    }

    #[test]
    fn unknown_language_is_empty() {
        assert!(seed_words("tlh").is_empty());
        assert!(frequency_list("de").is_none());
    }
}
