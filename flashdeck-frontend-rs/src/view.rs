use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::card_store::Card;
use crate::language::Language;
use crate::translation::ResolvedText;

pub const STATUS_TRANSLATING: &str = "Translating…";
pub const STATUS_UNAVAILABLE: &str = "Translation unavailable right now. Showing original text.";

pub fn translated_status(language: Language) -> String {
    format!("Auto-translated to {}.", language.name())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct TagPill {
    pub tag: String,
    pub color: String,
}

impl TagPill {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            color: tag_color(tag),
        }
    }
}

/// A stable pastel color per tag.
pub fn tag_color(tag: &str) -> String {
    let hue = xxh3_64(tag.as_bytes()) % 360;
    format!("hsl({hue}, 78%, 72%)")
}

/// What the rendering layer needs to draw one card. Interactive elements (edit, delete, tag toggles)
/// are only drawn when `read_only` is false.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct CardView {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub tags: Vec<TagPill>,
    pub language: Language,
    pub learned: bool,
    pub read_only: bool,
}

impl CardView {
    pub fn native(card: &Card) -> Self {
        Self::with_text(card, &ResolvedText::native(card))
    }

    /// Translated text is shown read-only, so edits always apply to the card's own text.
    pub fn with_text(card: &Card, text: &ResolvedText) -> Self {
        Self {
            id: card.id.to_string(),
            question: text.question.clone(),
            answer: text.answer.clone(),
            tags: card.tags.iter().map(|tag| TagPill::new(tag)).collect(),
            language: card.language,
            learned: card.learned,
            read_only: text.was_translated,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct StudyView {
    pub card: Option<CardView>,
    /// `"<n> / <total>"`, or `"0 / 0"` for an empty deck.
    pub position: String,
    pub status: String,
}

impl StudyView {
    pub fn position_label((position, len): (usize, usize)) -> String {
        format!("{position} / {len}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct CardGrid {
    pub cards: Vec<CardView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct DeckStats {
    pub total_cards: usize,
    pub category_cards: usize,
    pub viewed_cards: usize,
    /// Rounded percentage of learned cards in the selected category.
    pub learned_percent: u32,
    pub tag_counts: Vec<TagCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_color_is_stable_hsl() {
        let color = tag_color("Kubernetes");
        assert_eq!(color, tag_color("Kubernetes"));
        assert!(color.starts_with("hsl("));
        assert!(color.ends_with(", 78%, 72%)"));

        let hue: u64 = color["hsl(".len()..color.find(',').unwrap()].parse().unwrap();
        assert!(hue < 360);
    }

    #[test]
    fn test_translated_card_is_read_only() {
        let card = Card::new(
            "Q".to_string(),
            "A".to_string(),
            vec!["Docker".to_string()],
            Language::English,
        );
        let native = CardView::native(&card);
        assert!(!native.read_only);
        assert_eq!(native.tags[0], TagPill::new("Docker"));

        let translated = CardView::with_text(
            &card,
            &ResolvedText {
                question: "P".to_string(),
                answer: "R".to_string(),
                was_translated: true,
                failed: false,
            },
        );
        assert!(translated.read_only);
        assert_eq!(translated.question, "P");
    }

    #[test]
    fn test_status_text() {
        assert_eq!(
            translated_status(Language::Spanish),
            "Auto-translated to Spanish."
        );
        assert_eq!(StudyView::position_label((0, 0)), "0 / 0");
        assert_eq!(StudyView::position_label((2, 7)), "2 / 7");
    }
}
