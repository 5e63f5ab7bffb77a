//! Display text for a card in a given language: the card's own text, a cached translation, or a fresh one.
//!
//! Resolution is split so that callers holding state in a `RefCell` never keep a borrow across an `.await`:
//! [`lookup`] is synchronous and either answers immediately or hands back a [`TranslationRequest`],
//! [`TranslationRequest::fetch`] is the only suspending step, and [`TranslationCache::store`] records the result.
//! [`resolve`] chains the three for callers that own their cache outright.

use std::collections::HashMap;
use std::fmt;

use crate::card_id::CardId;
use crate::card_store::Card;
use crate::language::Language;
use crate::translator::{TranslateError, Translator};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextField {
    Question,
    Answer,
}

impl TextField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextField::Question => "question",
            TextField::Answer => "answer",
        }
    }

    fn parse(field: &str) -> Option<Self> {
        match field {
            "question" => Some(TextField::Question),
            "answer" => Some(TextField::Answer),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TranslationKey {
    pub card_id: CardId,
    pub language: Language,
    pub field: TextField,
}

impl TranslationKey {
    pub fn new(card_id: CardId, language: Language, field: TextField) -> Self {
        Self {
            card_id,
            language,
            field,
        }
    }

    /// Parses the `<card id>:<language>:<field>` form used in the persisted document.
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.rsplitn(3, ':');
        let field = TextField::parse(parts.next()?)?;
        let language = Language::from_iso_639_1(parts.next()?)?;
        let card_id = parts.next().filter(|id| !id.is_empty())?;
        Some(Self::new(CardId::from(card_id), language, field))
    }
}

impl fmt::Display for TranslationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.card_id,
            self.language.iso_639_1(),
            self.field.as_str()
        )
    }
}

/// Previously fetched translations. Entries are only removed when their card is edited or deleted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TranslationCache {
    entries: HashMap<TranslationKey, String>,
}

impl TranslationCache {
    pub fn get(&self, key: &TranslationKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: TranslationKey, text: String) {
        self.entries.insert(key, text);
    }

    /// Both fields of a card are cached for `language`.
    pub fn contains_pair(&self, card_id: &CardId, language: Language) -> bool {
        [TextField::Question, TextField::Answer].into_iter().all(|field| {
            self.entries
                .contains_key(&TranslationKey::new(card_id.clone(), language, field))
        })
    }

    pub fn store(&mut self, fetched: &FetchedTranslation) {
        for (field, text) in [
            (TextField::Question, &fetched.question),
            (TextField::Answer, &fetched.answer),
        ] {
            self.insert(
                TranslationKey::new(fetched.card_id.clone(), fetched.language, field),
                text.clone(),
            );
        }
    }

    /// Returns how many entries were dropped.
    pub fn forget_card(&mut self, card_id: &CardId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| &key.card_id != card_id);
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TranslationKey, &str)> {
        self.entries.iter().map(|(key, text)| (key, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedText {
    pub question: String,
    pub answer: String,
    pub was_translated: bool,
    pub failed: bool,
}

impl ResolvedText {
    pub fn native(card: &Card) -> Self {
        Self {
            question: card.question.clone(),
            answer: card.answer.clone(),
            was_translated: false,
            failed: false,
        }
    }

    /// The card's own text, flagged as a failed translation. Never mixes translated and native fields.
    pub fn fallback(request: &TranslationRequest) -> Self {
        Self {
            question: request.question.clone(),
            answer: request.answer.clone(),
            was_translated: false,
            failed: true,
        }
    }
}

/// A pending translation, tagged with the card and language it was dispatched for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationRequest {
    pub card_id: CardId,
    pub source: Language,
    pub target: Language,
    pub question: String,
    pub answer: String,
}

impl TranslationRequest {
    /// Requests both fields concurrently. Either both succeed or the whole fetch fails.
    pub async fn fetch<T: Translator>(
        &self,
        translator: &T,
    ) -> Result<FetchedTranslation, TranslateError> {
        let (question, answer) = futures::try_join!(
            translator.translate(&self.question, self.source, self.target),
            translator.translate(&self.answer, self.source, self.target),
        )?;
        Ok(FetchedTranslation {
            card_id: self.card_id.clone(),
            language: self.target,
            question,
            answer,
        })
    }

    pub fn targets(&self, card_id: &CardId, language: Language) -> bool {
        &self.card_id == card_id && self.target == language
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedTranslation {
    pub card_id: CardId,
    pub language: Language,
    pub question: String,
    pub answer: String,
}

impl From<FetchedTranslation> for ResolvedText {
    fn from(fetched: FetchedTranslation) -> Self {
        Self {
            question: fetched.question,
            answer: fetched.answer,
            was_translated: true,
            failed: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    Native(ResolvedText),
    Cached(ResolvedText),
    Miss(TranslationRequest),
}

pub fn lookup(card: &Card, target: Language, cache: &TranslationCache) -> Lookup {
    if card.language == target {
        return Lookup::Native(ResolvedText::native(card));
    }

    let question = cache.get(&TranslationKey::new(
        card.id.clone(),
        target,
        TextField::Question,
    ));
    let answer = cache.get(&TranslationKey::new(
        card.id.clone(),
        target,
        TextField::Answer,
    ));
    if let (Some(question), Some(answer)) = (question, answer) {
        return Lookup::Cached(ResolvedText {
            question: question.to_string(),
            answer: answer.to_string(),
            was_translated: true,
            failed: false,
        });
    }

    Lookup::Miss(TranslationRequest {
        card_id: card.id.clone(),
        source: card.language,
        target,
        question: card.question.clone(),
        answer: card.answer.clone(),
    })
}

pub async fn resolve<T: Translator>(
    card: &Card,
    target: Language,
    cache: &mut TranslationCache,
    translator: &T,
) -> ResolvedText {
    match lookup(card, target, cache) {
        Lookup::Native(text) | Lookup::Cached(text) => text,
        Lookup::Miss(request) => match request.fetch(translator).await {
            Ok(fetched) => {
                cache.store(&fetched);
                fetched.into()
            }
            Err(e) => {
                log::warn!("Translating card {} failed: {e}", request.card_id);
                ResolvedText::fallback(&request)
            }
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::{Cell, RefCell};

    /// Prefixes text with the target language code. Fails for any text listed in `fail_on`.
    #[derive(Default)]
    pub(crate) struct FakeTranslator {
        pub calls: Cell<usize>,
        pub fail_on: RefCell<Vec<String>>,
    }

    impl FakeTranslator {
        pub(crate) fn failing_on(text: &str) -> Self {
            let translator = Self::default();
            translator.fail_on.borrow_mut().push(text.to_string());
            translator
        }
    }

    impl Translator for FakeTranslator {
        async fn translate(
            &self,
            text: &str,
            _source: Language,
            target: Language,
        ) -> Result<String, TranslateError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_on.borrow().iter().any(|t| t == text) {
                return Err(TranslateError::Status(503));
            }
            Ok(format!("[{}] {text}", target.iso_639_1()))
        }
    }

    fn english_card() -> Card {
        Card::new(
            "What is a pod?".to_string(),
            "The smallest deployable unit.".to_string(),
            vec!["Kubernetes".to_string()],
            Language::English,
        )
    }

    #[test]
    fn test_same_language_is_native_without_network() {
        let card = english_card();
        let translator = FakeTranslator::default();
        let mut cache = TranslationCache::default();

        let text = block_on(resolve(&card, Language::English, &mut cache, &translator));
        assert_eq!(text, ResolvedText::native(&card));
        assert!(!text.was_translated);
        assert_eq!(translator.calls.get(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_miss_fetches_both_fields_and_caches() {
        let card = english_card();
        let translator = FakeTranslator::default();
        let mut cache = TranslationCache::default();

        let text = block_on(resolve(&card, Language::Spanish, &mut cache, &translator));
        assert_eq!(text.question, "[es] What is a pod?");
        assert_eq!(text.answer, "[es] The smallest deployable unit.");
        assert!(text.was_translated);
        assert!(!text.failed);
        assert_eq!(translator.calls.get(), 2);
        assert!(cache.contains_pair(&card.id, Language::Spanish));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let card = english_card();
        let translator = FakeTranslator::default();
        let mut cache = TranslationCache::default();

        let first = block_on(resolve(&card, Language::Spanish, &mut cache, &translator));
        let second = block_on(resolve(&card, Language::Spanish, &mut cache, &translator));
        assert_eq!(first, second);
        assert_eq!(translator.calls.get(), 2);
        assert!(matches!(
            lookup(&card, Language::Spanish, &cache),
            Lookup::Cached(_)
        ));
    }

    #[test]
    fn test_failure_falls_back_without_caching() {
        let card = english_card();
        let translator = FakeTranslator::failing_on("What is a pod?");
        let mut cache = TranslationCache::default();

        let text = block_on(resolve(&card, Language::Spanish, &mut cache, &translator));
        assert_eq!(text.question, card.question);
        assert_eq!(text.answer, card.answer);
        assert!(text.failed);
        assert!(!text.was_translated);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_one_failed_field_never_mixes() {
        let card = english_card();
        let translator = FakeTranslator::failing_on("The smallest deployable unit.");
        let mut cache = TranslationCache::default();

        let text = block_on(resolve(&card, Language::Spanish, &mut cache, &translator));
        assert_eq!(text.question, card.question);
        assert_eq!(text.answer, card.answer);
        assert!(text.failed);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_half_cached_pair_is_a_miss() {
        let card = english_card();
        let mut cache = TranslationCache::default();
        cache.insert(
            TranslationKey::new(card.id.clone(), Language::Spanish, TextField::Question),
            "¿Qué es un pod?".to_string(),
        );
        assert!(matches!(
            lookup(&card, Language::Spanish, &cache),
            Lookup::Miss(_)
        ));
    }

    #[test]
    fn test_forget_card() {
        let card = english_card();
        let other = english_card();
        let translator = FakeTranslator::default();
        let mut cache = TranslationCache::default();
        block_on(resolve(&card, Language::Spanish, &mut cache, &translator));
        block_on(resolve(&other, Language::Spanish, &mut cache, &translator));

        assert_eq!(cache.forget_card(&card.id), 2);
        assert!(!cache.contains_pair(&card.id, Language::Spanish));
        assert!(cache.contains_pair(&other.id, Language::Spanish));
    }

    #[test]
    fn test_key_string_form() {
        let key = TranslationKey::new(
            CardId::from("0b7e-11"),
            Language::Spanish,
            TextField::Answer,
        );
        assert_eq!(key.to_string(), "0b7e-11:es:answer");
        assert_eq!(TranslationKey::parse("0b7e-11:es:answer"), Some(key));

        assert_eq!(TranslationKey::parse(":es:answer"), None);
        assert_eq!(TranslationKey::parse("abc:fr:answer"), None);
        assert_eq!(TranslationKey::parse("abc:es:hint"), None);
        assert_eq!(TranslationKey::parse("garbage"), None);
    }
}
