//! # Persistence
//! The whole card collection and the translation cache are stored as one JSON document under a single key.
//! Saving writes the full document after every mutation. Loading is tolerant: a corrupt or foreign document
//! falls back to the first-run document, and every optional card field is defaulted here, once, so nothing
//! downstream has to deal with missing data.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::card_id::CardId;
use crate::card_store::{Card, CardStore, Category, dedup_tags};
use crate::language::Language;
use crate::translation::{TranslationCache, TranslationKey};

pub const STORAGE_KEY: &str = "flashdeck.v1";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage is not available")]
    Unavailable,
    #[error("browser storage error: {0}")]
    Browser(String),
    #[error("could not serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value persistence of the serialized document.
pub trait Storage {
    fn load(&self) -> Result<Option<String>, StorageError>;
    fn save(&mut self, document: &str) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn load(&self) -> Result<Option<String>, StorageError> {
        (**self).load()
    }

    fn save(&mut self, document: &str) -> Result<(), StorageError> {
        (**self).save(document)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    document: Option<String>,
}

impl MemoryStorage {
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
        }
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.document.clone())
    }

    fn save(&mut self, document: &str) -> Result<(), StorageError> {
        self.document = Some(document.to_string());
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserStorage;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::{STORAGE_KEY, Storage, StorageError};

    /// `window.localStorage`.
    pub struct BrowserStorage {
        storage: web_sys::Storage,
    }

    impl BrowserStorage {
        pub fn new() -> Result<Self, StorageError> {
            let storage = web_sys::window()
                .ok_or(StorageError::Unavailable)?
                .local_storage()
                .map_err(|e| StorageError::Browser(format!("{e:?}")))?
                .ok_or(StorageError::Unavailable)?;
            Ok(Self { storage })
        }
    }

    impl Storage for BrowserStorage {
        fn load(&self) -> Result<Option<String>, StorageError> {
            self.storage
                .get_item(STORAGE_KEY)
                .map_err(|e| StorageError::Browser(format!("{e:?}")))
        }

        fn save(&mut self, document: &str) -> Result<(), StorageError> {
            self.storage
                .set_item(STORAGE_KEY, document)
                .map_err(|e| StorageError::Browser(format!("{e:?}")))
        }
    }
}

#[derive(Serialize)]
struct StoredDocument<'a> {
    categories: IndexMap<&'static str, &'a [Card]>,
    translations: BTreeMap<String, &'a str>,
}

#[derive(Serialize)]
#[serde(tag = "version")]
enum VersionedDocument<'a> {
    V1(StoredDocument<'a>),
}

/// A card as it may appear on disk. Older documents lack `language`, and hand-edited ones may lack more.
#[derive(Deserialize)]
struct StoredCard {
    #[serde(default)]
    id: Option<CardId>,
    question: String,
    answer: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    language: Language,
    #[serde(default)]
    learned: bool,
}

pub fn serialize_store(store: &CardStore) -> Result<String, serde_json::Error> {
    let document = VersionedDocument::V1(StoredDocument {
        categories: store
            .categories()
            .map(|(category, cards)| (category.name(), cards))
            .collect(),
        translations: store
            .translations
            .iter()
            .map(|(key, text)| (key.to_string(), text))
            .collect(),
    });
    serde_json::to_string(&document)
}

pub fn save_store<S: Storage + ?Sized>(storage: &mut S, store: &CardStore) -> Result<(), StorageError> {
    let document = serialize_store(store)?;
    storage.save(&document)
}

/// Never fails: anything unusable yields the first-run document.
pub fn load_store<S: Storage + ?Sized>(storage: &S) -> CardStore {
    let raw = match storage.load() {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            log::info!("No saved document, starting with sample cards");
            return CardStore::seeded();
        }
        Err(e) => {
            log::warn!("Failed to read saved document: {e}");
            return CardStore::seeded();
        }
    };

    match parse_document(&raw) {
        Some(store) => store,
        None => CardStore::seeded(),
    }
}

pub fn parse_document(raw: &str) -> Option<CardStore> {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Saved document is not valid JSON: {e}");
            return None;
        }
    };

    match value.get("version") {
        // documents written before versioning have the same shape, minus translations and languages
        None => {}
        Some(serde_json::Value::String(version)) if version == "V1" => {}
        Some(other) => {
            log::warn!("Saved document has unknown version {other}");
            return None;
        }
    }

    let Some(categories) = value.get("categories").and_then(|c| c.as_object()) else {
        log::warn!("Saved document has no categories");
        return None;
    };

    let mut seen_ids: HashSet<CardId> = HashSet::new();
    let mut parsed: IndexMap<Category, Vec<Card>> = IndexMap::new();
    for category in Category::ALL {
        let cards = match categories.get(category.name()) {
            Some(serde_json::Value::Array(cards)) => cards
                .iter()
                .filter_map(|card| parse_card(card, category, &mut seen_ids))
                .collect(),
            Some(_) => {
                log::warn!("Category {} is not a list, treating it as empty", category.name());
                Vec::new()
            }
            None => Vec::new(),
        };
        parsed.insert(category, cards);
    }

    let mut translations = TranslationCache::default();
    if let Some(entries) = value.get("translations").and_then(|t| t.as_object()) {
        for (key, text) in entries {
            match (TranslationKey::parse(key), text.as_str()) {
                (Some(key), Some(text)) => translations.insert(key, text.to_string()),
                _ => log::warn!("Dropping unreadable cached translation {key:?}"),
            }
        }
    }

    Some(CardStore::from_parts(parsed, translations))
}

fn parse_card(
    value: &serde_json::Value,
    category: Category,
    seen_ids: &mut HashSet<CardId>,
) -> Option<Card> {
    let stored: StoredCard = match serde_json::from_value(value.clone()) {
        Ok(card) => card,
        Err(e) => {
            log::warn!("Skipping unreadable card in {}: {e}", category.name());
            return None;
        }
    };

    let id = match stored.id {
        Some(id) if !id.as_str().is_empty() && !seen_ids.contains(&id) => id,
        Some(id) => {
            log::warn!("Card id {id:?} is empty or repeated, assigning a new one");
            CardId::generate()
        }
        None => CardId::generate(),
    };
    seen_ids.insert(id.clone());

    Some(Card {
        id,
        question: stored.question,
        answer: stored.answer,
        tags: dedup_tags(stored.tags),
        language: stored.language,
        learned: stored.learned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card_store::StudyScope;
    use crate::translation::TextField;

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn load(&self) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable)
        }

        fn save(&mut self, _document: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }
    }

    fn assert_seeded(store: &CardStore) {
        assert_eq!(store.cards(Category::Linux).len(), 5);
        assert_eq!(store.total_cards(), 5);
        assert!(store.translations.is_empty());
    }

    #[test]
    fn test_missing_document_is_seeded() {
        assert_seeded(&load_store(&MemoryStorage::default()));
        assert_seeded(&load_store(&BrokenStorage));
    }

    #[test]
    fn test_malformed_documents_fall_back() {
        for raw in [
            "not json",
            "[]",
            "{}",
            r#"{"categories": 3}"#,
            r#"{"version": "V9", "categories": {}}"#,
        ] {
            assert_seeded(&load_store(&MemoryStorage::with_document(raw)));
        }
    }

    #[test]
    fn test_legacy_document_gets_defaults() {
        let raw = r#"{
            "categories": {
                "Linux": [
                    {"id": "a", "question": "Q1", "answer": "A1", "tags": ["x", " x", "y"], "learned": true},
                    {"question": "Q2", "answer": "A2"},
                    {"id": "a", "question": "Q3", "answer": "A3", "tags": []},
                    {"id": "b", "question": 7}
                ],
                "Docker": "nonsense"
            }
        }"#;
        let store = parse_document(raw).unwrap();

        let linux = store.cards(Category::Linux);
        assert_eq!(linux.len(), 3);
        assert_eq!(linux[0].id, CardId::from("a"));
        assert_eq!(linux[0].tags, vec!["x", "y"]);
        assert!(linux[0].learned);
        assert_eq!(linux[1].language, Language::English);
        assert!(linux[1].tags.is_empty());
        assert!(!linux[1].learned);
        assert_ne!(linux[2].id, CardId::from("a"));

        assert!(store.cards(Category::Docker).is_empty());
        assert!(store.cards(Category::Kubernetes).is_empty());
        assert!(store.translations.is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_cards_and_translations() {
        let mut store = CardStore::seeded();
        let id = store.scope_ids(StudyScope::All)[2].clone();
        store.find_mut(&id).unwrap().language = Language::Spanish;
        store.translations.insert(
            TranslationKey::new(id.clone(), Language::English, TextField::Question),
            "translated".to_string(),
        );

        let mut storage = MemoryStorage::default();
        save_store(&mut storage, &store).unwrap();
        assert!(storage.document().unwrap().contains(r#""version":"V1""#));

        assert_eq!(load_store(&storage), store);
    }

    #[test]
    fn test_bad_translation_entries_are_dropped() {
        let raw = r#"{
            "version": "V1",
            "categories": {},
            "translations": {
                "a:es:question": "hola",
                "a:es:answer": 5,
                "nonsense": "x"
            }
        }"#;
        let store = parse_document(raw).unwrap();
        assert_eq!(store.translations.len(), 1);
        assert_eq!(
            store.translations.get(&TranslationKey::new(
                CardId::from("a"),
                Language::Spanish,
                TextField::Question
            )),
            Some("hola")
        );
        assert_eq!(store.total_cards(), 0);
    }

    #[test]
    fn test_translations_not_an_object() {
        let raw = r#"{"version": "V1", "categories": {"Cloud": []}, "translations": []}"#;
        assert!(parse_document(raw).unwrap().translations.is_empty());
    }

    #[test]
    fn test_save_error_surfaces() {
        let mut storage = BrokenStorage;
        assert!(matches!(
            save_store(&mut storage, &CardStore::default()),
            Err(StorageError::Unavailable)
        ));
    }
}
