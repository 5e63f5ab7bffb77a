use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::card_id::CardId;
use crate::language::Language;
use crate::translation::TranslationCache;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum Category {
    Linux,
    DevOps,
    Cloud,
    Docker,
    Kubernetes,
}

impl Category {
    /// Display order. The set is closed: users cannot add categories.
    pub const ALL: [Category; 5] = [
        Category::Linux,
        Category::DevOps,
        Category::Cloud,
        Category::Docker,
        Category::Kubernetes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Linux => "Linux",
            Category::DevOps => "DevOps",
            Category::Cloud => "Cloud",
            Category::Docker => "Docker",
            Category::Kubernetes => "Kubernetes",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.name() == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum StudyScope {
    Category(Category),
    All,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub question: String,
    pub answer: String,
    pub tags: Vec<String>,
    pub language: Language,
    pub learned: bool,
}

impl Card {
    pub fn new(question: String, answer: String, tags: Vec<String>, language: Language) -> Self {
        Self {
            id: CardId::generate(),
            question,
            answer,
            tags,
            language,
            learned: false,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Splits a comma separated tag list, trimming and dropping empty or repeated tags.
pub fn normalize_tags(input: &str) -> Vec<String> {
    dedup_tags(input.split(',').map(str::to_string))
}

pub(crate) fn dedup_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}

#[derive(Clone, Debug, PartialEq)]
pub struct CardStore {
    categories: IndexMap<Category, Vec<Card>>,
    pub translations: TranslationCache,
}

impl Default for CardStore {
    fn default() -> Self {
        Self {
            categories: Category::ALL
                .into_iter()
                .map(|category| (category, Vec::new()))
                .collect(),
            translations: TranslationCache::default(),
        }
    }
}

impl CardStore {
    /// The document a first-time user starts with.
    pub fn seeded() -> Self {
        let mut store = Self::default();
        let samples = [
            (
                "What does chmod 755 script.sh do?",
                "Sets permissions to rwx for owner, and r-x for group and others. Owner can read/write/execute, others can read/execute.",
                "Linux, Permissions, chmod",
            ),
            (
                "How do you list active services managed by systemd?",
                "Use: systemctl list-units --type=service --state=running",
                "Linux, systemctl, Services",
            ),
            (
                "Which command is used for secure remote access to a Linux server?",
                "ssh user@hostname. You can specify a key with -i path/to/key.",
                "Linux, SSH, Networking",
            ),
            (
                "What does the command ip addr show display?",
                "It displays network interfaces and assigned IP addresses on the system.",
                "Linux, Networking, IP",
            ),
            (
                "What does #!/bin/bash at the top of a script mean?",
                "It's a shebang line telling the system to run the script using the Bash interpreter.",
                "Linux, Bash, Scripting",
            ),
        ];
        store.categories[&Category::Linux] = samples
            .into_iter()
            .map(|(question, answer, tags)| {
                Card::new(
                    question.to_string(),
                    answer.to_string(),
                    normalize_tags(tags),
                    Language::English,
                )
            })
            .collect();
        store
    }

    pub(crate) fn from_parts(
        categories: IndexMap<Category, Vec<Card>>,
        translations: TranslationCache,
    ) -> Self {
        let mut store = Self {
            translations,
            ..Self::default()
        };
        for (category, cards) in categories {
            store.categories[&category] = cards;
        }
        store
    }

    pub fn categories(&self) -> impl Iterator<Item = (Category, &[Card])> {
        self.categories
            .iter()
            .map(|(category, cards)| (*category, cards.as_slice()))
    }

    pub fn cards(&self, category: Category) -> &[Card] {
        &self.categories[&category]
    }

    pub fn all_cards(&self) -> impl Iterator<Item = &Card> {
        self.categories.values().flatten()
    }

    pub fn total_cards(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Ids in scope, in the scope's natural order: category order, then display order within a category.
    pub fn scope_ids(&self, scope: StudyScope) -> Vec<CardId> {
        match scope {
            StudyScope::Category(category) => {
                self.cards(category).iter().map(|c| c.id.clone()).collect()
            }
            StudyScope::All => self.all_cards().map(|c| c.id.clone()).collect(),
        }
    }

    pub fn find(&self, id: &CardId) -> Option<&Card> {
        self.all_cards().find(|card| &card.id == id)
    }

    pub fn find_mut(&mut self, id: &CardId) -> Option<&mut Card> {
        self.categories
            .values_mut()
            .flatten()
            .find(|card| &card.id == id)
    }

    pub fn category_of(&self, id: &CardId) -> Option<Category> {
        self.categories
            .iter()
            .find(|(_, cards)| cards.iter().any(|card| &card.id == id))
            .map(|(category, _)| *category)
    }

    /// New cards go to the front: the newest card is shown first.
    pub fn insert_front(&mut self, category: Category, card: Card) {
        self.categories[&category].insert(0, card);
    }

    /// Removes a card and every translation cached for it.
    pub fn remove(&mut self, id: &CardId) -> Option<Card> {
        let category = self.category_of(id)?;
        let cards = &mut self.categories[&category];
        let index = cards.iter().position(|card| &card.id == id)?;
        let card = cards.remove(index);
        self.translations.forget_card(id);
        Some(card)
    }

    /// Returns false if the card does not exist or is already in `category`.
    pub fn move_card(&mut self, id: &CardId, category: Category) -> bool {
        let Some(category_before) = self.category_of(id) else {
            return false;
        };
        if category_before == category {
            return false;
        }
        let cards = &mut self.categories[&category_before];
        let Some(index) = cards.iter().position(|card| &card.id == id) else {
            return false;
        };
        let card = cards.remove(index);
        self.insert_front(category, card);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(question: &str) -> Card {
        Card::new(
            question.to_string(),
            format!("{question}?"),
            vec![],
            Language::English,
        )
    }

    #[test]
    fn test_normalize_tags() {
        assert_eq!(
            normalize_tags(" Linux, ssh ,, Linux,Networking, "),
            vec!["Linux", "ssh", "Networking"]
        );
        assert!(normalize_tags("").is_empty());
        assert!(normalize_tags(" , ,").is_empty());
    }

    #[test]
    fn test_default_has_every_category() {
        let store = CardStore::default();
        let categories: Vec<_> = store.categories().map(|(category, _)| category).collect();
        assert_eq!(categories, Category::ALL.to_vec());
        assert_eq!(store.total_cards(), 0);
    }

    #[test]
    fn test_seeded_store() {
        let store = CardStore::seeded();
        assert_eq!(store.cards(Category::Linux).len(), 5);
        assert_eq!(store.total_cards(), 5);
        assert!(store.cards(Category::Linux)[0].has_tag("Permissions"));
    }

    #[test]
    fn test_insert_front_and_scope_order() {
        let mut store = CardStore::default();
        let a = card("a");
        let b = card("b");
        let c = card("c");
        let (a_id, b_id, c_id) = (a.id.clone(), b.id.clone(), c.id.clone());

        store.insert_front(Category::Docker, a);
        store.insert_front(Category::Linux, b);
        store.insert_front(Category::Linux, c);

        assert_eq!(
            store.scope_ids(StudyScope::Category(Category::Linux)),
            vec![c_id.clone(), b_id.clone()]
        );
        assert_eq!(store.scope_ids(StudyScope::All), vec![c_id, b_id, a_id]);
    }

    #[test]
    fn test_remove_and_move() {
        let mut store = CardStore::default();
        let a = card("a");
        let id = a.id.clone();
        store.insert_front(Category::Cloud, a);

        assert!(!store.move_card(&id, Category::Cloud));
        assert!(store.move_card(&id, Category::Kubernetes));
        assert_eq!(store.category_of(&id), Some(Category::Kubernetes));

        assert_eq!(store.remove(&id).map(|c| c.question), Some("a".to_string()));
        assert_eq!(store.remove(&id), None);
        assert!(!store.move_card(&id, Category::Linux));
    }

    #[test]
    fn test_find_mut_edits_in_place() {
        let mut store = CardStore::default();
        let a = card("a");
        let id = a.id.clone();
        store.insert_front(Category::DevOps, a);

        store.find_mut(&id).unwrap().learned = true;
        assert!(store.find(&id).unwrap().learned);
    }
}
