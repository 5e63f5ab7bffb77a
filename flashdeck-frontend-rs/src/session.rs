use std::collections::{BTreeMap, HashSet};

use deckhand::{Deck, Direction};
use indexmap::IndexSet;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::card_id::CardId;
use crate::card_store::{Card, CardStore, Category, StudyScope, normalize_tags};
use crate::language::Language;
use crate::persistence::{Storage, load_store, save_store};
use crate::translation::{FetchedTranslation, Lookup, ResolvedText, TranslationRequest, lookup};
use crate::translator::TranslateError;
use crate::view::{
    CardGrid, CardView, DeckStats, STATUS_TRANSLATING, STATUS_UNAVAILABLE, StudyView, TagCount,
    translated_status,
};

#[derive(Clone, Debug, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct NewCard {
    pub question: String,
    pub answer: String,
    /// Comma separated.
    pub tags: String,
    pub language: Option<Language>,
}

#[derive(Clone, Debug, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct CardEdit {
    pub question: String,
    pub answer: String,
    /// Comma separated.
    pub tags: String,
    /// `None` keeps the card's current language.
    pub language: Option<Language>,
}

/// Translations that are in flight or have failed, keyed by the card and language they were for.
#[derive(Debug, Default)]
struct TranslationState {
    pending: HashSet<(CardId, Language)>,
    /// Created by `view`, handed out once by `take_translation_request`.
    queued: Option<TranslationRequest>,
    /// Cleared on navigation, which is what allows a retry.
    failed: HashSet<(CardId, Language)>,
}

/// All state of one study session. Every user action is a method; every method leaves the deck in sync
/// with the card store.
pub struct Session<S: Storage> {
    store: CardStore,
    storage: S,
    edit_category: Category,
    study_scope: StudyScope,
    language: Language,
    deck: Deck<CardId>,
    rng: ChaCha8Rng,
    translation: TranslationState,
    viewed: HashSet<CardId>,
    search: String,
    selected_tags: IndexSet<String>,
}

impl<S: Storage> Session<S> {
    pub fn new(storage: S, seed: u64) -> Self {
        let store = load_store(&storage);
        log::info!("Loaded {} cards", store.total_cards());

        let study_scope = StudyScope::Category(Category::Linux);
        let deck = Deck::from_ids(store.scope_ids(study_scope));
        Self {
            store,
            storage,
            edit_category: Category::Linux,
            study_scope,
            language: Language::default(),
            deck,
            rng: ChaCha8Rng::seed_from_u64(seed),
            translation: TranslationState::default(),
            viewed: HashSet::new(),
            search: String::new(),
            selected_tags: IndexSet::new(),
        }
    }

    pub fn store(&self) -> &CardStore {
        &self.store
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn deck(&self) -> &Deck<CardId> {
        &self.deck
    }

    pub fn edit_category(&self) -> Category {
        self.edit_category
    }

    pub fn study_scope(&self) -> StudyScope {
        self.study_scope
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.deck.current().and_then(|id| self.store.find(id))
    }

    // =======
    // navigation
    // =======

    /// Switches the category shown in the editor. The study deck is unaffected.
    pub fn select_category(&mut self, category: Category) {
        self.edit_category = category;
        self.selected_tags.clear();
    }

    pub fn set_study_scope(&mut self, scope: StudyScope) {
        log::debug!("Study scope changed to {scope:?}");
        self.study_scope = scope;
        self.deck.reset();
        self.resync();
        self.navigated();
    }

    /// Only the display language changes; the deck and cursor stay where they are.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
        self.navigated();
    }

    pub fn next(&mut self) {
        self.deck.advance(Direction::Forward);
        self.navigated();
    }

    pub fn prev(&mut self) {
        self.deck.advance(Direction::Backward);
        self.navigated();
    }

    pub fn shuffle(&mut self) {
        self.deck.shuffle(&mut self.rng);
        self.navigated();
    }

    fn navigated(&mut self) {
        self.translation.failed.clear();
    }

    fn resync(&mut self) {
        self.deck = self.deck.resync(self.store.scope_ids(self.study_scope));
    }

    // =======
    // card edits
    // =======

    /// Adds a card to the front of the selected category. Cards without a question or answer are ignored.
    pub fn add_card(&mut self, new_card: NewCard) -> Option<CardId> {
        let question = new_card.question.trim();
        let answer = new_card.answer.trim();
        if question.is_empty() || answer.is_empty() {
            return None;
        }

        let card = Card::new(
            question.to_string(),
            answer.to_string(),
            normalize_tags(&new_card.tags),
            new_card.language.unwrap_or_default(),
        );
        let id = card.id.clone();
        log::debug!("Adding card {id} to {}", self.edit_category.name());
        self.store.insert_front(self.edit_category, card);
        self.persist();
        self.resync();
        Some(id)
    }

    /// Returns false if the card does not exist or the edit would leave it without a question or answer.
    pub fn edit_card(&mut self, id: &CardId, edit: CardEdit) -> bool {
        let question = edit.question.trim();
        let answer = edit.answer.trim();
        if question.is_empty() || answer.is_empty() {
            return false;
        }
        let Some(card) = self.store.find_mut(id) else {
            return false;
        };

        let language = edit.language.unwrap_or(card.language);
        let text_changed =
            card.question != question || card.answer != answer || card.language != language;
        card.question = question.to_string();
        card.answer = answer.to_string();
        card.tags = normalize_tags(&edit.tags);
        card.language = language;

        if text_changed {
            let forgotten = self.store.translations.forget_card(id);
            log::debug!("Card {id} changed, forgot {forgotten} cached translations");
            self.release_translations(id);
        }
        self.persist();
        self.resync();
        true
    }

    pub fn delete_card(&mut self, id: &CardId) -> bool {
        if self.store.remove(id).is_none() {
            return false;
        }
        self.viewed.remove(id);
        self.release_translations(id);
        self.persist();
        self.resync();
        true
    }

    pub fn move_card(&mut self, id: &CardId, category: Category) -> bool {
        if !self.store.move_card(id, category) {
            return false;
        }
        self.persist();
        self.resync();
        true
    }

    pub fn set_learned(&mut self, id: &CardId, learned: bool) -> bool {
        let Some(card) = self.store.find_mut(id) else {
            return false;
        };
        card.learned = learned;
        self.persist();
        true
    }

    /// Forgets in-flight and failed translations of a card whose text no longer matches them,
    /// so the next `view` asks for the current text.
    fn release_translations(&mut self, id: &CardId) {
        let state = &mut self.translation;
        state.pending.retain(|(card_id, _)| card_id != id);
        state.failed.retain(|(card_id, _)| card_id != id);
        if state.queued.as_ref().is_some_and(|request| &request.card_id == id) {
            state.queued = None;
        }
    }

    fn persist(&mut self) {
        if let Err(e) = save_store(&mut self.storage, &self.store) {
            log::error!("Failed to save cards: {e}");
        }
    }

    // =======
    // display
    // =======

    /// What the study panel shows right now. A cache miss for the current card queues a translation
    /// request (see [`Session::take_translation_request`]) unless one is already in flight.
    pub fn view(&mut self) -> StudyView {
        let position = StudyView::position_label(self.deck.position());
        let Some(card) = self.current_card().cloned() else {
            return StudyView {
                card: None,
                position,
                status: String::new(),
            };
        };
        self.viewed.insert(card.id.clone());

        let pair = (card.id.clone(), self.language);
        let (text, status) = match lookup(&card, self.language, &self.store.translations) {
            Lookup::Native(text) => (text, String::new()),
            Lookup::Cached(text) => (text, translated_status(self.language)),
            Lookup::Miss(request) if self.translation.failed.contains(&pair) => (
                ResolvedText::fallback(&request),
                STATUS_UNAVAILABLE.to_string(),
            ),
            Lookup::Miss(request) => {
                if !self.translation.pending.contains(&pair) {
                    self.queue(request);
                }
                (ResolvedText::native(&card), STATUS_TRANSLATING.to_string())
            }
        };

        StudyView {
            card: Some(CardView::with_text(&card, &text)),
            position,
            status,
        }
    }

    fn queue(&mut self, request: TranslationRequest) {
        // a request that was never dispatched is not in flight
        if let Some(stale) = self.translation.queued.take() {
            self.translation
                .pending
                .remove(&(stale.card_id.clone(), stale.target));
        }
        self.translation
            .pending
            .insert((request.card_id.clone(), request.target));
        self.translation.queued = Some(request);
    }

    /// Hands out the queued request once. A request for a card that is no longer shown is dropped.
    pub fn take_translation_request(&mut self) -> Option<TranslationRequest> {
        let request = self.translation.queued.take()?;
        if self.is_current(&request) {
            Some(request)
        } else {
            self.translation
                .pending
                .remove(&(request.card_id.clone(), request.target));
            None
        }
    }

    /// Records the outcome of a dispatched request. Successful translations are cached even when the user has
    /// moved on. Returns whether the result is for the card and language currently shown, i.e. whether the display
    /// should be refreshed.
    ///
    /// A result for text the card no longer has is discarded without touching translation state, which by then
    /// belongs to the edited text. It still asks for a refresh when that card is shown, so `view` can queue a
    /// request for the new text.
    pub fn apply_translation(
        &mut self,
        request: &TranslationRequest,
        result: Result<FetchedTranslation, TranslateError>,
    ) -> bool {
        let current = self.is_current(request);
        let unchanged = self.store.find(&request.card_id).is_some_and(|card| {
            card.question == request.question
                && card.answer == request.answer
                && card.language == request.source
        });
        if !unchanged {
            log::debug!("Card {} changed while translating, discarding", request.card_id);
            return current;
        }

        let pair = (request.card_id.clone(), request.target);
        self.translation.pending.remove(&pair);
        match result {
            Ok(fetched) => {
                self.store.translations.store(&fetched);
                self.persist();
            }
            Err(e) => {
                log::warn!(
                    "Translating card {} to {} failed: {e}",
                    request.card_id,
                    request.target
                );
                if current {
                    self.translation.failed.insert(pair);
                }
            }
        }

        if !current {
            log::debug!("Dropping stale translation for card {}", request.card_id);
        }
        current
    }

    fn is_current(&self, request: &TranslationRequest) -> bool {
        self.deck
            .current()
            .is_some_and(|id| request.targets(id, self.language))
    }

    // =======
    // card grid
    // =======

    pub fn toggle_tag_filter(&mut self, tag: &str) {
        if !self.selected_tags.shift_remove(tag) {
            self.selected_tags.insert(tag.to_string());
        }
    }

    pub fn set_search(&mut self, search: &str) {
        self.search = search.to_string();
    }

    pub fn clear_filters(&mut self) {
        self.search.clear();
        self.selected_tags.clear();
    }

    pub fn selected_tags(&self) -> impl Iterator<Item = &str> {
        self.selected_tags.iter().map(String::as_str)
    }

    /// Cards of the selected category matching the search text and every selected tag.
    pub fn visible_cards(&self) -> CardGrid {
        let search = fold_for_search(self.search.trim());
        let cards = self
            .store
            .cards(self.edit_category)
            .iter()
            .filter(|card| {
                search.is_empty()
                    || fold_for_search(&card.question).contains(&search)
                    || fold_for_search(&card.answer).contains(&search)
            })
            .filter(|card| self.selected_tags.iter().all(|tag| card.has_tag(tag)))
            .map(CardView::native)
            .collect();
        CardGrid { cards }
    }

    pub fn stats(&self) -> DeckStats {
        let cards = self.store.cards(self.edit_category);
        let learned = cards.iter().filter(|card| card.learned).count();
        let learned_percent = if cards.is_empty() {
            0
        } else {
            ((learned as f64 / cards.len() as f64) * 100.0).round() as u32
        };

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for tag in cards.iter().flat_map(|card| card.tags.iter()) {
            *counts.entry(tag.as_str()).or_insert(0) += 1;
        }
        let mut tag_counts: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount {
                tag: tag.to_string(),
                count,
            })
            .collect();
        // stable sort keeps ties alphabetical
        tag_counts.sort_by(|a, b| b.count.cmp(&a.count));

        DeckStats {
            total_cards: self.store.total_cards(),
            category_cards: cards.len(),
            viewed_cards: self.viewed.len(),
            learned_percent,
            tag_counts,
        }
    }
}

/// Lowercase with accents stripped, so "Kubernetés" matches "kubernetes".
fn fold_for_search(s: &str) -> String {
    use unicode_normalization::UnicodeNormalization;

    s.to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}
