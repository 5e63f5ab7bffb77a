pub mod card_id;
pub mod card_store;
pub mod language;
pub mod persistence;
pub mod session;
pub mod translation;
pub mod translator;
mod utils;
pub mod view;

use std::cell::RefCell;
use std::sync::LazyLock;

use wasm_bindgen::prelude::*;

pub use card_id::CardId;
pub use card_store::{Card, CardStore, Category, StudyScope};
pub use language::Language;
pub use persistence::{MemoryStorage, Storage, StorageError};
pub use session::{CardEdit, NewCard, Session};
pub use translation::{Lookup, ResolvedText, TranslationCache, TranslationRequest, lookup, resolve};
pub use translator::{HttpTranslator, TranslateError, Translator, translator_config};
pub use view::{CardGrid, CardView, DeckStats, StudyView, TagCount, TagPill};

#[wasm_bindgen]
pub struct FlashDeck {
    // never hold a borrow across an .await, so a second call from JS can't hit a "borrow while locked" panic
    session: RefCell<Session<Box<dyn Storage>>>,
    translator: HttpTranslator,
}

// putting this inside LOGGER prevents us from accidentally initializing the logger more than once
#[allow(clippy::declare_interior_mutable_const)]
const LOGGER: LazyLock<()> = LazyLock::new(|| {
    utils::set_panic_hook();

    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Logging initialized");
});

fn platform_storage() -> Box<dyn Storage> {
    #[cfg(target_arch = "wasm32")]
    {
        match persistence::BrowserStorage::new() {
            Ok(storage) => return Box::new(storage),
            Err(e) => log::error!("Falling back to in-memory storage, cards will not be saved: {e}"),
        }
    }
    Box::new(MemoryStorage::default())
}

impl FlashDeck {
    fn with_storage(storage: Box<dyn Storage>) -> Self {
        Self {
            session: RefCell::new(Session::new(storage, utils::session_seed())),
            translator: HttpTranslator::new(translator_config()),
        }
    }

    fn transition(&self, f: impl FnOnce(&mut Session<Box<dyn Storage>>)) -> StudyView {
        let mut session = self.session.borrow_mut();
        f(&mut session);
        session.view()
    }
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
impl FlashDeck {
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen(constructor))]
    pub fn new() -> Self {
        // used to only initialize the logger once
        #[allow(clippy::borrow_interior_mutable_const)]
        *LOGGER;

        Self::with_storage(platform_storage())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn view(&self) -> StudyView {
        self.session.borrow_mut().view()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn select_category(&self, category: Category) -> StudyView {
        self.transition(|s| s.select_category(category))
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn set_study_scope(&self, scope: StudyScope) -> StudyView {
        self.transition(|s| s.set_study_scope(scope))
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn set_language(&self, language: Language) -> StudyView {
        self.transition(|s| s.set_language(language))
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn next(&self) -> StudyView {
        self.transition(|s| s.next())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn prev(&self) -> StudyView {
        self.transition(|s| s.prev())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn shuffle(&self) -> StudyView {
        self.transition(|s| s.shuffle())
    }

    /// Returns the new card's id, or `None` if the question or answer was blank.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn add_card(&self, card: NewCard) -> Option<String> {
        self.session
            .borrow_mut()
            .add_card(card)
            .map(|id| id.to_string())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn edit_card(&self, id: String, edit: CardEdit) -> bool {
        self.session.borrow_mut().edit_card(&CardId::from(id), edit)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn delete_card(&self, id: String) -> bool {
        self.session.borrow_mut().delete_card(&CardId::from(id))
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn move_card(&self, id: String, category: Category) -> bool {
        self.session
            .borrow_mut()
            .move_card(&CardId::from(id), category)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn set_learned(&self, id: String, learned: bool) -> bool {
        self.session
            .borrow_mut()
            .set_learned(&CardId::from(id), learned)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn edit_category(&self) -> Category {
        self.session.borrow().edit_category()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn study_scope(&self) -> StudyScope {
        self.session.borrow().study_scope()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn language(&self) -> Language {
        self.session.borrow().language()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn toggle_tag_filter(&self, tag: String) {
        self.session.borrow_mut().toggle_tag_filter(&tag);
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn set_search(&self, search: String) {
        self.session.borrow_mut().set_search(&search);
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn clear_filters(&self) {
        self.session.borrow_mut().clear_filters();
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn selected_tags(&self) -> Vec<String> {
        self.session
            .borrow()
            .selected_tags()
            .map(str::to_string)
            .collect()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn visible_cards(&self) -> CardGrid {
        self.session.borrow().visible_cards()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn stats(&self) -> DeckStats {
        self.session.borrow().stats()
    }

    /// Translates the current card if the last view left a request queued. Returns the refreshed view, or
    /// `None` if there was nothing to do or the user moved on before the translation arrived. A refreshed view can
    /// leave a new request queued (the card was edited meanwhile), so callers loop until this returns `None`.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub async fn translate_current(&self) -> Option<StudyView> {
        let request = self.session.borrow_mut().take_translation_request()?;
        let result = request.fetch(&self.translator).await;

        let mut session = self.session.borrow_mut();
        if session.apply_translation(&request, result) {
            Some(session.view())
        } else {
            None
        }
    }
}

impl Default for FlashDeck {
    fn default() -> Self {
        Self::new()
    }
}
