use std::fmt;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["self", "crypto"])]
    fn randomUUID() -> String;
}

/// Identifies a card across every category. Never reassigned once a card exists.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// A fresh v4 UUID, from the browser's `crypto` when running in one.
    pub fn generate() -> Self {
        #[cfg(target_arch = "wasm32")]
        let uuid = randomUUID();
        #[cfg(not(target_arch = "wasm32"))]
        let uuid = uuid::Uuid::new_v4().to_string();
        Self(uuid)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CardId {
    fn from(id: String) -> Self {
        CardId(id)
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        CardId(id.to_string())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
