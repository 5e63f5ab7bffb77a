//! A small library for keeping a study deck in order while the cards underneath it change.
//! It was created for FlashDeck, so it only does what a single study session needs.
//!
//! A [`Deck`] is not a copy of card data. It is an ordering over card ids plus a cursor:
//! 1. The caller describes which ids are currently "in scope" (one category, or every category).
//! 2. [`Deck::resync`] reconciles the previous ordering with that scope. Ids that survived keep their relative order,
//!    ids that are new to the scope are appended in the scope's own order, and ids that disappeared are dropped.
//! 3. Navigation is circular in both directions, and shuffling resets the cursor to the top of the deck.
//!
//! The cursor is always within `0..len` for a non-empty deck and `0` for an empty one.

use std::collections::HashSet;
use std::hash::Hash;

use rand::Rng;
use rand::seq::SliceRandom;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn step(self) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deck<Id> {
    ids: Vec<Id>,
    cursor: usize,
}

impl<Id> Default for Deck<Id> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            cursor: 0,
        }
    }
}

impl<Id: Clone + Eq + Hash> Deck<Id> {
    /// Builds a deck directly from an ordering. Duplicate ids after the first occurrence are dropped.
    pub fn from_ids(ids: impl IntoIterator<Item = Id>) -> Self {
        Self::default().resync(ids)
    }

    /// Reconciles this deck with the ids currently in scope, returning the new deck.
    ///
    /// Surviving ids keep their relative order, ids new to the scope are appended in scope order.
    /// The cursor is clamped to `len - 1` if the deck shrank past it, and reset to `0` if the deck is empty.
    pub fn resync(&self, scope: impl IntoIterator<Item = Id>) -> Self {
        let scope: Vec<Id> = scope.into_iter().collect();
        let in_scope: HashSet<&Id> = scope.iter().collect();

        let mut seen: HashSet<Id> = HashSet::with_capacity(scope.len());
        let mut ids = Vec::with_capacity(scope.len());

        for id in &self.ids {
            if in_scope.contains(id) && seen.insert(id.clone()) {
                ids.push(id.clone());
            }
        }
        for id in &scope {
            if seen.insert(id.clone()) {
                ids.push(id.clone());
            }
        }

        let cursor = if ids.is_empty() {
            0
        } else if self.cursor >= ids.len() {
            ids.len() - 1
        } else {
            self.cursor
        };

        Self { ids, cursor }
    }

    pub fn advance(&mut self, direction: Direction) {
        let len = self.ids.len();
        if len == 0 {
            return;
        }
        let len = len as isize;
        self.cursor = ((self.cursor as isize + direction.step() + len) % len) as usize;
    }

    /// Uniformly permutes the deck (Fisher-Yates) and moves the cursor to the top.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.ids.shuffle(rng);
        self.cursor = 0;
    }

    pub fn current(&self) -> Option<&Id> {
        self.ids.get(self.cursor)
    }
}

impl<Id> Deck<Id> {
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// One-based position and length, `(0, 0)` when empty.
    pub fn position(&self) -> (usize, usize) {
        if self.ids.is_empty() {
            (0, 0)
        } else {
            (self.cursor + 1, self.ids.len())
        }
    }

    pub fn reset(&mut self) {
        self.ids.clear();
        self.cursor = 0;
    }
}
