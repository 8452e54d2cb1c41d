//! In-memory sheet storage with a bounded undo history per character.

use fxhash::FxHashMap;
use larp_rules::{CharacterModel, Mutation};
use parking_lot::RwLock;
use std::collections::VecDeque;

/// A committed mutation and the model it replaced.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub id: String,
    pub mutation: Mutation,
    pub description: String,
    previous: CharacterModel,
}

impl UndoEntry {
    #[must_use]
    pub fn new(mutation: Mutation, description: String, previous: CharacterModel) -> Self {
        Self { id: larp_kernel::safe_nanoid!(), mutation, description, previous }
    }
}

#[derive(Debug, Clone)]
pub struct StoredCharacter {
    pub model: CharacterModel,
    undo: VecDeque<UndoEntry>,
}

impl StoredCharacter {
    #[must_use]
    pub const fn new(model: CharacterModel) -> Self {
        Self { model, undo: VecDeque::new() }
    }

    #[must_use]
    pub fn last_undo(&self) -> Option<&UndoEntry> {
        self.undo.back()
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &UndoEntry> {
        self.undo.iter()
    }

    /// Pushes `entry`, dropping the oldest entries beyond `limit`.
    pub(crate) fn record(&mut self, entry: UndoEntry, limit: usize) {
        self.undo.push_back(entry);
        while self.undo.len() > limit {
            self.undo.pop_front();
        }
    }

    /// Restores the model saved by the latest entry, if that entry is `id`.
    pub(crate) fn undo(&mut self, id: &str) -> Option<UndoEntry> {
        if self.undo.back().is_none_or(|e| e.id != id) {
            return None;
        }
        let entry = self.undo.pop_back()?;
        self.model = entry.previous.clone();
        Some(entry)
    }

    pub(crate) fn clear_undo(&mut self) {
        self.undo.clear();
    }
}

#[derive(Debug)]
pub struct CharacterStore {
    characters: RwLock<FxHashMap<String, StoredCharacter>>,
    undo_limit: usize,
}

impl CharacterStore {
    #[must_use]
    pub fn new(undo_limit: usize) -> Self {
        Self { characters: RwLock::new(FxHashMap::default()), undo_limit }
    }

    #[must_use]
    pub const fn undo_limit(&self) -> usize {
        self.undo_limit
    }

    pub fn insert(&self, model: CharacterModel) {
        self.characters.write().insert(model.id.clone(), StoredCharacter::new(model));
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<StoredCharacter> {
        self.characters.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<StoredCharacter> {
        self.characters.write().remove(id)
    }

    /// Models ordered by name, then id.
    #[must_use]
    pub fn models(&self) -> Vec<CharacterModel> {
        let mut models: Vec<CharacterModel> = self.characters.read().values().map(|s| s.model.clone()).collect();
        models.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        models
    }

    /// Runs `f` on the stored character under the write lock.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut StoredCharacter) -> R) -> Option<R> {
        self.characters.write().get_mut(id).map(f)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.characters.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larp_rules::NoteMutation;

    fn note(text: &str) -> Mutation {
        NoteMutation { id: "parry".into(), notes: Some(text.into()) }.into()
    }

    fn model(id: &str, name: &str) -> CharacterModel {
        CharacterModel { name: Some(name.into()), ..CharacterModel::new(id, "tempest", "1.0") }
    }

    #[test]
    fn history_is_bounded() {
        let mut stored = StoredCharacter::new(model("a", "Ash"));
        for n in 0..5 {
            stored.record(UndoEntry::new(note(&n.to_string()), format!("edit {n}"), stored.model.clone()), 3);
        }
        let kept: Vec<&str> = stored.history().map(|e| e.description.as_str()).collect();
        assert_eq!(kept, vec!["edit 2", "edit 3", "edit 4"]);
    }

    #[test]
    fn undo_requires_the_latest_id() {
        let mut stored = StoredCharacter::new(model("a", "Ash"));
        let before = stored.model.clone();
        stored.record(UndoEntry::new(note("x"), "edit".into(), before.clone()), 3);
        stored.model.name = Some("Changed".into());

        assert!(stored.undo("not-it").is_none());
        let id = stored.last_undo().unwrap().id.clone();
        assert_eq!(stored.undo(&id).unwrap().description, "edit");
        assert_eq!(stored.model, before);
        assert!(stored.last_undo().is_none());
    }

    #[test]
    fn models_sort_by_name() {
        let store = CharacterStore::new(3);
        store.insert(model("b", "Zed"));
        store.insert(model("a", "Ash"));
        let names: Vec<_> = store.models().into_iter().filter_map(|m| m.name).collect();
        assert_eq!(names, vec!["Ash", "Zed"]);
        assert_eq!(store.update("a", |s| s.model.id.clone()).as_deref(), Some("a"));
        assert!(store.update("missing", |_| ()).is_none());
        assert!(store.remove("a").is_some());
        assert_eq!(store.len(), 1);
    }
}
