use crate::CharactersInner;
use crate::error::{CharacterError, CharacterErrorExt};
use crate::models::{
    AttributesUpdate, CharacterListItem, CharacterSummary, CharacterView, CreateCharacter, FeaturePurchase,
    NameUpdate, UndoRequest, UndoView,
};
use crate::store::{CharacterStore, StoredCharacter, UndoEntry};
use larp_rules::expr::PropExpression;
use larp_rules::{Character, CharacterModel, ChoiceMutation, Engine, FeatureForm, Mutation, RankMutation};
use tracing::{debug, info, instrument, warn};

impl CharactersInner {
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    #[must_use]
    pub const fn store(&self) -> &CharacterStore {
        &self.store
    }

    fn load(&self, model: CharacterModel) -> Result<Character, CharacterError> {
        let id = model.id.clone();
        self.engine.load_character(model).context(id)
    }

    fn stored(&self, id: &str) -> Result<StoredCharacter, CharacterError> {
        self.store.get(id).ok_or_else(|| CharacterError::NotFound { id: id.to_owned() })
    }

    /// Runs `f` on a freshly loaded character under the store's write lock.
    fn modify<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Character, &mut StoredCharacter) -> Result<R, CharacterError>,
    ) -> Result<R, CharacterError> {
        self.store
            .update(id, |stored| {
                let mut character = self.load(stored.model.clone())?;
                f(&mut character, stored)
            })
            .ok_or_else(|| CharacterError::NotFound { id: id.to_owned() })?
    }

    /// Applies `mutation` and records the model it replaced.
    fn commit(
        &self,
        character: &mut Character,
        stored: &mut StoredCharacter,
        mutation: Mutation,
    ) -> Result<(), CharacterError> {
        let previous = character.dump();
        let decision = character.apply(&mutation, false);
        if !decision.is_ok() {
            debug!(character = %stored.model.id, reason = decision.reason_str(), "Mutation rejected");
            return Err(decision.into());
        }
        let description = character.describe_mutation(&mutation);
        info!(character = %stored.model.id, %description, "Mutation applied");
        stored.model = character.dump();
        stored.record(UndoEntry::new(mutation, description, previous), self.store.undo_limit());
        Ok(())
    }

    #[must_use]
    pub fn list(&self) -> Vec<CharacterListItem> {
        self.store
            .models()
            .into_iter()
            .filter_map(|model| match self.load(model) {
                Ok(character) => Some(CharacterListItem {
                    id: character.model().id.clone(),
                    name: character.model().name.clone(),
                    ruleset_id: character.model().ruleset_id.clone(),
                    level: character.level(),
                }),
                Err(e) => {
                    warn!(error = %e, "Skipping unloadable character");
                    None
                }
            })
            .collect()
    }

    #[instrument(skip(self))]
    pub fn create(&self, request: CreateCharacter) -> Result<CharacterSummary, CharacterError> {
        let ruleset = self.engine.ruleset();
        if let Some(requested) = request.ruleset.filter(|r| *r != ruleset.id) {
            return Err(CharacterError::UnknownRuleset { id: requested });
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(CharacterError::bad_request("Name is required."));
        }

        let mut character = self.engine.new_character(larp_kernel::safe_nanoid!());
        character.set_name(Some(name.to_owned()));
        let stored = StoredCharacter::new(character.dump());
        self.store.insert(stored.model.clone());
        info!(character = %stored.model.id, "Character created");
        Ok(summarize(&character, &stored))
    }

    pub fn summary(&self, id: &str) -> Result<CharacterSummary, CharacterError> {
        let stored = self.stored(id)?;
        let character = self.load(stored.model.clone())?;
        Ok(summarize(&character, &stored))
    }

    pub fn feature_form(&self, id: &str, feature_id: &str) -> Result<FeatureForm, CharacterError> {
        let character = self.load(self.stored(id)?.model)?;
        character
            .feature(feature_id)
            .map(|fc| fc.form())
            .ok_or_else(|| CharacterError::FeatureNotFound { id: feature_id.to_owned() })
    }

    #[instrument(skip(self))]
    pub fn purchase(
        &self,
        id: &str,
        feature_id: &str,
        request: FeaturePurchase,
    ) -> Result<CharacterSummary, CharacterError> {
        self.modify(id, |character, stored| {
            match purchase_mutation(character, feature_id, request)? {
                Some(mutation) => self.commit(character, stored, mutation)?,
                None => debug!("No change requested"),
            }
            Ok(summarize(character, stored))
        })
    }

    /// Sets level and awarded CP directly. Not undoable.
    #[instrument(skip(self))]
    pub fn set_attributes(&self, id: &str, request: AttributesUpdate) -> Result<CharacterSummary, CharacterError> {
        if request.level.is_some_and(|l| l < 1) {
            return Err(CharacterError::bad_request("Level must be positive."));
        }
        if request.cp.is_some_and(|cp| cp < 0) {
            return Err(CharacterError::bad_request("Awarded CP can't be negative."));
        }
        self.modify(id, |character, stored| {
            if let Some(level) = request.level.filter(|l| *l != character.xp_level()) {
                character.set_xp_level(level);
            }
            if let Some(cp) = request.cp.filter(|cp| *cp != character.awarded_cp()) {
                character.set_awarded_cp(cp);
            }
            let decision = character.validate();
            if !decision.is_ok() {
                return Err(decision.into());
            }
            stored.model = character.dump();
            Ok(summarize(character, stored))
        })
    }

    pub fn rename(&self, id: &str, request: NameUpdate) -> Result<CharacterSummary, CharacterError> {
        let name = request.name.trim().to_owned();
        if name.is_empty() {
            return Err(CharacterError::bad_request("Name is required."));
        }
        self.modify(id, |character, stored| {
            character.set_name(Some(name));
            stored.model = character.dump();
            Ok(summarize(character, stored))
        })
    }

    /// Ends the respend: the sheet must be fully valid, after which ranks
    /// can no longer be sold back and the undo history is dropped.
    #[instrument(skip(self))]
    pub fn finalize(&self, id: &str) -> Result<CharacterSummary, CharacterError> {
        self.modify(id, |character, stored| {
            if !character.can_respend() {
                return Err(CharacterError::conflict("Respend is not open."));
            }
            let decision = character.fully_valid();
            if !decision.is_ok() {
                return Err(decision.into());
            }
            character.set_respend(false);
            stored.model = character.dump();
            stored.clear_undo();
            info!(character = %stored.model.id, "Respend finalized");
            Ok(summarize(character, stored))
        })
    }

    #[instrument(skip(self))]
    pub fn undo(&self, id: &str, request: UndoRequest) -> Result<CharacterSummary, CharacterError> {
        self.store
            .update(id, |stored| {
                if stored.last_undo().is_none() {
                    return Err(CharacterError::conflict("Nothing to undo."));
                }
                let entry =
                    stored.undo(&request.undo).ok_or_else(|| CharacterError::conflict("Invalid undo request."))?;
                info!(character = %stored.model.id, "Undid '{}'", entry.description);
                let character = self.load(stored.model.clone())?;
                Ok(summarize(&character, stored))
            })
            .ok_or_else(|| CharacterError::NotFound { id: id.to_owned() })?
    }

    pub fn delete(&self, id: &str) -> Result<(), CharacterError> {
        self.store.remove(id).ok_or_else(|| CharacterError::NotFound { id: id.to_owned() })?;
        info!(character = id, "Character deleted");
        Ok(())
    }

    /// Stores a copy under a new id and returns that id. Undo history is
    /// not copied.
    pub fn copy(&self, id: &str) -> Result<String, CharacterError> {
        let mut model = self.stored(id)?.model;
        let new_id = larp_kernel::safe_nanoid!();
        model.id.clone_from(&new_id);
        model.metadata.id.clone_from(&new_id);
        model.name = model.name.map(|n| format!("{n} (copy)"));
        self.store.insert(model);
        info!(character = id, copy = %new_id, "Character copied");
        Ok(new_id)
    }
}

fn summarize(character: &Character, stored: &StoredCharacter) -> CharacterSummary {
    CharacterSummary {
        character: CharacterView::from(character),
        issues: character.issues(),
        groups: character.feature_groups(),
        undo: stored.last_undo().map(|e| UndoView { id: e.id.clone(), description: e.description.clone() }),
    }
}

/// Turns the purchase form into a mutation; `None` when nothing changes.
fn purchase_mutation(
    character: &Character,
    feature_id: &str,
    request: FeaturePurchase,
) -> Result<Option<Mutation>, CharacterError> {
    let not_found = || CharacterError::FeatureNotFound { id: feature_id.to_owned() };
    let expr = PropExpression::parse(feature_id).map_err(|_| not_found())?;
    if character.ruleset().feature(&expr.prop).is_none() {
        return Err(not_found());
    }

    if let Some(choice) = request.choice {
        let value = request
            .selection
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CharacterError::bad_request("A selection is required."))?;
        return Ok(Some(ChoiceMutation { id: expr.feature_id(), choice, value, remove: request.remove }.into()));
    }

    let option = request.option.filter(|o| !o.trim().is_empty()).or(expr.option);
    let requested = request.ranks.unwrap_or(1);
    let target = PropExpression::with_option(expr.prop.clone(), option.as_deref());
    let ranks = match character.feature_expr(&target) {
        Some(fc) if !fc.is_template() => requested - fc.value(),
        _ => requested,
    };
    Ok((ranks != 0).then(|| RankMutation { id: expr.prop, option, ranks }.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Characters;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn slice(undo_limit: usize) -> Characters {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tempest");
        let ruleset = larp_rules::load_ruleset(dir).unwrap();
        Characters::with_engine(Engine::new(Arc::new(ruleset)), undo_limit)
    }

    fn create(slice: &Characters) -> String {
        let summary = slice.create(CreateCharacter { name: "Ash".into(), ruleset: None }).unwrap();
        summary.character.id
    }

    fn ranks(n: i32) -> FeaturePurchase {
        FeaturePurchase { ranks: Some(n), option: None, choice: None, selection: None, remove: false }
    }

    fn rejection(err: CharacterError) -> larp_rules::Decision {
        match err {
            CharacterError::Rejected { decision } => decision,
            other => panic!("expected a rejection, got {other}"),
        }
    }

    #[test]
    fn new_characters_start_clean() {
        let slice = slice(5);
        let id = create(&slice);
        let summary = slice.summary(&id).unwrap();
        assert_eq!(summary.character.name.as_deref(), Some("Ash"));
        assert_eq!(summary.character.cp, 5);
        assert!(summary.character.respend);
        assert!(summary.undo.is_none());
        assert!(summary.issues.is_empty());
        assert_eq!(slice.list().len(), 1);

        let err = slice.create(CreateCharacter { name: " ".into(), ruleset: None }).unwrap_err();
        assert_eq!(err.status_code(), 400);
        let err = slice.create(CreateCharacter { name: "Bo".into(), ruleset: Some("other".into()) }).unwrap_err();
        assert!(matches!(err, CharacterError::UnknownRuleset { .. }));
    }

    #[test]
    fn ranks_are_absolute_for_concrete_features() {
        let slice = slice(5);
        let id = create(&slice);

        let summary = slice.purchase(&id, "parry", ranks(2)).unwrap();
        assert_eq!(summary.character.cp, 3);
        assert_eq!(summary.undo.unwrap().description, "Purchase Parry x2");

        let summary = slice.purchase(&id, "parry", ranks(1)).unwrap();
        assert_eq!(summary.character.cp, 4);
        assert_eq!(summary.undo.unwrap().description, "Remove Parry x1");

        slice.purchase(&id, "parry", ranks(1)).unwrap();
        let stored = slice.store().get(&id).unwrap();
        assert_eq!(stored.history().count(), 2);
    }

    #[test]
    fn rejected_purchases_leave_the_sheet_alone() {
        let slice = slice(5);
        let id = create(&slice);
        let before = slice.store().get(&id).unwrap().model;

        let decision = rejection(slice.purchase(&id, "riposte", ranks(1)).unwrap_err());
        assert!(!decision.success);
        assert_eq!(slice.store().get(&id).unwrap().model, before);

        let err = slice.purchase(&id, "necromancy", ranks(1)).unwrap_err();
        assert_eq!(err.kind(), "feature-not-found");
        assert!(matches!(slice.purchase("nobody", "parry", ranks(1)), Err(CharacterError::NotFound { .. })));
    }

    #[test]
    fn templates_need_an_option() {
        let slice = slice(5);
        let id = create(&slice);
        let decision = rejection(slice.purchase(&id, "lore", ranks(1)).unwrap_err());
        assert!(decision.needs_option);

        let request = FeaturePurchase { option: Some("Undead".into()), ..ranks(1) };
        slice.purchase(&id, "lore", request).unwrap();
        let form = slice.feature_form(&id, "lore+Undead").unwrap();
        assert_eq!(form.value, 1);
    }

    #[test]
    fn choices_grant_selections() {
        let slice = slice(5);
        let id = create(&slice);
        slice.purchase(&id, "training", ranks(1)).unwrap();

        let request = FeaturePurchase {
            choice: Some("skill".into()),
            selection: Some("parry".into()),
            ..ranks(0)
        };
        let summary = slice.purchase(&id, "training", request).unwrap();
        assert!(summary.undo.unwrap().description.starts_with("Chose 'Parry'"));
        assert_eq!(slice.feature_form(&id, "parry").unwrap().value, 1);

        let missing = FeaturePurchase { choice: Some("skill".into()), ..ranks(0) };
        assert_eq!(slice.purchase(&id, "training", missing).unwrap_err().status_code(), 400);
    }

    #[test]
    fn undo_restores_the_previous_model() {
        let slice = slice(5);
        let id = create(&slice);
        let request = UndoRequest { undo: "anything".into() };
        assert_eq!(slice.undo(&id, request).unwrap_err().to_string(), "Conflict: Nothing to undo.");

        let before = slice.store().get(&id).unwrap().model;
        let undo_id = slice.purchase(&id, "parry", ranks(2)).unwrap().undo.unwrap().id;
        let err = slice.undo(&id, UndoRequest { undo: "stale".into() }).unwrap_err();
        assert_eq!(err.status_code(), 409);

        let summary = slice.undo(&id, UndoRequest { undo: undo_id }).unwrap();
        assert_eq!(summary.character.cp, 5);
        assert!(summary.undo.is_none());
        assert_eq!(slice.store().get(&id).unwrap().model, before);
    }

    #[test]
    fn undo_history_is_bounded() {
        let slice = slice(2);
        let id = create(&slice);
        for n in 1..=3 {
            slice.purchase(&id, "parry", ranks(n)).unwrap();
        }
        assert_eq!(slice.store().get(&id).unwrap().history().count(), 2);
    }

    #[test]
    fn finalize_requires_a_clean_sheet() {
        let slice = slice(5);
        let id = create(&slice);
        slice.purchase(&id, "veteran", ranks(1)).unwrap();
        let decision = rejection(slice.finalize(&id).unwrap_err());
        assert!(decision.reason_str().contains("Veteran"), "{decision}");

        slice.purchase(&id, "parry", ranks(3)).unwrap();
        let summary = slice.finalize(&id).unwrap();
        assert!(!summary.character.respend);
        assert!(summary.undo.is_none());

        let decision = rejection(slice.purchase(&id, "parry", ranks(2)).unwrap_err());
        assert_eq!(decision.reason_str(), "Respend not currently available.");
        assert!(matches!(slice.finalize(&id), Err(CharacterError::Conflict { .. })));
    }

    #[test]
    fn attributes_and_names() {
        let slice = slice(5);
        let id = create(&slice);
        let summary = slice.set_attributes(&id, AttributesUpdate { level: Some(4), cp: Some(3) }).unwrap();
        assert_eq!(summary.character.xp_level, 4);
        assert_eq!(summary.character.xp, 16);
        assert_eq!(summary.character.awarded_cp, 3);
        assert_eq!(summary.character.cp, 3 + 1 + 2 * 4);
        assert!(slice.set_attributes(&id, AttributesUpdate { level: Some(0), cp: None }).is_err());

        let summary = slice.rename(&id, NameUpdate { name: "  Bo ".into() }).unwrap();
        assert_eq!(summary.character.name.as_deref(), Some("Bo"));
        assert!(slice.rename(&id, NameUpdate { name: String::new() }).is_err());
    }

    #[test]
    fn copy_and_delete() {
        let slice = slice(5);
        let id = create(&slice);
        slice.purchase(&id, "parry", ranks(1)).unwrap();

        let copy = slice.copy(&id).unwrap();
        assert_ne!(copy, id);
        let summary = slice.summary(&copy).unwrap();
        assert_eq!(summary.character.name.as_deref(), Some("Ash (copy)"));
        assert_eq!(summary.character.cp, 4);
        assert!(summary.undo.is_none());

        slice.delete(&id).unwrap();
        assert!(matches!(slice.summary(&id), Err(CharacterError::NotFound { .. })));
        assert!(slice.delete(&id).is_err());
        assert_eq!(slice.list().len(), 1);
    }
}
