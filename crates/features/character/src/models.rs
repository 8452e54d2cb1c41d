//! Request and response bodies.

use larp_derive::api_model;
use larp_rules::{Character, FeatureGroup, Issue};

#[api_model(skip_none)]
pub struct CreateCharacter {
    pub name: String,
    /// Ruleset id; must match the loaded ruleset when given.
    pub ruleset: Option<String>,
}

#[api_model(skip_none)]
pub struct CharacterListItem {
    pub id: String,
    pub name: Option<String>,
    pub ruleset_id: String,
    pub level: i32,
}

/// Headline numbers of a sheet.
#[api_model(skip_none)]
pub struct CharacterView {
    pub id: String,
    pub name: Option<String>,
    pub ruleset_id: String,
    pub ruleset_version: String,
    pub xp: i32,
    pub xp_level: i32,
    pub level: i32,
    pub levels_available: i32,
    pub cp: i32,
    pub awarded_cp: i32,
    pub flaw_cp_available: i32,
    pub lp: i32,
    pub spikes: i32,
    pub respend: bool,
}

impl From<&Character> for CharacterView {
    fn from(character: &Character) -> Self {
        let model = character.model();
        Self {
            id: model.id.clone(),
            name: model.name.clone(),
            ruleset_id: model.ruleset_id.clone(),
            ruleset_version: model.ruleset_version.clone(),
            xp: character.xp(),
            xp_level: character.xp_level(),
            level: character.level(),
            levels_available: character.levels_available(),
            cp: character.cp(),
            awarded_cp: character.awarded_cp(),
            flaw_cp_available: character.flaw_cp_available(),
            lp: character.lp(),
            spikes: character.spikes(),
            respend: character.can_respend(),
        }
    }
}

/// The latest undoable change.
#[api_model]
pub struct UndoView {
    pub id: String,
    pub description: String,
}

#[api_model(skip_none)]
pub struct CharacterSummary {
    pub character: CharacterView,
    #[cfg_attr(feature = "server", schema(value_type = Vec<Object>))]
    pub issues: Vec<Issue>,
    #[cfg_attr(feature = "server", schema(value_type = Vec<Object>))]
    pub groups: Vec<FeatureGroup>,
    pub undo: Option<UndoView>,
}

/// Purchase form. `ranks` is the target value for concrete features and a
/// delta for option templates. Setting `choice` makes a choice selection
/// instead.
#[api_model(skip_none)]
pub struct FeaturePurchase {
    pub ranks: Option<i32>,
    pub option: Option<String>,
    pub choice: Option<String>,
    pub selection: Option<String>,
    #[serde(default)]
    pub remove: bool,
}

#[api_model(skip_none)]
pub struct AttributesUpdate {
    /// Character level; awarded XP is set to the minimum for it.
    pub level: Option<i32>,
    /// Awarded CP.
    pub cp: Option<i32>,
}

#[api_model]
pub struct NameUpdate {
    pub name: String,
}

#[api_model]
pub struct UndoRequest {
    /// Id of the latest undo entry.
    pub undo: String,
}
