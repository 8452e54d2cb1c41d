//! Serialized character state. Everything derived (values, bonuses, costs)
//! is recomputed from this on load.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    /// Text form, as used when a flag lists option values.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Text(t) => t.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Many(Vec<FlagValue>),
    One(FlagValue),
}

impl Flag {
    #[must_use]
    pub fn values(&self) -> Vec<FlagValue> {
        match self {
            Self::Many(values) => values.clone(),
            Self::One(value) => vec![value.clone()],
        }
    }

    /// Whether the flag is set to something other than `false` or empty.
    #[must_use]
    pub fn is_set(&self) -> bool {
        match self {
            Self::Many(values) => !values.is_empty(),
            Self::One(FlagValue::Bool(b)) => *b,
            Self::One(FlagValue::Int(n)) => *n != 0,
            Self::One(FlagValue::Text(t)) => !t.is_empty(),
        }
    }
}

/// Ruleset defaults overlaid with character flags. Nulls are skipped, lists
/// concatenate with anything, scalars overwrite.
#[must_use]
pub fn merge_flags(
    defaults: &IndexMap<String, Flag>,
    overrides: &IndexMap<String, Option<Flag>>,
) -> IndexMap<String, Flag> {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        let Some(value) = value else { continue };
        match merged.get_mut(key) {
            None => {
                merged.insert(key.clone(), value.clone());
            }
            Some(current) => {
                if matches!(current, Flag::Many(_)) || matches!(value, Flag::Many(_)) {
                    let mut values = current.values();
                    values.extend(value.values());
                    *current = Flag::Many(values);
                } else {
                    *current = value.clone();
                }
            }
        }
    }
    merged
}

/// Data from outside the sheet: awards, flags and plot grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterMetadata {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    /// Awarded currency by id (`xp`, `cp`).
    pub awards: IndexMap<String, i32>,
    pub flags: IndexMap<String, Option<Flag>>,
    /// Plot grants, as grant expressions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureModel {
    pub ranks: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Choice id to the selections made, as expressions (`lore+Undead:2`).
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub choices: IndexMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub plot_added: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_notes: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub plot_free: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub plot_suppressed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub overcome: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub plot_disable_overcome: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overcome_award_override: Option<i32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_archetype_class: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_starting_class: bool,
}

impl FeatureModel {
    /// Whether anything here differs from an untouched feature.
    #[must_use]
    pub fn should_keep(&self) -> bool {
        self.ranks != 0
            || self.notes.as_deref().is_some_and(|n| !n.is_empty())
            || self.choices.values().any(|c| !c.is_empty())
            || self.plot_added
            || self.plot_notes.as_deref().is_some_and(|n| !n.is_empty())
            || self.plot_free
            || self.plot_suppressed
            || self.overcome
            || self.plot_disable_overcome
            || self.overcome_award_override.is_some()
            || self.is_archetype_class
            || self.is_starting_class
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterModel {
    pub id: String,
    pub ruleset_id: String,
    #[serde(default)]
    pub ruleset_version: String,
    #[serde(default)]
    pub metadata: CharacterMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Keyed by full feature id (`lore+Undead_Lore`).
    #[serde(default)]
    pub features: IndexMap<String, FeatureModel>,
    /// Free respend: ranks may be sold back and flaws removed outright.
    #[serde(default = "CharacterModel::default_respend")]
    pub respend: bool,
}

impl CharacterModel {
    #[must_use]
    pub fn new(id: impl Into<String>, ruleset_id: impl Into<String>, ruleset_version: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            metadata: CharacterMetadata { id: id.clone(), ..CharacterMetadata::default() },
            id,
            ruleset_id: ruleset_id.into(),
            ruleset_version: ruleset_version.into(),
            name: None,
            features: IndexMap::new(),
            respend: true,
        }
    }

    const fn default_respend() -> bool {
        true
    }

    /// Drops feature entries that hold nothing worth saving.
    pub fn prune(&mut self) {
        self.features.retain(|_, f| {
            f.choices.retain(|_, c| !c.is_empty());
            f.should_keep()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(json: serde_json::Value) -> IndexMap<String, Option<Flag>> {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn flag_merge_rules() {
        let defaults: IndexMap<String, Flag> =
            serde_json::from_value(serde_json::json!({ "phobias": ["Spiders"], "mode": "normal", "keep": 1 })).unwrap();
        let merged = merge_flags(
            &defaults,
            &flags(serde_json::json!({ "phobias": "Heights", "mode": "hard", "keep": null, "new": true })),
        );

        assert_eq!(merged["phobias"].values().len(), 2);
        assert_eq!(merged["mode"], Flag::One(FlagValue::Text("hard".into())));
        assert_eq!(merged["keep"], Flag::One(FlagValue::Int(1)));
        assert_eq!(merged["new"], Flag::One(FlagValue::Bool(true)));
    }

    #[test]
    fn should_keep_ignores_empty_choices() {
        let mut model = FeatureModel::default();
        assert!(!model.should_keep());
        model.choices.insert("pick".into(), Vec::new());
        assert!(!model.should_keep());
        model.choices.insert("pick".into(), vec!["lore".into()]);
        assert!(model.should_keep());
    }

    #[test]
    fn respend_defaults_on() {
        let model: CharacterModel =
            serde_json::from_value(serde_json::json!({ "id": "c1", "ruleset_id": "test" })).unwrap();
        assert!(model.respend);
        assert!(model.features.is_empty());
    }
}
