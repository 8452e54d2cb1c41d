//! Entry point binding a loaded ruleset to character sheets.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::character::Character;
use crate::character::model::CharacterModel;
use crate::error::RulesError;
use crate::ruleset::Ruleset;

#[derive(Debug, Clone)]
pub struct Engine {
    ruleset: Arc<Ruleset>,
}

impl Engine {
    #[must_use]
    pub const fn new(ruleset: Arc<Ruleset>) -> Self {
        Self { ruleset }
    }

    #[must_use]
    pub const fn ruleset(&self) -> &Arc<Ruleset> {
        &self.ruleset
    }

    /// Blank sheet stamped with this ruleset's id and version.
    #[must_use]
    pub fn new_character(&self, id: impl Into<String>) -> Character {
        let model = CharacterModel::new(id, &self.ruleset.id, &self.ruleset.version);
        Character::new(Arc::clone(&self.ruleset), model)
    }

    /// # Errors
    /// See [`update_data`](Self::update_data).
    #[instrument(skip_all, fields(character = %model.id))]
    pub fn load_character(&self, model: CharacterModel) -> Result<Character, RulesError> {
        let model = self.update_data(model)?;
        Ok(Character::new(Arc::clone(&self.ruleset), model))
    }

    /// Brings a stored sheet up to this ruleset. Sheets from another ruleset
    /// or from a newer version of this one are rejected.
    ///
    /// # Errors
    /// [`RulesError::Incompatible`] when the sheet can't be loaded.
    pub fn update_data(&self, mut model: CharacterModel) -> Result<CharacterModel, RulesError> {
        let ruleset = &self.ruleset;
        if model.ruleset_id != ruleset.id {
            return Err(RulesError::Incompatible {
                message: format!(
                    "Can not load character id={}, ruleset={} with ruleset {}",
                    model.id, model.ruleset_id, ruleset.id
                )
                .into(),
                context: None,
            });
        }
        if compare_versions(&ruleset.version, &model.ruleset_version) == Ordering::Less {
            return Err(RulesError::Incompatible {
                message: format!(
                    "Can not load character id={}, ruleset={} v{} with ruleset {} v{}",
                    model.id, model.ruleset_id, model.ruleset_version, ruleset.id, ruleset.version
                )
                .into(),
                context: None,
            });
        }
        if model.ruleset_version != ruleset.version {
            debug!(from = %model.ruleset_version, to = %ruleset.version, "Upgrading character data");
            model.ruleset_version.clone_from(&ruleset.version);
        }
        Ok(model)
    }
}

/// Release segments, then pre-release tag (`a` < `b` < `rc` < final).
#[derive(Debug, PartialEq, Eq)]
struct Version {
    release: Vec<u64>,
    pre: (u8, u64),
}

impl Version {
    const FINAL: u8 = 3;

    fn parse(text: &str) -> Option<Self> {
        let text = text.trim().trim_start_matches(['v', 'V']);
        let split = text.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(text.len());
        let (release, rest) = text.split_at(split);
        let release = release
            .trim_end_matches('.')
            .split('.')
            .map(str::parse)
            .collect::<Result<Vec<u64>, _>>()
            .ok()?;
        let rest = rest.trim_start_matches(['.', '-', '_']).to_ascii_lowercase();
        let digits = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let (tag, number) = rest.split_at(digits);
        let number = if number.is_empty() { 0 } else { number.parse().ok()? };
        let rank = match tag {
            "" => Self::FINAL,
            "a" | "alpha" => 0,
            "b" | "beta" => 1,
            "rc" | "c" | "pre" | "preview" => 2,
            _ => return None,
        };
        Some(Self { release, pre: (rank, number) })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        let segment = |v: &Self, i: usize| v.release.get(i).copied().unwrap_or(0);
        (0..len)
            .map(|i| segment(self, i).cmp(&segment(other, i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
            .then(self.pre.cmp(&other.pre))
    }
}

/// Orders version strings like `0.0a`, `1.2`, `1.2rc1`. Strings that don't
/// parse fall back to plain text order.
pub(crate) fn compare_versions(a: &str, b: &str) -> Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(version: &str) -> Engine {
        let mut ruleset: Ruleset = serde_yaml::from_str("{id: tempest, name: Tempest, xp_table: {0: 2}}").unwrap();
        ruleset.version = version.into();
        Engine::new(Arc::new(ruleset))
    }

    #[test]
    fn version_order() {
        assert_eq!(compare_versions("0.0a", "0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0", "1"), Ordering::Equal);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("2.0b1", "2.0rc1"), Ordering::Less);
        assert_eq!(compare_versions("0.1a", "0.0a"), Ordering::Greater);
    }

    #[test]
    fn new_characters_carry_ruleset_identity() {
        let c = engine("1.2").new_character("abc");
        assert_eq!(c.model().ruleset_id, "tempest");
        assert_eq!(c.model().ruleset_version, "1.2");
        assert_eq!(c.model().metadata.id, "abc");
    }

    #[test]
    fn older_sheets_are_upgraded() {
        let model = CharacterModel::new("abc", "tempest", "1.0");
        let c = engine("1.2").load_character(model).unwrap();
        assert_eq!(c.model().ruleset_version, "1.2");
    }

    #[test]
    fn incompatible_sheets_are_rejected() {
        let newer = CharacterModel::new("abc", "tempest", "2.0");
        let err = engine("1.2").load_character(newer).unwrap_err();
        assert!(err.to_string().contains("v2.0 with ruleset tempest v1.2"), "{err}");

        let foreign = CharacterModel::new("abc", "other", "1.0");
        assert!(matches!(engine("1.2").update_data(foreign), Err(RulesError::Incompatible { .. })));
    }
}
