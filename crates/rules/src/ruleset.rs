//! The ruleset: feature definitions plus the numeric rules of the game.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::character::model::Flag;
use crate::defs::{Attribute, FeatureDef, FeatureType, Grantable, title_case};
use crate::expr::PropExpression;
use crate::requirement::Requirement;
use crate::tables::{Rounding, ScalingTable, Table, int_keys};

static ATTRIBUTES: LazyLock<Vec<Attribute>> = LazyLock::new(|| {
    let mut xp = Attribute::new("xp", "Experience Points");
    xp.abbrev = Some("XP".into());
    xp.description = Some("You earn 2 XP per half-day game, or 8 per normal weekend game.".into());

    let mut xp_level = Attribute::new("xp_level", "Experience Level");
    xp_level.abbrev = Some("Level".into());
    xp_level.default_value = 2;
    xp_level.description = Some("Your level, determined by your XP total.".into());

    let mut level = Attribute::new("level", "Character Level");
    level.hidden = true;
    level.is_tag = true;

    let mut lp = Attribute::new("lp", "Life Points");
    lp.abbrev = Some("LP".into());
    lp.default_value = 2;

    let mut cp = Attribute::new("cp", "Character Points");
    cp.abbrev = Some("CP".into());

    let scoped = |id: &str, name: &str| {
        let mut a = Attribute::new(id, name);
        a.scoped = true;
        a
    };
    let tiered = |id: &str, name: &str, tiers: [&str; 4]| {
        let mut a = scoped(id, name);
        a.tiered = true;
        a.tier_names = Some(tiers.iter().map(|t| (*t).to_owned()).collect());
        a
    };
    let tag = |id: &str, name: &str| {
        let mut a = Attribute::new(id, name);
        a.is_tag = true;
        a.hidden = true;
        a
    };
    let mut basic_classes = Attribute::new("basic-classes", "Basic Classes");
    basic_classes.hidden = true;
    basic_classes.property_name = Some("basic_classes".into());

    vec![
        xp,
        xp_level,
        level,
        lp,
        cp,
        Attribute::new("spikes", "Spikes"),
        scoped("utilities", "Utilities"),
        scoped("cantrips", "Cantrips"),
        tiered("spell_slots", "Spell Slots", ["Novice", "Adept", "Greater", "Master"]),
        scoped("spells_known", "Spells Known"),
        scoped("spells_prepared", "Spells Prepared"),
        tiered("powers", "Powers", ["Basic", "Advanced", "Veteran", "Champion"]),
        tag("arcane", "Arcane"),
        tag("divine", "Divine"),
        tag("martial", "Martial"),
        tag("caster", "Caster Levels"),
        basic_classes,
    ]
});

/// A definition the loader could not use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadDefinition {
    pub path: String,
    /// Parsed document with directory defaults applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
    pub exception_type: String,
    pub exception_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ruleset {
    pub id: String,
    pub name: String,
    #[serde(default = "Ruleset::default_version")]
    pub version: String,
    #[serde(default)]
    pub features: IndexMap<String, FeatureDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bad_defs: Vec<BadDefinition>,
    #[serde(default)]
    pub default_flags: IndexMap<String, Flag>,
    #[serde(default)]
    pub name_overrides: IndexMap<String, String>,

    /// Carried so rulesets written for breed-enabled games load and
    /// serialize unchanged. Breed features are not a supported type, so
    /// nothing enforces it.
    #[serde(default = "defaults::breed_count_cap")]
    pub breed_count_cap: i32,
    #[serde(default = "defaults::flaw_cp_cap")]
    pub flaw_cp_cap: i32,
    #[serde(default = "defaults::flaw_overcome")]
    pub flaw_overcome: i32,
    #[serde(default = "defaults::cp_baseline")]
    pub cp_baseline: i32,
    #[serde(default = "defaults::cp_per_level")]
    pub cp_per_level: i32,

    pub xp_table: Table,
    #[serde(default = "defaults::lp")]
    pub lp: Table,
    #[serde(default = "defaults::spikes")]
    pub spikes: Table,
    /// Tier 0 is utilities (martial) or cantrips (casters).
    #[serde(default = "defaults::powers", deserialize_with = "int_keys::deserialize")]
    pub powers: BTreeMap<i32, Table>,
    #[serde(default = "defaults::spells")]
    pub spells_known: Table,
    #[serde(default = "defaults::spells")]
    pub spells_prepared: Table,
}

mod defaults {
    use super::{BTreeMap, Rounding, ScalingTable, Table};

    pub(super) const fn breed_count_cap() -> i32 {
        2
    }
    pub(super) const fn flaw_cp_cap() -> i32 {
        5
    }
    pub(super) const fn flaw_overcome() -> i32 {
        2
    }
    pub(super) const fn cp_baseline() -> i32 {
        1
    }
    pub(super) const fn cp_per_level() -> i32 {
        2
    }
    pub(super) fn lp() -> Table {
        ScalingTable::new(2, 5.0, Rounding::Up).into()
    }
    pub(super) fn spikes() -> Table {
        ScalingTable::new(2, 6.0, Rounding::Down).into()
    }
    pub(super) fn powers() -> BTreeMap<i32, Table> {
        [(0, 0, 2.0), (1, 1, 2.0), (2, 0, 6.0), (3, 0, 11.0), (4, 0, 16.0)]
            .into_iter()
            .map(|(tier, base, factor)| (tier, ScalingTable::new(base, factor, Rounding::Down).into()))
            .collect()
    }
    pub(super) fn spells() -> Table {
        ScalingTable::new(1, 1.0, Rounding::Nearest).into()
    }
}

impl Ruleset {
    fn default_version() -> String {
        "0.0a".into()
    }

    /// Built-in attributes every character has.
    #[must_use]
    pub fn attributes(&self) -> &'static [Attribute] {
        &ATTRIBUTES
    }

    #[must_use]
    pub fn attribute(&self, id: &str) -> Option<&'static Attribute> {
        ATTRIBUTES.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub fn feature(&self, id: &str) -> Option<&FeatureDef> {
        self.features.get(id)
    }

    /// Feature or attribute id; any option or threshold suffix is ignored.
    #[must_use]
    pub fn identifier_defined(&self, id: &str) -> bool {
        let prop = PropExpression::parse(id).map_or_else(|_| id.to_owned(), |e| e.prop);
        self.features.contains_key(&prop) || self.attribute(&prop).is_some()
    }

    /// Identifiers in `req` that name nothing in this ruleset.
    #[must_use]
    pub fn validate_identifiers(&self, req: &Requirement) -> Vec<String> {
        req.identifiers().into_iter().filter(|id| !self.identifier_defined(id)).collect()
    }

    #[must_use]
    pub fn feature_type_name(&self, kind: FeatureType) -> String {
        self.name_overrides.get(kind.key()).cloned().unwrap_or_else(|| kind.default_name())
    }

    /// User-facing name for a feature, attribute or type key.
    #[must_use]
    pub fn display_name(&self, id: &str) -> String {
        if let Some(name) = self.name_overrides.get(id) {
            return name.clone();
        }
        if let Some(kind) = FeatureType::ALL.iter().find(|k| k.key() == id) {
            return kind.default_name();
        }
        if let Some(feature) = self.features.get(id) {
            return feature.name.clone();
        }
        if let Some(attribute) = self.attribute(id) {
            return attribute.name.clone();
        }
        title_case(id)
    }

    /// Checks a loaded definition against the rest of the ruleset.
    ///
    /// # Errors
    /// The first problem found, as a message for [`BadDefinition`].
    pub fn post_validate(&self, def: &FeatureDef) -> Result<(), String> {
        def.check_shape()?;
        if let Some(parent) = &def.parent
            && !self.features.contains_key(parent)
        {
            return Err(format!("Parent \"{parent}\" not found in ruleset."));
        }

        let mut ids = Vec::new();
        for req in [&def.requires, &def.soft_requires].into_iter().flatten() {
            ids.extend(req.identifiers());
        }
        let grantables = [&def.grants, &def.starting_features, &def.multiclass_features];
        for grant in grantables.into_iter().flatten() {
            ids.extend(grant.identifiers());
        }
        for grant in def.rank_grants.iter().flat_map(BTreeMap::values) {
            ids.extend(grant.identifiers());
        }
        for grant_if in &def.grant_if {
            ids.extend(grant_if.requires.identifiers());
            ids.extend(grant_if.grants.identifiers());
        }
        let discounted = def.discounts.iter().flat_map(IndexMap::keys);
        ids.extend(discounted.flat_map(|k| Grantable::Expr(k.clone()).identifiers()));
        ids.extend(def.award_mods.iter().flat_map(IndexMap::keys).cloned());
        ids.extend(def.supersedes.iter().cloned());
        for choice in def.choices.iter().flat_map(IndexMap::values) {
            if let Some(matcher_ids) = choice.matcher.as_ref().and_then(|m| m.id.as_ref()) {
                ids.extend(matcher_ids.iter().map(str::to_owned));
            }
            if let Some(req) = &choice.requires {
                ids.extend(req.identifiers());
            }
        }
        if let Some(option) = &def.option_def {
            if let Some(inherit) = &option.inherit {
                ids.extend(inherit.identifiers());
            }
            for req in option.requires.iter().flat_map(IndexMap::values) {
                ids.extend(req.identifiers());
            }
        }

        match ids.into_iter().find(|id| !self.identifier_defined(id)) {
            Some(id) => Err(format!("Required identifier \"{id}\" not found in ruleset.")),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ruleset(features: &str) -> Ruleset {
        let mut r: Ruleset = serde_yaml::from_str("{id: test, name: Test, xp_table: {0: 2, 8: 3}}").unwrap();
        let defs: Vec<FeatureDef> = serde_yaml::from_str(features).unwrap();
        r.features = defs.into_iter().map(|d| (d.id.clone(), d)).collect();
        r
    }

    #[test]
    fn numeric_defaults() {
        let r = ruleset("[]");
        assert_eq!(r.version, "0.0a");
        assert_eq!((r.flaw_cp_cap, r.flaw_overcome, r.cp_baseline, r.cp_per_level), (5, 2, 1, 2));
        assert_eq!(r.lp.evaluate(2), 3);
        assert_eq!(r.powers[&1].evaluate(2), 2);
        assert_eq!(r.powers.len(), 5);
    }

    #[test]
    fn breed_cap_survives_a_round_trip() {
        assert_eq!(ruleset("[]").breed_count_cap, 2);
        let r: Ruleset =
            serde_yaml::from_str("{id: test, name: Test, xp_table: {0: 2}, breed_count_cap: 1}").unwrap();
        let restored: Ruleset = serde_json::from_str(&serde_json::to_string(&r).unwrap()).unwrap();
        assert_eq!(restored.breed_count_cap, 1);
    }

    #[test]
    fn display_names() {
        let mut r = ruleset("[{id: basic-skill, name: Basic Skill, type: skill, cost: 1}]");
        r.name_overrides.insert("perk".into(), "Talent".into());
        assert_eq!(r.display_name("basic-skill"), "Basic Skill");
        assert_eq!(r.display_name("lp"), "Life Points");
        assert_eq!(r.display_name("perk"), "Talent");
        assert_eq!(r.display_name("class"), "Class");
        assert_eq!(r.display_name("mystery_thing"), "Mystery Thing");
        assert_eq!(r.feature_type_name(FeatureType::Perk), "Talent");
    }

    #[test]
    fn identifiers() {
        let r = ruleset("[{id: lore, name: Lore, type: skill, cost: 1}]");
        assert!(r.identifier_defined("lore+Undead:2"));
        assert!(r.identifier_defined("spell_slots"));
        assert!(!r.identifier_defined("necromancy"));
        let req: Requirement = serde_yaml::from_str("[lore, necromancy, -ghost]").unwrap();
        assert_eq!(r.validate_identifiers(&req), vec!["ghost".to_owned(), "necromancy".to_owned()]);
    }

    #[test]
    fn post_validation() {
        let r = ruleset("[{id: lore, name: Lore, type: skill, cost: 1}]");
        let def: FeatureDef = serde_yaml::from_str("{id: x, name: X, type: perk, cost: 1, grants: [lore, ghost]}").unwrap();
        assert_eq!(r.post_validate(&def).unwrap_err(), "Required identifier \"ghost\" not found in ruleset.");
        let def: FeatureDef = serde_yaml::from_str("{id: x, name: X, type: perk, cost: 1, parent: nope}").unwrap();
        assert!(r.post_validate(&def).unwrap_err().contains("Parent"));
        let def: FeatureDef = serde_yaml::from_str("{id: x, name: X, type: perk, cost: 1, requires: lore:2}").unwrap();
        assert!(r.post_validate(&def).is_ok());
    }
}
