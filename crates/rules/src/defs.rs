//! # Definitions
//!
//! Everything a ruleset declares: attributes, feature definitions and their
//! building blocks (options, costs, grants, discounts, choices, matchers).
//! Definitions are plain data; the rules that interpret them live in
//! [`character`](crate::character).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::expr::PropExpression;
use crate::requirement::Requirement;
use crate::tables::{RankTable, int_keys, table_lookup};

/// Value used for "unlimited" ranks.
pub const UNLIMITED_RANKS: i32 = 101;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Attribute {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbrev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub default_value: i32,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub scoped: bool,
    #[serde(default)]
    pub tiered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_names: Option<Vec<String>>,
    #[serde(default)]
    pub is_tag: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
}

impl Attribute {
    pub(crate) fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            abbrev: None,
            description: None,
            default_value: 0,
            hidden: false,
            scoped: false,
            tiered: false,
            tier_names: None,
            is_tag: false,
            compute: None,
            property_name: None,
        }
    }
}

/// A count that may also be the keyword `unlimited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLimit", into = "RawLimit")]
pub enum Limit {
    Count(i32),
    Unlimited,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawLimit {
    Count(i32),
    Keyword(String),
}

impl TryFrom<RawLimit> for Limit {
    type Error = String;

    fn try_from(raw: RawLimit) -> Result<Self, Self::Error> {
        match raw {
            RawLimit::Count(n) => Ok(Self::Count(n)),
            RawLimit::Keyword(k) if k == "unlimited" => Ok(Self::Unlimited),
            RawLimit::Keyword(k) => Err(format!("expected a number or 'unlimited', got '{k}'")),
        }
    }
}

impl From<Limit> for RawLimit {
    fn from(limit: Limit) -> Self {
        match limit {
            Limit::Count(n) => Self::Count(n),
            Limit::Unlimited => Self::Keyword("unlimited".into()),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => n.fmt(f),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// How many distinct options of one feature may be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Multiple {
    Allowed(bool),
    Limit(u32),
}

impl Default for Multiple {
    fn default() -> Self {
        Self::Allowed(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionDef {
    #[serde(default)]
    pub freeform: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<IndexMap<String, Requirement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit: Option<PropExpression>,
    #[serde(default)]
    pub multiple: Multiple,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptions: Option<IndexMap<String, String>>,
}

/// Cost per rank that changes with the rank bought.
///
/// `{1: 1, 5: 3}` means ranks 1-4 cost 1 each and ranks 5 and up cost 3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostByRank {
    #[serde(deserialize_with = "int_keys::deserialize")]
    pub ranks: BTreeMap<i32, i32>,
}

impl CostByRank {
    #[must_use]
    pub fn single_rank_cost(&self, rank: i32) -> i32 {
        table_lookup(&self.ranks, rank).unwrap_or_default()
    }

    #[must_use]
    pub fn rank_costs(&self, ranks: i32) -> Vec<i32> {
        (1..=ranks).map(|r| self.single_rank_cost(r)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CostDef {
    Flat(i32),
    ByRank(CostByRank),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawDiscount")]
pub struct Discount {
    pub discount: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranks: Option<i32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDiscount {
    Bare(i32),
    Full {
        discount: i32,
        #[serde(default)]
        ranks: Option<i32>,
    },
}

impl From<RawDiscount> for Discount {
    fn from(raw: RawDiscount) -> Self {
        match raw {
            RawDiscount::Bare(discount) => Self { discount, ranks: None },
            RawDiscount::Full { discount, ranks } => Self { discount, ranks },
        }
    }
}

/// Grant amount: fixed, or looked up by the granting feature's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GrantValue {
    Fixed(i32),
    List(Vec<i32>),
    Table(RankTable),
}

impl Default for GrantValue {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

impl GrantValue {
    #[must_use]
    pub fn lookup(&self, value: i32) -> i32 {
        match self {
            Self::Fixed(n) => *n,
            Self::List(items) => {
                let table: BTreeMap<i32, i32> = items.iter().enumerate().map(|(i, v)| (i as i32, *v)).collect();
                table_lookup(&table, value).unwrap_or_default()
            }
            Self::Table(table) => table.evaluate(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantDef {
    pub id: String,
    #[serde(default)]
    pub value: GrantValue,
    #[serde(default)]
    pub per_rank: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Grantable {
    Expr(String),
    List(Vec<Grantable>),
    Def(GrantDef),
    Map(IndexMap<String, i32>),
}

impl Grantable {
    /// Props named by the grant, for ruleset validation.
    #[must_use]
    pub fn identifiers(&self) -> BTreeSet<String> {
        let prop = |text: &str| PropExpression::parse(text).map_or_else(|_| text.to_owned(), |e| e.prop);
        match self {
            Self::Expr(text) => BTreeSet::from([prop(text)]),
            Self::List(items) => items.iter().flat_map(Self::identifiers).collect(),
            Self::Def(def) => BTreeSet::from([prop(&def.id)]),
            Self::Map(map) => map.keys().map(|k| prop(k)).collect(),
        }
    }
}

/// Grants that only apply while a requirement holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantIf {
    pub requires: Requirement,
    pub grants: Grantable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ids {
    One(String),
    Many(BTreeSet<String>),
}

impl Ids {
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        match self {
            Self::One(one) => one == id,
            Self::Many(many) => many.contains(id),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let (one, many) = match self {
            Self::One(one) => (Some(one.as_str()), None),
            Self::Many(many) => (None, Some(many.iter().map(String::as_str))),
        };
        one.into_iter().chain(many.into_iter().flatten())
    }
}

/// Filters features for a choice: "any perk", "a martial skill but not a lore".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Ids>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<FeatureType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Ids>,
    /// Any other key must equal the same field of the feature.
    #[serde(flatten)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

impl FeatureMatcher {
    #[must_use]
    pub fn matches(&self, feature: &FeatureDef) -> bool {
        if self.id.as_ref().is_some_and(|ids| !ids.contains(&feature.id)) {
            return false;
        }
        if self.kind.is_some_and(|kind| kind != feature.kind) {
            return false;
        }
        if let Some(tags) = &self.tags {
            let (negative, positive): (Vec<&str>, Vec<&str>) = tags.iter().partition(|t| t.starts_with('-'));
            if !positive.iter().all(|t| feature.tags.contains(*t)) {
                return false;
            }
            if !negative.is_empty() && negative.iter().all(|t| feature.tags.contains(&t[1..])) {
                return false;
            }
        }
        if self.attrs.is_empty() {
            return true;
        }
        let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(feature) else {
            return false;
        };
        self.attrs.iter().all(|(key, expected)| fields.get(key) == Some(expected))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChoiceDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "ChoiceDef::default_limit")]
    pub limit: Limit,
    #[serde(default)]
    pub limit_is_per_rank: bool,
    /// Selections are discounted instead of granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Discount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<FeatureMatcher>,
    /// Only offered while the class is the starting class.
    #[serde(default)]
    pub starting_class: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_requires: Option<IndexMap<String, Requirement>>,
    /// The same selection may be taken more than once.
    #[serde(default)]
    pub multi: bool,
}

impl ChoiceDef {
    const fn default_limit() -> Limit {
        Limit::Count(1)
    }
}

/// Caps on how many ranks of child features may be bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChildPurchase {
    /// Expression whose value is looked up in `limit`; defaults to the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<PropExpression>,
    /// Without a table the basis value is the limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<GrantValue>,
}

impl ChildPurchase {
    #[must_use]
    pub fn limit_for(&self, basis: i32) -> i32 {
        self.limit.as_ref().map_or(basis, |table| table.lookup(basis))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Class,
    Subfeature,
    Skill,
    Flaw,
    Perk,
    Power,
    Innate,
    Archetype,
    Martial,
    Utility,
    Spell,
    Cantrip,
}

impl FeatureType {
    pub const ALL: [Self; 12] = [
        Self::Class,
        Self::Subfeature,
        Self::Skill,
        Self::Flaw,
        Self::Perk,
        Self::Power,
        Self::Innate,
        Self::Archetype,
        Self::Martial,
        Self::Utility,
        Self::Spell,
        Self::Cantrip,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Subfeature => "subfeature",
            Self::Skill => "skill",
            Self::Flaw => "flaw",
            Self::Perk => "perk",
            Self::Power => "power",
            Self::Innate => "innate",
            Self::Archetype => "archetype",
            Self::Martial => "martial",
            Self::Utility => "utility",
            Self::Spell => "spell",
            Self::Cantrip => "cantrip",
        }
    }

    /// Built-in display name, before ruleset overrides.
    #[must_use]
    pub fn default_name(self) -> String {
        title_case(self.key())
    }

    /// Sort order of feature groups on a sheet.
    #[must_use]
    pub const fn display_priority(self) -> u8 {
        match self {
            Self::Class => 0,
            Self::Flaw => 2,
            Self::Perk => 3,
            Self::Skill => 4,
            Self::Cantrip => 5,
            Self::Utility => 6,
            Self::Spell => 7,
            Self::Power => 8,
            _ => 99,
        }
    }

    /// Internal types are granted by other features and never listed alone.
    #[must_use]
    pub const fn is_internal(self) -> bool {
        matches!(self, Self::Subfeature | Self::Innate | Self::Archetype)
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sphere {
    Arcane,
    Divine,
    #[default]
    Martial,
}

impl Sphere {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Arcane => "arcane",
            Self::Divine => "divine",
            Self::Martial => "martial",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "arcane" => Some(Self::Arcane),
            "divine" => Some(Self::Divine),
            "martial" => Some(Self::Martial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassType {
    #[default]
    Basic,
    Advanced,
    Epic,
}

/// Flaw award: a flat amount, or one amount per selectable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Award {
    Flat(i32),
    Options(IndexMap<String, i32>),
}

/// One feature definition. Type-specific fields are only meaningful for the
/// types noted on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureDef {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FeatureType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requirement>,
    /// Reported as an issue instead of blocking the purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_requires: Option<Requirement>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranks: Option<Limit>,
    #[serde(default, rename = "option", skip_serializing_if = "Option::is_none")]
    pub option_def: Option<OptionDef>,
    /// A feature that this one replaces on the sheet once taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grants: Option<Grantable>,
    #[serde(
        default,
        alias = "level_grants",
        deserialize_with = "int_keys::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub rank_grants: Option<BTreeMap<i32, Grantable>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grant_if: Vec<GrantIf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discounts: Option<IndexMap<String, Discount>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<IndexMap<String, ChoiceDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_purchase: Option<ChildPurchase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub def_path: Option<String>,

    /// class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sphere: Option<Sphere>,
    /// class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_type: Option<ClassType>,
    /// class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_features: Option<Grantable>,
    /// class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiclass_features: Option<Grantable>,

    /// skill, perk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostDef>,
    /// skill
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<i32>,
    /// skill, perk
    #[serde(
        default,
        deserialize_with = "int_keys::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub rank_labels: Option<BTreeMap<i32, String>>,
    /// perk
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub creation_only: bool,

    /// flaw
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub award: Option<Award>,
    /// flaw: award adjustments while the named feature is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub award_mods: Option<IndexMap<String, i32>>,

    /// martial, spell, power, utility, cantrip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<i32>,
}

impl FeatureDef {
    #[must_use]
    pub const fn max_ranks(&self) -> i32 {
        match self.ranks {
            Some(Limit::Count(n)) => n,
            Some(Limit::Unlimited) => UNLIMITED_RANKS,
            None if matches!(self.kind, FeatureType::Class) => 10,
            None => 1,
        }
    }

    #[must_use]
    pub fn ranks_label(&self) -> String {
        self.ranks.map_or_else(|| self.max_ranks().to_string(), |r| r.to_string())
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().or(match self.kind {
            FeatureType::Skill => Some("General Skills"),
            FeatureType::Flaw => Some("General Flaws"),
            FeatureType::Perk => Some("General Perks"),
            _ => None,
        })
    }

    /// Option definition, including the implied one of a flaw whose award
    /// is keyed by option.
    #[must_use]
    pub fn option(&self) -> Option<OptionDef> {
        if let Some(def) = &self.option_def {
            return Some(def.clone());
        }
        match (&self.kind, &self.award) {
            (FeatureType::Flaw, Some(Award::Options(map))) => {
                Some(OptionDef { values: Some(map.keys().cloned().collect()), ..OptionDef::default() })
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn sphere(&self) -> Sphere {
        self.sphere.unwrap_or_default()
    }

    #[must_use]
    pub fn class_type(&self) -> ClassType {
        self.class_type.unwrap_or_default()
    }

    /// Currency spent on ranks; `None` for features that aren't bought with points.
    #[must_use]
    pub const fn currency(&self) -> Option<&'static str> {
        match self.kind {
            FeatureType::Skill | FeatureType::Perk => Some("cp"),
            _ => None,
        }
    }

    /// Type-specific shape checks that serde can't express.
    pub(crate) fn check_shape(&self) -> Result<(), String> {
        match self.kind {
            FeatureType::Skill | FeatureType::Perk if self.cost.is_none() => {
                Err(format!("{} definitions require a cost", self.kind))
            }
            FeatureType::Spell | FeatureType::Cantrip if self.sphere == Some(Sphere::Martial) => {
                Err(format!("{} sphere must be arcane or divine", self.kind))
            }
            _ => Ok(()),
        }
    }
}

/// `"basic-skill"` becomes `"Basic Skill"`.
#[must_use]
pub fn title_case(id: &str) -> String {
    id.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(yaml: &str) -> FeatureDef {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn class_defaults() {
        let fighter = def("{id: fighter, name: Fighter, type: class}");
        assert_eq!(fighter.max_ranks(), 10);
        assert_eq!(fighter.sphere(), Sphere::Martial);
        assert_eq!(fighter.class_type(), ClassType::Basic);
        assert_eq!(fighter.currency(), None);
    }

    #[test]
    fn skill_fields() {
        let lore = def(
            "{id: lore, name: Lore, type: skill, ranks: unlimited, cost: {ranks: {1: 1, 5: 3}}, option: {freeform: true}, level_grants: {2: [lp]}}",
        );
        assert_eq!(lore.max_ranks(), UNLIMITED_RANKS);
        assert_eq!(lore.ranks_label(), "unlimited");
        assert_eq!(lore.category(), Some("General Skills"));
        assert_eq!(lore.currency(), Some("cp"));
        let Some(CostDef::ByRank(cost)) = &lore.cost else { panic!("expected cost by rank") };
        assert_eq!(cost.rank_costs(6), vec![1, 1, 1, 1, 3, 3]);
        assert!(lore.rank_grants.as_ref().is_some_and(|g| g.contains_key(&2)));
        assert!(lore.check_shape().is_ok());
    }

    #[test]
    fn skills_need_a_cost() {
        let bad = def("{id: x, name: X, type: skill}");
        assert_eq!(bad.check_shape().unwrap_err(), "skill definitions require a cost");
    }

    #[test]
    fn unknown_fields_and_types_are_rejected() {
        assert!(serde_yaml::from_str::<FeatureDef>("{id: x, name: X, type: skill, cots: 1}").is_err());
        assert!(serde_yaml::from_str::<FeatureDef>("{id: x, name: X, type: breed}").is_err());
    }

    #[test]
    fn flaw_award_map_implies_options() {
        let flaw = def("{id: phobia, name: Phobia, type: flaw, award: {Spiders: 1, Heights: 2, $phobias: 1}}");
        let option = flaw.option().unwrap();
        assert!(!option.freeform);
        assert_eq!(option.values.unwrap().len(), 3);
        assert_eq!(flaw.category(), Some("General Flaws"));
    }

    #[test]
    fn grantable_forms() {
        let g: Grantable = serde_yaml::from_str("[lp:2, {lore+Undead: 1}, {id: spikes, value: {1: 1, 5: 2}, per_rank: true}]").unwrap();
        let Grantable::List(items) = &g else { panic!("expected a list") };
        assert!(matches!(items[0], Grantable::Expr(_)));
        assert!(matches!(items[1], Grantable::Map(_)));
        let Grantable::Def(def) = &items[2] else { panic!("expected a grant def") };
        assert_eq!(def.value.lookup(6), 2);
        assert_eq!(g.identifiers().into_iter().collect::<Vec<_>>(), vec!["lore", "lp", "spikes"]);
    }

    #[test]
    fn discounts_accept_bare_ints() {
        let d: IndexMap<String, Discount> = serde_yaml::from_str("{a: 1, b: {discount: 2, ranks: 1}}").unwrap();
        assert_eq!(d["a"], Discount { discount: 1, ranks: None });
        assert_eq!(d["b"], Discount { discount: 2, ranks: Some(1) });
    }

    #[test]
    fn matcher_rules() {
        let skill = def("{id: sneak, name: Sneak, type: skill, cost: 1, tags: [stealth, rogue], category: Rogue Skills}");
        let m = |yaml: &str| serde_yaml::from_str::<FeatureMatcher>(yaml).unwrap().matches(&skill);

        assert!(m("{type: skill}"));
        assert!(!m("{type: perk}"));
        assert!(m("{id: [sneak, dodge]}"));
        assert!(!m("{id: dodge}"));
        assert!(m("{tags: stealth}"));
        assert!(!m("{tags: [stealth, magic]}"));
        assert!(!m("{tags: -rogue}"));
        assert!(m("{tags: -magic}"));
        assert!(m("{category: Rogue Skills}"));
        assert!(!m("{category: Bard Skills}"));
    }

    #[test]
    fn titles() {
        assert_eq!(title_case("basic-skill"), "Basic Skill");
        assert_eq!(title_case("lore_master"), "Lore Master");
        assert_eq!(FeatureType::Subfeature.default_name(), "Subfeature");
    }
}
