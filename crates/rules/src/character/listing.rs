//! Sheet listings: issues, taken and available features, type groups.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Character;
use super::feature::FeatureController;
use crate::defs::FeatureType;
use crate::expr::PropExpression;

/// A problem that should be fixed before the character is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub issue_code: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<String>,
}

impl Issue {
    pub(super) fn new(code: &str, reason: impl Into<String>, feature_id: Option<&str>) -> Self {
        Self {
            issue_code: code.to_owned(),
            reason: reason.into(),
            feature_id: feature_id.map(str::to_owned),
            choice: None,
        }
    }

    pub(super) fn with_choice(mut self, choice: &str) -> Self {
        self.choice = Some(choice.to_owned());
        self
    }
}

/// Compact feature row for sheet lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FeatureType,
    pub value: i32,
    pub max_ranks: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub option_template: bool,
}

impl From<&FeatureController<'_>> for FeatureEntry {
    fn from(fc: &FeatureController<'_>) -> Self {
        Self {
            id: fc.full_id().to_owned(),
            name: fc.display_name(),
            kind: fc.kind(),
            value: fc.value(),
            max_ranks: fc.max_ranks(),
            cost: fc.purchase_cost_string(1),
            category: fc.definition().category().map(str::to_owned),
            option_template: fc.is_template(),
        }
    }
}

/// Features of one type, split into taken and purchasable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureGroup {
    #[serde(rename = "type")]
    pub kind: FeatureType,
    pub name: String,
    pub taken: Vec<FeatureEntry>,
    pub available: Vec<FeatureEntry>,
    pub available_categories: IndexMap<String, Vec<FeatureEntry>>,
}

impl FeatureGroup {
    fn add_available(&mut self, entry: FeatureEntry) {
        match entry.category.clone() {
            Some(category) => self.available_categories.entry(category).or_default().push(entry),
            None => self.available.push(entry),
        }
    }

    fn sort(&mut self) {
        self.taken.sort_by(|a, b| a.name.cmp(&b.name));
        self.available.sort_by(|a, b| a.name.cmp(&b.name));
        self.available_categories.sort_keys();
        for entries in self.available_categories.values_mut() {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }
}

impl Character {
    /// Features of `kind` (or every type).
    ///
    /// With `taken`, lists what's on the sheet; `available` then keeps only
    /// what can still be increased. Without `taken`, walks the ruleset for
    /// purchasable features; an option template that can't be bought as a
    /// whole still offers its individually purchasable options.
    #[must_use]
    pub fn list_features(&self, kind: Option<FeatureType>, taken: bool, available: bool) -> Vec<FeatureController<'_>> {
        let of_kind = |fc: &FeatureController<'_>| kind.is_none_or(|k| fc.kind() == k);
        if taken {
            return self
                .features()
                .into_iter()
                .filter(|fc| fc.value() > 0 || fc.unused_bonus() > 0)
                .filter(of_kind)
                .filter(|fc| !available || fc.can_increase(1).is_ok())
                .filter(|fc| !fc.is_superseded() || fc.has_available_choices())
                .filter(FeatureController::should_show_in_list)
                .collect();
        }

        let mut listed = Vec::new();
        for def in self.ruleset.features.values() {
            let Some(fc) = self.feature(&def.id) else { continue };
            if self.model.features.contains_key(&def.id) && fc.should_show_in_list() {
                continue;
            }
            if !of_kind(&fc) {
                continue;
            }
            if available {
                let rd = fc.can_increase(1);
                if !rd.is_ok() && fc.is_template() {
                    for option in fc.available_options().unwrap_or_default() {
                        if let Some(instance) = self.feature_expr(&PropExpression::with_option(fc.id(), Some(&option)))
                            && instance.can_increase(1).is_ok()
                        {
                            listed.push(instance);
                        }
                    }
                    continue;
                }
                if !rd.is_ok() && !rd.needs_option {
                    continue;
                }
            }
            listed.push(fc);
        }
        listed
    }

    /// Top-level features grouped by type, as shown on the sheet.
    #[must_use]
    pub fn feature_groups(&self) -> Vec<FeatureGroup> {
        let features =
            self.list_features(None, true, false).into_iter().chain(self.list_features(None, false, true));
        let mut groups: IndexMap<FeatureType, FeatureGroup> = IndexMap::new();
        for fc in features {
            if fc.parent().is_some() {
                continue;
            }
            let group = groups.entry(fc.kind()).or_insert_with(|| FeatureGroup {
                kind: fc.kind(),
                name: self.ruleset.feature_type_name(fc.kind()),
                taken: Vec::new(),
                available: Vec::new(),
                available_categories: IndexMap::new(),
            });
            let entry = FeatureEntry::from(&fc);
            if fc.is_template() {
                if fc.can_take_new_option() {
                    group.add_available(entry);
                }
            } else if fc.value() > 0 {
                group.taken.push(entry);
            } else {
                group.add_available(entry);
            }
        }
        let mut groups: Vec<FeatureGroup> = groups.into_values().collect();
        for group in &mut groups {
            group.sort();
        }
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups
    }
}
