use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Character;
use super::feature::FeatureController;
use super::listing::Issue;
use crate::decision::Decision;
use crate::defs::{ChoiceDef, Discount, Limit, Multiple, title_case};
use crate::expr::PropExpression;

/// Choice id of the router that assigns a template's granted ranks to one
/// of its options.
pub(crate) const OPTION_BONUS: &str = "__option__";

const UNLIMITED_CHOICES: i32 = 999;

#[derive(Debug, Clone, Copy)]
enum Kind<'a> {
    Grant(&'a ChoiceDef),
    OptionBonus,
}

/// One choice offered by a feature: "pick a skill", "pick a lore for the bonus".
#[derive(Debug, Clone)]
pub struct ChoiceController<'a> {
    feature: FeatureController<'a>,
    id: String,
    kind: Kind<'a>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub limit: Limit,
    pub remaining: i32,
    pub taken: IndexMap<String, String>,
    pub available: IndexMap<String, String>,
}

/// Canonical full id of a selection; unparseable text is kept as typed.
fn normalize(selection: &str) -> String {
    PropExpression::parse(selection).map_or_else(|_| selection.to_owned(), |e| e.full_id())
}

impl<'a> ChoiceController<'a> {
    pub(super) fn grant(feature: FeatureController<'a>, id: &str, def: &'a ChoiceDef) -> Self {
        Self { feature, id: id.to_owned(), kind: Kind::Grant(def) }
    }

    pub(super) fn option_bonus(feature: FeatureController<'a>) -> Self {
        Self { feature, id: OPTION_BONUS.to_owned(), kind: Kind::OptionBonus }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> String {
        match self.kind {
            Kind::Grant(def) => def.name.clone().unwrap_or_else(|| title_case(&self.id)),
            Kind::OptionBonus => format!("Bonus {}", self.feature.display_name()),
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<String> {
        match self.kind {
            Kind::Grant(def) => {
                let rd = self.meets_req();
                if rd.is_ok() {
                    return def.description.clone();
                }
                Some(rd.reason.unwrap_or_else(|| "You do not meet the requirements to receive this benefit.".into()))
            }
            Kind::OptionBonus => Some(format!(
                "You have received a bonus rank of {}. Choose an existing option to apply it to.",
                self.feature.display_name()
            )),
        }
    }

    #[must_use]
    pub fn limit(&self) -> Limit {
        match self.kind {
            Kind::Grant(_) if !self.meets_req().is_ok() => Limit::Count(0),
            Kind::Grant(def) => match def.limit {
                Limit::Count(n) if def.limit_is_per_rank => Limit::Count(n * self.feature.value()),
                limit => limit,
            },
            Kind::OptionBonus => Limit::Count(self.feature.bonus()),
        }
    }

    fn multi(&self) -> bool {
        match self.kind {
            Kind::Grant(def) => def.multi,
            Kind::OptionBonus => match self.feature.option_def().map(|o| o.multiple) {
                Some(Multiple::Allowed(allowed)) => allowed,
                Some(Multiple::Limit(limit)) => limit != 0,
                None => false,
            },
        }
    }

    fn meets_req(&self) -> Decision {
        match self.kind {
            Kind::Grant(ChoiceDef { requires: Some(req), .. }) => {
                self.feature.character().meets_requirements(req, None)
            }
            _ => Decision::OK,
        }
    }

    fn check_req(&self, selection: &str) -> Decision {
        let Kind::Grant(def) = self.kind else {
            return Decision::OK;
        };
        match def.choice_requires.as_ref().and_then(|r| r.get(selection)) {
            Some(req) => self.feature.character().meets_requirements(req, None),
            None => Decision::OK,
        }
    }

    #[must_use]
    pub fn choices_remaining(&self) -> i32 {
        if !self.meets_req().is_ok() {
            return 0;
        }
        match self.limit() {
            Limit::Unlimited => UNLIMITED_CHOICES,
            Limit::Count(n) => n - self.choice_ranks().values().sum::<i32>(),
        }
    }

    fn recorded(&self) -> Vec<String> {
        self.feature.model().choices.get(&self.id).cloned().unwrap_or_default()
    }

    /// Full id of each selection to the ranks it carries.
    #[must_use]
    pub fn choice_ranks(&self) -> IndexMap<String, i32> {
        let mut ranks = IndexMap::new();
        for entry in self.recorded() {
            match PropExpression::parse(&entry) {
                Ok(expr) => ranks.insert(expr.full_id(), expr.value.filter(|v| *v != 0).unwrap_or(1)),
                Err(_) => ranks.insert(entry, 1),
            };
        }
        ranks
    }

    /// Selections with display names.
    #[must_use]
    pub fn taken_choices(&self) -> IndexMap<String, String> {
        if !self.meets_req().is_ok() {
            return IndexMap::new();
        }
        self.recorded()
            .iter()
            .map(|entry| (normalize(entry), self.describe_choice(entry)))
            .collect()
    }

    fn describe_choice(&self, entry: &str) -> String {
        let character = self.feature.character();
        let Ok(expr) = PropExpression::parse(entry) else {
            return entry.to_owned();
        };
        let mut name = character.ruleset().display_name(&expr.prop);
        if let Some(option) = &expr.option {
            name.push_str(&format!(" [{option}]"));
        }
        if let Some(value) = expr.value.filter(|v| *v > 1) {
            name.push_str(&format!(" x{value}"));
        }
        name
    }

    fn matches(&self, selection: &str) -> bool {
        let Ok(expr) = PropExpression::parse(selection) else {
            return false;
        };
        match self.kind {
            Kind::Grant(def) => self
                .feature
                .character()
                .ruleset()
                .feature(&expr.prop)
                .is_some_and(|feature| def.matcher.as_ref().is_none_or(|m| m.matches(feature))),
            Kind::OptionBonus => expr.prop == self.feature.id() && expr.option.is_some(),
        }
    }

    fn matching_features(&self) -> Vec<String> {
        if !self.meets_req().is_ok() {
            return Vec::new();
        }
        let character = self.feature.character();
        match self.kind {
            Kind::Grant(_) => character
                .ruleset()
                .features
                .keys()
                .filter(|id| self.matches(id) && self.check_req(id).is_ok())
                .cloned()
                .collect(),
            Kind::OptionBonus => {
                character.option_instances(self.feature.id()).iter().map(|fc| fc.full_id().to_owned()).collect()
            }
        }
    }

    /// Selections still open, with descriptions, sorted by description.
    #[must_use]
    pub fn available_choices(&self) -> IndexMap<String, String> {
        if self.choices_remaining() <= 0 {
            return IndexMap::new();
        }
        let character = self.feature.character();
        let taken = self.choice_ranks();
        let mut choices: Vec<(String, String)> = self
            .matching_features()
            .into_iter()
            .filter(|id| !taken.contains_key(id))
            .filter_map(|id| {
                let fc = character.feature(&id)?;
                let mut description = fc.display_name();
                if matches!(self.kind, Kind::Grant(_)) {
                    if fc.max_ranks() - fc.value() <= 0 {
                        description.push_str(" (Already at Max)");
                    } else if let Some(short) = fc.short_description() {
                        description.push_str(&format!(": {short}"));
                    }
                }
                Some((id, description))
            })
            .collect();
        choices.sort_by(|a, b| a.1.cmp(&b.1));
        choices.into_iter().collect()
    }

    #[must_use]
    pub fn can_choose(&self, selection: &str) -> Decision {
        if !self.matches(selection) {
            return Decision::fail(format!(
                "`{selection}` does not match choice definition for {}/{}",
                self.feature.full_id(),
                self.id
            ));
        }
        let ranks = self.choice_ranks();
        if !self.multi() && ranks.contains_key(selection) {
            return Decision::fail("Choice already taken.");
        }
        if let Limit::Count(limit) = self.limit()
            && ranks.values().sum::<i32>() >= limit
        {
            return Decision::fail(format!(
                "Choice {} of {} only accepts {limit} choices.",
                self.id,
                self.feature.full_id()
            ));
        }
        Decision::OK
    }

    #[must_use]
    pub fn can_unchoose(&self, selection: &str) -> Decision {
        if self.choice_ranks().contains_key(selection) { Decision::OK } else { Decision::fail("Choice not taken.") }
    }

    /// Recorded selections after adding one more of `selection`.
    fn with_choice(&self, selection: &str) -> Vec<String> {
        let mut entries = self.recorded();
        match self.choice_ranks().get(selection) {
            Some(&ranks) => {
                let bumped = Self::entry(selection, ranks + 1);
                match entries.iter().position(|e| normalize(e) == selection) {
                    Some(index) => entries[index] = bumped,
                    None => entries.push(bumped),
                }
            }
            None => entries.push(selection.to_owned()),
        }
        entries
    }

    /// Recorded selections after removing one of `selection`.
    fn without_choice(&self, selection: &str) -> Vec<String> {
        let mut entries = self.recorded();
        let ranks = self.choice_ranks().get(selection).copied().unwrap_or_default();
        if let Some(index) = entries.iter().position(|e| normalize(e) == selection) {
            if ranks <= 1 {
                entries.remove(index);
            } else {
                entries[index] = Self::entry(selection, ranks - 1);
            }
        }
        entries
    }

    fn entry(selection: &str, ranks: i32) -> String {
        match PropExpression::parse(selection) {
            Ok(expr) if ranks > 1 => PropExpression { value: Some(ranks), ..expr }.to_string(),
            _ => selection.to_owned(),
        }
    }

    #[must_use]
    pub fn issues(&self) -> Vec<Issue> {
        let feature = &self.feature;
        let character = feature.character();
        let mut issues = Vec::new();
        let remaining = self.choices_remaining();
        if remaining < 0 {
            issues.push(
                Issue::new(
                    "choice-over-limit",
                    format!("{} - {} has too many choices taken ({} over)", feature.display_name(), self.name(), -remaining),
                    Some(feature.full_id()),
                )
                .with_choice(&self.id),
            );
        }
        for selection in self.choice_ranks().keys() {
            let rd = self.check_req(selection);
            if !rd.is_ok() {
                issues.push(
                    Issue::new(
                        "choice-subrequirement-not-met",
                        format!(
                            "{} - {} choice requirement for {} not met: {}",
                            feature.display_name(),
                            self.name(),
                            character.display_name(selection),
                            rd.reason_str()
                        ),
                        Some(feature.full_id()),
                    )
                    .with_choice(&self.id),
                );
            }
            if !self.matches(selection) {
                issues.push(
                    Issue::new(
                        "choice-not-valid",
                        format!(
                            "{} - {} is no longer a valid selection for choice {}",
                            feature.display_name(),
                            character.display_name(selection),
                            self.name()
                        ),
                        Some(feature.full_id()),
                    )
                    .with_choice(&self.id),
                );
            }
        }
        issues
    }

    /// Adds what the selections grant (or discount) to the feature's output.
    pub(super) fn update_propagation(
        &self,
        grants: &mut IndexMap<String, i32>,
        discounts: &mut IndexMap<String, Vec<Discount>>,
    ) {
        if !self.meets_req().is_ok() {
            return;
        }
        if matches!(self.kind, Kind::OptionBonus) && !self.multi() {
            if let Some(first) = self.choice_ranks().into_keys().next() {
                grants.insert(first, self.feature.bonus());
            }
            return;
        }
        let discount = match self.kind {
            Kind::Grant(def) => def.discount,
            Kind::OptionBonus => None,
        };
        for (selection, ranks) in self.choice_ranks() {
            if !self.check_req(&selection).is_ok() {
                continue;
            }
            match discount {
                Some(discount) => discounts.entry(selection).or_default().push(discount),
                None => *grants.entry(selection).or_default() += ranks,
            }
        }
    }

    #[must_use]
    pub fn summary(&self) -> ChoiceSummary {
        ChoiceSummary {
            id: self.id.clone(),
            name: self.name(),
            description: self.description(),
            limit: self.limit(),
            remaining: self.choices_remaining(),
            taken: self.taken_choices(),
            available: self.available_choices(),
        }
    }
}

impl Character {
    /// Makes or removes a selection on one of a feature's choices.
    pub(super) fn choose_on(&mut self, feature_id: &str, choice: &str, value: &str, remove: bool) -> Decision {
        let Some(feature) = self.feature(feature_id) else {
            return Decision::fail(format!("Unknown feature {feature_id}"));
        };
        let Some(controller) = feature.choices().shift_remove(choice) else {
            return Decision::fail(format!("Unknown choice '{choice}'"));
        };
        let selection = normalize(value);
        let rd = if remove { controller.can_unchoose(&selection) } else { controller.can_choose(&selection) };
        if !rd.is_ok() {
            return rd;
        }
        let entries = if remove { controller.without_choice(&selection) } else { controller.with_choice(&selection) };
        let full_id = feature.full_id().to_owned();

        let model = self.model.features.entry(full_id.clone()).or_default();
        model.choices.insert(choice.to_owned(), entries);
        if !model.should_keep() {
            self.model.features.shift_remove(&full_id);
        }
        self.reconcile();
        Decision::mutated(if remove { "Choice removed." } else { "Choice applied." })
    }
}
