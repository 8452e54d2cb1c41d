//! # Character controller
//!
//! A [`Character`] wraps a [`CharacterModel`] and the [`Ruleset`] it was
//! built with. Everything that is not stored in the model (feature values,
//! bonuses, costs, remaining choices) is derived by [`Character::reconcile`],
//! a bounded fixed-point over grant propagation.
//!
//! Reads go through [`FeatureController`], a borrowed view of one feature.
//! Mutations are methods on `Character`; [`Character::apply`] wraps them in a
//! snapshot so a rejected or dry-run mutation leaves the model untouched.

pub mod model;
pub mod mutation;

mod choice;
mod class;
mod feature;
mod flaw;
mod listing;
mod options;
mod propagation;

use std::collections::BTreeMap;
use std::sync::Arc;

use fxhash::FxHashMap;
use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::decision::Decision;
use crate::defs::{Discount, FeatureType, Sphere};
use crate::expr::{PropExpression, Properties};
use crate::requirement::Requirement;
use crate::ruleset::Ruleset;

pub use self::choice::{ChoiceController, ChoiceSummary};
pub use self::feature::{FeatureController, FeatureForm};
pub use self::listing::{FeatureEntry, FeatureGroup, Issue};
use self::model::{CharacterModel, Flag, merge_flags};
use self::mutation::{ChoiceMutation, Mutation, NoteMutation, PlotMutation, RankMutation};

/// Source id of grants listed in the character metadata.
pub const PLOT_SOURCE: &str = "__plot__";

const NO_RESPEND: &str = "Respend not currently available.";

/// What one source contributes to one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Propagation {
    pub grants: i32,
    pub discounts: Vec<Discount>,
}

impl Propagation {
    fn is_empty(&self) -> bool {
        self.grants == 0 && self.discounts.is_empty()
    }
}

/// Target full id to source full id to contribution.
type Incoming = FxHashMap<String, BTreeMap<String, Propagation>>;

#[derive(Debug, Clone)]
pub struct Character {
    ruleset: Arc<Ruleset>,
    model: CharacterModel,
    snapshot: CharacterModel,
    flags: IndexMap<String, Flag>,
    incoming: Incoming,
    mutated: bool,
}

impl Character {
    pub(crate) fn new(ruleset: Arc<Ruleset>, model: CharacterModel) -> Self {
        let mut character = Self {
            ruleset,
            snapshot: model.clone(),
            model,
            flags: IndexMap::new(),
            incoming: Incoming::default(),
            mutated: false,
        };
        character.reconcile();
        character
    }

    #[must_use]
    pub fn ruleset(&self) -> &Arc<Ruleset> {
        &self.ruleset
    }

    #[must_use]
    pub const fn model(&self) -> &CharacterModel {
        &self.model
    }

    /// Whether the model changed since it was loaded.
    #[must_use]
    pub const fn mutated(&self) -> bool {
        self.mutated
    }

    /// Pruned copy of the model, ready to store.
    #[must_use]
    pub fn dump(&self) -> CharacterModel {
        let mut model = self.model.clone();
        model.prune();
        model
    }

    #[must_use]
    pub fn into_model(mut self) -> CharacterModel {
        self.model.prune();
        self.model
    }

    /// Ruleset default flags overlaid with the character's own.
    #[must_use]
    pub const fn flags(&self) -> &IndexMap<String, Flag> {
        &self.flags
    }

    #[must_use]
    pub const fn can_respend(&self) -> bool {
        self.model.respend
    }

    // ---- lookups ----

    /// Controller for a feature id, with or without an option (`lore+Undead`).
    #[must_use]
    pub fn feature(&self, id: &str) -> Option<FeatureController<'_>> {
        let expr = PropExpression::parse(id).ok()?;
        self.feature_expr(&expr)
    }

    #[must_use]
    pub fn feature_expr(&self, expr: &PropExpression) -> Option<FeatureController<'_>> {
        let def = self.ruleset.feature(&expr.prop)?;
        Some(FeatureController::new(self, def, expr.option.as_deref()))
    }

    /// Ids of features on the sheet: stored in the model or granted.
    pub(crate) fn sheet_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.model.features.keys().cloned().collect();
        let mut granted: Vec<&String> = self
            .incoming
            .keys()
            .filter(|id| !self.model.features.contains_key(*id) && self.is_feature_instance(id))
            .collect();
        granted.sort();
        ids.extend(granted.into_iter().cloned());
        ids
    }

    fn is_feature_instance(&self, id: &str) -> bool {
        PropExpression::parse(id).is_ok_and(|e| {
            e.attribute.is_none() && e.slot.is_none() && self.ruleset.features.contains_key(&e.prop)
        })
    }

    fn sheet_contains(&self, full_id: &str) -> bool {
        self.model.features.contains_key(full_id)
            || self.incoming.get(full_id).is_some_and(|sources| !sources.is_empty())
    }

    /// Feature controllers for everything on the sheet.
    #[must_use]
    pub fn features(&self) -> Vec<FeatureController<'_>> {
        self.sheet_ids().iter().filter_map(|id| self.feature(id)).collect()
    }

    /// Instances of an option feature with a positive value.
    pub(crate) fn option_instances(&self, id: &str) -> Vec<FeatureController<'_>> {
        self.features()
            .into_iter()
            .filter(|fc| fc.id() == id && fc.option().is_some() && fc.value() > 0)
            .collect()
    }

    /// Option to value for the taken instances of `id`.
    #[must_use]
    pub fn taken_options(&self, id: &str) -> IndexMap<String, i32> {
        self.option_instances(id)
            .into_iter()
            .filter_map(|fc| Some((fc.option()?.to_owned(), fc.value())))
            .collect()
    }

    /// Classes with levels, highest first.
    #[must_use]
    pub fn classes(&self) -> Vec<FeatureController<'_>> {
        let mut classes: Vec<_> = self
            .features()
            .into_iter()
            .filter(|fc| fc.kind() == FeatureType::Class && fc.value() > 0)
            .collect();
        classes.sort_by_key(|c| std::cmp::Reverse(c.value()));
        classes
    }

    #[must_use]
    pub fn starting_class(&self) -> Option<FeatureController<'_>> {
        self.classes().into_iter().find(FeatureController::is_starting)
    }

    #[must_use]
    pub fn archetype_class(&self) -> Option<FeatureController<'_>> {
        self.classes().into_iter().find(FeatureController::is_archetype)
    }

    #[must_use]
    pub fn is_multiclass(&self) -> bool {
        self.classes().len() > 1
    }

    pub(crate) fn bonus(&self, full_id: &str) -> i32 {
        self.incoming.get(full_id).map_or(0, |sources| sources.values().map(|p| p.grants).sum())
    }

    pub(crate) fn incoming_discounts(&self, full_id: &str) -> Vec<Discount> {
        self.incoming
            .get(full_id)
            .map(|sources| sources.values().flat_map(|p| p.discounts.iter().copied()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn sources(&self, full_id: &str) -> impl Iterator<Item = (&str, &Propagation)> {
        self.incoming.get(full_id).into_iter().flatten().map(|(source, data)| (source.as_str(), data))
    }

    // ---- attributes ----

    #[must_use]
    pub fn xp(&self) -> i32 {
        self.model.metadata.awards.get("xp").copied().unwrap_or_default()
    }

    /// Level the character's XP entitles it to.
    #[must_use]
    pub fn xp_level(&self) -> i32 {
        self.ruleset.xp_table.evaluate(self.xp())
    }

    /// Sum of class levels taken.
    #[must_use]
    pub fn level(&self) -> i32 {
        self.class_sum(|_| true) + self.bonus("level")
    }

    #[must_use]
    pub fn levels_available(&self) -> i32 {
        self.xp_level() - self.level()
    }

    #[must_use]
    pub fn base_cp(&self) -> i32 {
        self.ruleset.cp_baseline + self.ruleset.cp_per_level * self.xp_level()
    }

    #[must_use]
    pub fn awarded_cp(&self) -> i32 {
        self.model.metadata.awards.get("cp").copied().unwrap_or_default()
    }

    /// Unspent character points.
    #[must_use]
    pub fn cp(&self) -> i32 {
        let features = self.features();
        let spent: i32 = features
            .iter()
            .filter(|fc| fc.definition().currency() == Some("cp"))
            .map(FeatureController::cost)
            .sum();
        let (mut player, mut plot, mut overcome) = (0, 0, 0);
        for flaw in features.iter().filter(|fc| fc.kind() == FeatureType::Flaw) {
            if flaw.model().plot_added {
                plot += flaw.award_cp();
            } else {
                player += flaw.award_cp();
            }
            overcome += flaw.overcome_cp();
        }
        let flaw_award = player.min(self.ruleset.flaw_cp_cap) + plot;
        self.awarded_cp() + self.base_cp() + self.bonus("cp") + flaw_award - spent - overcome
    }

    /// Flaw CP the player may still earn before the cap.
    #[must_use]
    pub fn flaw_cp_available(&self) -> i32 {
        let cap = self.ruleset.flaw_cp_cap;
        cap - self.flaw_award_total().min(cap)
    }

    #[must_use]
    pub fn lp(&self) -> i32 {
        self.ruleset.lp.evaluate(self.xp_level()) + self.bonus("lp")
    }

    #[must_use]
    pub fn spikes(&self) -> i32 {
        self.ruleset.spikes.evaluate(self.xp_level()) + self.bonus("spikes")
    }

    #[must_use]
    pub fn basic_classes(&self) -> i32 {
        self.classes().iter().filter(|c| c.definition().class_type() == crate::defs::ClassType::Basic).count() as i32
    }

    fn class_sum(&self, filter: impl Fn(&FeatureController<'_>) -> bool) -> i32 {
        self.classes().iter().filter(|c| filter(c)).map(FeatureController::value).sum()
    }

    fn class_max(&self, filter: impl Fn(&FeatureController<'_>) -> bool) -> i32 {
        self.classes().iter().filter(|c| filter(c)).map(FeatureController::value).max().unwrap_or(0)
    }

    /// Value of any property: feature, attribute or scoped class attribute,
    /// plus whatever is granted to that exact expression.
    #[must_use]
    pub fn get(&self, expr: &PropExpression) -> i32 {
        self.value_of(expr, expr.single.is_some())
    }

    /// [`get`](Self::get) for an expression string; unparseable input is 0.
    #[must_use]
    pub fn get_str(&self, expr: &str) -> i32 {
        PropExpression::parse(expr).map_or(0, |e| self.get(&e))
    }

    fn value_of(&self, expr: &PropExpression, single: bool) -> i32 {
        if expr.attribute.is_some() {
            return self.scoped_value(expr) + self.bonus(&expr.full_id());
        }
        if let Some(fc) = self.feature_expr(expr) {
            return if single { fc.max_value() } else { fc.value() };
        }
        let bonus = self.bonus(&expr.full_id());
        let Some(attribute) = self.ruleset.attribute(&expr.prop) else {
            return bonus;
        };
        let sphere = Sphere::from_key(&attribute.id);
        match attribute.id.as_str() {
            "xp" => self.xp() + bonus,
            "xp_level" => self.xp_level() + bonus,
            "level" if single => self.class_max(|_| true),
            "level" => self.level(),
            "lp" => self.lp(),
            "cp" => self.cp(),
            "spikes" => self.spikes(),
            "caster" if single => self.class_max(|c| c.definition().sphere() != Sphere::Martial),
            "caster" => self.class_sum(|c| c.definition().sphere() != Sphere::Martial) + bonus,
            "basic-classes" => self.basic_classes() + bonus,
            _ if sphere.is_some() && single => self.class_max(|c| Some(c.definition().sphere()) == sphere),
            _ if sphere.is_some() => self.class_sum(|c| Some(c.definition().sphere()) == sphere) + bonus,
            _ if attribute.scoped => self.scoped_value(expr) + bonus,
            _ => attribute.default_value + bonus,
        }
    }

    /// `wizard.spell_slots@1`, `arcane.cantrips`, or a bare scoped attribute
    /// summed over every class.
    fn scoped_value(&self, expr: &PropExpression) -> i32 {
        let (scope, attribute) = match &expr.attribute {
            Some(attribute) => (Some(expr.prop.as_str()), attribute.as_str()),
            None => (None, expr.prop.as_str()),
        };
        let slot = expr.slot.as_deref().and_then(|s| s.parse::<i32>().ok());
        let classes = self.classes();
        match scope {
            None => classes.iter().map(|c| c.class_attribute(attribute, slot)).sum(),
            Some(scope) => match Sphere::from_key(scope) {
                Some(sphere) => classes
                    .iter()
                    .filter(|c| c.definition().sphere() == sphere)
                    .map(|c| c.class_attribute(attribute, slot))
                    .sum(),
                None => self.feature(scope).map_or(0, |fc| fc.class_attribute(attribute, slot)),
            },
        }
    }

    // ---- names ----

    #[must_use]
    pub fn display_name(&self, id: &str) -> String {
        match self.feature(id) {
            Some(fc) => fc.display_name(),
            None => self.ruleset.display_name(id),
        }
    }

    /// `lore (Undead) spell_slots [1]` style description of an expression.
    #[must_use]
    pub fn describe_expr(&self, expr: &PropExpression) -> String {
        let mut name = self.ruleset.display_name(&expr.prop);
        if let Some(option) = &expr.option {
            name.push_str(&format!(" ({option})"));
        }
        if let Some(attribute) = &expr.attribute {
            name.push_str(&format!(" {attribute}"));
        }
        if let Some(slot) = &expr.slot {
            name.push_str(&format!(" [{slot}]"));
        }
        name
    }

    #[must_use]
    pub fn describe_mutation(&self, mutation: &Mutation) -> String {
        match mutation {
            Mutation::Rank(m) => {
                let mut name = self.ruleset.display_name(&m.id);
                if let Some(option) = &m.option {
                    name.push_str(&format!(" [{option}]"));
                }
                name.push_str(&format!(" x{}", m.ranks.abs()));
                match m.ranks {
                    0 => format!("Unrecognized rank mutation on {name}"),
                    r if r > 0 => format!("Purchase {name}"),
                    _ => format!("Remove {name}"),
                }
            }
            Mutation::Choice(m) => {
                let Some(feature) = self.feature(&m.id) else {
                    return "Choice selection on feature with no choices.".into();
                };
                let choice_name = feature
                    .choices()
                    .get(&m.choice)
                    .map_or_else(|| crate::defs::title_case(&m.choice), ChoiceController::name);
                let selection = self.display_name(&m.value);
                let verb = if m.remove { "Unchose" } else { "Chose" };
                format!("{verb} '{selection}' for choice {choice_name} of {}", feature.display_name())
            }
            Mutation::Note(m) => format!("Edit notes for {}", self.display_name(&m.id)),
            Mutation::Plot(m) => format!("Plot adjustment for {}", self.display_name(&m.id)),
        }
    }

    // ---- checks ----

    /// Evaluates `requirement`, prefixing failures with a header naming the feature.
    #[must_use]
    pub fn meets_requirements(&self, requirement: &Requirement, feature_id: Option<&str>) -> Decision {
        let rd = requirement.evaluate(self);
        if rd.is_ok() {
            return Decision::OK;
        }
        let header = match feature_id {
            Some(id) => format!("Not all requirements are met for {}.", self.display_name(id)),
            None => "Not all requirements are met.".to_owned(),
        };
        Decision::fail(format!("{header}\n{}", rd.reason_str()))
    }

    /// Hard validity: every paid feature still meets its requirements.
    pub fn validate(&mut self) -> Decision {
        self.reconcile();
        self.features().iter().map(FeatureController::validate).find(|rd| !rd.is_ok()).unwrap_or(Decision::OK)
    }

    /// Soft problems to fix before the character is finalized.
    #[must_use]
    pub fn issues(&self) -> Vec<Issue> {
        let mut issues: Vec<Issue> = self.features().iter().flat_map(FeatureController::issues).collect();
        issues.extend(self.plot_issues());
        issues
    }

    /// [`validate`](Self::validate) plus no outstanding issues.
    pub fn fully_valid(&mut self) -> Decision {
        let rd = self.validate();
        if !rd.is_ok() {
            return rd;
        }
        let issues = self.issues();
        match issues.as_slice() {
            [] => Decision::OK,
            [issue] => Decision::fail(issue.reason.clone()),
            [first, ..] => Decision::fail(format!("{} issues detected, including: {}", issues.len(), first.reason)),
        }
    }

    // ---- mutations ----

    /// Applies a mutation transactionally.
    ///
    /// A successful mutation is validated; a failed validation replaces the
    /// result. Failures and dry runs restore the model as it was before.
    #[instrument(skip(self), fields(character = %self.model.id))]
    pub fn apply(&mut self, mutation: &Mutation, dry_run: bool) -> Decision {
        let mut rd = match mutation {
            Mutation::Rank(m) => self.purchase(m),
            Mutation::Choice(m) => self.choose(m),
            Mutation::Note(m) => self.note(m),
            Mutation::Plot(m) => self.plot(m),
        };
        if rd.is_ok() {
            let validated = self.validate();
            if !validated.is_ok() {
                rd = validated;
            }
        }
        if dry_run || !rd.is_ok() {
            self.restore();
        } else {
            self.model.prune();
            self.snapshot = self.model.clone();
            self.mutated = true;
        }
        debug!(success = rd.success, dry_run, reason = rd.reason_str(), "mutation applied");
        rd
    }

    fn restore(&mut self) {
        self.model = self.snapshot.clone();
        self.reconcile();
    }

    /// Keeps the current model as the restore point.
    fn commit(&mut self) {
        self.model.prune();
        self.snapshot = self.model.clone();
        self.mutated = true;
        self.reconcile();
    }

    #[must_use]
    pub fn can_purchase(&self, entry: &RankMutation) -> Decision {
        let expr = entry.expression();
        match self.feature_expr(&expr) {
            Some(fc) if entry.ranks > 0 => fc.can_increase(entry.ranks),
            Some(fc) if entry.ranks < 0 => fc.can_decrease(-entry.ranks),
            _ => Decision::fail(format!("Purchase not implemented: {expr}")),
        }
    }

    pub fn purchase(&mut self, entry: &RankMutation) -> Decision {
        let expr = entry.expression();
        let Some(fc) = self.feature_expr(&expr).filter(|_| entry.ranks != 0) else {
            return Decision::fail(format!("Purchase not implemented: {expr}"));
        };
        let (kind, full_id) = (fc.kind(), fc.full_id().to_owned());
        match (kind, entry.ranks > 0) {
            (FeatureType::Class, true) => self.increase_class(&full_id, entry.ranks),
            (FeatureType::Class, false) => self.decrease_class(&full_id, -entry.ranks),
            (FeatureType::Flaw, true) => self.increase_flaw(&full_id, entry.ranks),
            (FeatureType::Flaw, false) => self.decrease_flaw(&full_id, -entry.ranks),
            (_, true) => self.increase_feature(&full_id, entry.ranks),
            (_, false) => self.decrease_feature(&full_id, -entry.ranks),
        }
    }

    pub fn choose(&mut self, entry: &ChoiceMutation) -> Decision {
        let feature_id = PropExpression::parse(&entry.id).map_or_else(|_| entry.id.clone(), |e| e.feature_id());
        self.choose_on(&feature_id, &entry.choice, &entry.value, entry.remove)
    }

    fn note(&mut self, entry: &NoteMutation) -> Decision {
        let Some(fc) = self.feature(&entry.id) else {
            return Decision::fail(format!("Unknown feature {}", entry.id));
        };
        let full_id = fc.full_id().to_owned();
        self.model.features.entry(full_id).or_default().notes = entry.notes.clone().filter(|n| !n.is_empty());
        Decision::mutated("Notes updated.")
    }

    fn plot(&mut self, entry: &PlotMutation) -> Decision {
        let Some(fc) = self.feature(&entry.id) else {
            return Decision::fail(format!("Unknown feature {}", entry.id));
        };
        let (full_id, max_ranks) = (fc.full_id().to_owned(), fc.max_ranks());
        let model = self.model.features.entry(full_id).or_default();
        if let Some(added) = entry.added {
            model.plot_added = added;
            if added && model.ranks == 0 {
                model.ranks = 1.min(max_ranks);
            }
        }
        if let Some(free) = entry.free {
            model.plot_free = free;
        }
        if let Some(suppressed) = entry.suppressed {
            model.plot_suppressed = suppressed;
        }
        if let Some(disable) = entry.disable_overcome {
            model.plot_disable_overcome = disable;
        }
        if entry.notes.is_some() {
            model.plot_notes = entry.notes.clone().filter(|n| !n.is_empty());
        }
        self.reconcile();
        Decision::mutated("Plot adjustment applied.")
    }

    /// Sets purchased ranks, capped at the feature's maximum, and drops the
    /// entry once it holds nothing.
    pub(crate) fn set_purchased(&mut self, full_id: &str, ranks: i32, max_ranks: i32) {
        let entry = self.model.features.entry(full_id.to_owned()).or_default();
        entry.ranks = ranks.min(max_ranks);
        if !entry.should_keep() {
            self.model.features.shift_remove(full_id);
        }
    }

    // ---- attribute setters ----

    /// Writes the XP needed for `level` into the award metadata.
    pub fn set_xp_level(&mut self, level: i32) {
        let xp = self.ruleset.xp_table.reverse_lookup(level);
        self.model.metadata.awards.insert("xp".into(), xp);
        self.commit();
    }

    pub fn set_awarded_cp(&mut self, cp: i32) {
        self.model.metadata.awards.insert("cp".into(), cp);
        self.commit();
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.model.name = name.filter(|n| !n.trim().is_empty());
        self.commit();
    }

    /// Opens or closes free respend.
    pub fn set_respend(&mut self, respend: bool) {
        self.model.respend = respend;
        self.commit();
    }
}

impl Properties for Character {
    fn has_prop(&self, expr: &PropExpression) -> bool {
        self.ruleset.attribute(&expr.prop).is_some()
            || (expr.attribute.is_none() && self.sheet_contains(&expr.feature_id()))
            || self.value_of(&expr.base(), false) > 0
    }

    fn get_prop(&self, expr: &PropExpression) -> i32 {
        self.value_of(&expr.base(), false)
    }

    fn max_prop(&self, expr: &PropExpression) -> i32 {
        self.value_of(&expr.base(), true)
    }
}

#[cfg(test)]
mod tests;
