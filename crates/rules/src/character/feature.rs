use std::sync::LazyLock;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::choice::{ChoiceController, ChoiceSummary, OPTION_BONUS};
use super::listing::Issue;
use super::model::FeatureModel;
use super::{Character, NO_RESPEND, PLOT_SOURCE};
use crate::decision::Decision;
use crate::defs::{Award, CostDef, Discount, FeatureDef, FeatureType, Multiple, OptionDef};
use crate::expr::PropExpression;

static UNTOUCHED: LazyLock<FeatureModel> = LazyLock::new(FeatureModel::default);

/// Read view of one feature (or one option instance of it) on a character.
#[derive(Debug, Clone)]
pub struct FeatureController<'a> {
    character: &'a Character,
    def: &'a FeatureDef,
    expr: PropExpression,
    full_id: String,
}

/// Everything a feature page needs, in one serializable bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureForm {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FeatureType,
    pub value: i32,
    pub purchased: i32,
    pub max_ranks: i32,
    pub ranks_label: String,
    pub next_value: Option<i32>,
    pub min_value: i32,
    pub can_increase: Decision,
    pub can_decrease: Decision,
    pub cost: Option<String>,
    pub currency: Option<String>,
    pub currency_balance: Option<i32>,
    pub options: Option<Vec<String>>,
    pub taken_options: IndexMap<String, i32>,
    pub choices: Vec<ChoiceSummary>,
    pub explain: Vec<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
}

impl<'a> FeatureController<'a> {
    pub(super) fn new(character: &'a Character, def: &'a FeatureDef, option: Option<&str>) -> Self {
        let expr = PropExpression::with_option(def.id.clone(), option);
        let full_id = expr.to_string();
        Self { character, def, expr, full_id }
    }

    #[must_use]
    pub fn id(&self) -> &'a str {
        &self.def.id
    }

    #[must_use]
    pub fn full_id(&self) -> &str {
        &self.full_id
    }

    #[must_use]
    pub const fn expression(&self) -> &PropExpression {
        &self.expr
    }

    #[must_use]
    pub const fn definition(&self) -> &'a FeatureDef {
        self.def
    }

    #[must_use]
    pub const fn character(&self) -> &'a Character {
        self.character
    }

    #[must_use]
    pub const fn kind(&self) -> FeatureType {
        self.def.kind
    }

    #[must_use]
    pub fn option(&self) -> Option<&str> {
        self.expr.option.as_deref()
    }

    /// Stored state, or an untouched default for features not in the model.
    #[must_use]
    pub fn model(&self) -> &'a FeatureModel {
        let character: &'a Character = self.character;
        character.model.features.get(&self.full_id).unwrap_or(&UNTOUCHED)
    }

    // ---- options ----

    /// Whether the feature is bought per option (`lore+Undead`).
    #[must_use]
    pub fn takes_options(&self) -> bool {
        self.def.option_def.is_some()
            || matches!((self.kind(), &self.def.award), (FeatureType::Flaw, Some(Award::Options(_))))
    }

    #[must_use]
    pub fn option_def(&self) -> Option<OptionDef> {
        self.def.option()
    }

    /// The bare feature of an option feature, standing for all its options.
    #[must_use]
    pub fn is_template(&self) -> bool {
        self.option().is_none() && self.takes_options()
    }

    fn freeform(&self) -> bool {
        self.def.option_def.as_ref().is_some_and(|o| o.freeform)
    }

    /// The template this option instance belongs to.
    #[must_use]
    pub fn template(&self) -> Option<Self> {
        (self.option().is_some() && self.takes_options()).then(|| Self::new(self.character, self.def, None))
    }

    #[must_use]
    pub fn taken_options(&self) -> IndexMap<String, i32> {
        if self.takes_options() { self.character.taken_options(self.id()) } else { IndexMap::new() }
    }

    #[must_use]
    pub fn can_take_new_option(&self) -> bool {
        let Some(option_def) = self.option_def() else {
            return false;
        };
        let taken = self.taken_options().len();
        match option_def.multiple {
            Multiple::Allowed(multiple) => multiple || taken == 0,
            Multiple::Limit(limit) => taken < limit as usize,
        }
    }

    /// Valid options not taken yet, sorted; `None` when the feature takes no options.
    #[must_use]
    pub fn available_options(&self) -> Option<Vec<String>> {
        if !self.takes_options() {
            return None;
        }
        let mut options: Vec<String> = self.character.options_values_for_feature(self.id(), true).into_iter().collect();
        options.sort();
        Some(options)
    }

    /// Granted ranks of a template not yet assigned to an option.
    #[must_use]
    pub fn unused_bonus(&self) -> i32 {
        if !self.is_template() || self.bonus() <= 0 {
            return 0;
        }
        ChoiceController::option_bonus(self.clone()).choices_remaining()
    }

    // ---- ranks ----

    /// Ranks bought directly.
    #[must_use]
    pub fn purchased(&self) -> i32 {
        self.model().ranks
    }

    /// Ranks granted by other features and plot.
    #[must_use]
    pub fn bonus(&self) -> i32 {
        self.character.bonus(&self.full_id)
    }

    #[must_use]
    pub const fn max_ranks(&self) -> i32 {
        self.def.max_ranks()
    }

    /// Effective ranks; for a template, the sum over its options.
    #[must_use]
    pub fn value(&self) -> i32 {
        if self.is_template() {
            return self.character.option_instances(self.id()).iter().map(Self::value).sum();
        }
        let model = self.model();
        if model.plot_suppressed || (self.kind() == FeatureType::Flaw && model.overcome) {
            return 0;
        }
        (self.purchased() + self.bonus()).min(self.max_ranks())
    }

    /// Highest value held by a single option.
    #[must_use]
    pub fn max_value(&self) -> i32 {
        if self.is_template() {
            return self.character.option_instances(self.id()).iter().map(Self::value).max().unwrap_or(0);
        }
        self.value()
    }

    #[must_use]
    pub fn purchaseable_ranks(&self) -> i32 {
        if self.is_template() { self.max_ranks() } else { (self.max_ranks() - self.value()).max(0) }
    }

    /// Purchased ranks that aren't covered by grants.
    #[must_use]
    pub fn paid_ranks(&self) -> i32 {
        if self.is_template() {
            return 0;
        }
        let grants = self.bonus();
        self.purchased().min(self.max_ranks() - grants).max(0)
    }

    #[must_use]
    pub fn next_value(&self) -> Option<i32> {
        if self.kind() == FeatureType::Class && self.value() == 0 && self.character.level() == 0 {
            return Some(2);
        }
        let value = self.value();
        (value < self.max_ranks()).then_some(value + 1)
    }

    #[must_use]
    pub fn min_value(&self) -> i32 {
        if self.kind() == FeatureType::Class && self.is_starting() && self.character.is_multiclass() {
            return 2;
        }
        self.bonus()
    }

    #[must_use]
    pub fn rank_name(&self, count: i32) -> &'static str {
        match (self.kind(), count == 1) {
            (FeatureType::Class, true) => "level",
            (FeatureType::Class, false) => "levels",
            (_, true) => "rank",
            (_, false) => "ranks",
        }
    }

    // ---- tree ----

    /// Declared parent, or for internal features granted under a parent the
    /// character lacks, the feature that granted it.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let declared = self.def.parent.as_deref().and_then(|p| self.character.feature(p));
        if self.kind().is_internal()
            && self.value() > 0
            && declared.as_ref().is_none_or(|p| p.value() == 0)
            && let Some((adopted, _)) = self.granted_by().into_iter().find(|(fc, _)| fc.value() > 0)
        {
            return Some(adopted);
        }
        declared
    }

    #[must_use]
    pub fn children(&self) -> Vec<Self> {
        let character = self.character;
        let mut children = Vec::new();
        for def in character.ruleset.features.values() {
            if def.parent.as_deref() != Some(self.id()) {
                continue;
            }
            let child = Self::new(character, def, None);
            if child.is_template() {
                children.extend(character.option_instances(&def.id));
            }
            children.push(child);
        }
        children
    }

    /// Cap on child ranks bought under this feature, if it sets one.
    #[must_use]
    pub fn child_purchase_limit(&self) -> Option<i32> {
        let rule = self.def.child_purchase.as_ref()?;
        let basis = rule.basis.as_ref().map_or_else(|| self.value(), |b| self.character.get(b));
        Some(rule.limit_for(basis))
    }

    #[must_use]
    pub fn child_purchase_remaining(&self) -> Option<i32> {
        let limit = self.child_purchase_limit()?;
        let spent: i32 = self.children().iter().filter(|c| !c.is_template()).map(Self::purchased).sum();
        Some(limit - spent)
    }

    /// Sources granting ranks to this feature, with the ranks each grants.
    #[must_use]
    pub fn granted_by(&self) -> Vec<(Self, i32)> {
        self.character
            .sources(&self.full_id)
            .filter(|(_, data)| data.grants > 0)
            .filter_map(|(source, data)| Some((self.character.feature(source)?, data.grants)))
            .collect()
    }

    /// Whether the feature hangs off the starting class.
    #[must_use]
    pub fn is_starting(&self) -> bool {
        if self.kind() == FeatureType::Class {
            return self.character.level() == 0 || self.model().is_starting_class;
        }
        self.parent().is_none_or(|p| p.is_starting())
    }

    #[must_use]
    pub fn is_archetype(&self) -> bool {
        self.kind() == FeatureType::Class && self.model().is_archetype_class
    }

    /// Another taken feature replaces this one.
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        self.character
            .ruleset
            .features
            .values()
            .filter(|d| d.supersedes.as_deref() == Some(self.id()))
            .any(|d| self.character.get(&PropExpression::id(d.id.clone())) > 0)
    }

    // ---- choices ----

    /// Choices currently offered, including the option-bonus router of a
    /// template with unassigned grants.
    #[must_use]
    pub fn choices(&self) -> IndexMap<String, ChoiceController<'a>> {
        let mut choices = IndexMap::new();
        if self.value() > 0
            && let Some(defs) = &self.def.choices
        {
            let starting = self.is_starting();
            for (id, def) in defs {
                if def.starting_class && !starting {
                    continue;
                }
                choices.insert(id.clone(), ChoiceController::grant(self.clone(), id, def));
            }
        }
        if self.is_template() && self.bonus() > 0 {
            choices.insert(OPTION_BONUS.to_owned(), ChoiceController::option_bonus(self.clone()));
        }
        choices
    }

    #[must_use]
    pub fn has_available_choices(&self) -> bool {
        self.choices().values().any(|c| c.choices_remaining() > 0)
    }

    // ---- cost ----

    #[must_use]
    pub fn currency_name(&self) -> Option<String> {
        let currency = self.def.currency()?;
        Some(
            self.character
                .ruleset
                .attribute(currency)
                .and_then(|a| a.abbrev.clone())
                .unwrap_or_else(|| self.character.ruleset.display_name(currency)),
        )
    }

    #[must_use]
    pub fn currency_balance(&self) -> Option<i32> {
        self.def.currency().map(|_| self.character.cp())
    }

    /// Incoming discounts, plus the template's for an option instance.
    #[must_use]
    pub fn discounts(&self) -> Vec<Discount> {
        let mut discounts = self.character.incoming_discounts(&self.full_id);
        if self.option().is_some() && self.takes_options() {
            discounts.extend(self.character.incoming_discounts(self.id()));
        }
        discounts
    }

    /// `(paid cost, cost the grants would have had, refund for grants past
    /// the maximum)`, all before discounts. Purchased ranks count first.
    fn cost_values(&self, purchased: i32, granted: i32) -> (i32, i32, i32) {
        let Some(cost_def) = &self.def.cost else {
            return (0, 0, 0);
        };
        let max_ranks = self.max_ranks();
        let grants_used = granted.min(max_ranks);
        let effective = (purchased + granted).min(max_ranks);
        let paid_ranks = effective - grants_used;
        let (paid_cost, potential_cost, refund_value) = match cost_def {
            CostDef::Flat(c) => (c * paid_ranks, c * grants_used, *c),
            CostDef::ByRank(by_rank) => {
                let paid: i32 = by_rank.rank_costs(paid_ranks).iter().sum();
                let all: i32 = by_rank.rank_costs(effective).iter().sum();
                (paid, all - paid, by_rank.single_rank_cost(max_ranks))
            }
        };
        (paid_cost, potential_cost, refund_value * (granted - grants_used).max(0))
    }

    /// Cost of holding `purchased` ranks on top of `granted` ones, after
    /// discounts. Paid ranks never drop below 1 each; discounted grants
    /// produce a rebate.
    #[must_use]
    pub fn cost_for(&self, purchased: i32, granted: i32) -> i32 {
        if self.model().plot_free || self.def.cost.is_none() {
            return 0;
        }
        let max_ranks = self.max_ranks();
        let effective = (purchased + granted).min(max_ranks);
        let grants_used = granted.min(max_ranks);
        let paid_ranks = effective - grants_used;
        let (paid_cost, potential_cost, refund) = self.cost_values(purchased, granted);

        let potential_discount = (paid_cost - paid_ranks).max(0);
        let potential_rebate = (potential_cost - grants_used).max(0);
        let (mut discount_total, mut rebate_total) = (0, 0);
        for discount in self.discounts() {
            let ranks = discount.ranks.filter(|r| *r != 0).unwrap_or(effective);
            discount_total += discount.discount * paid_ranks.min(ranks);
            if discount.discount > 0 {
                rebate_total += discount.discount * grants_used.min(ranks);
            }
        }
        paid_cost - discount_total.min(potential_discount) - rebate_total.min(potential_rebate) - refund
    }

    /// Currency spent on this feature as it stands.
    #[must_use]
    pub fn cost(&self) -> i32 {
        if self.is_template() {
            return 0;
        }
        self.cost_for(self.paid_ranks(), self.bonus())
    }

    /// How many more ranks `available` currency buys.
    #[must_use]
    pub fn max_rank_increase(&self, available: i32) -> i32 {
        let ranks = self.purchaseable_ranks();
        if ranks < 1 {
            return 0;
        }
        match &self.def.cost {
            None => ranks,
            Some(CostDef::Flat(c)) if *c <= 0 => ranks,
            Some(CostDef::Flat(c)) => ranks.min(available.div_euclid(*c)),
            Some(CostDef::ByRank(_)) => {
                let (paid, grants, current) = (self.paid_ranks(), self.bonus(), self.cost());
                (1..=ranks).rev().find(|n| self.cost_for(paid + n, grants) - current <= available).unwrap_or(0)
            }
        }
    }

    fn grants_for_cost(&self) -> i32 {
        if self.is_template() { 0 } else { self.bonus() }
    }

    /// Cost of the next rank; unassigned template grants make it free.
    #[must_use]
    pub fn next_cost(&self) -> i32 {
        if self.unused_bonus() > 0 {
            return 0;
        }
        let (paid, grants) = (self.paid_ranks(), self.grants_for_cost());
        self.cost_for(paid + 1, grants) - self.cost_for(paid, grants)
    }

    /// Price label for buying `ranks` more, like `3 CP` or `+2 CP` for a flaw.
    #[must_use]
    pub fn purchase_cost_string(&self, ranks: i32) -> Option<String> {
        if self.kind() == FeatureType::Flaw {
            return Some(self.award_string());
        }
        let currency = self.currency_name()?;
        self.def.cost.as_ref()?;
        let ranks = (ranks - self.unused_bonus()).max(0);
        let (paid, grants) = (self.paid_ranks(), self.grants_for_cost());
        let cost = self.cost_for(paid + ranks, grants) - self.cost_for(paid, grants);
        Some(if cost < 0 { format!("+{} {currency}", -cost) } else { format!("{cost} {currency}") })
    }

    // ---- checks ----

    #[must_use]
    pub fn meets_requirements(&self) -> Decision {
        match &self.def.requires {
            Some(req) => self.character.meets_requirements(req, Some(&self.full_id)),
            None => Decision::OK,
        }
    }

    /// Paid ranks must keep meeting the requirements.
    #[must_use]
    pub fn validate(&self) -> Decision {
        if self.paid_ranks() <= 0 {
            return Decision::OK;
        }
        self.meets_requirements()
    }

    #[must_use]
    pub fn can_afford(&self, ranks: i32) -> Decision {
        if matches!(self.kind(), FeatureType::Flaw | FeatureType::Class) {
            return Decision::OK;
        }
        let (Some(currency), Some(available)) = (self.def.currency(), self.currency_balance()) else {
            return Decision::fail(format!("{} can't be purchased directly.", self.display_name()));
        };
        let grants = self.grants_for_cost();
        let delta = self.cost_for(self.paid_ranks() + ranks, grants) - self.cost().max(0);
        if available < delta {
            let name = self.currency_name().unwrap_or_else(|| currency.to_owned());
            return Decision::fail(format!("Need {delta} {name} to purchase, but only have {available}"))
                .need_currency(currency, delta)
                .amount(self.max_rank_increase(available));
        }
        Decision::OK
    }

    #[must_use]
    pub fn can_increase(&self, ranks: i32) -> Decision {
        match self.kind() {
            FeatureType::Flaw if !self.character.can_respend() => Decision::fail(NO_RESPEND),
            FeatureType::Class => self.class_can_increase(ranks),
            _ => self.base_can_increase(ranks),
        }
    }

    pub(super) fn base_can_increase(&self, ranks: i32) -> Decision {
        if ranks <= 0 {
            return Decision::fail("Value must be positive.");
        }
        let purchaseable = self.purchaseable_ranks();
        let current = self.value();
        if purchaseable <= 0 {
            return Decision::fail(format!("{} is already at its maximum.", self.display_name()));
        }
        if let Some(parent) = self.parent()
            && let Some(remaining) = parent.child_purchase_remaining()
            && remaining < ranks
        {
            return Decision::fail(format!(
                "Can't increase {} by {ranks} because {}'s current limit is {remaining}.",
                self.display_name(),
                parent.display_name()
            ))
            .amount((remaining - ranks).max(0));
        }
        if ranks > purchaseable {
            return Decision::fail(format!(
                "Max is {}, so can't increase to {}",
                self.def.ranks_label(),
                current + ranks
            ))
            .amount(purchaseable);
        }
        if self.takes_options() && self.unused_bonus() > 0 && self.can_take_new_option() {
            return Decision::NEEDS_OPTION;
        }
        let rd = self.meets_requirements();
        if !rd.is_ok() {
            return rd;
        }
        match self.option() {
            Some(option) if self.takes_options() && !self.freeform() && self.purchased() == 0 => {
                if !self.character.options_values_for_feature(self.id(), true).contains(option) {
                    return Decision::fail(format!("'{option}' not a valid option for {}", self.id()));
                }
            }
            Some(_) if !self.takes_options() => {
                return Decision::fail(format!("Feature {} does not accept options.", self.id()));
            }
            _ => {}
        }
        let rd = self.can_afford(ranks);
        if !rd.is_ok() {
            return rd;
        }
        if !self.takes_options() {
            return Decision::OK;
        }
        match self.option() {
            Some(_) if self.value() > 0 || self.can_take_new_option() => Decision::OK,
            Some(_) => Decision::fail(format!(
                "Can't take new option for {} because the maximum number of options has been reached.",
                self.id()
            )),
            None if !self.can_take_new_option() => Decision::fail(format!(
                "Can't take new option for {} because the maximum number of options has been reached.",
                self.id()
            )),
            None if !self.freeform() && self.available_options().is_none_or(|o| o.is_empty()) => {
                Decision::fail(format!("No options are available for {}.", self.display_name()))
            }
            None => Decision::NEEDS_OPTION,
        }
    }

    #[must_use]
    pub fn can_decrease(&self, ranks: i32) -> Decision {
        match self.kind() {
            FeatureType::Flaw => self.flaw_can_decrease(ranks),
            FeatureType::Class => self.class_can_decrease(ranks),
            _ if !self.character.can_respend() => Decision::fail(NO_RESPEND),
            _ => self.base_can_decrease(ranks),
        }
    }

    pub(super) fn base_can_decrease(&self, ranks: i32) -> Decision {
        if ranks < 1 {
            return Decision::fail("Value must be positive.");
        }
        let purchased = self.purchased();
        if ranks > purchased {
            return Decision::fail(format!(
                "Can't sell back {ranks} ranks when you've only purchased {purchased} ranks."
            ))
            .amount(ranks - purchased);
        }
        if self.bonus() >= self.max_ranks() {
            return Decision::fail("Feature is already fully refunded.");
        }
        Decision::OK
    }

    // ---- presentation ----

    #[must_use]
    pub fn display_name(&self) -> String {
        let name = self.character.ruleset.display_name(self.id());
        match self.option() {
            Some(option) => format!("{name} [{option}]"),
            None => name,
        }
    }

    #[must_use]
    pub fn short_description(&self) -> Option<String> {
        if let Some(short) = &self.def.short_description {
            return Some(short.clone());
        }
        let first = self.def.description.as_deref()?.lines().find(|l| !l.trim().is_empty())?.trim();
        Some(match first.char_indices().nth(100) {
            Some((cut, _)) => format!("{}…", &first[..cut]),
            None => first.to_owned(),
        })
    }

    /// Shown among taken features, or as an "add new" entry for a template
    /// with grants to assign.
    #[must_use]
    pub fn should_show_in_list(&self) -> bool {
        if self.is_template() {
            return self.unused_bonus() > 0 && self.can_take_new_option();
        }
        self.value() > 0
    }

    /// Human-readable notes on where the value and cost come from.
    #[must_use]
    pub fn explain(&self) -> Vec<String> {
        let model = self.model();
        if model.plot_suppressed {
            return vec!["This feature was suppressed by a plot member.".into()];
        }
        let mut lines = Vec::new();
        if self.value() > 0 {
            if model.plot_added {
                lines.push("This feature was added by a plot member.".into());
            }
            if model.plot_free {
                lines.push("This feature is free for plot reasons.".into());
            }
            let purchased = self.purchased();
            if self.max_ranks() == 1 && purchased == 1 {
                lines.push("You have taken this feature.".into());
            } else if self.max_ranks() != 1 && purchased > 0 {
                lines.push(format!("You have taken {purchased} {}.", self.rank_name(purchased)));
            }
            let cost = self.cost();
            if let Some(currency) = self.currency_name().filter(|_| purchased > 0 && cost > 0) {
                let (full, _, _) = self.cost_values(purchased, self.bonus());
                if full > 0 && full != cost {
                    lines.push(format!("The cost would be {full} {currency} before discounts."));
                }
                lines.push(format!("You have spent {cost} {currency} on this feature."));
            }
            self.explain_sources(&mut lines);
        }
        match self.kind() {
            FeatureType::Class => self.explain_class(&mut lines),
            FeatureType::Flaw => self.explain_flaw(&mut lines),
            _ => {}
        }
        lines
    }

    fn explain_sources(&self, lines: &mut Vec<String>) {
        let currency = self.currency_name().unwrap_or_default();
        for (source_id, data) in self.character.sources(&self.full_id) {
            let source =
                if source_id == PLOT_SOURCE { "Plot".to_owned() } else { self.character.display_name(source_id) };
            match data.grants {
                1 => lines.push(format!("Granted by [{source}](../{source_id}).")),
                n if n > 1 => lines.push(format!("Granted {n} {} from [{source}](../{source_id}).", self.rank_name(n))),
                _ => {}
            }
            for discount in &data.discounts {
                let mut line = format!("Discounted by {} {currency}, ", discount.discount);
                if let Some(ranks) = discount.ranks {
                    line.push_str(&format!("up to {ranks} {}, ", self.rank_name(ranks)));
                }
                line.push_str(&format!("via [{source}](../{source_id})."));
                lines.push(line);
            }
        }
    }

    /// Soft problems: unmet soft requirements, missing parent, choice trouble.
    #[must_use]
    pub fn issues(&self) -> Vec<Issue> {
        let mut issues = Vec::new();
        let value = self.value();
        if value > 0
            && let Some(soft) = &self.def.soft_requires
        {
            let rd = self.character.meets_requirements(soft, Some(&self.full_id));
            if !rd.is_ok() {
                issues.push(Issue::new("soft-requirements-not-met", rd.reason_str(), Some(&self.full_id)));
            }
        }
        if self.paid_ranks() > 0
            && let Some(parent) = self.parent()
            && parent.value() == 0
        {
            issues.push(Issue::new(
                "parent-not-purchased",
                format!("{} shouldn't be purchased without {}", self.display_name(), parent.display_name()),
                Some(&self.full_id),
            ));
        }
        if value > 0 {
            for choice in self.choices().values() {
                issues.extend(choice.issues());
            }
        }
        issues
    }

    #[must_use]
    pub fn form(&self) -> FeatureForm {
        let currency = self.def.currency();
        FeatureForm {
            id: self.full_id.clone(),
            name: self.display_name(),
            kind: self.kind(),
            value: self.value(),
            purchased: self.purchased(),
            max_ranks: self.max_ranks(),
            ranks_label: self.def.ranks_label(),
            next_value: self.next_value(),
            min_value: self.min_value(),
            can_increase: self.can_increase(1),
            can_decrease: self.can_decrease(1),
            cost: self.purchase_cost_string(1),
            currency: currency.and(self.currency_name()),
            currency_balance: self.currency_balance(),
            options: self.available_options(),
            taken_options: self.taken_options(),
            choices: self.choices().values().map(ChoiceController::summary).collect(),
            explain: self.explain(),
            description: self.def.description.clone(),
            notes: self.model().notes.clone(),
        }
    }

    // ---- propagation ----

    /// Grants and discounts this feature sends to other features.
    pub(super) fn propagation(&self) -> (IndexMap<String, i32>, IndexMap<String, Vec<Discount>>) {
        let mut grants = IndexMap::new();
        let mut discounts: IndexMap<String, Vec<Discount>> = IndexMap::new();
        if self.is_template() {
            if let Some(router) = self.choices().get(OPTION_BONUS) {
                router.update_propagation(&mut grants, &mut discounts);
            }
            return (grants, discounts);
        }
        let value = self.value();
        if value <= 0 {
            return (grants, discounts);
        }
        if let Some(granted) = &self.def.grants {
            super::propagation::gather_grants(granted, value, &mut grants);
        }
        if let Some(rank_grants) = &self.def.rank_grants {
            for granted in rank_grants.range(..=value).map(|(_, g)| g) {
                super::propagation::gather_grants(granted, value, &mut grants);
            }
        }
        for grant_if in &self.def.grant_if {
            if self.character.meets_requirements(&grant_if.requires, Some(&self.full_id)).is_ok() {
                super::propagation::gather_grants(&grant_if.grants, value, &mut grants);
            }
        }
        if self.kind() == FeatureType::Class {
            let extra = if self.is_starting() { &self.def.starting_features } else { &self.def.multiclass_features };
            if let Some(extra) = extra {
                super::propagation::gather_grants(extra, value, &mut grants);
            }
        }
        for (target, discount) in self.def.discounts.iter().flatten() {
            discounts.entry(super::propagation::grant_key(target).0).or_default().push(*discount);
        }
        for choice in self.choices().values() {
            choice.update_propagation(&mut grants, &mut discounts);
        }
        (grants, discounts)
    }
}

impl Character {
    /// Buys ranks. Buying an option of a template with unassigned grants
    /// assigns a granted rank instead.
    pub(super) fn increase_feature(&mut self, full_id: &str, ranks: i32) -> Decision {
        let Some(feature) = self.feature(full_id) else {
            return Decision::fail(format!("Unknown feature {full_id}"));
        };
        if let Some(template) = feature.template()
            && template.unused_bonus() > 0
        {
            let template_id = template.full_id().to_owned();
            return self.choose_on(&template_id, OPTION_BONUS, full_id, false);
        }
        let rd = feature.can_increase(ranks);
        if !rd.is_ok() {
            return rd;
        }
        if rd.needs_option {
            return Decision::needs_option_fail();
        }
        let (purchased, max_ranks) = (feature.purchased(), feature.max_ranks());
        self.set_purchased(full_id, purchased + ranks, max_ranks);
        self.reconcile();
        Decision { amount: self.feature(full_id).map(|f| f.value()), ..Decision::MUTATED }
    }

    /// Sells back ranks.
    pub(super) fn decrease_feature(&mut self, full_id: &str, ranks: i32) -> Decision {
        let Some(feature) = self.feature(full_id) else {
            return Decision::fail(format!("Unknown feature {full_id}"));
        };
        let rd = feature.can_decrease(ranks);
        if !rd.is_ok() {
            return rd;
        }
        let (purchased, max_ranks) = (feature.purchased(), feature.max_ranks());
        self.set_purchased(full_id, purchased - ranks, max_ranks);
        self.reconcile();
        Decision { amount: self.feature(full_id).map(|f| f.value()), ..Decision::MUTATED }
    }
}
