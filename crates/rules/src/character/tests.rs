use std::sync::Arc;

use super::Character;
use super::model::CharacterModel;
use super::mutation::{ChoiceMutation, Mutation, NoteMutation, PlotMutation, RankMutation};
use crate::defs::{FeatureDef, FeatureType};
use crate::ruleset::Ruleset;

const RULES: &str = r#"
- {id: basic-skill, name: Basic Skill, type: skill, cost: 1}
- {id: drill, name: Drill, type: skill, cost: 1, ranks: 3}
- {id: forge, name: Forge, type: skill, cost: 3}
- {id: pricey, name: Pricey, type: skill, cost: 10}
- {id: smith, name: Smith, type: perk, cost: 1, discounts: {forge: 1}}
- {id: tough, name: Tough, type: perk, cost: 2, grants: [lp:2, basic-skill]}
- id: training
  name: Training
  type: perk
  cost: 1
  choices:
    skill: {name: Bonus Skill, matcher: {type: skill}}
- {id: lore, name: Lore, type: skill, cost: 1, option: {freeform: true}}
- {id: scholar, name: Scholar, type: perk, cost: 1, grants: lore}
- {id: veteran, name: Veteran, type: perk, cost: 1, soft_requires: fighter:4}
- {id: fighter, name: Fighter, type: class, sphere: martial}
- {id: wizard, name: Wizard, type: class, sphere: arcane}
- {id: cowardice, name: Cowardice, type: flaw, award: 2}
"#;

pub(super) fn ruleset_with(features: &str, flags: serde_json::Value) -> Arc<Ruleset> {
    let mut ruleset: Ruleset =
        serde_yaml::from_str("{id: test, name: Test, xp_table: {0: 2, 8: 3, 16: 4, 24: 5}}").unwrap();
    let defs: Vec<FeatureDef> = serde_yaml::from_str(features).unwrap();
    ruleset.features = defs.into_iter().map(|d| (d.id.clone(), d)).collect();
    ruleset.default_flags = serde_json::from_value(flags).unwrap();
    Arc::new(ruleset)
}

pub(super) fn character(ruleset: &Arc<Ruleset>) -> Character {
    Character::new(Arc::clone(ruleset), CharacterModel::new("c1", &ruleset.id, &ruleset.version))
}

fn standard() -> Character {
    character(&ruleset_with(RULES, serde_json::json!({})))
}

fn buy(c: &mut Character, expr: &str) -> crate::decision::Decision {
    c.apply(&RankMutation::parse(expr).unwrap().into(), false)
}

fn sell(c: &mut Character, id: &str, ranks: i32) -> crate::decision::Decision {
    c.apply(&RankMutation { id: id.into(), option: None, ranks: -ranks }.into(), false)
}

#[test]
fn fresh_character_budget() {
    let c = standard();
    assert_eq!(c.xp_level(), 2);
    assert_eq!(c.level(), 0);
    assert_eq!(c.base_cp(), 5);
    assert_eq!(c.cp(), 5);
    assert!(c.features().is_empty());
    assert!(c.issues().is_empty());
}

#[test]
fn purchase_spends_cp() {
    let mut c = standard();
    let rd = buy(&mut c, "drill:2");
    assert!(rd.success && rd.mutation_applied, "{rd}");
    assert_eq!(rd.amount, Some(2));
    assert_eq!(c.get_str("drill"), 2);
    assert_eq!(c.cp(), 3);
    assert!(c.mutated());

    let rd = buy(&mut c, "drill:2");
    assert!(!rd.success);
    assert_eq!(rd.reason_str(), "Max is 3, so can't increase to 4");
    assert_eq!(rd.amount, Some(1));
}

#[test]
fn unaffordable_purchase_reports_shortfall() {
    let c = standard();
    let rd = c.can_purchase(&RankMutation::parse("pricey").unwrap());
    assert!(!rd.success);
    assert_eq!(rd.reason_str(), "Need 10 CP to purchase, but only have 5");
    assert_eq!(rd.need_currency.unwrap()["cp"], 10);
    assert_eq!(rd.amount, Some(0));
}

#[test]
fn unknown_feature_is_rejected() {
    let mut c = standard();
    let rd = buy(&mut c, "necromancy");
    assert!(!rd.success);
    assert_eq!(rd.reason_str(), "Purchase not implemented: necromancy");
}

#[test]
fn discounts_reduce_cost() {
    let mut c = standard();
    assert!(buy(&mut c, "smith").success);
    assert_eq!(c.cp(), 4);
    assert_eq!(c.feature("forge").unwrap().purchase_cost_string(1).as_deref(), Some("2 CP"));
    assert!(buy(&mut c, "forge").success);
    assert_eq!(c.feature("forge").unwrap().cost(), 2);
    assert_eq!(c.cp(), 2);
}

#[test]
fn grants_refund_purchased_ranks() {
    let mut c = standard();
    let lp = c.lp();
    assert!(buy(&mut c, "basic-skill").success);
    assert_eq!(c.cp(), 4);
    assert!(buy(&mut c, "tough").success);

    let skill = c.feature("basic-skill").unwrap();
    assert_eq!(skill.value(), 1);
    assert_eq!(skill.bonus(), 1);
    assert_eq!(skill.paid_ranks(), 0);
    assert_eq!(skill.cost(), 0);
    assert_eq!(c.lp(), lp + 2);
    assert_eq!(c.cp(), 3);

    let rd = buy(&mut c, "basic-skill");
    assert_eq!(rd.reason_str(), "Basic Skill is already at its maximum.");
}

#[test]
fn granted_features_appear_on_sheet() {
    let mut c = standard();
    assert!(buy(&mut c, "tough").success);
    let ids: Vec<String> = c.features().iter().map(|f| f.full_id().to_owned()).collect();
    assert_eq!(ids, vec!["tough", "basic-skill"]);
    let granted = c.feature("basic-skill").unwrap();
    assert_eq!(granted.granted_by().len(), 1);
    assert!(granted.explain().contains(&"Granted by [Tough](../tough).".to_owned()));
    assert!(!c.model().features.contains_key("basic-skill"));
}

#[test]
fn choices_grant_selections() {
    let mut c = standard();
    let choose = |value: &str| -> Mutation {
        ChoiceMutation { id: "training".into(), choice: "skill".into(), value: value.into(), remove: false }.into()
    };
    let rd = c.apply(&choose("basic-skill"), false);
    assert_eq!(rd.reason_str(), "Unknown choice 'skill'");

    assert!(buy(&mut c, "training").success);
    let training = c.feature("training").unwrap();
    let choice = &training.choices()["skill"];
    assert_eq!(choice.name(), "Bonus Skill");
    assert_eq!(choice.choices_remaining(), 1);
    assert!(choice.available_choices().contains_key("forge"));
    assert!(!choice.available_choices().contains_key("smith"));

    let rd = c.apply(&choose("smith"), false);
    assert!(rd.reason_str().contains("does not match choice definition"));
    let rd = c.apply(&choose("basic-skill"), false);
    assert_eq!(rd.reason_str(), "Choice applied.");
    assert_eq!(c.get_str("basic-skill"), 1);

    assert_eq!(c.apply(&choose("basic-skill"), false).reason_str(), "Choice already taken.");
    assert_eq!(c.apply(&choose("forge"), false).reason_str(), "Choice skill of training only accepts 1 choices.");

    let unchoose =
        ChoiceMutation { id: "training".into(), choice: "skill".into(), value: "basic-skill".into(), remove: true };
    assert_eq!(c.apply(&unchoose.into(), false).reason_str(), "Choice removed.");
    assert_eq!(c.get_str("basic-skill"), 0);
}

#[test]
fn granted_template_routes_option_purchases() {
    let mut c = standard();
    assert!(buy(&mut c, "scholar").success);
    let lore = c.feature("lore").unwrap();
    assert!(lore.is_template());
    assert_eq!(lore.unused_bonus(), 1);
    assert_eq!(lore.next_cost(), 0);
    assert!(c.can_purchase(&RankMutation::parse("lore").unwrap()).needs_option);

    let cp = c.cp();
    let rd = buy(&mut c, "lore+Undead");
    assert!(rd.success, "{rd}");
    assert_eq!(c.get_str("lore+Undead"), 1);
    assert_eq!(c.get_str("lore"), 1);
    assert_eq!(c.feature("lore").unwrap().unused_bonus(), 0);
    assert_eq!(c.cp(), cp);

    assert!(buy(&mut c, "lore+Ghosts").success);
    assert_eq!(c.cp(), cp - 1);
    assert_eq!(c.taken_options("lore").len(), 2);
}

#[test]
fn first_class_starts_at_level_two() {
    let mut c = standard();
    let rd = buy(&mut c, "fighter");
    assert!(rd.success, "{rd}");
    assert_eq!(c.level(), 2);
    assert_eq!(c.levels_available(), 0);
    let fighter = c.feature("fighter").unwrap();
    assert!(fighter.is_starting());
    assert!(fighter.is_archetype());
    assert_eq!(c.get_str("martial"), 2);

    let rd = buy(&mut c, "wizard");
    assert_eq!(rd.reason_str(), "Only 0 class levels available.");
}

#[test]
fn multiclass_keeps_starting_class() {
    let mut c = standard();
    assert!(buy(&mut c, "fighter").success);
    c.set_xp_level(3);
    assert_eq!(c.xp(), 8);
    assert!(buy(&mut c, "wizard").success);
    assert!(c.is_multiclass());
    assert_eq!(c.starting_class().unwrap().id(), "fighter");
    assert_eq!(c.archetype_class().unwrap().id(), "fighter");
    assert_eq!(c.get_str("caster"), 1);

    let rd = sell(&mut c, "fighter", 1);
    assert_eq!(rd.reason_str(), "Can't reduce starting class levels below 2 while multiclassed.");
    assert!(sell(&mut c, "wizard", 1).success);
    assert!(!c.is_multiclass());
}

#[test]
fn archetype_moves_to_highest_class() {
    let mut c = standard();
    c.set_xp_level(5);
    assert!(buy(&mut c, "fighter").success);
    assert!(buy(&mut c, "wizard:3").success);
    assert_eq!(c.archetype_class().unwrap().id(), "wizard");
    assert!(sell(&mut c, "wizard", 2).success);
    assert_eq!(c.archetype_class().unwrap().id(), "fighter");
}

#[test]
fn flaws_award_and_overcome() {
    let mut c = standard();
    assert!(buy(&mut c, "cowardice").success);
    assert_eq!(c.cp(), 7);
    assert_eq!(c.flaw_cp_available(), 3);

    c.set_respend(false);
    assert_eq!(c.can_purchase(&RankMutation::parse("cowardice").unwrap()).reason_str(), super::NO_RESPEND);
    let rd = sell(&mut c, "cowardice", 1);
    assert_eq!(rd.reason_str(), "Flaw overcome.");
    assert_eq!(c.get_str("cowardice"), 0);
    assert_eq!(c.cp(), 3);

    let rd = sell(&mut c, "cowardice", 1);
    assert_eq!(rd.reason_str(), "This flaw has already been overcome.");
}

#[test]
fn overcoming_needs_enough_cp() {
    let mut c = standard();
    assert!(buy(&mut c, "cowardice").success);
    assert!(buy(&mut c, "drill:3").success);
    assert!(buy(&mut c, "smith").success);
    assert!(buy(&mut c, "training").success);
    assert_eq!(c.cp(), 2);
    c.set_respend(false);
    let rd = sell(&mut c, "cowardice", 1);
    assert!(!rd.success);
    assert_eq!(rd.reason_str(), "Need 4 CP to overcome, but only have 2");
}

#[test]
fn refunds_need_respend() {
    let mut c = standard();
    assert!(buy(&mut c, "drill:2").success);
    let rd = sell(&mut c, "drill", 3);
    assert_eq!(rd.reason_str(), "Can't sell back 3 ranks when you've only purchased 2 ranks.");
    assert_eq!(rd.amount, Some(1));
    assert!(sell(&mut c, "drill", 1).success);
    assert_eq!(c.get_str("drill"), 1);

    c.set_respend(false);
    assert_eq!(sell(&mut c, "drill", 1).reason_str(), super::NO_RESPEND);
}

#[test]
fn dry_run_leaves_model_untouched() {
    let mut c = standard();
    let rd = c.apply(&RankMutation::parse("drill").unwrap().into(), true);
    assert!(rd.success);
    assert!(c.model().features.is_empty());
    assert!(!c.mutated());
    assert_eq!(c.cp(), 5);
}

#[test]
fn failed_mutation_restores_snapshot() {
    let mut c = standard();
    assert!(buy(&mut c, "drill").success);
    let before = c.dump();
    let rd = buy(&mut c, "pricey");
    assert!(!rd.success);
    assert_eq!(c.dump(), before);
}

#[test]
fn soft_requirements_raise_issues() {
    let mut c = standard();
    assert!(buy(&mut c, "veteran").success);
    let issues = c.issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_code, "soft-requirements-not-met");
    assert_eq!(issues[0].feature_id.as_deref(), Some("veteran"));
    assert!(c.validate().success);
    assert!(!c.fully_valid().success);
}

#[test]
fn plot_grants_and_unknown_ids() {
    let ruleset = ruleset_with(RULES, serde_json::json!({}));
    let mut model = CharacterModel::new("c2", "test", "0.0a");
    model.metadata.grants = vec!["drill:2".into(), "necromancy".into()];
    let c = Character::new(ruleset, model);
    assert_eq!(c.get_str("drill"), 2);
    assert_eq!(c.cp(), 5);
    let issues = c.issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_code, "plot");
}

#[test]
fn plot_mutations() {
    let mut c = standard();
    let plot = PlotMutation {
        id: "pricey".into(),
        added: Some(true),
        free: Some(true),
        suppressed: None,
        disable_overcome: None,
        notes: Some("quest reward".into()),
    };
    assert_eq!(c.apply(&plot.into(), false).reason_str(), "Plot adjustment applied.");
    assert_eq!(c.get_str("pricey"), 1);
    assert_eq!(c.cp(), 5);
    assert!(c.feature("pricey").unwrap().explain().contains(&"This feature is free for plot reasons.".to_owned()));
}

#[test]
fn notes_are_stored_and_cleared() {
    let mut c = standard();
    let note = |notes: Option<&str>| -> Mutation {
        NoteMutation { id: "drill".into(), notes: notes.map(str::to_owned) }.into()
    };
    assert_eq!(c.apply(&note(Some("practice daily")), false).reason_str(), "Notes updated.");
    assert_eq!(c.model().features["drill"].notes.as_deref(), Some("practice daily"));
    assert!(c.apply(&note(Some("")), false).success);
    assert!(!c.model().features.contains_key("drill"));
}

#[test]
fn mutation_descriptions() {
    let c = standard();
    assert_eq!(c.describe_mutation(&RankMutation::parse("drill:2").unwrap().into()), "Purchase Drill x2");
    let remove = RankMutation { id: "lore".into(), option: Some("Undead".into()), ranks: -1 };
    assert_eq!(c.describe_mutation(&remove.into()), "Remove Lore [Undead] x1");
    let choice = ChoiceMutation { id: "training".into(), choice: "skill".into(), value: "forge".into(), remove: false };
    assert_eq!(c.describe_mutation(&choice.into()), "Chose 'Forge' for choice Bonus Skill of Training");
}

#[test]
fn listings_group_by_type() {
    let mut c = standard();
    assert!(buy(&mut c, "drill").success);
    let taken = c.list_features(Some(FeatureType::Skill), true, false);
    assert_eq!(taken.len(), 1);
    let available: Vec<String> =
        c.list_features(Some(FeatureType::Skill), false, true).iter().map(|f| f.full_id().to_owned()).collect();
    assert!(available.contains(&"forge".to_owned()));
    assert!(!available.contains(&"pricey".to_owned()));
    assert!(!available.contains(&"drill".to_owned()));

    let groups = c.feature_groups();
    let skills = groups.iter().find(|g| g.kind == FeatureType::Skill).unwrap();
    assert_eq!(skills.taken.len(), 1);
    assert_eq!(skills.taken[0].name, "Drill");
    assert!(skills.available.windows(2).all(|w| w[0].name <= w[1].name));
}

#[test]
fn form_summarizes_feature() {
    let mut c = standard();
    assert!(buy(&mut c, "drill").success);
    let form = c.feature("drill").unwrap().form();
    assert_eq!(form.value, 1);
    assert_eq!(form.next_value, Some(2));
    assert_eq!(form.cost.as_deref(), Some("1 CP"));
    assert!(form.can_increase.success);
    assert!(form.can_decrease.success);
    assert_eq!(form.currency_balance, Some(4));
}
