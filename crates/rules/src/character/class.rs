//! Class levels: level budget, starting and archetype class, per-class
//! spellcasting and power tables.

use super::feature::FeatureController;
use super::{Character, NO_RESPEND};
use crate::decision::Decision;
use crate::defs::Sphere;

const TIERS: [i32; 4] = [1, 2, 3, 4];

#[derive(Debug, Clone, Copy)]
enum ClassFlag {
    Starting,
    Archetype,
}

impl FeatureController<'_> {
    fn is_caster(&self) -> bool {
        self.definition().sphere() != Sphere::Martial
    }

    fn tier_table(&self, tier: i32) -> i32 {
        self.character().ruleset().powers.get(&tier).map_or(0, |t| t.evaluate(self.value()))
    }

    /// A class's share of a scoped attribute. Without a slot, tiered
    /// attributes sum all four tiers.
    pub(super) fn class_attribute(&self, attribute: &str, slot: Option<i32>) -> i32 {
        if self.kind() != crate::defs::FeatureType::Class || self.value() <= 0 {
            return 0;
        }
        let ruleset = self.character().ruleset();
        let tiered = |caster: bool| -> i32 {
            if caster != self.is_caster() {
                return 0;
            }
            match slot {
                Some(tier) if TIERS.contains(&tier) => self.tier_table(tier),
                Some(_) => 0,
                None => TIERS.iter().map(|t| self.tier_table(*t)).sum(),
            }
        };
        match attribute {
            "spell_slots" => tiered(true),
            "powers" => tiered(false),
            "cantrips" if self.is_caster() => self.tier_table(0),
            "utilities" if !self.is_caster() => self.tier_table(0),
            "spells_known" if self.is_caster() => ruleset.spells_known.evaluate(self.value()),
            "spells_prepared" if self.is_caster() => ruleset.spells_prepared.evaluate(self.value()),
            _ => 0,
        }
    }

    pub(super) fn class_can_increase(&self, levels: i32) -> Decision {
        let rd = self.base_can_increase(levels);
        if !rd.is_ok() {
            return rd;
        }
        let available = self.character().levels_available().min(self.purchaseable_ranks());
        if available >= levels {
            return Decision::OK.amount(available);
        }
        Decision::fail(format!("Only {available} class levels available.")).amount(available)
    }

    pub(super) fn class_can_decrease(&self, levels: i32) -> Decision {
        if !self.character().can_respend() {
            return Decision::fail(NO_RESPEND);
        }
        let rd = self.base_can_decrease(levels);
        if !rd.is_ok() {
            return rd;
        }
        let current = self.purchased();
        if self.is_starting() && current != self.character().level() && current - levels < 2 {
            return Decision::fail("Can't reduce starting class levels below 2 while multiclassed.")
                .amount(current - 2);
        }
        if current >= levels { Decision::OK.amount(current) } else { Decision::NO.amount(current) }
    }

    pub(super) fn explain_class(&self, lines: &mut Vec<String>) {
        if self.value() <= 0 {
            return;
        }
        let character = self.character();
        let get = |attribute: &str, slot: Option<i32>| self.class_attribute(attribute, slot);
        let tiers = |attribute: &str| {
            TIERS.iter().map(|t| get(attribute, Some(*t)).to_string()).collect::<Vec<_>>().join("/")
        };
        if self.model().is_starting_class {
            lines.push("This is your starting class.".into());
        }
        if self.is_archetype() {
            lines.push("This is your archetype class.".into());
        }
        if self.is_caster() {
            let sphere = self.definition().sphere().key();
            lines.push(format!("Spellcasting sphere: {}", character.ruleset().display_name(sphere)));
            lines.push(format!("Cantrips: {}", get("cantrips", None)));
            lines.push(format!("Spell slots: {}", tiers("spell_slots")));
            lines.push(format!("Spells prepared: {}", get("spells_prepared", None)));
            lines.push(format!("Spells known: {}", get("spells_known", None)));
        } else {
            lines.push(format!("Utilities: {}", get("utilities", None)));
            lines.push(format!("Powers: {}", tiers("powers")));
        }
    }
}

impl Character {
    /// First class bought comes in at level 2 and becomes the starting class;
    /// the class with the most levels is the archetype.
    pub(super) fn increase_class(&mut self, full_id: &str, levels: i32) -> Decision {
        let levels = if self.level() == 0 && levels < 2 { 2 } else { levels };
        let rd = self.increase_feature(full_id, levels);
        if !rd.is_ok() {
            return rd;
        }
        let Some(class) = self.feature(full_id) else {
            return rd;
        };
        let purchased = class.purchased();
        let others_max = self.classes().iter().filter(|c| c.full_id() != full_id).map(|c| c.value()).max().unwrap_or(0);
        let make_archetype = !class.is_archetype() && others_max < purchased;
        let make_starting = self.starting_class().is_none();
        if make_archetype {
            self.set_class_flag(full_id, ClassFlag::Archetype);
        }
        if make_starting {
            self.set_class_flag(full_id, ClassFlag::Starting);
        }
        self.reconcile();
        rd
    }

    /// The starting class can't drop to one level; it goes straight to zero.
    pub(super) fn decrease_class(&mut self, full_id: &str, levels: i32) -> Decision {
        let Some(class) = self.feature(full_id) else {
            return Decision::fail(format!("Unknown feature {full_id}"));
        };
        let current = class.purchased();
        let levels = if class.is_starting() && current - levels < 2 { current } else { levels };
        let rd = self.decrease_feature(full_id, levels);
        if !rd.is_ok() {
            return rd;
        }
        let cleared = self.model.features.get(full_id).is_none_or(|m| m.ranks <= 0);
        let was_archetype = self.model.features.get(full_id).is_some_and(|m| m.is_archetype_class);
        if cleared && let Some(model) = self.model.features.get_mut(full_id) {
            model.is_starting_class = false;
            model.is_archetype_class = false;
            if !model.should_keep() {
                self.model.features.shift_remove(full_id);
            }
        }
        self.reconcile();
        if was_archetype {
            self.promote_archetype();
        }
        let value = self.feature(full_id).map_or(0, |c| c.value());
        Decision { amount: Some(value), ..Decision::MUTATED }
    }

    /// Moves the archetype flag to the class with the most levels.
    fn promote_archetype(&mut self) {
        let classes = self.classes();
        let Some(highest) = classes.first().map(|c| (c.full_id().to_owned(), c.value())) else {
            return;
        };
        let current = classes.iter().find(|c| c.is_archetype()).map_or(0, |c| c.value());
        if highest.1 > current {
            self.set_class_flag(&highest.0, ClassFlag::Archetype);
            self.reconcile();
        }
    }

    /// Only one class carries each flag.
    fn set_class_flag(&mut self, full_id: &str, flag: ClassFlag) {
        for (id, model) in &mut self.model.features {
            let field = match flag {
                ClassFlag::Starting => &mut model.is_starting_class,
                ClassFlag::Archetype => &mut model.is_archetype_class,
            };
            *field = id == full_id;
        }
        if !self.model.features.contains_key(full_id) {
            let model = self.model.features.entry(full_id.to_owned()).or_default();
            match flag {
                ClassFlag::Starting => model.is_starting_class = true,
                ClassFlag::Archetype => model.is_archetype_class = true,
            }
        }
    }
}
