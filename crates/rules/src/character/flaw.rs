//! Flaws award CP instead of costing it. Outside respend they can't be
//! removed, only overcome by paying back the award plus a penalty.

use indexmap::IndexMap;

use super::feature::FeatureController;
use super::{Character, NO_RESPEND};
use crate::decision::Decision;
use crate::defs::{Award, FeatureType};

impl FeatureController<'_> {
    /// Award per option, with `$flag` entries expanded. A `-value` flag entry
    /// drops that option when its award matches.
    #[must_use]
    pub fn award_options(&self) -> Option<IndexMap<String, i32>> {
        let Some(Award::Options(table)) = &self.definition().award else {
            return None;
        };
        let mut awards = IndexMap::new();
        let mut from_flags = Vec::new();
        for (option, award) in table {
            match option.strip_prefix('$') {
                Some(flag) => from_flags.push((flag, *award)),
                None => {
                    awards.insert(option.clone(), *award);
                }
            }
        }
        for (flag, award) in from_flags {
            for text in self.character().flag_texts(flag) {
                match text.strip_prefix('-') {
                    Some(removed) => {
                        if awards.get(removed) == Some(&award) {
                            awards.shift_remove(removed);
                        }
                    }
                    None => {
                        awards.insert(text, award);
                    }
                }
            }
        }
        Some(awards)
    }

    /// CP the flaw would award at creation, with `award_mods` applied.
    fn award_value(&self) -> i32 {
        let mut award = match &self.definition().award {
            Some(Award::Flat(n)) => *n,
            Some(Award::Options(_)) => self
                .option()
                .and_then(|o| self.award_options().and_then(|a| a.get(o).copied()))
                .unwrap_or_default(),
            None => 0,
        };
        for (feature, modifier) in self.definition().award_mods.iter().flatten() {
            if self.character().get_str(feature) > 0 {
                award += modifier;
            }
        }
        (award * self.paid_ranks()).max(0)
    }

    /// CP received for the flaw; nothing when plot made it free.
    #[must_use]
    pub fn award_cp(&self) -> i32 {
        if self.kind() != FeatureType::Flaw || self.model().plot_free {
            return 0;
        }
        self.award_value()
    }

    fn overcome_value(&self) -> i32 {
        let award = self.model().overcome_award_override.unwrap_or_else(|| self.award_value());
        award + self.character().ruleset().flaw_overcome
    }

    /// CP spent overcoming the flaw, zero until it is overcome.
    #[must_use]
    pub fn overcome_cp(&self) -> i32 {
        if self.kind() == FeatureType::Flaw && self.model().overcome { self.overcome_value() } else { 0 }
    }

    pub(super) fn award_string(&self) -> String {
        match &self.definition().award {
            Some(Award::Flat(n)) => format!("+{n} CP"),
            Some(Award::Options(_)) => {
                let awards = self.award_options().unwrap_or_default();
                let (min, max) = (awards.values().min(), awards.values().max());
                match (min, max) {
                    (Some(min), Some(max)) if min == max => format!("+{min} CP"),
                    (Some(min), Some(max)) => format!("+{min}-{max} CP"),
                    _ => "+? CP".into(),
                }
            }
            None => "+? CP".into(),
        }
    }

    pub(super) fn flaw_can_decrease(&self, ranks: i32) -> Decision {
        let model = self.model();
        if model.overcome {
            return Decision::fail("This flaw has already been overcome.");
        }
        let rd = self.base_can_decrease(ranks);
        if !rd.is_ok() || self.character().can_respend() {
            return rd;
        }
        if model.plot_disable_overcome {
            return Decision::fail("Plot is preventing this flaw from being overcome.");
        }
        let (cost, cp) = (self.overcome_value(), self.character().cp());
        if cp < cost {
            return Decision::fail(format!("Need {cost} CP to overcome, but only have {cp}")).need_currency("cp", cost);
        }
        Decision::OK
    }

    pub(super) fn explain_flaw(&self, lines: &mut Vec<String>) {
        let award = self.award_cp();
        if award != 0 {
            lines.push(format!("You receive {award} CP from this flaw."));
        }
        if self.model().overcome {
            lines.push(format!("This flaw has been overcome ({} CP).", self.overcome_cp()));
        }
        if self.model().plot_disable_overcome {
            lines.push("Plot has disabled the ability to overcome this flaw.".into());
        }
    }
}

impl Character {
    /// Flaws are taken at a rank, not stacked.
    pub(super) fn increase_flaw(&mut self, full_id: &str, ranks: i32) -> Decision {
        let Some(flaw) = self.feature(full_id) else {
            return Decision::fail(format!("Unknown feature {full_id}"));
        };
        let rd = flaw.can_increase(ranks);
        if !rd.is_ok() {
            return rd;
        }
        if rd.needs_option {
            return Decision::needs_option_fail();
        }
        let max_ranks = flaw.max_ranks();
        self.set_purchased(full_id, ranks, max_ranks);
        self.reconcile();
        Decision { amount: self.feature(full_id).map(|f| f.value()), ..Decision::MUTATED }
    }

    /// Removes the flaw during respend, otherwise marks it overcome.
    pub(super) fn decrease_flaw(&mut self, full_id: &str, ranks: i32) -> Decision {
        let Some(flaw) = self.feature(full_id) else {
            return Decision::fail(format!("Unknown feature {full_id}"));
        };
        let rd = flaw.can_decrease(ranks);
        if !rd.is_ok() {
            return rd;
        }
        if self.can_respend() {
            return self.decrease_feature(full_id, ranks);
        }
        self.model.features.entry(full_id.to_owned()).or_default().overcome = true;
        self.reconcile();
        Decision::mutated("Flaw overcome.")
    }

    /// Sum of flaw awards the player chose, before the cap.
    #[must_use]
    pub fn flaw_award_total(&self) -> i32 {
        self.features().iter().filter(|f| !f.model().plot_added).map(FeatureController::award_cp).sum()
    }

    /// Explanation shown above the flaw list.
    #[must_use]
    pub fn explain_flaw_group(&self) -> String {
        let available = self.flaw_cp_available();
        if available <= 0 {
            return format!(
                "You have reached the maximum Flaw CP award ({}). You may still take new flaws, but you will not receive any more CP for them.",
                self.ruleset.flaw_cp_cap
            );
        }
        format!("You may take an additional {available} CP worth of flaws. Any flaws taken beyond this point will not award CP.")
    }
}
