use indexmap::IndexMap;
use tracing::{trace, warn};

use super::listing::Issue;
use super::model::merge_flags;
use super::{Character, Incoming, PLOT_SOURCE, Propagation};
use crate::defs::{Discount, Grantable};
use crate::expr::PropExpression;

/// Grants can feed requirements that unlock more grants; this bounds the
/// number of rounds before giving up.
const MAX_PASSES: usize = 32;

/// Canonical key and explicit amount of a grant expression. `lp:0` and
/// `lp` both grant one rank.
pub(super) fn grant_key(text: &str) -> (String, Option<i32>) {
    match PropExpression::parse(text) {
        Ok(expr) => (expr.full_id(), expr.value.filter(|v| *v != 0)),
        Err(_) => (text.trim().to_owned(), None),
    }
}

/// Flattens a grant definition into target ids and ranks, for a source
/// holding `value` ranks.
pub(super) fn gather_grants(grantable: &Grantable, value: i32, into: &mut IndexMap<String, i32>) {
    match grantable {
        Grantable::Expr(text) => {
            let (key, amount) = grant_key(text);
            *into.entry(key).or_default() += amount.unwrap_or(1);
        }
        Grantable::List(items) => {
            for item in items {
                gather_grants(item, value, into);
            }
        }
        Grantable::Map(map) => {
            for (target, amount) in map {
                *into.entry(grant_key(target).0).or_default() += amount;
            }
        }
        Grantable::Def(def) => {
            let amount = def.value.lookup(value);
            let amount = if def.per_rank { amount * value } else { amount };
            *into.entry(grant_key(&def.id).0).or_default() += amount;
        }
    }
}

impl Character {
    /// Recomputes merged flags and every grant and discount on the sheet.
    ///
    /// Each pass collects what every source sends given the previous pass,
    /// until nothing changes.
    pub fn reconcile(&mut self) {
        self.flags = merge_flags(&self.ruleset.default_flags, &self.model.metadata.flags);
        self.incoming.clear();
        for pass in 1..=MAX_PASSES {
            let next = self.collect_propagation();
            if next == self.incoming {
                trace!(character = %self.model.id, passes = pass, "reconciled");
                return;
            }
            self.incoming = next;
        }
        warn!(character = %self.model.id, passes = MAX_PASSES, "grant propagation did not settle");
    }

    fn collect_propagation(&self) -> Incoming {
        let mut incoming = Incoming::default();
        let mut emit = |source: &str, grants: IndexMap<String, i32>, mut discounts: IndexMap<String, Vec<Discount>>| {
            let mut targets: Vec<String> = grants.keys().cloned().collect();
            targets.extend(discounts.keys().filter(|k| !grants.contains_key(*k)).cloned());
            for target in targets {
                let data = Propagation {
                    grants: grants.get(&target).copied().unwrap_or_default(),
                    discounts: discounts.shift_remove(&target).unwrap_or_default(),
                };
                if !data.is_empty() {
                    incoming.entry(target).or_default().insert(source.to_owned(), data);
                }
            }
        };

        for fc in self.features() {
            let (grants, discounts) = fc.propagation();
            emit(fc.full_id(), grants, discounts);
        }
        emit(PLOT_SOURCE, self.plot_grants(), IndexMap::new());
        incoming
    }

    fn plot_grants(&self) -> IndexMap<String, i32> {
        let mut grants = IndexMap::new();
        for grant in &self.model.metadata.grants {
            gather_grants(&Grantable::Expr(grant.clone()), 1, &mut grants);
        }
        grants
    }

    /// Plot grants naming something the ruleset doesn't define.
    pub(super) fn plot_issues(&self) -> Vec<Issue> {
        self.plot_grants()
            .into_iter()
            .filter(|(id, value)| *value != 0 && !self.ruleset.identifier_defined(id))
            .map(|(id, value)| {
                Issue::new(
                    "plot",
                    format!("Granted {value} ranks of {id}, but I don't know what that is (contact plot)."),
                    None,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_forms_flatten() {
        let grantable: Grantable = serde_yaml::from_str(
            "[lp:2, lp, spikes:0, {lore+Undead_Lore: 2}, {id: cp, value: {1: 1, 3: 2}, per_rank: true}]",
        )
        .unwrap();
        let mut grants = IndexMap::new();
        gather_grants(&grantable, 3, &mut grants);
        assert_eq!(grants["lp"], 3);
        assert_eq!(grants["spikes"], 1);
        assert_eq!(grants["lore+Undead_Lore"], 2);
        assert_eq!(grants["cp"], 6);
    }

    #[test]
    fn keys_are_canonical() {
        assert_eq!(grant_key("lore+Undead_Lore:2"), ("lore+Undead_Lore".into(), Some(2)));
        assert_eq!(grant_key(" wizard.spell_slots@1 "), ("wizard.spell_slots@1".into(), None));
        assert_eq!(grant_key("not valid!"), ("not valid!".into(), None));
    }
}
