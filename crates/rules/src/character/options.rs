use std::collections::{BTreeMap, BTreeSet};

use super::Character;
use super::model::FlagValue;
use crate::defs::Multiple;
use crate::expr::PropExpression;

impl Character {
    /// Options `feature_id` may take on this character.
    ///
    /// Values come from the option definition, from another feature's taken
    /// options when the definition inherits, and from flags for `$flag`
    /// entries. Flag values starting with `-` remove an option instead.
    /// Options whose requirements aren't met are dropped. With
    /// `exclude_taken`, options already on the sheet are left out, and
    /// nothing is returned once the option limit is reached.
    #[must_use]
    pub fn options_values_for_feature(&self, feature_id: &str, exclude_taken: bool) -> BTreeSet<String> {
        let Some(option_def) = self.ruleset.feature(feature_id).and_then(|d| d.option()) else {
            return BTreeSet::new();
        };
        if option_def.values.is_none() && option_def.inherit.is_none() {
            return BTreeSet::new();
        }

        let mut excluded = BTreeSet::new();
        if exclude_taken {
            let taken = self.taken_options(feature_id);
            if !taken.is_empty() {
                match option_def.multiple {
                    Multiple::Allowed(false) => return BTreeSet::new(),
                    Multiple::Limit(limit) if limit as usize <= taken.len() => return BTreeSet::new(),
                    _ => {}
                }
                excluded.extend(taken.into_keys());
            }
        }

        // Option to the `$flag` entry it came from.
        let mut sources: BTreeMap<String, String> = BTreeMap::new();
        let mut legal: BTreeSet<String> = BTreeSet::new();
        if let Some(inherit) = &option_def.inherit {
            legal.extend(self.taken_options(&inherit.prop).into_keys());
            if inherit.value.is_some() {
                legal.retain(|option| {
                    PropExpression { option: Some(option.clone()), ..inherit.clone() }.evaluate(self).is_ok()
                });
            }
        } else {
            let mut removals = BTreeSet::new();
            for value in option_def.values.iter().flatten() {
                let Some(flag) = value.strip_prefix('$') else {
                    legal.insert(value.clone());
                    continue;
                };
                for text in self.flag_texts(flag) {
                    match text.strip_prefix('-') {
                        Some(removed) => {
                            removals.insert(removed.to_owned());
                        }
                        None => {
                            sources.insert(text.clone(), value.clone());
                            legal.insert(text);
                        }
                    }
                }
            }
            legal.retain(|option| !removals.contains(option));
        }
        legal.retain(|option| !excluded.contains(option));

        if let Some(requires) = &option_def.requires {
            legal.retain(|option| {
                let requirement = requires.get(option).or_else(|| sources.get(option).and_then(|s| requires.get(s)));
                requirement.is_none_or(|req| self.meets_requirements(req, None).is_ok())
            });
        }
        legal
    }

    /// Whether `option` is acceptable for `feature_id`: anything goes for a
    /// freeform definition, no option is required without a definition.
    #[must_use]
    pub fn option_satisfies_definition(&self, feature_id: &str, option: Option<&str>) -> bool {
        let Some(option_def) = self.ruleset.feature(feature_id).and_then(|d| d.option()) else {
            return option.is_none_or(str::is_empty);
        };
        let Some(option) = option else {
            return false;
        };
        option_def.freeform || self.options_values_for_feature(feature_id, false).contains(option)
    }

    /// Flag values as text, skipping nulls.
    pub(crate) fn flag_texts(&self, flag: &str) -> Vec<String> {
        self.flags.get(flag).map(|f| f.values().iter().map(FlagValue::as_text).collect()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{character, ruleset_with};

    #[test]
    fn flag_values_extend_and_remove_options() {
        let ruleset = ruleset_with(
            r#"
            - {id: phobia, name: Phobia, type: flaw, award: {Spiders: 1, Heights: 2, $phobias: 1}}
            "#,
            serde_json::json!({ "phobias": ["Clowns", "-Heights"] }),
        );
        let c = character(&ruleset);
        let options: Vec<String> = c.options_values_for_feature("phobia", false).into_iter().collect();
        assert_eq!(options, vec!["Clowns", "Spiders"]);
        assert!(c.option_satisfies_definition("phobia", Some("Clowns")));
        assert!(!c.option_satisfies_definition("phobia", Some("Heights")));
        assert!(!c.option_satisfies_definition("phobia", None));
    }

    #[test]
    fn option_requirements_filter_values() {
        let ruleset = ruleset_with(
            r#"
            - {id: fighter, name: Fighter, type: class}
            - id: weapon
              name: Weapon Focus
              type: perk
              cost: 1
              option:
                values: [Sword, Axe]
                requires: {Axe: fighter:4}
            "#,
            serde_json::json!({}),
        );
        let c = character(&ruleset);
        let options: Vec<String> = c.options_values_for_feature("weapon", false).into_iter().collect();
        assert_eq!(options, vec!["Sword"]);
        assert!(c.option_satisfies_definition("fighter", None));
    }
}
