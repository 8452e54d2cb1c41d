//! Requirement trees built from property expressions.
//!
//! Data form:
//!
//! ```yaml
//! requires: fighter:2            # one expression
//! requires: [fighter:2, lp:3]    # all of these
//! requires: -wizard              # none of these
//! requires:
//!   any: [fighter:4, { all: [rogue:2, lore+Streetwise] }]
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::error::RulesError;
use crate::expr::{PropExpression, Properties};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRequirement", into = "RawRequirement")]
pub enum Requirement {
    Prop(PropExpression),
    AnyOf(Vec<Requirement>),
    AllOf(Vec<Requirement>),
    NoneOf(Vec<Requirement>),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawRequirement {
    Expr(String),
    List(Vec<RawRequirement>),
    Any { any: Vec<RawRequirement> },
    All { all: Vec<RawRequirement> },
    None { none: Vec<RawRequirement> },
}

impl Requirement {
    /// Parses the string form; a leading `-` negates.
    ///
    /// # Errors
    /// [`RulesError::Parse`] for a malformed expression.
    pub fn parse(input: &str) -> Result<Self, RulesError> {
        match input.trim().strip_prefix('-') {
            Some(rest) => Ok(Self::NoneOf(vec![Self::Prop(PropExpression::parse(rest)?)])),
            None => Ok(Self::Prop(PropExpression::parse(input)?)),
        }
    }

    pub fn evaluate<P: Properties + ?Sized>(&self, props: &P) -> Decision {
        match self {
            Self::Prop(expr) => expr.evaluate(props),
            Self::AllOf(children) => children
                .iter()
                .map(|c| c.evaluate(props))
                .find(|d| !d.is_ok())
                .unwrap_or(Decision::OK),
            Self::AnyOf(children) => {
                let mut reasons = Vec::with_capacity(children.len());
                for child in children {
                    let decision = child.evaluate(props);
                    if decision.is_ok() {
                        return decision;
                    }
                    reasons.push(decision.reason.unwrap_or_default());
                }
                Decision::fail(format!("AnyOf({})", reasons.join("; ")))
            }
            Self::NoneOf(children) => children
                .iter()
                .find(|c| c.evaluate(props).is_ok())
                .map_or(Decision::OK, |c| Decision::fail(format!("Not({c})"))),
        }
    }

    /// Every property id named anywhere in the tree.
    #[must_use]
    pub fn identifiers(&self) -> BTreeSet<String> {
        match self {
            Self::Prop(expr) => expr.identifiers(),
            Self::AnyOf(c) | Self::AllOf(c) | Self::NoneOf(c) => {
                c.iter().flat_map(Self::identifiers).collect()
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, children) = match self {
            Self::Prop(expr) => return expr.fmt(f),
            Self::AnyOf(c) => ("AnyOf", c),
            Self::AllOf(c) => ("AllOf", c),
            Self::NoneOf(c) => ("NoneOf", c),
        };
        write!(f, "{name}(")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            child.fmt(f)?;
        }
        f.write_str(")")
    }
}

impl TryFrom<RawRequirement> for Requirement {
    type Error = RulesError;

    fn try_from(raw: RawRequirement) -> Result<Self, Self::Error> {
        let all = |items: Vec<RawRequirement>| -> Result<Vec<Self>, RulesError> {
            items.into_iter().map(Self::try_from).collect()
        };
        match raw {
            RawRequirement::Expr(text) => Self::parse(&text),
            RawRequirement::List(items) | RawRequirement::All { all: items } => Ok(Self::AllOf(all(items)?)),
            RawRequirement::Any { any } => Ok(Self::AnyOf(all(any)?)),
            RawRequirement::None { none } => Ok(Self::NoneOf(all(none)?)),
        }
    }
}

impl From<Requirement> for RawRequirement {
    fn from(req: Requirement) -> Self {
        let raw = |items: Vec<Requirement>| items.into_iter().map(Self::from).collect();
        match req {
            Requirement::Prop(expr) => Self::Expr(expr.to_string()),
            Requirement::AllOf(items) => Self::List(raw(items)),
            Requirement::AnyOf(items) => Self::Any { any: raw(items) },
            Requirement::NoneOf(mut items) if items.len() == 1 => match items.pop() {
                Some(Requirement::Prop(expr)) => Self::Expr(format!("-{expr}")),
                Some(other) => Self::None { none: vec![other.into()] },
                None => Self::None { none: Vec::new() },
            },
            Requirement::NoneOf(items) => Self::None { none: raw(items) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Sheet(HashMap<&'static str, i32>);

    impl Properties for Sheet {
        fn has_prop(&self, expr: &PropExpression) -> bool {
            self.0.contains_key(expr.full_id().as_str())
        }
        fn get_prop(&self, expr: &PropExpression) -> i32 {
            self.0.get(expr.full_id().as_str()).copied().unwrap_or(0)
        }
    }

    fn req(yaml: &str) -> Requirement {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn data_forms() {
        assert!(matches!(req("fighter:2"), Requirement::Prop(_)));
        assert!(matches!(req("[a, b]"), Requirement::AllOf(v) if v.len() == 2));
        assert!(matches!(req("-wizard"), Requirement::NoneOf(v) if v.len() == 1));
        assert!(matches!(req("{any: [a, {all: [b, c]}]}"), Requirement::AnyOf(v) if v.len() == 2));
        assert!(matches!(req("{none: [a, b]}"), Requirement::NoneOf(v) if v.len() == 2));
        assert!(serde_yaml::from_str::<Requirement>("'bad expr!'").is_err());
    }

    #[test]
    fn combinators() {
        let s = Sheet(HashMap::from([("fighter", 2), ("wizard", 1)]));

        assert!(req("[fighter:2, wizard]").evaluate(&s).is_ok());
        assert_eq!(req("[fighter:2, wizard:2, rogue]").evaluate(&s).reason_str(), "wizard:2 [1 < 2]");
        assert_eq!(
            req("{any: [fighter:3, rogue]}").evaluate(&s).reason_str(),
            "AnyOf(fighter:3 [2 < 3]; rogue [rogue not present])"
        );
        assert_eq!(req("-wizard").evaluate(&s).reason_str(), "Not(wizard)");
        assert!(req("-rogue").evaluate(&s).is_ok());
    }

    #[test]
    fn identifiers_are_collected() {
        let ids = req("{any: [fighter:3, {none: [lore+Undead]}]}").identifiers();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["fighter", "lore"]);
    }

    #[test]
    fn serializes_back_to_data_form() {
        let value = serde_json::to_value(req("[fighter:2, -wizard, {any: [a, b]}]")).unwrap();
        assert_eq!(value, serde_json::json!(["fighter:2", "-wizard", { "any": ["a", "b"] }]));
    }
}
