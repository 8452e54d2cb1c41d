//! # Property expressions
//!
//! `prop(.attribute)?(@slot)?(+option)?(:value)?($single)?(<less_than)?`
//!
//! * `lore+Undead:2` - at least two ranks of the `Undead` lore.
//! * `wizard.spell_slots@1` - first-tier spell slots granted by wizard levels.
//! * `caster$5` - at least five levels in a single caster class.
//! * `level<4` - fewer than four character levels.
//!
//! Underscores in an option stand for spaces. Expressions serialize as their
//! canonical string.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::error::RulesError;

static EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<prop>[a-zA-Z0-9_-]+)",
        r"(?:\.(?P<attribute>[a-zA-Z0-9_-]+))?",
        r"(?:@(?P<slot>-?[a-zA-Z0-9_-]+))?",
        r"(?:\+(?P<option>[a-zA-Z0-9?_-]+))?",
        r"(?::(?P<value>-?\d+))?",
        r"(?:\$(?P<single>-?\d+))?",
        r"(?:<(?P<less_than>-?\d+))?$",
    ))
    .expect("property expression pattern is valid")
});

/// Read access to character properties, as needed to evaluate expressions.
pub trait Properties {
    /// Whether the character has the property at all, even at zero ranks.
    fn has_prop(&self, expr: &PropExpression) -> bool;

    /// Ranks of the property; thresholds on `expr` are ignored.
    fn get_prop(&self, expr: &PropExpression) -> i32;

    /// Largest value held by a single instance (one class, one option).
    fn max_prop(&self, expr: &PropExpression) -> i32 {
        self.get_prop(expr)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropExpression {
    pub prop: String,
    pub attribute: Option<String>,
    pub slot: Option<String>,
    pub option: Option<String>,
    pub value: Option<i32>,
    pub single: Option<i32>,
    pub less_than: Option<i32>,
}

impl PropExpression {
    /// Parses `input`.
    ///
    /// # Errors
    /// [`RulesError::Parse`] when the text is not a property expression.
    pub fn parse(input: &str) -> Result<Self, RulesError> {
        let caps = EXPR.captures(input.trim()).ok_or_else(|| RulesError::Parse { input: input.into() })?;
        let text = |name: &str| caps.name(name).map(|m| m.as_str().to_owned());
        let number = |name: &str| -> Result<Option<i32>, RulesError> {
            caps.name(name)
                .map(|m| m.as_str().parse::<i32>())
                .transpose()
                .map_err(|_| RulesError::Parse { input: input.into() })
        };

        Ok(Self {
            prop: text("prop").unwrap_or_default(),
            attribute: text("attribute"),
            slot: text("slot"),
            option: text("option").map(|o| o.replace('_', " ")),
            value: number("value")?,
            single: number("single")?,
            less_than: number("less_than")?,
        })
    }

    /// Expression naming just `prop`.
    pub fn id(prop: impl Into<String>) -> Self {
        Self { prop: prop.into(), ..Self::default() }
    }

    /// Expression naming `prop` with an optional option.
    pub fn with_option(prop: impl Into<String>, option: Option<&str>) -> Self {
        Self { prop: prop.into(), option: option.map(str::to_owned), ..Self::default() }
    }

    /// The identifier without thresholds: prop, attribute, slot and option.
    #[must_use]
    pub fn full_id(&self) -> String {
        self.base().to_string()
    }

    /// `prop` plus option, which is how feature instances are keyed.
    #[must_use]
    pub fn feature_id(&self) -> String {
        Self::with_option(self.prop.clone(), self.option.as_deref()).to_string()
    }

    /// Copy with every threshold cleared.
    #[must_use]
    pub fn base(&self) -> Self {
        Self { value: None, single: None, less_than: None, ..self.clone() }
    }

    /// Requirement-style check against a character.
    pub fn evaluate<P: Properties + ?Sized>(&self, props: &P) -> Decision {
        if !props.has_prop(self) {
            return Decision::fail(format!("{self} [{} not present]", self.full_id()));
        }
        let ranks = props.get_prop(self);
        if let Some(value) = self.value {
            if ranks < value {
                return Decision::fail(format!("{self} [{ranks} < {value}]"));
            }
        } else if let Some(lt) = self.less_than {
            if ranks >= lt {
                return Decision::fail(format!("{self} [{ranks} ≥ {lt}]"));
            }
        } else if let Some(single) = self.single {
            let max = props.max_prop(self);
            if max < single {
                return Decision::fail(format!("{self} [{max} < {single}]"));
            }
        } else if ranks < 1 {
            return Decision::fail(format!("{self} [ranks={ranks}]"));
        }
        Decision::OK
    }

    #[must_use]
    pub fn identifiers(&self) -> BTreeSet<String> {
        BTreeSet::from([self.prop.clone()])
    }
}

impl fmt::Display for PropExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.prop.is_empty() { "unknown" } else { &self.prop })?;
        if let Some(attribute) = &self.attribute {
            write!(f, ".{attribute}")?;
        }
        if let Some(slot) = &self.slot {
            write!(f, "@{slot}")?;
        }
        if let Some(option) = &self.option {
            write!(f, "+{}", option.replace(' ', "_"))?;
        }
        for (marker, number) in [(':', self.value), ('$', self.single), ('<', self.less_than)] {
            if let Some(n) = number.filter(|n| *n != 0) {
                write!(f, "{marker}{n}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for PropExpression {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PropExpression {
    type Error = RulesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PropExpression> for String {
    fn from(value: PropExpression) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    struct Sheet(HashMap<&'static str, (i32, i32)>);

    impl Properties for Sheet {
        fn has_prop(&self, expr: &PropExpression) -> bool {
            self.0.contains_key(expr.full_id().as_str())
        }
        fn get_prop(&self, expr: &PropExpression) -> i32 {
            self.0.get(expr.full_id().as_str()).map_or(0, |v| v.0)
        }
        fn max_prop(&self, expr: &PropExpression) -> i32 {
            self.0.get(expr.full_id().as_str()).map_or(0, |v| v.1)
        }
    }

    fn sheet() -> Sheet {
        Sheet(HashMap::from([("level", (6, 4)), ("lore+Undead_Lore", (2, 2)), ("fighter", (0, 0))]))
    }

    #[test]
    fn parses_every_part() {
        let e = PropExpression::parse("wizard.spell_slots@-1+Big_Book:3$2<9").unwrap();
        assert_eq!(e.prop, "wizard");
        assert_eq!(e.attribute.as_deref(), Some("spell_slots"));
        assert_eq!(e.slot.as_deref(), Some("-1"));
        assert_eq!(e.option.as_deref(), Some("Big Book"));
        assert_eq!((e.value, e.single, e.less_than), (Some(3), Some(2), Some(9)));
        assert_eq!(e.full_id(), "wizard.spell_slots@-1+Big_Book");
    }

    #[test]
    fn rejects_garbage() {
        let err = PropExpression::parse("not valid!").unwrap_err();
        assert_eq!(err.to_string(), "Requirement parse failure for not valid!");
        assert!(PropExpression::parse("").is_err());
    }

    #[test]
    fn zero_thresholds_are_dropped() {
        assert_eq!(PropExpression::parse("skill:0").unwrap().to_string(), "skill");
        assert_eq!(PropExpression::default().to_string(), "unknown");
    }

    #[test]
    fn evaluate_reasons() {
        let s = sheet();
        let check = |t: &str| PropExpression::parse(t).unwrap().evaluate(&s);

        assert!(check("level:6").is_ok());
        assert_eq!(check("level:7").reason_str(), "level:7 [6 < 7]");
        assert_eq!(check("level<6").reason_str(), "level<6 [6 ≥ 6]");
        assert_eq!(check("level$5").reason_str(), "level$5 [4 < 5]");
        assert_eq!(check("fighter").reason_str(), "fighter [ranks=0]");
        assert_eq!(check("druid").reason_str(), "druid [druid not present]");
        assert!(check("lore+Undead_Lore:2").is_ok());
    }

    #[test]
    fn serde_uses_string_form() {
        let e: PropExpression = serde_json::from_str("\"lore+Undead_Lore:2\"").unwrap();
        assert_eq!(e.option.as_deref(), Some("Undead Lore"));
        assert_eq!(serde_json::to_string(&e).unwrap(), "\"lore+Undead_Lore:2\"");
    }

    proptest! {
        #[test]
        fn canonical_strings_roundtrip(
            prop in "[a-z][a-z0-9-]{0,8}",
            attribute in proptest::option::of("[a-z_]{1,8}"),
            slot in proptest::option::of(-4i32..8),
            option in proptest::option::of("[A-Za-z][A-Za-z0-9]{0,6}"),
            value in proptest::option::of(1i32..50),
            less_than in proptest::option::of(1i32..50),
        ) {
            let mut text = prop;
            if let Some(a) = attribute { text.push_str(&format!(".{a}")); }
            if let Some(s) = slot { text.push_str(&format!("@{s}")); }
            if let Some(o) = option { text.push_str(&format!("+{o}")); }
            if let Some(v) = value { text.push_str(&format!(":{v}")); }
            if let Some(l) = less_than { text.push_str(&format!("<{l}")); }

            let parsed = PropExpression::parse(&text).unwrap();
            prop_assert_eq!(parsed.to_string(), text);
        }
    }
}
