use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RulesError;
use crate::expr::PropExpression;

/// Buy (`ranks > 0`) or sell back (`ranks < 0`) ranks of a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankMutation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
    #[serde(default = "RankMutation::default_ranks")]
    pub ranks: i32,
}

impl RankMutation {
    const fn default_ranks() -> i32 {
        1
    }

    /// Parses `"id+Option:3"`; ranks default to 1.
    ///
    /// # Errors
    /// [`RulesError::Parse`] for malformed input.
    pub fn parse(input: &str) -> Result<Self, RulesError> {
        let expr = PropExpression::parse(input)?;
        Ok(Self { ranks: expr.value.unwrap_or(1), option: expr.option, id: expr.prop })
    }

    #[must_use]
    pub fn expression(&self) -> PropExpression {
        PropExpression::with_option(self.id.clone(), self.option.as_deref())
    }
}

impl fmt::Display for RankMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        PropExpression { value: Some(self.ranks), ..self.expression() }.fmt(f)
    }
}

/// Make (or with `remove`, undo) a selection for one of a feature's choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceMutation {
    /// Full id of the feature that owns the choice.
    pub id: String,
    pub choice: String,
    pub value: String,
    #[serde(default)]
    pub remove: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMutation {
    pub id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Plot-only adjustments to a feature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotMutation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppressed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_overcome: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mutation {
    Rank(RankMutation),
    Choice(ChoiceMutation),
    Note(NoteMutation),
    Plot(PlotMutation),
}

impl From<RankMutation> for Mutation {
    fn from(m: RankMutation) -> Self {
        Self::Rank(m)
    }
}

impl From<ChoiceMutation> for Mutation {
    fn from(m: ChoiceMutation) -> Self {
        Self::Choice(m)
    }
}

impl From<NoteMutation> for Mutation {
    fn from(m: NoteMutation) -> Self {
        Self::Note(m)
    }
}

impl From<PlotMutation> for Mutation {
    fn from(m: PlotMutation) -> Self {
        Self::Plot(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_mutation_parse() {
        let m = RankMutation::parse("lore+Undead_Lore:3").unwrap();
        assert_eq!((m.id.as_str(), m.option.as_deref(), m.ranks), ("lore", Some("Undead Lore"), 3));
        assert_eq!(RankMutation::parse("fighter").unwrap().ranks, 1);
        assert_eq!(RankMutation::parse("fighter:-2").unwrap().to_string(), "fighter:-2");
    }

    #[test]
    fn tagged_by_type() {
        let m: Mutation = serde_json::from_value(serde_json::json!({ "type": "rank", "id": "fighter" })).unwrap();
        assert_eq!(m, Mutation::Rank(RankMutation { id: "fighter".into(), option: None, ranks: 1 }));
        let json = serde_json::to_value(Mutation::from(NoteMutation { id: "x".into(), notes: None })).unwrap();
        assert_eq!(json["type"], "note");
    }
}
