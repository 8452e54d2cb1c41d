//! Outcome of a rule check or a mutation.
//!
//! Rule checks never error: a failed check is a `Decision` with
//! `success == false` and, usually, a human-readable reason. Callers branch on
//! [`Decision::is_ok`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub success: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_option: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// How far the operation could have gone, e.g. the affordable rank count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i32>,
    /// Currency shortfall by currency id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub need_currency: Option<BTreeMap<String, i32>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mutation_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl Decision {
    pub const OK: Self = Self::with(true, false, false);
    pub const NO: Self = Self::with(false, false, false);
    pub const MUTATED: Self = Self::with(true, false, true);
    pub const NEEDS_OPTION: Self = Self::with(true, true, false);

    const fn with(success: bool, needs_option: bool, mutation_applied: bool) -> Self {
        Self {
            success,
            needs_option,
            reason: None,
            amount: None,
            need_currency: None,
            mutation_applied,
            exception: None,
        }
    }

    #[must_use]
    pub fn fail(reason: impl Into<String>) -> Self {
        Self { reason: Some(reason.into()), ..Self::NO }
    }

    #[must_use]
    pub fn needs_option_fail() -> Self {
        Self { needs_option: true, ..Self::fail("An option must be selected") }
    }

    #[must_use]
    pub fn mutated(reason: impl Into<String>) -> Self {
        Self { reason: Some(reason.into()), ..Self::MUTATED }
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.success
    }

    #[must_use]
    pub const fn amount(mut self, amount: i32) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn need_currency(mut self, currency: impl Into<String>, amount: i32) -> Self {
        self.need_currency.get_or_insert_with(BTreeMap::new).insert(currency.into(), amount);
        self
    }

    /// Reason text, or an empty string when none was given.
    #[must_use]
    pub fn reason_str(&self) -> &str {
        self.reason.as_deref().unwrap_or_default()
    }
}

impl From<bool> for Decision {
    fn from(success: bool) -> Self {
        if success { Self::OK } else { Self::NO }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.reason, self.success) {
            (Some(reason), _) => f.write_str(reason),
            (None, true) => f.write_str("OK"),
            (None, false) => f.write_str("Not allowed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_are_skipped() {
        let json = serde_json::to_value(Decision::OK).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true }));

        let json = serde_json::to_value(Decision::fail("nope").amount(2).need_currency("cp", 3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "reason": "nope", "amount": 2, "needCurrency": { "cp": 3 } })
        );
    }

    #[test]
    fn needs_option_fail_carries_reason() {
        let d = Decision::needs_option_fail();
        assert!(!d.is_ok());
        assert!(d.needs_option);
        assert_eq!(d.reason_str(), "An option must be selected");
        assert!(Decision::NEEDS_OPTION.is_ok());
    }
}
