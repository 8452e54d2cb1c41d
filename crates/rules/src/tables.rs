//! Lookup tables: xp to level, level to life points, class level to powers.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RulesError;

/// Value of the greatest key `<= key`; the smallest key always qualifies.
///
/// # Errors
/// [`RulesError::Table`] when the table is empty.
pub fn table_lookup<T: Clone>(table: &BTreeMap<i32, T>, key: i32) -> Result<T, RulesError> {
    let mut best = None;
    for (k, v) in table {
        if best.is_none() || *k <= key {
            best = Some(v);
        } else {
            break;
        }
    }
    best.cloned().ok_or_else(|| RulesError::Table {
        message: "Did not find any values in table".into(),
        context: None,
    })
}

/// First key whose value equals `value`, otherwise the largest key.
pub fn table_reverse_lookup<T: PartialEq>(table: &BTreeMap<i32, T>, value: &T) -> i32 {
    table
        .iter()
        .find(|(_, v)| *v == value)
        .or_else(|| table.iter().next_back())
        .map_or(0, |(k, _)| *k)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    Up,
    Down,
    #[default]
    Nearest,
}

/// `base + key / factor`, rounded, with the key clamped to `[low, high]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalingTable {
    pub base: i32,
    pub factor: f64,
    #[serde(default)]
    pub rounding: Rounding,
    #[serde(default = "ScalingTable::default_low")]
    pub low: i32,
    #[serde(default = "ScalingTable::default_high")]
    pub high: i32,
}

impl ScalingTable {
    #[must_use]
    pub const fn new(base: i32, factor: f64, rounding: Rounding) -> Self {
        Self { base, factor, rounding, low: 1, high: 25 }
    }

    const fn default_low() -> i32 {
        1
    }

    const fn default_high() -> i32 {
        25
    }

    #[must_use]
    pub fn evaluate(&self, key: i32) -> i32 {
        let key = key.clamp(self.low, self.high.max(self.low));
        let x = f64::from(self.base) + f64::from(key) / self.factor;
        let rounded = match self.rounding {
            Rounding::Up => x.ceil(),
            Rounding::Down => x.floor(),
            Rounding::Nearest => x.round_ties_even(),
        };
        rounded as i32
    }
}

/// Explicit key to value map. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RankTable(BTreeMap<i32, i32>);

impl RankTable {
    /// # Errors
    /// [`RulesError::Table`] for an empty map.
    pub fn new(entries: BTreeMap<i32, i32>) -> Result<Self, RulesError> {
        if entries.is_empty() {
            return Err(RulesError::Table { message: "Did not find any values in table".into(), context: None });
        }
        Ok(Self(entries))
    }

    #[must_use]
    pub fn evaluate(&self, key: i32) -> i32 {
        table_lookup(&self.0, key).unwrap_or_default()
    }

    #[must_use]
    pub fn reverse_lookup(&self, value: i32) -> i32 {
        table_reverse_lookup(&self.0, &value)
    }

    #[must_use]
    pub const fn entries(&self) -> &BTreeMap<i32, i32> {
        &self.0
    }
}

impl<'de> Deserialize<'de> for RankTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = int_keys::deserialize(deserializer)?;
        Self::new(entries).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Table {
    Scaling(ScalingTable),
    Ranks(RankTable),
}

impl Table {
    #[must_use]
    pub fn evaluate(&self, key: i32) -> i32 {
        match self {
            Self::Scaling(t) => t.evaluate(key),
            Self::Ranks(t) => t.evaluate(key),
        }
    }

    #[must_use]
    pub fn bounds(&self) -> (i32, i32) {
        match self {
            Self::Scaling(t) => (t.low, t.high),
            Self::Ranks(t) => {
                let keys = t.entries().keys();
                (keys.clone().next().copied().unwrap_or(0), keys.last().copied().unwrap_or(0))
            }
        }
    }

    /// Key whose value matches `value`. For scaling tables an inexact value
    /// resolves to the key just below the first larger value.
    #[must_use]
    pub fn reverse_lookup(&self, value: i32) -> i32 {
        match self {
            Self::Ranks(t) => t.reverse_lookup(value),
            Self::Scaling(t) => {
                for k in t.low..=t.high {
                    let v = t.evaluate(k);
                    if v == value {
                        return k;
                    }
                    if v > value {
                        return k - 1;
                    }
                }
                t.high
            }
        }
    }
}

impl From<ScalingTable> for Table {
    fn from(value: ScalingTable) -> Self {
        Self::Scaling(value)
    }
}

/// Integer-keyed maps that may arrive with string keys (JSON, TOML).
pub(crate) mod int_keys {
    use super::{BTreeMap, Deserialize, Deserializer, IndexMap};

    #[derive(Deserialize, PartialEq, Eq, Hash)]
    #[serde(untagged)]
    enum Key {
        Int(i32),
        Text(String),
    }

    pub(crate) fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<i32, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        let raw: IndexMap<Key, V> = IndexMap::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, value)| match key {
                Key::Int(k) => Ok((k, value)),
                Key::Text(text) => text
                    .trim()
                    .parse::<i32>()
                    .map(|k| (k, value))
                    .map_err(|_| serde::de::Error::custom(format!("expected an integer key, got '{text}'"))),
            })
            .collect()
    }

    struct Keyed<V>(BTreeMap<i32, V>);

    impl<'de, V: Deserialize<'de>> Deserialize<'de> for Keyed<V> {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserialize(deserializer).map(Keyed)
        }
    }

    pub(crate) fn deserialize_opt<'de, D, V>(deserializer: D) -> Result<Option<BTreeMap<i32, V>>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        Option::<Keyed<V>>::deserialize(deserializer).map(|keyed| keyed.map(|Keyed(map)| map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn xp_table() -> RankTable {
        RankTable::new(BTreeMap::from([(0, 2), (8, 3), (16, 4), (32, 5)])).unwrap()
    }

    #[test]
    fn lookup_takes_greatest_key_not_above() {
        let t = xp_table();
        assert_eq!(t.evaluate(-5), 2);
        assert_eq!(t.evaluate(0), 2);
        assert_eq!(t.evaluate(15), 3);
        assert_eq!(t.evaluate(16), 4);
        assert_eq!(t.evaluate(900), 5);
        assert!(table_lookup::<i32>(&BTreeMap::new(), 3).is_err());
    }

    #[test]
    fn reverse_lookup_falls_back_to_max_key() {
        let t = xp_table();
        assert_eq!(t.reverse_lookup(4), 16);
        assert_eq!(t.reverse_lookup(12), 32);
    }

    #[test]
    fn scaling_rounding() {
        let lp = ScalingTable::new(2, 5.0, Rounding::Up);
        assert_eq!(lp.evaluate(2), 3);
        assert_eq!(lp.evaluate(5), 3);
        assert_eq!(lp.evaluate(6), 4);
        let spikes = ScalingTable::new(2, 6.0, Rounding::Down);
        assert_eq!(spikes.evaluate(5), 2);
        assert_eq!(spikes.evaluate(6), 3);
        let known = ScalingTable::new(1, 2.0, Rounding::Nearest);
        assert_eq!(known.evaluate(1), 2);
        assert_eq!(known.evaluate(3), 2);
        assert_eq!(known.evaluate(4), 3);
    }

    #[test]
    fn scaling_clamps_keys() {
        let t = ScalingTable::new(0, 1.0, Rounding::Down);
        assert_eq!(t.evaluate(-3), 1);
        assert_eq!(t.evaluate(40), 25);
    }

    #[test]
    fn scaling_reverse_lookup() {
        let t = Table::from(ScalingTable::new(2, 5.0, Rounding::Up));
        assert_eq!(t.reverse_lookup(3), 1);
        assert_eq!(t.reverse_lookup(4), 6);
        assert_eq!(t.reverse_lookup(100), 25);
    }

    #[test]
    fn table_forms_deserialize() {
        let t: Table = serde_json::from_str(r#"{"base": 2, "factor": 5, "rounding": "up"}"#).unwrap();
        assert!(matches!(t, Table::Scaling(_)));
        let t: Table = serde_json::from_value(serde_json::json!({"0": 2, "8": 3})).unwrap();
        assert_eq!(t.evaluate(9), 3);
        let t: Table = serde_yaml::from_str("{0: 2, 8: 3}").unwrap();
        assert_eq!(t.bounds(), (0, 8));
        assert!(serde_json::from_str::<Table>("{}").is_err());
    }

    proptest! {
        #[test]
        fn scaling_reverse_lookup_inverts_evaluate(base in 0i32..4, factor in 1u8..12, key in 1i32..=25) {
            let table = Table::from(ScalingTable::new(base, f64::from(factor), Rounding::Down));
            let value = table.evaluate(key);
            let back = table.reverse_lookup(value);
            prop_assert_eq!(table.evaluate(back), value);
        }
    }
}
