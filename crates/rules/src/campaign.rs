//! Campaign maxima.
//!
//! The cadence of events raises the campaign's max XP, max event CP and max
//! bonus CP over time. [`CampaignRecord`] keeps a dated table of those
//! values so awards can be judged against what was possible at the time.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RulesError;

/// A game event, pared down to what moves the campaign values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventRecord {
    /// Effective (end) date; first so events order by date.
    pub date: NaiveDate,
    pub chapter: String,
    #[serde(default = "EventRecord::default_xp")]
    pub xp_value: u32,
    #[serde(default = "EventRecord::default_cp")]
    pub cp_value: u32,
}

impl EventRecord {
    #[must_use]
    pub fn new(chapter: impl Into<String>, date: NaiveDate) -> Self {
        Self { date, chapter: chapter.into(), xp_value: Self::default_xp(), cp_value: Self::default_cp() }
    }

    const fn default_xp() -> u32 {
        8
    }

    const fn default_cp() -> u32 {
        1
    }
}

/// Campaign-wide maxima effective from `date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignValues {
    pub date: NaiveDate,
    pub max_xp: i32,
    pub max_cp: i32,
    pub max_bonus_cp: i32,
}

/// Floors and caps that awards are clamped to.
pub trait Limits {
    fn max_xp(&self) -> i32;
    fn max_cp(&self) -> i32;
    fn max_bonus_cp(&self) -> i32;

    fn floor_xp(&self) -> i32 {
        self.max_xp().div_euclid(2)
    }

    fn floor_cp(&self) -> i32 {
        self.max_cp().div_euclid(2)
    }
}

impl Limits for CampaignValues {
    fn max_xp(&self) -> i32 {
        self.max_xp
    }

    fn max_cp(&self) -> i32 {
        self.max_cp
    }

    fn max_bonus_cp(&self) -> i32 {
        self.max_bonus_cp
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub name: String,
    pub start_year: i32,
    #[serde(default = "CampaignRecord::default_bonus_cp")]
    pub bonus_cp_per_season: i32,
    /// Sorted by date.
    #[serde(default)]
    pub value_table: Vec<CampaignValues>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_date: Option<NaiveDate>,
}

impl CampaignRecord {
    #[must_use]
    pub fn new(name: impl Into<String>, start_year: i32) -> Self {
        Self {
            name: name.into(),
            start_year,
            bonus_cp_per_season: Self::default_bonus_cp(),
            value_table: Vec::new(),
            events: Vec::new(),
            last_event_date: None,
        }
    }

    const fn default_bonus_cp() -> i32 {
        3
    }

    /// Seasons elapsed, counting the start year as the first.
    #[must_use]
    pub fn season(&self) -> i32 {
        self.last_event_date.map_or(1, |d| d.year() - self.start_year + 1)
    }

    #[must_use]
    pub fn start_values(&self) -> CampaignValues {
        CampaignValues {
            date: NaiveDate::from_ymd_opt(self.start_year, 1, 1).unwrap_or(NaiveDate::MIN),
            max_xp: 0,
            max_cp: 0,
            max_bonus_cp: self.bonus_cp_per_season,
        }
    }

    #[must_use]
    pub fn latest_values(&self) -> CampaignValues {
        self.value_table.last().copied().unwrap_or_else(|| self.start_values())
    }

    /// Values in effect on `date`: the last entry dated on or before it.
    #[must_use]
    pub fn historical_values(&self, date: NaiveDate) -> CampaignValues {
        match self.value_table.partition_point(|v| v.date <= date) {
            0 => self.start_values(),
            i => self.value_table[i - 1],
        }
    }

    /// Merges `new_events` into the history and rebuilds the value table.
    ///
    /// Events are grouped by calendar month. Within a month each chapter
    /// accumulates from the previous month's maxima; a new entry is written
    /// whenever the best chapter pushes a maximum higher. Entries never
    /// rewrite a date already in the table.
    pub fn add_events(&mut self, new_events: impl IntoIterator<Item = EventRecord>) {
        let mut all: BTreeSet<EventRecord> = self.events.iter().cloned().collect();
        let before = all.len();
        all.extend(new_events);
        if all.len() == before {
            return;
        }
        let Some(first) = all.first() else { return };

        let mut last_values = self.historical_values(first.date.pred_opt().unwrap_or(first.date));
        let mut last_event_date = self.last_event_date;
        let mut months: BTreeMap<(i32, u32), Vec<&EventRecord>> = BTreeMap::new();
        for event in &all {
            months.entry((event.date.year(), event.date.month())).or_default().push(event);
        }

        let mut table: Vec<CampaignValues> = Vec::new();
        for events in months.values() {
            let (start_xp, start_cp) = (last_values.max_xp, last_values.max_cp);
            let mut chapter_xp: FxHashMap<&str, i32> = FxHashMap::default();
            let mut chapter_cp: FxHashMap<&str, i32> = FxHashMap::default();
            for event in events {
                if last_event_date.is_none_or(|d| event.date > d) {
                    last_event_date = Some(event.date);
                }
                *chapter_xp.entry(&event.chapter).or_insert(start_xp) += event.xp_value as i32;
                *chapter_cp.entry(&event.chapter).or_insert(start_cp) += event.cp_value as i32;

                let max_xp = chapter_xp.values().copied().max().unwrap_or(start_xp);
                let max_cp = chapter_cp.values().copied().max().unwrap_or(start_cp);
                if max_xp > last_values.max_xp || max_cp > last_values.max_cp {
                    let season = event.date.year() - self.start_year + 1;
                    last_values = CampaignValues {
                        date: event.date,
                        max_xp,
                        max_cp,
                        max_bonus_cp: season * self.bonus_cp_per_season,
                    };
                    if table.last().is_none_or(|v| v.date < last_values.date) {
                        table.push(last_values);
                    }
                }
            }
        }

        debug!(campaign = %self.name, events = all.len(), entries = table.len(), "Campaign values rebuilt");
        self.value_table = table;
        self.events = all.into_iter().collect();
        self.last_event_date = last_event_date;
    }

    /// # Errors
    /// [`RulesError::Record`] when the value table is out of date order.
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.value_table.windows(2).any(|w| w[0].date > w[1].date) {
            return Err(RulesError::Record { message: "Entries must be sorted by date".into(), context: None });
        }
        Ok(())
    }
}

impl Limits for CampaignRecord {
    fn max_xp(&self) -> i32 {
        self.latest_values().max_xp
    }

    fn max_cp(&self) -> i32 {
        self.latest_values().max_cp
    }

    fn max_bonus_cp(&self) -> i32 {
        self.latest_values().max_bonus_cp
    }
}
