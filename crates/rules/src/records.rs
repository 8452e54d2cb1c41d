//! Player award ledger.
//!
//! Awards (usually from events) are folded into a [`PlayerRecord`] against
//! the campaign's historical maxima: XP for the player, event and bonus CP
//! per character. Players behind the campaign catch up at double rate and
//! never fall below half the campaign maximum.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::campaign::{CampaignRecord, Limits};
use crate::character::model::{CharacterMetadata, Flag};
use crate::error::RulesError;

/// CP granted for an approved backstory.
pub const BACKSTORY_CP: i32 = 2;

/// Flag changes; a `null` value deletes the flag.
pub type FlagUpdates = IndexMap<String, Option<Flag>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwardRecord {
    pub date: NaiveDate,
    /// Who or what issued the award, for auditing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(default)]
    pub event_xp: i32,
    #[serde(default)]
    pub event_cp: i32,
    #[serde(default)]
    pub bonus_cp: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backstory_approved: Option<bool>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub player_flags: FlagUpdates,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub character_flags: FlagUpdates,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub character_grants: Vec<String>,
}

impl AwardRecord {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            origin: None,
            character: None,
            event_xp: 0,
            event_cp: 0,
            bonus_cp: 0,
            backstory_approved: None,
            player_flags: IndexMap::new(),
            character_flags: IndexMap::new(),
            character_grants: Vec::new(),
        }
    }

    /// A character-bound field is set but no character is named.
    #[must_use]
    pub fn needs_character(&self) -> bool {
        if self.character.as_deref().is_some_and(|c| !c.is_empty()) {
            return false;
        }
        self.event_cp != 0
            || self.bonus_cp != 0
            || self.backstory_approved.is_some()
            || !self.character_flags.is_empty()
            || !self.character_grants.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CharacterRecord {
    pub id: String,
    pub event_cp: i32,
    pub bonus_cp: i32,
    pub backstory_approved: bool,
    pub flags: IndexMap<String, Flag>,
    pub grants: Vec<String>,
}

impl CharacterRecord {
    /// Sheet metadata for this character. Character flags override the
    /// player's flags of the same name.
    #[must_use]
    pub fn metadata(&self, xp: i32, player_flags: &IndexMap<String, Flag>) -> CharacterMetadata {
        let backstory = if self.backstory_approved { BACKSTORY_CP } else { 0 };
        let mut flags: IndexMap<String, Option<Flag>> =
            player_flags.iter().map(|(k, v)| (k.clone(), Some(v.clone()))).collect();
        flags.extend(self.flags.iter().map(|(k, v)| (k.clone(), Some(v.clone()))));
        CharacterMetadata {
            id: self.id.clone(),
            awards: IndexMap::from([
                ("xp".to_owned(), xp),
                ("cp".to_owned(), self.event_cp + self.bonus_cp + backstory),
            ]),
            flags,
            grants: self.grants.clone(),
            ..CharacterMetadata::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub xp: i32,
    /// Sorted by date.
    pub awards: Vec<AwardRecord>,
    pub characters: BTreeMap<String, CharacterRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_campaign_date: Option<NaiveDate>,
    pub flags: IndexMap<String, Flag>,
}

/// Running totals while folding awards.
#[derive(Default)]
struct Ledger {
    xp: i32,
    flags: IndexMap<String, Flag>,
    event_cp: BTreeMap<String, i32>,
    bonus_cp: BTreeMap<String, i32>,
    backstory: BTreeMap<String, bool>,
    character_flags: BTreeMap<String, IndexMap<String, Flag>>,
    grants: BTreeMap<String, Vec<String>>,
}

impl Ledger {
    fn from_player(player: &PlayerRecord) -> Self {
        let chars = &player.characters;
        Self {
            xp: player.xp,
            flags: player.flags.clone(),
            event_cp: chars.iter().map(|(id, c)| (id.clone(), c.event_cp)).collect(),
            bonus_cp: chars.iter().map(|(id, c)| (id.clone(), c.bonus_cp)).collect(),
            backstory: chars.iter().map(|(id, c)| (id.clone(), c.backstory_approved)).collect(),
            character_flags: chars.iter().map(|(id, c)| (id.clone(), c.flags.clone())).collect(),
            grants: chars.iter().map(|(id, c)| (id.clone(), c.grants.clone())).collect(),
        }
    }

    /// Raises XP and each character's event CP to the floors and trims
    /// everything to the caps.
    fn constrain(&mut self, limits: &impl Limits) {
        self.xp = self.xp.max(limits.floor_xp()).min(limits.max_xp());
        for (id, cp) in &mut self.event_cp {
            *cp = (*cp).max(limits.floor_cp()).min(limits.max_cp());
            let bonus = self.bonus_cp.entry(id.clone()).or_default();
            *bonus = (*bonus).min(limits.max_bonus_cp());
        }
    }

    fn apply(&mut self, campaign: &CampaignRecord, award: &AwardRecord) {
        let current = campaign.historical_values(award.date);
        let prev = campaign.historical_values(award.date.pred_opt().unwrap_or(award.date));
        self.constrain(&prev);

        if award.event_xp > 0 {
            let gain = if self.xp < prev.max_xp { 2 * award.event_xp } else { award.event_xp };
            self.xp = (self.xp + gain).min(current.max_xp);
        }
        update_flags(&mut self.flags, &award.player_flags);

        let Some(id) = &award.character else { return };
        if award.event_cp != 0 {
            let cp = self.event_cp.get(id).copied().unwrap_or_else(|| prev.floor_cp());
            let bonus = self.bonus_cp.get(id).copied().unwrap_or_default();
            if cp < current.max_cp {
                self.event_cp.insert(id.clone(), cp + award.event_cp);
            } else if bonus < current.max_bonus_cp {
                self.bonus_cp.insert(id.clone(), bonus + award.event_cp);
            }
        }
        if award.bonus_cp != 0 {
            let bonus = self.bonus_cp.get(id).copied().unwrap_or_default();
            if bonus < current.max_bonus_cp {
                self.bonus_cp.insert(id.clone(), bonus + 1);
            }
        }
        if let Some(approved) = award.backstory_approved {
            self.backstory.insert(id.clone(), approved);
        }
        if !award.character_flags.is_empty() {
            update_flags(self.character_flags.entry(id.clone()).or_default(), &award.character_flags);
        }
        if !award.character_grants.is_empty() {
            self.grants.entry(id.clone()).or_default().extend(award.character_grants.iter().cloned());
        }
    }

    fn character_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .event_cp
            .keys()
            .chain(self.bonus_cp.keys())
            .chain(self.backstory.keys())
            .chain(self.character_flags.keys())
            .chain(self.grants.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Overwrites flags; `None` deletes.
fn update_flags(flags: &mut IndexMap<String, Flag>, updates: &FlagUpdates) {
    for (flag, value) in updates {
        match value {
            Some(value) => {
                flags.insert(flag.clone(), value.clone());
            }
            None => {
                flags.shift_remove(flag);
            }
        }
    }
}

impl PlayerRecord {
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: Some(user.into()), ..Self::default() }
    }

    /// Folds `new_awards` in and re-applies the campaign's current floors.
    ///
    /// Awards dated before anything already processed force a rebuild from
    /// the full award history, since each award depends on all before it.
    #[must_use]
    #[instrument(skip_all, fields(user = ?self.user, awards = new_awards.len()))]
    pub fn update(&self, campaign: &CampaignRecord, mut new_awards: Vec<AwardRecord>) -> Self {
        new_awards.sort_by_key(|a| a.date);
        let mut base = self.clone();
        if let Some(first) = new_awards.first() {
            let behind_awards = base.awards.last().is_some_and(|a| a.date > first.date);
            let behind_campaign = base.last_campaign_date.is_some_and(|d| first.date < d);
            if behind_awards || behind_campaign {
                debug!("Out-of-order awards, rebuilding player record");
                new_awards.extend(base.awards.drain(..));
                new_awards.sort_by_key(|a| a.date);
                base = Self { user: base.user, ..Self::default() };
            }
        }

        let mut ledger = Ledger::from_player(&base);
        for award in &new_awards {
            ledger.apply(campaign, award);
        }
        ledger.constrain(campaign);

        let mut characters = BTreeMap::new();
        for id in ledger.character_ids() {
            let record = CharacterRecord {
                id: id.clone(),
                event_cp: ledger.event_cp.get(&id).copied().unwrap_or_else(|| campaign.floor_cp()),
                bonus_cp: ledger.bonus_cp.get(&id).copied().unwrap_or_default(),
                backstory_approved: ledger.backstory.get(&id).copied().unwrap_or_default(),
                flags: ledger.character_flags.remove(&id).unwrap_or_default(),
                grants: ledger.grants.remove(&id).unwrap_or_default(),
            };
            characters.insert(id, record);
        }

        let mut awards = base.awards;
        awards.extend(new_awards);
        Self {
            user: base.user,
            xp: ledger.xp,
            awards,
            characters,
            last_campaign_date: campaign.last_event_date,
            flags: ledger.flags,
        }
    }

    /// Metadata for one of the player's characters.
    #[must_use]
    pub fn metadata_for(&self, character: &str) -> Option<CharacterMetadata> {
        let record = self.characters.get(character)?;
        let mut metadata = record.metadata(self.xp, &self.flags);
        metadata.player_id.clone_from(&self.user);
        Some(metadata)
    }

    /// # Errors
    /// [`RulesError::Record`] for unsorted awards, awards without a
    /// campaign date, or awards naming a character with no record.
    pub fn validate(&self) -> Result<(), RulesError> {
        let invalid = |message: String| Err(RulesError::Record { message: message.into(), context: None });
        if self.awards.windows(2).any(|w| w[0].date > w[1].date) {
            return invalid("Entries must be sorted by date".into());
        }
        if !self.awards.is_empty() && self.last_campaign_date.is_none() {
            return invalid("last_campaign_date must be populated if awards have been integrated.".into());
        }
        if let Some(missing) =
            self.awards.iter().filter_map(|a| a.character.as_ref()).find(|c| !self.characters.contains_key(*c))
        {
            return invalid(format!("Character record for {missing} not properly initialized."));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::EventRecord;
    use crate::character::model::FlagValue;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Four monthly 8 XP events in one chapter: max XP 32, max CP 4.
    fn campaign() -> CampaignRecord {
        let mut campaign = CampaignRecord::new("test", 2024);
        campaign.add_events((1..=4).map(|m| EventRecord::new("north", date(2024, m, 10))));
        campaign
    }

    fn attended(m: u32, character: &str) -> AwardRecord {
        let award = AwardRecord::new(date(2024, m, 10));
        AwardRecord { event_xp: 8, event_cp: 1, character: Some(character.into()), ..award }
    }

    #[test]
    fn full_attendance_tracks_the_maximum() {
        let campaign = campaign();
        let player = PlayerRecord::new("pat").update(&campaign, (1..=4).map(|m| attended(m, "ash")).collect());
        assert_eq!(player.xp, 32);
        assert_eq!(player.characters["ash"].event_cp, 4);
        assert_eq!(player.last_campaign_date, Some(date(2024, 4, 10)));
        assert!(player.validate().is_ok());
    }

    #[test]
    fn newcomers_start_at_the_floor_and_catch_up() {
        let campaign = campaign();
        let player = PlayerRecord::new("sam").update(&campaign, vec![attended(4, "bo")]);
        // floor 12 from March, then double XP capped at 32
        assert_eq!(player.xp, 28);
        assert_eq!(player.characters["bo"].event_cp, 2);

        let idle = PlayerRecord::new("idle").update(&campaign, Vec::new());
        assert_eq!(idle.xp, 16);
        assert!(idle.characters.is_empty());
    }

    #[test]
    fn surplus_event_cp_spills_into_bonus() {
        let campaign = campaign();
        let mut awards: Vec<AwardRecord> = (1..=4).map(|m| attended(m, "ash")).collect();
        awards.push(AwardRecord { event_cp: 1, character: Some("ash".into()), ..AwardRecord::new(date(2024, 4, 20)) });
        awards.push(AwardRecord { bonus_cp: 5, character: Some("ash".into()), ..AwardRecord::new(date(2024, 4, 21)) });
        let player = PlayerRecord::new("pat").update(&campaign, awards);
        let ash = &player.characters["ash"];
        assert_eq!(ash.event_cp, 4);
        assert_eq!(ash.bonus_cp, 2);
    }

    #[test]
    fn flags_grants_and_backstory_reach_metadata() {
        let campaign = campaign();
        let mut award = attended(1, "ash");
        award.backstory_approved = Some(true);
        award.player_flags.insert("role".into(), Some(Flag::One(FlagValue::Text("npc".into()))));
        award.character_flags.insert("role".into(), Some(Flag::One(FlagValue::Text("pc".into()))));
        award.character_grants.push("lp:1".into());
        let mut cleanup = AwardRecord::new(date(2024, 2, 1));
        cleanup.player_flags.insert("role".into(), None);
        let player = PlayerRecord::new("pat").update(&campaign, vec![award, cleanup]);

        assert!(player.flags.is_empty());
        let metadata = player.metadata_for("ash").unwrap();
        assert_eq!(metadata.player_id.as_deref(), Some("pat"));
        assert_eq!(metadata.grants, vec!["lp:1"]);
        assert_eq!(metadata.flags["role"], Some(Flag::One(FlagValue::Text("pc".into()))));
        let ash = &player.characters["ash"];
        assert_eq!(metadata.awards["cp"], ash.event_cp + ash.bonus_cp + BACKSTORY_CP);
        assert!(player.metadata_for("nobody").is_none());
    }

    #[test]
    fn out_of_order_awards_rebuild() {
        let campaign = campaign();
        let late = PlayerRecord::new("pat").update(&campaign, vec![attended(3, "ash"), attended(4, "ash")]);
        let rebuilt = late.update(&campaign, vec![attended(1, "ash"), attended(2, "ash")]);
        let direct = PlayerRecord::new("pat").update(&campaign, (1..=4).map(|m| attended(m, "ash")).collect());
        assert_eq!(rebuilt.xp, direct.xp);
        assert_eq!(rebuilt.characters, direct.characters);
        assert_eq!(rebuilt.awards.len(), 4);
        assert!(rebuilt.awards.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn needs_character() {
        let mut award = AwardRecord::new(date(2024, 1, 1));
        award.event_xp = 8;
        assert!(!award.needs_character());
        award.event_cp = 1;
        assert!(award.needs_character());
        award.character = Some("ash".into());
        assert!(!award.needs_character());
    }

    #[test]
    fn validation_errors() {
        let mut player = PlayerRecord::new("pat");
        player.awards.push(attended(2, "ash"));
        let err = player.validate().unwrap_err();
        assert!(err.to_string().contains("last_campaign_date"), "{err}");

        player.last_campaign_date = Some(date(2024, 2, 10));
        let err = player.validate().unwrap_err();
        assert!(err.to_string().contains("Character record for ash"), "{err}");

        player.characters.insert("ash".into(), CharacterRecord { id: "ash".into(), ..CharacterRecord::default() });
        player.awards.insert(0, attended(3, "ash"));
        assert!(player.validate().unwrap_err().to_string().contains("sorted"));
    }
}
