use crate::CampaignsInner;
use crate::error::{CampaignError, CampaignErrorExt};
use crate::models::{AddEvents, AwardBatch, CreateCampaign, ValuesQuery};
use crate::store::CampaignStore;
use chrono::Datelike;
use larp_kernel::prelude::validate_id;
use larp_rules::{CampaignRecord, CampaignValues, PlayerRecord};
use tracing::{info, instrument};

impl CampaignsInner {
    #[must_use]
    pub const fn store(&self) -> &CampaignStore {
        &self.store
    }

    #[instrument(skip(self))]
    pub fn create(&self, name: &str, request: CreateCampaign) -> Result<CampaignRecord, CampaignError> {
        let name = validate_id(name).context("campaign")?;
        if request.bonus_cp_per_season.is_some_and(|b| b < 0) {
            return Err(CampaignError::BadRequest {
                message: "bonus_cp_per_season must not be negative".into(),
                context: None,
            });
        }
        let mut record = CampaignRecord::new(name, request.start_year);
        if let Some(bonus) = request.bonus_cp_per_season {
            record.bonus_cp_per_season = bonus;
        }
        if !self.store.create(record.clone()) {
            return Err(CampaignError::AlreadyExists { name: name.to_owned() });
        }
        info!(campaign = name, start_year = record.start_year, "Campaign created");
        Ok(record)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.store.names()
    }

    pub fn campaign(&self, name: &str) -> Result<CampaignRecord, CampaignError> {
        self.store.get(name).map(|c| c.record).ok_or_else(|| not_found(name))
    }

    /// Adds events, rebuilds the value table and lifts every player to the new floors.
    #[instrument(skip(self, request), fields(events = request.events.len()))]
    pub fn add_events(&self, name: &str, request: AddEvents) -> Result<CampaignRecord, CampaignError> {
        self.store
            .update(name, |stored| {
                let mut record = stored.record.clone();
                if let Some(event) = request.events.iter().find(|e| e.date.year() < record.start_year) {
                    return Err(CampaignError::BadRequest {
                        message: format!("Event on {} predates the campaign", event.date).into(),
                        context: Some(event.chapter.clone().into()),
                    });
                }
                record.add_events(request.events);
                record.validate().context(name.to_owned())?;
                for player in stored.players.values_mut() {
                    *player = player.update(&record, Vec::new());
                }
                info!(
                    campaign = name,
                    max_xp = record.latest_values().max_xp,
                    players = stored.players.len(),
                    "Events recorded"
                );
                stored.record.clone_from(&record);
                Ok(record)
            })
            .ok_or_else(|| not_found(name))?
    }

    pub fn values(&self, name: &str, query: ValuesQuery) -> Result<CampaignValues, CampaignError> {
        let record = self.campaign(name)?;
        Ok(query.date.map_or_else(|| record.latest_values(), |date| record.historical_values(date)))
    }

    /// Folds `awards` into the player's record, creating it on first use.
    #[instrument(skip(self, request), fields(awards = request.awards.len()))]
    pub fn award(&self, name: &str, user: &str, request: AwardBatch) -> Result<PlayerRecord, CampaignError> {
        let user = user.trim();
        if user.is_empty() {
            return Err(CampaignError::BadRequest { message: "Player id must not be empty".into(), context: None });
        }
        if let Some(award) = request.awards.iter().find(|a| a.needs_character()) {
            return Err(CampaignError::BadRequest {
                message: "Award grants character rewards but names no character".into(),
                context: Some(award.date.to_string().into()),
            });
        }
        self.store
            .update(name, |stored| {
                let current = stored.players.get(user).cloned().unwrap_or_else(|| PlayerRecord::new(user));
                let updated = current.update(&stored.record, request.awards);
                updated.validate().context(format!("{name}/{user}"))?;
                info!(campaign = name, user, xp = updated.xp, characters = updated.characters.len(), "Awards applied");
                stored.players.insert(user.to_owned(), updated.clone());
                Ok(updated)
            })
            .ok_or_else(|| not_found(name))?
    }

    pub fn player(&self, name: &str, user: &str) -> Result<PlayerRecord, CampaignError> {
        let stored = self.store.get(name).ok_or_else(|| not_found(name))?;
        stored.players.get(user).cloned().ok_or_else(|| CampaignError::PlayerNotFound {
            campaign: name.to_owned(),
            user: user.to_owned(),
        })
    }
}

fn not_found(name: &str) -> CampaignError {
    CampaignError::NotFound { name: name.to_owned() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Campaigns;
    use chrono::NaiveDate;
    use larp_rules::{AwardRecord, EventRecord};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create() -> Campaigns {
        let campaigns = Campaigns::default();
        campaigns.create("tempest", CreateCampaign { start_year: 2024, bonus_cp_per_season: None }).unwrap();
        campaigns
    }

    fn events(months: std::ops::RangeInclusive<u32>) -> AddEvents {
        AddEvents { events: months.map(|m| EventRecord::new("north", date(2024, m, 10))).collect() }
    }

    fn attended(m: u32) -> AwardRecord {
        AwardRecord { event_xp: 8, event_cp: 1, character: Some("ash".into()), ..AwardRecord::new(date(2024, m, 10)) }
    }

    #[test]
    fn names_must_be_unique_and_valid() {
        let campaigns = create();
        let again = CreateCampaign { start_year: 2025, bonus_cp_per_season: None };
        assert!(matches!(campaigns.create("tempest", again), Err(CampaignError::AlreadyExists { .. })));

        let bad = CreateCampaign { start_year: 2025, bonus_cp_per_season: None };
        assert_eq!(campaigns.create("../x", bad).unwrap_err().status_code(), 400);
        assert_eq!(campaigns.names(), vec!["tempest"]);
    }

    #[test]
    fn events_raise_the_maxima() {
        let campaigns = create();
        let record = campaigns.add_events("tempest", events(1..=4)).unwrap();
        assert_eq!(record.latest_values().max_xp, 32);
        assert_eq!(record.last_event_date, Some(date(2024, 4, 10)));

        let march = campaigns.values("tempest", ValuesQuery { date: Some(date(2024, 3, 31)) }).unwrap();
        assert_eq!((march.max_xp, march.max_cp), (24, 3));
        let latest = campaigns.values("tempest", ValuesQuery::default()).unwrap();
        assert_eq!(latest.max_bonus_cp, 3);

        let early = AddEvents { events: vec![EventRecord::new("north", date(2023, 12, 1))] };
        assert_eq!(campaigns.add_events("tempest", early).unwrap_err().status_code(), 400);
        assert!(matches!(campaigns.add_events("other", events(1..=1)), Err(CampaignError::NotFound { .. })));
    }

    #[test]
    fn awards_build_the_ledger() {
        let campaigns = create();
        campaigns.add_events("tempest", events(1..=4)).unwrap();

        let first = campaigns.award("tempest", "pat", AwardBatch { awards: vec![attended(1), attended(2)] }).unwrap();
        assert_eq!(first.user.as_deref(), Some("pat"));
        let player =
            campaigns.award("tempest", "pat", AwardBatch { awards: vec![attended(3), attended(4)] }).unwrap();
        assert_eq!(player.xp, 32);
        assert_eq!(player.characters["ash"].event_cp, 4);
        assert_eq!(campaigns.player("tempest", "pat").unwrap(), player);
        assert!(matches!(campaigns.player("tempest", "sam"), Err(CampaignError::PlayerNotFound { .. })));
    }

    #[test]
    fn new_events_lift_existing_players_to_the_floors() {
        let campaigns = create();
        campaigns.add_events("tempest", events(1..=1)).unwrap();
        let player = campaigns.award("tempest", "pat", AwardBatch { awards: vec![attended(1)] }).unwrap();
        assert_eq!(player.xp, 8);

        let record = campaigns.add_events("tempest", events(2..=8)).unwrap();
        let floor = record.latest_values().max_xp / 2;
        assert_eq!(floor, 32);

        let player = campaigns.player("tempest", "pat").unwrap();
        assert_eq!(player.xp, floor);
        assert_eq!(player, player.update(&record, Vec::new()));
    }

    #[test]
    fn character_awards_need_a_character() {
        let campaigns = create();
        campaigns.add_events("tempest", events(1..=1)).unwrap();
        let award = AwardRecord { event_cp: 1, ..AwardRecord::new(date(2024, 1, 10)) };
        let err = campaigns.award("tempest", "pat", AwardBatch { awards: vec![award] }).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(campaigns.store().get("tempest").unwrap().players.is_empty());
    }

    #[test]
    fn awards_before_any_event_fail_validation() {
        let campaigns = create();
        let err = campaigns.award("tempest", "pat", AwardBatch { awards: vec![attended(1)] }).unwrap_err();
        assert!(matches!(err, CampaignError::Rules { .. }), "{err}");
        assert_eq!(err.status_code(), 409);
    }
}
