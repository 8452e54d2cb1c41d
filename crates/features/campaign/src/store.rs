//! In-memory campaigns, each with its players' award ledgers.

use fxhash::FxHashMap;
use larp_rules::{CampaignRecord, PlayerRecord};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct StoredCampaign {
    pub record: CampaignRecord,
    pub players: BTreeMap<String, PlayerRecord>,
}

#[derive(Debug, Default)]
pub struct CampaignStore {
    campaigns: RwLock<FxHashMap<String, StoredCampaign>>,
}

impl CampaignStore {
    /// Inserts `record` unless a campaign with its name exists.
    pub fn create(&self, record: CampaignRecord) -> bool {
        let mut campaigns = self.campaigns.write();
        if campaigns.contains_key(&record.name) {
            return false;
        }
        campaigns.insert(record.name.clone(), StoredCampaign { record, players: BTreeMap::new() });
        true
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<StoredCampaign> {
        self.campaigns.read().get(name).cloned()
    }

    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut StoredCampaign) -> R) -> Option<R> {
        self.campaigns.write().get_mut(name).map(f)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.campaigns.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let store = CampaignStore::default();
        assert!(store.create(CampaignRecord::new("tempest", 2024)));
        assert!(!store.create(CampaignRecord::new("tempest", 2025)));
        assert!(store.create(CampaignRecord::new("dawn", 2025)));

        assert_eq!(store.names(), vec!["dawn", "tempest"]);
        assert_eq!(store.get("tempest").map(|c| c.record.start_year), Some(2024));
        assert!(store.update("missing", |_| ()).is_none());
    }
}
