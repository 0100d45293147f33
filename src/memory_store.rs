use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::collaborators::{
    BattleCollaborators, BattleStore, EconomyLedger, IdentityResolver, RosterProvider,
    StatProvider, UnitCatalog,
};
use crate::combat::state::BattleSnapshot;
use crate::errors::CollaboratorError;

/// In-process economy, roster, identity and battle history.
#[derive(Debug, Default)]
pub struct MemoryStore {
    balances: DashMap<String, i64>,
    shards: DashMap<String, i64>,
    teams: DashMap<String, Vec<String>>,
    names: DashMap<String, String>,
    battles: DashMap<Uuid, BattleSnapshot>,
    fail_writes: AtomicBool,
    fail_economy: AtomicBool,
    balance_adjustments: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryStore::default())
    }

    pub fn collaborators(
        self: &Arc<Self>,
        catalog: Arc<dyn UnitCatalog>,
        enrichment: Option<Arc<dyn StatProvider>>,
    ) -> BattleCollaborators {
        BattleCollaborators {
            economy: self.clone(),
            roster: self.clone(),
            catalog,
            enrichment,
            store: self.clone(),
            identity: self.clone(),
        }
    }

    pub fn set_balance(&self, user_id: &str, balance: i64) {
        self.balances.insert(user_id.to_string(), balance);
    }

    pub fn set_team(&self, user_id: &str, unit_ids: &[&str]) {
        self.teams
            .insert(user_id.to_string(), unit_ids.iter().map(|id| id.to_string()).collect());
    }

    pub fn set_name(&self, user_id: &str, name: &str) {
        self.names.insert(user_id.to_string(), name.to_string());
    }

    pub fn balance(&self, user_id: &str) -> i64 {
        self.balances.get(user_id).map(|b| *b).unwrap_or(0)
    }

    pub fn shards(&self, user_id: &str) -> i64 {
        self.shards.get(user_id).map(|s| *s).unwrap_or(0)
    }

    pub fn battle(&self, battle_id: &Uuid) -> Option<BattleSnapshot> {
        self.battles.get(battle_id).map(|b| b.clone())
    }

    pub fn battle_count(&self) -> usize {
        self.battles.len()
    }

    /// Number of `adjust_balance` calls received so far, failed ones included.
    pub fn balance_adjustments(&self) -> usize {
        self.balance_adjustments.load(Ordering::SeqCst)
    }

    /// Makes every battle write fail, to exercise persistence error paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every balance and shard adjustment fail.
    pub fn set_fail_economy(&self, fail: bool) {
        self.fail_economy.store(fail, Ordering::SeqCst);
    }

    fn check_economy(&self) -> Result<(), CollaboratorError> {
        if self.fail_economy.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("economy is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EconomyLedger for MemoryStore {
    async fn get_balance(&self, user_id: &str) -> Result<i64, CollaboratorError> {
        Ok(self.balance(user_id))
    }

    async fn adjust_balance(&self, user_id: &str, delta: i64) -> Result<i64, CollaboratorError> {
        self.balance_adjustments.fetch_add(1, Ordering::SeqCst);
        self.check_economy()?;
        let mut balance = self.balances.entry(user_id.to_string()).or_insert(0);
        *balance += delta;
        Ok(*balance)
    }

    async fn adjust_shards(&self, user_id: &str, delta: i64) -> Result<i64, CollaboratorError> {
        self.check_economy()?;
        let mut shards = self.shards.entry(user_id.to_string()).or_insert(0);
        *shards += delta;
        Ok(*shards)
    }
}

#[async_trait]
impl RosterProvider for MemoryStore {
    async fn get_team(&self, user_id: &str) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.teams.get(user_id).map(|t| t.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl IdentityResolver for MemoryStore {
    async fn get_display_name(&self, user_id: &str) -> Result<String, CollaboratorError> {
        Ok(self
            .names
            .get(user_id)
            .map(|n| n.clone())
            .unwrap_or_else(|| user_id.to_string()))
    }
}

#[async_trait]
impl BattleStore for MemoryStore {
    async fn upsert_battle(&self, snapshot: &BattleSnapshot) -> Result<(), CollaboratorError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("battle store is read-only".to_string()));
        }
        self.battles.insert(snapshot.battle_id, snapshot.clone());
        Ok(())
    }
}
