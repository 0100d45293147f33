use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::combat::state::BattleSnapshot;
use crate::errors::CollaboratorError;
use crate::monsters::move_manager::MoveData;
use crate::monsters::UnitDetails;
use crate::stats::CalculatedStats;

/// Token and shard balances owned by the persistence layer.
#[async_trait]
pub trait EconomyLedger: Send + Sync {
    async fn get_balance(&self, user_id: &str) -> Result<i64, CollaboratorError>;

    /// Applies `delta` and returns the new balance.
    async fn adjust_balance(&self, user_id: &str, delta: i64) -> Result<i64, CollaboratorError>;

    async fn adjust_shards(&self, user_id: &str, delta: i64) -> Result<i64, CollaboratorError>;
}

/// Ordered unit ids making up a user's battle team.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn get_team(&self, user_id: &str) -> Result<Vec<String>, CollaboratorError>;
}

#[async_trait]
pub trait UnitCatalog: Send + Sync {
    /// Ids with no catalog entry are simply absent from the result.
    async fn get_unit_details(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, UnitDetails>, CollaboratorError>;
}

/// Optional per-species stats and moves. `None` / empty means "use the rarity fallback".
#[async_trait]
pub trait StatProvider: Send + Sync {
    async fn get_stats(&self, name: &str) -> Result<Option<CalculatedStats>, CollaboratorError>;

    async fn get_moves(&self, name: &str) -> Result<Vec<MoveData>, CollaboratorError>;
}

#[async_trait]
pub trait BattleStore: Send + Sync {
    /// Idempotent by battle id.
    async fn upsert_battle(&self, snapshot: &BattleSnapshot) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn get_display_name(&self, user_id: &str) -> Result<String, CollaboratorError>;
}

/// Everything the battle manager talks to outside of its own memory.
#[derive(Clone)]
pub struct BattleCollaborators {
    pub economy: Arc<dyn EconomyLedger>,
    pub roster: Arc<dyn RosterProvider>,
    pub catalog: Arc<dyn UnitCatalog>,
    pub enrichment: Option<Arc<dyn StatProvider>>,
    pub store: Arc<dyn BattleStore>,
    pub identity: Arc<dyn IdentityResolver>,
}
