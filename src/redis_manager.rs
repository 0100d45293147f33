use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::collaborators::{
    BattleCollaborators, BattleStore, EconomyLedger, IdentityResolver, RosterProvider,
    StatProvider, UnitCatalog,
};
use crate::combat::state::BattleSnapshot;
use crate::errors::CollaboratorError;

pub async fn init_redis_client(redis_url: &str) -> Result<redis::Client, CollaboratorError> {
    let client = redis::Client::open(redis_url)?;

    // Test the connection
    let mut con = client.get_async_connection().await?;
    let _: String = redis::cmd("PING").query_async(&mut con).await?;

    tracing::info!("Successfully connected to Redis at {}", redis_url);
    Ok(client)
}

fn balance_key(user_id: &str) -> String {
    format!("user:{}:balance", user_id)
}

fn shards_key(user_id: &str) -> String {
    format!("user:{}:shards", user_id)
}

fn team_key(user_id: &str) -> String {
    format!("user:{}:team", user_id)
}

fn name_key(user_id: &str) -> String {
    format!("user:{}:name", user_id)
}

fn battle_key(battle_id: &Uuid) -> String {
    format!("battle:{}", battle_id)
}

/// Economy, roster, identity and battle history kept in Redis.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(client: redis::Client) -> Result<Arc<Self>, CollaboratorError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Arc::new(RedisStore { conn }))
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
}

#[async_trait]
impl EconomyLedger for RedisStore {
    async fn get_balance(&self, user_id: &str) -> Result<i64, CollaboratorError> {
        let mut conn = self.conn.clone();
        let balance: Option<i64> = conn.get(balance_key(user_id)).await?;
        Ok(balance.unwrap_or(0))
    }

    async fn adjust_balance(&self, user_id: &str, delta: i64) -> Result<i64, CollaboratorError> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(balance_key(user_id), delta).await?)
    }

    async fn adjust_shards(&self, user_id: &str, delta: i64) -> Result<i64, CollaboratorError> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(shards_key(user_id), delta).await?)
    }
}

#[async_trait]
impl RosterProvider for RedisStore {
    async fn get_team(&self, user_id: &str) -> Result<Vec<String>, CollaboratorError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(team_key(user_id)).await?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl IdentityResolver for RedisStore {
    async fn get_display_name(&self, user_id: &str) -> Result<String, CollaboratorError> {
        let mut conn = self.conn.clone();
        let name: Option<String> = conn.get(name_key(user_id)).await?;
        Ok(name.unwrap_or_else(|| user_id.to_string()))
    }
}

#[async_trait]
impl BattleStore for RedisStore {
    async fn upsert_battle(&self, snapshot: &BattleSnapshot) -> Result<(), CollaboratorError> {
        let json = serde_json::to_string(snapshot)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(battle_key(&snapshot.battle_id), json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(balance_key("42"), "user:42:balance");
        assert_eq!(shards_key("42"), "user:42:shards");
        assert_eq!(team_key("42"), "user:42:team");
        assert_eq!(name_key("42"), "user:42:name");
        let id = Uuid::nil();
        assert_eq!(battle_key(&id), format!("battle:{}", id));
    }
}
