use crate::combat::manager::BattleManager;
use crate::config::Config;
use std::sync::Arc;

// Shared application state
pub struct AppState {
    pub config: Config,
    pub battle_manager: Arc<BattleManager>,
}

impl AppState {
    pub fn new(config: Config, battle_manager: Arc<BattleManager>) -> Arc<Self> {
        Arc::new(AppState {
            config,
            battle_manager,
        })
    }
}
