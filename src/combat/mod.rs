pub mod state;
pub mod messages;
pub mod manager;
pub mod utils;
pub mod logic;

// Re-export key types from state module
pub use state::{
    BattlePlayer,
    BattlePokemon,
    BattlePvPPhase,
    BattleSide,
    BattleSnapshot,
    PvPBattleEndReason,
    PvPBattleState,
    StatusCondition,
};
pub use manager::BattleManager;
