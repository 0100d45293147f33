pub mod battle_calculations;
pub mod pvp_battle;
pub mod type_chart;

pub use battle_calculations::{calculate_damage, DamageRolls, MoveOutcome};
pub use pvp_battle::RunOutcome;
