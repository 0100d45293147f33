use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{ActionRejection, ChallengeRejection};

use super::state::{
    BattlePlayer, BattlePokemon, BattlePvPPhase, PvPBattleEndReason, PvPBattleState,
    StatusCondition,
};

const HP_BAR_WIDTH: usize = 10;

/// A button the presentation layer should offer to the player whose input is awaited.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BattleActionButton {
    UseMove { move_index: usize, label: String },
    OpenSwitchMenu,
    CloseSwitchMenu,
    SwitchTo { team_index: usize, label: String },
    Run,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PokemonSummary {
    pub name: String,
    pub types: Vec<String>,
    pub current_hp: u32,
    pub max_hp: u32,
    pub statuses: Vec<StatusCondition>,
    pub is_fainted: bool,
    pub image: Option<String>,
}

impl PokemonSummary {
    fn from_pokemon(pokemon: &BattlePokemon) -> Self {
        PokemonSummary {
            name: pokemon.name.clone(),
            types: pokemon.pokemon_types.iter().map(|t| t.to_string()).collect(),
            current_hp: pokemon.current_hp,
            max_hp: pokemon.max_hp,
            statuses: pokemon.statuses.clone(),
            is_fainted: pokemon.is_fainted,
            image: pokemon.image.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SideView {
    pub player_id: String,
    pub name: String,
    pub active: PokemonSummary,
    pub remaining: usize,
    pub team_size: usize,
}

impl SideView {
    fn from_player(player: &BattlePlayer) -> Self {
        SideView {
            player_id: player.player_id.clone(),
            name: player.name.clone(),
            active: PokemonSummary::from_pokemon(player.active_pokemon()),
            remaining: player.team.iter().filter(|p| p.is_alive()).count(),
            team_size: player.team.len(),
        }
    }
}

/// Everything needed to draw the battle message: state, rendered text and the available buttons.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BattleView {
    pub battle_id: Uuid,
    pub chat_id: String,
    pub status: BattlePvPPhase,
    pub turn_number: u32,
    pub current_turn: Option<String>,
    pub switching_player: Option<String>,
    pub forced_switch: bool,
    pub player1: SideView,
    pub player2: SideView,
    pub winner: Option<String>,
    pub end_reason: Option<PvPBattleEndReason>,
    pub run_requests: Vec<String>,
    pub ui_message_id: Option<String>,
    pub text: String,
    /// Whose buttons `actions` are.
    pub actions_for: Option<String>,
    pub actions: Vec<BattleActionButton>,
}

impl BattleView {
    pub fn from_state(state: &PvPBattleState, log_tail: usize) -> Self {
        let actions_for = state.expected_actor().map(str::to_string);
        let actions = actions_for
            .as_deref()
            .and_then(|actor| state.get_player_by_id(actor))
            .map(|player| available_actions(state, player))
            .unwrap_or_default();

        BattleView {
            battle_id: state.battle_id,
            chat_id: state.chat_id.clone(),
            status: state.battle_phase,
            turn_number: state.turn_number,
            current_turn: state.current_turn.clone(),
            switching_player: state.switching_player.clone(),
            forced_switch: state.forced_switch,
            player1: SideView::from_player(&state.player1),
            player2: SideView::from_player(&state.player2),
            winner: state.winner.clone(),
            end_reason: state.end_reason,
            run_requests: state.run_requests.iter().cloned().collect(),
            ui_message_id: state.ui_message_id.clone(),
            text: render_text(state, log_tail),
            actions_for,
            actions,
        }
    }
}

fn available_actions(state: &PvPBattleState, player: &BattlePlayer) -> Vec<BattleActionButton> {
    match state.battle_phase {
        BattlePvPPhase::Active => {
            let mut actions: Vec<BattleActionButton> = player
                .active_pokemon()
                .moves
                .iter()
                .enumerate()
                .map(|(move_index, m)| BattleActionButton::UseMove {
                    move_index,
                    label: m.name.clone(),
                })
                .collect();
            if player.has_bench() {
                actions.push(BattleActionButton::OpenSwitchMenu);
            }
            actions.push(BattleActionButton::Run);
            actions
        }
        BattlePvPPhase::WaitingForSwitch => {
            let mut actions: Vec<BattleActionButton> = player
                .team
                .iter()
                .enumerate()
                .filter(|(index, p)| *index != player.active_pokemon_index && p.is_alive())
                .map(|(team_index, p)| BattleActionButton::SwitchTo {
                    team_index,
                    label: format!("{} ({}/{})", p.name, p.current_hp, p.max_hp),
                })
                .collect();
            if !state.forced_switch {
                actions.push(BattleActionButton::CloseSwitchMenu);
            }
            actions
        }
        BattlePvPPhase::Pending | BattlePvPPhase::Finished => Vec::new(),
    }
}

pub fn hp_bar(current: u32, max: u32) -> String {
    let max = max.max(1);
    let mut filled = (current.min(max) as usize * HP_BAR_WIDTH) / max as usize;
    if current > 0 && filled == 0 {
        filled = 1;
    }
    format!("{}{}", "█".repeat(filled), "░".repeat(HP_BAR_WIDTH - filled))
}

fn render_side(player: &BattlePlayer) -> String {
    let active = player.active_pokemon();
    let badges: String = active
        .statuses
        .iter()
        .map(|s| format!(" [{}]", s.badge()))
        .collect();
    format!(
        "{}: {}{}\nHP {} {}/{}",
        player.name,
        active.name,
        badges,
        hp_bar(active.current_hp, active.max_hp),
        active.current_hp,
        active.max_hp
    )
}

fn render_text(state: &PvPBattleState, log_tail: usize) -> String {
    let mut lines = vec![
        format!("{} vs {} | Turn {}", state.player1.name, state.player2.name, state.turn_number),
        render_side(&state.player1),
        render_side(&state.player2),
    ];

    let skip = state.battle_log.len().saturating_sub(log_tail);
    let tail: Vec<&str> = state.battle_log[skip..].iter().map(String::as_str).collect();
    if !tail.is_empty() {
        lines.push(tail.join("\n"));
    }

    let name_of = |id: &str| {
        state
            .get_player_by_id(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    };
    let footer = match state.battle_phase {
        BattlePvPPhase::Pending => "Waiting for the battle to start.".to_string(),
        BattlePvPPhase::Active => match state.current_turn.as_deref() {
            Some(id) => format!("{}, choose a move.", name_of(id)),
            None => String::new(),
        },
        BattlePvPPhase::WaitingForSwitch => match state.switching_player.as_deref() {
            Some(id) => format!("{}, choose your next Pokémon.", name_of(id)),
            None => String::new(),
        },
        BattlePvPPhase::Finished => match state.winner.as_deref() {
            Some(id) => format!("Winner: {}", name_of(id)),
            None => "The battle ended with no winner.".to_string(),
        },
    };
    if !footer.is_empty() {
        lines.push(footer);
    }
    lines.join("\n\n")
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PendingChallengeView {
    pub challenge_id: Uuid,
    pub chat_id: String,
    pub challenger_id: String,
    pub challenger_name: String,
    pub target_id: String,
    pub target_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub text: String,
}

/// Token movement after a battle with a winner.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SettlementSummary {
    pub winner_id: String,
    pub loser_id: String,
    pub winner_reward: i64,
    pub loser_penalty: i64,
    pub winner_shards: i64,
    pub winner_balance: Option<i64>,
    pub loser_balance: Option<i64>,
    /// Set when the economy could not be updated.
    pub notice: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum ChallengeOutcome {
    Created(PendingChallengeView),
    Rejected(ChallengeRejection),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum AcceptOutcome {
    Started(BattleView),
    Rejected(ChallengeRejection),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum DeclineOutcome {
    Declined { challenger_id: String, target_id: String },
    NoPendingChallenge,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum ActionOutcome {
    Updated(BattleView),
    Finished {
        view: BattleView,
        settlement: Option<SettlementSummary>,
    },
    /// The action was stale or invalid; nothing changed.
    Ignored {
        reason: ActionRejection,
        notice: String,
    },
}

impl ActionOutcome {
    pub fn ignored(reason: ActionRejection) -> Self {
        let notice = reason.to_string();
        ActionOutcome::Ignored { reason, notice }
    }

    pub fn view(&self) -> Option<&BattleView> {
        match self {
            ActionOutcome::Updated(view) | ActionOutcome::Finished { view, .. } => Some(view),
            ActionOutcome::Ignored { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::state::BattlePokemon;
    use crate::monsters::move_manager::MoveData;
    use crate::monsters::PokemonType;
    use crate::stats::CalculatedStats;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn pokemon(name: &str, speed: u32, position: usize) -> BattlePokemon {
        BattlePokemon::new(
            name.to_lowercase(),
            name.to_string(),
            vec![PokemonType::Electric],
            CalculatedStats {
                hp: 200,
                attack: 100,
                defense: 100,
                special_attack: 100,
                special_defense: 100,
                speed,
            },
            vec![
                MoveData::new("Thunder Shock", 40, Some(100), "Electric", Some("special"), ""),
                MoveData::new(
                    "Growl",
                    0,
                    Some(100),
                    "Normal",
                    Some("status"),
                    "Lowers the target's ATK.",
                ),
            ],
            position,
        )
    }

    #[test]
    fn test_hp_bar_bounds() {
        assert_eq!(hp_bar(200, 200), "██████████");
        assert_eq!(hp_bar(0, 200), "░░░░░░░░░░");
        assert_eq!(hp_bar(1, 200).chars().filter(|c| *c == '█').count(), 1);
        assert_eq!(hp_bar(100, 200).chars().filter(|c| *c == '█').count(), 5);
    }

    #[test]
    fn test_turn_owner_gets_move_switch_and_run_buttons() {
        let mut state = PvPBattleState::new(
            "chat",
            BattlePlayer::new(
                "ash",
                "Ash",
                vec![pokemon("Pikachu", 200, 0), pokemon("Raichu", 150, 1)],
            ),
            BattlePlayer::new("gary", "Gary", vec![pokemon("Magnemite", 50, 0)]),
        );
        state.start(&mut SmallRng::seed_from_u64(0)).unwrap();

        let view = BattleView::from_state(&state, 6);
        assert_eq!(view.actions_for.as_deref(), Some("ash"));
        assert_eq!(
            view.actions,
            vec![
                BattleActionButton::UseMove { move_index: 0, label: "Thunder Shock".to_string() },
                BattleActionButton::UseMove { move_index: 1, label: "Growl".to_string() },
                BattleActionButton::OpenSwitchMenu,
                BattleActionButton::Run,
            ]
        );
        assert!(view.text.contains("Ash vs Gary | Turn 1"));
        assert!(view.text.contains("Ash, choose a move."));

        state.open_switch_menu("ash").unwrap();
        let view = BattleView::from_state(&state, 6);
        assert_eq!(
            view.actions,
            vec![
                BattleActionButton::SwitchTo {
                    team_index: 1,
                    label: "Raichu (200/200)".to_string(),
                },
                BattleActionButton::CloseSwitchMenu,
            ]
        );
    }

    #[test]
    fn test_log_tail_is_limited() {
        let mut state = PvPBattleState::new(
            "chat",
            BattlePlayer::new("ash", "Ash", vec![pokemon("Pikachu", 200, 0)]),
            BattlePlayer::new("gary", "Gary", vec![pokemon("Magnemite", 50, 0)]),
        );
        for i in 0..20 {
            state.battle_log.push(format!("line {}", i));
        }
        let view = BattleView::from_state(&state, 3);
        assert!(view.text.contains("line 19"));
        assert!(view.text.contains("line 17"));
        assert!(!view.text.contains("line 16"));
        assert!(view.actions.is_empty());
    }
}
