use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monsters::move_manager::MoveData;
use crate::monsters::PokemonType;
use crate::stats::{BattleStatModifiers, CalculatedStats, StatName};

/// Every combatant battles at this level.
pub const BATTLE_LEVEL: u32 = 100;
pub const MAX_MOVES: usize = 4;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum StatusCondition {
    Burn, Paralysis, Freeze,
}

impl StatusCondition {
    pub fn label(&self) -> &'static str {
        match self {
            StatusCondition::Burn => "burned",
            StatusCondition::Paralysis => "paralyzed",
            StatusCondition::Freeze => "frozen",
        }
    }

    pub fn badge(&self) -> &'static str {
        match self {
            StatusCondition::Burn => "BRN",
            StatusCondition::Paralysis => "PAR",
            StatusCondition::Freeze => "FRZ",
        }
    }
}

/// Phases of a PvP battle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum BattlePvPPhase {
    Pending,          // Created, teams loaded, not started
    Active,           // Waiting for the turn owner to act
    WaitingForSwitch, // One player must (or chose to) pick a new Pokémon
    Finished,         // Battle has ended; no further changes
}

/// Reason the PvP battle ended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PvPBattleEndReason {
    AllPokemonFainted,
    MutualRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleSide {
    Player1,
    Player2,
}

impl BattleSide {
    pub fn opponent(self) -> BattleSide {
        match self {
            BattleSide::Player1 => BattleSide::Player2,
            BattleSide::Player2 => BattleSide::Player1,
        }
    }
}

/// Represents a Pokémon in battle with all its dynamic state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BattlePokemon {
    // Static Info (copied/derived at battle start)
    pub template_id: String,
    pub name: String,
    pub region: String,
    pub rarity: String,
    pub image: Option<String>,
    pub level: u32,
    pub pokemon_types: Vec<PokemonType>,
    pub moves: Vec<MoveData>,
    pub calculated_stats: CalculatedStats,

    // Dynamic State
    pub current_hp: u32,
    pub max_hp: u32,
    pub statuses: Vec<StatusCondition>,
    pub stat_modifiers: BattleStatModifiers,
    pub is_fainted: bool,
    pub position: usize,
}

impl BattlePokemon {
    pub fn new(
        template_id: String,
        name: String,
        pokemon_types: Vec<PokemonType>,
        calculated_stats: CalculatedStats,
        mut moves: Vec<MoveData>,
        position: usize,
    ) -> Self {
        moves.truncate(MAX_MOVES);
        let max_hp = calculated_stats.hp.max(1);
        BattlePokemon {
            template_id,
            name,
            region: String::new(),
            rarity: String::new(),
            image: None,
            level: BATTLE_LEVEL,
            pokemon_types,
            moves,
            calculated_stats,
            current_hp: max_hp,
            max_hp,
            statuses: Vec::new(),
            stat_modifiers: BattleStatModifiers::default(),
            is_fainted: false,
            position,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.is_fainted
    }

    pub fn has_status(&self, status: StatusCondition) -> bool {
        self.statuses.contains(&status)
    }

    /// Returns false if the status was already present.
    pub fn add_status(&mut self, status: StatusCondition) -> bool {
        if self.has_status(status) {
            return false;
        }
        self.statuses.push(status);
        true
    }

    pub fn has_type(&self, pokemon_type: PokemonType) -> bool {
        self.pokemon_types.contains(&pokemon_type)
    }

    /// Only way HP goes down; keeps `current_hp == 0` and `is_fainted` in lockstep.
    pub fn apply_damage(&mut self, damage: u32) -> u32 {
        let dealt = damage.min(self.current_hp);
        self.current_hp -= dealt;
        if self.current_hp == 0 {
            self.is_fainted = true;
        }
        dealt
    }

    pub fn adjust_stage(&mut self, stat: StatName, delta: i8) -> (i8, bool) {
        self.stat_modifiers.adjust(stat, delta)
    }

    /// Speed after stages and paralysis, used for turn order.
    pub fn effective_speed(&self) -> f32 {
        let speed = self
            .stat_modifiers
            .apply(StatName::Speed, self.calculated_stats.speed as f32);
        if self.has_status(StatusCondition::Paralysis) {
            (speed / 2.0).floor()
        } else {
            speed
        }
    }
}

/// One side of the battle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BattlePlayer {
    pub player_id: String,
    pub name: String,
    pub team: Vec<BattlePokemon>,
    pub active_pokemon_index: usize,
    pub must_switch: bool, // Active Pokémon fainted and needs replacing
}

impl BattlePlayer {
    pub fn new(player_id: &str, name: &str, team: Vec<BattlePokemon>) -> Self {
        BattlePlayer {
            player_id: player_id.to_string(),
            name: name.to_string(),
            team,
            active_pokemon_index: 0,
            must_switch: false,
        }
    }

    pub fn active_pokemon(&self) -> &BattlePokemon {
        &self.team[self.active_pokemon_index]
    }

    pub fn active_pokemon_mut(&mut self) -> &mut BattlePokemon {
        &mut self.team[self.active_pokemon_index]
    }

    pub fn has_living_pokemon(&self) -> bool {
        self.team.iter().any(BattlePokemon::is_alive)
    }

    pub fn first_living_index(&self) -> Option<usize> {
        self.team.iter().position(BattlePokemon::is_alive)
    }

    /// Living Pokémon other than the active one.
    pub fn has_bench(&self) -> bool {
        self.team
            .iter()
            .enumerate()
            .any(|(index, pokemon)| index != self.active_pokemon_index && pokemon.is_alive())
    }
}

/// Main Battle State Container for a PvP battle between two players
#[derive(Debug)]
pub struct PvPBattleState {
    pub battle_id: Uuid,
    pub chat_id: String,
    pub player1: BattlePlayer, // challenger
    pub player2: BattlePlayer, // opponent
    pub battle_phase: BattlePvPPhase,
    pub current_turn: Option<String>,
    pub switching_player: Option<String>,
    pub forced_switch: bool,
    pub turn_number: u32,
    pub battle_log: Vec<String>,
    pub run_requests: BTreeSet<String>,
    pub ui_message_id: Option<String>,
    pub winner: Option<String>,
    pub end_reason: Option<PvPBattleEndReason>,
    pub rewards_settled: bool,
    pub created_at: DateTime<Utc>,
}

/// Persisted form of a battle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BattleSnapshot {
    pub battle_id: Uuid,
    pub chat_id: String,
    pub player1: BattlePlayer,
    pub player2: BattlePlayer,
    pub battle_log: Vec<String>,
    pub turn_number: u32,
    pub status: BattlePvPPhase,
    pub winner: Option<String>,
    pub end_reason: Option<PvPBattleEndReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PvPBattleState {
    /// Create a new PvP battle state
    pub fn new(chat_id: &str, player1: BattlePlayer, player2: BattlePlayer) -> Self {
        PvPBattleState {
            battle_id: Uuid::new_v4(),
            chat_id: chat_id.to_string(),
            player1,
            player2,
            battle_phase: BattlePvPPhase::Pending,
            current_turn: None,
            switching_player: None,
            forced_switch: false,
            turn_number: 0,
            battle_log: Vec::new(),
            run_requests: BTreeSet::new(),
            ui_message_id: None,
            winner: None,
            end_reason: None,
            rewards_settled: false,
            created_at: Utc::now(),
        }
    }

    pub fn side_of(&self, player_id: &str) -> Option<BattleSide> {
        if self.player1.player_id == player_id {
            Some(BattleSide::Player1)
        } else if self.player2.player_id == player_id {
            Some(BattleSide::Player2)
        } else {
            None
        }
    }

    pub fn player(&self, side: BattleSide) -> &BattlePlayer {
        match side {
            BattleSide::Player1 => &self.player1,
            BattleSide::Player2 => &self.player2,
        }
    }

    pub fn player_mut(&mut self, side: BattleSide) -> &mut BattlePlayer {
        match side {
            BattleSide::Player1 => &mut self.player1,
            BattleSide::Player2 => &mut self.player2,
        }
    }

    /// Both sides at once, `side` first.
    pub fn players_mut(&mut self, side: BattleSide) -> (&mut BattlePlayer, &mut BattlePlayer) {
        match side {
            BattleSide::Player1 => (&mut self.player1, &mut self.player2),
            BattleSide::Player2 => (&mut self.player2, &mut self.player1),
        }
    }

    /// Get a reference to a player by ID
    pub fn get_player_by_id(&self, player_id: &str) -> Option<&BattlePlayer> {
        self.side_of(player_id).map(|side| self.player(side))
    }

    /// Get the opponent's ID given a player ID
    pub fn get_opponent_id(&self, player_id: &str) -> Option<&str> {
        self.side_of(player_id)
            .map(|side| self.player(side.opponent()).player_id.as_str())
    }

    pub fn is_participant(&self, player_id: &str) -> bool {
        self.side_of(player_id).is_some()
    }

    /// Whose input the battle is waiting on, if anyone's.
    pub fn expected_actor(&self) -> Option<&str> {
        match self.battle_phase {
            BattlePvPPhase::Active => self.current_turn.as_deref(),
            BattlePvPPhase::WaitingForSwitch => self.switching_player.as_deref(),
            BattlePvPPhase::Pending | BattlePvPPhase::Finished => None,
        }
    }

    pub fn snapshot(&self) -> BattleSnapshot {
        BattleSnapshot {
            battle_id: self.battle_id,
            chat_id: self.chat_id.clone(),
            player1: self.player1.clone(),
            player2: self.player2.clone(),
            battle_log: self.battle_log.clone(),
            turn_number: self.turn_number,
            status: self.battle_phase,
            winner: self.winner.clone(),
            end_reason: self.end_reason,
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }

    /// Rebuilds a battle from its persisted form.
    /// Turn bookkeeping that is not persisted starts empty.
    pub fn from_snapshot(snapshot: BattleSnapshot) -> Self {
        PvPBattleState {
            battle_id: snapshot.battle_id,
            chat_id: snapshot.chat_id,
            player1: snapshot.player1,
            player2: snapshot.player2,
            battle_phase: snapshot.status,
            current_turn: None,
            switching_player: None,
            forced_switch: false,
            turn_number: snapshot.turn_number,
            battle_log: snapshot.battle_log,
            run_requests: BTreeSet::new(),
            ui_message_id: None,
            winner: snapshot.winner,
            end_reason: snapshot.end_reason,
            rewards_settled: snapshot.status == BattlePvPPhase::Finished,
            created_at: snapshot.created_at,
        }
    }
}
