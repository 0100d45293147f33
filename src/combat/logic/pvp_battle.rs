use rand::Rng;
use tracing::info;

use crate::combat::state::{
    BattlePvPPhase, BattleSide, PvPBattleEndReason, PvPBattleState,
};
use crate::errors::ActionRejection;

use super::battle_calculations::{self, MoveOutcome};

/// Result of a run request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Recorded; the other participant still has to agree.
    AwaitingOpponent,
    BattleEnded,
}

impl PvPBattleState {
    /// Sends out each side's first living Pokémon and decides who moves first.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ActionRejection> {
        if self.battle_phase != BattlePvPPhase::Pending {
            return Err(ActionRejection::BattleNotActive);
        }
        let (Some(first1), Some(first2)) =
            (self.player1.first_living_index(), self.player2.first_living_index())
        else {
            return Err(ActionRejection::EmptyTeam);
        };

        self.player1.active_pokemon_index = first1;
        self.player2.active_pokemon_index = first2;
        self.battle_phase = BattlePvPPhase::Active;
        self.turn_number = 1;

        self.battle_log.push(format!(
            "Battle started! {} vs {}",
            self.player1.name, self.player2.name
        ));
        for side in [BattleSide::Player1, BattleSide::Player2] {
            let player = self.player(side);
            let line = format!("{} sends out {}!", player.name, player.active_pokemon().name);
            self.battle_log.push(line);
        }
        self.decide_turn_owner(rng);

        info!(
            "PvP battle {} started between {} and {}",
            self.battle_id, self.player1.player_id, self.player2.player_id
        );
        Ok(())
    }

    /// Faster active Pokémon moves first; ties are a coin flip.
    pub fn decide_turn_owner<R: Rng + ?Sized>(&mut self, rng: &mut R) -> BattleSide {
        let speed1 = self.player1.active_pokemon().effective_speed();
        let speed2 = self.player2.active_pokemon().effective_speed();

        let first = if speed1 > speed2 {
            BattleSide::Player1
        } else if speed2 > speed1 {
            BattleSide::Player2
        } else if rng.gen_bool(0.5) {
            BattleSide::Player1
        } else {
            BattleSide::Player2
        };

        let owner = self.player(first);
        let owner_id = owner.player_id.clone();
        let line = format!("{}'s {} moves first.", owner.name, owner.active_pokemon().name);
        self.current_turn = Some(owner_id);
        self.battle_log.push(line);
        first
    }

    pub fn is_finished(&self) -> bool {
        self.battle_phase == BattlePvPPhase::Finished
    }

    fn participant_side(&self, actor: &str) -> Result<BattleSide, ActionRejection> {
        self.side_of(actor).ok_or(ActionRejection::NotParticipant)
    }

    fn require_turn_owner(&self, actor: &str) -> Result<BattleSide, ActionRejection> {
        let side = self.participant_side(actor)?;
        if self.battle_phase != BattlePvPPhase::Active {
            return Err(ActionRejection::BattleNotActive);
        }
        if self.current_turn.as_deref() != Some(actor) {
            return Err(ActionRejection::NotYourTurn);
        }
        Ok(side)
    }

    /// The turn owner's active Pokémon uses move `move_index` on the opposing active Pokémon.
    pub fn use_move<R: Rng + ?Sized>(
        &mut self,
        actor: &str,
        move_index: usize,
        rng: &mut R,
    ) -> Result<MoveOutcome, ActionRejection> {
        let side = self.require_turn_owner(actor)?;

        let (own, opponent) = self.players_mut(side);
        let move_data = own
            .active_pokemon()
            .moves
            .get(move_index)
            .cloned()
            .ok_or(ActionRejection::InvalidMoveIndex { index: move_index })?;

        let outcome = battle_calculations::use_move(
            own.active_pokemon_mut(),
            &move_data,
            opponent.active_pokemon_mut(),
            rng,
        );
        let opponent_id = opponent.player_id.clone();
        let opponent_name = opponent.name.clone();
        let opponent_has_living = opponent.has_living_pokemon();
        if outcome.defender_fainted && opponent_has_living {
            opponent.must_switch = true;
        }

        self.battle_log.extend(outcome.messages.iter().cloned());

        if outcome.defender_fainted {
            if opponent_has_living {
                self.battle_phase = BattlePvPPhase::WaitingForSwitch;
                self.switching_player = Some(opponent_id.clone());
                self.forced_switch = true;
                self.current_turn = Some(opponent_id);
                self.battle_log
                    .push(format!("{} must choose their next Pokémon.", opponent_name));
            } else {
                self.finish(Some(actor.to_string()), PvPBattleEndReason::AllPokemonFainted);
            }
        } else {
            self.current_turn = Some(opponent_id);
            self.turn_number += 1;
        }

        Ok(outcome)
    }

    /// Voluntary switch: the turn owner opens the team menu instead of attacking.
    pub fn open_switch_menu(&mut self, actor: &str) -> Result<(), ActionRejection> {
        let side = self.require_turn_owner(actor)?;
        if !self.player(side).has_bench() {
            return Err(ActionRejection::SwitchNotAllowed);
        }
        self.battle_phase = BattlePvPPhase::WaitingForSwitch;
        self.switching_player = Some(actor.to_string());
        self.forced_switch = false;
        Ok(())
    }

    /// Backs out of a voluntary switch. Forced switches cannot be closed.
    pub fn close_switch_menu(&mut self, actor: &str) -> Result<(), ActionRejection> {
        self.participant_side(actor)?;
        if self.battle_phase != BattlePvPPhase::WaitingForSwitch
            || self.switching_player.as_deref() != Some(actor)
            || self.forced_switch
        {
            return Err(ActionRejection::SwitchNotAllowed);
        }
        self.battle_phase = BattlePvPPhase::Active;
        self.switching_player = None;
        Ok(())
    }

    /// Sends out `team_index` for the switching player and recomputes turn order.
    pub fn switch_pokemon<R: Rng + ?Sized>(
        &mut self,
        actor: &str,
        team_index: usize,
        rng: &mut R,
    ) -> Result<(), ActionRejection> {
        let side = self.participant_side(actor)?;
        if self.battle_phase != BattlePvPPhase::WaitingForSwitch
            || self.switching_player.as_deref() != Some(actor)
        {
            return Err(ActionRejection::SwitchNotAllowed);
        }

        let forced = self.forced_switch;
        let player = self.player_mut(side);
        let valid_target = team_index != player.active_pokemon_index
            && player.team.get(team_index).is_some_and(|pokemon| pokemon.is_alive());
        if !valid_target {
            return Err(ActionRejection::InvalidSwitchTarget { index: team_index });
        }

        let withdrawn = player.active_pokemon().name.clone();
        player.active_pokemon_index = team_index;
        player.must_switch = false;
        let line = if forced {
            format!("{} sent out {}!", player.name, player.active_pokemon().name)
        } else {
            format!(
                "{} withdrew {} and sent out {}!",
                player.name,
                withdrawn,
                player.active_pokemon().name
            )
        };
        self.battle_log.push(line);

        self.battle_phase = BattlePvPPhase::Active;
        self.switching_player = None;
        self.forced_switch = false;
        self.decide_turn_owner(rng);
        Ok(())
    }

    /// Records a forfeit vote. The battle ends once both participants have asked.
    pub fn request_run(&mut self, actor: &str) -> Result<RunOutcome, ActionRejection> {
        self.participant_side(actor)?;
        if matches!(self.battle_phase, BattlePvPPhase::Pending | BattlePvPPhase::Finished) {
            return Err(ActionRejection::BattleNotActive);
        }
        if self.run_requests.contains(actor) {
            return Err(ActionRejection::AlreadyRequestedRun);
        }

        self.run_requests.insert(actor.to_string());
        let name = self.get_player_by_id(actor).map(|p| p.name.clone()).unwrap_or_default();

        if self.is_participant_vote_complete() {
            self.battle_log.push(format!("{} agreed to end the battle.", name));
            self.finish(None, PvPBattleEndReason::MutualRun);
            Ok(RunOutcome::BattleEnded)
        } else {
            self.battle_log.push(format!(
                "{} wants to end the battle. Waiting for the opponent to agree.",
                name
            ));
            Ok(RunOutcome::AwaitingOpponent)
        }
    }

    fn is_participant_vote_complete(&self) -> bool {
        self.run_requests.contains(&self.player1.player_id)
            && self.run_requests.contains(&self.player2.player_id)
    }

    pub fn finish(&mut self, winner: Option<String>, reason: PvPBattleEndReason) {
        self.battle_phase = BattlePvPPhase::Finished;
        self.current_turn = None;
        self.switching_player = None;
        self.forced_switch = false;

        let line = match (&reason, winner.as_deref().and_then(|id| self.get_player_by_id(id))) {
            (PvPBattleEndReason::AllPokemonFainted, Some(player)) => {
                format!("{} won the battle!", player.name)
            }
            _ => "The battle ended with no winner.".to_string(),
        };
        self.battle_log.push(line);

        info!(
            "PvP battle {} finished: {:?}, winner {:?}",
            self.battle_id, reason, winner
        );
        self.winner = winner;
        self.end_reason = Some(reason);
    }
}
