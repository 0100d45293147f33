use crate::collaborators::BattleCollaborators;
use crate::combat::logic::RunOutcome;
use crate::combat::messages::{
    AcceptOutcome, ActionOutcome, BattleView, ChallengeOutcome, DeclineOutcome,
    PendingChallengeView, SettlementSummary,
};
use crate::combat::state::{BattlePlayer, BattlePokemon, PvPBattleEndReason, PvPBattleState};
use crate::combat::utils;
use crate::config::BattleConfig;
use crate::errors::{ActionRejection, ChallengeRejection};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

const RETRY_LATER_NOTICE: &str = "Rewards could not be updated right now, please try again later.";

/// A challenge waiting for the target's answer. Keyed by target id.
#[derive(Debug)]
pub struct PendingChallenge {
    pub challenge_id: Uuid,
    pub chat_id: String,
    pub challenger_id: String,
    pub challenger_name: String,
    pub target_id: String,
    pub target_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    deadline: Instant,
    expiry_task: Option<JoinHandle<()>>,
}

impl PendingChallenge {
    fn view(&self) -> PendingChallengeView {
        PendingChallengeView {
            challenge_id: self.challenge_id,
            chat_id: self.chat_id.clone(),
            challenger_id: self.challenger_id.clone(),
            challenger_name: self.challenger_name.clone(),
            target_id: self.target_id.clone(),
            target_name: self.target_name.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            text: format!(
                "{} challenged {} to a battle! {} has {} seconds to accept.",
                self.challenger_name,
                self.target_name,
                self.target_name,
                (self.expires_at - self.created_at).num_seconds()
            ),
        }
    }

    fn cancel_expiry(&mut self) {
        if let Some(task) = self.expiry_task.take() {
            task.abort();
        }
    }
}

/// Manages pending challenges and active PvP battles
pub struct BattleManager {
    // Maps battle ID to battle state
    active_pvp_battles: DashMap<Uuid, Arc<Mutex<PvPBattleState>>>,
    // Maps player ID to the battle they are in
    player_battles: DashMap<String, Uuid>,
    pending_challenges: Arc<DashMap<String, PendingChallenge>>,
    collaborators: BattleCollaborators,
    settings: BattleConfig,
}

impl BattleManager {
    /// Create a new BattleManager
    pub fn new(collaborators: BattleCollaborators, settings: BattleConfig) -> Self {
        BattleManager {
            active_pvp_battles: DashMap::new(),
            player_battles: DashMap::new(),
            pending_challenges: Arc::new(DashMap::new()),
            collaborators,
            settings,
        }
    }

    pub fn active_battle_count(&self) -> usize {
        self.active_pvp_battles.len()
    }

    pub fn pending_challenge_count(&self) -> usize {
        self.pending_challenges.len()
    }

    async fn display_name(&self, user_id: &str) -> String {
        match self.collaborators.identity.get_display_name(user_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Could not resolve display name for {}: {}", user_id, e);
                user_id.to_string()
            }
        }
    }

    /// Checks that both users can cover the minimum stake.
    async fn check_stakes(&self, user_ids: [&str; 2]) -> Result<(), ChallengeRejection> {
        for user_id in user_ids {
            let balance = self
                .collaborators
                .economy
                .get_balance(user_id)
                .await
                .map_err(|e| {
                    error!("Balance lookup for {} failed: {}", user_id, e);
                    ChallengeRejection::ServiceUnavailable
                })?;
            if balance < self.settings.min_stake {
                return Err(ChallengeRejection::InsufficientStake { user_id: user_id.to_string() });
            }
        }
        Ok(())
    }

    fn check_not_in_battle(
        &self,
        challenger_id: &str,
        target_id: &str,
    ) -> Result<(), ChallengeRejection> {
        if self.player_battles.contains_key(challenger_id) {
            return Err(ChallengeRejection::ChallengerInBattle);
        }
        if self.player_battles.contains_key(target_id) {
            return Err(ChallengeRejection::TargetInBattle);
        }
        Ok(())
    }

    /// Registers a challenge from `challenger_id` to `target_id` with an expiry timer.
    pub async fn create_challenge(
        &self,
        chat_id: &str,
        challenger_id: &str,
        target_id: &str,
    ) -> ChallengeOutcome {
        match self.try_create_challenge(chat_id, challenger_id, target_id).await {
            Ok(view) => {
                info!(
                    "Challenge {} created: {} vs {} in chat {}",
                    view.challenge_id, challenger_id, target_id, chat_id
                );
                ChallengeOutcome::Created(view)
            }
            Err(rejection) => {
                warn!("Challenge from {} to {} rejected: {}", challenger_id, target_id, rejection);
                ChallengeOutcome::Rejected(rejection)
            }
        }
    }

    async fn try_create_challenge(
        &self,
        chat_id: &str,
        challenger_id: &str,
        target_id: &str,
    ) -> Result<PendingChallengeView, ChallengeRejection> {
        if challenger_id == target_id {
            return Err(ChallengeRejection::SelfChallenge);
        }
        if self.pending_challenges.contains_key(target_id) {
            return Err(ChallengeRejection::TargetAlreadyChallenged);
        }
        self.check_not_in_battle(challenger_id, target_id)?;
        self.check_stakes([challenger_id, target_id]).await?;

        let challenger_name = self.display_name(challenger_id).await;
        let target_name = self.display_name(target_id).await;

        let timeout = Duration::from_secs(self.settings.challenge_timeout_sec);
        let deadline = Instant::now() + timeout;
        let created_at = Utc::now();
        let expires_at = created_at
            + chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::zero());

        match self.pending_challenges.entry(target_id.to_string()) {
            Entry::Occupied(_) => Err(ChallengeRejection::TargetAlreadyChallenged),
            Entry::Vacant(slot) => {
                let challenge_id = Uuid::new_v4();
                let expiry_task = self.spawn_expiry(target_id.to_string(), challenge_id, deadline);
                let challenge = PendingChallenge {
                    challenge_id,
                    chat_id: chat_id.to_string(),
                    challenger_id: challenger_id.to_string(),
                    challenger_name,
                    target_id: target_id.to_string(),
                    target_name,
                    created_at,
                    expires_at,
                    deadline,
                    expiry_task: Some(expiry_task),
                };
                let view = challenge.view();
                slot.insert(challenge);
                Ok(view)
            }
        }
    }

    /// Removes the challenge at `deadline`, unless it was answered or replaced.
    fn spawn_expiry(
        &self,
        target_id: String,
        challenge_id: Uuid,
        deadline: Instant,
    ) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending_challenges);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let expired = pending.remove_if(&target_id, |_, challenge| {
                challenge.challenge_id == challenge_id
            });
            if expired.is_some() {
                info!("Challenge {} for {} expired", challenge_id, target_id);
            }
        })
    }

    fn take_challenge(&self, target_id: &str) -> Option<PendingChallenge> {
        let (_, mut challenge) = self.pending_challenges.remove(target_id)?;
        challenge.cancel_expiry();
        Some(challenge)
    }

    /// Puts back a challenge whose battle could not start, keeping its original deadline.
    fn restore_challenge(&self, mut challenge: PendingChallenge) {
        if challenge.deadline <= Instant::now() {
            info!("Challenge {} for {} expired", challenge.challenge_id, challenge.target_id);
            return;
        }
        match self.pending_challenges.entry(challenge.target_id.clone()) {
            Entry::Occupied(_) => {
                warn!(
                    "Challenge {} was replaced while starting, dropping it",
                    challenge.challenge_id
                );
            }
            Entry::Vacant(slot) => {
                challenge.expiry_task = Some(self.spawn_expiry(
                    challenge.target_id.clone(),
                    challenge.challenge_id,
                    challenge.deadline,
                ));
                slot.insert(challenge);
            }
        }
    }

    /// Drops the pending challenge for `target_id`, if any.
    pub fn decline_challenge(&self, target_id: &str) -> DeclineOutcome {
        match self.take_challenge(target_id) {
            Some(challenge) => {
                info!("Challenge {} declined by {}", challenge.challenge_id, target_id);
                DeclineOutcome::Declined {
                    challenger_id: challenge.challenger_id,
                    target_id: challenge.target_id,
                }
            }
            None => DeclineOutcome::NoPendingChallenge,
        }
    }

    /// Accepts the challenge addressed to `target_id` and starts the battle.
    /// A rejected accept leaves the challenge pending with its original deadline.
    pub async fn accept_challenge(&self, target_id: &str) -> AcceptOutcome {
        let Some((challenge_id, challenger_id)) = self
            .pending_challenges
            .get(target_id)
            .map(|challenge| (challenge.challenge_id, challenge.challenger_id.clone()))
        else {
            warn!("{} tried to accept a challenge that does not exist", target_id);
            return AcceptOutcome::Rejected(ChallengeRejection::NoPendingChallenge);
        };

        let checked = match self.check_not_in_battle(&challenger_id, target_id) {
            Ok(()) => self.check_stakes([challenger_id.as_str(), target_id]).await,
            Err(rejection) => Err(rejection),
        };
        if let Err(rejection) = checked {
            warn!("Challenge {} cannot be accepted yet: {}", challenge_id, rejection);
            return AcceptOutcome::Rejected(rejection);
        }

        // The challenge may have expired or been declined during the balance lookup
        let taken = self
            .pending_challenges
            .remove_if(target_id, |_, challenge| challenge.challenge_id == challenge_id);
        let Some((_, mut challenge)) = taken else {
            warn!("Challenge {} went away before it could be accepted", challenge_id);
            return AcceptOutcome::Rejected(ChallengeRejection::NoPendingChallenge);
        };
        challenge.cancel_expiry();

        match self.start_battle(&challenge).await {
            Ok(view) => AcceptOutcome::Started(view),
            Err(rejection) => {
                warn!("Challenge {} could not start: {}", challenge.challenge_id, rejection);
                self.restore_challenge(challenge);
                AcceptOutcome::Rejected(rejection)
            }
        }
    }

    /// Marks both players as in battle, or neither.
    fn reserve_players(
        &self,
        challenger_id: &str,
        target_id: &str,
        battle_id: Uuid,
    ) -> Result<(), ChallengeRejection> {
        match self.player_battles.entry(challenger_id.to_string()) {
            Entry::Occupied(_) => return Err(ChallengeRejection::ChallengerInBattle),
            Entry::Vacant(slot) => {
                slot.insert(battle_id);
            }
        }
        match self.player_battles.entry(target_id.to_string()) {
            Entry::Occupied(_) => {
                self.player_battles.remove(challenger_id);
                Err(ChallengeRejection::TargetInBattle)
            }
            Entry::Vacant(slot) => {
                slot.insert(battle_id);
                Ok(())
            }
        }
    }

    fn release_players(&self, battle_id: Uuid, player_ids: [&str; 2]) {
        for player_id in player_ids {
            self.player_battles.remove_if(player_id, |_, id| *id == battle_id);
        }
    }

    async fn start_battle(
        &self,
        challenge: &PendingChallenge,
    ) -> Result<BattleView, ChallengeRejection> {
        let challenger_id = challenge.challenger_id.as_str();
        let target_id = challenge.target_id.as_str();

        let mut state = PvPBattleState::new(
            &challenge.chat_id,
            BattlePlayer::new(challenger_id, &challenge.challenger_name, Vec::new()),
            BattlePlayer::new(target_id, &challenge.target_name, Vec::new()),
        );
        let battle_id = state.battle_id;
        self.reserve_players(challenger_id, target_id, battle_id)?;

        let teams = match self.load_team(challenger_id).await {
            Ok(team1) => self.load_team(target_id).await.map(|team2| (team1, team2)),
            Err(rejection) => Err(rejection),
        };
        match teams {
            Ok((team1, team2)) => {
                state.player1.team = team1;
                state.player2.team = team2;
            }
            Err(rejection) => {
                self.release_players(battle_id, [challenger_id, target_id]);
                return Err(rejection);
            }
        }

        if let Err(e) = state.start(&mut SmallRng::from_entropy()) {
            error!("Battle {} failed to start: {}", battle_id, e);
            self.release_players(battle_id, [challenger_id, target_id]);
            return Err(ChallengeRejection::ServiceUnavailable);
        }

        if let Err(e) = self.collaborators.store.upsert_battle(&state.snapshot()).await {
            error!("Failed to persist initial snapshot of battle {}: {}", battle_id, e);
        }

        let view = BattleView::from_state(&state, self.settings.log_tail);
        self.active_pvp_battles.insert(battle_id, Arc::new(Mutex::new(state)));
        info!(
            "PvP battle {} registered from challenge {}",
            battle_id, challenge.challenge_id
        );
        Ok(view)
    }

    async fn load_team(&self, user_id: &str) -> Result<Vec<BattlePokemon>, ChallengeRejection> {
        let max_team_size = self.settings.max_team_size;
        let team = utils::load_battle_team(user_id, &self.collaborators, max_team_size)
            .await
            .map_err(|e| {
                error!("Failed to load team for {}: {}", user_id, e);
                ChallengeRejection::ServiceUnavailable
            })?;
        if team.is_empty() {
            return Err(ChallengeRejection::EmptyTeam { user_id: user_id.to_string() });
        }
        Ok(team)
    }

    /// Runs `action` on a battle under its lock and settles the battle if the action ended it.
    async fn with_battle<F>(&self, battle_id: Uuid, actor: &str, action: F) -> ActionOutcome
    where
        F: FnOnce(&mut PvPBattleState, &mut SmallRng) -> Result<(), ActionRejection>,
    {
        let battle = self.active_pvp_battles.get(&battle_id).map(|b| Arc::clone(b.value()));
        let Some(battle) = battle else {
            warn!("Ignoring action from {} on unknown battle {}", actor, battle_id);
            return ActionOutcome::ignored(ActionRejection::SessionNotFound);
        };

        let mut state = battle.lock().await;
        if state.is_finished() {
            warn!("Ignoring action from {} on finished battle {}", actor, battle_id);
            return ActionOutcome::ignored(ActionRejection::SessionNotFound);
        }

        let mut rng = SmallRng::from_entropy();
        if let Err(rejection) = action(&mut *state, &mut rng) {
            warn!("Ignoring action from {} in battle {}: {:?}", actor, battle_id, rejection);
            return ActionOutcome::ignored(rejection);
        }

        if state.is_finished() {
            let settlement = self.finish_battle(&mut *state).await;
            return ActionOutcome::Finished {
                view: BattleView::from_state(&state, self.settings.log_tail),
                settlement,
            };
        }
        ActionOutcome::Updated(BattleView::from_state(&state, self.settings.log_tail))
    }

    /// Settles, persists and unregisters a finished battle. Called with the battle lock held.
    async fn finish_battle(&self, state: &mut PvPBattleState) -> Option<SettlementSummary> {
        if state.rewards_settled {
            return None;
        }
        state.rewards_settled = true;

        let settlement = match (state.end_reason, state.winner.clone()) {
            (Some(PvPBattleEndReason::AllPokemonFainted), Some(winner_id)) => {
                match state.get_opponent_id(&winner_id).map(str::to_string) {
                    Some(loser_id) => Some(self.settle_rewards(&winner_id, &loser_id).await),
                    None => None,
                }
            }
            _ => None,
        };

        if let Err(e) = self.collaborators.store.upsert_battle(&state.snapshot()).await {
            error!("Failed to persist final snapshot of battle {}: {}", state.battle_id, e);
        }

        self.active_pvp_battles.remove(&state.battle_id);
        self.release_players(
            state.battle_id,
            [state.player1.player_id.as_str(), state.player2.player_id.as_str()],
        );
        info!("PvP battle {} closed after {} turns", state.battle_id, state.turn_number);
        settlement
    }

    async fn settle_rewards(&self, winner_id: &str, loser_id: &str) -> SettlementSummary {
        let economy = &self.collaborators.economy;
        let mut notice = None;

        let credit = economy.adjust_balance(winner_id, self.settings.winner_reward).await;
        let winner_balance = match credit {
            Ok(balance) => Some(balance),
            Err(e) => {
                error!("Failed to credit {} to {}: {}", self.settings.winner_reward, winner_id, e);
                notice = Some(RETRY_LATER_NOTICE.to_string());
                None
            }
        };
        let debit = economy.adjust_balance(loser_id, -self.settings.loser_penalty).await;
        let loser_balance = match debit {
            Ok(balance) => Some(balance),
            Err(e) => {
                error!("Failed to debit {} from {}: {}", self.settings.loser_penalty, loser_id, e);
                notice = Some(RETRY_LATER_NOTICE.to_string());
                None
            }
        };
        if let Err(e) = economy.adjust_shards(winner_id, self.settings.winner_shards).await {
            error!("Failed to credit shards to {}: {}", winner_id, e);
            notice = Some(RETRY_LATER_NOTICE.to_string());
        }

        info!(
            "Rewards settled: {} +{} tokens +{} shards, {} -{} tokens",
            winner_id,
            self.settings.winner_reward,
            self.settings.winner_shards,
            loser_id,
            self.settings.loser_penalty
        );
        SettlementSummary {
            winner_id: winner_id.to_string(),
            loser_id: loser_id.to_string(),
            winner_reward: self.settings.winner_reward,
            loser_penalty: self.settings.loser_penalty,
            winner_shards: self.settings.winner_shards,
            winner_balance,
            loser_balance,
            notice,
        }
    }

    pub async fn execute_move(
        &self,
        battle_id: Uuid,
        move_index: usize,
        actor: &str,
    ) -> ActionOutcome {
        self.with_battle(battle_id, actor, |state, rng| {
            state.use_move(actor, move_index, rng).map(|_| ())
        })
        .await
    }

    pub async fn request_switch(
        &self,
        battle_id: Uuid,
        team_index: usize,
        actor: &str,
    ) -> ActionOutcome {
        self.with_battle(battle_id, actor, |state, rng| {
            state.switch_pokemon(actor, team_index, rng)
        })
        .await
    }

    pub async fn open_switch_menu(&self, battle_id: Uuid, actor: &str) -> ActionOutcome {
        self.with_battle(battle_id, actor, |state, _| state.open_switch_menu(actor))
            .await
    }

    pub async fn close_switch_menu(&self, battle_id: Uuid, actor: &str) -> ActionOutcome {
        self.with_battle(battle_id, actor, |state, _| state.close_switch_menu(actor))
            .await
    }

    pub async fn request_run(&self, battle_id: Uuid, actor: &str) -> ActionOutcome {
        self.with_battle(battle_id, actor, |state, _| {
            state.request_run(actor).map(|outcome| {
                if outcome == RunOutcome::AwaitingOpponent {
                    info!("{} asked to end battle {}", actor, state.battle_id);
                }
            })
        })
        .await
    }

    /// Remembers which chat message shows this battle so it can be edited in place.
    pub async fn set_ui_message(
        &self,
        battle_id: Uuid,
        actor: &str,
        message_id: &str,
    ) -> ActionOutcome {
        self.with_battle(battle_id, actor, |state, _| {
            if !state.is_participant(actor) {
                return Err(ActionRejection::NotParticipant);
            }
            state.ui_message_id = Some(message_id.to_string());
            Ok(())
        })
        .await
    }

    /// The battle `user_id` is currently in, if any.
    pub async fn get_active_session(&self, user_id: &str) -> Option<BattleView> {
        let battle_id = *self.player_battles.get(user_id)?;
        let battle = self.active_pvp_battles.get(&battle_id).map(|b| Arc::clone(b.value()))?;
        let state = battle.lock().await;
        Some(BattleView::from_state(&state, self.settings.log_tail))
    }

    /// The challenge addressed to `user_id`, or else one they sent.
    pub fn get_pending_challenge(&self, user_id: &str) -> Option<PendingChallengeView> {
        if let Some(challenge) = self.pending_challenges.get(user_id) {
            return Some(challenge.view());
        }
        self.pending_challenges
            .iter()
            .find(|entry| entry.value().challenger_id == user_id)
            .map(|entry| entry.value().view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::state::BattlePvPPhase;
    use crate::memory_store::MemoryStore;
    use crate::monsters::move_manager::{MoveRecord, SpeciesData};
    use crate::monsters::{MoveRepository, UnitCatalogRepository, UnitDetails};
    use crate::stats::CalculatedStats;
    use std::collections::HashMap;

    fn unit(id: &str, name: &str, type_field: &str) -> UnitDetails {
        UnitDetails {
            id: id.to_string(),
            name: name.to_string(),
            rarity: "Common".to_string(),
            region: "Kanto".to_string(),
            type_field: Some(type_field.to_string()),
            image: None,
        }
    }

    fn species(hp: u32, attack: u32, speed: u32, moves: &[&str]) -> SpeciesData {
        SpeciesData {
            stats: Some(CalculatedStats {
                hp,
                attack,
                defense: 10,
                special_attack: attack,
                special_defense: 10,
                speed,
            }),
            moves: moves.iter().map(|m| MoveRecord::Delimited(m.to_string())).collect(),
        }
    }

    /// Machamp always knocks out whatever it hits and always moves first.
    fn setup() -> (Arc<BattleManager>, Arc<MemoryStore>) {
        let store = MemoryStore::new();
        store.set_balance("ash", 100_000);
        store.set_balance("gary", 100_000);
        store.set_balance("brock", 100_000);
        store.set_name("ash", "Ash");
        store.set_name("gary", "Gary");
        store.set_team("ash", &["u-machamp"]);
        store.set_team("gary", &["u-rattata", "u-snorlax"]);
        store.set_team("brock", &["u-snorlax"]);

        let catalog = UnitCatalogRepository::from_units(vec![
            unit("u-machamp", "Machamp", "Fighting"),
            unit("u-rattata", "Rattata", "Normal"),
            unit("u-snorlax", "Snorlax", "Normal"),
        ]);
        let mut data = HashMap::new();
        data.insert(
            "Machamp".to_string(),
            species(
                500,
                1000,
                300,
                &[
                    "Dynamic Punch|250||Fighting|physical|",
                    "Leer|0||Normal|status|Lowers the target's DEF.",
                ],
            ),
        );
        data.insert("Rattata".to_string(), species(10, 10, 50, &["Tackle|40||Normal|physical|"]));
        data.insert("Snorlax".to_string(), species(10, 10, 5, &["Tackle|40||Normal|physical|"]));
        let enrichment = MoveRepository::from_species(data);

        let collaborators = store.collaborators(catalog, Some(enrichment));
        let manager = Arc::new(BattleManager::new(collaborators, BattleConfig::default()));
        (manager, store)
    }

    async fn start(manager: &BattleManager) -> Uuid {
        assert!(matches!(
            manager.create_challenge("chat", "ash", "gary").await,
            ChallengeOutcome::Created(_)
        ));
        match manager.accept_challenge("gary").await {
            AcceptOutcome::Started(view) => view.battle_id,
            other => panic!("battle did not start: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_challenge_validation() {
        let (manager, store) = setup();

        assert_eq!(
            manager.create_challenge("chat", "ash", "ash").await,
            ChallengeOutcome::Rejected(ChallengeRejection::SelfChallenge)
        );

        store.set_balance("gary", 7_999);
        assert_eq!(
            manager.create_challenge("chat", "ash", "gary").await,
            ChallengeOutcome::Rejected(ChallengeRejection::InsufficientStake {
                user_id: "gary".to_string()
            })
        );
        assert_eq!(manager.pending_challenge_count(), 0);

        store.set_balance("gary", 8_000);
        assert!(matches!(
            manager.create_challenge("chat", "ash", "gary").await,
            ChallengeOutcome::Created(_)
        ));
        assert_eq!(
            manager.create_challenge("chat", "brock", "gary").await,
            ChallengeOutcome::Rejected(ChallengeRejection::TargetAlreadyChallenged)
        );

        let pending = manager.get_pending_challenge("gary").unwrap();
        assert_eq!(pending.challenger_name, "Ash");
        let sent = manager.get_pending_challenge("ash").unwrap();
        assert_eq!(sent.challenge_id, pending.challenge_id);
        assert!(manager.get_pending_challenge("brock").is_none());
    }

    #[tokio::test]
    async fn test_accept_revalidates_stake_and_keeps_challenge() {
        let (manager, store) = setup();
        let created = match manager.create_challenge("chat", "ash", "gary").await {
            ChallengeOutcome::Created(view) => view,
            other => panic!("challenge not created: {:?}", other),
        };
        store.set_balance("ash", 100);

        assert_eq!(
            manager.accept_challenge("gary").await,
            AcceptOutcome::Rejected(ChallengeRejection::InsufficientStake {
                user_id: "ash".to_string()
            })
        );
        assert_eq!(manager.active_battle_count(), 0);
        assert!(manager.get_active_session("ash").await.is_none());
        let pending = manager.get_pending_challenge("gary").unwrap();
        assert_eq!(pending.challenge_id, created.challenge_id);

        store.set_balance("ash", 100_000);
        assert!(matches!(manager.accept_challenge("gary").await, AcceptOutcome::Started(_)));
        assert!(manager.get_pending_challenge("gary").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_accept_keeps_original_deadline() {
        let (manager, store) = setup();
        store.set_team("gary", &[]);
        manager.create_challenge("chat", "ash", "gary").await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            manager.accept_challenge("gary").await,
            AcceptOutcome::Rejected(ChallengeRejection::EmptyTeam { user_id: "gary".to_string() })
        );
        assert_eq!(manager.pending_challenge_count(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(manager.get_pending_challenge("gary").is_none());
    }

    #[tokio::test]
    async fn test_empty_team_cannot_start() {
        let (manager, store) = setup();
        store.set_team("gary", &[]);
        manager.create_challenge("chat", "ash", "gary").await;
        assert_eq!(
            manager.accept_challenge("gary").await,
            AcceptOutcome::Rejected(ChallengeRejection::EmptyTeam { user_id: "gary".to_string() })
        );
        assert!(manager.get_active_session("ash").await.is_none());

        // reservation was released and the challenge is still open
        store.set_team("gary", &["u-rattata"]);
        assert!(matches!(manager.accept_challenge("gary").await, AcceptOutcome::Started(_)));
    }

    #[tokio::test]
    async fn test_players_in_battle_cannot_be_challenged() {
        let (manager, store) = setup();
        let battle_id = start(&manager).await;
        assert_eq!(store.battle(&battle_id).unwrap().status, BattlePvPPhase::Active);

        assert_eq!(
            manager.create_challenge("chat", "ash", "brock").await,
            ChallengeOutcome::Rejected(ChallengeRejection::ChallengerInBattle)
        );
        assert_eq!(
            manager.create_challenge("chat", "brock", "gary").await,
            ChallengeOutcome::Rejected(ChallengeRejection::TargetInBattle)
        );
        let session = manager.get_active_session("gary").await.unwrap();
        assert_eq!(session.battle_id, battle_id);
        assert_eq!(session.current_turn.as_deref(), Some("ash"));
    }

    #[tokio::test]
    async fn test_knockout_settles_exactly_once() {
        let (manager, store) = setup();
        let battle_id = start(&manager).await;

        assert!(matches!(
            manager.execute_move(battle_id, 0, "gary").await,
            ActionOutcome::Ignored { reason: ActionRejection::NotYourTurn, .. }
        ));

        let outcome = manager.execute_move(battle_id, 0, "ash").await;
        let view = outcome.view().unwrap();
        assert_eq!(view.status, BattlePvPPhase::WaitingForSwitch);
        assert_eq!(view.switching_player.as_deref(), Some("gary"));

        assert!(matches!(
            manager.request_switch(battle_id, 0, "gary").await,
            ActionOutcome::Ignored { reason: ActionRejection::InvalidSwitchTarget { index: 0 }, .. }
        ));
        let outcome = manager.request_switch(battle_id, 1, "gary").await;
        assert_eq!(outcome.view().unwrap().current_turn.as_deref(), Some("ash"));

        let outcome = manager.execute_move(battle_id, 0, "ash").await;
        let ActionOutcome::Finished { view, settlement } = outcome else {
            panic!("battle should be over");
        };
        assert_eq!(view.winner.as_deref(), Some("ash"));
        let settlement = settlement.unwrap();
        assert_eq!(settlement.winner_balance, Some(150_000));
        assert_eq!(settlement.loser_balance, Some(92_000));
        assert!(settlement.notice.is_none());

        assert_eq!(store.balance("ash"), 150_000);
        assert_eq!(store.balance("gary"), 92_000);
        assert_eq!(store.shards("ash"), 10);
        assert_eq!(store.balance_adjustments(), 2);

        let saved = store.battle(&battle_id).unwrap();
        assert_eq!(saved.status, BattlePvPPhase::Finished);
        assert_eq!(saved.winner.as_deref(), Some("ash"));

        assert_eq!(manager.active_battle_count(), 0);
        assert!(manager.get_active_session("ash").await.is_none());
        assert!(matches!(
            manager.execute_move(battle_id, 0, "ash").await,
            ActionOutcome::Ignored { reason: ActionRejection::SessionNotFound, .. }
        ));
        assert_eq!(store.balance_adjustments(), 2);
    }

    #[tokio::test]
    async fn test_mutual_run_has_no_settlement() {
        let (manager, store) = setup();
        let battle_id = start(&manager).await;

        let outcome = manager.request_run(battle_id, "gary").await;
        assert!(outcome.view().unwrap().text.contains("Waiting for the opponent"));
        assert!(matches!(
            manager.request_run(battle_id, "gary").await,
            ActionOutcome::Ignored { reason: ActionRejection::AlreadyRequestedRun, .. }
        ));

        let outcome = manager.request_run(battle_id, "ash").await;
        let ActionOutcome::Finished { view, settlement } = outcome else {
            panic!("mutual run should end the battle");
        };
        assert!(settlement.is_none());
        assert_eq!(view.winner, None);
        assert_eq!(view.end_reason, Some(PvPBattleEndReason::MutualRun));
        assert_eq!(store.balance("ash"), 100_000);
        assert_eq!(store.balance("gary"), 100_000);
        assert_eq!(store.balance_adjustments(), 0);
        assert_eq!(manager.active_battle_count(), 0);
        assert!(manager.get_active_session("gary").await.is_none());
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_stop_play() {
        let (manager, store) = setup();
        store.set_fail_writes(true);
        let battle_id = start(&manager).await;
        assert_eq!(store.battle_count(), 0);

        manager.execute_move(battle_id, 0, "ash").await;
        manager.request_switch(battle_id, 1, "gary").await;
        let outcome = manager.execute_move(battle_id, 0, "ash").await;
        assert!(matches!(outcome, ActionOutcome::Finished { settlement: Some(_), .. }));
        assert_eq!(store.balance("ash"), 150_000);
        assert_eq!(manager.active_battle_count(), 0);
    }

    #[tokio::test]
    async fn test_economy_failure_still_closes_battle() {
        let (manager, store) = setup();
        let battle_id = start(&manager).await;
        store.set_fail_economy(true);

        manager.execute_move(battle_id, 0, "ash").await;
        manager.request_switch(battle_id, 1, "gary").await;
        let outcome = manager.execute_move(battle_id, 0, "ash").await;
        let ActionOutcome::Finished { view, settlement } = outcome else {
            panic!("battle should be over");
        };
        assert_eq!(view.winner.as_deref(), Some("ash"));
        let settlement = settlement.unwrap();
        assert_eq!(settlement.notice.as_deref(), Some(RETRY_LATER_NOTICE));
        assert_eq!(settlement.winner_balance, None);
        assert_eq!(settlement.loser_balance, None);
        assert_eq!(store.balance("ash"), 100_000);
        assert_eq!(store.shards("ash"), 0);
        assert_eq!(store.balance_adjustments(), 2);

        assert_eq!(manager.active_battle_count(), 0);
        assert!(manager.get_active_session("ash").await.is_none());
        assert_eq!(store.battle(&battle_id).unwrap().status, BattlePvPPhase::Finished);

        store.set_fail_economy(false);
        assert!(matches!(
            manager.execute_move(battle_id, 0, "ash").await,
            ActionOutcome::Ignored { reason: ActionRejection::SessionNotFound, .. }
        ));
        assert_eq!(store.balance_adjustments(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_moves_apply_once() {
        let (manager, _store) = setup();
        let battle_id = start(&manager).await;

        // Leer never faints, so the first one hands the turn to gary
        let (first, second) = tokio::join!(
            manager.execute_move(battle_id, 1, "ash"),
            manager.execute_move(battle_id, 1, "ash"),
        );
        let outcomes = [&first, &second];
        let applied = outcomes.iter().filter(|o| matches!(o, ActionOutcome::Updated(_))).count();
        let ignored = outcomes
            .iter()
            .filter(|o| {
                matches!(o, ActionOutcome::Ignored { reason: ActionRejection::NotYourTurn, .. })
            })
            .count();
        assert_eq!((applied, ignored), (1, 1));

        let session = manager.get_active_session("ash").await.unwrap();
        assert_eq!(session.turn_number, 2);
        assert_eq!(session.current_turn.as_deref(), Some("gary"));
    }

    #[tokio::test]
    async fn test_ui_message_is_kept() {
        let (manager, _store) = setup();
        let battle_id = start(&manager).await;
        assert!(matches!(
            manager.set_ui_message(battle_id, "brock", "msg-1").await,
            ActionOutcome::Ignored { reason: ActionRejection::NotParticipant, .. }
        ));
        let outcome = manager.set_ui_message(battle_id, "gary", "msg-1").await;
        assert_eq!(outcome.view().unwrap().ui_message_id.as_deref(), Some("msg-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_challenge_expires() {
        let (manager, store) = setup();
        manager.create_challenge("chat", "ash", "gary").await;
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(manager.get_pending_challenge("gary").is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(manager.get_pending_challenge("gary").is_none());
        assert_eq!(store.balance("ash"), 100_000);
        assert_eq!(
            manager.accept_challenge("gary").await,
            AcceptOutcome::Rejected(ChallengeRejection::NoPendingChallenge)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_timer_does_not_remove_new_challenge() {
        let (manager, _store) = setup();
        manager.create_challenge("chat", "ash", "gary").await;
        assert!(matches!(manager.decline_challenge("gary"), DeclineOutcome::Declined { .. }));
        assert_eq!(manager.decline_challenge("gary"), DeclineOutcome::NoPendingChallenge);

        tokio::time::sleep(Duration::from_secs(40)).await;
        manager.create_challenge("chat", "brock", "gary").await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        let pending = manager.get_pending_challenge("gary").unwrap();
        assert_eq!(pending.challenger_id, "brock");
    }
}
