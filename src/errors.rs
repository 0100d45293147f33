use serde::Serialize;
use thiserror::Error;

/// Failure of an external collaborator (storage, economy, catalog, enrichment).
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Reasons a battle action is ignored. The session is never changed when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionRejection {
    #[error("Battle not found or already over")]
    SessionNotFound,

    #[error("You are not part of this battle")]
    NotParticipant,

    #[error("It is not your turn")]
    NotYourTurn,

    #[error("This battle is not accepting that action right now")]
    BattleNotActive,

    #[error("Move {index} is not available")]
    InvalidMoveIndex { index: usize },

    #[error("Pokemon {index} cannot be sent out")]
    InvalidSwitchTarget { index: usize },

    #[error("You cannot switch right now")]
    SwitchNotAllowed,

    #[error("You already asked to run")]
    AlreadyRequestedRun,

    #[error("A team has no Pokemon able to battle")]
    EmptyTeam,
}

/// Reasons a challenge cannot be created or accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengeRejection {
    #[error("You cannot challenge yourself")]
    SelfChallenge,

    #[error("That trainer already has a pending challenge")]
    TargetAlreadyChallenged,

    #[error("You are already in a battle")]
    ChallengerInBattle,

    #[error("That trainer is already in a battle")]
    TargetInBattle,

    #[error("{user_id} does not have enough tokens to battle")]
    InsufficientStake { user_id: String },

    #[error("{user_id} has no Pokemon on their team")]
    EmptyTeam { user_id: String },

    #[error("There is no pending challenge")]
    NoPendingChallenge,

    #[error("Battles are unavailable right now, please try again later")]
    ServiceUnavailable,
}
