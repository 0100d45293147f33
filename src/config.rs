use serde::{Deserialize, Serialize};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub battle: BattleConfig,
    pub monsters: MonstersConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Economy and pacing knobs for PvP battles.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BattleConfig {
    pub min_stake: i64,
    pub winner_reward: i64,
    pub loser_penalty: i64,
    pub winner_shards: i64,
    pub challenge_timeout_sec: u64,
    pub max_team_size: usize,
    /// Battle log lines shown in rendered text.
    pub log_tail: usize,
}

impl Default for BattleConfig {
    fn default() -> Self {
        BattleConfig {
            min_stake: 8_000,
            winner_reward: 50_000,
            loser_penalty: 8_000,
            winner_shards: 10,
            challenge_timeout_sec: 60,
            max_team_size: 6,
            log_tail: 6,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonstersConfig {
    pub units_path: String,
    pub species_path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Redis,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "redis" => Ok(StorageBackend::Redis),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub redis_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
                port: 8080,
                cors_origins: vec!["*".to_string()],
            },
            battle: BattleConfig::default(),
            monsters: MonstersConfig {
                units_path: "resources/units.json".to_string(),
                species_path: "resources/species.json".to_string(),
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                redis_url: "redis://127.0.0.1/".to_string(),
            },
        }
    }
}

fn parse_env<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = env::var(key) {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring invalid value for {}: {}", key, raw),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        // Load .env file if available
        dotenv::dotenv().ok();

        let mut config = Config::default();

        // Server config
        parse_env("PORT", &mut config.server.port);
        parse_env("HOST", &mut config.server.host);
        if let Ok(cors) = env::var("CORS_ORIGINS") {
            config.server.cors_origins = cors.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Battle config
        parse_env("BATTLE_MIN_STAKE", &mut config.battle.min_stake);
        parse_env("BATTLE_WINNER_REWARD", &mut config.battle.winner_reward);
        parse_env("BATTLE_LOSER_PENALTY", &mut config.battle.loser_penalty);
        parse_env("BATTLE_WINNER_SHARDS", &mut config.battle.winner_shards);
        parse_env("CHALLENGE_TIMEOUT_SEC", &mut config.battle.challenge_timeout_sec);

        // Monster data
        if let Ok(units_path) = env::var("UNITS_PATH") {
            config.monsters.units_path = units_path;
        }
        if let Ok(species_path) = env::var("SPECIES_PATH") {
            config.monsters.species_path = species_path;
        }

        // Storage
        parse_env("STORAGE_BACKEND", &mut config.storage.backend);
        if let Ok(redis_url) = env::var("REDIS_URL") {
            config.storage.redis_url = redis_url;
        }

        info!("Configuration loaded: {:?}", config);
        config
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}
