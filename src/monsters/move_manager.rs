use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collaborators::StatProvider;
use crate::combat::state::StatusCondition;
use crate::errors::CollaboratorError;
use crate::stats::{CalculatedStats, StatName};

use super::monster::{parse_types, PokemonType};

/// Chance, in percent, that a damaging move applies its secondary status.
pub const SECONDARY_STATUS_CHANCE: u8 = 10;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum MoveCategory {
    Physical, Special, Status,
}

impl MoveCategory {
    pub fn from_label(label: &str) -> Option<MoveCategory> {
        match label.trim().to_lowercase().as_str() {
            "physical" => Some(MoveCategory::Physical),
            "special" => Some(MoveCategory::Special),
            "status" => Some(MoveCategory::Status),
            _ => None,
        }
    }
}

/// Structured secondary effect, attached once when a move is loaded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveEffect {
    /// Applied to the target after a damaging hit, `chance` percent of the time.
    InflictStatus { status: StatusCondition, chance: u8 },
    LowerStat { stat: StatName, stages: i8 },
    /// Applied to the user.
    RaiseStat { stat: StatName, stages: i8 },
}

/// Derives effects from a move's description using the same keywords the bot always used.
/// Only runs when the move record carries no explicit effects.
pub fn derive_effects(power: u32, description: &str) -> Vec<MoveEffect> {
    let mut effects = Vec::new();
    if power > 0 {
        let lowered = description.to_lowercase();
        let keywords = [
            ("burn", StatusCondition::Burn),
            ("paraly", StatusCondition::Paralysis),
            ("freez", StatusCondition::Freeze),
        ];
        for (keyword, status) in keywords {
            if lowered.contains(keyword) {
                effects.push(MoveEffect::InflictStatus { status, chance: SECONDARY_STATUS_CHANCE });
            }
        }
    } else {
        if description.contains("ATK") {
            effects.push(MoveEffect::LowerStat { stat: StatName::Attack, stages: -1 });
        }
        if description.contains("DEF") {
            effects.push(MoveEffect::LowerStat { stat: StatName::Defense, stages: -1 });
        }
    }
    effects
}

/// A move as used in battle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MoveData {
    pub name: String,
    pub power: u32,
    /// `None` always hits.
    pub accuracy: Option<u8>,
    #[serde(rename = "type")]
    pub move_type: PokemonType,
    pub damage_class: Option<MoveCategory>,
    pub description: String,
    pub effects: Vec<MoveEffect>,
}

impl MoveData {
    pub fn new(
        name: &str,
        power: u32,
        accuracy: Option<u8>,
        move_type: &str,
        damage_class: Option<&str>,
        description: &str,
    ) -> Self {
        MoveData {
            name: name.to_string(),
            power,
            accuracy,
            move_type: parse_types(Some(move_type))[0],
            damage_class: damage_class.and_then(MoveCategory::from_label),
            description: description.to_string(),
            effects: derive_effects(power, description),
        }
    }

    pub fn is_status(&self) -> bool {
        self.power == 0
    }

    /// Declared class if it is physical or special, otherwise inferred from the move type.
    pub fn resolved_category(&self) -> MoveCategory {
        if self.is_status() {
            return MoveCategory::Status;
        }
        match self.damage_class {
            Some(MoveCategory::Physical) => MoveCategory::Physical,
            Some(MoveCategory::Special) => MoveCategory::Special,
            _ if self.move_type.is_special_leaning() => MoveCategory::Special,
            _ => MoveCategory::Physical,
        }
    }
}

/// Raw move entry as found in data files: either an object or
/// `"Name|Power|Accuracy|Type|Class|Description"`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum MoveRecord {
    Detailed {
        name: String,
        #[serde(default)]
        power: Option<u32>,
        #[serde(default)]
        accuracy: Option<u8>,
        #[serde(default, rename = "type")]
        move_type: Option<String>,
        #[serde(default)]
        damage_class: Option<String>,
        #[serde(default)]
        description: String,
        #[serde(default)]
        effects: Option<Vec<MoveEffect>>,
    },
    Delimited(String),
}

impl MoveRecord {
    pub fn into_move_data(self) -> Option<MoveData> {
        match self {
            MoveRecord::Detailed {
                name,
                power,
                accuracy,
                move_type,
                damage_class,
                description,
                effects,
            } => {
                if name.trim().is_empty() {
                    return None;
                }
                let mut data = MoveData::new(
                    name.trim(),
                    power.unwrap_or(0),
                    accuracy,
                    move_type.as_deref().unwrap_or(""),
                    damage_class.as_deref(),
                    &description,
                );
                if let Some(effects) = effects {
                    data.effects = effects;
                }
                Some(data)
            }
            MoveRecord::Delimited(raw) => {
                let parts: Vec<&str> = raw.split('|').map(str::trim).collect();
                let name = parts.first().copied().unwrap_or("");
                if name.is_empty() {
                    return None;
                }
                let field = |index: usize| parts.get(index).copied().unwrap_or("");
                Some(MoveData::new(
                    name,
                    field(1).parse().unwrap_or(0),
                    field(2).parse().ok(),
                    field(3),
                    Some(field(4)).filter(|class| !class.is_empty()),
                    field(5),
                ))
            }
        }
    }
}

/// Per-species enrichment entry.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SpeciesData {
    /// Final stats at the battle level, used as-is.
    #[serde(default)]
    pub stats: Option<CalculatedStats>,
    #[serde(default)]
    pub moves: Vec<MoveRecord>,
}

/// Stat and move data keyed by lower-cased species name.
#[derive(Debug, Default)]
pub struct MoveRepository {
    pub species: HashMap<String, SpeciesData>,
}

impl MoveRepository {
    pub fn new(species_path: &str) -> Arc<Self> {
        let species = Self::load_species(species_path);
        info!("Loaded enrichment data for {} species from {}", species.len(), species_path);
        Self::from_species(species)
    }

    pub fn from_species(species: HashMap<String, SpeciesData>) -> Arc<Self> {
        let species = species
            .into_iter()
            .map(|(name, data)| (name.to_lowercase(), data))
            .collect();
        Arc::new(MoveRepository { species })
    }

    fn load_species(path: &str) -> HashMap<String, SpeciesData> {
        match File::open(Path::new(path)) {
            Ok(file) => {
                let reader = BufReader::new(file);
                match serde_json::from_reader(reader) {
                    Ok(species) => species,
                    Err(e) => {
                        warn!("Failed to parse species JSON: {}", e);
                        HashMap::new()
                    }
                }
            },
            Err(e) => {
                warn!("Failed to open species file {}: {}", path, e);
                HashMap::new()
            }
        }
    }

    pub fn get_species(&self, name: &str) -> Option<&SpeciesData> {
        self.species.get(&name.to_lowercase())
    }
}

#[async_trait]
impl StatProvider for MoveRepository {
    async fn get_stats(&self, name: &str) -> Result<Option<CalculatedStats>, CollaboratorError> {
        Ok(self.get_species(name).and_then(|species| species.stats.clone()))
    }

    async fn get_moves(&self, name: &str) -> Result<Vec<MoveData>, CollaboratorError> {
        Ok(self
            .get_species(name)
            .map(|species| {
                species
                    .moves
                    .iter()
                    .cloned()
                    .filter_map(MoveRecord::into_move_data)
                    .take(4)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damaging_move_keywords_inflict_status() {
        let effects = derive_effects(90, "May burn the target.");
        assert_eq!(
            effects,
            vec![MoveEffect::InflictStatus { status: StatusCondition::Burn, chance: 10 }]
        );
        let effects =
            derive_effects(85, "The user drops onto the target. May paralyze the target.");
        assert_eq!(
            effects,
            vec![MoveEffect::InflictStatus { status: StatusCondition::Paralysis, chance: 10 }]
        );
        assert!(derive_effects(40, "A plain tackle.").is_empty());
    }

    #[test]
    fn test_status_move_keywords_lower_stats() {
        assert_eq!(
            derive_effects(0, "Lowers the target's ATK and DEF."),
            vec![
                MoveEffect::LowerStat { stat: StatName::Attack, stages: -1 },
                MoveEffect::LowerStat { stat: StatName::Defense, stages: -1 },
            ]
        );
        // status keywords never apply to status moves
        assert!(derive_effects(0, "May burn the target.").is_empty());
    }

    #[test]
    fn test_category_inference() {
        let ember = MoveData::new("Ember", 40, Some(100), "Fire", None, "");
        assert_eq!(ember.resolved_category(), MoveCategory::Special);

        let tackle = MoveData::new("Tackle", 40, Some(100), "Normal", None, "");
        assert_eq!(tackle.resolved_category(), MoveCategory::Physical);

        let fire_punch = MoveData::new("Fire Punch", 75, Some(100), "Fire", Some("physical"), "");
        assert_eq!(fire_punch.resolved_category(), MoveCategory::Physical);

        let growl = MoveData::new("Growl", 0, Some(100), "Normal", Some("physical"), "");
        assert_eq!(growl.resolved_category(), MoveCategory::Status);
    }

    #[test]
    fn test_delimited_and_detailed_records_normalise() {
        let raw: Vec<MoveRecord> = serde_json::from_str(
            r#"[
                "Thunderbolt|90|100|electric|special|May paralyze the target.",
                "Swift|60||Normal||",
                {"name": "Fly", "power": 90, "accuracy": 95, "type": "Flying"},
                {"name": "Swords Dance", "type": "Normal",
                 "effects": [{"kind": "raise_stat", "stat": "attack", "stages": 2}]},
                "|10|100|Normal"
            ]"#,
        )
        .unwrap();
        let moves: Vec<MoveData> = raw.into_iter().filter_map(MoveRecord::into_move_data).collect();
        assert_eq!(moves.len(), 4);

        assert_eq!(moves[0].move_type, PokemonType::Electric);
        assert_eq!(moves[0].damage_class, Some(MoveCategory::Special));
        assert_eq!(moves[0].effects.len(), 1);

        assert_eq!(moves[1].accuracy, None);
        assert_eq!(moves[1].damage_class, None);

        assert_eq!(moves[2].accuracy, Some(95));
        assert_eq!(moves[2].resolved_category(), MoveCategory::Physical);

        assert!(moves[3].is_status());
        assert_eq!(
            moves[3].effects,
            vec![MoveEffect::RaiseStat { stat: StatName::Attack, stages: 2 }]
        );
    }

    #[tokio::test]
    async fn test_repository_lookup_is_case_insensitive() {
        let mut species = HashMap::new();
        species.insert(
            "Pikachu".to_string(),
            SpeciesData {
                stats: Some(CalculatedStats {
                    hp: 200,
                    attack: 150,
                    defense: 120,
                    special_attack: 170,
                    special_defense: 140,
                    speed: 250,
                }),
                moves: vec![MoveRecord::Delimited(
                    "Spark|65|100|Electric|physical|May paralyze the target.".to_string(),
                )],
            },
        );
        let repository = MoveRepository::from_species(species);

        let stats = repository.get_stats("PIKACHU").await.unwrap().unwrap();
        assert_eq!(stats.speed, 250);
        let moves = repository.get_moves("pikachu").await.unwrap();
        assert_eq!(moves.len(), 1);
        assert!(repository.get_moves("Raichu").await.unwrap().is_empty());
    }
}
