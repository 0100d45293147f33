use tracing::{error, warn};

use crate::collaborators::BattleCollaborators;
use crate::combat::state::BattlePokemon;
use crate::errors::CollaboratorError;
use crate::monsters::move_manager::MoveData;
use crate::monsters::rarity::{base_stats_for_tier, fallback_moves_for_tier};
use crate::monsters::{parse_types, UnitDetails};
use crate::stats::{calculate_max_level_stats, CalculatedStats};

/// Convert a catalog unit to a battle Pokemon.
/// Missing stats or moves fall back to the unit's rarity tier.
pub fn convert_unit_to_battle_pokemon(
    unit: &UnitDetails,
    stats: Option<CalculatedStats>,
    moves: Vec<MoveData>,
    position: usize,
) -> BattlePokemon {
    let calculated_stats =
        stats.unwrap_or_else(|| calculate_max_level_stats(&base_stats_for_tier(&unit.rarity)));
    let moves = if moves.is_empty() {
        fallback_moves_for_tier(&unit.rarity)
    } else {
        moves
    };

    let mut pokemon = BattlePokemon::new(
        unit.id.clone(),
        unit.name.clone(),
        parse_types(unit.type_field.as_deref()),
        calculated_stats,
        moves,
        position,
    );
    pokemon.region = unit.region.clone();
    pokemon.rarity = unit.rarity.clone();
    pokemon.image = unit.image.clone();
    pokemon
}

/// Loads a user's roster and turns it into battle-ready Pokémon, in roster order.
/// Enrichment failures are logged and fall back to the rarity table; catalog failures propagate.
pub async fn load_battle_team(
    user_id: &str,
    collaborators: &BattleCollaborators,
    max_team_size: usize,
) -> Result<Vec<BattlePokemon>, CollaboratorError> {
    let mut ids = collaborators.roster.get_team(user_id).await?;
    if ids.len() > max_team_size {
        warn!(
            "{}'s roster has {} units, only the first {} will battle",
            user_id,
            ids.len(),
            max_team_size
        );
        ids.truncate(max_team_size);
    }
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let details = collaborators.catalog.get_unit_details(&ids).await?;

    let mut team = Vec::with_capacity(ids.len());
    for id in &ids {
        let Some(unit) = details.get(id) else {
            warn!("Unit {} on {}'s team is missing from the catalog, skipping", id, user_id);
            continue;
        };

        let (stats, moves) = match &collaborators.enrichment {
            Some(provider) => {
                let stats = provider.get_stats(&unit.name).await.unwrap_or_else(|e| {
                    error!("Stat lookup for {} failed: {}", unit.name, e);
                    None
                });
                let moves = provider.get_moves(&unit.name).await.unwrap_or_else(|e| {
                    error!("Move lookup for {} failed: {}", unit.name, e);
                    Vec::new()
                });
                (stats, moves)
            }
            None => (None, Vec::new()),
        };

        let position = team.len();
        team.push(convert_unit_to_battle_pokemon(unit, stats, moves, position));
    }
    Ok(team)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::StatProvider;
    use crate::memory_store::MemoryStore;
    use crate::monsters::{PokemonType, UnitCatalogRepository};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct OfflineStats;

    #[async_trait]
    impl StatProvider for OfflineStats {
        async fn get_stats(
            &self,
            name: &str,
        ) -> Result<Option<CalculatedStats>, CollaboratorError> {
            Err(CollaboratorError::Unavailable(format!("no stats for {}", name)))
        }

        async fn get_moves(&self, name: &str) -> Result<Vec<MoveData>, CollaboratorError> {
            Err(CollaboratorError::Unavailable(format!("no moves for {}", name)))
        }
    }

    fn catalog_unit(id: &str, rarity: &str) -> UnitDetails {
        UnitDetails {
            id: id.to_string(),
            name: format!("Mon {}", id),
            rarity: rarity.to_string(),
            region: "Johto".to_string(),
            type_field: Some("Water".to_string()),
            image: None,
        }
    }

    fn unit(rarity: &str, type_field: Option<&str>) -> UnitDetails {
        UnitDetails {
            id: "u1".to_string(),
            name: "Charizard".to_string(),
            rarity: rarity.to_string(),
            region: "Kanto".to_string(),
            type_field: type_field.map(str::to_string),
            image: Some("charizard.png".to_string()),
        }
    }

    #[test]
    fn test_rarity_fallback_when_no_enrichment() {
        let legendary = unit("Legendary", Some("fire/flying"));
        let pokemon = convert_unit_to_battle_pokemon(&legendary, None, Vec::new(), 2);
        let expected = calculate_max_level_stats(&base_stats_for_tier("Legendary"));
        assert_eq!(pokemon.calculated_stats, expected);
        assert_eq!(pokemon.max_hp, expected.hp);
        assert_eq!(pokemon.current_hp, expected.hp);
        assert_eq!(pokemon.moves, fallback_moves_for_tier("Legendary"));
        assert_eq!(pokemon.pokemon_types, vec![PokemonType::Fire, PokemonType::Flying]);
        assert_eq!(pokemon.position, 2);
        assert_eq!(pokemon.region, "Kanto");
        assert_eq!(pokemon.image.as_deref(), Some("charizard.png"));
    }

    #[test]
    fn test_enrichment_stats_and_moves_are_used_as_is() {
        let stats = CalculatedStats {
            hp: 360,
            attack: 293,
            defense: 280,
            special_attack: 348,
            special_defense: 295,
            speed: 328,
        };
        let moves: Vec<MoveData> = (0..6)
            .map(|i| MoveData::new(&format!("Move {}", i), 50, Some(100), "Fire", None, ""))
            .collect();
        let common = unit("Common", None);
        let pokemon = convert_unit_to_battle_pokemon(&common, Some(stats.clone()), moves, 0);
        assert_eq!(pokemon.calculated_stats, stats);
        assert_eq!(pokemon.moves.len(), 4);
        assert_eq!(pokemon.pokemon_types, vec![PokemonType::Unknown]);
    }

    #[tokio::test]
    async fn test_enrichment_failure_falls_back_to_rarity_tier() {
        let store = MemoryStore::new();
        store.set_team("misty", &["u1", "u2"]);
        let catalog = UnitCatalogRepository::from_units(vec![
            catalog_unit("u1", "Rare"),
            catalog_unit("u2", "Epic"),
        ]);
        let collaborators = store.collaborators(catalog, Some(Arc::new(OfflineStats)));

        let team = load_battle_team("misty", &collaborators, 6).await.unwrap();
        assert_eq!(team.len(), 2);
        let rare_stats = calculate_max_level_stats(&base_stats_for_tier("Rare"));
        assert_eq!(team[0].calculated_stats, rare_stats);
        assert_eq!(team[0].moves, fallback_moves_for_tier("Rare"));
        assert_eq!(team[1].moves, fallback_moves_for_tier("Epic"));
        assert_eq!(team[1].position, 1);
    }

    #[tokio::test]
    async fn test_oversized_roster_keeps_first_units() {
        let store = MemoryStore::new();
        let ids: Vec<String> = (0..8).map(|i| format!("u{}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        store.set_team("misty", &id_refs);
        let units = ids.iter().map(|id| catalog_unit(id, "Common")).collect();
        let catalog = UnitCatalogRepository::from_units(units);
        let collaborators = store.collaborators(catalog, None);

        let team = load_battle_team("misty", &collaborators, 6).await.unwrap();
        let loaded: Vec<&str> = team.iter().map(|p| p.template_id.as_str()).collect();
        assert_eq!(loaded, &id_refs[..6]);
    }
}
