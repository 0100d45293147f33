use crate::stats::BaseStats;

use super::move_manager::MoveData;

/// Base-stat row for a rarity tier. Tiers without their own special values reuse speed.
struct TierStats {
    hp: u32,
    attack: u32,
    defense: u32,
    speed: u32,
    special_attack: Option<u32>,
    special_defense: Option<u32>,
}

/// (name, power, accuracy, type, class, description)
type FallbackMove = (&'static str, u32, Option<u8>, &'static str, &'static str, &'static str);

const COMMON_MOVES: [FallbackMove; 4] = [
    (
        "Tackle",
        40,
        Some(100),
        "Normal",
        "physical",
        "A physical attack in which the user charges into the target.",
    ),
    ("Scratch", 40, Some(100), "Normal", "physical", "Hard, pointed claws rake the target."),
    ("Growl", 0, Some(100), "Normal", "status", "Lowers the target's ATK by 1 stage."),
    (
        "Quick Attack",
        40,
        Some(100),
        "Normal",
        "physical",
        "The user lunges at the target at high speed.",
    ),
];

const UNCOMMON_MOVES: [FallbackMove; 4] = [
    ("Headbutt", 70, Some(100), "Normal", "physical", "The user sticks out its head and attacks."),
    (
        "Ember",
        40,
        Some(100),
        "Fire",
        "special",
        "The target is attacked with small flames. May burn the target.",
    ),
    ("Leer", 0, Some(100), "Normal", "status", "Lowers the target's DEF by 1 stage."),
    (
        "Water Gun",
        40,
        Some(100),
        "Water",
        "special",
        "The target is blasted with a forceful shot of water.",
    ),
];

const RARE_MOVES: [FallbackMove; 4] = [
    (
        "Body Slam",
        85,
        Some(100),
        "Normal",
        "physical",
        "The user drops onto the target with its full body. May paralyze the target.",
    ),
    (
        "Flamethrower",
        90,
        Some(100),
        "Fire",
        "special",
        "The target is scorched with an intense blast of fire. May burn the target.",
    ),
    (
        "Ice Beam",
        90,
        Some(100),
        "Ice",
        "special",
        "The target is struck with an icy-cold beam. May freeze the target.",
    ),
    (
        "Screech",
        0,
        Some(85),
        "Normal",
        "status",
        "An earsplitting screech harshly lowers the target's DEF.",
    ),
];

const EPIC_MOVES: [FallbackMove; 4] = [
    (
        "Thunderbolt",
        90,
        Some(100),
        "Electric",
        "special",
        "A strong electric blast crashes down on the target. May paralyze the target.",
    ),
    (
        "Earthquake",
        100,
        Some(100),
        "Ground",
        "physical",
        "The user sets off an earthquake that strikes everyone around it.",
    ),
    (
        "Psychic",
        90,
        Some(100),
        "Psychic",
        "special",
        "The target is hit by a strong telekinetic force.",
    ),
    (
        "Charm",
        0,
        Some(100),
        "Fairy",
        "status",
        "The user gazes at the target rather charmingly, lowering its ATK.",
    ),
];

const LEGENDARY_MOVES: [FallbackMove; 4] = [
    (
        "Hyper Beam",
        150,
        Some(90),
        "Normal",
        "special",
        "The target is attacked with a powerful beam.",
    ),
    (
        "Fire Blast",
        110,
        Some(85),
        "Fire",
        "special",
        "The target is attacked with an intense blast of all-consuming fire. May burn the target.",
    ),
    (
        "Blizzard",
        110,
        Some(70),
        "Ice",
        "special",
        "A howling blizzard is summoned to strike opposing Pokemon. May freeze the target.",
    ),
    (
        "Close Combat",
        120,
        Some(100),
        "Fighting",
        "physical",
        "The user fights the target up close without guarding itself.",
    ),
];

const ULTIMATE_MOVES: [FallbackMove; 4] = [
    (
        "Judgment",
        100,
        Some(100),
        "Normal",
        "special",
        "The user releases countless shots of light at the target.",
    ),
    (
        "Draco Meteor",
        130,
        Some(90),
        "Dragon",
        "special",
        "Comets are summoned down from the sky onto the target.",
    ),
    (
        "Spacial Rend",
        100,
        Some(95),
        "Dragon",
        "special",
        "The user tears the target along with the space around it.",
    ),
    (
        "Thunder",
        110,
        Some(70),
        "Electric",
        "special",
        "A wicked thunderbolt is dropped on the target. May paralyze the target.",
    ),
];

fn tier_row(tier: &str) -> (TierStats, &'static [FallbackMove; 4]) {
    match tier.trim().to_lowercase().as_str() {
        "uncommon" => (
            TierStats {
                hp: 60,
                attack: 60,
                defense: 60,
                speed: 60,
                special_attack: None,
                special_defense: None,
            },
            &UNCOMMON_MOVES,
        ),
        "rare" => (
            TierStats {
                hp: 70,
                attack: 75,
                defense: 70,
                speed: 70,
                special_attack: Some(75),
                special_defense: Some(70),
            },
            &RARE_MOVES,
        ),
        "epic" => (
            TierStats {
                hp: 80,
                attack: 85,
                defense: 80,
                speed: 80,
                special_attack: Some(85),
                special_defense: Some(80),
            },
            &EPIC_MOVES,
        ),
        "legendary" | "mythical" => (
            TierStats {
                hp: 100,
                attack: 110,
                defense: 100,
                speed: 95,
                special_attack: Some(110),
                special_defense: Some(100),
            },
            &LEGENDARY_MOVES,
        ),
        "ultimate" => (
            TierStats {
                hp: 120,
                attack: 130,
                defense: 115,
                speed: 110,
                special_attack: Some(130),
                special_defense: Some(115),
            },
            &ULTIMATE_MOVES,
        ),
        _ => (
            TierStats {
                hp: 50,
                attack: 50,
                defense: 50,
                speed: 50,
                special_attack: None,
                special_defense: None,
            },
            &COMMON_MOVES,
        ),
    }
}

/// Base stats for a rarity tier label. Unknown labels fall back to the common tier.
pub fn base_stats_for_tier(tier: &str) -> BaseStats {
    let (row, _) = tier_row(tier);
    BaseStats {
        hp: row.hp,
        attack: row.attack,
        defense: row.defense,
        special_attack: row.special_attack.unwrap_or(row.speed),
        special_defense: row.special_defense.unwrap_or(row.speed),
        speed: row.speed,
    }
}

/// Fixed four-move list used when no per-species moves are known.
pub fn fallback_moves_for_tier(tier: &str) -> Vec<MoveData> {
    let (_, moves) = tier_row(tier);
    moves
        .iter()
        .map(|(name, power, accuracy, move_type, class, description)| {
            MoveData::new(name, *power, *accuracy, move_type, Some(*class), description)
        })
        .collect()
}
