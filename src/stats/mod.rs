use serde::{Deserialize, Serialize};

pub const MAX_STAGE: i8 = 6;
pub const MIN_STAGE: i8 = -6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatName {
    Attack,
    Defense,
    SpecialAttack,
    SpecialDefense,
    Speed,
}

impl StatName {
    pub fn label(&self) -> &'static str {
        match self {
            StatName::Attack => "Attack",
            StatName::Defense => "Defense",
            StatName::SpecialAttack => "Special Attack",
            StatName::SpecialDefense => "Special Defense",
            StatName::Speed => "Speed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StatSet<T> {
    pub hp: T,
    pub attack: T,
    pub defense: T,
    pub special_attack: T,
    pub special_defense: T,
    pub speed: T,
}

pub type BaseStats = StatSet<u32>;
pub type CalculatedStats = StatSet<u32>;

impl<T: Copy> StatSet<T> {
    pub fn get(&self, stat: StatName) -> T {
        match stat {
            StatName::Attack => self.attack,
            StatName::Defense => self.defense,
            StatName::SpecialAttack => self.special_attack,
            StatName::SpecialDefense => self.special_defense,
            StatName::Speed => self.speed,
        }
    }

    fn get_mut(&mut self, stat: StatName) -> &mut T {
        match stat {
            StatName::Attack => &mut self.attack,
            StatName::Defense => &mut self.defense,
            StatName::SpecialAttack => &mut self.special_attack,
            StatName::SpecialDefense => &mut self.special_defense,
            StatName::Speed => &mut self.speed,
        }
    }
}

/// Per-stat battle stages in [-6, +6]. The hp slot is unused.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BattleStatModifiers {
    pub battle_stats: StatSet<i8>,
}

impl BattleStatModifiers {
    pub fn stage(&self, stat: StatName) -> i8 {
        self.battle_stats.get(stat)
    }

    /// Moves a stage by `delta`, clamped to the legal range.
    /// Returns the new stage and whether it actually changed.
    pub fn adjust(&mut self, stat: StatName, delta: i8) -> (i8, bool) {
        let slot = self.battle_stats.get_mut(stat);
        let current = *slot;
        let new_stage = current.saturating_add(delta).clamp(MIN_STAGE, MAX_STAGE);
        *slot = new_stage;
        (new_stage, new_stage != current)
    }

    /// Linear stage model: every stage shifts the stat by one percent of its base value.
    pub fn apply(&self, stat: StatName, base: f32) -> f32 {
        let stage = self.stage(stat) as f32;
        (base + base * stage / 100.0).floor().max(1.0)
    }
}

/// Stats of a fully invested unit at the fixed maximum level.
pub fn calculate_max_level_stats(base_stats: &BaseStats) -> CalculatedStats {
    CalculatedStats {
        hp: max_level_stat(base_stats.hp) + 110,
        attack: max_level_stat(base_stats.attack) + 5,
        defense: max_level_stat(base_stats.defense) + 5,
        special_attack: max_level_stat(base_stats.special_attack) + 5,
        special_defense: max_level_stat(base_stats.special_defense) + 5,
        speed: max_level_stat(base_stats.speed) + 5,
    }
}

fn max_level_stat(base: u32) -> u32 {
    // 31 IV and 252 EVs (63 after the /4) at level 100
    base * 2 + 31 + 63
}
