use rand::Rng;

use crate::combat::state::{BattlePokemon, StatusCondition};
use crate::monsters::move_manager::{MoveCategory, MoveData, MoveEffect};
use crate::stats::StatName;

use super::type_chart::combined_effectiveness;

pub const CRITICAL_HIT_CHANCE: f64 = 0.0625;
pub const CRITICAL_HIT_MULTIPLIER: f32 = 1.5;
pub const STAB_MULTIPLIER: f32 = 1.5;

/// The random inputs of one damage roll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageRolls {
    pub random_factor: f32,
    pub critical: bool,
}

impl DamageRolls {
    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        DamageRolls {
            random_factor: rng.gen_range(0.85..=1.0),
            critical: rng.gen_bool(CRITICAL_HIT_CHANCE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageResult {
    pub damage: u32,
    pub effectiveness: f32,
    pub stab: f32,
    pub is_critical: bool,
}

/// Result of one move use, as reported to the battle.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub success: bool,
    pub missed: bool,
    pub damage_dealt: u32,
    pub defender_fainted: bool,
    pub effectiveness: f32,
    pub is_critical: bool,
    pub messages: Vec<String>,
}

impl MoveOutcome {
    pub fn message(&self) -> String {
        self.messages.join("\n")
    }
}

pub fn stab_multiplier(attacker: &BattlePokemon, move_data: &MoveData) -> f32 {
    if attacker.has_type(move_data.move_type) {
        STAB_MULTIPLIER
    } else {
        1.0
    }
}

/// Damage formula with every random input supplied by the caller.
pub fn calculate_damage(
    attacker: &BattlePokemon,
    move_data: &MoveData,
    defender: &BattlePokemon,
    rolls: DamageRolls,
) -> DamageResult {
    if move_data.is_status() {
        return DamageResult { damage: 0, effectiveness: 1.0, stab: 1.0, is_critical: false };
    }

    let category = move_data.resolved_category();
    let (attack_stat, defense_stat) = match category {
        MoveCategory::Special => (StatName::SpecialAttack, StatName::SpecialDefense),
        _ => (StatName::Attack, StatName::Defense),
    };

    let mut base_attack = attacker.calculated_stats.get(attack_stat) as f32;
    if category == MoveCategory::Physical && attacker.has_status(StatusCondition::Burn) {
        base_attack = (base_attack / 2.0).floor();
    }
    let attack = attacker.stat_modifiers.apply(attack_stat, base_attack);
    let defense = defender
        .stat_modifiers
        .apply(defense_stat, defender.calculated_stats.get(defense_stat) as f32)
        .max(1.0);

    let stab = stab_multiplier(attacker, move_data);
    let effectiveness = combined_effectiveness(move_data.move_type, &defender.pokemon_types);
    if effectiveness == 0.0 {
        return DamageResult { damage: 0, effectiveness, stab, is_critical: false };
    }

    let critical_mod = if rolls.critical { CRITICAL_HIT_MULTIPLIER } else { 1.0 };

    // Damage = floor(((2 * Level / 5 + 2) * Power * A/D) / 50 + 2) * Modifier
    let level = attacker.level as f32;
    let power = move_data.power as f32;
    let base_damage = (((2.0 * level / 5.0 + 2.0) * power * attack / defense) / 50.0 + 2.0).floor();
    let modifier = stab * effectiveness * rolls.random_factor * critical_mod;
    let damage = (base_damage * modifier).floor().max(1.0) as u32;

    DamageResult { damage, effectiveness, stab, is_critical: rolls.critical }
}

/// Resolves `attacker` using `move_data` on `defender`: accuracy, damage, then effects.
/// A miss changes nothing.
pub fn use_move<R: Rng + ?Sized>(
    attacker: &mut BattlePokemon,
    move_data: &MoveData,
    defender: &mut BattlePokemon,
    rng: &mut R,
) -> MoveOutcome {
    let mut outcome = MoveOutcome {
        success: true,
        missed: false,
        damage_dealt: 0,
        defender_fainted: false,
        effectiveness: 1.0,
        is_critical: false,
        messages: vec![format!("{} used {}!", attacker.name, move_data.name)],
    };

    if let Some(accuracy) = move_data.accuracy {
        let roll: f32 = rng.gen_range(0.0..100.0);
        if roll > accuracy as f32 {
            outcome.success = false;
            outcome.missed = true;
            outcome.messages.push(format!("{}'s attack missed!", attacker.name));
            return outcome;
        }
    }

    if !move_data.is_status() {
        let result = calculate_damage(attacker, move_data, defender, DamageRolls::roll(rng));
        outcome.effectiveness = result.effectiveness;
        if result.effectiveness == 0.0 {
            outcome.messages.push(format!("It doesn't affect {}... (no effect)", defender.name));
            return outcome;
        }

        outcome.is_critical = result.is_critical;
        outcome.damage_dealt = defender.apply_damage(result.damage);
        if result.is_critical {
            outcome.messages.push("A critical hit!".to_string());
        }
        if result.effectiveness > 1.0 {
            outcome.messages.push("It's super effective!".to_string());
        } else if result.effectiveness < 1.0 {
            outcome.messages.push("It's not very effective...".to_string());
        }
        outcome.messages.push(format!(
            "{} took {} damage ({}/{} HP).",
            defender.name, outcome.damage_dealt, defender.current_hp, defender.max_hp
        ));
        if defender.is_fainted {
            outcome.defender_fainted = true;
            outcome.messages.push(format!("{} fainted!", defender.name));
        }
    }

    apply_move_effects(attacker, move_data, defender, rng, &mut outcome.messages);
    outcome
}

fn apply_move_effects<R: Rng + ?Sized>(
    attacker: &mut BattlePokemon,
    move_data: &MoveData,
    defender: &mut BattlePokemon,
    rng: &mut R,
    messages: &mut Vec<String>,
) {
    for effect in &move_data.effects {
        match *effect {
            MoveEffect::InflictStatus { status, chance } => {
                if defender.is_fainted || !rng.gen_ratio(chance.min(100) as u32, 100) {
                    continue;
                }
                if defender.add_status(status) {
                    messages.push(format!("{} was {}!", defender.name, status.label()));
                }
            }
            MoveEffect::LowerStat { stat, stages } => {
                if defender.is_fainted {
                    continue;
                }
                let delta = -stages.saturating_abs();
                let (_, changed) = defender.adjust_stage(stat, delta);
                messages.push(stat_change_message(&defender.name, stat, delta, changed));
            }
            MoveEffect::RaiseStat { stat, stages } => {
                let delta = stages.saturating_abs();
                let (_, changed) = attacker.adjust_stage(stat, delta);
                messages.push(stat_change_message(&attacker.name, stat, delta, changed));
            }
        }
    }
}

fn stat_change_message(name: &str, stat: StatName, delta: i8, changed: bool) -> String {
    if !changed {
        let direction = if delta > 0 { "higher" } else { "lower" };
        return format!("{}'s {} won't go any {}!", name, stat.label(), direction);
    }
    let change_desc = match delta {
        1 => "rose",
        2 => "rose sharply",
        d if d > 2 => "rose drastically",
        -1 => "fell",
        -2 => "harshly fell",
        _ => "severely fell",
    };
    format!("{}'s {} {}!", name, stat.label(), change_desc)
}
