use crate::monsters::PokemonType;

/// Multiplier for an attacking type hitting a single defending type.
/// Pairs not listed are neutral; `Unknown` is neutral on both sides.
pub fn effectiveness(attack: PokemonType, defend: PokemonType) -> f32 {
    use PokemonType::*;

    let (super_effective, resisted, immune): (&[PokemonType], &[PokemonType], &[PokemonType]) =
        match attack {
            Normal => (&[], &[Rock, Steel], &[Ghost]),
            Fire => (&[Grass, Ice, Bug, Steel], &[Fire, Water, Rock, Dragon], &[]),
            Water => (&[Fire, Ground, Rock], &[Water, Grass, Dragon], &[]),
            Electric => (&[Water, Flying], &[Electric, Grass, Dragon], &[Ground]),
            Grass => (
                &[Water, Ground, Rock],
                &[Fire, Grass, Poison, Flying, Bug, Dragon, Steel],
                &[],
            ),
            Ice => (&[Grass, Ground, Flying, Dragon], &[Fire, Water, Ice, Steel], &[]),
            Fighting => (
                &[Normal, Ice, Rock, Dark, Steel],
                &[Poison, Flying, Psychic, Bug, Fairy],
                &[Ghost],
            ),
            Poison => (&[Grass, Fairy], &[Poison, Ground, Rock, Ghost], &[Steel]),
            Ground => (&[Fire, Electric, Poison, Rock, Steel], &[Grass, Bug], &[Flying]),
            Flying => (&[Grass, Fighting, Bug], &[Electric, Rock, Steel], &[]),
            Psychic => (&[Fighting, Poison], &[Psychic, Steel], &[Dark]),
            Bug => (
                &[Grass, Psychic, Dark],
                &[Fire, Fighting, Poison, Flying, Ghost, Steel, Fairy],
                &[],
            ),
            Rock => (&[Fire, Ice, Flying, Bug], &[Fighting, Ground, Steel], &[]),
            Ghost => (&[Psychic, Ghost], &[Dark], &[Normal]),
            Dragon => (&[Dragon], &[Steel], &[Fairy]),
            Dark => (&[Psychic, Ghost], &[Fighting, Dark, Fairy], &[]),
            Steel => (&[Ice, Rock, Fairy], &[Fire, Water, Electric, Steel], &[]),
            Fairy => (&[Fighting, Dragon, Dark], &[Fire, Poison, Steel], &[]),
            Unknown => (&[], &[], &[]),
        };

    if immune.contains(&defend) {
        0.0
    } else if super_effective.contains(&defend) {
        2.0
    } else if resisted.contains(&defend) {
        0.5
    } else {
        1.0
    }
}

/// Product of the multipliers against every defending type.
pub fn combined_effectiveness(attack: PokemonType, defender_types: &[PokemonType]) -> f32 {
    defender_types
        .iter()
        .map(|defend| effectiveness(attack, *defend))
        .product()
}
