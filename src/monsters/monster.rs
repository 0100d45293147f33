use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PokemonType {
    Normal, Fire, Water, Grass, Electric, Ice, Fighting, Poison, Ground,
    Flying, Psychic, Bug, Rock, Ghost, Dragon, Steel, Dark, Fairy,
    /// Anything the type chart does not know; neutral both ways.
    Unknown,
}

impl PokemonType {
    /// Parses a single title-cased token. Unrecognised names become `Unknown`.
    pub fn from_name(name: &str) -> PokemonType {
        match name {
            "Normal" => PokemonType::Normal,
            "Fire" => PokemonType::Fire,
            "Water" => PokemonType::Water,
            "Grass" => PokemonType::Grass,
            "Electric" => PokemonType::Electric,
            "Ice" => PokemonType::Ice,
            "Fighting" => PokemonType::Fighting,
            "Poison" => PokemonType::Poison,
            "Ground" => PokemonType::Ground,
            "Flying" => PokemonType::Flying,
            "Psychic" => PokemonType::Psychic,
            "Bug" => PokemonType::Bug,
            "Rock" => PokemonType::Rock,
            "Ghost" => PokemonType::Ghost,
            "Dragon" => PokemonType::Dragon,
            "Steel" => PokemonType::Steel,
            "Dark" => PokemonType::Dark,
            "Fairy" => PokemonType::Fairy,
            _ => PokemonType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PokemonType::Normal => "Normal",
            PokemonType::Fire => "Fire",
            PokemonType::Water => "Water",
            PokemonType::Grass => "Grass",
            PokemonType::Electric => "Electric",
            PokemonType::Ice => "Ice",
            PokemonType::Fighting => "Fighting",
            PokemonType::Poison => "Poison",
            PokemonType::Ground => "Ground",
            PokemonType::Flying => "Flying",
            PokemonType::Psychic => "Psychic",
            PokemonType::Bug => "Bug",
            PokemonType::Rock => "Rock",
            PokemonType::Ghost => "Ghost",
            PokemonType::Dragon => "Dragon",
            PokemonType::Steel => "Steel",
            PokemonType::Dark => "Dark",
            PokemonType::Fairy => "Fairy",
            PokemonType::Unknown => "Unknown",
        }
    }

    /// Types whose moves default to the special damage class.
    pub fn is_special_leaning(&self) -> bool {
        matches!(
            self,
            PokemonType::Fire
                | PokemonType::Water
                | PokemonType::Electric
                | PokemonType::Grass
                | PokemonType::Ice
                | PokemonType::Psychic
                | PokemonType::Dragon
                | PokemonType::Dark
        )
    }
}

impl fmt::Display for PokemonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn type_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"[/|,]").expect("static regex"))
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

/// Splits a catalog type field such as `"Fire/Flying"` into distinct types, keeping order.
/// An empty or missing field yields `[Unknown]`.
pub fn parse_types(raw: Option<&str>) -> Vec<PokemonType> {
    let mut types = Vec::new();
    if let Some(raw) = raw {
        for token in type_separator().split(raw) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let parsed = PokemonType::from_name(&title_case(token));
            if !types.contains(&parsed) {
                types.push(parsed);
            }
        }
    }
    if types.is_empty() {
        types.push(PokemonType::Unknown);
    }
    types
}

/// Catalog record for a collectible unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitDetails {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rarity: String,
    #[serde(default)]
    pub region: String,
    #[serde(default, rename = "type")]
    pub type_field: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_types_splits_and_title_cases() {
        assert_eq!(
            parse_types(Some("fire/FLYING")),
            vec![PokemonType::Fire, PokemonType::Flying]
        );
        assert_eq!(
            parse_types(Some(" Water | grass , ice ")),
            vec![PokemonType::Water, PokemonType::Grass, PokemonType::Ice]
        );
    }

    #[test]
    fn test_parse_types_dedupes_preserving_order() {
        assert_eq!(
            parse_types(Some("Dragon,dragon/Fire")),
            vec![PokemonType::Dragon, PokemonType::Fire]
        );
    }

    #[test]
    fn test_parse_types_empty_is_unknown() {
        assert_eq!(parse_types(None), vec![PokemonType::Unknown]);
        assert_eq!(parse_types(Some(" / ,")), vec![PokemonType::Unknown]);
        assert_eq!(parse_types(Some("Cosmic")), vec![PokemonType::Unknown]);
    }

    #[test]
    fn test_special_leaning_set() {
        assert!(PokemonType::Fire.is_special_leaning());
        assert!(PokemonType::Dark.is_special_leaning());
        assert!(!PokemonType::Normal.is_special_leaning());
        assert!(!PokemonType::Fighting.is_special_leaning());
        assert!(!PokemonType::Unknown.is_special_leaning());
    }
}
