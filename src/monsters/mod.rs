pub mod monster;
pub mod monster_manager;
pub mod move_manager;
pub mod rarity;

pub use monster::{parse_types, PokemonType, UnitDetails};
pub use monster_manager::UnitCatalogRepository;
pub use move_manager::MoveRepository;
