use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::collaborators::UnitCatalog;
use crate::errors::CollaboratorError;

use super::UnitDetails;

/// Unit catalog loaded from a JSON array of unit records.
#[derive(Debug, Default)]
pub struct UnitCatalogRepository {
    pub units: HashMap<String, UnitDetails>,
}

impl UnitCatalogRepository {
    pub fn new(units_path: &str) -> Arc<Self> {
        let units = Self::load_units(units_path);
        info!("Loaded {} catalog units from {}", units.len(), units_path);
        Self::from_units(units)
    }

    pub fn from_units(units: Vec<UnitDetails>) -> Arc<Self> {
        let units = units.into_iter().map(|unit| (unit.id.clone(), unit)).collect();
        Arc::new(UnitCatalogRepository { units })
    }

    fn load_units(path: &str) -> Vec<UnitDetails> {
        match File::open(Path::new(path)) {
            Ok(file) => {
                let reader = BufReader::new(file);
                match serde_json::from_reader(reader) {
                    Ok(units) => units,
                    Err(e) => {
                        warn!("Failed to parse units JSON: {}", e);
                        Vec::new()
                    }
                }
            },
            Err(e) => {
                warn!("Failed to open units file {}: {}", path, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl UnitCatalog for UnitCatalogRepository {
    async fn get_unit_details(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, UnitDetails>, CollaboratorError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.units.get(id).map(|unit| (id.clone(), unit.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_ids_are_skipped() {
        let catalog = UnitCatalogRepository::from_units(vec![UnitDetails {
            id: "25".to_string(),
            name: "Pikachu".to_string(),
            rarity: "Rare".to_string(),
            region: "Kanto".to_string(),
            type_field: Some("Electric".to_string()),
            image: None,
        }]);

        let details = catalog
            .get_unit_details(&["25".to_string(), "999".to_string()])
            .await
            .unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details["25"].name, "Pikachu");
    }

    #[test]
    fn test_missing_file_yields_empty_catalog() {
        let catalog = UnitCatalogRepository::new("does/not/exist.json");
        assert!(catalog.units.is_empty());
    }
}
