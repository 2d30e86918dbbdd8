use super::catalog::{find_static, STATIC_DISEASES};
use crate::db::models::{DiseaseRecord, NewDisease};
use crate::db::{RepositoryError, SqliteRepository};

pub const UNKNOWN_DESCRIPTION: &str = "Informasi tidak tersedia.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoSource {
    Catalog,
    StaticTable,
    Unknown,
}

/// Human-readable metadata for one class label.
#[derive(Debug, Clone, PartialEq)]
pub struct DiseaseInfo {
    pub name: String,
    pub local_name: String,
    pub description: String,
    pub symptoms: Vec<String>,
    pub organic_treatments: Vec<String>,
    pub chemical_treatments: Vec<String>,
    pub prevention: Vec<String>,
    /// Set only when the info came from the persisted catalog.
    pub catalog_id: Option<i64>,
    pub source: InfoSource,
}

impl DiseaseInfo {
    pub fn unknown(class_label: &str) -> Self {
        Self {
            name: class_label.to_string(),
            local_name: class_label.to_string(),
            description: UNKNOWN_DESCRIPTION.to_string(),
            symptoms: Vec::new(),
            organic_treatments: Vec::new(),
            chemical_treatments: Vec::new(),
            prevention: Vec::new(),
            catalog_id: None,
            source: InfoSource::Unknown,
        }
    }
}

impl From<DiseaseRecord> for DiseaseInfo {
    fn from(record: DiseaseRecord) -> Self {
        Self {
            name: record.name,
            local_name: record.local_name,
            description: record.description,
            symptoms: record.symptoms,
            organic_treatments: record.organic_treatments,
            chemical_treatments: record.chemical_treatments,
            prevention: record.prevention,
            catalog_id: Some(record.id),
            source: InfoSource::Catalog,
        }
    }
}

impl From<&NewDisease> for DiseaseInfo {
    fn from(entry: &NewDisease) -> Self {
        Self {
            name: entry.name.clone(),
            local_name: entry.local_name.clone(),
            description: entry.description.clone(),
            symptoms: entry.symptoms.clone(),
            organic_treatments: entry.organic_treatments.clone(),
            chemical_treatments: entry.chemical_treatments.clone(),
            prevention: entry.prevention.clone(),
            catalog_id: None,
            source: InfoSource::StaticTable,
        }
    }
}

/// One step of the enrichment chain.
pub trait DiseaseLookup: Send + Sync {
    fn lookup(&self, class_label: &str) -> Option<DiseaseInfo>;
}

/// Administrator-maintained catalog in SQLite.
pub struct CatalogLookup {
    repo: SqliteRepository,
}

impl CatalogLookup {
    pub fn new(repo: SqliteRepository) -> Self {
        Self { repo }
    }
}

impl DiseaseLookup for CatalogLookup {
    fn lookup(&self, class_label: &str) -> Option<DiseaseInfo> {
        match self.repo.find_disease_by_name(class_label) {
            Ok(record) => record.map(DiseaseInfo::from),
            Err(e) => {
                log::error!("Catalog lookup for '{}' failed: {}", class_label, e);
                None
            }
        }
    }
}

pub struct StaticTableLookup;

impl DiseaseLookup for StaticTableLookup {
    fn lookup(&self, class_label: &str) -> Option<DiseaseInfo> {
        find_static(class_label).map(DiseaseInfo::from)
    }
}

/// Tries each lookup in order; the first hit wins and a synthetic record
/// covers labels nobody knows.
pub struct ResultComposer {
    strategies: Vec<Box<dyn DiseaseLookup>>,
}

impl ResultComposer {
    pub fn new(strategies: Vec<Box<dyn DiseaseLookup>>) -> Self {
        Self { strategies }
    }

    pub fn with_catalog(repo: SqliteRepository) -> Self {
        Self::new(vec![
            Box::new(CatalogLookup::new(repo)),
            Box::new(StaticTableLookup),
        ])
    }

    pub fn enrich(&self, class_label: &str) -> DiseaseInfo {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.lookup(class_label))
            .unwrap_or_else(|| DiseaseInfo::unknown(class_label))
    }
}

/// Classes listed by `/classes`: the catalog when it has rows, else the static table.
pub fn known_classes(repo: &SqliteRepository) -> Result<Vec<DiseaseInfo>, RepositoryError> {
    let records = repo.list_diseases()?;
    if records.is_empty() {
        return Ok(STATIC_DISEASES.iter().map(DiseaseInfo::from).collect());
    }
    Ok(records.into_iter().map(DiseaseInfo::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn repo() -> SqliteRepository {
        SqliteRepository::new(open_memory_database().unwrap())
    }

    fn custom_leaf_spot() -> NewDisease {
        NewDisease {
            name: "Leaf Spot".to_string(),
            local_name: "Bercak Daun (katalog)".to_string(),
            description: "from the catalog".to_string(),
            symptoms: vec!["x".to_string()],
            organic_treatments: vec![],
            chemical_treatments: vec![],
            prevention: vec![],
        }
    }

    #[test]
    fn catalog_wins_over_static_table() {
        let repo = repo();
        let (record, _) = repo.upsert_disease(&custom_leaf_spot()).unwrap();
        let info = ResultComposer::with_catalog(repo).enrich("Leaf Spot");
        assert_eq!(info.source, InfoSource::Catalog);
        assert_eq!(info.catalog_id, Some(record.id));
        assert_eq!(info.local_name, "Bercak Daun (katalog)");
    }

    #[test]
    fn static_table_covers_empty_catalog() {
        let info = ResultComposer::with_catalog(repo()).enrich("Whitefly");
        assert_eq!(info.source, InfoSource::StaticTable);
        assert_eq!(info.local_name, "Kutu Kebul");
        assert!(info.catalog_id.is_none());
    }

    #[test]
    fn unknown_label_gets_synthetic_record() {
        let info = ResultComposer::with_catalog(repo()).enrich("Blossom End Rot");
        assert_eq!(info.source, InfoSource::Unknown);
        assert_eq!(info.local_name, "Blossom End Rot");
        assert_eq!(info.description, UNKNOWN_DESCRIPTION);
        assert!(info.symptoms.is_empty());
        assert!(info.prevention.is_empty());
    }

    #[test]
    fn empty_chain_always_falls_through() {
        let info = ResultComposer::new(Vec::new()).enrich("Leaf Spot");
        assert_eq!(info.source, InfoSource::Unknown);
    }

    #[test]
    fn known_classes_prefers_populated_catalog() {
        let repo = repo();
        assert_eq!(known_classes(&repo).unwrap().len(), 9);
        repo.upsert_disease(&custom_leaf_spot()).unwrap();
        let classes = known_classes(&repo).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].source, InfoSource::Catalog);
    }
}
