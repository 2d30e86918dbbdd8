pub mod catalog;
pub mod composer;

pub use catalog::{seed_catalog, STATIC_DISEASES};
pub use composer::{known_classes, DiseaseInfo, DiseaseLookup, InfoSource, ResultComposer};
