//! Static clinical knowledge base: care algorithms, clinical details, breed risks.
//!
//! | Collection        | Tag fields               | Used for                         |
//! |-------------------|--------------------------|----------------------------------|
//! | `algorithms`      | `nivelUsuario`, `grupo`  | level filter, geriatric ranking  |
//! | `clinicalDetails` | `especie`                | species filter (`perro_gato` = both) |
//! | `breedRisks`      | `especie`, `raza`        | species + breed alias match      |

mod entries;
mod source;
mod store;

pub use entries::{
    AlgorithmEntry, BreedRiskEntry, ClinicalDetailEntry, KnowledgeBase, BOTH_SPECIES_TAG,
    GERIATRIC_GROUP,
};
pub use source::{FileSource, KnowledgeError, KnowledgeSource, StaticSource};
pub use store::KnowledgeBaseStore;
