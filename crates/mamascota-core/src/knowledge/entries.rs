//! Knowledge-base records and the lenient decoder for the bundled JSON.
//!
//! Only the tag fields the assembler filters on are typed. Everything else is opaque clinical
//! content carried through to the model untouched.

use serde::Serialize;
use serde_json::{Map, Value};

/// Algorithm group tag that marks guidance for older animals.
pub const GERIATRIC_GROUP: &str = "geriatrico";
/// Clinical-detail species tag meaning "applies to dogs and cats".
pub const BOTH_SPECIES_TAG: &str = "perro_gato";

/// One care-guidance algorithm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmEntry {
    #[serde(rename = "nivelUsuario", skip_serializing_if = "Option::is_none")]
    pub nivel_usuario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grupo: Option<String>,
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl AlgorithmEntry {
    pub fn from_value(value: &Value) -> Option<Self> {
        let mut content = value.as_object()?.clone();
        Some(Self {
            nivel_usuario: take_str(&mut content, "nivelUsuario"),
            grupo: take_str(&mut content, "grupo"),
            content,
        })
    }

    /// Lowercased, trimmed user level; empty when absent.
    pub fn level(&self) -> String {
        self.nivel_usuario
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default()
    }

    pub fn is_geriatric(&self) -> bool {
        self.grupo
            .as_deref()
            .is_some_and(|g| g.trim().eq_ignore_ascii_case(GERIATRIC_GROUP))
    }
}

/// Species-specific clinical note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalDetailEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub especie: Option<String>,
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl ClinicalDetailEntry {
    pub fn from_value(value: &Value) -> Option<Self> {
        let mut content = value.as_object()?.clone();
        Some(Self {
            especie: take_str(&mut content, "especie"),
            content,
        })
    }
}

/// Breed-linked risk entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreedRiskEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub especie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raza: Option<String>,
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl BreedRiskEntry {
    pub fn from_value(value: &Value) -> Option<Self> {
        let mut content = value.as_object()?.clone();
        Some(Self {
            especie: take_str(&mut content, "especie"),
            raza: take_str(&mut content, "raza"),
            content,
        })
    }
}

/// The three static collections. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBase {
    pub algorithms: Vec<AlgorithmEntry>,
    pub clinical_details: Vec<ClinicalDetailEntry>,
    pub breed_risks: Vec<BreedRiskEntry>,
}

impl KnowledgeBase {
    /// Decodes either `{algorithms, clinicalDetails, breedRisks}` or a bare algorithm array.
    /// Missing or non-array collections become empty; non-object elements are skipped.
    pub fn from_value(value: &Value) -> Self {
        if let Some(items) = value.as_array() {
            return Self {
                algorithms: decode_all(Some(items), AlgorithmEntry::from_value),
                ..Self::default()
            };
        }
        Self {
            algorithms: decode_all(
                value.get("algorithms").and_then(Value::as_array),
                AlgorithmEntry::from_value,
            ),
            clinical_details: decode_all(
                value.get("clinicalDetails").and_then(Value::as_array),
                ClinicalDetailEntry::from_value,
            ),
            breed_risks: decode_all(
                value.get("breedRisks").and_then(Value::as_array),
                BreedRiskEntry::from_value,
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty() && self.clinical_details.is_empty() && self.breed_risks.is_empty()
    }
}

fn decode_all<T>(items: Option<&Vec<Value>>, decode: fn(&Value) -> Option<T>) -> Vec<T> {
    items
        .map(|items| items.iter().filter_map(decode).collect())
        .unwrap_or_default()
}

/// Removes `key` from the map when it holds a string. Other types stay in the opaque content.
fn take_str(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(_)) => map.remove(key).and_then(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_shape_decodes_all_collections() {
        let kb = KnowledgeBase::from_value(&json!({
            "algorithms": [{ "id": "a1", "nivelUsuario": "Familiar", "grupo": "digestivo" }],
            "clinicalDetails": [{ "especie": "gato", "tema": "renal" }],
            "breedRisks": [{ "especie": "perro", "raza": "Boxer", "riesgos": ["cardio"] }]
        }));
        assert_eq!(kb.algorithms.len(), 1);
        assert_eq!(kb.algorithms[0].level(), "familiar");
        assert_eq!(kb.algorithms[0].content["id"], "a1");
        assert_eq!(kb.clinical_details[0].especie.as_deref(), Some("gato"));
        assert_eq!(kb.breed_risks[0].raza.as_deref(), Some("Boxer"));
    }

    #[test]
    fn bare_array_is_algorithm_list() {
        let kb = KnowledgeBase::from_value(&json!([{ "nivelUsuario": "familiar" }, 12]));
        assert_eq!(kb.algorithms.len(), 1);
        assert!(kb.clinical_details.is_empty());
        assert!(kb.breed_risks.is_empty());
    }

    #[test]
    fn malformed_shapes_degrade_to_empty() {
        assert!(KnowledgeBase::from_value(&json!("oops")).is_empty());
        let kb = KnowledgeBase::from_value(&json!({ "algorithms": {}, "breedRisks": null }));
        assert!(kb.is_empty());
    }

    #[test]
    fn non_string_tags_stay_opaque() {
        let entry = AlgorithmEntry::from_value(&json!({ "nivelUsuario": 3, "grupo": "geriatrico" }))
            .unwrap();
        assert_eq!(entry.nivel_usuario, None);
        assert_eq!(entry.level(), "");
        assert!(entry.is_geriatric());
        assert_eq!(entry.content["nivelUsuario"], 3);
    }

    #[test]
    fn entry_serializes_back_to_its_source_fields() {
        let source = json!({ "grupo": "piel", "id": "x", "nivelUsuario": "familiar", "pasos": [1, 2] });
        let entry = AlgorithmEntry::from_value(&source).unwrap();
        assert_eq!(serde_json::to_value(&entry).unwrap(), source);
    }
}
