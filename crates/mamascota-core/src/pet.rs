//! Pet profile normalizer.
//! Turns any pet-like JSON value (partial, malformed, or null) into a complete `PetProfile`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Placeholder used when the record carries no usable name.
pub const NAME_PLACEHOLDER: &str = "Unspecified name";
/// Placeholder code for absent species and sex.
pub const UNSPECIFIED: &str = "unspecified";

/// Species code as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Species {
    Dog,
    Cat,
    Rabbit,
    Ferret,
    Bird,
    Rodent,
    Reptile,
    Fish,
    Exotic,
    /// Any other non-empty code, kept lowercased.
    Other(String),
    Unspecified,
}

impl Species {
    /// Case-insensitive parse; blank input is `Unspecified`.
    pub fn parse(code: &str) -> Self {
        let code = code.trim().to_lowercase();
        match code.as_str() {
            "" => Species::Unspecified,
            "dog" => Species::Dog,
            "cat" => Species::Cat,
            "rabbit" => Species::Rabbit,
            "ferret" => Species::Ferret,
            "bird" => Species::Bird,
            "rodent" => Species::Rodent,
            "reptile" => Species::Reptile,
            "fish" => Species::Fish,
            "exotic" => Species::Exotic,
            UNSPECIFIED => Species::Unspecified,
            _ => Species::Other(code),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
            Species::Rabbit => "rabbit",
            Species::Ferret => "ferret",
            Species::Bird => "bird",
            Species::Rodent => "rodent",
            Species::Reptile => "reptile",
            Species::Fish => "fish",
            Species::Exotic => "exotic",
            Species::Other(code) => code,
            Species::Unspecified => UNSPECIFIED,
        }
    }

    /// Species tag used by the knowledge base. Only dogs and cats are covered.
    pub fn kb_tag(&self) -> Option<&'static str> {
        match self {
            Species::Dog => Some("perro"),
            Species::Cat => Some("gato"),
            _ => None,
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Species {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Species {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Species::parse(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Unspecified,
}

impl Sex {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "male" | "m" => Sex::Male,
            "female" | "f" => Sex::Female,
            _ => Sex::Unspecified,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Unspecified => UNSPECIFIED,
        }
    }
}

/// Fully-defaulted pet record. Every field is present after `normalize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetProfile {
    pub id: Option<String>,
    pub name: String,
    pub species: Species,
    /// Pre-localized display word for the species (e.g. "Perra", "Кот").
    pub species_label: Option<String>,
    pub breed: Option<String>,
    pub sex: Sex,
    /// Whole ages serialize without a fraction (`9`, not `9.0`).
    #[serde(serialize_with = "serialize_age")]
    pub age_years: Option<f64>,
    pub neutered: bool,
}

impl Default for PetProfile {
    fn default() -> Self {
        normalize(&Value::Null)
    }
}

impl PetProfile {
    pub fn is_geriatric(&self) -> bool {
        matches!(self.age_years, Some(age) if age >= crate::context::GERIATRIC_AGE_YEARS)
    }
}

/// Total normalizer: never fails, never leaves a field undefined.
pub fn normalize(input: &Value) -> PetProfile {
    PetProfile {
        id: input.get("id").and_then(id_value),
        name: non_empty_str(input.get("name")).unwrap_or_else(|| NAME_PLACEHOLDER.to_string()),
        species: non_empty_str(input.get("species"))
            .map(|s| Species::parse(&s))
            .unwrap_or(Species::Unspecified),
        species_label: non_empty_str(input.get("speciesLabel")),
        breed: non_empty_str(input.get("breed")),
        sex: non_empty_str(input.get("sex"))
            .map(|s| Sex::parse(&s))
            .unwrap_or(Sex::Unspecified),
        age_years: input.get("ageYears").and_then(age_value),
        neutered: input.get("neutered").map(truthy).unwrap_or(false),
    }
}

/// Language hint carried on the raw pet record (`lang`), if any.
pub fn pet_language(input: &Value) -> Option<String> {
    non_empty_str(input.get("lang"))
}

/// True when the raw record names a species. The chat endpoint rejects records without one.
pub fn has_species(input: &Value) -> bool {
    non_empty_str(input.get("species")).is_some()
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn age_value(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .filter(|age| age.is_finite() && *age >= 0.0)
}

fn serialize_age<S: Serializer>(age: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match age {
        Some(a) if a.fract() == 0.0 && *a <= u64::MAX as f64 => serializer.serialize_some(&(*a as u64)),
        Some(a) => serializer.serialize_some(a),
        None => serializer.serialize_none(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
