//! Clinical context assembly: selects and ranks the knowledge relevant to one pet and one set
//! of reported symptoms, and renders it as grounding for the language model.
//!
//! Pipeline: normalize pet -> resolve language -> filter algorithms by user level ->
//! geriatric ranking -> species mapping -> breed-risk match -> clinical-detail filter -> render.
//! Every step is pure over the cached knowledge base, so identical inputs give identical output.

use crate::breeds::{normalize_label, resolve_candidates};
use crate::knowledge::{
    AlgorithmEntry, BreedRiskEntry, ClinicalDetailEntry, KnowledgeBase, KnowledgeBaseStore,
    BOTH_SPECIES_TAG,
};
use crate::lang::{display_name, resolve_language, DEFAULT_LANG};
use crate::pet::{self, PetProfile, Sex, Species};
use crate::symptoms::{is_known_symptom, symptom_keys_from_value};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Pets at or above this age see geriatric algorithms first; younger pets never see them.
pub const GERIATRIC_AGE_YEARS: f64 = 7.0;
/// Default audience tier for algorithms.
pub const DEFAULT_LEVEL_FILTER: &str = "familiar";
/// Level-filter sentinel that admits every algorithm with a non-empty level.
pub const ALL_LEVELS: &str = "all";
/// Rendered instead of a symptom list when none were reported.
pub const NO_SYMPTOMS_SENTENCE: &str = "No specific symptoms reported.";
/// Message of the structured failure payload.
pub const ASSEMBLY_FAILED_MESSAGE: &str = "Could not build the clinical context.";

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("summary rendering failed: {0}")]
    Render(#[from] std::fmt::Error),

    #[error("context serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Inputs of one assembly. Built leniently from JSON by `from_value`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyRequest {
    /// Raw pet record; normalized during assembly.
    pub pet: Value,
    pub symptom_keys: Vec<String>,
    pub user_lang: Option<String>,
    pub level_filter: String,
}

impl AssemblyRequest {
    pub fn new(pet: Value) -> Self {
        Self {
            pet,
            symptom_keys: Vec::new(),
            user_lang: None,
            level_filter: DEFAULT_LEVEL_FILTER.to_string(),
        }
    }

    pub fn with_symptoms<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symptom_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.user_lang = Some(lang.into());
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level_filter = level.into();
        self
    }

    /// `{pet, symptomKeys, userLang, nivelFilter}`; every field optional and type-tolerant.
    pub fn from_value(input: &Value) -> Self {
        let level_filter = input
            .get("nivelFilter")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_LEVEL_FILTER)
            .to_string();
        Self {
            pet: input.get("pet").cloned().unwrap_or(Value::Null),
            symptom_keys: symptom_keys_from_value(input.get("symptomKeys")),
            user_lang: input
                .get("userLang")
                .and_then(Value::as_str)
                .map(str::to_string),
            level_filter,
        }
    }
}

/// Per-turn grounding payload. Transient: built for one chat turn and never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledContext {
    pub pet: PetProfile,
    #[serde(rename = "userLang")]
    pub user_lang: String,
    #[serde(rename = "symptomKeys")]
    pub symptom_keys: Vec<String>,
    #[serde(rename = "nivelUsuario")]
    pub level_filter: String,
    pub algorithms: Vec<AlgorithmEntry>,
    pub clinical_details_for_species: Vec<ClinicalDetailEntry>,
    pub breed_risks_for_pet: Vec<BreedRiskEntry>,
    /// Compatibility duplicate of `algorithms` for older prompt profiles.
    #[serde(rename = "knowledgeBase")]
    pub knowledge_base: Vec<AlgorithmEntry>,
    /// Human-readable summary block.
    pub context: String,
}

impl AssembledContext {
    pub fn to_json(&self) -> Result<String, ContextError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// `{error, details}`: what callers receive instead of a context when assembly fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyFailure {
    pub error: String,
    pub details: String,
}

impl From<ContextError> for AssemblyFailure {
    fn from(e: ContextError) -> Self {
        Self {
            error: ASSEMBLY_FAILED_MESSAGE.to_string(),
            details: e.to_string(),
        }
    }
}

/// Success or structured failure. Serializes to exactly one of the two wire shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContextPayload {
    Assembled(Box<AssembledContext>),
    Failed(AssemblyFailure),
}

impl ContextPayload {
    /// JSON text of the payload; a serialization failure is itself reported as the error shape.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "error": ASSEMBLY_FAILED_MESSAGE,
                "details": e.to_string(),
            })
            .to_string()
        })
    }
}

/// Reads the knowledge base store and builds one `AssembledContext` per call.
pub struct ContextAssembler {
    store: Arc<KnowledgeBaseStore>,
    default_lang: String,
}

impl ContextAssembler {
    pub fn new(store: Arc<KnowledgeBaseStore>) -> Self {
        Self {
            store,
            default_lang: DEFAULT_LANG.to_string(),
        }
    }

    /// Language used when neither the request nor the pet record names one.
    pub fn with_default_lang(mut self, lang: impl Into<String>) -> Self {
        self.default_lang = lang.into();
        self
    }

    /// Never panics or propagates: failures come back as `ContextPayload::Failed`.
    pub async fn assemble(&self, request: &AssemblyRequest) -> ContextPayload {
        let kb = self.store.load().await;
        match assemble_with(&kb, request, &self.default_lang) {
            Ok(ctx) => ContextPayload::Assembled(Box::new(ctx)),
            Err(e) => {
                error!("Context assembly failed: {}", e);
                ContextPayload::Failed(e.into())
            }
        }
    }

    /// JSON in, JSON out: the boundary used by non-Rust callers.
    pub async fn assemble_value(&self, input: &Value) -> Value {
        let payload = self.assemble(&AssemblyRequest::from_value(input)).await;
        serde_json::to_value(&payload).unwrap_or_else(|e| {
            serde_json::json!({ "error": ASSEMBLY_FAILED_MESSAGE, "details": e.to_string() })
        })
    }
}

/// Pure assembly over an already-loaded knowledge base.
pub fn assemble_with(
    kb: &KnowledgeBase,
    request: &AssemblyRequest,
    default_lang: &str,
) -> Result<AssembledContext, ContextError> {
    let pet = pet::normalize(&request.pet);
    let lang = resolve_language(
        request.user_lang.as_deref(),
        pet::pet_language(&request.pet).as_deref(),
        default_lang,
    );
    debug!(pet = %pet.name, lang = %lang, "Assembling clinical context");
    let unknown: Vec<&str> = request
        .symptom_keys
        .iter()
        .map(String::as_str)
        .filter(|k| !is_known_symptom(k))
        .collect();
    if !unknown.is_empty() {
        debug!(?unknown, "Symptom keys outside the selector vocabulary, rendered verbatim");
    }

    let by_level = filter_by_level(&kb.algorithms, &request.level_filter);
    debug!(
        level = %request.level_filter,
        count = by_level.len(),
        "Algorithms after level filter"
    );
    let algorithms = rank_for_age(by_level, &pet);

    let breed_risks = breed_risks_for(&kb.breed_risks, &pet);
    let clinical_details = clinical_details_for(&kb.clinical_details, &pet.species);
    info!(
        species = %pet.species,
        breed = pet.breed.as_deref().unwrap_or("-"),
        algorithms = algorithms.len(),
        clinical_details = clinical_details.len(),
        breed_risks = breed_risks.len(),
        "Clinical context assembled"
    );

    let context = render_summary(&pet, &lang, &request.symptom_keys)?;

    Ok(AssembledContext {
        knowledge_base: algorithms.clone(),
        pet,
        user_lang: lang,
        symptom_keys: request.symptom_keys.clone(),
        level_filter: request.level_filter.clone(),
        algorithms,
        clinical_details_for_species: clinical_details,
        breed_risks_for_pet: breed_risks,
        context,
    })
}

/// Entries whose level equals the filter (case-insensitive); `all` admits any non-empty level.
/// Entries without a level never pass.
pub fn filter_by_level<'a>(algorithms: &'a [AlgorithmEntry], filter: &str) -> Vec<&'a AlgorithmEntry> {
    let filter = filter.trim().to_lowercase();
    algorithms
        .iter()
        .filter(|alg| {
            let level = alg.level();
            !level.is_empty() && (filter == ALL_LEVELS || level == filter)
        })
        .collect()
}

/// Geriatric entries first for pets aged 7+, otherwise geriatric entries are dropped.
/// Relative order inside each group is preserved.
pub fn rank_for_age(filtered: Vec<&AlgorithmEntry>, pet: &PetProfile) -> Vec<AlgorithmEntry> {
    let (geriatric, general): (Vec<&AlgorithmEntry>, Vec<&AlgorithmEntry>) =
        filtered.into_iter().partition(|alg| alg.is_geriatric());
    if pet.is_geriatric() {
        debug!(geriatric = geriatric.len(), "Senior pet: geriatric algorithms first");
        geriatric.into_iter().chain(general).cloned().collect()
    } else {
        debug!(excluded = geriatric.len(), "Young or unaged pet: geriatric algorithms excluded");
        general.into_iter().cloned().collect()
    }
}

/// Risks tagged with the pet's knowledge-base species whose breed is one of the alias candidates.
pub fn breed_risks_for(risks: &[BreedRiskEntry], pet: &PetProfile) -> Vec<BreedRiskEntry> {
    let Some(tag) = pet.species.kb_tag() else {
        return Vec::new();
    };
    let candidates = resolve_candidates(&pet.species, pet.breed.as_deref());
    let matched: Vec<BreedRiskEntry> = risks
        .iter()
        .filter(|risk| {
            let especie = normalize_label(risk.especie.as_deref().unwrap_or_default());
            let raza = normalize_label(risk.raza.as_deref().unwrap_or_default());
            especie == tag && !raza.is_empty() && candidates.contains(&raza)
        })
        .cloned()
        .collect();
    debug!(
        breed = pet.breed.as_deref().unwrap_or("-"),
        matched = matched.len(),
        "Breed matching"
    );
    matched
}

/// Details for the pet's species plus those shared by dogs and cats.
pub fn clinical_details_for(
    details: &[ClinicalDetailEntry],
    species: &Species,
) -> Vec<ClinicalDetailEntry> {
    let Some(tag) = species.kb_tag() else {
        return Vec::new();
    };
    details
        .iter()
        .filter(|detail| {
            let especie = normalize_label(detail.especie.as_deref().unwrap_or_default());
            especie == tag || especie == BOTH_SPECIES_TAG
        })
        .cloned()
        .collect()
}

/// Plain-text patient summary embedded in the payload.
pub fn render_summary(
    pet: &PetProfile,
    lang: &str,
    symptom_keys: &[String],
) -> Result<String, ContextError> {
    let species = pet
        .species_label
        .as_deref()
        .unwrap_or_else(|| pet.species.code());
    let sex = match pet.sex {
        Sex::Male => "male",
        Sex::Female => "female",
        Sex::Unspecified => "not specified",
    };
    let age = pet
        .age_years
        .map(|a| format!("{} years", a))
        .unwrap_or_else(|| "no data".to_string());

    let mut out = String::new();
    writeln!(out, "Patient clinical context:")?;
    writeln!(out, "Name: {}", pet.name)?;
    writeln!(out, "Species: {}", species)?;
    writeln!(out, "Breed: {}", pet.breed.as_deref().unwrap_or("not specified"))?;
    writeln!(out, "Sex: {}", sex)?;
    writeln!(out, "Age: {}", age)?;
    writeln!(out, "Neutered: {}", if pet.neutered { "yes" } else { "no" })?;
    writeln!(out)?;
    writeln!(out, "User language: {}", display_name(lang))?;
    if symptom_keys.is_empty() {
        write!(out, "{}", NO_SYMPTOMS_SENTENCE)?;
    } else {
        write!(out, "Reported symptoms: {}.", symptom_keys.join(", "))?;
    }
    Ok(out)
}
