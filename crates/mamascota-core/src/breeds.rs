//! Breed catalogs and the breed alias resolver.
//!
//! UI breed labels rarely match the names used by the knowledge base ("German Shepherd" vs
//! "German Shepherd Dog"), so matching goes through per-species alias maps. All comparison
//! happens on normalized labels: lowercased, trimmed, inner whitespace collapsed.

use crate::pet::Species;
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};

/// Dog breeds offered by the breed picker.
pub const DOG_BREEDS: &[&str] = &[
    "Labrador Retriever",
    "Golden Retriever",
    "German Shepherd",
    "French Bulldog",
    "Poodle",
    "Bulldog",
    "Beagle",
    "Rottweiler",
    "Yorkshire Terrier",
    "Dachshund",
    "Boxer",
    "Corgi",
    "Chihuahua",
    "Shih Tzu",
    "Australian Shepherd",
    "Siberian Husky",
    "Doberman",
    "Pomeranian",
    "Maltese",
    "Great Dane",
    "Border Collie",
    "Cane Corso",
    "Staffordshire Terrier",
    "Jack Russell Terrier",
    "Shiba Inu",
    "Akita Inu",
    "Bichon Frise",
    "Cairn Terrier",
    "Bernese Mountain Dog",
    "Samoyed",
    "Greyhound",
    "Podenco",
    "American Pit Bull Terrier",
    "Crossbreed",
];

/// Cat breeds offered by the breed picker.
pub const CAT_BREEDS: &[&str] = &[
    "Abyssinian",
    "American Curl",
    "American Shorthair",
    "American Wirehair",
    "Bengal",
    "Birman",
    "Bombay",
    "British Shorthair",
    "Burmese",
    "Egyptian Mau",
    "European Shorthair",
    "Himalayan",
    "Japanese Bobtail",
    "Maine Coon",
    "Munchkin",
    "Norwegian Forest Cat",
    "Oriental Shorthair",
    "Persian",
    "Ragdoll",
    "Russian Blue",
    "Scottish Fold",
    "Siamese",
    "Siberian",
    "Singapura",
    "Sphynx",
    "Turkish Angora",
    "Turkish Van",
    "Metis",
];

/// UI label -> knowledge-base names, keyed by normalized label.
pub type BreedAliasMap = HashMap<String, Vec<String>>;

static DOG_BREED_ALIASES: Lazy<BreedAliasMap> = Lazy::new(|| {
    alias_map(&[
        ("German Shepherd", &["German Shepherd Dog"]),
        ("Doberman", &["Doberman Pinscher"]),
        ("Akita Inu", &["Akita"]),
        (
            "Staffordshire Terrier",
            &["American Staffordshire Terrier", "Staffordshire Bull Terrier"],
        ),
        (
            "Poodle",
            &["Poodle (Standard)", "Poodle (Miniature)", "Poodle (Toy)"],
        ),
        ("Bulldog", &["English Bulldog"]),
    ])
});

static CAT_BREED_ALIASES: Lazy<BreedAliasMap> = Lazy::new(|| {
    alias_map(&[
        ("Norwegian Forest", &["Norwegian Forest Cat"]),
        ("Oriental", &["Oriental Shorthair"]),
    ])
});

fn alias_map(entries: &[(&str, &[&str])]) -> BreedAliasMap {
    entries
        .iter()
        .map(|(label, aliases)| {
            (
                normalize_label(label),
                aliases.iter().map(|a| normalize_label(a)).collect(),
            )
        })
        .collect()
}

/// Lowercase, trim, and collapse inner whitespace to single spaces.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Picker catalog for a species; empty for species without one.
pub fn breeds_for(species: &Species) -> &'static [&'static str] {
    match species {
        Species::Dog => DOG_BREEDS,
        Species::Cat => CAT_BREEDS,
        _ => &[],
    }
}

/// Alias map for a species, if the species has one.
pub fn aliases_for(species: &Species) -> Option<&'static BreedAliasMap> {
    match species {
        Species::Dog => Some(&*DOG_BREED_ALIASES),
        Species::Cat => Some(&*CAT_BREED_ALIASES),
        _ => None,
    }
}

/// All normalized names to test against a knowledge-base `raza` field.
///
/// Always contains the normalized label itself. An absent label yields `{""}`, which the
/// breed-risk filter never matches.
pub fn resolve_candidates(species: &Species, breed_label: Option<&str>) -> BTreeSet<String> {
    let label = normalize_label(breed_label.unwrap_or_default());
    let mut candidates = BTreeSet::new();
    if !label.is_empty() {
        if let Some(map) = aliases_for(species) {
            extend_from_map(map, &label, &mut candidates);
        }
    }
    candidates.insert(label);
    candidates
}

fn extend_from_map(map: &BreedAliasMap, label: &str, out: &mut BTreeSet<String>) {
    if let Some(aliases) = map.get(label) {
        out.extend(aliases.iter().cloned());
    }
    // Reverse direction: the label is itself a registered alias.
    for (canonical, aliases) in map {
        if aliases.iter().any(|a| a == label) {
            out.insert(canonical.clone());
            out.extend(aliases.iter().cloned());
        }
    }
}
