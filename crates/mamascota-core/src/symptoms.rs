//! Symptom vocabulary offered by the symptom selector.
//! The assembler accepts any key; this list is what the client presents.

pub const SYMPTOM_KEYS: &[&str] = &[
    // general condition
    "lethargy",
    "appetite_loss",
    "weight_loss",
    // digestive
    "vomiting",
    "diarrhea",
    "constipation",
    // respiratory
    "cough",
    "breathing_difficulty",
    "sneezing",
    // locomotion and pain
    "limping",
    "pain_signs",
    // urinary
    "drinking_too_much",
    "urinating_too_often",
    "blood_in_urine",
    // skin, ears, eyes
    "itching_skin",
    "skin_lesions",
    "ear_problems",
    "eye_problems",
    // behaviour and neurology
    "behavior_change",
    "anxiety_stress",
    "seizures",
    "collapse_fainting",
    // free text entered by the user
    "custom",
];

pub fn is_known_symptom(key: &str) -> bool {
    SYMPTOM_KEYS.contains(&key)
}

/// Lenient decode of a `symptomKeys` value: non-arrays become empty, non-string and blank
/// entries are dropped.
pub fn symptom_keys_from_value(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_decode() {
        let v = json!(["cough", 3, "", " vomiting ", null]);
        assert_eq!(symptom_keys_from_value(Some(&v)), vec!["cough", "vomiting"]);
        assert!(symptom_keys_from_value(Some(&json!("cough"))).is_empty());
        assert!(symptom_keys_from_value(None).is_empty());
    }

    #[test]
    fn vocabulary() {
        assert!(is_known_symptom("seizures"));
        assert!(!is_known_symptom("hiccups"));
    }
}
