use std::fmt::Write;
use crate::taxonomy::{self, DISEASE_PATTERNS};

/// How many plants are named before the list is cut off with `...`
pub const PROMPT_PLANT_LIMIT: usize = 20;

/// Field names the reply template asks for
pub const REPLY_FIELDS: [&str; 7] = [
    "plant_species",
    "disease_name",
    "confidence",
    "visual_symptoms",
    "treatment",
    "prevention",
    "severity",
];

/// The plant pathologist instruction sent along with every image.
pub fn analysis_prompt() -> String {
    let plants = taxonomy::plant_vocabulary(PROMPT_PLANT_LIMIT).join(", ");

    let mut prompt = String::new();
    prompt.push_str("EXPERT PLANT PATHOLOGIST - Enhanced Analysis Required\n\n");
    prompt.push_str("Analyze this plant image with precision:\n\n");
    let _ = writeln!(prompt, "1. IDENTIFY PLANT from: {plants}...\n");

    prompt.push_str("2. DISEASE DETECTION - Look specifically for:\n");
    for pattern in DISEASE_PATTERNS {
        let _ = writeln!(prompt, "- {}: {}", pattern.name, pattern.cues);
    }

    prompt.push_str(
        "\n3. VISUAL ANALYSIS:\n\
         - Color patterns (yellowing, browning, spots)\n\
         - Texture (powdery, smooth, rough)\n\
         - Location on plant\n\
         - Pattern distribution\n\n\
         4. ENVIRONMENTAL FACTORS:\n\
         - Humidity indicators\n\
         - Temperature stress signs\n\
         - Nutrient deficiency patterns\n\n\
         CRITICAL: Be especially alert for TOMATO LEAF MOLD - it has very specific visual patterns!\n\n\
         Respond with exact JSON:\n",
    );
    prompt.push_str(REPLY_TEMPLATE);
    prompt
}

const REPLY_TEMPLATE: &str = r#"{
    "plant_species": "exact plant name",
    "disease_name": "specific disease or 'healthy'",
    "confidence": 0.95,
    "visual_symptoms": "detailed visual description",
    "treatment": "specific treatment steps",
    "prevention": "prevention measures",
    "severity": "mild/moderate/severe"
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_first_twenty_plants() {
        let prompt = analysis_prompt();
        assert!(prompt.contains("Parsley, Mint, Cilantro"));
        assert!(prompt.contains("Carrot, Onion, Garlic..."));
        // Twenty-first entry onwards is cut off
        assert!(!prompt.contains("Green beans"));
    }

    #[test]
    fn test_prompt_names_every_disease_pattern() {
        let prompt = analysis_prompt();
        for pattern in DISEASE_PATTERNS {
            assert!(prompt.contains(pattern.name), "missing {}", pattern.name);
        }
    }

    #[test]
    fn test_reply_template_is_valid_json() {
        let template: serde_json::Value = serde_json::from_str(REPLY_TEMPLATE).unwrap();
        for field in REPLY_FIELDS {
            assert!(template.get(field).is_some(), "missing {field}");
        }
    }
}
