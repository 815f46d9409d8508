//! Plant and disease vocabulary offered to the vision model.

/// A named group of supported plants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlantCategory {
    pub name: &'static str,
    pub plants: &'static [&'static str],
}

/// Visual cue the vision model should look for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiseasePattern {
    pub name: &'static str,
    pub cues: &'static str,
}

/// Categories in prompt order. A plant may appear in several categories.
pub const PLANT_CATEGORIES: &[PlantCategory] = &[
    PlantCategory {
        name: "lebanese_herbs",
        plants: &["Parsley", "Mint", "Cilantro", "Dill", "Thyme", "Oregano", "Rosemary", "Sage", "Basil"],
    },
    PlantCategory {
        name: "vegetables",
        plants: &[
            "Tomato", "Cucumber", "Eggplant", "Zucchini", "Cabbage", "Cauliflower",
            "Lettuce", "Radish", "Carrot", "Onion", "Garlic", "Green beans",
        ],
    },
    PlantCategory {
        name: "root_vegetables",
        plants: &["Potato", "Sweet potato", "Carrot", "Beetroot", "Turnip", "Parsnip", "Ginger", "Turmeric"],
    },
    PlantCategory {
        name: "leafy_greens",
        plants: &[
            "Spinach", "Kale", "Lettuce", "Arugula", "Swiss chard",
            "Collard greens", "Mustard greens", "Watercress", "Bok choy",
        ],
    },
    PlantCategory {
        name: "fruit_vegetables",
        plants: &[
            "Tomato", "Eggplant", "Pepper", "Cucumber", "Zucchini", "Squash",
            "Pumpkin", "Okra", "Green beans", "Pea", "Corn",
        ],
    },
    PlantCategory {
        name: "allium",
        plants: &["Onion", "Garlic", "Shallot", "Leek", "Chive", "Green onion"],
    },
    PlantCategory {
        name: "brassica",
        plants: &[
            "Cabbage", "Broccoli", "Cauliflower", "Brussels sprouts", "Kale",
            "Collard greens", "Kohlrabi",
        ],
    },
    PlantCategory {
        name: "legumes",
        plants: &["Green beans", "Lima beans", "Pea", "Chickpea", "Lentil", "Soybean", "Fava bean"],
    },
    PlantCategory {
        name: "herbs",
        plants: &[
            "Basil", "Parsley", "Cilantro", "Mint", "Dill", "Rosemary",
            "Thyme", "Oregano", "Sage", "Chive",
        ],
    },
    PlantCategory {
        name: "mediterranean",
        plants: &["Olive", "Fig", "Pomegranate", "Citrus", "Almond", "Walnut"],
    },
];

pub const DISEASE_PATTERNS: &[DiseasePattern] = &[
    DiseasePattern {
        name: "TOMATO LEAF MOLD",
        cues: "Yellow upper surface, grayish powder underneath",
    },
    DiseasePattern {
        name: "EARLY BLIGHT",
        cues: "Concentric rings on lower leaves",
    },
    DiseasePattern {
        name: "LATE BLIGHT",
        cues: "Water-soaked lesions, white mold",
    },
    DiseasePattern {
        name: "POWDERY MILDEW",
        cues: "White powder on surface",
    },
    DiseasePattern {
        name: "LEAF SPOT",
        cues: "Circular lesions with halos",
    },
];

/// Every plant across all categories, in category order, duplicates kept
pub fn all_plants() -> impl Iterator<Item = &'static str> {
    PLANT_CATEGORIES.iter().flat_map(|c| c.plants.iter().copied())
}

/// The first `limit` plants of [`all_plants`]
pub fn plant_vocabulary(limit: usize) -> Vec<&'static str> {
    all_plants().take(limit).collect()
}

pub fn category(name: &str) -> Option<&'static PlantCategory> {
    PLANT_CATEGORIES.iter().find(|c| c.name == name)
}
