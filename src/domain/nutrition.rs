//! Nutrient reports and their rendered text.
//!
//! A report holds the per-100g values of a fixed set of nutrients. Fields
//! missing from the source data are omitted from rendering, never zero-filled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Heading line of a rendered report
pub const NUTRITION_HEADER: &str = "영양소 정보 (100g 기준):";

/// Rendered when the database has no matching product
pub const NUTRITION_NOT_FOUND: &str = "영양소 정보를 찾을 수 없습니다.";

/// Rendered when the lookup itself failed (network, HTTP status, bad JSON)
pub const NUTRITION_LOOKUP_FAILED: &str = "영양소 정보를 불러오지 못했습니다.";

/// Nutrients reported, in rendering order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutrient {
    Calories,
    Protein,
    Fat,
    Carbohydrate,
    Sugar,
    Fiber,
}

impl Nutrient {
    /// All nutrients in rendering order
    pub const ALL: [Nutrient; 6] = [
        Nutrient::Calories,
        Nutrient::Protein,
        Nutrient::Fat,
        Nutrient::Carbohydrate,
        Nutrient::Sugar,
        Nutrient::Fiber,
    ];

    /// Key of this nutrient inside a product's `nutriments` object
    pub fn source_key(&self) -> &'static str {
        match self {
            Nutrient::Calories => "energy-kcal_100g",
            Nutrient::Protein => "proteins_100g",
            Nutrient::Fat => "fat_100g",
            Nutrient::Carbohydrate => "carbohydrates_100g",
            Nutrient::Sugar => "sugars_100g",
            Nutrient::Fiber => "fiber_100g",
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            Nutrient::Calories => "칼로리",
            Nutrient::Protein => "단백질",
            Nutrient::Fat => "지방",
            Nutrient::Carbohydrate => "탄수화물",
            Nutrient::Sugar => "당류",
            Nutrient::Fiber => "식이섬유",
        }
    }

    /// Display unit
    pub fn unit(&self) -> &'static str {
        match self {
            Nutrient::Calories => "kcal",
            _ => "g",
        }
    }
}

/// Per-100g nutrient values of one product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientReport {
    values: BTreeMap<Nutrient, f64>,
}

impl NutrientReport {
    /// Extract the known nutrients from a product's `nutriments` object.
    ///
    /// Numbers and numeric strings are accepted; null or non-numeric
    /// entries are treated as absent.
    pub fn from_nutriments(nutriments: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut report = Self::default();

        for nutrient in Nutrient::ALL {
            let value = match nutriments.get(nutrient.source_key()) {
                Some(serde_json::Value::Number(n)) => n.as_f64(),
                Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
                _ => None,
            };

            if let Some(value) = value.filter(|v| v.is_finite()) {
                report.values.insert(nutrient, value);
            }
        }

        report
    }

    /// Set a nutrient value
    pub fn with(mut self, nutrient: Nutrient, value: f64) -> Self {
        self.values.insert(nutrient, value);
        self
    }

    /// Get a nutrient value, if present
    pub fn get(&self, nutrient: Nutrient) -> Option<f64> {
        self.values.get(&nutrient).copied()
    }

    /// Number of nutrients present
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render as a header followed by one labeled line per present nutrient
    pub fn render(&self) -> String {
        let mut lines = vec![NUTRITION_HEADER.to_string()];

        // BTreeMap iteration follows Nutrient's declaration order
        for (nutrient, value) in &self.values {
            lines.push(format!(
                "{}: {} {}",
                nutrient.label(),
                value,
                nutrient.unit()
            ));
        }

        lines.join("\n")
    }
}

/// Outcome of a nutrition lookup
#[derive(Debug, Clone, PartialEq)]
pub enum NutritionInfo {
    /// First matching product's nutrients
    Found(NutrientReport),

    /// No product matched the search
    NotFound,
}

impl NutritionInfo {
    /// Text shown on the screen for this outcome
    pub fn render(&self) -> String {
        match self {
            NutritionInfo::Found(report) => report.render(),
            NutritionInfo::NotFound => NUTRITION_NOT_FOUND.to_string(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, NutritionInfo::Found(_))
    }
}
