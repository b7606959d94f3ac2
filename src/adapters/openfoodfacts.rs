//! Open Food Facts search client.
//!
//! Endpoint: GET /cgi/search.pl
//! Query: search_terms, search_simple=1, action=process, json=1, page_size=1

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use super::NutritionSource;
use crate::config::NutritionSettings;
use crate::domain::{NutrientReport, NutritionInfo};

/// Errors that can occur during a nutrition lookup
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("nutrition request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("food database returned HTTP {0}")]
    Status(u16),

    #[error("invalid food database response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Search response body (only the fields we read)
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    nutriments: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Turn a search response body into a lookup outcome.
///
/// Only the first product is considered; there is no disambiguation.
pub fn parse_search_response(body: &str) -> Result<NutritionInfo, LookupError> {
    let response: SearchResponse = serde_json::from_str(body)?;

    let Some(product) = response.products.into_iter().next() else {
        return Ok(NutritionInfo::NotFound);
    };

    debug!(product = ?product.product_name, "Using first matching product");

    let report = product
        .nutriments
        .as_ref()
        .map(NutrientReport::from_nutriments)
        .unwrap_or_default();

    Ok(NutritionInfo::Found(report))
}

/// Open Food Facts client
pub struct OpenFoodFactsClient {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenFoodFactsClient {
    /// Create a new client
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("foodlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: endpoint.into(),
            timeout,
            client,
        }
    }

    /// Create from config
    pub fn from_settings(settings: &NutritionSettings) -> Self {
        Self::new(settings.endpoint.clone(), settings.timeout())
    }

    /// Query parameters for a search
    fn search_query(food_name: &str) -> [(&'static str, &str); 5] {
        [
            ("search_terms", food_name),
            ("search_simple", "1"),
            ("action", "process"),
            ("json", "1"),
            ("page_size", "1"),
        ]
    }
}

#[async_trait]
impl NutritionSource for OpenFoodFactsClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_nutrition_info(&self, food_name: &str) -> Result<NutritionInfo, LookupError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&Self::search_query(food_name))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_search_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::nutrition::{NUTRITION_HEADER, NUTRITION_NOT_FOUND};
    use crate::domain::Nutrient;

    #[test]
    fn test_empty_products_is_not_found() {
        let info = parse_search_response(r#"{"products": []}"#).unwrap();
        assert_eq!(info, NutritionInfo::NotFound);
        assert_eq!(info.render(), NUTRITION_NOT_FOUND);
    }

    #[test]
    fn test_missing_products_is_not_found() {
        let info = parse_search_response(r#"{"count": 0}"#).unwrap();
        assert_eq!(info, NutritionInfo::NotFound);
    }

    #[test]
    fn test_first_product_only() {
        let body = r#"{
            "products": [
                {"product_name": "Apple", "nutriments": {"proteins_100g": 5}},
                {"product_name": "Apple pie", "nutriments": {"fat_100g": 12}}
            ]
        }"#;

        let info = parse_search_response(body).unwrap();
        match &info {
            NutritionInfo::Found(report) => {
                assert_eq!(report.get(Nutrient::Protein), Some(5.0));
                assert_eq!(report.get(Nutrient::Fat), None);
            }
            NutritionInfo::NotFound => panic!("Expected a product"),
        }
        assert_eq!(info.render(), format!("{}\n단백질: 5 g", NUTRITION_HEADER));
    }

    #[test]
    fn test_product_without_nutriments_renders_header_only() {
        let info = parse_search_response(r#"{"products": [{"product_name": "Mystery"}]}"#).unwrap();
        assert_eq!(info.render(), NUTRITION_HEADER);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let result = parse_search_response("<html>502 Bad Gateway</html>");
        assert!(matches!(result, Err(LookupError::Parse(_))));
    }

    #[test]
    fn test_search_query_parameters() {
        let query = OpenFoodFactsClient::search_query("김치 찌개");
        assert_eq!(query[0], ("search_terms", "김치 찌개"));
        assert!(query.contains(&("page_size", "1")));
        assert!(query.contains(&("search_simple", "1")));
    }
}
