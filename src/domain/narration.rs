//! Display strings and narration text assembly.
//!
//! Narration is built from what the screen currently shows: the decorated
//! prediction label and the rendered nutrition text.

use std::sync::OnceLock;

use regex::Regex;

use super::nutrition::{NUTRITION_LOOKUP_FAILED, NUTRITION_NOT_FOUND};
use super::prediction::Prediction;

/// Prefix of the displayed prediction label
pub const PREDICTION_PREFIX: &str = "예측: ";

/// Shown in place of a prediction while the model is not loaded
pub const MODEL_LOADING: &str = "모델을 불러오는 중입니다...";

/// Narrated when there is neither a label nor nutrition text
pub const NO_RESULT: &str = "결과가 없습니다.";

/// Usage guide spoken when the mascot is clicked
pub const INTRO_TEXT: &str = "카메라로 음식 사진을 찍으면 음식의 정보를 알려줄게.";

/// Prefix of the alert raised when the camera cannot be opened
pub const CAMERA_DENIED_PREFIX: &str = "카메라 접근이 불가합니다: ";

/// Parenthesized confidence suffix, e.g. "(92.3%)"
fn confidence_suffix() -> &'static Regex {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    SUFFIX.get_or_init(|| Regex::new(r"\(.*\)").expect("static regex is valid"))
}

/// Display text for a best prediction: `예측: apple (92.3%)`
pub fn format_label(prediction: &Prediction) -> String {
    format!(
        "{}{} ({:.1}%)",
        PREDICTION_PREFIX,
        prediction.label,
        prediction.percent()
    )
}

/// Recover the bare food name from a displayed label
pub fn strip_label(displayed: &str) -> String {
    let without_prefix = displayed.replacen(PREDICTION_PREFIX, "", 1);
    confidence_suffix()
        .replace(&without_prefix, "")
        .trim()
        .to_string()
}

/// Build the text to narrate from the displayed label and nutrition text
pub fn compose_narration(displayed_label: &str, displayed_nutrition: &str) -> String {
    let food = strip_label(displayed_label);
    let nutrition = displayed_nutrition.replace('\n', " ");
    let nutrition = nutrition.trim();

    let mut text = String::new();
    if !food.is_empty() {
        text.push_str(&format!("{} 입니다. ", food));
    }
    if !nutrition.is_empty()
        && nutrition != NUTRITION_NOT_FOUND
        && nutrition != NUTRITION_LOOKUP_FAILED
    {
        text.push_str(nutrition);
    }

    if text.is_empty() {
        return NO_RESULT.to_string();
    }
    // No trailing space after "입니다." when there is no nutrition text
    text.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::nutrition::NUTRITION_HEADER;

    #[test]
    fn test_format_label_one_decimal() {
        let label = format_label(&Prediction::new("apple", 0.9234));
        assert_eq!(label, "예측: apple (92.3%)");
    }

    #[test]
    fn test_strip_label_removes_decorations() {
        assert_eq!(strip_label("예측: apple (92.3%)"), "apple");
        assert_eq!(strip_label("  apple  "), "apple");
        assert_eq!(strip_label(""), "");
    }

    #[test]
    fn test_narration_combines_food_and_nutrition() {
        let nutrition = format!("{}\n단백질: 5 g", NUTRITION_HEADER);
        let text = compose_narration("예측: apple (92.3%)", &nutrition);

        assert_eq!(
            text,
            format!("apple 입니다. {} 단백질: 5 g", NUTRITION_HEADER)
        );
    }

    #[test]
    fn test_narration_skips_not_found_sentinel() {
        let text = compose_narration("예측: kimchi (80.0%)", NUTRITION_NOT_FOUND);
        assert_eq!(text, "kimchi 입니다.");
    }

    #[test]
    fn test_narration_empty_falls_back_to_no_result() {
        assert_eq!(compose_narration("", NUTRITION_NOT_FOUND), NO_RESULT);
        assert_eq!(compose_narration("", ""), NO_RESULT);
        assert_eq!(compose_narration("", NUTRITION_LOOKUP_FAILED), NO_RESULT);
    }
}
