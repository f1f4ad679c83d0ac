//! Priority scoring.
//!
//! A fixed additive rubric over the fast-tier classification result plus
//! two content-richness signals. Deterministic and pure; the threshold
//! comparison lives with the caller's config.

use crate::types::{Category, PriorityResult};

/// Clean content length above which the richness bonus applies.
const RICH_CONTENT_LENGTH: usize = 200;

/// Category bonus tiers.
///
/// Joint contract with the classification prompt: the prompt's closed
/// category set and these tiers must change in lockstep. A category added
/// to the prompt without a tier here silently scores +0.
fn category_bonus(category: Category) -> u8 {
    match category {
        Category::TechInsight | Category::IndustryObservation | Category::ProductReview => 15,
        Category::PersonalReflection | Category::TutorialGuide => 10,
        Category::NewsFlash | Category::LifeSharing => 5,
        Category::Other => 0,
    }
}

/// Compute the final priority score in [0, 100].
///
/// `content_length` is the character count of the content after image
/// markup has been stripped.
pub fn priority_score(result: &PriorityResult, content_length: usize) -> u8 {
    let mut score: u8 = 0;

    // Attribute subtotal, max 70
    let attrs = &result.attributes;
    if attrs.has_unique_insight {
        score += 35;
    }
    if attrs.is_inspirational {
        score += 20;
    }
    if attrs.is_debatable {
        score += 10;
    }
    if attrs.is_well_written {
        score += 5;
    }

    // Category tier, max 15
    score += category_bonus(result.category);

    // Content richness, max 15
    if content_length > RICH_CONTENT_LENGTH {
        score += 10;
    }
    if result.has_image {
        score += 5;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attributes;

    fn result(category: Category, attributes: Attributes, has_image: bool) -> PriorityResult {
        PriorityResult {
            category,
            has_image,
            attributes,
        }
    }

    fn all_attributes() -> Attributes {
        Attributes {
            has_unique_insight: true,
            is_inspirational: true,
            is_well_written: true,
            is_debatable: true,
        }
    }

    #[test]
    fn test_maximum_score_is_100() {
        let r = result(Category::TechInsight, all_attributes(), true);
        assert_eq!(priority_score(&r, 250), 100);
    }

    #[test]
    fn test_minimum_score_is_0() {
        let r = result(Category::Other, Attributes::default(), false);
        assert_eq!(priority_score(&r, 50), 0);
    }

    #[test]
    fn test_attribute_weights() {
        let mut attrs = Attributes::default();
        attrs.has_unique_insight = true;
        let r = result(Category::Other, attrs, false);
        assert_eq!(priority_score(&r, 0), 35);

        let mut attrs = Attributes::default();
        attrs.is_inspirational = true;
        let r = result(Category::Other, attrs, false);
        assert_eq!(priority_score(&r, 0), 20);

        let mut attrs = Attributes::default();
        attrs.is_debatable = true;
        let r = result(Category::Other, attrs, false);
        assert_eq!(priority_score(&r, 0), 10);

        let mut attrs = Attributes::default();
        attrs.is_well_written = true;
        let r = result(Category::Other, attrs, false);
        assert_eq!(priority_score(&r, 0), 5);
    }

    #[test]
    fn test_category_tiers() {
        let tier_a = [
            Category::TechInsight,
            Category::IndustryObservation,
            Category::ProductReview,
        ];
        for c in tier_a {
            let r = result(c, Attributes::default(), false);
            assert_eq!(priority_score(&r, 0), 15, "{c} should score tier A");
        }

        let tier_b = [Category::PersonalReflection, Category::TutorialGuide];
        for c in tier_b {
            let r = result(c, Attributes::default(), false);
            assert_eq!(priority_score(&r, 0), 10, "{c} should score tier B");
        }

        let tier_c = [Category::NewsFlash, Category::LifeSharing];
        for c in tier_c {
            let r = result(c, Attributes::default(), false);
            assert_eq!(priority_score(&r, 0), 5, "{c} should score tier C");
        }
    }

    #[test]
    fn test_length_boundary() {
        let r = result(Category::Other, Attributes::default(), false);
        assert_eq!(priority_score(&r, 200), 0);
        assert_eq!(priority_score(&r, 201), 10);
    }

    #[test]
    fn test_image_bonus() {
        let r = result(Category::Other, Attributes::default(), true);
        assert_eq!(priority_score(&r, 0), 5);
    }

    #[test]
    fn test_score_bounded() {
        // Exhaustive over flags and tiers; length and image at both extremes.
        for category in Category::ALL {
            for bits in 0..16u8 {
                let attrs = Attributes {
                    has_unique_insight: bits & 1 != 0,
                    is_inspirational: bits & 2 != 0,
                    is_well_written: bits & 4 != 0,
                    is_debatable: bits & 8 != 0,
                };
                for has_image in [false, true] {
                    for length in [0, 500] {
                        let r = result(category, attrs, has_image);
                        assert!(priority_score(&r, length) <= 100);
                    }
                }
            }
        }
    }
}
