//! Keyword-based spending category classification.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::receipt::Category;

use super::{ExtractionMatch, FieldExtractor};

const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Groceries,
        &[
            "grocery", "supermarket", "market", "food", "walmart", "target", "kroger", "safeway",
            "whole foods", "trader joe", "costco", "sam's club",
        ],
    ),
    (
        Category::Restaurants,
        &[
            "restaurant", "cafe", "coffee", "pizza", "burger", "mcdonald", "subway", "starbucks",
            "dunkin", "kfc", "taco bell", "chipotle", "dining",
        ],
    ),
    (
        Category::Utilities,
        &[
            "electric", "gas", "water", "internet", "phone", "cable", "utility", "verizon", "at&t",
            "comcast", "spectrum", "pge", "edison",
        ],
    ),
    (
        Category::Transportation,
        &[
            "gas station", "fuel", "uber", "lyft", "taxi", "bus", "train", "airline", "parking",
            "toll", "shell", "chevron", "exxon", "bp",
        ],
    ),
    (
        Category::Healthcare,
        &[
            "pharmacy", "hospital", "clinic", "doctor", "medical", "cvs", "walgreens", "rite aid",
            "health", "dental", "vision",
        ],
    ),
    (
        Category::Entertainment,
        &[
            "movie", "theater", "netflix", "spotify", "game", "entertainment", "concert", "show",
            "amusement", "zoo", "museum",
        ],
    ),
    (
        Category::Shopping,
        &[
            "amazon", "ebay", "store", "mall", "clothing", "electronics", "best buy", "home depot",
            "lowes", "macy's", "nordstrom",
        ],
    ),
    (
        Category::Services,
        &[
            "service", "repair", "maintenance", "cleaning", "salon", "barber", "dry clean",
            "laundry", "professional",
        ],
    ),
    (
        Category::Education,
        &[
            "school", "university", "college", "education", "tuition", "books", "supplies",
            "course", "training",
        ],
    ),
    (
        Category::Travel,
        &[
            "hotel", "motel", "airbnb", "flight", "rental", "travel", "vacation", "booking",
            "expedia", "trip",
        ],
    ),
];

lazy_static! {
    static ref KEYWORD_PATTERNS: Vec<(Category, Vec<Regex>)> = KEYWORDS
        .iter()
        .map(|(category, words)| {
            let patterns = words
                .iter()
                .map(|w| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(w))).unwrap())
                .collect();
            (*category, patterns)
        })
        .collect();
}

/// Number of distinct keywords of `category` present in `text`.
fn keyword_score(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().filter(|p| p.is_match(text)).count()
}

/// Category classifier.
///
/// Scores each category by how many of its keywords occur as whole
/// words; the vendor name counts double.
#[derive(Debug, Default)]
pub struct CategoryExtractor {
    vendor: Option<String>,
}

impl CategoryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    fn confidence(score: usize, vendor_hit: bool) -> f32 {
        let base = 0.5 + 0.15 * score as f32;
        let bonus = if vendor_hit { 0.1 } else { 0.0 };
        (base + bonus).min(0.95)
    }
}

impl FieldExtractor for CategoryExtractor {
    type Output = ExtractionMatch<Category>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next().or_else(|| {
            Some(ExtractionMatch::new(Category::Other, 0.3, ""))
        })
    }

    /// Matching categories, best first; ties keep declaration order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut scored: Vec<(usize, ExtractionMatch<Category>)> = KEYWORD_PATTERNS
            .iter()
            .filter_map(|(category, patterns)| {
                let vendor_score = self
                    .vendor
                    .as_deref()
                    .map(|v| keyword_score(patterns, v))
                    .unwrap_or(0);
                let score = keyword_score(patterns, text) + vendor_score;
                (score > 0).then(|| {
                    let confidence = Self::confidence(score, vendor_score > 0);
                    (score, ExtractionMatch::new(*category, confidence, category.as_str()))
                })
            })
            .collect();

        // Stable sort keeps the earlier category on equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, m)| m).collect()
    }
}

/// Classify a receipt by its text and, when known, its vendor.
pub fn classify_category(text: &str, vendor: Option<&str>) -> ExtractionMatch<Category> {
    let mut extractor = CategoryExtractor::new();
    if let Some(vendor) = vendor {
        extractor = extractor.with_vendor(vendor);
    }
    extractor
        .extract(text)
        .unwrap_or_else(|| ExtractionMatch::new(Category::Other, 0.3, ""))
}
