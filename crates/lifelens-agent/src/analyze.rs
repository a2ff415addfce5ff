//! Pattern extraction over OCR text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use lifelens_core::defaults::GENERAL_EXCERPT_LENGTH;
use lifelens_core::text::preview;

/// What `analyze_text` looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Names,
    PhoneNumbers,
    Addresses,
    Dates,
    General,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Names => "names",
            SearchType::PhoneNumbers => "phone_numbers",
            SearchType::Addresses => "addresses",
            SearchType::Dates => "dates",
            SearchType::General => "general",
        }
    }

    fn pattern(&self) -> Option<&'static Regex> {
        match self {
            SearchType::Names => Some(&NAME_RE),
            SearchType::PhoneNumbers => Some(&PHONE_RE),
            SearchType::Addresses => Some(&ADDRESS_RE),
            SearchType::Dates => Some(&DATE_RE),
            SearchType::General => None,
        }
    }
}

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][a-z]+ [A-Z][a-z]+\b").expect("valid name regex")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{3}-\d{3}-\d{4}\b|\(\d{3}\)\s*\d{3}-\d{4}\b").expect("valid phone regex")
});

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d+\s+[A-Za-z\s]+(?:Street|St|Avenue|Ave|Road|Rd)\b")
        .expect("valid address regex")
});

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b|\b\d{4}-\d{1,2}-\d{1,2}\b").expect("valid date regex")
});

/// Every match of `search_type` in `text`, in order of appearance.
///
/// `General` yields a single preview of the text instead of matches.
pub fn find_items(search_type: SearchType, text: &str) -> Vec<String> {
    match search_type.pattern() {
        Some(re) => re.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        None if text.trim().is_empty() => Vec::new(),
        None => vec![preview(text, GENERAL_EXCERPT_LENGTH)],
    }
}
