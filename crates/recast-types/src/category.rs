//! Post categories and the keyword classifier.

use serde::{Deserialize, Serialize};

/// Content category assigned to a post during classification.
///
/// Numeric codes are stable and used by the HTTP API and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    General,
    Promotional,
    News,
    Personal,
    Retweet,
    Thread,
}

const PROMOTIONAL_WORDS: &[&str] = &["buy", "sale", "discount", "offer", "promo"];
const NEWS_WORDS: &[&str] = &["news", "breaking", "announced", "update"];
const PERSONAL_WORDS: &[&str] = &["i", "me", "my", "personal"];

/// Posts longer than this many characters are treated as thread material.
const THREAD_MIN_CHARS: usize = 200;

impl Category {
    /// All categories in code order.
    pub const ALL: [Category; 6] = [
        Category::General,
        Category::Promotional,
        Category::News,
        Category::Personal,
        Category::Retweet,
        Category::Thread,
    ];

    /// Numeric code (1-6).
    pub fn code(self) -> u8 {
        match self {
            Category::General => 1,
            Category::Promotional => 2,
            Category::News => 3,
            Category::Personal => 4,
            Category::Retweet => 5,
            Category::Thread => 6,
        }
    }

    /// Look up a category by its numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Lowercase name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Promotional => "promotional",
            Category::News => "news",
            Category::Personal => "personal",
            Category::Retweet => "retweet",
            Category::Thread => "thread",
        }
    }

    /// Classify a post's text. First matching rule wins.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has_any = |list: &[&str]| words.iter().any(|w| list.contains(w));

        if has_any(PROMOTIONAL_WORDS) {
            Category::Promotional
        } else if has_any(NEWS_WORDS) {
            Category::News
        } else if text.starts_with("RT @") {
            Category::Retweet
        } else if text.chars().count() > THREAD_MIN_CHARS {
            Category::Thread
        } else if has_any(PERSONAL_WORDS) {
            Category::Personal
        } else {
            Category::General
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
