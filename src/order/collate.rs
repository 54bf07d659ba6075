use std::cmp::Ordering;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Text sort key compared level by level: base letters without case or
/// accents, then accents, then the original text.
///
/// `eagle`, `éclair` and `fig` sort in that order; `alice` and `Alice` are
/// neighbours. The last level keeps the order total so equal keys really
/// are equal cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollationKey {
    base: String,
    accented: String,
    original: String,
}

impl CollationKey {
    pub fn new(text: &str) -> Self {
        let accented: String = text.nfd().flat_map(char::to_lowercase).collect();
        let base = accented
            .chars()
            .filter(|c| !is_combining_mark(*c))
            .collect();
        Self {
            base,
            accented,
            original: text.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl Ord for CollationKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base
            .cmp(&other.base)
            .then_with(|| self.accented.cmp(&other.accented))
            .then_with(|| self.original.cmp(&other.original))
    }
}

impl PartialOrd for CollationKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
