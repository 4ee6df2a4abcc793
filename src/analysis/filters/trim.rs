use crate::analysis::filter::TokenFilter;

/// Strips leading and trailing Unicode whitespace.
pub struct TrimFilter;

impl TokenFilter for TrimFilter {
    fn apply(&self, word: &str) -> String {
        word.trim().to_string()
    }

    fn name(&self) -> &str {
        "trim"
    }
}
