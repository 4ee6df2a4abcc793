use crate::analysis::filter::TokenFilter;

/// Unicode lower-casing.
pub struct LowercaseFilter;

impl TokenFilter for LowercaseFilter {
    fn apply(&self, word: &str) -> String {
        word.to_lowercase()
    }

    fn name(&self) -> &str {
        "lowercase"
    }
}
