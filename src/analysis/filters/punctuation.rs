use unicode_properties::{GeneralCategoryGroup, UnicodeGeneralCategory};

use crate::analysis::filter::TokenFilter;

/// Removes characters in the Unicode punctuation and symbol categories.
/// Everything else, including combining marks, is kept.
pub struct PunctuationStripFilter;

impl TokenFilter for PunctuationStripFilter {
    fn apply(&self, word: &str) -> String {
        word.chars()
            .filter(|c| {
                !matches!(
                    c.general_category_group(),
                    GeneralCategoryGroup::Punctuation | GeneralCategoryGroup::Symbol
                )
            })
            .collect()
    }

    fn name(&self) -> &str {
        "punctuation-strip"
    }
}
