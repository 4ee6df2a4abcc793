use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::punctuation::PunctuationStripFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::WhitespaceTokenizer;

/// Text analysis pipeline: whitespace tokenization followed by an ordered
/// word-level filter chain. The same analyzer must be used at indexing and
/// at query time so term identity is preserved.
pub struct Analyzer {
    pub name: String,
    tokenizer: WhitespaceTokenizer,
    filters: Vec<Box<dyn TokenFilter>>,
}

impl Analyzer {
    pub fn new(name: impl Into<String>) -> Self {
        Analyzer {
            name: name.into(),
            tokenizer: WhitespaceTokenizer,
            filters: Vec::new(),
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Standard analyzer: lowercase, strip punctuation and symbols.
    pub fn standard() -> Self {
        Analyzer::new("standard")
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(PunctuationStripFilter))
    }

    /// Analyzes `text` into positional tokens. Total: never fails, and
    /// empty or whitespace-only input yields an empty sequence.
    ///
    /// Positions are contiguous from 0 over the *emitted* tokens; a word
    /// that filters to the empty string is dropped without consuming a
    /// position. Offsets always refer to the original word span.
    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for span in self.tokenizer.tokenize(text) {
            let mut word = span.text.to_string();
            for filter in &self.filters {
                word = filter.apply(&word);
            }

            if word.is_empty() {
                continue;
            }

            tokens.push(Token::new(word, position, span.start, span.end));
            position += 1;
        }

        tokens
    }
}
