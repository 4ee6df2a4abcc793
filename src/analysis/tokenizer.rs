/// A word carved out of the input by whitespace splitting, before any
/// filters run. `start..end` are byte offsets into the original string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordSpan<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Splits text on Unicode whitespace, reporting the byte span of each word.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl WhitespaceTokenizer {
    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<WordSpan<'a>> {
        let mut spans = Vec::new();
        let mut word_start: Option<usize> = None;

        for (idx, ch) in text.char_indices() {
            if ch.is_whitespace() {
                if let Some(start) = word_start.take() {
                    spans.push(WordSpan {
                        text: &text[start..idx],
                        start,
                        end: idx,
                    });
                }
            } else if word_start.is_none() {
                word_start = Some(idx);
            }
        }

        if let Some(start) = word_start {
            spans.push(WordSpan {
                text: &text[start..],
                start,
                end: text.len(),
            });
        }

        spans
    }
}
