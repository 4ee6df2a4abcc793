/// A word-level filter in the analysis chain. Filters run in the order
/// they were added; a word that filters down to the empty string is
/// dropped and emits no token.
pub trait TokenFilter: Send + Sync {
    fn apply(&self, word: &str) -> String;

    fn name(&self) -> &str;
}
