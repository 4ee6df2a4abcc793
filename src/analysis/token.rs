use serde::{Deserialize, Serialize};

/// Token produced by analysis.
///
/// `position` is the zero-based token position within one analysis pass.
/// `start_offset..end_offset` is the byte span of the original
/// whitespace-delimited word the token was derived from, so the caller can
/// recover the unfiltered substring in its original casing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub position: u32,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Token {
    pub fn new(text: String, position: u32, start_offset: usize, end_offset: usize) -> Self {
        Token {
            text,
            position,
            start_offset,
            end_offset,
        }
    }
}
