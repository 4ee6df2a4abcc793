use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: unsupported field shape, DSL structure violation,
    /// duplicate field in a clause, bool depth exceeded.
    Validation,
    /// Document id absent on update/delete/get.
    NotFound,
    /// JSON that is syntactically invalid or violates the DSL grammar.
    Parse,
    /// Transaction-log write/read/truncate failure.
    Durability,
    /// A posting references a missing document, or replay hit an invariant
    /// violation that is not a torn trailing write.
    Corruption,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error {
            kind,
            context: context.into(),
        }
    }

    pub fn validation(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Validation, context)
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context)
    }

    pub fn parse(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Parse, context)
    }

    pub fn durability(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Durability, context)
    }

    pub fn corruption(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Corruption, context)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Durability,
            context: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
