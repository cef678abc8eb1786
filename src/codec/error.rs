use thiserror::Error;

/// Typed decode failures. Every variant maps to a stable numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("need {needed} bytes but only {available} remain")]
    InsufficientBytes { needed: usize, available: usize },

    #[error("unexpected type tag (expected {expected:?})")]
    InvalidTag { expected: &'static str },

    #[error("bytes are not a valid group element encoding")]
    InvalidElement,

    #[error("bytes are not a canonical scalar encoding")]
    InvalidScalar,

    #[error("sequence length {0} does not fit the remaining input")]
    InvalidLength(u64),
}

impl DecodeError {
    pub const fn code(&self) -> u16 {
        match self {
            DecodeError::InsufficientBytes { .. } => 1,
            DecodeError::InvalidTag { .. } => 2,
            DecodeError::InvalidElement => 3,
            DecodeError::InvalidScalar => 4,
            DecodeError::InvalidLength(_) => 5,
        }
    }
}

/// A failed decode: the error, the field path it happened in (outermost last),
/// and the bytes that were not consumed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decode failed at {}: {error} (code {})", join_path(.fields), .error.code())]
pub struct DecodeFailure<'a> {
    pub error: DecodeError,
    pub fields: Vec<&'static str>,
    pub remainder: &'a [u8],
}

impl<'a> DecodeFailure<'a> {
    pub fn new(error: DecodeError, remainder: &'a [u8]) -> Self {
        Self {
            error,
            fields: Vec::new(),
            remainder,
        }
    }

    /// Record the enclosing field name while the failure propagates outwards.
    pub fn in_field(mut self, field: &'static str) -> Self {
        self.fields.push(field);
        self
    }

    pub fn code(&self) -> u16 {
        self.error.code()
    }

    pub fn field_path(&self) -> String {
        join_path(&self.fields)
    }
}

fn join_path(fields: &[&'static str]) -> String {
    if fields.is_empty() {
        return "<root>".to_string();
    }
    fields.iter().rev().copied().collect::<Vec<_>>().join(".")
}
