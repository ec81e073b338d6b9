use thiserror::Error;

/// Shape and content errors raised while encoding or reading datasets.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("line {line}: '{value}' is not a number")]
    InvalidNumber { line: usize, value: String },

    #[error("line {line}: expected {expected} values per row, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("label {label} at index {index} is outside 0..{classes}")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        classes: usize,
    },

    #[error("found {labels} labels for {images} images")]
    LabelCountMismatch { images: usize, labels: usize },

    #[error("{len} bytes is not a whole number of {sample_len}-byte images")]
    PartialImage { len: usize, sample_len: usize },
}
