use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Page {index} does not exist (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Rasterization failed: {0}")]
    RasterError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("No output could be written: {0}")]
    OutputUnwritable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for LayoutError {
    fn from(e: lopdf::Error) -> Self {
        LayoutError::OperationError(e.to_string())
    }
}
