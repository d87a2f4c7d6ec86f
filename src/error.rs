//! Error types for the voxel scene builder.

use thiserror::Error;

/// Result type alias using SceneError.
pub type Result<T> = std::result::Result<T, SceneError>;

/// Main error type for scene building operations.
#[derive(Error, Debug)]
pub enum SceneError {
    /// Failed to serialize or parse JSON data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to encode a texture image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The placement program contains an invalid token.
    #[error("Lex error at line {line}: {message}")]
    Lex { line: usize, message: String },

    /// The placement program could not be parsed.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The placement program failed while running.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The placement program exceeded a sandbox limit.
    #[error("Sandbox limit exceeded: {0}")]
    LimitExceeded(String),

    /// Failed to assemble the scene from placed voxels.
    #[error("Scene assembly error: {0}")]
    Assembly(String),

    /// The preview host's frame loop is gone.
    #[error("Preview host error: {0}")]
    Host(String),
}

impl SceneError {
    /// Whether this error came from running the placement program.
    pub fn is_interpreter_error(&self) -> bool {
        matches!(
            self,
            SceneError::Lex { .. }
                | SceneError::Parse { .. }
                | SceneError::Runtime(_)
                | SceneError::LimitExceeded(_)
        )
    }
}
