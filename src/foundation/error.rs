/// Convenience result type used across the render pipeline.
pub type RenderResult<T> = Result<T, RenderError>;

/// Top-level error taxonomy used by pipeline and queue APIs.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// Truncated or invalid replay data, or a replay without usable frames.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Invalid caller-provided configuration or settings.
    #[error("validation error: {0}")]
    Validation(String),

    /// An external tool (decompressor, encoder, template command) is missing or failed.
    #[error("external tool error: {0}")]
    External(String),

    /// Errors when serializing or deserializing persisted records.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or filesystem IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RenderError {
    /// Build a [`RenderError::MalformedInput`] value.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Build a [`RenderError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`RenderError::External`] value.
    pub fn external(msg: impl Into<String>) -> Self {
        Self::External(msg.into())
    }

    /// Build a [`RenderError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
