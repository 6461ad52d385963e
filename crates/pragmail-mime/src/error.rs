//! Parse failures.

/// Result of a MIME parsing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a message or part could not be parsed or decoded.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `Content-Type` value with no `type/subtype`.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// A base64 body that does not decode.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// A `multipart/*` part without a `boundary` parameter.
    #[error("Multipart part has no boundary")]
    MissingBoundary,

    /// A multipart body whose delimiters cannot be found.
    #[error("Invalid multipart body: {0}")]
    InvalidMultipart(String),
}
