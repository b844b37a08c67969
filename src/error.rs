//! use certrotor::error::CertError;

use thiserror::Error;

/// Represents errors that can occur while minting, loading or rotating certificates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertError {
    /// No population strategy is registered for the secret name.
    #[error("No certificate population strategy found for secret {0}")]
    UnknownSlot(String),

    /// A secret lacks one of the required data entries.
    #[error("{field} value not found in {secret} secret")]
    MissingField { secret: String, field: String },

    /// Certificate or key bytes are corrupt, truncated or do not belong together.
    #[error("Malformed certificate material: {0}")]
    MalformedMaterial(String),

    /// A certificate does not chain to the supplied CA.
    #[error("Certificate verification failed: {0}")]
    VerificationFailure(String),

    /// A CA-signed slot was populated without a signing CA.
    #[error("Secret {0} requires a signing CA")]
    MissingSigningCa(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Error while signing a certificate.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error reported by the secret store.
    #[error("Secret store error: {0}")]
    Store(String),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, CertError>;

impl From<der::Error> for CertError {
    /// Converts a `der::Error` raised while building a certificate.
    fn from(err: der::Error) -> Self {
        CertError::EncodingError(err.to_string())
    }
}

impl From<rsa::Error> for CertError {
    fn from(err: rsa::Error) -> Self {
        CertError::KeyGenerationError(err.to_string())
    }
}
