//! Collaborators the startup pipeline depends on but does not implement.

use crate::error::{IdentityError, SignatureError};

/// Authenticates the signed receipt envelope.
///
/// Implementations must accept exactly one signer chaining to the fixed
/// trusted root, decrypting the content if needed, and return the payload.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, signed: &[u8]) -> Result<Vec<u8>, SignatureError>;
}

/// Checks the running executable's code signature.
pub trait CodeIdentityVerifier: Send + Sync {
    fn check(&self, requirement: &str) -> Result<(), IdentityError>;
}
