use ed25519_dalek::{Signature, Verifier, VerifyingKey};

pub(crate) const SIGNATURE_HEADER: &str = "X-Signature-Ed25519";
pub(crate) const TIMESTAMP_HEADER: &str = "X-Signature-Timestamp";

#[derive(Debug, thiserror::Error)]
pub(crate) enum VerifyError {
    #[error("invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("public key must be 32 bytes")]
    KeyLength,
    #[error("signature must be 64 bytes")]
    SignatureLength,
    #[error("signature rejected: {0}")]
    Signature(#[from] ed25519_dalek::SignatureError),
}

/// Checks that interaction requests were signed by Discord.
#[derive(Clone)]
pub(crate) struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    pub(crate) fn from_hex(public_key: &str) -> Result<Self, VerifyError> {
        let bytes: [u8; 32] = hex::decode(public_key.trim())?
            .try_into()
            .map_err(|_| VerifyError::KeyLength)?;
        Ok(Self {
            key: VerifyingKey::from_bytes(&bytes)?,
        })
    }

    /// The signed message is the timestamp header followed by the raw body.
    pub(crate) fn verify(&self, signature: &str, timestamp: &str, body: &[u8]) -> Result<(), VerifyError> {
        let bytes: [u8; 64] = hex::decode(signature)?
            .try_into()
            .map_err(|_| VerifyError::SignatureLength)?;
        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        self.key.verify(&message, &Signature::from_bytes(&bytes))?;
        Ok(())
    }
}
