use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{CryptoRng, RngCore, rngs::ThreadRng};
use sha2::{Digest, Sha256};
use smol_str::SmolStr;

/// Bytes of randomness behind a code verifier. Hex encoding doubles this.
pub const VERIFIER_BYTES: usize = 28;

/// A PKCE verifier together with its S256 challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub verifier: SmolStr,
    pub challenge: SmolStr,
}

impl PkceChallenge {
    /// Fresh verifier from the thread-local CSPRNG, with its challenge.
    pub fn generate() -> Self {
        Self::from_verifier(generate_verifier())
    }

    /// Rebuild the pair from a verifier read back from storage.
    pub fn from_verifier(verifier: impl Into<SmolStr>) -> Self {
        let verifier = verifier.into();
        let challenge = derive_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

impl std::fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// 28 random bytes, lowercase hex encoded (56 characters).
///
/// `ThreadRng` is seeded from the OS and aborts rather than falling back to a
/// weaker source if the OS generator is unavailable.
pub fn generate_verifier() -> SmolStr {
    let bytes = get_random_values::<_, VERIFIER_BYTES>(&mut ThreadRng::default());
    hex::encode(bytes).into()
}

pub fn get_random_values<R, const LEN: usize>(rng: &mut R) -> [u8; LEN]
where
    R: RngCore + CryptoRng,
{
    let mut bytes = [0u8; LEN];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// base64url(SHA-256(verifier)) without padding.
pub fn derive_challenge(verifier: &str) -> SmolStr {
    // https://datatracker.ietf.org/doc/html/rfc7636#section-4.2
    URL_SAFE_NO_PAD
        .encode(Sha256::digest(verifier.as_bytes()))
        .into()
}
