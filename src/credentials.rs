//! Credential hashing seam
//!
//! Password handling proper lives outside this core. The directory only
//! needs an opaque hash-and-verify pair, so deployments plug in a real
//! KDF-backed scheme behind this trait.

pub trait CredentialScheme: Send + Sync {
    fn hash(&self, password: &str) -> String;
    fn verify(&self, password: &str, credential_hash: &str) -> bool;
}

/// Plain digest scheme, suitable for tests and local development only.
pub struct DigestCredentials;

impl CredentialScheme for DigestCredentials {
    fn hash(&self, password: &str) -> String {
        sha256::digest(password)
    }
    fn verify(&self, password: &str, credential_hash: &str) -> bool {
        sha256::digest(password) == credential_hash
    }
}
