use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ValidationError;

const KEY_ALGORITHMS: &[&str] = &[
    "ssh-rsa",
    "ssh-dss",
    "ssh-ed25519",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
    "sk-ssh-ed25519@openssh.com",
    "sk-ecdsa-sha2-nistp256@openssh.com",
];

/// A deploy key as stored on the remote repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployKey {
    pub id: u64,
    pub key: String,
    #[serde(default)]
    pub url: Option<String>,
    pub title: String,
    #[serde(default)]
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub added_by: Option<String>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl DeployKey {
    /// `SHA256:` fingerprint of the key blob, as printed by `ssh-keygen -l`.
    pub fn fingerprint(&self) -> Option<String> {
        fingerprint(&self.key)
    }
}

/// Payload for registering a new deploy key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDeployKey {
    pub title: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

impl NewDeployKey {
    pub fn new(title: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            key: key.into(),
            read_only: None,
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("deploy key title must not be empty"));
        }
        if self.key.trim().is_empty() {
            return Err(ValidationError::new("deploy key material must not be empty"));
        }
        parse_public_key(&self.key).map(|_| ())
    }
}

/// Splits `<algorithm> <base64> [comment]` and decodes the blob.
fn parse_public_key(key: &str) -> Result<(&str, Vec<u8>), ValidationError> {
    let mut parts = key.split_whitespace();
    let algorithm = parts.next().unwrap_or_default();
    if !KEY_ALGORITHMS.contains(&algorithm) {
        return Err(ValidationError::new(format!(
            "unsupported public key type '{algorithm}'"
        )));
    }

    let encoded = parts
        .next()
        .ok_or_else(|| ValidationError::new("public key is missing its base64 body"))?;
    let blob = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ValidationError::new(format!("public key body is not valid base64: {e}")))?;

    // The blob starts with the length-prefixed algorithm name.
    let embedded = blob
        .get(..4)
        .map(|len| u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize)
        .and_then(|len| 4usize.checked_add(len).and_then(|end| blob.get(4..end)));
    if embedded != Some(algorithm.as_bytes()) {
        return Err(ValidationError::new(format!(
            "public key body does not match key type '{algorithm}'"
        )));
    }

    Ok((algorithm, blob))
}

pub fn fingerprint(key: &str) -> Option<String> {
    let (_, blob) = parse_public_key(key).ok()?;
    let hash = Sha256::digest(&blob);
    let encoded = base64::engine::general_purpose::STANDARD_NO_PAD.encode(hash);
    Some(format!("SHA256:{encoded}"))
}
