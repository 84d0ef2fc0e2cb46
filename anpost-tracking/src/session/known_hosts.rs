/// Outcome of checking a server key against the pinned key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownHostValidationResult {
    Valid,
    Invalid,
    Unknown,
}

/// The key a server must present, taken from an OpenSSH public key line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedHostKey {
    algorithm: String,
    key_base64: String,
}

impl PinnedHostKey {
    /// Accepts `<algorithm> <base64> [comment]`, as found in `known_hosts` or `.pub` files.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let algorithm = parts.next()?;
        let key_base64 = parts.next()?;
        Some(Self {
            algorithm: algorithm.to_owned(),
            key_base64: key_base64.to_owned(),
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }
}

pub fn validate(
    pinned: Option<&PinnedHostKey>,
    algorithm: &str,
    key_base64: &str,
) -> KnownHostValidationResult {
    match pinned {
        None => KnownHostValidationResult::Unknown,
        Some(pinned) if pinned.algorithm == algorithm && pinned.key_base64 == key_base64 => {
            KnownHostValidationResult::Valid
        }
        Some(_) => KnownHostValidationResult::Invalid,
    }
}
