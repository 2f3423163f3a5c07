//! Fingerprint - コマンド内容から決定的なキーを導出
//!
//! `cmd_` + SHA-256(hex)。
//! キー空間:
//! - queue 側: `queue:cmd_<hex>`
//! - result 側: `result:cmd_<hex>`
//!
//! `queue:cmd_` で prefix scan すれば queue entry だけを列挙できます
//! （同一 store を共有していても result key には触れない）。

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::command::Command;
use super::errors::CmdqError;

/// Namespace tag placed in front of every digest.
pub const FINGERPRINT_TAG: &str = "cmd_";

/// Hex length of a SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint of a command. Pure and infallible.
    pub fn of(command: &Command) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(command.as_bytes());
        let digest = hasher.finalize();
        Self(format!("{FINGERPRINT_TAG}{}", hex::encode(digest)))
    }

    /// Validate a fingerprint supplied from outside (admin calls, stored keys).
    pub fn parse(value: &str) -> Result<Self, CmdqError> {
        let Some(digest) = value.strip_prefix(FINGERPRINT_TAG) else {
            return Err(CmdqError::InvalidFingerprint(format!(
                "missing `{FINGERPRINT_TAG}` tag: {value}"
            )));
        };
        let well_formed = digest.len() == DIGEST_HEX_LEN
            && digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(CmdqError::InvalidFingerprint(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Shorthand for [`Fingerprint::of`].
pub fn fingerprint(command: &Command) -> Fingerprint {
    Fingerprint::of(command)
}

impl TryFrom<String> for Fingerprint {
    type Error = CmdqError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cmd(s: &str) -> Command {
        Command::new(s).unwrap()
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(fingerprint(&cmd("echo hi")), fingerprint(&cmd("echo hi")));
    }

    #[test]
    fn fingerprint_differs_by_content() {
        assert_ne!(fingerprint(&cmd("echo hi")), fingerprint(&cmd("echo hi ")));
        assert_ne!(fingerprint(&cmd("a")), fingerprint(&cmd("A")));
    }

    #[test]
    fn fingerprint_has_tag_and_sha256_digest() {
        // sha256("abc")
        let fp = fingerprint(&cmd("abc"));
        assert_eq!(
            fp.as_str(),
            "cmd_ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn derived_fingerprints_parse_back() {
        let fp = fingerprint(&cmd("SELECT 1"));
        assert_eq!(Fingerprint::parse(fp.as_str()).unwrap(), fp);
    }

    #[rstest]
    #[case::no_tag("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")]
    #[case::short("cmd_ba7816bf")]
    #[case::md5_length("cmd_900150983cd24fb0d6963f7d28e17f72")]
    #[case::uppercase("cmd_BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD")]
    #[case::empty("")]
    fn malformed_fingerprints_are_rejected(#[case] raw: &str) {
        assert!(matches!(
            Fingerprint::parse(raw),
            Err(CmdqError::InvalidFingerprint(_))
        ));
    }
}
