//! Strongly-typed identifiers.
//!
//! ULID ベースの ID を Phantom type パターンで型付けしています。
//! - ClaimToken: 1 回の claim を識別（lease の所有権チェックに使う）
//! - DrainerId: drainer インスタンス（claim の owner）を識別

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス
    fn prefix() -> &'static str;
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Claim のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Claim {}

impl IdMarker for Claim {
    fn prefix() -> &'static str {
        "claim-"
    }
}

/// Drainer のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Drainer {}

impl IdMarker for Drainer {
    fn prefix() -> &'static str {
        "drainer-"
    }
}

/// Identifier of one claim on a queue entry.
pub type ClaimToken = Id<Claim>;

/// Identifier of a drainer instance (the owner recorded on a claim).
pub type DrainerId = Id<Drainer>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefix() {
        let token = ClaimToken::from_ulid(Ulid::new());
        let drainer = DrainerId::from_ulid(Ulid::new());
        assert!(token.to_string().starts_with("claim-"));
        assert!(drainer.to_string().starts_with("drainer-"));
    }

    #[test]
    fn serializes_as_bare_ulid() {
        let ulid = Ulid::new();
        let token = ClaimToken::from_ulid(ulid);
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{ulid}\""));
        let back: ClaimToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<ClaimToken>(), std::mem::size_of::<Ulid>());
    }
}
