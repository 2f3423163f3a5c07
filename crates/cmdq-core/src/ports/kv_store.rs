//! KvStore port - key-value store の抽象化
//!
//! コアはこの capability set にのみ依存します（wire protocol は知らない）。
//!
//! # 設計原則
//! - 排他制御は store の atomic primitive に任せる（set_if_absent / CAS）
//! - CAS は「直前に読んだ値そのもの」と比較する（state だけを見ない）
//! - scan_prefix は辞書順で返す（FIFO は保証しない）

use async_trait::async_trait;

use crate::domain::StoreError;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Insert only if the key is absent. Returns whether the write happened.
    async fn set_if_absent(&self, key: &str, value: String) -> Result<bool, StoreError>;

    /// Replace the value only if it currently equals `expected`.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: String,
    ) -> Result<bool, StoreError>;

    /// Delete the key only if its value currently equals `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Number of keys removed (0 or 1).
    async fn delete(&self, key: &str) -> Result<u64, StoreError>;

    /// Keys starting with `prefix`, lexicographically sorted.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    async fn flush_prefix(&self, prefix: &str) -> Result<u64, StoreError>;
}
