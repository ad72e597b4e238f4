mod local;

pub use local::LocalFileReader;

use anyhow::Result;
use async_trait::async_trait;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an owned buffer so implementations are free to run the
    /// read on the blocking pool.
    async fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}
