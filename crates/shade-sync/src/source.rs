//! chain collaborator: height, blocks and encrypted logs

use crate::block::{BlockContext, BlockLogs};
use crate::Result;

/// node-facing source of finalized blocks
///
/// `blocks(from, take)` and `encrypted_logs(from, take)` must cover the same
/// range and return entries in block order; they may return fewer than `take`
/// near the tip.
pub trait ChainSource: Send + Sync {
    /// number of the latest finalized block
    fn block_height(&self) -> Result<u64>;

    fn blocks(&self, from: u64, take: u64) -> Result<Vec<BlockContext>>;

    fn encrypted_logs(&self, from: u64, take: u64) -> Result<Vec<BlockLogs>>;
}
