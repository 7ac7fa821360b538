//! LRU cache of per-sender next-expected nonces for fast pre-validation.
//!
//! Cached values are only meaningful relative to a head identity: the hash
//! of the committed head they were read against, or the head a speculative
//! admission pass is building on. Any mismatch invalidates the cache
//! wholesale; partial staleness is never tolerated.

use alloy_primitives::{Address, B256};
use orbit_primitives::{Block, BlockHeader};
use schnellru::{ByLength, LruMap};

pub struct NonceCache {
    cache: LruMap<Address, u64, ByLength>,
    /// Hash of the head block the cached values are based on.
    committed: B256,
    /// Set while an admission pass has written speculative nonces on top of
    /// this head; cleared by `finalize` when they become the new baseline.
    dirty: Option<B256>,
}

impl NonceCache {
    pub fn new(size: u32) -> Self {
        Self {
            cache: LruMap::new(ByLength::new(size.max(1))),
            committed: B256::ZERO,
            dirty: None,
        }
    }

    /// Called once per sequencing attempt, before admission checks begin.
    ///
    /// Speculation that was never finalized (the previous attempt failed or
    /// never built a block) is unreliable: keeping it would reject the
    /// requeued transactions as nonce-too-low. Discard it and start from
    /// persistent state.
    pub fn begin_new_block(&mut self) {
        if self.dirty.take().is_some() {
            self.cache.clear();
        }
    }

    /// Cached next-expected nonce for `sender`, when the cache is valid for
    /// `head`. On identity mismatch the cache is cleared first and `None` is
    /// returned so the caller reads persistent state once.
    pub fn lookup(&mut self, head: &BlockHeader, sender: &Address) -> Option<u64> {
        if !self.matches(head) {
            self.reset(head.hash);
        }
        self.cache.get(sender).copied()
    }

    /// Records a nonce read from persistent state. Does not mark the cache
    /// speculative.
    pub fn prime(&mut self, head: &BlockHeader, sender: Address, nonce: u64) {
        if !self.matches(head) {
            self.reset(head.hash);
        }
        self.cache.insert(sender, nonce);
    }

    /// Records a speculative nonce for the block being admitted on top of
    /// `head`, marking the cache as tracking that exact header.
    pub fn update(&mut self, head: &BlockHeader, sender: Address, nonce: u64) {
        if !self.matches(head) {
            self.reset(head.hash);
        }
        self.dirty = Some(head.hash);
        self.cache.insert(sender, nonce);
    }

    /// Adopts a produced block: when it extends the recorded head, the
    /// speculative nonces become the new baseline; otherwise the chain
    /// diverged and the cache is invalidated.
    pub fn finalize(&mut self, block: &Block) {
        if self.committed == block.header.parent_hash {
            self.committed = block.header.hash;
            self.dirty = None;
        } else {
            self.reset(block.header.hash);
        }
    }

    fn matches(&self, head: &BlockHeader) -> bool {
        match self.dirty {
            Some(dirty) => dirty == head.hash,
            None => self.committed == head.hash,
        }
    }

    fn reset(&mut self, block_hash: B256) {
        self.cache.clear();
        self.committed = block_hash;
        self.dirty = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(number: u64, hash_byte: u8, parent_byte: u8) -> BlockHeader {
        BlockHeader {
            number,
            hash: B256::repeat_byte(hash_byte),
            parent_hash: B256::repeat_byte(parent_byte),
            ..Default::default()
        }
    }

    fn block_on(parent: &BlockHeader, hash_byte: u8) -> Block {
        Block {
            header: BlockHeader {
                number: parent.number + 1,
                hash: B256::repeat_byte(hash_byte),
                parent_hash: parent.hash,
                ..Default::default()
            },
            transactions: vec![],
        }
    }

    #[test]
    fn lookup_misses_after_head_change() {
        let mut cache = NonceCache::new(16);
        let sender = Address::repeat_byte(1);
        let head_a = header(1, 0xaa, 0x00);
        let head_b = header(2, 0xbb, 0xaa);

        cache.prime(&head_a, sender, 5);
        assert_eq!(cache.lookup(&head_a, &sender), Some(5));

        // Different head identity invalidates everything.
        assert_eq!(cache.lookup(&head_b, &sender), None);
        // And the cache is now keyed to the new head.
        cache.prime(&head_b, sender, 6);
        assert_eq!(cache.lookup(&head_b, &sender), Some(6));
    }

    #[test]
    fn finalize_promotes_speculative_nonces_to_baseline() {
        let mut cache = NonceCache::new(16);
        let sender = Address::repeat_byte(1);
        let head = header(1, 0xaa, 0x00);

        cache.begin_new_block();
        cache.prime(&head, sender, 5);
        cache.update(&head, sender, 6);

        let block = block_on(&head, 0xbb);
        cache.finalize(&block);

        // The produced block is the new head; speculative values carry over.
        cache.begin_new_block();
        assert_eq!(cache.lookup(&block.header, &sender), Some(6));
    }

    #[test]
    fn finalize_against_diverged_parent_invalidates() {
        let mut cache = NonceCache::new(16);
        let sender = Address::repeat_byte(1);
        let head = header(1, 0xaa, 0x00);

        cache.prime(&head, sender, 5);

        // A block whose parent is not the recorded head.
        let stranger = Block {
            header: header(9, 0xdd, 0xcc),
            transactions: vec![],
        };
        cache.finalize(&stranger);

        assert_eq!(cache.lookup(&header(9, 0xdd, 0xcc), &sender), None);
    }

    #[test]
    fn unfinalized_speculation_is_discarded_on_next_attempt() {
        let mut cache = NonceCache::new(16);
        let sender = Address::repeat_byte(1);
        let head = header(1, 0xaa, 0x00);

        cache.begin_new_block();
        cache.prime(&head, sender, 5);
        cache.update(&head, sender, 6);

        // No finalize: the attempt failed. The next pass must re-read state
        // instead of serving the advanced nonce.
        cache.begin_new_block();
        assert_eq!(cache.lookup(&head, &sender), None);
    }
}
