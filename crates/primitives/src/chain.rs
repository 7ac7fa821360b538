use serde::{Deserialize, Serialize};

/// Chain-level parameters the sequencer needs.
///
/// Message indices are block numbers shifted by the genesis offset: rollups
/// migrated from a classic chain start their message stream at a non-zero
/// block number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    /// L2 chain id.
    pub chain_id: u64,
    /// Block number of the rollup genesis block.
    pub genesis_block_number: u64,
}

impl ChainParams {
    /// Message index corresponding to an L2 block number.
    pub fn block_number_to_message_index(&self, block_number: u64) -> u64 {
        block_number.saturating_sub(self.genesis_block_number)
    }

    /// L2 block number corresponding to a message index.
    pub fn message_index_to_block_number(&self, message_index: u64) -> u64 {
        message_index + self.genesis_block_number
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            chain_id: 412346,
            genesis_block_number: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_index_round_trips_through_genesis_offset() {
        let params = ChainParams {
            chain_id: 42161,
            genesis_block_number: 22_207_817,
        };

        assert_eq!(params.block_number_to_message_index(22_207_818), 1);
        assert_eq!(params.message_index_to_block_number(1), 22_207_818);
        // Numbers below genesis never underflow.
        assert_eq!(params.block_number_to_message_index(5), 0);
    }
}
