//! Test doubles and helpers shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_primitives::{keccak256, Address, Bytes, Signature, TxKind, B256, U256};
use async_trait::async_trait;
use jsonrpsee::RpcModule;
use orbit_common::SequencerConfig;
use orbit_primitives::{
    Block, BlockHeader, ChainParams, L1IncomingMessage, L1IncomingMessageHeader, L1MessageKind,
};
use orbit_sequencer::{
    build_services, ExecutionProvider, PayloadAttributes, SequencerEngine, SequencerError,
};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Execution provider double: an in-memory head, a nonce table, scriptable
/// build failures, and a gate that can hold block production open.
pub struct MockExecution {
    pub head: Mutex<BlockHeader>,
    pub nonces: Mutex<HashMap<Address, u64>>,
    pub fail_builds: AtomicUsize,
    pub build_gate: Semaphore,
    pub payloads: Mutex<Vec<PayloadAttributes>>,
    pub built: Mutex<Vec<Block>>,
    pub price_cache: Mutex<Vec<(u64, B256, bool)>>,
}

impl MockExecution {
    pub fn new() -> Self {
        let genesis = BlockHeader {
            number: 0,
            hash: B256::repeat_byte(0x01),
            parent_hash: B256::ZERO,
            timestamp: 1_700_000_000,
            delayed_messages_read: 0,
            send_root: B256::ZERO,
        };

        Self {
            head: Mutex::new(genesis),
            nonces: Mutex::new(HashMap::new()),
            fail_builds: AtomicUsize::new(0),
            build_gate: Semaphore::new(1),
            payloads: Mutex::new(Vec::new()),
            built: Mutex::new(Vec::new()),
            price_cache: Mutex::new(Vec::new()),
        }
    }

    pub fn head(&self) -> BlockHeader {
        self.head.lock().clone()
    }

    /// Adopts a built block as the new chain head.
    pub fn commit(&self, block: &Block) {
        *self.head.lock() = block.header.clone();
    }

    pub fn block_by_hash(&self, hash: &B256) -> Option<Block> {
        self.built
            .lock()
            .iter()
            .find(|block| block.hash() == *hash)
            .cloned()
    }

    pub fn fail_next_builds(&self, count: usize) {
        self.fail_builds.store(count, Ordering::SeqCst);
    }

    pub fn last_payload(&self) -> PayloadAttributes {
        self.payloads
            .lock()
            .last()
            .cloned()
            .expect("no payload recorded")
    }
}

#[async_trait]
impl ExecutionProvider for MockExecution {
    async fn head_header(&self) -> anyhow::Result<Option<BlockHeader>> {
        Ok(Some(self.head.lock().clone()))
    }

    async fn account_nonce(&self, _head: &BlockHeader, address: Address) -> anyhow::Result<u64> {
        Ok(self.nonces.lock().get(&address).copied().unwrap_or(0))
    }

    async fn build_block(
        &self,
        parent: &BlockHeader,
        payload: PayloadAttributes,
    ) -> anyhow::Result<Option<Block>> {
        let _gate = self.build_gate.acquire().await?;

        if self
            .fail_builds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(None);
        }

        let mut preimage = parent.hash.to_vec();
        preimage.extend_from_slice(&payload.number.to_be_bytes());
        let header = BlockHeader {
            number: payload.number,
            hash: keccak256(&preimage),
            parent_hash: parent.hash,
            timestamp: parent.timestamp,
            delayed_messages_read: payload.message_with_metadata.delayed_messages_read,
            send_root: B256::ZERO,
        };
        let block = Block {
            header,
            transactions: vec![],
        };

        self.payloads.lock().push(payload);
        self.built.lock().push(block.clone());

        Ok(Some(block))
    }

    fn cache_l1_price_data(&self, msg_idx: u64, block: &Block, built_using_delayed_message: bool) {
        self.price_cache
            .lock()
            .push((msg_idx, block.hash(), built_using_delayed_message));
    }
}

pub fn test_engine() -> (Arc<SequencerEngine<MockExecution>>, Arc<MockExecution>) {
    test_engine_with_config(SequencerConfig::default())
}

pub fn test_engine_with_config(
    config: SequencerConfig,
) -> (Arc<SequencerEngine<MockExecution>>, Arc<MockExecution>) {
    let provider = Arc::new(MockExecution::new());
    let (engine, _rpc) = build_services(
        config,
        ChainParams::default(),
        provider.clone(),
        RpcModule::new(()),
    )
    .expect("services build");
    engine.activate();
    (engine, provider)
}

/// A legacy transaction carrying a placeholder signature; admission only
/// looks at the explicit sender, never at signature recovery.
pub fn tx(nonce: u64) -> TxEnvelope {
    let tx = TxLegacy {
        chain_id: Some(412346),
        nonce,
        gas_price: 1_000_000_000,
        gas_limit: 21_000,
        to: TxKind::Call(Address::repeat_byte(0x99)),
        value: U256::from(1u64),
        input: Bytes::new(),
    };
    TxEnvelope::Legacy(tx.into_signed(Signature::test_signature()))
}

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn deposit_message(l1_block: u64, delayed_index: Option<u64>) -> L1IncomingMessage {
    L1IncomingMessage {
        header: L1IncomingMessageHeader {
            kind: L1MessageKind::EthDeposit,
            sender: addr(0xaa),
            block_number: l1_block,
            timestamp: 1_700_000_000,
            request_id: delayed_index.map(|idx| B256::from(U256::from(idx))),
            base_fee_l1: U256::ZERO,
        },
        l2_msg: Bytes::from_static(&[0xde, 0xad]),
    }
}

/// Submits a transaction on a background task and returns its settlement
/// future.
pub fn submit(
    engine: &Arc<SequencerEngine<MockExecution>>,
    tx: TxEnvelope,
    sender: Address,
) -> tokio::task::JoinHandle<Result<(), SequencerError>> {
    submit_with_token(engine, tx, sender, CancellationToken::new())
}

pub fn submit_with_token(
    engine: &Arc<SequencerEngine<MockExecution>>,
    tx: TxEnvelope,
    sender: Address,
    token: CancellationToken,
) -> tokio::task::JoinHandle<Result<(), SequencerError>> {
    let engine = engine.clone();
    tokio::spawn(async move { engine.submit(tx, sender, token).await })
}

/// Waits until the intake and retry queues together hold `n` items.
pub async fn wait_for_queue(engine: &Arc<SequencerEngine<MockExecution>>, n: usize) {
    for _ in 0..200 {
        if engine.transaction_queue().queue_len() + engine.transaction_queue().retry_len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("queue never reached {n} items");
}
