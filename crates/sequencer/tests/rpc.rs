//! End-to-end tests over the RPC surface: a live jsonrpsee server backed by
//! the engine, driven through the generated client — the same client the
//! transaction forwarder uses.

mod support;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use jsonrpsee::core::client::Error as ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::types::error::INVALID_PARAMS_CODE;
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use orbit_common::tasks::TaskManager;
use orbit_common::{RpcConfig, SequencerConfig};
use orbit_primitives::ChainParams;
use orbit_sequencer::{
    build_services, SequencerEngine, SequencerMode, SequencerRpcClient,
};
use support::MockExecution;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

struct TestNode {
    engine: Arc<SequencerEngine<MockExecution>>,
    addr: SocketAddr,
    shutdown: CancellationToken,
    _task_manager: TaskManager<()>,
}

/// Boots a full node double: engine, RPC server, poll loop, and a chain
/// follower that commits built blocks and reports their outcome.
async fn start_node(config: SequencerConfig) -> TestNode {
    let provider = Arc::new(MockExecution::new());
    let (engine, rpc_module) = build_services(
        config,
        ChainParams::default(),
        provider.clone(),
        RpcModule::new(()),
    )
    .expect("services build");
    engine.activate();

    let mut task_manager = TaskManager::default();
    let addr = serve(rpc_module, &mut task_manager).await;

    let shutdown = CancellationToken::new();
    let (seq_tx, mut seq_rx) = mpsc::unbounded_channel();
    tokio::spawn(engine.clone().run(seq_tx, shutdown.clone()));

    {
        let engine = engine.clone();
        let provider = provider.clone();
        tokio::spawn(async move {
            while let Some(msg) = seq_rx.recv().await {
                if let Some(block) = provider.block_by_hash(&msg.result.block_hash) {
                    provider.commit(&block);
                }
                engine.end_sequencing(None);
            }
        });
    }

    TestNode {
        engine,
        addr,
        shutdown,
        _task_manager: task_manager,
    }
}

async fn serve(methods: RpcModule<()>, task_manager: &mut TaskManager<()>) -> SocketAddr {
    let (addr_tx, addr_rx) = oneshot::channel();
    orbit_common::rpc::start_rpc_server(
        RpcConfig {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 0,
            ..Default::default()
        },
        task_manager,
        methods,
        Some(addr_tx),
    );
    addr_rx.await.expect("server reports bound address")
}

fn client(addr: SocketAddr) -> HttpClient {
    HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .expect("client builds")
}

fn signed_raw_tx(signer: &PrivateKeySigner, nonce: u64) -> (TxEnvelope, Bytes) {
    let tx = TxEip1559 {
        chain_id: 412346,
        nonce,
        gas_limit: 21_000,
        max_fee_per_gas: 1_000_000_000,
        max_priority_fee_per_gas: 0,
        to: TxKind::Call(Address::ZERO),
        value: U256::from(1u64),
        access_list: Default::default(),
        input: Bytes::new(),
    };
    let signature = signer.sign_hash_sync(&tx.signature_hash()).expect("signs");
    let envelope = TxEnvelope::Eip1559(tx.into_signed(signature));
    let raw = Bytes::from(envelope.encoded_2718());
    (envelope, raw)
}

/// A backup sequencer double that answers every submission with the given
/// RPC error message.
async fn start_failing_backup(message: &'static str) -> (SocketAddr, TaskManager<()>) {
    let mut module = RpcModule::new(());
    module
        .register_async_method("eth_sendRawTransaction", move |_params, _ctx, _ext| {
            async move {
                Err::<B256, ErrorObjectOwned>(ErrorObjectOwned::owned(
                    -32000,
                    message,
                    None::<()>,
                ))
            }
        })
        .expect("method registers");

    let mut task_manager = TaskManager::default();
    let addr = serve(module, &mut task_manager).await;
    (addr, task_manager)
}

#[tokio::test]
async fn raw_transaction_submission_round_trips() {
    let node = start_node(SequencerConfig::default()).await;
    let client = client(node.addr);

    let signer = PrivateKeySigner::random();
    let (envelope, raw) = signed_raw_tx(&signer, 0);

    let hash = client.eth_send_raw_transaction(raw).await.expect("sequenced");
    assert_eq!(hash, *envelope.tx_hash());

    assert_eq!(client.next_delayed_message_number().await.unwrap(), 0);

    client.pause_sequencer().await.unwrap();
    assert_eq!(node.engine.sequencer_state().mode(), SequencerMode::Paused);

    client.activate_sequencer().await.unwrap();
    assert!(node.engine.sequencer_state().is_active());

    node.shutdown.cancel();
}

#[tokio::test]
async fn malformed_submission_is_an_invalid_params_error() {
    let node = start_node(SequencerConfig::default()).await;
    let client = client(node.addr);

    let result = client
        .eth_send_raw_transaction(Bytes::from_static(&[0x01, 0x02, 0x03]))
        .await;

    match result {
        Err(ClientError::Call(object)) => assert_eq!(object.code(), INVALID_PARAMS_CODE),
        other => panic!("expected invalid params error, got {other:?}"),
    }

    node.shutdown.cancel();
}

#[tokio::test]
async fn backup_without_sequencer_keeps_the_transaction_for_local_retry() {
    let node = start_node(SequencerConfig::default()).await;
    let (backup_addr, _backup_tasks) =
        start_failing_backup("Sequencer temporarily not available").await;

    node.engine
        .forward_to(&format!("http://{backup_addr}"))
        .unwrap();
    assert_eq!(node.engine.sequencer_state().mode(), SequencerMode::Forwarding);

    let client = client(node.addr);
    let signer = PrivateKeySigner::random();
    let (envelope, raw) = signed_raw_tx(&signer, 0);
    let pending = tokio::spawn(async move { client.eth_send_raw_transaction(raw).await });

    // Every forward attempt is answered with "no sequencer", so the
    // transaction keeps cycling through the retry queue unsettled.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!pending.is_finished());

    // Once this node takes over again, the queued transaction is sequenced
    // locally.
    node.engine.activate();
    let hash = pending.await.unwrap().expect("sequenced after takeover");
    assert_eq!(hash, *envelope.tx_hash());

    node.shutdown.cancel();
}

#[tokio::test]
async fn backup_rpc_error_rejects_the_submitter() {
    let node = start_node(SequencerConfig::default()).await;
    let (backup_addr, _backup_tasks) = start_failing_backup("nonce too low").await;

    node.engine
        .forward_to(&format!("http://{backup_addr}"))
        .unwrap();

    let client = client(node.addr);
    let signer = PrivateKeySigner::random();
    let (_envelope, raw) = signed_raw_tx(&signer, 0);

    let error = client
        .eth_send_raw_transaction(raw)
        .await
        .expect_err("rejected through the backup");
    match error {
        ClientError::Call(object) => {
            let data = object.data().map(|raw| raw.get().to_string()).unwrap_or_default();
            assert!(data.contains("nonce too low"), "unexpected error data: {data}");
        }
        other => panic!("expected call error, got {other:?}"),
    }

    node.shutdown.cancel();
}
