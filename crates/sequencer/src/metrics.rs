use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;
use once_cell::sync::Lazy;

#[derive(Metrics)]
#[metrics(scope = "sequencer")]
pub struct SequencerMetrics {
    #[metric(describe = "Number of transactions currently in the intake queue")]
    pub queue_txs: Gauge,
    #[metric(describe = "Number of transactions currently in the retry queue")]
    pub retry_queue_txs: Gauge,
    #[metric(describe = "Number of delayed messages waiting to be sequenced")]
    pub delayed_queue_msgs: Gauge,
    #[metric(describe = "Number of transactions parked for an out-of-order nonce")]
    pub nonce_failures: Gauge,
    #[metric(describe = "Total number of transactions accepted into the intake queue")]
    pub txs_enqueued: Counter,
    #[metric(describe = "Total number of transactions drained for sequencing attempts")]
    pub txs_dequeued: Counter,
    #[metric(describe = "Total number of transactions rejected at submission")]
    pub txs_rejected: Counter,
    #[metric(describe = "Total number of parked transactions that expired unrevived")]
    pub nonce_failures_expired: Counter,
    #[metric(describe = "Total number of transactions forwarded to the backup sequencer")]
    pub txs_forwarded: Counter,
    #[metric(describe = "Total number of delayed messages sequenced into blocks")]
    pub delayed_msgs_sequenced: Counter,
    #[metric(describe = "The duration of building one block")]
    pub block_production_execution: Histogram,
}

/// Sequencer metrics
pub static SEQUENCER_METRICS: Lazy<SequencerMetrics> = Lazy::new(|| {
    SequencerMetrics::describe();
    SequencerMetrics::default()
});
