use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Types that can be constructed from environment variables.
pub trait FromEnv: Sized {
    fn from_env() -> anyhow::Result<Self>;
}

/// Reads a toml file as a specific type.
pub fn from_toml_path<P: AsRef<Path>, R: DeserializeOwned>(path: P) -> anyhow::Result<R> {
    let mut contents = String::new();
    {
        let mut file = File::open(path)?;
        file.read_to_string(&mut contents)?;
    }
    tracing::debug!("Config file size: {} bytes", contents.len());

    let result: R = toml::from_str(&contents)?;

    Ok(result)
}

/// Sequencer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SequencerConfig {
    /// Capacity of the transaction intake queue; submitters wait for space
    /// when the queue is full.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// How long a submitter waits for queue space, in ms. Waiting for the
    /// settlement itself is bounded by twice this value.
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,
    /// Maximum encoded transaction size accepted at submission, in bytes.
    /// 0 disables the check.
    #[serde(default = "default_max_tx_data_size")]
    pub max_tx_data_size: usize,
    /// Number of senders tracked by the nonce cache.
    #[serde(default = "default_nonce_cache_size")]
    pub nonce_cache_size: u32,
    /// How long an out-of-order transaction may wait for its predecessor
    /// nonce, in ms, measured from first submission.
    #[serde(default = "default_nonce_failure_ttl_ms")]
    pub nonce_failure_ttl_ms: u64,
    /// Poll delay after a tick that produced nothing, in ms.
    #[serde(default = "default_max_block_speed_ms")]
    pub max_block_speed_ms: u64,
    /// Poll delay while the sequencer is not active, in ms.
    #[serde(default = "default_inactive_wait_ms")]
    pub inactive_wait_ms: u64,
    /// Request timeout for forwarding to a backup sequencer, in ms.
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,
}

impl SequencerConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    pub fn nonce_failure_ttl(&self) -> Duration {
        Duration::from_millis(self.nonce_failure_ttl_ms)
    }

    pub fn max_block_speed(&self) -> Duration {
        Duration::from_millis(self.max_block_speed_ms)
    }

    pub fn inactive_wait(&self) -> Duration {
        Duration::from_millis(self.inactive_wait_ms)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        SequencerConfig {
            max_queue_size: default_max_queue_size(),
            queue_timeout_ms: default_queue_timeout_ms(),
            max_tx_data_size: default_max_tx_data_size(),
            nonce_cache_size: default_nonce_cache_size(),
            nonce_failure_ttl_ms: default_nonce_failure_ttl_ms(),
            max_block_speed_ms: default_max_block_speed_ms(),
            inactive_wait_ms: default_inactive_wait_ms(),
            forward_timeout_ms: default_forward_timeout_ms(),
        }
    }
}

impl FromEnv for SequencerConfig {
    fn from_env() -> anyhow::Result<Self> {
        // In case of a parsing error the default value is used.
        Ok(Self {
            max_queue_size: env_or("SEQUENCER_MAX_QUEUE_SIZE", default_max_queue_size),
            queue_timeout_ms: env_or("SEQUENCER_QUEUE_TIMEOUT_MS", default_queue_timeout_ms),
            max_tx_data_size: env_or("SEQUENCER_MAX_TX_DATA_SIZE", default_max_tx_data_size),
            nonce_cache_size: env_or("SEQUENCER_NONCE_CACHE_SIZE", default_nonce_cache_size),
            nonce_failure_ttl_ms: env_or(
                "SEQUENCER_NONCE_FAILURE_TTL_MS",
                default_nonce_failure_ttl_ms,
            ),
            max_block_speed_ms: env_or("SEQUENCER_MAX_BLOCK_SPEED_MS", default_max_block_speed_ms),
            inactive_wait_ms: env_or("SEQUENCER_INACTIVE_WAIT_MS", default_inactive_wait_ms),
            forward_timeout_ms: env_or("SEQUENCER_FORWARD_TIMEOUT_MS", default_forward_timeout_ms),
        })
    }
}

/// RPC configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RpcConfig {
    /// RPC host.
    pub bind_host: String,
    /// RPC port.
    pub bind_port: u16,
    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Max request body size, in bytes.
    #[serde(default = "default_max_request_body_size")]
    pub max_request_body_size: u32,
    /// Max response body size, in bytes.
    #[serde(default = "default_max_response_body_size")]
    pub max_response_body_size: u32,
    /// Maximum number of requests in a batch.
    #[serde(default = "default_batch_requests_limit")]
    pub batch_requests_limit: u32,
}

impl Default for RpcConfig {
    fn default() -> Self {
        RpcConfig {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 0,
            max_connections: default_max_connections(),
            max_request_body_size: default_max_request_body_size(),
            max_response_body_size: default_max_response_body_size(),
            batch_requests_limit: default_batch_requests_limit(),
        }
    }
}

impl FromEnv for RpcConfig {
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            bind_host: std::env::var("RPC_BIND_HOST")?,
            bind_port: std::env::var("RPC_BIND_PORT")?.parse()?,
            max_connections: env_or("RPC_MAX_CONNECTIONS", default_max_connections),
            max_request_body_size: env_or(
                "RPC_MAX_REQUEST_BODY_SIZE",
                default_max_request_body_size,
            ),
            max_response_body_size: env_or(
                "RPC_MAX_RESPONSE_BODY_SIZE",
                default_max_response_body_size,
            ),
            batch_requests_limit: env_or("RPC_BATCH_REQUESTS_LIMIT", default_batch_requests_limit),
        })
    }
}

fn env_or<T: std::str::FromStr>(var: &str, default: fn() -> T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or_else(default)
}

fn default_max_queue_size() -> usize {
    1024
}

fn default_queue_timeout_ms() -> u64 {
    12_000
}

fn default_max_tx_data_size() -> usize {
    95_000
}

fn default_nonce_cache_size() -> u32 {
    1024
}

fn default_nonce_failure_ttl_ms() -> u64 {
    1_000
}

fn default_max_block_speed_ms() -> u64 {
    250
}

fn default_inactive_wait_ms() -> u64 {
    50
}

fn default_forward_timeout_ms() -> u64 {
    30_000
}

fn default_max_connections() -> u32 {
    100
}

fn default_max_request_body_size() -> u32 {
    10 * 1024 * 1024
}

fn default_max_response_body_size() -> u32 {
    10 * 1024 * 1024
}

fn default_batch_requests_limit() -> u32 {
    50
}
