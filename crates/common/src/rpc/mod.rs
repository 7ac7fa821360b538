//! Helpers shared by RPC servers across the workspace.

use std::net::SocketAddr;

use jsonrpsee::server::{BatchRequestConfig, ServerBuilder};
use jsonrpsee::types::error::{INTERNAL_ERROR_CODE, INTERNAL_ERROR_MSG};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::config::RpcConfig;
use crate::tasks::TaskManager;

/// Returns an internal server error with the given message as data.
pub fn internal_rpc_error(msg: impl ToString) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        INTERNAL_ERROR_CODE,
        INTERNAL_ERROR_MSG,
        Some(msg.to_string()),
    )
}

/// Starts a RPC server with the provided rpc methods.
///
/// The server runs until the task manager's cancellation token fires. The
/// bound address is reported through `channel` when one is provided, which
/// matters when binding port 0.
pub fn start_rpc_server(
    rpc_config: RpcConfig,
    task_manager: &mut TaskManager<()>,
    methods: RpcModule<()>,
    channel: Option<oneshot::Sender<SocketAddr>>,
) {
    let bind_host = match rpc_config.bind_host.parse() {
        Ok(bind_host) => bind_host,
        Err(e) => {
            error!("Failed to parse bind host: {}", e);
            return;
        }
    };
    let listen_address = SocketAddr::new(bind_host, rpc_config.bind_port);

    let max_connections = rpc_config.max_connections;
    let max_request_body_size = rpc_config.max_request_body_size;
    let max_response_body_size = rpc_config.max_response_body_size;
    let batch_requests_limit = rpc_config.batch_requests_limit;

    task_manager.spawn(move |cancellation_token| async move {
        let server = ServerBuilder::default()
            .max_connections(max_connections)
            .max_request_body_size(max_request_body_size)
            .max_response_body_size(max_response_body_size)
            .set_batch_request_config(BatchRequestConfig::Limit(batch_requests_limit))
            .build([listen_address].as_ref())
            .await;

        match server {
            Ok(server) => {
                let bound_address = match server.local_addr() {
                    Ok(address) => address,
                    Err(e) => {
                        error!("{}", e);
                        return;
                    }
                };
                if let Some(channel) = channel {
                    if let Err(e) = channel.send(bound_address) {
                        error!("Could not send bound_address {}: {}", bound_address, e);
                        return;
                    }
                }
                info!("Starting RPC server at {} ", &bound_address);

                let _server_handle = server.start(methods);
                cancellation_token.cancelled().await;
            }
            Err(e) => {
                error!("Could not start RPC server: {}", e);
            }
        }
    });
}
