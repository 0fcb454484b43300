//! JSON-RPC 2.0 client for a remote Umbra daemon.
//!
//! Speaks a small method set over HTTP POST to `<uri>/json_rpc`:
//! `get_height`, `get_info`, `get_blocks`, and `relay_tx`. Blocks and
//! transactions travel as hex-encoded bincode inside the JSON envelope.
//! Every request carries a timeout; there is no unbounded wait on a dead
//! connection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use umbra_core::types::Block;

use crate::client::{DaemonClient, DaemonInfo, RpcConnection};
use crate::error::DaemonError;

/// Default timeout applied to every daemon RPC.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-RPC 2.0 request envelope.
#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: P,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

/// JSON-RPC 2.0 error object.
#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct HeightResult {
    height: u64,
}

#[derive(Deserialize)]
struct InfoResult {
    height: u64,
    target_height: u64,
    synced: bool,
    trusted: bool,
}

#[derive(Serialize)]
struct GetBlocksParams {
    from_height: u64,
    max_count: usize,
}

#[derive(Deserialize)]
struct BlocksResult {
    /// Hex-encoded bincode blocks, consecutive from `from_height`.
    blocks: Vec<String>,
}

#[derive(Serialize)]
struct RelayParams<'a> {
    tx_hex: &'a str,
}

#[derive(Deserialize)]
struct RelayResult {
    #[allow(dead_code)]
    status: String,
}

/// Blocking JSON-RPC client for a remote daemon.
#[derive(Debug)]
pub struct HttpDaemonClient {
    connection: RpcConnection,
    endpoint: String,
    http: reqwest::blocking::Client,
}

impl HttpDaemonClient {
    /// Create a client with the default request timeout.
    pub fn new(connection: RpcConnection) -> Result<Self, DaemonError> {
        Self::with_timeout(connection, DEFAULT_RPC_TIMEOUT)
    }

    /// Create a client with an explicit request timeout.
    pub fn with_timeout(
        connection: RpcConnection,
        timeout: Duration,
    ) -> Result<Self, DaemonError> {
        let endpoint = rpc_endpoint(&connection.uri)?;
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DaemonError::Unreachable(e.to_string()))?;
        Ok(Self {
            connection,
            endpoint,
            http,
        })
    }

    /// The connection settings this client was built from.
    pub fn connection(&self) -> &RpcConnection {
        &self.connection
    }

    /// Issue one JSON-RPC call and decode its result.
    fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, DaemonError> {
        debug!(method, endpoint = %self.endpoint, "daemon rpc call");

        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 0,
            method,
            params,
        };

        let mut builder = self.http.post(&self.endpoint).json(&request);
        if !self.connection.username.is_empty() {
            builder = builder.basic_auth(
                &self.connection.username,
                Some(&self.connection.password),
            );
        }

        let response = builder.send().map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(DaemonError::Unreachable(format!("http status {status}")));
        }
        if !status.is_success() {
            return Err(DaemonError::Rejected(format!("http status {status}")));
        }

        let envelope: RpcResponse<R> = response
            .json()
            .map_err(|e| DaemonError::InvalidResponse(e.to_string()))?;

        if let Some(err) = envelope.error {
            return Err(DaemonError::Rejected(format!(
                "{} (code {})",
                err.message, err.code
            )));
        }

        envelope
            .result
            .ok_or_else(|| DaemonError::InvalidResponse("missing result".into()))
    }
}

impl DaemonClient for HttpDaemonClient {
    fn get_height(&self) -> Result<u64, DaemonError> {
        let result: HeightResult = self.call("get_height", ())?;
        Ok(result.height)
    }

    fn get_info(&self) -> Result<DaemonInfo, DaemonError> {
        let result: InfoResult = self.call("get_info", ())?;
        Ok(DaemonInfo {
            height: result.height,
            target_height: result.target_height,
            synced: result.synced,
            trusted: result.trusted,
        })
    }

    fn fetch_blocks(&self, from_height: u64, max_count: usize) -> Result<Vec<Block>, DaemonError> {
        let result: BlocksResult = self.call(
            "get_blocks",
            GetBlocksParams {
                from_height,
                max_count,
            },
        )?;
        result.blocks.iter().map(|hex| decode_block_hex(hex)).collect()
    }

    fn relay(&self, tx_hex: &str) -> Result<(), DaemonError> {
        let _result: RelayResult = self.call("relay_tx", RelayParams { tx_hex })?;
        Ok(())
    }
}

/// Validate the daemon URI and derive the JSON-RPC endpoint from it.
fn rpc_endpoint(uri: &str) -> Result<String, DaemonError> {
    let url = reqwest::Url::parse(uri)
        .map_err(|e| DaemonError::InvalidUri(format!("{uri}: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(DaemonError::InvalidUri(format!(
                "{uri}: unsupported scheme {other}"
            )));
        }
    }
    Ok(format!("{}/json_rpc", uri.trim_end_matches('/')))
}

/// Decode one hex-encoded bincode block from a daemon response.
fn decode_block_hex(block_hex: &str) -> Result<Block, DaemonError> {
    let bytes = hex::decode(block_hex)
        .map_err(|e| DaemonError::InvalidResponse(format!("block hex: {e}")))?;
    let (block, _) = bincode::decode_from_slice(&bytes, bincode::config::standard())
        .map_err(|e| DaemonError::InvalidResponse(format!("block decode: {e}")))?;
    Ok(block)
}

/// Map a reqwest transport error to the daemon error taxonomy.
fn classify_transport_error(e: reqwest::Error) -> DaemonError {
    if e.is_timeout() {
        DaemonError::Unreachable(format!("request timed out: {e}"))
    } else {
        DaemonError::Unreachable(e.to_string())
    }
}
