use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use crate::config::ChainConfig;
use crate::wallet::{ChainRpc, SignedTransfer};

/// JSON-RPC client bound to one Solana endpoint.
pub struct SolanaRpc {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
    confirm_attempts: u32,
    confirm_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    confirmation_status: Option<String>,
    err: Option<Value>,
}

impl SolanaRpc {
    pub fn new(endpoint: String, config: &ChainConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_secs))
            .build()
            .context("Failed to build RPC client")?;

        Ok(Self {
            client,
            endpoint,
            next_id: AtomicU64::new(1),
            confirm_attempts: config.confirm_attempts,
            confirm_interval: Duration::from_millis(config.confirm_interval_ms),
        })
    }

    /// Walk the endpoint list and keep the first that answers a probe.
    /// Returns the client and whether it is running in fallback mode.
    pub async fn connect(config: &ChainConfig) -> Result<(Self, bool)> {
        let mut candidates = Vec::with_capacity(config.rpc_endpoints.len());
        for endpoint in &config.rpc_endpoints {
            candidates.push(Self::new(endpoint.clone(), config)?);
        }

        let selected = select_endpoint(&candidates, |rpc| rpc.probe()).await;
        let fallback = selected.is_none();
        let index = selected.unwrap_or(0);

        let rpc = candidates
            .into_iter()
            .nth(index)
            .context("No RPC endpoints configured")?;

        if fallback {
            error!("All RPC endpoints failed - using fallback mode");
        } else {
            info!("Connected to Solana via: {}", redact(&rpc.endpoint));
        }

        Ok((rpc, fallback))
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse<T> = self.client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("RPC {} request failed", method))?
            .error_for_status()
            .with_context(|| format!("RPC {} returned error status", method))?
            .json()
            .await
            .with_context(|| format!("Failed to parse RPC {} response", method))?;

        if let Some(err) = response.error {
            anyhow::bail!("RPC {} error {}: {}", method, err.code, err.message);
        }
        response
            .result
            .with_context(|| format!("RPC {} returned no result", method))
    }
}

#[async_trait]
impl ChainRpc for SolanaRpc {
    async fn probe(&self) -> Result<()> {
        let _: Value = self.call("getEpochInfo", json!([])).await?;
        Ok(())
    }

    async fn get_balance(&self, address: &str) -> Result<u64> {
        let balance: WithContext<u64> = self
            .call("getBalance", json!([address, {"commitment": "confirmed"}]))
            .await?;
        Ok(balance.value)
    }

    async fn get_latest_blockhash(&self) -> Result<String> {
        let latest: WithContext<BlockhashValue> = self
            .call("getLatestBlockhash", json!([{"commitment": "confirmed"}]))
            .await?;
        Ok(latest.value.blockhash)
    }

    async fn send_raw_transaction(&self, transaction: &SignedTransfer) -> Result<String> {
        let encoded = BASE64_STANDARD.encode(&transaction.bytes);
        self.call("sendTransaction", json!([encoded, {"encoding": "base64"}]))
            .await
    }

    async fn confirm_transaction(&self, signature: &str) -> Result<()> {
        for attempt in 1..=self.confirm_attempts {
            let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
                .call("getSignatureStatuses", json!([[signature]]))
                .await?;

            if let Some(Some(status)) = statuses.value.into_iter().next() {
                if let Some(err) = status.err {
                    anyhow::bail!("Transaction {} failed on chain: {}", signature, err);
                }
                if matches!(
                    status.confirmation_status.as_deref(),
                    Some("confirmed") | Some("finalized")
                ) {
                    debug!("Transaction {} confirmed after {} polls", signature, attempt);
                    return Ok(());
                }
            }
            tokio::time::sleep(self.confirm_interval).await;
        }

        anyhow::bail!(
            "Transaction {} not confirmed after {} attempts",
            signature,
            self.confirm_attempts
        )
    }
}

/// Index of the first candidate whose probe succeeds, tried in order.
pub async fn select_endpoint<'a, T, F, Fut>(candidates: &'a [T], probe: F) -> Option<usize>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = Result<()>> + 'a,
{
    for (index, candidate) in candidates.iter().enumerate() {
        match probe(candidate).await {
            Ok(()) => return Some(index),
            Err(e) => {
                warn!("RPC endpoint #{} failed: {:#}", index, e);
                continue;
            }
        }
    }
    None
}

/// Hide query strings, which tend to carry API keys.
fn redact(endpoint: &str) -> &str {
    endpoint.split('?').next().unwrap_or(endpoint)
}
