use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;
use crate::config::PaperTradingConfig;
use crate::wallet::{
    sol_to_lamports, ChainRpc, SignedTransfer, TransferRequest, WalletError, WalletProvider,
};

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Simulated wallet extension for paper trading.
pub struct PaperWallet {
    address: String,
    reject_rate: f64,
    connected: Mutex<bool>,
}

impl PaperWallet {
    pub fn new(config: &PaperTradingConfig) -> Self {
        Self {
            address: config.address.clone(),
            reject_rate: config.reject_rate,
            connected: Mutex::new(false),
        }
    }

    fn user_declines(&self) -> bool {
        rand::thread_rng().gen::<f64>() < self.reject_rate
    }

    fn is_connected(&self) -> bool {
        self.connected.lock().map(|c| *c).unwrap_or(false)
    }

    fn set_connected(&self, value: bool) {
        if let Ok(mut connected) = self.connected.lock() {
            *connected = value;
        }
    }
}

#[async_trait]
impl WalletProvider for PaperWallet {
    async fn is_available(&self) -> bool {
        true
    }

    async fn connect(&self) -> Result<String, WalletError> {
        if self.is_connected() {
            return Ok(self.address.clone());
        }
        if self.user_declines() {
            return Err(WalletError::UserRejected);
        }
        self.set_connected(true);
        Ok(self.address.clone())
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.set_connected(false);
        Ok(())
    }

    async fn public_key(&self) -> Option<String> {
        self.is_connected().then(|| self.address.clone())
    }

    async fn sign_transfer(&self, transfer: &TransferRequest) -> Result<SignedTransfer, WalletError> {
        if !self.is_connected() {
            return Err(WalletError::Other("Wallet not connected".to_string()));
        }
        if transfer.from != self.address {
            return Err(WalletError::Signing(format!(
                "Transfer source {} does not match wallet {}",
                transfer.from, self.address
            )));
        }
        if self.user_declines() {
            return Err(WalletError::UserRejected);
        }

        let bytes = serde_json::to_vec(transfer)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        Ok(SignedTransfer { bytes })
    }
}

/// Simulated chain holding balances and transfer signatures in memory.
pub struct PaperChain {
    balances: Mutex<HashMap<String, u64>>,
    confirm_rate: f64,
    confirmed: Mutex<HashMap<String, bool>>,
    reachable: bool,
}

impl PaperChain {
    pub fn new(config: &PaperTradingConfig) -> Self {
        let mut balances = HashMap::new();
        balances.insert(config.address.clone(), sol_to_lamports(config.initial_balance_sol));
        info!(
            "Paper chain initialized with {:.3} SOL for {}",
            config.initial_balance_sol, config.address
        );

        Self {
            balances: Mutex::new(balances),
            confirm_rate: config.confirm_rate,
            confirmed: Mutex::new(HashMap::new()),
            reachable: config.rpc_reachable,
        }
    }

    fn lock_balances(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, u64>>> {
        self.balances
            .lock()
            .map_err(|_| anyhow::anyhow!("Paper chain balance lock poisoned"))
    }
}

#[async_trait]
impl ChainRpc for PaperChain {
    async fn probe(&self) -> Result<()> {
        if !self.reachable {
            anyhow::bail!("Paper RPC endpoint unreachable");
        }
        Ok(())
    }

    async fn get_balance(&self, address: &str) -> Result<u64> {
        if !self.reachable {
            anyhow::bail!("Paper RPC endpoint unreachable");
        }
        Ok(self.lock_balances()?.get(address).copied().unwrap_or(0))
    }

    async fn get_latest_blockhash(&self) -> Result<String> {
        Ok(random_base58(44))
    }

    async fn send_raw_transaction(&self, transaction: &SignedTransfer) -> Result<String> {
        let transfer: TransferRequest = serde_json::from_slice(&transaction.bytes)
            .context("Paper chain cannot decode transaction")?;

        {
            let mut balances = self.lock_balances()?;
            let source = balances.get(&transfer.from).copied().unwrap_or(0);
            if source < transfer.lamports {
                anyhow::bail!(
                    "Insufficient funds: {} lamports available, {} required",
                    source,
                    transfer.lamports
                );
            }
            balances.insert(transfer.from.clone(), source - transfer.lamports);
            *balances.entry(transfer.to.clone()).or_insert(0) += transfer.lamports;
        }

        let signature = random_base58(88);
        let lands = rand::thread_rng().gen::<f64>() < self.confirm_rate;
        if let Ok(mut confirmed) = self.confirmed.lock() {
            confirmed.insert(signature.clone(), lands);
        }

        info!(
            "Paper transfer of {} lamports to {} submitted: {}",
            transfer.lamports, transfer.to, signature
        );
        Ok(signature)
    }

    async fn confirm_transaction(&self, signature: &str) -> Result<()> {
        let lands = self
            .confirmed
            .lock()
            .map_err(|_| anyhow::anyhow!("Paper chain signature lock poisoned"))?
            .get(signature)
            .copied();

        match lands {
            Some(true) => Ok(()),
            Some(false) => anyhow::bail!("Transaction {} expired before confirmation", signature),
            None => anyhow::bail!("Unknown transaction {}", signature),
        }
    }
}

fn random_base58(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE58_ALPHABET[rng.gen_range(0..BASE58_ALPHABET.len())] as char)
        .collect()
}
