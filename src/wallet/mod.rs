pub mod paper;
pub mod rpc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Convert a SOL amount to lamports, rounding down.
pub fn sol_to_lamports(amount: f64) -> u64 {
    (amount * LAMPORTS_PER_SOL as f64).floor().max(0.0) as u64
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// The single transaction shape this client produces: a plain transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub lamports: u64,
    pub fee_payer: String,
    pub recent_blockhash: Option<String>,
}

/// Wallet-signed transaction bytes, opaque to everything but the chain.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Wallet not detected. Please install a wallet extension: https://phantom.app/")]
    NotInstalled,

    #[error("User rejected the request")]
    UserRejected,

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Wallet error: {0}")]
    Other(String),
}

/// Browser-extension style wallet: holds the key, asks the user, signs.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn is_available(&self) -> bool;
    /// Returns the public key once the user approves.
    async fn connect(&self) -> Result<String, WalletError>;
    async fn disconnect(&self) -> Result<(), WalletError>;
    /// Public key of an already-trusted session, if any.
    async fn public_key(&self) -> Option<String>;
    async fn sign_transfer(&self, transfer: &TransferRequest) -> Result<SignedTransfer, WalletError>;
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Cheap liveness check.
    async fn probe(&self) -> Result<()>;
    async fn get_balance(&self, address: &str) -> Result<u64>;
    async fn get_latest_blockhash(&self) -> Result<String>;
    /// Returns the transaction signature.
    async fn send_raw_transaction(&self, transaction: &SignedTransfer) -> Result<String>;
    async fn confirm_transaction(&self, signature: &str) -> Result<()>;
}

/// `abcd...wxyz` style shortening used in the wallet header and history.
pub fn shorten_address(address: &str, head: usize, tail: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= head + tail {
        return address.to_string();
    }
    let start: String = chars[..head].iter().collect();
    let end: String = chars[chars.len() - tail..].iter().collect();
    format!("{}...{}", start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sol_to_lamports_rounds_down() {
        assert_eq!(sol_to_lamports(1.0), 1_000_000_000);
        assert_eq!(sol_to_lamports(0.1234567891), 123_456_789);
        assert_eq!(sol_to_lamports(-1.0), 0);
        assert_eq!(lamports_to_sol(2_500_000_000), 2.5);
    }

    #[test]
    fn test_shorten_address() {
        let address = "3SgkeKqYFhJy7YA2yVdaJEcZxtHqX68DesouKH4A6evm";

        assert_eq!(shorten_address(address, 4, 4), "3Sgk...6evm");
        assert_eq!(shorten_address(address, 6, 4), "3SgkeK...6evm");
        assert_eq!(shorten_address("abc", 4, 4), "abc");
    }
}
