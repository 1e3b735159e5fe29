//! Aptos fullnode REST client with an Ed25519 signer.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use blindquiz_core::{bytes_to_hex, hex_to_bytes};
use ed25519_dalek::{Signer, SigningKey};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use sha3::{Digest, Sha3_256};
use url::Url;

use super::{EntryCall, Event, Ledger, TxnOutcome};
use crate::error::LedgerError;

const MAX_GAS_AMOUNT: u64 = 200_000;
const GAS_UNIT_PRICE: u64 = 100;
const EXPIRATION_SECS: u64 = 600;
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Single-signer Ed25519 authentication scheme byte.
const ED25519_SCHEME: u8 = 0x00;

pub struct AptosClient {
    http: Client,
    node: String,
    key: SigningKey,
    address: String,
    confirm_timeout: Duration,
}

#[derive(Deserialize)]
struct AccountInfo {
    sequence_number: String,
}

#[derive(Deserialize)]
struct PendingTxn {
    hash: String,
}

#[derive(Deserialize)]
struct CommittedTxn {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    vm_status: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Deserialize)]
struct ResourceEnvelope {
    data: Value,
}

/// Account address of an Ed25519 public key: `sha3_256(pubkey ‖ 0x00)`.
pub fn account_address(public_key: &[u8; 32]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(public_key);
    hasher.update([ED25519_SCHEME]);
    format!("0x{}", bytes_to_hex(&hasher.finalize()))
}

/// Accepts plain hex, `0x` hex, or the `ed25519-priv-0x…` form.
pub fn parse_private_key(s: &str) -> Result<SigningKey, LedgerError> {
    let s = s.trim();
    let s = s.strip_prefix("ed25519-priv-").unwrap_or(s);
    let bytes = hex_to_bytes(s).map_err(|e| LedgerError::Signer(e.to_string()))?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| LedgerError::Signer(format!("expected 32 bytes, got {}", b.len())))?;
    Ok(SigningKey::from_bytes(&seed))
}

async fn check(resp: Response) -> Result<Response, LedgerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(LedgerError::Api { status, message })
}

impl AptosClient {
    pub fn new(node: &Url, key: SigningKey) -> Self {
        let address = account_address(key.verifying_key().as_bytes());
        Self {
            http: Client::new(),
            node: node.as_str().trim_end_matches('/').to_string(),
            key,
            address,
            confirm_timeout: CONFIRM_TIMEOUT,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.node)
    }

    async fn sequence_number(&self) -> Result<u64, LedgerError> {
        let resp = check(self.http.get(self.url(&format!("/accounts/{}", self.address))).send().await?).await?;
        let info: AccountInfo = resp.json().await?;
        info.sequence_number
            .parse()
            .map_err(|_| LedgerError::Response(format!("sequence_number {:?}", info.sequence_number)))
    }

    fn unsigned(&self, call: &EntryCall, sequence_number: u64) -> Value {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        json!({
            "sender": self.address,
            "sequence_number": sequence_number.to_string(),
            "max_gas_amount": MAX_GAS_AMOUNT.to_string(),
            "gas_unit_price": GAS_UNIT_PRICE.to_string(),
            "expiration_timestamp_secs": (now + EXPIRATION_SECS).to_string(),
            "payload": call.payload(),
        })
    }

    async fn wait(&self, hash: &str) -> Result<CommittedTxn, LedgerError> {
        let deadline = tokio::time::Instant::now() + self.confirm_timeout;
        loop {
            let resp = self
                .http
                .get(self.url(&format!("/transactions/wait_by_hash/{hash}")))
                .send()
                .await?;
            if resp.status() != StatusCode::NOT_FOUND {
                let txn: CommittedTxn = check(resp).await?.json().await?;
                if txn.kind != "pending_transaction" {
                    return Ok(txn);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(LedgerError::Timeout(hash.to_string()));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

impl Ledger for AptosClient {
    fn address(&self) -> &str {
        &self.address
    }

    #[tracing::instrument(skip_all, fields(function = call.name()))]
    async fn submit(&self, call: &EntryCall) -> Result<TxnOutcome, LedgerError> {
        let mut txn = self.unsigned(call, self.sequence_number().await?);

        let resp = self
            .http
            .post(self.url("/transactions/encode_submission"))
            .json(&txn)
            .send()
            .await?;
        let message: String = check(resp).await?.json().await?;
        let message = hex_to_bytes(&message).map_err(|e| LedgerError::Response(e.to_string()))?;

        let signature = self.key.sign(&message);
        txn["signature"] = json!({
            "type": "ed25519_signature",
            "public_key": format!("0x{}", bytes_to_hex(self.key.verifying_key().as_bytes())),
            "signature": format!("0x{}", bytes_to_hex(&signature.to_bytes())),
        });

        let resp = self.http.post(self.url("/transactions")).json(&txn).send().await?;
        let pending: PendingTxn = check(resp).await?.json().await?;
        tracing::info!(hash = %pending.hash, "transaction submitted");

        let committed = self.wait(&pending.hash).await?;
        if !committed.success {
            return Err(LedgerError::Rejected {
                hash: pending.hash,
                vm_status: committed.vm_status,
            });
        }
        let version = committed
            .version
            .as_deref()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| LedgerError::Response(format!("no version for {}", pending.hash)))?;
        tracing::debug!(hash = %pending.hash, version, "transaction committed");
        Ok(TxnOutcome {
            hash: pending.hash,
            version,
            events: committed.events,
        })
    }

    async fn resource(&self, owner: &str, resource_type: &str, at_version: Option<u64>) -> Result<Value, LedgerError> {
        let mut req = self.http.get(self.url(&format!("/accounts/{owner}/resource/{resource_type}")));
        if let Some(v) = at_version {
            req = req.query(&[("ledger_version", v.to_string())]);
        }
        let resp = req.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(LedgerError::NotFound(format!("{resource_type} at {owner}")));
        }
        let envelope: ResourceEnvelope = check(resp).await?.json().await?;
        Ok(envelope.data)
    }

    async fn table_item(
        &self,
        handle: &str,
        key_type: &str,
        value_type: &str,
        key: &Value,
    ) -> Result<Option<Value>, LedgerError> {
        let resp = self
            .http
            .post(self.url(&format!("/tables/{handle}/item")))
            .json(&json!({ "key_type": key_type, "value_type": value_type, "key": key }))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(resp).await?.json().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_derivation() {
        let key = parse_private_key(&format!("0x{}01", "00".repeat(31))).unwrap();
        let addr = account_address(key.verifying_key().as_bytes());
        assert_eq!(addr.len(), 66);
        assert!(addr.starts_with("0x"));

        let mut hasher = Sha3_256::new();
        hasher.update(key.verifying_key().as_bytes());
        hasher.update([0u8]);
        assert_eq!(addr, format!("0x{}", hex::encode(hasher.finalize())));
    }

    #[test]
    fn private_key_forms() {
        let hex_key = "11".repeat(32);
        let a = parse_private_key(&hex_key).unwrap();
        let b = parse_private_key(&format!("0x{hex_key}")).unwrap();
        let c = parse_private_key(&format!("ed25519-priv-0x{hex_key}")).unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_eq!(b.to_bytes(), c.to_bytes());
        assert!(matches!(parse_private_key("0x1234"), Err(LedgerError::Signer(_))));
    }

    #[test]
    fn client_url_has_no_double_slash() {
        let node = Url::parse("https://api.testnet.aptoslabs.com/v1/").unwrap();
        let client = AptosClient::new(&node, parse_private_key(&"22".repeat(32)).unwrap());
        assert_eq!(client.url("/accounts/0x1"), "https://api.testnet.aptoslabs.com/v1/accounts/0x1");
    }
}
