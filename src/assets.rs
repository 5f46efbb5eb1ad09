//! Compressed-asset proofs
//!
//! Compressed NFTs have no token account; moving one requires a merkle
//! inclusion proof against the tree's current root. Proofs come from a
//! DAS-capable indexer (`getAsset` + `getAssetProof`), trimmed by the
//! tree's canopy, which the program already stores on-ledger.

use crate::errors::{SwapError, SwapResult};
use crate::rpc_manager::{LedgerRpc, RpcManagerError};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Everything a compressed transfer needs besides the swap accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedAssetProof {
    pub root: [u8; 32],
    pub data_hash: [u8; 32],
    pub creator_hash: [u8; 32],
    pub nonce: u64,
    pub leaf_index: u32,
    pub merkle_tree: Pubkey,
    pub tree_authority: Pubkey,
    /// Proof nodes not covered by the canopy, leaf side first
    pub proof_path: Vec<Pubkey>,
}

#[async_trait]
pub trait AssetProofSource: Send + Sync + std::fmt::Debug {
    async fn asset_proof(&self, asset_id: &Pubkey) -> SwapResult<CompressedAssetProof>;
}

// Concurrent merkle tree account layout
const TREE_HEADER_SIZE: usize = 56;
const TREE_HEADER_AUTHORITY: std::ops::Range<usize> = 10..42;

/// Parsed header of a concurrent merkle tree account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHeader {
    pub max_buffer_size: u32,
    pub max_depth: u32,
    pub authority: Pubkey,
    pub canopy_depth: u32,
}

fn read_u32(raw: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&raw[at..at + 4]);
    u32::from_le_bytes(bytes)
}

impl TreeHeader {
    pub fn parse(raw: &[u8]) -> SwapResult<Self> {
        if raw.len() < TREE_HEADER_SIZE {
            return Err(SwapError::decode("merkle tree account shorter than its header"));
        }
        let max_buffer_size = read_u32(raw, 2);
        let max_depth = read_u32(raw, 6);
        let authority = Pubkey::try_from(&raw[TREE_HEADER_AUTHORITY])
            .map_err(|_| SwapError::decode("bad tree authority"))?;

        let depth = max_depth as usize;
        let changelog = 32 + depth * 32 + 8;
        let rightmost_proof = depth * 32 + 32 + 8;
        let tree_size = 24 + max_buffer_size as usize * changelog + rightmost_proof;
        let canopy_bytes = raw
            .len()
            .checked_sub(TREE_HEADER_SIZE + tree_size)
            .ok_or_else(|| SwapError::decode("merkle tree account shorter than its tree"))?;

        Ok(Self {
            max_buffer_size,
            max_depth,
            authority,
            canopy_depth: canopy_depth(canopy_bytes / 32),
        })
    }
}

/// A canopy of depth d caches `2^(d+1) - 2` nodes
pub fn canopy_depth(canopy_nodes: usize) -> u32 {
    if canopy_nodes == 0 {
        return 0;
    }
    let n = canopy_nodes + 2;
    (usize::BITS - 1 - n.leading_zeros()).saturating_sub(1)
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: IdParams,
}

#[derive(Serialize)]
struct IdParams {
    id: String,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct DasAsset {
    compression: DasCompression,
}

#[derive(Debug, Deserialize)]
struct DasCompression {
    data_hash: String,
    creator_hash: String,
    leaf_id: u64,
}

#[derive(Debug, Deserialize)]
struct DasAssetProof {
    root: String,
    proof: Vec<String>,
    tree_id: String,
}

/// [`AssetProofSource`] backed by a DAS indexer and the ledger
#[derive(Debug)]
pub struct DasProofClient {
    http: reqwest::Client,
    url: String,
    ledger: Arc<dyn LedgerRpc>,
    commitment: CommitmentConfig,
}

impl DasProofClient {
    pub fn new(
        url: impl Into<String>,
        ledger: Arc<dyn LedgerRpc>,
        commitment: CommitmentConfig,
        timeout: Duration,
    ) -> SwapResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwapError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            ledger,
            commitment,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, asset_id: &Pubkey) -> SwapResult<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: "swap-escrow",
            method,
            params: IdParams {
                id: asset_id.to_string(),
            },
        };
        let response: JsonRpcResponse<T> = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| RpcManagerError::from_http_error(e, &self.url))?
            .json()
            .await
            .map_err(|e| RpcManagerError::from_http_error(e, &self.url))?;

        if let Some(err) = response.error {
            return Err(RpcManagerError::RpcResponse {
                endpoint: self.url.clone(),
                message: format!("{method}: {}", err.message),
                code: Some(err.code),
            }
            .into());
        }
        response.result.ok_or_else(|| {
            RpcManagerError::MalformedResponse {
                endpoint: self.url.clone(),
                message: format!("{method} returned no result for {asset_id}"),
            }
            .into()
        })
    }

    async fn tree_header(&self, tree: &Pubkey) -> SwapResult<TreeHeader> {
        let account = self
            .ledger
            .get_account(tree, self.commitment)
            .await?
            .ok_or_else(|| SwapError::not_found(tree))?;
        TreeHeader::parse(&account.data)
    }
}

fn decode_hash(field: &str, value: &str) -> SwapResult<[u8; 32]> {
    let bytes = bs58::decode(value)
        .into_vec()
        .map_err(|e| SwapError::decode(format!("{field}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| SwapError::decode(format!("{field}: expected 32 bytes")))
}

fn decode_key(field: &str, value: &str) -> SwapResult<Pubkey> {
    Pubkey::from_str(value).map_err(|e| SwapError::decode(format!("{field}: {e}")))
}

#[async_trait]
impl AssetProofSource for DasProofClient {
    async fn asset_proof(&self, asset_id: &Pubkey) -> SwapResult<CompressedAssetProof> {
        let asset: DasAsset = self.call("getAsset", asset_id).await?;
        let proof: DasAssetProof = self.call("getAssetProof", asset_id).await?;

        let merkle_tree = decode_key("tree_id", &proof.tree_id)?;
        let header = self.tree_header(&merkle_tree).await?;

        let keep = proof
            .proof
            .len()
            .saturating_sub(header.canopy_depth as usize);
        let proof_path = proof.proof[..keep]
            .iter()
            .map(|node| decode_key("proof", node))
            .collect::<SwapResult<Vec<_>>>()?;

        let leaf_index = u32::try_from(asset.compression.leaf_id)
            .map_err(|_| SwapError::decode("leaf_id out of range"))?;

        debug!(
            asset = %asset_id,
            tree = %merkle_tree,
            canopy_depth = header.canopy_depth,
            proof_len = proof_path.len(),
            "Fetched compressed asset proof"
        );

        Ok(CompressedAssetProof {
            root: decode_hash("root", &proof.root)?,
            data_hash: decode_hash("data_hash", &asset.compression.data_hash)?,
            creator_hash: decode_hash("creator_hash", &asset.compression.creator_hash)?,
            nonce: asset.compression.leaf_id,
            leaf_index,
            merkle_tree,
            tree_authority: header.authority,
            proof_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{merkle_tree_account, MockLedger};
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_canopy_depth() {
        assert_eq!(canopy_depth(0), 0);
        assert_eq!(canopy_depth(2), 1);
        assert_eq!(canopy_depth(6), 2);
        assert_eq!(canopy_depth(14), 3);
    }

    #[test]
    fn test_tree_header_parse() {
        let authority = Pubkey::new_unique();
        let account = merkle_tree_account(14, 64, 10, authority);
        let header = TreeHeader::parse(&account.data).unwrap();
        assert_eq!(header.max_depth, 14);
        assert_eq!(header.max_buffer_size, 64);
        assert_eq!(header.authority, authority);
        assert_eq!(header.canopy_depth, 10);

        assert!(TreeHeader::parse(&account.data[..100]).is_err());
    }

    #[tokio::test]
    async fn test_das_proof_trimmed_by_canopy() {
        let mut server = mockito::Server::new_async().await;
        let asset_id = Pubkey::new_unique();
        let tree = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let nodes: Vec<String> = (0..5).map(|_| Pubkey::new_unique().to_string()).collect();
        let hash = bs58::encode([7u8; 32]).into_string();

        let _asset = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": "getAsset"})))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": "swap-escrow",
                    "result": {
                        "compression": {
                            "data_hash": hash,
                            "creator_hash": hash,
                            "leaf_id": 42,
                            "tree": tree.to_string()
                        }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _proof = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": "getAssetProof"})))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": "swap-escrow",
                    "result": {
                        "root": hash,
                        "proof": nodes,
                        "node_index": 16426,
                        "leaf": hash,
                        "tree_id": tree.to_string()
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let ledger = Arc::new(MockLedger::new());
        ledger.set_account(tree, merkle_tree_account(5, 8, 2, authority));

        let client = DasProofClient::new(
            server.url(),
            ledger,
            CommitmentConfig::confirmed(),
            Duration::from_secs(5),
        )
        .unwrap();
        let proof = client.asset_proof(&asset_id).await.unwrap();

        assert_eq!(proof.merkle_tree, tree);
        assert_eq!(proof.tree_authority, authority);
        assert_eq!(proof.leaf_index, 42);
        assert_eq!(proof.nonce, 42);
        assert_eq!(proof.root, [7u8; 32]);
        // depth 5, canopy 2: three nodes left
        assert_eq!(proof.proof_path.len(), 3);
        assert_eq!(proof.proof_path[0].to_string(), nodes[0]);
    }

    #[tokio::test]
    async fn test_das_error_surfaces_as_rpc_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": "swap-escrow",
                    "error": {"code": -32000, "message": "Asset not found"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = DasProofClient::new(
            server.url(),
            Arc::new(MockLedger::new()),
            CommitmentConfig::confirmed(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.asset_proof(&Pubkey::new_unique()).await.unwrap_err();
        match err {
            SwapError::Rpc(RpcManagerError::RpcResponse { code, message, .. }) => {
                assert_eq!(code, Some(-32000));
                assert!(message.contains("Asset not found"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
