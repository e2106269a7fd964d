//! Key-file backed signer producing RLP-encoded legacy transactions.

use std::path::Path;

use async_trait::async_trait;
use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes, TransactionRequest, U256};
use ethers::utils::keccak256;

use super::key_file::{parse_key_material, read_key_file};
use super::{DraftTransaction, SignedTransaction, TransactionSigner};
use crate::error::DispatchError;
use crate::queue::{decode_payload, parse_address};

pub struct WalletSigner {
    wallet: LocalWallet,
    address: String,
    chain_id: u64,
}

impl WalletSigner {
    /// Load the signing key from a `--pem` file.
    pub fn from_key_file(path: &Path, chain_id: u64) -> Result<Self, DispatchError> {
        let secret = read_key_file(path)?;
        let signer = Self::from_secret(&secret, chain_id)?;
        log::info!(
            "[SIGNER] Loaded key for {} from {} (chain {})",
            signer.address,
            path.display(),
            chain_id
        );
        Ok(signer)
    }

    /// Create a signer from a hex private key string
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self, DispatchError> {
        let secret = parse_key_material(private_key)?;
        Self::from_secret(&secret, chain_id)
    }

    fn from_secret(secret: &[u8; 32], chain_id: u64) -> Result<Self, DispatchError> {
        let signing_key = SigningKey::from_slice(secret)
            .map_err(|e| DispatchError::Signing(format!("Invalid private key: {}", e)))?;

        let wallet = LocalWallet::from(signing_key).with_chain_id(chain_id);
        let address = format!("{:?}", wallet.address()).to_lowercase();

        Ok(Self {
            wallet,
            address,
            chain_id,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl TransactionSigner for WalletSigner {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn sign(&self, draft: &DraftTransaction) -> Result<SignedTransaction, DispatchError> {
        let to = parse_address(&draft.receiver)
            .map_err(|e| DispatchError::Signing(format!("Draft #{}: {}", draft.sequence, e)))?;
        let value = U256::from_dec_str(&draft.value).map_err(|_| {
            DispatchError::Signing(format!("Draft #{}: invalid value '{}'", draft.sequence, draft.value))
        })?;
        let data = decode_payload(&draft.data)
            .map_err(|e| DispatchError::Signing(format!("Draft #{}: {}", draft.sequence, e)))?;

        let request = TransactionRequest::new()
            .from(self.wallet.address())
            .to(to)
            .value(value)
            .gas(draft.gas_limit)
            .gas_price(draft.gas_price)
            .nonce(draft.nonce)
            .data(Bytes::from(data))
            .chain_id(self.chain_id);

        let typed_tx: TypedTransaction = request.into();
        let signature = self
            .wallet
            .sign_transaction(&typed_tx)
            .await
            .map_err(|e| DispatchError::Signing(format!("Failed to sign transaction: {}", e)))?;

        let raw = typed_tx.rlp_signed(&signature);
        let hash = format!("0x{}", hex::encode(keccak256(&raw)));

        log::debug!(
            "[SIGNER] Signed #{} nonce={} hash={}",
            draft.sequence,
            draft.nonce,
            hash
        );

        Ok(SignedTransaction {
            sequence: draft.sequence,
            nonce: draft.nonce,
            raw: raw.to_vec(),
            hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, Transaction};

    // Hardhat account #0 (DO NOT USE IN PRODUCTION)
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const RECEIVER: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

    fn draft(nonce: u64, data: &str) -> DraftTransaction {
        DraftTransaction {
            sequence: 4,
            receiver: RECEIVER.to_string(),
            value: "1000000000000000000".to_string(),
            nonce,
            gas_price: 2_000_000_000,
            gas_limit: 50_000,
            data: data.to_string(),
        }
    }

    #[test]
    fn test_address_from_private_key() {
        let signer = WalletSigner::from_private_key(TEST_KEY, 31337).unwrap();
        assert_eq!(signer.address(), TEST_ADDRESS);
        assert_eq!(signer.chain_id(), 31337);
    }

    #[test]
    fn test_from_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.pem");
        std::fs::write(&path, format!("{}\n", TEST_KEY)).unwrap();

        let signer = WalletSigner::from_key_file(&path, 1).unwrap();
        assert_eq!(signer.address(), TEST_ADDRESS);
    }

    #[test]
    fn test_zero_key_rejected() {
        let zero = "00".repeat(32);
        assert!(matches!(
            WalletSigner::from_private_key(&zero, 1),
            Err(DispatchError::Signing(_))
        ));
    }

    #[tokio::test]
    async fn test_signed_transaction_decodes_to_draft() {
        let signer = WalletSigner::from_private_key(TEST_KEY, 31337).unwrap();
        let signed = signer.sign(&draft(5, "0xdeadbeef")).await.unwrap();

        assert_eq!(signed.sequence, 4);
        assert_eq!(signed.nonce, 5);
        assert_eq!(signed.hash.len(), 66);

        let decoded: Transaction = ethers::utils::rlp::decode(&signed.raw).unwrap();
        assert_eq!(decoded.nonce, U256::from(5));
        assert_eq!(decoded.to, Some(RECEIVER.parse::<Address>().unwrap()));
        assert_eq!(decoded.gas, U256::from(50_000));
        assert_eq!(decoded.gas_price, Some(U256::from(2_000_000_000u64)));
        assert_eq!(decoded.value, U256::exp10(18));
        assert_eq!(decoded.input.to_vec(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(format!("{:?}", decoded.hash), signed.hash);
        assert_eq!(
            decoded.recover_from().unwrap(),
            TEST_ADDRESS.parse::<Address>().unwrap()
        );
    }

    #[tokio::test]
    async fn test_text_payload_signed_as_bytes() {
        let signer = WalletSigner::from_private_key(TEST_KEY, 1).unwrap();
        let signed = signer.sign(&draft(0, "claim")).await.unwrap();

        let decoded: Transaction = ethers::utils::rlp::decode(&signed.raw).unwrap();
        assert_eq!(decoded.input.to_vec(), b"claim".to_vec());
    }

    #[tokio::test]
    async fn test_different_nonces_give_different_hashes() {
        let signer = WalletSigner::from_private_key(TEST_KEY, 1).unwrap();
        let a = signer.sign(&draft(7, "")).await.unwrap();
        let b = signer.sign(&draft(8, "")).await.unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[tokio::test]
    async fn test_invalid_draft_is_signing_error() {
        let signer = WalletSigner::from_private_key(TEST_KEY, 1).unwrap();
        let mut bad = draft(0, "");
        bad.value = "lots".to_string();
        assert!(matches!(signer.sign(&bad).await, Err(DispatchError::Signing(_))));
    }
}
