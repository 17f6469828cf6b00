//! Encrypted File Key Store
//!
//! One file per record inside a store directory:
//! - `wallet.<wallet_id>.json`
//! - `address.<wallet_id>.<address>.json`
//! - `key.<address>.json`
//!
//! Each file is an AES-256-GCM envelope. The store key comes from a
//! passphrase through Argon2id with a per-store random salt, and the file
//! name is bound as associated data so records cannot be swapped.

#![allow(deprecated)] // GenericArray::from_slice deprecated in generic-array 1.x

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::keystore::{HdWalletAddress, StorageError, WalletKeyStore};
use super::model::Wallet;
use crate::security::SecretBytes;

const SALT_FILE: &str = "keystore.salt";
const RECORD_VERSION: u8 = 1;

/// Key derivation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Time cost (iterations)
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            // 64 MiB memory, 3 iterations, 4 parallel lanes
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct EncryptedRecord {
    version: u8,
    #[serde(with = "crate::serde_bytes::b64")]
    nonce: Vec<u8>,
    #[serde(with = "crate::serde_bytes::b64")]
    ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct WalletRecord {
    id: String,
    name: String,
    #[serde(with = "crate::serde_bytes::b64")]
    entropy: Vec<u8>,
}

/// Key store persisted as encrypted files
pub struct EncryptedFileKeyStore {
    dir: PathBuf,
    key: Zeroizing<[u8; 32]>,
}

impl EncryptedFileKeyStore {
    /// Open (or initialise) a store directory
    pub fn open(
        dir: impl AsRef<Path>,
        passphrase: &SecretString,
        params: KdfParams,
    ) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let salt_path = dir.join(SALT_FILE);
        let salt = match fs::read(&salt_path) {
            Ok(salt) => salt,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let mut salt = vec![0u8; 32];
                OsRng.fill_bytes(&mut salt);
                fs::write(&salt_path, &salt)?;
                salt
            }
            Err(e) => return Err(e.into()),
        };

        let key = derive_store_key(passphrase.expose_secret(), &salt, &params)?;
        Ok(Self { dir, key })
    }

    // Ids and addresses are hex-encoded so no id can contain the `.`
    // separator or a path component.
    fn wallet_file(wallet_id: &str) -> String {
        format!("wallet.{}.json", hex::encode(wallet_id))
    }

    fn address_prefix(wallet_id: &str) -> String {
        format!("address.{}.", hex::encode(wallet_id))
    }

    fn address_file(wallet_id: &str, address: &str) -> String {
        format!("{}{}.json", Self::address_prefix(wallet_id), hex::encode(address))
    }

    fn key_file(address: &str) -> String {
        format!("key.{}.json", hex::encode(address))
    }

    fn write_record(&self, name: &str, plaintext: &[u8]) -> Result<(), StorageError> {
        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|e| StorageError::Encryption(e.to_string()))?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload { msg: plaintext, aad: name.as_bytes() },
            )
            .map_err(|e| StorageError::Encryption(e.to_string()))?;

        let envelope = EncryptedRecord {
            version: RECORD_VERSION,
            nonce: nonce_bytes.to_vec(),
            ciphertext,
        };
        let encoded = serde_json::to_vec(&envelope).map_err(|e| StorageError::Encryption(e.to_string()))?;
        fs::write(self.dir.join(name), encoded)?;
        Ok(())
    }

    fn read_record(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StorageError> {
        let raw = match fs::read(self.dir.join(name)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: EncryptedRecord =
            serde_json::from_slice(&raw).map_err(|e| StorageError::Decode(e.to_string()))?;
        if envelope.version != RECORD_VERSION {
            return Err(StorageError::Decode(format!(
                "unsupported record version {}",
                envelope.version
            )));
        }
        if envelope.nonce.len() != 12 {
            return Err(StorageError::Decode("invalid nonce length".into()));
        }

        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|e| StorageError::Encryption(e.to_string()))?;
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&envelope.nonce),
                Payload { msg: &envelope.ciphertext, aad: name.as_bytes() },
            )
            .map_err(|_| StorageError::Decryption(name.to_string()))?;
        Ok(Some(Zeroizing::new(plaintext)))
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.dir.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn file_names_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with(prefix) && name.ends_with(".json") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

impl WalletKeyStore for EncryptedFileKeyStore {
    fn save_wallet(&self, wallet: &Wallet) -> Result<(), StorageError> {
        let record = WalletRecord {
            id: wallet.id.clone(),
            name: wallet.name.clone(),
            entropy: wallet.entropy.to_vec(),
        };
        let encoded = Zeroizing::new(
            serde_json::to_vec(&record).map_err(|e| StorageError::Encryption(e.to_string()))?,
        );
        self.write_record(&Self::wallet_file(&wallet.id), &encoded)
    }

    fn wallet(&self, wallet_id: &str) -> Result<Option<Wallet>, StorageError> {
        let Some(plaintext) = self.read_record(&Self::wallet_file(wallet_id))? else {
            return Ok(None);
        };
        let record: WalletRecord =
            serde_json::from_slice(&plaintext).map_err(|e| StorageError::Decode(e.to_string()))?;
        Ok(Some(Wallet::with_id(
            record.id.clone(),
            record.name.clone(),
            SecretBytes::from_slice(&record.entropy),
        )))
    }

    fn delete_wallet(&self, wallet_id: &str) -> Result<(), StorageError> {
        for name in self.file_names_with_prefix(&Self::address_prefix(wallet_id))? {
            self.remove(&name)?;
        }
        self.remove(&Self::wallet_file(wallet_id))
    }

    fn save_address(&self, record: &HdWalletAddress) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec(record).map_err(|e| StorageError::Encryption(e.to_string()))?;
        self.write_record(&Self::address_file(record.wallet_id(), &record.address), &encoded)
    }

    fn address(&self, wallet_id: &str, address: &str) -> Result<Option<HdWalletAddress>, StorageError> {
        self.read_record(&Self::address_file(wallet_id, address))?
            .map(|plaintext| {
                serde_json::from_slice(&plaintext).map_err(|e| StorageError::Decode(e.to_string()))
            })
            .transpose()
    }

    fn addresses(&self, wallet_id: &str) -> Result<Vec<HdWalletAddress>, StorageError> {
        let mut records = Vec::new();
        for name in self.file_names_with_prefix(&Self::address_prefix(wallet_id))? {
            if let Some(plaintext) = self.read_record(&name)? {
                let record: HdWalletAddress = serde_json::from_slice(&plaintext)
                    .map_err(|e| StorageError::Decode(e.to_string()))?;
                records.push(record);
            }
        }
        Ok(records)
    }

    fn delete_address(&self, wallet_id: &str, address: &str) -> Result<(), StorageError> {
        self.remove(&Self::address_file(wallet_id, address))
    }

    fn save_private_key(&self, address: &str, key: &SecretBytes) -> Result<(), StorageError> {
        self.write_record(&Self::key_file(address), key.as_bytes())
    }

    fn private_key(&self, address: &str) -> Result<Option<SecretBytes>, StorageError> {
        Ok(self
            .read_record(&Self::key_file(address))?
            .map(|plaintext| SecretBytes::from_slice(&plaintext)))
    }

    fn delete_private_key(&self, address: &str) -> Result<(), StorageError> {
        self.remove(&Self::key_file(address))
    }
}

/// Derive the store key from the passphrase using Argon2id
fn derive_store_key(
    passphrase: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; 32]>, StorageError> {
    use argon2::{Algorithm, Argon2, Params, Version};

    let argon2_params = Params::new(params.memory_cost, params.time_cost, params.parallelism, Some(32))
        .map_err(|e| StorageError::Encryption(format!("invalid KDF params: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, key.as_mut())
        .map_err(|e| StorageError::Encryption(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::model::HdWalletAddressDetail;

    const FAST_KDF: KdfParams = KdfParams { memory_cost: 256, time_cost: 1, parallelism: 1 };

    fn passphrase(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn open(dir: &Path, pass: &str) -> EncryptedFileKeyStore {
        EncryptedFileKeyStore::open(dir, &passphrase(pass), FAST_KDF).unwrap()
    }

    #[test]
    fn test_wallet_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = Wallet::with_id("w1", "Main", SecretBytes::new(vec![3u8; 32]));
        open(dir.path(), "correct horse").save_wallet(&wallet).unwrap();

        let reopened = open(dir.path(), "correct horse");
        assert_eq!(reopened.wallet("w1").unwrap(), Some(wallet));

        let raw = fs::read_to_string(dir.path().join(EncryptedFileKeyStore::wallet_file("w1"))).unwrap();
        assert!(!raw.contains("Main"));
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = Wallet::with_id("w1", "Main", SecretBytes::new(vec![3u8; 32]));
        open(dir.path(), "correct horse").save_wallet(&wallet).unwrap();

        let other = open(dir.path(), "battery staple");
        assert!(matches!(other.wallet("w1"), Err(StorageError::Decryption(_))));
    }

    #[test]
    fn test_corrupted_record_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path(), "pass");
        fs::write(dir.path().join(EncryptedFileKeyStore::wallet_file("w1")), b"{not json").unwrap();
        assert!(matches!(store.wallet("w1"), Err(StorageError::Decode(_))));
    }

    #[test]
    fn test_swapped_record_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path(), "pass");
        store.save_private_key("A", &SecretBytes::new(vec![1u8; 32])).unwrap();
        fs::copy(
            dir.path().join(EncryptedFileKeyStore::key_file("A")),
            dir.path().join(EncryptedFileKeyStore::key_file("B")),
        ).unwrap();
        assert!(matches!(store.private_key("B"), Err(StorageError::Decryption(_))));
    }

    #[test]
    fn test_wallet_ids_sharing_a_prefix_stay_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path(), "pass");
        for id in ["a", "a.b"] {
            store.save_wallet(&Wallet::with_id(id, id, SecretBytes::new(vec![3u8; 32]))).unwrap();
        }
        let record = HdWalletAddress {
            address: "ADDR".into(),
            public_key: [1u8; 32],
            detail: HdWalletAddressDetail::new("a.b", 0, 0, 0),
        };
        store.save_address(&record).unwrap();

        assert!(store.addresses("a").unwrap().is_empty());
        store.delete_wallet("a").unwrap();
        assert_eq!(store.addresses("a.b").unwrap(), vec![record]);
        assert!(store.wallet("a.b").unwrap().is_some());
    }

    #[test]
    fn test_ids_cannot_leave_the_store_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("store");
        let store = open(&dir, "pass");
        let wallet = Wallet::with_id("../escape", "Main", SecretBytes::new(vec![3u8; 32]));
        store.save_wallet(&wallet).unwrap();
        store.save_private_key("../../key", &SecretBytes::new(vec![1u8; 32])).unwrap();

        assert_eq!(store.wallet("../escape").unwrap(), Some(wallet));
        let outside: Vec<_> = fs::read_dir(root.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(outside, vec![std::ffi::OsString::from("store")]);
    }

    #[test]
    fn test_address_records_and_wallet_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path(), "pass");
        let wallet = Wallet::with_id("w1", "Main", SecretBytes::new(vec![3u8; 32]));
        store.save_wallet(&wallet).unwrap();

        for (index, address) in ["ADDRA", "ADDRB"].iter().enumerate() {
            store
                .save_address(&HdWalletAddress {
                    address: address.to_string(),
                    public_key: [index as u8; 32],
                    detail: HdWalletAddressDetail::new("w1", 0, 0, index as u32),
                })
                .unwrap();
        }

        assert_eq!(store.addresses("w1").unwrap().len(), 2);
        assert_eq!(store.address("w1", "ADDRB").unwrap().unwrap().detail.key_index, 1);

        store.delete_address("w1", "ADDRA").unwrap();
        assert_eq!(store.addresses("w1").unwrap().len(), 1);

        store.delete_wallet("w1").unwrap();
        assert!(store.wallet("w1").unwrap().is_none());
        assert!(store.addresses("w1").unwrap().is_empty());
    }
}
