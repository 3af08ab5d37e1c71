//! File payload encryption
//!
//! `FileCipher` is the seam a platform crypto provider plugs into. The
//! bundled provider seals each payload with ChaCha20-Poly1305 under a per-file
//! key derived from the master key via HKDF-SHA256.
//!
//! Envelope layout: `HNBE | version | salt[16] | nonce[12] | ciphertext+tag`.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use log::info;
use sha2::Sha256;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::CryptoError;

const MAGIC: &[u8; 4] = b"HNBE";
const VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const HEADER_LEN: usize = MAGIC.len() + 1 + SALT_LEN + NONCE_LEN;
const KEY_LEN: usize = 32;
const FILE_KEY_INFO: &[u8] = b"hybrid-native-bridge-file-key";

/// Encrypts and decrypts whole file payloads.
pub trait FileCipher: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;
    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// 32 bytes of key material
#[derive(Clone)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, bytes.len()))
        })?;
        Ok(Self(key))
    }

    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Reads the key file, creating it with fresh random bytes on first use.
    pub fn load_or_create(path: &Path) -> Result<Self, CryptoError> {
        match fs::read(path) {
            Ok(bytes) => Self::from_bytes(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let key = Self::generate();
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(CryptoError::KeyStore)?;
                }
                fs::write(path, key.0).map_err(CryptoError::KeyStore)?;
                restrict_permissions(path)?;
                info!("Created master key at {}", path.display());
                Ok(key)
            }
            Err(e) => Err(CryptoError::KeyStore(e)),
        }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), CryptoError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(CryptoError::KeyStore)
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), CryptoError> {
    Ok(())
}

/// Default provider: ChaCha20-Poly1305 with HKDF-derived per-file keys.
pub struct ChaChaFileCipher {
    master_key: MasterKey,
}

impl ChaChaFileCipher {
    pub fn new(master_key: MasterKey) -> Self {
        Self { master_key }
    }

    fn cipher_for(&self, salt: &[u8]) -> Result<ChaCha20Poly1305, CryptoError> {
        let hk = Hkdf::<Sha256>::new(Some(salt), &self.master_key.0);
        let mut file_key = [0u8; KEY_LEN];
        hk.expand(FILE_KEY_INFO, &mut file_key)
            .map_err(|e| CryptoError::InvalidKey(format!("HKDF expand failed: {}", e)))?;

        ChaCha20Poly1305::new_from_slice(&file_key)
            .map_err(|e| CryptoError::InvalidKey(format!("ChaCha20 init failed: {}", e)))
    }
}

impl FileCipher for ChaChaFileCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let salt: [u8; SALT_LEN] = rand::random();
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let cipher = self.cipher_for(&salt)?;

        let ciphertext = cipher
            .encrypt(&Nonce::from(nonce_bytes), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut payload = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        payload.extend_from_slice(MAGIC);
        payload.push(VERSION);
        payload.extend_from_slice(&salt);
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);
        Ok(payload)
    }

    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if payload.len() < HEADER_LEN || &payload[..MAGIC.len()] != MAGIC {
            return Err(CryptoError::MalformedPayload);
        }
        if payload[MAGIC.len()] != VERSION {
            return Err(CryptoError::DecryptionFailed(format!(
                "unsupported envelope version {}",
                payload[MAGIC.len()]
            )));
        }

        let salt_start = MAGIC.len() + 1;
        let nonce_start = salt_start + SALT_LEN;
        let salt = &payload[salt_start..nonce_start];
        let nonce = Nonce::from_slice(&payload[nonce_start..HEADER_LEN]);

        self.cipher_for(salt)?
            .decrypt(nonce, &payload[HEADER_LEN..])
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}
