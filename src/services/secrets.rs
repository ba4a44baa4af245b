//! Storage form of the extraction API key.
//!
//! Stored values are either a reference into the OS keychain or the key
//! sealed with AES-256-GCM under a PBKDF2-derived key.

use anyhow::{anyhow, bail, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

const KEYCHAIN_SERVICE: &str = "smartinvoice";
const KEYCHAIN_ACCOUNT: &str = "gemini_api_key";
const SEALING_PASSPHRASE: &[u8] = b"smartinvoice-sealed-v1";
const PBKDF2_ROUNDS: u32 = 100_000;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = aead::NONCE_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredSecret {
    Keychain,
    Sealed {
        salt: Vec<u8>,
        nonce: [u8; NONCE_LEN],
        ciphertext: Vec<u8>,
    },
}

impl StoredSecret {
    /// Prefers the keychain and falls back to local sealing.
    pub fn store(secret: &str) -> Result<Self> {
        match keychain_entry().and_then(|entry| {
            entry
                .set_password(secret)
                .map_err(|e| anyhow!("Keychain store error: {}", e))
        }) {
            Ok(()) => Ok(StoredSecret::Keychain),
            Err(err) => {
                tracing::debug!(error = %err, "Keychain unavailable, sealing secret locally");
                Self::seal(secret)
            }
        }
    }

    pub fn seal(secret: &str) -> Result<Self> {
        let rng = SystemRandom::new();
        let mut salt = vec![0u8; SALT_LEN];
        rng.fill(&mut salt).map_err(|_| anyhow!("Failed to generate salt"))?;
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill(&mut nonce).map_err(|_| anyhow!("Failed to generate nonce"))?;

        let mut ciphertext = secret.as_bytes().to_vec();
        sealing_key(&salt)?
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut ciphertext)
            .map_err(|_| anyhow!("Encryption failed"))?;

        Ok(StoredSecret::Sealed {
            salt,
            nonce,
            ciphertext,
        })
    }

    pub fn reveal(&self) -> Result<String> {
        match self {
            StoredSecret::Keychain => keychain_entry()?
                .get_password()
                .map_err(|e| anyhow!("Keychain fetch error: {}", e)),
            StoredSecret::Sealed {
                salt,
                nonce,
                ciphertext,
            } => {
                let mut buffer = ciphertext.clone();
                let plain = sealing_key(salt)?
                    .open_in_place(Nonce::assume_unique_for_key(*nonce), Aad::empty(), &mut buffer)
                    .map_err(|_| anyhow!("Decryption failed"))?;
                Ok(String::from_utf8(plain.to_vec())?)
            }
        }
    }
}

impl fmt::Display for StoredSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredSecret::Keychain => write!(f, "keychain:{}:{}", KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT),
            StoredSecret::Sealed {
                salt,
                nonce,
                ciphertext,
            } => write!(
                f,
                "sealed:{}:{}:{}",
                STANDARD.encode(salt),
                STANDARD.encode(nonce),
                STANDARD.encode(ciphertext)
            ),
        }
    }
}

impl FromStr for StoredSecret {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(reference) = s.strip_prefix("keychain:") {
            if reference != format!("{}:{}", KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT) {
                bail!("Invalid keychain reference");
            }
            return Ok(StoredSecret::Keychain);
        }

        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            ["sealed", salt, nonce, ciphertext] => {
                let nonce_bytes = STANDARD.decode(nonce)?;
                Ok(StoredSecret::Sealed {
                    salt: STANDARD.decode(salt)?,
                    nonce: nonce_bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| anyhow!("Invalid nonce length"))?,
                    ciphertext: STANDARD.decode(ciphertext)?,
                })
            }
            _ => bail!("Unknown secret format"),
        }
    }
}

fn keychain_entry() -> Result<keyring::Entry> {
    keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT).map_err(|e| anyhow!("Keychain error: {}", e))
}

fn sealing_key(salt: &[u8]) -> Result<LessSafeKey> {
    let rounds = NonZeroU32::new(PBKDF2_ROUNDS).ok_or_else(|| anyhow!("Invalid iterations"))?;
    let mut key_bytes = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        rounds,
        salt,
        SEALING_PASSPHRASE,
        &mut key_bytes,
    );
    let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes).map_err(|_| anyhow!("Invalid key material"))?;
    Ok(LessSafeKey::new(unbound))
}
