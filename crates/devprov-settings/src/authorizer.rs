//! Signed settings envelopes.
//!
//! A locked device only accepts settings wrapped in an envelope:
//!
//! ```text
//! { "cnt": base64(json(settings + {"sn": serial})),
//!   "sig": base64(AES-CCM tag over the cnt bytes) }
//! ```
//!
//! The tag is computed with AES-CCM under the shared key, a 13-byte all-zero
//! nonce and no associated data; the ciphertext is thrown away. The firmware
//! recomputes the tag with the same fixed nonce, so the nonce must stay zero.
//! Secrecy is not a goal here: the tag proves possession of the key and binds
//! it to the exact content, including the serial of the target device.

use aes::{Aes128, Aes192, Aes256};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ccm::aead::generic_array::GenericArray;
use ccm::aead::{AeadInPlace, KeyInit};
use ccm::consts::{U13, U16};
use ccm::Ccm;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{Settings, SettingsError, SettingsResult, CONTROL_KEYS, KEY_SERIAL};

/// Nonce length expected by the firmware.
pub const NONCE_LEN: usize = 13;
/// Authentication tag length.
pub const TAG_LEN: usize = 16;
/// The fixed nonce shared with the firmware.
const FIXED_NONCE: [u8; NONCE_LEN] = [0u8; NONCE_LEN];

type Ccm128 = Ccm<Aes128, U16, U13>;
type Ccm192 = Ccm<Aes192, U16, U13>;
type Ccm256 = Ccm<Aes256, U16, U13>;

/// CCM instance for the configured key size.
enum TagCipher {
    Aes128(Ccm128),
    Aes192(Ccm192),
    Aes256(Ccm256),
}

impl TagCipher {
    fn new(key: &[u8]) -> SettingsResult<Self> {
        let invalid = |_| SettingsError::InvalidKeyLength(key.len());
        match key.len() {
            16 => Ccm128::new_from_slice(key).map(TagCipher::Aes128).map_err(invalid),
            24 => Ccm192::new_from_slice(key).map(TagCipher::Aes192).map_err(invalid),
            32 => Ccm256::new_from_slice(key).map(TagCipher::Aes256).map_err(invalid),
            other => Err(SettingsError::InvalidKeyLength(other)),
        }
    }

    /// Compute the CCM tag over `message`, discarding the ciphertext.
    fn tag(&self, message: &[u8]) -> SettingsResult<[u8; TAG_LEN]> {
        let nonce = GenericArray::from_slice(&FIXED_NONCE);
        let mut scratch = message.to_vec();
        let tag = match self {
            TagCipher::Aes128(c) => c.encrypt_in_place_detached(nonce, b"", &mut scratch),
            TagCipher::Aes192(c) => c.encrypt_in_place_detached(nonce, b"", &mut scratch),
            TagCipher::Aes256(c) => c.encrypt_in_place_detached(nonce, b"", &mut scratch),
        }
        .map_err(|e| SettingsError::signing(format!("CCM tag failed: {}", e)))?;

        let mut out = [0u8; TAG_LEN];
        out.copy_from_slice(&tag);
        Ok(out)
    }
}

/// A signed settings envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    /// Base64 of the JSON settings with the serial embedded.
    #[serde(rename = "cnt")]
    pub content: String,
    /// Base64 of the authentication tag over `content`.
    #[serde(rename = "sig")]
    pub signature: String,
}

impl SignedEnvelope {
    /// Build the wire object for a signed write.
    ///
    /// Control keys present in `source` are passed through next to the
    /// envelope fields so the device acts on them.
    pub fn into_request(self, source: &Settings) -> Settings {
        let mut request = Settings::new();
        request.insert(crate::KEY_CONTENT.to_string(), Value::String(self.content));
        request.insert(crate::KEY_SIGNATURE.to_string(), Value::String(self.signature));
        for key in CONTROL_KEYS {
            if let Some(value) = source.get(key) {
                request.insert(key.to_string(), value.clone());
            }
        }
        request
    }

    /// Decode the signed content back into settings.
    pub fn decode_content(&self) -> Option<Settings> {
        let json = BASE64.decode(&self.content).ok()?;
        serde_json::from_slice(&json).ok()
    }
}

/// Signs settings for a locked device.
pub struct SettingsAuthorizer {
    cipher: TagCipher,
}

impl SettingsAuthorizer {
    /// Create an authorizer from the shared key (16, 24 or 32 bytes).
    pub fn new(key: &[u8]) -> SettingsResult<Self> {
        Ok(SettingsAuthorizer {
            cipher: TagCipher::new(key)?,
        })
    }

    /// Sign `settings` for the device with the given serial.
    ///
    /// Deterministic: identical inputs produce byte-identical envelopes.
    pub fn sign(&self, settings: &Settings, serial: &str) -> SettingsResult<SignedEnvelope> {
        let mut with_serial = settings.clone();
        with_serial.insert(KEY_SERIAL.to_string(), Value::String(serial.to_string()));

        let json = serde_json::to_vec(&with_serial)?;
        debug!("Signing content: {}", String::from_utf8_lossy(&json));

        let content = BASE64.encode(&json);
        let tag = self.cipher.tag(content.as_bytes())?;

        Ok(SignedEnvelope {
            content,
            signature: BASE64.encode(tag),
        })
    }
}
