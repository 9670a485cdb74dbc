//! 자격증명 비밀값 봉투 암호화
//!
//! 봉투 형식은 `base64(IV(12) || Salt(16) || Ciphertext‖Tag(16))` 입니다.
//! 키는 PBKDF2-HMAC-SHA256(1200회, 128비트)으로 패스프레이즈와 매 암호화마다 새로 만든
//! 솔트에서 유도되고, AES-128-GCM으로 암호화됩니다. 봉투 하나만으로 복호화에 필요한
//! 모든 값(IV, 솔트)을 가지므로 별도 메타데이터가 필요 없습니다.
//!
//! ```rust,ignore
//! let cipher = AesGcmCipher::new("passphrase");
//! let envelope = cipher.encrypt("client-secret")?;
//! assert_eq!(cipher.decrypt(&envelope)?, "client-secret");
//! ```

use std::fmt;
use std::sync::Arc;

use aes_gcm::{
    Aes128Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use log::warn;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::config::{CipherMode, CipherSettings, Environment};
use crate::errors::{ConfigError, CryptoError};

/// AES-GCM nonce 크기 (96비트)
pub const IV_LEN: usize = 12;
pub const SALT_LEN: usize = 16;
/// AES-128 키 크기
pub const KEY_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
pub const PBKDF2_ITERATIONS: u32 = 1200;

/// 평문을 봉투 문자열로 암호화합니다.
pub fn encrypt(plaintext: &str, passphrase: &str) -> Result<String, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    let cipher = derive_cipher(passphrase, &salt)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut envelope = Vec::with_capacity(IV_LEN + SALT_LEN + ciphertext.len());
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&salt);
    envelope.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(envelope))
}

/// 봉투를 검증하고 평문을 돌려줍니다. 실패 시 부분 출력은 없습니다.
pub fn decrypt(envelope: &str, passphrase: &str) -> Result<String, CryptoError> {
    let bytes = BASE64
        .decode(envelope)
        .map_err(|_| CryptoError::InvalidEncoding)?;

    if bytes.len() < IV_LEN + SALT_LEN + TAG_LEN {
        return Err(CryptoError::Truncated(bytes.len()));
    }

    let (iv, rest) = bytes.split_at(IV_LEN);
    let (salt, ciphertext) = rest.split_at(SALT_LEN);

    let cipher = derive_cipher(passphrase, salt)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
}

fn derive_cipher(passphrase: &str, salt: &[u8]) -> Result<Aes128Gcm, CryptoError> {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);

    Aes128Gcm::new_from_slice(&key).map_err(|_| CryptoError::EncryptionFailed)
}

/// 자격증명 저장소와 클라이언트 저장 핸들러가 공유하는 암호화 seam
pub trait SecretCipher: Send + Sync {
    /// 로그에 표시할 이름
    fn label(&self) -> &'static str;

    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;

    fn decrypt(&self, envelope: &str) -> Result<String, CryptoError>;
}

/// 패스프레이즈가 바인딩된 AES-GCM 암호기
pub struct AesGcmCipher {
    passphrase: String,
}

impl AesGcmCipher {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }
}

impl SecretCipher for AesGcmCipher {
    fn label(&self) -> &'static str {
        "aes-gcm"
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        encrypt(plaintext, &self.passphrase)
    }

    fn decrypt(&self, envelope: &str) -> Result<String, CryptoError> {
        decrypt(envelope, &self.passphrase)
    }
}

impl fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

/// 암호화하지 않는 통과 암호기
///
/// **로컬 개발 전용.** 비밀값이 평문으로 저장되며, 프로덕션에서는 [`build_cipher`]가 거부합니다.
#[derive(Debug, Default)]
pub struct NoopCipher;

impl SecretCipher for NoopCipher {
    fn label(&self) -> &'static str {
        "noop (plaintext, not encrypted)"
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, envelope: &str) -> Result<String, CryptoError> {
        Ok(envelope.to_string())
    }
}

/// 설정에 맞는 암호기를 생성합니다.
///
/// # Errors
///
/// * `ConfigError::NoopCipherInProduction` - 프로덕션에서 noop 선택
/// * `ConfigError::Missing` - aes-gcm인데 패스프레이즈가 비어 있음
pub fn build_cipher(
    settings: &CipherSettings,
    environment: &Environment,
) -> Result<Arc<dyn SecretCipher>, ConfigError> {
    match settings.mode {
        CipherMode::Noop if environment.is_production() => Err(ConfigError::NoopCipherInProduction),
        CipherMode::Noop => {
            warn!("⚠️ 자격증명 비밀값이 암호화되지 않습니다 (noop cipher, {:?})", environment);
            Ok(Arc::new(NoopCipher))
        }
        CipherMode::AesGcm => {
            let passphrase = settings
                .passphrase
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .ok_or(ConfigError::Missing("CREDENTIAL_CIPHER_PASSPHRASE"))?;

            Ok(Arc::new(AesGcmCipher::new(passphrase)))
        }
    }
}
