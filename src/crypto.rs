//! # 口令加密
//!
//! 可选的载荷预处理：用 Argon2id 从口令派生 256 位密钥，以 AES-256-GCM-SIV 加密，
//! 再把 `盐 ‖ 随机数 ‖ 密文` 整体做 Base64 编码，得到可以直接成帧的 UTF-8 文本。
//! 空口令表示不加密，原文直接通过。

use aes_gcm_siv::aead::Aead;
use aes_gcm_siv::{Aes256GcmSiv, KeyInit, Nonce};
use argon2::Argon2;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Argon2 盐的字节数。
pub const SALT_LEN: usize = 16;
/// AES-GCM-SIV 随机数的字节数。
pub const NONCE_LEN: usize = 12;
/// 认证标签的字节数。
pub const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encrypted payload is not valid Base64")]
    Encoding(#[from] base64::DecodeError),

    #[error("encrypted payload is too short ({0} bytes)")]
    Truncated(usize),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed")]
    Encryption,

    /// 口令错误或密文被篡改。
    #[error("decryption failed: wrong password or corrupted payload")]
    Decryption,

    #[error("decrypted payload is not valid UTF-8 text")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn derive_key(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut *key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

fn cipher(password: &str, salt: &[u8]) -> Result<Aes256GcmSiv, CryptoError> {
    let key = derive_key(password, salt)?;
    Aes256GcmSiv::new_from_slice(&*key).map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// 加密文本并返回 Base64 字符串。
pub fn seal(plaintext: &str, password: &str) -> Result<String, CryptoError> {
    if password.is_empty() {
        return Ok(plaintext.to_string());
    }

    let mut rng = rand::rng();
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let ciphertext = cipher(password, &salt)?
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| CryptoError::Encryption)?;

    let mut packed = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    packed.extend_from_slice(&salt);
    packed.extend_from_slice(&nonce);
    packed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(packed))
}

/// [`seal`] 的逆运算。
pub fn open(armored: &str, password: &str) -> Result<String, CryptoError> {
    if password.is_empty() {
        return Ok(armored.to_string());
    }

    let packed = STANDARD.decode(armored.trim())?;
    if packed.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Truncated(packed.len()));
    }
    let (salt, rest) = packed.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let plaintext = Zeroizing::new(
        cipher(password, salt)?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decryption)?,
    );
    Ok(String::from_utf8(plaintext.to_vec())?)
}
