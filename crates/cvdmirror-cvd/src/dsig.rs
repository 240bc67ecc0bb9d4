//! Digital-signature recovery for definition headers.
//!
//! Reproduction of the vendor's RSA-style scheme: the header's signature
//! blob is decoded with a custom 64-symbol alphabet into a big integer
//! ciphertext, raised to a fixed public exponent modulo a fixed public
//! modulus, and the low-order 16 bytes of the plaintext are compared
//! against the body's MD5 digest.
//!
//! The scheme is reconstructed from undocumented native-library
//! behavior. Callers must treat the result as advisory and never let it
//! override the binding checksum decision.

use num_bigint::BigUint;
use num_traits::Zero;
use once_cell::sync::Lazy;
use thiserror::Error;

/// Public modulus, ~1024-bit class, decimal.
const MODULUS_DEC: &str = "118640995551645342603070001658453189751527774412027743746599405743243142607464144767361060640655844749760788890022283424922762488917565551002467771109669598189410434699034532232228621591089508178591428456220796841621637175567590476666928698770143328137383952820383197532047771780196576957695822641224262693037";

/// Public exponent, decimal.
const EXPONENT_DEC: &str = "100001027";

static MODULUS: Lazy<BigUint> = Lazy::new(|| {
    BigUint::parse_bytes(MODULUS_DEC.as_bytes(), 10).expect("modulus constant")
});

static EXPONENT: Lazy<BigUint> = Lazy::new(|| {
    BigUint::parse_bytes(EXPONENT_DEC.as_bytes(), 10).expect("exponent constant")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DsigError {
    #[error("empty signature blob")]
    Empty,

    #[error("signature byte {byte:#04x} outside the 64-symbol alphabet")]
    BadSymbol { byte: u8 },
}

/// Index of a byte in the vendor alphabet: `a`-`z`, `A`-`Z`, `0`-`9`,
/// `+`, `/`. The ordering differs from standard Base64 and determines
/// the decoded value.
fn symbol_value(b: u8) -> Option<u32> {
    match b {
        b'a'..=b'z' => Some(u32::from(b - b'a')),
        b'A'..=b'Z' => Some(u32::from(b - b'A') + 26),
        b'0'..=b'9' => Some(u32::from(b - b'0') + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decode a signature blob into the big-integer ciphertext.
///
/// Big-endian positional decoding: the first symbol is the most
/// significant base-64 digit.
pub fn decode(blob: &str) -> Result<BigUint, DsigError> {
    if blob.is_empty() {
        return Err(DsigError::Empty);
    }
    let mut c = BigUint::zero();
    for &b in blob.as_bytes() {
        let v = symbol_value(b).ok_or(DsigError::BadSymbol { byte: b })?;
        c = c * 64u32 + v;
    }
    Ok(c)
}

/// Raw public-key operation: plaintext = ciphertext^E mod N, returned as
/// the low-order 16 bytes of the big-endian plaintext.
pub fn verify(ciphertext: &BigUint) -> [u8; 16] {
    let plain = ciphertext.modpow(&EXPONENT, &MODULUS);
    let bytes = plain.to_bytes_be();
    let mut out = [0u8; 16];
    let take = bytes.len().min(16);
    out[16 - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    out
}

/// Decode and recover in one step, hex-encoded for comparison against
/// the body digest.
pub fn recover_digest(blob: &str) -> Result<String, DsigError> {
    let c = decode(blob)?;
    Ok(hex::encode(verify(&c)))
}
