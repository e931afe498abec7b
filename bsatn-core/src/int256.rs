//! 256-bit integers stored as four little-endian `u64` limbs.
//!
//! These carry no arithmetic beyond what display and ordering need. On the
//! wire both types are 32 raw little-endian bytes.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{BsatnError, BsatnResult};

const DECIMAL_CHUNK: u64 = 10_000_000_000_000_000_000;
const DECIMAL_CHUNK_DIGITS: usize = 19;

/// Unsigned 256-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct U256 {
    limbs: [u64; 4],
}

impl U256 {
    pub const ZERO: U256 = U256 { limbs: [0; 4] };
    pub const MAX: U256 = U256 {
        limbs: [u64::MAX; 4],
    };

    /// Build from limbs, least significant first.
    pub const fn from_limbs(limbs: [u64; 4]) -> Self {
        Self { limbs }
    }

    pub const fn limbs(&self) -> [u64; 4] {
        self.limbs
    }

    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Self {
            limbs: limbs_from_le_bytes(&bytes),
        }
    }

    pub fn to_le_bytes(&self) -> [u8; 32] {
        limbs_to_le_bytes(&self.limbs)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut bytes = self.to_le_bytes();
        bytes.reverse();
        bytes
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&l| l == 0)
    }

    /// Big-endian hex, 64 characters, the way identities are rendered.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_be_bytes())
    }

    /// Parse the 64-character big-endian hex form.
    pub fn from_be_hex(s: &str) -> BsatnResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let decoded = hex::decode(s)
            .map_err(|e| BsatnError::invalid_structure(format!("invalid hex: {}", e)))?;
        let mut bytes: [u8; 32] = decoded.try_into().map_err(|v: Vec<u8>| {
            BsatnError::invalid_structure(format!("expected 32 bytes of hex, got {}", v.len()))
        })?;
        bytes.reverse();
        Ok(Self::from_le_bytes(bytes))
    }
}

impl From<u64> for U256 {
    fn from(v: u64) -> Self {
        Self {
            limbs: [v, 0, 0, 0],
        }
    }
}

impl From<u128> for U256 {
    fn from(v: u128) -> Self {
        Self {
            limbs: [v as u64, (v >> 64) as u64, 0, 0],
        }
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.limbs.iter().rev().cmp(other.limbs.iter().rev())
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&decimal_string(self.limbs))
    }
}

impl fmt::LowerHex for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Signed 256-bit integer in two's complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct I256 {
    limbs: [u64; 4],
}

impl I256 {
    pub const ZERO: I256 = I256 { limbs: [0; 4] };
    pub const MIN: I256 = I256 {
        limbs: [0, 0, 0, 1 << 63],
    };
    pub const MAX: I256 = I256 {
        limbs: [u64::MAX, u64::MAX, u64::MAX, u64::MAX >> 1],
    };

    pub const fn from_limbs(limbs: [u64; 4]) -> Self {
        Self { limbs }
    }

    pub const fn limbs(&self) -> [u64; 4] {
        self.limbs
    }

    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Self {
            limbs: limbs_from_le_bytes(&bytes),
        }
    }

    pub fn to_le_bytes(&self) -> [u8; 32] {
        limbs_to_le_bytes(&self.limbs)
    }

    pub fn is_negative(&self) -> bool {
        self.limbs[3] >> 63 == 1
    }

    /// Absolute value as an unsigned integer; exact for `MIN` too.
    pub fn unsigned_abs(&self) -> U256 {
        if !self.is_negative() {
            return U256::from_limbs(self.limbs);
        }
        let mut limbs = self.limbs.map(|l| !l);
        for limb in limbs.iter_mut() {
            let (sum, carry) = limb.overflowing_add(1);
            *limb = sum;
            if !carry {
                break;
            }
        }
        U256::from_limbs(limbs)
    }
}

impl From<i64> for I256 {
    fn from(v: i64) -> Self {
        I256::from(v as i128)
    }
}

impl From<i128> for I256 {
    fn from(v: i128) -> Self {
        let fill = if v < 0 { u64::MAX } else { 0 };
        Self {
            limbs: [v as u64, (v >> 64) as u64, fill, fill],
        }
    }
}

impl Ord for I256 {
    fn cmp(&self, other: &Self) -> Ordering {
        let flip = |limbs: &[u64; 4]| {
            let mut l = *limbs;
            l[3] ^= 1 << 63;
            U256::from_limbs(l)
        };
        flip(&self.limbs).cmp(&flip(&other.limbs))
    }
}

impl PartialOrd for I256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for I256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            f.write_str("-")?;
        }
        f.write_str(&decimal_string(self.unsigned_abs().limbs()))
    }
}

impl fmt::LowerHex for I256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = self.to_le_bytes();
        bytes.reverse();
        f.write_str(&hex::encode(bytes))
    }
}

fn limbs_from_le_bytes(bytes: &[u8; 32]) -> [u64; 4] {
    let mut limbs = [0u64; 4];
    for (limb, chunk) in limbs.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        *limb = u64::from_le_bytes(word);
    }
    limbs
}

fn limbs_to_le_bytes(limbs: &[u64; 4]) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    for (chunk, limb) in bytes.chunks_exact_mut(8).zip(limbs) {
        chunk.copy_from_slice(&limb.to_le_bytes());
    }
    bytes
}

/// Divide in place by a single-word divisor, returning the remainder.
fn div_rem_word(limbs: &mut [u64; 4], divisor: u64) -> u64 {
    let mut rem: u128 = 0;
    for limb in limbs.iter_mut().rev() {
        let cur = (rem << 64) | u128::from(*limb);
        *limb = (cur / u128::from(divisor)) as u64;
        rem = cur % u128::from(divisor);
    }
    rem as u64
}

fn decimal_string(mut limbs: [u64; 4]) -> String {
    if limbs.iter().all(|&l| l == 0) {
        return "0".to_string();
    }
    let mut chunks = Vec::new();
    while limbs.iter().any(|&l| l != 0) {
        chunks.push(div_rem_word(&mut limbs, DECIMAL_CHUNK));
    }
    let mut out = String::new();
    for (i, chunk) in chunks.iter().rev().enumerate() {
        if i == 0 {
            out.push_str(&chunk.to_string());
        } else {
            out.push_str(&format!("{:0width$}", chunk, width = DECIMAL_CHUNK_DIGITS));
        }
    }
    out
}
