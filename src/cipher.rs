//! Frame scrambling.
//!
//! This module implements the chained byte cipher that scrambles frame
//! payloads on the wire and the [`SecretKey`] shared between endpoints.

use core::fmt::{Debug, Formatter};

use rand::{TryRngCore, rngs::OsRng};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::specification::DEFAULT_SECRET_KEY;

/// A one-byte key shared between two parties communicating over the
/// transport.
///
/// The `SecretKey` is typically distributed through an out-of-band mechanism
/// and must match on both endpoints; otherwise every scrambled frame fails
/// checksum validation.
///
/// Note that the scrambler is an obfuscation layer, not encryption. It keeps
/// casual observers and bit rot out of the payload but offers no
/// confidentiality against an adversary.
#[derive(Clone, Eq, PartialEq, Hash, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(u8);

impl SecretKey {
    /// Creates a key from an out-of-band agreed byte.
    pub fn new(key: u8) -> Self {
        Self(key)
    }

    /// Generate a new [`SecretKey`] from system entropy.
    pub fn from_entropy() -> Self {
        let mut key = [0u8; 1];
        OsRng
            .try_fill_bytes(&mut key)
            .expect("system random source failure");
        Self(key[0])
    }

    /// Extract the key byte for serialization.
    pub fn to_byte(&self) -> u8 {
        self.0
    }
}

impl Default for SecretKey {
    fn default() -> Self {
        Self(DEFAULT_SECRET_KEY)
    }
}

impl From<u8> for SecretKey {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretKey").field(&"*****").finish()
    }
}

/// Scrambles `payload` in place, returning the frame checksum.
///
/// The cipher walks the payload once, XOR-chaining each byte with the
/// running chain values so identical plaintext bytes scramble differently.
/// The chain is seeded from the wrapping sum of the plaintext, the
/// per-frame `random_key`, and the shared secret; the checksum byte is the
/// seed of the scrambled chain. All additions are modulo 256, with the
/// 1-based byte index entering the sums at full width.
pub(crate) fn scramble(secret: u8, random_key: u8, payload: &mut [u8]) -> u8 {
    let s = u32::from(secret);
    let r = u32::from(random_key);
    let sum = payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));

    let mut p_prev = sum ^ (r + 1) as u8;
    let mut e_prev = p_prev ^ (s + 1) as u8;
    let checksum = e_prev;

    for (i, byte) in payload.iter_mut().enumerate() {
        let i = i as u32 + 1;
        let p = *byte ^ (u32::from(p_prev) + r + i + 1) as u8;
        let e = p ^ (u32::from(e_prev) + s + i + 1) as u8;
        *byte = e;
        p_prev = p;
        e_prev = e;
    }
    checksum
}

/// Unscrambles `payload` in place, returning whether the checksum holds.
///
/// Exact inverse of [`scramble`]: the claimed plaintext sum is recovered
/// from the checksum, the chain is walked using each received byte, and the
/// wrapping sum of the recovered bytes is compared against the claim.
///
/// On `false` the payload is left in its recovered (garbage) state; the
/// caller discards the frame.
pub(crate) fn unscramble(secret: u8, random_key: u8, checksum: u8, payload: &mut [u8]) -> bool {
    let s = u32::from(secret);
    let r = u32::from(random_key);

    let mut p_prev = checksum ^ (s + 1) as u8;
    let claimed_sum = p_prev ^ (r + 1) as u8;
    let mut e_prev = checksum;
    let mut sum = 0u8;

    for (i, byte) in payload.iter_mut().enumerate() {
        let i = i as u32 + 1;
        let received = *byte;
        let p = received ^ (u32::from(e_prev) + s + i + 1) as u8;
        let plain = p ^ (u32::from(p_prev) + r + i + 1) as u8;
        p_prev = p;
        e_prev = received;
        sum = sum.wrapping_add(plain);
        *byte = plain;
    }
    sum == claimed_sum
}
