//! Incremental AES-GCM
//!
//! AES-GCM is an AEAD mode: CTR-mode encryption plus a GHASH authenticator
//! over the ciphertext. The RustCrypto `aes-gcm` crate only seals whole
//! buffers, while backups have to be streamed in bounded memory with a
//! single tag for the whole file. This module drives the same primitives
//! (`aes` block cipher, `ghash`) incrementally, so `update` can be called
//! with chunks of any size and the result is bit-identical to a one-shot
//! AES-GCM seal of the concatenated input (NIST SP 800-38D, no AAD).

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use ghash::universal_hash::UniversalHash;
use ghash::GHash;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptError, Result};

/// Authentication tag length (128 bits)
pub const TAG_LEN: usize = 16;

/// The nonce length GCM is designed around (96 bits)
pub const STANDARD_NONCE_LEN: usize = 12;

/// Shortest accepted nonce
pub const MIN_NONCE_LEN: usize = 8;

/// Longest accepted nonce
pub const MAX_NONCE_LEN: usize = 128;

const BLOCK_LEN: usize = 16;

/// The 32-bit block counter may not wrap: at most 2^32 - 2 blocks per message
const MAX_MESSAGE_LEN: u64 = ((1u64 << 32) - 2) * BLOCK_LEN as u64;

type BlockBytes = [u8; BLOCK_LEN];

/// AES with the key size picked from the key length
enum BlockKey {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockKey {
    fn new(key: &[u8]) -> Result<Self> {
        let invalid = || CryptError::config("invalid AES key");
        match key.len() {
            16 => Aes128::new_from_slice(key)
                .map(Self::Aes128)
                .map_err(|_| invalid()),
            24 => Aes192::new_from_slice(key)
                .map(Self::Aes192)
                .map_err(|_| invalid()),
            32 => Aes256::new_from_slice(key)
                .map(Self::Aes256)
                .map_err(|_| invalid()),
            n => Err(CryptError::config(format!(
                "AES key must be 16, 24 or 32 bytes, got {}",
                n
            ))),
        }
    }

    fn encrypt(&self, input: &BlockBytes) -> BlockBytes {
        let mut block = aes::Block::from(*input);
        match self {
            Self::Aes128(c) => c.encrypt_block(&mut block),
            Self::Aes192(c) => c.encrypt_block(&mut block),
            Self::Aes256(c) => c.encrypt_block(&mut block),
        }
        let mut out = [0u8; BLOCK_LEN];
        out.copy_from_slice(&block);
        out
    }
}

/// GHASH over a byte stream that arrives in arbitrary pieces
struct GhashStream {
    ghash: GHash,
    pending: BlockBytes,
    pending_len: usize,
    bytes: u64,
}

impl GhashStream {
    fn new(h: &BlockBytes) -> Self {
        Self {
            ghash: <GHash as ghash::universal_hash::KeyInit>::new(&ghash::Key::from(*h)),
            pending: [0u8; BLOCK_LEN],
            pending_len: 0,
            bytes: 0,
        }
    }

    fn update(&mut self, mut data: &[u8]) {
        self.bytes += data.len() as u64;

        if self.pending_len > 0 {
            let take = (BLOCK_LEN - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];

            if self.pending_len < BLOCK_LEN {
                return;
            }
            self.ghash.update(&[ghash::Block::from(self.pending)]);
            self.pending_len = 0;
        }

        let mut blocks = data.chunks_exact(BLOCK_LEN);
        for block in blocks.by_ref() {
            self.ghash.update(&[ghash::Block::clone_from_slice(block)]);
        }

        let rest = blocks.remainder();
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }

    /// Pad the last partial block and append the length block.
    /// There is never associated data, so its bit length is always zero.
    fn finalize(mut self) -> BlockBytes {
        if self.pending_len > 0 {
            self.ghash.update_padded(&self.pending[..self.pending_len]);
        }

        let mut lengths = [0u8; BLOCK_LEN];
        lengths[8..].copy_from_slice(&(self.bytes * 8).to_be_bytes());
        self.ghash.update(&[ghash::Block::from(lengths)]);

        let mut out = [0u8; BLOCK_LEN];
        out.copy_from_slice(&self.ghash.finalize());
        out
    }
}

/// CTR keystream starting at inc32(J0)
struct Keystream {
    counter: BlockBytes,
    block: BlockBytes,
    used: usize,
}

impl Keystream {
    fn new(j0: BlockBytes) -> Self {
        Self {
            counter: j0,
            block: [0u8; BLOCK_LEN],
            used: BLOCK_LEN,
        }
    }

    fn apply(&mut self, cipher: &BlockKey, data: &mut [u8]) {
        let mut rest = data;
        while !rest.is_empty() {
            if self.used == BLOCK_LEN {
                inc32(&mut self.counter);
                self.block = cipher.encrypt(&self.counter);
                self.used = 0;
            }

            let take = (BLOCK_LEN - self.used).min(rest.len());
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(take);
            for (byte, key) in head.iter_mut().zip(&self.block[self.used..]) {
                *byte ^= key;
            }
            self.used += take;
            rest = tail;
        }
    }
}

impl Drop for Keystream {
    fn drop(&mut self) {
        self.block.zeroize();
        self.counter.zeroize();
    }
}

/// Increment the rightmost 32 bits of the counter block, wrapping mod 2^32
fn inc32(block: &mut BlockBytes) {
    let mut low = [0u8; 4];
    low.copy_from_slice(&block[12..]);
    let next = u32::from_be_bytes(low).wrapping_add(1);
    block[12..].copy_from_slice(&next.to_be_bytes());
}

struct GcmCore {
    cipher: BlockKey,
    keystream: Keystream,
    ghash: GhashStream,
    tag_mask: Zeroizing<BlockBytes>,
    processed: u64,
}

impl GcmCore {
    fn new(key: &[u8], nonce: &[u8]) -> Result<Self> {
        if !(MIN_NONCE_LEN..=MAX_NONCE_LEN).contains(&nonce.len()) {
            return Err(CryptError::config(format!(
                "nonce must be {} to {} bytes, got {}",
                MIN_NONCE_LEN,
                MAX_NONCE_LEN,
                nonce.len()
            )));
        }

        let cipher = BlockKey::new(key)?;
        let h = Zeroizing::new(cipher.encrypt(&[0u8; BLOCK_LEN]));

        let j0 = if nonce.len() == STANDARD_NONCE_LEN {
            let mut j0 = [0u8; BLOCK_LEN];
            j0[..STANDARD_NONCE_LEN].copy_from_slice(nonce);
            j0[BLOCK_LEN - 1] = 1;
            j0
        } else {
            let mut derive = GhashStream::new(&h);
            derive.update(nonce);
            derive.finalize()
        };

        Ok(Self {
            tag_mask: Zeroizing::new(cipher.encrypt(&j0)),
            keystream: Keystream::new(j0),
            ghash: GhashStream::new(&h),
            cipher,
            processed: 0,
        })
    }

    fn reserve(&mut self, len: usize) -> Result<()> {
        self.processed = self
            .processed
            .checked_add(len as u64)
            .filter(|&total| total <= MAX_MESSAGE_LEN)
            .ok_or_else(|| CryptError::format("stream exceeds the AES-GCM message length limit"))?;
        Ok(())
    }

    fn tag(self) -> [u8; TAG_LEN] {
        let mut tag = self.ghash.finalize();
        for (t, m) in tag.iter_mut().zip(self.tag_mask.iter()) {
            *t ^= m;
        }
        tag
    }
}

/// Streaming AES-GCM encryptor
pub struct GcmEncryptor {
    core: GcmCore,
}

impl GcmEncryptor {
    /// # Errors
    /// `CryptError::Config` for a key that is not 16/24/32 bytes or a nonce
    /// outside `MIN_NONCE_LEN..=MAX_NONCE_LEN`.
    pub fn new(key: &[u8], nonce: &[u8]) -> Result<Self> {
        Ok(Self {
            core: GcmCore::new(key, nonce)?,
        })
    }

    /// Encrypt `buf` in place
    pub fn update(&mut self, buf: &mut [u8]) -> Result<()> {
        self.core.reserve(buf.len())?;
        self.core.keystream.apply(&self.core.cipher, buf);
        self.core.ghash.update(buf);
        Ok(())
    }

    /// Consume the encryptor and produce the authentication tag
    pub fn finalize(self) -> [u8; TAG_LEN] {
        self.core.tag()
    }
}

/// Streaming AES-GCM decryptor
///
/// Plaintext is released chunk by chunk before the tag can be checked.
/// Nothing it produced may be trusted unless `finalize` returns `Ok`.
pub struct GcmDecryptor {
    core: GcmCore,
    expected_tag: [u8; TAG_LEN],
}

impl GcmDecryptor {
    pub fn new(key: &[u8], nonce: &[u8], tag: &[u8]) -> Result<Self> {
        let expected_tag: [u8; TAG_LEN] = tag.try_into().map_err(|_| {
            CryptError::format(format!(
                "authentication tag must be {} bytes, got {}",
                TAG_LEN,
                tag.len()
            ))
        })?;

        Ok(Self {
            core: GcmCore::new(key, nonce)?,
            expected_tag,
        })
    }

    /// Decrypt `buf` in place
    pub fn update(&mut self, buf: &mut [u8]) -> Result<()> {
        self.core.reserve(buf.len())?;
        self.core.ghash.update(buf);
        self.core.keystream.apply(&self.core.cipher, buf);
        Ok(())
    }

    /// Verify the tag over everything passed to `update`
    ///
    /// # Errors
    /// `CryptError::Integrity` if the tag does not match (constant-time compare).
    pub fn finalize(self) -> Result<()> {
        let expected = self.expected_tag;
        let computed = Zeroizing::new(self.core.tag());

        if bool::from(computed[..].ct_eq(&expected[..])) {
            Ok(())
        } else {
            Err(CryptError::Integrity)
        }
    }
}
