// Copyright (C) 2018-2019, Cloudflare, Inc.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright notice,
//       this list of conditions and the following disclaimer.
//
//     * Redistributions in binary form must reproduce the above copyright
//       notice, this list of conditions and the following disclaimer in the
//       documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS
// IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO,
// THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR
// PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR
// CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL,
// EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO,
// PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE, DATA, OR
// PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF
// LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING
// NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE OF THIS
// SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! AEAD abstraction used by the multicast channel extension.
//!
//! Multicast packets are protected with a symmetric key shared by the whole
//! group, so a single [`Open`]/[`Seal`] pair per key epoch is enough: there
//! is no handshake-driven key schedule like on a unicast connection. Key
//! material either arrives raw (key + IV) or as a TLS-style secret that is
//! expanded with the usual QUIC HKDF labels.

use ring::aead;
use ring::hkdf;

use crate::Error;
use crate::Result;

/// AEAD algorithm protecting the multicast channel payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Algorithm {
    AES128_GCM,
    AES256_GCM,
    ChaCha20_Poly1305,
}

impl Algorithm {
    fn get_ring_aead(self) -> &'static aead::Algorithm {
        match self {
            Algorithm::AES128_GCM => &aead::AES_128_GCM,
            Algorithm::AES256_GCM => &aead::AES_256_GCM,
            Algorithm::ChaCha20_Poly1305 => &aead::CHACHA20_POLY1305,
        }
    }

    fn get_ring_hp(self) -> &'static aead::quic::Algorithm {
        match self {
            Algorithm::AES128_GCM => &aead::quic::AES_128,
            Algorithm::AES256_GCM => &aead::quic::AES_256,
            Algorithm::ChaCha20_Poly1305 => &aead::quic::CHACHA20,
        }
    }

    fn get_ring_digest(self) -> hkdf::Algorithm {
        match self {
            Algorithm::AES128_GCM => hkdf::HKDF_SHA256,
            Algorithm::AES256_GCM => hkdf::HKDF_SHA384,
            Algorithm::ChaCha20_Poly1305 => hkdf::HKDF_SHA256,
        }
    }

    /// Returns the size in bytes of a key for the algorithm.
    pub fn key_len(self) -> usize {
        match self {
            Algorithm::AES128_GCM => 16,
            Algorithm::AES256_GCM => 32,
            Algorithm::ChaCha20_Poly1305 => 32,
        }
    }

    /// Returns the size in bytes of the AEAD authentication tag.
    pub fn tag_len(self) -> usize {
        16
    }

    /// Returns the size in bytes of an IV to use with the algorithm.
    pub fn nonce_len(self) -> usize {
        aead::NONCE_LEN
    }
}

impl std::convert::TryFrom<u8> for Algorithm {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Algorithm::AES128_GCM),
            1 => Ok(Algorithm::AES256_GCM),
            2 => Ok(Algorithm::ChaCha20_Poly1305),
            _ => Err(Error::CryptoFail),
        }
    }
}

impl From<Algorithm> for u8 {
    fn from(algo: Algorithm) -> Self {
        match algo {
            Algorithm::AES128_GCM => 0,
            Algorithm::AES256_GCM => 1,
            Algorithm::ChaCha20_Poly1305 => 2,
        }
    }
}

/// Decryption side of a single key epoch.
pub struct Open {
    alg: Algorithm,

    key: aead::LessSafeKey,

    nonce: [u8; aead::NONCE_LEN],
}

impl Open {
    /// Creates a decryptor from raw key material.
    pub fn new(alg: Algorithm, key: &[u8], iv: &[u8]) -> Result<Open> {
        Ok(Open {
            alg,

            key: make_aead_key(alg, key)?,

            nonce: make_iv(iv)?,
        })
    }

    /// Creates a decryptor from a TLS-style secret, expanding the packet key
    /// and IV with the QUIC HKDF labels.
    pub fn from_secret(alg: Algorithm, secret: &[u8]) -> Result<Open> {
        let mut key = vec![0; alg.key_len()];
        let mut iv = vec![0; alg.nonce_len()];

        derive_pkt_key(alg, secret, &mut key)?;
        derive_pkt_iv(alg, secret, &mut iv)?;

        Open::new(alg, &key, &iv)
    }

    /// Decrypts `buf` in place, using the packet number as nonce counter,
    /// and returns the plaintext length.
    pub fn open_with_u64_counter(
        &self, counter: u64, ad: &[u8], buf: &mut [u8],
    ) -> Result<usize> {
        let nonce = make_nonce(&self.nonce, counter);

        let plain = self
            .key
            .open_in_place(nonce, aead::Aad::from(ad), buf)
            .map_err(|_| Error::CryptoFail)?;

        Ok(plain.len())
    }

    pub fn alg(&self) -> Algorithm {
        self.alg
    }
}

/// Header protection key of a multicast channel.
///
/// A single header key is shared by every key epoch of a channel, and its
/// algorithm is announced separately from the payload algorithm.
pub struct HeaderProtectionKey {
    alg: Algorithm,

    hp_key: aead::quic::HeaderProtectionKey,
}

impl HeaderProtectionKey {
    pub fn new(alg: Algorithm, key: &[u8]) -> Result<HeaderProtectionKey> {
        Ok(HeaderProtectionKey {
            alg,

            hp_key: make_hp_key(alg, key)?,
        })
    }

    /// Returns the header protection mask for the given ciphertext sample.
    pub fn new_mask(&self, sample: &[u8]) -> Result<[u8; 5]> {
        self.hp_key.new_mask(sample).map_err(|_| Error::CryptoFail)
    }

    pub fn alg(&self) -> Algorithm {
        self.alg
    }
}

/// Encryption side of a single key epoch. Only the channel source seals
/// multicast packets.
pub struct Seal {
    alg: Algorithm,

    key: aead::LessSafeKey,

    nonce: [u8; aead::NONCE_LEN],
}

impl Seal {
    /// Creates an encryptor from raw key material.
    pub fn new(alg: Algorithm, key: &[u8], iv: &[u8]) -> Result<Seal> {
        Ok(Seal {
            alg,

            key: make_aead_key(alg, key)?,

            nonce: make_iv(iv)?,
        })
    }

    /// Creates an encryptor from a TLS-style secret.
    pub fn from_secret(alg: Algorithm, secret: &[u8]) -> Result<Seal> {
        let mut key = vec![0; alg.key_len()];
        let mut iv = vec![0; alg.nonce_len()];

        derive_pkt_key(alg, secret, &mut key)?;
        derive_pkt_iv(alg, secret, &mut iv)?;

        Seal::new(alg, &key, &iv)
    }

    /// Encrypts the first `in_len` bytes of `buf` in place, appending the
    /// authentication tag, and returns the ciphertext length.
    pub fn seal_with_u64_counter(
        &self, counter: u64, ad: &[u8], buf: &mut [u8], in_len: usize,
    ) -> Result<usize> {
        let tag_len = self.alg.tag_len();

        if buf.len() < in_len + tag_len {
            return Err(Error::BufferTooShort);
        }

        let nonce = make_nonce(&self.nonce, counter);

        let tag = self
            .key
            .seal_in_place_separate_tag(
                nonce,
                aead::Aad::from(ad),
                &mut buf[..in_len],
            )
            .map_err(|_| Error::CryptoFail)?;

        buf[in_len..in_len + tag_len].copy_from_slice(tag.as_ref());

        Ok(in_len + tag_len)
    }

    pub fn alg(&self) -> Algorithm {
        self.alg
    }
}

pub(crate) fn derive_pkt_key(
    alg: Algorithm, secret: &[u8], out: &mut [u8],
) -> Result<()> {
    const LABEL: &[u8] = b"quic key";

    let key_len = alg.key_len();

    if key_len > out.len() {
        return Err(Error::CryptoFail);
    }

    let secret_prk = hkdf::Prk::new_less_safe(alg.get_ring_digest(), secret);
    hkdf_expand_label(&secret_prk, LABEL, &mut out[..key_len])
}

pub(crate) fn derive_pkt_iv(
    alg: Algorithm, secret: &[u8], out: &mut [u8],
) -> Result<()> {
    const LABEL: &[u8] = b"quic iv";

    let nonce_len = alg.nonce_len();

    if nonce_len > out.len() {
        return Err(Error::CryptoFail);
    }

    let secret_prk = hkdf::Prk::new_less_safe(alg.get_ring_digest(), secret);
    hkdf_expand_label(&secret_prk, LABEL, &mut out[..nonce_len])
}

fn make_aead_key(alg: Algorithm, key: &[u8]) -> Result<aead::LessSafeKey> {
    let key = aead::UnboundKey::new(alg.get_ring_aead(), key)
        .map_err(|_| Error::CryptoFail)?;

    Ok(aead::LessSafeKey::new(key))
}

fn make_iv(iv: &[u8]) -> Result<[u8; aead::NONCE_LEN]> {
    let mut nonce = [0; aead::NONCE_LEN];

    if iv.len() != nonce.len() {
        return Err(Error::CryptoFail);
    }

    nonce.copy_from_slice(iv);

    Ok(nonce)
}

fn make_hp_key(
    alg: Algorithm, key: &[u8],
) -> Result<aead::quic::HeaderProtectionKey> {
    aead::quic::HeaderProtectionKey::new(alg.get_ring_hp(), key)
        .map_err(|_| Error::CryptoFail)
}

fn make_nonce(iv: &[u8; aead::NONCE_LEN], counter: u64) -> aead::Nonce {
    let mut nonce = *iv;

    // XOR the last bytes of the IV with the counter. This is equivalent to
    // left-padding the counter with zero bytes.
    for (a, b) in nonce[4..].iter_mut().zip(counter.to_be_bytes().iter()) {
        *a ^= b;
    }

    aead::Nonce::assume_unique_for_key(nonce)
}

fn hkdf_expand_label(
    prk: &hkdf::Prk, label: &[u8], out: &mut [u8],
) -> Result<()> {
    const LABEL_PREFIX: &[u8] = b"tls13 ";

    let out_len = (out.len() as u16).to_be_bytes();
    let label_len = (LABEL_PREFIX.len() + label.len()) as u8;

    let info = [&out_len[..], &[label_len][..], LABEL_PREFIX, label, &[0][..]];

    prk.expand(&info, ArbitraryOutputLen(out.len()))
        .map_err(|_| Error::CryptoFail)?
        .fill(out)
        .map_err(|_| Error::CryptoFail)?;

    Ok(())
}

// The ring HKDF expand() API does not accept arbitrary output lengths, so we
// need to hide the `usize` length as part of a type that implements the trait
// `ring::hkdf::KeyType` in order to trick ring into accepting it.
struct ArbitraryOutputLen(usize);

impl hkdf::KeyType for ArbitraryOutputLen {
    fn len(&self) -> usize {
        self.0
    }
}
