//! Packet-number-keyed decryption for multicast channels.
//!
//! Every member of a channel shares the same AEAD keys, and the source
//! rotates them as the membership changes. A rotation is advertised as a
//! packet-number range: the key protects packets from a given packet number
//! either until it is superseded by a later key (open-ended) or up to a
//! fixed packet number (closed). Packets can be reordered across a rotation
//! boundary, so several key epochs stay installed at once and each incoming
//! packet is matched to the epoch whose range covers its packet number.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::crypto;
use crate::crypto::Algorithm;
use crate::crypto::HeaderProtectionKey;
use crate::crypto::Open;

use crate::multicast::McError;

use crate::Error;
use crate::Result;

/// One installed key. The raw material is retained so the epoch can be
/// rebuilt when it is carried forward past a closed range.
struct KeyEpoch {
    open: Open,

    key: SmallVec<[u8; 32]>,

    iv: SmallVec<[u8; 12]>,
}

impl KeyEpoch {
    fn new(algo: Algorithm, key: &[u8], iv: &[u8]) -> Result<KeyEpoch> {
        Ok(KeyEpoch {
            open: Open::new(algo, key, iv)?,

            key: SmallVec::from_slice(key),

            iv: SmallVec::from_slice(iv),
        })
    }

    fn rebuild(&self, algo: Algorithm) -> Result<KeyEpoch> {
        KeyEpoch::new(algo, &self.key, &self.iv)
    }
}

/// Maps packet numbers to the key epoch that decrypts them.
///
/// Epochs are keyed by the first packet number they apply to; the epoch for
/// a packet is the one with the largest starting packet number that is not
/// above it. An epoch's range therefore ends where the next one begins.
pub struct McDecrypter {
    algo: Algorithm,

    epochs: BTreeMap<u64, KeyEpoch>,

    /// Header protection key shared by all epochs of the channel. Its
    /// algorithm is independent from the payload algorithm.
    hp_key: Option<HeaderProtectionKey>,
}

impl McDecrypter {
    pub fn new(algo: Algorithm) -> McDecrypter {
        McDecrypter {
            algo,
            epochs: BTreeMap::new(),
            hp_key: None,
        }
    }

    /// Installs a key and IV for a packet-number range.
    ///
    /// With `until_packet_number` 0 the key applies from
    /// `from_packet_number` until superseded by a later epoch, replacing any
    /// previously installed epoch starting at or after it. Otherwise the key
    /// applies to the closed range `[from, until]`, and the key that covered
    /// the packets right after the range keeps applying to them.
    ///
    /// Installing fails without changing any state if the key material does
    /// not fit the channel's algorithm or the range is inverted.
    pub fn set_key_and_iv_for_packet_range(
        &mut self, key: &[u8], iv: &[u8], from_packet_number: u64,
        until_packet_number: u64,
    ) -> Result<()> {
        let epoch = KeyEpoch::new(self.algo, key, iv)?;

        if until_packet_number == 0 {
            trace!(
                "install key for packets {}.. ({} epochs)",
                from_packet_number,
                self.epochs.len()
            );

            self.epochs.split_off(&from_packet_number);
            self.epochs.insert(from_packet_number, epoch);

            return Ok(());
        }

        if until_packet_number < from_packet_number {
            return Err(Error::Multicast(McError::McKeyRange));
        }

        trace!(
            "install key for packets {}..={} ({} epochs)",
            from_packet_number,
            until_packet_number,
            self.epochs.len()
        );

        // The key that covered the first packet after the closed range keeps
        // applying there, so carry it forward unless an epoch already starts
        // at that packet number.
        let carry = match until_packet_number.checked_add(1) {
            Some(next) => match self.epochs.range(..=next).next_back() {
                Some((&start, prev)) if start != next =>
                    Some((next, prev.rebuild(self.algo)?)),

                _ => None,
            },

            None => None,
        };

        let replaced: Vec<u64> = self
            .epochs
            .range(from_packet_number..=until_packet_number)
            .map(|(&start, _)| start)
            .collect();

        for start in replaced {
            self.epochs.remove(&start);
        }

        self.epochs.insert(from_packet_number, epoch);

        if let Some((next, carried)) = carry {
            self.epochs.insert(next, carried);
        }

        Ok(())
    }

    /// Installs a key epoch from a TLS-style secret, expanding the packet
    /// key and IV with the QUIC HKDF labels.
    pub fn set_secret_for_packet_range(
        &mut self, secret: &[u8], from_packet_number: u64,
        until_packet_number: u64,
    ) -> Result<()> {
        let mut key = vec![0; self.algo.key_len()];
        let mut iv = vec![0; self.algo.nonce_len()];

        crypto::derive_pkt_key(self.algo, secret, &mut key)?;
        crypto::derive_pkt_iv(self.algo, secret, &mut iv)?;

        self.set_key_and_iv_for_packet_range(
            &key,
            &iv,
            from_packet_number,
            until_packet_number,
        )
    }

    /// Sets the channel's header protection key. The header algorithm may
    /// differ from the payload algorithm.
    pub fn set_header_protection_key(
        &mut self, algo: Algorithm, key: &[u8],
    ) -> Result<()> {
        self.hp_key = Some(HeaderProtectionKey::new(algo, key)?);

        Ok(())
    }

    /// Decrypts `buf` in place with the epoch covering `packet_number` and
    /// returns the plaintext length.
    ///
    /// Returns [`McError::McNoKey`] if no epoch covers the packet number,
    /// and [`Error::CryptoFail`] if the covering key fails to authenticate
    /// the packet.
    pub fn decrypt_packet(
        &self, packet_number: u64, ad: &[u8], buf: &mut [u8],
    ) -> Result<usize> {
        let (start, epoch) = self
            .epochs
            .range(..=packet_number)
            .next_back()
            .ok_or(Error::Multicast(McError::McNoKey))?;

        trace!("decrypt packet {} with epoch {}", packet_number, start);

        epoch.open.open_with_u64_counter(packet_number, ad, buf)
    }

    /// Returns the header protection mask for a packet of the channel.
    pub fn header_protection_mask(&self, sample: &[u8]) -> Result<[u8; 5]> {
        self.hp_key
            .as_ref()
            .ok_or(Error::CryptoFail)?
            .new_mask(sample)
    }

    /// Drops the epochs that only cover packets below
    /// `before_packet_number`. The epoch covering that packet number, if
    /// any, is kept.
    pub fn discard_obsolete_keys(&mut self, before_packet_number: u64) {
        if let Some((&start, _)) =
            self.epochs.range(..=before_packet_number).next_back()
        {
            trace!(
                "discard epochs before {} ({} installed)",
                start,
                self.epochs.len()
            );

            self.epochs = self.epochs.split_off(&start);
        }
    }

    #[inline]
    pub fn algorithm(&self) -> Algorithm {
        self.algo
    }

    /// Algorithm of the header protection key, once it is installed.
    #[inline]
    pub fn header_algorithm(&self) -> Option<Algorithm> {
        self.hp_key.as_ref().map(HeaderProtectionKey::alg)
    }

    /// Returns the size in bytes of the channel's packet keys.
    #[inline]
    pub fn key_len(&self) -> usize {
        self.algo.key_len()
    }

    /// Returns the size in bytes of the channel's packet IVs.
    #[inline]
    pub fn nonce_len(&self) -> usize {
        self.algo.nonce_len()
    }

    /// Number of currently installed key epochs.
    #[inline]
    pub fn nb_epochs(&self) -> usize {
        self.epochs.len()
    }
}
