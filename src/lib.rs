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

//! Multicast channel extension for the QUIC transport protocol.
//!
//! A multicast-capable server announces *channels* (source/group IP, UDP
//! port, key material) over regular unicast QUIC connections, clients join
//! and leave them, and per-channel decryption keys rotate over packet-number
//! ranges as the membership changes.
//!
//! This crate provides the pieces of that extension that live outside the
//! QUIC connection machinery:
//!
//! * [`multicast::decrypter::McDecrypter`] maps packet numbers to the key
//!   epoch that must decrypt them, installs keys effective at future packet
//!   numbers, and garbage-collects epochs that no reachable packet needs
//!   anymore.
//!
//! * [`frame::Frame`] carries the channel control messages (announce,
//!   properties, key rotation, join/leave, client limits) on the wire.
//!
//! * [`multicast::McChannel`] and [`multicast::McChannelRegistry`] tie the
//!   two together: control frames are routed to the channel they belong to
//!   and drive its key schedule and membership state machine.
//!
//! Feeding packets in and out of sockets, parsing non-multicast frames, and
//! the IGMP/MLD group membership signalling are left to the application and
//! to the enclosing QUIC implementation.
//!
//! ## Decrypting multicast packets
//!
//! ```
//! use mcquic::crypto::Algorithm;
//! use mcquic::multicast::decrypter::McDecrypter;
//!
//! let mut decrypter = McDecrypter::new(Algorithm::AES128_GCM);
//!
//! // Key valid from packet 0 until superseded.
//! decrypter.set_key_and_iv_for_packet_range(&[0xab; 16], &[0xcd; 12], 0, 0)?;
//!
//! // Rotated key for packets 1000 onwards.
//! decrypter.set_key_and_iv_for_packet_range(&[0xef; 16], &[0x01; 12], 1000, 0)?;
//! # Ok::<(), mcquic::Error>(())
//! ```

#[macro_use]
extern crate log;

/// A specialized [`Result`] type for quic multicast operations.
///
/// [`Result`]: https://doc.rust-lang.org/std/result/enum.Result.html
pub type Result<T> = std::result::Result<T, Error>;

/// A multicast extension error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The provided buffer is too short.
    BufferTooShort,

    /// The provided frame cannot be parsed because its version is unknown.
    InvalidFrame,

    /// A cryptographic operation failed.
    CryptoFail,

    /// Multicast channel error.
    Multicast(multicast::McError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::convert::From<octets::BufferTooShortError> for Error {
    fn from(_err: octets::BufferTooShortError) -> Self {
        Error::BufferTooShort
    }
}

pub mod crypto;
pub mod frame;
pub mod multicast;
