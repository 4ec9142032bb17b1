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

//! Multicast channel control frames.
//!
//! These frames ride on the unicast connection between a client and the
//! server announcing the channel. They describe the channel (group address,
//! algorithms, header protection key), its key-rotation schedule, and the
//! membership handshake. The multicast data packets themselves carry only
//! regular QUIC frames and are not parsed here.

use std::convert::TryInto;

use crate::crypto::Algorithm;
use crate::multicast::McClientState;
use crate::multicast::McKeyUpdate;
use crate::multicast::MC_CHANNEL_ANNOUNCE_CODE;
use crate::multicast::MC_CHANNEL_JOIN_CODE;
use crate::multicast::MC_CHANNEL_KEY_CODE;
use crate::multicast::MC_CHANNEL_LEAVE_CODE;
use crate::multicast::MC_CHANNEL_PROPERTIES_CODE;
use crate::multicast::MC_CHANNEL_RETIRE_CODE;
use crate::multicast::MC_CLIENT_CHANNEL_STATE_CODE;
use crate::multicast::MC_CLIENT_LIMITS_CODE;

use crate::Error;
use crate::Result;

// Presence flags of the optional MC_CHANNEL_PROPERTIES fields. They only
// exist on the wire; the parsed frame models presence with `Option`s.
const PROPERTIES_KEY_UPDATE_BIT: u8 = 0x01;
const PROPERTIES_MAX_RATE_BIT: u8 = 0x02;
const PROPERTIES_MAX_IDLE_TIME_BIT: u8 = 0x04;
const PROPERTIES_ACK_BUNDLE_BIT: u8 = 0x08;

const PROPERTIES_ALL_BITS: u8 = PROPERTIES_KEY_UPDATE_BIT |
    PROPERTIES_MAX_RATE_BIT |
    PROPERTIES_MAX_IDLE_TIME_BIT |
    PROPERTIES_ACK_BUNDLE_BIT;

// Channel IDs carry a single-byte length prefix on the wire.
fn encode_channel_id(
    b: &mut octets::OctetsMut, channel_id: &[u8],
) -> Result<()> {
    if channel_id.len() > u8::MAX as usize {
        return Err(Error::InvalidFrame);
    }

    b.put_u8(channel_id.len() as u8)?;
    b.put_bytes(channel_id)?;

    Ok(())
}

/// A multicast channel control frame.
#[derive(Clone, PartialEq, Eq)]
pub enum Frame {
    /// Server advertises a multicast channel to a client.
    McChannelAnnounce {
        channel_id: Vec<u8>,
        is_ipv6: u8,
        source_ip: [u8; 4],
        group_ip: [u8; 4],
        udp_port: u16,
        header_algo: Algorithm,
        header_key: Vec<u8>,
        algo: Algorithm,
        hash_algorithm: u64,
    },

    /// Server updates channel properties, optionally rotating the key over a
    /// closed packet-number range.
    McChannelProperties {
        channel_id: Vec<u8>,
        properties_sn: u64,
        key_update: Option<McKeyUpdate>,
        max_rate: Option<u64>,
        max_idle_time: Option<u64>,
        ack_bundle_size: Option<u64>,
    },

    /// Server installs a key valid from a packet number until superseded.
    McChannelKey {
        channel_id: Vec<u8>,
        channel_key_sn: u64,
        from_packet_number: u64,
        key: Vec<u8>,
    },

    /// Client asks to join an announced channel.
    McChannelJoin {
        channel_id: Vec<u8>,
        limits_sn: u64,
        channel_state_sn: u64,
        properties_sn: u64,
    },

    /// Server evicts a client from the channel.
    McChannelLeave {
        channel_id: Vec<u8>,
        channel_state_sn: u64,
        after_packet_number: u64,
    },

    /// Server withdraws the channel entirely.
    McChannelRetire { channel_id: Vec<u8> },

    /// Client reports its membership state for the channel.
    McClientChannelState {
        channel_id: Vec<u8>,
        channel_state_sn: u64,
        state: McClientState,
        reason: u64,
    },

    /// Client advertises its multicast capabilities and limits.
    McClientLimits {
        client_limits_sn: u64,
        capabilities: u64,
        max_aggregate_rate: u64,
        max_channel_ids: u64,
        max_joined: u64,
    },
}

impl Frame {
    pub fn from_bytes(b: &mut octets::Octets) -> Result<Frame> {
        let frame_type = b.get_varint()?;

        let frame = match frame_type {
            MC_CHANNEL_ANNOUNCE_CODE => {
                let channel_id = b.get_bytes_with_u8_length()?.to_vec();
                let is_ipv6 = b.get_u8()?;
                let source_ip = b
                    .get_bytes(4)?
                    .buf()
                    .try_into()
                    .map_err(|_| Error::BufferTooShort)?;
                let group_ip = b
                    .get_bytes(4)?
                    .buf()
                    .try_into()
                    .map_err(|_| Error::BufferTooShort)?;
                let udp_port = b.get_u16()?;
                let header_algo = b.get_u8()?.try_into()?;
                let header_key = b.get_bytes_with_varint_length()?.to_vec();
                let algo = b.get_u8()?.try_into()?;
                let hash_algorithm = b.get_varint()?;

                Frame::McChannelAnnounce {
                    channel_id,
                    is_ipv6,
                    source_ip,
                    group_ip,
                    udp_port,
                    header_algo,
                    header_key,
                    algo,
                    hash_algorithm,
                }
            },

            MC_CHANNEL_PROPERTIES_CODE => {
                let channel_id = b.get_bytes_with_u8_length()?.to_vec();
                let properties_sn = b.get_varint()?;

                let contents = b.get_u8()?;
                if contents & !PROPERTIES_ALL_BITS != 0 {
                    return Err(Error::InvalidFrame);
                }

                let key_update = if contents & PROPERTIES_KEY_UPDATE_BIT != 0 {
                    Some(McKeyUpdate::from_bytes(b)?)
                } else {
                    None
                };

                let max_rate = if contents & PROPERTIES_MAX_RATE_BIT != 0 {
                    Some(b.get_varint()?)
                } else {
                    None
                };

                let max_idle_time =
                    if contents & PROPERTIES_MAX_IDLE_TIME_BIT != 0 {
                        Some(b.get_varint()?)
                    } else {
                        None
                    };

                let ack_bundle_size =
                    if contents & PROPERTIES_ACK_BUNDLE_BIT != 0 {
                        Some(b.get_varint()?)
                    } else {
                        None
                    };

                Frame::McChannelProperties {
                    channel_id,
                    properties_sn,
                    key_update,
                    max_rate,
                    max_idle_time,
                    ack_bundle_size,
                }
            },

            MC_CHANNEL_KEY_CODE => Frame::McChannelKey {
                channel_id: b.get_bytes_with_u8_length()?.to_vec(),
                channel_key_sn: b.get_varint()?,
                from_packet_number: b.get_varint()?,
                key: b.get_bytes_with_varint_length()?.to_vec(),
            },

            MC_CHANNEL_JOIN_CODE => Frame::McChannelJoin {
                channel_id: b.get_bytes_with_u8_length()?.to_vec(),
                limits_sn: b.get_varint()?,
                channel_state_sn: b.get_varint()?,
                properties_sn: b.get_varint()?,
            },

            MC_CHANNEL_LEAVE_CODE => Frame::McChannelLeave {
                channel_id: b.get_bytes_with_u8_length()?.to_vec(),
                channel_state_sn: b.get_varint()?,
                after_packet_number: b.get_varint()?,
            },

            MC_CHANNEL_RETIRE_CODE => Frame::McChannelRetire {
                channel_id: b.get_bytes_with_u8_length()?.to_vec(),
            },

            MC_CLIENT_CHANNEL_STATE_CODE => Frame::McClientChannelState {
                channel_id: b.get_bytes_with_u8_length()?.to_vec(),
                channel_state_sn: b.get_varint()?,
                state: b.get_varint()?.try_into()?,
                reason: b.get_varint()?,
            },

            MC_CLIENT_LIMITS_CODE => Frame::McClientLimits {
                client_limits_sn: b.get_varint()?,
                capabilities: b.get_varint()?,
                max_aggregate_rate: b.get_varint()?,
                max_channel_ids: b.get_varint()?,
                max_joined: b.get_varint()?,
            },

            _ => return Err(Error::InvalidFrame),
        };

        Ok(frame)
    }

    pub fn to_bytes(&self, b: &mut octets::OctetsMut) -> Result<usize> {
        let before = b.cap();

        match self {
            Frame::McChannelAnnounce {
                channel_id,
                is_ipv6,
                source_ip,
                group_ip,
                udp_port,
                header_algo,
                header_key,
                algo,
                hash_algorithm,
            } => {
                b.put_varint(MC_CHANNEL_ANNOUNCE_CODE)?;

                encode_channel_id(b, channel_id)?;
                b.put_u8(*is_ipv6)?;
                b.put_bytes(source_ip)?;
                b.put_bytes(group_ip)?;
                b.put_u16(*udp_port)?;
                b.put_u8((*header_algo).into())?;
                b.put_varint(header_key.len() as u64)?;
                b.put_bytes(header_key)?;
                b.put_u8((*algo).into())?;
                b.put_varint(*hash_algorithm)?;
            },

            Frame::McChannelProperties {
                channel_id,
                properties_sn,
                key_update,
                max_rate,
                max_idle_time,
                ack_bundle_size,
            } => {
                b.put_varint(MC_CHANNEL_PROPERTIES_CODE)?;

                encode_channel_id(b, channel_id)?;
                b.put_varint(*properties_sn)?;

                let mut contents = 0;
                if key_update.is_some() {
                    contents |= PROPERTIES_KEY_UPDATE_BIT;
                }
                if max_rate.is_some() {
                    contents |= PROPERTIES_MAX_RATE_BIT;
                }
                if max_idle_time.is_some() {
                    contents |= PROPERTIES_MAX_IDLE_TIME_BIT;
                }
                if ack_bundle_size.is_some() {
                    contents |= PROPERTIES_ACK_BUNDLE_BIT;
                }
                b.put_u8(contents)?;

                if let Some(key_update) = key_update {
                    key_update.to_bytes(b)?;
                }

                if let Some(max_rate) = max_rate {
                    b.put_varint(*max_rate)?;
                }

                if let Some(max_idle_time) = max_idle_time {
                    b.put_varint(*max_idle_time)?;
                }

                if let Some(ack_bundle_size) = ack_bundle_size {
                    b.put_varint(*ack_bundle_size)?;
                }
            },

            Frame::McChannelKey {
                channel_id,
                channel_key_sn,
                from_packet_number,
                key,
            } => {
                b.put_varint(MC_CHANNEL_KEY_CODE)?;

                encode_channel_id(b, channel_id)?;
                b.put_varint(*channel_key_sn)?;
                b.put_varint(*from_packet_number)?;
                b.put_varint(key.len() as u64)?;
                b.put_bytes(key)?;
            },

            Frame::McChannelJoin {
                channel_id,
                limits_sn,
                channel_state_sn,
                properties_sn,
            } => {
                b.put_varint(MC_CHANNEL_JOIN_CODE)?;

                encode_channel_id(b, channel_id)?;
                b.put_varint(*limits_sn)?;
                b.put_varint(*channel_state_sn)?;
                b.put_varint(*properties_sn)?;
            },

            Frame::McChannelLeave {
                channel_id,
                channel_state_sn,
                after_packet_number,
            } => {
                b.put_varint(MC_CHANNEL_LEAVE_CODE)?;

                encode_channel_id(b, channel_id)?;
                b.put_varint(*channel_state_sn)?;
                b.put_varint(*after_packet_number)?;
            },

            Frame::McChannelRetire { channel_id } => {
                b.put_varint(MC_CHANNEL_RETIRE_CODE)?;

                encode_channel_id(b, channel_id)?;
            },

            Frame::McClientChannelState {
                channel_id,
                channel_state_sn,
                state,
                reason,
            } => {
                b.put_varint(MC_CLIENT_CHANNEL_STATE_CODE)?;

                encode_channel_id(b, channel_id)?;
                b.put_varint(*channel_state_sn)?;
                b.put_varint((*state).into())?;
                b.put_varint(*reason)?;
            },

            Frame::McClientLimits {
                client_limits_sn,
                capabilities,
                max_aggregate_rate,
                max_channel_ids,
                max_joined,
            } => {
                b.put_varint(MC_CLIENT_LIMITS_CODE)?;

                b.put_varint(*client_limits_sn)?;
                b.put_varint(*capabilities)?;
                b.put_varint(*max_aggregate_rate)?;
                b.put_varint(*max_channel_ids)?;
                b.put_varint(*max_joined)?;
            },
        }

        Ok(before - b.cap())
    }

    /// Returns the channel this frame refers to, if any.
    pub fn channel_id(&self) -> Option<&[u8]> {
        match self {
            Frame::McChannelAnnounce { channel_id, .. } |
            Frame::McChannelProperties { channel_id, .. } |
            Frame::McChannelKey { channel_id, .. } |
            Frame::McChannelJoin { channel_id, .. } |
            Frame::McChannelLeave { channel_id, .. } |
            Frame::McChannelRetire { channel_id } |
            Frame::McClientChannelState { channel_id, .. } => Some(channel_id),

            Frame::McClientLimits { .. } => None,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Frame::McChannelAnnounce {
                channel_id,
                is_ipv6,
                source_ip,
                group_ip,
                udp_port,
                header_algo,
                algo,
                hash_algorithm,
                ..
            } => {
                write!(
                    f,
                    "MC_CHANNEL_ANNOUNCE channel ID={:?} is_ipv6={} source_ip={:?} group_ip={:?} udp_port={} header_algo={:?} algo={:?} hash_algorithm={}",
                    channel_id, is_ipv6, source_ip, group_ip, udp_port, header_algo, algo, hash_algorithm,
                )?;
            },

            Frame::McChannelProperties {
                channel_id,
                properties_sn,
                key_update,
                max_rate,
                max_idle_time,
                ack_bundle_size,
            } => {
                write!(
                    f,
                    "MC_CHANNEL_PROPERTIES channel ID={:?} sn={} key_update={:?} max_rate={:?} max_idle_time={:?} ack_bundle_size={:?}",
                    channel_id, properties_sn, key_update, max_rate, max_idle_time, ack_bundle_size,
                )?;
            },

            Frame::McChannelKey {
                channel_id,
                channel_key_sn,
                from_packet_number,
                key,
            } => {
                write!(
                    f,
                    "MC_CHANNEL_KEY channel ID={:?} sn={} from={} key len={}",
                    channel_id,
                    channel_key_sn,
                    from_packet_number,
                    key.len(),
                )?;
            },

            Frame::McChannelJoin {
                channel_id,
                limits_sn,
                channel_state_sn,
                properties_sn,
            } => {
                write!(
                    f,
                    "MC_CHANNEL_JOIN channel ID={:?} limits_sn={} channel_state_sn={} properties_sn={}",
                    channel_id, limits_sn, channel_state_sn, properties_sn,
                )?;
            },

            Frame::McChannelLeave {
                channel_id,
                channel_state_sn,
                after_packet_number,
            } => {
                write!(
                    f,
                    "MC_CHANNEL_LEAVE channel ID={:?} channel_state_sn={} after={}",
                    channel_id, channel_state_sn, after_packet_number,
                )?;
            },

            Frame::McChannelRetire { channel_id } => {
                write!(f, "MC_CHANNEL_RETIRE channel ID={:?}", channel_id)?;
            },

            Frame::McClientChannelState {
                channel_id,
                channel_state_sn,
                state,
                reason,
            } => {
                write!(
                    f,
                    "MC_CLIENT_CHANNEL_STATE channel ID={:?} sn={} state={:?} reason={}",
                    channel_id, channel_state_sn, state, reason,
                )?;
            },

            Frame::McClientLimits {
                client_limits_sn,
                capabilities,
                max_aggregate_rate,
                max_channel_ids,
                max_joined,
            } => {
                write!(
                    f,
                    "MC_CLIENT_LIMITS sn={} capabilities={:#x} max_aggregate_rate={} max_channel_ids={} max_joined={}",
                    client_limits_sn, capabilities, max_aggregate_rate, max_channel_ids, max_joined,
                )?;
            },
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::multicast::MC_LIMITS_IPV4;
    use crate::multicast::MC_LIMITS_SSM;
    use crate::multicast::MC_REASON_HIGH_LOSS;

    #[test]
    fn channel_announce() {
        let mut d = [42; 128];

        let frame = Frame::McChannelAnnounce {
            channel_id: vec![0xba, 0xbe, 0x01, 0x02],
            is_ipv6: 0,
            source_ip: [10, 0, 0, 1],
            group_ip: [232, 1, 1, 7],
            udp_port: 7878,
            header_algo: Algorithm::AES128_GCM,
            header_key: vec![0x55; 16],
            algo: Algorithm::AES256_GCM,
            hash_algorithm: 1,
        };

        let wire_len = {
            let mut b = octets::OctetsMut::with_slice(&mut d);
            frame.to_bytes(&mut b).unwrap()
        };

        let mut b = octets::Octets::with_slice(&d[..wire_len]);
        assert_eq!(Frame::from_bytes(&mut b), Ok(frame));
    }

    #[test]
    fn channel_properties() {
        let mut d = [42; 128];

        let frame = Frame::McChannelProperties {
            channel_id: vec![0xff, 0xdd, 0xee],
            properties_sn: 4,
            key_update: Some(McKeyUpdate {
                from_packet_number: 100,
                until_packet_number: 200,
                key: vec![7; 32],
            }),
            max_rate: Some(10_000),
            max_idle_time: None,
            ack_bundle_size: Some(32),
        };

        let wire_len = {
            let mut b = octets::OctetsMut::with_slice(&mut d);
            frame.to_bytes(&mut b).unwrap()
        };

        let mut b = octets::Octets::with_slice(&d[..wire_len]);
        assert_eq!(Frame::from_bytes(&mut b), Ok(frame));
    }

    #[test]
    fn channel_properties_empty() {
        let mut d = [42; 32];

        let frame = Frame::McChannelProperties {
            channel_id: vec![0x01],
            properties_sn: 9,
            key_update: None,
            max_rate: None,
            max_idle_time: None,
            ack_bundle_size: None,
        };

        let wire_len = {
            let mut b = octets::OctetsMut::with_slice(&mut d);
            frame.to_bytes(&mut b).unwrap()
        };

        let mut b = octets::Octets::with_slice(&d[..wire_len]);
        assert_eq!(Frame::from_bytes(&mut b), Ok(frame));
    }

    #[test]
    fn channel_properties_unknown_contents_bit() {
        let mut d = [0; 32];

        let wire_len = {
            let frame = Frame::McChannelProperties {
                channel_id: vec![0x01],
                properties_sn: 1,
                key_update: None,
                max_rate: None,
                max_idle_time: None,
                ack_bundle_size: None,
            };

            let mut b = octets::OctetsMut::with_slice(&mut d);
            frame.to_bytes(&mut b).unwrap()
        };

        // Flip a reserved presence bit.
        d[wire_len - 1] |= 0x80;

        let mut b = octets::Octets::with_slice(&d[..wire_len]);
        assert_eq!(Frame::from_bytes(&mut b), Err(Error::InvalidFrame));
    }

    #[test]
    fn channel_key() {
        let mut d = [42; 128];

        let frame = Frame::McChannelKey {
            channel_id: vec![0xff, 0xdd, 0xee, 0xaa, 0xbb, 0x33, 0x66],
            channel_key_sn: 3,
            from_packet_number: 0xffffff,
            key: vec![1; 32],
        };

        let wire_len = {
            let mut b = octets::OctetsMut::with_slice(&mut d);
            frame.to_bytes(&mut b).unwrap()
        };

        let mut b = octets::Octets::with_slice(&d[..wire_len]);
        assert_eq!(Frame::from_bytes(&mut b), Ok(frame));
    }

    #[test]
    fn membership_frames() {
        let mut d = [42; 128];

        for frame in [
            Frame::McChannelJoin {
                channel_id: vec![0xab; 8],
                limits_sn: 1,
                channel_state_sn: 2,
                properties_sn: 3,
            },
            Frame::McChannelLeave {
                channel_id: vec![0xab; 8],
                channel_state_sn: 4,
                after_packet_number: 777,
            },
            Frame::McChannelRetire {
                channel_id: vec![0xab; 8],
            },
            Frame::McClientChannelState {
                channel_id: vec![0xab; 8],
                channel_state_sn: 5,
                state: McClientState::Left,
                reason: MC_REASON_HIGH_LOSS,
            },
            Frame::McClientLimits {
                client_limits_sn: 1,
                capabilities: MC_LIMITS_IPV4 | MC_LIMITS_SSM,
                max_aggregate_rate: 20_000,
                max_channel_ids: 16,
                max_joined: 4,
            },
        ] {
            let wire_len = {
                let mut b = octets::OctetsMut::with_slice(&mut d);
                frame.to_bytes(&mut b).unwrap()
            };

            let mut b = octets::Octets::with_slice(&d[..wire_len]);
            assert_eq!(Frame::from_bytes(&mut b), Ok(frame));
        }
    }

    #[test]
    fn retire_wire_len() {
        let mut d = [0; 16];

        let frame = Frame::McChannelRetire {
            channel_id: vec![1, 2, 3, 4],
        };

        let mut b = octets::OctetsMut::with_slice(&mut d);

        // 2-byte type varint, 1-byte length, 4-byte channel ID.
        assert_eq!(frame.to_bytes(&mut b), Ok(7));
    }

    #[test]
    fn oversized_channel_id() {
        let mut d = [0; 512];

        // The length prefix is a single byte, so longer IDs cannot be
        // represented on the wire.
        let frame = Frame::McChannelRetire {
            channel_id: vec![7; 256],
        };

        let mut b = octets::OctetsMut::with_slice(&mut d);
        assert_eq!(frame.to_bytes(&mut b), Err(Error::InvalidFrame));
    }

    #[test]
    fn unknown_frame_type() {
        let mut d = [0; 16];

        {
            let mut b = octets::OctetsMut::with_slice(&mut d);
            b.put_varint(0x2f).unwrap();
        }

        let mut b = octets::Octets::with_slice(&d);
        assert_eq!(Frame::from_bytes(&mut b), Err(Error::InvalidFrame));
    }

    #[test]
    fn announce_bad_algorithm() {
        let mut d = [0; 64];

        let wire_len = {
            let frame = Frame::McChannelAnnounce {
                channel_id: vec![0x01],
                is_ipv6: 0,
                source_ip: [10, 0, 0, 1],
                group_ip: [232, 1, 1, 7],
                udp_port: 4433,
                header_algo: Algorithm::AES128_GCM,
                header_key: vec![],
                algo: Algorithm::AES128_GCM,
                hash_algorithm: 0,
            };

            let mut b = octets::OctetsMut::with_slice(&mut d);
            frame.to_bytes(&mut b).unwrap()
        };

        // Corrupt the header algorithm byte: the 2-byte type, channel ID
        // (1+1), is_ipv6 (1), the two IPs (8) and the port (2) precede it.
        d[15] = 0x7f;

        let mut b = octets::Octets::with_slice(&d[..wire_len]);
        assert_eq!(Frame::from_bytes(&mut b), Err(Error::CryptoFail));
    }
}
