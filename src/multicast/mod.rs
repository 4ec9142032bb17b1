//! Multicast channel extension for QUIC.
//!
//! A channel is a multicast group (source/group IP and UDP port) with its own
//! AEAD key-rotation schedule, independent of the unicast connections that
//! announce it. Servers describe channels with MC_CHANNEL_ANNOUNCE and drive
//! the key schedule with MC_CHANNEL_PROPERTIES and MC_CHANNEL_KEY frames;
//! clients join and leave with MC_CHANNEL_JOIN and MC_CLIENT_CHANNEL_STATE.
//!
//! [`McChannel`] holds the per-channel state (membership state machine and
//! the [`decrypter::McDecrypter`] key-range engine), while
//! [`McChannelRegistry`] routes control frames to the channel they belong to.

use std::collections::HashMap;
use std::convert::TryFrom;

use crate::crypto::Algorithm;
use crate::frame::Frame;

use crate::Error;
use crate::Result;

pub mod decrypter;

use decrypter::McDecrypter;

/// MC_CHANNEL_ANNOUNCE frame type.
pub const MC_CHANNEL_ANNOUNCE_CODE: u64 = 0xf3;
/// MC_CHANNEL_PROPERTIES frame type.
pub const MC_CHANNEL_PROPERTIES_CODE: u64 = 0xf4;
/// MC_CHANNEL_KEY frame type.
pub const MC_CHANNEL_KEY_CODE: u64 = 0xf5;
/// MC_CHANNEL_JOIN frame type.
pub const MC_CHANNEL_JOIN_CODE: u64 = 0xf6;
/// MC_CHANNEL_LEAVE frame type.
pub const MC_CHANNEL_LEAVE_CODE: u64 = 0xf7;
/// MC_CHANNEL_RETIRE frame type.
pub const MC_CHANNEL_RETIRE_CODE: u64 = 0xf8;
/// MC_CLIENT_CHANNEL_STATE frame type.
pub const MC_CLIENT_CHANNEL_STATE_CODE: u64 = 0xf9;
/// MC_CLIENT_LIMITS frame type.
pub const MC_CLIENT_LIMITS_CODE: u64 = 0xfa;

/// The client can receive IPv4 multicast groups.
pub const MC_LIMITS_IPV4: u64 = 0x0001;
/// The client can receive IPv6 multicast groups.
pub const MC_LIMITS_IPV6: u64 = 0x0002;
/// The client supports source-specific multicast.
pub const MC_LIMITS_SSM: u64 = 0x0004;
/// The client supports any-source multicast.
pub const MC_LIMITS_ASM: u64 = 0x0008;

/// No particular reason for the state change.
pub const MC_REASON_UNSPECIFIED: u64 = 0x00;
/// The server asked the client to leave.
pub const MC_REASON_SERVER_REQUESTED: u64 = 0x01;
/// Administrative block on the client side.
pub const MC_REASON_ADMINISTRATIVE_BLOCK: u64 = 0x02;
/// The client detected a protocol error on the channel.
pub const MC_REASON_PROTOCOL_ERROR: u64 = 0x03;
/// The channel violated its announced properties.
pub const MC_REASON_PROPERTY_VIOLATION: u64 = 0x04;
/// The client's properties are out of sync with the channel.
pub const MC_REASON_UNSYNCHRONIZED_PROPERTIES: u64 = 0x05;
/// The channel ID collides with another channel.
pub const MC_REASON_ID_COLLISION: u64 = 0x06;
/// The channel exceeded its maximum idle time.
pub const MC_REASON_MAX_IDLE_TIME_EXCEEDED: u64 = 0x11;
/// The channel exceeded its maximum rate.
pub const MC_REASON_MAX_RATE_EXCEEDED: u64 = 0x12;
/// The client experienced too much loss on the channel.
pub const MC_REASON_HIGH_LOSS: u64 = 0x13;

/// Multicast extension errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum McError {
    /// Incorrect channel announce data.
    McAnnounce,

    /// The frame refers to a channel this endpoint does not know.
    McUnknownChannel,

    /// A channel with this ID already exists.
    McChannelExists,

    /// Attempts to perform a client-specific operation on a server and
    /// conversely.
    McInvalidRole(McRole),

    /// Invalid symmetric key material.
    McInvalidSymKey,

    /// Invalid status state machine move for the client.
    McInvalidAction,

    /// No key epoch covers the requested packet number.
    McNoKey,

    /// The key range ends before it starts.
    McKeyRange,

    /// The control frame carries a sequence number that is not newer than
    /// the last applied one.
    McStaleSequence,
}

/// States of a multicast channel member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum McClientStatus {
    /// Not aware of the multicast channel.
    Unaware,

    /// Aware of the multicast channel but not joined.
    AwareUnjoined,

    /// Sent the request to join the multicast channel, not confirmed yet.
    WaitingToJoin,

    /// Refused to join the multicast channel.
    DeclinedJoin,

    /// Joined the multicast channel, but does not have a key yet.
    JoinedNoKey,

    /// Joined and got a decryption key.
    JoinedAndKey,

    /// Leaving the multicast channel, waiting for acknowledgment. The inner
    /// value is `true` once the notification has been sent to the server.
    Leaving(bool),

    /// Left the multicast channel.
    Left,
}

/// Actions of a multicast channel member in the finite state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum McClientAction {
    /// Learns the existence of the multicast channel.
    Notify,

    /// Joins the multicast channel.
    Join,

    /// Declines to join the multicast channel.
    DeclineJoin,

    /// Receives a decryption key.
    DecryptionKey,

    /// Leaves the multicast channel.
    Leave,
}

/// Role of an endpoint with respect to one multicast channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum McRole {
    /// The multicast source itself. Not tied to any client connection.
    ChannelSource,

    /// Server unicast connection, tracking the state of its client.
    ServerUnicast(McClientStatus),

    /// Receiver of the multicast channel.
    Client(McClientStatus),

    /// Undefined role. Used as temporary value.
    Undefined,
}

/// Client membership state carried by MC_CLIENT_CHANNEL_STATE.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum McClientState {
    /// The client joined the channel.
    Join,

    /// The client refused to join the channel.
    DeclinedJoin,

    /// The client left the channel.
    Left,
}

impl TryFrom<u64> for McClientState {
    type Error = crate::Error;

    fn try_from(v: u64) -> Result<Self> {
        match v {
            1 => Ok(McClientState::Join),
            2 => Ok(McClientState::DeclinedJoin),
            3 => Ok(McClientState::Left),
            _ => Err(Error::Multicast(McError::McInvalidAction)),
        }
    }
}

impl From<McClientState> for u64 {
    fn from(v: McClientState) -> Self {
        match v {
            McClientState::Join => 1,
            McClientState::DeclinedJoin => 2,
            McClientState::Left => 3,
        }
    }
}

/// A key rotation carried by an MC_CHANNEL_PROPERTIES frame: the key covers
/// the closed packet-number range `[from, until]`, or stays current until
/// superseded when `until` is 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct McKeyUpdate {
    pub from_packet_number: u64,
    pub until_packet_number: u64,
    pub key: Vec<u8>,
}

impl McKeyUpdate {
    pub fn from_bytes(b: &mut octets::Octets) -> Result<McKeyUpdate> {
        Ok(McKeyUpdate {
            from_packet_number: b.get_varint()?,
            until_packet_number: b.get_varint()?,
            key: b.get_bytes_with_varint_length()?.to_vec(),
        })
    }

    pub fn to_bytes(&self, b: &mut octets::OctetsMut) -> Result<()> {
        b.put_varint(self.from_packet_number)?;
        b.put_varint(self.until_packet_number)?;
        b.put_varint(self.key.len() as u64)?;
        b.put_bytes(&self.key)?;

        Ok(())
    }
}

/// Multicast channel announcement information.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct McChannelInfo {
    /// Replaces the Connection ID for multicast.
    pub channel_id: Vec<u8>,

    /// Set to `true` for an IPv6 multicast group, `false` for IPv4.
    pub is_ipv6: bool,

    /// IP address of the multicast source (IPv4 only WIP).
    pub source_ip: [u8; 4],

    /// IP address of the multicast group (IPv4 only WIP).
    pub group_ip: [u8; 4],

    /// UDP port of the multicast group.
    pub udp_port: u16,

    /// AEAD algorithm protecting the packet headers.
    pub header_algo: Algorithm,

    /// Header protection key, shared by all key epochs of the channel.
    pub header_key: Vec<u8>,

    /// AEAD algorithm protecting the packet payloads.
    pub algo: Algorithm,

    /// Hash algorithm identifier for source authentication.
    pub hash_algorithm: u64,
}

impl McChannelInfo {
    /// Builds channel information from a received MC_CHANNEL_ANNOUNCE frame.
    pub fn from_announce(frame: &Frame) -> Result<McChannelInfo> {
        match frame {
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
                if channel_id.is_empty() {
                    return Err(Error::Multicast(McError::McAnnounce));
                }

                Ok(McChannelInfo {
                    channel_id: channel_id.clone(),
                    is_ipv6: *is_ipv6 != 0,
                    source_ip: *source_ip,
                    group_ip: *group_ip,
                    udp_port: *udp_port,
                    header_algo: *header_algo,
                    header_key: header_key.clone(),
                    algo: *algo,
                    hash_algorithm: *hash_algorithm,
                })
            },

            _ => Err(Error::Multicast(McError::McAnnounce)),
        }
    }

    /// Builds the MC_CHANNEL_ANNOUNCE frame advertising this channel.
    pub fn to_announce(&self) -> Frame {
        Frame::McChannelAnnounce {
            channel_id: self.channel_id.clone(),
            is_ipv6: self.is_ipv6 as u8,
            source_ip: self.source_ip,
            group_ip: self.group_ip,
            udp_port: self.udp_port,
            header_algo: self.header_algo,
            header_key: self.header_key.clone(),
            algo: self.algo,
            hash_algorithm: self.hash_algorithm,
        }
    }
}

/// Per-channel state of one endpoint: announce data, membership state
/// machine and the key-range decryption engine.
pub struct McChannel {
    info: McChannelInfo,

    role: McRole,

    decrypter: McDecrypter,

    /// Sequence number of the last applied MC_CHANNEL_PROPERTIES frame.
    last_properties_sn: Option<u64>,

    /// Sequence number of the last applied MC_CHANNEL_KEY frame.
    last_key_sn: Option<u64>,

    /// Sequence number of the next MC_CLIENT_CHANNEL_STATE / MC_CHANNEL_JOIN
    /// frame this endpoint emits.
    channel_state_sn: u64,

    /// Maximum data rate of the channel (Kibps), from the last properties.
    max_rate: Option<u64>,

    /// Maximum idle time of the channel (ms), from the last properties.
    max_idle_time: Option<u64>,

    /// Number of packets covered by a single ACK bundle.
    ack_bundle_size: Option<u64>,

    /// Last packet number the member may still process, from a received
    /// MC_CHANNEL_LEAVE frame.
    leave_after: Option<u64>,
}

impl McChannel {
    /// Creates the channel state for the given role.
    pub fn new(info: McChannelInfo, role: McRole) -> Result<McChannel> {
        let mut decrypter = McDecrypter::new(info.algo);

        if !info.header_key.is_empty() {
            decrypter
                .set_header_protection_key(info.header_algo, &info.header_key)?;
        }

        Ok(McChannel {
            info,
            role,
            decrypter,
            last_properties_sn: None,
            last_key_sn: None,
            channel_state_sn: 0,
            max_rate: None,
            max_idle_time: None,
            ack_bundle_size: None,
            leave_after: None,
        })
    }

    #[inline]
    pub fn channel_id(&self) -> &[u8] {
        &self.info.channel_id
    }

    #[inline]
    pub fn info(&self) -> &McChannelInfo {
        &self.info
    }

    #[inline]
    pub fn role(&self) -> McRole {
        self.role
    }

    #[inline]
    pub fn max_rate(&self) -> Option<u64> {
        self.max_rate
    }

    #[inline]
    pub fn max_idle_time(&self) -> Option<u64> {
        self.max_idle_time
    }

    #[inline]
    pub fn ack_bundle_size(&self) -> Option<u64> {
        self.ack_bundle_size
    }

    /// Last packet number this member may still process after an eviction,
    /// if the server sent one.
    #[inline]
    pub fn leave_after_packet_number(&self) -> Option<u64> {
        self.leave_after
    }

    /// Returns a reference to the key-range decryption engine.
    #[inline]
    pub fn decrypter(&self) -> &McDecrypter {
        &self.decrypter
    }

    /// Returns a mutable reference to the key-range decryption engine, e.g.
    /// to install key material directly during channel setup.
    #[inline]
    pub fn decrypter_mut(&mut self) -> &mut McDecrypter {
        &mut self.decrypter
    }

    /// Sets the member status following the state machine.
    ///
    /// Returns an error if the move is invalid for the current status.
    pub fn update_client_state(
        &mut self, action: McClientAction,
    ) -> Result<McClientStatus> {
        let (is_server, current_status) = match self.role {
            McRole::Client(status) => (false, status),
            McRole::ServerUnicast(status) => (true, status),
            _ =>
                return Err(Error::Multicast(McError::McInvalidRole(self.role))),
        };

        let new_status = match (current_status, action) {
            (McClientStatus::Unaware, McClientAction::Notify) =>
                McClientStatus::AwareUnjoined,

            (McClientStatus::AwareUnjoined, McClientAction::Join)
                if is_server =>
                McClientStatus::JoinedNoKey,

            (
                McClientStatus::AwareUnjoined |
                McClientStatus::DeclinedJoin |
                McClientStatus::Left,
                McClientAction::Join,
            ) => McClientStatus::WaitingToJoin,

            (
                McClientStatus::AwareUnjoined | McClientStatus::WaitingToJoin,
                McClientAction::DeclineJoin,
            ) => McClientStatus::DeclinedJoin,

            (
                McClientStatus::WaitingToJoin |
                McClientStatus::JoinedNoKey |
                McClientStatus::JoinedAndKey,
                McClientAction::DecryptionKey,
            ) => McClientStatus::JoinedAndKey,

            (
                McClientStatus::JoinedNoKey | McClientStatus::JoinedAndKey,
                McClientAction::Leave,
            ) if is_server => McClientStatus::Left,

            (
                McClientStatus::JoinedNoKey | McClientStatus::JoinedAndKey,
                McClientAction::Leave,
            ) => McClientStatus::Leaving(false),

            (McClientStatus::Leaving(_), McClientAction::Leave) =>
                McClientStatus::Left,

            _ => return Err(Error::Multicast(McError::McInvalidAction)),
        };

        trace!(
            "channel {:?} status {:?} -> {:?} on {:?}",
            self.info.channel_id,
            current_status,
            new_status,
            action
        );

        self.role = if is_server {
            McRole::ServerUnicast(new_status)
        } else {
            McRole::Client(new_status)
        };

        Ok(new_status)
    }

    /// Produces the MC_CHANNEL_JOIN frame asking to join the channel.
    ///
    /// Only valid for a client that is aware of the channel and not a
    /// member yet.
    pub fn join(&mut self, limits_sn: u64) -> Result<Frame> {
        if !matches!(self.role, McRole::Client(_)) {
            return Err(Error::Multicast(McError::McInvalidRole(self.role)));
        }

        self.update_client_state(McClientAction::Join)?;
        self.channel_state_sn += 1;

        Ok(Frame::McChannelJoin {
            channel_id: self.info.channel_id.clone(),
            limits_sn,
            channel_state_sn: self.channel_state_sn,
            properties_sn: self.last_properties_sn.unwrap_or(0),
        })
    }

    /// Produces the MC_CLIENT_CHANNEL_STATE frame notifying the server that
    /// the client leaves the channel.
    pub fn leave(&mut self, reason: u64) -> Result<Frame> {
        if !matches!(self.role, McRole::Client(_)) {
            return Err(Error::Multicast(McError::McInvalidRole(self.role)));
        }

        if let McClientStatus::Leaving(_) =
            self.update_client_state(McClientAction::Leave)?
        {
            self.role = McRole::Client(McClientStatus::Leaving(true));
        }
        self.channel_state_sn += 1;

        Ok(Frame::McClientChannelState {
            channel_id: self.info.channel_id.clone(),
            channel_state_sn: self.channel_state_sn,
            state: McClientState::Left,
            reason,
        })
    }

    /// Applies a control frame to this channel.
    ///
    /// MC_CHANNEL_ANNOUNCE and MC_CHANNEL_RETIRE are handled by the
    /// [`McChannelRegistry`] and rejected here.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.channel_id() != Some(self.info.channel_id.as_slice()) {
            return Err(Error::Multicast(McError::McUnknownChannel));
        }

        match frame {
            Frame::McChannelAnnounce { .. } =>
                Err(Error::Multicast(McError::McChannelExists)),

            Frame::McChannelProperties {
                properties_sn,
                key_update,
                max_rate,
                max_idle_time,
                ack_bundle_size,
                ..
            } => {
                if self.last_properties_sn >= Some(*properties_sn) {
                    return Err(Error::Multicast(McError::McStaleSequence));
                }

                if let Some(key_update) = key_update {
                    self.install_key(
                        &key_update.key,
                        key_update.from_packet_number,
                        key_update.until_packet_number,
                    )?;
                }

                if max_rate.is_some() {
                    self.max_rate = *max_rate;
                }

                if max_idle_time.is_some() {
                    self.max_idle_time = *max_idle_time;
                }

                if ack_bundle_size.is_some() {
                    self.ack_bundle_size = *ack_bundle_size;
                }

                self.last_properties_sn = Some(*properties_sn);

                Ok(())
            },

            Frame::McChannelKey {
                channel_key_sn,
                from_packet_number,
                key,
                ..
            } => {
                if self.last_key_sn >= Some(*channel_key_sn) {
                    return Err(Error::Multicast(McError::McStaleSequence));
                }

                self.install_key(key, *from_packet_number, 0)?;

                self.last_key_sn = Some(*channel_key_sn);

                Ok(())
            },

            Frame::McChannelJoin { .. } => match self.role {
                McRole::ServerUnicast(_) => {
                    self.update_client_state(McClientAction::Join)?;
                    Ok(())
                },

                _ => Err(Error::Multicast(McError::McInvalidRole(self.role))),
            },

            Frame::McChannelLeave {
                after_packet_number, ..
            } => {
                self.update_client_state(McClientAction::Leave)?;
                self.leave_after = Some(*after_packet_number);
                Ok(())
            },

            Frame::McChannelRetire { .. } =>
                Err(Error::Multicast(McError::McInvalidAction)),

            Frame::McClientChannelState { state, .. } => match self.role {
                McRole::ServerUnicast(_) => {
                    let action = match state {
                        McClientState::Join => McClientAction::Join,
                        McClientState::DeclinedJoin =>
                            McClientAction::DeclineJoin,
                        McClientState::Left => McClientAction::Leave,
                    };

                    self.update_client_state(action)?;
                    Ok(())
                },

                _ => Err(Error::Multicast(McError::McInvalidRole(self.role))),
            },

            Frame::McClientLimits { .. } =>
                Err(Error::Multicast(McError::McInvalidAction)),
        }
    }

    /// Decrypts a multicast packet payload in place and returns the
    /// plaintext length. Only clients decrypt channel traffic.
    pub fn decrypt_packet(
        &self, packet_number: u64, ad: &[u8], buf: &mut [u8],
    ) -> Result<usize> {
        if !matches!(self.role, McRole::Client(_)) {
            return Err(Error::Multicast(McError::McInvalidRole(self.role)));
        }

        // An eviction bounds the packets the member may still process.
        if matches!(self.leave_after, Some(after) if packet_number > after) {
            return Err(Error::Multicast(McError::McNoKey));
        }

        self.decrypter.decrypt_packet(packet_number, ad, buf)
    }

    /// Drops key epochs that only cover packets below `before_packet_number`.
    pub fn discard_obsolete_keys(&mut self, before_packet_number: u64) {
        self.decrypter.discard_obsolete_keys(before_packet_number);
    }

    fn install_key(&mut self, secret: &[u8], from: u64, until: u64) -> Result<()> {
        if secret.is_empty() {
            return Err(Error::Multicast(McError::McInvalidSymKey));
        }

        self.decrypter.set_secret_for_packet_range(secret, from, until)?;

        // Receiving a key completes the join on the client side. Keys pushed
        // before the client asked to join are installed but do not move the
        // state machine.
        if matches!(
            self.role,
            McRole::Client(
                McClientStatus::WaitingToJoin |
                    McClientStatus::JoinedNoKey |
                    McClientStatus::JoinedAndKey
            ) | McRole::ServerUnicast(
                McClientStatus::JoinedNoKey | McClientStatus::JoinedAndKey
            )
        ) {
            self.update_client_state(McClientAction::DecryptionKey)?;
        }

        Ok(())
    }
}

/// Client limits advertised in an MC_CLIENT_LIMITS frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct McClientLimits {
    pub capabilities: u64,
    pub max_aggregate_rate: u64,
    pub max_channel_ids: u64,
    pub max_joined: u64,
}

impl McClientLimits {
    #[inline]
    pub fn ipv4_support(&self) -> bool {
        self.capabilities & MC_LIMITS_IPV4 != 0
    }

    #[inline]
    pub fn ipv6_support(&self) -> bool {
        self.capabilities & MC_LIMITS_IPV6 != 0
    }

    #[inline]
    pub fn ssm_support(&self) -> bool {
        self.capabilities & MC_LIMITS_SSM != 0
    }

    #[inline]
    pub fn asm_support(&self) -> bool {
        self.capabilities & MC_LIMITS_ASM != 0
    }
}

/// The set of multicast channels known to one endpoint.
///
/// Control frames are routed to the channel they name; MC_CHANNEL_ANNOUNCE
/// creates a channel and MC_CHANNEL_RETIRE removes it.
#[derive(Default)]
pub struct McChannelRegistry {
    channels: HashMap<Vec<u8>, McChannel>,

    client_limits: Option<McClientLimits>,

    last_limits_sn: Option<u64>,
}

impl McChannelRegistry {
    pub fn new() -> McChannelRegistry {
        McChannelRegistry::default()
    }

    /// Adds a locally created channel, e.g. on the server before announcing
    /// it to clients.
    pub fn insert(&mut self, channel: McChannel) -> Result<()> {
        if self.channels.contains_key(channel.channel_id()) {
            return Err(Error::Multicast(McError::McChannelExists));
        }

        debug!("registering multicast channel {:?}", channel.channel_id());

        self.channels
            .insert(channel.channel_id().to_vec(), channel);

        Ok(())
    }

    /// Removes a channel and returns its state.
    pub fn retire(&mut self, channel_id: &[u8]) -> Result<McChannel> {
        debug!("retiring multicast channel {:?}", channel_id);

        self.channels
            .remove(channel_id)
            .ok_or(Error::Multicast(McError::McUnknownChannel))
    }

    #[inline]
    pub fn channel(&self, channel_id: &[u8]) -> Option<&McChannel> {
        self.channels.get(channel_id)
    }

    #[inline]
    pub fn channel_mut(&mut self, channel_id: &[u8]) -> Option<&mut McChannel> {
        self.channels.get_mut(channel_id)
    }

    #[inline]
    pub fn client_limits(&self) -> Option<McClientLimits> {
        self.client_limits
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Routes a control frame to the channel it refers to.
    ///
    /// Announces create a new client-side channel, retires remove the
    /// channel, client limits apply to the endpoint as a whole.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<()> {
        match frame {
            Frame::McChannelAnnounce { .. } => {
                let info = McChannelInfo::from_announce(frame)?;

                if self.channels.contains_key(&info.channel_id) {
                    return Err(Error::Multicast(McError::McChannelExists));
                }

                let mut channel = McChannel::new(
                    info,
                    McRole::Client(McClientStatus::Unaware),
                )?;
                channel.update_client_state(McClientAction::Notify)?;

                debug!(
                    "announced multicast channel {:?}",
                    channel.channel_id()
                );

                self.channels
                    .insert(channel.channel_id().to_vec(), channel);

                Ok(())
            },

            Frame::McChannelRetire { channel_id } => {
                self.retire(channel_id)?;

                Ok(())
            },

            Frame::McClientLimits {
                client_limits_sn,
                capabilities,
                max_aggregate_rate,
                max_channel_ids,
                max_joined,
            } => {
                if self.last_limits_sn >= Some(*client_limits_sn) {
                    return Err(Error::Multicast(McError::McStaleSequence));
                }

                self.client_limits = Some(McClientLimits {
                    capabilities: *capabilities,
                    max_aggregate_rate: *max_aggregate_rate,
                    max_channel_ids: *max_channel_ids,
                    max_joined: *max_joined,
                });
                self.last_limits_sn = Some(*client_limits_sn);

                Ok(())
            },

            _ => {
                let channel_id =
                    frame.channel_id().ok_or(Error::InvalidFrame)?;

                self.channels
                    .get_mut(channel_id)
                    .ok_or(Error::Multicast(McError::McUnknownChannel))?
                    .process_frame(frame)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::crypto::Seal;

    fn test_info() -> McChannelInfo {
        McChannelInfo {
            channel_id: vec![0xca, 0xfe, 0x00, 0x01],
            is_ipv6: false,
            source_ip: [10, 0, 0, 1],
            group_ip: [232, 1, 1, 7],
            udp_port: 7878,
            header_algo: Algorithm::AES128_GCM,
            header_key: vec![0x42; 16],
            algo: Algorithm::AES128_GCM,
            hash_algorithm: 0,
        }
    }

    #[test]
    fn client_state_machine() {
        let mut channel = McChannel::new(
            test_info(),
            McRole::Client(McClientStatus::Unaware),
        )
        .unwrap();

        assert_eq!(
            channel.update_client_state(McClientAction::Notify),
            Ok(McClientStatus::AwareUnjoined)
        );
        assert_eq!(
            channel.update_client_state(McClientAction::Join),
            Ok(McClientStatus::WaitingToJoin)
        );
        assert_eq!(
            channel.update_client_state(McClientAction::DecryptionKey),
            Ok(McClientStatus::JoinedAndKey)
        );
        assert_eq!(
            channel.update_client_state(McClientAction::Leave),
            Ok(McClientStatus::Leaving(false))
        );
        assert_eq!(
            channel.update_client_state(McClientAction::Leave),
            Ok(McClientStatus::Left)
        );

        // Rejoining after leaving is allowed.
        assert_eq!(
            channel.update_client_state(McClientAction::Join),
            Ok(McClientStatus::WaitingToJoin)
        );

        // Invalid move.
        assert_eq!(
            channel.update_client_state(McClientAction::Notify),
            Err(Error::Multicast(McError::McInvalidAction))
        );
    }

    #[test]
    fn channel_source_has_no_client_state() {
        let mut channel =
            McChannel::new(test_info(), McRole::ChannelSource).unwrap();

        assert_eq!(
            channel.update_client_state(McClientAction::Join),
            Err(Error::Multicast(McError::McInvalidRole(
                McRole::ChannelSource
            )))
        );
    }

    #[test]
    fn registry_announce_and_retire() {
        let mut registry = McChannelRegistry::new();
        let info = test_info();

        registry.process_frame(&info.to_announce()).unwrap();
        assert_eq!(registry.len(), 1);

        let channel = registry.channel(&info.channel_id).unwrap();
        assert_eq!(
            channel.role(),
            McRole::Client(McClientStatus::AwareUnjoined)
        );

        // Duplicate announce is rejected.
        assert_eq!(
            registry.process_frame(&info.to_announce()),
            Err(Error::Multicast(McError::McChannelExists))
        );

        registry
            .process_frame(&Frame::McChannelRetire {
                channel_id: info.channel_id.clone(),
            })
            .unwrap();
        assert!(registry.is_empty());

        // Frames for unknown channels are rejected.
        assert_eq!(
            registry.process_frame(&Frame::McChannelKey {
                channel_id: info.channel_id,
                channel_key_sn: 1,
                from_packet_number: 0,
                key: vec![1; 32],
            }),
            Err(Error::Multicast(McError::McUnknownChannel))
        );
    }

    #[test]
    fn client_join_and_decrypt_flow() {
        let mut registry = McChannelRegistry::new();
        let info = test_info();
        let secret = [0x5e; 32];

        registry.process_frame(&info.to_announce()).unwrap();

        let channel = registry.channel_mut(&info.channel_id).unwrap();
        let join = channel.join(1).unwrap();
        assert!(matches!(join, Frame::McChannelJoin { .. }));
        assert_eq!(
            channel.role(),
            McRole::Client(McClientStatus::WaitingToJoin)
        );

        // The server pushes the channel key, completing the join.
        registry
            .process_frame(&Frame::McChannelKey {
                channel_id: info.channel_id.clone(),
                channel_key_sn: 1,
                from_packet_number: 0,
                key: secret.to_vec(),
            })
            .unwrap();

        let channel = registry.channel(&info.channel_id).unwrap();
        assert_eq!(
            channel.role(),
            McRole::Client(McClientStatus::JoinedAndKey)
        );

        // A packet sealed by the source with the same secret decrypts.
        let seal = Seal::from_secret(info.algo, &secret).unwrap();
        let mut buf = [0u8; 64];
        buf[..4].copy_from_slice(b"data");
        let written = seal.seal_with_u64_counter(7, b"hdr", &mut buf, 4).unwrap();

        let len = channel
            .decrypt_packet(7, b"hdr", &mut buf[..written])
            .unwrap();
        assert_eq!(&buf[..len], b"data");
    }

    #[test]
    fn stale_sequence_numbers_are_rejected() {
        let mut registry = McChannelRegistry::new();
        let info = test_info();

        registry.process_frame(&info.to_announce()).unwrap();

        let properties = Frame::McChannelProperties {
            channel_id: info.channel_id.clone(),
            properties_sn: 2,
            key_update: None,
            max_rate: Some(10_000),
            max_idle_time: None,
            ack_bundle_size: None,
        };

        registry.process_frame(&properties).unwrap();

        let channel = registry.channel(&info.channel_id).unwrap();
        assert_eq!(channel.max_rate(), Some(10_000));

        // Re-delivery and older frames are both stale.
        assert_eq!(
            registry.process_frame(&properties),
            Err(Error::Multicast(McError::McStaleSequence))
        );
        assert_eq!(
            registry.process_frame(&Frame::McChannelProperties {
                channel_id: info.channel_id.clone(),
                properties_sn: 1,
                key_update: None,
                max_rate: Some(500),
                max_idle_time: None,
                ack_bundle_size: None,
            }),
            Err(Error::Multicast(McError::McStaleSequence))
        );

        // The newer value survives.
        let channel = registry.channel(&info.channel_id).unwrap();
        assert_eq!(channel.max_rate(), Some(10_000));
    }

    #[test]
    fn client_leave_flow() {
        let mut channel = McChannel::new(
            test_info(),
            McRole::Client(McClientStatus::JoinedAndKey),
        )
        .unwrap();

        let frame = channel.leave(MC_REASON_HIGH_LOSS).unwrap();
        match frame {
            Frame::McClientChannelState { state, reason, .. } => {
                assert_eq!(state, McClientState::Left);
                assert_eq!(reason, MC_REASON_HIGH_LOSS);
            },

            f => panic!("unexpected frame {:?}", f),
        }
        assert_eq!(
            channel.role(),
            McRole::Client(McClientStatus::Leaving(true))
        );

        // Server acknowledges with MC_CHANNEL_LEAVE.
        channel
            .process_frame(&Frame::McChannelLeave {
                channel_id: channel.channel_id().to_vec(),
                channel_state_sn: 2,
                after_packet_number: 100,
            })
            .unwrap();
        assert_eq!(channel.role(), McRole::Client(McClientStatus::Left));
    }

    #[test]
    fn mixed_header_and_payload_algorithms() {
        let mut info = test_info();
        info.header_algo = Algorithm::AES128_GCM;
        info.header_key = vec![0x42; 16];
        info.algo = Algorithm::AES256_GCM;

        let channel =
            McChannel::new(info, McRole::Client(McClientStatus::Unaware))
                .unwrap();

        assert_eq!(channel.decrypter().algorithm(), Algorithm::AES256_GCM);
        assert_eq!(
            channel.decrypter().header_algorithm(),
            Some(Algorithm::AES128_GCM)
        );
        assert!(channel
            .decrypter()
            .header_protection_mask(&[0; 16])
            .is_ok());
    }

    #[test]
    fn eviction_bounds_decryption() {
        let mut channel = McChannel::new(
            test_info(),
            McRole::Client(McClientStatus::JoinedNoKey),
        )
        .unwrap();
        let secret = [0x5e; 32];

        channel
            .process_frame(&Frame::McChannelKey {
                channel_id: channel.channel_id().to_vec(),
                channel_key_sn: 1,
                from_packet_number: 0,
                key: secret.to_vec(),
            })
            .unwrap();

        channel
            .process_frame(&Frame::McChannelLeave {
                channel_id: channel.channel_id().to_vec(),
                channel_state_sn: 2,
                after_packet_number: 100,
            })
            .unwrap();
        assert_eq!(channel.leave_after_packet_number(), Some(100));

        let seal = Seal::from_secret(Algorithm::AES128_GCM, &secret).unwrap();

        // Packets up to the eviction bound still decrypt.
        let mut buf = [0u8; 64];
        buf[..4].copy_from_slice(b"data");
        let written =
            seal.seal_with_u64_counter(100, b"hdr", &mut buf, 4).unwrap();
        let len = channel
            .decrypt_packet(100, b"hdr", &mut buf[..written])
            .unwrap();
        assert_eq!(&buf[..len], b"data");

        // Packets past it are refused even though a key epoch covers them.
        let mut buf = [0u8; 64];
        buf[..4].copy_from_slice(b"late");
        let written =
            seal.seal_with_u64_counter(101, b"hdr", &mut buf, 4).unwrap();
        assert_eq!(
            channel.decrypt_packet(101, b"hdr", &mut buf[..written]),
            Err(Error::Multicast(McError::McNoKey))
        );
    }

    #[test]
    fn server_tracks_client_membership() {
        let mut channel = McChannel::new(
            test_info(),
            McRole::ServerUnicast(McClientStatus::AwareUnjoined),
        )
        .unwrap();

        channel
            .process_frame(&Frame::McChannelJoin {
                channel_id: channel.channel_id().to_vec(),
                limits_sn: 1,
                channel_state_sn: 1,
                properties_sn: 0,
            })
            .unwrap();
        assert_eq!(
            channel.role(),
            McRole::ServerUnicast(McClientStatus::JoinedNoKey)
        );

        channel
            .process_frame(&Frame::McClientChannelState {
                channel_id: channel.channel_id().to_vec(),
                channel_state_sn: 2,
                state: McClientState::Left,
                reason: MC_REASON_UNSPECIFIED,
            })
            .unwrap();
        assert_eq!(
            channel.role(),
            McRole::ServerUnicast(McClientStatus::Left)
        );
    }

    #[test]
    fn client_limits_routing() {
        let mut registry = McChannelRegistry::new();

        registry
            .process_frame(&Frame::McClientLimits {
                client_limits_sn: 1,
                capabilities: MC_LIMITS_IPV4 | MC_LIMITS_SSM,
                max_aggregate_rate: 20_000,
                max_channel_ids: 16,
                max_joined: 4,
            })
            .unwrap();

        let limits = registry.client_limits().unwrap();
        assert!(limits.ipv4_support());
        assert!(!limits.ipv6_support());
        assert!(limits.ssm_support());
        assert!(!limits.asm_support());

        assert_eq!(
            registry.process_frame(&Frame::McClientLimits {
                client_limits_sn: 1,
                capabilities: MC_LIMITS_IPV4,
                max_aggregate_rate: 0,
                max_channel_ids: 0,
                max_joined: 0,
            }),
            Err(Error::Multicast(McError::McStaleSequence))
        );
    }
}
