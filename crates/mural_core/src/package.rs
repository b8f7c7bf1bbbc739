//! Package Id Codec
//!
//! Every transport message carries a single 32-bit package id. Mural uses it to
//! multiplex internal control traffic and opaque application payloads over one
//! channel.
//!
//! | Bits    | Internal message        | User data                 |
//! |---------|-------------------------|---------------------------|
//! | 0..8    | [`InternalMessageType`] | channel id (low byte)     |
//! | 8..16   | [`ResourceKind`]        | channel id (high byte)    |
//! | 16..32  | user id                 | `0xFFFF` sentinel         |
//!
//! The sentinel in the upper half is what tells the two apart, so internal
//! messages may carry any user id except [`USER_DATA_SENTINEL`]. [`UserId`]
//! cannot hold that value, which keeps [`encode`] total.

use crate::errors::ProtocolViolation;
use crate::kind::{InternalMessageType, ResourceKind};

/// Upper 16 bits of every user-data package id.
pub const USER_DATA_SENTINEL: u16 = 0xFFFF;

/// The user id of an internal message: any `u16` except the sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(u16);

impl UserId {
    /// The id all sync traffic carries.
    pub const NONE: Self = Self(0);
    pub const MAX: Self = Self(USER_DATA_SENTINEL - 1);

    /// Returns `None` for the reserved [`USER_DATA_SENTINEL`].
    #[must_use]
    pub const fn new(raw: u16) -> Option<Self> {
        if raw == USER_DATA_SENTINEL {
            None
        } else {
            Some(Self(raw))
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for UserId {
    type Error = ProtocolViolation;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(ProtocolViolation::ReservedUserId)
    }
}

impl From<UserId> for u16 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Decoded form of a wire package id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageId {
    Internal {
        message: InternalMessageType,
        kind: ResourceKind,
        user_id: UserId,
    },
    UserChannel(u16),
}

impl PackageId {
    /// An internal message with user id 0, the form all sync traffic uses.
    #[inline]
    #[must_use]
    pub fn internal(message: InternalMessageType, kind: ResourceKind) -> Self {
        Self::Internal {
            message,
            kind,
            user_id: UserId::NONE,
        }
    }

    #[inline]
    #[must_use]
    pub fn user_channel(channel: u16) -> Self {
        Self::UserChannel(channel)
    }

    /// Packs the id into its 32-bit wire form.
    #[must_use]
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Internal {
                message,
                kind,
                user_id,
            } => {
                (u32::from(user_id.get()) << 16)
                    | (u32::from(kind.to_byte()) << 8)
                    | u32::from(message.to_byte())
            }
            Self::UserChannel(channel) => (u32::from(USER_DATA_SENTINEL) << 16) | u32::from(channel),
        }
    }

    /// Unpacks a 32-bit wire id, checking the sentinel region first.
    pub fn from_raw(raw: u32) -> Result<Self, ProtocolViolation> {
        let upper = (raw >> 16) as u16;
        if upper == USER_DATA_SENTINEL {
            return Ok(Self::UserChannel(raw as u16));
        }

        let message = InternalMessageType::from_byte((raw & 0xFF) as u8)?;
        let kind = ResourceKind::from_byte(((raw >> 8) & 0xFF) as u8)?;
        Ok(Self::Internal {
            message,
            kind,
            user_id: UserId(upper),
        })
    }

    #[inline]
    #[must_use]
    pub fn is_user_data(self) -> bool {
        matches!(self, Self::UserChannel(_))
    }
}

impl From<PackageId> for u32 {
    fn from(id: PackageId) -> Self {
        id.to_raw()
    }
}

impl TryFrom<u32> for PackageId {
    type Error = ProtocolViolation;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
    }
}

/// Packs `(type, kind, user_id)` into a wire id.
#[inline]
#[must_use]
pub fn encode(message: InternalMessageType, kind: ResourceKind, user_id: UserId) -> u32 {
    PackageId::Internal {
        message,
        kind,
        user_id,
    }
    .to_raw()
}

/// Packs an application channel id into a user-data wire id.
#[inline]
#[must_use]
pub fn encode_user(channel: u16) -> u32 {
    PackageId::UserChannel(channel).to_raw()
}

/// Unpacks a wire id.
#[inline]
pub fn decode(raw: u32) -> Result<PackageId, ProtocolViolation> {
    PackageId::from_raw(raw)
}
