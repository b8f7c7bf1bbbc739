use serde::{Deserialize, Serialize};

use crate::errors::ProtocolViolation;

/// The kinds of GPU-bound resources the cluster synchronizes.
///
/// [`AllResources`](Self::AllResources) is a wildcard that only appears in
/// request messages ("send me everything you have").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResourceKind {
    Texture = 0,
    Mesh = 1,
    GpuProgram = 2,
    Font = 3,
    AllResources = 4,
}

impl ResourceKind {
    /// Every concrete (non-wildcard) kind, in wire order.
    pub const CONCRETE: [ResourceKind; 4] = [
        ResourceKind::Texture,
        ResourceKind::Mesh,
        ResourceKind::GpuProgram,
        ResourceKind::Font,
    ];

    #[inline]
    #[must_use]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self, ProtocolViolation> {
        match byte {
            0 => Ok(Self::Texture),
            1 => Ok(Self::Mesh),
            2 => Ok(Self::GpuProgram),
            3 => Ok(Self::Font),
            4 => Ok(Self::AllResources),
            _ => Err(ProtocolViolation::UnknownResourceKind { byte }),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_wildcard(self) -> bool {
        matches!(self, Self::AllResources)
    }

    /// Short lowercase label used in log lines.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Texture => "texture",
            Self::Mesh => "mesh",
            Self::GpuProgram => "program",
            Self::Font => "font",
            Self::AllResources => "all",
        }
    }
}

/// Internal control messages multiplexed over the package id channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InternalMessageType {
    /// Coordinator -> worker: `[name_len: u64 LE][name][payload]`.
    ResourceTransfer = 0,
    /// Coordinator -> worker: evict the named resource.
    ResourceReleaseTransfer = 1,
    /// Worker -> coordinator: please send me this resource.
    ResourceRequest = 2,
}

impl InternalMessageType {
    pub const ALL: [InternalMessageType; 3] = [
        InternalMessageType::ResourceTransfer,
        InternalMessageType::ResourceReleaseTransfer,
        InternalMessageType::ResourceRequest,
    ];

    #[inline]
    #[must_use]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self, ProtocolViolation> {
        match byte {
            0 => Ok(Self::ResourceTransfer),
            1 => Ok(Self::ResourceReleaseTransfer),
            2 => Ok(Self::ResourceRequest),
            _ => Err(ProtocolViolation::UnknownMessageType { byte }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_bytes_are_stable() {
        for kind in ResourceKind::CONCRETE {
            assert_eq!(ResourceKind::from_byte(kind.to_byte()), Ok(kind));
        }
        assert_eq!(ResourceKind::from_byte(4), Ok(ResourceKind::AllResources));
        assert_eq!(
            ResourceKind::from_byte(9),
            Err(ProtocolViolation::UnknownResourceKind { byte: 9 })
        );
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        assert_eq!(
            InternalMessageType::from_byte(0x7f),
            Err(ProtocolViolation::UnknownMessageType { byte: 0x7f })
        );
    }
}
