//! Shareable resource types.
//!
//! The GPU upload itself happens outside Mural. What the cluster moves around
//! is the byte payload the uploader consumes, wrapped in one type per
//! [`ResourceKind`].

use mural_core::errors::{MuralError, Result};
use mural_core::ResourceKind;

/// A resource that can be reproduced on another node from its payload.
pub trait SharedResource: Send + Sync + 'static {
    /// The concrete kind this type is cached under.
    const KIND: ResourceKind;

    /// Bytes that reconstruct this resource on another node.
    fn payload(&self) -> &[u8];
}

/// Construction of a resource from a received or loaded payload.
pub trait FromPayload: Sized {
    fn from_payload(name: &str, bytes: Vec<u8>) -> Result<Self>;
}

macro_rules! byte_resource {
    ($(#[$meta:meta])* $ty:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $ty {
            label: String,
            bytes: Vec<u8>,
        }

        impl $ty {
            #[must_use]
            pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
                Self {
                    label: label.into(),
                    bytes,
                }
            }

            #[inline]
            #[must_use]
            pub fn label(&self) -> &str {
                &self.label
            }

            #[inline]
            #[must_use]
            pub fn bytes(&self) -> &[u8] {
                &self.bytes
            }
        }

        impl SharedResource for $ty {
            const KIND: ResourceKind = $kind;

            fn payload(&self) -> &[u8] {
                &self.bytes
            }
        }
    };
}

byte_resource!(
    /// Encoded image data handed to the texture uploader.
    TextureData => ResourceKind::Texture
);

byte_resource!(
    /// Serialized vertex/index streams handed to the mesh uploader.
    MeshData => ResourceKind::Mesh
);

byte_resource!(
    /// Shader program source.
    ProgramData => ResourceKind::GpuProgram
);

byte_resource!(
    /// Font file contents (glyph atlas generation happens downstream).
    FontData => ResourceKind::Font
);

impl ProgramData {
    /// The program source as text.
    #[must_use]
    pub fn source(&self) -> &str {
        // Validated in `from_payload`.
        std::str::from_utf8(&self.bytes).unwrap_or_default()
    }
}

impl FromPayload for TextureData {
    fn from_payload(name: &str, bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(MuralError::load(name, "texture payload is empty"));
        }
        Ok(Self::new(name, bytes))
    }
}

impl FromPayload for MeshData {
    fn from_payload(name: &str, bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(MuralError::load(name, "mesh payload is empty"));
        }
        Ok(Self::new(name, bytes))
    }
}

impl FromPayload for ProgramData {
    fn from_payload(name: &str, bytes: Vec<u8>) -> Result<Self> {
        if let Err(e) = std::str::from_utf8(&bytes) {
            return Err(MuralError::load(
                name,
                format!("program source is not valid UTF-8: {e}"),
            ));
        }
        Ok(Self::new(name, bytes))
    }
}

impl FromPayload for FontData {
    fn from_payload(name: &str, bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(MuralError::load(name, "font payload is empty"));
        }
        Ok(Self::new(name, bytes))
    }
}
