// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Central error type for the post-processing chain.
//!
//! Only resource allocation and handle misuse are errors here. Out of range
//! effect parameters are clamped and unknown lookups yield `None`, so they
//! never reach this enum.

use crate::gpu::{ColorFormat, GpuResource, ResourceKind, ViewHandle};

/// Errors raised while building or running an effect chain
#[derive(thiserror::Error, Debug)]
pub enum PostFxError {
    /// The device could not create a buffer, texture, pipeline...
    #[error("failed to allocate {kind} '{label}': {reason}")]
    Allocation {
        kind: ResourceKind,
        label: String,
        reason: String,
    },

    /// A handle was used after it was released, or never existed
    #[error("invalid gpu handle: {0:?}")]
    InvalidHandle(GpuResource),

    /// A pass would sample the view it renders into
    #[error("'{label}' would sample and write {view:?} in the same pass")]
    InputAliasesTarget { label: String, view: ViewHandle },

    /// A pipeline was built for another colour format than its target view
    #[error("'{label}' renders {expected:?} but the target view is {actual:?}")]
    FormatMismatch {
        label: String,
        expected: ColorFormat,
        actual: ColorFormat,
    },

    #[error("effect '{0}' was used after destroy")]
    EffectDestroyed(String),

    /// The chain lost its render targets (a resize failed half way)
    #[error("effect chain '{0}' has no render targets")]
    MissingRenderTargets(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("logging setup error: {0}")]
    Logging(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PostFxError {
    pub fn allocation<L: ToString, R: ToString>(kind: ResourceKind, label: L, reason: R) -> Self {
        PostFxError::Allocation {
            kind,
            label: label.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn config<T: ToString>(msg: T) -> Self {
        PostFxError::Config(msg.to_string())
    }
}

impl From<toml::de::Error> for PostFxError {
    fn from(err: toml::de::Error) -> Self {
        PostFxError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PostFxError {
    fn from(err: serde_json::Error) -> Self {
        PostFxError::Config(err.to_string())
    }
}

/// Result type alias for post-processing operations
pub type PostFxResult<T> = Result<T, PostFxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::BufferHandle;

    #[test]
    fn allocation_error_names_kind_and_label() {
        let err = PostFxError::allocation(ResourceKind::Texture, "ping", "out of memory");
        assert_eq!(
            err.to_string(),
            "failed to allocate texture 'ping': out of memory"
        );
    }

    #[test]
    fn invalid_handle_mentions_resource() {
        let err = PostFxError::InvalidHandle(GpuResource::Buffer(BufferHandle::from_raw(7)));
        assert!(err.to_string().contains("Buffer"));
    }

    #[test]
    fn aliasing_error_names_the_view() {
        let err = PostFxError::InputAliasesTarget {
            label: "fxaa".to_string(),
            view: ViewHandle::from_raw(2),
        };
        assert_eq!(
            err.to_string(),
            "'fxaa' would sample and write ViewHandle(2) in the same pass"
        );
    }

    #[test]
    fn toml_errors_become_config_errors() {
        let err: PostFxError = toml::from_str::<toml::Value>("a = ").unwrap_err().into();
        assert!(matches!(err, PostFxError::Config(_)));
    }
}
