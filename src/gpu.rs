// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # GPU Capability Module
//!
//! The effect chain never talks to a graphics API directly. It goes through
//! two narrow traits:
//!
//! - [`GpuDevice`]: allocates and releases resources, writes uniform buffers
//! - [`CommandEncoder`]: records one full-screen draw per effect
//!
//! Every resource is named by a typed handle (a `u64` newtype). A device hands
//! out each raw value at most once, so comparing two handles is an identity
//! check: a stale handle can never alias a resource created later.
//!
//! ```text
//! ┌──────────────────────┐      handles       ┌──────────────────────────┐
//! │  EffectChainManager  │ ─────────────────► │   GpuDevice (trait)      │
//! │  Effect::apply       │                    │   ├─ HeadlessDevice      │
//! │                      │ ── FullscreenDraw ►│   └─ WgpuDevice (wgpu)   │
//! └──────────────────────┘                    └──────────────────────────┘
//! ```
//!
//! Backends:
//! - `headless`: records calls without touching a GPU, used by tests and tools
//! - `wgpu_backend`: real `wgpu` objects, enabled with the `wgpu` feature

use crate::error::{PostFxError, PostFxResult};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;

pub mod command_list;
pub mod headless;
#[cfg(feature = "wgpu")]
pub mod wgpu_backend;

pub use command_list::CommandList;
pub use headless::HeadlessDevice;

macro_rules! gpu_handle {
    ($($(#[$meta:meta])* $name:ident => $variant:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(u64);

            impl $name {
                /// Wrap a raw id minted by a device
                pub const fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                pub const fn raw(self) -> u64 {
                    self.0
                }
            }

            impl From<$name> for GpuResource {
                fn from(handle: $name) -> Self {
                    GpuResource::$variant(handle)
                }
            }
        )*

        /// Any resource a device can release
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum GpuResource {
            $($variant($name),)*
        }

        /// Resource category, used in errors and accounting
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ResourceKind {
            $($variant,)*
        }

        impl GpuResource {
            pub fn kind(&self) -> ResourceKind {
                match self {
                    $(GpuResource::$variant(_) => ResourceKind::$variant,)*
                }
            }

            pub fn raw(&self) -> u64 {
                match self {
                    $(GpuResource::$variant(h) => h.raw(),)*
                }
            }
        }
    };
}

gpu_handle! {
    /// Colour or depth texture
    TextureHandle => Texture,
    /// Bindable / renderable view of a texture
    ViewHandle => View,
    BufferHandle => Buffer,
    BindGroupLayoutHandle => BindGroupLayout,
    PipelineLayoutHandle => PipelineLayout,
    ShaderHandle => ShaderModule,
    PipelineHandle => RenderPipeline,
    /// Concrete set of views / samplers / buffers bound to pipeline slots
    BindGroupHandle => BindGroup,
    SamplerHandle => Sampler,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Texture => "texture",
            ResourceKind::View => "texture view",
            ResourceKind::Buffer => "buffer",
            ResourceKind::BindGroupLayout => "bind group layout",
            ResourceKind::PipelineLayout => "pipeline layout",
            ResourceKind::ShaderModule => "shader module",
            ResourceKind::RenderPipeline => "render pipeline",
            ResourceKind::BindGroup => "bind group",
            ResourceKind::Sampler => "sampler",
        };
        f.write_str(s)
    }
}

/// Mints raw handle values, starting at 1 and never reusing one
#[derive(Debug)]
pub struct HandleAllocator {
    next: Cell<u64>,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self { next: Cell::new(1) }
    }

    pub fn next_raw(&self) -> u64 {
        let raw = self.next.get();
        self.next.set(raw + 1);
        raw
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Colour attachment formats usable as effect input and output
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
}

impl ColorFormat {
    /// Format picked for the ping-pong targets when HDR is requested
    pub const HDR: ColorFormat = ColorFormat::Rgba16Float;

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            ColorFormat::Rgba8Unorm
            | ColorFormat::Rgba8UnormSrgb
            | ColorFormat::Bgra8Unorm
            | ColorFormat::Bgra8UnormSrgb => 4,
            ColorFormat::Rgba16Float => 8,
            ColorFormat::Rgba32Float => 16,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ColorFormat::Rgba16Float | ColorFormat::Rgba32Float)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthFormat {
    Depth24Plus,
    Depth24PlusStencil8,
    Depth32Float,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Color(ColorFormat),
    Depth(DepthFormat),
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const RENDER_ATTACHMENT = 1 << 0;
        const TEXTURE_BINDING = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const UNIFORM = 1 << 0;
        const COPY_DST = 1 << 1;
        const COPY_SRC = 1 << 2;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BufferDesc {
    pub label: String,
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDesc {
    /// Uniform buffer writable from the cpu side
    pub fn uniform(label: &str, size: u64) -> Self {
        Self {
            label: label.to_string(),
            size,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// WGSL entry point every module of this stage must export
    pub fn entry_point(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }
}

/// What a bind group layout slot expects
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Filterable float 2d texture, fragment stage
    Texture,
    /// Filtering sampler, fragment stage
    Sampler,
    /// Uniform buffer, fragment stage
    UniformBuffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutEntry {
    pub binding: u32,
    pub kind: BindingKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingResource {
    View(ViewHandle),
    Sampler(SamplerHandle),
    Buffer(BufferHandle),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindGroupEntry {
    pub binding: u32,
    pub resource: BindingResource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct SamplerDesc {
    pub label: String,
    pub filter: FilterMode,
    pub address_mode: AddressMode,
}

/// Render pipeline for a full-screen pass
///
/// There are no vertex buffers: the vertex shader derives a covering
/// triangle from the vertex index, and the topology is always a triangle list.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderPipelineDesc {
    pub label: String,
    pub layout: PipelineLayoutHandle,
    pub vertex: ShaderHandle,
    pub fragment: ShaderHandle,
    pub target_format: ColorFormat,
}

/// One recorded full-screen draw: three vertices, no vertex buffer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FullscreenDraw {
    pub label: String,
    pub pipeline: PipelineHandle,
    pub bind_group: BindGroupHandle,
    pub target: ViewHandle,
}

/// Resource factory consumed by render targets and effects
///
/// Methods take `&self` like `wgpu::Device` does, so an encoder may hold a
/// shared borrow of the device while effects keep allocating.
/// Any failure is fatal for the calling operation and is never retried.
pub trait GpuDevice {
    fn create_texture(&self, desc: &TextureDesc) -> PostFxResult<TextureHandle>;

    fn create_view(&self, texture: TextureHandle) -> PostFxResult<ViewHandle>;

    fn create_buffer(&self, desc: &BufferDesc) -> PostFxResult<BufferHandle>;

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> PostFxResult<()>;

    fn create_bind_group_layout(
        &self,
        label: &str,
        entries: &[LayoutEntry],
    ) -> PostFxResult<BindGroupLayoutHandle>;

    fn create_pipeline_layout(
        &self,
        label: &str,
        layouts: &[BindGroupLayoutHandle],
    ) -> PostFxResult<PipelineLayoutHandle>;

    fn create_shader_module(
        &self,
        label: &str,
        code: &str,
        stage: ShaderStage,
    ) -> PostFxResult<ShaderHandle>;

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> PostFxResult<PipelineHandle>;

    fn create_bind_group(
        &self,
        label: &str,
        layout: BindGroupLayoutHandle,
        entries: &[BindGroupEntry],
    ) -> PostFxResult<BindGroupHandle>;

    fn create_sampler(&self, desc: &SamplerDesc) -> PostFxResult<SamplerHandle>;

    /// Release a resource; unknown or already released handles are ignored
    fn release(&self, resource: GpuResource);

    /// Colour format of a view, `None` when the device does not know it
    fn view_format(&self, _view: ViewHandle) -> Option<ColorFormat> {
        None
    }

    /// Reject a draw the backend would refuse at submit time
    fn validate_draw(&self, _draw: &FullscreenDraw) -> PostFxResult<()> {
        Ok(())
    }
}

/// Draw rules shared by the backends: the target is not sampled by the
/// same pass, and matches the pipeline's colour format when both are known
pub(crate) fn check_draw(
    draw: &FullscreenDraw,
    sampled: &[ViewHandle],
    pipeline_format: Option<ColorFormat>,
    target_format: Option<ColorFormat>,
) -> PostFxResult<()> {
    if sampled.contains(&draw.target) {
        return Err(PostFxError::InputAliasesTarget {
            label: draw.label.clone(),
            view: draw.target,
        });
    }
    if let (Some(expected), Some(actual)) = (pipeline_format, target_format) {
        if expected != actual {
            return Err(PostFxError::FormatMismatch {
                label: draw.label.clone(),
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// Command sink for one frame
pub trait CommandEncoder {
    fn draw_fullscreen(&mut self, draw: &FullscreenDraw) -> PostFxResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_allocator_never_repeats() {
        let alloc = HandleAllocator::new();
        let a = alloc.next_raw();
        let b = alloc.next_raw();
        assert_eq!(a, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn resource_kind_follows_variant() {
        let res: GpuResource = ViewHandle::from_raw(3).into();
        assert_eq!(res.kind(), ResourceKind::View);
        assert_eq!(res.raw(), 3);
        assert_eq!(ResourceKind::BindGroupLayout.to_string(), "bind group layout");
    }

    #[test]
    fn hdr_format_is_eight_bytes() {
        assert_eq!(ColorFormat::HDR.bytes_per_pixel(), 8);
        assert_eq!(ColorFormat::default().bytes_per_pixel(), 4);
        assert!(ColorFormat::HDR.is_float());
    }

    #[test]
    fn draw_check_rejects_feedback_and_format() {
        let draw = FullscreenDraw {
            label: "pass".to_string(),
            pipeline: PipelineHandle::from_raw(1),
            bind_group: BindGroupHandle::from_raw(2),
            target: ViewHandle::from_raw(3),
        };
        let hdr = Some(ColorFormat::HDR);
        assert!(check_draw(&draw, &[ViewHandle::from_raw(4)], hdr, hdr).is_ok());
        assert!(check_draw(&draw, &[ViewHandle::from_raw(4)], hdr, None).is_ok());
        assert!(matches!(
            check_draw(&draw, &[ViewHandle::from_raw(3)], hdr, hdr),
            Err(PostFxError::InputAliasesTarget { .. })
        ));
        assert!(matches!(
            check_draw(&draw, &[], Some(ColorFormat::Rgba8Unorm), hdr),
            Err(PostFxError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn shader_stage_entry_points() {
        assert_eq!(ShaderStage::Vertex.entry_point(), "vs_main");
        assert_eq!(ShaderStage::Fragment.entry_point(), "fs_main");
    }
}
