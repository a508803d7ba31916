// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # Render Target Module
//!
//! A fixed-size colour attachment that effects render into and sample from.
//! The chain keeps two of them and alternates their roles every effect.

use crate::error::PostFxResult;
use crate::gpu::{
    ColorFormat, DepthFormat, GpuDevice, TextureDesc, TextureFormat, TextureHandle,
    TextureUsage, ViewHandle,
};
use log::debug;

/// Parameters for a new render target
#[derive(Clone, Debug, PartialEq)]
pub struct RenderTargetDesc {
    pub width: u32,
    pub height: u32,
    pub color_format: ColorFormat,
    /// Optional depth attachment; the post chain always passes `None`
    pub depth_format: Option<DepthFormat>,
    pub label: String,
}

impl RenderTargetDesc {
    /// Colour-only target, as used by the ping-pong pair
    pub fn color(width: u32, height: u32, color_format: ColorFormat, label: &str) -> Self {
        Self {
            width,
            height,
            color_format,
            depth_format: None,
            label: label.to_string(),
        }
    }
}

struct Attachment {
    texture: TextureHandle,
    view: ViewHandle,
}

/// Render target with one colour attachment
///
/// The target does not release anything on drop: there is no device at hand
/// there. Call [`RenderTarget::destroy`] explicitly; calling it twice is fine.
pub struct RenderTarget {
    width: u32,
    height: u32,
    color_format: ColorFormat,
    depth_format: Option<DepthFormat>,
    label: String,
    color: Option<Attachment>,
    depth: Option<Attachment>,
    color_view: ViewHandle,
}

impl RenderTarget {
    /// Allocate the colour attachment (and depth, if requested)
    ///
    /// Allocation failures are returned as is, nothing is retried. When the
    /// depth attachment fails the colour attachment is released first.
    pub fn new(device: &dyn GpuDevice, desc: &RenderTargetDesc) -> PostFxResult<Self> {
        let color = allocate(
            device,
            &TextureDesc {
                label: format!("{} color", desc.label),
                width: desc.width,
                height: desc.height,
                format: TextureFormat::Color(desc.color_format),
                usage: TextureUsage::RENDER_ATTACHMENT
                    | TextureUsage::TEXTURE_BINDING
                    | TextureUsage::COPY_SRC,
            },
        )?;

        let depth = match desc.depth_format {
            Some(format) => {
                let depth = allocate(
                    device,
                    &TextureDesc {
                        label: format!("{} depth", desc.label),
                        width: desc.width,
                        height: desc.height,
                        format: TextureFormat::Depth(format),
                        usage: TextureUsage::RENDER_ATTACHMENT,
                    },
                );
                match depth {
                    Ok(d) => Some(d),
                    Err(e) => {
                        device.release(color.view.into());
                        device.release(color.texture.into());
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        debug!(
            "RenderTarget '{}': {}x{} {:?} created",
            desc.label, desc.width, desc.height, desc.color_format
        );

        Ok(Self {
            width: desc.width,
            height: desc.height,
            color_format: desc.color_format,
            depth_format: desc.depth_format,
            label: desc.label.clone(),
            color_view: color.view,
            color: Some(color),
            depth,
        })
    }

    /// Bindable view of colour attachment `index`
    ///
    /// Only attachment 0 exists. Returns `None` for any other index and after
    /// the target was destroyed.
    pub fn color_view(&self, index: usize) -> Option<ViewHandle> {
        match (index, &self.color) {
            (0, Some(attachment)) => Some(attachment.view),
            _ => None,
        }
    }

    /// View of the colour attachment, still valid as an identity after destroy
    pub fn color_view_handle(&self) -> ViewHandle {
        self.color_view
    }

    pub fn depth_view(&self) -> Option<ViewHandle> {
        self.depth.as_ref().map(|d| d.view)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get_dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color_format(&self) -> ColorFormat {
        self.color_format
    }

    pub fn depth_format(&self) -> Option<DepthFormat> {
        self.depth_format
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_destroyed(&self) -> bool {
        self.color.is_none()
    }

    /// Release GPU memory. Safe to call more than once.
    pub fn destroy(&mut self, device: &dyn GpuDevice) {
        for attachment in [self.color.take(), self.depth.take()].into_iter().flatten() {
            device.release(attachment.view.into());
            device.release(attachment.texture.into());
        }
    }
}

fn allocate(device: &dyn GpuDevice, desc: &TextureDesc) -> PostFxResult<Attachment> {
    let texture = device.create_texture(desc)?;
    match device.create_view(texture) {
        Ok(view) => Ok(Attachment { texture, view }),
        Err(e) => {
            device.release(texture.into());
            Err(e)
        }
    }
}
