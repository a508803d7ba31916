// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # Headless Device
//!
//! A [`GpuDevice`] that allocates nothing on a GPU. It mints handles, keeps
//! track of which ones are alive, remembers buffer contents and bind group
//! entries, and logs every call in order. Tests use it to check the chain's
//! resource invariants; tools can use it to dry-run a chain configuration.
//!
//! The device validates handles the way a real driver would: binding a
//! released view, writing past the end of a buffer or creating a zero sized
//! texture all fail. Draws are checked through [`GpuDevice::validate_draw`]:
//! a pass may not sample its own target, and the target format must match
//! the pipeline's.
//!
//! The call log grows with every call. Tools that dry-run many frames should
//! drain it once per frame with [`HeadlessDevice::take_calls`] or
//! [`HeadlessDevice::clear_calls`].

use super::{
    check_draw, BindGroupEntry, BindGroupHandle, BindGroupLayoutHandle, BindingResource,
    BufferDesc, BufferHandle, ColorFormat, FullscreenDraw, GpuDevice, GpuResource,
    HandleAllocator, LayoutEntry, PipelineHandle, PipelineLayoutHandle, RenderPipelineDesc,
    ResourceKind, SamplerDesc, SamplerHandle, ShaderHandle, ShaderStage, TextureDesc,
    TextureFormat, TextureHandle, ViewHandle,
};
use crate::error::{PostFxError, PostFxResult};
use log::warn;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// One logged device call
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    CreateTexture {
        handle: TextureHandle,
        desc: TextureDesc,
    },
    CreateView {
        handle: ViewHandle,
        texture: TextureHandle,
    },
    CreateBuffer {
        handle: BufferHandle,
        desc: BufferDesc,
    },
    WriteBuffer {
        buffer: BufferHandle,
        offset: u64,
        len: usize,
    },
    CreateBindGroupLayout {
        handle: BindGroupLayoutHandle,
        label: String,
        entries: Vec<LayoutEntry>,
    },
    CreatePipelineLayout {
        handle: PipelineLayoutHandle,
        label: String,
    },
    CreateShaderModule {
        handle: ShaderHandle,
        label: String,
        stage: ShaderStage,
    },
    CreateRenderPipeline {
        handle: PipelineHandle,
        desc: RenderPipelineDesc,
    },
    CreateBindGroup {
        handle: BindGroupHandle,
        label: String,
        entries: Vec<BindGroupEntry>,
    },
    CreateSampler {
        handle: SamplerHandle,
        label: String,
    },
    Release(GpuResource),
}

impl DeviceCall {
    /// Kind of resource created by this call, `None` for writes and releases
    pub fn created_kind(&self) -> Option<ResourceKind> {
        match self {
            DeviceCall::CreateTexture { .. } => Some(ResourceKind::Texture),
            DeviceCall::CreateView { .. } => Some(ResourceKind::View),
            DeviceCall::CreateBuffer { .. } => Some(ResourceKind::Buffer),
            DeviceCall::CreateBindGroupLayout { .. } => Some(ResourceKind::BindGroupLayout),
            DeviceCall::CreatePipelineLayout { .. } => Some(ResourceKind::PipelineLayout),
            DeviceCall::CreateShaderModule { .. } => Some(ResourceKind::ShaderModule),
            DeviceCall::CreateRenderPipeline { .. } => Some(ResourceKind::RenderPipeline),
            DeviceCall::CreateBindGroup { .. } => Some(ResourceKind::BindGroup),
            DeviceCall::CreateSampler { .. } => Some(ResourceKind::Sampler),
            DeviceCall::WriteBuffer { .. } | DeviceCall::Release(_) => None,
        }
    }
}

/// Recording device without a GPU behind it
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    handles: HandleAllocator,
    live: RefCell<HashMap<u64, ResourceKind>>,
    calls: RefCell<Vec<DeviceCall>>,
    buffers: RefCell<HashMap<BufferHandle, Vec<u8>>>,
    bind_groups: RefCell<HashMap<BindGroupHandle, Vec<BindGroupEntry>>>,
    texture_formats: RefCell<HashMap<TextureHandle, TextureFormat>>,
    view_formats: RefCell<HashMap<ViewHandle, ColorFormat>>,
    pipeline_formats: RefCell<HashMap<PipelineHandle, ColorFormat>>,
    fail_next: Cell<Option<(ResourceKind, usize)>>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view produced outside the chain, e.g. the scene colour image
    ///
    /// Imports are not logged as device calls. An import stays live until it
    /// is passed to [`GpuDevice::release`], so per-frame imports should be
    /// released once the frame is done.
    pub fn import_view(&self) -> ViewHandle {
        let raw = self.handles.next_raw();
        self.live.borrow_mut().insert(raw, ResourceKind::View);
        ViewHandle::from_raw(raw)
    }

    /// Same as [`HeadlessDevice::import_view`] for a view of known format
    pub fn import_view_as(&self, format: ColorFormat) -> ViewHandle {
        let view = self.import_view();
        self.view_formats.borrow_mut().insert(view, format);
        view
    }

    /// Make the next creation of `kind` fail with an allocation error
    pub fn fail_next(&self, kind: ResourceKind) {
        self.fail_after(kind, 0);
    }

    /// Let `skip` creations of `kind` succeed, then fail the following one
    pub fn fail_after(&self, kind: ResourceKind, skip: usize) {
        self.fail_next.set(Some((kind, skip)));
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Drain the call log
    pub fn take_calls(&self) -> Vec<DeviceCall> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    /// How many resources of `kind` were ever created (imports excluded)
    pub fn created_count(&self, kind: ResourceKind) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.created_kind() == Some(kind))
            .count()
    }

    /// How many resources of `kind` are currently alive (imports included)
    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.live.borrow().values().filter(|k| **k == kind).count()
    }

    pub fn is_live(&self, resource: GpuResource) -> bool {
        self.live.borrow().get(&resource.raw()) == Some(&resource.kind())
    }

    /// Number of `write_buffer` calls so far
    pub fn write_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, DeviceCall::WriteBuffer { .. }))
            .count()
    }

    /// Last bytes written to a live buffer
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.buffers.borrow().get(&buffer).cloned()
    }

    /// Views referenced by a bind group, in entry order
    pub fn bound_views(&self, bind_group: BindGroupHandle) -> Vec<ViewHandle> {
        self.bind_groups
            .borrow()
            .get(&bind_group)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| match e.resource {
                        BindingResource::View(v) => Some(v),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn mint(&self, kind: ResourceKind, label: &str) -> PostFxResult<u64> {
        if let Some((armed, skip)) = self.fail_next.get() {
            if armed == kind {
                if skip == 0 {
                    self.fail_next.set(None);
                    return Err(PostFxError::allocation(kind, label, "injected failure"));
                }
                self.fail_next.set(Some((armed, skip - 1)));
            }
        }
        let raw = self.handles.next_raw();
        self.live.borrow_mut().insert(raw, kind);
        Ok(raw)
    }

    fn ensure_live(&self, resource: GpuResource) -> PostFxResult<()> {
        if self.is_live(resource) {
            Ok(())
        } else {
            Err(PostFxError::InvalidHandle(resource))
        }
    }

    fn log(&self, call: DeviceCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_texture(&self, desc: &TextureDesc) -> PostFxResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(PostFxError::allocation(
                ResourceKind::Texture,
                &desc.label,
                format!("zero sized texture {}x{}", desc.width, desc.height),
            ));
        }
        let handle = TextureHandle::from_raw(self.mint(ResourceKind::Texture, &desc.label)?);
        self.texture_formats.borrow_mut().insert(handle, desc.format);
        self.log(DeviceCall::CreateTexture {
            handle,
            desc: desc.clone(),
        });
        Ok(handle)
    }

    fn create_view(&self, texture: TextureHandle) -> PostFxResult<ViewHandle> {
        self.ensure_live(texture.into())?;
        let handle = ViewHandle::from_raw(self.mint(ResourceKind::View, "view")?);
        if let Some(TextureFormat::Color(format)) = self.texture_formats.borrow().get(&texture) {
            self.view_formats.borrow_mut().insert(handle, *format);
        }
        self.log(DeviceCall::CreateView { handle, texture });
        Ok(handle)
    }

    fn create_buffer(&self, desc: &BufferDesc) -> PostFxResult<BufferHandle> {
        let handle = BufferHandle::from_raw(self.mint(ResourceKind::Buffer, &desc.label)?);
        self.buffers
            .borrow_mut()
            .insert(handle, vec![0; desc.size as usize]);
        self.log(DeviceCall::CreateBuffer {
            handle,
            desc: desc.clone(),
        });
        Ok(handle)
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> PostFxResult<()> {
        self.ensure_live(buffer.into())?;
        let mut buffers = self.buffers.borrow_mut();
        let contents = buffers
            .get_mut(&buffer)
            .ok_or(PostFxError::InvalidHandle(buffer.into()))?;
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(data.len())?))
            .filter(|r| r.end <= contents.len());
        let range = match range {
            Some(r) => r,
            None => {
                return Err(PostFxError::allocation(
                    ResourceKind::Buffer,
                    format!("buffer {}", buffer.raw()),
                    format!(
                        "write of {} bytes at {} exceeds size {}",
                        data.len(),
                        offset,
                        contents.len()
                    ),
                ))
            }
        };
        contents[range].copy_from_slice(data);
        drop(buffers);
        self.log(DeviceCall::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn create_bind_group_layout(
        &self,
        label: &str,
        entries: &[LayoutEntry],
    ) -> PostFxResult<BindGroupLayoutHandle> {
        let handle =
            BindGroupLayoutHandle::from_raw(self.mint(ResourceKind::BindGroupLayout, label)?);
        self.log(DeviceCall::CreateBindGroupLayout {
            handle,
            label: label.to_string(),
            entries: entries.to_vec(),
        });
        Ok(handle)
    }

    fn create_pipeline_layout(
        &self,
        label: &str,
        layouts: &[BindGroupLayoutHandle],
    ) -> PostFxResult<PipelineLayoutHandle> {
        for layout in layouts {
            self.ensure_live((*layout).into())?;
        }
        let handle =
            PipelineLayoutHandle::from_raw(self.mint(ResourceKind::PipelineLayout, label)?);
        self.log(DeviceCall::CreatePipelineLayout {
            handle,
            label: label.to_string(),
        });
        Ok(handle)
    }

    fn create_shader_module(
        &self,
        label: &str,
        code: &str,
        stage: ShaderStage,
    ) -> PostFxResult<ShaderHandle> {
        if !code.contains(stage.entry_point()) {
            return Err(PostFxError::allocation(
                ResourceKind::ShaderModule,
                label,
                format!("missing entry point {}", stage.entry_point()),
            ));
        }
        let handle = ShaderHandle::from_raw(self.mint(ResourceKind::ShaderModule, label)?);
        self.log(DeviceCall::CreateShaderModule {
            handle,
            label: label.to_string(),
            stage,
        });
        Ok(handle)
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> PostFxResult<PipelineHandle> {
        self.ensure_live(desc.layout.into())?;
        self.ensure_live(desc.vertex.into())?;
        self.ensure_live(desc.fragment.into())?;
        let handle =
            PipelineHandle::from_raw(self.mint(ResourceKind::RenderPipeline, &desc.label)?);
        self.pipeline_formats
            .borrow_mut()
            .insert(handle, desc.target_format);
        self.log(DeviceCall::CreateRenderPipeline {
            handle,
            desc: desc.clone(),
        });
        Ok(handle)
    }

    fn create_bind_group(
        &self,
        label: &str,
        layout: BindGroupLayoutHandle,
        entries: &[BindGroupEntry],
    ) -> PostFxResult<BindGroupHandle> {
        self.ensure_live(layout.into())?;
        for entry in entries {
            let resource = match entry.resource {
                BindingResource::View(v) => GpuResource::from(v),
                BindingResource::Sampler(s) => GpuResource::from(s),
                BindingResource::Buffer(b) => GpuResource::from(b),
            };
            self.ensure_live(resource)?;
        }
        let handle = BindGroupHandle::from_raw(self.mint(ResourceKind::BindGroup, label)?);
        self.bind_groups
            .borrow_mut()
            .insert(handle, entries.to_vec());
        self.log(DeviceCall::CreateBindGroup {
            handle,
            label: label.to_string(),
            entries: entries.to_vec(),
        });
        Ok(handle)
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> PostFxResult<SamplerHandle> {
        let handle = SamplerHandle::from_raw(self.mint(ResourceKind::Sampler, &desc.label)?);
        self.log(DeviceCall::CreateSampler {
            handle,
            label: desc.label.clone(),
        });
        Ok(handle)
    }

    fn release(&self, resource: GpuResource) {
        if !self.is_live(resource) {
            warn!("HeadlessDevice: ignoring release of unknown {:?}", resource);
            return;
        }
        self.live.borrow_mut().remove(&resource.raw());
        match resource {
            GpuResource::Buffer(b) => {
                self.buffers.borrow_mut().remove(&b);
            }
            GpuResource::BindGroup(bg) => {
                self.bind_groups.borrow_mut().remove(&bg);
            }
            GpuResource::Texture(t) => {
                self.texture_formats.borrow_mut().remove(&t);
            }
            GpuResource::View(v) => {
                self.view_formats.borrow_mut().remove(&v);
            }
            GpuResource::RenderPipeline(p) => {
                self.pipeline_formats.borrow_mut().remove(&p);
            }
            _ => {}
        }
        self.log(DeviceCall::Release(resource));
    }

    fn view_format(&self, view: ViewHandle) -> Option<ColorFormat> {
        self.view_formats.borrow().get(&view).copied()
    }

    fn validate_draw(&self, draw: &FullscreenDraw) -> PostFxResult<()> {
        self.ensure_live(draw.pipeline.into())?;
        self.ensure_live(draw.bind_group.into())?;
        self.ensure_live(draw.target.into())?;
        let pipeline_format = self.pipeline_formats.borrow().get(&draw.pipeline).copied();
        check_draw(
            draw,
            &self.bound_views(draw.bind_group),
            pipeline_format,
            self.view_format(draw.target),
        )
    }
}
