// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # WGPU Backend
//!
//! Maps chain handles onto real `wgpu` objects.
//!
//! wgpu reports creation problems asynchronously through the device error
//! callback. Every creation here runs inside an out-of-memory and a
//! validation error scope, and the scopes are popped with `pollster`, so a
//! failed allocation comes back as a `PostFxError` from the call that made it.
//!
//! Views produced outside the chain (the scene colour image, a swapchain
//! frame) are registered with [`WgpuDevice::import_view`]. The device keeps
//! an import alive until it is passed to [`GpuDevice::release`]; release
//! per-frame imports such as swapchain views once the frame is submitted.

use super::{
    check_draw, AddressMode, BindGroupEntry, BindGroupHandle, BindGroupLayoutHandle, BindingKind,
    BindingResource, BufferDesc, BufferHandle, BufferUsage, ColorFormat, CommandEncoder,
    DepthFormat, FilterMode, FullscreenDraw, GpuDevice, GpuResource, HandleAllocator,
    LayoutEntry, PipelineHandle, PipelineLayoutHandle, RenderPipelineDesc, ResourceKind,
    SamplerDesc, SamplerHandle, ShaderHandle, ShaderStage, TextureDesc, TextureFormat,
    TextureHandle, TextureUsage, ViewHandle,
};
use crate::error::{PostFxError, PostFxResult};
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

pub fn color_format(format: ColorFormat) -> wgpu::TextureFormat {
    match format {
        ColorFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        ColorFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        ColorFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        ColorFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        ColorFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        ColorFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

pub fn depth_format(format: DepthFormat) -> wgpu::TextureFormat {
    match format {
        DepthFormat::Depth24Plus => wgpu::TextureFormat::Depth24Plus,
        DepthFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        DepthFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

fn texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
    let mut out = wgpu::TextureUsages::empty();
    if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
        out |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(TextureUsage::TEXTURE_BINDING) {
        out |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.contains(TextureUsage::COPY_SRC) {
        out |= wgpu::TextureUsages::COPY_SRC;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        out |= wgpu::TextureUsages::COPY_DST;
    }
    out
}

fn buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut out = wgpu::BufferUsages::empty();
    if usage.contains(BufferUsage::UNIFORM) {
        out |= wgpu::BufferUsages::UNIFORM;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        out |= wgpu::BufferUsages::COPY_DST;
    }
    if usage.contains(BufferUsage::COPY_SRC) {
        out |= wgpu::BufferUsages::COPY_SRC;
    }
    out
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

fn layout_entry(entry: &LayoutEntry) -> wgpu::BindGroupLayoutEntry {
    let ty = match entry.kind {
        BindingKind::Texture => wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        BindingKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        BindingKind::UniformBuffer => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
    };
    wgpu::BindGroupLayoutEntry {
        binding: entry.binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty,
        count: None,
    }
}

/// Handle keyed table of wgpu objects
struct Table<H, T> {
    items: RefCell<HashMap<H, T>>,
}

impl<H: Copy + Eq + Hash + Into<GpuResource>, T: Clone> Table<H, T> {
    fn new() -> Self {
        Self {
            items: RefCell::new(HashMap::new()),
        }
    }

    fn insert(&self, handle: H, item: T) {
        self.items.borrow_mut().insert(handle, item);
    }

    fn get(&self, handle: H) -> PostFxResult<T> {
        self.items
            .borrow()
            .get(&handle)
            .cloned()
            .ok_or_else(|| PostFxError::InvalidHandle(handle.into()))
    }

    fn remove(&self, handle: H) -> Option<T> {
        self.items.borrow_mut().remove(&handle)
    }

    fn len(&self) -> usize {
        self.items.borrow().len()
    }
}

/// [`GpuDevice`] backed by a `wgpu::Device` and its queue
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    handles: HandleAllocator,
    textures: Table<TextureHandle, wgpu::Texture>,
    views: Table<ViewHandle, wgpu::TextureView>,
    buffers: Table<BufferHandle, wgpu::Buffer>,
    bind_group_layouts: Table<BindGroupLayoutHandle, wgpu::BindGroupLayout>,
    pipeline_layouts: Table<PipelineLayoutHandle, wgpu::PipelineLayout>,
    shaders: Table<ShaderHandle, wgpu::ShaderModule>,
    pipelines: Table<PipelineHandle, wgpu::RenderPipeline>,
    bind_groups: Table<BindGroupHandle, wgpu::BindGroup>,
    samplers: Table<SamplerHandle, wgpu::Sampler>,
    texture_formats: Table<TextureHandle, ColorFormat>,
    view_formats: Table<ViewHandle, ColorFormat>,
    pipeline_formats: Table<PipelineHandle, ColorFormat>,
    sampled_views: Table<BindGroupHandle, Vec<ViewHandle>>,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            handles: HandleAllocator::new(),
            textures: Table::new(),
            views: Table::new(),
            buffers: Table::new(),
            bind_group_layouts: Table::new(),
            pipeline_layouts: Table::new(),
            shaders: Table::new(),
            pipelines: Table::new(),
            bind_groups: Table::new(),
            samplers: Table::new(),
            texture_formats: Table::new(),
            view_formats: Table::new(),
            pipeline_formats: Table::new(),
            sampled_views: Table::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Register an externally owned view, e.g. the scene colour target
    ///
    /// Release the handle with [`GpuDevice::release`] when the view is no
    /// longer used, otherwise the table keeps the texture alive.
    pub fn import_view(&self, view: wgpu::TextureView) -> ViewHandle {
        let handle = ViewHandle::from_raw(self.handles.next_raw());
        self.views.insert(handle, view);
        handle
    }

    /// Same as [`WgpuDevice::import_view`], recording the view format so
    /// draws into it are checked against the pipeline format
    pub fn import_view_as(&self, view: wgpu::TextureView, format: ColorFormat) -> ViewHandle {
        let handle = self.import_view(view);
        self.view_formats.insert(handle, format);
        handle
    }

    /// The wgpu view behind a handle, e.g. to present the chain output
    pub fn view(&self, handle: ViewHandle) -> Option<wgpu::TextureView> {
        self.views.get(handle).ok()
    }

    /// Number of live views, imports included
    pub fn live_views(&self) -> usize {
        self.views.len()
    }

    /// Run `create` inside error scopes and turn a captured error into
    /// an allocation failure
    fn scoped<T>(
        &self,
        kind: ResourceKind,
        label: &str,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> PostFxResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let item = create(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match validation.or(oom) {
            Some(err) => Err(PostFxError::allocation(kind, label, err)),
            None => Ok(item),
        }
    }
}

impl GpuDevice for WgpuDevice {
    fn create_texture(&self, desc: &TextureDesc) -> PostFxResult<TextureHandle> {
        let format = match desc.format {
            TextureFormat::Color(f) => color_format(f),
            TextureFormat::Depth(f) => depth_format(f),
        };
        let texture = self.scoped(ResourceKind::Texture, &desc.label, |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&desc.label),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: texture_usage(desc.usage),
                view_formats: &[],
            })
        })?;
        let handle = TextureHandle::from_raw(self.handles.next_raw());
        self.textures.insert(handle, texture);
        if let TextureFormat::Color(f) = desc.format {
            self.texture_formats.insert(handle, f);
        }
        Ok(handle)
    }

    fn create_view(&self, texture_handle: TextureHandle) -> PostFxResult<ViewHandle> {
        let texture = self.textures.get(texture_handle)?;
        let view = self.scoped(ResourceKind::View, "view", |_| {
            texture.create_view(&wgpu::TextureViewDescriptor::default())
        })?;
        let handle = ViewHandle::from_raw(self.handles.next_raw());
        self.views.insert(handle, view);
        if let Ok(format) = self.texture_formats.get(texture_handle) {
            self.view_formats.insert(handle, format);
        }
        Ok(handle)
    }

    fn create_buffer(&self, desc: &BufferDesc) -> PostFxResult<BufferHandle> {
        let buffer = self.scoped(ResourceKind::Buffer, &desc.label, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&desc.label),
                size: desc.size,
                usage: buffer_usage(desc.usage),
                mapped_at_creation: false,
            })
        })?;
        let handle = BufferHandle::from_raw(self.handles.next_raw());
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> PostFxResult<()> {
        let buffer = self.buffers.get(buffer)?;
        self.queue.write_buffer(&buffer, offset, data);
        Ok(())
    }

    fn create_bind_group_layout(
        &self,
        label: &str,
        entries: &[LayoutEntry],
    ) -> PostFxResult<BindGroupLayoutHandle> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = entries.iter().map(layout_entry).collect();
        let layout = self.scoped(ResourceKind::BindGroupLayout, label, |device| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &entries,
            })
        })?;
        let handle = BindGroupLayoutHandle::from_raw(self.handles.next_raw());
        self.bind_group_layouts.insert(handle, layout);
        Ok(handle)
    }

    fn create_pipeline_layout(
        &self,
        label: &str,
        layouts: &[BindGroupLayoutHandle],
    ) -> PostFxResult<PipelineLayoutHandle> {
        let layouts = layouts
            .iter()
            .map(|h| self.bind_group_layouts.get(*h))
            .collect::<PostFxResult<Vec<_>>>()?;
        let refs: Vec<&wgpu::BindGroupLayout> = layouts.iter().collect();
        let layout = self.scoped(ResourceKind::PipelineLayout, label, |device| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &refs,
                push_constant_ranges: &[],
            })
        })?;
        let handle = PipelineLayoutHandle::from_raw(self.handles.next_raw());
        self.pipeline_layouts.insert(handle, layout);
        Ok(handle)
    }

    fn create_shader_module(
        &self,
        label: &str,
        code: &str,
        _stage: ShaderStage,
    ) -> PostFxResult<ShaderHandle> {
        let module = self.scoped(ResourceKind::ShaderModule, label, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(code.into()),
            })
        })?;
        let handle = ShaderHandle::from_raw(self.handles.next_raw());
        self.shaders.insert(handle, module);
        Ok(handle)
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> PostFxResult<PipelineHandle> {
        let layout = self.pipeline_layouts.get(desc.layout)?;
        let vertex = self.shaders.get(desc.vertex)?;
        let fragment = self.shaders.get(desc.fragment)?;
        let pipeline = self.scoped(ResourceKind::RenderPipeline, &desc.label, |device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&desc.label),
                layout: Some(&layout),
                cache: None,
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: Some(ShaderStage::Vertex.entry_point()),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment,
                    entry_point: Some(ShaderStage::Fragment.entry_point()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_format(desc.target_format),
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            })
        })?;
        let handle = PipelineHandle::from_raw(self.handles.next_raw());
        self.pipelines.insert(handle, pipeline);
        self.pipeline_formats.insert(handle, desc.target_format);
        Ok(handle)
    }

    fn create_bind_group(
        &self,
        label: &str,
        layout: BindGroupLayoutHandle,
        entries: &[BindGroupEntry],
    ) -> PostFxResult<BindGroupHandle> {
        enum Bound {
            View(wgpu::TextureView),
            Sampler(wgpu::Sampler),
            Buffer(wgpu::Buffer),
        }

        let layout = self.bind_group_layouts.get(layout)?;
        let bound = entries
            .iter()
            .map(|e| {
                Ok(match e.resource {
                    BindingResource::View(v) => Bound::View(self.views.get(v)?),
                    BindingResource::Sampler(s) => Bound::Sampler(self.samplers.get(s)?),
                    BindingResource::Buffer(b) => Bound::Buffer(self.buffers.get(b)?),
                })
            })
            .collect::<PostFxResult<Vec<_>>>()?;
        let wgpu_entries: Vec<wgpu::BindGroupEntry> = entries
            .iter()
            .zip(bound.iter())
            .map(|(e, b)| wgpu::BindGroupEntry {
                binding: e.binding,
                resource: match b {
                    Bound::View(v) => wgpu::BindingResource::TextureView(v),
                    Bound::Sampler(s) => wgpu::BindingResource::Sampler(s),
                    Bound::Buffer(buf) => buf.as_entire_binding(),
                },
            })
            .collect();

        let bind_group = self.scoped(ResourceKind::BindGroup, label, |device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &wgpu_entries,
            })
        })?;
        let handle = BindGroupHandle::from_raw(self.handles.next_raw());
        self.bind_groups.insert(handle, bind_group);
        let sampled = entries
            .iter()
            .filter_map(|e| match e.resource {
                BindingResource::View(v) => Some(v),
                _ => None,
            })
            .collect();
        self.sampled_views.insert(handle, sampled);
        Ok(handle)
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> PostFxResult<SamplerHandle> {
        let sampler = self.scoped(ResourceKind::Sampler, &desc.label, |device| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(&desc.label),
                address_mode_u: address_mode(desc.address_mode),
                address_mode_v: address_mode(desc.address_mode),
                address_mode_w: address_mode(desc.address_mode),
                mag_filter: filter_mode(desc.filter),
                min_filter: filter_mode(desc.filter),
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        })?;
        let handle = SamplerHandle::from_raw(self.handles.next_raw());
        self.samplers.insert(handle, sampler);
        Ok(handle)
    }

    fn release(&self, resource: GpuResource) {
        let found = match resource {
            GpuResource::Texture(h) => {
                self.texture_formats.remove(h);
                self.textures.remove(h).map(|t| t.destroy()).is_some()
            }
            GpuResource::View(h) => {
                self.view_formats.remove(h);
                self.views.remove(h).is_some()
            }
            GpuResource::Buffer(h) => self.buffers.remove(h).map(|b| b.destroy()).is_some(),
            GpuResource::BindGroupLayout(h) => self.bind_group_layouts.remove(h).is_some(),
            GpuResource::PipelineLayout(h) => self.pipeline_layouts.remove(h).is_some(),
            GpuResource::ShaderModule(h) => self.shaders.remove(h).is_some(),
            GpuResource::RenderPipeline(h) => {
                self.pipeline_formats.remove(h);
                self.pipelines.remove(h).is_some()
            }
            GpuResource::BindGroup(h) => {
                self.sampled_views.remove(h);
                self.bind_groups.remove(h).is_some()
            }
            GpuResource::Sampler(h) => self.samplers.remove(h).is_some(),
        };
        if !found {
            warn!("WgpuDevice: ignoring release of unknown {:?}", resource);
        }
    }

    fn view_format(&self, view: ViewHandle) -> Option<ColorFormat> {
        self.view_formats.get(view).ok()
    }

    fn validate_draw(&self, draw: &FullscreenDraw) -> PostFxResult<()> {
        self.pipelines.get(draw.pipeline)?;
        self.views.get(draw.target)?;
        let sampled = self.sampled_views.get(draw.bind_group)?;
        check_draw(
            draw,
            &sampled,
            self.pipeline_formats.get(draw.pipeline).ok(),
            self.view_format(draw.target),
        )
    }
}

/// Records full-screen draws into a `wgpu::CommandEncoder`
///
/// Each draw is its own render pass clearing the target first.
pub struct WgpuEncoder<'a> {
    device: &'a WgpuDevice,
    encoder: wgpu::CommandEncoder,
    passes: usize,
}

impl<'a> WgpuEncoder<'a> {
    pub fn new(device: &'a WgpuDevice, label: &str) -> Self {
        let encoder = device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        Self {
            device,
            encoder,
            passes: 0,
        }
    }

    /// Raw encoder, to record the scene pass before the chain runs
    pub fn raw(&mut self) -> &mut wgpu::CommandEncoder {
        &mut self.encoder
    }

    pub fn finish(self) -> wgpu::CommandBuffer {
        self.encoder.finish()
    }

    /// Finish and submit to the device queue
    pub fn submit(self) {
        let device = self.device;
        let passes = self.passes;
        device.queue().submit(std::iter::once(self.finish()));
        debug!("WgpuEncoder: submitted {} post passes", passes);
    }
}

impl CommandEncoder for WgpuEncoder<'_> {
    fn draw_fullscreen(&mut self, draw: &FullscreenDraw) -> PostFxResult<()> {
        let pipeline = self.device.pipelines.get(draw.pipeline)?;
        let bind_group = self.device.bind_groups.get(draw.bind_group)?;
        let target = self.device.views.get(draw.target)?;

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&draw.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        drop(pass);
        self.passes += 1;
        Ok(())
    }
}
