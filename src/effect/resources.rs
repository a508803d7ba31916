// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Per-effect GPU resource record.
//!
//! A one-entry cache keyed by the last input view handle: the pipeline,
//! layouts, shaders, sampler and uniform buffer do not depend on the input
//! and are built once, the bind group references a concrete view and is
//! rebuilt whenever the input handle changes. Handles are compared by
//! identity only.

use super::shader_source;
use crate::error::{PostFxError, PostFxResult};
use crate::gpu::{
    BindGroupEntry, BindGroupHandle, BindGroupLayoutHandle, BindingKind, BindingResource,
    BufferDesc, BufferHandle, ColorFormat, CommandEncoder, FullscreenDraw, GpuDevice,
    GpuResource, LayoutEntry, PipelineHandle, PipelineLayoutHandle, RenderPipelineDesc,
    ResourceKind, SamplerDesc, SamplerHandle, ShaderHandle, ShaderStage, ViewHandle,
};
use log::debug;

/// Binding slots shared by every full-screen effect shader
pub const TEXTURE_BINDING: u32 = 0;
pub const SAMPLER_BINDING: u32 = 1;
pub const UNIFORM_BINDING: u32 = 2;

/// Lifecycle state derived from the resource record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectState {
    Uninitialized,
    Ready,
    Destroyed,
}

/// What an effect needs to build its pipeline
#[derive(Clone, Copy, Debug)]
pub struct PassSpec<'a> {
    pub label: &'a str,
    pub fragment_source: &'a str,
    pub uniform_size: u64,
    pub target_format: ColorFormat,
}

/// GPU objects exclusively owned by one effect instance
#[derive(Debug, Default)]
pub struct EffectResources {
    initialized: bool,
    destroyed: bool,
    last_input: Option<ViewHandle>,
    pipeline: Option<PipelineHandle>,
    pipeline_layout: Option<PipelineLayoutHandle>,
    bind_group_layout: Option<BindGroupLayoutHandle>,
    bind_group: Option<BindGroupHandle>,
    uniform_buffer: Option<BufferHandle>,
    sampler: Option<SamplerHandle>,
    vertex_shader: Option<ShaderHandle>,
    fragment_shader: Option<ShaderHandle>,
}

impl EffectResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EffectState {
        if self.destroyed {
            EffectState::Destroyed
        } else if self.initialized {
            EffectState::Ready
        } else {
            EffectState::Uninitialized
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Input view the current bind group was built against
    pub fn last_input(&self) -> Option<ViewHandle> {
        self.last_input
    }

    pub fn bind_group(&self) -> Option<BindGroupHandle> {
        self.bind_group
    }

    pub fn pipeline(&self) -> Option<PipelineHandle> {
        self.pipeline
    }

    pub fn uniform_buffer(&self) -> Option<BufferHandle> {
        self.uniform_buffer
    }

    /// Build the input independent objects, once
    ///
    /// A failure releases whatever was built so far and leaves the record
    /// uninitialized.
    pub fn ensure_pipeline(&mut self, device: &dyn GpuDevice, spec: &PassSpec) -> PostFxResult<()> {
        if self.destroyed {
            return Err(PostFxError::EffectDestroyed(spec.label.to_string()));
        }
        if self.initialized {
            return Ok(());
        }
        if let Err(e) = self.build(device, spec) {
            self.release_objects(device);
            return Err(e);
        }
        self.initialized = true;
        debug!("Effect '{}': pipeline ready", spec.label);
        Ok(())
    }

    fn build(&mut self, device: &dyn GpuDevice, spec: &PassSpec) -> PostFxResult<()> {
        let label = spec.label;
        let layout = device.create_bind_group_layout(
            &format!("{} bind group layout", label),
            &[
                LayoutEntry {
                    binding: TEXTURE_BINDING,
                    kind: BindingKind::Texture,
                },
                LayoutEntry {
                    binding: SAMPLER_BINDING,
                    kind: BindingKind::Sampler,
                },
                LayoutEntry {
                    binding: UNIFORM_BINDING,
                    kind: BindingKind::UniformBuffer,
                },
            ],
        )?;
        self.bind_group_layout = Some(layout);

        let pipeline_layout =
            device.create_pipeline_layout(&format!("{} pipeline layout", label), &[layout])?;
        self.pipeline_layout = Some(pipeline_layout);

        let vertex = device.create_shader_module(
            &format!("{} vertex shader", label),
            shader_source::FULLSCREEN_VS,
            ShaderStage::Vertex,
        )?;
        self.vertex_shader = Some(vertex);

        let fragment = device.create_shader_module(
            &format!("{} fragment shader", label),
            spec.fragment_source,
            ShaderStage::Fragment,
        )?;
        self.fragment_shader = Some(fragment);

        self.pipeline = Some(device.create_render_pipeline(&RenderPipelineDesc {
            label: format!("{} pipeline", label),
            layout: pipeline_layout,
            vertex,
            fragment,
            target_format: spec.target_format,
        })?);

        self.sampler = Some(device.create_sampler(&SamplerDesc {
            label: format!("{} sampler", label),
            ..Default::default()
        })?);

        self.uniform_buffer = Some(device.create_buffer(&BufferDesc::uniform(
            &format!("{} uniforms", label),
            spec.uniform_size,
        ))?);
        Ok(())
    }

    /// Bind group for `input`, rebuilt only when the input handle changed
    pub fn ensure_bind_group(
        &mut self,
        device: &dyn GpuDevice,
        label: &str,
        input: ViewHandle,
    ) -> PostFxResult<BindGroupHandle> {
        if let (Some(bind_group), Some(last)) = (self.bind_group, self.last_input) {
            if last == input {
                return Ok(bind_group);
            }
        }

        let (layout, sampler, buffer) =
            match (self.bind_group_layout, self.sampler, self.uniform_buffer) {
                (Some(l), Some(s), Some(b)) => (l, s, b),
                _ => {
                    return Err(PostFxError::allocation(
                        ResourceKind::BindGroup,
                        label,
                        "effect resources are not initialized",
                    ))
                }
            };

        let bind_group = device.create_bind_group(
            &format!("{} bind group", label),
            layout,
            &[
                BindGroupEntry {
                    binding: TEXTURE_BINDING,
                    resource: BindingResource::View(input),
                },
                BindGroupEntry {
                    binding: SAMPLER_BINDING,
                    resource: BindingResource::Sampler(sampler),
                },
                BindGroupEntry {
                    binding: UNIFORM_BINDING,
                    resource: BindingResource::Buffer(buffer),
                },
            ],
        )?;

        if let Some(old) = self.bind_group.replace(bind_group) {
            device.release(old.into());
        }
        debug!(
            "Effect '{}': bind group rebuilt for input {:?} (was {:?})",
            label, input, self.last_input
        );
        self.last_input = Some(input);
        Ok(bind_group)
    }

    /// Upload the uniform block
    pub fn write_uniforms(&self, device: &dyn GpuDevice, data: &[u8]) -> PostFxResult<()> {
        match self.uniform_buffer {
            Some(buffer) => device.write_buffer(buffer, 0, data),
            None => Err(PostFxError::allocation(
                ResourceKind::Buffer,
                "uniforms",
                "effect resources are not initialized",
            )),
        }
    }

    /// Record the full-screen draw into `encoder`, once the device accepts it
    pub fn record(
        &self,
        device: &dyn GpuDevice,
        encoder: &mut dyn CommandEncoder,
        label: &str,
        output: ViewHandle,
    ) -> PostFxResult<()> {
        match (self.pipeline, self.bind_group) {
            (Some(pipeline), Some(bind_group)) => {
                let draw = FullscreenDraw {
                    label: label.to_string(),
                    pipeline,
                    bind_group,
                    target: output,
                };
                device.validate_draw(&draw)?;
                encoder.draw_fullscreen(&draw)
            }
            _ => Err(PostFxError::allocation(
                ResourceKind::RenderPipeline,
                label,
                "effect resources are not initialized",
            )),
        }
    }

    /// Release everything and enter the destroyed state. Idempotent.
    pub fn destroy(&mut self, device: &dyn GpuDevice) {
        if self.destroyed {
            return;
        }
        self.release_objects(device);
        self.destroyed = true;
    }

    fn release_objects(&mut self, device: &dyn GpuDevice) {
        let owned: [Option<GpuResource>; 8] = [
            self.bind_group.take().map(Into::into),
            self.pipeline.take().map(Into::into),
            self.pipeline_layout.take().map(Into::into),
            self.vertex_shader.take().map(Into::into),
            self.fragment_shader.take().map(Into::into),
            self.bind_group_layout.take().map(Into::into),
            self.sampler.take().map(Into::into),
            self.uniform_buffer.take().map(Into::into),
        ];
        for resource in owned.into_iter().flatten() {
            device.release(resource);
        }
        self.last_input = None;
        self.initialized = false;
    }
}
