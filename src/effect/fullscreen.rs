// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Generic single-pass full-screen effect.
//!
//! Every built-in effect is one fragment shader sampling the input view plus
//! a small uniform block. What differs per effect lives in an
//! [`EffectUniforms`] implementation; the lifecycle is shared here.

use super::params::{ParamMap, ParamValue};
use super::resources::{EffectResources, EffectState, PassSpec};
use super::Effect;
use crate::error::{PostFxError, PostFxResult};
use crate::gpu::{ColorFormat, CommandEncoder, GpuDevice, ViewHandle};
use bytemuck::Pod;
use log::debug;

/// Per-effect parameter block
pub trait EffectUniforms: Clone + Default + 'static {
    /// GPU layout of the uniform block, 16 byte aligned
    type Gpu: Pod;

    /// Default effect name
    const NAME: &'static str;

    /// WGSL fragment shader exporting `fs_main`
    const FRAGMENT_SHADER: &'static str;

    /// Apply one key, clamped. Returns false if the key is unknown.
    fn set_param(&mut self, key: &str, value: &ParamValue) -> bool;

    fn params(&self) -> ParamMap;

    fn to_gpu(&self) -> Self::Gpu;
}

/// Full-screen effect driven by the uniform block `U`
#[derive(Debug)]
pub struct FullscreenEffect<U: EffectUniforms> {
    name: String,
    enabled: bool,
    uniforms: U,
    target_format: ColorFormat,
    resources: EffectResources,
}

impl<U: EffectUniforms> FullscreenEffect<U> {
    /// New effect rendering into targets of `target_format`
    pub fn new(target_format: ColorFormat) -> Self {
        Self {
            name: U::NAME.to_string(),
            enabled: true,
            uniforms: U::default(),
            target_format,
            resources: EffectResources::new(),
        }
    }

    pub fn with_params(mut self, params: &ParamMap) -> Self {
        self.set_parameters(params);
        self
    }

    /// Override the lookup name, e.g. to keep two blurs apart
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn uniforms(&self) -> &U {
        &self.uniforms
    }

    pub fn target_format(&self) -> ColorFormat {
        self.target_format
    }

    pub fn resources(&self) -> &EffectResources {
        &self.resources
    }

    pub fn state(&self) -> EffectState {
        self.resources.state()
    }
}

impl<U: EffectUniforms> Effect for FullscreenEffect<U> {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_parameters(&mut self, params: &ParamMap) {
        for (key, value) in params.iter() {
            if !self.uniforms.set_param(key, value) {
                debug!("Effect '{}': unknown parameter '{}'", self.name, key);
            }
        }
    }

    fn parameters(&self) -> ParamMap {
        self.uniforms.params()
    }

    fn apply(
        &mut self,
        device: &dyn GpuDevice,
        encoder: &mut dyn CommandEncoder,
        input: ViewHandle,
        output: ViewHandle,
    ) -> PostFxResult<()> {
        let spec = PassSpec {
            label: &self.name,
            fragment_source: U::FRAGMENT_SHADER,
            uniform_size: std::mem::size_of::<U::Gpu>() as u64,
            target_format: self.target_format,
        };
        self.resources.ensure_pipeline(device, &spec)?;
        if let Some(actual) = device.view_format(output) {
            if actual != self.target_format {
                return Err(PostFxError::FormatMismatch {
                    label: self.name.clone(),
                    expected: self.target_format,
                    actual,
                });
            }
        }
        self.resources.ensure_bind_group(device, &self.name, input)?;

        let gpu = self.uniforms.to_gpu();
        self.resources
            .write_uniforms(device, bytemuck::bytes_of(&gpu))?;
        self.resources.record(device, encoder, &self.name, output)
    }

    fn destroy(&mut self, device: &dyn GpuDevice) {
        self.resources.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{BlurEffect, BlurUniforms, FxaaEffect};
    use crate::gpu::{CommandList, HeadlessDevice, ResourceKind};

    #[test]
    fn first_apply_builds_and_draws() {
        let dev = HeadlessDevice::new();
        let mut list = CommandList::new();
        let mut blur = BlurEffect::new(ColorFormat::Rgba8Unorm);
        assert_eq!(blur.state(), EffectState::Uninitialized);

        let input = dev.import_view();
        let output = dev.import_view();
        blur.apply(&dev, &mut list, input, output).unwrap();

        assert_eq!(blur.state(), EffectState::Ready);
        assert_eq!(list.len(), 1);
        assert_eq!(list.draws()[0].target, output);
        let bg = blur.resources().bind_group().unwrap();
        assert_eq!(dev.bound_views(bg), vec![input]);
    }

    #[test]
    fn uniforms_written_every_apply() {
        let dev = HeadlessDevice::new();
        let mut list = CommandList::new();
        let mut blur = BlurEffect::new(ColorFormat::Rgba8Unorm);
        let input = dev.import_view();
        let output = dev.import_view();

        blur.apply(&dev, &mut list, input, output).unwrap();
        blur.set_parameters(&ParamMap::new().with("radius", 9.0));
        blur.apply(&dev, &mut list, input, output).unwrap();

        assert_eq!(dev.write_count(), 2);
        let buffer = blur.resources().uniform_buffer().unwrap();
        let bytes = dev.buffer_contents(buffer).unwrap();
        let gpu: BlurUniforms = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!(gpu.radius, 9.0);
        assert_eq!(dev.created_count(ResourceKind::BindGroup), 1);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut blur = BlurEffect::new(ColorFormat::Rgba8Unorm);
        let before = blur.parameters();
        blur.set_parameters(&ParamMap::new().with("sharpness", 3.0));
        assert_eq!(blur.parameters(), before);
    }

    #[test]
    fn apply_after_destroy_fails() {
        let dev = HeadlessDevice::new();
        let mut list = CommandList::new();
        let mut blur = BlurEffect::new(ColorFormat::Rgba8Unorm).with_name("soft");
        let input = dev.import_view();
        let output = dev.import_view();
        blur.apply(&dev, &mut list, input, output).unwrap();
        blur.destroy(&dev);
        blur.destroy(&dev);
        let err = blur.apply(&dev, &mut list, input, output).unwrap_err();
        assert!(matches!(err, PostFxError::EffectDestroyed(name) if name == "soft"));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn output_of_another_format_is_rejected() {
        let dev = HeadlessDevice::new();
        let mut list = CommandList::new();
        let mut fxaa = FxaaEffect::new(ColorFormat::Rgba8Unorm);
        let input = dev.import_view_as(ColorFormat::HDR);
        let output = dev.import_view_as(ColorFormat::HDR);

        let err = fxaa.apply(&dev, &mut list, input, output).unwrap_err();
        assert!(matches!(
            err,
            PostFxError::FormatMismatch {
                expected: ColorFormat::Rgba8Unorm,
                actual: ColorFormat::Rgba16Float,
                ..
            }
        ));
        assert!(list.is_empty());

        let ldr = dev.import_view_as(ColorFormat::Rgba8Unorm);
        fxaa.apply(&dev, &mut list, input, ldr).unwrap();
        assert_eq!(list.targets(), vec![ldr]);
    }

    #[test]
    fn allocation_failure_propagates() {
        let dev = HeadlessDevice::new();
        let mut list = CommandList::new();
        let mut blur = BlurEffect::new(ColorFormat::Rgba8Unorm);
        dev.fail_next(ResourceKind::RenderPipeline);
        let input = dev.import_view();
        let output = dev.import_view();
        assert!(blur.apply(&dev, &mut list, input, output).is_err());
        assert!(list.is_empty());
        assert_eq!(blur.state(), EffectState::Uninitialized);
    }
}
