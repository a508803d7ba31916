// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Brightness / contrast colour adjustment.

use super::fullscreen::{EffectUniforms, FullscreenEffect};
use super::params::{update_clamped, ParamMap, ParamValue};
use super::shader_source::BRIGHTNESS_CONTRAST_FS;
use bytemuck::{Pod, Zeroable};

/// `brightness` is an additive offset in -1..1, `contrast` a scale around
/// mid grey in 0..2
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrightnessContrastParams {
    pub brightness: f32,
    pub contrast: f32,
}

impl Default for BrightnessContrastParams {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BrightnessContrastUniforms {
    pub brightness: f32,
    pub contrast: f32,
    pub _pad: [f32; 2],
}

impl EffectUniforms for BrightnessContrastParams {
    type Gpu = BrightnessContrastUniforms;
    const NAME: &'static str = "brightness_contrast";
    const FRAGMENT_SHADER: &'static str = BRIGHTNESS_CONTRAST_FS;

    fn set_param(&mut self, key: &str, value: &ParamValue) -> bool {
        match key {
            "brightness" => update_clamped(&mut self.brightness, key, value, -1.0, 1.0),
            "contrast" => update_clamped(&mut self.contrast, key, value, 0.0, 2.0),
            _ => return false,
        }
        true
    }

    fn params(&self) -> ParamMap {
        ParamMap::new()
            .with("brightness", self.brightness)
            .with("contrast", self.contrast)
    }

    fn to_gpu(&self) -> BrightnessContrastUniforms {
        BrightnessContrastUniforms {
            brightness: self.brightness,
            contrast: self.contrast,
            _pad: [0.0; 2],
        }
    }
}

pub type BrightnessContrastEffect = FullscreenEffect<BrightnessContrastParams>;
