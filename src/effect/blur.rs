// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Gaussian blur.

use super::fullscreen::{EffectUniforms, FullscreenEffect};
use super::params::{update_clamped, ParamMap, ParamValue};
use super::shader_source::BLUR_FS;
use bytemuck::{Pod, Zeroable};

pub const RADIUS_MIN: f32 = 1.0;
pub const RADIUS_MAX: f32 = 20.0;

/// Blur parameters
///
/// - `radius`: kernel radius in pixels, 1..20
/// - `intensity`: blend between source and blurred image, 0..2
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurParams {
    pub radius: f32,
    pub intensity: f32,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            radius: 5.0,
            intensity: 1.0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BlurUniforms {
    pub radius: f32,
    pub intensity: f32,
    pub _pad: [f32; 2],
}

impl EffectUniforms for BlurParams {
    type Gpu = BlurUniforms;
    const NAME: &'static str = "blur";
    const FRAGMENT_SHADER: &'static str = BLUR_FS;

    fn set_param(&mut self, key: &str, value: &ParamValue) -> bool {
        match key {
            "radius" => update_clamped(&mut self.radius, key, value, RADIUS_MIN, RADIUS_MAX),
            "intensity" => update_clamped(&mut self.intensity, key, value, 0.0, 2.0),
            _ => return false,
        }
        true
    }

    fn params(&self) -> ParamMap {
        ParamMap::new()
            .with("radius", self.radius)
            .with("intensity", self.intensity)
    }

    fn to_gpu(&self) -> BlurUniforms {
        BlurUniforms {
            radius: self.radius,
            intensity: self.intensity,
            _pad: [0.0; 2],
        }
    }
}

pub type BlurEffect = FullscreenEffect<BlurParams>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{ColorFormat, Effect};

    #[test]
    fn radius_is_clamped() {
        let mut blur = BlurEffect::new(ColorFormat::Rgba8Unorm);
        blur.set_parameters(&ParamMap::new().with("radius", 999));
        assert_eq!(blur.uniforms().radius, 20.0);
        blur.set_parameters(&ParamMap::new().with("radius", 0.25));
        assert_eq!(blur.uniforms().radius, 1.0);
    }

    #[test]
    fn partial_update_keeps_other_keys() {
        let mut blur = BlurEffect::new(ColorFormat::Rgba8Unorm);
        blur.set_parameters(&ParamMap::new().with("intensity", 1.5));
        assert_eq!(
            *blur.uniforms(),
            BlurParams {
                radius: 5.0,
                intensity: 1.5
            }
        );
    }

    #[test]
    fn uniform_block_is_16_bytes() {
        assert_eq!(std::mem::size_of::<BlurUniforms>(), 16);
    }
}
