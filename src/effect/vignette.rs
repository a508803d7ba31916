// RustPixel
// copyright zipxing@hotmail.com 2022～2025

use super::fullscreen::{EffectUniforms, FullscreenEffect};
use super::params::{update_clamped, ParamMap, ParamValue};
use super::shader_source::VIGNETTE_FS;
use bytemuck::{Pod, Zeroable};

/// Edge darkening; `intensity` and `smoothness` in 0..1
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VignetteParams {
    pub intensity: f32,
    pub smoothness: f32,
}

impl Default for VignetteParams {
    fn default() -> Self {
        Self {
            intensity: 0.5,
            smoothness: 0.5,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct VignetteUniforms {
    pub intensity: f32,
    pub smoothness: f32,
    pub _pad: [f32; 2],
}

impl EffectUniforms for VignetteParams {
    type Gpu = VignetteUniforms;
    const NAME: &'static str = "vignette";
    const FRAGMENT_SHADER: &'static str = VIGNETTE_FS;

    fn set_param(&mut self, key: &str, value: &ParamValue) -> bool {
        match key {
            "intensity" => update_clamped(&mut self.intensity, key, value, 0.0, 1.0),
            "smoothness" => update_clamped(&mut self.smoothness, key, value, 0.0, 1.0),
            _ => return false,
        }
        true
    }

    fn params(&self) -> ParamMap {
        ParamMap::new()
            .with("intensity", self.intensity)
            .with("smoothness", self.smoothness)
    }

    fn to_gpu(&self) -> VignetteUniforms {
        VignetteUniforms {
            intensity: self.intensity,
            smoothness: self.smoothness,
            _pad: [0.0; 2],
        }
    }
}

pub type VignetteEffect = FullscreenEffect<VignetteParams>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{ColorFormat, Effect};

    #[test]
    fn clamps() {
        let mut v = VignetteEffect::new(ColorFormat::Rgba8Unorm);
        v.set_parameters(&ParamMap::new().with("intensity", 1.7));
        assert_eq!(v.uniforms().intensity, 1.0);
        assert_eq!(v.uniforms().smoothness, 0.5);
    }
}
