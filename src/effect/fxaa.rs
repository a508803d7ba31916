// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Fast approximate anti-aliasing.

use super::fullscreen::{EffectUniforms, FullscreenEffect};
use super::params::{update_clamped, ParamMap, ParamValue};
use super::shader_source::FXAA_FS;
use bytemuck::{Pod, Zeroable};

/// FXAA parameters, each in 0..1
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FxaaParams {
    /// Amount of sub-pixel smoothing
    pub subpixel_quality: f32,
    /// Relative local contrast needed to treat a pixel as an edge
    pub edge_threshold: f32,
    /// Absolute contrast floor, skips dark areas
    pub edge_threshold_min: f32,
}

impl Default for FxaaParams {
    fn default() -> Self {
        Self {
            subpixel_quality: 0.75,
            edge_threshold: 0.166,
            edge_threshold_min: 0.0833,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FxaaUniforms {
    pub subpixel_quality: f32,
    pub edge_threshold: f32,
    pub edge_threshold_min: f32,
    pub _pad: f32,
}

impl EffectUniforms for FxaaParams {
    type Gpu = FxaaUniforms;
    const NAME: &'static str = "fxaa";
    const FRAGMENT_SHADER: &'static str = FXAA_FS;

    fn set_param(&mut self, key: &str, value: &ParamValue) -> bool {
        let slot = match key {
            "subpixel_quality" => &mut self.subpixel_quality,
            "edge_threshold" => &mut self.edge_threshold,
            "edge_threshold_min" => &mut self.edge_threshold_min,
            _ => return false,
        };
        update_clamped(slot, key, value, 0.0, 1.0);
        true
    }

    fn params(&self) -> ParamMap {
        ParamMap::new()
            .with("subpixel_quality", self.subpixel_quality)
            .with("edge_threshold", self.edge_threshold)
            .with("edge_threshold_min", self.edge_threshold_min)
    }

    fn to_gpu(&self) -> FxaaUniforms {
        FxaaUniforms {
            subpixel_quality: self.subpixel_quality,
            edge_threshold: self.edge_threshold,
            edge_threshold_min: self.edge_threshold_min,
            _pad: 0.0,
        }
    }
}

pub type FxaaEffect = FullscreenEffect<FxaaParams>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{ColorFormat, Effect};

    #[test]
    fn every_key_is_clamped_to_unit_range() {
        let mut fxaa = FxaaEffect::new(ColorFormat::Rgba8Unorm);
        fxaa.set_parameters(
            &ParamMap::new()
                .with("subpixel_quality", 2.0)
                .with("edge_threshold", -1.0)
                .with("edge_threshold_min", 0.05),
        );
        let p = fxaa.uniforms();
        assert_eq!(p.subpixel_quality, 1.0);
        assert_eq!(p.edge_threshold, 0.0);
        assert_eq!(p.edge_threshold_min, 0.05);
    }

    #[test]
    fn params_round_trip_through_map() {
        let fxaa = FxaaEffect::new(ColorFormat::Rgba8Unorm);
        let map = fxaa.parameters();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get_f32("subpixel_quality"), Some(0.75));
    }
}
