// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! HDR to display tone mapping.

use super::fullscreen::{EffectUniforms, FullscreenEffect};
use super::params::{update_clamped, ParamMap, ParamValue};
use super::shader_source::TONE_MAPPING_FS;
use bytemuck::{Pod, Zeroable};
use log::debug;
use std::fmt;
use std::str::FromStr;

/// Tone curve; the discriminant is the value the shader switches on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ToneMappingMode {
    Linear = 0,
    Reinhard = 1,
    #[default]
    Aces = 2,
    Uncharted2 = 3,
}

impl ToneMappingMode {
    pub fn all() -> [ToneMappingMode; 4] {
        [
            ToneMappingMode::Linear,
            ToneMappingMode::Reinhard,
            ToneMappingMode::Aces,
            ToneMappingMode::Uncharted2,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToneMappingMode::Linear => "linear",
            ToneMappingMode::Reinhard => "reinhard",
            ToneMappingMode::Aces => "aces",
            ToneMappingMode::Uncharted2 => "uncharted2",
        }
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::all().into_iter().find(|m| *m as u32 == index)
    }

    /// Accepts a mode name or a numeric index
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Text(s) => s.parse().ok(),
            ParamValue::Number(n) if n.fract() == 0.0 && *n >= 0.0 => {
                Self::from_index(*n as u32)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ToneMappingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToneMappingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|m| m.name() == lower)
            .ok_or_else(|| format!("unknown tone mapping mode '{}'", s))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneMappingParams {
    pub mode: ToneMappingMode,
    /// Linear scale applied before the curve, >= 0
    pub exposure: f32,
    /// Output gamma, 0.1..5
    pub gamma: f32,
}

impl Default for ToneMappingParams {
    fn default() -> Self {
        Self {
            mode: ToneMappingMode::Aces,
            exposure: 1.0,
            gamma: 2.2,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ToneMappingUniforms {
    pub mode: u32,
    pub exposure: f32,
    pub gamma: f32,
    pub _pad: f32,
}

impl EffectUniforms for ToneMappingParams {
    type Gpu = ToneMappingUniforms;
    const NAME: &'static str = "tone_mapping";
    const FRAGMENT_SHADER: &'static str = TONE_MAPPING_FS;

    fn set_param(&mut self, key: &str, value: &ParamValue) -> bool {
        match key {
            "mode" => match ToneMappingMode::from_param(value) {
                Some(mode) => self.mode = mode,
                None => debug!("ignoring value {:?} for parameter 'mode'", value),
            },
            "exposure" => update_clamped(&mut self.exposure, key, value, 0.0, f32::MAX),
            "gamma" => update_clamped(&mut self.gamma, key, value, 0.1, 5.0),
            _ => return false,
        }
        true
    }

    fn params(&self) -> ParamMap {
        ParamMap::new()
            .with("mode", self.mode.name())
            .with("exposure", self.exposure)
            .with("gamma", self.gamma)
    }

    fn to_gpu(&self) -> ToneMappingUniforms {
        ToneMappingUniforms {
            mode: self.mode as u32,
            exposure: self.exposure,
            gamma: self.gamma,
            _pad: 0.0,
        }
    }
}

pub type ToneMappingEffect = FullscreenEffect<ToneMappingParams>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{ColorFormat, Effect};

    #[test]
    fn mode_by_name_or_index() {
        let mut tm = ToneMappingEffect::new(ColorFormat::Rgba8Unorm);
        assert_eq!(tm.uniforms().mode, ToneMappingMode::Aces);
        tm.set_parameters(&ParamMap::new().with("mode", "Reinhard"));
        assert_eq!(tm.uniforms().mode, ToneMappingMode::Reinhard);
        tm.set_parameters(&ParamMap::new().with("mode", 3));
        assert_eq!(tm.uniforms().mode, ToneMappingMode::Uncharted2);
    }

    #[test]
    fn bad_mode_is_ignored() {
        let mut tm = ToneMappingEffect::new(ColorFormat::Rgba8Unorm);
        tm.set_parameters(&ParamMap::new().with("mode", 7));
        tm.set_parameters(&ParamMap::new().with("mode", 1.5));
        tm.set_parameters(&ParamMap::new().with("mode", "filmic"));
        assert_eq!(tm.uniforms().mode, ToneMappingMode::Aces);
    }

    #[test]
    fn exposure_and_gamma_ranges() {
        let mut tm = ToneMappingEffect::new(ColorFormat::Rgba16Float);
        tm.set_parameters(&ParamMap::new().with("exposure", -2.0).with("gamma", 0.0));
        assert_eq!(tm.uniforms().exposure, 0.0);
        assert_eq!(tm.uniforms().gamma, 0.1);
        tm.set_parameters(&ParamMap::new().with("exposure", 16.0).with("gamma", 9.0));
        assert_eq!(tm.uniforms().exposure, 16.0);
        assert_eq!(tm.uniforms().gamma, 5.0);
    }

    #[test]
    fn gpu_block_carries_mode_index() {
        let params = ToneMappingParams {
            mode: ToneMappingMode::Linear,
            ..Default::default()
        };
        assert_eq!(params.to_gpu().mode, 0);
        assert_eq!(std::mem::size_of::<ToneMappingUniforms>(), 16);
        assert_eq!("uncharted2".parse::<ToneMappingMode>(), Ok(ToneMappingMode::Uncharted2));
    }
}
