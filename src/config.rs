// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # Chain Presets
//!
//! A chain and its effects can be described in TOML or JSON:
//!
//! ```toml
//! [chain]
//! width = 1920
//! height = 1080
//! use_hdr = true
//!
//! [[effects]]
//! kind = "tone_mapping"
//! params = { mode = "aces", exposure = 1.2 }
//!
//! [[effects]]
//! kind = "fxaa"
//!
//! [[effects]]
//! kind = "blur"
//! name = "soft_blur"
//! enabled = false
//! params = { radius = 3 }
//! ```

use crate::chain::{ChainOptions, EffectChainManager};
use crate::effect::{
    shared, BlurParams, BrightnessContrastParams, ColorFormat, EffectRef, EffectUniforms,
    FullscreenEffect, FxaaParams, ParamMap, ToneMappingParams, VignetteParams,
};
use crate::error::{PostFxError, PostFxResult};
use crate::gpu::GpuDevice;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Built-in effect types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Fxaa,
    Blur,
    BrightnessContrast,
    ToneMapping,
    Vignette,
}

impl EffectKind {
    /// New effect of this kind with default parameters
    pub fn instantiate(&self, format: ColorFormat) -> EffectRef {
        self.instantiate_named(format, None)
    }

    /// Same as [`EffectKind::instantiate`], optionally overriding the name
    pub fn instantiate_named(&self, format: ColorFormat, name: Option<&str>) -> EffectRef {
        match self {
            EffectKind::Fxaa => build::<FxaaParams>(format, name),
            EffectKind::Blur => build::<BlurParams>(format, name),
            EffectKind::BrightnessContrast => build::<BrightnessContrastParams>(format, name),
            EffectKind::ToneMapping => build::<ToneMappingParams>(format, name),
            EffectKind::Vignette => build::<VignetteParams>(format, name),
        }
    }
}

fn build<U: EffectUniforms>(format: ColorFormat, name: Option<&str>) -> EffectRef {
    let effect = FullscreenEffect::<U>::new(format);
    match name {
        Some(name) => shared(effect.with_name(name)),
        None => shared(effect),
    }
}

fn default_enabled() -> bool {
    true
}

/// One effect entry of a preset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectPreset {
    pub kind: EffectKind,
    /// Overrides the default effect name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub params: ParamMap,
}

impl EffectPreset {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            name: None,
            enabled: true,
            params: ParamMap::new(),
        }
    }

    pub fn build(&self, format: ColorFormat) -> EffectRef {
        let effect = self.kind.instantiate_named(format, self.name.as_deref());
        {
            let mut fx = effect.borrow_mut();
            fx.set_enabled(self.enabled);
            fx.set_parameters(&self.params);
        }
        effect
    }
}

/// Chain options plus an ordered effect list
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostFxConfig {
    #[serde(default)]
    pub chain: ChainOptions,
    #[serde(default)]
    pub effects: Vec<EffectPreset>,
}

impl PostFxConfig {
    pub fn from_toml_str(s: &str) -> PostFxResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> PostFxResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load by extension: `.json` is JSON, anything else TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> PostFxResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_toml_str(&text)?
        };
        info!(
            "PostFxConfig: loaded {} effects from {}",
            config.effects.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn to_toml_string(&self) -> PostFxResult<String> {
        toml::to_string(self).map_err(PostFxError::config)
    }

    /// Instantiate the presets in order, for targets of `format`
    pub fn build_effects(&self, format: ColorFormat) -> Vec<EffectRef> {
        self.effects.iter().map(|p| p.build(format)).collect()
    }

    /// Chain manager with every preset added
    pub fn build_chain(&self, device: &dyn GpuDevice) -> PostFxResult<EffectChainManager> {
        let mut chain = EffectChainManager::new(device, self.chain.clone())?;
        for effect in self.build_effects(chain.format()) {
            chain.add_effect(effect);
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessDevice;

    const PRESET: &str = r#"
[chain]
width = 320
height = 200
use_hdr = true

[[effects]]
kind = "tone_mapping"
params = { mode = "reinhard", exposure = 1.5 }

[[effects]]
kind = "blur"
name = "soft_blur"
enabled = false
params = { radius = 99 }
"#;

    #[test]
    fn toml_preset_builds_chain() {
        let config = PostFxConfig::from_toml_str(PRESET).unwrap();
        assert_eq!(config.chain.width, 320);
        assert!(config.chain.use_hdr);
        assert_eq!(config.chain.label, "post_fx");

        let dev = HeadlessDevice::new();
        let chain = config.build_chain(&dev).unwrap();
        assert_eq!(chain.format(), ColorFormat::Rgba16Float);
        assert_eq!(chain.effects().len(), 2);

        let tm = chain.effect_by_name("tone_mapping").unwrap();
        let params = tm.borrow().parameters();
        assert_eq!(params.get("mode").and_then(|v| v.as_str()), Some("reinhard"));
        assert_eq!(params.get_f32("exposure"), Some(1.5));

        let blur = chain.effect_by_name("soft_blur").unwrap();
        assert!(!blur.borrow().enabled());
        assert_eq!(blur.borrow().parameters().get_f32("radius"), Some(20.0));
        assert_eq!(chain.stats().enabled_effect_count, 1);
    }

    #[test]
    fn json_preset() {
        let config = PostFxConfig::from_json_str(
            r#"{"effects": [{"kind": "vignette", "params": {"intensity": 0.8}}, {"kind": "fxaa"}]}"#,
        )
        .unwrap();
        assert_eq!(config.chain, ChainOptions::default());
        let effects = config.build_effects(ColorFormat::Rgba8Unorm);
        let names: Vec<String> = effects.iter().map(|e| e.borrow().name().to_string()).collect();
        assert_eq!(names, vec!["vignette", "fxaa"]);
    }

    #[test]
    fn unknown_kind_is_a_config_error() {
        let err = PostFxConfig::from_toml_str("[[effects]]\nkind = \"bloom\"\n").unwrap_err();
        assert!(matches!(err, PostFxError::Config(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PostFxConfig::from_file("/nonexistent/post_fx.toml").unwrap_err();
        assert!(matches!(err, PostFxError::Io(_)));
    }

    #[test]
    fn toml_round_trip_keeps_presets() {
        let config = PostFxConfig::from_toml_str(PRESET).unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(PostFxConfig::from_toml_str(&text).unwrap(), config);
    }
}
