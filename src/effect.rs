// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # Post-Processing Effects
//!
//! An effect is a named, independently enable-able unit that records one
//! full-screen draw turning an input view into an output view.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Effect (trait)                               │
//! │    name / enabled / set_parameters / apply / destroy                │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  FullscreenEffect<U: EffectUniforms>                                │
//! │    - EffectResources: pipeline, layouts, sampler, uniform buffer,   │
//! │      bind group keyed by the last input view handle                 │
//! │    - U: clamped parameters + bytemuck uniform block + WGSL shader   │
//! │                                                                     │
//! │  Built-in effects:                                                  │
//! │    - FxaaEffect               (anti-aliasing)                       │
//! │    - BlurEffect               (blur)                                │
//! │    - BrightnessContrastEffect (colour grading)                      │
//! │    - ToneMappingEffect        (hdr -> display)                      │
//! │    - VignetteEffect           (edge darkening)                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! ```text
//!  Uninitialized ──first apply──► Ready ──apply (new input)──► Ready
//!        │                          │     rebuild bind group
//!        └──────────destroy─────────┴──────────► Destroyed
//! ```
//!
//! ## Usage Example
//! ```ignore
//! use rust_pixel_postfx::effect::*;
//!
//! let blur = shared(BlurEffect::new(ColorFormat::Rgba8Unorm));
//! blur.borrow_mut().set_parameters(&ParamMap::new().with("radius", 8.0));
//! chain.add_effect(blur.clone());
//! ```

use crate::error::PostFxResult;
use crate::gpu::{CommandEncoder, GpuDevice, ViewHandle};
use std::cell::RefCell;
use std::rc::Rc;

mod blur;
mod color_adjust;
mod fullscreen;
mod fxaa;
mod params;
mod resources;
pub mod shader_source;
mod tone_mapping;
mod vignette;

pub use blur::{BlurEffect, BlurParams, BlurUniforms};
pub use color_adjust::{BrightnessContrastEffect, BrightnessContrastParams, BrightnessContrastUniforms};
pub use fullscreen::{EffectUniforms, FullscreenEffect};
pub use fxaa::{FxaaEffect, FxaaParams, FxaaUniforms};
pub use params::{update_clamped, ParamMap, ParamValue};
pub use resources::{EffectResources, EffectState, PassSpec};
pub use tone_mapping::{ToneMappingEffect, ToneMappingMode, ToneMappingParams, ToneMappingUniforms};
pub use vignette::{VignetteEffect, VignetteParams, VignetteUniforms};

pub use crate::gpu::ColorFormat;

/// Capability every chain member provides
///
/// The chain manager depends on this trait only, never on concrete effects.
pub trait Effect {
    /// Identity and lookup key
    fn name(&self) -> &str;

    fn enabled(&self) -> bool;

    /// Disabled effects are skipped entirely by the chain
    fn set_enabled(&mut self, enabled: bool);

    /// Partial update: recognized keys are clamped into range, unknown keys
    /// and unspecified keys are left alone. Nothing reaches the GPU until
    /// the next [`Effect::apply`].
    fn set_parameters(&mut self, params: &ParamMap);

    /// Current parameter state
    fn parameters(&self) -> ParamMap {
        ParamMap::new()
    }

    /// Record this effect's draw, sampling `input` and writing `output`
    ///
    /// GPU objects are created on the first call. Allocation or pipeline
    /// failures are returned to the caller; there is no fallback rendering.
    fn apply(
        &mut self,
        device: &dyn GpuDevice,
        encoder: &mut dyn CommandEncoder,
        input: ViewHandle,
        output: ViewHandle,
    ) -> PostFxResult<()>;

    /// Release every GPU object owned by the effect. Idempotent.
    fn destroy(&mut self, device: &dyn GpuDevice);
}

/// Shared effect reference, as stored by chains
///
/// Effects may sit in several chains at once; the application keeps
/// ownership and decides when to destroy them.
pub type EffectRef = Rc<RefCell<dyn Effect>>;

/// Wrap an effect for use in a chain
pub fn shared<E: Effect + 'static>(effect: E) -> EffectRef {
    Rc::new(RefCell::new(effect))
}

/// Identity comparison between effect references, ignoring vtables
pub fn same_effect<A: Effect + ?Sized, B: Effect + ?Sized>(
    a: &Rc<RefCell<A>>,
    b: &Rc<RefCell<B>>,
) -> bool {
    Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_and_erased_refs_compare_by_identity() {
        let blur = Rc::new(RefCell::new(BlurEffect::new(ColorFormat::Rgba8Unorm)));
        let erased: EffectRef = blur.clone();
        let other: EffectRef = shared(BlurEffect::new(ColorFormat::Rgba8Unorm));
        assert!(same_effect(&blur, &erased));
        assert!(!same_effect(&erased, &other));
    }

    #[test]
    fn effects_start_enabled_with_default_names() {
        let fx: Vec<EffectRef> = vec![
            shared(FxaaEffect::new(ColorFormat::Rgba8Unorm)),
            shared(BlurEffect::new(ColorFormat::Rgba8Unorm)),
            shared(BrightnessContrastEffect::new(ColorFormat::Rgba8Unorm)),
            shared(ToneMappingEffect::new(ColorFormat::Rgba8Unorm)),
            shared(VignetteEffect::new(ColorFormat::Rgba8Unorm)),
        ];
        let names: Vec<String> = fx.iter().map(|e| e.borrow().name().to_string()).collect();
        assert_eq!(
            names,
            vec!["fxaa", "blur", "brightness_contrast", "tone_mapping", "vignette"]
        );
        assert!(fx.iter().all(|e| e.borrow().enabled()));
    }
}
