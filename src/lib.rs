// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! rust_pixel_postfx is a screen-space post-processing chain for RustPixel style
//! wgpu renderers. An already rendered colour image goes in, an ordered list of
//! effects (tone mapping, fxaa, blur, brightness / contrast, vignette) runs over
//! it, and the view holding the final image comes out.
//!
//! The chain reuses exactly two intermediate render targets no matter how many
//! effects are enabled (ping-pong buffering). Each effect builds its pipeline on
//! first use and only rebuilds its bind group when the view it samples changes.
//!
//! Modules:
//! - `gpu`: device / encoder traits, typed handles, headless and wgpu backends
//! - `render_target`: fixed size colour attachment
//! - `effect`: the `Effect` trait and the built-in effects
//! - `chain`: `EffectChainManager`, the per-frame ping-pong algorithm
//! - `config`: TOML / JSON presets for chains and effects
//! - `log`: log4rs file logger setup
//!
//! ```ignore
//! use rust_pixel_postfx::chain::{ChainOptions, EffectChainManager};
//! use rust_pixel_postfx::effect::*;
//! use rust_pixel_postfx::gpu::{CommandList, HeadlessDevice};
//!
//! let device = HeadlessDevice::new();
//! let mut chain = EffectChainManager::new(&device, ChainOptions::new(1280, 720).hdr(true))?;
//! chain.add_effect(shared(ToneMappingEffect::new(chain.format())));
//! chain.add_effect(shared(FxaaEffect::new(chain.format())));
//!
//! let scene = device.import_view();
//! let mut encoder = CommandList::new();
//! let final_view = chain.process(&device, &mut encoder, scene)?;
//! ```

pub mod chain;
pub mod config;
pub mod effect;
pub mod error;
pub mod gpu;
#[cfg(feature = "log4rs")]
pub mod log;
pub mod render_target;

pub use chain::{ChainOptions, ChainStats, EffectChainManager};
pub use config::{EffectKind, EffectPreset, PostFxConfig};
pub use effect::{shared, Effect, EffectRef, ParamMap, ParamValue};
pub use error::{PostFxError, PostFxResult};
pub use render_target::{RenderTarget, RenderTargetDesc};
