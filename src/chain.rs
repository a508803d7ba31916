// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # Effect Chain Manager
//!
//! Runs an ordered list of effects over a scene image, reusing exactly two
//! intermediate render targets.
//!
//! ## Ping-pong buffering
//! ```text
//!   scene ──fx0──► target[0] ──fx1──► target[1] ──fx2──► target[0] ──► ...
//!                      │                  │                  │
//!                      └── output of fx0 is input of fx1, and so on
//! ```
//! The target index lives in `process` only. After the last effect the index
//! is not flipped, so the returned view is the one written last. A target is
//! never sampled and written by the same draw.
//!
//! The manager owns its two targets. Effects are shared with the caller, who
//! keeps responsibility for destroying them unless
//! [`ChainOptions::destroy_effects_on_teardown`] is set.

use crate::effect::{same_effect, EffectRef};
use crate::error::{PostFxError, PostFxResult};
use crate::gpu::{ColorFormat, CommandEncoder, GpuDevice, ViewHandle};
use crate::render_target::{RenderTarget, RenderTargetDesc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Construction options for [`EffectChainManager`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainOptions {
    pub width: u32,
    pub height: u32,
    /// Target format when `use_hdr` is false
    pub color_format: ColorFormat,
    /// Use `Rgba16Float` targets
    pub use_hdr: bool,
    pub label: String,
    /// Destroy the contained effects together with the manager
    pub destroy_effects_on_teardown: bool,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            color_format: ColorFormat::Rgba8Unorm,
            use_hdr: false,
            label: "post_fx".to_string(),
            destroy_effects_on_teardown: false,
        }
    }
}

impl ChainOptions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn hdr(mut self, use_hdr: bool) -> Self {
        self.use_hdr = use_hdr;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Format the ping-pong targets are created with
    pub fn target_format(&self) -> ColorFormat {
        if self.use_hdr {
            ColorFormat::HDR
        } else {
            self.color_format
        }
    }
}

/// Snapshot of a chain, for logging and debugging
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    pub effect_count: usize,
    pub enabled_effect_count: usize,
    pub buffer_count: usize,
    /// Approximate bytes held by the targets: no mips, padding or alignment
    pub total_memory_usage: u64,
}

impl fmt::Display for ChainStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "effects {}/{} enabled, {} buffers, ~{:.2} MiB",
            self.enabled_effect_count,
            self.effect_count,
            self.buffer_count,
            self.total_memory_usage as f64 / (1024.0 * 1024.0)
        )
    }
}

/// Ordered effect list plus two ping-pong render targets
pub struct EffectChainManager {
    options: ChainOptions,
    format: ColorFormat,
    effects: Vec<EffectRef>,
    /// `None` only after a failed resize
    targets: Option<[RenderTarget; 2]>,
    last_output_index: Option<usize>,
}

impl EffectChainManager {
    /// Allocate the two intermediate targets
    pub fn new(device: &dyn GpuDevice, options: ChainOptions) -> PostFxResult<Self> {
        let format = options.target_format();
        let targets = create_targets(device, &options.label, options.width, options.height, format)?;
        info!(
            "EffectChain '{}': created {}x{} {:?}",
            options.label, options.width, options.height, format
        );
        Ok(Self {
            options,
            format,
            effects: Vec::new(),
            targets: Some(targets),
            last_output_index: None,
        })
    }

    /// Append, no de-duplication
    pub fn add_effect(&mut self, effect: EffectRef) {
        debug!(
            "EffectChain '{}': add '{}'",
            self.options.label,
            effect.borrow().name()
        );
        self.effects.push(effect);
    }

    /// Insert at `index`, or at the end if `index` is past it
    pub fn insert_effect(&mut self, index: usize, effect: EffectRef) {
        let index = index.min(self.effects.len());
        self.effects.insert(index, effect);
    }

    /// Remove the first occurrence of `effect`, compared by identity
    pub fn remove_effect(&mut self, effect: &EffectRef) -> bool {
        match self.effects.iter().position(|e| same_effect(e, effect)) {
            Some(pos) => {
                self.effects.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Empty the list; the effects themselves are left alone
    pub fn clear_effects(&mut self) {
        self.effects.clear();
    }

    pub fn effects(&self) -> &[EffectRef] {
        &self.effects
    }

    /// First effect whose name matches
    pub fn effect_by_name(&self, name: &str) -> Option<EffectRef> {
        self.effects
            .iter()
            .find(|e| e.borrow().name() == name)
            .cloned()
    }

    /// Run every enabled effect in order and return the final view
    ///
    /// With no enabled effect `input` is returned and nothing is recorded.
    /// `input` may not be one of the chain's own targets. The first error
    /// from an effect aborts the frame.
    pub fn process(
        &mut self,
        device: &dyn GpuDevice,
        encoder: &mut dyn CommandEncoder,
        input: ViewHandle,
    ) -> PostFxResult<ViewHandle> {
        let enabled: Vec<&EffectRef> = self
            .effects
            .iter()
            .filter(|e| e.borrow().enabled())
            .collect();
        if enabled.is_empty() {
            return Ok(input);
        }

        let targets = self
            .targets
            .as_ref()
            .ok_or_else(|| PostFxError::MissingRenderTargets(self.options.label.clone()))?;
        let views = [targets[0].color_view_handle(), targets[1].color_view_handle()];
        if views.contains(&input) {
            return Err(PostFxError::InputAliasesTarget {
                label: self.options.label.clone(),
                view: input,
            });
        }

        let mut current = input;
        let mut target_index = 0;
        let last = enabled.len() - 1;
        for (i, effect) in enabled.iter().enumerate() {
            let output = views[target_index];
            effect
                .borrow_mut()
                .apply(device, encoder, current, output)?;
            if i < last {
                current = output;
                target_index = 1 - target_index;
            }
        }

        self.last_output_index = Some(target_index);
        Ok(views[target_index])
    }

    /// Replace both targets with new ones of the given size
    ///
    /// Effects are not notified; they rebind when they see the new views.
    /// If the allocation fails the manager holds no targets until the next
    /// successful resize.
    pub fn resize(&mut self, device: &dyn GpuDevice, width: u32, height: u32) -> PostFxResult<()> {
        self.options.width = width;
        self.options.height = height;
        if let Some(mut old) = self.targets.take() {
            for target in old.iter_mut() {
                target.destroy(device);
            }
        }
        self.last_output_index = None;
        let targets = create_targets(device, &self.options.label, width, height, self.format)?;
        self.targets = Some(targets);
        info!("EffectChain '{}': resized to {}x{}", self.options.label, width, height);
        Ok(())
    }

    pub fn stats(&self) -> ChainStats {
        let buffer_count = if self.targets.is_some() { 2 } else { 0 };
        let bytes_per_pixel: u64 = if self.options.use_hdr { 8 } else { 4 };
        ChainStats {
            effect_count: self.effects.len(),
            enabled_effect_count: self.effects.iter().filter(|e| e.borrow().enabled()).count(),
            buffer_count,
            total_memory_usage: buffer_count as u64
                * self.options.width as u64
                * self.options.height as u64
                * bytes_per_pixel,
        }
    }

    pub fn format(&self) -> ColorFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.options.width, self.options.height)
    }

    pub fn label(&self) -> &str {
        &self.options.label
    }

    pub fn options(&self) -> &ChainOptions {
        &self.options
    }

    /// Target written by the last `process` call; informational only
    pub fn last_output_index(&self) -> Option<usize> {
        self.last_output_index
    }

    /// Views of the two targets, `None` after a failed resize
    pub fn target_views(&self) -> Option<[ViewHandle; 2]> {
        self.targets
            .as_ref()
            .map(|t| [t[0].color_view_handle(), t[1].color_view_handle()])
    }

    /// Release the targets; effects are destroyed only when opted in
    pub fn destroy(mut self, device: &dyn GpuDevice) {
        if let Some(mut targets) = self.targets.take() {
            for target in targets.iter_mut() {
                target.destroy(device);
            }
        }
        if self.options.destroy_effects_on_teardown {
            for effect in &self.effects {
                effect.borrow_mut().destroy(device);
            }
        }
        self.effects.clear();
        info!("EffectChain '{}': destroyed", self.options.label);
    }
}

fn create_targets(
    device: &dyn GpuDevice,
    label: &str,
    width: u32,
    height: u32,
    format: ColorFormat,
) -> PostFxResult<[RenderTarget; 2]> {
    let mut first = RenderTarget::new(
        device,
        &RenderTargetDesc::color(width, height, format, &format!("{} ping", label)),
    )?;
    match RenderTarget::new(
        device,
        &RenderTargetDesc::color(width, height, format, &format!("{} pong", label)),
    ) {
        Ok(second) => Ok([first, second]),
        Err(e) => {
            first.destroy(device);
            Err(e)
        }
    }
}
