// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Backend-neutral command encoder that just keeps the recorded draws.

use super::{CommandEncoder, FullscreenDraw, ViewHandle};
use crate::error::PostFxResult;

/// Ordered list of recorded full-screen draws
#[derive(Clone, Debug, Default)]
pub struct CommandList {
    draws: Vec<FullscreenDraw>,
}

impl CommandList {
    pub fn new() -> Self {
        Self { draws: Vec::new() }
    }

    pub fn draws(&self) -> &[FullscreenDraw] {
        &self.draws
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Targets in recording order
    pub fn targets(&self) -> Vec<ViewHandle> {
        self.draws.iter().map(|d| d.target).collect()
    }

    /// Drop recorded draws, e.g. at the start of a new frame
    pub fn clear(&mut self) {
        self.draws.clear();
    }
}

impl CommandEncoder for CommandList {
    fn draw_fullscreen(&mut self, draw: &FullscreenDraw) -> PostFxResult<()> {
        self.draws.push(draw.clone());
        Ok(())
    }
}
