// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Chain level behaviour, driven by the headless device.

use rust_pixel_postfx::effect::{
    shared, BlurEffect, Effect, EffectRef, FxaaEffect, ParamMap, ToneMappingEffect,
};
use rust_pixel_postfx::error::PostFxResult;
use rust_pixel_postfx::gpu::{
    ColorFormat, CommandEncoder, CommandList, GpuDevice, GpuResource, HeadlessDevice,
    ResourceKind, ViewHandle,
};
use rust_pixel_postfx::{ChainOptions, EffectChainManager, PostFxError};
use std::cell::RefCell;
use std::rc::Rc;

type ApplyLog = Rc<RefCell<Vec<(String, ViewHandle, ViewHandle)>>>;

/// Effect that records its apply calls and touches no GPU state
struct RecordingEffect {
    name: String,
    enabled: bool,
    log: ApplyLog,
}

impl RecordingEffect {
    fn new(name: &str, log: &ApplyLog) -> EffectRef {
        shared(Self {
            name: name.to_string(),
            enabled: true,
            log: log.clone(),
        })
    }
}

impl Effect for RecordingEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_parameters(&mut self, _params: &ParamMap) {}

    fn apply(
        &mut self,
        _device: &dyn GpuDevice,
        _encoder: &mut dyn CommandEncoder,
        input: ViewHandle,
        output: ViewHandle,
    ) -> PostFxResult<()> {
        self.log
            .borrow_mut()
            .push((self.name.clone(), input, output));
        Ok(())
    }

    fn destroy(&mut self, _device: &dyn GpuDevice) {}
}

fn setup() -> (HeadlessDevice, EffectChainManager, ApplyLog) {
    let dev = HeadlessDevice::new();
    let chain = EffectChainManager::new(&dev, ChainOptions::new(64, 32)).unwrap();
    (dev, chain, Rc::new(RefCell::new(Vec::new())))
}

fn views(chain: &EffectChainManager) -> (ViewHandle, ViewHandle) {
    let v = chain.target_views().unwrap();
    (v[0], v[1])
}

#[test]
fn scenario_a_empty_chain_is_passthrough() {
    let (dev, mut chain, log) = setup();
    let x = dev.import_view();
    dev.clear_calls();
    let mut list = CommandList::new();

    let out = chain.process(&dev, &mut list, x).unwrap();
    assert_eq!(out, x);
    assert!(log.borrow().is_empty());
    assert_eq!(dev.call_count(), 0);
    assert!(list.is_empty());
}

#[test]
fn scenario_b_single_effect_writes_first_target() {
    let (dev, mut chain, log) = setup();
    let (t0, _) = views(&chain);
    chain.add_effect(RecordingEffect::new("e", &log));
    let x = dev.import_view();

    let out = chain.process(&dev, &mut CommandList::new(), x).unwrap();
    assert_eq!(out, t0);
    assert_eq!(*log.borrow(), vec![("e".to_string(), x, t0)]);
    assert_eq!(chain.last_output_index(), Some(0));
}

#[test]
fn scenario_c_three_effects_ping_pong() {
    let (dev, mut chain, log) = setup();
    let (t0, t1) = views(&chain);
    for name in ["a", "b", "c"] {
        chain.add_effect(RecordingEffect::new(name, &log));
    }
    let x = dev.import_view();

    let out = chain.process(&dev, &mut CommandList::new(), x).unwrap();
    assert_eq!(out, t0);
    assert_eq!(
        *log.borrow(),
        vec![
            ("a".to_string(), x, t0),
            ("b".to_string(), t0, t1),
            ("c".to_string(), t1, t0),
        ]
    );
}

#[test]
fn scenario_d_disabled_effect_is_skipped() {
    let (dev, mut chain, log) = setup();
    let (t0, t1) = views(&chain);
    let c = RecordingEffect::new("c", &log);
    c.borrow_mut().set_enabled(false);
    chain.add_effect(RecordingEffect::new("a", &log));
    chain.add_effect(c);
    chain.add_effect(RecordingEffect::new("b", &log));
    let x = dev.import_view();

    let out = chain.process(&dev, &mut CommandList::new(), x).unwrap();
    assert_eq!(out, t1);
    assert_eq!(
        *log.borrow(),
        vec![("a".to_string(), x, t0), ("b".to_string(), t0, t1)]
    );
}

#[test]
fn final_index_follows_swap_rule() {
    for n in 1..=6usize {
        let (dev, mut chain, log) = setup();
        let (t0, t1) = views(&chain);
        for i in 0..n {
            chain.add_effect(RecordingEffect::new(&format!("fx{}", i), &log));
        }
        let x = dev.import_view();
        let out = chain.process(&dev, &mut CommandList::new(), x).unwrap();

        let mut index = 0;
        let mut current = x;
        for (i, (_, input, output)) in log.borrow().iter().enumerate() {
            let expected_out = if index == 0 { t0 } else { t1 };
            assert_eq!(*input, current);
            assert_eq!(*output, expected_out);
            assert_ne!(input, output);
            if i + 1 < n {
                current = expected_out;
                index = 1 - index;
            }
        }
        assert_eq!(log.borrow().len(), n);
        assert_eq!(out, if index == 0 { t0 } else { t1 });
    }
}

#[test]
fn repeated_frames_keep_two_targets() {
    let (dev, mut chain, _) = setup();
    let format = chain.format();
    chain.add_effect(shared(ToneMappingEffect::new(format)));
    chain.add_effect(shared(FxaaEffect::new(format)));
    chain.add_effect(shared(BlurEffect::new(format)));
    let x = dev.import_view();

    let mut list = CommandList::new();
    let first = chain.process(&dev, &mut list, x).unwrap();
    let second = chain.process(&dev, &mut list, x).unwrap();
    assert_eq!(first, second);
    assert_eq!(dev.created_count(ResourceKind::Texture), 2);
    assert_eq!(dev.live_count(ResourceKind::Texture), 2);
    assert_eq!(chain.stats().buffer_count, 2);
    // one pipeline and one bind group per effect, nothing rebuilt on frame two
    assert_eq!(dev.created_count(ResourceKind::RenderPipeline), 3);
    assert_eq!(dev.created_count(ResourceKind::BindGroup), 3);
    assert_eq!(list.len(), 6);
}

#[test]
fn disabling_everything_restores_passthrough() {
    let (dev, mut chain, _) = setup();
    let blur = shared(BlurEffect::new(chain.format()));
    chain.add_effect(blur.clone());
    let x = dev.import_view();
    let mut list = CommandList::new();
    assert_ne!(chain.process(&dev, &mut list, x).unwrap(), x);

    blur.borrow_mut().set_enabled(false);
    dev.clear_calls();
    let drawn = list.len();
    assert_eq!(chain.process(&dev, &mut list, x).unwrap(), x);
    assert_eq!(dev.call_count(), 0);
    assert_eq!(list.len(), drawn);
}

#[test]
fn resize_never_reuses_old_handles() {
    let (dev, mut chain, _) = setup();
    let blur = shared(BlurEffect::new(chain.format()));
    chain.add_effect(blur.clone());
    let x = dev.import_view();
    let mut list = CommandList::new();
    chain.process(&dev, &mut list, x).unwrap();

    let (old0, old1) = views(&chain);
    assert_eq!(chain.stats().buffer_count, 2);
    chain.resize(&dev, 128, 96).unwrap();
    let (new0, new1) = views(&chain);
    assert_eq!(chain.stats().buffer_count, 2);
    assert_eq!(chain.size(), (128, 96));
    for old in [old0, old1] {
        assert_ne!(old, new0);
        assert_ne!(old, new1);
        assert!(!dev.is_live(GpuResource::View(old)));
    }

    let out = chain.process(&dev, &mut list, x).unwrap();
    assert_eq!(out, new0);
    assert_eq!(list.targets().last(), Some(&new0));
    assert_eq!(dev.live_count(ResourceKind::Texture), 2);
}

#[test]
fn shared_effect_rebinds_when_input_changes() {
    let (dev, mut chain, _) = setup();
    let (t0, _) = views(&chain);
    let blur = shared(BlurEffect::new(chain.format()));
    let fxaa = shared(FxaaEffect::new(chain.format()));
    chain.add_effect(blur.clone());
    chain.add_effect(fxaa.clone());

    let x = dev.import_view();
    let mut list = CommandList::new();
    chain.process(&dev, &mut list, x).unwrap();
    assert_eq!(dev.created_count(ResourceKind::BindGroup), 2);

    // dropping blur moves fxaa's input from t0 to the scene view
    assert!(chain.remove_effect(&blur));
    let out = chain.process(&dev, &mut list, x).unwrap();
    assert_eq!(out, t0);
    assert_eq!(dev.created_count(ResourceKind::BindGroup), 3);
    assert_eq!(dev.live_count(ResourceKind::BindGroup), 2);
}

#[test]
fn blur_radius_is_clamped_through_the_chain() {
    let (dev, mut chain, _) = setup();
    chain.add_effect(shared(BlurEffect::new(chain.format())));
    let blur = chain.effect_by_name("blur").unwrap();
    blur.borrow_mut()
        .set_parameters(&ParamMap::new().with("radius", 999));
    assert_eq!(blur.borrow().parameters().get_f32("radius"), Some(20.0));

    let x = dev.import_view();
    chain.process(&dev, &mut CommandList::new(), x).unwrap();
}

#[test]
fn effect_failure_aborts_frame() {
    let (dev, mut chain, log) = setup();
    chain.add_effect(shared(BlurEffect::new(chain.format())));
    chain.add_effect(RecordingEffect::new("after", &log));
    let x = dev.import_view();
    dev.fail_next(ResourceKind::BindGroup);

    let mut list = CommandList::new();
    let err = chain.process(&dev, &mut list, x).unwrap_err();
    assert!(matches!(
        err,
        PostFxError::Allocation {
            kind: ResourceKind::BindGroup,
            ..
        }
    ));
    assert!(log.borrow().is_empty());
    assert!(list.is_empty());

    // the next frame succeeds without rebuilding the pipeline
    chain.process(&dev, &mut list, x).unwrap();
    assert_eq!(dev.created_count(ResourceKind::RenderPipeline), 1);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn effect_shared_between_chains_survives_teardown() {
    let dev = HeadlessDevice::new();
    let blur = shared(BlurEffect::new(ColorFormat::Rgba8Unorm));
    let mut a = EffectChainManager::new(&dev, ChainOptions::new(16, 16).with_label("a")).unwrap();
    let mut b = EffectChainManager::new(&dev, ChainOptions::new(16, 16).with_label("b")).unwrap();
    a.add_effect(blur.clone());
    b.add_effect(blur.clone());

    let x = dev.import_view();
    let mut list = CommandList::new();
    a.process(&dev, &mut list, x).unwrap();
    a.destroy(&dev);

    let out = b.process(&dev, &mut list, x).unwrap();
    assert_eq!(list.targets().last(), Some(&out));
    assert_eq!(dev.live_count(ResourceKind::Texture), 2);

    b.destroy(&dev);
    blur.borrow_mut().destroy(&dev);
    assert_eq!(dev.live_count(ResourceKind::RenderPipeline), 0);
    assert_eq!(dev.live_count(ResourceKind::Texture), 0);
}

#[test]
fn hdr_stats_use_eight_bytes_per_pixel() {
    let dev = HeadlessDevice::new();
    let mut chain = EffectChainManager::new(&dev, ChainOptions::new(64, 32).hdr(true)).unwrap();
    assert_eq!(chain.stats().total_memory_usage, 2 * 64 * 32 * 8);
    chain.resize(&dev, 10, 10).unwrap();
    assert_eq!(chain.stats().total_memory_usage, 2 * 10 * 10 * 8);
}

#[test]
fn clear_effects_keeps_effects_alive() {
    let (dev, mut chain, _) = setup();
    let blur = shared(BlurEffect::new(chain.format()));
    chain.add_effect(blur.clone());
    let x = dev.import_view();
    let mut list = CommandList::new();
    chain.process(&dev, &mut list, x).unwrap();

    chain.clear_effects();
    assert!(chain.effects().is_empty());
    assert_eq!(chain.stats().effect_count, 0);
    assert_eq!(dev.live_count(ResourceKind::RenderPipeline), 1);
    assert_eq!(dev.live_count(ResourceKind::BindGroup), 1);
    assert_eq!(chain.process(&dev, &mut list, x).unwrap(), x);

    // still usable from another chain
    let mut other = EffectChainManager::new(&dev, ChainOptions::new(64, 32)).unwrap();
    other.add_effect(blur);
    other.process(&dev, &mut list, x).unwrap();
    assert_eq!(dev.created_count(ResourceKind::RenderPipeline), 1);
}

#[test]
fn duplicate_effect_is_applied_twice() {
    let (dev, mut chain, log) = setup();
    let (t0, t1) = views(&chain);
    let fx = RecordingEffect::new("twice", &log);
    chain.add_effect(fx.clone());
    chain.add_effect(fx);
    assert_eq!(chain.effects().len(), 2);
    let x = dev.import_view();

    let out = chain.process(&dev, &mut CommandList::new(), x).unwrap();
    assert_eq!(out, t1);
    assert_eq!(
        *log.borrow(),
        vec![("twice".to_string(), x, t0), ("twice".to_string(), t0, t1)]
    );
}

#[test]
fn remove_effect_drops_first_occurrence_only() {
    let (dev, mut chain, log) = setup();
    let a = RecordingEffect::new("a", &log);
    let b = RecordingEffect::new("b", &log);
    chain.add_effect(a.clone());
    chain.add_effect(b.clone());
    chain.add_effect(a.clone());

    assert!(chain.remove_effect(&a));
    let names: Vec<String> = chain
        .effects()
        .iter()
        .map(|e| e.borrow().name().to_string())
        .collect();
    assert_eq!(names, vec!["b", "a"]);

    let x = dev.import_view();
    chain.process(&dev, &mut CommandList::new(), x).unwrap();
    let applied: Vec<String> = log.borrow().iter().map(|(n, _, _)| n.clone()).collect();
    assert_eq!(applied, vec!["b", "a"]);

    assert!(chain.remove_effect(&a));
    assert!(!chain.remove_effect(&a));
    assert_eq!(chain.effects().len(), 1);
}

#[test]
fn feeding_back_the_output_is_an_error() {
    let (dev, mut chain, _) = setup();
    chain.add_effect(shared(BlurEffect::new(chain.format())));
    chain.add_effect(shared(FxaaEffect::new(chain.format())));
    let x = dev.import_view();
    let mut list = CommandList::new();
    let out = chain.process(&dev, &mut list, x).unwrap();
    let drawn = list.len();

    assert!(matches!(
        chain.process(&dev, &mut list, out),
        Err(PostFxError::InputAliasesTarget { .. })
    ));
    assert_eq!(list.len(), drawn);
    for draw in list.draws() {
        let sampled = dev.bound_views(draw.bind_group);
        assert!(!sampled.contains(&draw.target));
    }
}
