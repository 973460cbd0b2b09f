//! Windowless run against the in-memory backend.

use anyhow::{Context, Result};
use tracing::info;

use showcase_core::{Config, FrameTiming};
use showcase_renderer::headless::HeadlessContext;
use showcase_renderer::{
    Extent, FrameCycle, FrameInput, GpuContext, SetupOptions, StatsOverlay,
};
use showcase_techniques::TechniqueKind;

use crate::{camera_from_config, setup_options};

const FRAME_DELTA: f32 = 1.0 / 60.0;

/// What a headless run recorded.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HeadlessReport {
    pub frames: u32,
    pub draws: usize,
    pub buffer_writes: u32,
}

/// Prepares `kind` and renders `frames` frames, halving the surface once
/// half way through so the resize path runs too.
pub fn run(kind: TechniqueKind, config: &Config, frames: u32) -> Result<HeadlessReport> {
    let extent = Extent::new(config.window.width, config.window.height);
    let mut ctx = HeadlessContext::new(extent).with_fallback_models();
    let mut cycle = FrameCycle::with_overlay(kind.build(), Box::new(StatsOverlay::new()));

    let options: SetupOptions = setup_options(config);
    cycle
        .prepare(&mut ctx, &options)
        .with_context(|| format!("preparing '{}'", kind))?;

    let camera = camera_from_config(&config.camera, extent);
    let resize_at = u64::from(frames / 2);
    let mut report = HeadlessReport::default();

    for frame in 0..u64::from(frames) {
        if frame > 0 && frame == resize_at {
            let resized = Extent::new((extent.width / 2).max(1), (extent.height / 2).max(1));
            info!("Resizing headless surface to {}", resized);
            ctx.set_extent(resized);
            cycle.resize(resized);
        }

        let mut log = ctx.recorder();
        let input = FrameInput {
            camera: camera.clone(),
            extent: ctx.extent(),
            timing: FrameTiming::fixed(frame, FRAME_DELTA),
        };
        let slot = cycle
            .render(&mut ctx, &mut log, &input, frame)
            .with_context(|| format!("rendering frame {}", frame))?;

        info!("Frame {} ({}, {}): {}", frame, slot, input.extent, log.summary());
        report.frames += 1;
        report.draws += log.draw_count();
    }

    report.buffer_writes = ctx.total_buffer_writes();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_assets(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.paths.assets = dir.to_path_buf();
        config
    }

    #[test]
    fn test_every_technique_runs_headless() {
        let assets = tempfile::tempdir().unwrap();
        let config = config_with_assets(assets.path());

        for kind in TechniqueKind::all() {
            let report = run(kind, &config, 4).unwrap();
            assert_eq!(report.frames, 4, "{}", kind);
            assert_eq!(report.buffer_writes, 4, "{}", kind);
            assert!(report.draws >= 4, "{}", kind);
        }
    }

    #[test]
    fn test_push_constants_draws_every_sphere() {
        let assets = tempfile::tempdir().unwrap();
        let config = config_with_assets(assets.path());

        let report = run(TechniqueKind::PushConstants, &config, 2).unwrap();
        assert_eq!(report.draws, 2 * showcase_techniques::SPHERE_COUNT);
    }

    #[test]
    fn test_zero_frames_only_prepares() {
        let assets = tempfile::tempdir().unwrap();
        let config = config_with_assets(assets.path());

        let report = run(TechniqueKind::FluidDisplay, &config, 0).unwrap();
        assert_eq!(report, HeadlessReport::default());
    }
}
