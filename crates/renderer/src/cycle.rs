//! The frame render cycle: drives a [`Technique`] through its lifecycle.

use tracing::{debug, info, trace};

use crate::FrameSlot;
use crate::context::GpuContext;
use crate::error::{RendererError, RendererResult};
use crate::handles::Extent;
use crate::overlay::{NoOverlay, UiOverlay};
use crate::recorder::{CommandRecorder, RenderPassBegin};
use crate::technique::{FrameInput, SetupContext, SetupOptions, Technique};

/// Lifecycle state of a [`FrameCycle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleState {
    Unprepared,
    Prepared,
    /// A resize arrived; descriptor state is rebuilt before the next frame.
    NeedsDescriptorRebuild,
}

/// Owns a technique and the overlay drawn after it.
pub struct FrameCycle<T: Technique> {
    technique: T,
    overlay: Box<dyn UiOverlay>,
    state: CycleState,
    pending_extent: Option<Extent>,
}

impl<T: Technique> FrameCycle<T> {
    pub fn new(technique: T) -> Self {
        Self::with_overlay(technique, Box::new(NoOverlay))
    }

    pub fn with_overlay(technique: T, overlay: Box<dyn UiOverlay>) -> Self {
        Self {
            technique,
            overlay,
            state: CycleState::Unprepared,
            pending_extent: None,
        }
    }

    #[inline]
    pub fn state(&self) -> CycleState {
        self.state
    }

    #[inline]
    pub fn technique(&self) -> &T {
        &self.technique
    }

    /// Checks capabilities and runs the technique's setup. Runs once.
    ///
    /// # Errors
    ///
    /// [`RendererError::InvalidState`] if already prepared,
    /// [`RendererError::Unsupported`] for a missing capability, or whatever
    /// setup itself fails with.
    pub fn prepare(
        &mut self,
        gpu: &mut dyn GpuContext,
        options: &SetupOptions,
    ) -> RendererResult<()> {
        if self.state != CycleState::Unprepared {
            return Err(RendererError::InvalidState(format!(
                "'{}' is already prepared",
                self.technique.name()
            )));
        }

        let name = self.technique.name();
        gpu.require(name, self.technique.required_capabilities())?;

        info!("Preparing technique '{}' (seed {})", name, options.seed);
        let mut ctx = SetupContext::new(gpu, options);
        self.technique.setup(&mut ctx)?;

        self.state = CycleState::Prepared;
        info!("Technique '{}' prepared", name);
        Ok(())
    }

    /// Updates and records one frame into `recorder`.
    ///
    /// Returns the frame slot whose resources were used.
    pub fn render(
        &mut self,
        gpu: &mut dyn GpuContext,
        recorder: &mut dyn CommandRecorder,
        input: &FrameInput,
        frame_number: u64,
    ) -> RendererResult<FrameSlot> {
        match self.state {
            CycleState::Unprepared => {
                return Err(RendererError::InvalidState(format!(
                    "render called before prepare for '{}'",
                    self.technique.name()
                )));
            }
            CycleState::NeedsDescriptorRebuild => {
                let extent = self.pending_extent.take().unwrap_or(input.extent);
                debug!("Rebuilding descriptors for {}", extent);
                self.technique.on_resize(gpu, extent)?;
                self.state = CycleState::Prepared;
            }
            CycleState::Prepared => {}
        }

        let slot = FrameSlot::for_frame(frame_number);
        trace!("Frame {} using {}", frame_number, slot);

        self.technique.update(input, slot, gpu)?;

        recorder.begin()?;
        recorder.begin_render_pass(&RenderPassBegin {
            extent: input.extent,
            clear: self.technique.clear_values(),
        })?;
        self.technique.record(recorder, slot)?;
        self.overlay.record(recorder, slot)?;
        recorder.end_render_pass()?;
        recorder.end()?;

        self.overlay.frame_finished(&input.timing);
        Ok(slot)
    }

    /// Schedules a descriptor rebuild before the next frame.
    ///
    /// Zero-sized extents and resizes before `prepare` are ignored.
    pub fn resize(&mut self, extent: Extent) {
        if extent.is_empty() {
            debug!("Ignoring resize to {}", extent);
            return;
        }
        if self.state == CycleState::Unprepared {
            debug!("Ignoring resize to {} before prepare", extent);
            return;
        }
        debug!("Resize to {} scheduled", extent);
        self.pending_extent = Some(extent);
        self.state = CycleState::NeedsDescriptorRebuild;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use showcase_core::FrameTiming;
    use showcase_scene::Camera;

    use super::*;
    use crate::Capability;
    use crate::headless::{HeadlessContext, RecordedCommand};
    use crate::recorder::{Rect2D, Viewport};
    use showcase_rhi::DeviceCapabilities;

    /// Records which hooks ran, and draws one triangle.
    struct CallTracker {
        calls: Rc<RefCell<Vec<String>>>,
        required: &'static [Capability],
        extent: Extent,
    }

    impl CallTracker {
        fn new(calls: Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                calls,
                required: &[],
                extent: Extent::default(),
            }
        }
    }

    impl Technique for CallTracker {
        fn name(&self) -> &'static str {
            "call-tracker"
        }

        fn required_capabilities(&self) -> &'static [Capability] {
            self.required
        }

        fn setup(&mut self, ctx: &mut SetupContext<'_>) -> RendererResult<()> {
            self.calls.borrow_mut().push("setup".into());
            self.extent = ctx.gpu.extent();
            Ok(())
        }

        fn update(
            &mut self,
            input: &FrameInput,
            slot: FrameSlot,
            _: &mut dyn GpuContext,
        ) -> RendererResult<()> {
            self.extent = input.extent;
            self.calls.borrow_mut().push(format!("update {}", slot.index()));
            Ok(())
        }

        fn record(&self, recorder: &mut dyn CommandRecorder, _: FrameSlot) -> RendererResult<()> {
            recorder.set_viewports(&[Viewport::full(self.extent)])?;
            recorder.set_scissors(&[Rect2D::full(self.extent)])?;
            recorder.draw(3, 1)
        }

        fn on_resize(&mut self, _: &mut dyn GpuContext, extent: Extent) -> RendererResult<()> {
            self.calls.borrow_mut().push(format!("resize {}", extent));
            Ok(())
        }
    }

    fn input(extent: Extent, frame: u64) -> FrameInput {
        FrameInput {
            camera: Camera::default(),
            extent,
            timing: FrameTiming::fixed(frame, 1.0 / 60.0),
        }
    }

    #[test]
    fn test_render_before_prepare_fails() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let mut log = ctx.recorder();
        let mut cycle = FrameCycle::new(CallTracker::new(Rc::default()));

        let result = cycle.render(&mut ctx, &mut log, &input(Extent::new(64, 64), 0), 0);
        assert!(matches!(result, Err(RendererError::InvalidState(_))));
    }

    #[test]
    fn test_prepare_runs_exactly_once() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let mut cycle = FrameCycle::new(CallTracker::new(calls.clone()));

        cycle.prepare(&mut ctx, &SetupOptions::default()).unwrap();
        assert_eq!(cycle.state(), CycleState::Prepared);
        assert!(matches!(
            cycle.prepare(&mut ctx, &SetupOptions::default()),
            Err(RendererError::InvalidState(_))
        ));
        assert_eq!(*calls.borrow(), vec!["setup".to_string()]);
    }

    #[test]
    fn test_missing_capability_aborts_before_setup() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = HeadlessContext::new(Extent::new(64, 64))
            .with_capabilities(DeviceCapabilities::from_list(&[Capability::GeometryShader]));
        let mut tracker = CallTracker::new(calls.clone());
        tracker.required = &[Capability::GeometryShader, Capability::MultiViewport];
        let mut cycle = FrameCycle::new(tracker);

        let err = cycle.prepare(&mut ctx, &SetupOptions::default()).unwrap_err();
        match err {
            RendererError::Unsupported {
                technique,
                capability,
            } => {
                assert_eq!(technique, "call-tracker");
                assert_eq!(capability, Capability::MultiViewport);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(calls.borrow().is_empty());
        assert_eq!(cycle.state(), CycleState::Unprepared);
    }

    #[test]
    fn test_render_records_fixed_sequence() {
        let extent = Extent::new(1280, 720);
        let mut ctx = HeadlessContext::new(extent);
        let mut cycle = FrameCycle::new(CallTracker::new(Rc::default()));
        cycle.prepare(&mut ctx, &SetupOptions::default()).unwrap();

        let mut log = ctx.recorder();
        let slot = cycle.render(&mut ctx, &mut log, &input(extent, 3), 3).unwrap();
        assert_eq!(slot.index(), 1);

        let commands = log.commands();
        assert_eq!(commands.first(), Some(&RecordedCommand::Begin));
        assert!(matches!(
            commands[1],
            RecordedCommand::BeginRenderPass { extent: e, .. } if e == extent
        ));
        assert_eq!(commands[commands.len() - 2], RecordedCommand::EndRenderPass);
        assert_eq!(commands.last(), Some(&RecordedCommand::End));
        assert_eq!(
            commands
                .iter()
                .filter(|c| matches!(c, RecordedCommand::BeginRenderPass { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_slots_alternate_and_update_precedes_record() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let extent = Extent::new(64, 64);
        let mut ctx = HeadlessContext::new(extent);
        let mut cycle = FrameCycle::new(CallTracker::new(calls.clone()));
        cycle.prepare(&mut ctx, &SetupOptions::default()).unwrap();

        for frame in 0..4 {
            let mut log = ctx.recorder();
            cycle.render(&mut ctx, &mut log, &input(extent, frame), frame).unwrap();
        }
        assert_eq!(
            *calls.borrow(),
            vec!["setup", "update 0", "update 1", "update 0", "update 1"]
        );
    }

    #[test]
    fn test_resize_rebuilds_once_before_next_frame() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let mut cycle = FrameCycle::new(CallTracker::new(calls.clone()));
        cycle.prepare(&mut ctx, &SetupOptions::default()).unwrap();

        cycle.resize(Extent::new(0, 0));
        assert_eq!(cycle.state(), CycleState::Prepared);

        let resized = Extent::new(800, 600);
        cycle.resize(resized);
        assert_eq!(cycle.state(), CycleState::NeedsDescriptorRebuild);

        for frame in 0..2 {
            let mut log = ctx.recorder();
            cycle.render(&mut ctx, &mut log, &input(resized, frame), frame).unwrap();
        }
        assert_eq!(cycle.state(), CycleState::Prepared);
        assert_eq!(
            *calls.borrow(),
            vec!["setup", "resize 800x600", "update 0", "update 1"]
        );
    }

    #[test]
    fn test_resize_before_prepare_is_ignored() {
        let mut cycle = FrameCycle::new(CallTracker::new(Rc::default()));
        cycle.resize(Extent::new(800, 600));
        assert_eq!(cycle.state(), CycleState::Unprepared);
    }
}
