//! Frame render cycle.
//!
//! A [`Technique`] is driven through setup, per-frame update/record and
//! resize by a [`FrameCycle`]. Techniques never touch Vulkan directly: they
//! talk to a [`GpuContext`] for resources and a [`CommandRecorder`] for
//! commands. Two backends implement those seams:
//! - [`headless`]: records everything in memory, used by tests and `--headless`
//! - [`vulkan`]: drives a real device and swapchain

mod error;

pub mod context;
pub mod cycle;
pub mod frame_resources;
pub mod handles;
pub mod headless;
pub mod overlay;
pub mod recorder;
pub mod technique;
pub mod vulkan;

use std::ops::{Index, IndexMut};

pub use context::{
    BindingDesc, GpuContext, PipelineDesc, PushRange, ShaderRef, SurfaceFormats, VertexInput,
};
pub use cycle::{CycleState, FrameCycle};
pub use error::{RendererError, RendererResult};
pub use frame_resources::FrameResources;
pub use handles::Extent;
pub use overlay::{NoOverlay, StatsOverlay, UiOverlay};
pub use recorder::{ClearValues, CommandRecorder, Rect2D, RenderPassBegin, Viewport};
pub use technique::{FrameInput, SetupContext, SetupOptions, Technique};

pub use showcase_rhi::pipeline::CullMode;
pub use showcase_rhi::shader::ShaderStage;
pub use showcase_rhi::{Capability, DeviceCapabilities, vk};

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Index of a frame-in-flight resource slot, always `< MAX_FRAMES_IN_FLIGHT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameSlot(usize);

impl FrameSlot {
    pub const ALL: [FrameSlot; MAX_FRAMES_IN_FLIGHT] = {
        let mut slots = [FrameSlot(0); MAX_FRAMES_IN_FLIGHT];
        let mut i = 0;
        while i < MAX_FRAMES_IN_FLIGHT {
            slots[i] = FrameSlot(i);
            i += 1;
        }
        slots
    };

    #[inline]
    pub fn for_frame(frame_number: u64) -> Self {
        Self((frame_number % MAX_FRAMES_IN_FLIGHT as u64) as usize)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0
    }

    #[inline]
    pub fn next(self) -> Self {
        Self((self.0 + 1) % MAX_FRAMES_IN_FLIGHT)
    }
}

impl std::fmt::Display for FrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// One `T` per frame slot. Never grows.
#[derive(Clone, Debug, PartialEq)]
pub struct PerFrame<T>([T; MAX_FRAMES_IN_FLIGHT]);

impl<T> PerFrame<T> {
    pub fn from_fn(mut f: impl FnMut(FrameSlot) -> T) -> Self {
        Self(std::array::from_fn(|i| f(FrameSlot(i))))
    }

    /// Builds every slot, stopping at the first error.
    pub fn try_from_fn<E>(mut f: impl FnMut(FrameSlot) -> Result<T, E>) -> Result<Self, E> {
        let mut values = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for slot in FrameSlot::ALL {
            values.push(f(slot)?);
        }
        match values.try_into() {
            Ok(values) => Ok(Self(values)),
            Err(_) => unreachable!("one value is pushed per slot"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameSlot, &T)> {
        self.0.iter().enumerate().map(|(i, t)| (FrameSlot(i), t))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.0.iter_mut()
    }
}

impl<T> Index<FrameSlot> for PerFrame<T> {
    type Output = T;

    fn index(&self, slot: FrameSlot) -> &T {
        &self.0[slot.0]
    }
}

impl<T> IndexMut<FrameSlot> for PerFrame<T> {
    fn index_mut(&mut self, slot: FrameSlot) -> &mut T {
        &mut self.0[slot.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_wraps_with_frame_number() {
        let slots: Vec<usize> = (0..5).map(|n| FrameSlot::for_frame(n).index()).collect();
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(FrameSlot::for_frame(u64::MAX).index(), 1);
    }

    #[test]
    fn test_slot_next_cycles() {
        assert_eq!(FrameSlot::ALL[0].next(), FrameSlot::ALL[1]);
        assert_eq!(FrameSlot::ALL[1].next(), FrameSlot::ALL[0]);
    }

    #[test]
    fn test_per_frame_indexing() {
        let mut values = PerFrame::from_fn(|slot| slot.index() * 10);
        values[FrameSlot::ALL[1]] += 1;
        assert_eq!(values[FrameSlot::ALL[0]], 0);
        assert_eq!(values[FrameSlot::ALL[1]], 11);
        assert_eq!(values.values().count(), MAX_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn test_all_slots_follow_frame_count() {
        assert_eq!(FrameSlot::ALL.len(), MAX_FRAMES_IN_FLIGHT);
        for (i, slot) in FrameSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
            assert_eq!(*slot, FrameSlot::for_frame(i as u64));
        }
    }

    #[test]
    fn test_per_frame_try_from_fn_visits_every_slot_in_order() {
        let mut visited = Vec::new();
        let result: Result<PerFrame<usize>, &str> = PerFrame::try_from_fn(|slot| {
            visited.push(slot.index());
            Ok(slot.index() + 100)
        });

        let values = result.unwrap();
        assert_eq!(visited, (0..MAX_FRAMES_IN_FLIGHT).collect::<Vec<_>>());
        for (slot, value) in values.iter() {
            assert_eq!(*value, slot.index() + 100);
        }
    }

    #[test]
    fn test_per_frame_try_from_fn_stops_on_error() {
        let mut calls = 0;
        let result: Result<PerFrame<u32>, &str> = PerFrame::try_from_fn(|slot| {
            calls += 1;
            if slot.index() == 0 { Err("boom") } else { Ok(1) }
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(calls, 1);
    }
}
