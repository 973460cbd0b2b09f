//! Opaque handles handed out by a [`GpuContext`](crate::GpuContext).
//!
//! Handles are plain ids; each backend maps them to its own objects.

use std::fmt;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[inline]
            pub fn id(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

define_handle!(
    /// Host-visible, persistently mapped uniform buffer.
    BufferHandle,
    "buffer"
);
define_handle!(DescriptorLayoutHandle, "descriptor-layout");
define_handle!(DescriptorPoolHandle, "descriptor-pool");
define_handle!(DescriptorSetHandle, "descriptor-set");
define_handle!(PipelineLayoutHandle, "pipeline-layout");
define_handle!(PipelineHandle, "pipeline");
define_handle!(
    /// Model geometry resident on the device.
    ModelHandle,
    "model"
);

/// Monotonic id source shared by every handle kind of one context.
#[derive(Debug, Default)]
pub(crate) struct HandleAllocator {
    next: u32,
}

impl HandleAllocator {
    pub(crate) fn next(&mut self) -> u32 {
        self.next += 1;
        self.next
    }
}

/// Framebuffer size in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimised window reports a zero-sized extent.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_ids_are_unique_per_allocator() {
        let mut ids = HandleAllocator::default();
        let a = BufferHandle(ids.next());
        let b = PipelineHandle(ids.next());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.to_string(), "buffer#1");
        assert_eq!(b.to_string(), "pipeline#2");
    }

    #[test]
    fn test_extent() {
        assert!(Extent::new(0, 720).is_empty());
        assert!(!Extent::new(1280, 720).is_empty());
        assert!((Extent::new(1280, 720).aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(Extent::new(0, 0).aspect_ratio(), 0.0);
        assert_eq!(Extent::new(800, 600).to_string(), "800x600");
    }
}
