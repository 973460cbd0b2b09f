//! Per-frame uniform buffers and the descriptor sets pointing at them.

use std::marker::PhantomData;

use bytemuck::Pod;
use showcase_rhi::vk;
use tracing::debug;

use crate::context::{BindingDesc, GpuContext};
use crate::error::RendererResult;
use crate::handles::{BufferHandle, DescriptorLayoutHandle, DescriptorPoolHandle, DescriptorSetHandle};
use crate::{FrameSlot, MAX_FRAMES_IN_FLIGHT, PerFrame};

/// Binding index of the uniform block in every technique's set 0.
pub const UNIFORM_BINDING: u32 = 0;

/// One uniform block of type `U` per frame slot, each with its own set.
///
/// Buffers and the layout live for the whole run. The pool and its sets are
/// replaced wholesale by [`rebuild`](Self::rebuild).
#[derive(Debug)]
pub struct FrameResources<U: Pod> {
    binding: BindingDesc,
    buffers: PerFrame<BufferHandle>,
    layout: DescriptorLayoutHandle,
    pool: DescriptorPoolHandle,
    sets: PerFrame<DescriptorSetHandle>,
    _uniform: PhantomData<U>,
}

impl<U: Pod> FrameResources<U> {
    /// Creates the buffers, layout, pool and one set per slot.
    pub fn new(gpu: &mut dyn GpuContext, stages: vk::ShaderStageFlags) -> RendererResult<Self> {
        let binding = BindingDesc::uniform(UNIFORM_BINDING, stages);
        let size = std::mem::size_of::<U>() as u64;

        let buffers = PerFrame::try_from_fn(|_| gpu.create_uniform_buffer(size))?;
        let layout = gpu.create_descriptor_layout(&[binding])?;
        let (pool, sets) = allocate_sets(gpu, binding, layout, &buffers)?;

        debug!(
            "Frame resources: {} x {} byte uniform block(s)",
            MAX_FRAMES_IN_FLIGHT, size
        );

        Ok(Self {
            binding,
            buffers,
            layout,
            pool,
            sets,
            _uniform: PhantomData,
        })
    }

    /// Copies `data` into the buffer of `slot`. Other slots are untouched.
    pub fn write(&self, gpu: &mut dyn GpuContext, slot: FrameSlot, data: &U) -> RendererResult<()> {
        gpu.write_buffer(self.buffers[slot], bytemuck::bytes_of(data))
    }

    /// Destroys the pool and allocates fresh sets for the same buffers.
    pub fn rebuild(&mut self, gpu: &mut dyn GpuContext) -> RendererResult<()> {
        gpu.destroy_descriptor_pool(self.pool)?;
        let (pool, sets) = allocate_sets(gpu, self.binding, self.layout, &self.buffers)?;
        self.pool = pool;
        self.sets = sets;
        debug!("Descriptor sets rebuilt");
        Ok(())
    }

    #[inline]
    pub fn layout(&self) -> DescriptorLayoutHandle {
        self.layout
    }

    #[inline]
    pub fn set(&self, slot: FrameSlot) -> DescriptorSetHandle {
        self.sets[slot]
    }

    #[inline]
    pub fn buffer(&self, slot: FrameSlot) -> BufferHandle {
        self.buffers[slot]
    }
}

fn allocate_sets(
    gpu: &mut dyn GpuContext,
    binding: BindingDesc,
    layout: DescriptorLayoutHandle,
    buffers: &PerFrame<BufferHandle>,
) -> RendererResult<(DescriptorPoolHandle, PerFrame<DescriptorSetHandle>)> {
    let pool = gpu.create_descriptor_pool(MAX_FRAMES_IN_FLIGHT as u32, &[binding])?;
    let sets = PerFrame::try_from_fn(|slot| {
        gpu.allocate_descriptor_set(pool, layout, &[(binding.binding, buffers[slot])])
    })?;
    Ok((pool, sets))
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};

    use super::*;
    use crate::handles::Extent;
    use crate::headless::HeadlessContext;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Pod, Zeroable)]
    struct Block {
        value: [f32; 4],
    }

    #[test]
    fn test_one_buffer_and_set_per_slot() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let resources = FrameResources::<Block>::new(&mut ctx, vk::ShaderStageFlags::VERTEX).unwrap();

        let [a, b] = FrameSlot::ALL;
        assert_ne!(resources.buffer(a), resources.buffer(b));
        assert_ne!(resources.set(a), resources.set(b));
        assert_eq!(ctx.buffer_size(resources.buffer(a)), Some(16));
        assert_eq!(ctx.set_buffer(resources.set(b), UNIFORM_BINDING), Some(resources.buffer(b)));
    }

    #[test]
    fn test_write_touches_only_its_slot() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let resources = FrameResources::<Block>::new(&mut ctx, vk::ShaderStageFlags::VERTEX).unwrap();
        let [a, b] = FrameSlot::ALL;

        resources
            .write(&mut ctx, a, &Block { value: [1.0, 2.0, 3.0, 4.0] })
            .unwrap();

        assert_eq!(ctx.buffer_writes(resources.buffer(a)), 1);
        assert_eq!(ctx.buffer_writes(resources.buffer(b)), 0);
        let contents = ctx.buffer_contents(resources.buffer(a)).unwrap();
        let block: Block = bytemuck::pod_read_unaligned(&contents);
        assert_eq!(block.value, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_rebuild_replaces_sets_and_keeps_buffers() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let mut resources =
            FrameResources::<Block>::new(&mut ctx, vk::ShaderStageFlags::VERTEX).unwrap();
        let old_sets = FrameSlot::ALL.map(|s| resources.set(s));
        let buffers = FrameSlot::ALL.map(|s| resources.buffer(s));
        let layout = resources.layout();

        resources.rebuild(&mut ctx).unwrap();

        for (i, slot) in FrameSlot::ALL.into_iter().enumerate() {
            assert!(!ctx.is_set_live(old_sets[i]));
            assert!(ctx.is_set_live(resources.set(slot)));
            assert_eq!(resources.buffer(slot), buffers[i]);
            assert_eq!(ctx.set_buffer(resources.set(slot), UNIFORM_BINDING), Some(buffers[i]));
        }
        assert_eq!(resources.layout(), layout);
        assert_eq!(ctx.live_pool_count(), 1);
    }
}
