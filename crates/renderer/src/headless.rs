//! In-memory backend.
//!
//! [`HeadlessContext`] hands out handles and remembers every resource and
//! buffer write; [`CommandLog`] records commands instead of submitting them.
//! Both share one resource table, so a log can tell when a technique binds a
//! descriptor set whose pool was destroyed on resize.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use showcase_resources::{Model, ResourceError};
use showcase_rhi::{Capability, DeviceCapabilities, vk};
use tracing::{debug, info, warn};

use crate::context::{BindingDesc, GpuContext, PipelineDesc, PushRange, SurfaceFormats};
use crate::error::{RendererError, RendererResult};
use crate::handles::{
    BufferHandle, DescriptorLayoutHandle, DescriptorPoolHandle, DescriptorSetHandle, Extent,
    HandleAllocator, ModelHandle, PipelineHandle, PipelineLayoutHandle,
};
use crate::recorder::{ClearValues, CommandRecorder, Rect2D, RenderPassBegin, Viewport};

#[derive(Debug)]
struct BufferRecord {
    contents: Vec<u8>,
    writes: u32,
}

#[derive(Debug)]
struct PoolRecord {
    max_sets: u32,
    sets: Vec<DescriptorSetHandle>,
}

#[derive(Debug)]
struct SetRecord {
    buffers: Vec<(u32, BufferHandle)>,
}

/// Destroyed sets remembered to tell "destroyed" from "unknown" when one is
/// bound. Older ones are forgotten so repeated resizes stay bounded.
const RETIRED_SET_HISTORY: usize = 64;

/// Mesh statistics of a model known to the headless backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelInfo {
    pub path: PathBuf,
    pub meshes: usize,
    pub indices: usize,
    /// Generated because the file was missing.
    pub synthesized: bool,
}

#[derive(Debug, Default)]
struct ResourceTable {
    ids: HandleAllocator,
    buffers: HashMap<BufferHandle, BufferRecord>,
    layouts: HashMap<DescriptorLayoutHandle, Vec<BindingDesc>>,
    pools: HashMap<DescriptorPoolHandle, PoolRecord>,
    sets: HashMap<DescriptorSetHandle, SetRecord>,
    retired_sets: VecDeque<DescriptorSetHandle>,
    pipeline_layouts: HashMap<PipelineLayoutHandle, Vec<PushRange>>,
    pipelines: HashMap<PipelineHandle, PipelineDesc>,
    models: HashMap<ModelHandle, ModelInfo>,
}

type SharedTable = Arc<Mutex<ResourceTable>>;

fn lock(table: &SharedTable) -> RendererResult<MutexGuard<'_, ResourceTable>> {
    table
        .lock()
        .map_err(|_| RendererError::InvalidState("headless resource table poisoned".to_string()))
}

/// [`GpuContext`] that keeps everything in host memory.
#[derive(Debug)]
pub struct HeadlessContext {
    table: SharedTable,
    capabilities: DeviceCapabilities,
    extent: Extent,
    formats: SurfaceFormats,
    fallback_models: bool,
}

impl HeadlessContext {
    /// Context with every capability available and no model fallback.
    pub fn new(extent: Extent) -> Self {
        Self {
            table: SharedTable::default(),
            capabilities: DeviceCapabilities::all(),
            extent,
            formats: SurfaceFormats::default(),
            fallback_models: false,
        }
    }

    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Missing model files load as a unit cube instead of failing.
    pub fn with_fallback_models(mut self) -> Self {
        self.fallback_models = true;
        self
    }

    /// New recorder sharing this context's resource table.
    pub fn recorder(&self) -> CommandLog {
        CommandLog::new(self.table.clone())
    }

    /// Simulates a surface resize.
    pub fn set_extent(&mut self, extent: Extent) {
        self.extent = extent;
    }

    pub fn buffer_writes(&self, buffer: BufferHandle) -> u32 {
        self.query(|t| t.buffers.get(&buffer).map(|b| b.writes))
            .unwrap_or(0)
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.query(|t| t.buffers.get(&buffer).map(|b| b.contents.clone()))
    }

    pub fn buffer_size(&self, buffer: BufferHandle) -> Option<usize> {
        self.query(|t| t.buffers.get(&buffer).map(|b| b.contents.len()))
    }

    /// Total buffer writes across all buffers.
    pub fn total_buffer_writes(&self) -> u32 {
        self.query(|t| Some(t.buffers.values().map(|b| b.writes).sum()))
            .unwrap_or(0)
    }

    pub fn is_set_live(&self, set: DescriptorSetHandle) -> bool {
        self.query(|t| Some(t.sets.contains_key(&set)))
            .unwrap_or(false)
    }

    /// Buffer wired to `binding` of `set`.
    pub fn set_buffer(&self, set: DescriptorSetHandle, binding: u32) -> Option<BufferHandle> {
        self.query(|t| {
            t.sets.get(&set).and_then(|s| {
                s.buffers
                    .iter()
                    .find(|(b, _)| *b == binding)
                    .map(|&(_, buffer)| buffer)
            })
        })
    }

    pub fn live_pool_count(&self) -> usize {
        self.query(|t| Some(t.pools.len())).unwrap_or(0)
    }

    pub fn pipeline_desc(&self, pipeline: PipelineHandle) -> Option<PipelineDesc> {
        self.query(|t| t.pipelines.get(&pipeline).cloned())
    }

    pub fn pipeline_count(&self) -> usize {
        self.query(|t| Some(t.pipelines.len())).unwrap_or(0)
    }

    pub fn model_info(&self, model: ModelHandle) -> Option<ModelInfo> {
        self.query(|t| t.models.get(&model).cloned())
    }

    fn query<R>(&self, f: impl FnOnce(&ResourceTable) -> Option<R>) -> Option<R> {
        lock(&self.table).ok().and_then(|t| f(&t))
    }
}

impl GpuContext for HeadlessContext {
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.supports(capability)
    }

    fn extent(&self) -> Extent {
        self.extent
    }

    fn surface_formats(&self) -> SurfaceFormats {
        self.formats
    }

    fn create_uniform_buffer(&mut self, size: u64) -> RendererResult<BufferHandle> {
        let mut table = lock(&self.table)?;
        let handle = BufferHandle(table.ids.next());
        table.buffers.insert(
            handle,
            BufferRecord {
                contents: vec![0; size as usize],
                writes: 0,
            },
        );
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> RendererResult<()> {
        let mut table = lock(&self.table)?;
        let record = table
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| RendererError::InvalidHandle(buffer.to_string()))?;

        if data.len() > record.contents.len() {
            return Err(RendererError::InvalidState(format!(
                "write of {} bytes into {} of {} bytes",
                data.len(),
                buffer,
                record.contents.len()
            )));
        }
        record.contents[..data.len()].copy_from_slice(data);
        record.writes += 1;
        Ok(())
    }

    fn create_descriptor_layout(
        &mut self,
        bindings: &[BindingDesc],
    ) -> RendererResult<DescriptorLayoutHandle> {
        let mut table = lock(&self.table)?;
        let handle = DescriptorLayoutHandle(table.ids.next());
        table.layouts.insert(handle, bindings.to_vec());
        Ok(handle)
    }

    fn create_descriptor_pool(
        &mut self,
        max_sets: u32,
        _bindings: &[BindingDesc],
    ) -> RendererResult<DescriptorPoolHandle> {
        let mut table = lock(&self.table)?;
        let handle = DescriptorPoolHandle(table.ids.next());
        table.pools.insert(
            handle,
            PoolRecord {
                max_sets,
                sets: Vec::new(),
            },
        );
        debug!("Headless descriptor pool {} ({} sets)", handle, max_sets);
        Ok(handle)
    }

    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolHandle) -> RendererResult<()> {
        let mut guard = lock(&self.table)?;
        let table = &mut *guard;
        let record = table
            .pools
            .remove(&pool)
            .ok_or_else(|| RendererError::InvalidHandle(pool.to_string()))?;
        for set in record.sets {
            table.sets.remove(&set);
            if table.retired_sets.len() == RETIRED_SET_HISTORY {
                table.retired_sets.pop_front();
            }
            table.retired_sets.push_back(set);
        }
        debug!("Headless descriptor pool {} destroyed", pool);
        Ok(())
    }

    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        layout: DescriptorLayoutHandle,
        buffers: &[(u32, BufferHandle)],
    ) -> RendererResult<DescriptorSetHandle> {
        let mut guard = lock(&self.table)?;
        let table = &mut *guard;
        let bindings = table
            .layouts
            .get(&layout)
            .ok_or_else(|| RendererError::InvalidHandle(layout.to_string()))?;
        for (binding, buffer) in buffers {
            if !bindings.iter().any(|b| b.binding == *binding) {
                return Err(RendererError::InvalidHandle(format!(
                    "{} has no binding {}",
                    layout, binding
                )));
            }
            if !table.buffers.contains_key(buffer) {
                return Err(RendererError::InvalidHandle(buffer.to_string()));
            }
        }

        let handle = DescriptorSetHandle(table.ids.next());
        let record = table
            .pools
            .get_mut(&pool)
            .ok_or_else(|| RendererError::InvalidHandle(pool.to_string()))?;
        if record.sets.len() as u32 >= record.max_sets {
            return Err(RendererError::InvalidState(format!(
                "{} is exhausted ({} sets)",
                pool, record.max_sets
            )));
        }
        record.sets.push(handle);
        table.sets.insert(
            handle,
            SetRecord {
                buffers: buffers.to_vec(),
            },
        );
        Ok(handle)
    }

    fn create_pipeline_layout(
        &mut self,
        set_layouts: &[DescriptorLayoutHandle],
        push_ranges: &[PushRange],
    ) -> RendererResult<PipelineLayoutHandle> {
        let mut table = lock(&self.table)?;
        if let Some(unknown) = set_layouts.iter().find(|&l| !table.layouts.contains_key(l)) {
            return Err(RendererError::InvalidHandle(unknown.to_string()));
        }
        let handle = PipelineLayoutHandle(table.ids.next());
        table.pipeline_layouts.insert(handle, push_ranges.to_vec());
        Ok(handle)
    }

    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> RendererResult<PipelineHandle> {
        let mut table = lock(&self.table)?;
        if !table.pipeline_layouts.contains_key(&desc.layout) {
            return Err(RendererError::InvalidHandle(desc.layout.to_string()));
        }
        let handle = PipelineHandle(table.ids.next());
        table.pipelines.insert(handle, desc.clone());
        info!(
            "Headless pipeline {} for '{}' ({} stage(s), {} viewport(s))",
            handle,
            desc.shader_dir,
            desc.shaders.len(),
            desc.viewport_count
        );
        Ok(handle)
    }

    fn load_model(&mut self, path: &Path) -> RendererResult<ModelHandle> {
        let (model, synthesized) = match Model::load(path) {
            Ok(model) => (model, false),
            Err(ResourceError::FileNotFound(_)) if self.fallback_models => {
                warn!("Model {:?} not found, using a unit cube", path);
                (Model::unit_cube(), true)
            }
            Err(e) => return Err(e.into()),
        };

        let mut table = lock(&self.table)?;
        let handle = ModelHandle(table.ids.next());
        table.models.insert(
            handle,
            ModelInfo {
                path: path.to_path_buf(),
                meshes: model.meshes.len(),
                indices: model.index_count(),
                synthesized,
            },
        );
        Ok(handle)
    }
}

/// One command captured by a [`CommandLog`].
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCommand {
    Begin,
    BeginRenderPass {
        extent: Extent,
        clear: ClearValues,
    },
    SetViewports(Vec<Viewport>),
    SetScissors(Vec<Rect2D>),
    BindDescriptorSet {
        layout: PipelineLayoutHandle,
        set: DescriptorSetHandle,
    },
    BindPipeline(PipelineHandle),
    PushConstants {
        layout: PipelineLayoutHandle,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawModel(ModelHandle),
    DrawMeshTasks {
        x: u32,
        y: u32,
        z: u32,
    },
    EndRenderPass,
    End,
}

impl RecordedCommand {
    /// Same command with every handle zeroed.
    pub fn without_handles(&self) -> Self {
        match self {
            Self::BindDescriptorSet { .. } => Self::BindDescriptorSet {
                layout: PipelineLayoutHandle(0),
                set: DescriptorSetHandle(0),
            },
            Self::BindPipeline(_) => Self::BindPipeline(PipelineHandle(0)),
            Self::PushConstants {
                stages,
                offset,
                data,
                ..
            } => Self::PushConstants {
                layout: PipelineLayoutHandle(0),
                stages: *stages,
                offset: *offset,
                data: data.clone(),
            },
            Self::DrawModel(_) => Self::DrawModel(ModelHandle(0)),
            other => other.clone(),
        }
    }

    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::Draw { .. } | Self::DrawModel(_) | Self::DrawMeshTasks { .. }
        )
    }
}

/// [`CommandRecorder`] that validates the command protocol and keeps the
/// recorded commands for inspection.
#[derive(Debug)]
pub struct CommandLog {
    table: SharedTable,
    commands: Vec<RecordedCommand>,
    recording: bool,
    in_pass: bool,
}

impl CommandLog {
    fn new(table: SharedTable) -> Self {
        Self {
            table,
            commands: Vec::new(),
            recording: false,
            in_pass: false,
        }
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Recorded commands with handles stripped, for run-to-run comparison.
    pub fn structure(&self) -> Vec<RecordedCommand> {
        self.commands
            .iter()
            .map(RecordedCommand::without_handles)
            .collect()
    }

    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    /// Whether `begin` through `end` completed.
    pub fn is_complete(&self) -> bool {
        !self.recording && self.commands.last() == Some(&RecordedCommand::End)
    }

    /// Short per-command summary, e.g. `begin, begin-pass, viewports(1), ...`.
    pub fn summary(&self) -> String {
        self.commands
            .iter()
            .map(|c| match c {
                RecordedCommand::Begin => "begin".to_string(),
                RecordedCommand::BeginRenderPass { .. } => "begin-pass".to_string(),
                RecordedCommand::SetViewports(v) => format!("viewports({})", v.len()),
                RecordedCommand::SetScissors(s) => format!("scissors({})", s.len()),
                RecordedCommand::BindDescriptorSet { .. } => "bind-set".to_string(),
                RecordedCommand::BindPipeline(_) => "bind-pipeline".to_string(),
                RecordedCommand::PushConstants { data, .. } => format!("push({}B)", data.len()),
                RecordedCommand::Draw { vertex_count, .. } => format!("draw({})", vertex_count),
                RecordedCommand::DrawModel(_) => "draw-model".to_string(),
                RecordedCommand::DrawMeshTasks { x, y, z } => {
                    format!("draw-mesh-tasks({},{},{})", x, y, z)
                }
                RecordedCommand::EndRenderPass => "end-pass".to_string(),
                RecordedCommand::End => "end".to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn require_recording(&self, what: &str) -> RendererResult<()> {
        if self.recording {
            Ok(())
        } else {
            Err(RendererError::Recording(format!(
                "{} outside begin/end",
                what
            )))
        }
    }

    fn require_pass(&self, what: &str) -> RendererResult<()> {
        self.require_recording(what)?;
        if self.in_pass {
            Ok(())
        } else {
            Err(RendererError::Recording(format!(
                "{} outside a render pass",
                what
            )))
        }
    }
}

impl CommandRecorder for CommandLog {
    fn begin(&mut self) -> RendererResult<()> {
        if self.recording {
            return Err(RendererError::Recording("begin called twice".to_string()));
        }
        self.commands.clear();
        self.recording = true;
        self.commands.push(RecordedCommand::Begin);
        Ok(())
    }

    fn begin_render_pass(&mut self, info: &RenderPassBegin) -> RendererResult<()> {
        self.require_recording("begin_render_pass")?;
        if self.in_pass {
            return Err(RendererError::Recording(
                "render pass begun while another is open".to_string(),
            ));
        }
        self.in_pass = true;
        self.commands.push(RecordedCommand::BeginRenderPass {
            extent: info.extent,
            clear: info.clear,
        });
        Ok(())
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) -> RendererResult<()> {
        self.require_recording("set_viewports")?;
        self.commands
            .push(RecordedCommand::SetViewports(viewports.to_vec()));
        Ok(())
    }

    fn set_scissors(&mut self, scissors: &[Rect2D]) -> RendererResult<()> {
        self.require_recording("set_scissors")?;
        self.commands
            .push(RecordedCommand::SetScissors(scissors.to_vec()));
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        layout: PipelineLayoutHandle,
        set: DescriptorSetHandle,
    ) -> RendererResult<()> {
        self.require_recording("bind_descriptor_set")?;
        {
            let table = lock(&self.table)?;
            if !table.pipeline_layouts.contains_key(&layout) {
                return Err(RendererError::InvalidHandle(layout.to_string()));
            }
            if !table.sets.contains_key(&set) {
                return Err(RendererError::InvalidHandle(
                    if table.retired_sets.contains(&set) {
                        format!("{} belongs to a destroyed pool", set)
                    } else {
                        set.to_string()
                    },
                ));
            }
        }
        self.commands
            .push(RecordedCommand::BindDescriptorSet { layout, set });
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> RendererResult<()> {
        self.require_recording("bind_pipeline")?;
        if !lock(&self.table)?.pipelines.contains_key(&pipeline) {
            return Err(RendererError::InvalidHandle(pipeline.to_string()));
        }
        self.commands.push(RecordedCommand::BindPipeline(pipeline));
        Ok(())
    }

    fn push_constants(
        &mut self,
        layout: PipelineLayoutHandle,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> RendererResult<()> {
        self.require_recording("push_constants")?;
        {
            let table = lock(&self.table)?;
            let ranges = table
                .pipeline_layouts
                .get(&layout)
                .ok_or_else(|| RendererError::InvalidHandle(layout.to_string()))?;
            if !ranges.iter().any(|r| r.covers(stages, offset, data.len())) {
                return Err(RendererError::Recording(format!(
                    "push of {} bytes at offset {} ({:?}) exceeds the ranges of {}",
                    data.len(),
                    offset,
                    stages,
                    layout
                )));
            }
        }
        self.commands.push(RecordedCommand::PushConstants {
            layout,
            stages,
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) -> RendererResult<()> {
        self.require_pass("draw")?;
        self.commands.push(RecordedCommand::Draw {
            vertex_count,
            instance_count,
        });
        Ok(())
    }

    fn draw_model(&mut self, model: ModelHandle) -> RendererResult<()> {
        self.require_pass("draw_model")?;
        if !lock(&self.table)?.models.contains_key(&model) {
            return Err(RendererError::InvalidHandle(model.to_string()));
        }
        self.commands.push(RecordedCommand::DrawModel(model));
        Ok(())
    }

    fn draw_mesh_tasks(&mut self, x: u32, y: u32, z: u32) -> RendererResult<()> {
        self.require_pass("draw_mesh_tasks")?;
        self.commands
            .push(RecordedCommand::DrawMeshTasks { x, y, z });
        Ok(())
    }

    fn end_render_pass(&mut self) -> RendererResult<()> {
        self.require_pass("end_render_pass")?;
        self.in_pass = false;
        self.commands.push(RecordedCommand::EndRenderPass);
        Ok(())
    }

    fn end(&mut self) -> RendererResult<()> {
        self.require_recording("end")?;
        if self.in_pass {
            return Err(RendererError::Recording(
                "end called with an open render pass".to_string(),
            ));
        }
        self.recording = false;
        self.commands.push(RecordedCommand::End);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass() -> RenderPassBegin {
        RenderPassBegin {
            extent: Extent::new(64, 64),
            clear: ClearValues::default(),
        }
    }

    fn uniform_set(
        ctx: &mut HeadlessContext,
    ) -> (PipelineLayoutHandle, DescriptorPoolHandle, DescriptorSetHandle) {
        let binding = BindingDesc::uniform(0, vk::ShaderStageFlags::VERTEX);
        let buffer = ctx.create_uniform_buffer(64).unwrap();
        let layout = ctx.create_descriptor_layout(&[binding]).unwrap();
        let pool = ctx.create_descriptor_pool(2, &[binding]).unwrap();
        let set = ctx.allocate_descriptor_set(pool, layout, &[(0, buffer)]).unwrap();
        let pipeline_layout = ctx.create_pipeline_layout(&[layout], &[]).unwrap();
        (pipeline_layout, pool, set)
    }

    #[test]
    fn test_second_render_pass_begin_is_rejected() {
        let ctx = HeadlessContext::new(Extent::new(64, 64));
        let mut log = ctx.recorder();
        log.begin().unwrap();
        log.begin_render_pass(&pass()).unwrap();
        assert!(matches!(
            log.begin_render_pass(&pass()),
            Err(RendererError::Recording(_))
        ));
    }

    #[test]
    fn test_draw_outside_pass_is_rejected() {
        let ctx = HeadlessContext::new(Extent::new(64, 64));
        let mut log = ctx.recorder();
        assert!(matches!(log.draw(3, 1), Err(RendererError::Recording(_))));
        log.begin().unwrap();
        assert!(matches!(log.draw(3, 1), Err(RendererError::Recording(_))));
        assert!(matches!(
            log.draw_mesh_tasks(1, 1, 1),
            Err(RendererError::Recording(_))
        ));
    }

    #[test]
    fn test_end_with_open_pass_is_rejected() {
        let ctx = HeadlessContext::new(Extent::new(64, 64));
        let mut log = ctx.recorder();
        log.begin().unwrap();
        log.begin_render_pass(&pass()).unwrap();
        assert!(matches!(log.end(), Err(RendererError::Recording(_))));
        log.end_render_pass().unwrap();
        log.end().unwrap();
        assert!(log.is_complete());
        assert_eq!(log.summary(), "begin, begin-pass, end-pass, end");
    }

    #[test]
    fn test_binding_set_of_destroyed_pool_is_rejected() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let (layout, pool, set) = uniform_set(&mut ctx);
        let mut log = ctx.recorder();
        log.begin().unwrap();
        log.bind_descriptor_set(layout, set).unwrap();

        ctx.destroy_descriptor_pool(pool).unwrap();
        assert!(!ctx.is_set_live(set));
        assert!(matches!(
            log.bind_descriptor_set(layout, set),
            Err(RendererError::InvalidHandle(_))
        ));
        assert_eq!(ctx.live_pool_count(), 0);
    }

    #[test]
    fn test_destroyed_sets_do_not_accumulate() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let binding = BindingDesc::uniform(0, vk::ShaderStageFlags::VERTEX);
        let buffer = ctx.create_uniform_buffer(16).unwrap();
        let layout = ctx.create_descriptor_layout(&[binding]).unwrap();
        let pipeline_layout = ctx.create_pipeline_layout(&[layout], &[]).unwrap();

        let mut last_set = None;
        for _ in 0..RETIRED_SET_HISTORY * 2 {
            let pool = ctx.create_descriptor_pool(2, &[binding]).unwrap();
            for _ in 0..2 {
                last_set = Some(ctx.allocate_descriptor_set(pool, layout, &[(0, buffer)]).unwrap());
            }
            ctx.destroy_descriptor_pool(pool).unwrap();
        }

        {
            let table = ctx.table.lock().unwrap();
            assert!(table.sets.is_empty());
            assert_eq!(table.retired_sets.len(), RETIRED_SET_HISTORY);
        }

        let mut log = ctx.recorder();
        log.begin().unwrap();
        match log.bind_descriptor_set(pipeline_layout, last_set.unwrap()) {
            Err(RendererError::InvalidHandle(message)) => {
                assert!(message.contains("destroyed pool"), "{}", message)
            }
            other => panic!("expected InvalidHandle, got {:?}", other),
        }
    }

    #[test]
    fn test_pool_capacity_is_enforced() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let binding = BindingDesc::uniform(0, vk::ShaderStageFlags::VERTEX);
        let buffer = ctx.create_uniform_buffer(16).unwrap();
        let layout = ctx.create_descriptor_layout(&[binding]).unwrap();
        let pool = ctx.create_descriptor_pool(1, &[binding]).unwrap();

        ctx.allocate_descriptor_set(pool, layout, &[(0, buffer)]).unwrap();
        assert!(ctx.allocate_descriptor_set(pool, layout, &[(0, buffer)]).is_err());
        assert!(matches!(
            ctx.allocate_descriptor_set(pool, layout, &[(3, buffer)]),
            Err(RendererError::InvalidHandle(_))
        ));
    }

    #[test]
    fn test_push_constants_must_fit_a_range() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let range = PushRange {
            stages: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: 32,
        };
        let layout = ctx.create_pipeline_layout(&[], &[range]).unwrap();
        let mut log = ctx.recorder();
        log.begin().unwrap();

        log.push_constants(layout, vk::ShaderStageFlags::VERTEX, 0, &[0; 32])
            .unwrap();
        assert!(matches!(
            log.push_constants(layout, vk::ShaderStageFlags::VERTEX, 0, &[0; 33]),
            Err(RendererError::Recording(_))
        ));
        assert!(matches!(
            log.push_constants(layout, vk::ShaderStageFlags::FRAGMENT, 0, &[0; 4]),
            Err(RendererError::Recording(_))
        ));
    }

    #[test]
    fn test_write_larger_than_buffer_fails() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let buffer = ctx.create_uniform_buffer(8).unwrap();
        assert!(ctx.write_buffer(buffer, &[1; 9]).is_err());
        ctx.write_buffer(buffer, &[7; 4]).unwrap();
        assert_eq!(ctx.buffer_contents(buffer), Some(vec![7, 7, 7, 7, 0, 0, 0, 0]));
        assert_eq!(ctx.buffer_writes(buffer), 1);
        assert_eq!(ctx.total_buffer_writes(), 1);
    }

    #[test]
    fn test_structure_ignores_handles() {
        let mut first = HeadlessContext::new(Extent::new(64, 64));
        let mut second = HeadlessContext::new(Extent::new(64, 64));
        // Offset the second context's ids.
        second.create_uniform_buffer(4).unwrap();

        let record = |ctx: &mut HeadlessContext| {
            let (layout, _, set) = uniform_set(ctx);
            let mut log = ctx.recorder();
            log.begin().unwrap();
            log.bind_descriptor_set(layout, set).unwrap();
            log.end().unwrap();
            log
        };

        let a = record(&mut first);
        let b = record(&mut second);
        assert_ne!(a.commands(), b.commands());
        assert_eq!(a.structure(), b.structure());
    }

    #[test]
    fn test_missing_model_without_fallback_fails() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64));
        let result = ctx.load_model(Path::new("no/such/model.gltf"));
        assert!(matches!(
            result,
            Err(RendererError::Resource(ResourceError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_missing_model_with_fallback_is_a_cube() {
        let mut ctx = HeadlessContext::new(Extent::new(64, 64)).with_fallback_models();
        let model = ctx.load_model(Path::new("no/such/model.gltf")).unwrap();
        let info = ctx.model_info(model).unwrap();
        assert!(info.synthesized);
        assert_eq!(info.indices, 36);

        let mut log = ctx.recorder();
        log.begin().unwrap();
        log.begin_render_pass(&pass()).unwrap();
        log.draw_model(model).unwrap();
        assert!(log.draw_model(ModelHandle(9999)).is_err());
        assert_eq!(log.draw_count(), 1);
    }

    #[test]
    fn test_capabilities_can_be_restricted() {
        let ctx = HeadlessContext::new(Extent::new(64, 64))
            .with_capabilities(DeviceCapabilities::from_list(&[Capability::MeshShader]));
        assert!(ctx.supports(Capability::MeshShader));
        assert!(!ctx.supports(Capability::GeometryShader));
        assert!(ctx.require("t", &[Capability::MeshShader]).is_ok());
        assert!(matches!(
            ctx.require("t", &[Capability::MeshShader, Capability::GeometryShader]),
            Err(RendererError::Unsupported {
                capability: Capability::GeometryShader,
                ..
            })
        ));
    }
}
