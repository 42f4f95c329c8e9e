use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::commands::{Command, CommandBuffer};
use crate::context::{BufferKind, BufferRegions, Context, TextureFormat, TextureId, next_pow2, texture_size_bytes};
use crate::coords::{ColorRgba, Viewport};
use crate::error::{Error, Result};
use crate::status::ObjStatus;

use super::data::{DataCoords, PropData};
use super::descriptor::{PropCount, PropSpec, Requirement, VisualSpec};
use super::kind::{Axis, AxisLevel, PropKind, SourceKind, VisualFlags, VisualKind};
use super::layout::{
    BINDING_MVP, BINDING_PARAMS, BINDING_TEXTURE, BINDING_VIEWPORT, DEFAULT_LINE_WIDTH, DEFAULT_MARKER_SIZE,
    MarkerVertex, MvpUniform, ParamsUniform, QUAD_CORNERS, SegmentVertex, VERTEX_SLOT, ViewportUniform,
};
use super::DataType;

/// Shared handle: the caller owns the visual, panels keep weak references.
pub type VisualHandle = Rc<RefCell<Visual>>;

const DEFAULT_COLOR: [u8; 4] = [0, 0, 0, 255];
const TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// A buffer region bound to one of the visual's sources.
#[derive(Debug, Copy, Clone)]
struct Slot {
    region: BufferRegions,
    /// Allocated by the visual itself. Shared slots were bound by the caller.
    owned: bool,
}

#[derive(Debug, Copy, Clone)]
struct TextureSlot {
    id: TextureId,
    owned: bool,
}

#[derive(Debug, Clone)]
struct PendingTexture {
    dims: [u32; 3],
    data: Option<Vec<u8>>,
}

#[derive(Debug, Copy, Clone)]
struct Dirty {
    vertex: bool,
    mvp: bool,
    params: bool,
    viewport: bool,
}

impl Dirty {
    const ALL: Dirty = Dirty {
        vertex: true,
        mvp: true,
        params: true,
        viewport: true,
    };
    const NONE: Dirty = Dirty {
        vertex: false,
        mvp: false,
        params: false,
        viewport: false,
    };
}

/// A drawable unit: typed CPU-side properties plus the GPU sources they are
/// packed into.
///
/// Properties may be set in any order and any number of times; `update`
/// validates them against the kind's [`VisualSpec`] and uploads whatever
/// changed since the previous call.
#[derive(Debug)]
pub struct Visual {
    kind: VisualKind,
    flags: VisualFlags,
    spec: &'static VisualSpec,
    status: ObjStatus,

    props: BTreeMap<(PropKind, u32), PropData>,
    pending_texture: Option<PendingTexture>,

    vertex: Option<Slot>,
    uniforms: BTreeMap<u32, Slot>,
    texture: Option<TextureSlot>,
    item_count: u32,

    dirty: Dirty,
    coords: DataCoords,
    viewport: Option<Viewport>,
}

impl Visual {
    pub fn new(kind: VisualKind, flags: VisualFlags) -> Self {
        Self {
            kind,
            flags,
            spec: VisualSpec::for_kind(kind),
            status: ObjStatus::Init,
            props: BTreeMap::new(),
            pending_texture: None,
            vertex: None,
            uniforms: BTreeMap::new(),
            texture: None,
            item_count: 0,
            dirty: Dirty::ALL,
            coords: DataCoords::default(),
            viewport: None,
        }
    }

    /// Wraps the visual into a shared handle.
    pub fn shared(self) -> VisualHandle {
        Rc::new(RefCell::new(self))
    }

    #[inline]
    pub fn kind(&self) -> VisualKind {
        self.kind
    }

    #[inline]
    pub fn flags(&self) -> VisualFlags {
        self.flags
    }

    #[inline]
    pub fn spec(&self) -> &'static VisualSpec {
        self.spec
    }

    #[inline]
    pub fn status(&self) -> ObjStatus {
        self.status
    }

    /// Items drawn by the last `update`.
    #[inline]
    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    pub fn data(&self, prop: PropKind, index: u32) -> Option<&PropData> {
        self.props.get(&(prop, index))
    }

    pub fn vertex_region(&self) -> Option<BufferRegions> {
        self.vertex.map(|s| s.region)
    }

    pub fn uniform_region(&self, binding: u32) -> Option<BufferRegions> {
        self.uniforms.get(&binding).map(|s| s.region)
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture.map(|t| t.id)
    }

    // ── properties ────────────────────────────────────────────────────────

    /// Stores `data` for `prop` at sub-index `index`, replacing earlier data.
    pub fn set_data(&mut self, prop: PropKind, index: u32, data: impl Into<PropData>) -> Result<()> {
        self.check_alive()?;
        let data = data.into();
        let spec = self.prop_spec(prop)?;

        if prop == PropKind::ColorTexture {
            // Image data goes through `set_texture_data`.
            return Err(Error::InvalidProperty { kind: self.kind, prop });
        }
        if index >= spec.parts {
            return Err(Error::InvalidIndex { prop, index, parts: spec.parts });
        }

        let actual = data.data_type();
        let widened = spec.dtype == DataType::Vec3F32 && actual == DataType::Vec2F32;
        if actual != spec.dtype && !widened {
            return Err(Error::DataType { prop, expected: spec.dtype, actual });
        }

        let len = data.len() as u32;
        if spec.count == PropCount::Single && len != 1 {
            return Err(Error::CountMismatch { prop, expected: 1, actual: len });
        }
        if spec.coupled {
            let sibling = (0..spec.parts)
                .filter(|&j| j != index)
                .filter_map(|j| self.props.get(&(prop, j)))
                .map(|d| d.len() as u32)
                .find(|&n| n != len);
            if let Some(expected) = sibling {
                return Err(Error::CountMismatch { prop, expected, actual: len });
            }
        }

        self.props.insert((prop, index), data);
        self.mark_dirty(prop);
        Ok(())
    }

    /// Drops every part of `prop`, so coupled parts can be resized.
    pub fn clear_data(&mut self, prop: PropKind) -> Result<()> {
        self.check_alive()?;
        self.prop_spec(prop)?;
        self.props.retain(|&(p, _), _| p != prop);
        if prop == PropKind::ColorTexture {
            self.pending_texture = None;
        }
        self.mark_dirty(prop);
        Ok(())
    }

    /// Stores image data for a texture property. `None` allocates the texture
    /// on the next `update` without uploading texels.
    pub fn set_texture_data(&mut self, prop: PropKind, dims: [u32; 3], data: Option<&[u8]>) -> Result<()> {
        self.check_alive()?;
        self.prop_spec(prop)?;
        if prop != PropKind::ColorTexture {
            return Err(Error::InvalidProperty { kind: self.kind, prop });
        }
        if dims.contains(&0) {
            return Err(Error::InvalidDimension(format!(
                "texture dimensions must all be at least 1, got {dims:?}"
            )));
        }
        if let Some(data) = data {
            let expected = texture_size_bytes(dims, TEXTURE_FORMAT);
            if data.len() as u64 != expected {
                return Err(Error::DataLength { expected, actual: data.len() as u64 });
            }
        }

        self.pending_texture = Some(PendingTexture {
            dims,
            data: data.map(<[u8]>::to_vec),
        });
        self.mark_dirty(prop);
        Ok(())
    }

    // ── sources ───────────────────────────────────────────────────────────

    /// Binds a caller-owned buffer region to a declared source.
    ///
    /// The region is retained in the `Context` and released on rebind or
    /// `destroy`. The visual never writes the viewport uniform of a shared
    /// region; the binder does.
    pub fn bind_source(
        &mut self,
        context: &mut Context,
        source_kind: SourceKind,
        binding: u32,
        regions: BufferRegions,
    ) -> Result<()> {
        self.check_alive()?;
        let source = match source_kind {
            SourceKind::Texture => None,
            _ => self.spec.source(source_kind, binding),
        };
        let Some(source) = source else {
            return Err(Error::InvalidSource { kind: self.kind, source_kind, binding });
        };
        if regions.item_size < source.item_size {
            return Err(Error::SourceTooSmall {
                source_kind,
                binding,
                required: source.item_size,
                available: regions.item_size,
            });
        }

        context.retain(&regions);
        let slot = Slot { region: regions, owned: false };
        let old = match source_kind {
            SourceKind::Vertex => {
                self.dirty.vertex = true;
                self.vertex.replace(slot)
            }
            _ => {
                match binding {
                    BINDING_MVP => self.dirty.mvp = true,
                    BINDING_PARAMS => self.dirty.params = true,
                    _ => {}
                }
                self.uniforms.insert(binding, slot)
            }
        };
        if let Some(old) = old {
            context.release(&old.region);
        }

        if self.status == ObjStatus::Created {
            self.status = ObjStatus::NeedUpdate;
        }
        Ok(())
    }

    /// Binds an existing context texture to a texture source.
    pub fn bind_texture(&mut self, context: &mut Context, binding: u32, texture: TextureId) -> Result<()> {
        self.check_alive()?;
        if self.spec.source(SourceKind::Texture, binding).is_none() {
            return Err(Error::InvalidSource { kind: self.kind, source_kind: SourceKind::Texture, binding });
        }
        if context.texture(texture).is_none() {
            return Err(Error::UnknownTexture(texture.0));
        }

        if let Some(old) = self.texture.replace(TextureSlot { id: texture, owned: false }) {
            if old.owned && old.id != texture {
                context.destroy_texture(old.id);
            }
        }
        self.pending_texture = None;
        Ok(())
    }

    // ── update ────────────────────────────────────────────────────────────

    /// Validates properties, packs GPU layouts and uploads what changed.
    ///
    /// Missing sources are allocated here: vertex capacity is rounded up to
    /// a power of two, uniforms get one item each, and an unset color texture
    /// becomes a 1x1 white texel.
    pub fn update(&mut self, viewport: Viewport, coords: DataCoords, context: &mut Context) -> Result<()> {
        self.check_alive()?;
        let items = self.validate()?;

        if self.coords != coords {
            self.coords = coords;
            self.dirty.vertex = true;
        }
        if self.viewport != Some(viewport) {
            self.viewport = Some(viewport);
            self.dirty.viewport = true;
        }

        if self.dirty.vertex {
            self.upload_vertices(context, items)?;
        }
        self.upload_uniforms(context, viewport)?;
        self.upload_texture(context)?;

        self.dirty = Dirty::NONE;
        self.status = ObjStatus::Created;
        Ok(())
    }

    /// Refreshes an owned viewport uniform when the panel viewport moved.
    pub fn update_viewport(&mut self, context: &mut Context, viewport: Viewport) -> Result<()> {
        self.check_alive()?;
        if self.viewport == Some(viewport) {
            return Ok(());
        }
        self.viewport = Some(viewport);

        match self.uniforms.get(&BINDING_VIEWPORT) {
            Some(slot) if slot.owned => {
                let u = ViewportUniform::from(viewport);
                context.upload(&slot.region, 0, bytemuck::bytes_of(&u))
            }
            _ => Ok(()),
        }
    }

    // ── recording ─────────────────────────────────────────────────────────

    /// Records the draw for this visual, scoped to `viewport`.
    ///
    /// Opens the buffer's render pass if needed. Visuals that were never
    /// updated, hold no items, or fall outside the framebuffer record nothing.
    pub fn record_draw(&self, cmds: &mut CommandBuffer, viewport: Viewport, clear: ColorRgba) {
        if !self.status.is_created() {
            log::warn!("{:?} visual recorded before update; skipped", self.kind);
            return;
        }
        if self.item_count == 0 {
            return;
        }
        let (Some(vertex), Some(texture)) = (self.vertex, self.texture) else {
            return;
        };
        let Some((x, y, width, height)) = viewport.scissor() else {
            log::trace!("{:?} visual outside the framebuffer", self.kind);
            return;
        };

        cmds.begin_render_pass_if_needed(clear);
        cmds.push(Command::SetViewport(viewport.rect));
        cmds.push(Command::SetScissor { x, y, width, height });
        cmds.push(Command::BindPipeline(self.kind.pipeline()));
        cmds.push(Command::BindVertexBuffer { slot: VERTEX_SLOT, region: vertex.region });
        for (&binding, slot) in &self.uniforms {
            cmds.push(Command::BindUniform { binding, region: slot.region.item(0) });
        }
        cmds.push(Command::BindTexture { binding: BINDING_TEXTURE, texture: texture.id });
        cmds.push(Command::Draw {
            vertex_count: QUAD_CORNERS,
            instance_count: self.item_count,
        });
    }

    /// Releases owned regions and textures and drops CPU data. Shared
    /// regions lose the reference this visual held.
    pub fn destroy(&mut self, context: &mut Context) {
        if self.status.is_destroyed() {
            return;
        }
        if let Some(slot) = self.vertex.take() {
            context.release(&slot.region);
        }
        for slot in std::mem::take(&mut self.uniforms).into_values() {
            context.release(&slot.region);
        }
        if let Some(t) = self.texture.take() {
            if t.owned {
                context.destroy_texture(t.id);
            }
        }
        self.props.clear();
        self.pending_texture = None;
        self.item_count = 0;
        self.status = ObjStatus::Destroyed;
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn check_alive(&self) -> Result<()> {
        if self.status.is_destroyed() { Err(Error::Destroyed) } else { Ok(()) }
    }

    fn prop_spec(&self, prop: PropKind) -> Result<PropSpec> {
        self.spec
            .prop(prop)
            .copied()
            .ok_or(Error::InvalidProperty { kind: self.kind, prop })
    }

    fn mark_dirty(&mut self, prop: PropKind) {
        self.dirty.vertex |= prop.affects_vertex();
        self.dirty.mvp |= prop.affects_mvp();
        self.dirty.params |= prop.affects_params();
        if self.status == ObjStatus::Created {
            self.status = ObjStatus::NeedUpdate;
        }
    }

    fn has_data(&self, prop: PropKind) -> bool {
        self.props.keys().any(|&(p, _)| p == prop)
    }

    /// Checks requirements and counts; returns the number of items to draw.
    fn validate(&self) -> Result<u32> {
        for spec in self.spec.props {
            let set = |j: u32| self.props.contains_key(&(spec.prop, j));
            match spec.requirement {
                Requirement::Optional => {}
                Requirement::Required => {
                    if let Some(index) = (0..spec.parts).find(|&j| !set(j)) {
                        return Err(Error::MissingProperty { kind: self.kind, prop: spec.prop, index });
                    }
                }
                Requirement::AnyPart => {
                    if !(0..spec.parts).any(set) {
                        return Err(Error::MissingProperty { kind: self.kind, prop: spec.prop, index: 0 });
                    }
                }
            }
        }

        let items = self
            .spec
            .props
            .iter()
            .find(|s| s.count == PropCount::Items)
            .map(|s| {
                let parts = (0..s.parts).filter_map(|j| self.props.get(&(s.prop, j)));
                if s.coupled {
                    parts.map(|d| d.len()).max().unwrap_or(0)
                } else {
                    parts.map(|d| d.len()).sum()
                }
            })
            .unwrap_or(0) as u32;

        for spec in self.spec.props.iter().filter(|s| s.count == PropCount::PerItem) {
            if let Some(data) = self.props.get(&(spec.prop, 0)) {
                let actual = data.len() as u32;
                if actual != items {
                    return Err(Error::CountMismatch { prop: spec.prop, expected: items, actual });
                }
            }
        }
        Ok(items)
    }

    fn single_float(&self, prop: PropKind) -> Option<f32> {
        self.props.get(&(prop, 0)).and_then(|d| d.float(0))
    }

    fn pack_vertices(&self, items: u32) -> Vec<u8> {
        let n = items as usize;
        let get = |prop: PropKind, index: u32| self.props.get(&(prop, index));
        let color_at = |i: usize| get(PropKind::Color, 0).and_then(|c| c.color(i)).unwrap_or(DEFAULT_COLOR);

        match self.kind {
            VisualKind::Marker | VisualKind::Scatter => {
                let pos = get(PropKind::Pos, 0);
                let sizes = get(PropKind::Size, 0);
                let shared = self.single_float(PropKind::MarkerSize).unwrap_or(DEFAULT_MARKER_SIZE);
                let verts: Vec<MarkerVertex> = (0..n)
                    .map(|i| MarkerVertex {
                        pos: self.coords.normalize(pos.and_then(|p| p.pos(i)).unwrap_or([0.0; 3])),
                        size: sizes.and_then(|s| s.float(i)).unwrap_or(shared),
                        color: color_at(i),
                    })
                    .collect();
                bytemuck::cast_slice(&verts).to_vec()
            }

            VisualKind::Segment => {
                let p0 = get(PropKind::Pos, 0);
                let p1 = get(PropKind::Pos, 1);
                let verts: Vec<SegmentVertex> = (0..n)
                    .map(|i| SegmentVertex {
                        p0: self.coords.normalize(p0.and_then(|p| p.pos(i)).unwrap_or([0.0; 3])),
                        p1: self.coords.normalize(p1.and_then(|p| p.pos(i)).unwrap_or([0.0; 3])),
                        color: color_at(i),
                    })
                    .collect();
                bytemuck::cast_slice(&verts).to_vec()
            }

            VisualKind::Axes2D => {
                let axis = self.flags.axis();
                let color = color_at(0);
                let mut verts = Vec::with_capacity(n);
                for level in AxisLevel::ALL {
                    let Some(PropData::Float(ticks)) = get(PropKind::Pos, level.index()) else {
                        continue;
                    };
                    for &t in ticks {
                        let (p0, p1) = self.tick_line(axis, level, t);
                        verts.push(SegmentVertex { p0, p1, color });
                    }
                }
                bytemuck::cast_slice(&verts).to_vec()
            }
        }
    }

    /// Endpoints of one tick in normalized device coordinates.
    fn tick_line(&self, axis: Axis, level: AxisLevel, t: f32) -> ([f32; 3], [f32; 3]) {
        let end = level.tick_length().map_or(1.0, |len| -1.0 + len);
        match axis {
            Axis::X => {
                let x = self.coords.normalize([t, 0.0, 0.0])[0];
                ([x, -1.0, 0.0], [x, end, 0.0])
            }
            Axis::Y => {
                let y = self.coords.normalize([0.0, t, 0.0])[1];
                ([-1.0, y, 0.0], [end, y, 0.0])
            }
        }
    }

    fn upload_vertices(&mut self, context: &mut Context, items: u32) -> Result<()> {
        self.item_count = items;
        if items == 0 {
            return Ok(());
        }

        let bytes = self.pack_vertices(items);
        let item_size = self.spec.vertex_size();

        let current = self.vertex;
        let region = match current {
            Some(slot) if slot.region.count >= items => slot.region,
            Some(slot) if !slot.owned => {
                return Err(Error::SourceTooSmall {
                    source_kind: SourceKind::Vertex,
                    binding: VERTEX_SLOT,
                    required: item_size * items as u64,
                    available: slot.region.size(),
                });
            }
            old => {
                if let Some(old) = old {
                    context.release(&old.region);
                    self.vertex = None;
                }
                let capacity = next_pow2(items as u64) as u32;
                let region = context.allocate_buffers(BufferKind::Vertex, capacity, item_size)?;
                self.vertex = Some(Slot { region, owned: true });
                region
            }
        };

        context.upload(&region, 0, &bytes)
    }

    /// Returns the slot at `binding`, allocating an owned one if missing.
    /// The flag is true for a fresh allocation.
    fn ensure_uniform(&mut self, context: &mut Context, binding: u32) -> Result<(Slot, bool)> {
        if let Some(slot) = self.uniforms.get(&binding) {
            return Ok((*slot, false));
        }
        let item_size = self
            .spec
            .source(SourceKind::Uniform, binding)
            .map(|s| s.item_size)
            .ok_or(Error::InvalidSource { kind: self.kind, source_kind: SourceKind::Uniform, binding })?;
        let region = context.allocate_buffers(BufferKind::Uniform, 1, item_size)?;
        let slot = Slot { region, owned: true };
        self.uniforms.insert(binding, slot);
        Ok((slot, true))
    }

    fn upload_uniforms(&mut self, context: &mut Context, viewport: Viewport) -> Result<()> {
        let (mvp, fresh) = self.ensure_uniform(context, BINDING_MVP)?;
        let user_mvp = [PropKind::Model, PropKind::View, PropKind::Proj]
            .into_iter()
            .any(|p| self.has_data(p));
        if fresh || (self.dirty.mvp && (mvp.owned || user_mvp)) {
            let u = self.mvp_uniform();
            context.upload(&mvp.region, 0, bytemuck::bytes_of(&u))?;
        }

        let (params, fresh) = self.ensure_uniform(context, BINDING_PARAMS)?;
        let user_params = [PropKind::MarkerSize, PropKind::LineWidth]
            .into_iter()
            .any(|p| self.has_data(p));
        if fresh || (self.dirty.params && (params.owned || user_params)) {
            let u = self.params_uniform();
            context.upload(&params.region, 0, bytemuck::bytes_of(&u))?;
        }

        let (vp, fresh) = self.ensure_uniform(context, BINDING_VIEWPORT)?;
        if fresh || (self.dirty.viewport && vp.owned) {
            let u = ViewportUniform::from(viewport);
            context.upload(&vp.region, 0, bytemuck::bytes_of(&u))?;
        }
        Ok(())
    }

    fn mvp_uniform(&self) -> MvpUniform {
        let mat = |prop| self.props.get(&(prop, 0)).and_then(PropData::mat4);
        let d = MvpUniform::default();
        MvpUniform {
            model: mat(PropKind::Model).unwrap_or(d.model),
            view: mat(PropKind::View).unwrap_or(d.view),
            proj: mat(PropKind::Proj).unwrap_or(d.proj),
        }
    }

    fn params_uniform(&self) -> ParamsUniform {
        let color = match self.kind {
            VisualKind::Axes2D => self
                .props
                .get(&(PropKind::Color, 0))
                .and_then(|c| c.color(0))
                .unwrap_or(DEFAULT_COLOR),
            _ => DEFAULT_COLOR,
        };
        ParamsUniform {
            color: ColorRgba::from_u8(color).to_array(),
            marker_size: self.single_float(PropKind::MarkerSize).unwrap_or(DEFAULT_MARKER_SIZE),
            line_width: self.single_float(PropKind::LineWidth).unwrap_or(DEFAULT_LINE_WIDTH),
            ..ParamsUniform::default()
        }
    }

    fn upload_texture(&mut self, context: &mut Context) -> Result<()> {
        if let Some(pending) = self.pending_texture.take() {
            let reusable = self
                .texture
                .filter(|t| t.owned)
                .filter(|t| context.texture(t.id).is_some_and(|tex| tex.dims == pending.dims));

            let id = match reusable {
                Some(t) => t.id,
                None => {
                    if let Some(old) = self.texture.take() {
                        if old.owned {
                            context.destroy_texture(old.id);
                        }
                    }
                    let id = context.allocate_texture(pending.dims, TEXTURE_FORMAT)?;
                    self.texture = Some(TextureSlot { id, owned: true });
                    id
                }
            };
            return context.upload_texture(id, pending.data.as_deref());
        }

        if self.texture.is_none() {
            let id = context.allocate_texture([1, 1, 1], TEXTURE_FORMAT)?;
            self.texture = Some(TextureSlot { id, owned: true });
            context.upload_texture(id, Some(&[255; 4]))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::commands::{CommandBufferId, CommandGroup};
    use crate::context::{DeviceLimits, HeadlessBackend, MemoryProperties};
    use crate::coords::Vec2;

    fn viewport() -> Viewport {
        Viewport::full(Vec2::new(800.0, 600.0))
    }

    fn cmds() -> CommandBuffer {
        CommandBuffer::new(CommandBufferId(0), CommandGroup::CANVAS)
    }

    fn random_marker(n: usize) -> Visual {
        let mut rng = rand::rng();
        let pos: Vec<[f32; 3]> = (0..n)
            .map(|_| [rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0), 0.0])
            .collect();
        let color: Vec<[u8; 4]> = (0..n).map(|_| [rng.random(), rng.random(), rng.random(), 255]).collect();

        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        v.set_data(PropKind::Pos, 0, pos).unwrap();
        v.set_data(PropKind::Color, 0, color).unwrap();
        v.set_data(PropKind::MarkerSize, 0, 20.0f32).unwrap();
        v
    }

    fn segments(n: usize) -> Visual {
        let mut v = Visual::new(VisualKind::Segment, VisualFlags::NONE);
        let ring = |r: f32| -> Vec<[f32; 3]> {
            (0..n)
                .map(|i| {
                    let t = std::f32::consts::TAU * i as f32 / n as f32;
                    [r * t.cos(), r * t.sin(), 0.0]
                })
                .collect()
        };
        v.set_data(PropKind::Pos, 0, ring(0.25)).unwrap();
        v.set_data(PropKind::Pos, 1, ring(0.75)).unwrap();
        v.set_data(PropKind::Color, 0, vec![[255u8, 0, 0, 255]; n]).unwrap();
        v
    }

    fn vertices(ctx: &mut Context, v: &Visual) -> Vec<MarkerVertex> {
        let region = v.vertex_region().unwrap();
        let bytes = ctx.download(&region, 0, 20 * v.item_count() as u64).unwrap();
        bytes.chunks_exact(20).map(bytemuck::pod_read_unaligned).collect()
    }

    // ── set_data ──────────────────────────────────────────────────────────

    #[test]
    fn unknown_property_is_rejected() {
        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        assert!(matches!(
            v.set_data(PropKind::LineWidth, 0, 2.0f32),
            Err(Error::InvalidProperty { kind: VisualKind::Marker, prop: PropKind::LineWidth })
        ));
    }

    #[test]
    fn sub_index_beyond_parts_is_rejected() {
        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        assert!(matches!(
            v.set_data(PropKind::Pos, 1, vec![[0.0f32; 3]]),
            Err(Error::InvalidIndex { index: 1, parts: 1, .. })
        ));
    }

    #[test]
    fn element_type_is_checked() {
        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        assert!(matches!(
            v.set_data(PropKind::Color, 0, vec![1.0f32]),
            Err(Error::DataType { expected: DataType::Cvec4, actual: DataType::F32, .. })
        ));
        // 2D positions widen to 3D.
        assert!(v.set_data(PropKind::Pos, 0, vec![[0.5f32, 0.5]]).is_ok());
    }

    #[test]
    fn single_valued_property_needs_one_value() {
        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        assert!(matches!(
            v.set_data(PropKind::MarkerSize, 0, vec![1.0f32, 2.0]),
            Err(Error::CountMismatch { expected: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn coupled_parts_with_different_counts_are_rejected() {
        let mut v = Visual::new(VisualKind::Segment, VisualFlags::NONE);
        v.set_data(PropKind::Pos, 0, vec![[0.0f32; 3]; 10]).unwrap();
        assert!(matches!(
            v.set_data(PropKind::Pos, 1, vec![[0.0f32; 3]; 9]),
            Err(Error::CountMismatch { prop: PropKind::Pos, expected: 10, actual: 9 })
        ));

        // Overwriting the same part is always allowed.
        v.set_data(PropKind::Pos, 0, vec![[0.0f32; 3]; 9]).unwrap();
        v.set_data(PropKind::Pos, 1, vec![[0.0f32; 3]; 9]).unwrap();

        v.clear_data(PropKind::Pos).unwrap();
        v.set_data(PropKind::Pos, 1, vec![[0.0f32; 3]; 4]).unwrap();
        assert_eq!(v.data(PropKind::Pos, 1).map(PropData::len), Some(4));
    }

    #[test]
    fn texture_data_is_validated() {
        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        assert!(matches!(
            v.set_texture_data(PropKind::ColorTexture, [0, 1, 1], None),
            Err(Error::InvalidDimension(_))
        ));
        assert!(matches!(
            v.set_texture_data(PropKind::ColorTexture, [2, 2, 1], Some(&[0; 8])),
            Err(Error::DataLength { expected: 16, actual: 8 })
        ));
        assert!(v.set_texture_data(PropKind::ColorTexture, [1, 1, 1], None).is_ok());
        assert!(matches!(
            v.set_data(PropKind::ColorTexture, 0, [0u8; 4]),
            Err(Error::InvalidProperty { .. })
        ));
    }

    // ── update ────────────────────────────────────────────────────────────

    #[test]
    fn missing_required_property_fails_update() {
        let mut ctx = Context::headless();
        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        v.set_data(PropKind::Pos, 0, vec![[0.0f32; 3]; 3]).unwrap();
        assert!(matches!(
            v.update(viewport(), DataCoords::ndc(), &mut ctx),
            Err(Error::MissingProperty { prop: PropKind::Color, index: 0, .. })
        ));

        let mut s = Visual::new(VisualKind::Segment, VisualFlags::NONE);
        s.set_data(PropKind::Pos, 0, vec![[0.0f32; 3]; 3]).unwrap();
        s.set_data(PropKind::Color, 0, vec![[0u8; 4]; 3]).unwrap();
        assert!(matches!(
            s.update(viewport(), DataCoords::ndc(), &mut ctx),
            Err(Error::MissingProperty { prop: PropKind::Pos, index: 1, .. })
        ));
    }

    #[test]
    fn position_and_color_counts_must_agree() {
        let mut ctx = Context::headless();
        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        v.set_data(PropKind::Pos, 0, vec![[0.0f32; 3]; 5]).unwrap();
        v.set_data(PropKind::Color, 0, vec![[0u8; 4]; 4]).unwrap();
        assert!(matches!(
            v.update(viewport(), DataCoords::ndc(), &mut ctx),
            Err(Error::CountMismatch { prop: PropKind::Color, expected: 5, actual: 4 })
        ));
    }

    #[test]
    fn update_allocates_sources_with_pow2_capacity() {
        let mut ctx = Context::headless();
        let mut v = random_marker(1000);
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();

        assert_eq!(v.status(), ObjStatus::Created);
        assert_eq!(v.item_count(), 1000);
        let vertex = v.vertex_region().unwrap();
        assert_eq!(vertex.count, 1024);
        assert_eq!(vertex.item_size, 20);
        for binding in [BINDING_MVP, BINDING_VIEWPORT, BINDING_PARAMS] {
            assert!(v.uniform_region(binding).is_some());
        }
        let tex = v.texture().unwrap();
        assert_eq!(ctx.texture(tex).unwrap().dims, [1, 1, 1]);
    }

    #[test]
    fn marker_size_is_baked_into_vertices() {
        let mut ctx = Context::headless();
        let mut v = random_marker(8);
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();
        assert!(vertices(&mut ctx, &v).iter().all(|m| m.size == 20.0));
    }

    #[test]
    fn scatter_uses_per_item_sizes() {
        let mut ctx = Context::headless();
        let mut v = Visual::new(VisualKind::Scatter, VisualFlags::NONE);
        v.set_data(PropKind::Pos, 0, vec![[0.0f32; 3]; 3]).unwrap();
        v.set_data(PropKind::Color, 0, vec![[255u8; 4]; 3]).unwrap();
        v.set_data(PropKind::Size, 0, vec![1.0f32, 2.0, 3.0]).unwrap();
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();

        let sizes: Vec<f32> = vertices(&mut ctx, &v).iter().map(|m| m.size).collect();
        assert_eq!(sizes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn data_coords_normalize_positions() {
        let mut ctx = Context::headless();
        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        v.set_data(PropKind::Pos, 0, vec![[0.0f32, 0.0, 0.0], [10.0, 100.0, 0.0]]).unwrap();
        v.set_data(PropKind::Color, 0, vec![[0u8; 4]; 2]).unwrap();
        v.update(viewport(), DataCoords::with_bounds(0.0, 0.0, 10.0, 100.0), &mut ctx)
            .unwrap();

        let verts = vertices(&mut ctx, &v);
        assert_eq!(verts[0].pos, [-1.0, -1.0, 0.0]);
        assert_eq!(verts[1].pos, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn update_is_idempotent() {
        let mut ctx = Context::headless();
        let mut v = random_marker(100);
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();

        let region = v.vertex_region().unwrap();
        let before = ctx.download(&region, 0, region.size()).unwrap();
        let stats = ctx.stats();

        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();

        assert_eq!(ctx.stats().bytes_uploaded, stats.bytes_uploaded);
        assert_eq!(ctx.download(&region, 0, region.size()).unwrap(), before);
    }

    #[test]
    fn only_changed_properties_are_uploaded() {
        let mut ctx = Context::headless();
        let mut v = random_marker(16);
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();
        let before = ctx.stats().bytes_uploaded;

        v.set_data(PropKind::Model, 0, crate::visual::MAT4_IDENTITY).unwrap();
        assert_eq!(v.status(), ObjStatus::NeedUpdate);
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();

        // Only the 192-byte MVP block went up.
        assert_eq!(ctx.stats().bytes_uploaded - before, 192);
    }

    #[test]
    fn vertex_region_grows_when_items_exceed_capacity() {
        let mut ctx = Context::headless();
        let mut v = random_marker(4);
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();
        assert_eq!(v.vertex_region().unwrap().count, 4);

        v.set_data(PropKind::Pos, 0, vec![[0.0f32; 3]; 5]).unwrap();
        v.set_data(PropKind::Color, 0, vec![[0u8; 4]; 5]).unwrap();
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();
        assert_eq!(v.vertex_region().unwrap().count, 8);
    }

    #[test]
    fn axes_draw_one_line_per_tick() {
        let mut ctx = Context::headless();
        let ticks: Vec<f32> = (0..10).map(|i| -1.0 + 2.0 * i as f32 / 9.0).collect();

        for flags in [VisualFlags::AXIS_X, VisualFlags::AXIS_Y] {
            let mut v = Visual::new(VisualKind::Axes2D, flags);
            v.set_data(PropKind::Pos, AxisLevel::Grid.index(), ticks.clone()).unwrap();
            v.set_data(PropKind::Color, 0, [255u8, 0, 0, 255]).unwrap();
            v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();
            assert_eq!(v.item_count(), 10);

            let region = v.vertex_region().unwrap();
            let bytes = ctx.download(&region, 0, 28).unwrap();
            let first: SegmentVertex = bytemuck::pod_read_unaligned(&bytes);
            match flags.axis() {
                Axis::X => assert_eq!((first.p0, first.p1), ([-1.0, -1.0, 0.0], [-1.0, 1.0, 0.0])),
                Axis::Y => assert_eq!((first.p0, first.p1), ([-1.0, -1.0, 0.0], [1.0, -1.0, 0.0])),
            }
            assert_eq!(first.color, [255, 0, 0, 255]);
        }
    }

    #[test]
    fn axes_without_ticks_are_incomplete() {
        let mut ctx = Context::headless();
        let mut v = Visual::new(VisualKind::Axes2D, VisualFlags::AXIS_X);
        assert!(matches!(
            v.update(viewport(), DataCoords::ndc(), &mut ctx),
            Err(Error::MissingProperty { prop: PropKind::Pos, .. })
        ));
    }

    #[test]
    fn explicit_texture_is_uploaded() {
        let mut ctx = Context::headless();
        let mut v = random_marker(2);
        let texels: Vec<u8> = (0..2 * 2 * 4).collect();
        v.set_texture_data(PropKind::ColorTexture, [2, 2, 1], Some(&texels)).unwrap();
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();

        let tex = ctx.texture(v.texture().unwrap()).unwrap().clone();
        assert_eq!(tex.dims, [2, 2, 1]);
        let backend = ctx.backend().as_any().downcast_ref::<HeadlessBackend>().unwrap();
        assert_eq!(backend.texture_data(tex.raw).unwrap(), &texels[..]);
    }

    // ── sources ───────────────────────────────────────────────────────────

    #[test]
    fn undeclared_source_is_rejected() {
        let mut ctx = Context::headless();
        let r = ctx.allocate_buffers(BufferKind::Uniform, 1, 64).unwrap();
        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        assert!(matches!(
            v.bind_source(&mut ctx, SourceKind::Uniform, 7, r),
            Err(Error::InvalidSource { binding: 7, .. })
        ));
    }

    #[test]
    fn undersized_source_is_rejected() {
        let mut ctx = Context::headless();
        let r = ctx.allocate_buffers(BufferKind::Uniform, 1, 16).unwrap();
        let mut v = Visual::new(VisualKind::Marker, VisualFlags::NONE);
        assert!(matches!(
            v.bind_source(&mut ctx, SourceKind::Uniform, BINDING_VIEWPORT, r),
            Err(Error::SourceTooSmall { required: 48, available: 16, .. })
        ));
    }

    #[test]
    fn shared_viewport_is_left_to_its_owner() {
        let backend = HeadlessBackend::new().with_limits(DeviceLimits {
            min_uniform_alignment: 64,
            ..DeviceLimits::default()
        });
        let mut ctx = Context::new(Box::new(backend), Default::default());
        let shared = ctx.allocate_buffers(BufferKind::Uniform, 1, 48).unwrap();
        ctx.upload(&shared, 0, &[7; 48]).unwrap();

        let mut a = random_marker(10);
        let mut b = random_marker(10);
        a.bind_source(&mut ctx, SourceKind::Uniform, BINDING_VIEWPORT, shared).unwrap();
        b.bind_source(&mut ctx, SourceKind::Uniform, BINDING_VIEWPORT, shared).unwrap();
        a.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();
        b.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();

        assert_eq!(ctx.download(&shared, 0, 48).unwrap(), vec![7; 48]);

        // Destroying one visual keeps the region alive for the other and the owner.
        a.destroy(&mut ctx);
        assert!(ctx.upload(&shared, 0, &[1; 48]).is_ok());
        b.destroy(&mut ctx);
        ctx.release(&shared);
        assert_eq!(ctx.live_regions(), 0);
    }

    #[test]
    fn shared_vertex_region_must_hold_every_item() {
        let mut ctx = Context::headless();
        let r = ctx.allocate_buffers(BufferKind::Vertex, 4, 20).unwrap();
        let mut v = random_marker(10);
        v.bind_source(&mut ctx, SourceKind::Vertex, VERTEX_SLOT, r).unwrap();
        assert!(matches!(
            v.update(viewport(), DataCoords::ndc(), &mut ctx),
            Err(Error::SourceTooSmall { source_kind: SourceKind::Vertex, required: 200, available: 80, .. })
        ));
    }

    #[test]
    fn destroy_releases_owned_memory() {
        let mut ctx = Context::headless();
        let mut v = random_marker(10);
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();
        assert_eq!(ctx.live_regions(), 4);

        v.destroy(&mut ctx);
        assert_eq!(ctx.live_regions(), 0);
        assert_eq!(v.status(), ObjStatus::Destroyed);
        assert!(matches!(v.set_data(PropKind::MarkerSize, 0, 1.0f32), Err(Error::Destroyed)));
    }

    // ── record_draw ───────────────────────────────────────────────────────

    #[test]
    fn record_before_update_records_nothing() {
        let v = random_marker(10);
        let mut c = cmds();
        v.record_draw(&mut c, viewport(), ColorRgba::black());
        assert!(c.is_empty());
    }

    #[test]
    fn record_emits_bindings_and_instanced_draw() {
        let mut ctx = Context::headless();
        let mut v = random_marker(1000);
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();

        let mut c = cmds();
        c.begin();
        v.record_draw(&mut c, viewport(), ColorRgba::white());
        c.end();

        let recorded = c.commands();
        assert_eq!(recorded[0], Command::BeginRenderPass { clear: ColorRgba::white() });
        assert!(recorded.contains(&Command::BindPipeline(crate::commands::PipelineKey::Marker)));
        assert!(recorded.contains(&Command::SetScissor { x: 0, y: 0, width: 800, height: 600 }));
        let uniforms = recorded.iter().filter(|c| matches!(c, Command::BindUniform { .. })).count();
        assert_eq!(uniforms, 3);
        assert!(recorded.contains(&Command::Draw { vertex_count: 6, instance_count: 1000 }));
        assert_eq!(recorded.last(), Some(&Command::EndRenderPass));
    }

    #[test]
    fn every_kind_records_after_required_data() {
        let mut ctx = Context::headless();

        let mut axes = Visual::new(VisualKind::Axes2D, VisualFlags::AXIS_Y);
        axes.set_data(PropKind::Pos, AxisLevel::Major.index(), vec![-0.5f32, 0.0, 0.5])
            .unwrap();

        let mut scatter = Visual::new(VisualKind::Scatter, VisualFlags::NONE);
        scatter.set_data(PropKind::Pos, 0, vec![[0.1f32, 0.2, 0.0]]).unwrap();
        scatter.set_data(PropKind::Color, 0, vec![[1u8, 2, 3, 4]]).unwrap();

        for mut v in [random_marker(5), segments(5), axes, scatter] {
            v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();
            let mut c = cmds();
            v.record_draw(&mut c, viewport(), ColorRgba::black());
            assert_eq!(c.draw_count(), 1, "{:?}", v.kind());
        }
    }

    #[test]
    fn memory_fallback_keeps_visual_drawable() {
        let memory = MemoryProperties::from_flags(&[crate::context::MemoryFlags::DEVICE_LOCAL]);
        let backend = HeadlessBackend::new().with_memory_properties(memory);
        let mut ctx = Context::new(Box::new(backend), Default::default());

        let mut v = random_marker(10);
        v.update(viewport(), DataCoords::ndc(), &mut ctx).unwrap();
        let mut c = cmds();
        v.record_draw(&mut c, viewport(), ColorRgba::black());
        assert_eq!(c.draw_count(), 1);
    }
}
