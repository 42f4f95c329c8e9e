//! GPU rendering subsystem.
//!
//! The renderer replays the command buffers recorded by visuals into wgpu
//! render passes. Buffer regions and textures are `Context` handles; they are
//! resolved through the `WgpuBackend` at replay time.
//!
//! Convention:
//! - Visual positions are normalized device coordinates of their viewport.
//! - Marker sizes and line widths are in framebuffer pixels.

mod ctx;
mod pipeline;

use std::collections::HashMap;
use std::num::NonZeroU64;

pub use ctx::{RenderCtx, RenderTarget};

use crate::canvas::Canvas;
use crate::commands::{Command, CommandBuffer, CommandBufferState, PipelineKey};
use crate::context::{BufferKind, BufferRegions, Context, TextureId, WgpuBackend};
use crate::coords::ColorRgba;
use crate::visual::layout::{BINDING_MVP, BINDING_PARAMS, BINDING_SAMPLER, BINDING_TEXTURE, BINDING_VIEWPORT};

use pipeline::Pipelines;

/// Replays recorded command buffers.
///
/// Pipelines are built lazily for the surface format. Bind groups are cached
/// per binding set and dropped whenever a buffer pool is reallocated.
#[derive(Default)]
pub struct Renderer {
    pipelines: Option<Pipelines>,
    bind_groups: HashMap<BindKey, wgpu::BindGroup>,
    generations: HashMap<BufferKind, u64>,
    warned_backend: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays every executable buffer of `canvas`, in allocation order.
    pub fn render_canvas(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, canvas: &Canvas) {
        let (context, buffers) = canvas.render_parts();
        self.render(ctx, target, context, buffers, canvas.clear_color());
    }

    /// Replays `buffers`. The first render pass of the frame clears the
    /// target; later passes load it. With no pass at all the target is still
    /// cleared to `clear`.
    pub fn render(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        context: &Context,
        buffers: &[CommandBuffer],
        clear: ColorRgba,
    ) {
        let Some(backend) = context.backend().as_any().downcast_ref::<WgpuBackend>() else {
            if !self.warned_backend {
                log::warn!("context backend is '{}', not wgpu; nothing rendered", context.backend().name());
                self.warned_backend = true;
            }
            return;
        };

        self.ensure_pipelines(ctx);
        self.invalidate_stale(context);

        let mut first = true;
        for cmds in buffers {
            if cmds.state() != CommandBufferState::Executable {
                continue;
            }
            for (pass_clear, pass) in split_passes(cmds.commands()) {
                let load = if first {
                    wgpu::LoadOp::Clear(pass_clear.to_wgpu())
                } else {
                    wgpu::LoadOp::Load
                };
                self.encode_pass(ctx, target, context, backend, load, pass);
                first = false;
            }
        }

        if first {
            self.encode_pass(ctx, target, context, backend, wgpu::LoadOp::Clear(clear.to_wgpu()), &[]);
        }
    }

    // ── private helpers ────────────────────────────────────────────────────

    fn ensure_pipelines(&mut self, ctx: &RenderCtx<'_>) {
        if self.pipelines.as_ref().is_some_and(|p| p.format == ctx.surface_format) {
            return;
        }
        self.pipelines = Some(Pipelines::new(ctx.device, ctx.surface_format));
        self.bind_groups.clear();
    }

    fn invalidate_stale(&mut self, context: &Context) {
        for kind in BufferKind::POOLED {
            let Some((_, generation)) = context.pool_buffer(kind) else { continue };
            if self.generations.insert(kind, generation) != Some(generation) {
                if !self.bind_groups.is_empty() {
                    log::trace!("{kind:?} pool reallocated; dropping cached bind groups");
                }
                self.bind_groups.clear();
            }
        }
        prune_dead_textures(&mut self.bind_groups, context);
    }

    fn encode_pass(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        context: &Context,
        backend: &WgpuBackend,
        load: wgpu::LoadOp<wgpu::Color>,
        cmds: &[Command],
    ) {
        let Some(pipelines) = self.pipelines.as_ref() else { return };

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lumiplot visual pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let mut state = BindState::default();
        for cmd in cmds {
            match cmd {
                Command::SetViewport(r) => {
                    rpass.set_viewport(r.origin.x, r.origin.y, r.size.x, r.size.y, 0.0, 1.0);
                }
                Command::SetScissor { x, y, width, height } => {
                    rpass.set_scissor_rect(*x, *y, *width, *height);
                }
                Command::BindPipeline(key) => match pipelines.get(*key) {
                    Some(p) => {
                        rpass.set_pipeline(p);
                        state.pipeline = Some(*key);
                    }
                    None => state.pipeline = None,
                },
                Command::BindVertexBuffer { slot, region } => {
                    match resolve_buffer(context, backend, region.kind) {
                        Some(buffer) => {
                            rpass.set_vertex_buffer(*slot, buffer.slice(region.offset..region.offset + region.size()));
                            state.vertex = true;
                        }
                        None => state.vertex = false,
                    }
                }
                Command::BindUniform { binding, region } => state.bind_uniform(*binding, region),
                Command::BindTexture { texture, .. } => state.texture = Some(*texture),
                Command::Draw { vertex_count, instance_count } => {
                    let Some(key) = state.key() else {
                        log::trace!("draw skipped: incomplete bindings");
                        continue;
                    };
                    if !self.bind_groups.contains_key(&key) {
                        let Some(bg) = create_bind_group(ctx.device, &pipelines.bind_group_layout, context, backend, &key)
                        else {
                            log::warn!("draw skipped: unresolved binding {key:?}");
                            continue;
                        };
                        self.bind_groups.insert(key, bg);
                    }
                    rpass.set_bind_group(0, self.bind_groups.get(&key), &[]);
                    rpass.draw(0..*vertex_count, 0..*instance_count);
                }
                Command::BeginRenderPass { .. } | Command::EndRenderPass => {}
            }
        }
    }
}

/// Splits a recorded stream into render passes: each `BeginRenderPass` up to
/// its `EndRenderPass` (or the end of the stream). Commands outside a pass
/// are ignored.
fn split_passes(cmds: &[Command]) -> Vec<(ColorRgba, &[Command])> {
    let mut passes = Vec::new();
    let mut rest = cmds;
    while let Some(start) = rest.iter().position(|c| matches!(c, Command::BeginRenderPass { .. })) {
        let Command::BeginRenderPass { clear } = rest[start] else { break };
        let body = &rest[start + 1..];
        let end = body
            .iter()
            .position(|c| matches!(c, Command::EndRenderPass))
            .unwrap_or(body.len());
        passes.push((clear, &body[..end]));
        rest = body.get(end + 1..).unwrap_or(&[]);
    }
    passes
}

fn resolve_buffer<'b>(context: &Context, backend: &'b WgpuBackend, kind: BufferKind) -> Option<&'b wgpu::Buffer> {
    let (raw, _) = context.pool_buffer(kind)?;
    backend.buffer(raw)
}

/// A bound uniform item.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct UniformRef {
    kind: BufferKind,
    offset: u64,
    size: u64,
}

/// Everything a bind group is built from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct BindKey {
    mvp: UniformRef,
    viewport: UniformRef,
    params: UniformRef,
    texture: TextureId,
}

/// Bindings set so far in the current pass.
#[derive(Debug, Default)]
struct BindState {
    pipeline: Option<PipelineKey>,
    vertex: bool,
    mvp: Option<UniformRef>,
    viewport: Option<UniformRef>,
    params: Option<UniformRef>,
    texture: Option<TextureId>,
}

impl BindState {
    fn bind_uniform(&mut self, binding: u32, region: &BufferRegions) {
        let r = Some(UniformRef {
            kind: region.kind,
            offset: region.offset,
            size: region.item_size,
        });
        match binding {
            BINDING_MVP => self.mvp = r,
            BINDING_VIEWPORT => self.viewport = r,
            BINDING_PARAMS => self.params = r,
            other => log::warn!("uniform binding {other} is not part of the visual layout"),
        }
    }

    /// Bind group key, once a pipeline, a vertex buffer and every binding
    /// are set.
    fn key(&self) -> Option<BindKey> {
        if self.pipeline.is_none() || !self.vertex {
            return None;
        }
        Some(BindKey {
            mvp: self.mvp?,
            viewport: self.viewport?,
            params: self.params?,
            texture: self.texture?,
        })
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    context: &Context,
    backend: &WgpuBackend,
    key: &BindKey,
) -> Option<wgpu::BindGroup> {
    let uniform = |r: UniformRef| uniform_binding(context, backend, r);
    let texture = context.texture(key.texture)?;
    let view = backend.texture_view(texture.raw)?;

    Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("lumiplot visual bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: BINDING_MVP,
                resource: uniform(key.mvp)?,
            },
            wgpu::BindGroupEntry {
                binding: BINDING_VIEWPORT,
                resource: uniform(key.viewport)?,
            },
            wgpu::BindGroupEntry {
                binding: BINDING_PARAMS,
                resource: uniform(key.params)?,
            },
            wgpu::BindGroupEntry {
                binding: BINDING_TEXTURE,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: BINDING_SAMPLER,
                resource: wgpu::BindingResource::Sampler(backend.sampler()),
            },
        ],
    }))
}

fn uniform_binding<'b>(context: &Context, backend: &'b WgpuBackend, r: UniformRef) -> Option<wgpu::BindingResource<'b>> {
    let buffer = resolve_buffer(context, backend, r.kind)?;
    Some(wgpu::BindingResource::Buffer(wgpu::BufferBinding {
        buffer,
        offset: r.offset,
        size: NonZeroU64::new(r.size),
    }))
}

/// Drops cache entries whose texture the context no longer has.
fn prune_dead_textures<V>(cache: &mut HashMap<BindKey, V>, context: &Context) {
    cache.retain(|key, _| context.texture(key.texture).is_some());
}
