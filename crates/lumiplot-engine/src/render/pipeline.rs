use std::collections::HashMap;
use std::num::NonZeroU64;

use crate::commands::PipelineKey;
use crate::visual::layout::{
    BINDING_MVP, BINDING_PARAMS, BINDING_SAMPLER, BINDING_TEXTURE, BINDING_VIEWPORT, MarkerVertex, MvpUniform,
    ParamsUniform, SegmentVertex, ViewportUniform,
};

const COMMON_WGSL: &str = include_str!("shaders/common.wgsl");
const MARKER_WGSL: &str = include_str!("shaders/marker.wgsl");
const SEGMENT_WGSL: &str = include_str!("shaders/segment.wgsl");

pub(super) fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

/// One render pipeline per `PipelineKey`, all sharing a single bind group
/// layout that mirrors the visual bindings.
pub(super) struct Pipelines {
    pub format: wgpu::TextureFormat,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumiplot visual bgl"),
            entries: &[
                uniform_entry(BINDING_MVP, size_of_u64::<MvpUniform>()),
                uniform_entry(BINDING_VIEWPORT, size_of_u64::<ViewportUniform>()),
                uniform_entry(BINDING_PARAMS, size_of_u64::<ParamsUniform>()),
                wgpu::BindGroupLayoutEntry {
                    binding: BINDING_TEXTURE,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: BINDING_SAMPLER,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumiplot visual pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let mut pipelines = HashMap::new();
        pipelines.insert(
            PipelineKey::Marker,
            build(device, &layout, format, "marker", MARKER_WGSL, MarkerVertex::layout()),
        );
        pipelines.insert(
            PipelineKey::Segment,
            build(device, &layout, format, "segment", SEGMENT_WGSL, SegmentVertex::layout()),
        );
        log::debug!("visual pipelines built for {format:?}");

        Self {
            format,
            bind_group_layout,
            pipelines,
        }
    }

    #[inline]
    pub fn get(&self, key: PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&key)
    }
}

fn size_of_u64<T>() -> u64 {
    std::mem::size_of::<T>() as u64
}

fn uniform_entry(binding: u32, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

fn build(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    name: &str,
    source: &str,
    vertex: wgpu::VertexBufferLayout<'static>,
) -> wgpu::RenderPipeline {
    let label = format!("lumiplot {name}");
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&label),
        source: wgpu::ShaderSource::Wgsl(format!("{COMMON_WGSL}\n{source}").into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[vertex],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(premul_alpha_blend()),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
