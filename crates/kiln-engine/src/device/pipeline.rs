use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::draw::{CoordSource, DrawState, PrimitiveType, StencilFace, StencilFunc, StencilOp, StencilSettings, Vertex, MAX_STAGES};
use crate::paint::{BlendCoeff, BlendFunc, Filter, WrapMode};

use super::PixelConfig;

/// Format used for stencil attachments.
pub(super) const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Stencil8;

/// wgpu format for a pixel config, when the device can store it.
pub(super) fn texture_format(config: PixelConfig) -> Option<wgpu::TextureFormat> {
    match config {
        PixelConfig::Alpha8 => Some(wgpu::TextureFormat::R8Unorm),
        PixelConfig::Rgba8888 => Some(wgpu::TextureFormat::Rgba8Unorm),
        PixelConfig::Bgra8888 => Some(wgpu::TextureFormat::Bgra8Unorm),
        PixelConfig::Index8 | PixelConfig::Rgb565 | PixelConfig::Rgba4444 => None,
    }
}

/// Per-draw uniforms. Layout mirrors `Uniforms` in `shaders/draw.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct Uniforms {
    view: [[f32; 4]; 3],
    target_size: [f32; 2],
    stage_mask: u32,
    _pad0: u32,
    stage_matrices: [[[f32; 4]; 3]; MAX_STAGES],
    stage_params: [[u32; 4]; MAX_STAGES],
    kernel: [[f32; 4]; 7],
    kernel_step: [f32; 2],
    kernel_width: u32,
    _pad1: u32,
}

impl Uniforms {
    pub(super) fn from_state(state: &DrawState) -> Self {
        let mut u = Uniforms::zeroed();
        u.view = state.view_matrix.to_columns();
        u.target_size = [state.render_target.width as f32, state.render_target.height as f32];
        u.stage_mask = state.stage_mask();

        for (i, stage) in state.stages.iter().enumerate() {
            let Some(stage) = stage else { continue };
            u.stage_matrices[i] = stage.sampler.matrix.to_columns();
            let filter = match stage.sampler.filter {
                Filter::Nearest => 0,
                Filter::Bilinear => 1,
                Filter::Downsample4x4 => 2,
                Filter::Convolution(kernel) => {
                    u.kernel = kernel.packed();
                    u.kernel_step = kernel.image_increment;
                    u.kernel_width = kernel.width() as u32;
                    3
                }
            };
            let coords = u32::from(stage.coords == CoordSource::TexCoord);
            u.stage_params[i] = [filter, coords, u32::from(stage.is_alpha_only()), 0];
        }
        u
    }
}

/// Everything that selects a distinct render pipeline.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct PipelineKey {
    pub format: wgpu::TextureFormat,
    pub topology: wgpu::PrimitiveTopology,
    pub blend: BlendFunc,
    pub stencil: Option<StencilKey>,
    pub color_writes: bool,
}

/// Stencil settings minus the reference value, which is dynamic state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct StencilKey {
    front: StencilFace,
    back: StencilFace,
    read_mask: u8,
    write_mask: u8,
}

impl StencilKey {
    /// Targets with a stencil attachment always carry a key; disabled
    /// settings become a pass-through state.
    pub(super) fn new(s: &StencilSettings) -> Self {
        Self { front: s.front, back: s.back, read_mask: s.read_mask, write_mask: s.write_mask }
    }
}

/// wgpu has no fan topology; fans are expanded to lists by the caller.
pub(super) fn topology(primitive: PrimitiveType) -> wgpu::PrimitiveTopology {
    match primitive {
        PrimitiveType::Triangles | PrimitiveType::TriangleFan => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveType::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        PrimitiveType::Points => wgpu::PrimitiveTopology::PointList,
        PrimitiveType::Lines => wgpu::PrimitiveTopology::LineList,
        PrimitiveType::LineStrip => wgpu::PrimitiveTopology::LineStrip,
    }
}

fn blend_factor(c: BlendCoeff) -> wgpu::BlendFactor {
    match c {
        BlendCoeff::Zero => wgpu::BlendFactor::Zero,
        BlendCoeff::One => wgpu::BlendFactor::One,
        BlendCoeff::Sc => wgpu::BlendFactor::Src,
        BlendCoeff::Isc => wgpu::BlendFactor::OneMinusSrc,
        BlendCoeff::Dc => wgpu::BlendFactor::Dst,
        BlendCoeff::Idc => wgpu::BlendFactor::OneMinusDst,
        BlendCoeff::Sa => wgpu::BlendFactor::SrcAlpha,
        BlendCoeff::Isa => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendCoeff::Da => wgpu::BlendFactor::DstAlpha,
        BlendCoeff::Ida => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

fn blend_state(b: BlendFunc) -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: blend_factor(b.src),
        dst_factor: blend_factor(b.dst),
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}

fn compare(f: StencilFunc) -> wgpu::CompareFunction {
    match f {
        StencilFunc::Always => wgpu::CompareFunction::Always,
        StencilFunc::Never => wgpu::CompareFunction::Never,
        StencilFunc::Equal => wgpu::CompareFunction::Equal,
        StencilFunc::NotEqual => wgpu::CompareFunction::NotEqual,
        StencilFunc::Less => wgpu::CompareFunction::Less,
        StencilFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        StencilFunc::Greater => wgpu::CompareFunction::Greater,
        StencilFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
    }
}

fn stencil_op(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::IncWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOp::DecWrap => wgpu::StencilOperation::DecrementWrap,
        StencilOp::IncClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOp::DecClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
    }
}

fn stencil_face(f: StencilFace) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare: compare(f.func),
        fail_op: stencil_op(f.fail_op),
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op: stencil_op(f.pass_op),
    }
}

fn sampler_address(w: WrapMode) -> wgpu::AddressMode {
    match w {
        WrapMode::Clamp => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::Mirror => wgpu::AddressMode::MirrorRepeat,
    }
}

/// Sampler identity: address modes and whether taps are filtered.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct SamplerKey {
    pub wrap_x: WrapMode,
    pub wrap_y: WrapMode,
    pub linear: bool,
}

/// Shader module, layouts and lazily built pipelines/samplers.
pub(super) struct Pipelines {
    shader: wgpu::ShaderModule,
    pub bind_group_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    samplers: HashMap<SamplerKey, wgpu::Sampler>,
}

impl Pipelines {
    pub(super) fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kiln draw shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/draw.wgsl").into()),
        });

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as u64),
            },
            count: None,
        }];
        for i in 0..MAX_STAGES as u32 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1 + i,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        for i in 0..MAX_STAGES as u32 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1 + MAX_STAGES as u32 + i,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln draw bgl"),
            entries: &entries,
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kiln draw pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Self { shader, bind_group_layout, layout, pipelines: HashMap::new(), samplers: HashMap::new() }
    }

    pub(super) fn pipeline(&mut self, device: &wgpu::Device, key: PipelineKey) -> &wgpu::RenderPipeline {
        let Self { shader, layout, pipelines, .. } = self;
        pipelines.entry(key).or_insert_with(|| {
            log::debug!("kiln: building pipeline {key:?}");
            build_pipeline(device, shader, layout, key)
        })
    }

    pub(super) fn sampler(&mut self, device: &wgpu::Device, key: SamplerKey) -> &wgpu::Sampler {
        self.samplers.entry(key).or_insert_with(|| {
            let filter = if key.linear { wgpu::FilterMode::Linear } else { wgpu::FilterMode::Nearest };
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("kiln sampler"),
                address_mode_u: sampler_address(key.wrap_x),
                address_mode_v: sampler_address(key.wrap_y),
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            })
        })
    }

    /// Drops every built pipeline and sampler; they are rebuilt on demand.
    pub(super) fn clear(&mut self) {
        self.pipelines.clear();
        self.samplers.clear();
    }

    pub(super) fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let vertex_layout = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute { format: wgpu::VertexFormat::Float32x2, offset: 0, shader_location: 0 },
            wgpu::VertexAttribute { format: wgpu::VertexFormat::Float32x2, offset: 8, shader_location: 1 },
            wgpu::VertexAttribute { format: wgpu::VertexFormat::Float32x4, offset: 16, shader_location: 2 },
            wgpu::VertexAttribute { format: wgpu::VertexFormat::Float32, offset: 32, shader_location: 3 },
        ],
    };

    let strip_index_format = matches!(
        key.topology,
        wgpu::PrimitiveTopology::TriangleStrip | wgpu::PrimitiveTopology::LineStrip
    )
    .then_some(wgpu::IndexFormat::Uint16);

    let depth_stencil = key.stencil.map(|s| wgpu::DepthStencilState {
        format: STENCIL_FORMAT,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil: wgpu::StencilState {
            front: stencil_face(s.front),
            back: stencil_face(s.back),
            read_mask: u32::from(s.read_mask),
            write_mask: u32::from(s.write_mask),
        },
        bias: wgpu::DepthBiasState::default(),
    });

    let write_mask = if key.color_writes { wgpu::ColorWrites::ALL } else { wgpu::ColorWrites::empty() };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("kiln draw pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[vertex_layout],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend: Some(blend_state(key.blend)),
                write_mask,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: key.topology,
            strip_index_format,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
