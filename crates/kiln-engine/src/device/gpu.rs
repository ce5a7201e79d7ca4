use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::mpsc::channel;

use anyhow::{Context, Result};
use wgpu::util::DeviceExt;

use crate::coords::IRect;
use crate::draw::{fan_to_list_indices, rect_vertices, DrawState, PrimitiveType, MAX_STAGES};
use crate::paint::{BlendFunc, Color, Filter};

use super::pipeline::{self, PipelineKey, Pipelines, SamplerKey, StencilKey, Uniforms};
use super::{
    row_stride, Device, DeviceCaps, DeviceDraw, PixelConfig, RenderTarget, StencilBuffer, StencilId, Texture,
    TextureDesc, TextureFlags, TextureId, WgpuInit,
};

/// Texture id of the default render target.
const DEFAULT_TARGET: TextureId = TextureId(0);
/// Stencil owned by the default render target.
const DEFAULT_STENCIL: StencilId = StencilId(0);

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    desc: TextureDesc,
}

struct GpuStencil {
    buffer: StencilBuffer,
    view: wgpu::TextureView,
    _texture: wgpu::Texture,
}

/// Headless wgpu device.
///
/// Owns the wgpu core objects and every texture the context allocates. Draws
/// are recorded into one command encoder that [`Device::submit`] hands to the
/// queue; readback submits first.
pub struct WgpuDevice {
    adapter_info: wgpu::AdapterInfo,
    device: wgpu::Device,
    queue: wgpu::Queue,
    caps: DeviceCaps,

    pipelines: Pipelines,
    /// Bound to stages a draw leaves empty.
    dummy_view: wgpu::TextureView,

    textures: HashMap<TextureId, GpuTexture>,
    stencils: HashMap<StencilId, GpuStencil>,
    attachments: HashMap<TextureId, StencilId>,
    next_id: u64,

    encoder: Option<wgpu::CommandEncoder>,
    bound_target: Option<TextureId>,
}

impl WgpuDevice {
    /// Creates a device with a `width` x `height` default render target.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: WgpuInit) -> Result<Self> {
        anyhow::ensure!(init.width > 0 && init.height > 0, "default render target has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("kiln-engine device"),
                required_features: init.required_features,
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let adapter_info = adapter.get_info();
        log::info!(
            "kiln: wgpu device ready ({} / {:?}), default target {}x{}",
            adapter_info.name,
            adapter_info.backend,
            init.width,
            init.height
        );

        let max = device.limits().max_texture_dimension_2d;
        let caps = DeviceCaps {
            max_texture_size: max,
            max_render_target_size: max,
            hw_antialias: false,
            shader_support: true,
            npot_texture_support: true,
            npot_texture_tile_support: true,
            index8_support: false,
        };

        let pipelines = Pipelines::new(&device);
        let dummy = create_gpu_texture(&device, &TextureDesc::new(1, 1, PixelConfig::Rgba8888))
            .context("failed to create placeholder texture")?;
        queue.write_texture(
            dummy.texture.as_image_copy(),
            &[0xff; 4],
            wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(4), rows_per_image: Some(1) },
            wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        );

        let mut this = Self {
            adapter_info,
            device,
            queue,
            caps,
            pipelines,
            dummy_view: dummy.view,
            textures: HashMap::new(),
            stencils: HashMap::new(),
            attachments: HashMap::new(),
            next_id: 1,
            encoder: None,
            bound_target: None,
        };

        let target_desc =
            TextureDesc::new(init.width, init.height, PixelConfig::Rgba8888).with_flags(TextureFlags::RENDER_TARGET);
        let target = create_gpu_texture(&this.device, &target_desc).context("failed to create default render target")?;
        this.textures.insert(DEFAULT_TARGET, target);
        let stencil = this.create_stencil(DEFAULT_STENCIL, init.width, init.height);
        this.stencils.insert(DEFAULT_STENCIL, stencil);
        this.attachments.insert(DEFAULT_TARGET, DEFAULT_STENCIL);

        Ok(this)
    }

    /// Blocking wrapper around [`WgpuDevice::new`].
    pub fn new_blocking(init: WgpuInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Number of render pipelines built so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.pipeline_count()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("kiln encoder") })
        })
    }

    fn create_stencil(&self, id: StencilId, width: u32, height: u32) -> GpuStencil {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kiln stencil"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: pipeline::STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuStencil { buffer: StencilBuffer { id, width, height, sample_count: 1 }, view, _texture: texture }
    }

    /// Copies tightly packed (or `row_bytes`-strided) `config` rows into `rect`.
    fn upload(&mut self, id: TextureId, rect: IRect, config: PixelConfig, src: &[u8], row_bytes: usize) -> bool {
        let Some(tex) = self.textures.get(&id) else {
            return false;
        };
        let bounds = IRect::from_wh(tex.desc.width as i32, tex.desc.height as i32);
        if !bounds.contains_rect(rect) {
            return false;
        }
        let (w, h) = (rect.width() as usize, rect.height() as usize);
        let stride = row_stride(row_bytes, w as u32, config);
        let Some(packed) = convert_pixels(src, config, stride, w, h, tex.desc.config) else {
            return false;
        };
        let bpp = tex.desc.config.bytes_per_pixel();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: rect.left as u32, y: rect.top as u32, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            &packed,
            wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some((w * bpp) as u32), rows_per_image: Some(h as u32) },
            wgpu::Extent3d { width: w as u32, height: h as u32, depth_or_array_layers: 1 },
        );
        true
    }
}

fn create_gpu_texture(device: &wgpu::Device, desc: &TextureDesc) -> Option<GpuTexture> {
    let format = pipeline::texture_format(desc.config)?;
    let mut usage =
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC;
    if desc.is_render_target() {
        usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(if desc.is_render_target() { "kiln render target" } else { "kiln texture" }),
        size: wgpu::Extent3d { width: desc.width, height: desc.height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Some(GpuTexture { texture, view, desc: *desc })
}

fn decode(config: PixelConfig, px: &[u8]) -> Option<[u8; 4]> {
    match config {
        PixelConfig::Rgba8888 => Some([px[0], px[1], px[2], px[3]]),
        PixelConfig::Bgra8888 => Some([px[2], px[1], px[0], px[3]]),
        PixelConfig::Alpha8 => Some([px[0]; 4]),
        _ => None,
    }
}

fn encode(config: PixelConfig, [r, g, b, a]: [u8; 4], out: &mut Vec<u8>) {
    match config {
        PixelConfig::Bgra8888 => out.extend_from_slice(&[b, g, r, a]),
        PixelConfig::Alpha8 => out.push(a),
        _ => out.extend_from_slice(&[r, g, b, a]),
    }
}

/// Repacks `height` rows of `from` pixels as tightly packed `to` pixels.
fn convert_pixels(
    src: &[u8],
    from: PixelConfig,
    stride: usize,
    width: usize,
    height: usize,
    to: PixelConfig,
) -> Option<Vec<u8>> {
    let bpp = from.bytes_per_pixel();
    if height == 0 || src.len() < stride * (height - 1) + width * bpp {
        return None;
    }
    let mut out = Vec::with_capacity(width * height * to.bytes_per_pixel());
    for row in 0..height {
        for col in 0..width {
            let at = row * stride + col * bpp;
            encode(to, decode(from, &src[at..at + bpp])?, &mut out);
        }
    }
    Some(out)
}

fn wgpu_color(c: Color) -> wgpu::Color {
    wgpu::Color { r: c.r as f64, g: c.g as f64, b: c.b as f64, a: c.a as f64 }
}

impl Device for WgpuDevice {
    fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    fn default_render_target(&self) -> RenderTarget {
        let (width, height) = self
            .textures
            .get(&DEFAULT_TARGET)
            .map_or((0, 0), |t| (t.desc.width, t.desc.height));
        RenderTarget { texture: DEFAULT_TARGET, width, height, sample_count: 1, needs_stencil: true }
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>, row_bytes: usize) -> Option<Texture> {
        let max = if desc.is_render_target() { self.caps.max_render_target_size } else { self.caps.max_texture_size };
        if desc.is_empty() || desc.width > max || desc.height > max || desc.aa_level.sample_count() > 1 {
            log::debug!("kiln: rejecting texture {desc:?}");
            return None;
        }
        let gpu = create_gpu_texture(&self.device, desc)?;
        let id = TextureId(self.next_id());
        self.textures.insert(id, gpu);
        if let Some(data) = data {
            let rect = IRect::from_wh(desc.width as i32, desc.height as i32);
            if !self.upload(id, rect, desc.config, data, row_bytes) {
                log::warn!("kiln: initial upload for texture {id:?} failed");
            }
        }
        Some(Texture { id, desc: *desc })
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if id == DEFAULT_TARGET || self.textures.remove(&id).is_none() {
            log::warn!("kiln: destroy of unknown texture {id:?}");
            return;
        }
        self.attachments.remove(&id);
        if self.bound_target == Some(id) {
            self.bound_target = None;
        }
    }

    fn create_stencil_buffer(&mut self, width: u32, height: u32, sample_count: u32) -> Option<StencilBuffer> {
        let max = self.caps.max_render_target_size;
        if width == 0 || height == 0 || width > max || height > max || sample_count > 1 {
            return None;
        }
        let id = StencilId(self.next_id());
        let stencil = self.create_stencil(id, width, height);
        let buffer = stencil.buffer;
        self.stencils.insert(id, stencil);
        Some(buffer)
    }

    fn destroy_stencil_buffer(&mut self, id: StencilId) {
        if id == DEFAULT_STENCIL || self.stencils.remove(&id).is_none() {
            log::warn!("kiln: destroy of unknown stencil {id:?}");
            return;
        }
        self.attachments.retain(|_, s| *s != id);
    }

    fn attach_stencil_buffer(&mut self, target: TextureId, stencil: Option<StencilId>) -> bool {
        let Some(tex) = self.textures.get(&target).filter(|t| t.desc.is_render_target()) else {
            return false;
        };
        match stencil {
            Some(sid) => {
                // Attachments must match the color target's size.
                let fits = self
                    .stencils
                    .get(&sid)
                    .is_some_and(|s| s.buffer.width == tex.desc.width && s.buffer.height == tex.desc.height);
                if !fits {
                    return false;
                }
                self.attachments.insert(target, sid);
            }
            None => {
                self.attachments.remove(&target);
            }
        }
        true
    }

    fn bind_render_target(&mut self, target: &RenderTarget) {
        if self.bound_target != Some(target.texture) {
            log::debug!("kiln: render target -> {:?}", target.texture);
        }
        self.bound_target = Some(target.texture);
    }

    fn clear(&mut self, target: &RenderTarget, rect: Option<IRect>, color: Color) {
        let Some(tex) = self.textures.get(&target.texture) else {
            return;
        };
        let bounds = IRect::from_wh(tex.desc.width as i32, tex.desc.height as i32);
        let Some(area) = rect.map_or(Some(bounds), |r| r.intersect(bounds)) else {
            return;
        };
        let view = tex.view.clone();
        self.bound_target = Some(target.texture);

        if area == bounds {
            let encoder = self.encoder();
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kiln clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(wgpu_color(color)), store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            return;
        }

        // Partial clears are a scissored quad that replaces the destination.
        let mut state = DrawState::new(*target);
        state.blend = BlendFunc::SRC;
        state.clip = Some(area);
        let vertices = rect_vertices(area.into(), color);
        self.draw(&DeviceDraw { state: &state, primitive: PrimitiveType::TriangleFan, vertices: &vertices, indices: None });
    }

    fn draw(&mut self, draw: &DeviceDraw<'_>) {
        let st = draw.state;
        if draw.vertices.is_empty() || draw.element_count() == 0 {
            return;
        }
        let Some(target) = self.textures.get(&st.render_target.texture) else {
            log::warn!("kiln: draw to unknown target {:?}", st.render_target.texture);
            return;
        };
        let Some(format) = pipeline::texture_format(target.desc.config) else {
            return;
        };
        let bounds = IRect::from_wh(target.desc.width as i32, target.desc.height as i32);
        let Some(scissor) = st.clip.map_or(Some(bounds), |c| c.intersect(bounds)) else {
            return;
        };
        let target_view = target.view.clone();

        let stencil_view = self.attachments.get(&st.render_target.texture).and_then(|s| self.stencils.get(s)).map(|s| s.view.clone());
        if stencil_view.is_none() && !st.stencil.is_disabled() {
            log::warn!("kiln: stenciled draw to {:?} without a stencil attachment", st.render_target.texture);
        }

        let mut stage_views: [wgpu::TextureView; MAX_STAGES] = std::array::from_fn(|_| self.dummy_view.clone());
        let mut stage_samplers = [SamplerKey { wrap_x: Default::default(), wrap_y: Default::default(), linear: false }; MAX_STAGES];
        for (i, stage) in st.stages.iter().enumerate() {
            let Some(stage) = stage else { continue };
            let Some(tex) = self.textures.get(&stage.texture.id) else {
                log::warn!("kiln: draw samples unknown texture {:?}", stage.texture.id);
                return;
            };
            stage_views[i] = tex.view.clone();
            stage_samplers[i] = SamplerKey {
                wrap_x: stage.sampler.wrap_x,
                wrap_y: stage.sampler.wrap_y,
                linear: !matches!(stage.sampler.filter, Filter::Nearest),
            };
        }
        let samplers = stage_samplers.map(|k| self.pipelines.sampler(&self.device, k).clone());

        let indices: Option<Cow<'_, [u16]>> = match (draw.primitive, draw.indices) {
            (PrimitiveType::TriangleFan, None) => Some(Cow::Owned(fan_to_list_indices(draw.vertices.len()))),
            (PrimitiveType::TriangleFan, Some(idx)) => {
                Some(Cow::Owned(fan_to_list_indices(idx.len()).into_iter().map(|i| idx[i as usize]).collect()))
            }
            (_, idx) => idx.map(Cow::Borrowed),
        };

        let uniforms = Uniforms::from_state(st);
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kiln uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kiln vertices"),
            contents: bytemuck::cast_slice(draw.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = indices.as_ref().map(|idx| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kiln indices"),
                contents: bytemuck::cast_slice(idx),
                usage: wgpu::BufferUsages::INDEX,
            })
        });

        let mut entries = vec![wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() }];
        for (i, view) in stage_views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry { binding: 1 + i as u32, resource: wgpu::BindingResource::TextureView(view) });
        }
        for (i, sampler) in samplers.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 1 + (MAX_STAGES + i) as u32,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln draw bind group"),
            layout: &self.pipelines.bind_group_layout,
            entries: &entries,
        });

        let key = PipelineKey {
            format,
            topology: pipeline::topology(draw.primitive),
            blend: st.blend,
            stencil: stencil_view.as_ref().map(|_| StencilKey::new(&st.stencil)),
            color_writes: st.color_writes,
        };
        let pipeline = self.pipelines.pipeline(&self.device, key).clone();

        self.bound_target = Some(st.render_target.texture);
        let encoder = self.encoder();
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("kiln draw pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target_view,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                depth_slice: None,
            })],
            depth_stencil_attachment: stencil_view.as_ref().map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: None,
                stencil_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.set_scissor_rect(scissor.left as u32, scissor.top as u32, scissor.width() as u32, scissor.height() as u32);
        if stencil_view.is_some() {
            rpass.set_stencil_reference(u32::from(st.stencil.reference));
        }
        rpass.set_vertex_buffer(0, vertex_buffer.slice(..));
        match (&index_buffer, &indices) {
            (Some(ibo), Some(idx)) => {
                rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint16);
                rpass.draw_indexed(0..idx.len() as u32, 0, 0..1);
            }
            _ => rpass.draw(0..draw.vertices.len() as u32, 0..1),
        }
    }

    fn read_pixels(&mut self, texture: TextureId, rect: IRect, config: PixelConfig, dst: &mut [u8]) -> bool {
        let Some(tex) = self.textures.get(&texture) else {
            return false;
        };
        let bounds = IRect::from_wh(tex.desc.width as i32, tex.desc.height as i32);
        let (w, h) = (rect.width() as u32, rect.height() as u32);
        if !config.is_readable()
            || !bounds.contains_rect(rect)
            || dst.len() < w as usize * h as usize * config.bytes_per_pixel()
        {
            return false;
        }
        let src_config = tex.desc.config;
        let row_bytes = w * src_config.bytes_per_pixel() as u32;
        let padded = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kiln readback"),
            size: u64::from(padded) * u64::from(h),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let src_texture = tex.texture.clone();

        self.encoder().copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &src_texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: rect.left as u32, y: rect.top as u32, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(padded), rows_per_image: Some(h) },
            },
            wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
        );
        self.submit();

        let slice = readback.slice(..);
        let (sender, receiver) = channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            drop(sender.send(res));
        });
        if let Err(err) = self.device.poll(wgpu::PollType::Wait { submission_index: None, timeout: None }) {
            log::warn!("kiln: readback poll failed: {err}");
            return false;
        }
        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                log::warn!("kiln: readback map failed: {err}");
                return false;
            }
            Err(_) => return false,
        }

        let converted = {
            let mapped = slice.get_mapped_range();
            convert_pixels(&mapped, src_config, padded as usize, w as usize, h as usize, config)
        };
        readback.unmap();
        let Some(pixels) = converted else {
            return false;
        };
        dst[..pixels.len()].copy_from_slice(&pixels);
        true
    }

    fn write_pixels(
        &mut self,
        texture: TextureId,
        rect: IRect,
        config: PixelConfig,
        src: &[u8],
        row_bytes: usize,
    ) -> bool {
        // Queue writes land before the next submission; recorded draws go first.
        self.submit();
        self.upload(texture, rect, config, src, row_bytes)
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit([encoder.finish()]);
        }
    }

    fn reset_state(&mut self) {
        log::debug!("kiln: device state reset");
        self.bound_target = None;
    }

    fn abandon_resources(&mut self) {
        log::info!("kiln: abandoning {} textures, {} stencils", self.textures.len(), self.stencils.len());
        self.encoder = None;
        self.bound_target = None;
        self.textures.retain(|id, _| *id == DEFAULT_TARGET);
        self.stencils.retain(|id, _| *id == DEFAULT_STENCIL);
        self.attachments.retain(|id, _| *id == DEFAULT_TARGET);
    }

    fn release_resources(&mut self) {
        log::debug!("kiln: releasing {} pipelines", self.pipelines.pipeline_count());
        self.pipelines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_swaps_channels_and_honors_stride() {
        // Two BGRA pixels per row, rows padded to 12 bytes.
        let src = [3, 2, 1, 4, 7, 6, 5, 8, 0, 0, 0, 0, 11, 10, 9, 12, 15, 14, 13, 16];
        let out = convert_pixels(&src, PixelConfig::Bgra8888, 12, 2, 2, PixelConfig::Rgba8888).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
    }

    #[test]
    fn alpha_expands_to_gray_and_back() {
        let rgba = convert_pixels(&[0x80], PixelConfig::Alpha8, 1, 1, 1, PixelConfig::Rgba8888).unwrap();
        assert_eq!(rgba, vec![0x80; 4]);
        let alpha = convert_pixels(&rgba, PixelConfig::Rgba8888, 4, 1, 1, PixelConfig::Alpha8).unwrap();
        assert_eq!(alpha, vec![0x80]);
    }

    #[test]
    fn short_or_palette_sources_are_rejected() {
        assert!(convert_pixels(&[0; 7], PixelConfig::Rgba8888, 4, 2, 1, PixelConfig::Rgba8888).is_none());
        assert!(convert_pixels(&[0; 4], PixelConfig::Index8, 1, 4, 1, PixelConfig::Rgba8888).is_none());
    }
}
