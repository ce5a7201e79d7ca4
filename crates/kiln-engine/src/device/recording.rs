//! CPU-side device that records every call.
//!
//! Keeps RGBA8 pixel storage for every texture so clears, uploads, readback
//! and untextured triangle draws produce real pixels. Used by the tests and
//! by hosts that have no GPU.

use std::collections::HashMap;

use crate::coords::{IRect, Matrix, Rect, Vec2};
use crate::draw::{DrawState, PrimitiveType, StencilSettings, Vertex, MAX_STAGES};
use crate::paint::{BlendCoeff, BlendFunc, Color};

use super::{
    row_stride, Device, DeviceCaps, DeviceDraw, PixelConfig, RenderTarget, StencilBuffer, StencilId, Texture,
    TextureDesc, TextureFlags, TextureId,
};

/// Summary of one draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub target: TextureId,
    pub primitive: PrimitiveType,
    pub vertex_count: usize,
    pub index_count: usize,
    pub stages: [Option<TextureId>; MAX_STAGES],
    pub view_matrix: Matrix,
    pub clip: Option<IRect>,
    pub blend: BlendFunc,
    pub stencil: StencilSettings,
    pub color_writes: bool,
    /// Device-space bounds of the submitted vertices.
    pub bounds: Option<Rect>,
}

impl DrawRecord {
    fn new(draw: &DeviceDraw<'_>) -> Self {
        let st = draw.state;
        let points: Vec<Vec2> = draw.vertices.iter().map(|v| st.view_matrix.map_point(v.pos())).collect();
        Self {
            target: st.render_target.texture,
            primitive: draw.primitive,
            vertex_count: draw.vertices.len(),
            index_count: draw.indices.map_or(0, <[u16]>::len),
            stages: st.stage_textures(),
            view_matrix: st.view_matrix,
            clip: st.clip,
            blend: st.blend,
            stencil: st.stencil,
            color_writes: st.color_writes,
            bounds: Rect::bounds_of(&points),
        }
    }
}

/// A device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    CreateTexture { id: TextureId, desc: TextureDesc },
    DestroyTexture(TextureId),
    CreateStencil { id: StencilId, width: u32, height: u32 },
    DestroyStencil(StencilId),
    AttachStencil { target: TextureId, stencil: Option<StencilId> },
    BindRenderTarget(TextureId),
    Clear { target: TextureId, rect: Option<IRect>, color: Color },
    Draw(DrawRecord),
    ReadPixels { texture: TextureId, rect: IRect },
    WritePixels { texture: TextureId, rect: IRect },
    Submit,
    ResetState,
    Abandon,
    Release,
}

struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl Surface {
    fn new(width: u32, height: u32) -> Self {
        Self { width, height, pixels: vec![[0; 4]; width as usize * height as usize] }
    }

    fn bounds(&self) -> IRect {
        IRect::from_wh(self.width as i32, self.height as i32)
    }

    fn index(&self, x: i32, y: i32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// The default render target's texture id.
pub const DEFAULT_TARGET: TextureId = TextureId(0);

pub struct RecordingDevice {
    caps: DeviceCaps,
    default_target: RenderTarget,
    surfaces: HashMap<TextureId, Surface>,
    descs: HashMap<TextureId, TextureDesc>,
    stencils: HashMap<StencilId, StencilBuffer>,
    attachments: HashMap<TextureId, StencilId>,
    next_id: u64,
    events: Vec<DeviceEvent>,
    fail_textures: bool,
    fail_render_targets: bool,
    fail_stencils: bool,
    unknown_frees: usize,
}

impl RecordingDevice {
    /// A device whose default render target is `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_caps(width, height, DeviceCaps::default())
    }

    pub fn with_caps(width: u32, height: u32, caps: DeviceCaps) -> Self {
        let mut surfaces = HashMap::new();
        surfaces.insert(DEFAULT_TARGET, Surface::new(width, height));
        Self {
            caps,
            default_target: RenderTarget {
                texture: DEFAULT_TARGET,
                width,
                height,
                sample_count: 1,
                needs_stencil: true,
            },
            surfaces,
            descs: HashMap::new(),
            stencils: HashMap::new(),
            attachments: HashMap::new(),
            next_id: 1,
            events: Vec::new(),
            fail_textures: false,
            fail_render_targets: false,
            fail_stencils: false,
            unknown_frees: 0,
        }
    }

    pub fn caps_mut(&mut self) -> &mut DeviceCaps {
        &mut self.caps
    }

    /// Makes every texture allocation fail.
    pub fn set_fail_textures(&mut self, fail: bool) {
        self.fail_textures = fail;
    }

    /// Makes render-target allocations fail; plain textures still succeed.
    pub fn set_fail_render_targets(&mut self, fail: bool) {
        self.fail_render_targets = fail;
    }

    pub fn set_fail_stencils(&mut self, fail: bool) {
        self.fail_stencils = fail;
    }

    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<DeviceEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.events.iter().filter_map(|e| match e {
            DeviceEvent::Draw(d) => Some(d),
            _ => None,
        })
    }

    /// Textures currently allocated, excluding the default target.
    pub fn live_textures(&self) -> usize {
        self.descs.len()
    }

    pub fn live_stencils(&self) -> usize {
        self.stencils.len()
    }

    /// Destroy calls for ids the device does not know.
    pub fn unknown_frees(&self) -> usize {
        self.unknown_frees
    }

    pub fn attached_stencil(&self, target: TextureId) -> Option<StencilId> {
        self.attachments.get(&target).copied()
    }

    /// Premultiplied RGBA8 at `(x, y)` of `texture`.
    pub fn pixel(&self, texture: TextureId, x: u32, y: u32) -> Option<[u8; 4]> {
        let s = self.surfaces.get(&texture)?;
        (x < s.width && y < s.height).then(|| s.pixels[s.index(x as i32, y as i32)])
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn rasterize(&mut self, draw: &DeviceDraw<'_>) {
        let st = draw.state;
        if !st.color_writes || !st.stencil.is_disabled() || draw.primitive.is_lines() {
            return;
        }
        if draw.primitive == PrimitiveType::Points {
            return;
        }
        let Some(surface) = self.surfaces.get_mut(&st.render_target.texture) else {
            return;
        };
        let bounds = match st.clip {
            Some(clip) => match clip.intersect(surface.bounds()) {
                Some(b) => b,
                None => return,
            },
            None => surface.bounds(),
        };
        let order: Vec<u16> = match draw.indices {
            Some(i) => i.to_vec(),
            None => (0..draw.vertices.len() as u16).collect(),
        };
        for tri in triangles(draw.primitive, &order) {
            let Some(v) = tri.map(|i| draw.vertices.get(i as usize)).into_iter().collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            fill_triangle(surface, bounds, st, [v[0], v[1], v[2]]);
        }
    }
}

fn triangles(primitive: PrimitiveType, order: &[u16]) -> Vec<[u16; 3]> {
    let n = order.len();
    match primitive {
        PrimitiveType::Triangles => order.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect(),
        PrimitiveType::TriangleFan if n >= 3 => (1..n - 1).map(|i| [order[0], order[i], order[i + 1]]).collect(),
        PrimitiveType::TriangleStrip if n >= 3 => (0..n - 2).map(|i| [order[i], order[i + 1], order[i + 2]]).collect(),
        _ => Vec::new(),
    }
}

fn fill_triangle(surface: &mut Surface, bounds: IRect, st: &DrawState, v: [&Vertex; 3]) {
    let p = v.map(|v| st.view_matrix.map_point(v.pos()));
    let area = (p[1] - p[0]).cross(p[2] - p[0]);
    if area.abs() <= f32::EPSILON {
        return;
    }
    let Some(tri_bounds) = Rect::bounds_of(&p) else {
        return;
    };
    let Some(region) = tri_bounds.round_out().intersect(bounds) else {
        return;
    };
    for y in region.top..region.bottom {
        for x in region.left..region.right {
            let c = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = (p[2] - p[1]).cross(c - p[1]) / area;
            let w1 = (p[0] - p[2]).cross(c - p[2]) / area;
            let w2 = 1.0 - w0 - w1;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let mut src = [0.0f32; 4];
            for (ch, out) in src.iter_mut().enumerate() {
                *out = v[0].color[ch] * w0 + v[1].color[ch] * w1 + v[2].color[ch] * w2;
            }
            let coverage = v[0].coverage * w0 + v[1].coverage * w1 + v[2].coverage * w2;
            let src = src.map(|c| c * coverage);
            let idx = surface.index(x, y);
            let dst = surface.pixels[idx].map(|b| b as f32 / 255.0);
            let out = blend(st.blend, src, dst);
            surface.pixels[idx] = Color::from_premul(out[0], out[1], out[2], out[3]).to_rgba8();
        }
    }
}

fn blend(func: BlendFunc, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    let coeff = |c: BlendCoeff, ch: usize| match c {
        BlendCoeff::Zero => 0.0,
        BlendCoeff::One => 1.0,
        BlendCoeff::Sc => src[ch],
        BlendCoeff::Isc => 1.0 - src[ch],
        BlendCoeff::Dc => dst[ch],
        BlendCoeff::Idc => 1.0 - dst[ch],
        BlendCoeff::Sa => src[3],
        BlendCoeff::Isa => 1.0 - src[3],
        BlendCoeff::Da => dst[3],
        BlendCoeff::Ida => 1.0 - dst[3],
    };
    let mut out = [0.0; 4];
    for (ch, o) in out.iter_mut().enumerate() {
        *o = src[ch] * coeff(func.src, ch) + dst[ch] * coeff(func.dst, ch);
    }
    out
}

fn decode(config: PixelConfig, px: &[u8]) -> Option<[u8; 4]> {
    match config {
        PixelConfig::Rgba8888 => Some([px[0], px[1], px[2], px[3]]),
        PixelConfig::Bgra8888 => Some([px[2], px[1], px[0], px[3]]),
        PixelConfig::Alpha8 => Some([px[0]; 4]),
        _ => None,
    }
}

impl Device for RecordingDevice {
    fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    fn default_render_target(&self) -> RenderTarget {
        self.default_target
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>, row_bytes: usize) -> Option<Texture> {
        let pow2 = desc.width.is_power_of_two() && desc.height.is_power_of_two();
        let max = if desc.is_render_target() { self.caps.max_render_target_size } else { self.caps.max_texture_size };
        if self.fail_textures
            || (self.fail_render_targets && desc.is_render_target())
            || desc.is_empty()
            || desc.width > max
            || desc.height > max
            || (!self.caps.npot_texture_support && !pow2)
            || (desc.aa_level.sample_count() > 1 && !self.caps.hw_antialias)
            || (desc.config == PixelConfig::Index8 && !self.caps.index8_support)
        {
            return None;
        }
        let id = TextureId(self.next_id());
        self.surfaces.insert(id, Surface::new(desc.width, desc.height));
        self.descs.insert(id, *desc);
        self.events.push(DeviceEvent::CreateTexture { id, desc: *desc });
        if let Some(data) = data {
            let rect = IRect::from_wh(desc.width as i32, desc.height as i32);
            let config = if desc.config == PixelConfig::Index8 { PixelConfig::Alpha8 } else { desc.config };
            self.upload(id, rect, config, data, row_bytes);
        }
        Some(Texture { id, desc: *desc })
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if self.descs.remove(&id).is_none() {
            self.unknown_frees += 1;
            return;
        }
        self.surfaces.remove(&id);
        self.attachments.remove(&id);
        self.events.push(DeviceEvent::DestroyTexture(id));
    }

    fn create_stencil_buffer(&mut self, width: u32, height: u32, sample_count: u32) -> Option<StencilBuffer> {
        if self.fail_stencils || width == 0 || height == 0 {
            return None;
        }
        let id = StencilId(self.next_id());
        let sb = StencilBuffer { id, width, height, sample_count };
        self.stencils.insert(id, sb);
        self.events.push(DeviceEvent::CreateStencil { id, width, height });
        Some(sb)
    }

    fn destroy_stencil_buffer(&mut self, id: StencilId) {
        if self.stencils.remove(&id).is_none() {
            self.unknown_frees += 1;
            return;
        }
        self.attachments.retain(|_, s| *s != id);
        self.events.push(DeviceEvent::DestroyStencil(id));
    }

    fn attach_stencil_buffer(&mut self, target: TextureId, stencil: Option<StencilId>) -> bool {
        let is_target = target == DEFAULT_TARGET
            || self.descs.get(&target).is_some_and(|d| d.flags.contains(TextureFlags::RENDER_TARGET));
        if !is_target {
            return false;
        }
        match stencil {
            Some(sid) if !self.stencils.contains_key(&sid) => return false,
            Some(sid) => {
                self.attachments.insert(target, sid);
            }
            None => {
                self.attachments.remove(&target);
            }
        }
        self.events.push(DeviceEvent::AttachStencil { target, stencil });
        true
    }

    fn bind_render_target(&mut self, target: &RenderTarget) {
        self.events.push(DeviceEvent::BindRenderTarget(target.texture));
    }

    fn clear(&mut self, target: &RenderTarget, rect: Option<IRect>, color: Color) {
        self.events.push(DeviceEvent::Clear { target: target.texture, rect, color });
        let Some(surface) = self.surfaces.get_mut(&target.texture) else {
            return;
        };
        let full = surface.bounds();
        let Some(area) = rect.map_or(Some(full), |r| r.intersect(full)) else {
            return;
        };
        let px = color.to_rgba8();
        for y in area.top..area.bottom {
            for x in area.left..area.right {
                let i = surface.index(x, y);
                surface.pixels[i] = px;
            }
        }
    }

    fn draw(&mut self, draw: &DeviceDraw<'_>) {
        self.events.push(DeviceEvent::Draw(DrawRecord::new(draw)));
        self.rasterize(draw);
    }

    fn read_pixels(&mut self, texture: TextureId, rect: IRect, config: PixelConfig, dst: &mut [u8]) -> bool {
        let Some(surface) = self.surfaces.get(&texture) else {
            return false;
        };
        let bpp = config.bytes_per_pixel();
        if !config.is_readable()
            || !surface.bounds().contains_rect(rect)
            || dst.len() < rect.width() as usize * rect.height() as usize * bpp
        {
            return false;
        }
        self.events.push(DeviceEvent::ReadPixels { texture, rect });
        let mut out = 0;
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                let [r, g, b, a] = surface.pixels[surface.index(x, y)];
                let px = if config == PixelConfig::Bgra8888 { [b, g, r, a] } else { [r, g, b, a] };
                dst[out..out + 4].copy_from_slice(&px);
                out += 4;
            }
        }
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
        if !self.surfaces.contains_key(&texture) {
            return false;
        }
        self.events.push(DeviceEvent::WritePixels { texture, rect });
        self.upload(texture, rect, config, src, row_bytes)
    }

    fn submit(&mut self) {
        self.events.push(DeviceEvent::Submit);
    }

    fn reset_state(&mut self) {
        self.events.push(DeviceEvent::ResetState);
    }

    fn abandon_resources(&mut self) {
        self.descs.clear();
        self.stencils.clear();
        self.attachments.clear();
        self.surfaces.retain(|id, _| *id == DEFAULT_TARGET);
        self.events.push(DeviceEvent::Abandon);
    }

    fn release_resources(&mut self) {
        self.events.push(DeviceEvent::Release);
    }
}

impl RecordingDevice {
    fn upload(&mut self, texture: TextureId, rect: IRect, config: PixelConfig, src: &[u8], row_bytes: usize) -> bool {
        let Some(surface) = self.surfaces.get_mut(&texture) else {
            return false;
        };
        if !surface.bounds().contains_rect(rect) {
            return false;
        }
        let bpp = config.bytes_per_pixel();
        let stride = row_stride(row_bytes, rect.width() as u32, config);
        let needed = stride * (rect.height() as usize - 1) + rect.width() as usize * bpp;
        if src.len() < needed {
            return false;
        }
        for (row, y) in (rect.top..rect.bottom).enumerate() {
            for (col, x) in (rect.left..rect.right).enumerate() {
                let at = row * stride + col * bpp;
                let Some(px) = decode(config, &src[at..at + bpp]) else {
                    return false;
                };
                let i = surface.index(x, y);
                surface.pixels[i] = px;
            }
        }
        true
    }
}
