use super::*;
use crate::cache::ScratchTexMatch;
use crate::coords::{IRect, Matrix, Rect, Vec2};
use crate::device::recording::{DeviceEvent, DrawRecord, RecordingDevice, DEFAULT_TARGET};
use crate::device::{DeviceCaps, PixelConfig, Texture, TextureDesc, TextureFlags};
use crate::draw::{CoordSource, PrimitiveType, StencilSettings, COVERAGE_STAGE};
use crate::paint::{BlendFunc, Color, Filter, Paint, SamplerState, WrapMode};
use crate::path::{Path, PathFill};
use crate::text::GlyphQuad;

fn context(w: u32, h: u32) -> Context<RecordingDevice> {
    Context::new(RecordingDevice::new(w, h), ContextConfig::default())
}

fn context_with_caps(w: u32, h: u32, caps: DeviceCaps) -> Context<RecordingDevice> {
    Context::new(RecordingDevice::with_caps(w, h, caps), ContextConfig::default())
}

fn image(ctx: &mut Context<RecordingDevice>, w: u32, h: u32) -> Texture {
    ctx.create_uncached_texture(&TextureDesc::new(w, h, PixelConfig::Rgba8888), None, 0).unwrap()
}

fn draws(ctx: &Context<RecordingDevice>) -> Vec<DrawRecord> {
    ctx.device().draws().cloned().collect()
}

fn aa_paint() -> Paint {
    Paint::solid(Color::BLACK).with_anti_alias(true)
}

fn l_shape() -> Path {
    Path::polygon(&[
        Vec2::new(0.0, 0.0),
        Vec2::new(40.0, 0.0),
        Vec2::new(40.0, 10.0),
        Vec2::new(10.0, 10.0),
        Vec2::new(10.0, 40.0),
        Vec2::new(0.0, 40.0),
    ])
}

// ---- dispatch ----

#[test]
fn category_switch_flushes_buffered_draws_first() {
    let mut ctx = context(64, 64);
    let tex = image(&mut ctx, 16, 16);
    let textured = Paint::default().with_texture(0, tex, SamplerState::clamp_no_filter());
    ctx.device_mut().take_events();

    ctx.draw_rect_to_rect(&textured, Rect::new(0.0, 0.0, 8.0, 8.0), Rect::new(0.0, 0.0, 16.0, 16.0), None, None);
    ctx.draw_rect_to_rect(&textured, Rect::new(8.0, 0.0, 8.0, 8.0), Rect::new(0.0, 0.0, 16.0, 16.0), None, None);
    assert_eq!(ctx.device().draws().count(), 0);

    ctx.draw_rect(&Paint::solid(Color::BLACK), Rect::new(0.0, 0.0, 4.0, 4.0), -1.0, None);
    let d = draws(&ctx);
    assert_eq!(d.len(), 2);
    assert_eq!(d[0].primitive, PrimitiveType::Triangles);
    assert_eq!((d[0].vertex_count, d[0].index_count), (8, 12));
    assert_eq!(d[0].stages[0], Some(tex.id));
    assert_eq!(d[1].primitive, PrimitiveType::TriangleFan);
    assert_eq!(ctx.stats().draw_buffer_flushes, 1);
}

#[test]
fn discard_drops_buffered_work_and_none_submits_it() {
    let mut ctx = context(64, 64);
    let tex = image(&mut ctx, 16, 16);
    let textured = Paint::default().with_texture(0, tex, SamplerState::clamp_no_filter());
    let quad = Rect::new(0.0, 0.0, 8.0, 8.0);
    ctx.device_mut().take_events();

    ctx.draw_rect_to_rect(&textured, quad, quad, None, None);
    ctx.flush(FlushFlags::DISCARD);
    assert!(ctx.device().events().is_empty());

    ctx.draw_rect_to_rect(&textured, quad, quad, None, None);
    ctx.flush(FlushFlags::NONE);
    let events = ctx.device().events();
    assert!(matches!(events[0], DeviceEvent::Draw(_)));
    assert_eq!(events.last(), Some(&DeviceEvent::Submit));
}

#[test]
fn force_flush_binds_current_target() {
    let mut ctx = context(16, 16);
    ctx.device_mut().take_events();
    ctx.flush(FlushFlags::FORCE_CURRENT_RENDER_TARGET);
    assert_eq!(ctx.device().events(), &[DeviceEvent::BindRenderTarget(DEFAULT_TARGET), DeviceEvent::Submit]);
}

#[test]
fn glyphs_batch_until_text_is_flushed() {
    let mut ctx = context(64, 64);
    let atlas = ctx.create_uncached_texture(&TextureDesc::new(32, 32, PixelConfig::Alpha8), None, 0).unwrap();
    let glyph = |x: f32| GlyphQuad { dst: Rect::new(x, 0.0, 8.0, 8.0), uv: Rect::new(0.0, 0.0, 0.25, 0.25) };
    let paint = Paint::solid(Color::BLACK);

    ctx.draw_glyphs(&paint, &atlas, &[glyph(0.0), glyph(8.0)]);
    ctx.draw_glyphs(&paint, &atlas, &[glyph(16.0)]);
    assert_eq!(ctx.device().draws().count(), 0);

    ctx.flush_text();
    let d = draws(&ctx);
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].index_count, 18);
    assert_eq!(d[0].stages[COVERAGE_STAGE], Some(atlas.id));

    // Text was not the last category: nothing to do.
    ctx.draw_rect(&paint, Rect::new(0.0, 0.0, 4.0, 4.0), -1.0, None);
    let before = ctx.device().events().len();
    ctx.flush_text();
    assert_eq!(ctx.device().events().len(), before);
}

#[test]
fn clear_flushes_pending_draws_before_clearing() {
    let mut ctx = context(32, 32);
    let tex = image(&mut ctx, 16, 16);
    let textured = Paint::default().with_texture(0, tex, SamplerState::clamp_no_filter());
    let quad = Rect::new(0.0, 0.0, 8.0, 8.0);
    ctx.device_mut().take_events();

    ctx.draw_rect_to_rect(&textured, quad, quad, None, None);
    ctx.clear(None, Color::WHITE);
    let events = ctx.device().events();
    assert!(matches!(events[0], DeviceEvent::Draw(_)));
    assert!(matches!(events[1], DeviceEvent::Clear { target: DEFAULT_TARGET, rect: None, .. }));
}

#[test]
fn buffered_draw_keeps_its_cached_texture_until_flushed() {
    let mut ctx = context(32, 32);
    ctx.set_texture_cache_limits(1, usize::MAX);
    let desc = TextureDesc::new(8, 8, PixelConfig::Rgba8888);
    let a = ctx.create_and_lock_texture(1, None, &desc, None, 0);
    let a_tex = ctx.texture(&a).unwrap();
    let textured = Paint::default().with_texture(0, a_tex, SamplerState::clamp_no_filter());
    let quad = Rect::new(0.0, 0.0, 8.0, 8.0);

    ctx.draw_rect_to_rect(&textured, quad, quad, None, None);
    ctx.unlock_texture(a);
    let b = ctx.create_and_lock_texture(2, None, &desc, None, 0);
    assert!(ctx.texture(&a).is_some());

    ctx.flush(FlushFlags::NONE);
    let events = ctx.device().events();
    let draw_at = events.iter().position(|e| matches!(e, DeviceEvent::Draw(d) if d.stages[0] == Some(a_tex.id)));
    let destroy_at = events.iter().position(|e| *e == DeviceEvent::DestroyTexture(a_tex.id));
    assert!(draw_at.unwrap() < destroy_at.unwrap());
    assert!(ctx.texture(&a).is_none());
    assert!(ctx.texture(&b).is_some());
}

#[test]
fn deferred_glyphs_keep_their_cached_atlas_until_flushed() {
    let mut ctx = context(64, 64);
    ctx.set_texture_cache_limits(1, usize::MAX);
    let desc = TextureDesc::new(32, 32, PixelConfig::Alpha8);
    let atlas = ctx.create_and_lock_texture(1, None, &desc, None, 0);
    let atlas_tex = ctx.texture(&atlas).unwrap();
    let glyph = GlyphQuad { dst: Rect::new(0.0, 0.0, 8.0, 8.0), uv: Rect::new(0.0, 0.0, 0.25, 0.25) };

    ctx.draw_glyphs(&Paint::solid(Color::BLACK), &atlas_tex, &[glyph]);
    ctx.unlock_texture(atlas);
    ctx.create_and_lock_texture(2, None, &desc, None, 0);
    assert_eq!(ctx.device().live_textures(), 2);

    ctx.flush_text();
    let events = ctx.device().events();
    let draw_at = events
        .iter()
        .position(|e| matches!(e, DeviceEvent::Draw(d) if d.stages[COVERAGE_STAGE] == Some(atlas_tex.id)));
    let destroy_at = events.iter().position(|e| *e == DeviceEvent::DestroyTexture(atlas_tex.id));
    assert!(draw_at.unwrap() < destroy_at.unwrap());
    assert_eq!(ctx.device().live_textures(), 1);
}

#[test]
fn discarded_work_releases_its_textures() {
    let mut ctx = context(32, 32);
    ctx.set_texture_cache_limits(1, usize::MAX);
    let desc = TextureDesc::new(8, 8, PixelConfig::Rgba8888);
    let a = ctx.create_and_lock_texture(1, None, &desc, None, 0);
    let textured = Paint::default().with_texture(0, ctx.texture(&a).unwrap(), SamplerState::clamp_no_filter());
    let quad = Rect::new(0.0, 0.0, 8.0, 8.0);

    ctx.draw_rect_to_rect(&textured, quad, quad, None, None);
    ctx.unlock_texture(a);
    ctx.create_and_lock_texture(2, None, &desc, None, 0);
    ctx.flush(FlushFlags::DISCARD);
    assert!(ctx.texture(&a).is_none());
    assert_eq!(ctx.device().draws().count(), 0);
    assert_eq!(ctx.cache_stats().locked, 1);
}

#[test]
fn pool_overflow_flushes_mid_stream_in_order() {
    let config = ContextConfig { vertex_pool_size: 8, index_pool_size: 12, ..ContextConfig::default() };
    let mut ctx = Context::new(RecordingDevice::new(64, 64), config);
    let tex = image(&mut ctx, 16, 16);
    let textured = Paint::default().with_texture(0, tex, SamplerState::clamp_no_filter());
    let src = Rect::new(0.0, 0.0, 16.0, 16.0);
    ctx.device_mut().take_events();

    for x in [0.0, 8.0, 16.0] {
        ctx.draw_rect_to_rect(&textured, Rect::new(x, 0.0, 8.0, 8.0), src, None, None);
    }
    assert_eq!(draws(&ctx).iter().map(|d| d.vertex_count).collect::<Vec<_>>(), [8]);

    ctx.flush(FlushFlags::NONE);
    let d = draws(&ctx);
    assert_eq!(d.iter().map(|d| d.vertex_count).collect::<Vec<_>>(), [8, 4]);
    assert_eq!(d[1].bounds, Some(Rect::new(16.0, 0.0, 8.0, 8.0)));
    assert_eq!(ctx.stats().draw_buffer_flushes, 2);
}

#[test]
fn quad_larger_than_the_pool_is_drawn_directly() {
    let config = ContextConfig { vertex_pool_size: 2, ..ContextConfig::default() };
    let mut ctx = Context::new(RecordingDevice::new(64, 64), config);
    let tex = image(&mut ctx, 16, 16);
    let textured = Paint::default().with_texture(0, tex, SamplerState::clamp_no_filter());
    let quad = Rect::new(0.0, 0.0, 8.0, 8.0);
    ctx.device_mut().take_events();

    ctx.draw_rect_to_rect(&textured, quad, quad, None, None);
    let d = draws(&ctx);
    assert_eq!(d.len(), 1);
    assert_eq!((d[0].vertex_count, d[0].index_count), (4, 6));
    assert_eq!(ctx.stats().draw_buffer_flushes, 0);
}

// ---- vertices ----

#[test]
fn draw_vertices_rejects_mismatched_attributes() {
    let mut ctx = context(32, 32);
    let tri = [Vec2::new(0.0, 0.0), Vec2::new(8.0, 0.0), Vec2::new(0.0, 8.0)];
    let paint = Paint::solid(Color::BLACK);
    ctx.device_mut().take_events();

    let two_colors = [Color::WHITE, Color::BLACK];
    ctx.draw_vertices(&paint, PrimitiveType::Triangles, &tri, None, Some(&two_colors), None);
    let four_uvs = [Vec2::new(0.0, 0.0); 4];
    ctx.draw_vertices(&paint, PrimitiveType::Triangles, &tri, Some(&four_uvs), None, None);
    ctx.draw_vertices(&paint, PrimitiveType::Triangles, &tri, None, None, Some(&[0, 1, 3]));
    assert_eq!(ctx.device().draws().count(), 0);

    ctx.draw_vertices(&paint, PrimitiveType::Triangles, &tri, None, None, Some(&[0, 1, 2]));
    let d = draws(&ctx);
    assert_eq!(d.len(), 1);
    assert_eq!((d[0].vertex_count, d[0].index_count), (3, 3));
}

#[test]
fn draw_vertices_with_tex_coords_samples_by_tex_coord() {
    let mut ctx = context(32, 32);
    let tex = image(&mut ctx, 16, 16);
    let textured = Paint::default().with_texture(0, tex, SamplerState::clamp_no_filter());
    let tri = [Vec2::new(0.0, 0.0), Vec2::new(8.0, 0.0), Vec2::new(0.0, 8.0)];
    let uvs = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];

    ctx.draw_vertices(&textured, PrimitiveType::Triangles, &tri, None, None, None);
    assert_eq!(ctx.draw_state.stages[0].map(|s| s.coords), Some(CoordSource::Position));

    ctx.draw_vertices(&textured, PrimitiveType::Triangles, &tri, Some(&uvs), None, None);
    assert_eq!(ctx.draw_state.stages[0].map(|s| s.coords), Some(CoordSource::TexCoord));
    let d = draws(&ctx);
    assert_eq!(d.len(), 2);
    assert_eq!(d[1].stages[0], Some(tex.id));
}

// ---- rects ----

#[test]
fn antialiased_rects_use_coverage_ramps() {
    let mut ctx = context(64, 64);
    ctx.draw_rect(&aa_paint(), Rect::new(1.5, 1.5, 10.0, 10.0), -1.0, None);
    ctx.draw_rect(&aa_paint(), Rect::new(1.5, 1.5, 10.0, 10.0), 2.0, None);
    ctx.draw_rect(&aa_paint(), Rect::new(2.0, 2.0, 10.0, 10.0), -1.0, None);
    let d = draws(&ctx);
    assert_eq!((d[0].vertex_count, d[0].index_count), (8, 30));
    assert_eq!((d[1].vertex_count, d[1].index_count), (16, 72));
    assert!(d[0].view_matrix.is_identity());
    assert_eq!((d[2].primitive, d[2].vertex_count), (PrimitiveType::TriangleFan, 4));
}

#[test]
fn plain_rects_pick_fan_strip_or_line_loop() {
    let mut ctx = context(64, 64);
    let paint = Paint::solid(Color::BLACK);
    let r = Rect::new(4.0, 4.0, 20.0, 20.0);
    ctx.draw_rect(&paint, r, -1.0, None);
    ctx.draw_rect(&paint, r, 4.0, None);
    ctx.draw_rect(&paint, r, 0.0, None);
    ctx.draw_rect(&paint, r, 30.0, None);
    let shapes: Vec<_> = draws(&ctx).iter().map(|d| (d.primitive, d.vertex_count)).collect();
    assert_eq!(
        shapes,
        vec![
            (PrimitiveType::TriangleFan, 4),
            (PrimitiveType::TriangleStrip, 10),
            (PrimitiveType::LineStrip, 5),
            (PrimitiveType::TriangleFan, 4),
        ]
    );
}

#[test]
fn draw_paint_covers_target_and_skips_singular_matrix() {
    let mut ctx = context(8, 8);
    ctx.draw_paint(&Paint::solid(Color::WHITE));
    assert_eq!(ctx.device().pixel(DEFAULT_TARGET, 7, 7), Some([255; 4]));

    ctx.device_mut().take_events();
    ctx.set_matrix(Matrix::scale(0.0, 1.0));
    ctx.draw_paint(&Paint::solid(Color::BLACK));
    assert_eq!(ctx.device().draws().count(), 0);
}

// ---- cache through the context ----

#[test]
fn lowest_budget_evicts_first_unlocked_texture() {
    let mut ctx = context(16, 16);
    ctx.set_texture_cache_limits(2, usize::MAX);
    let desc = TextureDesc::new(8, 8, PixelConfig::Rgba8888);
    let handles: Vec<_> = (0..3)
        .map(|key| {
            let h = ctx.create_and_lock_texture(key, None, &desc, None, 0);
            ctx.unlock_texture(h);
            h
        })
        .collect();
    assert!(ctx.texture(&handles[0]).is_none());
    assert!(ctx.texture(&handles[1]).is_some());
    assert!(ctx.texture(&handles[2]).is_some());
    assert_eq!(ctx.device().live_textures(), 2);
    assert!(ctx.find_and_lock_texture(0, 8, 8, None).is_empty());
}

#[test]
fn locked_scratch_is_never_shared() {
    let mut ctx = context(16, 16);
    let desc = TextureDesc::new(100, 100, PixelConfig::Rgba8888).with_flags(TextureFlags::RENDER_TARGET);
    let a = ctx.lock_scratch_texture(&desc, ScratchTexMatch::Approx);
    let b = ctx.lock_scratch_texture(&desc, ScratchTexMatch::Approx);
    let (ta, tb) = (ctx.texture(&a).unwrap(), ctx.texture(&b).unwrap());
    assert_ne!(ta.id, tb.id);
    assert_eq!((ta.width(), ta.height()), (256, 256));

    ctx.unlock_texture(a);
    let c = ctx.lock_scratch_texture(&desc, ScratchTexMatch::Approx);
    assert_eq!(ctx.texture(&c).map(|t| t.id), Some(ta.id));
}

#[test]
fn limit_change_spares_locked_entries() {
    let mut ctx = context(16, 16);
    let desc = TextureDesc::new(8, 8, PixelConfig::Rgba8888);
    let locked = ctx.create_and_lock_texture(1, None, &desc, None, 0);
    let unlocked = ctx.create_and_lock_texture(2, None, &desc, None, 0);
    ctx.unlock_texture(unlocked);

    ctx.set_texture_cache_limits(0, 0);
    assert!(ctx.texture(&locked).is_some());
    assert!(ctx.texture(&unlocked).is_none());
    assert_eq!(ctx.texture_cache_limits(), (0, 0));
}

#[test]
fn tiled_npot_image_is_stretched_on_the_gpu() {
    let caps = DeviceCaps { npot_texture_tile_support: false, ..DeviceCaps::default() };
    let mut ctx = context_with_caps(16, 16, caps);
    let repeat = SamplerState::new(WrapMode::Repeat, WrapMode::Repeat, Filter::Nearest);
    let desc = TextureDesc::new(3, 5, PixelConfig::Rgba8888);

    let h = ctx.create_and_lock_texture(7, Some(&repeat), &desc, None, 0);
    let stretched = ctx.texture(&h).unwrap();
    assert_eq!((stretched.width(), stretched.height()), (4, 8));

    let clamp = ctx.find_and_lock_texture(7, 3, 5, None);
    let clamp_tex = ctx.texture(&clamp).unwrap();
    let copy = draws(&ctx).into_iter().find(|d| d.target == stretched.id).unwrap();
    assert_eq!(copy.stages[0], Some(clamp_tex.id));
    assert_eq!(copy.blend, BlendFunc::SRC);

    let again = ctx.find_and_lock_texture(7, 3, 5, Some(&repeat));
    assert_eq!(ctx.texture(&again).map(|t| t.id), Some(stretched.id));
    assert_eq!(ctx.render_target().texture, DEFAULT_TARGET);
}

#[test]
fn stretch_falls_back_to_cpu_without_render_targets() {
    let caps = DeviceCaps { npot_texture_tile_support: false, ..DeviceCaps::default() };
    let mut ctx = context_with_caps(16, 16, caps);
    ctx.device_mut().set_fail_render_targets(true);
    let repeat = SamplerState::new(WrapMode::Repeat, WrapMode::Clamp, Filter::Nearest);
    let desc = TextureDesc::new(3, 5, PixelConfig::Rgba8888);
    let data: Vec<u8> = (0..5u8).flat_map(|y| (0..3u8).flat_map(move |x| [x * 10, y * 10, 0, 255])).collect();

    let h = ctx.create_and_lock_texture(1, Some(&repeat), &desc, Some(&data), 0);
    let stretched = ctx.texture(&h).unwrap();
    assert_eq!(ctx.device().draws().count(), 0);
    assert_eq!(ctx.device().pixel(stretched.id, 3, 7), Some([20, 40, 0, 255]));
}

#[test]
fn index8_support_follows_caps() {
    let clamp = SamplerState::clamp_no_filter();
    let repeat = SamplerState::new(WrapMode::Repeat, WrapMode::Repeat, Filter::Nearest);
    assert!(!context(4, 4).supports_index8_pixel_config(None, 16, 16));

    let caps = DeviceCaps { index8_support: true, npot_texture_tile_support: false, ..DeviceCaps::default() };
    let ctx = context_with_caps(4, 4, caps);
    assert!(ctx.supports_index8_pixel_config(Some(&repeat), 16, 16));
    assert!(ctx.supports_index8_pixel_config(Some(&clamp), 10, 16));
    assert!(!ctx.supports_index8_pixel_config(Some(&repeat), 10, 16));
}

// ---- offscreen AA ----

#[test]
fn offscreen_aa_tiles_reuse_one_scratch_surface() {
    let mut ctx = context(1024, 1024);
    ctx.device_mut().take_events();
    let path = Path::rect(Rect::new(0.0, 0.0, 600.0, 100.0));
    ctx.draw_path(&aa_paint(), &path, PathFill::Winding, None);

    assert_eq!(ctx.stats().offscreen_aa_tiles, 3);
    let creates = ctx.device().events().iter().filter(|e| matches!(e, DeviceEvent::CreateTexture { .. })).count();
    assert_eq!(creates, 1);
    assert_eq!(ctx.cache_stats().locked, 0);

    let d = draws(&ctx);
    assert_eq!(d.len(), 6);
    let scratch = d[0].target;
    assert_ne!(scratch, DEFAULT_TARGET);
    for pair in d.chunks(2) {
        assert_eq!(pair[0].target, scratch);
        assert_eq!(pair[1].target, DEFAULT_TARGET);
        assert_eq!(pair[1].stages[COVERAGE_STAGE], Some(scratch));
    }
    assert_eq!(d[1].bounds, Some(Rect::new(0.0, 0.0, 256.0, 100.0)));
    assert_eq!(d[5].bounds, Some(Rect::new(512.0, 0.0, 88.0, 100.0)));
}

#[test]
fn two_pass_downsample_reduces_into_second_scratch() {
    let caps = DeviceCaps { shader_support: false, ..DeviceCaps::default() };
    let mut ctx = context_with_caps(64, 64, caps);
    assert_eq!(ctx.downsample_mode(), DownsampleMode::FourByFourTwoPass);
    ctx.draw_path(&aa_paint(), &Path::rect(Rect::new(2.5, 2.5, 20.0, 20.0)), PathFill::Winding, None);

    let d = draws(&ctx);
    assert_eq!(d.len(), 3);
    assert_ne!(d[0].target, d[1].target);
    assert_eq!(d[1].stages[0], Some(d[0].target));
    assert_eq!(d[2].target, DEFAULT_TARGET);
    assert_eq!(d[2].stages[COVERAGE_STAGE], Some(d[1].target));
    assert_eq!(ctx.cache_stats().locked, 0);
}

#[test]
fn concave_offscreen_path_keeps_stencil_with_its_scratch() {
    let mut ctx = context(64, 64);
    ctx.draw_path(&aa_paint(), &l_shape(), PathFill::Winding, None);

    let d = draws(&ctx);
    let scratch = d[0].target;
    assert_eq!(d[0].stencil, StencilSettings::WINDING_PASS);
    assert!(!d[0].color_writes);
    assert_eq!(d.last().map(|r| r.target), Some(DEFAULT_TARGET));
    assert!(ctx.device().attached_stencil(scratch).is_some());
    assert_eq!(ctx.stats().stencil_creates, 1);

    ctx.set_texture_cache_limits(0, 0);
    assert_eq!(ctx.device().live_stencils(), 0);
    assert_eq!(ctx.device().live_textures(), 0);
}

#[test]
fn failed_scratch_falls_back_to_direct_draws_per_tile() {
    let mut ctx = context(1024, 1024);
    ctx.device_mut().set_fail_render_targets(true);
    ctx.draw_path(&aa_paint(), &Path::rect(Rect::new(0.0, 0.0, 600.0, 100.0)), PathFill::Winding, None);

    let s = ctx.stats();
    assert_eq!((s.offscreen_aa_tiles, s.offscreen_fallback_tiles), (0, 3));
    let clips: Vec<_> = draws(&ctx).iter().map(|d| (d.target, d.clip)).collect();
    assert_eq!(
        clips,
        vec![
            (DEFAULT_TARGET, Some(IRect::from_xywh(0, 0, 256, 100))),
            (DEFAULT_TARGET, Some(IRect::from_xywh(256, 0, 256, 100))),
            (DEFAULT_TARGET, Some(IRect::from_xywh(512, 0, 88, 100))),
        ]
    );
}

#[test]
fn non_aa_and_inverse_paths_draw_directly() {
    let mut ctx = context(64, 64);
    ctx.draw_path(&Paint::solid(Color::BLACK), &l_shape(), PathFill::EvenOdd, None);
    ctx.draw_path(&aa_paint(), &l_shape(), PathFill::InverseWinding, None);
    assert!(draws(&ctx).iter().all(|d| d.target == DEFAULT_TARGET));
    assert_eq!(ctx.stats().offscreen_aa_tiles, 0);
}

#[test]
fn clipped_out_path_draws_nothing() {
    let mut ctx = context(64, 64);
    ctx.set_clip(Clip::Rect(IRect::from_xywh(50, 50, 10, 10)));
    ctx.draw_path(&aa_paint(), &Path::rect(Rect::new(0.0, 0.0, 20.0, 20.0)), PathFill::Winding, None);
    assert_eq!(ctx.device().draws().count(), 0);
}

// ---- pixels ----

#[test]
fn readback_validates_before_flushing() {
    let mut ctx = context(8, 8);
    ctx.clear(None, Color::BLACK);
    ctx.device_mut().take_events();

    let mut small = [0u8; 15];
    assert!(!ctx.read_render_target_pixels(None, IRect::from_wh(2, 2), PixelConfig::Rgba8888, &mut small));
    assert!(ctx.device().events().is_empty());

    let mut px = [0u8; 16];
    assert!(ctx.read_render_target_pixels(None, IRect::from_wh(2, 2), PixelConfig::Bgra8888, &mut px));
    assert_eq!(&px[..4], &[0, 0, 0, 255]);
    let events = ctx.device().events();
    assert_eq!(events[0], DeviceEvent::BindRenderTarget(DEFAULT_TARGET));
    assert!(matches!(events.last(), Some(DeviceEvent::ReadPixels { .. })));
}

#[test]
fn texture_readback_rejects_out_of_bounds() {
    let mut ctx = context(8, 8);
    let tex = image(&mut ctx, 4, 4);
    let mut px = [0u8; 64];
    assert!(ctx.read_texture_pixels(&tex, IRect::from_wh(4, 4), PixelConfig::Rgba8888, &mut px));
    assert!(!ctx.read_texture_pixels(&tex, IRect::from_xywh(1, 1, 4, 4), PixelConfig::Rgba8888, &mut px));
}

#[test]
fn write_pixels_draws_an_unclipped_copy() {
    let mut ctx = context(16, 16);
    ctx.set_clip(Clip::Rect(IRect::from_wh(2, 2)));
    let data = [255u8, 0, 0, 255].repeat(4);
    assert!(ctx.write_pixels(IRect::from_xywh(4, 4, 2, 2), PixelConfig::Rgba8888, &data, 0));

    let upload = ctx.device().events().iter().find_map(|e| match e {
        DeviceEvent::WritePixels { texture, .. } => Some(*texture),
        _ => None,
    });
    let d = draws(&ctx);
    let copy = d.last().unwrap();
    assert_eq!(copy.target, DEFAULT_TARGET);
    assert_eq!(copy.stages[0], upload);
    assert_eq!(copy.clip, None);
    assert_eq!(copy.blend, BlendFunc::SRC);
    assert_eq!(copy.bounds, Some(Rect::new(4.0, 4.0, 2.0, 2.0)));
    assert_eq!(ctx.cache_stats().locked, 0);

    assert!(!ctx.write_pixels(IRect::from_wh(2, 2), PixelConfig::Alpha8, &data, 0));
}

// ---- convolution ----

#[test]
fn convolution_steps_one_texel_per_axis() {
    let mut ctx = context(32, 32);
    let tex = image(&mut ctx, 16, 8);
    assert!(ctx.convolve_in_x(&tex, Rect::new(0.0, 0.0, 16.0, 8.0), &[0.25, 0.5, 0.25]));
    assert!(ctx.convolve_in_y(&tex, Rect::new(0.0, 0.0, 16.0, 8.0), &[0.25, 0.5, 0.25]));
    assert!(!ctx.convolve_in_x(&tex, Rect::new(0.0, 0.0, 16.0, 8.0), &[0.04; 26]));
    let d = draws(&ctx);
    assert_eq!(d.len(), 2);
    assert!(d.iter().all(|r| r.stages[0] == Some(tex.id) && r.view_matrix.is_identity()));
}

// ---- guards and lifecycle ----

#[test]
fn guards_restore_matrix_target_and_clip() {
    let mut ctx = context(32, 32);
    ctx.set_clip(Clip::Rect(IRect::from_wh(4, 4)));
    let rt_desc = TextureDesc::new(8, 8, PixelConfig::Rgba8888).with_flags(TextureFlags::RENDER_TARGET);
    let target = ctx.create_uncached_texture(&rt_desc, None, 0).unwrap().as_render_target();
    {
        let mut on_target = AutoRenderTarget::new(&mut ctx, target);
        assert_eq!(on_target.clip(), Clip::WideOpen);
        let scaled = AutoMatrix::new(&mut *on_target, Matrix::scale(2.0, 2.0));
        assert_eq!(scaled.matrix(), Matrix::scale(2.0, 2.0));
    }
    assert_eq!(ctx.render_target().texture, DEFAULT_TARGET);
    assert_eq!(ctx.clip(), Clip::Rect(IRect::from_wh(4, 4)));
    assert!(ctx.matrix().is_identity());
}

#[test]
fn scratch_guard_unlocks_on_drop_unless_detached() {
    let mut ctx = context(16, 16);
    let desc = TextureDesc::new(16, 16, PixelConfig::Rgba8888);
    {
        let guard = AutoScratchTexture::new(&mut ctx, &desc, ScratchTexMatch::Exact);
        assert!(guard.texture().is_some());
        assert_eq!(guard.cache_stats().locked, 1);
    }
    assert_eq!(ctx.cache_stats().locked, 0);

    let kept = AutoScratchTexture::new(&mut ctx, &desc, ScratchTexMatch::Exact).detach();
    assert_eq!(ctx.cache_stats().locked, 1);
    ctx.unlock_texture(kept);
    assert_eq!(ctx.cache_stats().locked, 0);
}

#[test]
fn context_loss_invalidates_handles_without_freeing() {
    let mut ctx = context(16, 16);
    let desc = TextureDesc::new(8, 8, PixelConfig::Rgba8888);
    let cached = ctx.create_and_lock_texture(1, None, &desc, None, 0);
    let idle = ctx.create_and_lock_texture(2, None, &desc, None, 0);
    ctx.unlock_texture(idle);
    let uncached = image(&mut ctx, 4, 4);
    ctx.set_matrix(Matrix::translate(3.0, 3.0));
    ctx.device_mut().take_events();

    ctx.context_lost();
    assert!(ctx.texture(&cached).is_none());
    assert!(ctx.texture(&idle).is_none());
    assert!(ctx.matrix().is_identity());
    ctx.unlock_texture(cached);
    ctx.destroy_uncached_texture(&uncached);
    ctx.free_gpu_resources();
    assert!(!ctx.device().events().iter().any(|e| matches!(e, DeviceEvent::DestroyTexture(_))));
    assert_eq!(ctx.device().unknown_frees(), 0);
}

#[test]
fn destroyed_context_keeps_its_state() {
    let mut ctx = context(16, 16);
    ctx.set_matrix(Matrix::translate(3.0, 3.0));
    ctx.context_destroyed();
    assert_eq!(ctx.matrix(), Matrix::translate(3.0, 3.0));
    assert_eq!(ctx.cache_stats().entries, 0);
}

#[test]
fn free_gpu_resources_keeps_locked_entries() {
    let mut ctx = context(16, 16);
    let desc = TextureDesc::new(8, 8, PixelConfig::Rgba8888);
    let locked = ctx.create_and_lock_texture(1, None, &desc, None, 0);
    let idle = ctx.create_and_lock_texture(2, None, &desc, None, 0);
    ctx.unlock_texture(idle);

    ctx.free_gpu_resources();
    assert!(ctx.texture(&locked).is_some());
    assert!(ctx.texture(&idle).is_none());
    assert_eq!(ctx.device().events().last(), Some(&DeviceEvent::Release));
}
