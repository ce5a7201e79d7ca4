use anyhow::{ensure, Result};

use kiln_engine::context::FlushFlags;
use kiln_engine::coords::{IRect, Matrix, Rect, Vec2};
use kiln_engine::device::recording::RecordingDevice;
use kiln_engine::device::{Device, PixelConfig, WgpuDevice, WgpuInit};
use kiln_engine::logging::{init_logging, LoggingConfig};
use kiln_engine::paint::{Color, Paint};
use kiln_engine::path::{Path, PathFill};
use kiln_engine::{Context, ContextConfig};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let init = WgpuInit { width: WIDTH, height: HEIGHT, ..Default::default() };
    match WgpuDevice::new_blocking(init) {
        Ok(device) => {
            log::info!("rendering on {}", device.adapter_info().name);
            run(Context::new(device, ContextConfig::default()))
        }
        Err(err) => {
            log::warn!("no GPU available ({err:#}); using the recording device");
            run(Context::new(RecordingDevice::new(WIDTH, HEIGHT), ContextConfig::default()))
        }
    }
}

fn run<D: Device>(mut ctx: Context<D>) -> Result<()> {
    draw_scene(&mut ctx);

    let bounds = IRect::from_wh(WIDTH as i32, HEIGHT as i32);
    let mut pixels = vec![0u8; (WIDTH * HEIGHT * 4) as usize];
    ensure!(
        ctx.read_render_target_pixels(None, bounds, PixelConfig::Rgba8888, &mut pixels),
        "readback of the default target failed"
    );

    let covered = pixels.chunks_exact(4).filter(|px| px[3] != 0 && px[..3] != [0xff; 3]).count();
    let checksum = pixels.iter().fold(0u32, |acc, &b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    println!("rendered {WIDTH}x{HEIGHT}: {covered} painted pixels, checksum {checksum:08x}");

    ctx.print_stats();
    ctx.free_gpu_resources();
    Ok(())
}

fn draw_scene<D: Device>(ctx: &mut Context<D>) {
    ctx.clear(None, Color::WHITE);

    // Plain and stroked rects.
    ctx.draw_rect(&Paint::solid(Color::from_rgba_u8(220, 60, 40, 255)), Rect::new(16.0, 16.0, 96.0, 64.0), -1.0, None);
    ctx.draw_rect(&Paint::solid(Color::BLACK), Rect::new(16.0, 16.0, 96.0, 64.0), 0.0, None);

    // Antialiased rect under a rotation.
    let rotate = Matrix { sx: 0.966, kx: -0.259, tx: 180.0, ky: 0.259, sy: 0.966, ty: 20.0 };
    ctx.draw_rect(
        &Paint::solid(Color::from_rgba_u8(40, 120, 220, 255)).with_anti_alias(true),
        Rect::new(0.0, 0.0, 100.0, 50.0),
        4.0,
        Some(&rotate),
    );

    // A concave star, antialiased through the offscreen path.
    let star = star_path(Vec2::new(80.0, 170.0), 56.0, 24.0);
    ctx.draw_path(&Paint::solid(Color::from_rgba_u8(250, 190, 20, 255)).with_anti_alias(true), &star, PathFill::Winding, None);

    // The same star as an even-odd fill and a hairline, shifted right.
    let shift = Some(Vec2::new(140.0, 0.0));
    ctx.draw_path(&Paint::solid(Color::from_rgba_u8(30, 160, 90, 255)), &star, PathFill::EvenOdd, shift);
    ctx.draw_path(&Paint::solid(Color::BLACK), &star, PathFill::Hairline, shift);

    // An 8x8 checker written straight into the target.
    let checker: Vec<u8> = (0..64)
        .flat_map(|i| if (i % 8 + i / 8) % 2 == 0 { [0, 0, 0, 255] } else { [255, 255, 255, 255] })
        .collect();
    if !ctx.write_pixels(IRect::from_xywh(296, 8, 8, 8), PixelConfig::Rgba8888, &checker, 0) {
        log::warn!("write_pixels rejected the checker");
    }

    ctx.flush(FlushFlags::NONE);
}

fn star_path(center: Vec2, outer: f32, inner: f32) -> Path {
    let points: Vec<Vec2> = (0..10)
        .map(|i| {
            let r = if i % 2 == 0 { outer } else { inner };
            let a = std::f32::consts::PI * (i as f32) / 5.0 - std::f32::consts::FRAC_PI_2;
            Vec2::new(center.x + r * a.cos(), center.y + r * a.sin())
        })
        .collect();
    Path::polygon(&points)
}
