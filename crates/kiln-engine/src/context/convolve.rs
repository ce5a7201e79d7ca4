use crate::coords::{Matrix, Rect};
use crate::device::{Device, Texture};
use crate::draw::{rect_vertices, PrimitiveType};
use crate::paint::{BlendFunc, Color, ConvolutionKernel, Filter, Paint, SamplerState, WrapMode};

use super::{Context, DrawCategory};

impl<D: Device> Context<D> {
    /// Convolves `texture` horizontally with `kernel` into `rect` of the
    /// current render target. Returns false for kernels wider than 25 taps
    /// or devices without programmable sampling.
    pub fn convolve_in_x(&mut self, texture: &Texture, rect: Rect, kernel: &[f32]) -> bool {
        let step = 1.0 / texture.width().max(1) as f32;
        self.convolve(texture, rect, kernel, [step, 0.0])
    }

    /// Vertical counterpart of [`convolve_in_x`](Self::convolve_in_x).
    pub fn convolve_in_y(&mut self, texture: &Texture, rect: Rect, kernel: &[f32]) -> bool {
        let step = 1.0 / texture.height().max(1) as f32;
        self.convolve(texture, rect, kernel, [0.0, step])
    }

    fn convolve(&mut self, texture: &Texture, rect: Rect, kernel: &[f32], increment: [f32; 2]) -> bool {
        let Some(kernel) = ConvolutionKernel::new(kernel, increment) else {
            log::warn!("convolution skipped: kernel of {} taps", kernel.len());
            return false;
        };
        if !self.device.caps().shader_support {
            log::warn!("convolution skipped: device has no shader support");
            return false;
        }
        let sampler = SamplerState::new(WrapMode::Clamp, WrapMode::Clamp, Filter::Convolution(kernel))
            .with_matrix(Matrix::idiv(texture.width(), texture.height()));
        let paint = Paint::default().with_blend(BlendFunc::SRC).with_texture(0, *texture, sampler);
        self.prepare_to_draw(&paint, DrawCategory::Unbuffered);
        self.draw_state.view_matrix = Matrix::IDENTITY;
        let verts = rect_vertices(rect, Color::WHITE);
        self.with_target(DrawCategory::Unbuffered, |t| t.draw(PrimitiveType::TriangleFan, &verts, None));
        true
    }
}
