use crate::coords::Matrix;

/// Largest convolution kernel a sampler can carry.
pub const MAX_KERNEL_WIDTH: usize = 25;

/// Texture coordinate wrapping.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum WrapMode {
    #[default]
    Clamp,
    Repeat,
    Mirror,
}

/// 1D convolution parameters carried by a sampler.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConvolutionKernel {
    width: usize,
    weights: [f32; MAX_KERNEL_WIDTH],
    /// Step between taps in normalized texture coordinates.
    pub image_increment: [f32; 2],
}

impl ConvolutionKernel {
    /// Returns `None` for an empty kernel or one wider than [`MAX_KERNEL_WIDTH`].
    pub fn new(weights: &[f32], image_increment: [f32; 2]) -> Option<Self> {
        if weights.is_empty() || weights.len() > MAX_KERNEL_WIDTH {
            return None;
        }
        let mut w = [0.0; MAX_KERNEL_WIDTH];
        w[..weights.len()].copy_from_slice(weights);
        Some(Self { width: weights.len(), weights: w, image_increment })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn weights(&self) -> &[f32] {
        &self.weights[..self.width]
    }

    /// Kernel padded to whole `vec4`s for uniform upload.
    pub fn packed(&self) -> [[f32; 4]; 7] {
        let mut out = [[0.0; 4]; 7];
        for (i, w) in self.weights().iter().enumerate() {
            out[i / 4][i % 4] = *w;
        }
        out
    }
}

/// Texture filtering.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub enum Filter {
    #[default]
    Nearest,
    Bilinear,
    /// Box filter over a 4x4 texel footprint (supersample resolve).
    Downsample4x4,
    Convolution(ConvolutionKernel),
}

/// How a texture stage is sampled.
///
/// `matrix` maps the stage's input coordinates (vertex positions or explicit
/// texture coordinates) to normalized texture space.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct SamplerState {
    pub wrap_x: WrapMode,
    pub wrap_y: WrapMode,
    pub filter: Filter,
    pub matrix: Matrix,
}

impl SamplerState {
    #[inline]
    pub fn new(wrap_x: WrapMode, wrap_y: WrapMode, filter: Filter) -> Self {
        Self { wrap_x, wrap_y, filter, matrix: Matrix::IDENTITY }
    }

    /// Clamp in both directions, nearest filtering, identity matrix.
    #[inline]
    pub fn clamp_no_filter() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_matrix(mut self, matrix: Matrix) -> Self {
        self.matrix = matrix;
        self
    }

    /// True when either axis repeats or mirrors.
    #[inline]
    pub fn is_tiled(&self) -> bool {
        self.wrap_x != WrapMode::Clamp || self.wrap_y != WrapMode::Clamp
    }

    #[inline]
    pub fn is_filtered(&self) -> bool {
        !matches!(self.filter, Filter::Nearest)
    }

    /// `matrix = matrix * m`.
    #[inline]
    pub fn pre_concat_matrix(&mut self, m: &Matrix) {
        self.matrix.pre_concat(m);
    }
}
