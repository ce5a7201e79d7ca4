//! Graphics device abstraction.
//!
//! [`Device`] is the narrow interface the context drives: resource
//! allocation, render target binding, draws and pixel transfers. Two
//! implementations ship with the crate:
//! - [`WgpuDevice`]: a headless wgpu device
//! - [`recording::RecordingDevice`]: a CPU device that logs every call

mod backend;
mod caps;
mod desc;
mod gpu;
mod init;
mod pipeline;
pub mod recording;
mod resource;

pub use backend::{row_stride, Device, DeviceDraw};
pub use caps::DeviceCaps;
pub use desc::{AaLevel, PixelConfig, TextureDesc, TextureFlags};
pub use gpu::WgpuDevice;
pub use init::WgpuInit;
pub use resource::{RenderTarget, StencilBuffer, StencilId, Texture, TextureId};
