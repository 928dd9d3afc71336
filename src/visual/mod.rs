mod kaleidoscope;

use crate::config::Quality;
use crate::texture::Texture;

pub use kaleidoscope::{
    fold_wedge, layer_opacity, layer_progress, layer_scale, zoom_phase, KaleidoscopeRenderer,
    MotionTunables,
};

/// Everything one frame needs. Animation state is derived from `t` alone;
/// nothing here survives between frames.
pub struct RenderCtx<'a> {
    pub t: f32,
    pub dt: f32,
    pub w: usize,
    pub h: usize,
    pub segments: u32,
    pub texture: Option<&'a Texture>,
    pub quality: Quality,
    /// Pixel block size for adaptive downscale (1 = full resolution).
    pub scale: usize,
}
