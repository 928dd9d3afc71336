use crate::config::Quality;
use crate::texture::Texture;
use crate::visual::RenderCtx;
use std::f32::consts::PI;

/// Motion constants for the layered zoom. Defaults match the most
/// feature-complete tuning observed in the wild; all of them are safe to
/// vary at runtime as long as `zoom_speed` stays slow relative to
/// `rotation_speed`.
#[derive(Debug, Clone, Copy)]
pub struct MotionTunables {
    /// Zoom cycles per second; one full depth cycle takes `1 / zoom_speed`.
    pub zoom_speed: f32,
    pub layers: u32,
    /// Inner layers scale up by `scale_base ^ ((1 - progress) * scale_exponent)`.
    pub scale_base: f32,
    pub scale_exponent: f32,
    /// Sharpens the sin() depth-opacity curve.
    pub opacity_power: f32,
    pub layer_alpha: f32,
    pub rotation_speed: f32,
    pub layer_rotation_offset: f32,
    pub drift_freq: f32,
    pub drift_amp: f32,
    pub scroll_speed: f32,
    pub texture_scale: f32,
    /// World radius as a fraction of the surface diagonal.
    pub radius_factor: f32,
    pub vignette_reach: f32,
}

impl Default for MotionTunables {
    fn default() -> Self {
        Self {
            zoom_speed: 0.025,
            layers: 8,
            scale_base: 4.0,
            scale_exponent: 3.0,
            opacity_power: 2.0,
            layer_alpha: 0.7,
            rotation_speed: 0.005,
            layer_rotation_offset: 0.1,
            drift_freq: 0.03,
            drift_amp: 100.0,
            scroll_speed: 20.0,
            texture_scale: 0.6,
            radius_factor: 0.8,
            vignette_reach: 1.5,
        }
    }
}

impl MotionTunables {
    pub fn clamped(mut self) -> Self {
        self.layers = self.layers.clamp(5, 12);
        self.zoom_speed = self.zoom_speed.clamp(0.001, 0.2);
        self.texture_scale = self.texture_scale.max(0.05);
        self
    }
}

/// Global zoom phase in [0, 1); wraps seamlessly.
pub fn zoom_phase(t: f32, zoom_speed: f32) -> f32 {
    (t * zoom_speed).fract()
}

/// Depth position of layer `l` for the current phase. Ranges just below 0 up
/// to just below 1; layers cycle through depth as the phase advances.
pub fn layer_progress(l: u32, z: f32, layers: u32) -> f32 {
    (l as f32 - z) / layers.max(1) as f32
}

/// Zero at both ends of the depth cycle, peaking mid-cycle. This is what
/// makes the infinite zoom loop seamless: layers fade in and out instead of
/// popping.
pub fn layer_opacity(progress: f32, power: f32) -> f32 {
    (progress * PI).sin().max(0.0).powf(power)
}

pub fn layer_scale(progress: f32, base: f32, exponent: f32) -> f32 {
    base.powf((1.0 - progress) * exponent)
}

/// Folds a layer-space point into the canonical wedge. Wedge `i` spans
/// `[i*step - step/2, i*step + step/2]`; odd wedges are mirrored across
/// their bisector, which is what produces reflective (kaleidoscopic)
/// symmetry instead of plain rotational repetition.
pub fn fold_wedge(x: f32, y: f32, segments: u32) -> (f32, f32, bool) {
    let s = segments.max(2) as i64;
    let step = 2.0 * PI / s as f32;
    let r = (x * x + y * y).sqrt();
    let a = y.atan2(x);

    let idx = (a / step).round();
    let mut local = a - idx * step;
    let wedge = ((idx as i64 % s) + s) % s;
    let mirrored = wedge % 2 == 1;
    if mirrored {
        local = -local;
    }
    (local.cos() * r, local.sin() * r, mirrored)
}

struct LayerParams {
    cos_nr: f32,
    sin_nr: f32,
    inv_scale: f32,
    /// Squared wedge bound in layer space; fixed in world space.
    bound_sq: f32,
    alpha: f32,
}

pub struct KaleidoscopeRenderer {
    tunables: MotionTunables,
    dither_seed: u32,
}

impl KaleidoscopeRenderer {
    pub fn new(tunables: MotionTunables) -> Self {
        Self {
            tunables: tunables.clamped(),
            dither_seed: fastrand::u32(..),
        }
    }

    pub fn tunables(&self) -> &MotionTunables {
        &self.tunables
    }

    /// Renders one frame into `out` (RGBA8, `w * h * 4`). With no texture
    /// the frame is a cleared no-op; the loop itself never stops for
    /// readiness.
    pub fn render(&self, ctx: &RenderCtx<'_>, out: &mut [u8]) {
        let w = ctx.w;
        let h = ctx.h;
        let frame_len = w.saturating_mul(h).saturating_mul(4);
        if w == 0 || h == 0 || out.len() < frame_len {
            return;
        }

        const BASE: [u8; 3] = [4, 3, 8];
        for px in out[..frame_len].chunks_exact_mut(4) {
            px[0] = BASE[0];
            px[1] = BASE[1];
            px[2] = BASE[2];
            px[3] = 255;
        }

        let tn = &self.tunables;
        let cx = w as f32 * 0.5;
        let cy = h as f32 * 0.5;
        let diag = ((w * w + h * h) as f32).sqrt();
        let max_radius = diag * tn.radius_factor;

        let Some(texture) = ctx.texture else {
            self.vignette(out, w, h, cx, cy, max_radius);
            return;
        };
        if texture.width == 0 || texture.height == 0 {
            self.vignette(out, w, h, cx, cy, max_radius);
            return;
        }

        let t = ctx.t;
        let z = zoom_phase(t, tn.zoom_speed);
        let ts = tn.texture_scale;
        let tw = texture.width as f32;
        let th = texture.height as f32;
        let drift_x = (t * tn.drift_freq).sin() * tn.drift_amp;
        let drift_y = (t * tn.scroll_speed) % th;

        let layers = match ctx.quality {
            Quality::Fast => tn.layers.min(6),
            _ => tn.layers,
        };
        let bilinear = ctx.quality != Quality::Fast;

        let mut params = Vec::with_capacity(layers as usize);
        for l in 0..layers {
            let progress = layer_progress(l, z, layers);
            let alpha = layer_opacity(progress, tn.opacity_power) * tn.layer_alpha;
            if alpha < 1.0 / 255.0 {
                continue;
            }
            let scale = layer_scale(progress, tn.scale_base, tn.scale_exponent);
            let rot = t * tn.rotation_speed + l as f32 * tn.layer_rotation_offset;
            let bound = max_radius / scale;
            params.push(LayerParams {
                cos_nr: rot.cos(),
                sin_nr: -rot.sin(),
                inv_scale: 1.0 / scale,
                bound_sq: bound * bound,
                alpha,
            });
        }

        let block = ctx.scale.max(1);
        let segments = ctx.segments;

        for by in (0..h).step_by(block) {
            for bx in (0..w).step_by(block) {
                let px = bx as f32 - cx;
                let py = by as f32 - cy;

                let mut r = BASE[0] as f32;
                let mut g = BASE[1] as f32;
                let mut b = BASE[2] as f32;

                // Painter order: deeper layers first, nearer layers over them.
                for lp in &params {
                    // Undo the layer rotation, then the layer zoom.
                    let lx = (px * lp.cos_nr - py * lp.sin_nr) * lp.inv_scale;
                    let ly = (px * lp.sin_nr + py * lp.cos_nr) * lp.inv_scale;
                    if lx * lx + ly * ly > lp.bound_sq {
                        continue;
                    }

                    let (wx, wy, _) = fold_wedge(lx, ly, segments);

                    let u = wx / ts + tw * 0.5 - drift_x;
                    let v = wy / ts + th * 0.5 - drift_y;
                    let [sr, sg, sb] = sample_wrapped(texture, u, v, bilinear);

                    r += (sr as f32 - r) * lp.alpha;
                    g += (sg as f32 - g) * lp.alpha;
                    b += (sb as f32 - b) * lp.alpha;
                }

                let color = [r as u8, g as u8, b as u8];
                fill_block(out, w, h, bx, by, block, color);
            }
        }

        self.vignette(out, w, h, cx, cy, max_radius);
    }

    /// Transparent center fading to opaque black at the rim; hides tiling
    /// seams at the periphery and pulls the eye to the middle.
    fn vignette(&self, out: &mut [u8], w: usize, h: usize, cx: f32, cy: f32, max_radius: f32) {
        let reach = max_radius * self.tunables.vignette_reach;
        if reach <= 0.0 {
            return;
        }
        let inv_reach = 1.0 / reach;

        for y in 0..h {
            let dy = y as f32 - cy;
            for x in 0..w {
                let dx = x as f32 - cx;
                let d = (dx * dx + dy * dy).sqrt() * inv_reach;
                let a = if d <= 0.7 {
                    d * (0.4 / 0.7)
                } else {
                    0.4 + (d - 0.7) * (0.6 / 0.3)
                }
                .clamp(0.0, 1.0);
                if a <= 0.0 {
                    continue;
                }

                // ±half-LSB dither keeps the dark falloff from banding.
                let n = hash_noise(x as u32, y as u32, self.dither_seed) - 0.5;
                let keep = (1.0 - a).clamp(0.0, 1.0);
                let i = (y * w + x) * 4;
                for c in 0..3 {
                    let v = out[i + c] as f32 * keep + n;
                    out[i + c] = v.clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

fn fill_block(out: &mut [u8], w: usize, h: usize, bx: usize, by: usize, block: usize, c: [u8; 3]) {
    for y in by..(by + block).min(h) {
        for x in bx..(bx + block).min(w) {
            let i = (y * w + x) * 4;
            out[i] = c[0];
            out[i + 1] = c[1];
            out[i + 2] = c[2];
            out[i + 3] = 255;
        }
    }
}

/// Texture sample with wrap-around addressing, so the drifting pattern flows
/// forever instead of running off the bitmap's edge.
fn sample_wrapped(texture: &Texture, u: f32, v: f32, bilinear: bool) -> [u8; 3] {
    let tw = texture.width as usize;
    let th = texture.height as usize;

    if !bilinear {
        let x = wrap_index(u.round() as i64, tw);
        let y = wrap_index(v.round() as i64, th);
        return texel(texture, x, y);
    }

    let fu = u.floor();
    let fv = v.floor();
    let ax = u - fu;
    let ay = v - fv;

    let x0 = wrap_index(fu as i64, tw);
    let y0 = wrap_index(fv as i64, th);
    let x1 = (x0 + 1) % tw;
    let y1 = (y0 + 1) % th;

    let c00 = texel(texture, x0, y0);
    let c10 = texel(texture, x1, y0);
    let c01 = texel(texture, x0, y1);
    let c11 = texel(texture, x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = c00[c] as f32 + (c10[c] as f32 - c00[c] as f32) * ax;
        let bot = c01[c] as f32 + (c11[c] as f32 - c01[c] as f32) * ax;
        out[c] = (top + (bot - top) * ay).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[inline]
fn wrap_index(i: i64, n: usize) -> usize {
    let n = n as i64;
    (((i % n) + n) % n) as usize
}

#[inline]
fn texel(texture: &Texture, x: usize, y: usize) -> [u8; 3] {
    let i = (y * texture.width as usize + x) * 4;
    [texture.rgba[i], texture.rgba[i + 1], texture.rgba[i + 2]]
}

fn hash_noise(x: u32, y: u32, seed: u32) -> f32 {
    let mut n = x
        .wrapping_mul(374_761_393)
        ^ y.wrapping_mul(668_265_263)
        ^ seed.wrapping_mul(0x9E37_79B9);
    n = (n ^ (n >> 13)).wrapping_mul(1_274_126_177);
    n = n ^ (n >> 16);
    ((n & 0x00FF_FFFF) as f32) / 16_777_215.0
}
