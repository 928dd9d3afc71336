use kaleido_viewer::config::{Quality, SEGMENT_CHOICES};
use kaleido_viewer::texture::Texture;
use kaleido_viewer::visual::{
    fold_wedge, layer_opacity, layer_progress, layer_scale, zoom_phase, KaleidoscopeRenderer,
    MotionTunables, RenderCtx,
};
use std::f32::consts::PI;

fn solid_texture(w: u32, h: u32, r: u8, g: u8, b: u8) -> Texture {
    let mut rgba = vec![0u8; (w * h * 4) as usize];
    for px in rgba.chunks_exact_mut(4) {
        px[0] = r;
        px[1] = g;
        px[2] = b;
        px[3] = 255;
    }
    Texture::new(w, h, rgba)
}

fn patterned_texture(w: u32, h: u32) -> Texture {
    let mut rgba = vec![0u8; (w * h * 4) as usize];
    for y in 0..h {
        for x in 0..w {
            let i = ((y * w + x) * 4) as usize;
            rgba[i] = ((x * 255) / w.max(1)) as u8;
            rgba[i + 1] = ((y * 255) / h.max(1)) as u8;
            rgba[i + 2] = ((x ^ y) & 0xFF) as u8;
            rgba[i + 3] = 255;
        }
    }
    Texture::new(w, h, rgba)
}

fn ctx<'a>(t: f32, w: usize, h: usize, segments: u32, texture: Option<&'a Texture>) -> RenderCtx<'a> {
    RenderCtx {
        t,
        dt: 1.0 / 60.0,
        w,
        h,
        segments,
        texture,
        quality: Quality::High,
        scale: 1,
    }
}

// ── Wedge fold ──────────────────────────────────────────────────────────────

#[test]
fn fold_maps_every_angle_into_one_wedge() {
    for &segments in &SEGMENT_CHOICES {
        let step = 2.0 * PI / segments as f32;
        for k in 0..720 {
            let a = k as f32 / 720.0 * 2.0 * PI - PI;
            let (x, y) = (a.cos() * 3.0, a.sin() * 3.0);
            let (fx, fy, _) = fold_wedge(x, y, segments);
            let local = fy.atan2(fx);
            assert!(
                local.abs() <= step * 0.5 + 1e-4,
                "segments={segments} angle={a} folded outside the wedge: {local}"
            );
        }
    }
}

#[test]
fn fold_preserves_radius() {
    for &segments in &SEGMENT_CHOICES {
        for k in 0..64 {
            let a = k as f32 * 0.1;
            let r = 1.0 + k as f32 * 0.25;
            let (fx, fy, _) = fold_wedge(a.cos() * r, a.sin() * r, segments);
            let fr = (fx * fx + fy * fy).sqrt();
            assert!((fr - r).abs() < 1e-3, "radius changed by fold: {r} -> {fr}");
        }
    }
}

#[test]
fn adjacent_wedges_alternate_mirroring() {
    for &segments in &SEGMENT_CHOICES {
        let step = 2.0 * PI / segments as f32;
        for i in 0..segments {
            // Sample at each wedge center.
            let a = i as f32 * step;
            let (_, _, mirrored) = fold_wedge(a.cos(), a.sin(), segments);
            assert_eq!(
                mirrored,
                i % 2 == 1,
                "segments={segments} wedge={i} parity wrong"
            );
        }
    }
}

#[test]
fn fold_is_periodic_over_wedge_pairs() {
    // Rotating by two wedge widths is a full symmetry period: the fold must
    // land on the same point.
    let segments = 12u32;
    let step = 2.0 * PI / segments as f32;
    for k in 0..36 {
        let a = k as f32 * 0.17;
        let r = 2.5;
        let (x0, y0, m0) = fold_wedge(a.cos() * r, a.sin() * r, segments);
        let b = a + 2.0 * step;
        let (x1, y1, m1) = fold_wedge(b.cos() * r, b.sin() * r, segments);
        assert!((x0 - x1).abs() < 1e-3 && (y0 - y1).abs() < 1e-3);
        assert_eq!(m0, m1);
    }
}

#[test]
fn mirror_parity_flips_across_wedge_boundary() {
    let segments = 12u32;
    let step = 2.0 * PI / segments as f32; // 30 degrees
    // Boundaries sit halfway between wedge centers, spaced one step apart.
    for k in 0..segments {
        let boundary = (k as f32 + 0.5) * step;
        let before = boundary - 0.01;
        let after = boundary + 0.01;
        let (_, _, m0) = fold_wedge(before.cos(), before.sin(), segments);
        let (_, _, m1) = fold_wedge(after.cos(), after.sin(), segments);
        assert_ne!(m0, m1, "parity did not flip at boundary {k}");
    }
}

// ── Depth cycle ─────────────────────────────────────────────────────────────

#[test]
fn zoom_phase_scenario() {
    // elapsed=30s with zoomSpeed=0.02 -> phase 0.6
    let z = zoom_phase(30.0, 0.02);
    assert!((z - 0.6).abs() < 1e-4, "z={z}");
    assert!((zoom_phase(0.0, 0.02)).abs() < 1e-6);
}

#[test]
fn layer_opacity_zero_at_cycle_ends() {
    assert_eq!(layer_opacity(0.0, 2.0), 0.0);
    assert!(layer_opacity(1.0, 2.0) < 1e-6);
    assert!(layer_opacity(-0.05, 2.0) == 0.0, "pre-cycle layers are invisible");
}

#[test]
fn layer_opacity_positive_inside_cycle() {
    for k in 1..20 {
        let p = k as f32 / 20.0;
        assert!(layer_opacity(p, 2.0) > 0.0, "opacity zero at progress {p}");
    }
    let mid = layer_opacity(0.5, 2.0);
    assert!((mid - 1.0).abs() < 1e-5, "peak should sit mid-cycle");
}

#[test]
fn opacity_matches_after_a_full_cycle() {
    let zoom_speed = 0.025;
    let cycle = 1.0 / zoom_speed;
    let layers = 8u32;
    for l in 0..layers {
        for &t in &[3.7f32, 12.3, 21.9] {
            let a = layer_opacity(layer_progress(l, zoom_phase(t, zoom_speed), layers), 2.0);
            let b = layer_opacity(
                layer_progress(l, zoom_phase(t + cycle, zoom_speed), layers),
                2.0,
            );
            assert!(
                (a - b).abs() < 1e-3,
                "layer {l} t={t}: opacity popped across the cycle wrap ({a} vs {b})"
            );
        }
    }
}

#[test]
fn deeper_layers_scale_smaller() {
    let base = 4.0;
    let exponent = 3.0;
    let mut prev = f32::INFINITY;
    for k in 0..10 {
        let p = k as f32 / 10.0;
        let s = layer_scale(p, base, exponent);
        assert!(s < prev, "scale must shrink as progress grows");
        prev = s;
    }
}

// ── Frame rendering ─────────────────────────────────────────────────────────

#[test]
fn render_without_texture_is_a_cleared_noop() {
    let renderer = KaleidoscopeRenderer::new(MotionTunables::default());
    let (w, h) = (32usize, 24usize);
    let mut out = vec![0u8; w * h * 4];
    renderer.render(&ctx(1.0, w, h, 12, None), &mut out);
    for px in out.chunks_exact(4) {
        assert!(px[0] < 16 && px[1] < 16 && px[2] < 16, "frame not near-black");
        assert_eq!(px[3], 255);
    }
}

#[test]
fn render_with_texture_lights_up_the_center() {
    let renderer = KaleidoscopeRenderer::new(MotionTunables::default());
    let texture = solid_texture(16, 16, 255, 255, 255);
    let (w, h) = (48usize, 48usize);
    let mut out = vec![0u8; w * h * 4];
    renderer.render(&ctx(0.5, w, h, 12, Some(&texture)), &mut out);

    let center = ((h / 2) * w + w / 2) * 4;
    assert!(
        out[center] > 60,
        "center should be lit by the layered texture (got {})",
        out[center]
    );
}

#[test]
fn vignette_darkens_the_corners() {
    let renderer = KaleidoscopeRenderer::new(MotionTunables::default());
    let texture = solid_texture(16, 16, 255, 255, 255);
    let (w, h) = (64usize, 64usize);
    let mut out = vec![0u8; w * h * 4];
    renderer.render(&ctx(0.5, w, h, 12, Some(&texture)), &mut out);

    let center = ((h / 2) * w + w / 2) * 4;
    let corner = 0usize;
    let lum = |i: usize| out[i] as u32 + out[i + 1] as u32 + out[i + 2] as u32;
    assert!(
        lum(corner) < lum(center),
        "corner ({}) should be darker than center ({})",
        lum(corner),
        lum(center)
    );
}

#[test]
fn segment_count_changes_the_frame() {
    let renderer = KaleidoscopeRenderer::new(MotionTunables::default());
    let texture = patterned_texture(32, 32);
    let (w, h) = (48usize, 48usize);

    let mut a = vec![0u8; w * h * 4];
    let mut b = vec![0u8; w * h * 4];
    renderer.render(&ctx(2.0, w, h, 6, Some(&texture)), &mut a);
    renderer.render(&ctx(2.0, w, h, 32, Some(&texture)), &mut b);
    assert_ne!(a, b, "different segment counts should render differently");
}

#[test]
fn render_is_a_pure_function_of_time() {
    // Same elapsed time, same output: dropped frames cannot desynchronize.
    let renderer = KaleidoscopeRenderer::new(MotionTunables::default());
    let texture = patterned_texture(32, 32);
    let (w, h) = (40usize, 30usize);

    let mut a = vec![0u8; w * h * 4];
    let mut b = vec![0u8; w * h * 4];
    renderer.render(&ctx(7.25, w, h, 12, Some(&texture)), &mut a);
    renderer.render(&ctx(7.25, w, h, 12, Some(&texture)), &mut b);
    assert_eq!(a, b);
}

#[test]
fn render_guards_undersized_buffers() {
    let renderer = KaleidoscopeRenderer::new(MotionTunables::default());
    let texture = solid_texture(8, 8, 200, 100, 50);
    let mut out = vec![7u8; 16];
    renderer.render(&ctx(1.0, 32, 32, 12, Some(&texture)), &mut out);
    assert!(out.iter().all(|&b| b == 7), "undersized buffer must be untouched");
}

#[test]
fn tunables_clamp_layer_count() {
    let t = MotionTunables {
        layers: 40,
        ..MotionTunables::default()
    }
    .clamped();
    assert_eq!(t.layers, 12);
    let t = MotionTunables {
        layers: 1,
        ..MotionTunables::default()
    }
    .clamped();
    assert_eq!(t.layers, 5);
}
