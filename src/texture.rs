use anyhow::{anyhow, Context};
use base64::Engine as _;
use std::sync::mpsc;
use std::thread;

/// Side length of the procedural placeholder bitmap.
pub const FALLBACK_SIZE: u32 = 512;

/// An immutable decoded bitmap. Replaced wholesale when the image reference
/// changes; the render loop never observes a partially decoded one because
/// whole values cross the loader channel.
#[derive(Clone)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Texture {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        debug_assert_eq!(rgba.len(), (width as usize) * (height as usize) * 4);
        Self { width, height, rgba }
    }
}

/// One tier of the image-acquisition chain: attempt → texture or error.
pub trait TextureProvider: Send {
    fn name(&self) -> &'static str;
    fn fetch(&self, reference: &str) -> anyhow::Result<Texture>;
}

/// Decodes file paths and base64 data URIs through the `image` crate.
pub struct DecodeProvider;

impl TextureProvider for DecodeProvider {
    fn name(&self) -> &'static str {
        "decode"
    }

    fn fetch(&self, reference: &str) -> anyhow::Result<Texture> {
        let bytes = read_reference_bytes(reference)?;
        let decoded = image::load_from_memory(&bytes)
            .with_context(|| format!("decode image bytes for {}", short_ref(reference)))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Texture::new(width, height, rgba.into_raw()))
    }
}

/// Terminal tier: always succeeds. Two-color radial gradient with colors
/// derived from the reference hash, so a broken reference still gets a
/// stable, distinct texture.
pub struct GradientProvider;

impl TextureProvider for GradientProvider {
    fn name(&self) -> &'static str {
        "gradient"
    }

    fn fetch(&self, reference: &str) -> anyhow::Result<Texture> {
        Ok(fallback_gradient(reference))
    }
}

pub fn provider_chain() -> Vec<Box<dyn TextureProvider>> {
    vec![Box::new(DecodeProvider), Box::new(GradientProvider)]
}

/// Runs the chain to completion. The gradient tier cannot fail, so the return
/// always carries a texture; `fallback_used` drives the transient HUD notice.
pub fn fetch_with_fallback(reference: &str) -> (Texture, bool) {
    for (i, provider) in provider_chain().iter().enumerate() {
        match provider.fetch(reference) {
            Ok(texture) => return (texture, i > 0),
            Err(err) => {
                eprintln!("texture provider '{}' failed: {err:#}", provider.name());
            }
        }
    }
    // The chain ends in GradientProvider which is infallible.
    (fallback_gradient(reference), true)
}

fn read_reference_bytes(reference: &str) -> anyhow::Result<Vec<u8>> {
    if let Some(rest) = reference.strip_prefix("data:") {
        let payload = rest
            .split_once(";base64,")
            .map(|(_, p)| p)
            .ok_or_else(|| anyhow!("data URI without base64 payload"))?;
        return base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .context("decode base64 payload");
    }
    std::fs::read(reference).with_context(|| format!("read image file {reference}"))
}

fn short_ref(reference: &str) -> String {
    if reference.chars().count() <= 48 {
        return reference.to_string();
    }
    let head: String = reference.chars().take(47).collect();
    format!("{head}~")
}

fn fallback_gradient(reference: &str) -> Texture {
    let seed = hash_reference(reference);
    let (inner, outer) = gradient_colors(seed);

    let size = FALLBACK_SIZE as usize;
    let mut rgba = vec![0u8; size * size * 4];
    let center = (size as f32 - 1.0) * 0.5;
    let max_d = center * std::f32::consts::SQRT_2;

    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let t = ((dx * dx + dy * dy).sqrt() / max_d).clamp(0.0, 1.0);
            // Tiny ordered dither so the blend doesn't band when tiled.
            let d = (((x ^ y) & 3) as f32 - 1.5) / 255.0;
            let t = (t + d).clamp(0.0, 1.0);

            let i = (y * size + x) * 4;
            rgba[i] = lerp_u8(inner[0], outer[0], t);
            rgba[i + 1] = lerp_u8(inner[1], outer[1], t);
            rgba[i + 2] = lerp_u8(inner[2], outer[2], t);
            rgba[i + 3] = 255;
        }
    }

    Texture::new(FALLBACK_SIZE, FALLBACK_SIZE, rgba)
}

fn hash_reference(reference: &str) -> u32 {
    let mut h = 0x811C_9DC5u32;
    for b in reference.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(16_777_619);
    }
    h
}

fn gradient_colors(seed: u32) -> ([u8; 3], [u8; 3]) {
    let hue = (seed & 0xFFFF) as f32 / 65_535.0;
    let inner = hsv_rgb(hue, 0.85, 0.95);
    let outer = hsv_rgb((hue + 0.45).fract(), 0.9, 0.25);
    (inner, outer)
}

fn hsv_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let h = (h.fract() + 1.0).fract() * 6.0;
    let i = h.floor() as u32 % 6;
    let f = h - h.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match i {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    ]
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
}

/// A completed load, tagged with the generation it was requested under.
pub struct LoadedTexture {
    pub texture: Texture,
    pub fallback_used: bool,
}

struct LoadResult {
    generation: u64,
    texture: Texture,
    fallback_used: bool,
}

/// Background image loader. One outstanding load at a time; requesting a new
/// reference bumps the generation, so a late completion of the previous
/// reference is dropped at `poll()` instead of overwriting the newer texture.
pub struct TextureLoader {
    tx: mpsc::Sender<LoadResult>,
    rx: mpsc::Receiver<LoadResult>,
    generation: u64,
    busy: bool,
}

impl TextureLoader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            generation: 0,
            busy: false,
        }
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    /// Starts decoding `reference` on a worker thread. Cancels (by
    /// superseding) any load still in flight.
    pub fn request(&mut self, reference: &str) {
        self.generation += 1;
        self.busy = true;

        let generation = self.generation;
        let reference = reference.to_string();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let (texture, fallback_used) = fetch_with_fallback(&reference);
            // The receiver only disappears at teardown; a failed send is fine.
            let _ = tx.send(LoadResult {
                generation,
                texture,
                fallback_used,
            });
        });
    }

    /// Non-blocking. Returns the completed load for the *current* generation
    /// at most once; stale completions are discarded.
    pub fn poll(&mut self) -> Option<LoadedTexture> {
        let mut latest = None;
        while let Ok(result) = self.rx.try_recv() {
            if result.generation == self.generation {
                latest = Some(result);
            }
        }
        let result = latest?;
        self.busy = false;
        Some(LoadedTexture {
            texture: result.texture,
            fallback_used: result.fallback_used,
        })
    }
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self::new()
    }
}
