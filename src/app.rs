use crate::audio::AudioEngine;
use crate::capability::probe_runtime;
use crate::config::{Config, Quality, RendererMode};
use crate::controls::{ControlAction, Controls};
use crate::render::{AsciiRenderer, BrailleRenderer, Frame, HalfBlockRenderer, Renderer};
use crate::scheduler::FrameScheduler;
use crate::terminal::TerminalGuard;
use crate::texture::{Texture, TextureLoader};
use crate::visual::{KaleidoscopeRenderer, MotionTunables, RenderCtx};
use crossterm::event::{self, Event, KeyEventKind};
use std::io::BufWriter;
use std::time::{Duration, Instant};

const NOTICE_SECS: f32 = 4.0;

const START_OVERLAY: &str = "Begin Journey\n\nPress any key to sync visuals and audio.\nq or Esc leaves at any time.";

/// Stands in for the external image-supply collaborator: hands out the next
/// reference on demand, cycling through whatever the CLI provided.
struct ImageSupplier {
    refs: Vec<String>,
    next: usize,
}

impl ImageSupplier {
    fn new(refs: Vec<String>) -> Self {
        let refs = if refs.is_empty() {
            // No references at all still renders: the decode tier fails and
            // the loader serves the procedural gradient.
            vec!["ambient:default".to_string()]
        } else {
            refs
        };
        Self { refs, next: 0 }
    }

    fn next_reference(&mut self) -> String {
        let r = self.refs[self.next % self.refs.len()].clone();
        self.next += 1;
        r
    }
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let report = probe_runtime(cfg.renderer, cfg.auto_probe);
    let mut controls = Controls::new(cfg.segments, cfg.muted)?;

    let tunables = MotionTunables {
        zoom_speed: cfg.zoom_speed,
        layers: cfg.layers,
        rotation_speed: cfg.rotation_speed,
        texture_scale: cfg.texture_scale,
        ..MotionTunables::default()
    };
    let kaleidoscope = KaleidoscopeRenderer::new(tunables);

    let _term = TerminalGuard::new()?;
    let mut out = BufWriter::new(TerminalGuard::stdout());

    let mut renderer: Box<dyn Renderer> = match report.renderer {
        RendererMode::Ascii => Box::new(AsciiRenderer::new()),
        RendererMode::HalfBlock => Box::new(HalfBlockRenderer::new()),
        RendererMode::Braille => Box::new(BrailleRenderer::new()),
    };
    let (px_w_mul, px_h_mul) = match report.renderer {
        RendererMode::Ascii => (1usize, 1usize),
        RendererMode::HalfBlock => (1, 2),
        RendererMode::Braille => (2, 4),
    };

    let mut supplier = ImageSupplier::new(cfg.images.clone());
    let mut loader = TextureLoader::new();
    controls.begin_regenerate();
    loader.request(&supplier.next_reference());

    let mut audio = AudioEngine::new(
        cfg.audio.clone(),
        cfg.device.clone(),
        cfg.volume,
        cfg.muted,
    );

    let mut last_size = TerminalGuard::size()?;
    if last_size.0 < 4 || last_size.1 < 2 {
        anyhow::bail!(
            "terminal too small (need at least 4x2, got {}x{})",
            last_size.0,
            last_size.1
        );
    }

    let mut scheduler = FrameScheduler::new(cfg.fps);
    let mut tuning = RuntimeTuning::new(cfg.quality, cfg.adaptive_quality);
    let mut fps = FpsCounter::new();

    let mut texture: Option<Texture> = None;
    let mut pixels: Vec<u8> = Vec::new();
    let mut show_hud = true;
    let mut notice: Option<(String, Instant)> = None;
    if report.changed() {
        if let Some(note) = report.notes().last() {
            notice = Some((note.clone(), Instant::now()));
        }
    }

    loop {
        // Drain input (non-blocking).
        let mut close_requested = false;
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    match controls.handle_key(k.code, k.modifiers) {
                        ControlAction::Close => close_requested = true,
                        ControlAction::Start => audio.arm(),
                        ControlAction::MuteChanged(muted) => audio.set_muted(muted),
                        ControlAction::Regenerate => {
                            loader.request(&supplier.next_reference());
                            // New reference, new loop; the time origin is
                            // deliberately kept so the motion stays continuous.
                            scheduler.restart();
                        }
                        ControlAction::ToggleHud => show_hud = !show_hud,
                        ControlAction::Redraw | ControlAction::None => {}
                    }
                }
                Event::Resize(c, r) => last_size = (c, r),
                _ => {}
            }
        }
        if close_requested {
            scheduler.cancel();
            break;
        }

        // Resize events can be missed in some terminals; re-check every frame.
        let sz = TerminalGuard::size()?;
        if sz != last_size {
            last_size = sz;
        }

        if let Some(loaded) = loader.poll() {
            texture = Some(loaded.texture);
            controls.finish_regenerate();
            if loaded.fallback_used {
                notice = Some((
                    "image unavailable; showing procedural texture".to_string(),
                    Instant::now(),
                ));
            }
        }

        if let Some((_, since)) = &notice {
            if since.elapsed().as_secs_f32() > NOTICE_SECS {
                notice = None;
            }
        }

        let Some(tick) = scheduler.tick() else {
            break;
        };
        let frame_start = Instant::now();

        let (term_cols, term_rows) = last_size;
        let hud_rows: u16 = if show_hud { 2.min(term_rows.saturating_sub(1)) } else { 0 };
        let visual_rows = term_rows.saturating_sub(hud_rows).max(1);
        // Physical backing size is recomputed from the live terminal size
        // every frame, never cached, so resizes stay crisp.
        let w = (term_cols as usize).saturating_mul(px_w_mul);
        let h = (visual_rows as usize).saturating_mul(px_h_mul);
        pixels.resize(w * h * 4, 0);

        let ctx = RenderCtx {
            t: tick.t,
            dt: tick.dt,
            w,
            h,
            segments: controls.segments(),
            texture: texture.as_ref(),
            quality: tuning.quality,
            scale: tuning.scale,
        };
        kaleidoscope.render(&ctx, &mut pixels);

        let hud = if show_hud {
            build_hud(
                term_cols as usize,
                &controls,
                &audio,
                renderer.name(),
                tuning.quality,
                fps.fps(),
            )
        } else {
            String::new()
        };

        let frame = Frame {
            term_cols,
            term_rows,
            visual_rows,
            pixel_width: w,
            pixel_height: h,
            pixels_rgba: &pixels,
            hud: &hud,
            hud_rows,
            notice: notice.as_ref().map(|(s, _)| s.as_str()),
            overlay: (!controls.armed()).then_some(START_OVERLAY),
            sync_updates: cfg.sync_updates,
        };
        renderer.render(&frame, &mut out)?;

        fps.tick();
        let frame_ms = frame_start.elapsed().as_secs_f32() * 1000.0;
        tuning.update(frame_ms, 1000.0 / cfg.fps.max(1) as f32);
    }

    Ok(())
}

fn build_hud(
    cols: usize,
    controls: &Controls,
    audio: &AudioEngine,
    renderer_name: &str,
    quality: Quality,
    fps: f32,
) -> String {
    let status = format!(
        "Segments: {} | Audio: {}{} | {}{} | Quality: {:?} | FPS: {:>4.1}",
        controls.segments(),
        audio.source_label(),
        if audio.muted() { " (muted)" } else { "" },
        renderer_name,
        if controls.busy() { " | generating..." } else { "" },
        quality,
        fps,
    );
    let keys = "Keys: 1-5 or </> segments | m mute | r new image | i HUD | q quit";

    let mut lines = Vec::new();
    lines.push(truncate_line(&status, cols));
    lines.push(truncate_line(keys, cols));
    lines.join("\n")
}

fn truncate_line(s: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('~');
    out
}

struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let dt = self.last.elapsed().as_secs_f32();
        if dt >= 0.5 {
            self.fps = self.frames as f32 / dt;
            self.frames = 0;
            self.last = Instant::now();
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}

/// Steps quality/scale down when the frame-time EMA blows the budget and
/// back up when headroom returns.
struct RuntimeTuning {
    base_quality: Quality,
    quality: Quality,
    scale: usize,
    adaptive: bool,
    ema_ms: f32,
}

impl RuntimeTuning {
    fn new(base_quality: Quality, adaptive: bool) -> Self {
        Self {
            base_quality,
            quality: base_quality,
            scale: 1,
            adaptive,
            ema_ms: 0.0,
        }
    }

    fn update(&mut self, frame_ms: f32, target_ms: f32) {
        if !self.adaptive {
            return;
        }
        self.ema_ms = if self.ema_ms == 0.0 {
            frame_ms
        } else {
            self.ema_ms * 0.95 + frame_ms * 0.05
        };

        if self.ema_ms > target_ms * 1.22 {
            if self.scale == 1 {
                self.scale = 2;
            } else {
                self.quality = self.quality.lower();
            }
            return;
        }

        if self.ema_ms < target_ms * 0.72 {
            if self.quality.rank() < self.base_quality.rank() {
                self.quality = self.quality.higher();
            } else if self.scale > 1 {
                self.scale = 1;
            }
        }
    }
}
