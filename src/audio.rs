use anyhow::{anyhow, bail, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};
use ringbuf::traits::{Consumer as _, Observer as _, Producer as _, Split as _};
use ringbuf::HeapRb;
use std::f32::consts::PI;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Root, octave and fifth of the fallback drone.
pub const DRONE_FREQS_HZ: [f32; 3] = [55.0, 110.0, 165.0];
pub const DRONE_WEIGHTS: [f32; 3] = [0.5, 0.3, 0.2];
/// Per-tone fade-in; keeps the drone from clicking on start.
pub const DRONE_RAMP_SECS: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No gesture observed yet; no device touched.
    Idle,
    /// Gesture observed, source start in progress.
    Armed,
    Playing,
    Suspended,
}

pub fn list_output_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .context("enumerate output devices")?;

    let mut out = io::stdout();
    writeln!(out, "Output devices:")?;
    for dev in devices {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        writeln!(out, "  - {}", name)?;
    }
    Ok(())
}

/// Mono sample generator feeding the output stream. Unit-level output; the
/// engine's master gain applies volume and mute.
pub trait SampleSource: Send {
    fn name(&self) -> &'static str;
    fn next_sample(&mut self) -> f32;
}

/// Decoded WAV, looped forever, linearly resampled to the device rate.
pub struct TrackSource {
    samples: Vec<f32>,
    pos: f32,
    step: f32,
}

impl TrackSource {
    pub fn new(samples: Vec<f32>, src_rate_hz: u32, out_rate_hz: u32) -> anyhow::Result<Self> {
        if samples.is_empty() {
            bail!("track has no samples");
        }
        if src_rate_hz == 0 || out_rate_hz == 0 {
            bail!("invalid sample rate");
        }
        Ok(Self {
            samples,
            pos: 0.0,
            step: src_rate_hz as f32 / out_rate_hz as f32,
        })
    }
}

impl SampleSource for TrackSource {
    fn name(&self) -> &'static str {
        "track"
    }

    fn next_sample(&mut self) -> f32 {
        let len = self.samples.len();
        let i = self.pos as usize;
        let frac = self.pos - i as f32;
        let a = self.samples[i % len];
        let b = self.samples[(i + 1) % len];
        self.pos = (self.pos + self.step) % len as f32;
        a + (b - a) * frac
    }
}

struct DroneVoice {
    phase: f32,
    phase_step: f32,
    level: f32,
    target: f32,
    ramp_step: f32,
}

/// Three-tone harmonic drone. Each tone ramps in from silence independently.
pub struct DroneSynth {
    voices: Vec<DroneVoice>,
}

impl DroneSynth {
    pub fn new(sample_rate_hz: u32) -> Self {
        let sr = (sample_rate_hz.max(1)) as f32;
        let voices = DRONE_FREQS_HZ
            .iter()
            .zip(DRONE_WEIGHTS)
            .map(|(&freq, weight)| DroneVoice {
                phase: 0.0,
                phase_step: freq / sr,
                level: 0.0,
                target: weight,
                ramp_step: weight / (DRONE_RAMP_SECS * sr),
            })
            .collect();
        Self { voices }
    }

    /// True once every tone reached its target level.
    pub fn ramp_complete(&self) -> bool {
        self.voices.iter().all(|v| v.level >= v.target)
    }
}

impl SampleSource for DroneSynth {
    fn name(&self) -> &'static str {
        "drone"
    }

    fn next_sample(&mut self) -> f32 {
        let mut acc = 0.0f32;
        for v in &mut self.voices {
            if v.level < v.target {
                v.level = (v.level + v.ramp_step).min(v.target);
            }
            acc += (2.0 * PI * v.phase).sin() * v.level;
            v.phase += v.phase_step;
            if v.phase >= 1.0 {
                v.phase -= 1.0;
            }
        }
        acc
    }
}

#[derive(Debug)]
pub struct DecodedWav {
    pub sample_rate: u32,
    /// Mono f32 in [-1, 1]; multi-channel input is averaged down.
    pub samples: Vec<f32>,
}

/// Minimal RIFF/WAVE reader for 16-bit PCM, the format our own generator
/// emits. Anything else is a provider failure, not a crash.
pub fn decode_wav_pcm16(bytes: &[u8]) -> anyhow::Result<DecodedWav> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        bail!("not a RIFF/WAVE file");
    }

    let mut channels = 0u16;
    let mut sample_rate = 0u32;
    let mut data: Option<&[u8]> = None;

    let mut off = 12usize;
    while off + 8 <= bytes.len() {
        let id = &bytes[off..off + 4];
        let size = u32::from_le_bytes([
            bytes[off + 4],
            bytes[off + 5],
            bytes[off + 6],
            bytes[off + 7],
        ]) as usize;
        let body_start = off + 8;
        let body_end = body_start.checked_add(size).filter(|&e| e <= bytes.len());
        let Some(body_end) = body_end else {
            bail!("truncated chunk {:?}", String::from_utf8_lossy(id));
        };
        let body = &bytes[body_start..body_end];

        if id == b"fmt " {
            if body.len() < 16 {
                bail!("fmt chunk too small");
            }
            let format = u16::from_le_bytes([body[0], body[1]]);
            channels = u16::from_le_bytes([body[2], body[3]]);
            sample_rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
            let bits = u16::from_le_bytes([body[14], body[15]]);
            if format != 1 || bits != 16 {
                bail!("unsupported WAV encoding (format={format}, bits={bits}); PCM16 only");
            }
            if channels == 0 {
                bail!("fmt chunk reports zero channels");
            }
        } else if id == b"data" {
            data = Some(body);
        }

        // Chunks are word-aligned.
        off = body_end + (size & 1);
    }

    let data = data.ok_or_else(|| anyhow!("missing data chunk"))?;
    if sample_rate == 0 {
        bail!("missing fmt chunk");
    }

    let ch = channels as usize;
    let frame_bytes = ch * 2;
    let frames = data.len() / frame_bytes;
    let mut samples = Vec::with_capacity(frames);
    for f in 0..frames {
        let mut acc = 0.0f32;
        for c in 0..ch {
            let i = f * frame_bytes + c * 2;
            let s = i16::from_le_bytes([data[i], data[i + 1]]);
            acc += s as f32 / 32_768.0;
        }
        samples.push(acc / ch as f32);
    }

    Ok(DecodedWav {
        sample_rate,
        samples,
    })
}

pub fn read_wav_file(path: &str) -> anyhow::Result<DecodedWav> {
    let bytes = std::fs::read(path).with_context(|| format!("read audio file {path}"))?;
    decode_wav_pcm16(&bytes)
}

/// One tier of the audio chain: attempt → live source or error.
pub trait AudioProvider: Send {
    fn name(&self) -> &'static str;
    fn start(&self, out_rate_hz: u32) -> anyhow::Result<Box<dyn SampleSource>>;
}

pub struct TrackProvider {
    path: Option<String>,
}

impl TrackProvider {
    pub fn new(path: Option<String>) -> Self {
        Self { path }
    }
}

impl AudioProvider for TrackProvider {
    fn name(&self) -> &'static str {
        "track"
    }

    fn start(&self, out_rate_hz: u32) -> anyhow::Result<Box<dyn SampleSource>> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| anyhow!("no ambient track configured"))?;
        let wav = read_wav_file(path)?;
        let source = TrackSource::new(wav.samples, wav.sample_rate, out_rate_hz)?;
        Ok(Box::new(source))
    }
}

pub struct DroneProvider;

impl AudioProvider for DroneProvider {
    fn name(&self) -> &'static str {
        "drone"
    }

    fn start(&self, out_rate_hz: u32) -> anyhow::Result<Box<dyn SampleSource>> {
        Ok(Box::new(DroneSynth::new(out_rate_hz)))
    }
}

pub fn provider_chain(track: Option<String>) -> Vec<Box<dyn AudioProvider>> {
    vec![Box::new(TrackProvider::new(track)), Box::new(DroneProvider)]
}

/// Tries each tier in order. The drone tier is infallible, so this always
/// yields a source; failures earlier in the chain are diagnostic-only.
pub fn start_first_available(
    chain: &[Box<dyn AudioProvider>],
    out_rate_hz: u32,
) -> (Box<dyn SampleSource>, &'static str) {
    for provider in chain {
        match provider.start(out_rate_hz) {
            Ok(source) => {
                let label = source.name();
                return (source, label);
            }
            Err(err) => {
                eprintln!("audio provider '{}' unavailable: {err:#}", provider.name());
            }
        }
    }
    (Box::new(DroneSynth::new(out_rate_hz)), "drone")
}

/// Gesture-gated ambient audio. Construction never touches a device; `arm()`
/// does, exactly once, and degrades silently through the tier chain.
pub struct AudioEngine {
    track: Option<String>,
    device_query: Option<String>,
    volume: f32,
    muted: bool,
    state: EngineState,
    stream: Option<cpal::Stream>,
    feeder: Option<thread::JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    gain: Arc<AtomicU32>,
    source_label: &'static str,
}

impl AudioEngine {
    pub fn new(track: Option<String>, device_query: Option<String>, volume: f32, muted: bool) -> Self {
        Self {
            track,
            device_query,
            volume: volume.clamp(0.0, 1.0),
            muted,
            state: EngineState::Idle,
            stream: None,
            feeder: None,
            stop: Arc::new(AtomicBool::new(false)),
            gain: Arc::new(AtomicU32::new(0f32.to_bits())),
            source_label: "none",
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn source_label(&self) -> &'static str {
        self.source_label
    }

    /// First-gesture hook. No-op after the first call. Failure to open a
    /// device leaves the engine idle; it is never surfaced to the caller.
    pub fn arm(&mut self) {
        if self.state != EngineState::Idle {
            return;
        }
        self.state = EngineState::Armed;

        match self.start_stream() {
            Ok(()) => {
                self.apply_gain();
                if self.muted {
                    self.pause_stream();
                    self.state = EngineState::Suspended;
                } else {
                    self.state = EngineState::Playing;
                }
            }
            Err(err) => {
                eprintln!("audio unavailable, continuing without sound: {err:#}");
                self.state = EngineState::Idle;
                self.source_label = "none";
            }
        }
    }

    /// Idempotent. Unmute restores the exact pre-mute transport state.
    pub fn set_muted(&mut self, muted: bool) {
        if muted == self.muted {
            return;
        }
        self.muted = muted;
        self.apply_gain();
        match self.state {
            EngineState::Playing if muted => {
                self.pause_stream();
                self.state = EngineState::Suspended;
            }
            EngineState::Suspended if !muted => {
                self.resume_stream();
                self.state = EngineState::Playing;
            }
            _ => {}
        }
    }

    fn apply_gain(&self) {
        let g = if self.muted { 0.0 } else { self.volume };
        self.gain.store(g.to_bits(), Ordering::Relaxed);
    }

    fn pause_stream(&self) {
        if let Some(stream) = &self.stream {
            if let Err(err) = stream.pause() {
                eprintln!("pause audio stream: {err}");
            }
        }
    }

    fn resume_stream(&self) {
        if let Some(stream) = &self.stream {
            if let Err(err) = stream.play() {
                eprintln!("resume audio stream: {err}");
            }
        }
    }

    fn start_stream(&mut self) -> anyhow::Result<()> {
        let host = cpal::default_host();
        let device = select_output_device(&host, self.device_query.as_deref())?;
        let supported = device
            .default_output_config()
            .context("get default output config")?;
        let sample_rate_hz = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.clone().into();

        let (mut source, label) =
            start_first_available(&provider_chain(self.track.clone()), sample_rate_hz);
        self.source_label = label;

        // Half a second of buffered audio between the feeder and the callback.
        let rb = HeapRb::<f32>::new((sample_rate_hz as usize / 2).max(1024));
        let (mut prod, mut cons) = rb.split();

        self.stop.store(false, Ordering::Relaxed);
        let stop = Arc::clone(&self.stop);
        let gain = Arc::clone(&self.gain);

        let feeder = thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let g = f32::from_bits(gain.load(Ordering::Relaxed));
                let free = prod.vacant_len();
                for _ in 0..free {
                    let s = (source.next_sample() * g).clamp(-1.0, 1.0);
                    let _ = prod.try_push(s);
                }
                if free == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        });
        self.feeder = Some(feeder);

        let err_fn = |err| eprintln!("audio stream error: {err}");
        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_output_stream::<f32>(&device, &config, channels, cons, err_fn)?,
            SampleFormat::I16 => build_output_stream::<i16>(&device, &config, channels, cons, err_fn)?,
            SampleFormat::U16 => build_output_stream::<u16>(&device, &config, channels, cons, err_fn)?,
            fmt => {
                self.stop.store(true, Ordering::Relaxed);
                if let Some(h) = self.feeder.take() {
                    let _ = h.join();
                }
                return Err(anyhow!("unsupported output sample format: {fmt:?}"));
            }
        };

        stream.play().context("start output stream")?;
        self.stream = Some(stream);
        Ok(())
    }
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut cons: ringbuf::HeapCons<f32>,
    err_fn: fn(cpal::StreamError),
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            for frame in data.chunks_mut(channels.max(1)) {
                // Underrun plays silence rather than stale samples.
                let s = cons.try_pop().unwrap_or(0.0);
                let v = T::from_sample(s);
                for slot in frame {
                    *slot = v;
                }
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

fn select_output_device(
    host: &cpal::Host,
    device_query: Option<&str>,
) -> anyhow::Result<cpal::Device> {
    let want = device_query.map(|s| s.to_lowercase());
    if let Some(want) = want.as_deref() {
        let devices = host
            .output_devices()
            .context("enumerate output devices")?
            .collect::<Vec<_>>();
        if let Some(dev) = devices.iter().find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(want))
                .unwrap_or(false)
        }) {
            return Ok(dev.clone());
        }
        return Err(anyhow!("no output device matching: {want}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("no default output device found"))
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.feeder.take() {
            let _ = h.join();
        }
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
    }
}
