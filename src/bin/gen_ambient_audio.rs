use std::f32::consts::PI;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

struct Args {
    out: PathBuf,
    sample_rate: u32,
    seconds: f32,
}

fn parse_args() -> Args {
    let mut out = PathBuf::from("assets/ambient_loop.wav");
    let mut sample_rate = 48_000u32;
    let mut seconds = 30.0f32;

    let mut it = std::env::args().skip(1);
    while let Some(k) = it.next() {
        let v = it.next();
        match (k.as_str(), v) {
            ("--out", Some(p)) => out = PathBuf::from(p),
            ("--sample-rate", Some(v)) => {
                if let Ok(sr) = v.parse::<u32>() {
                    sample_rate = sr.clamp(8_000, 192_000);
                }
            }
            ("--seconds", Some(v)) => {
                if let Ok(s) = v.parse::<f32>() {
                    seconds = s.clamp(1.0, 600.0);
                }
            }
            _ => {}
        }
    }

    Args {
        out,
        sample_rate,
        seconds,
    }
}

fn main() -> Result<()> {
    let args = parse_args();
    if let Some(parent) = args.out.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }

    let samples = make_ambient_loop(args.sample_rate, args.seconds);
    write_wav_i16_mono(&args.out, args.sample_rate, &samples)
        .with_context(|| format!("write {}", args.out.display()))?;

    println!("generated: {}", args.out.display());
    println!(
        "sample_rate={}Hz duration={:.2}s samples={}",
        args.sample_rate,
        samples.len() as f32 / args.sample_rate as f32,
        samples.len()
    );
    Ok(())
}

/// Root/octave/fifth pad with slow detune wobble, faded at both ends so the
/// loop point is inaudible.
fn make_ambient_loop(sr: u32, seconds: f32) -> Vec<i16> {
    let n = (seconds.max(1.0) * sr as f32).round() as usize;
    let dur = n as f32 / sr as f32;
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let t = i as f32 / sr as f32;

        let a = (2.0 * PI * (55.0 + 0.4 * (t * 0.11).sin()) * t).sin() * 0.42;
        let b = (2.0 * PI * (110.0 + 0.7 * (t * 0.07).cos()) * t).sin() * 0.26;
        let c = (2.0 * PI * (165.0 + 1.1 * (t * 0.05).sin()) * t).sin() * 0.16;
        // A whisper of the next octave keeps the pad from sounding hollow.
        let d = (2.0 * PI * 220.0 * t).sin() * 0.05 * (t * 0.13).sin().abs();

        let edge = (t / 1.5).min((dur - t) / 1.5).clamp(0.0, 1.0);
        out.push(to_i16((a + b + c + d) * 0.8 * edge));
    }

    out
}

fn to_i16(x: f32) -> i16 {
    let y = x.clamp(-1.0, 1.0);
    (y * i16::MAX as f32) as i16
}

fn write_wav_i16_mono(path: &PathBuf, sr: u32, samples: &[i16]) -> Result<()> {
    let mut w = BufWriter::new(fs::File::create(path)?);

    let channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let byte_rate = sr * channels as u32 * bits_per_sample as u32 / 8;
    let block_align = channels * bits_per_sample / 8;
    let data_bytes = (samples.len() * std::mem::size_of::<i16>()) as u32;
    let riff_size = 4 + 8 + 16 + 8 + data_bytes;

    w.write_all(b"RIFF")?;
    w.write_all(&riff_size.to_le_bytes())?;
    w.write_all(b"WAVE")?;

    // fmt chunk
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?; // PCM fmt chunk size
    w.write_all(&1u16.to_le_bytes())?; // PCM
    w.write_all(&channels.to_le_bytes())?;
    w.write_all(&sr.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&bits_per_sample.to_le_bytes())?;

    // data chunk
    w.write_all(b"data")?;
    w.write_all(&data_bytes.to_le_bytes())?;
    for s in samples {
        w.write_all(&s.to_le_bytes())?;
    }

    w.flush()?;
    Ok(())
}
