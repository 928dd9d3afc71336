use clap::{Parser, ValueEnum};

/// Segment counts the wedge fold supports. Odd/even wedge parity drives the
/// mirror logic, so the set is fixed rather than free-form.
pub const SEGMENT_CHOICES: [u32; 5] = [6, 12, 18, 24, 32];

pub fn is_valid_segments(n: u32) -> bool {
    SEGMENT_CHOICES.contains(&n)
}

#[derive(Parser, Debug, Clone)]
#[command(name = "kaleido-viewer", version, about = "Infinite-zoom kaleidoscope viewer for the terminal, with an ambient audio layer")]
pub struct Config {
    /// Image reference: a file path or a data:<mime>;base64,... URI.
    /// May be given multiple times; `r` cycles through them.
    #[arg(long = "image")]
    pub images: Vec<String>,

    /// Loopable ambient WAV. When absent or undecodable the engine
    /// synthesizes a harmonic drone instead.
    #[arg(long)]
    pub audio: Option<String>,

    #[arg(long, value_enum, default_value_t = RendererMode::HalfBlock)]
    pub renderer: RendererMode,

    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    #[arg(long, value_enum, default_value_t = Quality::High)]
    pub quality: Quality,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub adaptive_quality: bool,

    #[arg(long, default_value_t = 12)]
    pub segments: u32,

    /// Full zoom cycles per second. Keep well below the rotation rate or the
    /// depth illusion collapses into visible stepping.
    #[arg(long, default_value_t = 0.025)]
    pub zoom_speed: f32,

    #[arg(long, default_value_t = 8)]
    pub layers: u32,

    #[arg(long, default_value_t = 0.005)]
    pub rotation_speed: f32,

    #[arg(long, default_value_t = 0.6)]
    pub texture_scale: f32,

    #[arg(long, default_value_t = 0.3)]
    pub volume: f32,

    #[arg(long, default_value_t = false)]
    pub muted: bool,

    #[arg(long, default_value_t = false)]
    pub list_output_devices: bool,

    /// Case-insensitive substring match against output device names.
    #[arg(long)]
    pub device: Option<String>,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_probe: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererMode {
    #[value(alias = "ansi", alias = "text")]
    Ascii,
    #[value(name = "half-block", alias = "halfblock", alias = "half_block", alias = "hb")]
    HalfBlock,
    #[value(alias = "hires", alias = "dots")]
    Braille,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Quality {
    High,
    Balanced,
    Fast,
}

impl Quality {
    pub fn lower(self) -> Self {
        match self {
            Self::High => Self::Balanced,
            Self::Balanced => Self::Fast,
            Self::Fast => Self::Fast,
        }
    }

    pub fn higher(self) -> Self {
        match self {
            Self::Fast => Self::Balanced,
            Self::Balanced => Self::High,
            Self::High => Self::High,
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            Self::Fast => 0,
            Self::Balanced => 1,
            Self::High => 2,
        }
    }
}
