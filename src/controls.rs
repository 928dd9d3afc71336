use crate::config::{is_valid_segments, SEGMENT_CHOICES};
use anyhow::bail;
use crossterm::event::{KeyCode, KeyModifiers};

/// What a key press asks the app to do. The controller owns the lightweight
/// state (segments, mute, busy, gate); the app owns the collaborators that
/// act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    None,
    /// First gesture observed; audio may start now.
    Start,
    Redraw,
    Regenerate,
    MuteChanged(bool),
    ToggleHud,
    Close,
}

pub struct Controls {
    segments: u32,
    muted: bool,
    busy: bool,
    armed: bool,
}

impl Controls {
    pub fn new(segments: u32, muted: bool) -> anyhow::Result<Self> {
        if !is_valid_segments(segments) {
            bail!(
                "segment count {} not in the supported set {:?}",
                segments,
                SEGMENT_CHOICES
            );
        }
        Ok(Self {
            segments,
            muted,
            busy: false,
            armed: false,
        })
    }

    pub fn segments(&self) -> u32 {
        self.segments
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn armed(&self) -> bool {
        self.armed
    }

    /// Rejects values outside the fixed set; returns whether anything
    /// changed. Takes effect on the very next frame, no interpolation.
    pub fn set_segments(&mut self, n: u32) -> bool {
        if !is_valid_segments(n) || n == self.segments {
            return false;
        }
        self.segments = n;
        true
    }

    pub fn cycle_segments(&mut self, forward: bool) {
        let i = SEGMENT_CHOICES
            .iter()
            .position(|&n| n == self.segments)
            .unwrap_or(0);
        let len = SEGMENT_CHOICES.len();
        let next = if forward { (i + 1) % len } else { (i + len - 1) % len };
        self.segments = SEGMENT_CHOICES[next];
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    /// One-shot gesture gate: true exactly once, on the first call.
    pub fn request_start(&mut self) -> bool {
        if self.armed {
            return false;
        }
        self.armed = true;
        true
    }

    pub fn begin_regenerate(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    pub fn finish_regenerate(&mut self) {
        self.busy = false;
    }

    /// Maps a key press to an action. Before the first gesture every
    /// non-quit key only arms the gate; the start overlay explains this.
    pub fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> ControlAction {
        if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
            return ControlAction::Close;
        }
        if matches!(code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q')) {
            return ControlAction::Close;
        }

        if !self.armed {
            self.armed = true;
            return ControlAction::Start;
        }

        match code {
            KeyCode::Left => {
                self.cycle_segments(false);
                ControlAction::Redraw
            }
            KeyCode::Right => {
                self.cycle_segments(true);
                ControlAction::Redraw
            }
            KeyCode::Char(c @ '1'..='5') => {
                let idx = (c as u8 - b'1') as usize;
                self.set_segments(SEGMENT_CHOICES[idx]);
                ControlAction::Redraw
            }
            KeyCode::Char('m') | KeyCode::Char('M') => ControlAction::MuteChanged(self.toggle_mute()),
            KeyCode::Char('r') | KeyCode::Char('R') => {
                if self.begin_regenerate() {
                    ControlAction::Regenerate
                } else {
                    ControlAction::None
                }
            }
            KeyCode::Char('i') | KeyCode::Char('I') => ControlAction::ToggleHud,
            _ => ControlAction::None,
        }
    }
}
