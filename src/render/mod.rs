mod ascii;
mod braille;
mod halfblock;

pub use ascii::AsciiRenderer;
pub use braille::BrailleRenderer;
pub use halfblock::HalfBlockRenderer;

use std::io::Write;

/// One blit-ready frame: the rendered pixel buffer plus the text chrome the
/// app lays around it.
pub struct Frame<'a> {
    pub term_cols: u16,
    pub term_rows: u16,
    pub visual_rows: u16,
    pub pixel_width: usize,
    pub pixel_height: usize,
    pub pixels_rgba: &'a [u8],
    pub hud: &'a str,
    pub hud_rows: u16,
    /// Transient banner (image-fallback warning, capability notes).
    pub notice: Option<&'a str>,
    /// Full-screen popup (the pre-gesture start screen).
    pub overlay: Option<&'a str>,
    pub sync_updates: bool,
}

pub trait Renderer {
    fn name(&self) -> &'static str;
    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()>;
}

/// Validates cell/pixel geometry and emits the frame prologue. Returns
/// `None` when the frame should be skipped (zero size or a buffer that does
/// not match the renderer's pixels-per-cell grid).
pub fn frame_begin(
    frame: &Frame<'_>,
    px_w_mul: usize,
    px_h_mul: usize,
    out: &mut dyn Write,
) -> anyhow::Result<Option<(usize, usize, usize, usize)>> {
    let cols = frame.term_cols as usize;
    let visual_rows = frame.visual_rows as usize;
    let w = frame.pixel_width;
    let h = frame.pixel_height;

    if cols == 0 || visual_rows == 0 || w == 0 || h == 0 {
        return Ok(None);
    }
    if w != cols.saturating_mul(px_w_mul) || h != visual_rows.saturating_mul(px_h_mul) {
        // Mid-resize mismatch; skip instead of indexing out of bounds.
        return Ok(None);
    }
    if frame.pixels_rgba.len() < w.saturating_mul(h).saturating_mul(4) {
        return Ok(None);
    }

    if frame.sync_updates {
        out.write_all(b"\x1b[?2026h")?;
    }
    // Home, reset, and autowrap off while painting full-width rows; some
    // terminals wrap on the last column otherwise and leave visible gaps.
    out.write_all(b"\x1b[H\x1b[0m\x1b[?7l")?;

    Ok(Some((cols, visual_rows, w, h)))
}

/// HUD lines, notice banner, overlay, frame epilogue.
pub fn frame_end(
    frame: &Frame<'_>,
    cols: usize,
    visual_rows: usize,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut hud_lines = frame.hud.lines();
    for i in 0..(frame.hud_rows as usize) {
        write!(out, "\x1b[{};1H\x1b[0m\x1b[2K", visual_rows + i + 1)?;
        if let Some(mut line) = hud_lines.next() {
            if line.len() > cols {
                line = &line[..cols];
            }
            write!(out, "{line}")?;
        }
    }

    if let Some(text) = frame.notice {
        draw_notice_banner(out, frame.term_cols, text)?;
    }
    if let Some(text) = frame.overlay {
        draw_overlay(out, frame.term_cols, frame.term_rows, text)?;
    }

    out.write_all(b"\x1b[?7h")?;
    if frame.sync_updates {
        out.write_all(b"\x1b[?2026l")?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_fg_rgb(out: &mut dyn Write, r: u8, g: u8, b: u8) -> anyhow::Result<()> {
    write!(out, "\x1b[38;2;{};{};{}m", r, g, b)?;
    Ok(())
}

pub fn write_bg_rgb(out: &mut dyn Write, r: u8, g: u8, b: u8) -> anyhow::Result<()> {
    write!(out, "\x1b[48;2;{};{};{}m", r, g, b)?;
    Ok(())
}

#[inline]
pub fn luma_u8(r: u8, g: u8, b: u8) -> u8 {
    // Approx Rec.709 luma in integer math.
    ((r as u32 * 54 + g as u32 * 183 + b as u32 * 19) >> 8) as u8
}

/// Single centered line near the top edge, amber on dark.
fn draw_notice_banner(out: &mut dyn Write, term_cols: u16, text: &str) -> anyhow::Result<()> {
    let cols = term_cols as usize;
    if cols < 8 {
        return Ok(());
    }
    let line = text.lines().next().unwrap_or("");
    let shown: String = line.chars().take(cols.saturating_sub(4)).collect();
    let len = shown.chars().count();
    let col = (cols.saturating_sub(len + 2)) / 2 + 1;

    write!(
        out,
        "\x1b[2;{}H\x1b[0m\x1b[38;2;255;220;140m\x1b[48;2;24;12;4m {} \x1b[0m",
        col, shown
    )?;
    Ok(())
}

/// Centered boxed popup over a dimmed backdrop. Used only for the
/// pre-gesture start screen, so it stays simpler than a scrolling pager.
fn draw_overlay(
    out: &mut dyn Write,
    term_cols: u16,
    term_rows: u16,
    text: &str,
) -> anyhow::Result<()> {
    let cols = term_cols as usize;
    let rows = term_rows as usize;
    if cols < 12 || rows < 5 {
        return Ok(());
    }

    let max_inner = cols.saturating_sub(8).max(1);
    let lines: Vec<String> = text
        .lines()
        .map(|l| l.chars().take(max_inner).collect())
        .collect();
    if lines.is_empty() {
        return Ok(());
    }

    let inner_w = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(1)
        .max(1);
    let box_w = (inner_w + 4).min(cols.saturating_sub(2));
    let inner_w = box_w.saturating_sub(4);
    let body_h = lines.len().min(rows.saturating_sub(4));
    let start_col = (cols.saturating_sub(box_w)) / 2 + 1;
    let start_row = (rows.saturating_sub(body_h + 2)) / 2 + 1;

    out.write_all(b"\x1b[0m\x1b[38;2;214;222;240m\x1b[48;2;3;4;10m")?;
    for row in 1..=rows {
        write!(out, "\x1b[{};1H\x1b[2K", row)?;
    }

    let horiz = "-".repeat(box_w.saturating_sub(2));
    out.write_all(b"\x1b[38;2;240;200;255m\x1b[48;2;12;8;20m")?;
    write!(out, "\x1b[{};{}H+{}+", start_row, start_col, horiz)?;
    for (i, line) in lines.iter().take(body_h).enumerate() {
        let row = start_row + 1 + i;
        let pad = inner_w.saturating_sub(line.chars().count());
        write!(out, "\x1b[{};{}H| {}{} |", row, start_col, line, " ".repeat(pad))?;
    }
    write!(out, "\x1b[{};{}H+{}+", start_row + body_h + 1, start_col, horiz)?;
    out.write_all(b"\x1b[0m")?;
    Ok(())
}
