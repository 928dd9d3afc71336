use crate::render::{frame_begin, frame_end, write_bg_rgb, write_fg_rgb, Frame, Renderer};
use std::io::Write;

/// Eight pixels per cell (2x4 braille dots). Dots above the cell's local
/// luma midpoint light up in the averaged "on" color over the averaged
/// "off" color.
pub struct BrailleRenderer {
    last_fg: Option<(u8, u8, u8)>,
    last_bg: Option<(u8, u8, u8)>,
}

impl BrailleRenderer {
    pub fn new() -> Self {
        Self {
            last_fg: None,
            last_bg: None,
        }
    }
}

impl Default for BrailleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for BrailleRenderer {
    fn name(&self) -> &'static str {
        "braille"
    }

    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let Some((cols, visual_rows, w, _h)) = frame_begin(frame, 2, 4, out)? else {
            return Ok(());
        };

        self.last_fg = None;
        self.last_bg = None;

        // Dot order: (0,0) (0,1) (0,2) (1,0) (1,1) (1,2) (0,3) (1,3)
        const DOT_BITS: [u8; 8] = [0x01, 0x08, 0x02, 0x10, 0x04, 0x20, 0x40, 0x80];

        for row in 0..visual_rows {
            let base_y = row * 4;
            for col in 0..cols {
                let base_x = col * 2;

                let mut lum = [0u16; 8];
                let mut rgb = [(0u8, 0u8, 0u8); 8];
                for dy in 0..4usize {
                    for dx in 0..2usize {
                        let k = dy * 2 + dx;
                        let i = ((base_y + dy) * w + base_x + dx) * 4;
                        let r = frame.pixels_rgba[i];
                        let g = frame.pixels_rgba[i + 1];
                        let b = frame.pixels_rgba[i + 2];
                        rgb[k] = (r, g, b);
                        lum[k] = luma_u16(r, g, b);
                    }
                }

                let min_l = *lum.iter().min().unwrap_or(&0);
                let max_l = *lum.iter().max().unwrap_or(&0);
                let thr = (min_l + max_l) / 2;

                let mut bits = 0u8;
                let mut on = ColorAcc::default();
                let mut off = ColorAcc::default();
                for k in 0..8usize {
                    if lum[k] > thr {
                        bits |= DOT_BITS[k];
                        on.add(rgb[k]);
                    } else {
                        off.add(rgb[k]);
                    }
                }

                let (fg, bg, ch) = if bits == 0 {
                    let c = off.mean().unwrap_or((0, 0, 0));
                    (c, c, ' ')
                } else {
                    let fg = on.mean().unwrap_or((0, 0, 0));
                    let bg = off.mean().unwrap_or(fg);
                    let ch = char::from_u32(0x2800 + bits as u32).unwrap_or(' ');
                    (fg, bg, ch)
                };

                if self.last_fg != Some(fg) {
                    write_fg_rgb(out, fg.0, fg.1, fg.2)?;
                    self.last_fg = Some(fg);
                }
                if self.last_bg != Some(bg) {
                    write_bg_rgb(out, bg.0, bg.1, bg.2)?;
                    self.last_bg = Some(bg);
                }
                write!(out, "{ch}")?;
            }
            out.write_all(b"\r\n")?;
        }

        frame_end(frame, cols, visual_rows, out)
    }
}

#[derive(Default)]
struct ColorAcc {
    r: u32,
    g: u32,
    b: u32,
    n: u32,
}

impl ColorAcc {
    fn add(&mut self, c: (u8, u8, u8)) {
        self.r += c.0 as u32;
        self.g += c.1 as u32;
        self.b += c.2 as u32;
        self.n += 1;
    }

    fn mean(&self) -> Option<(u8, u8, u8)> {
        if self.n == 0 {
            return None;
        }
        Some((
            (self.r / self.n) as u8,
            (self.g / self.n) as u8,
            (self.b / self.n) as u8,
        ))
    }
}

#[inline]
fn luma_u16(r: u8, g: u8, b: u8) -> u16 {
    ((r as u32 * 54 + g as u32 * 183 + b as u32 * 19) >> 8) as u16
}
