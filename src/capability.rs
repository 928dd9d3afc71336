use crate::config::RendererMode;

/// What the probe decided and why; `notes` feed the transient HUD notice so
/// a silent downgrade is still visible to the user.
#[derive(Debug, Clone)]
pub struct CapabilityReport {
    pub auto_probe: bool,
    pub requested_renderer: RendererMode,
    pub renderer: RendererMode,
    notes: Vec<String>,
}

impl CapabilityReport {
    pub fn changed(&self) -> bool {
        self.renderer != self.requested_renderer
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    fn record_fallback(&mut self, to: RendererMode, reason: impl Into<String>) {
        self.renderer = to;
        self.notes.push(reason.into());
    }
}

pub fn probe_runtime(requested_renderer: RendererMode, auto_probe: bool) -> CapabilityReport {
    let mut report = CapabilityReport {
        auto_probe,
        requested_renderer,
        renderer: requested_renderer,
        notes: Vec::new(),
    };

    if !auto_probe {
        return report;
    }

    if requested_renderer == RendererMode::Braille && !utf8_locale() {
        report.record_fallback(
            RendererMode::HalfBlock,
            "locale is not UTF-8; falling back to half-block renderer",
        );
    }

    if report.renderer != RendererMode::Ascii && !truecolor_available() {
        // Half-block and braille both lean on 24-bit color pairs; without
        // them the ascii ramp reads better than quantized blocks.
        report.record_fallback(
            RendererMode::Ascii,
            "terminal does not advertise truecolor; falling back to ascii renderer",
        );
    }

    report
}

fn truecolor_available() -> bool {
    if let Ok(v) = std::env::var("KALEIDO_FORCE_TRUECOLOR") {
        let s = v.trim().to_ascii_lowercase();
        if s == "1" || s == "true" || s == "yes" || s == "on" {
            return true;
        }
        if s == "0" || s == "false" || s == "no" || s == "off" {
            return false;
        }
    }

    let colorterm = std::env::var("COLORTERM")
        .unwrap_or_default()
        .to_ascii_lowercase();
    if colorterm.contains("truecolor") || colorterm.contains("24bit") {
        return true;
    }

    let term = std::env::var("TERM").unwrap_or_default().to_ascii_lowercase();
    term.contains("direct") || term.contains("kitty") || term.contains("ghostty")
}

fn utf8_locale() -> bool {
    for key in ["LC_ALL", "LC_CTYPE", "LANG"] {
        if let Ok(v) = std::env::var(key) {
            if !v.trim().is_empty() {
                return v.to_ascii_lowercase().contains("utf");
            }
        }
    }
    // No locale info at all: assume modern defaults.
    true
}
