use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cfg = kaleido_viewer::config::Config::parse();
    if cfg.list_output_devices {
        kaleido_viewer::audio::list_output_devices()?;
        return Ok(());
    }

    kaleido_viewer::app::run(cfg)
}
