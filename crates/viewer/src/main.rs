//! Fluid surface viewer.
//!
//! Usage: `fluid_viewer [config.json] [particle_count]`

use std::path::PathBuf;

use fluid_surface::RenderConfig;
use viewer::ViewerOptions;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let mut options = ViewerOptions::default();
    if let Some(path) = args.next().map(PathBuf::from) {
        options.config = RenderConfig::load_json(&path)?;
        log::info!("Loaded render config from {}", path.display());
    }
    if let Some(count) = args.next() {
        options.particle_count = count.parse()?;
    }
    options.config.validate()?;

    viewer::run(options)?;
    Ok(())
}
