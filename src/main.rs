//! # Rainbow Fluid
//!
//! Opens a window and runs the dye simulation in it. Move the mouse or drag
//! a finger to stir; click or tap for a burst. Space pauses, `S` toggles
//! shading.
//!
//! Set `RAINBOW_FLUID_CONFIG` to a RON file to override simulation settings,
//! and `RUST_LOG` for log output.

fn main() {
    if let Err(err) = rainbow_fluid::app::run() {
        eprintln!("rainbow-fluid: {}", err);
        std::process::exit(1);
    }
}
