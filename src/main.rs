//! # Voxel Sandbox Entry Point
//!
//! Runs a headless session of the sandbox. It simply calls into the library's `run()`.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release
//! ```

fn main() {
    voxel_sandbox::run();
}
