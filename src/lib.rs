// THEORY:
// This file is the main entry point for the `mosaic_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (like the `visual_tester` camera
// front-end).
//
// The primary goal is to export the `MosaicPipeline` and the raw `transform` as the
// high-level interface of the engine. Frames, tiles and the grid live in
// `core_modules`; `pipeline` adds the capture-loop state around them and
// `parallel_pipeline` adds an asynchronous worker pool for throughput.

pub mod core_modules;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::error::{MosaicError, Result};
pub use core_modules::frame::{Frame, FrameLayout};
pub use core_modules::mosaic::{MosaicMode, transform, transform_parallel};
pub use core_modules::tile_grid::TileGrid;
pub use parallel_pipeline::ParallelPipeline;
pub use pipeline::{Control, EffectState, FrameSink, FrameSource, MosaicPipeline, PipelineConfig};
