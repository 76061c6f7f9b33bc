// THEORY:
// The `pipeline` module is the top-level API of the mosaic engine. It wraps the pure
// transform in the state a live video loop needs: a tile configuration, the
// runtime toggle, and one destination frame that is reused for every capture.
//
// Key architectural principles:
// 1.  **Caller-Owned Toggle**: `EffectState` lives here, in the loop state, and is
//     passed into the transform as a plain `bool` on every frame. The transform never
//     stores or flips it.
// 2.  **One Destination**: The output frame is allocated on the first capture and
//     reused until the incoming geometry changes. It is zeroed on allocation, so the
//     uncovered remainder strips read as black unless `copy_remainder` asks for the
//     source pixels to be carried over.
// 3.  **Black-Box Collaborators**: Cameras and windows are reached only through the
//     `FrameSource` and `FrameSink` traits. `run` is the classic capture, transform,
//     present loop; the sink reports the key pressed while presenting, which either
//     toggles the effect or ends the loop.

use crate::core_modules::error::{MosaicError, Result};
use crate::core_modules::frame::Frame;
use crate::core_modules::mosaic::{self, MosaicMode};
use tracing::{debug, info, warn};

pub const DEFAULT_TILE_WIDTH: usize = 16;
pub const DEFAULT_TILE_HEIGHT: usize = 12;

/// Configuration for the MosaicPipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// The width of a single tile in pixels.
    pub tile_width: usize,
    /// The height of a single tile in pixels.
    pub tile_height: usize,
    /// Whether the effect starts enabled.
    pub enabled: bool,
    /// Threads used per frame. `1` runs sequentially, `0` uses every logical CPU.
    pub workers: usize,
    /// Copy source pixels into the strips no tile covers instead of leaving them as-is.
    pub copy_remainder: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_WIDTH,
            tile_height: DEFAULT_TILE_HEIGHT,
            enabled: true,
            workers: 1,
            copy_remainder: false,
        }
    }
}

impl PipelineConfig {
    /// Rejects settings that can never produce a tile grid.
    pub fn validate(&self) -> Result<()> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(MosaicError::invalid_argument(format!(
                "tile size must be positive, got {}x{}",
                self.tile_width, self.tile_height
            )));
        }
        Ok(())
    }
}

/// The runtime on/off switch of the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectState {
    enabled: bool,
}

impl Default for EffectState {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl EffectState {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mode(&self) -> MosaicMode {
        MosaicMode::from(self.enabled)
    }

    pub fn set(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Flips the switch and returns the new value.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }
}

/// What the loop should do after a frame has been presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    ToggleEffect,
    Exit,
}

/// Produces one frame per call, blocking until it is available.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame>;
}

/// Presents one frame and reports the user input seen meanwhile.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame) -> Result<Control>;
}

/// Applies `config` to one frame: optional remainder copy, then the sequential or
/// banded transform.
pub(crate) fn render_frame(
    config: &PipelineConfig,
    enabled: bool,
    source: &Frame,
    destination: &mut Frame,
) -> Result<()> {
    let (tile_width, tile_height) = (config.tile_width, config.tile_height);

    if config.copy_remainder {
        mosaic::copy_remainder(source, destination, tile_width, tile_height)?;
    }

    match config.workers {
        1 => mosaic::transform(source, destination, tile_width, tile_height, enabled),
        workers => mosaic::transform_parallel(source, destination, tile_width, tile_height, enabled, workers),
    }
}

/// The main, top-level struct for the mosaic engine.
pub struct MosaicPipeline {
    config: PipelineConfig,
    effect: EffectState,
    destination: Option<Frame>,
    frames_processed: u64,
}

impl MosaicPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            effect: EffectState::new(config.enabled),
            config,
            destination: None,
            frames_processed: 0,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn effect(&self) -> EffectState {
        self.effect
    }

    pub fn effect_mut(&mut self) -> &mut EffectState {
        &mut self.effect
    }

    pub fn toggle_effect(&mut self) -> bool {
        let enabled = self.effect.toggle();
        info!(mode = %self.effect.mode(), "effect toggled");
        enabled
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// The output of the most recent successful `process_frame`.
    pub fn last_output(&self) -> Option<&Frame> {
        self.destination.as_ref()
    }

    /// Runs the transform on `source` and returns the reused destination frame.
    pub fn process_frame(&mut self, source: &Frame) -> Result<&Frame> {
        let layout = source.layout();

        let mut destination = match self.destination.take() {
            Some(frame) if frame.layout().same_geometry(&layout) => frame,
            previous => {
                if let Some(previous) = previous {
                    warn!(
                        from = ?previous.layout(),
                        to = ?layout,
                        "frame geometry changed, reallocating destination"
                    );
                }
                Frame::new(layout.to_packed()?)
            }
        };

        let outcome = render_frame(&self.config, self.effect.is_enabled(), source, &mut destination);
        let destination = self.destination.insert(destination);
        outcome?;

        self.frames_processed += 1;
        debug!(
            frame = self.frames_processed,
            mode = %self.effect.mode(),
            "processed frame"
        );
        Ok(destination)
    }

    /// Captures, transforms and presents frames until the sink asks to exit.
    /// Returns the number of frames processed over the pipeline's lifetime.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<u64>
    where
        S: FrameSource,
        K: FrameSink,
    {
        info!(
            tile_width = self.config.tile_width,
            tile_height = self.config.tile_height,
            mode = %self.effect.mode(),
            "starting capture loop"
        );

        loop {
            let frame = source.next_frame()?;
            let output = self.process_frame(&frame)?;

            match sink.present(output)? {
                Control::Continue => {}
                Control::ToggleEffect => {
                    self.toggle_effect();
                }
                Control::Exit => break,
            }
        }

        info!(frames = self.frames_processed, "capture loop finished");
        Ok(self.frames_processed)
    }
}
