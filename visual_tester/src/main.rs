use anyhow::{Context, bail};
use clap::Parser;
use mosaic_vision::{
    Control, Frame, FrameSink, FrameSource, MosaicError, MosaicPipeline, PipelineConfig,
};
use opencv::{
    core::{self, Mat, Scalar},
    highgui,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

const WINDOW_NAME: &str = "cam";
const KEY_ESCAPE: i32 = 0x1b;
const KEY_TOGGLE: i32 = b'e' as i32;

/// Live mosaic preview: ESC quits, `e` switches between mosaic and copy.
#[derive(Parser, Debug)]
#[command(name = "visual_tester")]
#[command(version, about, long_about = None)]
struct Args {
    /// Camera index to open
    #[arg(short, long, default_value = "0")]
    device: i32,

    /// Read frames from a video file instead of a camera
    #[arg(short, long)]
    input: Option<String>,

    /// Tile width in pixels
    #[arg(short = 'W', long, default_value = "16")]
    tile_width: usize,

    /// Tile height in pixels
    #[arg(short = 'H', long, default_value = "12")]
    tile_height: usize,

    /// Start with the effect switched off
    #[arg(long)]
    disabled: bool,

    /// Threads per frame (0 = one per CPU)
    #[arg(short, long, default_value = "1")]
    workers: usize,

    /// Show source pixels in the strips no tile covers
    #[arg(long)]
    copy_remainder: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            enabled: !self.disabled,
            workers: self.workers,
            copy_remainder: self.copy_remainder,
        }
    }
}

/// Frames from an OpenCV capture device or video file.
struct CameraSource {
    capture: VideoCapture,
    mat: Mat,
    exhausted: bool,
}

impl CameraSource {
    fn open(args: &Args) -> anyhow::Result<Self> {
        let capture = match &args.input {
            Some(path) => VideoCapture::from_file(path, videoio::CAP_ANY)
                .with_context(|| format!("failed to open video file {path}"))?,
            None => VideoCapture::new(args.device, videoio::CAP_ANY)
                .with_context(|| format!("failed to open camera {}", args.device))?,
        };

        if !capture.is_opened()? {
            bail!("capture device is not available");
        }

        Ok(Self {
            capture,
            mat: Mat::default(),
            exhausted: false,
        })
    }

    /// True once the device or file stopped producing frames.
    fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn grab(&mut self) -> mosaic_vision::Result<Option<Frame>> {
        let device_error = |e: opencv::Error| MosaicError::Source(e.to_string());

        if !self.capture.read(&mut self.mat).map_err(device_error)? || self.mat.empty() {
            self.exhausted = true;
            return Ok(None);
        }
        if self.mat.depth() != core::CV_8U {
            return Err(MosaicError::invalid_argument(format!(
                "expected 8-bit frames, got depth {}",
                self.mat.depth()
            )));
        }
        if !self.mat.is_continuous() {
            self.mat = self.mat.try_clone().map_err(device_error)?;
        }

        let width = self.mat.cols() as usize;
        let height = self.mat.rows() as usize;
        let channels = self.mat.channels() as usize;
        let row_stride = self.mat.step1(0).map_err(device_error)?;
        let data = self.mat.data_bytes().map_err(device_error)?.to_vec();

        // Layout rejections (e.g. a grayscale camera) surface as-is, not as a source failure.
        Frame::from_raw(width, height, channels, row_stride, data).map(Some)
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> mosaic_vision::Result<Frame> {
        self.grab()?
            .ok_or_else(|| MosaicError::Source("end of stream".to_string()))
    }
}

/// Shows frames in a HighGUI window and polls the keyboard.
struct WindowSink {
    name: &'static str,
    mat: Mat,
}

impl WindowSink {
    fn open(name: &'static str) -> anyhow::Result<Self> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("failed to create window {name}"))?;
        Ok(Self {
            name,
            mat: Mat::default(),
        })
    }

    fn show(&mut self, frame: &Frame) -> opencv::Result<Control> {
        let rows = frame.height() as i32;
        let cols = frame.width() as i32;
        let typ = core::CV_MAKETYPE(core::CV_8U, frame.channels() as i32);

        if self.mat.rows() != rows || self.mat.cols() != cols || self.mat.typ() != typ {
            self.mat = Mat::new_rows_cols_with_default(rows, cols, typ, Scalar::all(0.0))?;
        }

        let layout = frame.layout();
        let row_bytes = layout.row_bytes();
        let target = self.mat.data_bytes_mut()?;
        for y in 0..frame.height() {
            let start = layout.offset(0, y, 0);
            target[y * row_bytes..(y + 1) * row_bytes]
                .copy_from_slice(&frame.data()[start..start + row_bytes]);
        }

        highgui::imshow(self.name, &self.mat)?;

        Ok(match highgui::wait_key(1)? {
            KEY_ESCAPE => Control::Exit,
            KEY_TOGGLE => Control::ToggleEffect,
            _ => Control::Continue,
        })
    }
}

impl FrameSink for WindowSink {
    fn present(&mut self, frame: &Frame) -> mosaic_vision::Result<Control> {
        self.show(frame).map_err(|e| MosaicError::Sink(e.to_string()))
    }
}

impl Drop for WindowSink {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(self.name);
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    let config = args.pipeline_config();
    config.validate().context("invalid tile configuration")?;

    let mut source = CameraSource::open(&args)?;
    let mut sink = WindowSink::open(WINDOW_NAME)?;
    let mut pipeline = MosaicPipeline::new(config);

    info!("press ESC to quit, 'e' to toggle the mosaic");

    match pipeline.run(&mut source, &mut sink) {
        Ok(frames) => info!(frames, "exit requested"),
        Err(MosaicError::Source(reason)) if source.is_exhausted() => {
            warn!(frames = pipeline.frames_processed(), %reason, "capture ended")
        }
        Err(e) => return Err(e).context("mosaic loop failed"),
    }

    Ok(())
}
