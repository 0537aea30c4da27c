//! FileSink - writes frames to disk with a per-run folder structure
//!
//! Layout:
//!
//! ```text
//! <base_path>/run_<YYYYMMDD_HHMMSS>/
//!     index.jsonl             one line of stamp metadata per frame
//!     <camera_id>/<seq>.png   decoded image files
//! ```

use contracts::{ContractError, FrameSink, PixelFormat, StampSource, StampedFrame};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory, a timestamped run directory is created inside
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./captures"));

        Self { base_path }
    }
}

/// One line of the per-run index
#[derive(Debug, Serialize)]
struct IndexRecord {
    seq: u64,
    timestamp: f64,
    stamp_source: StampSource,
    trigger_counter: Option<u32>,
    trigger_latency: Option<f64>,
    adopted_baseline: bool,
    queue_depth: usize,
    file: String,
}

/// Sink that writes frames to disk files
pub struct FileSink {
    name: String,
    run_dir: PathBuf,
    index: File,
    created_dirs: HashSet<PathBuf>,
}

impl FileSink {
    /// Create a new FileSink
    ///
    /// Opens a fresh run directory named after the local start time.
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        let run_dir = config
            .base_path
            .join(format!("run_{}", chrono::Local::now().format("%Y%m%d_%H%M%S")));
        fs::create_dir_all(&run_dir)?;

        let index = OpenOptions::new()
            .create(true)
            .append(true)
            .open(run_dir.join("index.jsonl"))?;

        Ok(Self {
            name: name.into(),
            run_dir,
            index,
            created_dirs: HashSet::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params);
        Self::new(name, config)
    }

    /// Run directory this sink writes into
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    fn write_frame_to_disk(&mut self, frame: &StampedFrame) -> std::io::Result<()> {
        let image_rel = self.save_image(frame)?;

        let record = IndexRecord {
            seq: frame.seq,
            timestamp: frame.timestamp,
            stamp_source: frame.stamp_source,
            trigger_counter: frame.sync_meta.trigger_counter,
            trigger_latency: frame.sync_meta.trigger_latency,
            adopted_baseline: frame.sync_meta.adopted_baseline,
            queue_depth: frame.sync_meta.queue_depth,
            file: image_rel,
        };
        let line = serde_json::to_string(&record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.index, "{line}")?;

        Ok(())
    }

    fn save_image(&mut self, frame: &StampedFrame) -> std::io::Result<String> {
        let camera_dir = self.run_dir.join(frame.info.camera_id.as_str());
        if !self.created_dirs.contains(&camera_dir) {
            fs::create_dir_all(&camera_dir)?;
            self.created_dirs.insert(camera_dir.clone());
        }

        let filename = format!("{:08}.png", frame.seq);
        let path = camera_dir.join(&filename);

        match frame.pixel_format {
            PixelFormat::Rgb8 => image::save_buffer(
                &path,
                &frame.data,
                frame.width,
                frame.height,
                image::ColorType::Rgb8,
            )
            .map_err(std::io::Error::other)?,

            PixelFormat::Bgr8 => {
                let mut rgb = frame.data.to_vec();
                for px in rgb.chunks_exact_mut(3) {
                    px.swap(0, 2); // Swap B and R
                }
                image::save_buffer(&path, &rgb, frame.width, frame.height, image::ColorType::Rgb8)
                    .map_err(std::io::Error::other)?;
            }

            // Bayer mosaic is stored undemosaiced, one byte per pixel
            PixelFormat::Mono8 | PixelFormat::BayerRg8 => image::save_buffer(
                &path,
                &frame.data,
                frame.width,
                frame.height,
                image::ColorType::L8,
            )
            .map_err(std::io::Error::other)?,
        }

        Ok(format!("{}/{}", frame.info.camera_id, filename))
    }

    fn persist_frame(&mut self, frame: &StampedFrame) -> Result<(), ContractError> {
        self.write_frame_to_disk(frame).map_err(|e| {
            error!(sink = %self.name, seq = frame.seq, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

impl FrameSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, frame),
        fields(sink = %self.name, seq = frame.seq)
    )]
    async fn write(&mut self, frame: &StampedFrame) -> Result<(), ContractError> {
        self.persist_frame(frame)?;
        Ok(())
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.index
            .flush()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, run_dir = %self.run_dir.display(), "FileSink closed");
        Ok(())
    }
}
