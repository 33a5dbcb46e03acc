//! Video capture through an `ffmpeg` subprocess.
//!
//! Frames are piped to ffmpeg's stdin as raw `rgb24` and encoded to H.264.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use ligature_core::error::SinkError;
use ligature_core::frame::Frame;
use ligature_core::traits::FrameSink;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// VideoConfig
// ---------------------------------------------------------------------------

/// Encoder settings.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoConfig {
    /// Encoder executable, looked up on `PATH` when relative.
    pub program: OsString,
    pub codec: String,
    /// Constant rate factor (lower is better quality).
    pub crf: u8,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".into(),
            codec: "libx264".into(),
            crf: 23,
        }
    }
}

/// Frame rate matching one control tick per frame.
pub fn playback_fps(time_step: f64, frame_skip: u32) -> f64 {
    1.0 / (time_step * f64::from(frame_skip))
}

// ---------------------------------------------------------------------------
// FfmpegWriter
// ---------------------------------------------------------------------------

/// A [`FrameSink`] that streams frames into an encoder process.
///
/// The encoder is started by [`open`](Self::open); failure to start it is
/// reported immediately. [`release`](FrameSink::release) closes the pipe and
/// waits for the encoder; dropping an unreleased writer does the same.
pub struct FfmpegWriter {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    width: u32,
    height: u32,
    frames: u64,
}

impl FfmpegWriter {
    /// Start encoding `width`×`height` frames at `fps` into `path`.
    pub fn open(path: impl AsRef<Path>, width: u32, height: u32, fps: f64) -> Result<Self, SinkError> {
        Self::with_config(&VideoConfig::default(), path, width, height, fps)
    }

    pub fn with_config(
        config: &VideoConfig,
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let mut child = Command::new(&config.program)
            .args(["-y", "-loglevel", "error", "-nostats"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", &format!("{fps}")])
            .args(["-i", "-"])
            .args(["-c:v", &config.codec, "-pix_fmt", "yuv420p"])
            .args(["-crf", &config.crf.to_string()])
            .arg(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SinkError::Encoder(format!(
                    "failed to start {}: {e}",
                    config.program.to_string_lossy()
                ))
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SinkError::Encoder("encoder stdin unavailable".into()))?;
        info!(path = %path.display(), width, height, fps, "video recording started");
        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            path,
            width,
            height,
            frames: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn is_released(&self) -> bool {
        self.child.is_none()
    }
}

impl FrameSink for FfmpegWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), SinkError> {
        let stdin = self.stdin.as_mut().ok_or(SinkError::Released)?;
        if frame.width() != self.width || frame.height() != self.height {
            return Err(SinkError::SizeMismatch {
                width: self.width,
                height: self.height,
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }
        stdin.write_all(frame.data())?;
        self.frames += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<(), SinkError> {
        // Closing stdin signals end of input.
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(SinkError::Encoder(format!(
                "encoder exited with {status}: {}",
                stderr.trim()
            )));
        }
        debug!(path = %self.path.display(), frames = self.frames, "video finalized");
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to finalize video on drop");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
