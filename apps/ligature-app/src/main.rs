//! Operator console for the ligating-loop simulation.
//!
//! Drives the scene from a gamepad at real-time pace, optionally recording
//! a video of the rendered scene and the full per-tick trajectory.
//!
//! ```text
//! ligating-console [--record-video] [--record-trajectory] [--info <TEXT>]
//! ```
//!
//! The `gamepad` feature (on by default) provides the physical controller;
//! `--no-default-features` builds without it and always exits at start-up.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ligature_console::prelude::*;
use ligature_core::prelude::*;
use ligature_record::prelude::*;
use ligature_scene::LigatingLoopEnv;
use ligature_teleop::{Controller, open_gamepad};

const VIDEO_DIR: &str = "videos";
const TRAJECTORY_DIR: &str = "trajectories";

/// Streams compressed on disk.
const COMPRESSED_STREAMS: [&str; 11] = [
    "observation",
    "terminal_observation",
    "rgb",
    "info",
    "loop_tpsdc_state",
    "loop_tpsdc_velocity",
    "loop_pose",
    "cavity_tracking_positions",
    "marking_tracking_positions",
    "loop_tracking_positions",
    "time",
];

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Drive the ligating-loop scene with a game controller.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Record a video of the episode under `videos/`.
    #[arg(short = 'v', long)]
    record_video: bool,

    /// Record the full trajectory under `trajectories/`.
    #[arg(short = 't', long)]
    record_trajectory: bool,

    /// Free-text note stored in the trajectory metadata.
    #[arg(short, long)]
    info: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let controller = open_gamepad().context("could not find a game controller")?;

    let scene = SceneConfig::default();
    let env = LigatingLoopEnv::new(scene.clone()).context("failed to build the scene")?;
    let env = RealtimeWrapper::new(env);

    let video = if cli.record_video {
        Some(open_video(&scene)?)
    } else {
        None
    };

    let report = if cli.record_trajectory {
        let metadata = episode_metadata(&env, cli.info.as_deref());
        let config = RecorderConfig::new(TRAJECTORY_DIR)
            .with_metadata(metadata)
            .with_store_info(true)
            .with_compressed(COMPRESSED_STREAMS);
        let recorder = TrajectoryRecorder::new(env, config)
            .context("failed to set up trajectory recording")?
            .with_handlers(scene_handlers(), HandlerPhases::Both);
        run_session(recorder, controller, video)?
    } else {
        run_session(env, controller, video)?
    };

    info!(
        outcome = ?report.outcome,
        ticks = report.ticks,
        frames = report.frames_written,
        reward = report.total_reward,
        "session finished"
    );
    Ok(())
}

fn run_session<E, C>(env: E, controller: C, video: Option<Box<dyn FrameSink>>) -> Result<SessionReport>
where
    E: Environment,
    C: Controller,
{
    let mut session = ControlLoop::new(env, controller, SessionOptions::default());
    if let Some(sink) = video {
        session = session.with_video(sink);
    }
    session.run().context("operator session failed")
}

/// Start the encoder for `videos/<timestamp>.mp4`.
fn open_video(scene: &SceneConfig) -> Result<Box<dyn FrameSink>> {
    fs::create_dir_all(VIDEO_DIR).with_context(|| format!("failed to create {VIDEO_DIR}/"))?;
    let path = video_path(Path::new(VIDEO_DIR));
    let [width, height] = scene.image_shape;
    let fps = playback_fps(scene.time_step, scene.frame_skip);
    let writer = FfmpegWriter::open(&path, width, height, fps)
        .with_context(|| format!("failed to start video encoder for {}", path.display()))?;
    Ok(Box::new(writer))
}

fn video_path(dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    dir.join(format!("{stamp}.mp4"))
}

fn episode_metadata<E: Environment>(env: &E, user_info: Option<&str>) -> EpisodeMetadata {
    EpisodeMetadata::new()
        .with("frame_skip", env.frame_skip())
        .with("time_step", env.time_step())
        .with("observation_type", env.observation_type())
        .with("reward_amount_dict", env.reward_amount_dict())
        .with("user_info", user_info)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn short_and_long_flags() {
        let cli = Cli::try_parse_from(["ligating-console", "-v", "-t", "-i", "left hand"]).unwrap();
        assert!(cli.record_video);
        assert!(cli.record_trajectory);
        assert_eq!(cli.info.as_deref(), Some("left hand"));

        let cli = Cli::try_parse_from(["ligating-console", "--record-trajectory"]).unwrap();
        assert!(!cli.record_video);
        assert!(cli.record_trajectory);
        assert!(cli.info.is_none());
    }

    #[test]
    fn default_build_has_a_controller_backend() {
        assert!(cfg!(feature = "gamepad"));
    }

    #[test]
    fn no_other_options() {
        assert!(Cli::try_parse_from(["ligating-console", "--seed", "3"]).is_err());
    }

    #[test]
    fn compressed_streams_match_recorder_streams() {
        for name in COMPRESSED_STREAMS {
            assert!(
                [
                    streams::OBSERVATION,
                    streams::TERMINAL_OBSERVATION,
                    streams::INFO,
                    streams::RGB,
                    streams::LOOP_TPSDC_STATE,
                    streams::LOOP_POSE,
                    streams::LOOP_TPSDC_VELOCITY,
                    streams::CAVITY_TRACKING_POSITIONS,
                    streams::MARKING_TRACKING_POSITIONS,
                    streams::LOOP_TRACKING_POSITIONS,
                    streams::TIME,
                ]
                .contains(&name),
                "{name}"
            );
        }
    }

    #[test]
    fn metadata_carries_scene_facts() {
        let env = LigatingLoopEnv::new(SceneConfig::default()).unwrap();
        let meta = episode_metadata(&env, Some("note"));
        assert_eq!(meta.len(), 5);
        assert_eq!(meta.get("frame_skip").and_then(|v| v.as_u64()), Some(1));
        assert_eq!(meta.get("observation_type").and_then(|v| v.as_str()), Some("STATE"));
        assert_eq!(meta.get("user_info").and_then(|v| v.as_str()), Some("note"));
        assert!(meta.get("reward_amount_dict").is_some_and(|v| v.is_object()));

        let meta = episode_metadata(&env, None);
        assert!(meta.get("user_info").is_some_and(|v| v.is_null()));
    }

    #[test]
    fn video_path_is_timestamped_mp4() {
        let path = video_path(Path::new("videos"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp4"));
        assert!(path.starts_with("videos"));
    }
}
