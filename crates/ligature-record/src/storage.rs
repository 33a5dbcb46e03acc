//! MCAP episode files.
//!
//! One file holds one episode. Each stream becomes an MCAP channel whose
//! topic is the stream name:
//!
//! | Channel metadata | Meaning                                         |
//! |------------------|-------------------------------------------------|
//! | `compressed`     | `"true"` if every payload is zstd-compressed    |
//! | `dense`          | `"true"` if the stream has one value per tick   |
//!
//! Message `sequence` is the tick index and `log_time` the simulated tick
//! time in nanoseconds. Payloads are JSON-encoded [`StreamValue`]s, with
//! non-finite floats kept as bit patterns (see [`floats`](crate::floats)).
//! Files are written under a hidden `.partial` name and renamed into place
//! once complete.
//! Episode metadata is stored in a metadata record named `episode`, each
//! value JSON-encoded; a second record named `trajectory` carries the
//! format version and tick count.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use mcap::read::LinearReader;
use mcap::records::{MessageHeader, Metadata, Record};
use mcap::{MessageStream, WriteOptions};
use tracing::debug;

use crate::error::RecordError;
use crate::trajectory::Trajectory;
use crate::types::{EpisodeMetadata, StreamValue};

pub const FORMAT_VERSION: u32 = 1;
pub const FILE_EXTENSION: &str = "mcap";

const PROFILE: &str = "ligature-trajectory";
const EPISODE_RECORD: &str = "episode";
const TRAJECTORY_RECORD: &str = "trajectory";
const JSON_ENCODING: &str = "application/json";
const ZSTD_JSON_ENCODING: &str = "application/json+zstd";
const ZSTD_LEVEL: i32 = 3;
/// Suffix of in-progress episode files; never listed as episodes.
const PARTIAL_SUFFIX: &str = ".partial";

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write `trajectory` to a new file at `path`.
///
/// Streams named in `compressed` have each payload zstd-compressed. The file
/// must not exist yet. The episode only appears at `path` once it is
/// complete; on any error nothing is left behind.
pub fn write_trajectory(
    path: &Path,
    metadata: &EpisodeMetadata,
    trajectory: &Trajectory,
    compressed: &BTreeSet<String>,
    tick_period_ns: u64,
) -> Result<(), RecordError> {
    persist_new(path, |out| {
        write_episode(out, metadata, trajectory, compressed, tick_period_ns)
    })?;
    debug!(path = %path.display(), ticks = trajectory.ticks(), "trajectory written");
    Ok(())
}

/// Run `write` against a hidden temporary file next to `path`, then move it
/// into place without replacing an existing file.
fn persist_new<F>(path: &Path, write: F) -> Result<(), RecordError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), RecordError>,
{
    if path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )
        .into());
    }
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".episode-")
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(dir)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write(&mut out)?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(path).map_err(|e| RecordError::Io(e.error))?;
    Ok(())
}

fn write_episode<W: Write + Seek>(
    out: W,
    metadata: &EpisodeMetadata,
    trajectory: &Trajectory,
    compressed: &BTreeSet<String>,
    tick_period_ns: u64,
) -> Result<(), RecordError> {
    let mut writer = WriteOptions::new()
        .compression(None)
        .profile(PROFILE)
        .create(out)?;

    let mut episode = BTreeMap::new();
    for (key, value) in metadata.iter() {
        episode.insert(key.clone(), serde_json::to_string(value)?);
    }
    writer.write_metadata(&Metadata {
        name: EPISODE_RECORD.to_string(),
        metadata: episode,
    })?;
    writer.write_metadata(&Metadata {
        name: TRAJECTORY_RECORD.to_string(),
        metadata: BTreeMap::from([
            ("format_version".to_string(), FORMAT_VERSION.to_string()),
            ("ticks".to_string(), trajectory.ticks().to_string()),
            ("tick_period_ns".to_string(), tick_period_ns.to_string()),
        ]),
    })?;

    let schema_id = writer.add_schema("json", "jsonschema", &[])?;
    for (name, stream) in trajectory.streams() {
        let compress = compressed.contains(name);
        let encoding = if compress { ZSTD_JSON_ENCODING } else { JSON_ENCODING };
        let channel_meta = BTreeMap::from([
            ("compressed".to_string(), compress.to_string()),
            ("dense".to_string(), stream.is_dense().to_string()),
        ]);
        let channel_id = writer.add_channel(schema_id, name, encoding, &channel_meta)?;

        for (tick, value) in stream.entries() {
            let json = serde_json::to_vec(value)?;
            let payload = if compress {
                zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?
            } else {
                json
            };
            let time = u64::from(*tick).saturating_mul(tick_period_ns);
            writer.write_to_known_channel(
                &MessageHeader {
                    channel_id,
                    sequence: *tick,
                    log_time: time,
                    publish_time: time,
                },
                &payload,
            )?;
        }
    }

    writer.finish()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One stream as read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStream {
    pub compressed: bool,
    pub dense: bool,
    /// `(tick, value)` pairs in tick order.
    pub entries: Vec<(u32, StreamValue)>,
}

impl RecordedStream {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &StreamValue> {
        self.entries.iter().map(|(_, v)| v)
    }
}

/// A persisted episode loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTrajectory {
    pub path: PathBuf,
    pub metadata: EpisodeMetadata,
    pub ticks: u32,
    pub tick_period_ns: u64,
    pub streams: BTreeMap<String, RecordedStream>,
}

impl RecordedTrajectory {
    /// Load an episode file written by [`write_trajectory`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let malformed = |message: String| RecordError::Malformed {
            path: path.to_path_buf(),
            message,
        };

        let mut metadata = None;
        let mut summary = None;
        for record in LinearReader::new(&bytes)? {
            if let Record::Metadata(record) = record? {
                match record.name.as_str() {
                    EPISODE_RECORD => metadata = Some(record.metadata),
                    TRAJECTORY_RECORD => summary = Some(record.metadata),
                    _ => {}
                }
            }
        }
        let metadata = metadata.ok_or_else(|| malformed("missing episode metadata".into()))?;
        let summary = summary.ok_or_else(|| malformed("missing trajectory record".into()))?;

        let field = |key: &str| {
            summary
                .get(key)
                .ok_or_else(|| malformed(format!("missing '{key}'")))
        };
        let version: u32 = field("format_version")?
            .parse()
            .map_err(|e| malformed(format!("format_version: {e}")))?;
        if version != FORMAT_VERSION {
            return Err(malformed(format!("unsupported format version {version}")));
        }
        let ticks: u32 = field("ticks")?
            .parse()
            .map_err(|e| malformed(format!("ticks: {e}")))?;
        let tick_period_ns: u64 = field("tick_period_ns")?
            .parse()
            .map_err(|e| malformed(format!("tick_period_ns: {e}")))?;

        let metadata = metadata
            .into_iter()
            .map(|(key, raw)| Ok((key, serde_json::from_str::<serde_json::Value>(&raw)?)))
            .collect::<Result<EpisodeMetadata, RecordError>>()?;

        let mut streams: BTreeMap<String, RecordedStream> = BTreeMap::new();
        for message in MessageStream::new(&bytes)? {
            let message = message?;
            let channel = &message.channel;
            let flag = |key: &str| channel.metadata.get(key).is_some_and(|v| v == "true");
            let compressed = flag("compressed");

            let json: Cow<'_, [u8]> = if compressed {
                Cow::Owned(zstd::decode_all(&message.data[..])?)
            } else {
                Cow::Borrowed(&message.data[..])
            };
            let value: StreamValue = serde_json::from_slice(&json)?;

            streams
                .entry(channel.topic.clone())
                .or_insert_with(|| RecordedStream {
                    compressed,
                    dense: flag("dense"),
                    entries: Vec::new(),
                })
                .entries
                .push((message.sequence, value));
        }
        for stream in streams.values_mut() {
            stream.entries.sort_by_key(|(tick, _)| *tick);
        }

        Ok(Self {
            path: path.to_path_buf(),
            metadata,
            ticks,
            tick_period_ns,
            streams,
        })
    }

    pub fn stream(&self, name: &str) -> Option<&RecordedStream> {
        self.streams.get(name)
    }
}

/// List the episode files in `dir`, oldest first.
pub fn list_episodes(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, RecordError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == FILE_EXTENSION))
        .collect();
    paths.sort();
    Ok(paths)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Trajectory {
        let mut traj = Trajectory::new();
        for tick in 0..3_u32 {
            traj.begin_tick();
            traj.append("time", StreamValue::Scalar(f64::from(tick) / 30.0))
                .unwrap();
            traj.append("state", StreamValue::Vector(vec![0.1 * tick as f32, -1.5]))
                .unwrap();
            if tick == 2 {
                traj.append_sparse("terminal", StreamValue::Vector(vec![4.0]))
                    .unwrap();
            }
            traj.end_tick().unwrap();
        }
        traj
    }

    #[test]
    fn write_then_load_preserves_streams() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ep.mcap");
        let meta = EpisodeMetadata::new().with("time_step", 1.0 / 30.0);
        let compressed = BTreeSet::from(["state".to_string()]);
        let traj = sample();

        write_trajectory(&path, &meta, &traj, &compressed, 33_333_333).unwrap();
        let loaded = RecordedTrajectory::load(&path).unwrap();

        assert_eq!(loaded.ticks, 3);
        assert_eq!(loaded.tick_period_ns, 33_333_333);
        assert_eq!(loaded.metadata, meta);
        for (name, stream) in traj.streams() {
            let back = loaded.stream(name).unwrap();
            assert_eq!(back.entries, stream.entries());
            assert_eq!(back.dense, stream.is_dense());
            assert_eq!(back.compressed, name == "state");
        }
        assert_eq!(loaded.stream("terminal").unwrap().entries[0].0, 2);
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ep.mcap");
        fs::write(&path, b"keep me").unwrap();
        let err = write_trajectory(
            &path,
            &EpisodeMetadata::new(),
            &sample(),
            &BTreeSet::new(),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::Io(_)));
        assert_eq!(fs::read(&path).unwrap(), b"keep me");
    }

    /// Accepts `budget` bytes, then fails every write.
    struct FailingSink {
        inner: std::io::Cursor<Vec<u8>>,
        budget: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.len() > self.budget {
                return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
            }
            self.budget -= buf.len();
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FailingSink {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn interrupted_write_reports_error() {
        let sink = FailingSink {
            inner: std::io::Cursor::new(Vec::new()),
            budget: 64,
        };
        let result = write_episode(sink, &EpisodeMetadata::new(), &sample(), &BTreeSet::new(), 1);
        assert!(result.is_err());
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ep.mcap");

        let err = persist_new(&path, |out| {
            out.write_all(b"half an episode")?;
            Err(io::Error::new(io::ErrorKind::StorageFull, "disk full").into())
        })
        .unwrap_err();
        assert!(matches!(err, RecordError::Io(_)));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        write_trajectory(&path, &EpisodeMetadata::new(), &sample(), &BTreeSet::new(), 1)
            .unwrap();
        assert_eq!(RecordedTrajectory::load(&path).unwrap().ticks, 3);
        assert_eq!(list_episodes(dir.path()).unwrap(), vec![path]);
    }

    #[test]
    fn non_finite_values_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ep.mcap");
        let values = vec![1.0, f32::NAN, f32::INFINITY, f32::NEG_INFINITY, -0.0];
        let mut traj = Trajectory::new();
        traj.begin_tick();
        traj.append("raw", StreamValue::Vector(values.clone())).unwrap();
        traj.append("packed", StreamValue::Vector(values.clone())).unwrap();
        traj.append("t", StreamValue::Scalar(f64::NAN)).unwrap();
        traj.end_tick().unwrap();

        let compressed = BTreeSet::from(["packed".to_string()]);
        write_trajectory(&path, &EpisodeMetadata::new(), &traj, &compressed, 1).unwrap();
        let loaded = RecordedTrajectory::load(&path).unwrap();

        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        for name in ["raw", "packed"] {
            let back = loaded.stream(name).unwrap().entries[0].1.as_vector().unwrap();
            assert_eq!(bits(back), bits(&values), "{name}");
        }
        let t = loaded.stream("t").unwrap().entries[0].1.as_scalar().unwrap();
        assert_eq!(t.to_bits(), f64::NAN.to_bits());
    }

    #[test]
    fn list_episodes_filters_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.mcap"), b"").unwrap();
        fs::write(dir.path().join("a.mcap"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::write(dir.path().join(".episode-x1.partial"), b"").unwrap();
        let found = list_episodes(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mcap", "b.mcap"]);
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.mcap");
        fs::write(&path, b"not an mcap file").unwrap();
        assert!(RecordedTrajectory::load(&path).is_err());
    }
}
