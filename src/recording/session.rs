//! Recording sessions and their manifest

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::RecordingError;
use crate::recording::{FrameWriter, WriterFactory};
use crate::video::frame::Frame;

/// Manifest file written next to the recordings
pub const MANIFEST_FILE: &str = "session.json";

/// One recorded source in the manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceEntry {
    pub name: String,
    pub file: String,
    pub width: u32,
    pub height: u32,
    pub frames: u64,
}

/// Contents of `session.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionManifest {
    pub id: Uuid,
    pub started_at: DateTime<Local>,
    pub stopped_at: DateTime<Local>,
    pub fps: u32,
    pub sources: Vec<SourceEntry>,
    /// Sources with no frame at start or whose writer failed to open
    pub omitted: Vec<String>,
}

/// What a stopped session produced
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub total_frames: u64,
    /// Written only when at least one frame was recorded
    pub manifest: Option<SessionManifest>,
}

struct ActiveWriter {
    writer: Box<dyn FrameWriter>,
    file: String,
    width: u32,
    height: u32,
}

/// An in-progress recording of several sources
pub struct RecordingSession {
    id: Uuid,
    dir: PathBuf,
    started_at: DateTime<Local>,
    fps: u32,
    writers: BTreeMap<String, ActiveWriter>,
    omitted: Vec<String>,
    write_errors: u64,
}

impl RecordingSession {
    /// Create the session directory and one writer per source with a frame
    ///
    /// `sources` pairs each name with the size of its newest frame, or
    /// `None` if it has not produced one yet. Sources without a size, or
    /// whose writer fails to open, are left out for the whole session.
    pub fn start<'a, I>(
        root: &Path,
        extension: &str,
        fps: u32,
        factory: &dyn WriterFactory,
        sources: I,
    ) -> Result<Self, RecordingError>
    where
        I: IntoIterator<Item = (&'a str, Option<(u32, u32)>)>,
    {
        let started_at = Local::now();
        let dir = unique_dir(root, &started_at.format("%Y%m%d_%H%M%S").to_string());
        std::fs::create_dir_all(&dir)
            .map_err(|e| RecordingError::CreateDir(dir.display().to_string(), e.to_string()))?;

        let mut writers = BTreeMap::new();
        let mut omitted = Vec::new();
        let mut stems = HashSet::new();

        for (name, size) in sources {
            let Some((width, height)) = size else {
                tracing::warn!("'{}' has no frame yet, not recording it", name);
                omitted.push(name.to_string());
                continue;
            };

            let file = format!("{}.{}", unique_stem(name, &mut stems), extension);
            match factory.create(&dir.join(&file), width, height, fps) {
                Ok(writer) => {
                    tracing::info!("  ✓ {} → {}", name, file);
                    writers.insert(
                        name.to_string(),
                        ActiveWriter {
                            writer,
                            file,
                            width,
                            height,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!("  ✗ {}: {}", name, e);
                    omitted.push(name.to_string());
                }
            }
        }

        tracing::info!("🔴 RECORDING to: {}", dir.display());

        Ok(Self {
            id: Uuid::new_v4(),
            dir,
            started_at,
            fps,
            writers,
            omitted,
            write_errors: 0,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn writer_count(&self) -> usize {
        self.writers.len()
    }

    pub fn has_writer(&self, name: &str) -> bool {
        self.writers.contains_key(name)
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    /// Append a frame for `name`
    ///
    /// Returns `false` when the source has no writer in this session.
    /// Write failures are logged and counted, never fatal.
    pub fn write(&mut self, name: &str, frame: &Frame) -> bool {
        let Some(active) = self.writers.get_mut(name) else {
            return false;
        };
        match active.writer.write(frame) {
            Ok(()) => true,
            Err(e) => {
                self.write_errors += 1;
                if self.write_errors == 1 || self.write_errors % 100 == 0 {
                    tracing::warn!("Recording '{}': {} ({} errors)", name, e, self.write_errors);
                }
                false
            }
        }
    }

    /// Close every writer and write the manifest
    pub fn stop(self) -> Result<SessionSummary, RecordingError> {
        let mut files = Vec::new();
        let mut entries = Vec::new();
        let mut total_frames = 0;
        let mut first_error = None;

        for (name, active) in self.writers {
            match active.writer.finish() {
                Ok(summary) => {
                    total_frames += summary.frames;
                    if summary.created {
                        files.push(summary.path);
                    }
                    entries.push(SourceEntry {
                        name,
                        file: active.file,
                        width: active.width,
                        height: active.height,
                        frames: summary.frames,
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to close recording for '{}': {}", name, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        let manifest = if total_frames > 0 {
            let manifest = SessionManifest {
                id: self.id,
                started_at: self.started_at,
                stopped_at: Local::now(),
                fps: self.fps,
                sources: entries,
                omitted: self.omitted,
            };
            let json = serde_json::to_string_pretty(&manifest)
                .map_err(|e| RecordingError::FinalizeFailed(e.to_string()))?;
            std::fs::write(self.dir.join(MANIFEST_FILE), json)
                .map_err(|e| RecordingError::FinalizeFailed(e.to_string()))?;
            Some(manifest)
        } else {
            None
        };

        if let Some(e) = first_error {
            return Err(e);
        }

        tracing::info!("⏹️  Recording stopped: {} files in {}", files.len(), self.dir.display());

        Ok(SessionSummary {
            dir: self.dir,
            files,
            total_frames,
            manifest,
        })
    }
}

/// `root/stamp`, or `root/stamp_N` if that already exists
fn unique_dir(root: &Path, stamp: &str) -> PathBuf {
    let base = root.join(stamp);
    if !base.exists() {
        return base;
    }
    (2..)
        .map(|n| root.join(format!("{}_{}", stamp, n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

/// File stem for `name` not yet in `used`
///
/// Names that sanitize to the same stem get `_2`, `_3`, ... Comparison
/// ignores case so the files stay apart on case-insensitive filesystems.
fn unique_stem(name: &str, used: &mut HashSet<String>) -> String {
    let base = file_stem(name);
    let stem = if used.contains(&base.to_lowercase()) {
        (2..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !used.contains(&candidate.to_lowercase()))
            .unwrap_or(base)
    } else {
        base
    };
    used.insert(stem.to_lowercase());
    stem
}

/// Source name made safe for use as a file name
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim().trim_matches('.').to_string();
    if stem.is_empty() {
        "source".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::testing::MemoryFactory;

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_no_frames_no_files() {
        let root = tempfile::tempdir().unwrap();
        let factory = MemoryFactory::default();

        let session = RecordingSession::start(
            root.path(),
            "mp4",
            60,
            &factory,
            [("A", Some((640, 360))), ("B", Some((320, 240)))],
        )
        .unwrap();
        assert_eq!(session.writer_count(), 2);

        let summary = session.stop().unwrap();
        assert!(summary.files.is_empty());
        assert!(summary.manifest.is_none());
        assert!(files_in(&summary.dir).is_empty());
    }

    #[test]
    fn test_sources_without_frames_never_get_writers() {
        let root = tempfile::tempdir().unwrap();
        let factory = MemoryFactory::default();

        let mut session =
            RecordingSession::start(root.path(), "mp4", 60, &factory, [("A", None), ("B", None)]).unwrap();
        assert_eq!(session.writer_count(), 0);

        // Frames arriving later are not recorded
        assert!(!session.write("A", &Frame::black(64, 64)));
        assert_eq!(session.writer_count(), 0);
        assert!(factory.created.lock().is_empty());

        let summary = session.stop().unwrap();
        assert!(summary.files.is_empty());
    }

    #[test]
    fn test_writers_sized_from_first_frame() {
        let root = tempfile::tempdir().unwrap();
        let factory = MemoryFactory::default();

        let mut session = RecordingSession::start(
            root.path(),
            "mp4",
            60,
            &factory,
            [("Cam/1", Some((640, 360))), ("Cam 2", None)],
        )
        .unwrap();

        {
            let created = factory.created.lock();
            assert_eq!(created.len(), 1);
            assert_eq!(created[0].0, session.dir().join("Cam_1.mp4"));
            assert_eq!((created[0].1, created[0].2, created[0].3), (640, 360, 60));
        }

        assert!(session.write("Cam/1", &Frame::black(640, 360)));
        assert!(session.write("Cam/1", &Frame::black(640, 360)));
        assert!(!session.write("Cam 2", &Frame::black(640, 360)));

        let summary = session.stop().unwrap();
        assert_eq!(summary.total_frames, 2);
        assert_eq!(files_in(&summary.dir), vec!["Cam_1.mp4", MANIFEST_FILE]);

        let json = std::fs::read_to_string(summary.dir.join(MANIFEST_FILE)).unwrap();
        let manifest: SessionManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest.fps, 60);
        assert_eq!(manifest.sources.len(), 1);
        assert_eq!(manifest.sources[0].frames, 2);
        assert_eq!(manifest.omitted, vec!["Cam 2".to_string()]);
    }

    #[test]
    fn test_factory_failure_omits_source() {
        let root = tempfile::tempdir().unwrap();
        let factory = MemoryFactory {
            fail_for: Some("Bad".to_string()),
            ..Default::default()
        };

        let session = RecordingSession::start(
            root.path(),
            "mp4",
            30,
            &factory,
            [("Good", Some((64, 64))), ("Bad", Some((64, 64)))],
        )
        .unwrap();
        assert!(session.has_writer("Good"));
        assert!(!session.has_writer("Bad"));
    }

    #[test]
    fn test_sessions_in_same_second_get_distinct_dirs() {
        let root = tempfile::tempdir().unwrap();
        let factory = MemoryFactory::default();
        let empty: [(&str, Option<(u32, u32)>); 0] = [];

        let first = RecordingSession::start(root.path(), "mp4", 60, &factory, empty).unwrap();
        let second = RecordingSession::start(root.path(), "mp4", 60, &factory, empty).unwrap();
        assert_ne!(first.dir(), second.dir());
    }

    #[test]
    fn test_colliding_names_get_separate_files() {
        let root = tempfile::tempdir().unwrap();
        let factory = MemoryFactory::default();

        let mut session = RecordingSession::start(
            root.path(),
            "mp4",
            30,
            &factory,
            [
                ("Cam/1", Some((64, 64))),
                ("Cam_1", Some((64, 64))),
                ("cam:1", Some((64, 64))),
            ],
        )
        .unwrap();
        assert_eq!(session.writer_count(), 3);

        let mut paths: Vec<String> = factory
            .created
            .lock()
            .iter()
            .map(|(path, ..)| path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["Cam_1.mp4", "Cam_1_2.mp4", "cam_1_3.mp4"]);

        for name in ["Cam/1", "Cam_1", "cam:1"] {
            assert!(session.write(name, &Frame::black(64, 64)));
        }
        let summary = session.stop().unwrap();
        assert_eq!(summary.files.len(), 3);
        assert_eq!(files_in(&summary.dir).len(), 4);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Stage Left"), "Stage Left");
        assert_eq!(file_stem("a/b\\c:d"), "a_b_c_d");
        assert_eq!(file_stem(".."), "source");
    }
}
