//! Download naming and on-disk segment discovery.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{RecordingError, RecordingResult};
use crate::queue::SegmentQueue;

/// File extension of recorded audio segments.
pub const SEGMENT_EXTENSION: &str = "flac";

/// File name a download link points at: its last path segment, query removed.
///
/// `None` unless the name is a plain file name (not empty, `.` or `..`).
pub fn download_filename(url: &str) -> Option<&str> {
    let path = url.rsplit_once('?').map_or(url, |(path, _)| path);
    path_component(path.rsplit('/').next().unwrap_or(path))
}

/// Recording id encoded in a download link: the file name up to its last `-`.
pub fn recording_id_from_url(url: &str) -> Option<&str> {
    let filename = download_filename(url)?;
    path_component(filename.rsplit_once('-').map_or(filename, |(id, _)| id))
}

/// Directory a recording is downloaded and extracted into.
pub fn local_dir(root: &Path, recording_id: &str) -> RecordingResult<PathBuf> {
    let name = path_component(recording_id)
        .ok_or_else(|| RecordingError::InvalidName(recording_id.to_string()))?;
    Ok(root.join(name))
}

/// `name` if it names exactly one entry inside a directory.
fn path_component(name: &str) -> Option<&str> {
    if name.contains(['/', '\\']) {
        return None;
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(name),
        _ => None,
    }
}

/// Default root for downloaded recordings.
pub fn default_download_root() -> PathBuf {
    std::env::temp_dir()
}

/// Segment files directly inside `dir`, sorted by name.
pub fn scan_segments(dir: &Path) -> RecordingResult<Vec<PathBuf>> {
    let mut segments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_segment = path
            .extension()
            .is_some_and(|extension| extension == SEGMENT_EXTENSION);
        if is_segment && entry.file_type()?.is_file() {
            segments.push(path);
        }
    }
    segments.sort();
    Ok(segments)
}

/// Queue every segment found in `dir`. Returns how many were queued.
pub fn enqueue_segments(dir: &Path, queue: &SegmentQueue) -> RecordingResult<usize> {
    let segments = scan_segments(dir)?;
    let count = segments.len();
    for segment in segments {
        queue.push(segment)?;
    }
    debug!(dir = %dir.display(), count, "Queued segments");
    Ok(count)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    /// A fresh empty directory under the system temp dir.
    pub(crate) fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "studio-recording-{}-{}-{}",
            std::process::id(),
            name,
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
