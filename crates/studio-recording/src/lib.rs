//! Recording side of the virtual studio client.
//!
//! Finished recordings are listed and resolved through the studio API, then
//! their audio segments are handed from a background producer to the consumer
//! that loads them through a [`SegmentQueue`].

mod catalog;
mod error;
mod paths;
mod queue;

pub use catalog::{DownloadPlan, RecordingCatalog};
pub use error::{RecordingError, RecordingResult};
pub use paths::{
    default_download_root, download_filename, enqueue_segments, local_dir, recording_id_from_url,
    scan_segments, SEGMENT_EXTENSION,
};
pub use queue::SegmentQueue;
