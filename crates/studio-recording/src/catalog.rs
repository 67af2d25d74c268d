//! Studio and recording catalog.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use studio_api::StudioApi;
use studio_ipc::{RecordingSummary, StudioSummary};
use tracing::{debug, info, instrument};

use crate::error::{RecordingError, RecordingResult};
use crate::paths::{download_filename, enqueue_segments, local_dir, recording_id_from_url};
use crate::queue::SegmentQueue;

/// How to get a recording's segments onto disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadPlan {
    /// Already downloaded and extracted into `dir`.
    Local { dir: PathBuf },

    /// Fetch `url` into `archive`, then extract it into `dir`.
    Remote {
        url: String,
        dir: PathBuf,
        archive: PathBuf,
    },
}

/// Lists studios and recordings and fetches recording archives.
pub struct RecordingCatalog {
    api: Arc<dyn StudioApi>,
    token: String,
    root: PathBuf,
}

impl RecordingCatalog {
    /// Catalog for the user owning `token`, downloading under `root`.
    pub fn new(api: Arc<dyn StudioApi>, token: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            api,
            token: token.into(),
            root: root.into(),
        }
    }

    pub fn studios(&self) -> RecordingResult<Vec<StudioSummary>> {
        Ok(self.api.list_servers(&self.token)?)
    }

    pub fn recordings(&self, server_id: &str) -> RecordingResult<Vec<RecordingSummary>> {
        Ok(self.api.list_recordings(&self.token, server_id)?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decide whether a recording needs downloading.
    ///
    /// A recording whose local directory exists is complete: [`download`]
    /// only creates it once the archive is fully written.
    ///
    /// [`download`]: RecordingCatalog::download
    #[instrument(skip(self))]
    pub fn plan(&self, server_id: &str, recording_id: &str) -> RecordingResult<DownloadPlan> {
        let dir = local_dir(&self.root, recording_id)?;
        if dir.is_dir() {
            info!(dir = %dir.display(), "Recording already downloaded");
            return Ok(DownloadPlan::Local { dir });
        }

        let url = self
            .api
            .recording_download_url(&self.token, server_id, recording_id)?;
        let Some(filename) = download_filename(&url) else {
            return Err(RecordingError::InvalidUrl(url));
        };
        if recording_id_from_url(&url) != Some(recording_id) {
            debug!(%recording_id, %filename, "Download link names a different recording");
        }
        let archive = dir.join(filename);
        Ok(DownloadPlan::Remote { url, dir, archive })
    }

    /// Write the archive of a remote plan to disk. Returns its path.
    ///
    /// The archive is staged next to the target and moved into place only
    /// after it was written completely.
    #[instrument(skip(self, plan))]
    pub fn download(&self, plan: &DownloadPlan) -> RecordingResult<PathBuf> {
        let (url, dir, archive) = match plan {
            DownloadPlan::Local { dir } => return Ok(dir.clone()),
            DownloadPlan::Remote { url, dir, archive } => (url, dir, archive),
        };
        let (Some(name), Some(filename)) = (dir.file_name(), archive.file_name()) else {
            return Err(RecordingError::InvalidName(archive.display().to_string()));
        };

        let bytes = self.api.fetch_bytes(url)?;

        let mut staging_name = OsString::from(".");
        staging_name.push(name);
        staging_name.push(".partial");
        let staging = dir.with_file_name(staging_name);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        let moved =
            fs::write(staging.join(filename), &bytes).and_then(|()| fs::rename(&staging, dir));
        if let Err(e) = moved {
            let _ = fs::remove_dir_all(&staging);
            return Err(e.into());
        }

        info!(archive = %archive.display(), size = bytes.len(), "Recording downloaded");
        Ok(archive.clone())
    }

    /// Queue the segments of an extracted recording.
    pub fn enqueue(&self, recording_id: &str, queue: &SegmentQueue) -> RecordingResult<usize> {
        enqueue_segments(&local_dir(&self.root, recording_id)?, queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use studio_api::{ApiError, ApiResult, DeviceUpdate, ServerInfo, UserProfile};

    use crate::paths::testing::scratch_dir;

    struct Archive;

    impl StudioApi for Archive {
        fn server_info(&self, _: &str, _: &str) -> ApiResult<ServerInfo> {
            Ok(ServerInfo::default())
        }

        fn user_profile(&self, _: &str, _: &str) -> ApiResult<UserProfile> {
            Ok(UserProfile::default())
        }

        fn active_participants(&self, _: &str, _: &str) -> ApiResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn update_device(&self, _: &str, _: &str, _: &DeviceUpdate) -> ApiResult<()> {
            Ok(())
        }

        fn fetch_bytes(&self, url: &str) -> ApiResult<Bytes> {
            if url.contains("rec7-") {
                Ok(Bytes::from_static(b"PK\x03\x04"))
            } else {
                Err(ApiError::Status {
                    status: 403,
                    endpoint: url.to_string(),
                })
            }
        }

        fn list_servers(&self, _: &str) -> ApiResult<Vec<StudioSummary>> {
            Ok(vec![StudioSummary {
                id: "srv1".into(),
                name: "Studio".into(),
            }])
        }

        fn list_recordings(&self, _: &str, _: &str) -> ApiResult<Vec<RecordingSummary>> {
            Ok(vec![RecordingSummary {
                id: "rec7".into(),
                name: "Take".into(),
            }])
        }

        fn recording_download_url(&self, _: &str, _: &str, recording_id: &str) -> ApiResult<String> {
            if recording_id == "broken" {
                return Ok("https://files.test/..?sig=x".to_string());
            }
            Ok(format!("https://files.test/{recording_id}-1700000000.zip?sig=x"))
        }
    }

    fn catalog(root: &Path) -> RecordingCatalog {
        RecordingCatalog::new(Arc::new(Archive), "tok", root)
    }

    #[test]
    fn test_remote_plan_and_download() {
        let root = scratch_dir("remote");
        let catalog = catalog(&root);

        let plan = catalog.plan("srv1", "rec7").unwrap();
        assert_eq!(
            plan,
            DownloadPlan::Remote {
                url: "https://files.test/rec7-1700000000.zip?sig=x".into(),
                dir: root.join("rec7"),
                archive: root.join("rec7").join("rec7-1700000000.zip"),
            }
        );

        let archive = catalog.download(&plan).unwrap();
        assert_eq!(fs::read(&archive).unwrap(), b"PK\x03\x04");

        // The directory now exists, so the next plan is local.
        assert_eq!(
            catalog.plan("srv1", "rec7").unwrap(),
            DownloadPlan::Local {
                dir: root.join("rec7")
            }
        );
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_failed_download_leaves_nothing_behind() {
        let root = scratch_dir("failed");
        let catalog = catalog(&root);

        let plan = catalog.plan("srv1", "rec8").unwrap();
        assert!(matches!(catalog.download(&plan), Err(RecordingError::Api(_))));

        assert!(!root.join("rec8").exists());
        assert!(!root.join(".rec8.partial").exists());
        assert!(matches!(
            catalog.plan("srv1", "rec8").unwrap(),
            DownloadPlan::Remote { .. }
        ));
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_names_escaping_the_root_are_rejected() {
        let root = scratch_dir("escape");
        let catalog = catalog(&root);

        assert!(matches!(
            catalog.plan("srv1", ".."),
            Err(RecordingError::InvalidName(_))
        ));
        assert!(matches!(
            catalog.plan("srv1", "broken"),
            Err(RecordingError::InvalidUrl(_))
        ));
        assert!(matches!(
            catalog.enqueue("../rec7", &SegmentQueue::new()),
            Err(RecordingError::InvalidName(_))
        ));
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_enqueue_extracted_recording() {
        let root = scratch_dir("enqueue");
        fs::create_dir(root.join("rec7")).unwrap();
        fs::write(root.join("rec7").join("track1.flac"), b"").unwrap();
        let catalog = catalog(&root);
        let queue = SegmentQueue::new();

        assert_eq!(catalog.enqueue("rec7", &queue).unwrap(), 1);
        assert_eq!(catalog.studios().unwrap().len(), 1);
        assert_eq!(catalog.recordings("srv1").unwrap()[0].id, "rec7");
        fs::remove_dir_all(&root).unwrap();
    }
}
