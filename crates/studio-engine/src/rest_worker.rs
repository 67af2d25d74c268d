//! Background REST calls.
//!
//! Device pushes run on their own thread; every other request runs on a
//! second one. Each thread works through its jobs in submission order.
//! Results travel back over a channel tagged with the session epoch that
//! requested them, so the engine can drop answers for a closed session.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};
use studio_api::{ApiResult, DeviceUpdate, StudioApi, UserProfile};
use studio_ipc::{ParticipantId, RecordingSummary, StudioSummary};
use tracing::{debug, error, warn};

use crate::error::EngineResult;

/// A request for the REST worker.
#[derive(Debug, Clone)]
pub(crate) enum RestJob {
    ServerInfo {
        epoch: u64,
        token: String,
        server_id: String,
    },
    Owner {
        epoch: u64,
        token: String,
        user_id: ParticipantId,
    },
    Avatar {
        epoch: u64,
        id: ParticipantId,
        url: String,
    },
    PushDevice {
        token: String,
        device_id: String,
        update: DeviceUpdate,
    },
    ListStudios {
        token: String,
    },
    ListRecordings {
        token: String,
        server_id: String,
    },
    ResolveRecording {
        token: String,
        server_id: String,
        recording_id: String,
    },
}

/// Something a background worker produced for the engine thread.
#[derive(Debug)]
pub(crate) enum WorkerResult {
    Admin {
        epoch: u64,
        admin: bool,
    },
    Owner {
        epoch: u64,
        profile: UserProfile,
    },
    /// `image` is `None` when the default avatar should be used.
    Avatar {
        epoch: u64,
        id: ParticipantId,
        image: Option<Bytes>,
    },
    ActiveParticipants {
        epoch: u64,
        generation: u64,
        ids: Vec<String>,
    },
    Studios(ApiResult<Vec<StudioSummary>>),
    Recordings {
        server_id: String,
        result: ApiResult<Vec<RecordingSummary>>,
    },
    RecordingUrl {
        recording_id: String,
        result: ApiResult<String>,
    },
}

pub(crate) struct RestWorker {
    lookups: Lane,
    pushes: Lane,
}

impl RestWorker {
    pub fn spawn(api: Arc<dyn StudioApi>, results: Sender<WorkerResult>) -> EngineResult<Self> {
        Ok(Self {
            lookups: Lane::spawn("studio-rest", Arc::clone(&api), results.clone())?,
            pushes: Lane::spawn("studio-push", api, results)?,
        })
    }

    pub fn submit(&self, job: RestJob) {
        match job {
            RestJob::PushDevice { .. } => self.pushes.submit(job),
            job => self.lookups.submit(job),
        }
    }

    /// Finish queued jobs and join both threads.
    pub fn shutdown(&mut self) {
        self.pushes.shutdown();
        self.lookups.shutdown();
    }
}

impl Drop for RestWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One worker thread and its job queue.
struct Lane {
    name: &'static str,
    jobs: Option<Sender<RestJob>>,
    handle: Option<JoinHandle<()>>,
}

impl Lane {
    fn spawn(
        name: &'static str,
        api: Arc<dyn StudioApi>,
        results: Sender<WorkerResult>,
    ) -> EngineResult<Self> {
        let (jobs, job_rx) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || rest_loop(name, api, job_rx, results))?;
        Ok(Self {
            name,
            jobs: Some(jobs),
            handle: Some(handle),
        })
    }

    fn submit(&self, job: RestJob) {
        let Some(jobs) = &self.jobs else {
            return;
        };
        if jobs.send(job).is_err() {
            warn!(lane = self.name, "REST worker is gone, dropping job");
        }
    }

    fn shutdown(&mut self) {
        self.jobs = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(lane = self.name, "REST worker panicked");
            }
        }
    }
}

fn rest_loop(
    lane: &str,
    api: Arc<dyn StudioApi>,
    jobs: Receiver<RestJob>,
    results: Sender<WorkerResult>,
) {
    debug!(lane, "REST worker starting");
    for job in jobs {
        let Some(result) = execute(api.as_ref(), job) else {
            continue;
        };
        if results.send(result).is_err() {
            break;
        }
    }
    debug!(lane, "REST worker stopped");
}

fn execute(api: &dyn StudioApi, job: RestJob) -> Option<WorkerResult> {
    match job {
        RestJob::ServerInfo {
            epoch,
            token,
            server_id,
        } => match api.server_info(&token, &server_id) {
            Ok(info) => Some(WorkerResult::Admin {
                epoch,
                admin: info.admin,
            }),
            Err(e) => {
                warn!(%server_id, "Failed to fetch server info: {}", e);
                None
            }
        },
        RestJob::Owner {
            epoch,
            token,
            user_id,
        } => match api.user_profile(&token, user_id.as_str()) {
            Ok(profile) => Some(WorkerResult::Owner { epoch, profile }),
            Err(e) => {
                warn!(%user_id, "Failed to fetch profile: {}", e);
                None
            }
        },
        RestJob::Avatar { epoch, id, url } => {
            let image = if url.is_empty() {
                None
            } else {
                match api.fetch_bytes(&url) {
                    Ok(bytes) if !bytes.is_empty() => Some(bytes),
                    Ok(_) => None,
                    Err(e) => {
                        debug!(%id, "Avatar download failed, using default: {}", e);
                        None
                    }
                }
            };
            Some(WorkerResult::Avatar { epoch, id, image })
        }
        RestJob::PushDevice {
            token,
            device_id,
            update,
        } => {
            // Not retried and not reverted.
            if let Err(e) = api.update_device(&token, &device_id, &update) {
                warn!(%device_id, "Device update failed: {}", e);
            }
            None
        }
        RestJob::ListStudios { token } => Some(WorkerResult::Studios(api.list_servers(&token))),
        RestJob::ListRecordings { token, server_id } => {
            let result = api.list_recordings(&token, &server_id);
            Some(WorkerResult::Recordings { server_id, result })
        }
        RestJob::ResolveRecording {
            token,
            server_id,
            recording_id,
        } => {
            let result = api.recording_download_url(&token, &server_id, &recording_id);
            Some(WorkerResult::RecordingUrl {
                recording_id,
                result,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::fake_api::FakeApi;

    fn worker(api: &Arc<FakeApi>) -> (RestWorker, Receiver<WorkerResult>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = RestWorker::spawn(Arc::clone(api) as Arc<dyn StudioApi>, tx).unwrap();
        (worker, rx)
    }

    fn next(rx: &Receiver<WorkerResult>) -> WorkerResult {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_push_failure_produces_no_result() {
        let api = Arc::new(FakeApi::new());
        api.fail_pushes();
        let (mut worker, rx) = worker(&api);

        worker.submit(RestJob::PushDevice {
            token: "tok".into(),
            device_id: "d1".into(),
            update: DeviceUpdate {
                server_id: "srv".into(),
                capture_mute: true,
                capture_volume: 10,
            },
        });
        worker.shutdown();

        assert!(rx.try_recv().is_err());
        assert_eq!(api.pushes().len(), 1);
    }

    #[test]
    fn test_avatar_falls_back() {
        let api = Arc::new(FakeApi::new());
        api.set_image("https://img.test/a.png", b"png");
        let (worker, rx) = worker(&api);
        let id = ParticipantId::from("u1");

        for url in ["https://img.test/a.png", "", "https://img.test/missing.png"] {
            worker.submit(RestJob::Avatar {
                epoch: 3,
                id: id.clone(),
                url: url.into(),
            });
        }

        let images: Vec<Option<Bytes>> = (0..3)
            .map(|_| match next(&rx) {
                WorkerResult::Avatar { epoch, image, .. } => {
                    assert_eq!(epoch, 3);
                    image
                }
                other => panic!("unexpected result: {other:?}"),
            })
            .collect();
        assert_eq!(images, vec![Some(Bytes::from_static(b"png")), None, None]);
    }

    #[test]
    fn test_push_is_not_held_up_by_slow_download() {
        let api = Arc::new(FakeApi::new());
        api.delay_images(Duration::from_millis(1500));
        let (mut worker, _rx) = worker(&api);

        worker.submit(RestJob::Avatar {
            epoch: 1,
            id: "u1".into(),
            url: "https://img.test/slow.png".into(),
        });
        worker.submit(RestJob::PushDevice {
            token: "tok".into(),
            device_id: "d1".into(),
            update: DeviceUpdate {
                server_id: "srv".into(),
                capture_mute: true,
                capture_volume: 40,
            },
        });

        let deadline = Instant::now() + Duration::from_millis(750);
        while api.pushes().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(api.pushes().len(), 1);
        worker.shutdown();
    }

    #[test]
    fn test_jobs_run_in_order() {
        let api = Arc::new(FakeApi::new());
        api.set_admin(true);
        let (worker, rx) = worker(&api);

        worker.submit(RestJob::ServerInfo {
            epoch: 1,
            token: "tok".into(),
            server_id: "srv".into(),
        });
        worker.submit(RestJob::ListStudios { token: "tok".into() });

        assert!(matches!(
            next(&rx),
            WorkerResult::Admin {
                epoch: 1,
                admin: true
            }
        ));
        assert!(matches!(next(&rx), WorkerResult::Studios(Ok(_))));
    }
}
