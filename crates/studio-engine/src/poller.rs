//! Active-participant poller for the browser transport.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use studio_api::StudioApi;
use tracing::{debug, error, warn};

use crate::error::EngineResult;
use crate::rest_worker::WorkerResult;

/// Where and how often to poll.
#[derive(Debug, Clone)]
pub(crate) struct PollTarget {
    pub token: String,
    pub server_id: String,
    pub interval: Duration,
    pub epoch: u64,
    pub generation: u64,
}

/// Polls immediately, then every interval, until stopped.
pub(crate) struct Poller {
    generation: u64,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn(
        api: Arc<dyn StudioApi>,
        target: PollTarget,
        results: Sender<WorkerResult>,
    ) -> EngineResult<Self> {
        let (stop, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let generation = target.generation;
        let handle = thread::Builder::new()
            .name("studio-poller".into())
            .spawn(move || {
                debug!(generation = target.generation, "Poller starting");
                loop {
                    match api.active_participants(&target.token, &target.server_id) {
                        Ok(ids) => {
                            let result = WorkerResult::ActiveParticipants {
                                epoch: target.epoch,
                                generation: target.generation,
                                ids,
                            };
                            if results.send(result).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Active participant poll failed: {}", e),
                    }
                    match stop_rx.recv_timeout(target.interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }
                debug!(generation = target.generation, "Poller stopped");
            })?;

        Ok(Self {
            generation,
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop polling and join the thread. No result is sent after this returns.
    pub fn stop(&mut self) {
        self.stop = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Poller panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::fake_api::FakeApi;

    #[test]
    fn test_polls_until_stopped() {
        let api = Arc::new(FakeApi::new());
        api.set_active(&["u1", "u2"]);
        let (tx, rx) = crossbeam_channel::unbounded();
        let target = PollTarget {
            token: "tok".into(),
            server_id: "srv".into(),
            interval: Duration::from_millis(10),
            epoch: 4,
            generation: 2,
        };

        let mut poller = Poller::spawn(Arc::clone(&api) as Arc<dyn StudioApi>, target, tx).unwrap();
        for _ in 0..2 {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                WorkerResult::ActiveParticipants {
                    epoch,
                    generation,
                    ids,
                } => {
                    assert_eq!((epoch, generation), (4, 2));
                    assert_eq!(ids, vec!["u1".to_string(), "u2".to_string()]);
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
        poller.stop();

        let polls = api.polls();
        rx.try_iter().count();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(api.polls(), polls);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_first_poll_is_immediate() {
        let api = Arc::new(FakeApi::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        let target = PollTarget {
            token: "tok".into(),
            server_id: "srv".into(),
            interval: Duration::from_secs(3600),
            epoch: 1,
            generation: 1,
        };

        let _poller = Poller::spawn(api as Arc<dyn StudioApi>, target, tx).unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
