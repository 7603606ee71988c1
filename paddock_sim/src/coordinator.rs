//! CoordinatorAgent - the ranking authority and results aggregator.
//!
//! A single task owns the [`CoordinatorLedger`] and drains the coordinator
//! inbox one envelope at a time, so every report is fully applied before
//! the next is looked at. Completion is published on a watch channel that
//! the orchestrator holds through a [`CoordinatorHandle`].

use crate::agent::send_payload;
use paddock_core::{
    CoordinatorLedger, Payload, ProgressReport, RaceConfig, RaceProgress, RankReply, RecordOutcome, ResultReport,
};
use paddock_env::{EnvError, Envelope, MessageKind, MessageTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Orchestrator-side view of race completion.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    progress: watch::Receiver<RaceProgress>,
}

impl CoordinatorHandle {
    pub fn progress(&self) -> RaceProgress {
        *self.progress.borrow()
    }

    pub fn is_complete(&self) -> bool {
        self.progress.borrow().complete
    }

    /// Resolves once every expected participant has reported a result.
    ///
    /// If the coordinator stops first, returns the last published progress.
    pub async fn wait_for_completion(&mut self) -> RaceProgress {
        let waited = self.progress.wait_for(|p| p.complete).await.map(|p| *p);
        match waited {
            Ok(progress) => progress,
            Err(_) => *self.progress.borrow(),
        }
    }
}

pub struct CoordinatorAgent<Net: MessageTransport> {
    net: Arc<Net>,
    ledger: CoordinatorLedger,
    poll: Duration,
    progress_tx: watch::Sender<RaceProgress>,
}

impl<Net: MessageTransport> CoordinatorAgent<Net> {
    pub fn new(net: Arc<Net>, config: &RaceConfig) -> (Self, CoordinatorHandle) {
        let ledger = CoordinatorLedger::new(config.num_participants);
        let (progress_tx, progress) = watch::channel(ledger.progress());

        let agent = Self {
            net,
            ledger,
            poll: config.duration(config.timings.receive_poll),
            progress_tx,
        };
        (agent, CoordinatorHandle { progress })
    }

    pub fn ledger(&self) -> &CoordinatorLedger {
        &self.ledger
    }

    /// Serves the inbox until `shutdown` flips to true (or its sender is
    /// dropped), then hands back the ledger.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> CoordinatorLedger {
        info!(
            "coordinator up, expecting {} participants",
            self.ledger.progress().expected
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = self.net.recv_timeout(self.poll) => match received {
                    Ok(envelope) => self.handle_envelope(envelope).await,
                    Err(EnvError::Timeout(_)) => {}
                    Err(e) => {
                        warn!("coordinator inbox failed: {}", e);
                        break;
                    }
                },
            }
        }

        let progress = self.ledger.progress();
        info!(
            "coordinator stopping: {}/{} results",
            progress.finished, progress.expected
        );
        self.ledger
    }

    /// Applies one envelope. Unknown kinds and unreadable payloads are
    /// logged and change nothing.
    pub async fn handle_envelope(&mut self, envelope: Envelope) {
        match envelope.kind {
            MessageKind::ProgressReport => match ProgressReport::decode(&envelope) {
                Ok(report) => self.on_progress(&envelope, report).await,
                Err(e) => warn!("coordinator: unreadable progress from {}: {}", envelope.from, e),
            },
            MessageKind::ResultReport => match ResultReport::decode(&envelope) {
                Ok(report) => self.on_result(report),
                Err(e) => warn!("coordinator: unreadable result from {}: {}", envelope.from, e),
            },
            other => debug!("coordinator: ignoring {} from {}", other, envelope.from),
        }
    }

    async fn on_progress(&mut self, envelope: &Envelope, report: ProgressReport) {
        let rank = self.ledger.handle_progress(&report);
        debug!(
            "coordinator: participant_{} lap {} at {:.3}s -> P{}",
            report.id, report.lap, report.elapsed_time, rank
        );

        let reply = RankReply { rank, lap: report.lap };
        send_payload(&*self.net, envelope.from, &reply).await;
    }

    fn on_result(&mut self, report: ResultReport) {
        let id = report.id;
        let elapsed_time = report.elapsed_time;

        match self.ledger.handle_result(report) {
            RecordOutcome::Duplicate => {
                warn!("coordinator: duplicate result from participant_{} ignored", id);
                return;
            }
            RecordOutcome::Recorded { finished, expected } => {
                info!(
                    "coordinator: participant_{} finished in {:.3}s ({}/{})",
                    id, elapsed_time, finished, expected
                );
            }
            RecordOutcome::Completed => {
                info!("coordinator: participant_{} finished in {:.3}s, race complete", id, elapsed_time);
            }
        }

        self.progress_tx.send_replace(self.ledger.progress());
    }
}
