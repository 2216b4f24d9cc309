//! Parallel extraction over a pool of rendering sessions
//!
//! The coordinating task keeps sole ownership of the crawl state and of the
//! listing session. Worker tasks each own one session opened through the
//! [`SessionFactory`]; candidates reach them over a shared job channel and
//! outcomes come back over a result channel. At most `target - completed`
//! jobs are outstanding, so the target can never be overshot.

use crate::crawler::coordinator::{absorb, finish, report_progress, Coordinator, Termination};
use crate::extract::{Extraction, Extractor};
use crate::render::{RenderSession, SessionError, SessionFactory};
use crate::state::{Candidate, CrawlPhase, CrawlState};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Outcome = (Candidate, Result<Extraction, SessionError>);

impl<S: RenderSession> Coordinator<S> {
    /// Runs the crawl with `workers` extraction sessions
    ///
    /// Completed records arrive in completion order; with `sort_by_discovery`
    /// they are reordered by discovery index once the run has ended.
    ///
    /// # Arguments
    ///
    /// * `factory` - Opens one session per worker
    /// * `workers` - Number of worker tasks
    /// * `state` - The crawl state, owned by this task for the whole run
    /// * `sort_by_discovery` - Restore discovery order at the end
    pub async fn run_pool<F: SessionFactory>(
        &mut self,
        factory: &F,
        workers: usize,
        state: &mut CrawlState,
        sort_by_discovery: bool,
    ) -> Termination {
        let start_time = Instant::now();
        tracing::info!(
            "Starting crawl with target {} and {} workers",
            state.target(),
            workers
        );

        let (job_tx, job_rx) = mpsc::channel::<Candidate>(workers.max(1));
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<Outcome>();
        let stop = self.cancel.child_token();

        let mut handles = Vec::with_capacity(workers);
        let mut opened = Ok(());
        for worker in 0..workers {
            match factory.open().await {
                Ok(session) => handles.push(spawn_worker(
                    worker,
                    session,
                    self.extractor.clone(),
                    Arc::clone(&job_rx),
                    result_tx.clone(),
                    stop.clone(),
                )),
                Err(e) => {
                    opened = Err(e);
                    break;
                }
            }
        }
        drop(result_tx);

        let termination = match opened {
            Ok(()) => self.dispatch(&job_tx, &mut result_rx, state, start_time).await,
            Err(e) => Termination::Fatal(format!("Failed to open worker session: {}", e)),
        };

        // Drain: queued jobs are abandoned, in-flight ones finish
        stop.cancel();
        drop(job_tx);
        while let Some((candidate, outcome)) = result_rx.recv().await {
            if let Ok(Extraction::Record(record)) = outcome {
                let id = record.id.clone();
                if state.append(candidate.index, *record) {
                    tracing::info!("Record {} saved while draining", id);
                }
            }
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        if sort_by_discovery {
            state.sort_by_discovery();
        }
        finish(state, termination, start_time)
    }

    async fn dispatch(
        &mut self,
        job_tx: &mpsc::Sender<Candidate>,
        result_rx: &mut mpsc::UnboundedReceiver<Outcome>,
        state: &mut CrawlState,
        start_time: Instant,
    ) -> Termination {
        let mut outstanding: usize = 0;
        let mut processed: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Termination::Interrupted;
            }
            if state.is_target_reached() {
                return Termination::Completed;
            }

            if state.pending_len() + outstanding < state.remaining() && !state.listing_exhausted() {
                state.transition(CrawlPhase::Discovering);
                if let Err(e) = self.discoverer.discover_round(&mut self.session, state).await {
                    return Termination::Fatal(e.to_string());
                }
                continue;
            }

            while outstanding < state.remaining() {
                let Some(candidate) = state.next_pending() else {
                    break;
                };
                state.transition(CrawlPhase::Extracting);
                state.stats_mut().attempted += 1;
                if job_tx.send(candidate).await.is_err() {
                    return Termination::Fatal("worker pool stopped".to_string());
                }
                outstanding += 1;
            }

            if outstanding == 0 {
                return Termination::Exhausted;
            }

            let received = tokio::select! {
                _ = self.cancel.cancelled() => return Termination::Interrupted,
                received = result_rx.recv() => received,
            };
            let Some((candidate, outcome)) = received else {
                return Termination::Fatal("all workers stopped".to_string());
            };
            outstanding -= 1;

            if let Some(termination) = absorb(state, &mut self.failures, candidate, outcome) {
                return termination;
            }

            processed += 1;
            if processed % 10 == 0 {
                report_progress(state, processed, start_time);
            }
        }
    }
}

fn spawn_worker<W: RenderSession + 'static>(
    worker: usize,
    mut session: W,
    extractor: Extractor,
    jobs: Arc<Mutex<mpsc::Receiver<Candidate>>>,
    results: mpsc::UnboundedSender<Outcome>,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("Worker {} started", worker);
        loop {
            let job = {
                let mut jobs = jobs.lock().await;
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => None,
                    job = jobs.recv() => job,
                }
            };
            let Some(candidate) = job else {
                break;
            };

            let outcome = extractor.extract(&mut session, &candidate.url).await;
            let fatal = matches!(&outcome, Err(e) if e.is_fatal());
            if results.send((candidate, outcome)).is_err() || fatal {
                break;
            }
        }

        if let Err(e) = session.close().await {
            tracing::warn!("Worker {} failed to close its session: {}", worker, e);
        }
        tracing::debug!("Worker {} stopped", worker);
    })
}
