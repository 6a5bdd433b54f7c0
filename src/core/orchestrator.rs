//! Batch synthesis with a fixed-size worker pool.
//!
//! ```text
//!  requests ──▶ feeder ──▶ [bounded work queue] ──▶ worker 1 ─┐
//!                                               ├─▶ worker 2 ─┼─▶ [results] ──▶ BatchReport
//!                                               └─▶ worker N ─┘
//! ```
//!
//! Each worker runs one task at a time on its own connection and hands the
//! finished output back over a channel. The pool size is fixed at
//! construction and never derived from the number of tasks.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::tts::base::{SpeechSynthesizer, SynthesisOutput, TTSError, TTSResult};
use crate::core::tts::edge::{DEFAULT_MAX_CONCURRENCY, SynthesisRequest};

type WorkItem = (usize, SynthesisRequest);

/// Outcome of one task, tagged with its input position.
#[derive(Debug)]
pub struct TaskResult {
    pub index: usize,
    pub result: TTSResult<SynthesisOutput>,
}

/// Per-task outcomes of a batch, ordered by input position.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<TaskResult>,
}

impl BatchReport {
    #[inline]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// `true` when every task succeeded.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.result.is_ok())
    }

    /// Failed tasks with their input positions.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &TTSError)> {
        self.results
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (r.index, e)))
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.result.is_ok()).count()
    }

    /// Results in input order, without the indices.
    pub fn into_outputs(self) -> Vec<TTSResult<SynthesisOutput>> {
        self.results.into_iter().map(|r| r.result).collect()
    }
}

/// Runs many synthesis tasks with at most `max_concurrency` open sessions.
pub struct SynthesisOrchestrator<S: SpeechSynthesizer + ?Sized> {
    synthesizer: Arc<S>,
    max_concurrency: usize,
}

impl<S: SpeechSynthesizer + ?Sized> Clone for SynthesisOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            synthesizer: self.synthesizer.clone(),
            max_concurrency: self.max_concurrency,
        }
    }
}

impl<S: SpeechSynthesizer + ?Sized + 'static> SynthesisOrchestrator<S> {
    /// Fails with [`TTSError::InvalidConfiguration`] if `max_concurrency` is zero.
    pub fn new(synthesizer: Arc<S>, max_concurrency: usize) -> TTSResult<Self> {
        if max_concurrency == 0 {
            return Err(TTSError::InvalidConfiguration(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            synthesizer,
            max_concurrency,
        })
    }

    /// Pool of [`DEFAULT_MAX_CONCURRENCY`] workers.
    pub fn with_default_concurrency(synthesizer: Arc<S>) -> Self {
        Self {
            synthesizer,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    #[inline]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Runs every request and returns one result per request.
    ///
    /// Task failures are isolated: a failing task never stops the others.
    /// Once `cancel` fires, running tasks end with [`TTSError::Cancelled`]
    /// and queued tasks are reported as cancelled without connecting.
    pub async fn synthesize(
        &self,
        requests: Vec<SynthesisRequest>,
        cancel: CancellationToken,
    ) -> BatchReport {
        let total = requests.len();
        if total == 0 {
            return BatchReport::default();
        }

        info!(
            tasks = total,
            max_concurrency = self.max_concurrency,
            "Starting synthesis batch"
        );

        let (work_tx, work_rx) = mpsc::channel::<WorkItem>(self.max_concurrency);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<TaskResult>(self.max_concurrency);

        let feeder = tokio::spawn(async move {
            for item in requests.into_iter().enumerate() {
                if work_tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        let mut workers = Vec::with_capacity(self.max_concurrency);
        for worker_id in 0..self.max_concurrency {
            let synthesizer = self.synthesizer.clone();
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();
            workers.push(tokio::spawn(async move {
                run_worker(worker_id, synthesizer, work_rx, result_tx, cancel).await;
            }));
        }
        drop(result_tx);

        let mut slots: Vec<Option<TTSResult<SynthesisOutput>>> =
            std::iter::repeat_with(|| None).take(total).collect();
        while let Some(task) = result_rx.recv().await {
            if let Some(slot) = slots.get_mut(task.index) {
                *slot = Some(task.result);
            }
        }

        if let Err(e) = feeder.await {
            warn!("Batch feeder task failed: {e}");
        }
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Synthesis worker failed: {e}");
            }
        }

        let results: Vec<TaskResult> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| TaskResult {
                index,
                result: slot.unwrap_or(Err(TTSError::ConnectionClosed)),
            })
            .collect();

        let report = BatchReport { results };
        info!(
            tasks = total,
            succeeded = report.success_count(),
            "Synthesis batch finished"
        );
        report
    }
}

async fn run_worker<S: SpeechSynthesizer + ?Sized>(
    worker_id: usize,
    synthesizer: Arc<S>,
    work_rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    result_tx: mpsc::Sender<TaskResult>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = work_rx.lock().await;
            rx.recv().await
        };
        let Some((index, request)) = next else {
            break;
        };

        let result = if cancel.is_cancelled() {
            Err(TTSError::Cancelled)
        } else {
            debug!(worker = worker_id, task = index, "Synthesis task started");
            synthesizer.synthesize(request, cancel.clone()).await
        };

        match &result {
            Ok(output) => info!(
                worker = worker_id,
                task = index,
                audio_bytes = output.audio.len(),
                words = output.word_boundaries.len(),
                "Synthesis task completed"
            ),
            Err(e) => warn!(worker = worker_id, task = index, "Synthesis task failed: {e}"),
        }

        if result_tx.send(TaskResult { index, result }).await.is_err() {
            break;
        }
    }
}
