use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::ApiError;
use crate::formats::PageRoute;
use crate::gateway::PageGateway;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscoveryTiming {
    pub tick: Duration,
    pub max_increment: f64,
    pub ceiling: f64,
    /// How long 100% stays visible before the indicator resets.
    pub settle_delay: Duration,
}

impl Default for DiscoveryTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            max_increment: 10.0,
            ceiling: 90.0,
            settle_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Progress {
    pub run: u64,
    pub percent: f64,
}

impl Progress {
    pub fn rounded(&self) -> u32 {
        self.percent.round().clamp(0.0, 100.0) as u32
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    #[error("page discovery is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug)]
pub struct ProgressTicker {
    tx: Arc<watch::Sender<Progress>>,
    timing: DiscoveryTiming,
}

impl ProgressTicker {
    pub fn new(timing: DiscoveryTiming) -> Self {
        let (tx, _rx) = watch::channel(Progress::default());
        Self {
            tx: Arc::new(tx),
            timing,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Progress {
        *self.tx.borrow()
    }

    fn start(&self) -> u64 {
        let run = self.current().run + 1;
        self.tx.send_replace(Progress { run, percent: 0.0 });
        run
    }

    fn advance(&self, run: u64, rng: &mut StdRng) {
        let max = self.timing.max_increment;
        let step = if max > 0.0 { rng.gen_range(0.0..max) } else { 0.0 };
        let ceiling = self.timing.ceiling;
        self.tx.send_if_modified(|p| {
            if p.run != run || p.percent >= ceiling {
                return false;
            }
            p.percent = (p.percent + step).min(ceiling);
            true
        });
    }

    fn complete(&self, run: u64) {
        self.tx.send_replace(Progress {
            run,
            percent: 100.0,
        });
        let tx = Arc::clone(&self.tx);
        let settle = self.timing.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            reset_if_current(&tx, run);
        });
    }

    fn fail(&self, run: u64) {
        reset_if_current(&self.tx, run);
    }
}

fn reset_if_current(tx: &watch::Sender<Progress>, run: u64) {
    tx.send_if_modified(|p| {
        if p.run != run || p.percent == 0.0 {
            return false;
        }
        p.percent = 0.0;
        true
    });
}

pub struct DiscoveryOrchestrator {
    gateway: Arc<dyn PageGateway>,
    ticker: ProgressTicker,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DiscoveryOrchestrator {
    pub fn new(gateway: Arc<dyn PageGateway>, timing: DiscoveryTiming) -> Self {
        Self {
            gateway,
            ticker: ProgressTicker::new(timing),
            running: AtomicBool::new(false),
        }
    }

    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.ticker.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claims the single discovery slot. The slot is released when the returned run
    /// finishes or is dropped.
    pub fn admit(&self) -> Result<AdmittedRun<'_>, DiscoveryError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DiscoveryError::AlreadyRunning);
        }
        Ok(AdmittedRun {
            orchestrator: self,
            _guard: RunningGuard(&self.running),
        })
    }

    pub async fn run(&self, project_id: u64) -> Result<Vec<PageRoute>, DiscoveryError> {
        self.admit()?.run(project_id).await
    }
}

pub struct AdmittedRun<'a> {
    orchestrator: &'a DiscoveryOrchestrator,
    _guard: RunningGuard<'a>,
}

impl AdmittedRun<'_> {
    /// There is no cancellation: once sent, the request resolves or fails.
    pub async fn run(self, project_id: u64) -> Result<Vec<PageRoute>, DiscoveryError> {
        let ticker = &self.orchestrator.ticker;
        let run = ticker.start();
        tracing::info!(project_id, run, "finding pages");

        let tick = ticker.timing.tick;
        let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut rng = StdRng::from_entropy();

        let request = self.orchestrator.gateway.find_pages(project_id);
        tokio::pin!(request);
        // Biased toward the request so no tick lands after the terminal outcome.
        let outcome = loop {
            tokio::select! {
                biased;
                outcome = &mut request => break outcome,
                _ = interval.tick() => ticker.advance(run, &mut rng),
            }
        };

        match outcome {
            Ok(response) => {
                ticker.complete(run);
                tracing::info!(
                    project_id,
                    pages = response.available_routes.len(),
                    status = %response.status,
                    "found pages"
                );
                Ok(response.available_routes)
            }
            Err(err) => {
                ticker.fail(run);
                tracing::warn!(project_id, %err, "finding pages failed");
                Err(err.into())
            }
        }
    }
}
