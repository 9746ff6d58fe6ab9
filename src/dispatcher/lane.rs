use crate::domain::{Coordinate, Country};
use crate::provider::{ResolveError, Resolver};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

struct Job {
    coordinate: Coordinate,
    reply: oneshot::Sender<Result<Country, ResolveError>>,
}

/// A queue in front of one resolver, drained by a single worker task so that provider never sees two requests at once.
///
/// The worker stops once the lane is dropped and its queue is empty.
#[derive(Debug)]
pub struct Lane {
    resolver: Arc<dyn Resolver>,
    tx: mpsc::Sender<Job>,
    pending: Arc<AtomicUsize>,
}

impl Lane {
    pub fn spawn(resolver: Arc<dyn Resolver>, buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let pending = Arc::new(AtomicUsize::new(0));
        tokio::spawn(work(resolver.clone(), rx, pending.clone()));

        Lane { resolver, tx, pending }
    }

    pub fn name(&self) -> &'static str {
        self.resolver.name()
    }

    /// No job is queued or running.
    pub fn is_idle(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }

    pub fn provider_available(&self) -> bool {
        self.resolver.is_available()
    }

    /// Queues a coordinate. Jobs run in submission order, the returned ticket yields the result.
    pub async fn submit(&self, coordinate: Coordinate) -> Result<Ticket, LaneError> {
        let (reply, rx) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Job { coordinate, reply }).await.is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(LaneError::Closed(self.name()));
        }

        Ok(Ticket { lane: self.name(), rx })
    }
}

pub struct Ticket {
    lane: &'static str,
    rx: oneshot::Receiver<Result<Country, ResolveError>>,
}

impl Ticket {
    pub async fn wait(self) -> Result<Country, LaneError> {
        match self.rx.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(LaneError::Dropped(self.lane)),
        }
    }
}

#[instrument(skip_all, fields(lane = resolver.name()))]
async fn work(resolver: Arc<dyn Resolver>, mut rx: mpsc::Receiver<Job>, pending: Arc<AtomicUsize>) {
    debug!("🛣️ Lane started");
    while let Some(job) = rx.recv().await {
        let result = resolver.resolve(job.coordinate).await;
        pending.fetch_sub(1, Ordering::SeqCst);
        if job.reply.send(result).is_err() {
            debug!("🛣️ Nobody is waiting for {} anymore", job.coordinate);
        }
    }
    debug!("🛣️ Lane closed");
}

#[derive(Error, Debug)]
pub enum LaneError {
    #[error("lane '{0}' is closed")]
    Closed(&'static str),
    #[error("lane '{0}' dropped the job")]
    Dropped(&'static str),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
