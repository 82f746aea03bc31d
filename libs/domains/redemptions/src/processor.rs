//! Redemption processor.
//!
//! Owns the worker pool that runs [`RedemptionPipeline`] and is the only
//! entry point producers use to hand over redemptions.

use std::sync::Arc;
use task_worker::{CircuitBreaker, PoolStatus, PoolStatusSource, WorkerPool};
use tracing::{debug, warn};

use crate::client::DelegationClient;
use crate::config::RedemptionConfig;
use crate::error::RedemptionResult;
use crate::models::RedemptionTask;
use crate::pipeline::RedemptionPipeline;
use crate::repository::RedemptionRepository;

pub struct RedemptionProcessor<R, C>
where
    R: RedemptionRepository + 'static,
    C: DelegationClient + 'static,
{
    pool: WorkerPool<RedemptionTask, RedemptionPipeline<R, C>>,
}

impl<R, C> RedemptionProcessor<R, C>
where
    R: RedemptionRepository + 'static,
    C: DelegationClient + 'static,
{
    pub fn new(repository: Arc<R>, client: Arc<C>, config: &RedemptionConfig) -> Self {
        let pipeline = RedemptionPipeline::new(repository, client, config.redemption_interval);
        Self {
            pool: WorkerPool::new(pipeline, config.worker.clone()),
        }
    }

    /// Accept a redemption for asynchronous execution.
    ///
    /// Returns once the task is queued, or parked while the circuit is open.
    /// Fails with `QueueFull` when no room frees up within the enqueue timeout.
    pub async fn queue_redemption(&self, task: RedemptionTask) -> RedemptionResult<()> {
        let subscription_id = task.subscription_id;
        let delegation_id = task.delegation_id;

        self.pool.submit(task).await.inspect_err(|e| {
            warn!(%subscription_id, %delegation_id, error = %e, "Redemption not accepted");
        })?;

        debug!(%subscription_id, %delegation_id, "Redemption accepted");
        Ok(())
    }

    /// Spawn the workers and the health monitor
    pub fn start(&self) {
        self.pool.start();
    }

    /// Stop the workers, aborting redemptions in flight
    pub async fn stop(&self) {
        self.pool.stop().await;
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker<RedemptionTask>> {
        self.pool.circuit_breaker()
    }
}

impl<R, C> PoolStatusSource for RedemptionProcessor<R, C>
where
    R: RedemptionRepository + 'static,
    C: DelegationClient + 'static,
{
    fn pool_status(&self) -> PoolStatus {
        self.status()
    }
}
