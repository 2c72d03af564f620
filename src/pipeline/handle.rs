use crate::pipeline::{Pipeline, PipelineError, PipelineStats, Running};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Owns the task driving a running pipeline.
///
/// Cancelling the token ends the loop after the current tick; the task then
/// closes the transport and reports the final counters.
#[derive(Debug)]
pub struct PipelineHandle {
    cancel: CancellationToken,
    task_handle: Option<JoinHandle<Result<PipelineStats, PipelineError>>>,
}

impl PipelineHandle {
    pub fn spawn(pipeline: Pipeline<Running>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        info!("Spawning pipeline task");
        let task_handle = tokio::spawn(async move {
            match pipeline.run_until_cancelled(token).await {
                Ok(stopped) => {
                    info!("Pipeline task finished cleanly");
                    Ok(stopped.stats())
                }
                Err(e) => {
                    error!("Pipeline task terminated with error: {}", e);
                    Err(e)
                }
            }
        });
        debug!("Pipeline task spawned: {:?}", task_handle);

        Self {
            cancel,
            task_handle: Some(task_handle),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the loop to end, either by cancellation or by a fatal fault
    pub async fn join(&mut self) -> Result<PipelineStats, PipelineError> {
        let Some(handle) = self.task_handle.take() else {
            warn!("Pipeline task already joined");
            return Err(PipelineError::TaskError(
                "Pipeline task already joined".to_string(),
            ));
        };
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Pipeline task panicked: {}", e);
                Err(PipelineError::TaskError(format!(
                    "Pipeline task panicked: {}",
                    e
                )))
            }
        }
    }

    pub async fn shutdown(&mut self) -> Result<PipelineStats, PipelineError> {
        debug!("Sending cancellation to pipeline task");
        self.cancel.cancel();
        self.join().await
    }
}
