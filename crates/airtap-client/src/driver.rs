//! Workflow driver: performs the [`Step`]s a [`Workflow`] asks for over a
//! live [`Connection`].

use airtap_protocol::RequestBody;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::connection::{Connection, Inbound};
use crate::error::ClientError;
use crate::router::{classify, Action};
use crate::workflow::{Step, TaskId, Workflow, WorkflowState};

/// How a workflow run ended, short of an error.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// The last status check answered.  `status` is its `result` verbatim.
    Completed { task_id: TaskId, status: Value },
    /// `shutdown` fired before the workflow reached a terminal state.
    Cancelled,
}

/// Drive `workflow` to completion over `conn`.
///
/// Every inbound envelope is classified and handed to `observe` before the
/// workflow sees it.  Suspension points (receive, poll delay) race against
/// `shutdown`; cancellation abandons the run without committing a further
/// transition and is reported as [`WorkflowOutcome::Cancelled`].  A
/// transition that goes with a request is committed only after the request
/// is sent, so a cancelled or failed send leaves `workflow` where it was.
/// Closing the connection is left to the caller.
///
/// # Errors
///
/// - [`ClientError::Transport`] if the connection fails, closes, or stays
///   silent past its receive timeout.
/// - [`ClientError::Protocol`] if the workflow ends in `Failed`; the
///   connection remains usable.
pub async fn run<F>(
    conn: &Connection,
    workflow: &mut Workflow,
    shutdown: &CancellationToken,
    mut observe: F,
) -> Result<WorkflowOutcome, ClientError>
where
    F: FnMut(&Inbound, &Action),
{
    if shutdown.is_cancelled() {
        return Ok(cancelled(workflow));
    }
    let mut step = workflow.start();

    loop {
        step = match step {
            Step::Send(body) => {
                if shutdown.is_cancelled() {
                    return Ok(cancelled(workflow));
                }
                let id = send(conn, body).await?;
                workflow.record_sent(id);
                Step::Await
            }

            Step::PollAfter(delay) => {
                tracing::info!(
                    delay_ms = delay.as_millis() as u64,
                    task_id = ?workflow.task_id().map(TaskId::as_str),
                    "checking task status after delay"
                );
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return Ok(cancelled(workflow)),
                    _ = tokio::time::sleep(delay) => {
                        if shutdown.is_cancelled() {
                            return Ok(cancelled(workflow));
                        }
                        workflow.poll()
                    }
                }
            }

            Step::Await => {
                let inbound = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return Ok(cancelled(workflow)),
                    r = conn.recv() => r?,
                };
                observe(&inbound, &classify(&inbound.response));
                workflow.on_response(&inbound)
            }

            Step::Finished => return outcome(workflow),
        };
    }
}

async fn send(conn: &Connection, body: RequestBody) -> Result<airtap_protocol::RequestId, ClientError> {
    let kind = body.kind().to_owned();
    let id = conn.send(body).await?;
    tracing::info!(id = %id, kind = %kind, "request sent");
    Ok(id)
}

fn cancelled(workflow: &Workflow) -> WorkflowOutcome {
    tracing::info!(state = workflow.state().name(), "workflow cancelled");
    WorkflowOutcome::Cancelled
}

fn outcome(workflow: &Workflow) -> Result<WorkflowOutcome, ClientError> {
    match workflow.state() {
        WorkflowState::Done { task_id, status } => Ok(WorkflowOutcome::Completed {
            task_id: task_id.clone(),
            status: status.clone(),
        }),
        WorkflowState::Failed(err) => Err(err.clone().into()),
        state => {
            tracing::warn!(state = state.name(), "workflow stopped outside a terminal state");
            Ok(WorkflowOutcome::Cancelled)
        }
    }
}
