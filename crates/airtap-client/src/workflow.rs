//! The discover → submit → poll workflow as a sans-IO state machine.
//!
//! The machine never touches the connection.  It consumes inbound envelopes
//! and hands back [`Step`]s; the [driver](crate::driver) performs them.
//!
//! ```text
//! Idle ──list_tools──▶ ToolsRequested ──any reply──▶ TaskSubmitting
//!                                                         │ tool_response(submit_task)
//!                                     taskId missing ◀────┤
//!                                        (Failed)         ▼
//!                  Polling ◀──delay, get_task_status── TaskSubmitted
//!                     │
//!                     └──tool_response(get_task_status)──▶ Done
//! ```
//!
//! An `error` envelope in any active state moves to `Failed`.
//!
//! Transitions that go with a request are staged alongside the
//! [`Step::Send`] and only committed by [`Workflow::record_sent`], so a run
//! abandoned before its request goes out stays in the state it was in.

use std::fmt;
use std::time::Duration;

use airtap_protocol::{RequestBody, RequestId, ResponseKind, GET_TASK_STATUS, SUBMIT_TASK};
use serde_json::{json, Value};

use crate::connection::Inbound;
use crate::error::ProtocolError;

/// Task statuses after which polling stops.
const TERMINAL_TASK_STATUSES: &[&str] = &["completed", "failed", "cancelled", "error"];

/// Server-issued identifier of a submitted task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How many status checks to make after submitting.
#[derive(Debug, Clone, PartialEq)]
pub enum PollPolicy {
    /// One `get_task_status` call, whatever it reports.
    Once,
    /// Keep checking every `interval` until the task reports a terminal
    /// status, giving up after `max_attempts` checks.
    UntilTerminal { interval: Duration, max_attempts: u32 },
}

/// Parameters of one workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Natural-language task passed to `submit_task`.
    pub task: String,
    pub precision_mode: bool,
    pub navigate_to_home: bool,
    /// Wait between the submit result and the first status check.
    pub poll_delay: Duration,
    pub poll_policy: PollPolicy,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            task: "Open the calculator app, calculate 25 + 37, and verify the result is 62".into(),
            precision_mode: true,
            navigate_to_home: true,
            poll_delay: Duration::from_secs(5),
            poll_policy: PollPolicy::Once,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    ToolsRequested,
    TaskSubmitting,
    TaskSubmitted { task_id: TaskId },
    Polling { task_id: TaskId },
    Done { task_id: TaskId, status: Value },
    Failed(ProtocolError),
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::ToolsRequested => "tools_requested",
            WorkflowState::TaskSubmitting => "task_submitting",
            WorkflowState::TaskSubmitted { .. } => "task_submitted",
            WorkflowState::Polling { .. } => "polling",
            WorkflowState::Done { .. } => "done",
            WorkflowState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Done { .. } | WorkflowState::Failed(_))
    }
}

/// What the driver should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Send this request, then report its id via [`Workflow::record_sent`]
    /// to commit the transition that goes with it.
    Send(RequestBody),
    /// Sleep, then call [`Workflow::poll`].
    PollAfter(Duration),
    /// Wait for the next inbound envelope.
    Await,
    /// The run reached `Done` or `Failed`.
    Finished,
}

/// The `run_tool` reply the workflow is currently waiting on.
#[derive(Debug, Clone)]
struct Awaiting {
    id: RequestId,
    tool: &'static str,
}

/// Transition held back until its request has been sent.
#[derive(Debug, Clone)]
struct Staged {
    next: WorkflowState,
    /// Tool whose `tool_response` the next state waits on.
    tool: Option<&'static str>,
}

/// State machine for one workflow run.
#[derive(Debug)]
pub struct Workflow {
    settings: WorkflowSettings,
    state: WorkflowState,
    awaiting: Option<Awaiting>,
    staged: Option<Staged>,
    status_checks: u32,
}

impl Workflow {
    pub fn new(settings: WorkflowSettings) -> Self {
        Self {
            settings,
            state: WorkflowState::Idle,
            awaiting: None,
            staged: None,
            status_checks: 0,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// The submitted task, once known.
    pub fn task_id(&self) -> Option<&TaskId> {
        match &self.state {
            WorkflowState::TaskSubmitted { task_id }
            | WorkflowState::Polling { task_id }
            | WorkflowState::Done { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    /// `Idle → ToolsRequested`, committed once `list_tools` is sent.
    pub fn start(&mut self) -> Step {
        match self.state {
            WorkflowState::Idle => {
                self.stage(WorkflowState::ToolsRequested, None, RequestBody::ListTools)
            }
            _ => self.idle_step(),
        }
    }

    /// Tell the machine the last [`Step::Send`] went out under `id`.
    ///
    /// Commits the transition staged with that step.  Without a staged
    /// transition this is a no-op.
    pub fn record_sent(&mut self, id: RequestId) {
        let Some(Staged { next, tool }) = self.staged.take() else {
            tracing::debug!(id = %id, state = self.state.name(), "no staged transition");
            return;
        };
        self.awaiting = tool.map(|tool| Awaiting { id, tool });
        self.transition(next);
    }

    /// `TaskSubmitted → Polling`, once the poll delay has elapsed.
    pub fn poll(&mut self) -> Step {
        let task_id = match &self.state {
            WorkflowState::TaskSubmitted { task_id } => task_id.clone(),
            _ => return self.idle_step(),
        };

        let body = RequestBody::run_tool(GET_TASK_STATUS, json!({ "taskId": task_id.as_str() }));
        self.stage(WorkflowState::Polling { task_id }, Some(GET_TASK_STATUS), body)
    }

    /// Feed one inbound envelope to the machine.
    pub fn on_response(&mut self, inbound: &Inbound) -> Step {
        if self.state.is_terminal() {
            return Step::Finished;
        }

        let response = &inbound.response;

        if let ResponseKind::Error { message } = &response.kind {
            if self.state == WorkflowState::Idle {
                return Step::Await;
            }
            return self.fail(ProtocolError::Server {
                message: message.clone(),
            });
        }

        match (&self.state, &response.kind) {
            (WorkflowState::ToolsRequested, _) => {
                let body = RequestBody::run_tool(
                    SUBMIT_TASK,
                    json!({
                        "task": self.settings.task,
                        "precisionMode": self.settings.precision_mode,
                        "navigateToHome": self.settings.navigate_to_home,
                    }),
                );
                self.stage(WorkflowState::TaskSubmitting, Some(SUBMIT_TASK), body)
            }

            (WorkflowState::TaskSubmitting, ResponseKind::ToolResponse { tool, result })
                if self.is_awaited(inbound, tool) =>
            {
                self.awaiting = None;
                match extract_task_id(result) {
                    Some(task_id) => {
                        tracing::info!(task_id = %task_id, "task submitted");
                        self.transition(WorkflowState::TaskSubmitted { task_id });
                        Step::PollAfter(self.settings.poll_delay)
                    }
                    None => self.fail(ProtocolError::NoTaskId),
                }
            }

            (WorkflowState::Polling { task_id }, ResponseKind::ToolResponse { tool, result })
                if self.is_awaited(inbound, tool) =>
            {
                let task_id = task_id.clone();
                let result = result.clone();
                self.awaiting = None;
                self.status_checks += 1;
                self.after_status_check(task_id, result)
            }

            _ => {
                tracing::debug!(
                    state = self.state.name(),
                    kind = response.kind.name(),
                    "envelope does not advance workflow"
                );
                Step::Await
            }
        }
    }

    fn after_status_check(&mut self, task_id: TaskId, status: Value) -> Step {
        match self.settings.poll_policy {
            PollPolicy::Once => self.finish(task_id, status),
            PollPolicy::UntilTerminal {
                interval,
                max_attempts,
            } => {
                if is_terminal_status(&status) {
                    self.finish(task_id, status)
                } else if self.status_checks >= max_attempts {
                    self.fail(ProtocolError::PollAttemptsExhausted {
                        attempts: self.status_checks,
                    })
                } else {
                    tracing::debug!(
                        task_id = %task_id,
                        checks = self.status_checks,
                        "task still running"
                    );
                    self.transition(WorkflowState::TaskSubmitted { task_id });
                    Step::PollAfter(interval)
                }
            }
        }
    }

    /// Correlate a `tool_response` with the request the machine is waiting
    /// on: by id when the reply carries one, otherwise by tool name.
    fn is_awaited(&self, inbound: &Inbound, tool: &str) -> bool {
        let Some(awaiting) = &self.awaiting else {
            return false;
        };
        match &inbound.response.id {
            Some(got) => *got == awaiting.id,
            None => tool == awaiting.tool,
        }
    }

    fn stage(&mut self, next: WorkflowState, tool: Option<&'static str>, body: RequestBody) -> Step {
        self.staged = Some(Staged { next, tool });
        Step::Send(body)
    }

    fn finish(&mut self, task_id: TaskId, status: Value) -> Step {
        self.transition(WorkflowState::Done { task_id, status });
        Step::Finished
    }

    fn fail(&mut self, err: ProtocolError) -> Step {
        tracing::warn!(state = self.state.name(), error = %err, "workflow failed");
        self.awaiting = None;
        self.staged = None;
        self.transition(WorkflowState::Failed(err));
        Step::Finished
    }

    fn transition(&mut self, next: WorkflowState) {
        tracing::info!(from = self.state.name(), to = next.name(), "workflow transition");
        self.state = next;
    }

    fn idle_step(&self) -> Step {
        if self.state.is_terminal() {
            Step::Finished
        } else {
            Step::Await
        }
    }
}

/// `result.taskId` as a non-empty string; numeric ids are accepted too.
fn extract_task_id(result: &Value) -> Option<TaskId> {
    match result.get("taskId")? {
        Value::String(s) if !s.is_empty() => Some(TaskId::new(s.clone())),
        Value::Number(n) => Some(TaskId::new(n.to_string())),
        _ => None,
    }
}

fn is_terminal_status(result: &Value) -> bool {
    result
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|status| {
            TERMINAL_TASK_STATUSES
                .iter()
                .any(|t| t.eq_ignore_ascii_case(status))
        })
}

#[cfg(test)]
mod tests {
    use airtap_protocol::decode;

    use super::*;

    fn inbound(value: Value) -> Inbound {
        Inbound {
            response: decode(&value.to_string()).unwrap(),
            request: None,
        }
    }

    /// Acknowledge a `Send` step as transmitted under `id`.
    fn sent(wf: &mut Workflow, step: Step, id: u64) {
        assert!(matches!(step, Step::Send(_)), "expected a send, got {step:?}");
        wf.record_sent(RequestId::from(id));
    }

    /// A run that has sent `list_tools` and `submit_task` (ids 1 and 2).
    fn submitting(settings: WorkflowSettings) -> Workflow {
        let mut wf = Workflow::new(settings);
        let step = wf.start();
        sent(&mut wf, step, 1);
        let step = wf.on_response(&inbound(json!({"type": "tools_list", "id": "1", "tools": []})));
        sent(&mut wf, step, 2);
        wf
    }

    fn submitted(task_id: &str) -> Workflow {
        let mut wf = submitting(WorkflowSettings::default());
        let step = wf.on_response(&inbound(json!({
            "type": "tool_response", "id": "2", "tool": "submit_task", "result": {"taskId": task_id}
        })));
        assert_eq!(step, Step::PollAfter(Duration::from_secs(5)));
        wf
    }

    #[test]
    fn start_requests_tools_and_commits_on_send() {
        let mut wf = Workflow::new(WorkflowSettings::default());
        assert_eq!(wf.start(), Step::Send(RequestBody::ListTools));
        assert_eq!(wf.state(), &WorkflowState::Idle);

        wf.record_sent(RequestId::from(1));
        assert_eq!(wf.state(), &WorkflowState::ToolsRequested);
    }

    #[test]
    fn record_sent_without_staged_step_is_noop() {
        let mut wf = Workflow::new(WorkflowSettings::default());
        wf.record_sent(RequestId::from(9));
        assert_eq!(wf.state(), &WorkflowState::Idle);
    }

    #[test]
    fn any_reply_to_list_tools_submits_the_task() {
        let mut wf = Workflow::new(WorkflowSettings {
            task: "open notes".into(),
            precision_mode: false,
            navigate_to_home: true,
            ..Default::default()
        });
        let step = wf.start();
        sent(&mut wf, step, 1);
        let step = wf.on_response(&inbound(json!({"type": "server_info", "server": "Airtap MCP"})));
        assert_eq!(
            step,
            Step::Send(RequestBody::run_tool(
                "submit_task",
                json!({"task": "open notes", "precisionMode": false, "navigateToHome": true})
            ))
        );
        assert_eq!(wf.state(), &WorkflowState::ToolsRequested);

        wf.record_sent(RequestId::from(2));
        assert_eq!(wf.state(), &WorkflowState::TaskSubmitting);
    }

    #[test]
    fn task_id_flows_into_status_request() {
        let mut wf = submitted("T1");
        let task_id = TaskId::new("T1");
        assert_eq!(
            wf.state(),
            &WorkflowState::TaskSubmitted {
                task_id: task_id.clone()
            }
        );

        let step = wf.poll();
        match &step {
            Step::Send(RequestBody::RunTool { tool, params }) => {
                assert_eq!(tool, "get_task_status");
                assert_eq!(params["taskId"], json!("T1"));
            }
            other => panic!("expected status request, got {other:?}"),
        }
        // Still submitted until the status check actually goes out.
        assert_eq!(
            wf.state(),
            &WorkflowState::TaskSubmitted {
                task_id: task_id.clone()
            }
        );

        sent(&mut wf, step, 3);
        assert_eq!(wf.state(), &WorkflowState::Polling { task_id });
    }

    #[test]
    fn missing_task_id_fails_without_further_requests() {
        let mut wf = submitting(WorkflowSettings::default());
        let step = wf.on_response(&inbound(json!({
            "type": "tool_response", "tool": "submit_task", "result": {"accepted": true}
        })));
        assert_eq!(step, Step::Finished);
        assert_eq!(wf.state(), &WorkflowState::Failed(ProtocolError::NoTaskId));

        // Nothing more comes out of a failed run.
        assert_eq!(wf.poll(), Step::Finished);
        assert_eq!(
            wf.on_response(&inbound(json!({"type": "tools_list", "tools": []}))),
            Step::Finished
        );
    }

    #[test]
    fn empty_task_id_counts_as_missing() {
        let mut wf = submitting(WorkflowSettings::default());
        wf.on_response(&inbound(json!({
            "type": "tool_response", "tool": "submit_task", "result": {"taskId": ""}
        })));
        assert_eq!(wf.state(), &WorkflowState::Failed(ProtocolError::NoTaskId));
    }

    #[test]
    fn numeric_task_id_is_accepted() {
        assert_eq!(extract_task_id(&json!({"taskId": 42})), Some(TaskId::new("42")));
        assert_eq!(extract_task_id(&Value::Null), None);
    }

    #[test]
    fn error_in_any_active_state_fails_with_server_message() {
        let message = "Task execution failed: app \"Calculator\" not found";
        let error = || inbound(json!({"type": "error", "message": message}));
        let expected = WorkflowState::Failed(ProtocolError::Server {
            message: message.into(),
        });

        // ToolsRequested
        let mut wf = Workflow::new(WorkflowSettings::default());
        let step = wf.start();
        sent(&mut wf, step, 1);
        assert_eq!(wf.on_response(&error()), Step::Finished);
        assert_eq!(wf.state(), &expected);

        // TaskSubmitting
        let mut wf = submitting(WorkflowSettings::default());
        wf.on_response(&error());
        assert_eq!(wf.state(), &expected);

        // TaskSubmitted
        let mut wf = submitted("T1");
        wf.on_response(&error());
        assert_eq!(wf.state(), &expected);

        // Polling
        let mut wf = submitted("T1");
        let step = wf.poll();
        sent(&mut wf, step, 3);
        wf.on_response(&error());
        assert_eq!(wf.state(), &expected);

        // A staged transition dies with the run.
        wf.record_sent(RequestId::from(4));
        assert_eq!(wf.state(), &expected);
    }

    #[test]
    fn structured_error_message_still_fails_the_run() {
        let mut wf = submitting(WorkflowSettings::default());
        let step = wf.on_response(&inbound(json!({
            "type": "error", "id": "2", "message": {"code": 503, "text": "busy"}
        })));
        assert_eq!(step, Step::Finished);
        assert_eq!(
            wf.state(),
            &WorkflowState::Failed(ProtocolError::Server {
                message: r#"{"code":503,"text":"busy"}"#.into()
            })
        );
    }

    #[test]
    fn error_while_idle_is_ignored() {
        let mut wf = Workflow::new(WorkflowSettings::default());
        let step = wf.on_response(&inbound(json!({"type": "error", "message": "early"})));
        assert_eq!(step, Step::Await);
        assert_eq!(wf.state(), &WorkflowState::Idle);
    }

    #[test]
    fn acknowledgement_does_not_advance() {
        let mut wf = submitting(WorkflowSettings::default());
        let step = wf.on_response(&inbound(json!({"type": "request_received", "tool": "submit_task"})));
        assert_eq!(step, Step::Await);
        assert_eq!(wf.state(), &WorkflowState::TaskSubmitting);
    }

    #[test]
    fn reply_for_another_id_is_ignored() {
        let mut wf = submitting(WorkflowSettings::default());
        let stray = inbound(json!({
            "type": "tool_response", "id": "7", "tool": "submit_task", "result": {"taskId": "wrong"}
        }));
        assert_eq!(wf.on_response(&stray), Step::Await);
        assert_eq!(wf.state(), &WorkflowState::TaskSubmitting);
    }

    #[test]
    fn uncorrelated_reply_matches_by_tool_name() {
        let mut wf = submitting(WorkflowSettings::default());

        let other_tool = inbound(json!({"type": "tool_response", "tool": "open_app", "result": {}}));
        assert_eq!(wf.on_response(&other_tool), Step::Await);

        let submit = inbound(json!({
            "type": "tool_response", "tool": "submit_task", "result": {"taskId": "abc"}
        }));
        assert_eq!(
            wf.on_response(&submit),
            Step::PollAfter(Duration::from_secs(5))
        );
    }

    #[test]
    fn single_status_check_finishes() {
        let mut wf = submitted("abc123");
        let step = wf.poll();
        sent(&mut wf, step, 3);
        let step = wf.on_response(&inbound(json!({
            "type": "tool_response", "id": "3", "tool": "get_task_status", "result": {"status": "running"}
        })));
        assert_eq!(step, Step::Finished);
        assert_eq!(
            wf.state(),
            &WorkflowState::Done {
                task_id: TaskId::new("abc123"),
                status: json!({"status": "running"}),
            }
        );
    }

    fn polling_until_terminal(interval: Duration, max_attempts: u32) -> Workflow {
        let mut wf = submitting(WorkflowSettings {
            poll_policy: PollPolicy::UntilTerminal {
                interval,
                max_attempts,
            },
            ..Default::default()
        });
        wf.on_response(&inbound(json!({
            "type": "tool_response", "tool": "submit_task", "result": {"taskId": "T9"}
        })));
        wf
    }

    fn status(s: &str) -> Inbound {
        inbound(json!({"type": "tool_response", "tool": "get_task_status", "result": {"status": s}}))
    }

    #[test]
    fn until_terminal_polls_again_while_running() {
        let mut wf = polling_until_terminal(Duration::from_secs(2), 3);

        let step = wf.poll();
        sent(&mut wf, step, 3);
        assert_eq!(wf.on_response(&status("running")), Step::PollAfter(Duration::from_secs(2)));
        assert!(matches!(wf.state(), WorkflowState::TaskSubmitted { .. }));

        let step = wf.poll();
        sent(&mut wf, step, 4);
        assert_eq!(wf.on_response(&status("Completed")), Step::Finished);
        assert!(matches!(wf.state(), WorkflowState::Done { .. }));
    }

    #[test]
    fn until_terminal_gives_up_after_max_attempts() {
        let mut wf = polling_until_terminal(Duration::from_secs(1), 2);

        let step = wf.poll();
        sent(&mut wf, step, 3);
        wf.on_response(&status("running"));
        let step = wf.poll();
        sent(&mut wf, step, 4);
        assert_eq!(wf.on_response(&status("running")), Step::Finished);
        assert_eq!(
            wf.state(),
            &WorkflowState::Failed(ProtocolError::PollAttemptsExhausted { attempts: 2 })
        );
    }
}
