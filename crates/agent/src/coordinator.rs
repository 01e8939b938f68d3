//! One agent task, end to end.
//!
//! capture → (plan) → decide → select one action → resolve → route →
//! revalidate → execute. Tasks on one coordinator are serialised by a
//! single-slot gate, so the primitive sequences of two tasks never interleave.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use {
    serde::Serialize,
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
    uuid::Uuid,
};

use crate::{
    capture::prepare_for_upload,
    client::DecisionServiceClient,
    coords::CoordinateResolver,
    error::{AgentError, Result},
    executor::{ActionExecutor, ResolvedAction},
    host::{HostWindow, layout_snapshot},
    router::{Route, revalidate, route},
    types::{Action, AgentSettings, LayoutSnapshot, Point},
};

/// Per-task state threaded through resolution and routing.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    pub window_id: String,
    /// Display scale factor stamped on the screenshot at capture time.
    pub display_scale: f64,
    /// Per-axis downscale applied before upload (1.0 when untouched).
    pub resize_x: f64,
    pub resize_y: f64,
    /// Layout read right after the action was selected.
    pub layout: LayoutSnapshot,
}

impl TaskContext {
    /// Uploaded-image pixels per host DIP, `(x, y)`.
    pub fn effective_scale(&self) -> (f64, f64) {
        (
            self.display_scale * self.resize_x,
            self.display_scale * self.resize_y,
        )
    }
}

/// What a successful task did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Executed { action: Action, events: usize },
    /// The service returned no candidates.
    NoAction,
}

impl TaskOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Executed { .. } => "executed",
            Self::NoAction => "no_action",
        }
    }
}

/// Result of [`TaskCoordinator::handle_task`].
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task_id: String,
    pub window_id: String,
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TaskOutcome>,

    /// Error message if the task failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Stable error category, see [`AgentError::kind`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,

    pub duration_ms: u64,
}

impl TaskReport {
    fn completed(task_id: String, window_id: String, outcome: TaskOutcome, duration_ms: u64) -> Self {
        Self {
            task_id,
            window_id,
            success: true,
            outcome: Some(outcome),
            error: None,
            error_kind: None,
            duration_ms,
        }
    }

    fn failed(task_id: String, window_id: String, err: &AgentError, duration_ms: u64) -> Self {
        Self {
            task_id,
            window_id,
            success: false,
            outcome: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            duration_ms,
        }
    }
}

/// Drives agent tasks against one host window.
pub struct TaskCoordinator {
    host: Arc<dyn HostWindow>,
    client: DecisionServiceClient,
    executor: ActionExecutor,
    settings: AgentSettings,
    gate: Mutex<()>,
}

impl TaskCoordinator {
    pub fn new(host: Arc<dyn HostWindow>, settings: AgentSettings) -> Result<Self> {
        let client = DecisionServiceClient::new(&settings)?;
        Ok(Self::with_client(host, client, settings))
    }

    pub fn with_client(
        host: Arc<dyn HostWindow>,
        client: DecisionServiceClient,
        settings: AgentSettings,
    ) -> Self {
        let executor = ActionExecutor::new(settings.timings, settings.allowed_domains.clone());
        info!(
            window = host.window_id(),
            service = client.base_url(),
            plan_before_act = settings.plan_before_act,
            "task coordinator initialized"
        );
        Self {
            host,
            client,
            executor,
            settings,
            gate: Mutex::new(()),
        }
    }

    /// Run a task and fold the result into a report. Never fails.
    pub async fn handle_task(&self, goal: &str) -> TaskReport {
        let task_id = Uuid::new_v4().to_string();
        let window_id = self.host.window_id().to_string();
        let start = Instant::now();

        let result = self.run_task(&task_id, goal).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                info!(%task_id, outcome = outcome.label(), duration_ms, "task finished");
                TaskReport::completed(task_id, window_id, outcome, duration_ms)
            },
            Err(e) => {
                warn!(%task_id, kind = e.kind(), error = %e, duration_ms, "task failed");
                TaskReport::failed(task_id, window_id, &e, duration_ms)
            },
        }
    }

    /// Run one task: at most one action is executed.
    pub async fn run(&self, goal: &str) -> Result<TaskOutcome> {
        self.run_task(&Uuid::new_v4().to_string(), goal).await
    }

    async fn run_task(&self, task_id: &str, goal: &str) -> Result<TaskOutcome> {
        let waited = Instant::now();
        let _slot = self.gate.lock().await;

        #[cfg(feature = "metrics")]
        indus_metrics::histogram!(indus_metrics::agent::GATE_WAIT_SECONDS)
            .record(waited.elapsed().as_secs_f64());

        debug!(
            task_id,
            waited_ms = waited.elapsed().as_millis() as u64,
            "task slot acquired"
        );
        info!(task_id, window = self.host.window_id(), goal, "starting task");

        let result = self.run_locked(task_id, goal).await;

        #[cfg(feature = "metrics")]
        {
            let outcome = match &result {
                Ok(o) => o.label(),
                Err(_) => "failed",
            };
            indus_metrics::counter!(
                indus_metrics::agent::TASKS_TOTAL,
                indus_metrics::labels::OUTCOME => outcome
            )
            .increment(1);
            if let Err(e) = &result {
                indus_metrics::counter!(
                    indus_metrics::agent::TASK_ERRORS_TOTAL,
                    indus_metrics::labels::KIND => e.kind()
                )
                .increment(1);
            }
        }

        result
    }

    async fn run_locked(&self, task_id: &str, goal: &str) -> Result<TaskOutcome> {
        if self.settings.plan_before_act {
            match self.client.plan(goal).await {
                Ok(plan) => info!(task_id, %plan, "planner responded"),
                // Planning is advisory; the decision call still runs.
                Err(e) => warn!(task_id, error = %e, "planner request failed"),
            }
        }

        let shot = self.host.capture_screenshot().await?;
        let shot = prepare_for_upload(shot, self.settings.max_screenshot_dimension)?;

        let started = Instant::now();
        let decision = self.client.submit(goal, &shot).await?;

        #[cfg(feature = "metrics")]
        indus_metrics::histogram!(indus_metrics::agent::DECISION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        debug!(
            task_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "decision round-trip"
        );

        let Some(action) = decision.select().cloned() else {
            info!(task_id, "decision service returned no candidates");
            return Ok(TaskOutcome::NoAction);
        };
        info!(task_id, %action, "selected action");

        let ctx = TaskContext {
            task_id: task_id.to_string(),
            window_id: self.host.window_id().to_string(),
            display_scale: shot.scale_factor,
            resize_x: shot.resize_x,
            resize_y: shot.resize_y,
            layout: layout_snapshot(self.host.as_ref()).await?,
        };

        let resolved = self.resolve(&ctx, &action).await?;
        let events = self.executor.execute(self.host.as_ref(), &resolved).await?;

        Ok(TaskOutcome::Executed { action, events })
    }

    /// Convert a service action into executor input.
    async fn resolve(&self, ctx: &TaskContext, action: &Action) -> Result<ResolvedAction> {
        Ok(match action {
            Action::Click { x, y, button } => ResolvedAction::Click {
                route: self.locate(ctx, Point::new(*x, *y)).await?,
                button: *button,
            },
            Action::Scroll {
                x,
                y,
                delta_x,
                delta_y,
            } => ResolvedAction::Scroll {
                route: self.locate(ctx, Point::new(*x, *y)).await?,
                delta_x: *delta_x,
                delta_y: *delta_y,
            },
            Action::Navigate { url } => ResolvedAction::Navigate { url: url.clone() },
            Action::TypeText { text } => ResolvedAction::TypeText { text: text.clone() },
            Action::KeyPress { key_code } => ResolvedAction::KeyPress {
                key_code: key_code.clone(),
            },
            Action::Wait { duration_ms } => ResolvedAction::Wait {
                duration: Duration::from_millis(*duration_ms),
            },
        })
    }

    /// Device pixels → host DIP → route against the selection-time layout,
    /// then check the route against a fresh layout read.
    async fn locate(&self, ctx: &TaskContext, device: Point) -> Result<Route> {
        let (scale_x, scale_y) = ctx.effective_scale();
        let resolver = CoordinateResolver::per_axis(scale_x, scale_y)?;
        let host_point = resolver.to_host_dip(device);
        let planned = route(host_point, &ctx.layout);

        debug!(
            task_id = %ctx.task_id,
            %device,
            %host_point,
            surface = %planned.target,
            local = %planned.point,
            "planned route"
        );

        let live = layout_snapshot(self.host.as_ref()).await?;
        match revalidate(&planned, &live) {
            Ok(route) => Ok(route),
            Err(AgentError::MissingSurface { surface }) => {
                warn!(
                    task_id = %ctx.task_id,
                    window = %ctx.window_id,
                    %surface,
                    "planned surface vanished, falling back to host"
                );

                #[cfg(feature = "metrics")]
                indus_metrics::counter!(indus_metrics::agent::SURFACE_FALLBACKS_TOTAL).increment(1);

                Ok(Route::host(planned.host_point))
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::{
            host::{HostCall, RecordingHost},
            types::{
                DispatchTimings, InputEvent, Rect, ScreenshotContext, SurfaceDescriptor, SurfaceId,
                SurfaceTarget,
            },
        },
        mockito::Server,
    };

    fn shot() -> ScreenshotContext {
        // Fits under the default limit, so the bytes are never decoded.
        ScreenshotContext::new(b"\x89PNG fake".to_vec(), 1024, 768, 2.0)
    }

    fn tab_layout(id: &str) -> LayoutSnapshot {
        LayoutSnapshot {
            region: Some(Rect::new(100.0, 50.0, 800.0, 600.0)),
            surfaces: vec![SurfaceDescriptor {
                id: SurfaceId::from(id),
                bounds: Rect::new(100.0, 50.0, 800.0, 600.0),
                is_focused: true,
                is_guest: true,
            }],
        }
    }

    fn settings(server: &Server) -> AgentSettings {
        AgentSettings {
            service_url: server.url(),
            timings: DispatchTimings::immediate(),
            ..AgentSettings::default()
        }
    }

    fn coordinator(host: Arc<RecordingHost>, settings: AgentSettings) -> TaskCoordinator {
        TaskCoordinator::new(host, settings).unwrap()
    }

    #[tokio::test]
    async fn click_inside_region_lands_on_guest_local_point() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/computer")
            .with_status(200)
            .with_body(r#"[{"action":{"type":"click","x":500,"y":300}}]"#)
            .create_async()
            .await;

        let host = Arc::new(RecordingHost::new("win-1", Some(shot())).with_layout(tab_layout("tab-1")));
        let coord = coordinator(host.clone(), settings(&server));

        let outcome = coord.run("open the docs").await.unwrap();
        assert!(matches!(outcome, TaskOutcome::Executed { events: 3, .. }));
        mock.assert_async().await;

        let tab = SurfaceTarget::Guest(SurfaceId::from("tab-1"));
        let events = host.input_events();
        assert_eq!(events.len(), 3);
        for (target, event) in &events {
            assert_eq!(target, &tab);
            match event {
                InputEvent::MouseMove { x, y }
                | InputEvent::MouseDown { x, y, .. }
                | InputEvent::MouseUp { x, y, .. } => assert_eq!((*x, *y), (150.0, 100.0)),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn click_outside_region_lands_on_host() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/computer")
            .with_status(200)
            .with_body(r#"[{"action":{"type":"click","x":50,"y":50}}]"#)
            .create_async()
            .await;

        let host = Arc::new(RecordingHost::new("win-1", Some(shot())).with_layout(tab_layout("tab-1")));
        coordinator(host.clone(), settings(&server))
            .run("click the logo")
            .await
            .unwrap();

        let events = host.input_events();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|(t, _)| t == &SurfaceTarget::Host));
        assert_eq!(events[0].1, InputEvent::MouseMove { x: 25.0, y: 25.0 });
    }

    #[tokio::test]
    async fn empty_candidate_list_is_a_no_op() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/computer")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let host = Arc::new(RecordingHost::new("win-1", Some(shot())).with_layout(tab_layout("tab-1")));
        let report = coordinator(host.clone(), settings(&server))
            .handle_task("nothing to do")
            .await;

        assert!(report.success);
        assert_eq!(report.outcome, Some(TaskOutcome::NoAction));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn primary_candidate_is_executed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/computer")
            .with_status(200)
            .with_body(
                r#"{"schemaVersion":1,"candidates":[
                    {"action":{"type":"click","x":500,"y":300}},
                    {"action":{"type":"keypress","keyCode":"Enter"},"primary":true}
                ]}"#,
            )
            .create_async()
            .await;

        let host = Arc::new(RecordingHost::new("win-1", Some(shot())));
        let outcome = coordinator(host.clone(), settings(&server))
            .run("submit the form")
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            TaskOutcome::Executed { action: Action::KeyPress { .. }, events: 2 }
        ));
        assert_eq!(host.input_events().len(), 2);
    }

    #[tokio::test]
    async fn capture_failure_is_reported() {
        let server = Server::new_async().await;
        let host = Arc::new(RecordingHost::new("win-1", None));
        let report = coordinator(host, settings(&server)).handle_task("anything").await;

        assert!(!report.success);
        assert_eq!(report.error_kind, Some("capture"));
        assert!(report.outcome.is_none());
    }

    #[tokio::test]
    async fn service_error_is_reported_without_dispatch() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/computer")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let host = Arc::new(RecordingHost::new("win-1", Some(shot())));
        let report = coordinator(host.clone(), settings(&server))
            .handle_task("anything")
            .await;

        assert_eq!(report.error_kind, Some("service"));
        assert!(report.error.unwrap().contains("503"));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn vanished_guest_falls_back_to_host() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/computer")
            .with_status(200)
            .with_body(r#"[{"action":{"type":"click","x":500,"y":300}}]"#)
            .create_async()
            .await;

        // Tab closes between selection and dispatch.
        let gone = LayoutSnapshot {
            surfaces: Vec::new(),
            ..tab_layout("tab-1")
        };
        let host = Arc::new(
            RecordingHost::new("win-1", Some(shot()))
                .with_layout_sequence(vec![tab_layout("tab-1"), gone]),
        );
        coordinator(host.clone(), settings(&server))
            .run("click")
            .await
            .unwrap();

        let events = host.input_events();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|(t, _)| t == &SurfaceTarget::Host));
        assert_eq!(events[0].1, InputEvent::MouseMove { x: 250.0, y: 150.0 });
    }

    #[tokio::test]
    async fn planning_failure_does_not_block_decision() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat")
            .with_status(500)
            .create_async()
            .await;
        let decide = server
            .mock("POST", "/computer")
            .with_status(200)
            .with_body(r#"[{"action":{"type":"wait","durationMs":10}}]"#)
            .create_async()
            .await;

        let host = Arc::new(RecordingHost::new("win-1", Some(shot())));
        let report = coordinator(host, AgentSettings {
            plan_before_act: true,
            ..settings(&server)
        })
        .handle_task("wait a bit")
        .await;

        assert!(report.success);
        decide.assert_async().await;
    }

    #[tokio::test]
    async fn concurrent_tasks_do_not_interleave() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/computer")
            .with_status(200)
            .with_body(r#"[{"action":{"type":"click","x":500,"y":300}}]"#)
            .expect(2)
            .create_async()
            .await;

        let host = Arc::new(RecordingHost::new("win-1", Some(shot())).with_layout(tab_layout("tab-1")));
        let coord = Arc::new(coordinator(host.clone(), AgentSettings {
            timings: DispatchTimings {
                settle: Duration::from_millis(5),
                step: Duration::from_millis(5),
                max_wait: Duration::ZERO,
            },
            ..settings(&server)
        }));

        let (a, b) = tokio::join!(coord.run("first"), coord.run("second"));
        a.unwrap();
        b.unwrap();

        let calls = host.calls();
        assert_eq!(calls.len(), 10);
        for task in calls.chunks(5) {
            assert_eq!(task[0], HostCall::FocusWindow);
            assert!(matches!(task[1], HostCall::FocusSurface { .. }));
            assert!(matches!(task[2], HostCall::Input { event: InputEvent::MouseMove { .. }, .. }));
            assert!(matches!(task[3], HostCall::Input { event: InputEvent::MouseDown { .. }, .. }));
            assert!(matches!(task[4], HostCall::Input { event: InputEvent::MouseUp { .. }, .. }));
        }
    }

    #[test]
    fn report_serializes_outcome_and_omits_empty_error() {
        let report = TaskReport::completed(
            "t".into(),
            "w".into(),
            TaskOutcome::Executed {
                action: Action::Navigate {
                    url: "https://example.com".into(),
                },
                events: 0,
            },
            12,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["status"], "executed");
        assert_eq!(json["outcome"]["action"]["type"], "navigate");
        assert!(json.get("error").is_none());
    }
}
