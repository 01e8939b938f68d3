//! Boundary to the host UI layer.
//!
//! The window chrome, tab strip and embedded content views live outside this
//! crate. The dispatch pipeline only sees them through [`HostWindow`].

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

use {
    async_trait::async_trait,
    serde::Serialize,
    tracing::{debug, info},
};

use crate::{
    error::{AgentError, Result},
    types::{InputEvent, LayoutSnapshot, Rect, ScreenshotContext, SurfaceDescriptor, SurfaceTarget},
};

/// Primitives the host UI layer exposes to the agent.
///
/// Layout queries are live: implementations must not cache region bounds,
/// the surface list, or the display scale factor between calls.
#[async_trait]
pub trait HostWindow: Send + Sync {
    /// Identifier of the window this host drives.
    fn window_id(&self) -> &str;

    /// Capture the window, stamping the display scale factor at capture time.
    async fn capture_screenshot(&self) -> Result<ScreenshotContext>;

    /// Bounds of the embedded-content region in host DIP, if one is laid out.
    async fn embedded_region_bounds(&self) -> Result<Option<Rect>>;

    /// Surfaces currently attached to the window.
    async fn list_nested_surfaces(&self) -> Result<Vec<SurfaceDescriptor>>;

    async fn focus_window(&self) -> Result<()>;

    async fn focus_surface(&self, target: &SurfaceTarget) -> Result<()>;

    async fn dispatch_input_event(&self, target: &SurfaceTarget, event: InputEvent) -> Result<()>;

    /// Hand a navigation request to the UI-state layer.
    async fn send_navigate(&self, url: &str) -> Result<()>;
}

/// Read the region bounds and surface list in one go.
pub async fn layout_snapshot(host: &dyn HostWindow) -> Result<LayoutSnapshot> {
    let region = host.embedded_region_bounds().await?;
    let surfaces = host.list_nested_surfaces().await?;
    Ok(LayoutSnapshot { region, surfaces })
}

/// A call observed by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
    FocusWindow,
    FocusSurface {
        target: SurfaceTarget,
    },
    Input {
        target: SurfaceTarget,
        event: InputEvent,
    },
    Navigate {
        url: String,
    },
}

/// In-memory host that serves a fixed screenshot and scripted layouts and
/// records every effect instead of performing it.
///
/// Used for dry runs from the CLI and as the test double for the pipeline.
pub struct RecordingHost {
    window_id: String,
    screenshot: Option<ScreenshotContext>,
    layouts: Mutex<VecDeque<LayoutSnapshot>>,
    calls: Mutex<Vec<HostCall>>,
    fail_input_at: Option<usize>,
    inputs_seen: Mutex<usize>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingHost {
    pub fn new(window_id: impl Into<String>, screenshot: Option<ScreenshotContext>) -> Self {
        Self {
            window_id: window_id.into(),
            screenshot,
            layouts: Mutex::new(VecDeque::from([LayoutSnapshot::default()])),
            calls: Mutex::new(Vec::new()),
            fail_input_at: None,
            inputs_seen: Mutex::new(0),
        }
    }

    /// Serve `layout` on every read.
    pub fn with_layout(self, layout: LayoutSnapshot) -> Self {
        self.with_layout_sequence(vec![layout])
    }

    /// Serve each layout once, in order, repeating the last one forever.
    /// One layout read consumes one surface-list call.
    pub fn with_layout_sequence(self, layouts: Vec<LayoutSnapshot>) -> Self {
        if !layouts.is_empty() {
            *lock(&self.layouts) = layouts.into();
        }
        self
    }

    /// Fail the `n`th input event (0-based) with a dispatch error.
    pub fn fail_input_at(mut self, n: usize) -> Self {
        self.fail_input_at = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        lock(&self.calls).clone()
    }

    /// Only the input events, with their targets.
    pub fn input_events(&self) -> Vec<(SurfaceTarget, InputEvent)> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                HostCall::Input { target, event } => Some((target.clone(), event.clone())),
                _ => None,
            })
            .collect()
    }

    fn current_layout(&self) -> LayoutSnapshot {
        lock(&self.layouts).front().cloned().unwrap_or_default()
    }

    fn record(&self, call: HostCall) {
        debug!(window = %self.window_id, ?call, "host call");
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl HostWindow for RecordingHost {
    fn window_id(&self) -> &str {
        &self.window_id
    }

    async fn capture_screenshot(&self) -> Result<ScreenshotContext> {
        self.screenshot
            .clone()
            .ok_or_else(|| AgentError::Capture("no screenshot available".into()))
    }

    async fn embedded_region_bounds(&self) -> Result<Option<Rect>> {
        Ok(self.current_layout().region)
    }

    async fn list_nested_surfaces(&self) -> Result<Vec<SurfaceDescriptor>> {
        let mut layouts = lock(&self.layouts);
        let surfaces = layouts
            .front()
            .map(|l| l.surfaces.clone())
            .unwrap_or_default();
        if layouts.len() > 1 {
            layouts.pop_front();
        }
        Ok(surfaces)
    }

    async fn focus_window(&self) -> Result<()> {
        self.record(HostCall::FocusWindow);
        Ok(())
    }

    async fn focus_surface(&self, target: &SurfaceTarget) -> Result<()> {
        self.record(HostCall::FocusSurface {
            target: target.clone(),
        });
        Ok(())
    }

    async fn dispatch_input_event(&self, target: &SurfaceTarget, event: InputEvent) -> Result<()> {
        let index = {
            let mut seen = lock(&self.inputs_seen);
            let index = *seen;
            *seen += 1;
            index
        };
        if self.fail_input_at == Some(index) {
            return Err(AgentError::Dispatch(format!(
                "{} rejected by {target}",
                event.name()
            )));
        }
        self.record(HostCall::Input {
            target: target.clone(),
            event,
        });
        Ok(())
    }

    async fn send_navigate(&self, url: &str) -> Result<()> {
        info!(window = %self.window_id, url, "navigate forwarded to UI layer");
        self.record(HostCall::Navigate {
            url: url.to_string(),
        });
        Ok(())
    }
}
