//! Browser agent dispatch pipeline.
//!
//! Turns a natural-language goal into one synthetic input action on a host
//! window that embeds web content in nested surfaces:
//!
//! 1. capture the window and upload it to the decision service
//! 2. pick one candidate action from the response
//! 3. convert its device-pixel coordinates to host DIP
//! 4. route the point to the embedded surface under it (or the host)
//! 5. dispatch the primitive input sequence for that action
//!
//! The UI layer is reached only through the [`HostWindow`] trait.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use indus_agent::{AgentSettings, RecordingHost, TaskCoordinator};
//!
//! let host = Arc::new(RecordingHost::new("main", Some(screenshot)));
//! let coordinator = TaskCoordinator::new(host, AgentSettings::default())?;
//!
//! let report = coordinator.handle_task("open the pricing page").await;
//! ```

pub mod capture;
pub mod client;
pub mod coordinator;
pub mod coords;
pub mod error;
pub mod executor;
pub mod host;
pub mod router;
pub mod types;

pub use {
    client::{Candidate, DecisionResult, DecisionServiceClient},
    coordinator::{TaskContext, TaskCoordinator, TaskOutcome, TaskReport},
    coords::CoordinateResolver,
    error::{AgentError, Result},
    executor::{ActionExecutor, ResolvedAction},
    host::{HostCall, HostWindow, RecordingHost, layout_snapshot},
    router::Route,
    types::{
        Action, AgentSettings, DispatchTimings, InputEvent, LayoutSnapshot, MouseButton, Point,
        Rect, ScreenshotContext, SurfaceDescriptor, SurfaceId, SurfaceTarget,
    },
};
