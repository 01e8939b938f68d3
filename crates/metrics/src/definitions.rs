//! Metric name and label definitions.

/// Agent task and dispatch metrics
pub mod agent {
    /// Tasks handled, labelled by `outcome` (executed, no_action, failed)
    pub const TASKS_TOTAL: &str = "indus_agent_tasks_total";
    /// Task failures by error `kind`
    pub const TASK_ERRORS_TOTAL: &str = "indus_agent_task_errors_total";
    /// Round-trip time of the decision service call in seconds
    pub const DECISION_DURATION_SECONDS: &str = "indus_agent_decision_duration_seconds";
    /// Synthetic input events dispatched, labelled by `event`
    pub const INPUT_EVENTS_TOTAL: &str = "indus_agent_input_events_total";
    /// Dispatches redirected to the host because a nested surface vanished
    pub const SURFACE_FALLBACKS_TOTAL: &str = "indus_agent_surface_fallbacks_total";
    /// Time a task spent waiting for the task gate, in seconds
    pub const GATE_WAIT_SECONDS: &str = "indus_agent_gate_wait_seconds";
}

/// Common label keys
pub mod labels {
    pub const OUTCOME: &str = "outcome";
    pub const KIND: &str = "kind";
    pub const EVENT: &str = "event";
}
