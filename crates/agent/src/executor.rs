//! Turns one resolved action into primitive host effects.

use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    error::{AgentError, Result},
    host::HostWindow,
    router::Route,
    types::{DispatchTimings, InputEvent, MouseButton, SurfaceTarget, is_domain_allowed},
};

/// An action whose coordinates are already DIP and local to the target
/// surface. Only the coordinator builds these.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedAction {
    Click {
        route: Route,
        button: MouseButton,
    },
    Scroll {
        route: Route,
        delta_x: f64,
        delta_y: f64,
    },
    Navigate {
        url: String,
    },
    TypeText {
        text: String,
    },
    KeyPress {
        key_code: String,
    },
    Wait {
        duration: Duration,
    },
}

/// Dispatches the primitive sequence for one action.
///
/// Primitives run strictly in order, each awaited before the next. The first
/// failure aborts the rest of the sequence; nothing already sent is undone.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    timings: DispatchTimings,
    allowed_domains: Vec<String>,
}

impl ActionExecutor {
    pub fn new(timings: DispatchTimings, allowed_domains: Vec<String>) -> Self {
        Self {
            timings,
            allowed_domains,
        }
    }

    /// Execute `action`, returning the number of input events dispatched.
    pub async fn execute(&self, host: &dyn HostWindow, action: &ResolvedAction) -> Result<usize> {
        match action {
            ResolvedAction::Click { route, button } => self.click(host, route, *button).await,
            ResolvedAction::Scroll {
                route,
                delta_x,
                delta_y,
            } => self.scroll(host, route, *delta_x, *delta_y).await,
            ResolvedAction::Navigate { url } => self.navigate(host, url).await,
            ResolvedAction::TypeText { text } => self.type_text(host, text).await,
            ResolvedAction::KeyPress { key_code } => self.key_press(host, key_code).await,
            ResolvedAction::Wait { duration } => self.wait(*duration).await,
        }
    }

    async fn click(&self, host: &dyn HostWindow, route: &Route, button: MouseButton) -> Result<usize> {
        let (x, y) = (route.point.x, route.point.y);

        step(host.focus_window().await, "focus window")?;
        step(host.focus_surface(&route.target).await, "focus surface")?;
        pause(self.timings.settle).await;

        send(host, &route.target, InputEvent::MouseMove { x, y }).await?;
        pause(self.timings.step).await;
        send(host, &route.target, InputEvent::MouseDown {
            x,
            y,
            button,
            click_count: 1,
        })
        .await?;
        pause(self.timings.step).await;
        send(host, &route.target, InputEvent::MouseUp {
            x,
            y,
            button,
            click_count: 1,
        })
        .await?;

        debug!(surface = %route.target, x, y, ?button, "clicked");
        Ok(3)
    }

    async fn scroll(
        &self,
        host: &dyn HostWindow,
        route: &Route,
        delta_x: f64,
        delta_y: f64,
    ) -> Result<usize> {
        step(host.focus_surface(&route.target).await, "focus surface")?;
        pause(self.timings.settle).await;

        // Host wheel events count positive deltaY as "content moves down",
        // the service means "page scrolls down".
        send(host, &route.target, InputEvent::MouseWheel {
            x: route.point.x,
            y: route.point.y,
            delta_x,
            delta_y: -delta_y,
        })
        .await?;

        debug!(surface = %route.target, delta_x, delta_y, "scrolled");
        Ok(1)
    }

    async fn navigate(&self, host: &dyn HostWindow, url: &str) -> Result<usize> {
        validate_url(url)?;

        if !is_domain_allowed(url, &self.allowed_domains) {
            return Err(AgentError::InvalidAction(format!(
                "domain not in allowed list. Allowed domains: {:?}",
                self.allowed_domains
            )));
        }

        step(host.send_navigate(url).await, "navigate")?;
        debug!(url, "navigation forwarded");
        Ok(0)
    }

    async fn type_text(&self, host: &dyn HostWindow, text: &str) -> Result<usize> {
        let mut sent = 0;
        for c in text.chars() {
            send(host, &SurfaceTarget::Host, InputEvent::Char {
                key_code: c.to_string(),
            })
            .await?;
            sent += 1;
        }
        debug!(chars = sent, "typed text");
        Ok(sent)
    }

    async fn key_press(&self, host: &dyn HostWindow, key_code: &str) -> Result<usize> {
        send(host, &SurfaceTarget::Host, InputEvent::KeyDown {
            key_code: key_code.to_string(),
        })
        .await?;
        send(host, &SurfaceTarget::Host, InputEvent::KeyUp {
            key_code: key_code.to_string(),
        })
        .await?;
        debug!(key_code, "pressed key");
        Ok(2)
    }

    async fn wait(&self, requested: Duration) -> Result<usize> {
        let duration = requested.min(self.timings.max_wait);
        if duration < requested {
            debug!(
                requested_ms = requested.as_millis() as u64,
                capped_ms = duration.as_millis() as u64,
                "wait capped"
            );
        }
        pause(duration).await;
        Ok(0)
    }
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

/// Non-input primitive (focus, navigate): log and normalise its failure.
fn step(result: Result<()>, what: &str) -> Result<()> {
    result.map_err(|e| {
        warn!(primitive = what, error = %e, "primitive failed, aborting action");
        match e {
            AgentError::Dispatch(_) => e,
            other => AgentError::Dispatch(format!("{what}: {other}")),
        }
    })
}

async fn send(host: &dyn HostWindow, target: &SurfaceTarget, event: InputEvent) -> Result<()> {
    let name = event.name();
    step(host.dispatch_input_event(target, event).await, name)?;

    #[cfg(feature = "metrics")]
    indus_metrics::counter!(
        indus_metrics::agent::INPUT_EVENTS_TOTAL,
        indus_metrics::labels::EVENT => name
    )
    .increment(1);

    Ok(())
}

/// Validate a URL before asking the UI layer to navigate.
///
/// Checks for:
/// - Valid URL structure (can be parsed)
/// - Allowed schemes (http, https)
/// - No raw characters a real link would percent-encode (model output
///   leaking into the URL)
fn validate_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(AgentError::InvalidAction(
            "URL cannot be empty".to_string(),
        ));
    }

    let parsed = url::Url::parse(url).map_err(|e| {
        AgentError::InvalidAction(format!("invalid URL '{}': {}", truncate_url(url), e))
    })?;

    match parsed.scheme() {
        "http" | "https" => {},
        scheme => {
            return Err(AgentError::InvalidAction(format!(
                "unsupported URL scheme '{scheme}', only http/https allowed"
            )));
        },
    }

    // Checked on the raw input: `Url::parse` would percent-encode these.
    if let Some(c) = url.chars().find(|c| UNESCAPED_GARBAGE.contains(c)) {
        warn!(
            url = %truncate_url(url),
            character = %c,
            "rejecting URL with unescaped character"
        );
        return Err(AgentError::InvalidAction(format!(
            "URL contains invalid characters: '{}'",
            truncate_url(url)
        )));
    }

    if url.contains(PROMPT_LEAK) {
        warn!(url = %truncate_url(url), "rejecting URL with leaked prompt text");
        return Err(AgentError::InvalidAction(format!(
            "URL contains invalid characters: '{}'",
            truncate_url(url)
        )));
    }

    Ok(())
}

/// Characters that must be percent-encoded in a URL.
const UNESCAPED_GARBAGE: &[char] = &['{', '}', '<', '>', '"', '`'];

const PROMPT_LEAK: &str = "assistant to=";

/// Truncate a URL for error messages (to avoid huge garbage URLs in logs).
fn truncate_url(url: &str) -> String {
    match url.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &url[..idx]),
        None => url.to_string(),
    }
}
