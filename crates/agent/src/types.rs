//! Action, geometry and surface types shared by the dispatch pipeline.

use std::{fmt, time::Duration};

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// A point. Device pixels or DIP depending on where it sits in the pipeline;
/// the type alone does not say which, the field or argument name does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned rectangle in host DIP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left
            && p.x <= self.left + self.width
            && p.y >= self.top
            && p.y <= self.top + self.height
    }
}

/// Identifier of a rendering surface as known to the host UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub String);

impl From<&str> for SurfaceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an input event is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SurfaceTarget {
    /// The top-level window's own content.
    Host,
    /// A nested content surface inside the embedded-content region.
    Guest(SurfaceId),
}

impl fmt::Display for SurfaceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Guest(id) => write!(f, "guest({id})"),
        }
    }
}

/// One surface attached to the host window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceDescriptor {
    pub id: SurfaceId,
    #[serde(rename = "boundsInHostDIP")]
    pub bounds: Rect,
    pub is_focused: bool,
    pub is_guest: bool,
}

/// One live read of the host layout: the embedded-content region and the
/// surfaces attached at that moment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutSnapshot {
    pub region: Option<Rect>,
    pub surfaces: Vec<SurfaceDescriptor>,
}

impl LayoutSnapshot {
    pub fn guests(&self) -> impl Iterator<Item = &SurfaceDescriptor> {
        self.surfaces.iter().filter(|s| s.is_guest)
    }

    pub fn has_guest(&self, id: &SurfaceId) -> bool {
        self.guests().any(|s| &s.id == id)
    }
}

/// Screenshot as uploaded to the decision service.
#[derive(Clone)]
pub struct ScreenshotContext {
    /// Encoded image bytes (PNG, JPEG or WebP).
    pub image_data: Vec<u8>,
    /// Pixel width of `image_data`.
    pub device_width: u32,
    /// Pixel height of `image_data`.
    pub device_height: u32,
    /// Device pixels per DIP of the display hosting the window at capture time.
    pub scale_factor: f64,
    /// Horizontal downscale applied to the capture before upload
    /// (1.0 = untouched). Kept per axis because each side is rounded to
    /// whole pixels on its own.
    pub resize_x: f64,
    /// Vertical counterpart of `resize_x`.
    pub resize_y: f64,
}

impl ScreenshotContext {
    pub fn new(
        image_data: Vec<u8>,
        device_width: u32,
        device_height: u32,
        scale_factor: f64,
    ) -> Self {
        Self {
            image_data,
            device_width,
            device_height,
            scale_factor,
            resize_x: 1.0,
            resize_y: 1.0,
        }
    }

    /// Uploaded-image pixels per host DIP, `(x, y)`.
    pub fn effective_scale(&self) -> (f64, f64) {
        (
            self.scale_factor * self.resize_x,
            self.scale_factor * self.resize_y,
        )
    }
}

impl fmt::Debug for ScreenshotContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenshotContext")
            .field("bytes", &self.image_data.len())
            .field("device_width", &self.device_width)
            .field("device_height", &self.device_height)
            .field("scale_factor", &self.scale_factor)
            .field("resize_x", &self.resize_x)
            .field("resize_y", &self.resize_y)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

/// Primitive action chosen by the decision service.
///
/// `Click` and `Scroll` coordinates are device pixels of the uploaded
/// screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Click {
        x: f64,
        y: f64,
        #[serde(default)]
        button: MouseButton,
    },
    Scroll {
        x: f64,
        y: f64,
        #[serde(default, rename = "deltaX", alias = "scrollX")]
        delta_x: f64,
        #[serde(default, rename = "deltaY", alias = "scrollY")]
        delta_y: f64,
    },
    Navigate {
        url: String,
    },
    #[serde(rename = "type", alias = "type_text")]
    TypeText {
        text: String,
    },
    #[serde(rename = "keypress", alias = "key_press")]
    KeyPress {
        #[serde(rename = "keyCode")]
        key_code: String,
    },
    Wait {
        #[serde(default = "default_wait_ms", rename = "durationMs")]
        duration_ms: u64,
    },
}

fn default_wait_ms() -> u64 {
    2000
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click { x, y, .. } => write!(f, "click(x={x}, y={y})"),
            Self::Scroll {
                x,
                y,
                delta_x,
                delta_y,
            } => write!(f, "scroll(x={x}, y={y}, dx={delta_x}, dy={delta_y})"),
            Self::Navigate { url } => write!(f, "navigate({url})"),
            Self::TypeText { text } => write!(f, "type(chars={})", text.chars().count()),
            Self::KeyPress { key_code } => write!(f, "keypress({key_code})"),
            Self::Wait { duration_ms } => write!(f, "wait({duration_ms}ms)"),
        }
    }
}

/// Synthetic input event handed to the host UI layer. Coordinates are DIP,
/// local to the receiving surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputEvent {
    MouseMove {
        x: f64,
        y: f64,
    },
    MouseDown {
        x: f64,
        y: f64,
        button: MouseButton,
        #[serde(rename = "clickCount")]
        click_count: u32,
    },
    MouseUp {
        x: f64,
        y: f64,
        button: MouseButton,
        #[serde(rename = "clickCount")]
        click_count: u32,
    },
    MouseWheel {
        x: f64,
        y: f64,
        #[serde(rename = "deltaX")]
        delta_x: f64,
        #[serde(rename = "deltaY")]
        delta_y: f64,
    },
    Char {
        #[serde(rename = "keyCode")]
        key_code: String,
    },
    KeyDown {
        #[serde(rename = "keyCode")]
        key_code: String,
    },
    KeyUp {
        #[serde(rename = "keyCode")]
        key_code: String,
    },
}

impl InputEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MouseMove { .. } => "mouse_move",
            Self::MouseDown { .. } => "mouse_down",
            Self::MouseUp { .. } => "mouse_up",
            Self::MouseWheel { .. } => "mouse_wheel",
            Self::Char { .. } => "char",
            Self::KeyDown { .. } => "key_down",
            Self::KeyUp { .. } => "key_up",
        }
    }
}

/// Fixed delays between the primitives of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTimings {
    /// After focusing, before the first input event.
    pub settle: Duration,
    /// Between the pointer events of a click.
    pub step: Duration,
    /// Cap for `wait` actions.
    pub max_wait: Duration,
}

impl DispatchTimings {
    /// No delays at all. `max_wait` is zero too, so every `wait` action
    /// returns immediately.
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            step: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }
}

impl Default for DispatchTimings {
    fn default() -> Self {
        Self::from(&indus_config::DispatchConfig::default())
    }
}

impl From<&indus_config::DispatchConfig> for DispatchTimings {
    fn from(cfg: &indus_config::DispatchConfig) -> Self {
        Self {
            settle: Duration::from_millis(cfg.settle_ms),
            step: Duration::from_millis(cfg.step_delay_ms),
            max_wait: Duration::from_millis(cfg.max_wait_ms),
        }
    }
}

/// Runtime settings for the agent pipeline.
#[derive(Clone)]
pub struct AgentSettings {
    /// Decision service base URL.
    pub service_url: String,
    pub api_key: Option<Secret<String>>,
    pub request_timeout: Duration,
    /// Ask `/chat` for a plan before deciding.
    pub plan_before_act: bool,
    /// 0 disables screenshot downscaling.
    pub max_screenshot_dimension: u32,
    /// Allowed navigation domains (empty = all allowed).
    pub allowed_domains: Vec<String>,
    pub timings: DispatchTimings,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from(&indus_config::IndusConfig::default())
    }
}

impl fmt::Debug for AgentSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSettings")
            .field("service_url", &self.service_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .field("plan_before_act", &self.plan_before_act)
            .field("max_screenshot_dimension", &self.max_screenshot_dimension)
            .field("allowed_domains", &self.allowed_domains)
            .field("timings", &self.timings)
            .finish()
    }
}

impl From<&indus_config::IndusConfig> for AgentSettings {
    fn from(cfg: &indus_config::IndusConfig) -> Self {
        Self {
            service_url: cfg.service.base_url.clone(),
            api_key: cfg.service.api_key.clone(),
            request_timeout: Duration::from_secs(cfg.service.request_timeout_secs),
            plan_before_act: cfg.agent.plan_before_act,
            max_screenshot_dimension: cfg.agent.max_screenshot_dimension,
            allowed_domains: cfg.agent.allowed_domains.clone(),
            timings: DispatchTimings::from(&cfg.dispatch),
        }
    }
}

/// Check if a URL is allowed based on the allowed domains list.
/// Returns true if allowed, false if blocked.
pub fn is_domain_allowed(url: &str, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return true;
    }

    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };

    let Some(host) = parsed.host_str() else {
        return false;
    };

    allowed_domains.iter().any(|pattern| match pattern.strip_prefix("*.") {
        // *.example.com matches foo.example.com and example.com itself
        Some(base) => host == base || host.ends_with(&format!(".{base}")),
        None => host == pattern,
    })
}
