//! `indus run`: one task against a screenshot file and a described layout.
//!
//! The decision service is called for real. Input effects go to a
//! [`RecordingHost`] and are printed instead of dispatched.

use std::{io::Cursor, path::PathBuf, sync::Arc};

use {
    anyhow::{Context, Result, bail},
    clap::Args,
    indus_agent::{
        AgentSettings, LayoutSnapshot, Rect, RecordingHost, ScreenshotContext, SurfaceDescriptor,
        SurfaceId, TaskCoordinator,
    },
    indus_config::IndusConfig,
    tracing::info,
};

#[derive(Args)]
pub struct RunArgs {
    /// What the agent should achieve.
    #[arg(short, long)]
    goal: String,

    /// Screenshot of the host window (PNG, JPEG or WebP).
    #[arg(long)]
    screenshot: PathBuf,

    /// Device pixels per DIP of the display the screenshot was taken on.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Embedded-content region in host DIP: `left,top,width,height`.
    #[arg(long)]
    region: Option<String>,

    /// Nested guest surface: `id` or `id:focused`. Repeatable.
    #[arg(long = "guest")]
    guests: Vec<String>,

    /// Window identifier used in logs and the report.
    #[arg(long, default_value = "main")]
    window: String,
}

pub async fn handle_run(config: &IndusConfig, args: RunArgs) -> Result<()> {
    let bytes = std::fs::read(&args.screenshot)
        .with_context(|| format!("failed to read {}", args.screenshot.display()))?;
    let (width, height) = image::ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()?
        .into_dimensions()
        .with_context(|| format!("{} is not a readable image", args.screenshot.display()))?;

    let region = args.region.as_deref().map(parse_region).transpose()?;
    let surfaces = args
        .guests
        .iter()
        .map(|g| parse_guest(g, region))
        .collect::<Result<Vec<_>>>()?;

    info!(
        window = %args.window,
        width,
        height,
        scale = args.scale,
        guests = surfaces.len(),
        "dry run"
    );

    let shot = ScreenshotContext::new(bytes, width, height, args.scale);
    let host = Arc::new(
        RecordingHost::new(args.window, Some(shot))
            .with_layout(LayoutSnapshot { region, surfaces }),
    );
    let coordinator = TaskCoordinator::new(host.clone(), AgentSettings::from(config))?;

    let report = coordinator.handle_task(&args.goal).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "report": &report,
            "calls": host.calls(),
        }))?
    );

    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_region(raw: &str) -> Result<Rect> {
    let parts = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid region '{raw}'"))?;
    let [left, top, width, height] = parts[..] else {
        bail!("region must be left,top,width,height, got '{raw}'");
    };
    if width < 0.0 || height < 0.0 {
        bail!("region size must not be negative, got '{raw}'");
    }
    Ok(Rect::new(left, top, width, height))
}

fn parse_guest(raw: &str, region: Option<Rect>) -> Result<SurfaceDescriptor> {
    let (id, is_focused) = match raw.split_once(':') {
        Some((id, "focused")) => (id, true),
        Some((_, flag)) => bail!("unknown guest flag '{flag}' in '{raw}'"),
        None => (raw, false),
    };
    if id.is_empty() {
        bail!("guest id must not be empty");
    }
    Ok(SurfaceDescriptor {
        id: SurfaceId::from(id),
        bounds: region.unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0)),
        is_focused,
        is_guest: true,
    })
}
