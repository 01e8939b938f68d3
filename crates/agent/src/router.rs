//! Surface selection for a resolved host-DIP point.

use tracing::debug;

use crate::{
    error::{AgentError, Result},
    types::{LayoutSnapshot, Point, SurfaceTarget},
};

/// Where a positional action lands.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub target: SurfaceTarget,
    /// DIP, local to `target`.
    pub point: Point,
    /// The same point in host DIP, kept for re-routing.
    pub host_point: Point,
    /// Whether `host_point` fell inside the embedded-content region.
    pub in_region: bool,
}

impl Route {
    /// Deliver to the host surface with host coordinates.
    pub fn host(host_point: Point) -> Self {
        Self {
            target: SurfaceTarget::Host,
            point: host_point,
            host_point,
            in_region: false,
        }
    }
}

/// Route a host-DIP point against one layout snapshot.
///
/// Inside the region the focused guest wins, then the first guest. With no
/// guest attached, or outside the region, the host receives the unchanged
/// point.
pub fn route(host_point: Point, layout: &LayoutSnapshot) -> Route {
    let Some(region) = layout.region.filter(|r| r.contains(host_point)) else {
        return Route::host(host_point);
    };

    let guest = layout
        .guests()
        .find(|s| s.is_focused)
        .or_else(|| layout.guests().next());

    match guest {
        Some(surface) => {
            let origin = region.origin();
            Route {
                target: SurfaceTarget::Guest(surface.id.clone()),
                point: Point::new(host_point.x - origin.x, host_point.y - origin.y),
                host_point,
                in_region: true,
            }
        },
        None => {
            debug!(point = %host_point, "point inside region but no nested surface attached");
            Route {
                in_region: true,
                ..Route::host(host_point)
            }
        },
    }
}

/// Check a planned route against a fresh layout read.
///
/// A planned guest that is still attached keeps the action, even if focus
/// moved to another guest; only its local point follows the live region
/// origin. If the planned guest is gone this returns
/// [`AgentError::MissingSurface`]; callers fall back to [`Route::host`].
/// Host routes, and guest routes whose point left the live region, are
/// routed again.
pub fn revalidate(planned: &Route, live: &LayoutSnapshot) -> Result<Route> {
    let SurfaceTarget::Guest(id) = &planned.target else {
        return Ok(route(planned.host_point, live));
    };

    if !live.has_guest(id) {
        return Err(AgentError::MissingSurface {
            surface: id.clone(),
        });
    }

    match live.region.filter(|r| r.contains(planned.host_point)) {
        Some(region) => {
            let origin = region.origin();
            Ok(Route {
                target: planned.target.clone(),
                point: Point::new(
                    planned.host_point.x - origin.x,
                    planned.host_point.y - origin.y,
                ),
                host_point: planned.host_point,
                in_region: true,
            })
        },
        None => Ok(route(planned.host_point, live)),
    }
}
