use eyre::{ensure, Result, WrapErr};

use crate::model::geom::intersects::pt_inside_polygon;
use crate::srj::types::SimpleRouteJson;

// Input checks that run before any solver phase. A failure here is fatal for
// the whole pipeline (no phase is started).
pub fn validate_srj(srj: &SimpleRouteJson) -> Result<()> {
    ensure!(srj.layer_count >= 1, "layerCount must be at least 1");
    ensure!(srj.layer_count <= 64, "layerCount {} too large", srj.layer_count);
    ensure!(srj.min_trace_width > 0.0, "minTraceWidth must be positive");
    if let Some(w) = srj.nominal_trace_width {
        ensure!(w >= srj.min_trace_width, "nominalTraceWidth below minTraceWidth");
    }
    let bounds = srj.bounds_rt();
    ensure!(bounds.w() > 0.0 && bounds.h() > 0.0, "bounds are empty");

    for (ix, obstacle) in srj.obstacles.iter().enumerate() {
        let id = obstacle.id_or(ix);
        ensure!(obstacle.width > 0.0 && obstacle.height > 0.0, "obstacle {} has no area", id);
        obstacle.layer_set(srj.layer_count).wrap_err_with(|| format!("obstacle {id}"))?;
        ensure!(
            bounds.intersects(&obstacle.rt()),
            "obstacle {} lies entirely outside the board bounds",
            id
        );
    }

    for connection in &srj.connections {
        ensure!(
            !connection.points_to_connect.is_empty(),
            "connection {} has no points to connect",
            connection.name
        );
        for (ix, point) in connection.points_to_connect.iter().enumerate() {
            let id = point.id_or(&connection.name, ix);
            point.layer_set(srj.layer_count).wrap_err_with(|| format!("point {id}"))?;
            ensure!(bounds.contains(point.pt()), "point {} lies outside the board bounds", id);
            if let Some(outline) = &srj.outline {
                ensure!(
                    pt_inside_polygon(point.pt(), outline),
                    "point {} lies outside the board outline",
                    id
                );
            }
        }
    }
    Ok(())
}
