pub mod cache;
pub mod conn;
pub mod mesh;
pub mod model;
pub mod pipeline;
pub mod route;
pub mod solver;
pub mod srj;

use eyre::eyre;

pub use crate::pipeline::{AutoroutingPipeline, PipelinePhase, PipelineVariant};
pub use crate::solver::Solver;
pub use crate::srj::{SimpleRouteJson, SimplifiedPcbTrace};

// Runs the default pipeline to completion.
pub fn autoroute(srj: SimpleRouteJson) -> eyre::Result<Vec<SimplifiedPcbTrace>> {
    let mut pipeline = AutoroutingPipeline::port_point_pathing(srj);
    pipeline.solve();
    if pipeline.failed() {
        return Err(eyre!("{}", pipeline.error().unwrap_or("autorouting failed")));
    }
    pipeline.traces.take().ok_or_else(|| eyre!("pipeline finished without traces"))
}
