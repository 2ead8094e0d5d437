use std::collections::HashMap;

use eyre::Result;
use log::{debug, info, warn};
use strum::Display;

use crate::cache::{fingerprint, CacheProvider};
use crate::conn::ConnectivityMap;
use crate::mesh::builder::MeshObstacle;
use crate::mesh::{CapacityMesh, CapacityMeshSolver, DeadEndSolver, OffboardCapacityNodeSolver};
use crate::model::layer::z_to_layer_name;
use crate::route::capacity::{
    required_nodes, CapacityPathingHyperParameters, CapacityPathingSolver, NetPath,
};
use crate::route::highdensity::{
    build_cell_problem, hyper_intra_node_solver, CellObstacleRect, HdRoute, HyperIntraNodeSolver,
};
use crate::route::keepout::TraceKeepoutSolver;
use crate::route::offboard::{substitute_connections, RouteNet};
use crate::route::segment_optimizer::SegmentOptimizer;
use crate::route::portpoint::{
    OptimizerStats, PortPointHyperParameters, PortPointOutput, PortPointPathingSolver,
};
use crate::route::stitch::MultipleHighDensityRouteStitchSolver;
use crate::route::unravel::UnravelSectionSolver;
use crate::route::width::{TraceWidthSolver, TraceWithWidth};
use crate::route::BoardContext;
use crate::solver::{GraphicsObject, HyperSolver, Progress, Solver};
use crate::srj::types::{Connection, RouteSegment, SimpleRouteJson, SimplifiedPcbTrace};
use crate::srj::validate::validate_srj;

// Assignable pipelines race the pather with perturbed via penalties.
pub type HyperAssignableViaCapacityPathingSolver = HyperSolver<CapacityPathingSolver>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PipelineVariant {
    OriginalUnravel,
    PortPointPathing,
    Assignable,
    Assignable2,
}

#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[strum(serialize_all = "snake_case")]
pub enum PipelinePhase {
    Mesh,
    OffboardNodes,
    Pathing,
    DeadEnd,
    PortPoints,
    HighDensity,
    Stitch,
    SegmentOptimizer,
    Keepout,
    Width,
    Done,
}

// A per-cell failure that downgraded instead of failing the pipeline.
#[must_use]
#[derive(Debug, Clone)]
pub struct FailedSolver {
    pub solver_name: String,
    pub node_id: String,
    pub connection_names: Vec<String>,
    pub error: String,
}

// The mesh-enriched netlist exposed to callers after port point pathing.
#[must_use]
#[derive(Debug, Clone)]
pub struct SrjWithPointPairs {
    pub connections: Vec<Connection>,
    pub output: PortPointOutput,
}

// Drives one hyper intra-node race per occupied cell; per-cell failures are
// recorded and downgraded, never escalated.
#[must_use]
#[derive(Debug)]
struct HighDensityPhaseSolver {
    progress: Progress,
    queue: Vec<(String, Vec<String>, HyperIntraNodeSolver)>,
    cursor: usize,
    routes: Vec<HdRoute>,
    failed: Vec<FailedSolver>,
}

impl HighDensityPhaseSolver {
    fn new(queue: Vec<(String, Vec<String>, HyperIntraNodeSolver)>) -> Self {
        let budget: usize =
            queue.iter().map(|(_, _, s)| s.max_iterations() + 2).sum::<usize>() + 8;
        Self {
            progress: Progress::with_max(budget),
            queue,
            cursor: 0,
            routes: vec![],
            failed: vec![],
        }
    }
}

impl Solver for HighDensityPhaseSolver {
    fn name(&self) -> &'static str {
        "high_density"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        let cursor = self.cursor;
        let Some((_, _, solver)) = self.queue.get_mut(cursor) else {
            self.progress.finish();
            return;
        };
        solver.step();
        let (solved, failed) = (solver.solved(), solver.failed());
        let error = solver.error().map(str::to_string);
        if solved {
            let (_, _, solver) = &self.queue[cursor];
            if let Some(winner) = solver.winner() {
                self.routes.extend(winner.routes());
            }
            self.cursor += 1;
        } else if failed {
            let (node_id, names, _) = &self.queue[cursor];
            warn!("cell {node_id}: all intra-node solvers failed");
            self.failed.push(FailedSolver {
                solver_name: "hyper_intra_node".to_string(),
                node_id: node_id.clone(),
                connection_names: names.clone(),
                error: error.unwrap_or_else(|| "unsolvable cell".to_string()),
            });
            self.cursor += 1;
        }
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        for (_, _, solver) in &self.queue {
            g.merge(solver.visualize());
        }
        g
    }
}

#[derive(Debug)]
enum PhaseSolver {
    Mesh(CapacityMeshSolver),
    OffboardNodes(OffboardCapacityNodeSolver),
    Pathing(CapacityPathingSolver),
    HyperPathing(HyperAssignableViaCapacityPathingSolver),
    DeadEnd(DeadEndSolver),
    PortPoints(PortPointPathingSolver),
    Unravel(UnravelSectionSolver),
    HighDensity(HighDensityPhaseSolver),
    Stitch(MultipleHighDensityRouteStitchSolver),
    SegmentOptimizer(SegmentOptimizer),
    Keepout(TraceKeepoutSolver),
    Width(TraceWidthSolver),
}

impl PhaseSolver {
    fn as_solver(&self) -> &dyn Solver {
        match self {
            PhaseSolver::Mesh(s) => s,
            PhaseSolver::OffboardNodes(s) => s,
            PhaseSolver::Pathing(s) => s,
            PhaseSolver::HyperPathing(s) => s,
            PhaseSolver::DeadEnd(s) => s,
            PhaseSolver::PortPoints(s) => s,
            PhaseSolver::Unravel(s) => s,
            PhaseSolver::HighDensity(s) => s,
            PhaseSolver::Stitch(s) => s,
            PhaseSolver::SegmentOptimizer(s) => s,
            PhaseSolver::Keepout(s) => s,
            PhaseSolver::Width(s) => s,
        }
    }

    fn as_solver_mut(&mut self) -> &mut dyn Solver {
        match self {
            PhaseSolver::Mesh(s) => s,
            PhaseSolver::OffboardNodes(s) => s,
            PhaseSolver::Pathing(s) => s,
            PhaseSolver::HyperPathing(s) => s,
            PhaseSolver::DeadEnd(s) => s,
            PhaseSolver::PortPoints(s) => s,
            PhaseSolver::Unravel(s) => s,
            PhaseSolver::HighDensity(s) => s,
            PhaseSolver::Stitch(s) => s,
            PhaseSolver::SegmentOptimizer(s) => s,
            PhaseSolver::Keepout(s) => s,
            PhaseSolver::Width(s) => s,
        }
    }
}

// The autorouting pipeline: validates input, then forwards steps to the
// active phase and instantiates the next phase from its outputs. Capacity
// failures get one dead-end retry; per-cell failures downgrade into
// failed_solvers.
#[must_use]
#[derive(Debug)]
pub struct AutoroutingPipeline {
    progress: Progress,
    srj: SimpleRouteJson,
    variant: PipelineVariant,
    phase: PipelinePhase,
    active: Option<PhaseSolver>,
    conn: Option<ConnectivityMap>,
    obstacles: Vec<MeshObstacle>,
    nets: Vec<RouteNet>,
    new_connections: Vec<Connection>,
    mesh: Option<CapacityMesh>,
    paths: Vec<NetPath>,
    port_output: Option<PortPointOutput>,
    optimizer_stats: Option<OptimizerStats>,
    hd_routes: Vec<HdRoute>,
    stitched: Vec<HdRoute>,
    pub failed_solvers: Vec<FailedSolver>,
    pub traces: Option<Vec<SimplifiedPcbTrace>>,
    dead_end_retry_done: bool,
}

impl AutoroutingPipeline {
    // Legacy pipeline with unravel-based section search.
    pub fn original_unravel(srj: SimpleRouteJson) -> Self {
        Self::with_variant(srj, PipelineVariant::OriginalUnravel)
    }

    // Default pipeline with the multi-section port point optimizer.
    pub fn port_point_pathing(srj: SimpleRouteJson) -> Self {
        Self::with_variant(srj, PipelineVariant::PortPointPathing)
    }

    // Assignable-via aware pipelines.
    pub fn assignable(srj: SimpleRouteJson) -> Self {
        Self::with_variant(srj, PipelineVariant::Assignable)
    }

    pub fn assignable2(srj: SimpleRouteJson) -> Self {
        Self::with_variant(srj, PipelineVariant::Assignable2)
    }

    pub fn with_variant(srj: SimpleRouteJson, variant: PipelineVariant) -> Self {
        let bounds = srj.bounds_rt();
        let min_cell = 2.0 * (srj.min_trace_width + srj.spacing()).max(1e-3);
        let est_cells =
            ((bounds.w() / min_cell).max(1.0) * (bounds.h() / min_cell).max(1.0)) as usize;
        let max_iterations = est_cells * 6000 + 50_000;
        let mut pipeline = Self {
            progress: Progress::with_max(max_iterations),
            srj,
            variant,
            phase: PipelinePhase::Mesh,
            active: None,
            conn: None,
            obstacles: vec![],
            nets: vec![],
            new_connections: vec![],
            mesh: None,
            paths: vec![],
            port_output: None,
            optimizer_stats: None,
            hd_routes: vec![],
            stitched: vec![],
            failed_solvers: vec![],
            traces: None,
            dead_end_retry_done: false,
        };
        if let Err(e) = pipeline.prepare() {
            pipeline.progress.fail(format!("invalid input: {e:#}"));
        }
        pipeline
    }

    fn prepare(&mut self) -> Result<()> {
        validate_srj(&self.srj)?;
        let conn = ConnectivityMap::from_srj(&self.srj);
        let (nets, new_connections) = substitute_connections(&self.srj, &conn)?;
        self.obstacles = MeshObstacle::from_srj(&self.srj)?;
        self.conn = Some(conn);
        self.nets = nets;
        self.new_connections = new_connections;
        self.active = Some(PhaseSolver::Mesh(CapacityMeshSolver::new(&self.srj)?));
        info!("pipeline prepared: {} nets to route", self.nets.len());
        Ok(())
    }

    #[must_use]
    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    // Runs only up to (and including) the named phase.
    pub fn solve_until_phase(&mut self, phase: PipelinePhase) {
        while !self.progress.done() && self.phase <= phase {
            self.step();
        }
    }

    pub fn srj_with_point_pairs(&self) -> Option<SrjWithPointPairs> {
        self.port_output.as_ref().map(|output| SrjWithPointPairs {
            connections: self.new_connections.clone(),
            output: output.clone(),
        })
    }

    #[must_use]
    pub fn current_board_score(&self) -> Option<f64> {
        self.optimizer_stats.map(|s| s.current_board_score)
    }

    // Stores the final traces under a key derived from the input.
    pub fn store_in_cache(&self, cache: &mut dyn CacheProvider) {
        if let Some(traces) = &self.traces {
            let key = format!("pipeline:{}", fingerprint(&self.srj));
            if let Ok(value) = serde_json::to_value(traces) {
                cache.put(&key, value);
            }
        }
    }

    pub fn load_from_cache(&mut self, cache: &mut dyn CacheProvider) -> bool {
        let key = format!("pipeline:{}", fingerprint(&self.srj));
        let Some(value) = cache.get(&key) else { return false };
        match serde_json::from_value(value) {
            Ok(traces) => {
                self.traces = Some(traces);
                self.phase = PipelinePhase::Done;
                self.progress.finish();
                true
            }
            Err(_) => false,
        }
    }

    fn assignable_variant(&self) -> bool {
        matches!(self.variant, PipelineVariant::Assignable | PipelineVariant::Assignable2)
    }

    fn unravel_variant(&self) -> bool {
        matches!(self.variant, PipelineVariant::OriginalUnravel | PipelineVariant::Assignable)
    }

    fn pathing_phase(&self) -> PhaseSolver {
        let mesh = self.mesh.clone().unwrap_or_default();
        let conn = self.conn.clone().unwrap_or_default();
        if self.assignable_variant() {
            let children = [1.0, 0.25, 4.0]
                .into_iter()
                .map(|via_penalty| {
                    CapacityPathingSolver::new(
                        mesh.clone(),
                        conn.clone(),
                        self.nets.clone(),
                        CapacityPathingHyperParameters {
                            via_penalty,
                            ..CapacityPathingHyperParameters::default()
                        },
                    )
                })
                .collect();
            PhaseSolver::HyperPathing(HyperSolver::new("hyper_assignable_pathing", children))
        } else {
            PhaseSolver::Pathing(CapacityPathingSolver::new(
                mesh,
                conn,
                self.nets.clone(),
                CapacityPathingHyperParameters::default(),
            ))
        }
    }

    fn port_point_phase(&self) -> PhaseSolver {
        let mesh = self.mesh.clone().unwrap_or_default();
        let params = PortPointHyperParameters::default();
        if self.unravel_variant() {
            PhaseSolver::Unravel(UnravelSectionSolver::new(
                mesh,
                self.paths.clone(),
                self.srj.min_trace_width,
                self.srj.spacing(),
                params,
            ))
        } else {
            PhaseSolver::PortPoints(PortPointPathingSolver::new(
                mesh,
                self.paths.clone(),
                self.srj.min_trace_width,
                self.srj.spacing(),
                params,
            ))
        }
    }

    fn high_density_phase(&self) -> PhaseSolver {
        let output = self.port_output.clone().unwrap_or_default();
        let allow_jumpers = self.srj.allow_jumpers.unwrap_or(false);
        let conn = self.conn.as_ref();
        let queue = output
            .nodes_with_port_points
            .iter()
            .filter(|node| !node.port_points.is_empty())
            .map(|node| {
                let obstacles: Vec<CellObstacleRect> = self
                    .srj
                    .obstacles
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.rt().intersects(&node.rt))
                    .map(|(ix, o)| {
                        // Express the obstacle's net in connection names so
                        // a pad does not block its own trace. Claimed
                        // assignable vias admit the net that claimed them.
                        let id = o.id_or(ix);
                        let mut nets: Vec<String> = self
                            .srj
                            .connections
                            .iter()
                            .filter(|c| {
                                conn.map_or(false, |m| m.are_connected(&id, &c.name))
                            })
                            .map(|c| c.name.clone())
                            .collect();
                        if let Some(mesh) = &self.mesh {
                            nets.extend(
                                mesh.nodes
                                    .iter()
                                    .filter(|n| n.assigned_obstacle == Some(ix))
                                    .filter_map(|n| n.net.clone()),
                            );
                        }
                        CellObstacleRect {
                            rt: self.obstacles[ix].rt,
                            layers: self.obstacles[ix].layers,
                            nets,
                        }
                    })
                    .collect();
                let problem = build_cell_problem(
                    node,
                    self.srj.min_trace_width,
                    self.srj.spacing(),
                    self.srj.via_diameter(),
                    allow_jumpers,
                    obstacles,
                );
                let names: Vec<String> =
                    problem.pairs.iter().map(|p| p.connection_name.clone()).collect();
                let node_id = self
                    .mesh
                    .as_ref()
                    .map(|m| m.nodes[node.node_ix].id.clone())
                    .unwrap_or_else(|| format!("cn{}", node.node_ix));
                (node_id, names, hyper_intra_node_solver(&problem))
            })
            .collect();
        PhaseSolver::HighDensity(HighDensityPhaseSolver::new(queue))
    }

    fn board_context(&self) -> Result<BoardContext> {
        let conn = self.conn.clone().unwrap_or_default();
        let mut context = BoardContext::from_srj(&self.srj, conn)?;
        // Claimed assignable vias belong to their adopting net from here on.
        if let Some(mesh) = &self.mesh {
            for node in &mesh.nodes {
                if let (Some(obstacle_ix), Some(net)) = (node.assigned_obstacle, &node.net) {
                    if context.obstacles[obstacle_ix].net.is_none() {
                        context.obstacles[obstacle_ix].net = Some(net.clone());
                    }
                }
            }
        }
        Ok(context)
    }

    fn nominal_widths(&self) -> HashMap<String, f64> {
        self.srj
            .connections
            .iter()
            .filter_map(|c| c.nominal_trace_width.map(|w| (c.name.clone(), w)))
            .collect()
    }

    fn assemble_traces(&self, traces: Vec<TraceWithWidth>) -> Vec<SimplifiedPcbTrace> {
        let layer_count = self.srj.layer_count;
        traces
            .into_iter()
            .enumerate()
            .map(|(n, trace)| {
                let mut route = vec![];
                let vertices = &trace.route.vertices;
                for (ix, v) in vertices.iter().enumerate() {
                    let width = trace
                        .widths
                        .get(ix.min(trace.widths.len().saturating_sub(1)))
                        .copied()
                        .unwrap_or(self.srj.min_trace_width);
                    route.push(RouteSegment::Wire {
                        x: v.x,
                        y: v.y,
                        width,
                        layer: z_to_layer_name(v.z, layer_count),
                    });
                    if let Some(next) = vertices.get(ix + 1) {
                        if next.z != v.z {
                            route.push(RouteSegment::Via {
                                x: next.x,
                                y: next.y,
                                from_layer: z_to_layer_name(v.z, layer_count),
                                to_layer: z_to_layer_name(next.z, layer_count),
                            });
                        }
                        if let Some(jumper) = trace.route.jumpers.iter().find(|j| {
                            j.z == v.z
                                && ((j.start == v.pt() && j.end == next.pt())
                                    || (j.end == v.pt() && j.start == next.pt()))
                        }) {
                            route.push(RouteSegment::Jumper {
                                start: jumper.start,
                                end: jumper.end,
                                footprint: jumper.footprint,
                                layer: z_to_layer_name(jumper.z, layer_count),
                            });
                        }
                    }
                }
                SimplifiedPcbTrace {
                    pcb_trace_id: format!("trace_{}_{}", trace.route.connection_name, n),
                    connection_name: trace.route.connection_name.clone(),
                    route,
                }
            })
            .collect()
    }

    fn transition(&mut self) {
        let Some(active) = self.active.take() else { return };
        match active {
            PhaseSolver::Mesh(solver) => {
                self.mesh = Some(solver.into_mesh());
                if self.assignable_variant() {
                    let mesh = self.mesh.take().unwrap_or_default();
                    self.phase = PipelinePhase::OffboardNodes;
                    self.active = Some(PhaseSolver::OffboardNodes(OffboardCapacityNodeSolver::new(
                        mesh,
                        &self.obstacles,
                    )));
                } else {
                    self.phase = PipelinePhase::Pathing;
                    self.active = Some(self.pathing_phase());
                }
            }
            PhaseSolver::OffboardNodes(solver) => {
                self.mesh = Some(solver.into_mesh());
                self.phase = PipelinePhase::Pathing;
                self.active = Some(self.pathing_phase());
            }
            PhaseSolver::Pathing(solver) => {
                // Keep the pather's mesh: assignable cells now carry the nets
                // that claimed them.
                let (mesh, _, paths) = solver.into_outputs();
                self.mesh = Some(mesh);
                self.paths = paths;
                self.phase = PipelinePhase::PortPoints;
                self.active = Some(self.port_point_phase());
            }
            PhaseSolver::HyperPathing(solver) => {
                match solver.into_winner() {
                    Some(winner) => {
                        let (mesh, _, paths) = winner.into_outputs();
                        self.mesh = Some(mesh);
                        self.paths = paths;
                        self.phase = PipelinePhase::PortPoints;
                        self.active = Some(self.port_point_phase());
                    }
                    None => self.progress.fail("hyper pathing solved without a winner"),
                }
            }
            PhaseSolver::DeadEnd(solver) => {
                self.mesh = Some(solver.into_mesh());
                self.phase = PipelinePhase::Pathing;
                self.active = Some(self.pathing_phase());
            }
            PhaseSolver::PortPoints(solver) => {
                self.optimizer_stats = Some(solver.stats());
                let (_, _, output) = solver.into_outputs();
                self.port_output = Some(output);
                self.phase = PipelinePhase::HighDensity;
                self.active = Some(self.high_density_phase());
            }
            PhaseSolver::Unravel(solver) => {
                self.optimizer_stats = Some(solver.stats());
                let (_, _, output) = solver.into_outputs();
                self.port_output = Some(output);
                self.phase = PipelinePhase::HighDensity;
                self.active = Some(self.high_density_phase());
            }
            PhaseSolver::HighDensity(solver) => {
                self.failed_solvers.extend(solver.failed.clone());
                self.hd_routes = solver.routes;
                self.phase = PipelinePhase::Stitch;
                self.active = Some(PhaseSolver::Stitch(MultipleHighDensityRouteStitchSolver::new(
                    self.hd_routes.clone(),
                )));
            }
            PhaseSolver::Stitch(solver) => {
                self.stitched = solver.into_stitched();
                self.phase = PipelinePhase::SegmentOptimizer;
                match self.board_context() {
                    Ok(context) => {
                        self.active = Some(PhaseSolver::SegmentOptimizer(SegmentOptimizer::new(
                            context,
                            self.stitched.clone(),
                        )));
                    }
                    Err(e) => self.progress.fail(format!("segment optimizer setup: {e:#}")),
                }
            }
            PhaseSolver::SegmentOptimizer(solver) => {
                let (context, routes) = solver.into_outputs();
                self.stitched = routes.clone();
                self.phase = PipelinePhase::Keepout;
                self.active = Some(PhaseSolver::Keepout(TraceKeepoutSolver::new(context, routes)));
            }
            PhaseSolver::Keepout(solver) => {
                let (context, routes) = solver.into_outputs();
                self.stitched = routes.clone();
                self.phase = PipelinePhase::Width;
                self.active = Some(PhaseSolver::Width(TraceWidthSolver::new(
                    context,
                    routes,
                    self.nominal_widths(),
                )));
            }
            PhaseSolver::Width(solver) => {
                let traces = solver.into_traces();
                self.traces = Some(self.assemble_traces(traces));
                self.phase = PipelinePhase::Done;
                debug!(
                    "pipeline done: {} trace(s), {} failed solver(s)",
                    self.traces.as_ref().map_or(0, Vec::len),
                    self.failed_solvers.len()
                );
                self.progress.finish();
            }
        }
    }

    fn on_phase_failure(&mut self) {
        let Some(active) = self.active.take() else { return };
        let error = active.as_solver().error().unwrap_or("phase failed").to_string();
        match active {
            PhaseSolver::Pathing(_) | PhaseSolver::HyperPathing(_) if !self.dead_end_retry_done => {
                // Capacity exhaustion: prune dead mesh cells once and retry.
                warn!("pathing failed ({error}); running dead-end pass and retrying");
                self.dead_end_retry_done = true;
                let mesh = self.mesh.clone().unwrap_or_default();
                let required = required_nodes(&mesh, &self.nets);
                self.phase = PipelinePhase::DeadEnd;
                self.active = Some(PhaseSolver::DeadEnd(DeadEndSolver::new(mesh, required)));
            }
            _ => self.progress.fail(format!("{}: {error}", self.phase)),
        }
    }
}

impl Solver for AutoroutingPipeline {
    fn name(&self) -> &'static str {
        match self.variant {
            PipelineVariant::OriginalUnravel => "autorouting_pipeline1_original_unravel",
            PipelineVariant::PortPointPathing => "autorouting_pipeline_solver2_port_point_pathing",
            PipelineVariant::Assignable => "assignable_autorouting_pipeline",
            PipelineVariant::Assignable2 => "assignable_autorouting_pipeline2",
        }
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        let Some(active) = self.active.as_mut() else {
            self.progress.fail("pipeline has no active phase");
            return;
        };
        let solver = active.as_solver_mut();
        solver.step();
        if solver.solved() {
            self.transition();
        } else if solver.failed() {
            self.on_phase_failure();
        }
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        if let Some(active) = &self.active {
            g.merge(active.as_solver().visualize());
        }
        if let Some(traces) = &self.traces {
            for trace in traces {
                let points: Vec<_> = trace
                    .route
                    .iter()
                    .filter_map(|s| match s {
                        RouteSegment::Wire { x, y, .. } => {
                            Some(crate::model::primitive::pt(*x, *y))
                        }
                        _ => None,
                    })
                    .collect();
                g.line(points, None, Some(trace.connection_name.clone()), 0);
            }
        }
        g
    }
}
