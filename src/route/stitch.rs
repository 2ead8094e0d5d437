use std::collections::HashMap;

use log::warn;

use crate::model::primitive::point::Pt3;
use crate::route::highdensity::{simplify_jumper_aware, HdRoute};
use crate::solver::{GraphicsObject, Progress, Solver};

fn endpoint_key(p: &Pt3) -> (i64, i64, usize) {
    ((p.x * 1000.0).round() as i64, (p.y * 1000.0).round() as i64, p.z)
}

// Concatenates the per-cell polylines of each connection into one continuous
// trace, merging collinear runs. One connection per step.
#[must_use]
#[derive(Debug)]
pub struct MultipleHighDensityRouteStitchSolver {
    progress: Progress,
    pieces: Vec<HdRoute>,
    names: Vec<String>,
    cursor: usize,
    pub stitched: Vec<HdRoute>,
}

impl MultipleHighDensityRouteStitchSolver {
    pub fn new(pieces: Vec<HdRoute>) -> Self {
        let mut names: Vec<String> = vec![];
        for piece in &pieces {
            if !names.contains(&piece.connection_name) {
                names.push(piece.connection_name.clone());
            }
        }
        let progress = Progress::with_max(names.len() + 2);
        Self { progress, pieces, names, cursor: 0, stitched: vec![] }
    }

    pub fn into_stitched(self) -> Vec<HdRoute> {
        self.stitched
    }

    // Chains pieces that share endpoints. Pieces whose ends never meet are
    // appended as-is so no geometry is silently dropped.
    fn stitch_connection(&self, name: &str) -> HdRoute {
        let mut remaining: Vec<HdRoute> =
            self.pieces.iter().filter(|p| p.connection_name == name).cloned().collect();
        let mut vias = vec![];
        let mut jumpers = vec![];
        for piece in &remaining {
            vias.extend(piece.vias.clone());
            jumpers.extend(piece.jumpers.clone());
        }

        // Endpoint occurrences decide the chain's starting piece: an endpoint
        // appearing once is a free end.
        let mut occurrences: HashMap<(i64, i64, usize), usize> = HashMap::new();
        for piece in &remaining {
            for p in [piece.vertices.first(), piece.vertices.last()].into_iter().flatten() {
                *occurrences.entry(endpoint_key(p)).or_insert(0) += 1;
            }
        }
        let start_ix = remaining
            .iter()
            .position(|p| {
                p.vertices
                    .first()
                    .map(|v| occurrences[&endpoint_key(v)] == 1)
                    .unwrap_or(false)
            })
            .unwrap_or(0);

        let mut chain = remaining.swap_remove(start_ix).vertices;
        let mut breaks = 0usize;
        while !remaining.is_empty() {
            let Some(tail) = chain.last().copied() else { break };
            let tail_key = endpoint_key(&tail);
            let next = remaining.iter().position(|p| {
                p.vertices.first().map(|v| endpoint_key(v) == tail_key).unwrap_or(false)
                    || p.vertices.last().map(|v| endpoint_key(v) == tail_key).unwrap_or(false)
            });
            match next {
                Some(ix) => {
                    let mut piece = remaining.swap_remove(ix).vertices;
                    if piece.first().map(endpoint_key) != Some(tail_key) {
                        piece.reverse();
                    }
                    chain.extend(piece.into_iter().skip(1));
                }
                None => {
                    // No piece meets the tail (an off-board span, or a cell
                    // that failed to route). Continue the chain from the next
                    // free end rather than dropping geometry.
                    breaks += 1;
                    let ix = remaining
                        .iter()
                        .position(|p| {
                            p.vertices
                                .first()
                                .map(|v| occurrences[&endpoint_key(v)] == 1)
                                .unwrap_or(false)
                        })
                        .unwrap_or(0);
                    chain.extend(remaining.swap_remove(ix).vertices);
                }
            }
        }
        if breaks > 0 {
            warn!("{name}: {breaks} break(s) in the stitched chain");
        }
        let vertices = simplify_jumper_aware(chain, &jumpers);
        HdRoute { connection_name: name.to_string(), vertices, vias, jumpers }
    }
}

impl Solver for MultipleHighDensityRouteStitchSolver {
    fn name(&self) -> &'static str {
        "multiple_high_density_route_stitch"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        let Some(name) = self.names.get(self.cursor).cloned() else {
            self.progress.finish();
            return;
        };
        self.cursor += 1;
        let route = self.stitch_connection(&name);
        self.stitched.push(route);
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        for route in &self.stitched {
            let points = route.vertices.iter().map(Pt3::pt).collect();
            g.line(points, None, Some(route.connection_name.clone()), step);
        }
        g
    }
}
