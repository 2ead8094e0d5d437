pub mod capacity;
pub mod highdensity;
pub mod keepout;
pub mod offboard;
pub mod portpoint;
pub mod segment_optimizer;
pub mod stitch;
pub mod unravel;
pub mod width;

use eyre::Result;

use crate::conn::ConnectivityMap;
use crate::mesh::builder::MeshObstacle;
use crate::model::spatial::{RectEntry, RectIndex};
use crate::srj::types::SimpleRouteJson;

// Board-wide context shared by the post-pipeline solvers (keepout, width,
// segment optimizer): obstacle geometry with a spatial index, connectivity,
// and the design rules.
#[must_use]
#[derive(Debug)]
pub struct BoardContext {
    pub obstacles: Vec<MeshObstacle>,
    pub index: RectIndex,
    pub conn: ConnectivityMap,
    pub trace_width: f64,
    pub spacing: f64,
    pub via_diameter: f64,
    pub nominal_width: f64,
}

impl BoardContext {
    pub fn from_srj(srj: &SimpleRouteJson, conn: ConnectivityMap) -> Result<Self> {
        let obstacles = MeshObstacle::from_srj(srj)?;
        let entries: Vec<RectEntry> = obstacles
            .iter()
            .enumerate()
            .map(|(id, o)| RectEntry { rt: o.rt, layers: o.layers, id })
            .collect();
        Ok(Self {
            obstacles,
            index: RectIndex::new(entries),
            conn,
            trace_width: srj.min_trace_width,
            spacing: srj.spacing(),
            via_diameter: srj.via_diameter(),
            nominal_width: srj.nominal_width(),
        })
    }

    // Whether obstacle |ix| is a keepout for |net|.
    #[must_use]
    pub fn obstacle_blocks(&self, ix: usize, net: &str) -> bool {
        match &self.obstacles[ix].net {
            Some(obstacle_net) => !self.conn.are_connected(obstacle_net, net),
            None => true,
        }
    }
}
