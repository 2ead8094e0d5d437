pub mod builder;
pub mod dead_end;
pub mod offboard;

pub use builder::CapacityMeshSolver;
pub use dead_end::DeadEndSolver;
pub use offboard::OffboardCapacityNodeSolver;

use crate::model::layer::LayerSet;
use crate::model::primitive::point::Pt;
use crate::model::primitive::rect::Rt;

pub type NodeIx = usize;
pub type EdgeIx = usize;

pub const MAX_CELL_CAPACITY: f64 = 16.0;

// One cell of the planar subdivision. Cells are arena-allocated and referred
// to by index; neighbour relationships live in the edge arena.
#[must_use]
#[derive(Debug, Clone)]
pub struct CapacityMeshNode {
    pub id: String,
    pub rt: Rt,
    pub layers: LayerSet,
    pub total_capacity: f64,
    // Net inherited from a containing netted obstacle.
    pub net: Option<String>,
    // Obstacle index for assignable-via cells.
    pub assigned_obstacle: Option<usize>,
    // Set by dead-end pruning; removed nodes are skipped by the pather.
    pub removed: bool,
}

#[must_use]
#[derive(Debug, Clone)]
pub struct CapacityMeshEdge {
    pub id: String,
    pub nodes: [NodeIx; 2],
    pub is_offboard_edge: bool,
    pub offboard_net_name: Option<String>,
}

impl CapacityMeshEdge {
    #[must_use]
    pub fn other(&self, ix: NodeIx) -> NodeIx {
        if self.nodes[0] == ix { self.nodes[1] } else { self.nodes[0] }
    }
}

#[must_use]
#[derive(Debug, Default, Clone)]
pub struct CapacityMesh {
    pub nodes: Vec<CapacityMeshNode>,
    pub edges: Vec<CapacityMeshEdge>,
    pub adjacency: Vec<Vec<EdgeIx>>,
    pub layer_count: usize,
}

impl CapacityMesh {
    pub fn add_node(&mut self, mut node: CapacityMeshNode) -> NodeIx {
        let ix = self.nodes.len();
        node.id = format!("cn{ix}");
        self.nodes.push(node);
        self.adjacency.push(vec![]);
        ix
    }

    pub fn add_edge(
        &mut self,
        a: NodeIx,
        b: NodeIx,
        is_offboard_edge: bool,
        offboard_net_name: Option<String>,
    ) -> EdgeIx {
        let ix = self.edges.len();
        self.edges.push(CapacityMeshEdge {
            id: format!("ce{ix}"),
            nodes: [a, b],
            is_offboard_edge,
            offboard_net_name,
        });
        self.adjacency[a].push(ix);
        self.adjacency[b].push(ix);
        ix
    }

    pub fn neighbors(&self, ix: NodeIx) -> impl Iterator<Item = (EdgeIx, NodeIx)> + '_ {
        self.adjacency[ix].iter().map(move |&e| (e, self.edges[e].other(ix)))
    }

    // Degree counting only edges to nodes that still exist.
    #[must_use]
    pub fn live_degree(&self, ix: NodeIx) -> usize {
        self.neighbors(ix).filter(|&(_, n)| !self.nodes[n].removed).count()
    }

    // The leaf cell containing |p| on at least one of |layers|. Boundary ties
    // resolve to the lowest node index.
    pub fn containing_node(&self, p: Pt, layers: &LayerSet) -> Option<NodeIx> {
        self.nodes.iter().position(|n| {
            !n.removed && n.rt.contains(p) && n.layers.intersects(layers)
        })
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.id.as_str())
    }
}
