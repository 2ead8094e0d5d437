pub mod types;
pub mod validate;

pub use types::{
    Bounds, Connection, ConnectionPoint, JumperFootprint, Obstacle, ObstacleKind, RouteSegment,
    SimpleRouteJson, SimplifiedPcbTrace,
};
pub use validate::validate_srj;
