use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};

use crate::model::layer::{layer_name_to_z, LayerSet};
use crate::model::primitive::point::Pt;
use crate::model::primitive::rect::Rt;

// Canonical board description. Field names follow the wire format: camelCase
// for input, with pcb_port_id as a legacy exception.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleRouteJson {
    pub layer_count: usize,
    pub min_trace_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal_trace_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_via_diameter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_obstacle_margin: Option<f64>,
    pub bounds: Bounds,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<Vec<Pt>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_jumpers: Option<bool>,
}

impl SimpleRouteJson {
    pub fn bounds_rt(&self) -> Rt {
        Rt::from_bounds(self.bounds.min_x, self.bounds.max_x, self.bounds.min_y, self.bounds.max_y)
    }

    // Clearance between copper of distinct nets. Defaults to one trace width
    // of air when the input does not specify a margin.
    #[must_use]
    pub fn spacing(&self) -> f64 {
        self.default_obstacle_margin.unwrap_or(self.min_trace_width)
    }

    #[must_use]
    pub fn via_diameter(&self) -> f64 {
        self.min_via_diameter.unwrap_or(self.min_trace_width * 2.0)
    }

    #[must_use]
    pub fn nominal_width(&self) -> f64 {
        self.nominal_trace_width.unwrap_or(self.min_trace_width)
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleKind {
    #[default]
    Rect,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Obstacle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obstacle_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_layers: Option<Vec<usize>>,
    pub center: Pt,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub connected_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_is_assignable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_board_connects_to: Option<Vec<String>>,
}

impl Obstacle {
    pub fn rt(&self) -> Rt {
        Rt::from_center(self.center, self.width, self.height)
    }

    pub fn layer_set(&self, layer_count: usize) -> Result<LayerSet> {
        let mut set = LayerSet::empty();
        for name in &self.layers {
            set.insert(layer_name_to_z(name, layer_count)?);
        }
        for &z in self.z_layers.iter().flatten() {
            if z >= layer_count {
                return Err(eyre!("obstacle z layer {} out of range", z));
            }
            set.insert(z);
        }
        if set.is_empty() {
            // An obstacle with no layer annotation blocks every layer.
            set = LayerSet::all(layer_count);
        }
        Ok(set)
    }

    #[must_use]
    pub fn assignable(&self) -> bool {
        self.net_is_assignable.unwrap_or(false)
    }

    pub fn id_or(&self, ix: usize) -> String {
        self.obstacle_id.clone().unwrap_or_else(|| format!("obstacle_{ix}"))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_connection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_connection_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_off_board: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_connection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal_trace_width: Option<f64>,
    pub points_to_connect: Vec<ConnectionPoint>,
}

impl Connection {
    #[must_use]
    pub fn off_board(&self) -> bool {
        self.is_off_board.unwrap_or(false)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_id: Option<String>,
    #[serde(default, rename = "pcb_port_id", skip_serializing_if = "Option::is_none")]
    pub pcb_port_id: Option<String>,
}

impl ConnectionPoint {
    pub fn pt(&self) -> Pt {
        Pt::new(self.x, self.y)
    }

    pub fn layer_set(&self, layer_count: usize) -> Result<LayerSet> {
        let mut set = LayerSet::empty();
        if let Some(name) = &self.layer {
            set.insert(layer_name_to_z(name, layer_count)?);
        }
        for name in self.layers.iter().flatten() {
            set.insert(layer_name_to_z(name, layer_count)?);
        }
        if set.is_empty() {
            return Err(eyre!("connection point ({}, {}) is on no layer", self.x, self.y));
        }
        Ok(set)
    }

    // Stable identity for the connectivity map. Falls back to the physical
    // pad id, then to a positional id.
    pub fn id_or(&self, connection: &str, ix: usize) -> String {
        self.point_id
            .clone()
            .or_else(|| self.pcb_port_id.clone())
            .unwrap_or_else(|| format!("{connection}_p{ix}"))
    }
}

// Output: one routed trace per net segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedPcbTrace {
    pub pcb_trace_id: String,
    pub connection_name: String,
    pub route: Vec<RouteSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "route_type", rename_all = "snake_case")]
pub enum RouteSegment {
    Wire { x: f64, y: f64, width: f64, layer: String },
    Via { x: f64, y: f64, from_layer: String, to_layer: String },
    Jumper { start: Pt, end: Pt, footprint: JumperFootprint, layer: String },
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumperFootprint {
    #[default]
    #[serde(rename = "0603")]
    Imperial0603,
    #[serde(rename = "1206")]
    Imperial1206,
}

impl JumperFootprint {
    // Pad centre to pad centre span, in mm.
    #[must_use]
    pub fn span(&self) -> f64 {
        match self {
            JumperFootprint::Imperial0603 => 1.6,
            JumperFootprint::Imperial1206 => 3.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_srj() {
        let json = r#"{
            "layerCount": 2,
            "minTraceWidth": 0.2,
            "bounds": { "minX": -8, "maxX": 8, "minY": -4, "maxY": 4 },
            "obstacles": [
                { "type": "rect", "layers": ["top"], "center": {"x": -4, "y": 0},
                  "width": 1, "height": 1, "connectedTo": ["left_pad"] }
            ],
            "connections": [
                { "name": "left_pad",
                  "pointsToConnect": [
                    {"x": -4, "y": 0, "layer": "top", "pointId": "pA"},
                    {"x": 4, "y": 0, "layer": "top", "pcb_port_id": "port_b"}
                  ] }
            ]
        }"#;
        let srj: SimpleRouteJson = serde_json::from_str(json).unwrap();
        assert_eq!(srj.layer_count, 2);
        assert_eq!(srj.obstacles[0].connected_to, vec!["left_pad"]);
        assert_eq!(srj.connections[0].points_to_connect[1].pcb_port_id.as_deref(), Some("port_b"));
        assert_eq!(srj.bounds_rt().w(), 16.0);
        let ls = srj.obstacles[0].layer_set(2).unwrap();
        assert!(ls.contains(0) && !ls.contains(1));
    }

    #[test]
    fn test_route_segment_serialization() {
        let seg = RouteSegment::Via { x: 1.0, y: 2.0, from_layer: "top".into(), to_layer: "bottom".into() };
        let v = serde_json::to_value(&seg).unwrap();
        assert_eq!(v["route_type"], "via");
        assert_eq!(v["from_layer"], "top");
    }
}
