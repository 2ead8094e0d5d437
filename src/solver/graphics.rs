use serde::Serialize;

use crate::model::primitive::point::Pt;
use crate::model::primitive::rect::Rt;

// Display list produced by Solver::visualize. Every shape is tagged with the
// step index it was emitted at so an external debugger can time-lapse.
#[must_use]
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct GraphicsObject {
    pub lines: Vec<GfxLine>,
    pub rects: Vec<GfxRect>,
    pub circles: Vec<GfxCircle>,
    pub points: Vec<GfxPoint>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct GfxLine {
    pub points: Vec<Pt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub step: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct GfxRect {
    pub center: Pt,
    pub width: f64,
    pub height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub step: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct GfxCircle {
    pub center: Pt,
    pub radius: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub step: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct GfxPoint {
    pub pt: Pt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub step: usize,
}

impl GraphicsObject {
    pub fn line(&mut self, points: Vec<Pt>, layer: Option<String>, label: Option<String>, step: usize) {
        self.lines.push(GfxLine { points, layer, label, step });
    }

    pub fn rect(&mut self, rt: &Rt, label: Option<String>, step: usize) {
        self.rects.push(GfxRect {
            center: rt.center(),
            width: rt.w(),
            height: rt.h(),
            label,
            step,
        });
    }

    pub fn circle(&mut self, center: Pt, radius: f64, label: Option<String>, step: usize) {
        self.circles.push(GfxCircle { center, radius, label, step });
    }

    pub fn point(&mut self, pt: Pt, label: Option<String>, step: usize) {
        self.points.push(GfxPoint { pt, label, step });
    }

    pub fn merge(&mut self, o: GraphicsObject) {
        self.lines.extend(o.lines);
        self.rects.extend(o.rects);
        self.circles.extend(o.circles);
        self.points.extend(o.points);
    }
}
