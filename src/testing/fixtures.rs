//! Payloads sent by the scenario
//!
//! Names and types are fixed so a run is recognizable in the model under
//! test ("E1".."E5", "Smoke Temp View", ...).

use serde_json::{json, Value};

use super::executor::Patch;

/// Element types of E1..E5, one per bulk element
pub const ELEMENT_TYPES: [&str; 5] = [
    "business-actor",
    "business-role",
    "business-process",
    "business-function",
    "business-event",
];

pub const RELATION_TYPE: &str = "association-relationship";
pub const VIEW_TYPE: &str = "ArchimateDiagramModel";
pub const DEFAULT_VIEW_NAME: &str = "Smoke Default";
pub const TEMP_VIEW_NAME: &str = "Smoke Temp View";
pub const TEMP_ELEMENT_NAME: &str = "TempEl";

/// `[{type, name: "E1"}, ...]`
pub fn elements() -> Vec<Value> {
    ELEMENT_TYPES
        .iter()
        .enumerate()
        .map(|(i, ty)| json!({ "type": ty, "name": format!("E{}", i + 1) }))
        .collect()
}

/// Renames E1..E3 to E1r..E3r
pub fn element_renames(ids: &[String]) -> Vec<Patch> {
    ids.iter()
        .take(3)
        .enumerate()
        .map(|(i, id)| Patch::new(id, json!({ "name": format!("E{}r", i + 1) })))
        .collect()
}

/// Associations chaining consecutive elements: E1→E2, E2→E3, ...
pub fn relations(element_ids: &[String]) -> Vec<Value> {
    element_ids
        .windows(2)
        .map(|pair| {
            json!({
                "type": RELATION_TYPE,
                "sourceId": pair[0],
                "targetId": pair[1],
            })
        })
        .collect()
}

/// Renames the first two relations to R1r, R2r
pub fn relation_renames(ids: &[String]) -> Vec<Patch> {
    ids.iter()
        .take(2)
        .enumerate()
        .map(|(i, id)| Patch::new(id, json!({ "name": format!("R{}r", i + 1) })))
        .collect()
}

/// View placements for the bulk elements; only the first carries bounds
pub fn element_placements(element_ids: &[String]) -> Vec<Value> {
    element_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            if i == 0 {
                json!({ "elementId": id, "bounds": bounds(10, 10, 40, 40) })
            } else {
                json!({ "elementId": id })
            }
        })
        .collect()
}

pub fn relation_placements(relation_ids: &[String]) -> Vec<Value> {
    relation_ids
        .iter()
        .map(|id| json!({ "relationId": id }))
        .collect()
}

pub fn default_view() -> Value {
    json!({ "type": VIEW_TYPE, "name": DEFAULT_VIEW_NAME })
}

pub fn temp_view() -> Value {
    json!({ "type": VIEW_TYPE, "name": TEMP_VIEW_NAME })
}

pub fn temp_element() -> Value {
    json!({ "type": ELEMENT_TYPES[0], "name": TEMP_ELEMENT_NAME })
}

pub fn temp_placement(element_id: &str) -> Value {
    json!({ "elementId": element_id, "bounds": bounds(30, 30, 60, 40) })
}

/// Second placement of the temp element, exercising style support
pub fn styled_placement(element_id: &str) -> Value {
    json!({
        "elementId": element_id,
        "bounds": bounds(100, 100, 80, 60),
        "style": {
            "fillColor": "#4CAF50",
            "fontColor": "#FFFFFF",
            "fontSize": "14",
        },
    })
}

pub fn noop_script() -> Value {
    json!({ "code": "return 1" })
}

pub fn named_script() -> Value {
    json!({
        "code": "console.log('Smoke test script executed successfully');",
        "engine": "ajs",
    })
}

fn bounds(x: i32, y: i32, w: i32, h: i32) -> Value {
    json!({ "x": x, "y": y, "w": w, "h": h })
}
