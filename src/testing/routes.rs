//! Server-relative routes of the modeling API

pub const STATUS: &str = "/status";
pub const OPENAPI: &str = "/openapi.json";
pub const TYPES: &str = "/types";
pub const SCRIPT_ENGINES: &str = "/script/engines";
pub const SCRIPT_RUN: &str = "/script/run";
pub const FOLDERS: &str = "/folders";
pub const ELEMENTS: &str = "/elements";
pub const RELATIONS: &str = "/relations";
pub const VIEWS: &str = "/views";
pub const MODEL_SAVE: &str = "/model/save";

pub fn element(id: &str) -> String {
    format!("{ELEMENTS}/{id}")
}

pub fn relation(id: &str) -> String {
    format!("{RELATIONS}/{id}")
}

pub fn view(id: &str) -> String {
    format!("{VIEWS}/{id}")
}

pub fn view_content(view_id: &str) -> String {
    format!("{VIEWS}/{view_id}/content")
}

pub fn view_add_element(view_id: &str) -> String {
    format!("{VIEWS}/{view_id}/add-element")
}

pub fn view_add_relation(view_id: &str) -> String {
    format!("{VIEWS}/{view_id}/add-relation")
}

pub fn view_object(view_id: &str, object_id: &str) -> String {
    format!("{VIEWS}/{view_id}/objects/{object_id}")
}
