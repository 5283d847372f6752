pub mod json;

pub use json::{json_response, JsonError, JSON_CONTENT_TYPE};
