pub mod arcgis;
#[cfg(test)]
pub(crate) mod fixture;

pub use arcgis::{parse_query_response, ArcGisSource};

/// One upstream feature's `attributes` object, schema-free.
pub type RawAttributes = serde_json::Map<String, serde_json::Value>;
