use serde_json::{json, Value};

use crate::{
    pipeline::{Envelope, PipelineError, Source},
    sources::{parse_query_response, RawAttributes},
};

/// Replays a canned ArcGIS response body through the real response parser.
pub(crate) struct StaticSource {
    body: Value,
}

impl StaticSource {
    pub(crate) fn new(body: Value) -> Self {
        Self { body }
    }
}

#[async_trait::async_trait]
impl Source<RawAttributes> for StaticSource {
    async fn fetch(&self) -> Result<Vec<Envelope<RawAttributes>>, PipelineError> {
        Ok(parse_query_response(self.body.clone())?
            .into_iter()
            .map(Envelope::new)
            .collect())
    }
}

/// A valid upstream feature; `code` is `IGP/CENSIS/RS 2025-07NN`.
pub(crate) fn feature(n: u32) -> Value {
    json!({
        "attributes": {
            "objectid": 1000 + n,
            "code": format!("IGP/CENSIS/RS 2025-07{n:02}"),
            "fecha": "13/11/2025",
            "hora": "04:04:40",
            "fechaevento": 1_763_024_680_000_i64 - i64::from(n) * 3_600_000,
            "lat": -12.05 - f64::from(n) / 100.0,
            "lon": -77.03,
            "magnitud": 4.5,
            "mag": "ML",
            "prof": 35,
            "profundidad": "Superficial",
            "ref": "20 km al O de Lima",
            "departamento": "LIMA",
            "int_": "III Lima",
            "sentido": "Si"
        }
    })
}

/// A feature that fails minimum-field validation (no magnitude).
pub(crate) fn invalid_feature(n: u32) -> Value {
    json!({
        "attributes": {
            "objectid": 2000 + n,
            "code": format!("IGP/CENSIS/RS 2025-09{n:02}"),
            "lat": -12.05,
            "lon": -77.03,
            "magnitud": null
        }
    })
}
