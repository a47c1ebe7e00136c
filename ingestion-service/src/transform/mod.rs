pub mod aliases;

use std::{str::FromStr, time::SystemTime};

use rust_decimal::Decimal;
use seismic_client::domain::{EventTimes, SeismicRecord};
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    pipeline::{BatchKey, Envelope, PipelineError, Transform},
    sources::RawAttributes,
};
use aliases::{resolve, Field};

/// Public page backed by the ArcGIS layer.
pub const IGP_PAGE_URL: &str = "https://ultimosismo.igp.gob.pe/ultimo-sismo/sismos-reportados";
pub const IGP_SOURCE_LABEL: &str = "IGP";

/// Provenance stamped on every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub label: String,
    pub url: String,
}

impl Default for Provenance {
    fn default() -> Self {
        Self {
            label: IGP_SOURCE_LABEL.to_string(),
            url: IGP_PAGE_URL.to_string(),
        }
    }
}

impl BatchKey for SeismicRecord {
    fn batch_key(&self) -> &str {
        &self.id
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn decimal(value: &Value) -> Option<Decimal> {
    let repr = match value {
        Value::String(s) => s.trim().to_string(),
        // Go through the JSON text so `-12.05` stays `-12.05`, not its f64 expansion.
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&repr)
        .or_else(|_| Decimal::from_scientific(&repr))
        .ok()
}

/// Whole milliseconds; floats outside the `i64` range are rejected, not saturated.
fn epoch_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_ms)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float_ms(f: f64) -> Option<i64> {
    let ms = f.trunc();
    // `i64::MAX as f64` rounds up to 2^63, which is itself out of range.
    (ms.is_finite() && ms >= i64::MIN as f64 && ms < i64::MAX as f64).then_some(ms as i64)
}

/// Agency code when present, otherwise `OBJ-<objectid>`.
pub fn record_id(attrs: &RawAttributes) -> Option<String> {
    resolve(attrs, Field::Code)
        .and_then(text)
        .or_else(|| {
            resolve(attrs, Field::ObjectId)
                .and_then(text)
                .map(|object_id| format!("OBJ-{object_id}"))
        })
}

/// Map one feature's attributes to a canonical record.
///
/// Coercion failures null the affected field. The record is rejected with
/// `PipelineError::Validation` only when it has no identifier or lacks
/// magnitude, latitude or longitude afterwards.
pub fn normalize(
    attrs: &RawAttributes,
    provenance: &Provenance,
    scraped_at: &str,
) -> Result<SeismicRecord, PipelineError> {
    let text_of = |field: Field| resolve(attrs, field).and_then(text);
    let decimal_of = |field: Field| resolve(attrs, field).and_then(decimal);

    let id = record_id(attrs).ok_or_else(|| {
        PipelineError::Validation("feature has neither code nor objectid".to_string())
    })?;

    let latitude = decimal_of(Field::Latitude);
    let longitude = decimal_of(Field::Longitude);
    let magnitude = decimal_of(Field::Magnitude);
    let (Some(latitude), Some(longitude), Some(magnitude)) = (latitude, longitude, magnitude) else {
        let missing: Vec<&str> = [
            ("magnitude", magnitude.is_none()),
            ("latitude", latitude.is_none()),
            ("longitude", longitude.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, is_missing)| is_missing.then_some(name))
        .collect();
        return Err(PipelineError::Validation(format!(
            "{id}: missing {}",
            missing.join(", ")
        )));
    };

    let event_time_epoch_ms = resolve(attrs, Field::EventTime).and_then(epoch_ms);
    let times = event_time_epoch_ms.and_then(EventTimes::from_epoch_ms);

    Ok(SeismicRecord {
        id,
        code: text_of(Field::Code),
        event_time_epoch_ms,
        event_time_utc: times.as_ref().map(|t| t.utc.clone()),
        event_time_local: times.map(|t| t.local),
        latitude,
        longitude,
        magnitude,
        magnitude_scale: text_of(Field::MagnitudeScale),
        depth_km: decimal_of(Field::DepthKm),
        depth_category: text_of(Field::DepthCategory),
        reference_place: text_of(Field::ReferencePlace),
        region: text_of(Field::Region),
        intensity: text_of(Field::Intensity),
        felt_report: text_of(Field::FeltReport),
        report_date: text_of(Field::ReportDate),
        report_time: text_of(Field::ReportTime),
        latest_flag: text_of(Field::LatestFlag),
        report_flag: text_of(Field::ReportFlag),
        scraped_at: scraped_at.to_string(),
        source_label: provenance.label.clone(),
        source_url: provenance.url.clone(),
    })
}

fn rfc3339_utc(at: SystemTime) -> Result<String, PipelineError> {
    OffsetDateTime::from(at)
        .format(&Rfc3339)
        .map_err(|e| PipelineError::Validation(format!("unrepresentable fetch time: {e}")))
}

#[derive(Clone, Default)]
pub struct SeismicNormalizer {
    provenance: Provenance,
}

impl SeismicNormalizer {
    pub fn new(provenance: Provenance) -> Self {
        Self { provenance }
    }
}

#[async_trait::async_trait]
impl Transform<RawAttributes, SeismicRecord> for SeismicNormalizer {
    async fn apply(
        &self,
        input: Envelope<RawAttributes>,
    ) -> Result<Envelope<SeismicRecord>, PipelineError> {
        let scraped_at = rfc3339_utc(input.received_at)?;
        match normalize(&input.payload, &self.provenance, &scraped_at) {
            Ok(record) => Ok(Envelope {
                payload: record,
                received_at: input.received_at,
            }),
            Err(e) => {
                metrics::counter!("normalize_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}
