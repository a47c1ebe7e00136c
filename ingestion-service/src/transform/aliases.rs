use serde_json::Value;

use crate::sources::RawAttributes;

/// Upstream attribute a canonical field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Code,
    ObjectId,
    ReportDate,
    ReportTime,
    EventTime,
    Latitude,
    Longitude,
    Magnitude,
    MagnitudeScale,
    DepthKm,
    DepthCategory,
    ReferencePlace,
    Region,
    Intensity,
    FeltReport,
    LatestFlag,
    ReportFlag,
}

impl Field {
    /// Accepted upstream keys, in lookup order.
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Code => &["code", "CODIGO", "Codigo"],
            Field::ObjectId => &["objectid", "OBJECTID", "ObjectID"],
            Field::ReportDate => &["fecha", "FECHA"],
            Field::ReportTime => &["hora", "HORA"],
            Field::EventTime => &["fechaevento", "FECHAEVENTO"],
            Field::Latitude => &["lat", "LAT", "latitude", "Latitude", "y", "Y"],
            Field::Longitude => &["lon", "LON", "longitud", "Longitude", "x", "X"],
            Field::Magnitude => &["magnitud", "MAGNITUD", "magnitude", "MAGNITUDE"],
            Field::MagnitudeScale => &["mag", "MAG"],
            // `profundidad` is usually the qualitative bucket; it only yields a
            // depth when it happens to be numeric.
            Field::DepthKm => &["prof", "PROF", "profundidad", "PROFUNDIDAD", "depth"],
            Field::DepthCategory => &["profundidad", "PROFUNDIDAD"],
            Field::ReferencePlace => &["ref", "REF", "referencia", "Referencia", "lugar", "LUGAR"],
            Field::Region => &["departamento", "DEPARTAMENTO"],
            Field::Intensity => &["int_", "INT_"],
            Field::FeltReport => &["sentido", "SENTIDO"],
            Field::LatestFlag => &["ultimo", "ULTIMO"],
            Field::ReportFlag => &["reporte", "REPORTE"],
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// First non-blank value among the field's aliases.
pub fn resolve(attrs: &RawAttributes, field: Field) -> Option<&Value> {
    field
        .aliases()
        .iter()
        .filter_map(|key| attrs.get(*key))
        .find(|value| !is_blank(value))
}
