use rust_decimal::Decimal;

/// Canonical earthquake record, one per upstream feature.
///
/// Optional fields are `None` rather than empty strings; serialized forms
/// omit them entirely.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeismicRecord {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub code: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub event_time_epoch_ms: Option<i64>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub event_time_utc: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub event_time_local: Option<String>,
    #[cfg_attr(feature = "serde", serde(with = "rust_decimal::serde::float"))]
    pub latitude: Decimal,
    #[cfg_attr(feature = "serde", serde(with = "rust_decimal::serde::float"))]
    pub longitude: Decimal,
    #[cfg_attr(feature = "serde", serde(with = "rust_decimal::serde::float"))]
    pub magnitude: Decimal,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub magnitude_scale: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            skip_serializing_if = "Option::is_none",
            with = "rust_decimal::serde::float_option"
        )
    )]
    pub depth_km: Option<Decimal>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub depth_category: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub reference_place: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub region: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub intensity: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub felt_report: Option<String>,
    /// Agency-local calendar date as published (e.g. `13/11/2025`).
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub report_date: Option<String>,
    /// Agency-local wall-clock time as published (e.g. `04:04:40`).
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub report_time: Option<String>,
    /// Agency's "latest event" marker, verbatim.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub latest_flag: Option<String>,
    /// Agency's report marker, verbatim.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub report_flag: Option<String>,
    pub scraped_at: String,
    pub source_label: String,
    pub source_url: String,
}
