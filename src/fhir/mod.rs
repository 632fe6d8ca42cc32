//! HL7-to-FHIR transaction-Bundle builder (spec.md §4.3–§4.5, components
//! C1–C5): the deterministic projection from HL7 v2.5 ADT^A28 segments
//! into a FHIR R5 transaction Bundle.

pub mod builders;
pub mod bundle;
pub mod coverage;
pub mod organization;
pub mod patient;
pub mod practitioner;
pub mod terminology;

use fhir_model::BuilderError;
use thiserror::Error;

pub use bundle::build_bundle;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error(transparent)]
    Builder(#[from] BuilderError),
    #[error(transparent)]
    Formatting(#[from] FormattingError),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("unknown gender code: {0}")]
    UnknownGender(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Wraps date/time parsing failures from the `PID-7`/`EVN-2`/`PID-29`
/// conversions (spec.md §4.3), kept distinct from [`MappingError`] the way
/// the teacher separates `FormattingError` from `MappingError`.
#[derive(Debug, Error)]
pub enum FormattingError {
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    #[error(transparent)]
    Date(#[from] fhir_model::DateFormatError),
    #[error(transparent)]
    ComponentRange(#[from] fhir_model::time::error::ComponentRange),
    #[error(transparent)]
    TimeParse(#[from] fhir_model::time::error::Parse),
    #[error(transparent)]
    InvalidFormat(#[from] fhir_model::time::error::InvalidFormatDescription),
}

/// Parses an HL7 `yyyyMMdd` or `yyyyMMddHHmmss` timestamp into a FHIR
/// [`fhir_model::DateTime`] (spec.md §4.3, "8-digit inputs are padded with
/// `000000`").
pub fn parse_hl7_datetime(input: &str) -> Result<fhir_model::DateTime, FormattingError> {
    use chrono::NaiveDateTime;
    use fhir_model::time::{Month, OffsetDateTime};
    use fhir_model::{Instant, time::Date as TimeDate, time::Time};

    let padded = if input.len() == 8 {
        format!("{input}000000")
    } else {
        input.to_string()
    };
    let dt = NaiveDateTime::parse_from_str(&padded, "%Y%m%d%H%M%S")?;

    use chrono::{Datelike, Timelike};
    let date = TimeDate::from_calendar_date(
        dt.year(),
        Month::try_from(dt.month() as u8)?,
        dt.day() as u8,
    )?;
    let time = Time::from_hms(dt.hour() as u8, dt.minute() as u8, dt.second() as u8)?;

    Ok(fhir_model::DateTime::DateTime(Instant(
        OffsetDateTime::new_utc(date, time),
    )))
}

/// Parses an HL7 `yyyyMMdd` date into a FHIR [`fhir_model::Date`] (spec.md
/// §4.3 birth date, EVN-2 `lastUpdated`).
pub fn parse_hl7_date(input: &str) -> Result<fhir_model::Date, FormattingError> {
    use chrono::{Datelike, NaiveDate};
    use fhir_model::time::Month;

    let dt = NaiveDate::parse_and_remainder(&input[..8.min(input.len())], "%Y%m%d")?.0;
    let date = fhir_model::time::Date::from_calendar_date(
        dt.year(),
        Month::try_from(dt.month() as u8)?,
        dt.day() as u8,
    )?;
    Ok(fhir_model::Date::Date(date))
}
