//! Organization resource mapper (spec.md §4.4): the managing organization,
//! a `ROL` unit organization, and insurer organizations referenced from
//! `Coverage.paymentBy` (spec.md §4.4).

use crate::fhir::builders::identifier_usual;
use crate::fhir::terminology::authority;
use crate::fhir::MappingError;
use crate::hl7::segments::{component, field_of};
use crate::idgen::name_uuid_str;
use fhir_model::r5::resources::Organization;

/// Builds the managing `Organization` resource for `healthcareOrganization`
/// configuration (spec.md §4.3 "Managing organization", §4.4).
pub fn map_managing(code: &str, name: &str) -> Result<(Organization, String), MappingError> {
    let id = name_uuid_str(code).to_string();
    let organization = build(&id, authority::ACSS, code, Some(name))?;
    Ok((organization, id))
}

/// Builds the `Organization` referenced by `ROL-10` (organization unit
/// type), when present (spec.md §4.3).
pub fn map_rol_unit(raw: &str) -> Result<Option<(Organization, String)>, MappingError> {
    let Some(rol) = crate::hl7::segments::raw_segments(raw, "ROL")
        .into_iter()
        .find(|rol| component(rol, 3).as_deref() == Some(authority::FHCP))
    else {
        return Ok(None);
    };

    let Some(unit_code) = field_of(&rol, 10).and_then(|f| component(f, 1)) else {
        return Ok(None);
    };

    let id = name_uuid_str(&unit_code).to_string();
    let organization = build(&id, authority::ACSS, &unit_code, None)?;
    Ok(Some((organization, id)))
}

/// Builds the insurer `Organization` referenced from an `IN1` plan
/// identifier (spec.md §4.4 Coverage).
pub fn map_insurer(plan_id: &str) -> Result<(Organization, String), MappingError> {
    let id = name_uuid_str(plan_id).to_string();
    let organization = build(&id, authority::ACSS, plan_id, None)?;
    Ok((organization, id))
}

fn build(id: &str, system: &str, code: &str, name: Option<&str>) -> Result<Organization, MappingError> {
    let mut builder = Organization::builder()
        .id(id.to_string())
        .active(true)
        .identifier(vec![Some(identifier_usual(system, code)?)]);
    if let Some(name) = name {
        builder = builder.name(name.to_string());
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managing_organization_is_active_with_acss_identifier() {
        let (org, id) = map_managing("SONHO", "SONHO").unwrap();
        assert_eq!(org.active, Some(true));
        assert!(!id.is_empty());
    }
}
