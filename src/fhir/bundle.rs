//! Transaction Bundle assembler (spec.md §4.5, component C5). Composes the
//! Patient/Practitioner/Organization/Coverage resources built by the other
//! mappers into a single FHIR R5 transaction `Bundle`, attaching
//! conditional-create request entries.
//!
//! Applies two of spec.md §9's REDESIGN FLAGS against the source this was
//! distilled from: `request.url` is set to the actual resource type
//! (flag 1), and `Coverage`'s `If-None-Exist` selects on `beneficiary=`
//! rather than the invalid `?name=` (flag 2).

use crate::config::AppConfig;
use crate::fhir::{coverage, organization, patient, practitioner, MappingError};
use crate::hl7::segments::{field_of, raw_segments};
use fhir_model::r5::codes::{BundleType, HTTPVerb};
use fhir_model::r5::resources::{Bundle, BundleEntry, BundleEntryRequest, Resource, ResourceType};

/// Builds the transaction Bundle for an ADT^A28 message (spec.md §4.5,
/// §4.6). `raw` is the decoded, unframed message text.
pub fn build_bundle(config: &AppConfig, raw: &str) -> Result<Bundle, MappingError> {
    let control_id = raw_segments(raw, "MSH")
        .first()
        .and_then(|msh| field_of(msh, 9))
        .ok_or(MappingError::MissingField("MSH-10".to_string()))?
        .to_lowercase();

    let patient_mapping = patient::map(raw, config)?;
    let patient_id = patient_mapping.patient_id.clone();

    let mut entries = Vec::new();

    let patient_selector = patient_mapping
        .first_identifier_value
        .clone()
        .unwrap_or_else(|| patient_id.clone());
    entries.push(put_entry(
        Resource::from(patient_mapping.patient),
        ResourceType::Patient,
        format!("identifier=SONHO|{patient_selector}"),
    )?);

    let (managing_org, _) = organization::map_managing(
        &config.healthcare_organization.code,
        &config.healthcare_organization.name,
    )?;
    entries.push(put_entry(
        Resource::from(managing_org),
        ResourceType::Organization,
        format!("identifier=SONHO|{}", config.healthcare_organization.code),
    )?);

    if let Some((gp, _id)) = practitioner::map_general_practitioner(raw)? {
        let family = gp
            .name
            .first()
            .and_then(|n| n.as_ref())
            .and_then(|n| n.family.clone())
            .unwrap_or_default();
        entries.push(put_entry(
            Resource::from(gp),
            ResourceType::Practitioner,
            format!("name={family}"),
        )?);
    }

    if let Some((unit_org, unit_code)) = organization::map_rol_unit(raw)? {
        entries.push(put_entry(
            Resource::from(unit_org),
            ResourceType::Organization,
            format!("identifier=SONHO|{unit_code}"),
        )?);
    }

    for mapping in coverage::map(raw, &patient_id)? {
        let insurer_value = mapping
            .insurer
            .identifier
            .first()
            .and_then(|id| id.as_ref())
            .and_then(|id| id.value.clone())
            .unwrap_or_default();
        entries.push(put_entry(
            Resource::from(mapping.insurer),
            ResourceType::Organization,
            format!("identifier=SONHO|{insurer_value}"),
        )?);
        entries.push(put_entry(
            Resource::from(mapping.coverage),
            ResourceType::Coverage,
            format!("beneficiary=Patient/{patient_id}"),
        )?);
    }

    Ok(Bundle::builder()
        .id(control_id)
        .r#type(BundleType::Transaction)
        .entry(entries.into_iter().map(Some).collect::<Vec<_>>())
        .build()?)
}

fn put_entry(
    resource: Resource,
    resource_type: ResourceType,
    if_none_exist: String,
) -> Result<BundleEntry, MappingError> {
    let request = BundleEntryRequest::builder()
        .method(HTTPVerb::Post)
        .url(resource_type.to_string())
        .if_none_exist(if_none_exist)
        .build()?;

    Ok(BundleEntry::builder()
        .resource(resource)
        .request(request)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    const A28: &str = "MSH|^~\\&|ORBIS|KH|WEBEPA|KH|20240101120000||ADT^A28^ADT_A05|MSG0001|P|2.5\r\
EVN|A28|20240101120000\r\
PID|1||12345^^^SONHO^NS||DOE^JOHN^M||19800101|M|||Rua A^^Lisboa^^1000-001^PT^C^^110503\r";

    fn read_test_resource(file_name: &str) -> String {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("resources/test");
        path.push(file_name);
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("test resource not found: {}", path.display()))
    }

    #[test]
    fn builds_a_bundle_with_patient_and_managing_organization() {
        let config = AppConfig::default();
        let bundle = build_bundle(&config, A28).unwrap();

        assert_eq!(bundle.id.as_deref(), Some("msg0001"));
        assert_eq!(bundle.entry.len(), 2);
    }

    #[test]
    fn happy_path_fixture_yields_patient_practitioner_org_and_coverage_entries() {
        let config = AppConfig::default();
        let raw = read_test_resource("a28_happy_path.hl7").replace('\n', "\r");
        let bundle = build_bundle(&config, &raw).unwrap();

        assert_eq!(bundle.id.as_deref(), Some("msg0001"));
        // Patient, managing Organization, GP Practitioner, ROL-unit Organization,
        // insurer Organization, Coverage.
        assert_eq!(bundle.entry.len(), 6);
    }

    #[test]
    fn invalid_postal_code_fixture_still_yields_a_bundle_without_addresses() {
        let config = AppConfig::default();
        let raw = read_test_resource("a28_invalid_postal_code.hl7").replace('\n', "\r");
        let bundle = build_bundle(&config, &raw).unwrap();

        assert_eq!(bundle.id.as_deref(), Some("msg0002"));
        let patient_entry = bundle.entry.first().unwrap().as_ref().unwrap();
        let patient_json = serde_json::to_value(patient_entry.resource.as_ref().unwrap()).unwrap();
        assert_eq!(patient_json["resourceType"], "Patient");
        let has_addresses = patient_json["address"]
            .as_array()
            .is_some_and(|a| !a.is_empty());
        assert!(!has_addresses);
    }
}
