//! Patient resource mapper (spec.md §4.3, component C4 — "hardest
//! sub-part"). Projects `EVN`, `PID`, `OBX[]`, `ROL`, `NK1[]` into a single
//! FHIR R5 `Patient`, grounded in the teacher's field-by-field builder
//! style (`examples/diz-unimr-adt-to-fhir/src/fhir/patient.rs`) and
//! generalized for this gateway's repeating-segment/repeating-field needs.

use crate::config::AppConfig;
use crate::fhir::builders::{
    annotation, codeable_concept, coding, extension, human_name, identifier, nested_extension,
    reference,
};
use crate::fhir::terminology::{self, authority};
use crate::fhir::{MappingError, parse_hl7_date, parse_hl7_datetime};
use crate::hl7::segments::{component, field_of, raw_segments, repeating_field, repeats_of, subcomponents};
use crate::idgen::{name_uuid_str, random_uuid};
use fhir_model::r5::codes::NameUse;
use fhir_model::r5::resources::{Patient, PatientContact, PatientDeceased};
use fhir_model::r5::types::{Address, ContactPoint, Extension as FhirExtension, ExtensionValue, Meta};
use log::warn;

/// Everything the bundle assembler needs from the Patient mapper: the
/// built resource and the identifier the Bundle's `If-None-Exist` keys on
/// (spec.md §4.5).
pub struct PatientMapping {
    pub patient: Patient,
    pub patient_id: String,
    pub first_identifier_value: Option<String>,
}

pub fn map(raw: &str, config: &AppConfig) -> Result<PatientMapping, MappingError> {
    let pid = raw_segments(raw, "PID")
        .into_iter()
        .next()
        .ok_or(MappingError::MissingField("PID".to_string()))?;

    let (patient_id, first_identifier_value) = identity(pid);

    let identifiers = build_identifiers(pid)?;

    let mut patient = Patient::builder()
        .id(patient_id.clone())
        .identifier(identifiers)
        .name(build_names(pid)?)
        .address(build_addresses(pid, "PID", 11)?)
        .build()?;

    patient.meta = Some(build_meta(raw, config)?);

    if let Some(dob) = field_of(pid, 7) {
        patient.birth_date = Some(parse_hl7_date(dob)?);
    }

    if let Some(gender_code) = field_of(pid, 8) {
        patient.gender = Some(
            terminology::gender(gender_code).map_err(MappingError::UnknownGender)?,
        );
    }

    patient.marital_status = marital_status(pid)?;
    patient.deceased = deceased(pid)?;
    patient.telecom = build_telecom(pid)?;
    let patient_telecom_ranked = !patient.telecom.is_empty();

    let mut extensions = Vec::new();
    if let Some(birth_place) = field_of(pid, 23) {
        extensions.push(Some(birth_place_extension(birth_place)?));
    }
    for nationality in repeating_field(raw, "PID", 26) {
        extensions.push(Some(nationality_extension(nationality)?));
    }
    for obx in raw_segments(raw, "OBX") {
        if let Some(note) = note_extension(&obx)? {
            extensions.push(Some(note));
        }
    }
    patient.extension = extensions;

    patient.contact = next_of_kin(raw, patient_telecom_ranked)?;

    let gp_code = raw_segments(raw, "ROL")
        .into_iter()
        .find(|rol| component(rol, 3).as_deref() == Some(authority::FHCP));
    if let Some(rol) = gp_code {
        patient.general_practitioner = vec![Some(reference(format!(
            "Practitioner/{}",
            crate::fhir::practitioner::id_from_rol(&rol)
        ))?)];
        if let Some(unit) = field_of(&rol, 10).and_then(|f| component(f, 1)) {
            patient
                .general_practitioner
                .push(Some(reference(format!(
                    "Organization/{}",
                    name_uuid_str(&unit)
                ))?));
        }
    }

    patient.managing_organization = Some(reference(format!(
        "Organization/{}",
        name_uuid_str(&config.healthcare_organization.code)
    ))?);

    Ok(PatientMapping {
        patient,
        patient_id,
        first_identifier_value,
    })
}

fn identity(pid: &str) -> (String, Option<String>) {
    let repeats = repeats_of(field_of(pid, 3).unwrap_or(""));
    let sonho = repeats.iter().find(|repeat| {
        namespace_of(repeat, 4).as_deref() == Some(authority::SONHO)
    });

    match sonho.and_then(|repeat| component(repeat, 1)) {
        Some(id_number) => (name_uuid_str(&id_number).to_string(), Some(id_number)),
        None => (random_uuid().to_string(), None),
    }
}

fn namespace_of(repeat: &str, component_idx: usize) -> Option<String> {
    subcomponents(repeat, component_idx)
        .into_iter()
        .next()
        .or_else(|| component(repeat, component_idx))
}

fn build_identifiers(pid: &str) -> Result<Vec<Option<fhir_model::r5::types::Identifier>>, MappingError> {
    let mut identifiers = Vec::new();

    for repeat in repeats_of(field_of(pid, 3).unwrap_or("")) {
        let Some(value) = component(repeat, 1) else {
            continue;
        };
        let system = namespace_of(repeat, 4).unwrap_or_else(|| authority::SONHO.to_string());
        let type_code = component(repeat, 5).and_then(|c| terminology::identifier_type(&c));

        identifiers.push(Some(identifier(
            system,
            value,
            type_code.map(|code| (terminology::IDENTIFIER_TYPE_SYSTEM, code)),
        )?));
    }

    if let Some(account_number) = field_of(pid, 18).and_then(|f| component(f, 1)) {
        identifiers.push(Some(identifier(
            authority::SONHO,
            account_number,
            Some((terminology::IDENTIFIER_TYPE_SYSTEM, "MR")),
        )?));
    }

    Ok(identifiers)
}

fn build_names(pid: &str) -> Result<Vec<Option<fhir_model::r5::types::HumanName>>, MappingError> {
    let mut names = Vec::new();

    for repeat in repeats_of(field_of(pid, 5).unwrap_or("")) {
        let family = component(repeat, 1);
        let given1 = component(repeat, 2);
        let further = component(repeat, 3)
            .map(|g| g.split(' ').map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();

        if family.is_none() && given1.is_none() {
            continue;
        }

        let mut given = Vec::new();
        given.extend(given1);
        given.extend(further);

        let use_ = (component(repeat, 7).as_deref() == Some("L")).then_some(NameUse::Official);

        names.push(Some(human_name(family, given, use_)?));
    }

    Ok(names)
}

fn build_addresses(
    raw: &str,
    segment: &str,
    field_n: usize,
) -> Result<Vec<Option<Address>>, MappingError> {
    let mut addresses = Vec::new();

    for repeat in repeating_field(raw, segment, field_n) {
        let Some(address) = build_one_address(repeat)? else {
            continue;
        };
        addresses.push(Some(address));
    }

    Ok(addresses)
}

fn build_one_address(repeat: &str) -> Result<Option<Address>, MappingError> {
    let country_raw = component(repeat, 6);
    let postal = component(repeat, 5);
    let country = country_raw.as_deref().map(|c| {
        if c.eq_ignore_ascii_case("PRT") {
            "PT"
        } else {
            c
        }
    });

    if let Some(country) = country {
        if country.eq_ignore_ascii_case("PT") {
            let valid = postal
                .as_deref()
                .is_some_and(|p| is_valid_pt_postal_code(p));
            if !valid {
                warn!("Invalid postal code for PT address: {:?}", postal);
                return Ok(None);
            }
        } else if postal.as_deref() == Some("-") {
            return Ok(None);
        }
    }

    let line1 = subcomponents(repeat, 1)
        .into_iter()
        .next()
        .or_else(|| component(repeat, 1));
    let line2 = component(repeat, 2);
    let mut lines = Vec::new();
    lines.extend(line1);
    lines.extend(line2);

    let (use_, kind, parent_code) = terminology::address_kind(component(repeat, 7).as_deref());

    let mut builder = Address::builder()
        .line(lines.into_iter().map(Some).collect::<Vec<_>>())
        .r#type(kind);
    if let Some(use_) = use_ {
        builder = builder.r#use(use_);
    }
    if let Some(city) = component(repeat, 3) {
        builder = builder.city(city);
    }
    if let Some(district) = component(repeat, 4) {
        builder = builder.district(district);
    }
    if let Some(postal) = postal.clone() {
        builder = builder.postal_code(postal);
    }
    if let Some(country) = country {
        builder = builder.country(country.to_string());
    }

    let mut address = builder.build()?;
    address.extension = vec![Some(geo_extension(repeat, parent_code)?)];

    Ok(Some(address))
}

/// Portuguese postal codes: `\d{4}-\d{3}` (spec.md §4.3).
fn is_valid_pt_postal_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 8
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..].iter().all(u8::is_ascii_digit)
}

fn geo_extension(repeat: &str, parent_code: &str) -> Result<FhirExtension, MappingError> {
    let mut children = vec![extension(
        terminology::ADDRESS_TYPE,
        ExtensionValue::Code(parent_code.to_string()),
    )?];

    if let Some(geo) = component(repeat, 9) {
        if geo.len() >= 2 {
            children.push(extension(
                terminology::COUNTY,
                ExtensionValue::CodeableConcept(codeable_concept(
                    terminology::INE_SYSTEM,
                    geo[..2].to_string(),
                    None::<String>,
                )?),
            )?);
        }
        if geo.len() >= 4 {
            children.push(extension(
                terminology::MUNICIPALITY,
                ExtensionValue::CodeableConcept(codeable_concept(
                    terminology::INE_SYSTEM,
                    geo[..4].to_string(),
                    None::<String>,
                )?),
            )?);
        }
        children.push(extension(
            terminology::PARISH,
            ExtensionValue::CodeableConcept(codeable_concept(
                terminology::INE_SYSTEM,
                geo.clone(),
                None::<String>,
            )?),
        )?);
    }

    nested_extension(terminology::EXTENSION_ADDRESS, children)
}

fn birth_place_extension(raw_value: &str) -> Result<FhirExtension, MappingError> {
    let tokens: Vec<&str> = raw_value.split(' ').collect();
    let mut children = vec![extension(
        "COUNTRY",
        ExtensionValue::String(tokens[0].to_string()),
    )?];

    if let Some(second) = tokens.get(1) {
        match second.len() {
            6 => {
                children.push(extension(
                    terminology::COUNTY,
                    ExtensionValue::String(second[..2].to_string()),
                )?);
                children.push(extension(
                    terminology::MUNICIPALITY,
                    ExtensionValue::String(second[..4].to_string()),
                )?);
            }
            4 => {
                children.push(extension(
                    terminology::COUNTY,
                    ExtensionValue::String(second[..2].to_string()),
                )?);
                children.push(extension(
                    terminology::MUNICIPALITY,
                    ExtensionValue::String(second.to_string()),
                )?);
            }
            2 => {
                children.push(extension(
                    terminology::COUNTY,
                    ExtensionValue::String(second.to_string()),
                )?);
            }
            _ => {}
        }
    }

    if let Some(third) = tokens.get(2) {
        if third.len() == 6 {
            children.push(extension(
                terminology::PARISH,
                ExtensionValue::String(third.to_string()),
            )?);
        }
    }

    nested_extension(terminology::BIRTH_PLACE, children)
}

fn nationality_extension(repeat: &str) -> Result<FhirExtension, MappingError> {
    let code = component(repeat, 1).unwrap_or_default();
    let display = component(repeat, 2);
    extension(
        terminology::NATIONALITY,
        ExtensionValue::CodeableConcept(codeable_concept(
            terminology::INE_SYSTEM,
            code,
            display,
        )?),
    )
}

fn note_extension(obx: &str) -> Result<Option<FhirExtension>, MappingError> {
    let Some(value) = field_of(obx, 5).and_then(|f| component(f, 1).or_else(|| Some(f.to_string())))
    else {
        return Ok(None);
    };
    if value.is_empty() {
        return Ok(None);
    }

    let mut note = annotation(value)?;
    if let Some(time) = field_of(obx, 14) {
        if let Ok(parsed) = parse_hl7_datetime(time) {
            note.time = Some(parsed);
        }
    }

    Ok(Some(extension(
        terminology::PATIENTNOTES,
        ExtensionValue::Annotation(note),
    )?))
}

fn marital_status(
    pid: &str,
) -> Result<Option<fhir_model::r5::types::CodeableConcept>, MappingError> {
    let Some(raw_field) = field_of(pid, 16) else {
        return Ok(None);
    };
    let Some(code) = component(raw_field, 1) else {
        return Ok(None);
    };

    let (status_code, display) = terminology::marital_status(&code);
    Ok(Some(codeable_concept(
        terminology::MARITAL_STATUS_SYSTEM,
        status_code,
        Some(display),
    )?))
}

fn deceased(pid: &str) -> Result<Option<PatientDeceased>, MappingError> {
    if let Some(death_time) = field_of(pid, 29) {
        return Ok(Some(PatientDeceased::DateTime(parse_hl7_datetime(
            death_time,
        )?)));
    }
    match field_of(pid, 30) {
        Some("Y") => Ok(Some(PatientDeceased::Boolean(true))),
        Some("N") => Ok(Some(PatientDeceased::Boolean(false))),
        _ => Ok(None),
    }
}

fn build_telecom(pid: &str) -> Result<Vec<Option<ContactPoint>>, MappingError> {
    let mut telecoms = Vec::new();
    let mut ranked = false;

    for field_n in [13usize, 14usize] {
        for repeat in repeating_field(pid, "PID", field_n) {
            let Some(point) = build_one_telecom(repeat)? else {
                continue;
            };
            let mut point = point;
            if !ranked {
                point.rank = Some(1);
                ranked = true;
            }
            telecoms.push(Some(point));
        }
    }

    Ok(telecoms)
}

fn build_one_telecom(repeat: &str) -> Result<Option<ContactPoint>, MappingError> {
    let phone = component(repeat, 12);
    let email = component(repeat, 4).filter(|e| e.contains('@'));
    let Some(value) = phone.or(email) else {
        return Ok(None);
    };

    let equipment = component(repeat, 3);
    let use_code = component(repeat, 2);

    let mut builder = ContactPoint::builder()
        .system(terminology::telecom_system(equipment.as_deref()))
        .value(value);
    if let Some(use_) = terminology::telecom_use(use_code.as_deref(), equipment.as_deref()) {
        builder = builder.r#use(use_);
    }

    Ok(Some(builder.build()?))
}

/// Builds `Patient.contact` from each `NK1` segment (spec.md §4.3). `rank`
/// for the first NK1 telecom with a value is only set to `1` if the
/// Patient-level telecom (`PID-13`/`PID-14`) left none ranked.
fn next_of_kin(raw: &str, patient_telecom_ranked: bool) -> Result<Vec<Option<PatientContact>>, MappingError> {
    let mut contacts = Vec::new();
    let mut ranked = patient_telecom_ranked;

    for nk1 in raw_segments(raw, "NK1") {
        let relationship_code = field_of(&nk1, 3)
            .and_then(|f| component(f, 1))
            .unwrap_or_default();
        let (system, code) = if relationship_code.is_empty() {
            terminology::nk1_relationship("")
        } else {
            terminology::nk1_relationship(&relationship_code)
        };
        if !["FTH", "MTH", "SPO", "EXF", "EMC", "OTH", "SEL"].contains(&relationship_code.as_str())
        {
            warn!("Unknown NK1-3 relationship code: {relationship_code}");
        }

        let mut builder = PatientContact::builder()
            .relationship(vec![Some(codeable_concept(system, code, None::<String>)?)]);

        if let Some(name_field) = field_of(&nk1, 2) {
            let family = component(name_field, 1);
            let given = component(name_field, 2).map(|g| vec![Some(g)]).unwrap_or_default();
            if family.is_some() || !given.is_empty() {
                builder = builder.name(human_name(family, given.into_iter().flatten().collect(), None)?);
            }
        }

        if let Some(addr_field) = field_of(&nk1, 4) {
            if let Some(address) = build_one_address(addr_field)? {
                builder = builder.address(address);
            }
        }

        let mut telecoms = Vec::new();
        if let Some(phone_field) = field_of(&nk1, 5) {
            for phone_repeat in repeats_of(phone_field) {
                if let Some(mut point) = build_one_telecom(phone_repeat)? {
                    if !ranked {
                        point.rank = Some(1);
                        ranked = true;
                    }
                    telecoms.push(Some(point));
                }
            }
        }
        builder = builder.telecom(telecoms);

        contacts.push(Some(builder.build()?));
    }

    Ok(contacts)
}

fn build_meta(raw: &str, config: &AppConfig) -> Result<Meta, MappingError> {
    let mut builder = Meta::builder();

    let evn = raw_segments(raw, "EVN").into_iter().next();
    if let Some(evn) = &evn {
        if let Some(recorded) = field_of(evn, 2) {
            if let Ok(parsed) = parse_hl7_datetime(recorded) {
                builder = builder.last_updated(fhir_model::Instant(match parsed {
                    fhir_model::DateTime::DateTime(instant) => instant.0,
                    _ => unreachable!(),
                }));
            }
        }
    }

    let event_type = evn.as_deref().and_then(|seg| field_of(seg, 1));
    if matches!(event_type, Some("A40") | Some("A45")) {
        builder = builder.security(vec![Some(coding(
            config.fhir.security_label.system.clone(),
            config.fhir.security_label.code.clone(),
            None::<String>,
        )?)]);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir_model::r5::codes::AdministrativeGender;

    const A28: &str = "MSH|^~\\&|ORBIS|KH|WEBEPA|KH|20240101120000||ADT^A28^ADT_A05|MSG0001|P|2.5\r\
EVN|A28|20240101120000\r\
PID|1||12345^^^SONHO^NS||DOE^JOHN^M||19800101|M|||Rua A^^Lisboa^^1000-001^PT^C^^110503\r";

    #[test]
    fn maps_identity_name_gender_birthdate() {
        let config = AppConfig::default();
        let mapping = map(A28, &config).unwrap();

        assert_eq!(mapping.first_identifier_value.as_deref(), Some("12345"));
        assert_eq!(mapping.patient.gender, Some(AdministrativeGender::Male));
        assert_eq!(mapping.patient.address.len(), 1);
    }

    #[test]
    fn drops_invalid_pt_postal_code() {
        let bad = A28.replace("1000-001", "10001");
        let config = AppConfig::default();
        let mapping = map(&bad, &config).unwrap();
        assert!(mapping.patient.address.is_empty());
    }

    #[test]
    fn unknown_gender_is_an_error() {
        let bad = A28.replace("|M|", "|Z|");
        let config = AppConfig::default();
        let err = map(&bad, &config).unwrap_err();
        assert!(matches!(err, MappingError::UnknownGender(_)));
    }

    #[test]
    fn mints_random_id_without_sonho_identifier() {
        let no_sonho = A28.replace("12345^^^SONHO^NS", "12345^^^OTHER^NS");
        let config = AppConfig::default();
        let mapping = map(&no_sonho, &config).unwrap();
        assert_eq!(mapping.first_identifier_value, None);
        assert!(!mapping.patient_id.is_empty());
    }
}
