//! Practitioner resource mapper (spec.md §4.4). Builds the general
//! practitioner referenced from `Patient.generalPractitioner`, derived from
//! the `ROL` segment whose role code is `FHCP`.

use crate::fhir::builders::{human_name, identifier};
use crate::fhir::terminology::{self, authority};
use crate::fhir::MappingError;
use crate::hl7::segments::{component, field_of, raw_segments, repeats_of};
use crate::idgen::{name_uuid_str, random_uuid};
use fhir_model::r5::codes::NameUse;
use fhir_model::r5::resources::Practitioner;

/// Deterministic id for the practitioner referenced by a `ROL` segment:
/// the first `ROL-4` person's `IDNumber` if present, else the concatenated
/// family+given name, else a random id (spec.md §4.3 "General
/// practitioner").
pub fn id_from_rol(rol: &str) -> String {
    let first_person = field_of(rol, 4)
        .map(repeats_of)
        .and_then(|reps| reps.into_iter().next().map(str::to_string));

    match first_person.as_deref() {
        Some(person) => match component(person, 1) {
            Some(id_number) => name_uuid_str(&id_number).to_string(),
            None => {
                let family = component(person, 2).unwrap_or_default();
                let given = component(person, 3).unwrap_or_default();
                if family.is_empty() && given.is_empty() {
                    random_uuid().to_string()
                } else {
                    name_uuid_str(&format!("{family}{given}")).to_string()
                }
            }
        },
        None => random_uuid().to_string(),
    }
}

/// Builds the `Practitioner` resource for the first `ROL` segment whose
/// role code (`ROL-3.1`) is `FHCP`, if any (spec.md §4.3, §4.4).
pub fn map_general_practitioner(raw: &str) -> Result<Option<(Practitioner, String)>, MappingError> {
    let Some(rol) = raw_segments(raw, "ROL")
        .into_iter()
        .find(|rol| component(rol, 3).as_deref() == Some(authority::FHCP))
    else {
        return Ok(None);
    };

    let id = id_from_rol(&rol);
    let Some(person) = field_of(&rol, 4)
        .map(repeats_of)
        .and_then(|reps| reps.into_iter().next().map(str::to_string))
    else {
        return Ok(None);
    };

    let family = component(&person, 2);
    let given1 = component(&person, 3);
    let middles = component(&person, 4)
        .map(|m| m.split(' ').map(str::to_string).collect::<Vec<_>>())
        .unwrap_or_default();

    let mut given = Vec::new();
    given.extend(given1);
    given.extend(middles);

    let mut practitioner = Practitioner::builder()
        .id(id.clone())
        .name(vec![Some(human_name(family, given, Some(NameUse::Usual))?)])
        .build()?;

    if let Some(id_number) = component(&person, 1) {
        let namespace_raw = component(&person, 9);
        let namespace = namespace_raw.as_deref().unwrap_or(authority::SONHO);
        let system = if namespace == authority::MECANOGRAFICO {
            authority::RHV
        } else {
            namespace
        };
        let type_code = component(&person, 13)
            .and_then(|code| terminology::practitioner_identifier_type(&code, system));

        practitioner.identifier = vec![Some(identifier(
            system,
            id_number,
            type_code.map(|code| (terminology::IDENTIFIER_TYPE_SYSTEM, code)),
        )?)];
    }

    Ok(Some((practitioner, id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_general_practitioner_from_rol() {
        let raw = "MSH|^~\\&|A|B|C|D|20240101000000||ADT^A28|1|P|2.5\r\
ROL|1||FHCP|1001^SMITH^JANE^^^^^^SONHO^^^MD\r";
        let (practitioner, id) = map_general_practitioner(raw).unwrap().unwrap();
        assert_eq!(practitioner.name.len(), 1);
        assert!(!id.is_empty());
    }

    #[test]
    fn returns_none_without_fhcp_role() {
        let raw = "MSH|^~\\&|A|B|C|D|20240101000000||ADT^A28|1|P|2.5\r";
        assert!(map_general_practitioner(raw).unwrap().is_none());
    }
}
