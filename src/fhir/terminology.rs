//! Static code tables and FHIR extension URIs (spec.md §4.3–§4.4, component
//! C1). Grounded in the teacher's inline marital-status/gender tables
//! (`examples/diz-unimr-adt-to-fhir/src/fhir/patient.rs`), generalized to
//! the additional tables this gateway's segments require.

use fhir_model::r5::codes::{AddressType, AddressUse, ContactPointSystem, ContactPointUse};

/// Assigning authorities this gateway recognizes in `CX-4`/`XCN-9`
/// namespaces (spec.md §4.3–§4.4).
pub mod authority {
    pub const SONHO: &str = "SONHO";
    pub const RHV: &str = "RHV";
    pub const MEI: &str = "MEI";
    pub const ACSS: &str = "ACSS";
    pub const CSP: &str = "CSP";
    pub const FHCP: &str = "FHCP";
    pub const MECANOGRAFICO: &str = "N.Mecanográfico";
}

/// FHIR extension and terminology system URIs used throughout the Patient
/// mapper. Scoped under this gateway's own namespace, the way the teacher
/// scopes its profile/system URIs under its institution's domain.
pub const EXTENSION_ADDRESS: &str = "https://fhir.sns.gov.pt/StructureDefinition/address-geo";
pub const ADDRESS_TYPE: &str = "https://fhir.sns.gov.pt/StructureDefinition/address-geo-type";
pub const COUNTY: &str = "https://fhir.sns.gov.pt/StructureDefinition/county";
pub const MUNICIPALITY: &str = "https://fhir.sns.gov.pt/StructureDefinition/municipality";
pub const PARISH: &str = "https://fhir.sns.gov.pt/StructureDefinition/parish";
pub const BIRTH_PLACE: &str = "https://fhir.sns.gov.pt/StructureDefinition/birth-place";
pub const NATIONALITY: &str = "https://fhir.sns.gov.pt/StructureDefinition/nationality";
pub const PATIENTNOTES: &str = "https://fhir.sns.gov.pt/StructureDefinition/patient-notes";

/// INE (Instituto Nacional de Estatística) geographic code system, used for
/// county/municipality/parish and nationality codings.
pub const INE_SYSTEM: &str = "http://www.ine.pt";

pub const IDENTIFIER_TYPE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v2-0203";
pub const MARITAL_STATUS_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v3-MaritalStatus";
pub const V3_ROLE_CODE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v3-RoleCode";
pub const V2_0131_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v2-0131";

/// `PID-3.CX-5` (SONHO identifier type) → FHIR `v2-0203` identifier type
/// code (spec.md §4.3).
pub fn identifier_type(sonho_code: &str) -> Option<&'static str> {
    match sonho_code {
        "NS" => Some("PI"),
        "SNS" => Some("HC"),
        "B" => Some("CZ"),
        "NIF" => Some("TAX"),
        "NISS" => Some("SS"),
        "P" => Some("PPN"),
        "C" => Some("BCFN"),
        "PRC" => Some("PRC"),
        _ => None,
    }
}

/// `PID-8` administrative gender. Unknown codes are a hard error per
/// spec.md §4.3 ("deliberate: the caller must notice") — see DESIGN.md for
/// the Open Question this resolves.
pub fn gender(code: &str) -> Result<fhir_model::r5::codes::AdministrativeGender, String> {
    use fhir_model::r5::codes::AdministrativeGender::*;
    match code {
        "M" => Ok(Male),
        "F" => Ok(Female),
        "A" => Ok(Other),
        "U" => Ok(Unknown),
        other => Err(other.to_string()),
    }
}

/// `PID-16.CE-1` marital status → `(code, display)` on
/// [`MARITAL_STATUS_SYSTEM`].
pub fn marital_status(code: &str) -> (&'static str, &'static str) {
    match code {
        "A" | "E" => ("L", "Legally Separated"),
        "D" => ("D", "Divorced"),
        "M" => ("M", "Married"),
        "S" => ("S", "Never Married"),
        "W" => ("W", "Widowed"),
        "C" => ("C", "Common Law"),
        "G" | "P" | "R" => ("T", "Domestic partner"),
        "N" => ("A", "Annulled"),
        "I" => ("I", "Interlocutory"),
        "B" => ("U", "Unmarried"),
        _ => ("UNK", "Unknown"),
    }
}

/// `XAD-7` address type → `(AddressUse, AddressType, geo extension parent
/// code)` (spec.md §4.3 table).
pub fn address_kind(xad7: Option<&str>) -> (Option<AddressUse>, AddressType, &'static str) {
    match xad7 {
        Some("C") => (None, AddressType::Postal, "CURRENT"),
        Some("O") => (Some(AddressUse::Work), AddressType::Both, "OFFICE"),
        Some("N") | Some("MA") | Some("M") => {
            (Some(AddressUse::Home), AddressType::Both, "MAIN_ADDRESS")
        }
        _ => (Some(AddressUse::Home), AddressType::Both, "MAIN_ADDRESS"),
    }
}

/// `XTN-3` equipment type → `ContactPointSystem`.
pub fn telecom_system(equipment: Option<&str>) -> ContactPointSystem {
    match equipment {
        Some("PH") | Some("CP") => ContactPointSystem::Phone,
        Some("X400") => ContactPointSystem::Email,
        Some("FX") => ContactPointSystem::Fax,
        _ => ContactPointSystem::Other,
    }
}

/// `(XTN-2, XTN-3)` → `ContactPointUse` (spec.md §4.3).
pub fn telecom_use(use_code: Option<&str>, equipment: Option<&str>) -> Option<ContactPointUse> {
    match (use_code, equipment) {
        (Some("PRN"), Some("CP")) => Some(ContactPointUse::Mobile),
        (Some("PRN"), _) => Some(ContactPointUse::Home),
        (Some("WPN"), _) => Some(ContactPointUse::Work),
        (Some("EMR"), _) => Some(ContactPointUse::Mobile),
        _ => None,
    }
}

/// `NK1-3` relationship code → `(system, code)`; unmatched codes fall back
/// to `v2-0131/O` (spec.md §4.3 table — logs a warning at the call site).
pub fn nk1_relationship(code: &str) -> (&'static str, &'static str) {
    match code {
        "FTH" => (V3_ROLE_CODE_SYSTEM, "FTH"),
        "MTH" => (V3_ROLE_CODE_SYSTEM, "MTH"),
        "SPO" => (V3_ROLE_CODE_SYSTEM, "SPS"),
        "EXF" => (V3_ROLE_CODE_SYSTEM, "FAMMEMB"),
        "EMC" => (V2_0131_SYSTEM, "C"),
        "OTH" => (V2_0131_SYSTEM, "O"),
        "SEL" => (V3_ROLE_CODE_SYSTEM, "ONESELF"),
        _ => (V2_0131_SYSTEM, "O"),
    }
}

/// `(XCN-13, namespace)` → practitioner identifier type (spec.md §4.4).
pub fn practitioner_identifier_type(code: &str, namespace: &str) -> Option<&'static str> {
    match (code, namespace) {
        ("EI", authority::SONHO) => Some("EI"),
        ("EI", authority::MEI) => Some("MEI"),
        ("MD", _) => Some("MD"),
        ("NP", _) => Some("NP"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("NS", Some("PI"))]
    #[case("SNS", Some("HC"))]
    #[case("B", Some("CZ"))]
    #[case("NIF", Some("TAX"))]
    #[case("NISS", Some("SS"))]
    #[case("P", Some("PPN"))]
    #[case("C", Some("BCFN"))]
    #[case("PRC", Some("PRC"))]
    #[case("ZZ", None)]
    fn maps_known_identifier_types(#[case] sonho_code: &str, #[case] expected: Option<&str>) {
        assert_eq!(identifier_type(sonho_code), expected);
    }

    #[test]
    fn rejects_unknown_gender() {
        assert!(gender("M").is_ok());
        assert!(gender("X").is_err());
    }

    #[test]
    fn falls_back_to_unknown_marital_status() {
        assert_eq!(marital_status("ZZZ"), ("UNK", "Unknown"));
        assert_eq!(marital_status("M"), ("M", "Married"));
    }

    #[test]
    fn defaults_unmatched_address_kind_to_home_both() {
        let (use_, kind, parent) = address_kind(Some("X"));
        assert_eq!(use_, Some(AddressUse::Home));
        assert_eq!(kind, AddressType::Both);
        assert_eq!(parent, "MAIN_ADDRESS");
    }

    #[test]
    fn maps_mobile_telecom_use() {
        assert_eq!(telecom_use(Some("PRN"), Some("CP")), Some(ContactPointUse::Mobile));
        assert_eq!(telecom_use(Some("WPN"), None), Some(ContactPointUse::Work));
    }

    #[test]
    fn falls_back_unknown_relationship_to_v2_0131_o() {
        assert_eq!(nk1_relationship("ZZZ"), (V2_0131_SYSTEM, "O"));
        assert_eq!(nk1_relationship("SPO"), (V3_ROLE_CODE_SYSTEM, "SPS"));
    }
}
