//! Coverage resource mapper (spec.md §4.4): one `Coverage` per `IN1`
//! segment carrying a plan identifier, referencing an insurer
//! `Organization` built alongside it.

use crate::fhir::builders::reference;
use crate::fhir::organization;
use crate::fhir::MappingError;
use crate::hl7::segments::{component, field_of, raw_segments};
use crate::idgen::name_uuid_str;
use fhir_model::r5::resources::{Coverage, CoveragePaymentBy, Organization};

/// One `Coverage` resource plus the insurer `Organization` it references.
pub struct CoverageMapping {
    pub coverage: Coverage,
    pub insurer: Organization,
}

/// Builds a `Coverage`/`Organization` pair for each `IN1` segment carrying
/// a non-empty plan identifier (`IN1-2`) (spec.md §4.4).
pub fn map(raw: &str, patient_id: &str) -> Result<Vec<CoverageMapping>, MappingError> {
    let mut out = Vec::new();

    for in1 in raw_segments(raw, "IN1") {
        let Some(plan_id) = field_of(&in1, 2).and_then(|f| component(f, 1)) else {
            continue;
        };

        let (insurer, insurer_id) = organization::map_insurer(&plan_id)?;
        let coverage_id = name_uuid_str(&format!("{patient_id}:{plan_id}")).to_string();

        let coverage = Coverage::builder()
            .id(coverage_id)
            .beneficiary(reference(format!("Patient/{patient_id}"))?)
            .payment_by(vec![Some(
                CoveragePaymentBy::builder()
                    .party(reference(format!("Organization/{insurer_id}"))?)
                    .build()?,
            )])
            .build()?;

        out.push(CoverageMapping { coverage, insurer });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_coverage_for_each_in1_plan() {
        let raw = "MSH|^~\\&|A|B|C|D|20240101000000||ADT^A28|1|P|2.5\r\
IN1|1|PLAN01^BlueCross\r\
IN1|2|PLAN02^OtherCo\r";
        let mappings = map(raw, "patient-id").unwrap();
        assert_eq!(mappings.len(), 2);
    }

    #[test]
    fn skips_in1_without_plan_identifier() {
        let raw = "MSH|^~\\&|A|B|C|D|20240101000000||ADT^A28|1|P|2.5\rIN1|1\r";
        let mappings = map(raw, "patient-id").unwrap();
        assert!(mappings.is_empty());
    }
}
