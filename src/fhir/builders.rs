//! Pure FHIR element constructors (spec.md §4.3–§4.4, component C2).
//!
//! Thin wrappers around `fhir_model`'s generated builders, grounded in the
//! teacher's own builder usage (`examples/diz-unimr-adt-to-fhir/src/fhir/{mapper,patient}.rs`):
//! `X::builder().field(..).build()?` throughout, propagated via
//! [`crate::fhir::MappingError`].

use crate::fhir::MappingError;
use fhir_model::r5::codes::IdentifierUse;
use fhir_model::r5::types::{
    Annotation, CodeableConcept, Coding, Extension, ExtensionValue, HumanName, Identifier,
    Reference,
};

pub fn identifier(
    system: impl Into<String>,
    value: impl Into<String>,
    type_code: Option<(&str, &str)>,
) -> Result<Identifier, MappingError> {
    let mut builder = Identifier::builder()
        .system(system.into())
        .value(value.into());

    if let Some((system, code)) = type_code {
        builder = builder.r#type(codeable_concept(system, code, None)?);
    }

    Ok(builder.build()?)
}

pub fn identifier_usual(
    system: impl Into<String>,
    value: impl Into<String>,
) -> Result<Identifier, MappingError> {
    Ok(Identifier::builder()
        .r#use(IdentifierUse::Usual)
        .system(system.into())
        .value(value.into())
        .build()?)
}

pub fn coding(
    system: impl Into<String>,
    code: impl Into<String>,
    display: Option<impl Into<String>>,
) -> Result<Coding, MappingError> {
    let mut builder = Coding::builder().system(system.into()).code(code.into());
    if let Some(display) = display {
        builder = builder.display(display.into());
    }
    Ok(builder.build()?)
}

pub fn codeable_concept(
    system: impl Into<String>,
    code: impl Into<String>,
    display: Option<impl Into<String>>,
) -> Result<CodeableConcept, MappingError> {
    Ok(CodeableConcept::builder()
        .coding(vec![Some(coding(system, code, display)?)])
        .build()?)
}

pub fn human_name(
    family: Option<String>,
    given: Vec<String>,
    use_: Option<fhir_model::r5::codes::NameUse>,
) -> Result<HumanName, MappingError> {
    let mut builder =
        HumanName::builder().given(given.into_iter().map(Some).collect::<Vec<_>>());
    if let Some(family) = family {
        builder = builder.family(family);
    }
    if let Some(use_) = use_ {
        builder = builder.r#use(use_);
    }
    Ok(builder.build()?)
}

pub fn reference(value: impl Into<String>) -> Result<Reference, MappingError> {
    Ok(Reference::builder().reference(value.into()).build()?)
}

pub fn extension(url: impl Into<String>, value: ExtensionValue) -> Result<Extension, MappingError> {
    Ok(Extension::builder().url(url.into()).value(value).build()?)
}

/// A parent extension carrying only nested sub-extensions (no own value) —
/// used by the geo-address and birth-place extensions (spec.md §4.3).
pub fn nested_extension(
    url: impl Into<String>,
    children: Vec<Extension>,
) -> Result<Extension, MappingError> {
    Ok(Extension::builder()
        .url(url.into())
        .extension(children.into_iter().map(Some).collect::<Vec<_>>())
        .build()?)
}

pub fn annotation(text: impl Into<String>) -> Result<Annotation, MappingError> {
    Ok(Annotation::builder().text(text.into()).build()?)
}
