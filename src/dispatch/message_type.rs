use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// ADT trigger events this gateway recognizes (spec.md §4.6, §6). Only
/// `AddPersonInformation` (A28) is transformed into a FHIR Bundle; every
/// other event is accepted (CA ACK) and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Admit,
    Transfer,
    Discharge,
    Registration,
    PreAdmit,
    ChangeOutpatientToInpatient,
    ChangeInpatientToOutpatient,
    PatientUpdate,
    CancelAdmitVisit,
    CancelTransfer,
    CancelDischarge,
    PendingAdmit,
    CancelPendingAdmit,
    AddPersonInformation,
    DeletePersonInformation,
    ChangePersonData,
    PatientMerge,
    MergePatientRecords,
    PatientReassignmentToSingleCase,
    PatientReassignmentToAllCases,
    UpdateEncounterNumber,
}

use MessageType::*;

impl Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let code = match self {
            Admit => "A01",
            Transfer => "A02",
            Discharge => "A03",
            Registration => "A04",
            PreAdmit => "A05",
            ChangeOutpatientToInpatient => "A06",
            ChangeInpatientToOutpatient => "A07",
            PatientUpdate => "A08",
            CancelAdmitVisit => "A11",
            CancelTransfer => "A12",
            CancelDischarge => "A13",
            PendingAdmit => "A14",
            CancelPendingAdmit => "A27",
            AddPersonInformation => "A28",
            DeletePersonInformation => "A29",
            ChangePersonData => "A31",
            PatientMerge => "A34",
            MergePatientRecords => "A40",
            PatientReassignmentToSingleCase => "A45",
            PatientReassignmentToAllCases => "A47",
            UpdateEncounterNumber => "A50",
        };
        write!(f, "{code}")
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown event {0}")]
pub struct UnknownMessageType(pub String);

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A01" => Ok(Admit),
            "A02" => Ok(Transfer),
            "A03" => Ok(Discharge),
            "A04" => Ok(Registration),
            "A05" => Ok(PreAdmit),
            "A06" => Ok(ChangeOutpatientToInpatient),
            "A07" => Ok(ChangeInpatientToOutpatient),
            "A08" => Ok(PatientUpdate),
            "A11" => Ok(CancelAdmitVisit),
            "A12" => Ok(CancelTransfer),
            "A13" => Ok(CancelDischarge),
            "A14" => Ok(PendingAdmit),
            "A27" => Ok(CancelPendingAdmit),
            "A28" => Ok(AddPersonInformation),
            "A29" => Ok(DeletePersonInformation),
            "A31" => Ok(ChangePersonData),
            "A34" => Ok(PatientMerge),
            "A40" => Ok(MergePatientRecords),
            "A45" => Ok(PatientReassignmentToSingleCase),
            "A47" => Ok(PatientReassignmentToAllCases),
            "A50" => Ok(UpdateEncounterNumber),
            other => Err(UnknownMessageType(other.to_string())),
        }
    }
}
