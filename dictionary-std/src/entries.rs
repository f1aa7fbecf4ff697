//! The static table backing [`crate::StandardDataDictionary`].
//!
//! This is a curated subset of PS3.6's data element registry: the file
//! meta-information group, the DIMSE command-set fields, and the
//! identifying/descriptive attributes this workspace's archive, index, and
//! query/retrieve engine operate on. It is not the full ~4,000-entry
//! standard dictionary; unknown tags are looked up and reported as absent,
//! per §4.1, which is a valid outcome for any tag not listed here.

use dicom_core::{Tag, VM, VR};

/// One static dictionary row.
pub struct Entry {
    pub tag: Tag,
    pub vr: VR,
    pub vm: VM,
    pub keyword: &'static str,
    pub name: &'static str,
    pub retired: bool,
}

macro_rules! entries {
    ($(($group:expr, $elem:expr, $vr:ident, $vm:expr, $keyword:ident, $name:expr)),* $(,)?) => {
        pub static ENTRIES: &[Entry] = &[
            $(
                Entry {
                    tag: Tag($group, $elem),
                    vr: VR::$vr,
                    vm: $vm,
                    keyword: stringify!($keyword),
                    name: $name,
                    retired: false,
                },
            )*
        ];
    };
}

entries! {
    // File meta-information group (0002,xxxx) -- always explicit-VR LE.
    (0x0002, 0x0000, UL, VM::ONE, FileMetaInformationGroupLength, "File Meta Information Group Length"),
    (0x0002, 0x0001, OB, VM::ONE, FileMetaInformationVersion, "File Meta Information Version"),
    (0x0002, 0x0002, UI, VM::ONE, MediaStorageSOPClassUID, "Media Storage SOP Class UID"),
    (0x0002, 0x0003, UI, VM::ONE, MediaStorageSOPInstanceUID, "Media Storage SOP Instance UID"),
    (0x0002, 0x0010, UI, VM::ONE, TransferSyntaxUID, "Transfer Syntax UID"),
    (0x0002, 0x0012, UI, VM::ONE, ImplementationClassUID, "Implementation Class UID"),
    (0x0002, 0x0013, SH, VM::ONE, ImplementationVersionName, "Implementation Version Name"),
    (0x0002, 0x0016, AE, VM::ONE, SourceApplicationEntityTitle, "Source Application Entity Title"),

    // Command set (0000,xxxx) -- always implicit-VR LE.
    (0x0000, 0x0000, UL, VM::ONE, CommandGroupLength, "Command Group Length"),
    (0x0000, 0x0002, UI, VM::ONE, AffectedSOPClassUID, "Affected SOP Class UID"),
    (0x0000, 0x0003, UI, VM::ONE, RequestedSOPClassUID, "Requested SOP Class UID"),
    (0x0000, 0x0100, US, VM::ONE, CommandField, "Command Field"),
    (0x0000, 0x0110, US, VM::ONE, MessageID, "Message ID"),
    (0x0000, 0x0120, US, VM::ONE, MessageIDBeingRespondedTo, "Message ID Being Responded To"),
    (0x0000, 0x0600, AE, VM::ONE, MoveDestination, "Move Destination"),
    (0x0000, 0x0700, US, VM::ONE, Priority, "Priority"),
    (0x0000, 0x0800, US, VM::ONE, CommandDataSetType, "Command Data Set Type"),
    (0x0000, 0x0900, US, VM::ONE, Status, "Status"),
    (0x0000, 0x0901, AT, VM::ONE_OR_MORE, OffendingElement, "Offending Element"),
    (0x0000, 0x0902, LO, VM::ONE, ErrorComment, "Error Comment"),
    (0x0000, 0x0903, US, VM::ONE, ErrorID, "Error ID"),
    (0x0000, 0x1000, UI, VM::ONE, AffectedSOPInstanceUID, "Affected SOP Instance UID"),
    (0x0000, 0x1001, UI, VM::ONE, RequestedSOPInstanceUID, "Requested SOP Instance UID"),
    (0x0000, 0x1002, US, VM::ONE, EventTypeID, "Event Type ID"),
    (0x0000, 0x1005, AT, VM::ONE_OR_MORE, AttributeIdentifierList, "Attribute Identifier List"),
    (0x0000, 0x1008, US, VM::ONE, ActionTypeID, "Action Type ID"),
    (0x0000, 0x1020, US, VM::ONE, NumberOfRemainingSuboperations, "Number of Remaining Suboperations"),
    (0x0000, 0x1021, US, VM::ONE, NumberOfCompletedSuboperations, "Number of Completed Suboperations"),
    (0x0000, 0x1022, US, VM::ONE, NumberOfFailedSuboperations, "Number of Failed Suboperations"),
    (0x0000, 0x1023, US, VM::ONE, NumberOfWarningSuboperations, "Number of Warning Suboperations"),
    (0x0000, 0x1030, AE, VM::ONE, MoveOriginatorApplicationEntityTitle, "Move Originator Application Entity Title"),
    (0x0000, 0x1031, US, VM::ONE, MoveOriginatorMessageID, "Move Originator Message ID"),

    // Identifying / descriptive attributes used by the archive, index, and
    // query/retrieve engine.
    (0x0008, 0x0005, CS, VM::range(1, 8), SpecificCharacterSet, "Specific Character Set"),
    (0x0008, 0x0016, UI, VM::ONE, SOPClassUID, "SOP Class UID"),
    (0x0008, 0x0018, UI, VM::ONE, SOPInstanceUID, "SOP Instance UID"),
    (0x0008, 0x0020, DA, VM::ONE, StudyDate, "Study Date"),
    (0x0008, 0x0021, DA, VM::ONE, SeriesDate, "Series Date"),
    (0x0008, 0x0030, TM, VM::ONE, StudyTime, "Study Time"),
    (0x0008, 0x0050, SH, VM::ONE, AccessionNumber, "Accession Number"),
    (0x0008, 0x0052, CS, VM::ONE, QueryRetrieveLevel, "Query/Retrieve Level"),
    (0x0008, 0x0060, CS, VM::ONE, Modality, "Modality"),
    (0x0008, 0x0090, PN, VM::ONE, ReferringPhysicianName, "Referring Physician's Name"),
    (0x0008, 0x1030, LO, VM::ONE, StudyDescription, "Study Description"),
    (0x0008, 0x103E, LO, VM::ONE, SeriesDescription, "Series Description"),
    (0x0010, 0x0010, PN, VM::ONE, PatientName, "Patient's Name"),
    (0x0010, 0x0020, LO, VM::ONE, PatientID, "Patient ID"),
    (0x0010, 0x0030, DA, VM::ONE, PatientBirthDate, "Patient's Birth Date"),
    (0x0010, 0x0040, CS, VM::ONE, PatientSex, "Patient's Sex"),
    (0x0020, 0x000D, UI, VM::ONE, StudyInstanceUID, "Study Instance UID"),
    (0x0020, 0x000E, UI, VM::ONE, SeriesInstanceUID, "Series Instance UID"),
    (0x0020, 0x0010, SH, VM::ONE, StudyID, "Study ID"),
    (0x0020, 0x0011, IS, VM::ONE, SeriesNumber, "Series Number"),
    (0x0020, 0x0013, IS, VM::ONE, InstanceNumber, "Instance Number"),
    (0x0028, 0x0002, US, VM::ONE, SamplesPerPixel, "Samples per Pixel"),
    (0x0028, 0x0004, CS, VM::ONE, PhotometricInterpretation, "Photometric Interpretation"),
    (0x0028, 0x0008, IS, VM::ONE, NumberOfFrames, "Number of Frames"),
    (0x0028, 0x0010, US, VM::ONE, Rows, "Rows"),
    (0x0028, 0x0011, US, VM::ONE, Columns, "Columns"),
    (0x0028, 0x0100, US, VM::ONE, BitsAllocated, "Bits Allocated"),
    (0x0028, 0x0101, US, VM::ONE, BitsStored, "Bits Stored"),
    (0x7FE0, 0x0010, OW, VM::ONE, PixelData, "Pixel Data"),
}
