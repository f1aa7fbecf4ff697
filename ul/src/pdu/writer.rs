//! Encoding PDUs for the wire: the mirror image of [`super::reader`].

use std::io::Write;

use byteordered::byteorder::{BigEndian, WriteBytesExt};
use dicom_encoding::text::SpecificCharacterSet;
use snafu::Snafu;

use super::{
    AbortRQServiceProviderReason, AbortRQSource, AssociationRJResult, AssociationRJSource,
    AssociationRJServiceProviderASCEReason, AssociationRJServiceProviderPresentationReason,
    AssociationRJServiceUserReason, PDataValueType, Pdu, PresentationContextProposed,
    PresentationContextResult, PresentationContextResultReason, RoleSelection, UserIdentity,
    UserVariableItem,
};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("I/O error while writing PDU"))]
    Io { source: std::io::Error },
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn write_chunk_u32<W, F>(writer: &mut W, func: F) -> Result<()>
where
    W: Write,
    F: FnOnce(&mut Vec<u8>) -> Result<()>,
{
    let mut data = Vec::new();
    func(&mut data)?;
    writer.write_u32::<BigEndian>(data.len() as u32)?;
    writer.write_all(&data)?;
    Ok(())
}

fn write_chunk_u16<W, F>(writer: &mut W, func: F) -> Result<()>
where
    W: Write,
    F: FnOnce(&mut Vec<u8>) -> Result<()>,
{
    let mut data = Vec::new();
    func(&mut data)?;
    writer.write_u16::<BigEndian>(data.len() as u16)?;
    writer.write_all(&data)?;
    Ok(())
}

fn encode_ae_title(title: &str) -> [u8; 16] {
    let codec = SpecificCharacterSet::default();
    let mut bytes = codec.encode(title);
    bytes.resize(16, b' ');
    let mut out = [0u8; 16];
    out.copy_from_slice(&bytes[..16]);
    out
}

/// Write a single PDU to `writer`.
pub fn write_pdu<W: Write>(writer: &mut W, pdu: &Pdu) -> Result<()> {
    let codec = SpecificCharacterSet::default();
    match pdu {
        Pdu::AssociationRQ {
            protocol_version,
            calling_ae_title,
            called_ae_title,
            application_context_name,
            presentation_contexts,
            user_variables,
        } => {
            writer.write_u8(0x01)?;
            writer.write_u8(0x00)?;
            write_chunk_u32(writer, |body| {
                body.write_u16::<BigEndian>(*protocol_version)?;
                body.write_u16::<BigEndian>(0x00)?;
                body.write_all(&encode_ae_title(called_ae_title))?;
                body.write_all(&encode_ae_title(calling_ae_title))?;
                body.write_all(&[0u8; 32])?;
                write_application_context(body, application_context_name, codec)?;
                for pc in presentation_contexts {
                    write_presentation_context_proposed(body, pc, codec)?;
                }
                write_user_variables(body, user_variables, codec)?;
                Ok(())
            })
        }
        Pdu::AssociationAC {
            protocol_version,
            application_context_name,
            presentation_contexts,
            user_variables,
        } => {
            writer.write_u8(0x02)?;
            writer.write_u8(0x00)?;
            write_chunk_u32(writer, |body| {
                body.write_u16::<BigEndian>(*protocol_version)?;
                body.write_u16::<BigEndian>(0x00)?;
                body.write_all(&[0u8; 16])?;
                body.write_all(&[0u8; 16])?;
                body.write_all(&[0u8; 32])?;
                write_application_context(body, application_context_name, codec)?;
                for pc in presentation_contexts {
                    write_presentation_context_result(body, pc, codec)?;
                }
                write_user_variables(body, user_variables, codec)?;
                Ok(())
            })
        }
        Pdu::AssociationRJ { result, source } => {
            writer.write_u8(0x03)?;
            writer.write_u8(0x00)?;
            write_chunk_u32(writer, |body| {
                body.write_u8(0x00)?;
                body.write_u8(match result {
                    AssociationRJResult::Permanent => 0x01,
                    AssociationRJResult::Transient => 0x02,
                })?;
                match source {
                    AssociationRJSource::ServiceUser(reason) => {
                        body.write_u8(0x01)?;
                        body.write_u8(match reason {
                            AssociationRJServiceUserReason::NoReasonGiven => 0x01,
                            AssociationRJServiceUserReason::ApplicationContextNameNotSupported => {
                                0x02
                            }
                            AssociationRJServiceUserReason::CallingAETitleNotRecognized => 0x03,
                            AssociationRJServiceUserReason::CalledAETitleNotRecognized => 0x07,
                            AssociationRJServiceUserReason::Reserved(v) => *v,
                        })?;
                    }
                    AssociationRJSource::ServiceProviderASCE(reason) => {
                        body.write_u8(0x02)?;
                        body.write_u8(match reason {
                            AssociationRJServiceProviderASCEReason::NoReasonGiven => 0x01,
                            AssociationRJServiceProviderASCEReason::ProtocolVersionNotSupported => {
                                0x02
                            }
                        })?;
                    }
                    AssociationRJSource::ServiceProviderPresentation(reason) => {
                        body.write_u8(0x03)?;
                        body.write_u8(match reason {
                            AssociationRJServiceProviderPresentationReason::TemporaryCongestion => {
                                0x01
                            }
                            AssociationRJServiceProviderPresentationReason::LocalLimitExceeded => {
                                0x02
                            }
                            AssociationRJServiceProviderPresentationReason::Reserved(v) => *v,
                        })?;
                    }
                }
                Ok(())
            })
        }
        Pdu::PData { data } => {
            writer.write_u8(0x04)?;
            writer.write_u8(0x00)?;
            write_chunk_u32(writer, |body| {
                for value in data {
                    write_chunk_u32(body, |item| {
                        item.write_u8(value.presentation_context_id)?;
                        let mut header_byte = 0u8;
                        if let PDataValueType::Command = value.value_type {
                            header_byte |= 0x01;
                        }
                        if value.is_last {
                            header_byte |= 0x02;
                        }
                        item.write_u8(header_byte)?;
                        item.write_all(&value.data)?;
                        Ok(())
                    })?;
                }
                Ok(())
            })
        }
        Pdu::ReleaseRQ => {
            writer.write_u8(0x05)?;
            writer.write_u8(0x00)?;
            write_chunk_u32(writer, |body| {
                body.write_all(&[0u8; 4])?;
                Ok(())
            })
        }
        Pdu::ReleaseRP => {
            writer.write_u8(0x06)?;
            writer.write_u8(0x00)?;
            write_chunk_u32(writer, |body| {
                body.write_all(&[0u8; 4])?;
                Ok(())
            })
        }
        Pdu::AbortRQ { source } => {
            writer.write_u8(0x07)?;
            writer.write_u8(0x00)?;
            write_chunk_u32(writer, |body| {
                body.write_u8(0x00)?;
                body.write_u8(0x00)?;
                match source {
                    AbortRQSource::ServiceUser | AbortRQSource::Reserved => {
                        body.write_u8(0x00)?;
                        body.write_u8(0x00)?;
                    }
                    AbortRQSource::ServiceProvider(reason) => {
                        body.write_u8(0x02)?;
                        body.write_u8(match reason {
                            AbortRQServiceProviderReason::ReasonNotSpecifiedUnrecognizedPdu => 0x00,
                            AbortRQServiceProviderReason::UnexpectedPdu => 0x02,
                            AbortRQServiceProviderReason::Reserved => 0x03,
                            AbortRQServiceProviderReason::UnrecognizedPduParameter => 0x04,
                            AbortRQServiceProviderReason::UnexpectedPduParameter => 0x05,
                            AbortRQServiceProviderReason::InvalidPduParameter => 0x06,
                        })?;
                    }
                }
                Ok(())
            })
        }
        Pdu::Unknown { pdu_type, data } => {
            writer.write_u8(*pdu_type)?;
            writer.write_u8(0x00)?;
            write_chunk_u32(writer, |body| {
                body.write_all(data)?;
                Ok(())
            })
        }
    }
}

fn write_application_context(
    body: &mut Vec<u8>,
    name: &str,
    codec: SpecificCharacterSet,
) -> Result<()> {
    body.write_u8(0x10)?;
    body.write_u8(0x00)?;
    write_chunk_u16(body, |item| {
        item.write_all(&codec.encode(name))?;
        Ok(())
    })
}

fn write_role_selection(body: &mut Vec<u8>, uid: &str, role: RoleSelection, codec: SpecificCharacterSet) -> Result<()> {
    body.write_u8(0x54)?;
    body.write_u8(0x00)?;
    write_chunk_u16(body, |item| {
        let encoded = codec.encode(uid);
        item.write_u16::<BigEndian>(encoded.len() as u16)?;
        item.write_all(&encoded)?;
        item.write_u8(role.scu_role_supported as u8)?;
        item.write_u8(role.scp_role_supported as u8)?;
        Ok(())
    })
}

fn write_presentation_context_proposed(
    body: &mut Vec<u8>,
    pc: &PresentationContextProposed,
    codec: SpecificCharacterSet,
) -> Result<()> {
    body.write_u8(0x20)?;
    body.write_u8(0x00)?;
    write_chunk_u16(body, |item| {
        item.write_u8(pc.id)?;
        item.write_u8(0x00)?;
        item.write_u8(0x00)?;
        item.write_u8(0x00)?;

        item.write_u8(0x30)?;
        item.write_u8(0x00)?;
        write_chunk_u16(item, |sub| {
            sub.write_all(&codec.encode(&pc.abstract_syntax))?;
            Ok(())
        })?;

        for ts in &pc.transfer_syntaxes {
            item.write_u8(0x40)?;
            item.write_u8(0x00)?;
            write_chunk_u16(item, |sub| {
                sub.write_all(&codec.encode(ts))?;
                Ok(())
            })?;
        }

        Ok(())
    })
}

fn write_presentation_context_result(
    body: &mut Vec<u8>,
    pc: &PresentationContextResult,
    codec: SpecificCharacterSet,
) -> Result<()> {
    body.write_u8(0x21)?;
    body.write_u8(0x00)?;
    write_chunk_u16(body, |item| {
        item.write_u8(pc.id)?;
        item.write_u8(0x00)?;
        item.write_u8(match pc.reason {
            PresentationContextResultReason::Acceptance => 0,
            PresentationContextResultReason::UserRejection => 1,
            PresentationContextResultReason::NoReason => 2,
            PresentationContextResultReason::AbstractSyntaxNotSupported => 3,
            PresentationContextResultReason::TransferSyntaxesNotSupported => 4,
        })?;
        item.write_u8(0x00)?;

        item.write_u8(0x40)?;
        item.write_u8(0x00)?;
        write_chunk_u16(item, |sub| {
            sub.write_all(&codec.encode(&pc.transfer_syntax))?;
            Ok(())
        })?;

        Ok(())
    })
}

fn write_user_variables(
    body: &mut Vec<u8>,
    variables: &[UserVariableItem],
    codec: SpecificCharacterSet,
) -> Result<()> {
    if variables.is_empty() {
        return Ok(());
    }
    body.write_u8(0x50)?;
    body.write_u8(0x00)?;
    write_chunk_u16(body, |item| {
        for variable in variables {
            match variable {
                UserVariableItem::MaxLength(max_length) => {
                    item.write_u8(0x51)?;
                    item.write_u8(0x00)?;
                    write_chunk_u16(item, |sub| {
                        sub.write_u32::<BigEndian>(*max_length)?;
                        Ok(())
                    })?;
                }
                UserVariableItem::ImplementationClassUID(uid) => {
                    item.write_u8(0x52)?;
                    item.write_u8(0x00)?;
                    write_chunk_u16(item, |sub| {
                        sub.write_all(&codec.encode(uid))?;
                        Ok(())
                    })?;
                }
                UserVariableItem::ImplementationVersionName(name) => {
                    item.write_u8(0x55)?;
                    item.write_u8(0x00)?;
                    write_chunk_u16(item, |sub| {
                        sub.write_all(&codec.encode(name))?;
                        Ok(())
                    })?;
                }
                UserVariableItem::SopClassRoleSelection { uid, role } => {
                    write_role_selection(item, uid, *role, codec)?;
                }
                UserVariableItem::UserIdentity(identity) => {
                    write_user_identity(item, identity)?;
                }
                UserVariableItem::Unknown(item_type, data) => {
                    item.write_u8(*item_type)?;
                    item.write_u8(0x00)?;
                    write_chunk_u16(item, |sub| {
                        sub.write_all(data)?;
                        Ok(())
                    })?;
                }
            }
        }
        Ok(())
    })
}

fn write_user_identity(item: &mut Vec<u8>, identity: &UserIdentity) -> Result<()> {
    item.write_u8(0x58)?;
    item.write_u8(0x00)?;
    write_chunk_u16(item, |sub| {
        sub.write_u8(identity.identity_type.to_byte())?;
        sub.write_u8(identity.positive_response_requested as u8)?;
        sub.write_u16::<BigEndian>(identity.primary_field.len() as u16)?;
        sub.write_all(&identity.primary_field)?;
        sub.write_u16::<BigEndian>(identity.secondary_field.len() as u16)?;
        sub.write_all(&identity.secondary_field)?;
        Ok(())
    })
}
