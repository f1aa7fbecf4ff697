//! Decoding PDUs off the wire.
//!
//! Unlike `dicom-encoding`'s data set codecs, every field here is
//! fixed-width and big-endian (PS3.8 section 9.3), so this module reads
//! directly off byte slices rather than going through the transfer-syntax
//! abstraction.

use std::io::Read;

use dicom_encoding::text::SpecificCharacterSet;
use snafu::{ensure, Snafu};

use super::{
    AbortRQServiceProviderReason, AbortRQSource, AssociationRJResult,
    AssociationRJServiceProviderASCEReason, AssociationRJServiceProviderPresentationReason,
    AssociationRJServiceUserReason, AssociationRJSource, PDataValue, PDataValueType, Pdu,
    PresentationContextProposed, PresentationContextResult, PresentationContextResultReason,
    RoleSelection, UserIdentity, UserIdentityType, UserVariableItem, MAXIMUM_PDU_SIZE,
};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("I/O error while reading PDU"))]
    Io { source: std::io::Error },
    #[snafu(display("PDU of {} bytes exceeds the maximum accepted length of {}", length, max))]
    PduTooLarge { length: u32, max: u32 },
    #[snafu(display("unexpected end of PDU data"))]
    UnexpectedEof,
    #[snafu(display("PDU contained non-UTF8 text"))]
    InvalidText,
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source }
    }
}

impl Error {
    /// Whether this failure was a read timing out, as opposed to the
    /// peer closing the connection or sending malformed data.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Io { source }
                if matches!(source.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A cursor over an in-memory PDU body: every multi-byte field on the wire
/// is big-endian, so this only ever needs to move forward.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn u8(&mut self) -> Result<u8> {
        ensure!(self.remaining() >= 1, UnexpectedEofSnafu);
        let v = self.bytes[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn u16(&mut self) -> Result<u16> {
        ensure!(self.remaining() >= 2, UnexpectedEofSnafu);
        let v = u16::from_be_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    fn u32(&mut self) -> Result<u32> {
        ensure!(self.remaining() >= 4, UnexpectedEofSnafu);
        let v = u32::from_be_bytes(self.bytes[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        ensure!(self.remaining() >= n, UnexpectedEofSnafu);
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n)?;
        Ok(())
    }
}

fn decode_text(bytes: &[u8]) -> Result<String> {
    let codec = SpecificCharacterSet::default();
    codec
        .decode(bytes)
        .map(|s| s.trim_end().trim_end_matches('\0').to_string())
        .map_err(|_| Error::InvalidText)
}

/// Read one PDU from `from`, rejecting anything declaring a body longer
/// than `max_pdu_length` (or the hard protocol ceiling, whichever is
/// smaller).
pub fn read_pdu<R: Read>(from: &mut R, max_pdu_length: u32) -> Result<Pdu> {
    let mut header = [0u8; 6];
    from.read_exact(&mut header)?;
    let pdu_type = header[0];
    let length = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);

    let limit = max_pdu_length.min(MAXIMUM_PDU_SIZE);
    ensure!(
        length <= limit,
        PduTooLargeSnafu {
            length,
            max: limit,
        }
    );

    let mut body = vec![0u8; length as usize];
    from.read_exact(&mut body)?;
    let mut cursor = Cursor::new(&body);

    match pdu_type {
        0x01 => read_association_rq(&mut cursor),
        0x02 => read_association_ac(&mut cursor),
        0x03 => read_association_rj(&mut cursor),
        0x04 => read_p_data(&mut cursor),
        0x05 => {
            cursor.skip(cursor.remaining().min(4))?;
            Ok(Pdu::ReleaseRQ)
        }
        0x06 => {
            cursor.skip(cursor.remaining().min(4))?;
            Ok(Pdu::ReleaseRP)
        }
        0x07 => read_abort_rq(&mut cursor),
        other => Ok(Pdu::Unknown {
            pdu_type: other,
            data: body,
        }),
    }
}

fn read_association_rq(cursor: &mut Cursor) -> Result<Pdu> {
    let protocol_version = cursor.u16()?;
    cursor.skip(2)?;
    let called_ae_title = decode_text(cursor.take(16)?)?;
    let calling_ae_title = decode_text(cursor.take(16)?)?;
    cursor.skip(32)?;

    let mut application_context_name = String::new();
    let mut presentation_contexts = Vec::new();
    let mut user_variables = Vec::new();

    while cursor.remaining() >= 4 {
        let item_type = cursor.u8()?;
        cursor.skip(1)?;
        let item_len = cursor.u16()? as usize;
        let item = cursor.take(item_len)?;
        match item_type {
            0x10 => application_context_name = decode_text(item)?,
            0x20 => presentation_contexts.push(read_presentation_context_proposed(item)?),
            0x50 => user_variables = read_user_variables(item)?,
            _ => {}
        }
    }

    Ok(Pdu::AssociationRQ {
        protocol_version,
        calling_ae_title,
        called_ae_title,
        application_context_name,
        presentation_contexts,
        user_variables,
    })
}

fn read_presentation_context_proposed(item: &[u8]) -> Result<PresentationContextProposed> {
    let mut cursor = Cursor::new(item);
    let id = cursor.u8()?;
    cursor.skip(3)?;

    let mut abstract_syntax = String::new();
    let mut transfer_syntaxes = Vec::new();

    while cursor.remaining() >= 4 {
        let sub_type = cursor.u8()?;
        cursor.skip(1)?;
        let sub_len = cursor.u16()? as usize;
        let sub_item = cursor.take(sub_len)?;
        match sub_type {
            0x30 => abstract_syntax = decode_text(sub_item)?,
            0x40 => transfer_syntaxes.push(decode_text(sub_item)?),
            _ => {}
        }
    }

    Ok(PresentationContextProposed {
        id,
        abstract_syntax,
        transfer_syntaxes,
    })
}

fn read_association_ac(cursor: &mut Cursor) -> Result<Pdu> {
    let protocol_version = cursor.u16()?;
    cursor.skip(2 + 16 + 16 + 32)?;

    let mut application_context_name = String::new();
    let mut presentation_contexts = Vec::new();
    let mut user_variables = Vec::new();

    while cursor.remaining() >= 4 {
        let item_type = cursor.u8()?;
        cursor.skip(1)?;
        let item_len = cursor.u16()? as usize;
        let item = cursor.take(item_len)?;
        match item_type {
            0x10 => application_context_name = decode_text(item)?,
            0x21 => presentation_contexts.push(read_presentation_context_result(item)?),
            0x50 => user_variables = read_user_variables(item)?,
            _ => {}
        }
    }

    Ok(Pdu::AssociationAC {
        protocol_version,
        application_context_name,
        presentation_contexts,
        user_variables,
    })
}

fn read_presentation_context_result(item: &[u8]) -> Result<PresentationContextResult> {
    let mut cursor = Cursor::new(item);
    let id = cursor.u8()?;
    cursor.skip(1)?;
    let reason_byte = cursor.u8()?;
    cursor.skip(1)?;

    let reason = match reason_byte {
        0 => PresentationContextResultReason::Acceptance,
        1 => PresentationContextResultReason::UserRejection,
        2 => PresentationContextResultReason::NoReason,
        3 => PresentationContextResultReason::AbstractSyntaxNotSupported,
        _ => PresentationContextResultReason::TransferSyntaxesNotSupported,
    };

    let mut transfer_syntax = String::new();
    while cursor.remaining() >= 4 {
        let sub_type = cursor.u8()?;
        cursor.skip(1)?;
        let sub_len = cursor.u16()? as usize;
        let sub_item = cursor.take(sub_len)?;
        if sub_type == 0x40 {
            transfer_syntax = decode_text(sub_item)?;
        }
    }

    Ok(PresentationContextResult {
        id,
        reason,
        transfer_syntax,
    })
}

fn read_role_selection(item: &[u8]) -> Result<(String, RoleSelection)> {
    let mut cursor = Cursor::new(item);
    let uid_len = cursor.u16()? as usize;
    let uid = decode_text(cursor.take(uid_len)?)?;
    let scu_role_supported = cursor.u8()? != 0;
    let scp_role_supported = cursor.u8()? != 0;
    Ok((
        uid,
        RoleSelection {
            scu_role_supported,
            scp_role_supported,
        },
    ))
}

fn read_user_variables(item: &[u8]) -> Result<Vec<UserVariableItem>> {
    let mut cursor = Cursor::new(item);
    let mut out = Vec::new();
    while cursor.remaining() >= 4 {
        let sub_type = cursor.u8()?;
        cursor.skip(1)?;
        let sub_len = cursor.u16()? as usize;
        let sub_item = cursor.take(sub_len)?;
        match sub_type {
            0x51 => {
                ensure!(sub_item.len() >= 4, UnexpectedEofSnafu);
                let max_len = u32::from_be_bytes(sub_item[0..4].try_into().unwrap());
                out.push(UserVariableItem::MaxLength(max_len));
            }
            0x52 => out.push(UserVariableItem::ImplementationClassUID(decode_text(
                sub_item,
            )?)),
            0x55 => out.push(UserVariableItem::ImplementationVersionName(decode_text(
                sub_item,
            )?)),
            0x54 => {
                let (uid, role) = read_role_selection(sub_item)?;
                out.push(UserVariableItem::SopClassRoleSelection { uid, role });
            }
            0x58 => out.push(UserVariableItem::UserIdentity(read_user_identity(
                sub_item,
            )?)),
            other => out.push(UserVariableItem::Unknown(other, sub_item.to_vec())),
        }
    }
    Ok(out)
}

fn read_user_identity(item: &[u8]) -> Result<UserIdentity> {
    let mut cursor = Cursor::new(item);
    let identity_type = UserIdentityType::from_byte(cursor.u8()?);
    let positive_response_requested = cursor.u8()? != 0;
    let primary_len = cursor.u16()? as usize;
    let primary_field = cursor.take(primary_len)?.to_vec();
    let secondary_len = if cursor.remaining() >= 2 {
        cursor.u16()? as usize
    } else {
        0
    };
    let secondary_field = if secondary_len > 0 {
        cursor.take(secondary_len)?.to_vec()
    } else {
        Vec::new()
    };
    Ok(UserIdentity {
        identity_type,
        positive_response_requested,
        primary_field,
        secondary_field,
    })
}

fn read_association_rj(cursor: &mut Cursor) -> Result<Pdu> {
    cursor.skip(1)?;
    let result = match cursor.u8()? {
        2 => AssociationRJResult::Transient,
        _ => AssociationRJResult::Permanent,
    };
    let source_byte = cursor.u8()?;
    let reason_byte = cursor.u8()?;
    let source = match source_byte {
        1 => AssociationRJSource::ServiceUser(match reason_byte {
            1 => AssociationRJServiceUserReason::NoReasonGiven,
            2 => AssociationRJServiceUserReason::ApplicationContextNameNotSupported,
            3 => AssociationRJServiceUserReason::CallingAETitleNotRecognized,
            7 => AssociationRJServiceUserReason::CalledAETitleNotRecognized,
            other => AssociationRJServiceUserReason::Reserved(other),
        }),
        2 => AssociationRJSource::ServiceProviderASCE(match reason_byte {
            2 => AssociationRJServiceProviderASCEReason::ProtocolVersionNotSupported,
            _ => AssociationRJServiceProviderASCEReason::NoReasonGiven,
        }),
        _ => AssociationRJSource::ServiceProviderPresentation(match reason_byte {
            1 => AssociationRJServiceProviderPresentationReason::TemporaryCongestion,
            2 => AssociationRJServiceProviderPresentationReason::LocalLimitExceeded,
            other => AssociationRJServiceProviderPresentationReason::Reserved(other),
        }),
    };
    Ok(Pdu::AssociationRJ { result, source })
}

fn read_p_data(cursor: &mut Cursor) -> Result<Pdu> {
    let mut data = Vec::new();
    while cursor.remaining() >= 4 {
        let item_len = cursor.u32()? as usize;
        ensure!(item_len >= 2, UnexpectedEofSnafu);
        let presentation_context_id = cursor.u8()?;
        let header_byte = cursor.u8()?;
        let fragment = cursor.take(item_len - 2)?;
        data.push(PDataValue {
            presentation_context_id,
            value_type: if header_byte & 0x01 != 0 {
                PDataValueType::Command
            } else {
                PDataValueType::Data
            },
            is_last: header_byte & 0x02 != 0,
            data: fragment.to_vec(),
        });
    }
    Ok(Pdu::PData { data })
}

fn read_abort_rq(cursor: &mut Cursor) -> Result<Pdu> {
    cursor.skip(2)?;
    let source_byte = cursor.u8()?;
    let reason_byte = cursor.u8()?;
    let source = match source_byte {
        0 => AbortRQSource::ServiceUser,
        2 => AbortRQSource::ServiceProvider(match reason_byte {
            2 => AbortRQServiceProviderReason::UnexpectedPdu,
            3 => AbortRQServiceProviderReason::Reserved,
            4 => AbortRQServiceProviderReason::UnrecognizedPduParameter,
            5 => AbortRQServiceProviderReason::UnexpectedPduParameter,
            6 => AbortRQServiceProviderReason::InvalidPduParameter,
            _ => AbortRQServiceProviderReason::ReasonNotSpecifiedUnrecognizedPdu,
        }),
        _ => AbortRQSource::Reserved,
    };
    Ok(Pdu::AbortRQ { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::write_pdu;

    #[test]
    fn round_trips_release_rq() {
        let mut buf = Vec::new();
        write_pdu(&mut buf, &Pdu::ReleaseRQ).unwrap();
        let pdu = read_pdu(&mut buf.as_slice(), MAXIMUM_PDU_SIZE).unwrap();
        assert_eq!(pdu, Pdu::ReleaseRQ);
    }

    #[test]
    fn round_trips_p_data() {
        let original = Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id: 1,
                value_type: PDataValueType::Command,
                is_last: true,
                data: vec![1, 2, 3, 4],
            }],
        };
        let mut buf = Vec::new();
        write_pdu(&mut buf, &original).unwrap();
        let pdu = read_pdu(&mut buf.as_slice(), MAXIMUM_PDU_SIZE).unwrap();
        assert_eq!(pdu, original);
    }

    #[test]
    fn rejects_pdu_over_the_negotiated_limit() {
        let mut buf = Vec::new();
        write_pdu(
            &mut buf,
            &Pdu::PData {
                data: vec![PDataValue {
                    presentation_context_id: 1,
                    value_type: PDataValueType::Data,
                    is_last: true,
                    data: vec![0u8; 64],
                }],
            },
        )
        .unwrap();
        let err = read_pdu(&mut buf.as_slice(), 8).unwrap_err();
        assert!(matches!(err, Error::PduTooLarge { .. }));
    }
}
