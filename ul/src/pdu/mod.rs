//! Upper layer protocol data units (PDUs), as defined by PS3.8 chapter 9.
//!
//! This module only holds the wire-level vocabulary -- the byte layouts
//! live in [`reader`] and [`writer`], and the DIMSE command vocabulary that
//! rides inside [`Pdu::PData`] lives in [`commands`].

pub mod commands;
pub mod reader;
pub mod writer;

pub use reader::{read_pdu, Error as ReadError};
pub use writer::{write_pdu, Error as WriteError};

/// The smallest well-formed PDU: a 6-byte header with a zero-length body.
pub const MINIMUM_PDU_SIZE: u32 = 6;

/// The largest PDU length this implementation will negotiate or accept,
/// short of the protocol's own 32-bit length field ceiling.
pub const MAXIMUM_PDU_SIZE: u32 = 128 * 1024 * 1024;

/// The maximum PDU length this node offers when none is explicitly chosen.
pub const DEFAULT_MAX_PDU: u32 = 16384;

/// A DICOM upper layer protocol data unit.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Pdu {
    AssociationRQ {
        protocol_version: u16,
        calling_ae_title: String,
        called_ae_title: String,
        application_context_name: String,
        presentation_contexts: Vec<PresentationContextProposed>,
        user_variables: Vec<UserVariableItem>,
    },
    AssociationAC {
        protocol_version: u16,
        application_context_name: String,
        presentation_contexts: Vec<PresentationContextResult>,
        user_variables: Vec<UserVariableItem>,
    },
    AssociationRJ {
        result: AssociationRJResult,
        source: AssociationRJSource,
    },
    PData {
        data: Vec<PDataValue>,
    },
    ReleaseRQ,
    ReleaseRP,
    AbortRQ {
        source: AbortRQSource,
    },
    /// A PDU of a type this implementation does not recognize, kept as an
    /// opaque payload so that unknown non-fatal PDUs do not abort parsing.
    Unknown {
        pdu_type: u8,
        data: Vec<u8>,
    },
}

/// One proposed presentation context, as carried by an A-ASSOCIATE-RQ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationContextProposed {
    pub id: u8,
    pub abstract_syntax: String,
    pub transfer_syntaxes: Vec<String>,
}

/// The accorded outcome of one presentation context, as carried by an
/// A-ASSOCIATE-AC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationContextResult {
    pub id: u8,
    pub reason: PresentationContextResultReason,
    pub transfer_syntax: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationContextResultReason {
    Acceptance,
    UserRejection,
    NoReason,
    AbstractSyntaxNotSupported,
    TransferSyntaxesNotSupported,
}

/// SCU/SCP role negotiation for an abstract syntax (PS3.7 Annex D.3.3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSelection {
    pub scu_role_supported: bool,
    pub scp_role_supported: bool,
}

/// A user information sub-item carried in the A-ASSOCIATE-RQ/AC User
/// Information item.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserVariableItem {
    MaxLength(u32),
    ImplementationClassUID(String),
    ImplementationVersionName(String),
    /// SCU/SCP role selection for a named abstract syntax.
    SopClassRoleSelection {
        uid: String,
        role: RoleSelection,
    },
    UserIdentity(UserIdentity),
    Unknown(u8, Vec<u8>),
}

/// User identity negotiation sub-item (PS3.7 Annex D.3.3.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub identity_type: UserIdentityType,
    pub positive_response_requested: bool,
    pub primary_field: Vec<u8>,
    pub secondary_field: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIdentityType {
    Username,
    UsernameAndPasscode,
    Kerberos,
    Saml,
    Jwt,
    Unknown(u8),
}

impl UserIdentityType {
    fn from_byte(b: u8) -> Self {
        match b {
            1 => UserIdentityType::Username,
            2 => UserIdentityType::UsernameAndPasscode,
            3 => UserIdentityType::Kerberos,
            4 => UserIdentityType::Saml,
            5 => UserIdentityType::Jwt,
            other => UserIdentityType::Unknown(other),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            UserIdentityType::Username => 1,
            UserIdentityType::UsernameAndPasscode => 2,
            UserIdentityType::Kerberos => 3,
            UserIdentityType::Saml => 4,
            UserIdentityType::Jwt => 5,
            UserIdentityType::Unknown(b) => b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRJResult {
    Permanent,
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRJSource {
    ServiceUser(AssociationRJServiceUserReason),
    ServiceProviderASCE(AssociationRJServiceProviderASCEReason),
    ServiceProviderPresentation(AssociationRJServiceProviderPresentationReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRJServiceUserReason {
    NoReasonGiven,
    ApplicationContextNameNotSupported,
    CallingAETitleNotRecognized,
    CalledAETitleNotRecognized,
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRJServiceProviderASCEReason {
    NoReasonGiven,
    ProtocolVersionNotSupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRJServiceProviderPresentationReason {
    TemporaryCongestion,
    LocalLimitExceeded,
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortRQSource {
    ServiceUser,
    Reserved,
    ServiceProvider(AbortRQServiceProviderReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortRQServiceProviderReason {
    ReasonNotSpecifiedUnrecognizedPdu,
    UnexpectedPdu,
    Reserved,
    UnrecognizedPduParameter,
    UnexpectedPduParameter,
    InvalidPduParameter,
}

/// One presentation-data-value item carried inside a P-DATA-TF PDU: a
/// fragment of either a command or a data set, tagged with whether it is
/// the last fragment of its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PDataValue {
    pub presentation_context_id: u8,
    pub value_type: PDataValueType,
    pub is_last: bool,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PDataValueType {
    Command,
    Data,
}
