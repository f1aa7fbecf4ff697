//! Compile-time plugin registration for transfer syntaxes, via `inventory`.
//!
//! Gated behind the `inventory-registry` feature: a crate that wants to
//! contribute an additional transfer syntax (e.g. a pixel-data codec add-on)
//! submits one of these at any point in the dependency graph, and
//! `dicom-transfer-syntax-registry` picks it up automatically without a
//! central list of optional codec crates to maintain.

use crate::transfer_syntax::TransferSyntax;

/// A transfer syntax contributed by a plugin crate, collected into the
/// registry's static table at startup.
pub struct TransferSyntaxEntry(pub TransferSyntax);

inventory::collect!(TransferSyntaxEntry);

/// Submit a transfer syntax to the registry from a plugin crate.
///
/// ```ignore
/// dicom_encoding::submit_transfer_syntax!(MY_CODEC_TS);
/// ```
#[macro_export]
macro_rules! submit_transfer_syntax {
    ($ts:expr) => {
        $crate::inventory::submit! {
            $crate::registry::TransferSyntaxEntry($ts)
        }
    };
}

pub use inventory;
