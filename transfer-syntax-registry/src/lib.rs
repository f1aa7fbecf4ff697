//! The process-wide registry of known DICOM transfer syntaxes.
//!
//! [`TransferSyntaxRegistry`] resolves a UID from the wire (as it appears in
//! a presentation context or in the file meta group) into a
//! [`dicom_encoding::TransferSyntax`] descriptor. Lookups trim the trailing
//! NUL padding UIDs carry on the wire.

pub mod entries;

use std::collections::HashMap;

use dicom_encoding::{TransferSyntax, TransferSyntaxIndex};
use lazy_static::lazy_static;

#[cfg(feature = "inventory-registry")]
use dicom_encoding::registry::TransferSyntaxEntry;

struct Registry {
    by_uid: HashMap<&'static str, &'static TransferSyntax>,
}

impl Registry {
    fn new() -> Self {
        let mut by_uid = HashMap::with_capacity(entries::BUILTIN.len());
        for ts in entries::BUILTIN {
            by_uid.insert(ts.uid(), *ts);
        }
        #[cfg(feature = "inventory-registry")]
        for entry in inventory::iter::<TransferSyntaxEntry> {
            by_uid.insert(entry.0.uid(), &entry.0);
        }
        Registry { by_uid }
    }
}

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}

/// Handle to the process-wide transfer syntax registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferSyntaxRegistry;

impl TransferSyntaxRegistry {
    /// Look up a transfer syntax by UID, trimming trailing NUL padding.
    pub fn get(&self, uid: &str) -> Option<&'static TransferSyntax> {
        let trimmed = uid.trim_end_matches('\0');
        REGISTRY.by_uid.get(trimmed).copied()
    }

    /// Iterate over every transfer syntax known to the registry.
    pub fn iter(&self) -> impl Iterator<Item = &'static TransferSyntax> {
        REGISTRY.by_uid.values().copied()
    }
}

impl TransferSyntaxIndex for TransferSyntaxRegistry {
    fn get(&self, uid: &str) -> Option<&TransferSyntax> {
        TransferSyntaxRegistry::get(self, uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_implicit_vr_little_endian() {
        let registry = TransferSyntaxRegistry;
        let ts = registry.get("1.2.840.10008.1.2").unwrap();
        assert!(!ts.is_explicit_vr());
    }

    #[test]
    fn trims_trailing_nul_padding() {
        let registry = TransferSyntaxRegistry;
        let ts = registry.get("1.2.840.10008.1.2.1\0").unwrap();
        assert!(ts.is_explicit_vr());
    }

    #[test]
    fn unknown_uid_is_absent() {
        let registry = TransferSyntaxRegistry;
        assert!(registry.get("1.2.3.4.5.6.7.8.9").is_none());
    }
}
