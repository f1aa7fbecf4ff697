//! The standard DICOM attribute dictionary, plus runtime registration of
//! vendor-private tags.
//!
//! The dictionary is a process-wide, lazily-initialized singleton
//! ([`StandardDataDictionary::default`] returns a cheap handle to it).
//! Reads never block each other; registering a private tag takes a brief
//! exclusive lock. Registration fails if the tag's group is not odd, or if
//! an entry already exists for that tag.

pub mod entries;
pub mod tags;
pub mod uids;

use std::collections::HashMap;
use std::sync::RwLock;

use dicom_core::dictionary::{DataDictionary, DictionaryEntryRef};
use dicom_core::Tag;
use lazy_static::lazy_static;

use entries::{Entry, ENTRIES};

/// Error returned by [`StandardDataDictionary::register_private`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterPrivateError {
    /// The tag's group number is even; private tags must live in an odd
    /// group.
    NotPrivateGroup,
    /// A dictionary entry already exists for this tag.
    AlreadyRegistered,
}

impl std::fmt::Display for RegisterPrivateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterPrivateError::NotPrivateGroup => {
                write!(f, "tag group must be odd to register a private tag")
            }
            RegisterPrivateError::AlreadyRegistered => {
                write!(f, "a dictionary entry for this tag already exists")
            }
        }
    }
}

impl std::error::Error for RegisterPrivateError {}

struct Registry {
    by_tag: HashMap<Tag, Entry>,
    by_keyword: HashMap<&'static str, Tag>,
    private: RwLock<HashMap<Tag, Entry>>,
}

impl Registry {
    fn new() -> Self {
        let mut by_tag = HashMap::with_capacity(ENTRIES.len());
        let mut by_keyword = HashMap::with_capacity(ENTRIES.len());
        for e in ENTRIES {
            by_tag.insert(e.tag, clone_entry(e));
            by_keyword.insert(e.keyword, e.tag);
        }
        Registry {
            by_tag,
            by_keyword,
            private: RwLock::new(HashMap::new()),
        }
    }
}

fn clone_entry(e: &Entry) -> Entry {
    Entry {
        tag: e.tag,
        vr: e.vr,
        vm: e.vm,
        keyword: e.keyword,
        name: e.name,
        retired: e.retired,
    }
}

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}

/// Handle to the process-wide standard data dictionary. Cheap to construct;
/// all instances share the same underlying singleton.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDataDictionary;

impl StandardDataDictionary {
    /// Register a vendor-private tag. The tag's group must be odd and must
    /// not already carry a dictionary entry (standard or previously
    /// registered private).
    pub fn register_private(
        &self,
        tag: Tag,
        vr: dicom_core::VR,
        keyword: &'static str,
        name: &'static str,
    ) -> Result<(), RegisterPrivateError> {
        if !tag.is_private() {
            return Err(RegisterPrivateError::NotPrivateGroup);
        }
        if REGISTRY.by_tag.contains_key(&tag) {
            return Err(RegisterPrivateError::AlreadyRegistered);
        }
        let mut private = REGISTRY.private.write().expect("private dictionary lock poisoned");
        if private.contains_key(&tag) {
            return Err(RegisterPrivateError::AlreadyRegistered);
        }
        private.insert(
            tag,
            Entry {
                tag,
                vr,
                vm: dicom_core::VM::ONE_OR_MORE,
                keyword,
                name,
                retired: false,
            },
        );
        Ok(())
    }
}

impl DataDictionary for StandardDataDictionary {
    fn by_tag(&self, tag: Tag) -> Option<DictionaryEntryRef> {
        if let Some(e) = REGISTRY.by_tag.get(&tag) {
            return Some(to_ref(e));
        }
        let private = REGISTRY.private.read().expect("private dictionary lock poisoned");
        private.get(&tag).map(to_ref)
    }

    fn by_keyword(&self, keyword: &str) -> Option<DictionaryEntryRef> {
        REGISTRY
            .by_keyword
            .get(keyword)
            .and_then(|tag| self.by_tag(*tag))
    }
}

fn to_ref(e: &Entry) -> DictionaryEntryRef {
    DictionaryEntryRef {
        tag: e.tag,
        vr: e.vr,
        vm: e.vm,
        keyword: e.keyword,
        name: e.name,
        retired: e.retired,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::VR;

    #[test]
    fn looks_up_standard_tag() {
        let dict = StandardDataDictionary;
        let entry = dict.by_tag(tags::PATIENT_NAME).unwrap();
        assert_eq!(entry.vr, VR::PN);
        assert_eq!(entry.keyword, "PatientName");
    }

    #[test]
    fn unknown_tag_is_absent_not_an_error() {
        let dict = StandardDataDictionary;
        assert!(dict.by_tag(Tag(0x0009, 0x9999)).is_none());
    }

    #[test]
    fn private_registration_rejects_even_group() {
        let dict = StandardDataDictionary;
        let err = dict
            .register_private(Tag(0x0008, 0x0001), VR::LO, "Bogus", "Bogus")
            .unwrap_err();
        assert_eq!(err, RegisterPrivateError::NotPrivateGroup);
    }

    #[test]
    fn private_registration_then_lookup() {
        let dict = StandardDataDictionary;
        let tag = Tag(0x4567, 0x0010);
        dict.register_private(tag, VR::LO, "AcmePrivateCreator", "Acme Private Creator")
            .unwrap();
        let entry = dict.by_tag(tag).unwrap();
        assert_eq!(entry.keyword, "AcmePrivateCreator");

        // a second registration of the same tag fails
        let err = dict
            .register_private(tag, VR::LO, "AcmePrivateCreator", "Acme Private Creator")
            .unwrap_err();
        assert_eq!(err, RegisterPrivateError::AlreadyRegistered);
    }
}
