//! The dictionary abstraction implemented concretely by `dicom-dictionary-std`.

use crate::header::Tag;
use crate::vr::{VR, VM};

/// Metadata known about a tag: its VR, value multiplicity, keyword, human
/// name, and retirement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryEntryRef {
    pub tag: Tag,
    pub vr: VR,
    pub vm: VM,
    pub keyword: &'static str,
    pub name: &'static str,
    pub retired: bool,
}

/// A lookup from tag to dictionary metadata and back from keyword to tag.
/// Implementations must treat reads as highly concurrent and serialize any
/// mutation (private-tag registration).
pub trait DataDictionary {
    /// Look up an entry by tag. Returns `None` for unknown tags rather than
    /// failing, per the tag dictionary's absent-is-not-an-error contract.
    fn by_tag(&self, tag: Tag) -> Option<DictionaryEntryRef>;

    /// Look up a tag by its dictionary keyword.
    fn by_keyword(&self, keyword: &str) -> Option<DictionaryEntryRef>;
}
