//! A file archive for Part-10 DICOM objects: computes a path for each
//! instance under a configurable naming scheme, applies a duplicate
//! policy, and keeps an in-memory SOP-Instance-UID to path index
//! alongside the files on disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use snafu::{OptionExt, ResultExt, Snafu};

use dicom_dictionary_std::tags;
use dicom_object::DefaultDicomObject;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("object is missing required element {}", keyword))]
    MissingElement { keyword: &'static str },
    #[snafu(display("StudyDate `{}` is not a valid date for the date-hierarchical naming scheme", value))]
    InvalidStudyDate { value: String },
    #[snafu(display("instance `{}` already exists in the archive", sop_instance_uid))]
    Duplicate { sop_instance_uid: String },
    #[snafu(display("instance `{}` was not found in the archive", sop_instance_uid))]
    NotFound { sop_instance_uid: String },
    #[snafu(display("could not create directory {}", path.display()))]
    CreateDir { path: PathBuf, source: std::io::Error },
    #[snafu(display("could not write file {}", path.display()))]
    Write { path: PathBuf, source: dicom_object::WriteError },
    #[snafu(display("could not rename {} to {}", from.display(), to.display()))]
    Rename { from: PathBuf, to: PathBuf, source: std::io::Error },
    #[snafu(display("could not remove {}", path.display()))]
    Remove { path: PathBuf, source: std::io::Error },
    #[snafu(display("could not read {}", path.display()))]
    Read { path: PathBuf, source: dicom_object::ReadError },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How a stored instance's file path is derived from its identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingScheme {
    /// `<root>/<StudyInstanceUID>/<SeriesInstanceUID>/<SOPInstanceUID>.dcm`
    #[default]
    UidHierarchical,
    /// `<root>/YYYY/MM/DD/<StudyInstanceUID>/<SOPInstanceUID>.dcm`, dated
    /// by the instance's Study Date.
    DateHierarchical,
    /// `<root>/<SOPInstanceUID>.dcm`
    Flat,
}

/// What to do when storing an instance whose SOP Instance UID is already
/// present in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Fail the store with [`Error::Duplicate`].
    #[default]
    Reject,
    /// Overwrite the existing file.
    Replace,
    /// Silently keep the existing file and report success.
    Ignore,
}

/// Integrity report produced by [`Archive::verify_integrity`]: for each
/// indexed path, whether the file still exists, parses, and its stored
/// SOP Instance UID still matches the index key.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub checked: usize,
    pub missing: Vec<String>,
    pub corrupt: Vec<String>,
    pub mismatched: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.corrupt.is_empty() && self.mismatched.is_empty()
    }
}

/// A file-backed archive of DICOM instances rooted at one directory.
pub struct Archive {
    root: PathBuf,
    naming: NamingScheme,
    duplicate_policy: DuplicatePolicy,
    create_directories: bool,
    index: RwLock<HashMap<String, PathBuf>>,
}

fn required_str(obj: &DefaultDicomObject, tag: dicom_core::Tag, keyword: &'static str) -> Result<String> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches('\0').to_string())
        .context(MissingElementSnafu { keyword })
}

impl Archive {
    /// Open an archive rooted at `root`, with an empty index. Call
    /// [`Archive::rebuild_index`] to populate it from files already on
    /// disk.
    pub fn new(root: impl Into<PathBuf>, naming: NamingScheme, duplicate_policy: DuplicatePolicy) -> Self {
        Archive {
            root: root.into(),
            naming,
            duplicate_policy,
            create_directories: true,
            index: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_create_directories(mut self, create_directories: bool) -> Self {
        self.create_directories = create_directories;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path at which `sop_instance_uid` would live (or already lives),
    /// without touching the filesystem.
    pub fn get_file_path(&self, sop_instance_uid: &str) -> Option<PathBuf> {
        self.index.read().unwrap().get(sop_instance_uid).cloned()
    }

    pub fn exists(&self, sop_instance_uid: &str) -> bool {
        self.index.read().unwrap().contains_key(sop_instance_uid)
    }

    fn compute_path(&self, obj: &DefaultDicomObject) -> Result<PathBuf> {
        let sop_instance_uid = required_str(obj, tags::SOP_INSTANCE_UID, "SOPInstanceUID")?;
        match self.naming {
            NamingScheme::UidHierarchical => {
                let study_uid = required_str(obj, tags::STUDY_INSTANCE_UID, "StudyInstanceUID")?;
                let series_uid = required_str(obj, tags::SERIES_INSTANCE_UID, "SeriesInstanceUID")?;
                Ok(self
                    .root
                    .join(study_uid)
                    .join(series_uid)
                    .join(format!("{}.dcm", sop_instance_uid)))
            }
            NamingScheme::DateHierarchical => {
                let study_uid = required_str(obj, tags::STUDY_INSTANCE_UID, "StudyInstanceUID")?;
                let date = required_str(obj, tags::STUDY_DATE, "StudyDate")?;
                if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
                    return InvalidStudyDateSnafu { value: date }.fail();
                }
                Ok(self
                    .root
                    .join(&date[0..4])
                    .join(&date[4..6])
                    .join(&date[6..8])
                    .join(study_uid)
                    .join(format!("{}.dcm", sop_instance_uid)))
            }
            NamingScheme::Flat => Ok(self.root.join(format!("{}.dcm", sop_instance_uid))),
        }
    }

    /// Store `obj`, applying this archive's duplicate policy, and return
    /// the path it was (or was already) written to.
    pub fn store(&self, obj: &DefaultDicomObject) -> Result<PathBuf> {
        let sop_instance_uid = required_str(obj, tags::SOP_INSTANCE_UID, "SOPInstanceUID")?;
        let path = self.compute_path(obj)?;

        if self.exists(&sop_instance_uid) {
            match self.duplicate_policy {
                DuplicatePolicy::Reject => return DuplicateSnafu { sop_instance_uid }.fail(),
                DuplicatePolicy::Ignore => return Ok(self.get_file_path(&sop_instance_uid).unwrap()),
                DuplicatePolicy::Replace => {}
            }
        }

        if self.create_directories {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context(CreateDirSnafu { path: parent.to_path_buf() })?;
            }
        }

        let tmp_path = path.with_extension("dcm.tmp");
        obj.write_to_file(&tmp_path)
            .context(WriteSnafu { path: tmp_path.clone() })?;
        fs::rename(&tmp_path, &path).context(RenameSnafu {
            from: tmp_path,
            to: path.clone(),
        })?;

        self.index
            .write()
            .unwrap()
            .insert(sop_instance_uid, path.clone());
        Ok(path)
    }

    /// Read back a previously stored instance by its SOP Instance UID.
    pub fn retrieve(&self, sop_instance_uid: &str) -> Result<DefaultDicomObject> {
        let path = self.get_file_path(sop_instance_uid).context(NotFoundSnafu {
            sop_instance_uid: sop_instance_uid.to_string(),
        })?;
        DefaultDicomObject::open_file(&path).context(ReadSnafu { path })
    }

    /// Remove a previously stored instance, both its file and its index
    /// entry.
    pub fn remove(&self, sop_instance_uid: &str) -> Result<()> {
        let path = {
            let mut index = self.index.write().unwrap();
            index.remove(sop_instance_uid).context(NotFoundSnafu {
                sop_instance_uid: sop_instance_uid.to_string(),
            })?
        };
        fs::remove_file(&path).context(RemoveSnafu { path })
    }

    /// Recursively walk [`Archive::root`], indexing every file that
    /// parses as a Part-10 DICOM object, replacing whatever index this
    /// archive already held.
    pub fn rebuild_index(&self) -> Result<usize> {
        let mut index = HashMap::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("dcm") {
                continue;
            }
            match DefaultDicomObject::open_file(path) {
                Ok(obj) => {
                    if let Ok(sop_instance_uid) = required_str(&obj, tags::SOP_INSTANCE_UID, "SOPInstanceUID") {
                        index.insert(sop_instance_uid, path.to_path_buf());
                    } else {
                        tracing::warn!(path = %path.display(), "skipping file with no SOP Instance UID while rebuilding archive index");
                    }
                }
                Err(source) => {
                    tracing::warn!(path = %path.display(), %source, "skipping unparsable file while rebuilding archive index");
                }
            }
        }
        let count = index.len();
        *self.index.write().unwrap() = index;
        Ok(count)
    }

    /// For every indexed path, check that the file exists, parses, and
    /// its stored SOP Instance UID matches the index key.
    pub fn verify_integrity(&self) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        let entries: Vec<(String, PathBuf)> = self
            .index
            .read()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (sop_instance_uid, path) in entries {
            report.checked += 1;
            if !path.exists() {
                report.missing.push(sop_instance_uid);
                continue;
            }
            match DefaultDicomObject::open_file(&path) {
                Ok(obj) => match required_str(&obj, tags::SOP_INSTANCE_UID, "SOPInstanceUID") {
                    Ok(actual) if actual == sop_instance_uid => {}
                    _ => report.mismatched.push(sop_instance_uid),
                },
                Err(_) => report.corrupt.push(sop_instance_uid),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{dicom_value, DataElement, VR};
    use dicom_object::{FileMetaTableBuilder, InMemDicomObject};

    fn sample_object(study: &str, series: &str, sop: &str, date: &str) -> DefaultDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(tags::SOP_CLASS_UID, VR::UI, dicom_value!(Str, "1.2.840.10008.5.1.4.1.1.7")));
        obj.put(DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, dicom_value!(Str, sop)));
        obj.put(DataElement::new(tags::STUDY_INSTANCE_UID, VR::UI, dicom_value!(Str, study)));
        obj.put(DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, dicom_value!(Str, series)));
        obj.put(DataElement::new(tags::STUDY_DATE, VR::DA, dicom_value!(Str, date)));
        let meta = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
            .media_storage_sop_instance_uid(sop)
            .transfer_syntax("1.2.840.10008.1.2.1")
            .build()
            .unwrap();
        obj.with_exact_meta(meta)
    }

    #[test]
    fn stores_with_uid_hierarchical_path() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path(), NamingScheme::UidHierarchical, DuplicatePolicy::Reject);
        let obj = sample_object("1.2.3", "1.2.3.4", "1.2.3.4.5", "20240102");
        let path = archive.store(&obj).unwrap();
        assert_eq!(path, dir.path().join("1.2.3").join("1.2.3.4").join("1.2.3.4.5.dcm"));
        assert!(path.exists());
        assert_eq!(archive.get_file_path("1.2.3.4.5"), Some(path));
    }

    #[test]
    fn stores_with_date_hierarchical_path() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path(), NamingScheme::DateHierarchical, DuplicatePolicy::Reject);
        let obj = sample_object("1.2.3", "1.2.3.4", "1.2.3.4.5", "20240102");
        let path = archive.store(&obj).unwrap();
        assert_eq!(
            path,
            dir.path().join("2024").join("01").join("02").join("1.2.3").join("1.2.3.4.5.dcm")
        );
    }

    #[test]
    fn reject_policy_refuses_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path(), NamingScheme::Flat, DuplicatePolicy::Reject);
        let obj = sample_object("1.2.3", "1.2.3.4", "1.2.3.4.5", "20240102");
        archive.store(&obj).unwrap();
        let err = archive.store(&obj).unwrap_err();
        assert!(matches!(err, Error::Duplicate { .. }));
    }

    #[test]
    fn ignore_policy_keeps_first_copy() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path(), NamingScheme::Flat, DuplicatePolicy::Ignore);
        let obj = sample_object("1.2.3", "1.2.3.4", "1.2.3.4.5", "20240102");
        let first = archive.store(&obj).unwrap();
        let second = archive.store(&obj).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn retrieve_round_trips_stored_instance() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path(), NamingScheme::Flat, DuplicatePolicy::Reject);
        let obj = sample_object("1.2.3", "1.2.3.4", "1.2.3.4.5", "20240102");
        archive.store(&obj).unwrap();
        let back = archive.retrieve("1.2.3.4.5").unwrap();
        assert_eq!(
            back.element(tags::SOP_INSTANCE_UID).unwrap().to_str().unwrap(),
            "1.2.3.4.5"
        );
    }

    #[test]
    fn rebuild_index_discovers_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path(), NamingScheme::UidHierarchical, DuplicatePolicy::Reject);
        let obj = sample_object("1.2.3", "1.2.3.4", "1.2.3.4.5", "20240102");
        archive.store(&obj).unwrap();

        let reopened = Archive::new(dir.path(), NamingScheme::UidHierarchical, DuplicatePolicy::Reject);
        assert!(!reopened.exists("1.2.3.4.5"));
        let count = reopened.rebuild_index().unwrap();
        assert_eq!(count, 1);
        assert!(reopened.exists("1.2.3.4.5"));
    }

    #[test]
    fn verify_integrity_flags_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path(), NamingScheme::Flat, DuplicatePolicy::Reject);
        let obj = sample_object("1.2.3", "1.2.3.4", "1.2.3.4.5", "20240102");
        let path = archive.store(&obj).unwrap();
        std::fs::remove_file(&path).unwrap();

        let report = archive.verify_integrity();
        assert!(!report.is_clean());
        assert_eq!(report.missing, vec!["1.2.3.4.5".to_string()]);
    }
}
