//! An in-memory patient/study/series/instance metadata index, searchable
//! with the matching rules of PS3.4 Annex C.2.2: single-value exact
//! match, wildcard (`*`, `?`) matching on string-typed keys, range
//! matching (`start-end`) on date/time-typed keys, and universal
//! matching on a list of alternatives (`\`-separated).

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use dicom_core::{DataDictionary, Header, Tag};
use dicom_dictionary_std::{tags, StandardDataDictionary};
use dicom_object::InMemDicomObject;

/// The four hierarchy levels a C-FIND/C-MOVE/C-GET identifier can be
/// scoped to (PS3.4 Section C.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryLevel {
    Patient,
    Study,
    Series,
    Image,
}

impl QueryLevel {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim_end_matches('\0').to_uppercase().as_str() {
            "PATIENT" => Some(QueryLevel::Patient),
            "STUDY" => Some(QueryLevel::Study),
            "SERIES" => Some(QueryLevel::Series),
            "IMAGE" => Some(QueryLevel::Image),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryLevel::Patient => "PATIENT",
            QueryLevel::Study => "STUDY",
            QueryLevel::Series => "SERIES",
            QueryLevel::Image => "IMAGE",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatientRecord {
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub patient_birth_date: Option<String>,
    pub patient_sex: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StudyRecord {
    pub study_instance_uid: String,
    pub patient_id: String,
    pub study_date: Option<String>,
    pub study_time: Option<String>,
    pub accession_number: Option<String>,
    pub study_description: Option<String>,
    pub study_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SeriesRecord {
    pub series_instance_uid: String,
    pub study_instance_uid: String,
    pub modality: Option<String>,
    pub series_number: Option<String>,
    pub series_description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InstanceRecord {
    pub sop_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_class_uid: String,
    pub instance_number: Option<String>,
}

impl PatientRecord {
    fn matches_tag(&self, tag: Tag, pattern: &str) -> Option<bool> {
        let candidate = match tag {
            tags::PATIENT_ID => Some(Some(self.patient_id.as_str())),
            tags::PATIENT_NAME => Some(self.patient_name.as_deref()),
            tags::PATIENT_BIRTH_DATE => Some(self.patient_birth_date.as_deref()),
            tags::PATIENT_SEX => Some(self.patient_sex.as_deref()),
            _ => None,
        }?;
        Some(match_value(pattern, candidate, is_date_like(tag)))
    }

    fn to_identifier(&self) -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        put_str(&mut obj, tags::PATIENT_ID, dicom_core::VR::LO, &self.patient_id);
        put_opt(&mut obj, tags::PATIENT_NAME, dicom_core::VR::PN, &self.patient_name);
        put_opt(&mut obj, tags::PATIENT_BIRTH_DATE, dicom_core::VR::DA, &self.patient_birth_date);
        put_opt(&mut obj, tags::PATIENT_SEX, dicom_core::VR::CS, &self.patient_sex);
        obj
    }
}

impl StudyRecord {
    fn matches_tag(&self, tag: Tag, pattern: &str) -> Option<bool> {
        let candidate = match tag {
            tags::STUDY_INSTANCE_UID => Some(Some(self.study_instance_uid.as_str())),
            tags::STUDY_DATE => Some(self.study_date.as_deref()),
            tags::STUDY_TIME => Some(self.study_time.as_deref()),
            tags::ACCESSION_NUMBER => Some(self.accession_number.as_deref()),
            tags::STUDY_DESCRIPTION => Some(self.study_description.as_deref()),
            tags::STUDY_ID => Some(self.study_id.as_deref()),
            _ => None,
        }?;
        Some(match_value(pattern, candidate, is_date_like(tag)))
    }

    fn to_identifier(&self) -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        put_str(&mut obj, tags::STUDY_INSTANCE_UID, dicom_core::VR::UI, &self.study_instance_uid);
        put_opt(&mut obj, tags::STUDY_DATE, dicom_core::VR::DA, &self.study_date);
        put_opt(&mut obj, tags::STUDY_TIME, dicom_core::VR::TM, &self.study_time);
        put_opt(&mut obj, tags::ACCESSION_NUMBER, dicom_core::VR::SH, &self.accession_number);
        put_opt(&mut obj, tags::STUDY_DESCRIPTION, dicom_core::VR::LO, &self.study_description);
        put_opt(&mut obj, tags::STUDY_ID, dicom_core::VR::SH, &self.study_id);
        obj
    }
}

impl SeriesRecord {
    fn matches_tag(&self, tag: Tag, pattern: &str) -> Option<bool> {
        let candidate = match tag {
            tags::SERIES_INSTANCE_UID => Some(Some(self.series_instance_uid.as_str())),
            tags::MODALITY => Some(self.modality.as_deref()),
            tags::SERIES_NUMBER => Some(self.series_number.as_deref()),
            tags::SERIES_DESCRIPTION => Some(self.series_description.as_deref()),
            _ => None,
        }?;
        Some(match_value(pattern, candidate, is_date_like(tag)))
    }

    fn to_identifier(&self) -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        put_str(&mut obj, tags::SERIES_INSTANCE_UID, dicom_core::VR::UI, &self.series_instance_uid);
        put_opt(&mut obj, tags::MODALITY, dicom_core::VR::CS, &self.modality);
        put_opt(&mut obj, tags::SERIES_NUMBER, dicom_core::VR::IS, &self.series_number);
        put_opt(&mut obj, tags::SERIES_DESCRIPTION, dicom_core::VR::LO, &self.series_description);
        obj
    }
}

impl InstanceRecord {
    fn matches_tag(&self, tag: Tag, pattern: &str) -> Option<bool> {
        let candidate = match tag {
            tags::SOP_INSTANCE_UID => Some(Some(self.sop_instance_uid.as_str())),
            tags::SOP_CLASS_UID => Some(Some(self.sop_class_uid.as_str())),
            tags::INSTANCE_NUMBER => Some(self.instance_number.as_deref()),
            _ => None,
        }?;
        Some(match_value(pattern, candidate, is_date_like(tag)))
    }

    fn to_identifier(&self) -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        put_str(&mut obj, tags::SOP_INSTANCE_UID, dicom_core::VR::UI, &self.sop_instance_uid);
        put_str(&mut obj, tags::SOP_CLASS_UID, dicom_core::VR::UI, &self.sop_class_uid);
        put_opt(&mut obj, tags::INSTANCE_NUMBER, dicom_core::VR::IS, &self.instance_number);
        obj
    }
}

fn put_str(obj: &mut InMemDicomObject, tag: Tag, vr: dicom_core::VR, value: &str) {
    obj.put(dicom_core::DataElement::new(tag, vr, dicom_core::dicom_value!(Str, value)));
}

fn put_opt(obj: &mut InMemDicomObject, tag: Tag, vr: dicom_core::VR, value: &Option<String>) {
    if let Some(value) = value {
        put_str(obj, tag, vr, value);
    }
}

fn is_date_like(tag: Tag) -> bool {
    matches!(
        StandardDataDictionary.by_tag(tag).map(|e| e.vr),
        Some(dicom_core::VR::DA) | Some(dicom_core::VR::TM) | Some(dicom_core::VR::DT)
    )
}

/// Match one query key's pattern against one stored value, per PS3.4
/// Section C.2.2. `candidate` of `None` (the record carries no value for
/// this key) never matches a non-empty pattern.
fn match_value(pattern: &str, candidate: Option<&str>, is_date: bool) -> bool {
    let pattern = pattern.trim_end_matches('\0');
    if pattern.is_empty() {
        // a universal (zero-length) match key always matches
        return true;
    }
    if pattern.contains('\\') {
        return pattern.split('\\').any(|alt| match_value(alt, candidate, is_date));
    }
    let Some(candidate) = candidate else { return false };

    if is_date && pattern.contains('-') {
        let mut parts = pattern.splitn(2, '-');
        let lo = parts.next().unwrap_or("");
        let hi = parts.next().unwrap_or("");
        return (lo.is_empty() || candidate >= lo) && (hi.is_empty() || candidate <= hi);
    }

    if pattern.contains('*') || pattern.contains('?') {
        return glob_match(pattern, candidate);
    }

    candidate == pattern
}

/// A minimal `*`/`?` glob matcher (case-sensitive, no escaping -- DICOM's
/// wildcard keys define neither).
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    let mut dp = vec![vec![false; candidate.len() + 1]; pattern.len() + 1];
    dp[0][0] = true;
    for (i, &p) in pattern.iter().enumerate() {
        if p == '*' {
            dp[i + 1][0] = dp[i][0];
        }
    }
    for i in 0..pattern.len() {
        for j in 0..candidate.len() {
            dp[i + 1][j + 1] = match pattern[i] {
                '*' => dp[i][j + 1] || dp[i + 1][j],
                '?' => dp[i][j],
                c => dp[i][j] && c == candidate[j],
            };
        }
    }
    dp[pattern.len()][candidate.len()]
}

#[derive(Default)]
struct Tables {
    patients: HashMap<String, PatientRecord>,
    studies: HashMap<String, StudyRecord>,
    series: HashMap<String, SeriesRecord>,
    instances: HashMap<String, InstanceRecord>,
}

/// The metadata index for one archive: four tables keyed by natural UID
/// (or Patient ID for patients), kept behind one lock.
#[derive(Default)]
pub struct Index {
    tables: RwLock<Tables>,
}

fn elem_str(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches('\0').to_string())
        .filter(|s| !s.is_empty())
}

impl Index {
    pub fn new() -> Self {
        Index::default()
    }

    /// Upsert the patient/study/series/instance records described by one
    /// DICOM instance, propagating the parent links (Series -> Study ->
    /// Patient). Idempotent on each natural key.
    pub fn index_object(&self, obj: &InMemDicomObject) {
        let Some(sop_instance_uid) = elem_str(obj, tags::SOP_INSTANCE_UID) else {
            tracing::warn!("skipping object with no SOP Instance UID during indexing");
            return;
        };
        let Some(sop_class_uid) = elem_str(obj, tags::SOP_CLASS_UID) else {
            tracing::warn!(%sop_instance_uid, "skipping object with no SOP Class UID during indexing");
            return;
        };
        let Some(series_instance_uid) = elem_str(obj, tags::SERIES_INSTANCE_UID) else {
            tracing::warn!(%sop_instance_uid, "skipping object with no Series Instance UID during indexing");
            return;
        };
        let Some(study_instance_uid) = elem_str(obj, tags::STUDY_INSTANCE_UID) else {
            tracing::warn!(%sop_instance_uid, "skipping object with no Study Instance UID during indexing");
            return;
        };
        let patient_id = elem_str(obj, tags::PATIENT_ID).unwrap_or_default();

        let mut tables = self.tables.write().unwrap();

        tables
            .patients
            .entry(patient_id.clone())
            .or_insert_with(|| PatientRecord {
                patient_id: patient_id.clone(),
                ..Default::default()
            })
            .tap_update(|p| {
                p.patient_name = elem_str(obj, tags::PATIENT_NAME).or(p.patient_name.take());
                p.patient_birth_date = elem_str(obj, tags::PATIENT_BIRTH_DATE).or(p.patient_birth_date.take());
                p.patient_sex = elem_str(obj, tags::PATIENT_SEX).or(p.patient_sex.take());
            });

        tables
            .studies
            .entry(study_instance_uid.clone())
            .or_insert_with(|| StudyRecord {
                study_instance_uid: study_instance_uid.clone(),
                patient_id: patient_id.clone(),
                ..Default::default()
            })
            .tap_update(|s| {
                s.patient_id = patient_id.clone();
                s.study_date = elem_str(obj, tags::STUDY_DATE).or(s.study_date.take());
                s.study_time = elem_str(obj, tags::STUDY_TIME).or(s.study_time.take());
                s.accession_number = elem_str(obj, tags::ACCESSION_NUMBER).or(s.accession_number.take());
                s.study_description = elem_str(obj, tags::STUDY_DESCRIPTION).or(s.study_description.take());
                s.study_id = elem_str(obj, tags::STUDY_ID).or(s.study_id.take());
            });

        tables
            .series
            .entry(series_instance_uid.clone())
            .or_insert_with(|| SeriesRecord {
                series_instance_uid: series_instance_uid.clone(),
                study_instance_uid: study_instance_uid.clone(),
                ..Default::default()
            })
            .tap_update(|s| {
                s.study_instance_uid = study_instance_uid.clone();
                s.modality = elem_str(obj, tags::MODALITY).or(s.modality.take());
                s.series_number = elem_str(obj, tags::SERIES_NUMBER).or(s.series_number.take());
                s.series_description = elem_str(obj, tags::SERIES_DESCRIPTION).or(s.series_description.take());
            });

        tables.instances.insert(
            sop_instance_uid.clone(),
            InstanceRecord {
                sop_instance_uid,
                series_instance_uid,
                sop_class_uid,
                instance_number: elem_str(obj, tags::INSTANCE_NUMBER),
            },
        );
    }

    pub fn remove_instance(&self, sop_instance_uid: &str) {
        self.tables.write().unwrap().instances.remove(sop_instance_uid);
    }

    /// Run a C-FIND-shaped query: match `identifier`'s keys against every
    /// record at `level`, and for a match, shape a result identifier
    /// carrying the matched level's keys plus the hierarchy's UIDs.
    pub fn find(&self, level: QueryLevel, identifier: &InMemDicomObject) -> Vec<InMemDicomObject> {
        let keys: Vec<(Tag, String)> = identifier
            .iter()
            .map(|e| (e.tag(), e.value().primitive().and_then(|v| v.to_str().ok()).unwrap_or_default().into_owned()))
            .filter(|(tag, _)| *tag != tags::QUERY_RETRIEVE_LEVEL && *tag != tags::SPECIFIC_CHARACTER_SET)
            .collect();

        let tables = self.tables.read().unwrap();
        match level {
            QueryLevel::Patient => tables
                .patients
                .values()
                .filter(|p| keys.iter().all(|(tag, pattern)| p.matches_tag(*tag, pattern).unwrap_or(true)))
                .map(PatientRecord::to_identifier)
                .collect(),
            QueryLevel::Study => tables
                .studies
                .values()
                .filter(|s| {
                    let patient = tables.patients.get(&s.patient_id);
                    keys.iter().all(|(tag, pattern)| {
                        s.matches_tag(*tag, pattern)
                            .or_else(|| patient.and_then(|p| p.matches_tag(*tag, pattern)))
                            .unwrap_or(true)
                    })
                })
                .map(|s| {
                    let mut obj = s.to_identifier();
                    if let Some(patient) = tables.patients.get(&s.patient_id) {
                        merge_identifier(&mut obj, &patient.to_identifier());
                    }
                    obj
                })
                .collect(),
            QueryLevel::Series => tables
                .series
                .values()
                .filter(|se| {
                    let study = tables.studies.get(&se.study_instance_uid);
                    let patient = study.and_then(|s| tables.patients.get(&s.patient_id));
                    keys.iter().all(|(tag, pattern)| {
                        se.matches_tag(*tag, pattern)
                            .or_else(|| study.and_then(|s| s.matches_tag(*tag, pattern)))
                            .or_else(|| patient.and_then(|p| p.matches_tag(*tag, pattern)))
                            .unwrap_or(true)
                    })
                })
                .map(|se| {
                    let mut obj = se.to_identifier();
                    if let Some(study) = tables.studies.get(&se.study_instance_uid) {
                        merge_identifier(&mut obj, &study.to_identifier());
                        if let Some(patient) = tables.patients.get(&study.patient_id) {
                            merge_identifier(&mut obj, &patient.to_identifier());
                        }
                    }
                    obj
                })
                .collect(),
            QueryLevel::Image => tables
                .instances
                .values()
                .filter(|i| {
                    let series = tables.series.get(&i.series_instance_uid);
                    let study = series.and_then(|se| tables.studies.get(&se.study_instance_uid));
                    let patient = study.and_then(|s| tables.patients.get(&s.patient_id));
                    keys.iter().all(|(tag, pattern)| {
                        i.matches_tag(*tag, pattern)
                            .or_else(|| series.and_then(|se| se.matches_tag(*tag, pattern)))
                            .or_else(|| study.and_then(|s| s.matches_tag(*tag, pattern)))
                            .or_else(|| patient.and_then(|p| p.matches_tag(*tag, pattern)))
                            .unwrap_or(true)
                    })
                })
                .map(|i| {
                    let mut obj = i.to_identifier();
                    if let Some(series) = tables.series.get(&i.series_instance_uid) {
                        merge_identifier(&mut obj, &series.to_identifier());
                        if let Some(study) = tables.studies.get(&series.study_instance_uid) {
                            merge_identifier(&mut obj, &study.to_identifier());
                            if let Some(patient) = tables.patients.get(&study.patient_id) {
                                merge_identifier(&mut obj, &patient.to_identifier());
                            }
                        }
                    }
                    obj
                })
                .collect(),
        }
    }

    /// Expand a C-FIND-shaped match at `level` down to the concrete
    /// instances it covers, for C-MOVE/C-GET (PS3.4 Section C.4.2/C.4.3),
    /// which always operate on whole instances regardless of the level
    /// the query identifier was scoped to.
    pub fn resolve_instances(&self, level: QueryLevel, identifier: &InMemDicomObject) -> Vec<InstanceRecord> {
        let matches = self.find(level, identifier);
        let tables = self.tables.read().unwrap();
        match level {
            QueryLevel::Image => matches
                .iter()
                .filter_map(|m| elem_str(m, tags::SOP_INSTANCE_UID))
                .filter_map(|uid| tables.instances.get(&uid).cloned())
                .collect(),
            QueryLevel::Series => {
                let series_uids: HashSet<String> = matches
                    .iter()
                    .filter_map(|m| elem_str(m, tags::SERIES_INSTANCE_UID))
                    .collect();
                tables
                    .instances
                    .values()
                    .filter(|i| series_uids.contains(&i.series_instance_uid))
                    .cloned()
                    .collect()
            }
            QueryLevel::Study => {
                let study_uids: HashSet<String> = matches
                    .iter()
                    .filter_map(|m| elem_str(m, tags::STUDY_INSTANCE_UID))
                    .collect();
                tables
                    .instances
                    .values()
                    .filter(|i| {
                        tables
                            .series
                            .get(&i.series_instance_uid)
                            .map(|se| study_uids.contains(&se.study_instance_uid))
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect()
            }
            QueryLevel::Patient => {
                let patient_ids: HashSet<String> = matches
                    .iter()
                    .filter_map(|m| elem_str(m, tags::PATIENT_ID))
                    .collect();
                tables
                    .instances
                    .values()
                    .filter(|i| {
                        tables
                            .series
                            .get(&i.series_instance_uid)
                            .and_then(|se| tables.studies.get(&se.study_instance_uid))
                            .map(|s| patient_ids.contains(&s.patient_id))
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect()
            }
        }
    }

    pub fn patient_count(&self) -> usize {
        self.tables.read().unwrap().patients.len()
    }

    pub fn study_count(&self) -> usize {
        self.tables.read().unwrap().studies.len()
    }

    pub fn series_count(&self) -> usize {
        self.tables.read().unwrap().series.len()
    }

    pub fn instance_count(&self) -> usize {
        self.tables.read().unwrap().instances.len()
    }
}

fn merge_identifier(into: &mut InMemDicomObject, from: &InMemDicomObject) {
    for element in from.iter() {
        if into.element(element.tag()).is_err() {
            into.put(element.clone());
        }
    }
}

trait TapUpdate: Sized {
    fn tap_update(&mut self, f: impl FnOnce(&mut Self));
}

impl<T> TapUpdate for T {
    fn tap_update(&mut self, f: impl FnOnce(&mut Self)) {
        f(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{dicom_value, DataElement, VR};

    fn make_instance(
        patient_id: &str,
        study: &str,
        series: &str,
        sop: &str,
        study_date: &str,
        modality: &str,
    ) -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(tags::PATIENT_ID, VR::LO, dicom_value!(Str, patient_id)));
        obj.put(DataElement::new(tags::STUDY_INSTANCE_UID, VR::UI, dicom_value!(Str, study)));
        obj.put(DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, dicom_value!(Str, series)));
        obj.put(DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, dicom_value!(Str, sop)));
        obj.put(DataElement::new(tags::SOP_CLASS_UID, VR::UI, dicom_value!(Str, "1.2.840.10008.5.1.4.1.1.7")));
        obj.put(DataElement::new(tags::STUDY_DATE, VR::DA, dicom_value!(Str, study_date)));
        obj.put(DataElement::new(tags::MODALITY, VR::CS, dicom_value!(Str, modality)));
        obj
    }

    fn query(level: QueryLevel, pairs: &[(Tag, &str)]) -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(
            tags::QUERY_RETRIEVE_LEVEL,
            VR::CS,
            dicom_value!(Str, level.as_str()),
        ));
        for (tag, value) in pairs {
            obj.put(DataElement::new(*tag, VR::LO, dicom_value!(Str, *value)));
        }
        obj
    }

    #[test]
    fn indexes_and_counts_all_four_levels() {
        let index = Index::new();
        index.index_object(&make_instance("PAT1", "STU1", "SER1", "SOP1", "20240102", "CT"));
        index.index_object(&make_instance("PAT1", "STU1", "SER1", "SOP2", "20240102", "CT"));
        assert_eq!(index.patient_count(), 1);
        assert_eq!(index.study_count(), 1);
        assert_eq!(index.series_count(), 1);
        assert_eq!(index.instance_count(), 2);
    }

    #[test]
    fn study_level_find_matches_exact_patient_id() {
        let index = Index::new();
        index.index_object(&make_instance("PAT1", "STU1", "SER1", "SOP1", "20240102", "CT"));
        index.index_object(&make_instance("PAT2", "STU2", "SER2", "SOP2", "20240102", "MR"));

        let results = index.find(QueryLevel::Study, &query(QueryLevel::Study, &[(tags::PATIENT_ID, "PAT1")]));
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].element(tags::STUDY_INSTANCE_UID).unwrap().to_str().unwrap(),
            "STU1"
        );
    }

    #[test]
    fn study_level_find_matches_date_range() {
        let index = Index::new();
        index.index_object(&make_instance("PAT1", "STU1", "SER1", "SOP1", "20240101", "CT"));
        index.index_object(&make_instance("PAT1", "STU2", "SER2", "SOP2", "20240401", "CT"));

        let results = index.find(
            QueryLevel::Study,
            &query(QueryLevel::Study, &[(tags::STUDY_DATE, "20240101-20240228")]),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].element(tags::STUDY_INSTANCE_UID).unwrap().to_str().unwrap(),
            "STU1"
        );
    }

    #[test]
    fn wildcard_matches_patient_name_prefix() {
        let index = Index::new();
        let mut obj = make_instance("PAT1", "STU1", "SER1", "SOP1", "20240101", "CT");
        obj.put(DataElement::new(tags::PATIENT_NAME, VR::PN, dicom_value!(Str, "DOE^JOHN")));
        index.index_object(&obj);

        let results = index.find(QueryLevel::Patient, &query(QueryLevel::Patient, &[(tags::PATIENT_NAME, "DOE*")]));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn image_level_result_includes_ancestor_uids() {
        let index = Index::new();
        index.index_object(&make_instance("PAT1", "STU1", "SER1", "SOP1", "20240101", "CT"));

        let results = index.find(
            QueryLevel::Image,
            &query(QueryLevel::Image, &[(tags::SERIES_INSTANCE_UID, "SER1")]),
        );
        assert_eq!(results.len(), 1);
        let obj = &results[0];
        assert_eq!(obj.element(tags::SOP_INSTANCE_UID).unwrap().to_str().unwrap(), "SOP1");
        assert_eq!(obj.element(tags::STUDY_INSTANCE_UID).unwrap().to_str().unwrap(), "STU1");
        assert_eq!(obj.element(tags::PATIENT_ID).unwrap().to_str().unwrap(), "PAT1");
    }

    #[test]
    fn resolve_instances_expands_study_level_match_to_its_instances() {
        let index = Index::new();
        index.index_object(&make_instance("PAT1", "STU1", "SER1", "SOP1", "20240101", "CT"));
        index.index_object(&make_instance("PAT1", "STU1", "SER1", "SOP2", "20240101", "CT"));
        index.index_object(&make_instance("PAT2", "STU2", "SER2", "SOP3", "20240101", "MR"));

        let instances = index.resolve_instances(
            QueryLevel::Study,
            &query(QueryLevel::Study, &[(tags::STUDY_INSTANCE_UID, "STU1")]),
        );
        let mut uids: Vec<&str> = instances.iter().map(|i| i.sop_instance_uid.as_str()).collect();
        uids.sort();
        assert_eq!(uids, vec!["SOP1", "SOP2"]);
    }

    #[test]
    fn list_pattern_matches_any_alternative() {
        let index = Index::new();
        index.index_object(&make_instance("PAT1", "STU1", "SER1", "SOP1", "20240101", "CT"));
        index.index_object(&make_instance("PAT2", "STU2", "SER2", "SOP2", "20240101", "MR"));
        index.index_object(&make_instance("PAT3", "STU3", "SER3", "SOP3", "20240101", "US"));

        let results = index.find(
            QueryLevel::Series,
            &query(QueryLevel::Series, &[(tags::MODALITY, "CT\\MR")]),
        );
        assert_eq!(results.len(), 2);
    }
}
