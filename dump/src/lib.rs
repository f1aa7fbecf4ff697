//! DICOM data dumping library.
//!
//! Helper library for printing the contents of DICOM objects and elements
//! in a human readable way.
//!
//! # Examples
//!
//! ```no_run
//! use dicom_object::open_file;
//! use dicom_dump::dump_file;
//!
//! let obj = open_file("path/to/file.dcm")?;
//! dump_file(&obj)?;
//! # Result::<(), Box<dyn std::error::Error>>::Ok(())
//! ```
//!
//! See the [`DumpOptions`] builder for additional dumping options.
use colored::*;
use dicom_core::dictionary::DataDictionary;
use dicom_core::header::Header;
use dicom_core::value::{DicomValue, PrimitiveValue};
use dicom_core::VR;
use dicom_object::{FileDicomObject, FileMetaTable, InMemDicomObject, InMemElement, StandardDataDictionary};
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::io::{stdout, Result as IoResult, Write};
use std::str::FromStr;

/// An enum of all supported output formats for dumping DICOM data.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq, Default)]
#[non_exhaustive]
pub enum DumpFormat {
    /// The main, human-readable dump format.
    #[default]
    Main,
}

/// Options and flags to configure how to dump a DICOM file or object.
///
/// Once set up, [`DumpOptions::dump_file`] or [`DumpOptions::dump_file_to`]
/// finalize the dumping process on an open file, printing both the file
/// meta table and the main data set. [`DumpOptions::dump_object`] /
/// [`DumpOptions::dump_object_to`] work on a bare data set without a file
/// meta table.
#[derive(Debug, Default, Clone, PartialEq)]
#[non_exhaustive]
pub struct DumpOptions {
    pub format: DumpFormat,
    pub color: ColorMode,
    pub width: Option<u32>,
    pub no_text_limit: bool,
    pub no_limit: bool,
}

impl DumpOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn format(&mut self, format: DumpFormat) -> &mut Self {
        self.format = format;
        self
    }

    pub fn width(&mut self, width: u32) -> &mut Self {
        self.width = Some(width);
        self
    }

    pub fn width_auto(&mut self) -> &mut Self {
        self.width = None;
        self
    }

    pub fn no_text_limit(&mut self, no_text_limit: bool) -> &mut Self {
        self.no_text_limit = no_text_limit;
        self
    }

    pub fn no_limit(&mut self, no_limit: bool) -> &mut Self {
        self.no_limit = no_limit;
        self
    }

    pub fn color_mode(&mut self, color: ColorMode) -> &mut Self {
        self.color = color;
        self
    }

    /// Dump the contents of an open DICOM file to standard output.
    pub fn dump_file<D>(&self, obj: &FileDicomObject<InMemDicomObject<D>>) -> IoResult<()>
    where
        D: DataDictionary,
    {
        self.dump_file_to(stdout(), obj)
    }

    /// Dump the contents of an open DICOM file to the given writer.
    pub fn dump_file_to<D>(
        &self,
        mut to: impl Write,
        obj: &FileDicomObject<InMemDicomObject<D>>,
    ) -> IoResult<()>
    where
        D: DataDictionary,
    {
        self.apply_color_override(true);

        let meta = obj.meta();
        let width = determine_width(self.width);

        meta_dump(&mut to, meta, if self.no_limit { u32::MAX } else { width })?;
        writeln!(to, "{:-<58}", "")?;
        dump(&mut to, obj.inner(), width, 0, self.no_text_limit, self.no_limit)?;

        Ok(())
    }

    /// Dump the contents of a DICOM object to standard output.
    #[inline]
    pub fn dump_object<D>(&self, obj: &InMemDicomObject<D>) -> IoResult<()>
    where
        D: DataDictionary,
    {
        self.apply_color_override(true);
        let width = determine_width(self.width);
        dump(&mut stdout(), obj, width, 0, self.no_text_limit, self.no_limit)
    }

    /// Dump the contents of a DICOM object to the given writer.
    #[inline]
    pub fn dump_object_to<D>(&self, mut to: impl Write, obj: &InMemDicomObject<D>) -> IoResult<()>
    where
        D: DataDictionary,
    {
        self.apply_color_override(false);
        let width = determine_width(self.width);
        dump(&mut to, obj, width, 0, self.no_text_limit, self.no_limit)
    }

    fn apply_color_override(&self, to_stdout: bool) {
        match (self.color, to_stdout) {
            (ColorMode::Never, _) => colored::control::set_override(false),
            (ColorMode::Always, _) => colored::control::set_override(true),
            (ColorMode::Auto, false) => colored::control::set_override(false),
            (ColorMode::Auto, true) => colored::control::unset_override(),
        }
    }
}

/// Enumeration of output coloring modes.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq, Default)]
pub enum ColorMode {
    /// Produce colored output if the destination supports it. Default.
    #[default]
    Auto,
    /// Never produce colored output.
    Never,
    /// Always produce colored output.
    Always,
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorMode::Never => f.write_str("never"),
            ColorMode::Auto => f.write_str("auto"),
            ColorMode::Always => f.write_str("always"),
        }
    }
}

impl FromStr for ColorMode {
    type Err = ColorModeError;
    fn from_str(color: &str) -> Result<Self, Self::Err> {
        match color {
            "never" => Ok(ColorMode::Never),
            "auto" => Ok(ColorMode::Auto),
            "always" => Ok(ColorMode::Always),
            _ => Err(ColorModeError),
        }
    }
}

/// The error raised when providing an invalid color mode.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct ColorModeError;

impl Display for ColorModeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("invalid color mode")
    }
}

impl std::error::Error for ColorModeError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DumpValue<T>
where
    T: ToString,
{
    TagNum(T),
    Alias(T),
    Num(T),
    Str(T),
    DateTime(T),
    Nothing,
}

impl<T> fmt::Display for DumpValue<T>
where
    T: ToString,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self {
            DumpValue::TagNum(v) => v.to_string().dimmed(),
            DumpValue::Alias(v) => v.to_string().bold(),
            DumpValue::Num(v) => v.to_string().cyan(),
            DumpValue::Str(v) => v.to_string().yellow(),
            DumpValue::DateTime(v) => v.to_string().green(),
            DumpValue::Nothing => "(no value)".italic(),
        };
        if let Some(width) = f.width() {
            write!(f, "{:width$}", value, width = width)
        } else {
            write!(f, "{}", value)
        }
    }
}

/// Dump the contents of a DICOM file to stdout (file meta table + data set).
pub fn dump_file<D>(obj: &FileDicomObject<InMemDicomObject<D>>) -> IoResult<()>
where
    D: DataDictionary,
{
    DumpOptions::new().dump_file(obj)
}

/// Dump the contents of a DICOM file to the given writer.
pub fn dump_file_to<D>(to: impl Write, obj: &FileDicomObject<InMemDicomObject<D>>) -> IoResult<()>
where
    D: DataDictionary,
{
    DumpOptions::new().dump_file_to(to, obj)
}

/// Dump the contents of a DICOM object to stdout.
pub fn dump_object<D>(obj: &InMemDicomObject<D>) -> IoResult<()>
where
    D: DataDictionary,
{
    DumpOptions::new().dump_object(obj)
}

/// Dump the contents of a DICOM object to the given writer.
pub fn dump_object_to<D>(to: impl Write, obj: &InMemDicomObject<D>) -> IoResult<()>
where
    D: DataDictionary,
{
    DumpOptions::new().dump_object_to(to, obj)
}

#[inline]
fn whitespace_or_null(c: char) -> bool {
    c.is_whitespace() || c == '\0'
}

fn meta_dump<W>(to: &mut W, meta: &FileMetaTable, _width: u32) -> IoResult<()>
where
    W: ?Sized + Write,
{
    writeln!(
        to,
        "{}: {}",
        "Media Storage SOP Class UID".bold(),
        meta.media_storage_sop_class_uid.trim_end_matches(whitespace_or_null),
    )?;
    writeln!(
        to,
        "{}: {}",
        "Media Storage SOP Instance UID".bold(),
        meta.media_storage_sop_instance_uid.trim_end_matches(whitespace_or_null),
    )?;
    if let Some(ts) = TransferSyntaxRegistry.get(&meta.transfer_syntax) {
        writeln!(to, "{}: {} ({})", "Transfer Syntax".bold(), ts.uid(), ts.name())?;
    } else {
        writeln!(
            to,
            "{}: {} («UNKNOWN»)",
            "Transfer Syntax".bold(),
            meta.transfer_syntax.trim_end_matches(whitespace_or_null)
        )?;
    }
    writeln!(
        to,
        "{}: {}",
        "Implementation Class UID".bold(),
        meta.implementation_class_uid.trim_end_matches(whitespace_or_null),
    )?;
    if let Some(v) = meta.implementation_version_name.as_ref() {
        writeln!(to, "{}: {}", "Implementation version name".bold(), v.trim_end())?;
    }
    if let Some(v) = meta.source_application_entity_title.as_ref() {
        writeln!(to, "{}: {}", "Source Application Entity Title".bold(), v.trim_end())?;
    }
    writeln!(to)?;
    Ok(())
}

fn dump<W, D>(
    to: &mut W,
    obj: &InMemDicomObject<D>,
    width: u32,
    depth: u32,
    no_text_limit: bool,
    no_limit: bool,
) -> IoResult<()>
where
    W: ?Sized + Write,
    D: DataDictionary,
{
    for elem in obj.iter() {
        dump_element(&mut *to, elem, width, depth, no_text_limit, no_limit)?;
    }
    Ok(())
}

pub fn dump_element<W, D>(
    to: &mut W,
    elem: &InMemElement<D>,
    width: u32,
    depth: u32,
    no_text_limit: bool,
    no_limit: bool,
) -> IoResult<()>
where
    W: ?Sized + Write,
    D: DataDictionary,
{
    let indent = vec![b' '; (depth * 2) as usize];
    let tag_alias = StandardDataDictionary
        .by_tag(elem.tag())
        .map(|e| e.keyword)
        .unwrap_or("«Unknown Attribute»");
    to.write_all(&indent)?;

    match elem.value() {
        DicomValue::Sequence(items) => {
            writeln!(
                to,
                "{} {:28} SQ ({} Item{})",
                DumpValue::TagNum(elem.tag()),
                DumpValue::Alias(tag_alias),
                items.len(),
                if items.len() == 1 { "" } else { "s" },
            )?;
            for item in items {
                dump_item(&mut *to, item, width, depth + 2, no_text_limit, no_limit)?;
            }
            to.write_all(&indent)?;
            writeln!(to, "{} {}", DumpValue::TagNum("(FFFE,E0DD)"), DumpValue::Alias("SequenceDelimitationItem"))?;
        }
        DicomValue::PixelSequence(seq) => {
            let vr = elem.vr();
            let num_items = 1 + seq.fragments().len();
            writeln!(
                to,
                "{} {:28} {} (PixelSequence, {} Item{})",
                DumpValue::TagNum(elem.tag()),
                "PixelData".bold(),
                vr,
                num_items,
                if num_items == 1 { "" } else { "s" },
            )?;
            let byte_len = seq.offset_table().len() * 4;
            writeln!(
                to,
                "  {} offset table ({:>3} bytes, 1 Item)",
                DumpValue::TagNum("(FFFE,E000)"),
                byte_len,
            )?;
            for fragment in seq.fragments() {
                writeln!(
                    to,
                    "  {} pi ({:>3} bytes, 1 Item)",
                    DumpValue::TagNum("(FFFE,E000)"),
                    fragment.len(),
                )?;
            }
        }
        DicomValue::Primitive(value) => {
            let vr = elem.vr();
            let vm = value.multiplicity();
            let byte_len = elem.header().len.0;
            writeln!(
                to,
                "{} {:28} {} ({},{:>3} bytes): {}",
                DumpValue::TagNum(elem.tag()),
                DumpValue::Alias(tag_alias),
                vr,
                vm,
                byte_len,
                value_summary(
                    value,
                    vr,
                    width.saturating_sub(63 + depth * 2),
                    no_text_limit,
                    no_limit,
                ),
            )?;
        }
    }

    Ok(())
}

fn dump_item<W, D>(
    to: &mut W,
    item: &InMemDicomObject<D>,
    width: u32,
    depth: u32,
    no_text_limit: bool,
    no_limit: bool,
) -> IoResult<()>
where
    W: ?Sized + Write,
    D: DataDictionary,
{
    let indent: String = "  ".repeat(depth as usize);
    writeln!(to, "{}{} na {}", indent, DumpValue::TagNum("(FFFE,E000)"), DumpValue::Alias("Item"))?;
    dump(to, item, width, depth + 1, no_text_limit, no_limit)?;
    writeln!(to, "{}{} {}", indent, DumpValue::TagNum("(FFFE,E00D)"), DumpValue::Alias("ItemDelimitationItem"))?;
    Ok(())
}

fn value_summary(
    value: &PrimitiveValue,
    vr: VR,
    max_characters: u32,
    no_text_limit: bool,
    no_limit: bool,
) -> DumpValue<String> {
    use PrimitiveValue::*;

    let is_text_vr = matches!(
        vr,
        VR::CS | VR::AE | VR::DA | VR::DS | VR::DT | VR::IS | VR::LO | VR::LT | VR::PN | VR::TM | VR::UC | VR::UI | VR::UR
    );
    let max_characters = match (no_limit, no_text_limit && is_text_vr) {
        (true, _) => None,
        (false, true) => None,
        (false, false) => Some(max_characters),
    };

    match value {
        F32(values) => DumpValue::Num(format_value_list(values.iter(), max_characters, false)),
        F64(values) => DumpValue::Num(format_value_list(values.iter(), max_characters, false)),
        I32(values) => DumpValue::Num(format_value_list(values.iter(), max_characters, false)),
        I64(values) => DumpValue::Num(format_value_list(values.iter(), max_characters, false)),
        U32(values) => DumpValue::Num(format_value_list(values.iter(), max_characters, false)),
        U64(values) => DumpValue::Num(format_value_list(values.iter(), max_characters, false)),
        I16(values) => DumpValue::Num(format_value_list(values.iter(), max_characters, false)),
        U16(values) if vr == VR::OW => DumpValue::Num(format_value_list(
            values.iter().map(|n| format!("{:02X}", n)),
            max_characters,
            false,
        )),
        U16(values) => DumpValue::Num(format_value_list(values.iter(), max_characters, false)),
        U8(values) if vr == VR::OB || vr == VR::UN => DumpValue::Num(format_value_list(
            values.iter().map(|n| format!("{:02X}", n)),
            max_characters,
            false,
        )),
        U8(values) => DumpValue::Num(format_value_list(values.iter(), max_characters, false)),
        Tags(values) => DumpValue::Str(format_value_list(values.iter(), max_characters, false)),
        Strs(values) => DumpValue::Str(format_value_list(
            values.iter().map(|s| s.trim_end_matches(whitespace_or_null)),
            max_characters,
            true,
        )),
        Date(values) => DumpValue::DateTime(format_value_list(values.iter(), max_characters, true)),
        Time(values) => DumpValue::DateTime(format_value_list(values.iter(), max_characters, true)),
        DateTime(values) => DumpValue::DateTime(format_value_list(values.iter(), max_characters, true)),
        Empty => DumpValue::Nothing,
    }
}

fn format_value_list<I>(values: I, max_characters: Option<u32>, quoted: bool) -> String
where
    I: ExactSizeIterator,
    I::Item: std::fmt::Display,
{
    let len = values.len();
    let mut acc_size = 0;
    let mut pieces = String::new();
    if len > 1 {
        pieces.push('[');
    }
    for piece in values {
        let mut piece = piece.to_string();
        piece = piece.replace(|c: char| c.is_control(), "\u{fffd}");
        if acc_size > 0 {
            pieces.push_str(", ");
        }
        if quoted {
            piece = piece.replace('\"', "\\\"");
            pieces.push('"');
        }
        acc_size += piece.len();
        pieces.push_str(&piece);
        if quoted {
            pieces.push('"');
        }
        if max_characters.filter(|max| (*max as usize) < acc_size).is_some() {
            break;
        }
    }
    if len > 1 {
        pieces.push(']');
    }
    if let Some(max_characters) = max_characters {
        cut_str(&pieces, max_characters).into_owned()
    } else {
        pieces
    }
}

fn cut_str(s: &str, max_characters: u32) -> Cow<str> {
    let max = (max_characters.saturating_sub(3)) as usize;
    let len = s.chars().count();
    if len > max {
        s.chars().take(max).chain("...".chars()).collect::<String>().into()
    } else {
        s.into()
    }
}

fn determine_width(user_width: Option<u32>) -> u32 {
    user_width
        .or_else(|| term_size::dimensions().map(|(w, _)| w as u32))
        .unwrap_or(120)
}

#[cfg(test)]
mod tests {
    use dicom_core::{DataElement, PrimitiveValue, VR};
    use dicom_dictionary_std::tags;
    use dicom_object::InMemDicomObject;

    use super::whitespace_or_null;
    use crate::{ColorMode, DumpOptions};

    #[test]
    fn trims_all_whitespace() {
        assert_eq!("   ".trim_end_matches(whitespace_or_null), "");
        assert_eq!("\0".trim_end_matches(whitespace_or_null), "");
        assert_eq!("1.4.5.6\0".trim_end_matches(whitespace_or_null), "1.4.5.6");
        assert_eq!("AETITLE ".trim_end_matches(whitespace_or_null), "AETITLE");
    }

    #[test]
    fn dump_object_to_covers_properties() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.888.123"),
        ));

        let mut out = Vec::new();
        DumpOptions::new()
            .color_mode(ColorMode::Never)
            .dump_object_to(&mut out, &obj)
            .unwrap();

        let text = std::str::from_utf8(&out).expect("output is not valid UTF-8");
        let parts: Vec<&str> = text.split(' ').filter(|p| !p.is_empty()).collect();
        assert_eq!(&parts[..3], &["(0008,0018)", "SOPInstanceUID", "UI"]);
    }
}
