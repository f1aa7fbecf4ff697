//! The in-memory DICOM object: a tag-addressable tree of data elements,
//! together with the recursive dataset reader/writer that walks it.
//!
//! Sequence recursion lives here rather than in `dicom-encoding` so that the
//! low-level codec crate never needs to know about the tree shape of a
//! dataset -- it only ever encodes or decodes one header or one primitive
//! value at a time.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use dicom_core::dictionary::DataDictionary;
use dicom_core::header::{Header, Length, Tag, ITEM_DELIMITER_TAG, ITEM_TAG, SEQUENCE_DELIMITER_TAG};
use dicom_core::{DataElement, DicomValue, PrimitiveValue, VR};
use dicom_dictionary_std::StandardDataDictionary;
use dicom_encoding::decode::Decode;
use dicom_encoding::encode::Encode;
use dicom_encoding::TransferSyntax;

use crate::error::{ReadError, WriteError};

/// One data element in an [`InMemDicomObject`] tree: either a primitive
/// value or a nested sequence of sub-objects.
pub type InMemElement<D> = DataElement<InMemDicomObject<D>>;

/// A DICOM data set held entirely in memory, addressable by [`Tag`].
///
/// Generic over the dictionary implementation `D` used to resolve implicit
/// VR element headers and keyword-based accessors; [`StandardDataDictionary`]
/// is used unless a caller has its own private-tag-aware dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct InMemDicomObject<D = StandardDataDictionary> {
    entries: BTreeMap<Tag, InMemElement<D>>,
    dict: D,
}

impl Default for InMemDicomObject<StandardDataDictionary> {
    fn default() -> Self {
        InMemDicomObject::new_empty()
    }
}

impl InMemDicomObject<StandardDataDictionary> {
    /// Construct an empty object using the standard dictionary.
    pub fn new_empty() -> Self {
        InMemDicomObject {
            entries: BTreeMap::new(),
            dict: StandardDataDictionary,
        }
    }

    /// Decode a data set (no preamble, no file meta group) encoded under
    /// `ts` from `from`.
    pub fn read_dataset_with_ts<R: Read>(from: R, ts: &TransferSyntax) -> Result<Self, ReadError> {
        let mut obj = InMemDicomObject::new_empty();
        let decoder = ts.decoder();
        let mut reader = CountingReader::new(from);
        obj.read_entries(&mut reader, decoder.as_ref(), None)?;
        Ok(obj)
    }

    /// Encode this object's entries as a data set under `ts` to `to`.
    pub fn write_dataset_with_ts<W: Write>(&self, mut to: W, ts: &TransferSyntax) -> Result<(), WriteError> {
        let encoder = ts.encoder();
        self.write_entries(&mut to, encoder.as_ref())
    }
}

impl<D: DataDictionary + Clone> InMemDicomObject<D> {
    /// Construct an empty object using the given dictionary.
    pub fn new_empty_with_dict(dict: D) -> Self {
        InMemDicomObject {
            entries: BTreeMap::new(),
            dict,
        }
    }

    /// Insert or replace an element, keyed by its tag.
    pub fn put(&mut self, element: InMemElement<D>) -> Option<InMemElement<D>> {
        self.entries.insert(element.tag(), element)
    }

    /// Look up an element by tag.
    pub fn element(&self, tag: Tag) -> Result<&InMemElement<D>, crate::error::AccessError> {
        self.entries
            .get(&tag)
            .ok_or(crate::error::AccessError::NoSuchElement { tag })
    }

    /// Look up an element by its dictionary keyword.
    pub fn element_by_name(&self, name: &str) -> Result<&InMemElement<D>, crate::error::AccessError> {
        let tag = self
            .dict
            .by_keyword(name)
            .ok_or_else(|| crate::error::AccessError::NoSuchElementByName {
                name: name.to_string(),
            })?
            .tag;
        self.element(tag)
    }

    /// Iterate over every element in tag order.
    pub fn iter(&self) -> impl Iterator<Item = &InMemElement<D>> {
        self.entries.values()
    }

    /// The number of top-level elements held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn read_entries<R: Read>(
        &mut self,
        reader: &mut CountingReader<R>,
        decoder: &dyn Decode,
        length_limit: Option<u32>,
    ) -> Result<(), ReadError> {
        loop {
            if let Some(limit) = length_limit {
                if reader.consumed() >= limit as u64 {
                    break;
                }
            }
            let mut header_buf = [0u8; 12];
            let peek = reader.peek_header(decoder.is_explicit_vr())?;
            let Some(peek_len) = peek else { break };
            header_buf[..peek_len].copy_from_slice(&reader.peek_buf[..peek_len]);
            let (header, consumed) = decoder
                .decode_header(&header_buf[..peek_len], &self.dict)
                .map_err(|source| ReadError::DecodeHeader { source })?;
            reader.commit_peek(consumed);

            if header.tag == SEQUENCE_DELIMITER_TAG || header.tag == ITEM_DELIMITER_TAG {
                break;
            }

            if header.vr == VR::SQ {
                let items = self.read_sequence(reader, decoder, header.len)?;
                self.entries.insert(
                    header.tag,
                    DataElement::new_sequence(header.tag, items, header.len),
                );
                continue;
            }

            if header.len.is_undefined() {
                // undefined-length non-SQ element only legally occurs for
                // encapsulated pixel data; represented as an opaque empty
                // primitive here since pixel codecs are out of scope.
                self.entries.insert(
                    header.tag,
                    DataElement::new(header.tag, header.vr, PrimitiveValue::Empty),
                );
                continue;
            }

            let len = header.len.0 as usize;
            let mut value_buf = vec![0u8; len];
            reader.read_exact_counted(&mut value_buf)?;
            let value = decoder
                .decode_primitive(&value_buf, header.vr)
                .map_err(|source| ReadError::DecodeValue {
                    tag: header.tag,
                    source,
                })?;
            self.entries
                .insert(header.tag, DataElement::new(header.tag, header.vr, value));
        }
        Ok(())
    }

    fn read_sequence<R: Read>(
        &self,
        reader: &mut CountingReader<R>,
        decoder: &dyn Decode,
        len: Length,
    ) -> Result<Vec<InMemDicomObject<D>>, ReadError> {
        let mut items = Vec::new();
        let start = reader.consumed();
        loop {
            if let Some(total) = len.get() {
                if reader.consumed() - start >= total as u64 {
                    break;
                }
            }
            let mut tag_len_buf = [0u8; 8];
            match reader.read_exact_counted(&mut tag_len_buf) {
                Ok(()) => {}
                Err(_) if len.is_undefined() => break,
                Err(e) => return Err(e),
            }
            let (tag, item_len, _) = decoder
                .decode_item_header(&tag_len_buf)
                .map_err(|source| ReadError::DecodeHeader { source })?;
            if tag == SEQUENCE_DELIMITER_TAG {
                break;
            }
            if tag != ITEM_TAG {
                return Err(ReadError::PrematureEnd);
            }
            let mut item = InMemDicomObject::new_empty_with_dict(self.dict.clone());
            item.read_entries(reader, decoder, item_len.get())?;
            items.push(item);
        }
        Ok(items)
    }

    fn write_entries<W: Write>(&self, to: &mut W, encoder: &dyn Encode) -> Result<(), WriteError> {
        for element in self.entries.values() {
            match element.value() {
                DicomValue::Primitive(v) => {
                    let mut len = v.calculate_byte_len();
                    if len % 2 != 0 {
                        len += 1;
                    }
                    let header = dicom_core::header::DataElementHeader::new(
                        element.tag(),
                        element.vr(),
                        Length(len as u32),
                    );
                    encoder
                        .encode_header(to, &header)
                        .map_err(|source| WriteError::EncodeValue {
                            tag: element.tag(),
                            source,
                        })?;
                    encoder
                        .encode_primitive(to, element.vr(), v)
                        .map_err(|source| WriteError::EncodeValue {
                            tag: element.tag(),
                            source,
                        })?;
                }
                DicomValue::Sequence(items) => {
                    let header = dicom_core::header::DataElementHeader::new(
                        element.tag(),
                        VR::SQ,
                        Length::UNDEFINED,
                    );
                    encoder
                        .encode_header(to, &header)
                        .map_err(|source| WriteError::EncodeValue {
                            tag: element.tag(),
                            source,
                        })?;
                    for item in items {
                        encoder.encode_item_header(to, ITEM_TAG, Length::UNDEFINED)?;
                        item.write_entries(to, encoder)?;
                        encoder.encode_item_header(
                            to,
                            dicom_core::header::ITEM_DELIMITER_TAG,
                            Length(0),
                        )?;
                    }
                    encoder.encode_item_header(to, SEQUENCE_DELIMITER_TAG, Length(0))?;
                }
                DicomValue::PixelSequence(_) => {
                    // encapsulated pixel data is written as an opaque
                    // passthrough by the `pacs` archive layer, not here.
                }
            }
        }
        Ok(())
    }
}

/// A thin wrapper around a reader that tracks bytes consumed (for
/// undefined-length sequence/item bookkeeping) and supports peeking a
/// header's worth of bytes without consuming them on a decode failure.
struct CountingReader<R> {
    inner: R,
    consumed: u64,
    peek_buf: [u8; 12],
}

impl<R: Read> CountingReader<R> {
    fn new(inner: R) -> Self {
        CountingReader {
            inner,
            consumed: 0,
            peek_buf: [0u8; 12],
        }
    }

    fn consumed(&self) -> u64 {
        self.consumed
    }

    fn read_exact_counted(&mut self, buf: &mut [u8]) -> Result<(), ReadError> {
        self.inner.read_exact(buf)?;
        self.consumed += buf.len() as u64;
        Ok(())
    }

    /// Attempt to fill the peek buffer with enough bytes for one header (8
    /// for implicit VR, up to 12 for explicit VR with an extended length).
    /// Returns `None` at a clean end-of-stream.
    fn peek_header(&mut self, explicit_vr: bool) -> Result<Option<usize>, ReadError> {
        let minimal = 8;
        let mut got = 0;
        while got < minimal {
            match self.inner.read(&mut self.peek_buf[got..minimal]) {
                Ok(0) if got == 0 => return Ok(None),
                Ok(0) => return Err(ReadError::PrematureEnd),
                Ok(n) => got += n,
                Err(e) => return Err(e.into()),
            }
        }
        if explicit_vr {
            let vr_bytes = [self.peek_buf[4], self.peek_buf[5]];
            if let Ok(mnemonic) = std::str::from_utf8(&vr_bytes) {
                if let Ok(vr) = mnemonic.parse::<VR>() {
                    if vr.has_explicit_4byte_length() {
                        self.inner.read_exact(&mut self.peek_buf[8..12])?;
                        got = 12;
                    }
                }
            }
        }
        Ok(Some(got))
    }

    fn commit_peek(&mut self, consumed: usize) {
        self.consumed += consumed as u64;
    }
}
