//! The canonical and commonly negotiated transfer syntaxes, as static
//! [`TransferSyntax`] descriptors.

use dicom_encoding::TransferSyntax;

/// Implicit VR Little Endian: the default transfer syntax, always
/// supported, never negotiated away.
pub static IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::implicit_vr_little_endian(
    "1.2.840.10008.1.2",
    "Implicit VR Little Endian",
);

pub static EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::explicit_vr_little_endian(
    "1.2.840.10008.1.2.1",
    "Explicit VR Little Endian",
);

pub static EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::explicit_vr_big_endian(
    "1.2.840.10008.1.2.2",
    "Explicit VR Big Endian",
);

/// Deflated Explicit VR Little Endian. The dataset framing is identical to
/// plain Explicit VR Little Endian; only the byte stream following the file
/// meta group is additionally zlib-deflated. Deflate/inflate is applied by
/// the caller (the `object` crate) around this transfer syntax's ordinary
/// codec, so it is registered with the same underlying codec here.
pub static DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax =
    TransferSyntax::explicit_vr_little_endian(
        "1.2.840.10008.1.2.1.99",
        "Deflated Explicit VR Little Endian",
    );

/// JPEG Baseline (Process 1): dataset framing is Explicit VR Little Endian;
/// pixel data is encapsulated and carried as opaque fragments (no JPEG
/// decompression is performed by this workspace).
pub static JPEG_BASELINE: TransferSyntax =
    TransferSyntax::encapsulated("1.2.840.10008.1.2.4.50", "JPEG Baseline (Process 1)");

/// JPEG 2000 Image Compression: same encapsulated passthrough treatment as
/// [`JPEG_BASELINE`].
pub static JPEG_2000: TransferSyntax =
    TransferSyntax::encapsulated("1.2.840.10008.1.2.4.90", "JPEG 2000 Image Compression");

/// RLE Lossless: encapsulated passthrough, no decompression.
pub static RLE_LOSSLESS: TransferSyntax =
    TransferSyntax::encapsulated("1.2.840.10008.1.2.5", "RLE Lossless");

/// All transfer syntaxes known to this registry at compile time.
pub static BUILTIN: &[&TransferSyntax] = &[
    &IMPLICIT_VR_LITTLE_ENDIAN,
    &EXPLICIT_VR_LITTLE_ENDIAN,
    &EXPLICIT_VR_BIG_ENDIAN,
    &DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
    &JPEG_BASELINE,
    &JPEG_2000,
    &RLE_LOSSLESS,
];
