//! WOFF2 container unwrapping (made by FontLab https://www.fontlab.com/)
//!
//! Decompresses the brotli table stream and re-emits a plain sfnt. Tables that
//! carry a WOFF2 transform (`glyf`, `loca`, transformed `hmtx`) only matter
//! for outlines, so they are left out of the rebuilt font; every other table
//! is copied byte-for-byte.

use std::io::Read;

use brotli_decompressor::Decompressor;

use crate::metadata::ExtractError;

pub const WOFF2_SIGNATURE: u32 = 0x774F_4632;
const HEADER_LEN: usize = 48;
const COLLECTION_FLAVOR: u32 = 0x7474_6366;
const BROTLI_BUFFER: usize = 4096;
/// Largest table count whose sfnt search parameters fit in 16 bits.
const MAX_SFNT_TABLES: u16 = 4095;

/// Upper bound on the decompressed stream, guarding against brotli bombs.
const MAX_DECOMPRESSED: usize = 64 * 1024 * 1024;

const KNOWN_TAGS: [[u8; 4]; 63] = [
    *b"cmap", *b"head", *b"hhea", *b"hmtx", *b"maxp", *b"name", *b"OS/2", *b"post",
    *b"cvt ", *b"fpgm", *b"glyf", *b"loca", *b"prep", *b"CFF ", *b"VORG", *b"EBDT",
    *b"EBLC", *b"gasp", *b"hdmx", *b"kern", *b"LTSH", *b"PCLT", *b"VDMX", *b"vhea",
    *b"vmtx", *b"BASE", *b"GDEF", *b"GPOS", *b"GSUB", *b"EBSC", *b"JSTF", *b"MATH",
    *b"CBDT", *b"CBLC", *b"COLR", *b"CPAL", *b"SVG ", *b"sbix", *b"acnt", *b"avar",
    *b"bdat", *b"bloc", *b"bsln", *b"cvar", *b"fdsc", *b"feat", *b"fmtx", *b"fvar",
    *b"gvar", *b"hsty", *b"just", *b"lcar", *b"mort", *b"morx", *b"opbd", *b"prop",
    *b"trak", *b"Zapf", *b"Silf", *b"Glat", *b"Gloc", *b"Feat", *b"Sill",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableEntry {
    tag: [u8; 4],
    orig_length: u32,
    transform_length: Option<u32>,
}

impl TableEntry {
    fn stored_length(&self) -> usize {
        self.transform_length.unwrap_or(self.orig_length) as usize
    }

    fn is_transformed(&self) -> bool {
        self.transform_length.is_some()
    }
}

struct Header {
    flavor: u32,
    num_tables: u16,
    total_sfnt_size: u32,
    total_compressed_size: u32,
}

/// Unwrap a WOFF2 buffer into sfnt bytes.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, ExtractError> {
    let mut reader = ByteReader::new(data);
    let header = read_header(&mut reader)?;
    if header.flavor == COLLECTION_FLAVOR {
        return Err(decompression("WOFF2 font collections are not supported"));
    }

    let entries = read_directory(&mut reader, header.num_tables)?;
    let compressed = reader
        .take(header.total_compressed_size as usize)
        .ok_or_else(|| decompression("compressed stream runs past end of file"))?;

    let expected: usize = entries.iter().map(TableEntry::stored_length).sum();
    if expected > MAX_DECOMPRESSED {
        return Err(decompression(format!(
            "declared table data of {expected} bytes exceeds limit"
        )));
    }
    let stream = inflate(compressed, expected, header.total_sfnt_size)?;

    let mut tables = Vec::with_capacity(entries.len());
    let mut offset = 0usize;
    for entry in &entries {
        let len = entry.stored_length();
        let bytes = &stream[offset..offset + len];
        offset += len;
        if !entry.is_transformed() {
            tables.push((entry.tag, bytes));
        }
    }

    Ok(build_sfnt(header.flavor, &mut tables))
}

fn read_header(reader: &mut ByteReader) -> Result<Header, ExtractError> {
    let short = || decompression("truncated WOFF2 header");
    if reader.remaining() < HEADER_LEN {
        return Err(short());
    }
    let signature = reader.u32().ok_or_else(short)?;
    if signature != WOFF2_SIGNATURE {
        return Err(decompression(format!("bad WOFF2 signature {signature:#010x}")));
    }
    let flavor = reader.u32().ok_or_else(short)?;
    let _length = reader.u32().ok_or_else(short)?;
    let num_tables = reader.u16().ok_or_else(short)?;
    let _reserved = reader.u16().ok_or_else(short)?;
    let total_sfnt_size = reader.u32().ok_or_else(short)?;
    let total_compressed_size = reader.u32().ok_or_else(short)?;
    // version, metadata and private blocks are irrelevant for table recovery
    reader.take(HEADER_LEN - 24).ok_or_else(short)?;

    if num_tables == 0 {
        return Err(decompression("WOFF2 header declares no tables"));
    }
    if num_tables > MAX_SFNT_TABLES {
        return Err(decompression(format!(
            "WOFF2 header declares {num_tables} tables, more than an sfnt can index"
        )));
    }

    Ok(Header {
        flavor,
        num_tables,
        total_sfnt_size,
        total_compressed_size,
    })
}

fn read_directory(
    reader: &mut ByteReader,
    num_tables: u16,
) -> Result<Vec<TableEntry>, ExtractError> {
    let short = || decompression("truncated WOFF2 table directory");
    let mut entries = Vec::with_capacity(num_tables as usize);

    for _ in 0..num_tables {
        let flags = reader.u8().ok_or_else(short)?;
        let tag = if flags & 0x3F == 0x3F {
            reader.tag().ok_or_else(short)?
        } else {
            KNOWN_TAGS[(flags & 0x3F) as usize]
        };
        let version = flags >> 6;
        let orig_length = read_uint_base128(reader)?;

        // glyf/loca use version 0 for the transform and 3 for the null transform.
        let transformed = if &tag == b"glyf" || &tag == b"loca" {
            version == 0
        } else {
            version != 0
        };
        let transform_length = if transformed {
            Some(read_uint_base128(reader)?)
        } else {
            None
        };

        entries.push(TableEntry {
            tag,
            orig_length,
            transform_length,
        });
    }

    Ok(entries)
}

fn read_uint_base128(reader: &mut ByteReader) -> Result<u32, ExtractError> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = reader
            .u8()
            .ok_or_else(|| decompression("truncated UIntBase128"))?;
        if i == 0 && byte == 0x80 {
            return Err(decompression("UIntBase128 has a leading zero"));
        }
        if value & 0xFE00_0000 != 0 {
            return Err(decompression("UIntBase128 overflows 32 bits"));
        }
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(decompression("UIntBase128 longer than 5 bytes"))
}

fn inflate(compressed: &[u8], expected: usize, sfnt_hint: u32) -> Result<Vec<u8>, ExtractError> {
    let capacity = expected.max(sfnt_hint as usize).min(MAX_DECOMPRESSED);
    let mut out = Vec::with_capacity(capacity);
    Decompressor::new(compressed, BROTLI_BUFFER)
        .take(expected as u64)
        .read_to_end(&mut out)
        .map_err(|err| decompression(format!("brotli stream: {err}")))?;

    if out.len() < expected {
        return Err(decompression(format!(
            "brotli stream holds {} bytes, tables need {expected}",
            out.len()
        )));
    }
    Ok(out)
}

/// Assemble an sfnt from `(tag, bytes)` pairs, sorting the directory by tag.
pub(crate) fn build_sfnt(flavor: u32, tables: &mut [([u8; 4], &[u8])]) -> Vec<u8> {
    tables.sort_by(|a, b| a.0.cmp(&b.0));

    let num_tables = tables.len() as u16;
    let (search_range, entry_selector, range_shift) = search_params(num_tables);
    let dir_len = 12 + 16 * tables.len();
    let body_len: usize = tables.iter().map(|(_, data)| padded(data.len())).sum();

    let mut out = Vec::with_capacity(dir_len + body_len);
    out.extend_from_slice(&flavor.to_be_bytes());
    out.extend_from_slice(&num_tables.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());

    let mut offset = dir_len;
    for (tag, data) in tables.iter() {
        out.extend_from_slice(tag);
        out.extend_from_slice(&checksum(data).to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        offset += padded(data.len());
    }

    for (_, data) in tables.iter() {
        out.extend_from_slice(data);
        out.resize(out.len() + padded(data.len()) - data.len(), 0);
    }

    out
}

fn search_params(num_tables: u16) -> (u16, u16, u16) {
    if num_tables == 0 {
        return (0, 0, 0);
    }
    let entry_selector = 15 - num_tables.leading_zeros();
    let search_range = (1u32 << entry_selector) * 16;
    let range_shift = u32::from(num_tables) * 16 - search_range;
    let clamp = |value: u32| u16::try_from(value).unwrap_or(u16::MAX);
    (clamp(search_range), entry_selector as u16, clamp(range_shift))
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

fn decompression(message: impl Into<String>) -> ExtractError {
    ExtractError::Decompression(message.into())
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn tag(&mut self) -> Option<[u8; 4]> {
        self.take(4).map(|b| [b[0], b[1], b[2], b[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_base128_decodes_multi_byte_values() {
        let mut reader = ByteReader::new(&[0x3F]);
        assert_eq!(read_uint_base128(&mut reader).unwrap(), 63);

        let mut reader = ByteReader::new(&[0x81, 0x00]);
        assert_eq!(read_uint_base128(&mut reader).unwrap(), 128);
    }

    #[test]
    fn uint_base128_rejects_leading_zero_and_overlong() {
        let mut reader = ByteReader::new(&[0x80, 0x01]);
        assert!(read_uint_base128(&mut reader).is_err());

        let mut reader = ByteReader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]);
        assert!(read_uint_base128(&mut reader).is_err());
    }

    #[test]
    fn directory_marks_glyf_transform_by_default() {
        // glyf, version 0 (transformed): orig 10, transform 4; name, null transform: orig 6
        let bytes = [0x0A, 0x0A, 0x04, 0x05, 0x06];
        let mut reader = ByteReader::new(&bytes);
        let entries = read_directory(&mut reader, 2).expect("directory");

        assert_eq!(entries[0].tag, *b"glyf");
        assert_eq!(entries[0].transform_length, Some(4));
        assert_eq!(entries[1].tag, *b"name");
        assert_eq!(entries[1].transform_length, None);
        assert_eq!(entries[1].stored_length(), 6);
    }

    #[test]
    fn arbitrary_tags_follow_the_flags_byte() {
        let bytes = [0x3F, b'T', b'E', b'S', b'T', 0x02];
        let mut reader = ByteReader::new(&bytes);
        let entries = read_directory(&mut reader, 1).expect("directory");
        assert_eq!(entries[0].tag, *b"TEST");
        assert_eq!(entries[0].orig_length, 2);
    }

    #[test]
    fn rejects_bad_signature_as_decompression_error() {
        let mut data = vec![0u8; HEADER_LEN];
        data[..4].copy_from_slice(b"wOFF");
        assert!(matches!(
            decompress(&data),
            Err(ExtractError::Decompression(_))
        ));
    }

    #[test]
    fn garbage_stream_is_a_decompression_error() {
        let mut data = Vec::new();
        data.extend_from_slice(&WOFF2_SIGNATURE.to_be_bytes());
        data.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(&4u32.to_be_bytes());
        data.resize(HEADER_LEN, 0);
        data.extend_from_slice(&[0x05, 0x08]); // name, 8 bytes
        data.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);

        assert!(matches!(
            decompress(&data),
            Err(ExtractError::Decompression(_))
        ));
    }

    #[test]
    fn oversized_table_count_is_a_decompression_error() {
        let num_tables: u16 = 5000;
        let mut data = Vec::new();
        data.extend_from_slice(&WOFF2_SIGNATURE.to_be_bytes());
        data.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&num_tables.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.resize(HEADER_LEN, 0);
        for _ in 0..num_tables {
            data.extend_from_slice(&[0x05, 0x00]); // empty name table
        }

        assert!(matches!(
            decompress(&data),
            Err(ExtractError::Decompression(_))
        ));
    }

    #[test]
    fn search_params_stay_in_range_for_large_directories() {
        assert_eq!(search_params(MAX_SFNT_TABLES), (32768, 11, 32752));
        assert_eq!(search_params(u16::MAX), (u16::MAX, 15, u16::MAX));
    }

    #[test]
    fn built_sfnt_directory_is_sorted_and_padded() {
        let name = [1u8, 2, 3];
        let head = [9u8; 8];
        let mut tables: Vec<([u8; 4], &[u8])> = vec![(*b"name", &name), (*b"head", &head)];
        let sfnt = build_sfnt(0x0001_0000, &mut tables);

        assert_eq!(&sfnt[12..16], b"head");
        assert_eq!(&sfnt[28..32], b"name");
        assert_eq!(sfnt.len(), 12 + 32 + 8 + 4);
        assert_eq!(search_params(2), (32, 1, 0));
        assert_eq!(search_params(3), (32, 1, 16));
    }
}
