//! Provenance metadata extraction from raw font binaries (made by FontLab https://www.fontlab.com/)

use std::borrow::Cow;

use chrono::{DateTime, SecondsFormat};
use read_fonts::tables::name::Name;
use read_fonts::{FontRef, ReadError, TableProvider};
use serde::{Deserialize, Serialize};
use skrifa::attribute::Style;
use skrifa::{FontRef as SkrifaFontRef, MetadataProvider};
use thiserror::Error;

use crate::names::{self, NameRecordEntry, NameTable};
use crate::woff2;

/// Seconds between 1904-01-01T00:00:00Z and the Unix epoch.
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

const TT_SIGNATURE: u32 = 0x0001_0000;
const OTTO_SIGNATURE: u32 = u32::from_be_bytes(*b"OTTO");
const TRUE_SIGNATURE: u32 = u32::from_be_bytes(*b"true");
const TYP1_SIGNATURE: u32 = u32::from_be_bytes(*b"typ1");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontFormat {
    TrueType,
    OpenTypeCff,
    MacTrueType,
    Type1,
    Woff2,
}

impl FontFormat {
    /// Classify a buffer by its leading big-endian signature.
    pub fn detect(data: &[u8]) -> Result<Self, ExtractError> {
        let Some(head) = data.get(..4) else {
            return Err(ExtractError::Format(format!(
                "buffer of {} bytes is too short for a font signature",
                data.len()
            )));
        };
        let signature = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
        match signature {
            TT_SIGNATURE => Ok(FontFormat::TrueType),
            OTTO_SIGNATURE => Ok(FontFormat::OpenTypeCff),
            TRUE_SIGNATURE => Ok(FontFormat::MacTrueType),
            TYP1_SIGNATURE => Ok(FontFormat::Type1),
            woff2::WOFF2_SIGNATURE => Ok(FontFormat::Woff2),
            other => Err(ExtractError::Format(format!(
                "unrecognized font signature {other:#010x}"
            ))),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FontFormat::TrueType => "truetype",
            FontFormat::OpenTypeCff => "opentype-cff",
            FontFormat::MacTrueType => "mac-truetype",
            FontFormat::Type1 => "type1",
            FontFormat::Woff2 => "woff2",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("unsupported font format: {0}")]
    Format(String),
    #[error("could not decompress font: {0}")]
    Decompression(String),
    #[error("invalid font data: {0}")]
    InvalidFontData(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractErrorKind {
    FormatError,
    DecompressionError,
    InvalidFontData,
}

impl ExtractError {
    pub fn kind(&self) -> ExtractErrorKind {
        match self {
            ExtractError::Format(_) => ExtractErrorKind::FormatError,
            ExtractError::Decompression(_) => ExtractErrorKind::DecompressionError,
            ExtractError::InvalidFontData(_) => ExtractErrorKind::InvalidFontData,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ExtractError::Format(m) | ExtractError::Decompression(m) | ExtractError::InvalidFontData(m) => m,
        }
    }
}

/// Serializable tagged failure handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractFailure {
    pub kind: ExtractErrorKind,
    pub message: String,
}

impl From<&ExtractError> for ExtractFailure {
    fn from(err: &ExtractError) -> Self {
        Self {
            kind: err.kind(),
            message: err.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingPermissions {
    pub installable: bool,
    pub editable: bool,
    pub preview_and_print: bool,
    pub restricted_license: bool,
}

impl EmbeddingPermissions {
    /// Decode the OS/2 `fsType` flags.
    pub fn from_fs_type(fs_type: u16) -> Self {
        Self {
            installable: fs_type & 0x0001 == 0,
            restricted_license: fs_type & 0x0002 != 0,
            preview_and_print: fs_type & 0x0004 == 0,
            editable: fs_type & 0x0008 == 0,
        }
    }
}

/// Provenance and licensing details recovered from a font. Absent fields are `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontMetadata {
    pub font_name: Option<String>,
    pub font_family: Option<String>,
    pub foundry: Option<String>,
    pub copyright: Option<String>,
    pub version: Option<String>,
    pub license_info: Option<String>,
    pub unique_identifier: Option<String>,
    pub creation_date: Option<String>,
    pub designer: Option<String>,
    pub embedding_permissions: Option<EmbeddingPermissions>,
    pub weight: Option<u16>,
    pub style: Option<String>,
    pub format: Option<FontFormat>,
}

/// Inputs for building metadata once the binary tables are decoded.
#[derive(Debug, Clone, Default)]
pub struct DecodedTables {
    pub names: NameTable,
    /// `head.created`, seconds since 1904-01-01.
    pub created: Option<i64>,
    /// `OS/2.fsType`.
    pub fs_type: Option<u16>,
}

/// Build a metadata record from decoded tables; each field is independently optional.
pub fn metadata_from_names(tables: &DecodedTables) -> FontMetadata {
    let names = &tables.names;
    FontMetadata {
        font_name: names.first_of(&[names::FAMILY, names::FULL_NAME]),
        font_family: names.first_of(&[names::TYPOGRAPHIC_FAMILY, names::FAMILY]),
        foundry: names.first_of(&[names::MANUFACTURER, names::VENDOR_URL]),
        copyright: names.get(names::COPYRIGHT),
        version: names.get(names::VERSION),
        license_info: names.first_of(&[names::LICENSE, names::LICENSE_URL]),
        unique_identifier: names.get(names::UNIQUE_ID),
        creation_date: tables.created.and_then(creation_date),
        designer: names.get(names::DESIGNER),
        embedding_permissions: tables.fs_type.map(EmbeddingPermissions::from_fs_type),
        weight: None,
        style: None,
        format: None,
    }
}

/// Render a `head.created` timestamp as ISO-8601 with millisecond precision.
///
/// Zero means the field was never set and yields `None`.
pub fn creation_date(secs_since_1904: i64) -> Option<String> {
    if secs_since_1904 == 0 {
        return None;
    }
    let millis = secs_since_1904
        .checked_sub(MAC_EPOCH_OFFSET)?
        .checked_mul(1000)?;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Detect, decompress, and parse a font buffer into its provenance metadata.
pub fn extract_metadata(data: &[u8]) -> Result<FontMetadata, ExtractError> {
    let format = FontFormat::detect(data)?;
    let sfnt: Cow<'_, [u8]> = match format {
        FontFormat::Woff2 => Cow::Owned(woff2::decompress(data)?),
        // typ1 sfnt wrappers share the TrueType table directory layout
        FontFormat::Type1 => {
            let mut owned = data.to_vec();
            owned[..4].copy_from_slice(&TT_SIGNATURE.to_be_bytes());
            Cow::Owned(owned)
        }
        _ => Cow::Borrowed(data),
    };

    let font = FontRef::new(&sfnt).map_err(invalid)?;
    check_table_bounds(&font, sfnt.len())?;

    let names = match optional(font.name())? {
        Some(table) => NameTable::Records(collect_name_records(&table)),
        None => NameTable::default(),
    };
    let created = optional(font.head())?.map(|head| head.created().as_secs());
    let fs_type = optional(font.os2())?.map(|os2| os2.fs_type());

    let mut metadata = metadata_from_names(&DecodedTables {
        names,
        created,
        fs_type,
    });
    metadata.format = Some(format);

    if fs_type.is_some() {
        let sfont = SkrifaFontRef::new(&sfnt).map_err(invalid)?;
        let attributes = sfont.attributes();
        metadata.weight = Some(attributes.weight.value().round().clamp(0.0, 1000.0) as u16);
        metadata.style = Some(style_label(attributes.style).to_string());
    }

    Ok(metadata)
}

fn style_label(style: Style) -> &'static str {
    match style {
        Style::Normal => "normal",
        Style::Italic => "italic",
        _ => "oblique",
    }
}

fn collect_name_records(table: &Name) -> Vec<NameRecordEntry> {
    let data = table.string_data();
    table
        .name_record()
        .iter()
        .filter_map(|record| {
            let text = record.string(data).ok()?.to_string();
            Some(NameRecordEntry {
                name_id: record.name_id().to_u16(),
                platform_id: record.platform_id(),
                language_id: record.language_id(),
                text,
            })
        })
        .collect()
}

/// Every directory entry must lie inside the buffer; truncated files fail here
/// instead of silently reporting their tables as missing.
fn check_table_bounds(font: &FontRef, len: usize) -> Result<(), ExtractError> {
    for record in font.table_directory.table_records() {
        let end = record.offset() as usize + record.length() as usize;
        if end > len {
            return Err(ExtractError::InvalidFontData(format!(
                "table '{}' spans {}..{} beyond {} bytes",
                record.tag(),
                record.offset(),
                end,
                len
            )));
        }
    }
    Ok(())
}

fn optional<T>(table: Result<T, ReadError>) -> Result<Option<T>, ExtractError> {
    match table {
        Ok(table) => Ok(Some(table)),
        Err(ReadError::TableIsMissing(_)) => Ok(None),
        Err(err) => Err(invalid(err)),
    }
}

fn invalid(err: ReadError) -> ExtractError {
    ExtractError::InvalidFontData(err.to_string())
}
