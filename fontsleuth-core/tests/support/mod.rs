//! Tiny synthetic fonts for integration tests.
#![allow(dead_code)]

pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Builder for a minimal sfnt carrying `head`, `OS/2` and `name`.
#[derive(Debug, Clone)]
pub struct TestFont {
    pub signature: u32,
    pub created: Option<i64>,
    pub fs_type: Option<u16>,
    pub weight_class: u16,
    pub fs_selection: u16,
    pub names: Vec<(u16, String)>,
}

impl Default for TestFont {
    fn default() -> Self {
        Self {
            signature: 0x0001_0000,
            created: Some(MAC_EPOCH_OFFSET),
            fs_type: Some(0),
            weight_class: 400,
            fs_selection: 0x0040,
            names: Vec::new(),
        }
    }
}

impl TestFont {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signature(mut self, signature: &[u8; 4]) -> Self {
        self.signature = u32::from_be_bytes(*signature);
        self
    }

    pub fn created(mut self, created: Option<i64>) -> Self {
        self.created = created;
        self
    }

    pub fn fs_type(mut self, fs_type: Option<u16>) -> Self {
        self.fs_type = fs_type;
        self
    }

    pub fn weight(mut self, weight_class: u16) -> Self {
        self.weight_class = weight_class;
        self
    }

    pub fn italic(mut self) -> Self {
        self.fs_selection = 0x0001;
        self
    }

    pub fn name(mut self, name_id: u16, text: &str) -> Self {
        self.names.push((name_id, text.to_string()));
        self
    }

    pub fn tables(&self) -> Vec<([u8; 4], Vec<u8>)> {
        let mut tables = Vec::new();
        if let Some(fs_type) = self.fs_type {
            tables.push((*b"OS/2", os2_table(self.weight_class, fs_type, self.fs_selection)));
        }
        if let Some(created) = self.created {
            tables.push((*b"head", head_table(created)));
        }
        if !self.names.is_empty() {
            tables.push((*b"name", name_table(&self.names)));
        }
        tables
    }

    pub fn build(&self) -> Vec<u8> {
        sfnt(self.signature, &self.tables())
    }

    /// WOFF2 wrapper around the same tables, stored without transforms.
    pub fn build_woff2(&self) -> Vec<u8> {
        woff2(self.signature, &self.tables())
    }
}

fn head_table(created: i64) -> Vec<u8> {
    let mut t = Vec::with_capacity(54);
    t.extend_from_slice(&1u16.to_be_bytes()); // majorVersion
    t.extend_from_slice(&0u16.to_be_bytes()); // minorVersion
    t.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // fontRevision
    t.extend_from_slice(&0u32.to_be_bytes()); // checksumAdjustment
    t.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes()); // magicNumber
    t.extend_from_slice(&0u16.to_be_bytes()); // flags
    t.extend_from_slice(&1000u16.to_be_bytes()); // unitsPerEm
    t.extend_from_slice(&created.to_be_bytes()); // created
    t.extend_from_slice(&created.to_be_bytes()); // modified
    t.extend_from_slice(&[0u8; 8]); // bbox
    t.extend_from_slice(&0u16.to_be_bytes()); // macStyle
    t.extend_from_slice(&8u16.to_be_bytes()); // lowestRecPPEM
    t.extend_from_slice(&2i16.to_be_bytes()); // fontDirectionHint
    t.extend_from_slice(&0i16.to_be_bytes()); // indexToLocFormat
    t.extend_from_slice(&0i16.to_be_bytes()); // glyphDataFormat
    assert_eq!(t.len(), 54);
    t
}

fn os2_table(weight_class: u16, fs_type: u16, fs_selection: u16) -> Vec<u8> {
    let mut t = vec![0u8; 96];
    t[0..2].copy_from_slice(&4u16.to_be_bytes());
    t[4..6].copy_from_slice(&weight_class.to_be_bytes());
    t[6..8].copy_from_slice(&5u16.to_be_bytes());
    t[8..10].copy_from_slice(&fs_type.to_be_bytes());
    t[62..64].copy_from_slice(&fs_selection.to_be_bytes());
    t
}

fn name_table(names: &[(u16, String)]) -> Vec<u8> {
    let mut records = Vec::new();
    let mut strings = Vec::new();
    let mut sorted: Vec<&(u16, String)> = names.iter().collect();
    sorted.sort_by_key(|(id, _)| *id);

    for (name_id, text) in sorted {
        let encoded: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
        for value in [3u16, 1, 0x0409, *name_id, encoded.len() as u16, strings.len() as u16] {
            records.extend_from_slice(&value.to_be_bytes());
        }
        strings.extend_from_slice(&encoded);
    }

    let count = names.len() as u16;
    let mut t = Vec::new();
    t.extend_from_slice(&0u16.to_be_bytes());
    t.extend_from_slice(&count.to_be_bytes());
    t.extend_from_slice(&(6 + 12 * count).to_be_bytes());
    t.extend_from_slice(&records);
    t.extend_from_slice(&strings);
    t
}

fn sfnt(signature: u32, tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut tables: Vec<&([u8; 4], Vec<u8>)> = tables.iter().collect();
    tables.sort_by_key(|(tag, _)| *tag);

    let num_tables = tables.len() as u16;
    let dir_len = 12 + 16 * tables.len();
    let mut out = Vec::new();
    out.extend_from_slice(&signature.to_be_bytes());
    out.extend_from_slice(&num_tables.to_be_bytes());
    out.extend_from_slice(&[0u8; 6]);

    let mut offset = dir_len;
    for (tag, data) in &tables {
        out.extend_from_slice(tag);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        offset += (data.len() + 3) & !3;
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
        out.resize((out.len() + 3) & !3, 0);
    }
    out
}

/// Brotli stream made of one uncompressed meta-block and an empty last one.
pub fn brotli_stored(data: &[u8]) -> Vec<u8> {
    assert!(!data.is_empty() && data.len() <= 65_536);
    let header = (((data.len() - 1) as u32) << 4) | (1 << 20);
    let mut out = header.to_le_bytes()[..3].to_vec();
    out.extend_from_slice(data);
    out.push(0x03);
    out
}

fn woff2(flavor: u32, tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut directory = Vec::new();
    let mut stream = Vec::new();
    for (tag, data) in tables {
        directory.push(0x3F);
        directory.extend_from_slice(tag);
        directory.extend_from_slice(&uint_base128(data.len() as u32));
        stream.extend_from_slice(data);
    }
    let compressed = brotli_stored(&stream);
    let sfnt_size = sfnt(flavor, tables).len() as u32;
    let total = 48 + directory.len() + compressed.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"wOF2");
    out.extend_from_slice(&flavor.to_be_bytes());
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&sfnt_size.to_be_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice(&directory);
    out.extend_from_slice(&compressed);
    out
}

fn uint_base128(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push(((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}
