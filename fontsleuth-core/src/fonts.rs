//! Page-side font records handed over by the browser collaborator (made by FontLab https://www.fontlab.com/)

use serde::{Deserialize, Serialize};

use crate::metadata::FontMetadata;

/// A CSS font family actually computed on rendered elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveFont {
    pub family: String,
    #[serde(default)]
    pub element_count: u32,
}

impl ActiveFont {
    pub fn new(family: impl Into<String>, element_count: u32) -> Self {
        Self {
            family: family.into(),
            element_count,
        }
    }
}

/// One `@font-face` rule as read from the page's stylesheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontFaceDeclaration {
    pub family: String,
    /// Raw CSS `src` value; may hold several `url(...)` tokens and format hints.
    #[serde(alias = "src")]
    pub source: String,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

impl FontFaceDeclaration {
    pub fn new(family: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            source: source.into(),
            weight: None,
            style: None,
        }
    }

    pub fn with_weight(mut self, weight: impl Into<String>) -> Self {
        self.weight = Some(weight.into());
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }
}

/// A font binary the page downloaded, optionally annotated with extracted metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedFontFile {
    pub name: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
    /// Where the file came from, e.g. `"Google Fonts"`.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub metadata: Option<FontMetadata>,
}

impl DownloadedFontFile {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: String::new(),
            size: 0,
            url: url.into(),
            source: String::new(),
            metadata: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_metadata(mut self, metadata: FontMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
