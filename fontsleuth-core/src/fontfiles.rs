//! Local font file collection for offline inspection (made by FontLab https://www.fontlab.com/)

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use url::Url;
use walkdir::WalkDir;

use crate::fonts::DownloadedFontFile;
use crate::report::RawFontDownload;

/// Anything that can list font files to inspect.
pub trait FontFileSource {
    fn collect(&self) -> Result<Vec<PathBuf>>;
}

/// Recursive filesystem walker over the font formats the extractor reads.
#[derive(Debug, Clone)]
pub struct LocalFonts {
    roots: Vec<PathBuf>,
    follow_symlinks: bool,
}

impl LocalFonts {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let roots = roots.into_iter().map(Into::into).collect();
        Self {
            roots,
            follow_symlinks: false,
        }
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }
}

impl FontFileSource for LocalFonts {
    fn collect(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();

        for root in &self.roots {
            if !root.exists() {
                return Err(anyhow!("root path does not exist: {}", root.display()));
            }
            if root.is_file() {
                found.push(root.clone());
                continue;
            }

            for entry in WalkDir::new(root).follow_links(self.follow_symlinks) {
                let entry = entry?;
                if entry.file_type().is_file() && is_font(entry.path()) {
                    found.push(entry.path().to_path_buf());
                }
            }
        }

        found.sort();
        found.dedup();
        Ok(found)
    }
}

/// Read a file into the same shape the browser layer hands over for a download.
pub fn load_font_file(path: &Path) -> Result<RawFontDownload> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let url = Url::from_file_path(&absolute)
        .map(String::from)
        .unwrap_or_else(|_| absolute.display().to_string());

    let mut file = DownloadedFontFile::new(name, url)
        .with_format(format)
        .with_source("local");
    file.size = bytes.len() as u64;

    Ok(RawFontDownload { file, bytes })
}

fn is_font(path: &Path) -> bool {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return false,
    };

    matches!(ext.as_str(), "ttf" | "otf" | "woff2")
}
