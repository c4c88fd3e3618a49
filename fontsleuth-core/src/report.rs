//! Batch annotation and per-font report assembly (made by FontLab https://www.fontlab.com/)
//!
//! A failed extraction leaves that one file with `metadata: None` and a
//! recorded failure; the rest of the batch is unaffected.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::fonts::{ActiveFont, DownloadedFontFile, FontFaceDeclaration};
use crate::matching::{self, MatchStrategy};
use crate::metadata::{extract_metadata, ExtractFailure};

/// A downloaded file together with the bytes the browser layer captured.
#[derive(Debug, Clone)]
pub struct RawFontDownload {
    pub file: DownloadedFontFile,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadFailure {
    pub url: String,
    pub failure: ExtractFailure,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedDownloads {
    pub fonts: Vec<DownloadedFontFile>,
    pub failures: Vec<DownloadFailure>,
}

/// Run the extractor over every download in parallel, keeping input order.
pub fn annotate_downloads(downloads: Vec<RawFontDownload>) -> AnnotatedDownloads {
    let results: Vec<(DownloadedFontFile, Option<DownloadFailure>)> = downloads
        .into_par_iter()
        .map(|RawFontDownload { mut file, bytes }| {
            if file.size == 0 {
                file.size = bytes.len() as u64;
            }
            match extract_metadata(&bytes) {
                Ok(metadata) => {
                    file.metadata = Some(metadata);
                    (file, None)
                }
                Err(err) => {
                    tracing::warn!(url = %file.url, kind = ?err.kind(), "metadata extraction failed: {err}");
                    file.metadata = None;
                    let failure = DownloadFailure {
                        url: file.url.clone(),
                        failure: ExtractFailure::from(&err),
                    };
                    (file, Some(failure))
                }
            }
        })
        .collect();

    let mut annotated = AnnotatedDownloads::default();
    for (file, failure) in results {
        annotated.fonts.push(file);
        annotated.failures.extend(failure);
    }
    annotated
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    Matched,
    NoFontFile,
}

/// One active family with the files that back it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontReportEntry {
    /// Display family after metadata reconciliation.
    pub family: String,
    /// Family string as computed by the page.
    pub css_family: String,
    pub element_count: u32,
    pub strategy: Option<MatchStrategy>,
    pub files: Vec<DownloadedFontFile>,
    pub status: ReportStatus,
}

/// Reconcile every active family against the downloads; output order follows `active`.
pub fn build_font_report(
    active: &[ActiveFont],
    downloaded: &[DownloadedFontFile],
    declarations: &[FontFaceDeclaration],
) -> Vec<FontReportEntry> {
    active
        .par_iter()
        .map(|font| report_entry(font, downloaded, declarations))
        .collect()
}

fn report_entry(
    font: &ActiveFont,
    downloaded: &[DownloadedFontFile],
    declarations: &[FontFaceDeclaration],
) -> FontReportEntry {
    let strategy = matching::match_font(font, downloaded, declarations).map(|m| m.strategy);
    let files: Vec<DownloadedFontFile> =
        matching::find_all_matching_font_files(font, downloaded, declarations)
            .into_iter()
            .cloned()
            .collect();
    let status = if files.is_empty() {
        ReportStatus::NoFontFile
    } else {
        ReportStatus::Matched
    };

    FontReportEntry {
        family: matching::get_correct_font_family(font, downloaded, declarations),
        css_family: font.family.clone(),
        element_count: font.element_count,
        strategy,
        files,
        status,
    }
}
