//! fontsleuth-core: The patient detective of webpage typography
//!
//! Give it what a browser saw on a page and it tells you which fonts were
//! really on stage, which files played them, and who wrote their papers.
//!
//! ## Three Acts of Font Sleuthing
//!
//! **Extraction**: Reading a font's passport
//! - Recognises TrueType, CFF OpenType, Mac TrueType, Type 1 wrappers and WOFF2
//! - Unpacks WOFF2 parcels before looking inside
//! - Copies out family, foundry, license, version and creation date
//! - Reads the `fsType` flags to learn what the font may be used for
//!
//! **Matching**: Introducing CSS families to the files that play them
//! - Pools every `@font-face` rule for a family before comparing URLs
//! - Falls back on metadata names and Google Fonts URL slugs
//! - Keeps a forgiving last resort for names that only nearly agree
//!
//! **Discovery**: Finding the rest of the house
//! - Reads sitemaps, follows in-page links and knocks on well-known doors
//! - Deduplicates everything through one URL normalizer
//! - Ranks what it found and stays within the page budget
//!
//! ## A Sample Case
//!
//! ```rust,no_run
//! use fontsleuth_core::fonts::{ActiveFont, DownloadedFontFile};
//! use fontsleuth_core::matching::get_correct_font_family;
//! use fontsleuth_core::metadata::extract_metadata;
//!
//! let bytes = std::fs::read("NanumGothic-Regular.ttf")?;
//! let metadata = extract_metadata(&bytes)?;
//!
//! let downloaded = vec![DownloadedFontFile::new(
//!     "NanumGothic-Regular.ttf",
//!     "https://fonts.gstatic.com/s/nanumgothic/v17/NanumGothic-Regular.ttf",
//! )
//! .with_metadata(metadata)];
//!
//! let active = ActiveFont::new("\"Nanum Gothic\"", 42);
//! println!("{}", get_correct_font_family(&active, &downloaded, &[]));
//! #
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## House Rules
//!
//! - Matching and extraction are pure and happy on any thread pool
//! - A font that cannot be read fails alone; its neighbours carry on
//! - Discovery never gives up on the page you asked about
//!
//! ---
//!
//! Crafted with care at FontLab https://www.fontlab.com/

pub mod discovery;
pub mod fontfiles;
pub mod fonts;
pub mod http;
pub mod matching;
pub mod metadata;
pub mod names;
pub mod output;
pub mod report;
pub mod urlnorm;
pub mod woff2;

pub use discovery::{discover_pages, DiscoveredPage, DiscoveryOptions, PageSource};
pub use fonts::{ActiveFont, DownloadedFontFile, FontFaceDeclaration};
pub use matching::{find_all_matching_font_files, find_matching_font_file, get_correct_font_family};
pub use metadata::{extract_metadata, ExtractError, ExtractErrorKind, FontMetadata};
pub use urlnorm::normalize_url;
