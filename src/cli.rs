use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use bookmill::{ExtractionOptions, ProcessingOptions};

/// Convert EPUB, PDF, FB2 and plain-text ebooks into processed chapters
#[derive(Parser, Debug)]
#[command(name = "bookmill", version, about)]
pub struct Cli {
    /// Path to the input book
    pub input: PathBuf,

    /// Output path (directory for folder mode, file for single-file mode).
    /// Defaults to a directory or file named after the book in the current directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write all chapters into one file instead of a directory of chapter files
    #[arg(short, long, default_value_t = false)]
    pub single: bool,

    /// Chapter file format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    /// Do not write images
    #[arg(long, default_value_t = false)]
    pub no_images: bool,

    /// Language tag used by the pipeline when the book declares none
    #[arg(long, default_value = "en")]
    pub language: String,

    /// Skip archaic spelling modernisation
    #[arg(long, default_value_t = false)]
    pub no_spelling: bool,

    /// Skip quote, dash and ellipsis typography
    #[arg(long, default_value_t = false)]
    pub no_typography: bool,

    /// Skip semantic markup of abbreviations and roman numerals
    #[arg(long, default_value_t = false)]
    pub no_semantics: bool,

    /// Skip soft hyphen insertion
    #[arg(long, default_value_t = false)]
    pub no_hyphenation: bool,

    /// Write a lint report (lint.json) next to the chapters
    #[arg(long, default_value_t = false)]
    pub lint: bool,

    /// Also write the full extraction result as result.json
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Maximum number of PDF pages to read
    #[arg(long, default_value_t = 2000)]
    pub max_pages: usize,

    /// Pages per chapter when a PDF has no detectable structure
    #[arg(long, default_value_t = 15)]
    pub pages_per_chapter: usize,

    /// Keep PDF chapters that carry piracy-site watermarks
    #[arg(long, default_value_t = false)]
    pub keep_watermarked: bool,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
        }
    }
}

impl Cli {
    pub fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions::default()
            .with_max_pdf_pages(self.max_pages)
            .with_pages_per_fallback_chapter(self.pages_per_chapter)
            .with_watermark_filter(!self.keep_watermarked)
    }

    pub fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions {
            spelling: !self.no_spelling,
            typography: !self.no_typography,
            semantics: !self.no_semantics,
            soft_hyphenation: !self.no_hyphenation,
        }
    }

    /// Log filter implied by `-v`, used when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
