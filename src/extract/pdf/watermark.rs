//! Piracy-site watermark detection.

/// Lowercase phrases and domains stamped into pirated PDFs.
const DENYLIST: &[&str] = &[
    "z-library",
    "z-lib.org",
    "z-lib.io",
    "zlibrary",
    "1lib.",
    "b-ok.cc",
    "b-ok.org",
    "singlelogin.",
    "libgen",
    "library genesis",
    "gen.lib.rus.ec",
    "oceanofpdf",
    "ocean of pdf",
    "pdfdrive",
    "pdf drive",
    "dokumen.pub",
    "epdf.pub",
    "vdoc.pub",
    "ebin.pub",
    "pdfcoffee",
    "annas-archive",
    "anna's archive",
    "scribd.vdownloaders",
    "freebookspot",
    "ebook3000",
    "downloaded from ebookee",
    "téléchargé depuis",
    "descargado de",
    "scaricato da",
    "heruntergeladen von",
    "скачано с",
    "флибуста",
    "flibusta",
    "litres.ru",
    "下载自",
];

/// The first denylisted phrase `text` contains.
pub(crate) fn find_watermark(text: &str) -> Option<&'static str> {
    let text = text.to_lowercase();
    DENYLIST.iter().copied().find(|phrase| text.contains(phrase))
}
