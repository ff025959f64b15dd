//! In-memory book fixtures shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use lopdf::{dictionary, Object, ObjectId, Stream};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zip `files` into an EPUB container with a stored `mimetype` entry first.
pub fn epub(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    for (name, data) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Rewrite every central-directory record so it claims a ~4 GiB
/// uncompressed size. The entry data itself is left alone.
pub fn inflate_declared_sizes(mut zip: Vec<u8>) -> Vec<u8> {
    let mut i = 0;
    while i + 28 <= zip.len() {
        if zip[i..i + 4] == *b"PK\x01\x02" {
            zip[i + 24..i + 28].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
            i += 46;
        } else {
            i += 1;
        }
    }
    zip
}

pub const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// XHTML chapter document with a heading and `paragraphs`.
pub fn xhtml(heading: &str, paragraphs: &[&str]) -> String {
    let body: String = paragraphs.iter().map(|p| format!("<p>{p}</p>\n")).collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head><title>{heading}</title></head>\n<body>\n<h1>{heading}</h1>\n{body}</body>\n</html>"
    )
}

/// A three-chapter EPUB 3 book with a cover image and a nav document. The
/// spine also holds a title page, which is front matter.
pub fn sample_epub() -> Vec<u8> {
    let opf = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="id">urn:uuid:1</dc:identifier>
    <dc:title>The Voyage Out</dc:title>
    <dc:creator>Virginia Woolf</dc:creator>
    <dc:language>en</dc:language>
    <dc:description>A first novel.</dc:description>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="titlepage" href="text/titlepage.xhtml" media-type="application/xhtml+xml"/>
    <item id="c1" href="text/chapter-1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="text/chapter-2.xhtml" media-type="application/xhtml+xml"/>
    <item id="c3" href="text/chapter-3.xhtml" media-type="application/xhtml+xml"/>
    <item id="cover" href="images/front.png" media-type="image/png" properties="cover-image"/>
    <item id="fig" href="images/map.png" media-type="image/png"/>
  </manifest>
  <spine>
    <itemref idref="titlepage"/>
    <itemref idref="c1"/>
    <itemref idref="c2"/>
    <itemref idref="c3"/>
  </spine>
</package>"#;
    let nav = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops"><body>
<nav epub:type="toc"><ol>
  <li><a href="text/chapter-1.xhtml">Chapter One</a></li>
  <li><a href="text/chapter-2.xhtml">Chapter Two</a></li>
  <li><a href="text/chapter-3.xhtml">Chapter Three</a></li>
</ol></nav></body></html>"#;
    let title_page = xhtml(
        "The Voyage Out",
        &["By Virginia Woolf, published in London by Duckworth and Company in the year 1915."],
    );
    let one = xhtml(
        "Chapter One",
        &[
            "As the streets that lead from the Strand to the Embankment are very narrow, it is better not to walk down them arm-in-arm.",
            r#"<img src="../images/map.png" alt="Map"/>"#,
        ],
    );
    let two = xhtml(
        "Chapter Two",
        &["Uncomfortable as the night, with its rocking movement, and salt smells, may have been, it was certainly not pleasant."],
    );
    let three = xhtml("Chapter Three", &["Too short."]);
    epub(&[
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/nav.xhtml", nav.as_bytes()),
        ("OEBPS/text/titlepage.xhtml", title_page.as_bytes()),
        ("OEBPS/text/chapter-1.xhtml", one.as_bytes()),
        ("OEBPS/text/chapter-2.xhtml", two.as_bytes()),
        ("OEBPS/text/chapter-3.xhtml", three.as_bytes()),
        ("OEBPS/images/front.png", PNG_SIGNATURE),
        ("OEBPS/images/map.png", PNG_SIGNATURE),
    ])
}

pub const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";

/// A FictionBook with two chapters, a notes body and a cover binary.
pub fn sample_fb2() -> String {
    r##"<?xml version="1.0" encoding="utf-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0" xmlns:l="http://www.w3.org/1999/xlink">
  <description>
    <title-info>
      <author><first-name>Anton</first-name><last-name>Chekhov</last-name></author>
      <book-title>The Steppe</book-title>
      <annotation><p>The story of a journey.</p></annotation>
      <lang>en</lang>
      <coverpage><image l:href="#cover.jpg"/></coverpage>
    </title-info>
  </description>
  <body>
    <section>
      <title><p>I</p></title>
      <p>Early one morning in July a shabby covered chaise drove out of the town.</p>
    </section>
    <section>
      <title><p>II</p></title>
      <p>Meanwhile a wide boundless plain encircled by a chain of low hills lay stretched before the travellers.</p>
    </section>
  </body>
  <body name="notes">
    <section id="n1"><p>A note that is not a chapter.</p></section>
  </body>
  <binary id="cover.jpg" content-type="image/jpeg">/9j/4AAQSkZJRgABAQ==</binary>
</FictionBook>"##
        .to_string()
}

/// Builder for small PDFs whose pages hold lines of Helvetica text.
pub struct PdfBuilder {
    doc: lopdf::Document,
    font_id: ObjectId,
    pages: Vec<ObjectId>,
    outline: Vec<(String, usize)>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = lopdf::Document::with_version("1.5");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        Self {
            doc,
            font_id,
            pages: Vec::new(),
            outline: Vec::new(),
        }
    }

    /// A page of 12pt lines, 14pt apart, starting near the top.
    pub fn text_page(self, lines: &[&str]) -> Self {
        let sized: Vec<(f32, &str)> = lines.iter().map(|l| (12.0, *l)).collect();
        self.sized_text_page(&sized)
    }

    /// A page of lines with explicit font sizes.
    pub fn sized_text_page(mut self, lines: &[(f32, &str)]) -> Self {
        let mut content = String::new();
        let mut y = 720.0;
        for (size, line) in lines {
            content.push_str(&format!(
                "BT /F1 {size} Tf 72 {y} Td ({}) Tj ET\n",
                escape_pdf(line)
            ));
            y -= size * 1.2 + 2.0;
        }
        self.add_page(content.into_bytes(), None);
        self
    }

    /// A page with drawn lines and no text.
    pub fn vector_page(mut self) -> Self {
        self.add_page(b"0.5 w 72 72 m 540 720 l S 72 720 m 540 72 l S".to_vec(), None);
        self
    }

    /// A page holding an 8-bit RGB image above one line of text.
    pub fn image_page(mut self, width: u32, height: u32, pixels: Vec<u8>, text: &str) -> Self {
        let image_id = self.add_image(width, height, pixels);
        let content = format!(
            "q 200 0 0 200 100 500 cm /Im1 Do Q\nBT /F1 12 Tf 72 400 Td ({}) Tj ET\n",
            escape_pdf(text)
        );
        self.add_page(content.into_bytes(), Some(image_id));
        self
    }

    /// A page holding only a full-page RGB image, like a scan.
    pub fn scan_page(mut self, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        let image_id = self.add_image(width, height, pixels);
        self.add_page(b"q 612 0 0 792 0 0 cm /Im1 Do Q".to_vec(), Some(image_id));
        self
    }

    /// A page whose `/Contents` is not a content stream.
    pub fn broken_page(mut self) -> Self {
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
            "Contents" => Object::Integer(7),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(self.font_id) },
            },
        });
        self.pages.push(page_id);
        self
    }

    fn add_image(&mut self, width: u32, height: u32, pixels: Vec<u8>) -> ObjectId {
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
            },
            pixels,
        ))
    }

    /// Add a top-level bookmark pointing at the 1-based `page`.
    pub fn bookmark(mut self, title: &str, page: usize) -> Self {
        self.outline.push((title.to_string(), page));
        self
    }

    fn add_page(&mut self, content: Vec<u8>, image: Option<ObjectId>) {
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(self.font_id) },
        };
        if let Some(image_id) = image {
            resources.set("XObject", dictionary! { "Im1" => Object::Reference(image_id) });
        }
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
            "Contents" => Object::Reference(content_id),
            "Resources" => resources,
        });
        self.pages.push(page_id);
    }

    pub fn build(mut self) -> Vec<u8> {
        let kids: Vec<Object> = self.pages.iter().map(|id| Object::Reference(*id)).collect();
        let pages_id = self.doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.pages.len() as i64,
        });
        for &page_id in &self.pages {
            if let Ok(dict) = self.doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        };
        if !self.outline.is_empty() {
            let ids: Vec<ObjectId> = self
                .outline
                .iter()
                .map(|(title, page)| {
                    self.doc.add_object(dictionary! {
                        "Title" => Object::string_literal(title.as_str()),
                        "Dest" => vec![Object::Reference(self.pages[page - 1]), Object::Name(b"Fit".to_vec())],
                    })
                })
                .collect();
            for pair in ids.windows(2) {
                if let Ok(dict) = self.doc.get_object_mut(pair[0]).and_then(Object::as_dict_mut) {
                    dict.set("Next", Object::Reference(pair[1]));
                }
            }
            let outlines_id = self.doc.add_object(dictionary! {
                "Type" => "Outlines",
                "First" => Object::Reference(ids[0]),
                "Last" => Object::Reference(ids[ids.len() - 1]),
                "Count" => ids.len() as i64,
            });
            catalog.set("Outlines", Object::Reference(outlines_id));
        }
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", Object::Reference(catalog_id));
        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::string_literal("Generated Book"),
            "Author" => Object::string_literal("Ada Lovelace; Charles Babbage"),
        });
        self.doc.trailer.set("Info", Object::Reference(info_id));

        let mut buf = Vec::new();
        self.doc.save_to(&mut buf).unwrap();
        buf
    }
}

fn escape_pdf(text: &str) -> String {
    text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

/// Deterministic noise that compresses badly.
pub fn noise(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x1234_5678;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        })
        .collect()
}
