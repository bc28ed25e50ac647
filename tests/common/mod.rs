#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Bytes standing in for an image; nothing in the pipeline decodes them.
pub const COVER_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png\x00\x01\x02";
pub const FIGURE_BYTES: &[u8] = b"\xff\xd8\xff\xe0figure-bytes\xff\xd9";

/// Builds an EPUB archive on disk from documents and images under `OEBPS/`.
pub struct EpubBuilder {
    title: Option<String>,
    author: Option<String>,
    documents: Vec<(String, Vec<u8>)>,
    images: Vec<(String, Vec<u8>)>,
}

impl EpubBuilder {
    pub fn new() -> Self {
        Self {
            title: None,
            author: None,
            documents: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    /// `href` is relative to `OEBPS/`.
    pub fn document(mut self, href: &str, body: &str) -> Self {
        let xhtml = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>{href}</title></head>\
             <body>{body}</body></html>"
        );
        self.documents.push((href.to_string(), xhtml.into_bytes()));
        self
    }

    pub fn raw_document(mut self, href: &str, bytes: &[u8]) -> Self {
        self.documents.push((href.to_string(), bytes.to_vec()));
        self
    }

    pub fn image(mut self, href: &str, bytes: &[u8]) -> Self {
        self.images.push((href.to_string(), bytes.to_vec()));
        self
    }

    fn opf(&self) -> String {
        let mut metadata = String::new();
        if let Some(title) = &self.title {
            metadata.push_str(&format!("<dc:title>{title}</dc:title>"));
        }
        if let Some(author) = &self.author {
            metadata.push_str(&format!("<dc:creator>{author}</dc:creator>"));
        }
        metadata.push_str("<dc:identifier id=\"id\">urn:uuid:6f1c2a34-0d5e-4b7a-9c1f-3e8a2b7d4c10</dc:identifier>");
        metadata.push_str("<dc:language>en</dc:language>");

        let mut manifest =
            String::from("<item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>");
        let mut spine = String::new();
        for (i, (href, _)) in self.documents.iter().enumerate() {
            manifest.push_str(&format!(
                "<item id=\"doc{i}\" href=\"{href}\" media-type=\"application/xhtml+xml\"/>"
            ));
            spine.push_str(&format!("<itemref idref=\"doc{i}\"/>"));
        }
        for (i, (href, _)) in self.images.iter().enumerate() {
            let media_type = if href.ends_with(".png") { "image/png" } else { "image/jpeg" };
            let encoded = href.replace(' ', "%20");
            manifest.push_str(&format!(
                "<item id=\"img{i}\" href=\"{encoded}\" media-type=\"{media_type}\"/>"
            ));
        }

        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" unique-identifier=\"id\">\
             <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">{metadata}</metadata>\
             <manifest>{manifest}</manifest>\
             <spine>{spine}</spine>\
             </package>"
        )
    }

    fn nav(&self) -> String {
        let entries: String = self
            .documents
            .iter()
            .map(|(href, _)| format!("<li><a href=\"{href}\">{href}</a></li>"))
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\
             <head><title>Contents</title></head>\
             <body><nav epub:type=\"toc\"><ol>{entries}</ol></nav></body></html>"
        )
    }

    pub fn write(&self, path: &Path) -> PathBuf {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        zip.start_file("mimetype", options).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();

        zip.start_file("META-INF/container.xml", options).unwrap();
        zip.write_all(
            b"<?xml version=\"1.0\"?>\
              <container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\
              <rootfiles><rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/></rootfiles>\
              </container>",
        )
        .unwrap();

        zip.start_file("OEBPS/content.opf", options).unwrap();
        zip.write_all(self.opf().as_bytes()).unwrap();

        zip.start_file("OEBPS/nav.xhtml", options).unwrap();
        zip.write_all(self.nav().as_bytes()).unwrap();

        for (href, bytes) in self.documents.iter().chain(self.images.iter()) {
            zip.start_file(format!("OEBPS/{href}"), options).unwrap();
            zip.write_all(bytes).unwrap();
        }

        zip.finish().unwrap();
        path.to_path_buf()
    }
}

/// Two chapters, each showing an image kept in a sibling directory.
pub fn illustrated_book(dir: &Path) -> PathBuf {
    EpubBuilder::new()
        .title("The Illustrated Book")
        .author("A. Writer")
        .document(
            "text/ch1.xhtml",
            "<h1>Chapter One</h1><p>It was a dark night.</p><img src=\"../images/cover.png\" alt=\"cover\"/>",
        )
        .document(
            "text/ch2.xhtml",
            "<h1>Chapter Two</h1><p>The end.</p><p><img src='../images/figure%201.jpg'/></p>",
        )
        .image("images/cover.png", COVER_BYTES)
        .image("images/figure 1.jpg", FIGURE_BYTES)
        .write(&dir.join("book.epub"))
}
