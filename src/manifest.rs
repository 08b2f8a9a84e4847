//! Manifest scanning.
//!
//! A document manifest (`Document.xml`, `GuiDocument.xml`) names the files
//! that belong to the document through attributes literally called `file`,
//! on any element and at any depth:
//!
//! ```xml
//! <Document>
//!     <Property name="Shape"><Part file="PartShape.brp"/></Property>
//!     <Property name="Label"><String value="Box"/></Property>
//! </Document>
//! ```
//!
//! Scanning is attribute-driven only. Text content, tag names and nesting
//! are ignored; the document is still required to be well-formed.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// The attribute that carries a file reference.
const FILE_ATTRIBUTE: &[u8] = b"file";

/// Collect every file referenced by the manifest at `manifest`.
///
/// References are resolved against the manifest's directory and returned
/// in document order, duplicates included. The manifest itself is not part
/// of the result.
///
/// # Errors
///
/// - [`Error::NotFound`] if the manifest does not exist
/// - [`Error::Parse`] if it is not well-formed XML
pub fn scan_references(manifest: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(manifest).map_err(|e| Error::open(manifest, e))?;
    scan_references_from_reader(BufReader::new(file), manifest)
}

/// Same as [`scan_references`], reading the manifest content from `source`.
///
/// `manifest` is only used to resolve references and label errors; it is
/// never opened.
pub fn scan_references_from_reader<R: BufRead>(
    source: R,
    manifest: &Path,
) -> Result<Vec<PathBuf>> {
    let base_dir = manifest.parent().unwrap_or(Path::new(""));
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut references = Vec::new();

    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(manifest, reader.buffer_position(), e))?;

        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                if depth == 0 && seen_root {
                    return Err(malformed(manifest, "more than one root element"));
                }
                collect_file_attribute(element, &reader, manifest, base_dir, &mut references)?;

                if matches!(event, Event::Start(_)) {
                    depth += 1;
                } else if depth == 0 {
                    seen_root = true;
                }
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed(manifest, "unexpected closing tag"))?;
                if depth == 0 {
                    seen_root = true;
                }
            }
            Event::Text(ref text) if depth == 0 => {
                if !text.iter().all(u8::is_ascii_whitespace) {
                    return Err(malformed(manifest, "text outside the root element"));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if depth > 0 {
        return Err(malformed(
            manifest,
            &format!("{} element(s) left unclosed at end of document", depth),
        ));
    }
    if !seen_root {
        return Err(malformed(manifest, "no root element"));
    }

    debug!(
        manifest = %manifest.display(),
        references = references.len(),
        "scanned manifest"
    );
    Ok(references)
}

fn collect_file_attribute<R>(
    element: &BytesStart<'_>,
    reader: &Reader<R>,
    manifest: &Path,
    base_dir: &Path,
    references: &mut Vec<PathBuf>,
) -> Result<()> {
    for attr in element.attributes() {
        let attr =
            attr.map_err(|e| malformed(manifest, &format!("malformed attribute: {}", e)))?;

        if attr.key.as_ref() == FILE_ATTRIBUTE {
            let value = attr
                .decode_and_unescape_value(reader.decoder())
                .map_err(|e| xml_error(manifest, reader.buffer_position(), e.into()))?;
            references.push(base_dir.join(value.as_ref()));
        }
    }
    Ok(())
}

fn malformed(manifest: &Path, message: &str) -> Error {
    Error::Parse {
        path: manifest.to_path_buf(),
        message: message.to_string(),
    }
}

fn xml_error(manifest: &Path, position: u64, err: quick_xml::Error) -> Error {
    match err {
        // A failing read is not the document's fault
        quick_xml::Error::Io(e) => Error::io(manifest, io::Error::new(e.kind(), e.to_string())),
        other => malformed(manifest, &format!("{} (near byte {})", other, position)),
    }
}
