use std::io::{Cursor, Read, Write};

use serde_json::Value;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Error;
use crate::options::TemplateOptions;
use crate::template;

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DOCUMENT_PART: &str = "word/document.xml";

fn is_template_part(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    if file.contains('/') || !file.ends_with(".xml") {
        return false;
    }
    matches!(file, "document.xml" | "footnotes.xml" | "endnotes.xml")
        || file.starts_with("header")
        || file.starts_with("footer")
}

/// Fills every text-bearing part of a DOCX package and returns the new
/// package. Other entries are copied without recompression.
pub fn fill_template(docx: &[u8], data: &Value, opts: &TemplateOptions) -> Result<Vec<u8>, Error> {
    let mut archive = ZipArchive::new(Cursor::new(docx))?;
    if archive.index_for_name(DOCUMENT_PART).is_none() {
        return Err(Error::InvalidDocx(format!("missing {DOCUMENT_PART}")));
    }

    let empty = Value::Object(Default::default());
    let data = if data.is_null() { &empty } else { data };

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for i in 0..archive.len() {
        let name = archive.by_index_raw(i)?.name().to_string();
        if !is_template_part(&name) {
            writer.raw_copy_file(archive.by_index_raw(i)?)?;
            continue;
        }

        let mut xml = String::new();
        archive.by_index(i)?.read_to_string(&mut xml)?;
        let rendered = template::render_part(&xml, data, opts, &name)?;
        writer.start_file(name, options)?;
        writer.write_all(rendered.as_bytes())?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Plain text of each body paragraph, in document order.
pub fn paragraph_texts(docx: &[u8]) -> Result<Vec<String>, Error> {
    let mut archive = ZipArchive::new(Cursor::new(docx))?;
    let mut xml_content = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| Error::InvalidDocx(format!("missing {DOCUMENT_PART}")))?
        .read_to_string(&mut xml_content)?;

    let xml = roxmltree::Document::parse(&xml_content)?;
    let is_wml = |n: &roxmltree::Node, name: &str| {
        n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS)
    };

    Ok(xml
        .descendants()
        .filter(|n| is_wml(n, "p"))
        .map(|p| {
            p.descendants()
                .filter(|n| is_wml(n, "t") || is_wml(n, "br") || is_wml(n, "tab"))
                .map(|n| match n.tag_name().name() {
                    "br" => "\n",
                    "tab" => "\t",
                    _ => n.text().unwrap_or(""),
                })
                .collect()
        })
        .collect())
}
