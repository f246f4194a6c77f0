mod convert;
mod docx;
mod error;
mod lexer;
mod location;
mod model;
mod options;
mod scope;
mod template;

pub use convert::{BinaryResolver, Candidates, Converter, PlatformResolver, SofficeConverter};
pub use docx::{fill_template, paragraph_texts};
pub use error::Error;
pub use location::Location;
pub use model::{Output, Request};
pub use options::{Delimiters, LoopPrefix, MissingValue, Parser, TemplateOptions};
pub use scope::{LiteralParser, PathParser, TagParser};

/// Converts a DOCX buffer to PDF with the LibreOffice install found on this
/// machine.
pub fn convert2pdf(docx: &[u8]) -> Result<Vec<u8>, Error> {
    SofficeConverter::default().convert(docx)
}

pub fn doc2pdf(request: &Request) -> Result<Output, Error> {
    doc2pdf_with(request, &SofficeConverter::default())
}

/// Reads the template, fills it, and unless only the DOCX was asked for,
/// converts it and writes the PDF to `request.output` when one is given.
pub fn doc2pdf_with(request: &Request, converter: &dyn Converter) -> Result<Output, Error> {
    let template = request.input.read()?;
    let docx = fill_template(&template, &request.data, &request.options)?;
    if request.only_docx {
        return Ok(Output::Docx(docx));
    }

    let pdf = converter.convert(&docx)?;
    match &request.output {
        Some(location) => {
            location.write(&pdf)?;
            Ok(Output::Written(location.clone()))
        }
        None => Ok(Output::Pdf(pdf)),
    }
}
