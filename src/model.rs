use serde_json::Value;

use crate::location::Location;
use crate::options::TemplateOptions;

/// One fill-and-convert job. Which [`Output`] comes back depends on
/// `only_docx` and `output`.
#[derive(Clone, Debug)]
pub struct Request {
    pub input: Location,
    pub output: Option<Location>,
    pub data: Value,
    pub options: TemplateOptions,
    pub only_docx: bool,
}

impl Request {
    pub fn new(input: impl Into<Location>) -> Self {
        Request {
            input: input.into(),
            output: None,
            data: Value::Object(Default::default()),
            options: TemplateOptions::default(),
            only_docx: false,
        }
    }

    pub fn output(mut self, output: impl Into<Location>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn options(mut self, options: TemplateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn only_docx(mut self, only_docx: bool) -> Self {
        self.only_docx = only_docx;
        self
    }
}

#[derive(Debug)]
pub enum Output {
    /// The filled template, unconverted.
    Docx(Vec<u8>),
    Pdf(Vec<u8>),
    /// The PDF was written to this location.
    Written(Location),
}
