use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use docx_template_pdf::{Delimiters, Location, Output, Request, SofficeConverter, TemplateOptions};

#[derive(Parser)]
#[command(name = "docx-template-pdf", about = "Fill a DOCX template and convert it to PDF")]
struct Args {
    /// Input DOCX template (path or file: URL)
    #[arg(value_parser = Location::parse)]
    input: Location,
    /// Output file, or `-` for stdout (defaults to the input with a .pdf or
    /// .filled.docx extension)
    output: Option<String>,
    /// JSON file with the data to fill in
    #[arg(short, long)]
    data: Option<PathBuf>,
    /// JSON file with template options
    #[arg(long)]
    options: Option<PathBuf>,
    /// Tag delimiters, e.g. `--delimiters '{{' '}}'`
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    delimiters: Option<Vec<String>>,
    /// Drop the paragraphs holding loop tags when they stand alone
    #[arg(long)]
    paragraph_loop: bool,
    /// Turn newlines in values into line breaks
    #[arg(long)]
    linebreaks: bool,
    /// Resolve dotted tags through nested data
    #[arg(long)]
    path_parser: bool,
    /// Stop after filling the template and write the DOCX
    #[arg(long)]
    docx_only: bool,
    /// LibreOffice binary to use instead of searching install locations
    #[arg(long, env = "DOC2PDF_SOFFICE")]
    soffice: Option<PathBuf>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {e}", path.display()))
}

fn template_options(args: &Args) -> Result<TemplateOptions, String> {
    let mut opts: TemplateOptions = match &args.options {
        Some(path) => read_json(path)?,
        None => TemplateOptions::default(),
    };
    if let Some([start, end]) = args.delimiters.as_deref() {
        opts.delimiters = Delimiters {
            start: start.clone(),
            end: end.clone(),
        };
    }
    opts.paragraph_loop |= args.paragraph_loop;
    opts.linebreaks |= args.linebreaks;
    if args.path_parser {
        opts.parser = docx_template_pdf::Parser::Path;
    }
    Ok(opts)
}

fn run(args: Args) -> Result<(), String> {
    let data = match &args.data {
        Some(path) => read_json(path)?,
        None => serde_json::Value::Object(Default::default()),
    };
    let options = template_options(&args)?;

    let to_stdout = args.output.as_deref() == Some("-");
    let output = match args.output.as_deref() {
        Some("-") => None,
        Some(out) => Some(Location::parse(out).map_err(|e| e.to_string())?),
        None => {
            let input = args.input.to_path().map_err(|e| e.to_string())?;
            let ext = if args.docx_only { "filled.docx" } else { "pdf" };
            Some(Location::Path(input.with_extension(ext)))
        }
    };

    let mut request = Request::new(args.input.clone())
        .data(data)
        .options(options)
        .only_docx(args.docx_only);
    if !args.docx_only && let Some(out) = &output {
        request = request.output(out.clone());
    }

    let converter = match &args.soffice {
        Some(bin) => SofficeConverter::with_binary(bin),
        None => SofficeConverter::default(),
    };

    let result = docx_template_pdf::doc2pdf_with(&request, &converter).map_err(|e| e.to_string())?;
    let bytes = match result {
        Output::Written(location) => {
            log::info!("wrote {location}");
            return Ok(());
        }
        Output::Docx(bytes) | Output::Pdf(bytes) => bytes,
    };

    if to_stdout {
        std::io::stdout()
            .write_all(&bytes)
            .map_err(|e| format!("cannot write to stdout: {e}"))
    } else if let Some(out) = output {
        out.write(&bytes).map_err(|e| e.to_string())
    } else {
        Ok(())
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Ok(path) = args.input.to_path() {
        if !path.exists() {
            eprintln!("Error: file not found: {}", path.display());
            std::process::exit(1);
        }
        if !path.is_file() {
            eprintln!("Error: not a file: {}", path.display());
            std::process::exit(1);
        }
    }

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
