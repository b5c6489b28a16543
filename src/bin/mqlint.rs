//! Parse HTML files and print the nodes matched by a chain of selectors.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, bail};
use clap::{ArgGroup, Parser};
use log::{Level, LevelFilter, Log, Metadata, Record};
use markquery::{
    Document, Selection,
    dom::check_tree,
    html::{render, render_children},
};

#[derive(Parser, Debug)]
#[command(
    version,
    long_version = markquery::VERSION,
    name = "mqlint",
    about = "Parse HTML files and query them with CSS selectors.",
    arg_required_else_help = true
)]
#[command(group(ArgGroup::new("output").args(["text", "html", "outer", "attr", "count"])))]
struct CmdArgs {
    #[clap(required = true)]
    files: Vec<PathBuf>,
    /// decode the input with this encoding label unless it starts with a byte order mark
    #[arg(long, value_name = "LABEL")]
    encoding: Option<String>,
    /// narrow the selection with `find`; may be repeated
    #[arg(short, long = "select", value_name = "SELECTOR")]
    select: Vec<String>,
    /// print the text content of every selected node
    #[arg(long)]
    text: bool,
    /// print the markup of the children of every selected node
    #[arg(long)]
    html: bool,
    /// print the markup of every selected node (default)
    #[arg(long)]
    outer: bool,
    /// print the value of the attribute NAME of every selected node that has it
    #[arg(long, value_name = "NAME")]
    attr: Option<String>,
    /// print the number of selected nodes
    #[arg(long)]
    count: bool,
    /// verify the links of the parsed tree
    #[arg(long)]
    check: bool,
    /// print debug messages of the parser
    #[arg(short, long)]
    verbose: bool,
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug | Level::Trace => "debug",
        };
        eprintln!("{level}: {}", record.args());
    }

    fn flush(&self) {
        io::stderr().flush().ok();
    }
}

static LOGGER: StderrLogger = StderrLogger;

fn print_selection(
    args: &CmdArgs,
    selection: &Selection,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    if args.count {
        writeln!(out, "{}", selection.len())?;
        return Ok(());
    }
    for node in selection {
        if args.text {
            writeln!(out, "{}", node.text_content())?;
        } else if let Some(name) = args.attr.as_deref() {
            if let Some(value) = node.get_attribute(name) {
                writeln!(out, "{value}")?;
            }
        } else if args.html {
            render_children(out, node)?;
            writeln!(out)?;
        } else {
            render(out, node)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn process(args: &CmdArgs, path: &Path) -> anyhow::Result<()> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let doc = Document::parse_bytes(&bytes, args.encoding.as_deref())
        .with_context(|| format!("failed to parse {}", path.display()))?;
    log::debug!("{}: parsed {} bytes", path.display(), bytes.len());

    if args.check {
        if let Err(err) = check_tree(&doc.root()) {
            bail!("{}: inconsistent tree: {err}", path.display());
        }
    }

    let mut selection = doc.selection();
    for selector in &args.select {
        selection = selection
            .find(selector)
            .with_context(|| format!("bad selector {selector:?}"))?;
    }
    if args.select.is_empty() {
        // print the whole document rather than a wrapper around it
        selection = selection.contents();
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    print_selection(args, &selection, &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let args = CmdArgs::parse();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        });
    }

    let mut status = ExitCode::SUCCESS;
    for path in &args.files {
        if let Err(err) = process(&args, path) {
            eprintln!("mqlint: {err:#}");
            status = ExitCode::FAILURE;
        }
    }
    status
}
