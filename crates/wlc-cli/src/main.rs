use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser as ClapParser;
use owo_colors::OwoColorize;

use wlc_interpreter::Interpreter;
use wlc_lexer::Lexer;
use wlc_parser::Parser;
use wlc_syntax::error::Diagnostic;

#[derive(ClapParser, Debug)]
#[command(name = "wlc")]
#[command(version)]
#[command(about = "While language compiler and reference interpreter", long_about = None)]
struct Args {
    /// While source files to compile and execute
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Print detailed information when an error occurs
    #[arg(short, long)]
    verbose: bool,

    /// Print the parsed program instead of executing it
    #[arg(long)]
    ast: bool,
}

/// Render a diagnostic as `filename:line:col: kind: message`, with the
/// offending source line and a caret marker underneath.
fn render_error(path: &Path, source: &str, err: &Diagnostic) {
    let (line, col) = err.span.line_col(source);
    eprintln!(
        "{}:{}:{}: {}",
        path.display(),
        line,
        col,
        err.to_string().red().bold()
    );
    if let Some(src_line) = source.lines().nth(line - 1) {
        eprintln!("  {}", src_line.bright_black());
        let mut marker = String::new();
        if col > 1 {
            marker.push_str(&" ".repeat(col - 1));
        }
        marker.push('^');
        eprintln!("  {}", marker.red());
    }
}

fn run_file(path: &Path, args: &Args) -> bool {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!(
                "{}: {}",
                "error".red().bold(),
                format!("failed to read {}: {}", path.display(), e).red()
            );
            return false;
        }
    };

    let result = compile_and_run(path, &source, args);
    match result {
        Ok(()) => true,
        Err(e) => {
            render_error(path, &source, &e);
            if args.verbose {
                eprintln!("  {:?}", e);
            }
            false
        }
    }
}

fn compile_and_run(path: &Path, source: &str, args: &Args) -> Result<(), Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut file = Parser::new(path.display().to_string(), tokens).parse_file()?;
    wlc_check::check(&mut file)?;

    if args.ast {
        print!("{}", file);
        return Ok(());
    }

    let mut interp = Interpreter::new(&file);
    interp.run()
}

fn main() -> ExitCode {
    let args = Args::parse();
    for path in &args.files {
        if !run_file(path, &args) {
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
