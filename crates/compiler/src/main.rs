//! CDD Compiler CLI
//!
//! Drives the four analysis phases over one source file and dumps the
//! requested intermediate form: tokens (`-l`), AST (`-a`), semantic
//! summary (`-s`), or the IR program (`-i`, the default). Diagnostics
//! print to stderr; the exit code is 0 iff no error was recorded.

use clap::{CommandFactory, Parser as ClapParser};
use clap_complete::{Shell, generate};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use cddc::{CompilerConfig, parse_source, tokenize};

#[derive(ClapParser)]
#[command(name = "cddc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CDD compiler - lower a C subset to quadruple IR", long_about = None)]
struct Cli {
    /// Input source file
    input: Option<PathBuf>,

    /// Dump the token stream
    #[arg(short = 'l', long = "tokens")]
    tokens: bool,

    /// Dump the abstract syntax tree
    #[arg(short = 'a', long = "ast")]
    ast: bool,

    /// Dump the semantic summary (symbols and tags)
    #[arg(short = 's', long = "symbols")]
    symbols: bool,

    /// Dump the IR program (the default)
    #[arg(short = 'i', long = "ir")]
    ir: bool,

    /// Write the dump to a file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Skip the embedded runtime manifest; every called function must
    /// be declared in the source
    #[arg(long)]
    freestanding: bool,

    /// Additional runtime manifest(s) to register before analysis
    #[arg(long = "runtime-manifest", value_name = "PATH")]
    runtime_manifests: Vec<PathBuf>,

    /// Generate shell completion scripts and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "cddc", &mut io::stdout());
        return;
    }

    let Some(input) = &cli.input else {
        eprintln!("error: no input file");
        process::exit(2);
    };

    let source = match fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: failed to read '{}': {}", input.display(), e);
            process::exit(1);
        }
    };
    let file = input.to_string_lossy().into_owned();

    let config = {
        let mut config = CompilerConfig::new()
            .with_runtime_manifests(cli.runtime_manifests.iter().cloned());
        config.freestanding = cli.freestanding;
        config
    };

    let dump = if cli.tokens {
        run_tokens(&source, &file)
    } else if cli.ast {
        run_ast(&source, &file)
    } else if cli.symbols {
        run_symbols(&source, &file, &config)
    } else {
        run_ir(&source, &file, &config)
    };

    write_output(&dump, cli.output.as_deref());
}

/// Lex only, dumping one token per line.
fn run_tokens(source: &str, file: &str) -> String {
    let (tokens, diagnostics) = tokenize(source, file);
    report(diagnostics.iter());
    let mut out = String::new();
    for token in &tokens {
        out.push_str(&format!(
            "{}:{}: {:?} '{}'\n",
            token.location.line, token.location.column, token.kind, token.lexeme
        ));
    }
    if diagnostics.has_errors() {
        process::exit(1);
    }
    out
}

/// Lex and parse, dumping the tree.
fn run_ast(source: &str, file: &str) -> String {
    let (unit, diagnostics) = parse_source(source, file);
    report(diagnostics.iter());
    if diagnostics.has_errors() {
        process::exit(1);
    }
    unit.dump()
}

/// Run analysis and dump the symbol/tag summary.
fn run_symbols(source: &str, file: &str, config: &CompilerConfig) -> String {
    let (mut unit, diagnostics) = parse_source(source, file);
    report(diagnostics.iter());
    if diagnostics.has_errors() {
        process::exit(1);
    }
    match cddc::analyze_unit(&mut unit, config) {
        Ok(analysis) => {
            report(analysis.warnings.iter());
            analysis.symbols.summary()
        }
        Err(failure) => {
            report(failure.diagnostics.iter());
            process::exit(1);
        }
    }
}

/// The full pipeline, dumping the IR textual form.
fn run_ir(source: &str, file: &str, config: &CompilerConfig) -> String {
    match cddc::compile_to_ir_with_config(source, file, config) {
        Ok(unit) => {
            report(unit.warnings.iter());
            unit.ir.to_string()
        }
        Err(failure) => {
            report(failure.diagnostics.iter());
            process::exit(1);
        }
    }
}

fn report<'a>(diagnostics: impl Iterator<Item = &'a cddc::Diagnostic>) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic);
    }
}

fn write_output(dump: &str, output: Option<&Path>) {
    match output {
        Some(path) => {
            if let Err(e) = fs::write(path, dump) {
                eprintln!("error: failed to write '{}': {}", path.display(), e);
                process::exit(1);
            }
        }
        None => {
            let mut stdout = io::stdout();
            if stdout.write_all(dump.as_bytes()).is_err() {
                process::exit(1);
            }
        }
    }
}
