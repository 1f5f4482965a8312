mod diagnostics;

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, CommandFactory, Parser as CliParser, Subcommand, ValueEnum};
use clap_complete::Shell;
use scopec_ast::Declaration;
use scopec_eval::Interpreter;
use scopec_lexer::{Lexer, Token};
use scopec_parser::Parser;
use scopec_resolve::{ResolvedProgram, Resolver};
use tokio::task::JoinSet;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::diagnostics::{render, Diagnostic};

#[derive(CliParser)]
#[command(name = "scopec", version, about = "Lexical scope resolver for a small C subset")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// When to color diagnostics
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Show lexer output (tokens)
    Lex { file: PathBuf },
    /// Show parser output (AST)
    Parse { file: PathBuf },
    /// Show the renamed program and its bindings
    Resolve {
        file: PathBuf,
        /// Only print the renamed program
        #[arg(long)]
        no_bindings: bool,
    },
    /// Resolve several files in parallel
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Resolve and evaluate `main`, exiting with its return value
    Run { file: PathBuf },
    /// Print a shell completion script
    Completions { shell: Shell },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn enabled(self) -> bool {
        match self {
            ColorChoice::Auto => std::io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let color = cli.color.enabled();

    let result = match cli.command {
        Command::Lex { file } => run_lexer(&file, color),
        Command::Parse { file } => run_parser(&file, color),
        Command::Resolve { file, no_bindings } => run_resolver(&file, !no_bindings, color),
        Command::Check { files } => run_check(files, color).await,
        Command::Run { file } => run_program(&file, color),
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "scopec", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout only carries command output
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))
}

/// Parse and resolve one translation unit
fn resolve_source(source: &str) -> Result<ResolvedProgram, Diagnostic> {
    let program = Parser::parse(source)?;
    Ok(Resolver::resolve_program(program)?)
}

fn report(path: &Path, source: &str, diag: &Diagnostic, color: bool) -> ExitCode {
    eprint!("{}", render(&path.display().to_string(), source, diag, color));
    ExitCode::FAILURE
}

fn run_lexer(path: &Path, color: bool) -> anyhow::Result<ExitCode> {
    let source = read_source(path)?;
    let tokens = match Lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(e) => return Ok(report(path, &source, &e.into(), color)),
    };

    println!("=== Lexer Output for {} ===\n", path.display());
    println!("{:<10} {:<8} {:<12} {}", "SPAN", "LENGTH", "TOKEN TYPE", "VALUE");
    println!("{}", "-".repeat(48));
    for spanned in &tokens {
        let span = format!("{}..{}", spanned.span.start, spanned.span.end);
        let len = spanned.span.end - spanned.span.start;
        println!("{:<10} {:<8} {:<12} {}", span, len, token_type_name(&spanned.token), spanned.token);
    }

    println!("\n=== Summary ===");
    println!("Total tokens: {}", tokens.len());
    for kind in ["KEYWORD", "IDENT", "CONSTANT", "OPERATOR", "PUNCTUATION"] {
        let count = tokens.iter().filter(|t| token_type_name(&t.token) == kind).count();
        println!("  {:<12} {}", kind.to_lowercase(), count);
    }

    Ok(ExitCode::SUCCESS)
}

fn token_type_name(token: &Token) -> &'static str {
    match token {
        Token::Int | Token::Void | Token::Return | Token::If | Token::Else |
        Token::Do | Token::While | Token::For | Token::Break | Token::Continue |
        Token::Switch | Token::Case | Token::Default | Token::Goto |
        Token::Static | Token::Extern => "KEYWORD",
        Token::Constant(_) => "CONSTANT",
        Token::Ident(_) => "IDENT",
        Token::LParen | Token::RParen | Token::LBrace | Token::RBrace |
        Token::Comma | Token::Colon | Token::Semi => "PUNCTUATION",
        Token::Eof => "EOF",
        _ => "OPERATOR",
    }
}

fn run_parser(path: &Path, color: bool) -> anyhow::Result<ExitCode> {
    let source = read_source(path)?;
    let program = match Parser::parse(&source) {
        Ok(program) => program,
        Err(e) => return Ok(report(path, &source, &e.into(), color)),
    };

    println!("=== Parser Output for {} ===\n", path.display());
    println!("{}", program.pretty_print());
    println!("=== Summary ===");
    let functions = program.functions().count();
    let variables = program.decls.iter().filter(|d| matches!(d, Declaration::Variable(_))).count();
    println!("Functions: {}", functions);
    println!("Variables: {}", variables);

    Ok(ExitCode::SUCCESS)
}

fn run_resolver(path: &Path, show_bindings: bool, color: bool) -> anyhow::Result<ExitCode> {
    let source = read_source(path)?;
    let resolved = match resolve_source(&source) {
        Ok(resolved) => resolved,
        Err(diag) => return Ok(report(path, &source, &diag, color)),
    };

    println!("=== Scope Resolution for {} ===\n", path.display());
    print!("{}", resolved.program.to_source());

    if show_bindings {
        println!("\n=== Bindings ===");
        println!(
            "{:<12} {:<14} {:<9} {:<9} {:<15} {}",
            "SOURCE", "UNIQUE", "KIND", "LINKAGE", "SCOPE", "DEPTH"
        );
        println!("{}", "-".repeat(70));
        for binding in &resolved.bindings {
            let scope = format!("{} {}", binding.scope, resolved.scope_kind(binding));
            println!(
                "{:<12} {:<14} {:<9} {:<9} {:<15} {}",
                binding.source_name,
                binding.unique_name,
                binding.kind.to_string(),
                binding.linkage.to_string(),
                scope,
                binding.depth
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_program(path: &Path, color: bool) -> anyhow::Result<ExitCode> {
    let source = read_source(path)?;
    let resolved = match resolve_source(&source) {
        Ok(resolved) => resolved,
        Err(diag) => return Ok(report(path, &source, &diag, color)),
    };

    match Interpreter::run_main(&resolved.program) {
        Ok(value) => {
            info!(value, "main returned");
            Ok(ExitCode::from((value & 0xff) as u8))
        }
        Err(e) => Ok(report(path, &source, &e.into(), color)),
    }
}

enum Checked {
    Ok { bindings: usize, renamed: usize },
    Failed(String),
}

fn check_file(path: &Path, color: bool) -> anyhow::Result<Checked> {
    let source = read_source(path)?;
    debug!(file = %path.display(), "checking");

    Ok(match resolve_source(&source) {
        Ok(resolved) => Checked::Ok {
            bindings: resolved.bindings.len(),
            renamed: resolved.renamed().count(),
        },
        Err(diag) => Checked::Failed(render(&path.display().to_string(), &source, &diag, color)),
    })
}

/// Each file gets its own resolver on the blocking pool; results are
/// reported in argument order.
async fn run_check(files: Vec<PathBuf>, color: bool) -> anyhow::Result<ExitCode> {
    let mut tasks = JoinSet::new();
    for (index, path) in files.into_iter().enumerate() {
        tasks.spawn_blocking(move || {
            let outcome = check_file(&path, color);
            (index, path, outcome)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("check task panicked")?);
    }
    results.sort_by_key(|(index, _, _)| *index);

    let total = results.len();
    let mut failures = 0;
    for (_, path, outcome) in results {
        match outcome {
            Ok(Checked::Ok { bindings, renamed }) => {
                println!("{}: ok ({} declarations, {} renamed)", path.display(), bindings, renamed);
            }
            Ok(Checked::Failed(rendered)) => {
                failures += 1;
                eprint!("{}", rendered);
                println!("{}: failed", path.display());
            }
            Err(err) => {
                failures += 1;
                eprintln!("error: {:#}", err);
                println!("{}: failed", path.display());
            }
        }
    }

    if failures > 0 {
        eprintln!("{} of {} files failed", failures, total);
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
