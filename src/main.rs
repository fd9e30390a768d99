use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
    process::ExitCode,
    str::FromStr,
};

use boac::{
    CompileError, CompilerConfig, FoldMode, SourceFile,
    frontend::{SourceFileOrigin, parser::Parser},
    interchange::{
        InterchangeError, parse::parse_expression_with_depth, pretty_print::print_expression,
    },
    middle::{fold::ConstantFolder, type_checker::TypeChecker},
    normal_form::reduce,
};
use clap::{CommandFactory, Parser as ClapParser, Subcommand, error::ErrorKind};
use colored::Colorize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Type check Boa programs and report every diagnostic
    Check {
        source_files: Vec<PathBuf>,
        /// Fold arithmetic of programs that check cleanly
        #[arg(long, value_parser = FoldMode::from_str)]
        fold: Option<FoldMode>,
    },
    /// Reduce an arithmetic expression to its normal form
    Reduce {
        expression: String,
        /// Print the reduced interchange tree instead of source text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match args.command {
        Command::Check { source_files, fold } => check(source_files, fold),
        Command::Reduce { expression, json } => {
            reduce_expression(&expression, json, &CompilerConfig::default())
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("{}", colorize(format!("{}: {error}", "error".red())));
            ExitCode::FAILURE
        }
    }
}

/// Drops colour codes when stdout is not a terminal
fn colorize(text: String) -> String {
    if std::io::stdout().is_terminal() {
        text
    } else {
        strip_ansi_escapes::strip_str(text)
    }
}

fn validate(source_files: &[PathBuf]) {
    if source_files.is_empty() {
        Args::command()
            .error(ErrorKind::MissingRequiredArgument, "Missing source files!")
            .exit();
    }

    for source_file in source_files {
        if !source_file.exists() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Source file '{}' does not exist!", source_file.display()),
                )
                .exit()
        }

        if !source_file.is_file() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Input path '{}' is not a file!", source_file.display()),
                )
                .exit()
        }
    }
}

fn read_source(path: &Path) -> Result<SourceFile, CompileError> {
    let contents = std::fs::read_to_string(path)?;

    Ok(SourceFile {
        contents,
        origin: SourceFileOrigin::File(path.to_path_buf()),
    })
}

/// Returns whether every file parsed and checked without diagnostics
fn check(source_files: Vec<PathBuf>, fold: Option<FoldMode>) -> Result<bool, CompileError> {
    validate(&source_files);

    let config = CompilerConfig {
        fold,
        ..CompilerConfig::default()
    };

    let mut clean = true;

    for path in &source_files {
        let source_file = read_source(path)?;

        let mut ast = match Parser::parse_program(&source_file, &config) {
            Ok(ast) => ast,
            Err(error) => {
                println!("{}", colorize(format!("{}: {error}", "error".red())));
                clean = false;
                continue;
            }
        };

        let result = TypeChecker::check(&ast, &config)?;

        for diagnostic in &result.diagnostics {
            println!("{}", colorize(diagnostic.render(&source_file)));
        }

        if !result.is_ok() {
            clean = false;
            continue;
        }

        if let Some(mode) = config.fold {
            let folded = ConstantFolder::new(mode, &result).fold(&mut ast)?;
            info!(origin = %source_file.origin, folded, %mode, "folded arithmetic");
        }

        debug!(origin = %source_file.origin, "program is well typed");
    }

    Ok(clean)
}

fn reduce_expression(
    expression: &str,
    json: bool,
    config: &CompilerConfig,
) -> Result<bool, CompileError> {
    let expression = parse_expression_with_depth(expression, config.max_nesting_depth)?;
    let reduced = reduce(&expression);

    if json {
        let json = serde_json::to_string_pretty(&reduced).map_err(InterchangeError::from)?;
        println!("{json}");
    } else {
        println!("{}", print_expression(&reduced));
    }

    Ok(true)
}
