//! Schema Fields CLI
//!
//! Command-line interface for compiling conditional schemas and evaluating
//! field state against value snapshots.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use schema_fields::{
    assemble_payload, builder_fields, compile, evaluate, initial_values, lint, load_schema,
    load_values, table_rows, validate_payload, validate_values, visible_builder_fields,
    wrap_argument, CompileOptions, CompiledSchema, FileStatus, LintResult, Severity,
    ValidateError,
};

#[derive(Parser)]
#[command(name = "schema-fields")]
#[command(about = "Compile conditional JSON Schemas into fields and evaluate their state")]
#[command(version)]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CompileArgs {
    /// Schema file to compile
    schema: PathBuf,

    /// Field keying the by-type markers (TYPE if omitted)
    #[arg(long)]
    discriminator: Option<String>,

    /// Maximum nesting depth of compiled children
    #[arg(long, default_value_t = 8)]
    max_depth: usize,
}

impl CompileArgs {
    fn options(&self) -> CompileOptions {
        let options = CompileOptions::new().max_depth(self.max_depth);
        match &self.discriminator {
            Some(field) => options.discriminator(field),
            None => options,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema into canonical fields
    Compile {
        #[command(flatten)]
        args: CompileArgs,
    },

    /// Evaluate runtime state of every field for a value snapshot
    Evaluate {
        #[command(flatten)]
        args: CompileArgs,

        /// JSON object of current values
        #[arg(long)]
        values: PathBuf,
    },

    /// Assemble a request payload from a value snapshot
    Payload {
        #[command(flatten)]
        args: CompileArgs,

        /// JSON object of current values
        #[arg(long)]
        values: PathBuf,

        /// Re-wrap the payload under the unwrapped argument key
        #[arg(long)]
        wrap: bool,
    },

    /// Render compiled fields as table rows
    Table {
        #[command(flatten)]
        args: CompileArgs,
    },

    /// Render compiled fields for a form builder
    Builder {
        #[command(flatten)]
        args: CompileArgs,

        /// Only include fields visible for these values
        #[arg(long)]
        values: Option<PathBuf>,
    },

    /// Print initial form values
    Init {
        #[command(flatten)]
        args: CompileArgs,
    },

    /// Validate a value snapshot against the compiled fields
    Validate {
        #[command(flatten)]
        args: CompileArgs,

        /// JSON object of current values
        #[arg(long)]
        values: PathBuf,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Lint schema files for errors (syntax, malformed markers, undeclared fields)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },

    /// Validate an assembled payload against the marker-stripped schema
    Check {
        /// Schema file
        schema: PathBuf,

        /// Payload file to validate
        payload: PathBuf,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let pretty = cli.pretty;

    let result = match cli.command {
        Commands::Compile { args } => {
            load_compiled(&args).and_then(|compiled| print_json(&compiled, pretty))
        }
        Commands::Evaluate { args, values } => run_evaluate(&args, &values, pretty),
        Commands::Payload { args, values, wrap } => run_payload(&args, &values, wrap, pretty),
        Commands::Table { args } => load_compiled(&args)
            .and_then(|compiled| print_json(&table_rows(&compiled.fields), pretty)),
        Commands::Builder { args, values } => run_builder(&args, values.as_deref(), pretty),
        Commands::Init { args } => load_compiled(&args)
            .and_then(|compiled| print_json(&initial_values(&compiled.fields), pretty)),
        Commands::Validate { args, values, json } => run_validate(&args, &values, json),
        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
        Commands::Check {
            schema,
            payload,
            json,
        } => run_check(&schema, &payload, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_compiled(args: &CompileArgs) -> Result<CompiledSchema, u8> {
    let document = load_schema(&args.schema).map_err(|e| {
        eprintln!("Error: loading schema: {}", e);
        e.exit_code() as u8
    })?;
    let compiled = compile(&document, &args.options());
    debug!(
        schema = %args.schema.display(),
        fields = compiled.fields.len(),
        "compiled schema"
    );
    Ok(compiled)
}

fn read_values(path: &Path, json_output: bool) -> Result<Map<String, Value>, u8> {
    load_values(path).map_err(|e| {
        report_error(json_output, &format!("loading values: {}", e));
        e.exit_code() as u8
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<(), u8> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}

fn run_evaluate(args: &CompileArgs, values_path: &Path, pretty: bool) -> Result<(), u8> {
    let compiled = load_compiled(args)?;
    let values = read_values(values_path, false)?;
    // sorted for stable output
    let states: BTreeMap<_, _> = evaluate(&compiled, &values).into_iter().collect();
    print_json(&states, pretty)
}

fn run_payload(args: &CompileArgs, values_path: &Path, wrap: bool, pretty: bool) -> Result<(), u8> {
    let compiled = load_compiled(args)?;
    let values = read_values(values_path, false)?;
    let states = evaluate(&compiled, &values);
    let mut payload = assemble_payload(&compiled, &states, &values);
    if wrap {
        payload = wrap_argument(&compiled, payload);
    }
    print_json(&payload, pretty)
}

fn run_builder(args: &CompileArgs, values_path: Option<&Path>, pretty: bool) -> Result<(), u8> {
    let compiled = load_compiled(args)?;
    let fields = match values_path {
        Some(path) => {
            let values = read_values(path, false)?;
            let states = evaluate(&compiled, &values);
            visible_builder_fields(&compiled.fields, &states)
        }
        None => builder_fields(&compiled.fields),
    };
    print_json(&fields, pretty)
}

fn run_validate(args: &CompileArgs, values_path: &Path, json_output: bool) -> Result<(), u8> {
    let document = load_schema(&args.schema).map_err(|e| {
        report_error(json_output, &format!("loading schema: {}", e));
        e.exit_code() as u8
    })?;
    let values = read_values(values_path, json_output)?;
    let compiled = compile(&document, &args.options());
    let states = evaluate(&compiled, &values);

    report_validation(validate_values(&compiled, &states, &values), json_output)
}

fn run_check(schema_path: &Path, payload_path: &Path, json_output: bool) -> Result<(), u8> {
    let document = load_schema(schema_path).map_err(|e| {
        report_error(json_output, &format!("loading schema: {}", e));
        e.exit_code() as u8
    })?;
    let payload = load_schema(payload_path).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    report_validation(validate_payload(&document, &payload), json_output)
}

fn report_validation(result: Result<(), ValidateError>, json_output: bool) -> Result<(), u8> {
    match result {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);
    let passed = result.is_ok() && (!strict || result.warnings == 0);

    if format == "json" {
        print_json(&result, true)?;
    } else {
        print_lint_report(path, &result, passed, quiet);
    }

    if passed {
        Ok(())
    } else {
        Err(1)
    }
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

fn paint(color: &str, text: &str) -> String {
    format!("{}{}\x1b[0m", color, text)
}

fn print_lint_report(path: &Path, result: &LintResult, passed: bool, quiet: bool) {
    if !quiet {
        println!("Checking schema files under {}\n", path.display());
    }

    for file in &result.results {
        let mark = match file.status {
            FileStatus::Ok => paint(GREEN, "ok  "),
            FileStatus::Warning => paint(YELLOW, "warn"),
            FileStatus::Error => paint(RED, "fail"),
        };
        if !quiet || file.status != FileStatus::Ok {
            println!("  {} {}", mark, file.file.display());
        }

        for diag in &file.diagnostics {
            if quiet && diag.severity != Severity::Error {
                continue;
            }
            let color = match diag.severity {
                Severity::Error => RED,
                Severity::Warning => YELLOW,
            };
            println!("      {} {}  {}", paint(color, &diag.code), diag.path, diag.message);
        }
    }

    println!();
    let summary = if passed {
        paint(
            GREEN,
            &format!("{} schema file(s) compile cleanly", result.files_checked),
        )
    } else {
        paint(
            RED,
            &format!(
                "{} of {} schema file(s) have problems: {} error(s), {} warning(s)",
                result.failed, result.files_checked, result.errors, result.warnings
            ),
        )
    };
    println!("{}", summary);
}
