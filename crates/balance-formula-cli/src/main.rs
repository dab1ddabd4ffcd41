//! Balance CLI - check and evaluate balancing formulas

use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use balance_formula::symbols::is_valid_symbol_name;
use balance_formula::{parse_formula, Evaluator, FormulaExpr, FormulaReferences, SymbolTable};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "balance")]
#[command(author, version, about = "Check and evaluate balancing formulas")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file declaring symbols: {"variables": [..], "methods": [..]}
    #[arg(long, global = true)]
    symbols: Option<PathBuf>,

    /// Declare a variable name
    #[arg(long = "variable", value_name = "NAME", global = true)]
    variables: Vec<String>,

    /// Declare a method signature, e.g. "BONUS(1-2)"
    #[arg(long = "method", value_name = "SIGNATURE", global = true)]
    methods: Vec<String>,

    /// Log parsing and evaluation details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a formula and show its canonical form and the symbols it uses
    Check {
        /// Formula text
        formula: String,
    },

    /// Evaluate a formula once
    Eval {
        /// Formula text
        formula: String,

        /// Value of a variable or method
        #[arg(long = "set", value_name = "NAME=VALUE")]
        values: Vec<String>,
    },

    /// Evaluate a formula for every row of a CSV file
    Batch {
        /// Formula text
        formula: String,

        /// Input CSV file; header names are symbol names
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Name of the appended result column
        #[arg(long, default_value = "result")]
        column: String,
    },
}

/// Contents of a `--symbols` file
#[derive(Debug, Default, Deserialize)]
struct SymbolsFile {
    #[serde(default)]
    variables: Vec<String>,
    #[serde(default)]
    methods: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("balance_formula=debug,balance=debug")
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .init();
    }

    let symbols = load_symbols(cli.symbols.as_deref(), &cli.variables, &cli.methods)?;

    match cli.command {
        Commands::Check { formula } => {
            print!("{}", check(&formula, &symbols)?);
            Ok(())
        }
        Commands::Eval { formula, values } => {
            println!("{}", eval(&formula, symbols, &values)?);
            Ok(())
        }
        Commands::Batch {
            formula,
            input,
            output,
            column,
        } => {
            let rows = batch(&formula, symbols, &input, output.as_deref(), &column)?;
            if let Some(output_path) = output {
                eprintln!("Wrote {} rows to '{}'", rows, output_path.display());
            }
            Ok(())
        }
    }
}

/// Build the symbol table from the symbols file and command-line options
fn load_symbols(path: Option<&Path>, variables: &[String], methods: &[String]) -> Result<SymbolTable> {
    let file = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            serde_json::from_str::<SymbolsFile>(&text)
                .with_context(|| format!("Invalid symbols file '{}'", path.display()))?
        }
        None => SymbolsFile::default(),
    };

    let mut symbols = SymbolTable::new();
    symbols
        .add_variables(file.variables.iter().chain(variables).map(String::as_str))
        .context("Invalid variable declaration")?;
    symbols
        .add_signatures(file.methods.iter().chain(methods))
        .context("Invalid method declaration")?;

    tracing::debug!(
        variables = symbols.variable_names().len(),
        methods = symbols.method_names().len(),
        "loaded symbols"
    );
    Ok(symbols)
}

/// Declare value names the symbol table does not know yet as variables
fn declare_values<'n>(symbols: &mut SymbolTable, names: impl IntoIterator<Item = &'n str>) -> Result<()> {
    for name in names {
        if symbols.has_variable(name) || symbols.has_method(name) {
            continue;
        }
        symbols
            .add_variable(name)
            .with_context(|| format!("'{}' cannot be used as a symbol name", name))?;
    }
    Ok(())
}

/// Parse formula text, ignoring whitespace
fn parse(formula: &str, symbols: &SymbolTable) -> Result<FormulaExpr> {
    let compact: String = formula.chars().filter(|c| !c.is_whitespace()).collect();
    parse_formula(&compact, symbols).context("Invalid formula")
}

/// Evaluate with named values. A method evaluates to its value whatever its
/// arguments are.
fn evaluate(ast: &FormulaExpr, values: &AHashMap<String, f64>) -> Result<f64> {
    let mut evaluator = Evaluator::new();
    evaluator.add_variable_resolver(0, |name| values.get(name).copied())?;
    evaluator.add_method_resolver(0, |name, _| values.get(name).copied())?;
    Ok(evaluator.evaluate(ast)?)
}

fn check(formula: &str, symbols: &SymbolTable) -> Result<String> {
    let ast = parse(formula, symbols)?;
    let references = FormulaReferences::collect(&ast);

    let list = |names: &[String]| {
        if names.is_empty() {
            "(none)".to_string()
        } else {
            names.join(", ")
        }
    };

    let mut report = format!("Formula: {}\n", ast);
    report.push_str(&format!("Variables: {}\n", list(&references.variables)));
    report.push_str(&format!("Methods: {}\n", list(&references.methods)));
    if references.uses_meta_function {
        report.push_str("Uses meta-functions\n");
    }
    Ok(report)
}

fn eval(formula: &str, mut symbols: SymbolTable, assignments: &[String]) -> Result<f64> {
    let mut values = AHashMap::new();
    for assignment in assignments {
        let (name, value) = assignment
            .split_once('=')
            .with_context(|| format!("Expected NAME=VALUE, got '{}'", assignment))?;
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for '{}': '{}'", name, value))?;
        values.insert(name.trim().to_string(), value);
    }

    declare_values(&mut symbols, values.keys().map(String::as_str))?;
    let ast = parse(formula, &symbols)?;
    evaluate(&ast, &values)
}

fn batch(
    formula: &str,
    mut symbols: SymbolTable,
    input: &Path,
    output: Option<&Path>,
    column: &str,
) -> Result<usize> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("Failed to open '{}'", input.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read headers of '{}'", input.display()))?
        .clone();

    if headers.iter().any(|header| header == column) {
        bail!("Input already has a '{}' column", column);
    }

    for header in headers.iter().filter(|header| !is_valid_symbol_name(header)) {
        tracing::debug!(header, "column is not a symbol name, ignored");
    }
    declare_values(&mut symbols, headers.iter().filter(|h| is_valid_symbol_name(h)))?;
    let ast = parse(formula, &symbols)?;

    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create '{}'", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };
    let mut writer = csv::Writer::from_writer(sink);

    let mut output_headers = headers.clone();
    output_headers.push_field(column);
    writer
        .write_record(&output_headers)
        .context("Failed to write headers")?;

    let mut rows = 0;
    for (index, record) in reader.records().enumerate() {
        // Row numbers as shown in a spreadsheet, after the header
        let row = index + 2;
        let record = record.with_context(|| format!("Failed to read row {}", row))?;

        let values: AHashMap<String, f64> = headers
            .iter()
            .zip(record.iter())
            .filter_map(|(name, field)| {
                field
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .map(|value| (name.to_string(), value))
            })
            .collect();

        let result = evaluate(&ast, &values).with_context(|| format!("Row {}", row))?;

        let mut output_record = record.clone();
        output_record.push_field(&result.to_string());
        writer
            .write_record(&output_record)
            .with_context(|| format!("Failed to write row {}", row))?;
        rows += 1;
    }

    writer.flush().context("Failed to flush output")?;
    tracing::debug!(rows, "evaluated batch");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn declared(variables: &[&str], methods: &[&str]) -> SymbolTable {
        let variables: Vec<String> = variables.iter().map(|v| v.to_string()).collect();
        let methods: Vec<String> = methods.iter().map(|m| m.to_string()).collect();
        load_symbols(None, &variables, &methods).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_batch() {
        let cli = Cli::try_parse_from([
            "balance",
            "batch",
            "a*2",
            "--input",
            "rows.csv",
            "--variable",
            "a",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.variables, ["a"]);
        assert!(matches!(cli.command, Commands::Batch { ref column, .. } if column == "result"));
    }

    #[test]
    fn test_load_symbols_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("symbols.json");
        std::fs::write(
            &path,
            r#"{"variables": ["level"], "methods": ["BONUS(1-2)"]}"#,
        )
        .unwrap();

        let symbols = load_symbols(Some(path.as_path()), &["base".to_string()], &["SEED".to_string()]).unwrap();
        assert_eq!(symbols.variable_names(), ["level", "base"]);
        assert_eq!(symbols.method_names(), ["BONUS", "SEED"]);
    }

    #[test]
    fn test_load_symbols_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("symbols.json");
        std::fs::write(&path, r#"{"methods": ["BONUS(2-1)"]}"#).unwrap();
        assert!(load_symbols(Some(path.as_path()), &[], &[]).is_err());

        std::fs::write(&path, "not json").unwrap();
        assert!(load_symbols(Some(path.as_path()), &[], &[]).is_err());

        assert!(load_symbols(Some(dir.path().join("missing.json").as_path()), &[], &[]).is_err());
    }

    #[test]
    fn test_check_report() {
        let symbols = declared(&["level", "base"], &["BONUS(1)"]);
        let report = check("base + BONUS( level ) * 2", &symbols).unwrap();
        assert_eq!(
            report,
            "Formula: base+BONUS(level)*2\nVariables: base, level\nMethods: BONUS\n"
        );

        let report = check("SUM(1, 5, i)", &symbols).unwrap();
        assert_eq!(
            report,
            "Formula: SUM(1,5,i)\nVariables: (none)\nMethods: (none)\nUses meta-functions\n"
        );

        assert!(check("level +", &symbols).is_err());
    }

    #[test]
    fn test_eval_with_values() {
        let symbols = declared(&[], &["BONUS(1-INF)"]);
        let values = ["level=4".to_string(), "BONUS = 10".to_string()];
        assert_eq!(eval("level*2 + BONUS(level, 3)", symbols, &values).unwrap(), 18.0);

        assert_eq!(eval("SUM(1,10,2,i)", SymbolTable::new(), &[]).unwrap(), 25.0);
    }

    #[test]
    fn test_eval_errors() {
        assert!(eval("x", SymbolTable::new(), &["x".to_string()]).is_err());
        assert!(eval("x", SymbolTable::new(), &["x=abc".to_string()]).is_err());
        assert!(eval("x", SymbolTable::new(), &[]).is_err());

        // Declared but never given a value
        let symbols = declared(&["x"], &[]);
        assert!(eval("x+1", symbols, &[]).is_err());
    }

    #[test]
    fn test_batch_csv() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("rows.csv");
        let output = dir.path().join("out.csv");
        std::fs::write(&input, "name,level,power\nslime,1,10\norc,5,20\ndragon,10,40\n").unwrap();

        let rows = batch(
            "power*(1+level/10)",
            SymbolTable::new(),
            &input,
            Some(output.as_path()),
            "damage",
        )
        .unwrap();
        assert_eq!(rows, 3);

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(
            written,
            "name,level,power,damage\nslime,1,10,11\norc,5,20,30\ndragon,10,40,80\n"
        );
    }

    #[test]
    fn test_batch_reports_failing_row() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("rows.csv");
        let output = dir.path().join("out.csv");
        std::fs::write(&input, "level\n1\nhigh\n").unwrap();

        let err = batch("level*2", SymbolTable::new(), &input, Some(output.as_path()), "result").unwrap_err();
        assert!(err.to_string().contains("Row 3"), "{err:#}");
    }

    #[test]
    fn test_batch_rejects_existing_column() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("rows.csv");
        std::fs::write(&input, "result\n1\n").unwrap();

        assert!(batch("1", SymbolTable::new(), &input, None, "result").is_err());
    }
}
