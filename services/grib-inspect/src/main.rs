//! GRIB inspection tool.
//!
//! Prints the inventory of a GRIB file, dumps message records as JSON and
//! looks up messages by parameter name.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use grib_inventory::{
    InspectConfig, Inspector, NameKey, NativeDecoder, ParameterMatch, RecordRequest,
};

#[derive(Parser, Debug)]
#[command(name = "grib-inspect")]
#[command(about = "Inspect the messages of GRIB1/GRIB2 files")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file path
    #[arg(short, long, global = true, env = "GRIB_INSPECT_CONFIG")]
    config: Option<PathBuf>,

    /// Enumerate every field of multi-field messages
    #[arg(long, global = true)]
    multi_field: bool,

    /// Log level
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One line per message: index, short name, name, level, level type
    Inventory { path: PathBuf },

    /// Every non-excluded key of a message, as JSON
    Record {
        path: PathBuf,

        /// 1-based message index
        #[arg(short, long, default_value_t = 1)]
        index: usize,

        /// Number of consecutive records
        #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        count: u64,

        /// Known message count, skips counting the file
        #[arg(long)]
        record_count: Option<usize>,

        /// Drop keys that repeat ignoring case
        #[arg(long)]
        structured: bool,
    },

    /// Parameter name of each message, as JSON
    Names {
        path: PathBuf,

        /// parameterName, name, shortName or cfName
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Records whose parameter name equals VALUE, as JSON
    Parameter {
        path: PathBuf,
        value: String,

        /// parameterName, name, shortName or cfName
        #[arg(short, long)]
        key: Option<String>,

        /// Drop keys that repeat ignoring case
        #[arg(long)]
        structured: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json)?;

    let config = load_config(&args)?;
    debug!(?config, "Loaded configuration");

    let inspector = Inspector::native(config)?;
    let stdout = io::stdout();
    run(&inspector, args.command, &mut stdout.lock())
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// File, then environment, then command-line flags.
fn load_config(args: &Args) -> Result<InspectConfig> {
    let config = match &args.config {
        Some(path) => InspectConfig::from_yaml(path)?,
        None => InspectConfig::default(),
    };
    let mut config = config.with_env()?;

    if args.multi_field {
        config.multi_field_support = true;
    }
    match &args.command {
        Command::Names { key, .. } => apply_key(&mut config, key.as_deref())?,
        Command::Parameter { key, structured, .. } => {
            apply_key(&mut config, key.as_deref())?;
            config.structured |= *structured;
        }
        Command::Record { structured, .. } => config.structured |= *structured,
        Command::Inventory { .. } => {}
    }
    Ok(config)
}

fn apply_key(config: &mut InspectConfig, key: Option<&str>) -> Result<()> {
    if let Some(key) = key {
        config.name_key = key.parse::<NameKey>()?;
    }
    Ok(())
}

fn run<W: Write>(inspector: &Inspector<NativeDecoder>, command: Command, out: &mut W) -> Result<()> {
    match command {
        Command::Inventory { path } => {
            let inventory = inspector.inventory(&path)?;
            for line in inventory.lines() {
                writeln!(out, "{}", line)?;
            }
        }
        Command::Record {
            path,
            index,
            count,
            record_count,
            ..
        } => {
            let request = RecordRequest {
                index,
                record_count,
                structured: inspector.config().structured,
            };
            let count = usize::try_from(count).context("Record count out of range")?;
            let json = if count == 1 {
                serde_json::to_string_pretty(&inspector.get_record(&path, &request)?)?
            } else {
                serde_json::to_string_pretty(&inspector.get_records(&path, &request, count)?)?
            };
            writeln!(out, "{}", json)?;
        }
        Command::Names { path, .. } => {
            let names = inspector.get_parameter_names(&path, inspector.config().name_key)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&names)?)?;
        }
        Command::Parameter { path, value, .. } => {
            let lookup = inspector.config().lookup_options();
            let json = match inspector.get_parameter(&path, &value, &lookup)? {
                ParameterMatch::NotFound => {
                    info!(parameter = %value, "No match");
                    eprintln!(
                        "Parameter '{}' not found in {} (key {})",
                        value,
                        path.display(),
                        lookup.name_key
                    );
                    return Ok(());
                }
                ParameterMatch::Single(record) => serde_json::to_string_pretty(&record)?,
                ParameterMatch::Many(records) => serde_json::to_string_pretty(&records)?,
            };
            writeln!(out, "{}", json)
                .with_context(|| format!("Failed to write records of '{}'", value))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("grib-inspect").chain(argv.iter().copied())).unwrap()
    }

    fn output(args: Args) -> String {
        let config = load_config(&args).unwrap();
        let inspector = Inspector::native(config).unwrap();
        let mut out = Vec::new();
        run(&inspector, args.command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = parse(&[
            "--multi-field",
            "parameter",
            "f.grib",
            "t",
            "--key",
            "shortName",
            "--structured",
        ]);
        let config = load_config(&args).unwrap();
        assert!(config.multi_field_support);
        assert!(config.structured);
        assert_eq!(config.name_key, NameKey::ShortName);
    }

    #[test]
    fn test_record_count_must_be_positive() {
        let argv = ["grib-inspect", "record", "f.grib", "-n", "0"];
        assert!(Args::try_parse_from(argv).is_err());

        let args = parse(&["record", "f.grib", "-n", "2"]);
        assert!(matches!(args.command, Command::Record { count: 2, .. }));
    }

    #[test]
    fn test_invalid_name_key() {
        let args = parse(&["names", "f.grib", "--key", "level"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_inventory_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::three_message_file(dir.path());
        let text = output(parse(&["inventory", path.to_str().unwrap()]));

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[3], "Records: 3");
    }

    #[test]
    fn test_record_output_is_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::three_message_file(dir.path());
        let text = output(parse(&["record", path.to_str().unwrap(), "--index", "2"]));

        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["shortName"], "cape");
        assert!(json["values"].is_array());
    }

    #[test]
    fn test_names_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::three_message_file(dir.path());
        let text = output(parse(&["names", path.to_str().unwrap()]));

        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json[1]["message"], 2);
        assert_eq!(json[1]["value"], "157");
    }

    #[test]
    fn test_parameter_not_found_prints_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::three_message_file(dir.path());
        let text = output(parse(&["parameter", path.to_str().unwrap(), "999"]));
        assert!(text.is_empty());
    }
}
