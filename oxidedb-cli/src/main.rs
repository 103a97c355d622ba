use anyhow::{bail, Context, Result};
use clap::Parser;
use oxidedb_core::{
    agg_supports_write_concern, check_collation_compatibility, compatibility_version,
    is_merge_pipeline, set_log_level, AggregationRequest, CompatibilityVersion, LogLevel,
    NamespaceString, Verbosity,
};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Check whether a raw aggregate command document would be admitted,
/// without executing it: namespace resolution, request parsing, and
/// the collation compatibility gate, reported as a JSON verdict.
#[derive(Parser)]
#[command(name = "oxidedb")]
#[command(about = "OxideDB CLI - offline admission check for aggregate commands")]
#[command(version)]
struct Cli {
    /// JSON file containing the raw command document
    file: PathBuf,

    /// Database name the command targets
    #[arg(long, default_value = "test")]
    db: String,

    /// Compatibility version to check against (1 or 2); defaults to
    /// the process default
    #[arg(long)]
    compat: Option<String>,

    /// Check the explain path at this verbosity
    /// (queryPlanner, executionStats, allPlansExecution)
    #[arg(long)]
    verbosity: Option<String>,

    /// Log level (error, warn, info, debug)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(level) = cli.log_level.as_deref() {
        let level = LogLevel::parse(level)
            .with_context(|| format!("unknown log level '{}'", level))?;
        set_log_level(level);
    }

    let version = match cli.compat.as_deref() {
        Some(raw) => CompatibilityVersion::parse(raw)
            .with_context(|| format!("unknown compatibility version '{}'", raw))?,
        None => compatibility_version(),
    };

    let verbosity = match cli.verbosity.as_deref() {
        Some(raw) => Some(
            Verbosity::parse(raw).with_context(|| format!("unknown verbosity '{}'", raw))?,
        ),
        None => None,
    };

    let cmd = read_command(&cli.file)?;
    let verdict = check_admission(&cli.db, &cmd, version, verbosity);
    let admitted = verdict.get("ok") == Some(&json!(1.0));

    println!("{}", serde_json::to_string_pretty(&Value::Object(verdict))?);

    if !admitted {
        std::process::exit(1);
    }
    Ok(())
}

/// Load the raw command document from a JSON file
fn read_command(file: &Path) -> Result<Value> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let cmd: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in file: {}", file.display()))?;
    if !cmd.is_object() {
        bail!("command document must be a JSON object: {}", file.display());
    }
    Ok(cmd)
}

/// Run the admission chain (minus authorization and execution) and
/// render the verdict as a status document.
fn check_admission(
    dbname: &str,
    cmd: &Value,
    version: CompatibilityVersion,
    verbosity: Option<Verbosity>,
) -> Map<String, Value> {
    let mut verdict = Map::new();
    let status = NamespaceString::from_command(dbname, cmd)
        .and_then(|nss| AggregationRequest::parse(nss, cmd, verbosity))
        .and_then(|request| {
            check_collation_compatibility(&request, version)?;
            verdict.insert("ns".to_string(), json!(request.nss().full_name()));
            verdict.insert("stages".to_string(), json!(request.pipeline().len()));
            verdict.insert(
                "mergePipeline".to_string(),
                json!(is_merge_pipeline(request.pipeline())),
            );
            verdict.insert(
                "supportsWriteConcern".to_string(),
                json!(agg_supports_write_concern(cmd)),
            );
            verdict.insert(
                "compatibilityVersion".to_string(),
                json!(version.as_str()),
            );
            if let Some(level) = request.explain() {
                verdict.insert("explain".to_string(), json!(level.as_str()));
            }
            Ok(())
        });
    oxidedb_core::append_command_status(&mut verdict, status);
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_admission_verdict_fields() {
        let cmd = json!({
            "aggregate": "orders",
            "pipeline": [{"$match": {"a": 1}}, {"$out": "archive"}]
        });
        let verdict = check_admission("test", &cmd, CompatibilityVersion::V2, None);
        assert_eq!(verdict.get("ok"), Some(&json!(1.0)));
        assert_eq!(verdict.get("ns"), Some(&json!("test.orders")));
        assert_eq!(verdict.get("stages"), Some(&json!(2)));
        assert_eq!(verdict.get("mergePipeline"), Some(&json!(false)));
        assert_eq!(verdict.get("supportsWriteConcern"), Some(&json!(true)));
    }

    #[test]
    fn test_check_admission_rejection() {
        let cmd = json!({
            "aggregate": "orders",
            "pipeline": [{"$match": {"a": 1}}],
            "collation": {"locale": "en"}
        });
        let verdict = check_admission("test", &cmd, CompatibilityVersion::V1, None);
        assert_eq!(verdict.get("ok"), Some(&json!(0.0)));
        assert_eq!(verdict.get("code"), Some(&json!(72)));
    }
}
