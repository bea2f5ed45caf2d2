mod protocol_error;
mod semantic_validator;
pub mod schema;

use anyhow::Context;
use schemars::schema_for;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
pub use crate::protocol_error::{JsonError, ProtocolError, ValidationError, ValidationErrors};
pub use crate::schema::{AdvisorPolicy, InputSource, LoadTest, Profile, RequestMode, Target};
pub use crate::semantic_validator::{Rule, Validator, MAX_CONCURRENCY, MAX_DURATION_SEC};

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Structural (JSON schema) and business validation of a profile file.
pub fn validate(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    debug!(path = %path.display(), "validating profile");
    let json_content = fs::read_to_string(path)?;
    let profile_json: Value = serde_json::from_str(&json_content).map_err(JsonError::from)?;

    let schema = schema_for!(Profile);
    let schema_json: Value = serde_json::to_value(&schema)
        .map_err(|e| JsonError { line: 0, column: 0, message: e.to_string() })?;

    let validator = jsonschema::validator_for(&schema_json).map_err(|e| {
        ProtocolError::Validation(ValidationErrors {
            items: vec![ValidationError {
                path: "$schema".into(),
                code: "schema_compile_error".into(),
                message: e.to_string(),
            }],
        })
    })?;

    let mut errors: Vec<ValidationError> = Vec::new();

    for err in validator.iter_errors(&profile_json) {
        errors.push(ValidationError {
            path: err.instance_path.to_string(),
            code: "schema".to_string(),
            message: err.to_string(),
        });
    }

    if errors.is_empty() {
        Validator::standard().validate(&profile_json, &mut errors);
    }

    if !errors.is_empty() {
        warn!(errors = errors.len(), "profile is invalid");
        return Err(ValidationErrors { items: errors }.into());
    }
    info!(path = %path.display(), "profile ok");

    Ok(())
}

/// Reads a profile without validating it.
pub fn parse_profile(path: impl AsRef<Path>) -> Result<Profile> {
    let content = fs::read_to_string(path.as_ref())?;
    let profile = serde_json::from_str(&content).map_err(JsonError::from)?;
    Ok(profile)
}

/// Validates, then reads a profile.
pub fn load_profile(path: impl AsRef<Path>) -> Result<Profile> {
    validate(&path)?;
    parse_profile(path)
}

/// Runs the business rules against an in-memory profile, e.g. after CLI overrides.
pub fn check_profile(profile: &Profile) -> Result<()> {
    let mut errors = Vec::new();
    Validator::standard().validate_profile(profile, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { items: errors }.into())
    }
}

pub fn export_schema(out_path: impl AsRef<Path>, version: Option<String>) -> anyhow::Result<PathBuf> {
    let path = out_path.as_ref();
    let final_path = with_version(path, version.as_deref())?;
    let mut schema = schema_for!(Profile);
    let v = version.unwrap_or_else(|| "1".to_string());
    schema.insert("$version".to_string(), Value::String(v));
    fs::write(&final_path, serde_json::to_string_pretty(&schema)?)
        .with_context(|| format!("Failed to write schema to {}", final_path.display()))?;
    info!(path = %final_path.display(), "schema exported");

    Ok(final_path)
}

fn with_version(path: &Path, version: Option<&str>) -> anyhow::Result<PathBuf> {
    let Some(version) = version else {
        return Ok(path.to_path_buf());
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid output file name"))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("json");

    let new_name = format!("{stem}-v{version}.{ext}");
    Ok(path.with_file_name(new_name))
}

pub fn generate_profile(out_path: impl AsRef<Path>, version: &str) -> anyhow::Result<()> {
    let path = out_path.as_ref();
    let profile = Profile::default().set_version(version.parse().unwrap_or(1u16));
    fs::write(path, serde_json::to_string_pretty(&profile)?)
        .context("Failed to write default profile to file")
}
