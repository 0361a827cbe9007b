use crate::error::{CoreError, CoreResult};
use crate::integrity::checksums::ChecksumStore;
use crate::metadata::annotate::{self, QueryUrlBuilder, UrlBuilder};
use crate::metadata::transform;
use crate::versioning;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SUPPORTED_VERSION: &str = "0.4.0";

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Knobs for loading a metadata file.
///
/// Whether a document with zero results is valid has varied across producer
/// iterations, so it is an explicit choice here rather than a guess.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub supported_version: String,
    pub allow_empty_results: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            supported_version: DEFAULT_SUPPORTED_VERSION.to_string(),
            allow_empty_results: true,
        }
    }
}

/// Disclosure-control markers attached to a single file by the producer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SdcInfo {
    /// Flag name to list of `[row, col]` coordinate pairs.
    #[serde(default)]
    pub cells: Map<String, Value>,
}

/// One file belonging to an output, as declared by the metadata.
///
/// `url`, `checksum`, `checksum_valid` and `cell_index` are derived during
/// annotation and live only in memory; they are never written back to the
/// backing file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRecord {
    pub name: String,
    #[serde(default)]
    pub sdc: Option<SdcInfo>,
    #[serde(skip)]
    pub url: Option<String>,
    #[serde(skip)]
    pub checksum: Option<String>,
    #[serde(skip)]
    pub checksum_valid: bool,
    /// `"row,col"` to the disclosure flags present at that cell, in the
    /// order the flags appear in the metadata.
    #[serde(skip)]
    pub cell_index: BTreeMap<String, Vec<String>>,
}

/// One researcher output: a table, model fit or plot plus its review state.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputRecord {
    #[serde(default)]
    pub uid: String,
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub output_type: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub outcome: Value,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A fully loaded, validated and annotated ACRO metadata document.
///
/// Immutable after load: every load either yields a complete document or a
/// specific error, never a partially interpreted one.
#[derive(Debug)]
pub struct OutputsDocument {
    path: PathBuf,
    version: String,
    config: Map<String, Value>,
    raw: Value,
    results: Vec<OutputRecord>,
}

/// Load with default options and the default URL builder.
pub fn load(path: &Path) -> CoreResult<OutputsDocument> {
    load_with(path, &LoadOptions::default(), &QueryUrlBuilder::default())
}

/// Full load sequence: parse, normalize legacy shapes, merge sibling config,
/// validate structure, gate on producer version, annotate. Each step is
/// fatal on failure.
pub fn load_with(
    path: &Path,
    options: &LoadOptions,
    urls: &dyn UrlBuilder,
) -> CoreResult<OutputsDocument> {
    let text = fs::read_to_string(path)?;
    let mut raw: Value = serde_json::from_str(&text)?;
    transform::normalize(&mut raw);

    let config = read_config(path)?;
    validate(path, &raw, options)?;

    // Validation guarantees a string version.
    let version = raw
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    // An incompatible producer may use an incompatible schema, so this must
    // abort before annotation.
    versioning::check_version(&version, &options.supported_version)?;

    let mut results = parse_results(path, &raw)?;
    let store = ChecksumStore::for_metadata(path);
    annotate::annotate(path, &mut results, &store, urls)?;

    Ok(OutputsDocument {
        path: path.to_path_buf(),
        version,
        config,
        raw,
        results,
    })
}

/// Structural validation only (parse + normalize + validate), without the
/// version gate or annotation. Used by directory discovery to tell apart
/// metadata candidates from arbitrary JSON files.
pub fn validate_file(path: &Path, options: &LoadOptions) -> CoreResult<()> {
    let text = fs::read_to_string(path)?;
    let mut raw: Value = serde_json::from_str(&text)?;
    transform::normalize(&mut raw);
    validate(path, &raw, options)
}

fn read_config(metadata_path: &Path) -> CoreResult<Map<String, Value>> {
    let config_path = metadata_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(&fs::read_to_string(config_path)?)?;
    Ok(value.as_object().cloned().unwrap_or_default())
}

fn validate(path: &Path, raw: &Value, options: &LoadOptions) -> CoreResult<()> {
    let invalid = |reason: String| CoreError::InvalidMetadataFile {
        path: path.display().to_string(),
        reason,
    };

    let Some(top) = raw.as_object() else {
        return Err(invalid("top level is not an object".to_string()));
    };
    if top.get("version").and_then(Value::as_str).is_none() {
        return Err(invalid(
            "missing top-level \"version\" string".to_string(),
        ));
    }
    let Some(results) = top.get("results").and_then(Value::as_object) else {
        return Err(invalid("missing top-level \"results\" object".to_string()));
    };
    if !options.allow_empty_results && results.is_empty() {
        return Err(invalid("\"results\" is empty".to_string()));
    }

    for (uid, result) in results {
        let Some(files) = result.get("files").and_then(Value::as_array) else {
            return Err(invalid(format!("result \"{uid}\" has no \"files\" list")));
        };
        if files.is_empty() {
            return Err(invalid(format!(
                "result \"{uid}\" has an empty \"files\" list"
            )));
        }
        for file in files {
            if file.get("name").and_then(Value::as_str).is_none() {
                return Err(invalid(format!(
                    "result \"{uid}\" has a file entry without a \"name\""
                )));
            }
        }
    }
    Ok(())
}

fn parse_results(path: &Path, raw: &Value) -> CoreResult<Vec<OutputRecord>> {
    let mut results = Vec::new();
    let Some(entries) = raw.get("results").and_then(Value::as_object) else {
        return Ok(results);
    };
    for (uid, entry) in entries {
        let mut record: OutputRecord =
            serde_json::from_value(entry.clone()).map_err(|e| CoreError::InvalidMetadataFile {
                path: path.display().to_string(),
                reason: format!("result \"{uid}\": {e}"),
            })?;
        // The results key is canonical; an embedded uid field is ignored.
        record.uid = uid.clone();
        results.push(record);
    }
    Ok(results)
}

/// Resolve a declared file name against the metadata directory. Absolute
/// names pass through unchanged.
pub(crate) fn resolve_name(metadata_path: &Path, name: &str) -> PathBuf {
    let name_path = Path::new(name);
    if name_path.is_absolute() {
        name_path.to_path_buf()
    } else {
        metadata_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(name_path)
    }
}

impl OutputsDocument {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    /// The parsed backing file, post legacy normalization.
    pub fn raw_metadata(&self) -> &Value {
        &self.raw
    }

    /// Results in the order they appear in the backing file.
    pub fn results(&self) -> &[OutputRecord] {
        &self.results
    }

    pub fn get(&self, uid: &str) -> Option<&OutputRecord> {
        self.results.iter().find(|r| r.uid == uid)
    }

    pub fn uids(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.uid.as_str())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Absolute path of a declared output file.
    ///
    /// Deliberate allow-list: returns `None` for any filename that does not
    /// appear under that output in the validated metadata, so a caller can
    /// never fetch an arbitrary filesystem path.
    pub fn get_file_path(&self, output: &str, filename: &str) -> Option<PathBuf> {
        let record = self.get(output)?;
        if !record.files.iter().any(|f| f.name == filename) {
            return None;
        }
        Some(resolve_name(&self.path, filename))
    }

    /// Testing helper: serialize the raw metadata back to the backing file
    /// and reload. Production metadata is producer-generated and read-only
    /// for the checker.
    pub fn write(&self) -> CoreResult<OutputsDocument> {
        fs::write(&self.path, serde_json::to_string_pretty(&self.raw)?)?;
        load(&self.path)
    }
}
