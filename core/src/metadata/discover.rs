use crate::error::{CoreError, CoreResult};
use crate::integrity::checksums::ChecksumStore;
use crate::metadata::document::{self, LoadOptions};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use walkdir::WalkDir;

pub const DEFAULT_METADATA_NAME: &str = "outputs.json";

/// Version written into scaffolded documents: the lowest version this
/// viewer accepts.
pub const SCAFFOLD_VERSION: &str = "0.4.0";

const SCAFFOLD_COMMENT: &str =
    "This non-ACRO output metadata was auto generated by the SDC review tool";

/// Locate the authoritative metadata file for a directory.
///
/// `outputs.json` always wins. Failing that, a single `*.json` file is
/// taken as-is; among several, only structurally valid candidates count,
/// and more than one valid candidate is an error the checker must resolve
/// by hand - the tool never guesses which file is authoritative. A
/// directory with no usable candidate gets a scaffolded `outputs.json`.
pub fn find_metadata(dir: &Path, options: &LoadOptions) -> CoreResult<PathBuf> {
    let default = dir.join(DEFAULT_METADATA_NAME);
    if default.exists() {
        return Ok(default);
    }

    let mut json_files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    json_files.sort();

    if json_files.len() == 1 {
        return Ok(json_files.remove(0));
    }

    if json_files.len() > 1 {
        let mut valid: Vec<PathBuf> = json_files
            .into_iter()
            .filter(|candidate| document::validate_file(candidate, options).is_ok())
            .collect();
        match valid.len() {
            1 => return Ok(valid.remove(0)),
            0 => {}
            _ => {
                return Err(CoreError::MultipleMetadataFiles(
                    valid
                        .iter()
                        .map(|p| {
                            p.file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_else(|| p.display().to_string())
                        })
                        .collect(),
                ))
            }
        }
    }

    scaffold_metadata(&default, &ChecksumStore::for_metadata(&default))?;
    Ok(default)
}

/// Synthesize a minimal valid metadata document for a directory that lacks
/// one: one "custom" result per visible file, with the checksum baseline
/// recorded immediately so tampering after scaffold time is detectable.
pub fn scaffold_metadata(path: &Path, store: &ChecksumStore) -> CoreResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut results = Map::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry
            .map_err(|err| CoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let uid = entry.file_name().to_string_lossy().into_owned();
        if uid.starts_with('.') {
            continue;
        }

        let bytes = fs::read(entry.path())?;
        store.record_if_absent(&uid, &bytes)?;

        let timestamp = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|mtime| OffsetDateTime::from(mtime).format(&Rfc3339).ok());

        results.insert(
            uid.clone(),
            json!({
                "uid": uid.clone(),
                "files": [{ "name": uid.clone() }],
                "status": "review",
                "type": "custom",
                "properties": {},
                "outcome": {},
                "command": "custom",
                "summary": "review",
                "timestamp": timestamp,
                "comments": [SCAFFOLD_COMMENT],
            }),
        );
    }

    let metadata = json!({
        "version": SCAFFOLD_VERSION,
        "results": results,
    });
    fs::write(path, serde_json::to_string_pretty(&metadata)?)?;
    Ok(())
}
