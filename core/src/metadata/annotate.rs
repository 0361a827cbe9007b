use crate::error::CoreResult;
use crate::integrity::checksums::ChecksumStore;
use crate::metadata::document::{resolve_name, OutputRecord};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use url::Url;

/// Builds the fetch URL the UI uses to retrieve one output file. The core
/// never constructs HTTP routes itself.
pub trait UrlBuilder {
    fn file_url(&self, metadata_path: &Path, output: &str, filename: &str) -> String;
}

/// Default builder: a single contents endpoint plus a query string
/// identifying the document, output and file.
#[derive(Debug, Clone)]
pub struct QueryUrlBuilder {
    base: Url,
}

impl QueryUrlBuilder {
    pub fn new(base: Url) -> Self {
        Self { base }
    }
}

impl Default for QueryUrlBuilder {
    fn default() -> Self {
        Self::new(Url::parse("http://localhost/contents/").expect("static base url"))
    }
}

impl UrlBuilder for QueryUrlBuilder {
    fn file_url(&self, metadata_path: &Path, output: &str, filename: &str) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("path", &metadata_path.to_string_lossy())
            .append_pair("output", output)
            .append_pair("filename", filename);
        url.to_string()
    }
}

/// Enrich every file record with its fetch URL, checksum state and the
/// inverted disclosure-flag cell index.
///
/// Existing files get a baseline digest recorded on first sight, then are
/// verified against the stored baseline. A file missing from disk keeps
/// `(None, false)` and is never hashed.
pub fn annotate(
    metadata_path: &Path,
    results: &mut [OutputRecord],
    store: &ChecksumStore,
    urls: &dyn UrlBuilder,
) -> CoreResult<()> {
    for record in results.iter_mut() {
        let uid = record.uid.clone();
        for file in &mut record.files {
            file.url = Some(urls.file_url(metadata_path, &uid, &file.name));

            file.checksum = None;
            file.checksum_valid = false;
            let actual = resolve_name(metadata_path, &file.name);
            if actual.exists() {
                let bytes = fs::read(&actual)?;
                store.record_if_absent(&file.name, &bytes)?;
                let (checksum, valid) = store.verify(&file.name, &bytes)?;
                file.checksum = checksum;
                file.checksum_valid = valid;
            }

            file.cell_index = build_cell_index(file.sdc.as_ref().map(|s| &s.cells));
        }
    }
    Ok(())
}

/// Invert flag -> [row, col] pairs into "row,col" -> [flags], so the UI can
/// answer "what flags apply to this cell" without scanning every flag.
fn build_cell_index(cells: Option<&Map<String, Value>>) -> BTreeMap<String, Vec<String>> {
    let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let Some(cells) = cells else {
        return index;
    };
    for (flag, coords) in cells {
        let Some(coords) = coords.as_array() else {
            continue;
        };
        for pair in coords {
            let Some(pair) = pair.as_array() else {
                continue;
            };
            let row = pair.first().and_then(Value::as_i64);
            let col = pair.get(1).and_then(Value::as_i64);
            if let (Some(row), Some(col)) = (row, col) {
                index.entry(format!("{row},{col}")).or_default().push(flag.clone());
            }
        }
    }
    index
}
