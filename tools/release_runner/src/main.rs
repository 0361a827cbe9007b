use sdc_core::audit::log::{log_release, AuditLog};
use sdc_core::metadata::annotate::QueryUrlBuilder;
use sdc_core::metadata::discover::find_metadata;
use sdc_core::metadata::document::{self, LoadOptions};
use sdc_core::review::export::create_release;
use sdc_core::review::store::{InMemoryReviewStore, Review, ReviewDecision, ReviewStore};
use std::collections::BTreeMap;
use std::io::Read;

#[derive(serde::Deserialize)]
struct DecisionsFile {
    #[serde(default)]
    comment: Option<String>,
    decisions: BTreeMap<String, ReviewDecision>,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("usage: release_runner <outputs-dir> <decisions.json> <out-zip> [checker-name]");
        std::process::exit(2);
    }
    let dir = std::path::Path::new(&args[1]);
    let decisions_path = std::path::Path::new(&args[2]);
    let out_zip = std::path::Path::new(&args[3]);
    let actor = args.get(4).map(String::as_str).unwrap_or("output-checker");

    let options = LoadOptions::default();
    let metadata_path = match find_metadata(dir, &options) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("discovery error: {}", e);
            std::process::exit(1);
        }
    };

    let urls = QueryUrlBuilder::default();
    let outputs = match document::load_with(&metadata_path, &options, &urls) {
        Ok(outputs) => outputs,
        Err(e) => {
            eprintln!("load error: {}", e);
            std::process::exit(1);
        }
    };

    let decisions: DecisionsFile = match std::fs::read_to_string(decisions_path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(decisions) => decisions,
        Err(e) => {
            eprintln!("invalid decisions file: {}", e);
            std::process::exit(1);
        }
    };

    let review = Review {
        path: metadata_path.clone(),
        comment: decisions.comment,
        decisions: decisions.decisions,
    };

    let mut store = InMemoryReviewStore::new();
    let review_id = store.create(review.clone());

    let mut archive = match create_release(&outputs, &review) {
        Ok(archive) => archive,
        Err(e) => {
            eprintln!("release error: {}", e);
            std::process::exit(1);
        }
    };
    let mut bytes = Vec::new();
    if let Err(e) = archive.read_to_end(&mut bytes) {
        eprintln!("release error: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = std::fs::write(out_zip, &bytes) {
        eprintln!("failed to write {}: {}", out_zip.display(), e);
        std::process::exit(1);
    }

    let audit_path = dir.join("release-audit.ndjson");
    let result = AuditLog::open_or_create(&audit_path)
        .and_then(|mut audit| log_release(&mut audit, &review_id, actor, &review));
    if let Err(e) = result {
        eprintln!("audit error: {}", e);
        std::process::exit(1);
    }

    println!(
        "released {} outputs to {}",
        review.approved_outputs().len(),
        out_zip.display()
    );
    store.delete(&review_id);
}
