use sdc_core::metadata::annotate::QueryUrlBuilder;
use sdc_core::metadata::discover::find_metadata;
use sdc_core::metadata::document::{self, LoadOptions};
use serde_json::json;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: metadata_checker <outputs-dir> [supported-version]");
        std::process::exit(2);
    }
    let dir = std::path::Path::new(&args[1]);

    let mut options = LoadOptions::default();
    if let Some(version) = args.get(2) {
        options.supported_version = version.clone();
    }

    let path = match find_metadata(dir, &options) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("discovery error: {}", e);
            std::process::exit(1);
        }
    };

    let urls = QueryUrlBuilder::default();
    match document::load_with(&path, &options, &urls) {
        Ok(outputs) => {
            let summary = json!({
                "path": outputs.path(),
                "version": outputs.version(),
                "outputs": outputs
                    .results()
                    .iter()
                    .map(|record| {
                        json!({
                            "uid": record.uid,
                            "status": record.status,
                            "type": record.output_type,
                            "files": record
                                .files
                                .iter()
                                .map(|f| {
                                    json!({
                                        "name": f.name,
                                        "checksum": f.checksum,
                                        "checksum_valid": f.checksum_valid,
                                        "flagged_cells": f.cell_index.len(),
                                    })
                                })
                                .collect::<Vec<_>>(),
                        })
                    })
                    .collect::<Vec<_>>(),
            });
            println!("{summary:#}");
        }
        Err(e) => {
            eprintln!("load error: {}", e);
            std::process::exit(1);
        }
    }
}
