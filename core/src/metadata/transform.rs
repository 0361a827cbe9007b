use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use time::format_description::{self, well_known::Rfc3339};
use time::PrimitiveDateTime;

// example legacy timestamp: "2023-06-23-11472054"
const LEGACY_TIMESTAMP_FORMAT: &str = "[year]-[month]-[day]-[hour][minute][second][subsecond]";

/// Rewrite any legacy-shaped result (flat "output" path field, packed
/// "summary" and "comments" strings) into the canonical "files"-list shape.
///
/// This runs once, right after parsing, so nothing downstream ever sees the
/// legacy shape. Current-shape results pass through untouched.
pub fn normalize(raw: &mut Value) {
    let Some(results) = raw.get_mut("results").and_then(Value::as_object_mut) else {
        return;
    };
    for (uid, entry) in results.iter_mut() {
        if entry.get("files").is_some() || entry.get("output").is_none() {
            continue;
        }
        *entry = normalize_legacy(uid, entry);
    }
}

fn normalize_legacy(uid: &str, entry: &Value) -> Value {
    let files: Vec<Value> = match entry.get("output") {
        Some(Value::String(path)) => vec![json!({ "name": path })],
        Some(Value::Array(paths)) => paths
            .iter()
            .filter_map(Value::as_str)
            .map(|p| json!({ "name": p }))
            .collect(),
        _ => Vec::new(),
    };

    // "status; detail; detail" packed into one string
    let summary_raw = entry
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let mut parts = summary_raw
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let status = parts.next().unwrap_or("unknown").to_string();
    let summary = parts.collect::<Vec<_>>().join("; ");

    let command = entry
        .get("command")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    let outcome = match entry.get("outcome") {
        // older producers double-encoded the outcome mapping as a string
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|_| json!({})),
        Some(other) => other.clone(),
        None => json!({}),
    };

    let comments: Vec<String> = entry
        .get("comments")
        .and_then(Value::as_str)
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    let timestamp = entry
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_legacy_timestamp);

    json!({
        "uid": uid,
        "files": files,
        "status": status,
        "type": command_type(command),
        "properties": entry.get("properties").cloned().unwrap_or_else(|| json!({})),
        "outcome": outcome,
        "command": command,
        "summary": summary,
        "comments": comments,
        "timestamp": timestamp,
    })
}

/// Extract the output type from a recorded command line such as
/// `"safe_table = acro.crosstab(df.year, df.grant_type)"`.
fn command_type(command: &str) -> String {
    if command == "unknown" || command == "custom" {
        return command.to_string();
    }
    static TYPE_RE: OnceLock<Regex> = OnceLock::new();
    let re = TYPE_RE.get_or_init(|| Regex::new(r"acro\.(\w+)\(").expect("static regex"));
    re.captures(command)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_legacy_timestamp(raw: &str) -> Option<String> {
    let format = format_description::parse(LEGACY_TIMESTAMP_FORMAT).ok()?;
    let parsed = PrimitiveDateTime::parse(raw, &format).ok()?;
    parsed.assume_utc().format(&Rfc3339).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_doc() -> Value {
        json!({
            "version": "0.4.0",
            "results": {
                "safe_table-2023-06-23-11472054": {
                    "command": "safe_table = acro.crosstab(df.year, df.grant_type)",
                    "summary": "fail; threshold: 6 cells may need suppressing",
                    "outcome": "{\"yes\": \"ok\"}",
                    "output": "safe_table.csv",
                    "comments": "one, two ,",
                    "timestamp": "2023-06-23-11472054"
                }
            }
        })
    }

    #[test]
    fn legacy_result_is_rewritten_to_files_shape() {
        let mut raw = legacy_doc();
        normalize(&mut raw);

        let entry = &raw["results"]["safe_table-2023-06-23-11472054"];
        assert_eq!(entry["files"], json!([{ "name": "safe_table.csv" }]));
        assert_eq!(entry["status"], "fail");
        assert_eq!(entry["summary"], "threshold: 6 cells may need suppressing");
        assert_eq!(entry["type"], "crosstab");
        assert_eq!(entry["outcome"], json!({ "yes": "ok" }));
        assert_eq!(entry["comments"], json!(["one", "two"]));
        assert!(entry["timestamp"]
            .as_str()
            .unwrap()
            .starts_with("2023-06-23T11:47:20"));
    }

    #[test]
    fn list_valued_output_becomes_multiple_files() {
        let mut raw = json!({
            "results": {
                "plot": { "output": ["a.png", "b.png"], "summary": "review" }
            }
        });
        normalize(&mut raw);
        assert_eq!(
            raw["results"]["plot"]["files"],
            json!([{ "name": "a.png" }, { "name": "b.png" }])
        );
    }

    #[test]
    fn unparseable_command_maps_to_unknown() {
        let mut raw = json!({
            "results": {
                "x": { "output": "x.csv", "command": "something else entirely" }
            }
        });
        normalize(&mut raw);
        assert_eq!(raw["results"]["x"]["type"], "unknown");
    }

    #[test]
    fn custom_command_passes_through() {
        let mut raw = json!({
            "results": {
                "x": { "output": "x.csv", "command": "custom" }
            }
        });
        normalize(&mut raw);
        assert_eq!(raw["results"]["x"]["type"], "custom");
    }

    #[test]
    fn current_shape_is_untouched() {
        let mut raw = json!({
            "results": {
                "x": { "files": [{ "name": "x.csv" }], "status": "review" }
            }
        });
        let before = raw.clone();
        normalize(&mut raw);
        assert_eq!(raw, before);
    }
}
