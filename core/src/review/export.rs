use crate::error::{CoreError, CoreResult};
use crate::metadata::document::OutputsDocument;
use crate::review::store::Review;
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::io::{Cursor, Write};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Build the release archive for a completed review.
///
/// This is the release-control boundary: the archive contains exactly the
/// approved files, a redacted metadata copy matching the approval decisions,
/// a human-readable summary, and a report of any approved files that were
/// missing on disk. A missing or unreadable file is reported, never fatal;
/// an unknown output id in the decisions is rejected before anything is
/// written.
pub fn create_release(outputs: &OutputsDocument, review: &Review) -> CoreResult<Cursor<Vec<u8>>> {
    for uid in review.decisions.keys() {
        if outputs.get(uid).is_none() {
            return Err(CoreError::UnknownOutput(uid.clone()));
        }
    }

    let approved = review.approved_outputs();
    let redacted = redact_metadata(outputs.raw_metadata(), review, &approved);

    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    // Fixed entry metadata keeps identical reviews byte-identical.
    let fixed_time = zip::DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0)
        .map_err(|_| CoreError::Zip("failed to create fixed zip datetime".to_string()))?;
    let opts = FileOptions::<()>::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(fixed_time)
        .unix_permissions(0o644);

    zw.start_file("results.json", opts)
        .map_err(|e| CoreError::Zip(e.to_string()))?;
    zw.write_all(serde_json::to_string_pretty(&redacted)?.as_bytes())?;

    let mut missing: Vec<String> = Vec::new();
    for uid in &approved {
        let Some(record) = outputs.get(uid) else {
            continue;
        };
        for file in &record.files {
            let Some(path) = outputs.get_file_path(uid, &file.name) else {
                continue;
            };
            // A single unreadable file must not block release of everything
            // else that is present.
            let bytes = if path.exists() { fs::read(&path).ok() } else { None };
            let Some(bytes) = bytes else {
                missing.push(path.display().to_string());
                continue;
            };
            let arcname = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.name.clone());
            zw.start_file(arcname, opts)
                .map_err(|e| CoreError::Zip(e.to_string()))?;
            zw.write_all(&bytes)?;
        }
    }

    if !missing.is_empty() {
        let mut report = String::from(
            "The following output files were not found when creating this zipfile:\n\n",
        );
        report.push_str(&missing.join("\n"));
        zw.start_file("missing-files.txt", opts)
            .map_err(|e| CoreError::Zip(e.to_string()))?;
        zw.write_all(report.as_bytes())?;
    }

    zw.start_file("summary.txt", opts)
        .map_err(|e| CoreError::Zip(e.to_string()))?;
    zw.write_all(render_summary(review, outputs).as_bytes())?;

    let mut cursor = zw.finish().map_err(|e| CoreError::Zip(e.to_string()))?;
    cursor.set_position(0);
    Ok(cursor)
}

/// Deep-copy the raw metadata, drop everything not approved, and annotate
/// the surviving results with the checker's comment and approved status.
fn redact_metadata(raw: &Value, review: &Review, approved: &[String]) -> Value {
    let mut redacted = raw.clone();
    let Some(results) = redacted.get_mut("results").and_then(Value::as_object_mut) else {
        return redacted;
    };

    results.retain(|uid, _| approved.iter().any(|a| a == uid));

    for (uid, entry) in results.iter_mut() {
        let Some(obj) = entry.as_object_mut() else {
            continue;
        };
        if let Some(comment) = review
            .decisions
            .get(uid)
            .and_then(|d| d.comment.as_deref())
            .filter(|c| !c.is_empty())
        {
            let comments = obj
                .entry("comments")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Some(list) = comments.as_array_mut() {
                list.push(Value::String(format!("Output Checker: {comment}")));
            }
        }
        obj.insert("status".to_string(), Value::String("approved".to_string()));
    }
    redacted
}

/// Plain-text summary of every decision, including the ACRO status read
/// from the original (non-redacted) document so rejected items report their
/// real status too.
pub fn render_summary(review: &Review, outputs: &OutputsDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Review summary for {}", review.path.display());
    if let Some(comment) = review.comment.as_deref().filter(|c| !c.is_empty()) {
        let _ = writeln!(out);
        let _ = writeln!(out, "Overall comment: {comment}");
    }
    let _ = writeln!(out);

    for (uid, decision) in &review.decisions {
        let verb = if decision.state { "APPROVED" } else { "REJECTED" };
        let acro_status = outputs
            .get(uid)
            .and_then(|r| r.status.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let _ = writeln!(out, "{uid}: {verb}");
        let _ = writeln!(out, "  ACRO status: {acro_status}");
        if let Some(comment) = decision.comment.as_deref().filter(|c| !c.is_empty()) {
            let _ = writeln!(out, "  Comment: {comment}");
        }
        let _ = writeln!(out);
    }
    out
}
