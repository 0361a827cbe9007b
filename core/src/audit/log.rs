use crate::audit::event::{
    finalize_event, AuditEvent, OUTPUT_APPROVED, OUTPUT_REJECTED, RELEASE_CREATED, ZERO_HASH_64,
};
use crate::error::{CoreError, CoreResult};
use crate::review::store::Review;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use time::format_description::well_known::Rfc3339;

/// Append-only NDJSON audit log. Each line carries the hash of the previous
/// one; reopening resumes the chain from the tail.
pub struct AuditLog {
    path: std::path::PathBuf,
    last_hash: String,
}

impl AuditLog {
    pub fn open_or_create(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            File::create(&path)?;
            return Ok(Self {
                path,
                last_hash: ZERO_HASH_64.to_string(),
            });
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut last_hash = ZERO_HASH_64.to_string();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let v: Value = serde_json::from_str(&line)?;
            let eh = v
                .get("event_hash")
                .and_then(|x| x.as_str())
                .ok_or_else(|| {
                    CoreError::InvalidInput("audit log line missing event_hash".to_string())
                })?;
            last_hash = eh.to_string();
        }
        Ok(Self { path, last_hash })
    }

    pub fn append(&mut self, mut event: AuditEvent) -> CoreResult<AuditEvent> {
        event.prev_event_hash = self.last_hash.clone();
        let event = finalize_event(event)?;
        let line = serde_json::to_string(&event)?;
        let mut f = OpenOptions::new().append(true).open(&self.path)?;
        f.write_all(line.as_bytes())?;
        f.write_all(b"\n")?;
        self.last_hash = event.event_hash.clone();
        Ok(event)
    }
}

/// Record one audit line per decision plus one for the release itself.
pub fn log_release(
    audit: &mut AuditLog,
    review_id: &str,
    actor: &str,
    review: &Review,
) -> CoreResult<()> {
    for (uid, decision) in &review.decisions {
        let event_type = if decision.state {
            OUTPUT_APPROVED
        } else {
            OUTPUT_REJECTED
        };
        audit.append(AuditEvent {
            ts_utc: now_rfc3339_utc(),
            event_type: event_type.to_string(),
            review_id: review_id.to_string(),
            actor: actor.to_string(),
            details: serde_json::json!({
                "output": uid,
                "comment": decision.comment,
            }),
            prev_event_hash: String::new(),
            event_hash: String::new(),
        })?;
    }

    audit.append(AuditEvent {
        ts_utc: now_rfc3339_utc(),
        event_type: RELEASE_CREATED.to_string(),
        review_id: review_id.to_string(),
        actor: actor.to_string(),
        details: serde_json::json!({
            "path": review.path,
            "outputs": review.approved_outputs(),
        }),
        prev_event_hash: String::new(),
        event_hash: String::new(),
    })?;
    Ok(())
}

fn now_rfc3339_utc() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
