//! Response mapping from Altary API JSON to [`altary_types`] records.
//!
//! The service is loose about shapes: ids arrive as strings or numbers under
//! more than one key, lists may or may not be wrapped in an envelope, and
//! application errors can come back with a 2xx status. Everything is parsed
//! from [`serde_json::Value`] so those variations are handled in one place.

use std::collections::BTreeSet;

use altary_types::{AltaryError, CompletionOutcome, ErrorRecord, Project, SimilarCompletion};
use serde_json::Value;

// ─── Projects ────────────────────────────────────────────────────────────────

/// Parse a `GET /users/getUserProjects` payload.
///
/// Accepts a bare array, a `{"projects": [...]}` envelope, or a single
/// project object. An object carrying only `error`/`message` is an
/// application error.
pub(crate) fn parse_projects(json: &Value, status: u16) -> Result<Vec<Project>, AltaryError> {
    match json {
        Value::Array(items) => items.iter().map(|v| parse_project(v, status)).collect(),
        Value::Object(map) => {
            if let Some(projects) = map.get("projects") {
                let items = projects
                    .as_array()
                    .ok_or_else(|| malformed(status, "`projects` is not an array"))?;
                return items.iter().map(|v| parse_project(v, status)).collect();
            }
            if map.contains_key("error") || map.contains_key("message") {
                return Err(application_error(json, status));
            }
            Ok(vec![parse_project(json, status)?])
        }
        other => Err(malformed(
            status,
            &format!("expected a project list, got {}", type_name(other)),
        )),
    }
}

fn parse_project(json: &Value, status: u16) -> Result<Project, AltaryError> {
    let id = id_field(json, "report_rand")
        .ok_or_else(|| malformed(status, "project without an id"))?;
    let name = json
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(Project { id, name })
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Parse a `GET /issues/getError/{project_id}` payload.
///
/// The usual shape is `{"status": "success", "errors": [...]}`; a bare array
/// is accepted as well. Order is preserved.
pub(crate) fn parse_errors(json: &Value, status: u16) -> Result<Vec<ErrorRecord>, AltaryError> {
    let items = match json {
        Value::Array(items) => items,
        Value::Object(map) => {
            ensure_success(json, status)?;
            match map.get("errors") {
                None | Some(Value::Null) => return Ok(Vec::new()),
                Some(Value::Array(items)) => items,
                Some(_) => return Err(malformed(status, "`errors` is not an array")),
            }
        }
        other => {
            return Err(malformed(
                status,
                &format!("expected an error list, got {}", type_name(other)),
            ));
        }
    };
    items.iter().map(|v| parse_error_record(v, status)).collect()
}

fn parse_error_record(json: &Value, status: u16) -> Result<ErrorRecord, AltaryError> {
    let id = id_field(json, "rand").ok_or_else(|| malformed(status, "error without an id"))?;
    Ok(ErrorRecord {
        id,
        file: string_field(json, "file").unwrap_or_default(),
        line: line_field(json),
        message: string_field(json, "message").unwrap_or_default(),
        ai_summary: string_field(json, "ai_summary"),
        ai_suggestion: string_field(json, "ai_suggestion"),
    })
}

// ─── Completion ──────────────────────────────────────────────────────────────

/// Parse a `POST /issues/completeErrorWithSimilar/{error_id}` payload.
///
/// `completed_ids` is authoritative when present. Otherwise the set is built
/// from `target_error_rand` and the ids in `completed_errors`, and holds only
/// ids the service actually named; a bare success leaves it empty.
pub(crate) fn parse_completion(
    json: &Value,
    status: u16,
    requested_id: &str,
) -> Result<CompletionOutcome, AltaryError> {
    if !json.is_object() {
        return Err(malformed(
            status,
            &format!("expected a completion object, got {}", type_name(json)),
        ));
    }
    ensure_success(json, status)?;

    let reported_target = json
        .get("target_error_rand")
        .and_then(scalar_to_string)
        .filter(|id| !id.is_empty());
    let target_id = reported_target
        .clone()
        .unwrap_or_else(|| requested_id.to_string());

    let similar: Vec<SimilarCompletion> = match json.get("completed_errors") {
        Some(Value::Array(items)) => items.iter().map(parse_similar).collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(_) => return Err(malformed(status, "`completed_errors` is not an array")),
    };

    let completed_ids: BTreeSet<String> = match json.get("completed_ids") {
        Some(Value::Array(ids)) => ids.iter().filter_map(scalar_to_string).collect(),
        Some(Value::Null) | None => reported_target
            .into_iter()
            .chain(similar.iter().filter_map(|s| s.id.clone()))
            .collect(),
        Some(_) => return Err(malformed(status, "`completed_ids` is not an array")),
    };

    Ok(CompletionOutcome {
        target_id,
        completed_ids,
        similar,
    })
}

fn parse_similar(json: &Value) -> SimilarCompletion {
    SimilarCompletion {
        id: id_field(json, "rand"),
        similarity: json.get("similarity").and_then(Value::as_f64),
        message: string_field(json, "message"),
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// An object with a `status` other than `"success"` is an application error.
fn ensure_success(json: &Value, status: u16) -> Result<(), AltaryError> {
    match json.get("status").and_then(Value::as_str) {
        Some(s) if s != "success" => Err(application_error(json, status)),
        _ => Ok(()),
    }
}

fn application_error(json: &Value, status: u16) -> AltaryError {
    let message = ["message", "error"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .unwrap_or("unknown error")
        .to_string();
    AltaryError::Remote { status, message }
}

fn malformed(status: u16, detail: &str) -> AltaryError {
    AltaryError::Remote {
        status,
        message: format!("malformed response: {detail}"),
    }
}

/// Read an identifier from `preferred`, falling back to `id`.
fn id_field(json: &Value, preferred: &str) -> Option<String> {
    json.get(preferred)
        .and_then(scalar_to_string)
        .or_else(|| json.get("id").and_then(scalar_to_string))
        .filter(|id| !id.is_empty())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_field(json: &Value, key: &str) -> Option<String> {
    json.get(key).and_then(Value::as_str).map(str::to_string)
}

fn line_field(json: &Value) -> Option<i64> {
    match json.get("line")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projects_from_bare_array() {
        let projects = parse_projects(
            &json!([{"id": "p1", "name": "One"}, {"id": 2, "name": "Two"}]),
            200,
        )
        .unwrap();
        assert_eq!(
            projects,
            vec![
                Project { id: "p1".into(), name: "One".into() },
                Project { id: "2".into(), name: "Two".into() },
            ]
        );
    }

    #[test]
    fn projects_prefer_report_rand() {
        let projects =
            parse_projects(&json!([{"id": 7, "report_rand": "ALTR-abc", "name": "Web"}]), 200)
                .unwrap();
        assert_eq!(projects[0].id, "ALTR-abc");
    }

    #[test]
    fn projects_from_envelope() {
        let projects =
            parse_projects(&json!({"projects": [{"id": "p1", "name": "One"}]}), 200).unwrap();
        assert_eq!(projects.len(), 1);
    }

    #[test]
    fn single_project_object_is_wrapped() {
        let projects = parse_projects(&json!({"id": "p1", "name": "Solo"}), 200).unwrap();
        assert_eq!(projects, vec![Project { id: "p1".into(), name: "Solo".into() }]);
    }

    #[test]
    fn project_error_object_is_remote_error() {
        let err = parse_projects(&json!({"message": "account suspended"}), 200).unwrap_err();
        match err {
            AltaryError::Remote { status, message } => {
                assert_eq!(status, 200);
                assert_eq!(message, "account suspended");
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn project_without_id_is_malformed() {
        let err = parse_projects(&json!([{"name": "nameless"}]), 200).unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn projects_reject_scalars() {
        assert!(parse_projects(&json!("nope"), 200).is_err());
    }

    #[test]
    fn errors_preserve_order_and_annotations() {
        let records = parse_errors(
            &json!({
                "status": "success",
                "errors": [
                    {"rand": "E2", "file": "b.js", "line": 3, "message": "second",
                     "ai_summary": "null deref", "ai_suggestion": null},
                    {"id": "E1", "file": "a.js", "line": "12", "message": "first"}
                ]
            }),
            200,
        )
        .unwrap();
        assert_eq!(records[0].id, "E2");
        assert_eq!(records[0].line, Some(3));
        assert_eq!(records[0].ai_summary.as_deref(), Some("null deref"));
        assert_eq!(records[0].ai_suggestion, None);
        assert_eq!(records[1].id, "E1");
        assert_eq!(records[1].line, Some(12));
        assert_eq!(records[1].ai_summary, None);
    }

    #[test]
    fn empty_annotation_is_passed_through() {
        let records =
            parse_errors(&json!([{"id": "E1", "message": "m", "ai_summary": ""}]), 200).unwrap();
        assert_eq!(records[0].ai_summary.as_deref(), Some(""));
        assert_eq!(records[0].file, "");
        assert_eq!(records[0].line, None);
    }

    #[test]
    fn errors_missing_list_is_empty() {
        assert!(parse_errors(&json!({"status": "success"}), 200).unwrap().is_empty());
    }

    #[test]
    fn errors_non_success_status_is_remote_error() {
        let err = parse_errors(&json!({"status": "error", "message": "quota"}), 200).unwrap_err();
        assert!(matches!(err, AltaryError::Remote { ref message, .. } if message == "quota"));
    }

    #[test]
    fn completion_uses_completed_ids_when_present() {
        let outcome = parse_completion(
            &json!({"completed_ids": ["E3", "E1", "E2"]}),
            200,
            "E1",
        )
        .unwrap();
        let expected: BTreeSet<String> = ["E1", "E2", "E3"].into_iter().map(String::from).collect();
        assert_eq!(outcome.completed_ids, expected);
        assert_eq!(outcome.target_id, "E1");
    }

    #[test]
    fn completion_from_detailed_shape() {
        let outcome = parse_completion(
            &json!({
                "status": "success",
                "target_error_rand": "E1",
                "similar_completed": 2,
                "completed_errors": [
                    {"rand": "E2", "similarity": 0.93, "message": "same stack"},
                    {"rand": "E3", "similarity": 0.81, "message": "same file"}
                ]
            }),
            200,
            "E1",
        )
        .unwrap();
        assert_eq!(outcome.completed_ids.len(), 3);
        assert!(outcome.completed_ids.contains("E2"));
        assert_eq!(outcome.similar[0].similarity, Some(0.93));
        assert_eq!(outcome.similar_count(), 2);
    }

    #[test]
    fn bare_success_reports_no_ids() {
        let outcome = parse_completion(&json!({"status": "success"}), 200, "E9").unwrap();
        assert_eq!(outcome.target_id, "E9");
        assert!(outcome.completed_ids.is_empty());
        assert!(outcome.similar.is_empty());
        assert_eq!(outcome.similar_count(), 0);
    }

    #[test]
    fn similar_ids_without_target_exclude_requested_id() {
        let outcome = parse_completion(
            &json!({"completed_errors": [{"rand": "E4", "similarity": 0.9}]}),
            200,
            "E9",
        )
        .unwrap();
        let expected: BTreeSet<String> = ["E4"].into_iter().map(String::from).collect();
        assert_eq!(outcome.completed_ids, expected);
        assert_eq!(outcome.target_id, "E9");
        assert_eq!(outcome.similar_count(), 1);
    }

    #[test]
    fn completion_failure_status() {
        let err = parse_completion(
            &json!({"status": "error", "message": "already completed"}),
            200,
            "E1",
        )
        .unwrap_err();
        assert!(err.to_string().contains("already completed"));
    }
}
