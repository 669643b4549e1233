//! Tabular listing of Minio resources
//!
//! Renders the same columns as the CRD's printer columns so the operator
//! binary can be used for a quick look without kubectl.

use chrono::{DateTime, Utc};
use kube::ResourceExt;

use crate::controller::ResourceStore;
use crate::crd::Minio;
use crate::Error;

const HEADERS: &[&str] = &["NAMESPACE", "NAME", "READY", "STATUS", "AGE"];

/// List Minio resources and render them as a table
pub async fn list_table(
    store: &dyn ResourceStore,
    namespace: Option<String>,
    now: DateTime<Utc>,
) -> Result<String, Error> {
    let mut minios = store.list_minios(namespace).await?;
    minios.sort_by_key(|m| (m.namespace(), m.name_any()));
    Ok(render_table(HEADERS, &rows(&minios, now)))
}

fn rows(minios: &[Minio], now: DateTime<Utc>) -> Vec<Vec<String>> {
    minios
        .iter()
        .map(|minio| {
            let age = minio
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|t| format_age(&t.0, now))
                .unwrap_or_else(|| "-".to_string());
            let message = match minio.ready_message() {
                "" => "-".to_string(),
                message => message.to_string(),
            };

            vec![
                minio.namespace().unwrap_or_else(|| "-".to_string()),
                minio.name_any(),
                minio.ready_status().to_string(),
                message,
                age,
            ]
        })
        .collect()
}

/// Format the time since `timestamp` as a short age (e.g. "2d", "5h", "30m", "15s")
pub fn format_age(timestamp: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(*timestamp);

    let total_secs = duration.num_seconds();
    if total_secs < 0 {
        return "0s".to_string();
    }

    let days = duration.num_days();
    if days > 0 {
        return format!("{days}d");
    }

    let hours = duration.num_hours();
    if hours > 0 {
        return format!("{hours}h");
    }

    let minutes = duration.num_minutes();
    if minutes > 0 {
        return format!("{minutes}m");
    }

    format!("{total_secs}s")
}

/// Render rows as a column-aligned table under `headers`
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.len());
            }
        }
    }

    let render_line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{cell:<w$}")
            })
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut lines = vec![render_line(headers.to_vec())];
    lines.extend(
        rows.iter()
            .map(|row| render_line(row.iter().map(String::as_str).collect())),
    );
    lines.join("\n")
}
