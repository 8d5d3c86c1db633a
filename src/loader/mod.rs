//! Read a written sheet back into records.

use crate::models::JobRecord;
use crate::storage::DATE_FORMAT;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;
use tracing::{debug, warn};

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Split a joined `link` cell. A comma only starts a new link when what
/// follows looks like one (`scheme://`, `#fragment` or `/path`), so commas
/// inside a URL survive.
pub fn split_joined_links(cell: &str) -> Vec<String> {
    let starts_link = |piece: &str| {
        let piece = piece.trim_start();
        piece.starts_with('#')
            || piece.starts_with('/')
            || piece.split_once("://").is_some_and(|(scheme, _)| {
                !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+.-".contains(c))
            })
    };

    let mut links: Vec<String> = Vec::new();
    for piece in cell.split(',') {
        match links.last_mut() {
            Some(last) if !starts_link(piece) => {
                last.push(',');
                last.push_str(piece);
            }
            _ => links.push(piece.to_string()),
        }
    }
    links.into_iter().filter_map(|l| non_empty(Some(&l))).collect()
}

/// Accepts both the single `link` column and `link1..linkN`.
pub fn load_sheet(path: &Path) -> Result<Vec<JobRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let headers = reader.headers()?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);
    let (area, institute, date, due, status, description) = (
        col("area"),
        col("institute"),
        col("date"),
        col("due"),
        col("status"),
        col("description"),
    );
    let joined = col("link");
    let split: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.strip_prefix("link").is_some_and(|n| n.parse::<usize>().is_ok()))
        .map(|(i, _)| i)
        .collect();

    let mut jobs = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                continue;
            }
        };
        let get = |idx: Option<usize>| idx.and_then(|i| record.get(i));

        let links = match joined {
            Some(idx) => record
                .get(idx)
                .map(split_joined_links)
                .unwrap_or_default(),
            None => split.iter().filter_map(|&idx| non_empty(record.get(idx))).collect(),
        };

        jobs.push(JobRecord {
            area: get(area).unwrap_or_default().to_string(),
            institute: non_empty(get(institute)),
            status: non_empty(get(status)),
            description: non_empty(get(description)),
            date: get(date).and_then(|d| NaiveDate::parse_from_str(d.trim(), DATE_FORMAT).ok()),
            due: non_empty(get(due)),
            links,
        });
    }

    debug!("{:?}: {} rows loaded", path, jobs.len());
    Ok(jobs)
}
