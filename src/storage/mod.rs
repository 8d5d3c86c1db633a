//! CSV sheet output.
//!
//! Fixed columns first, then the links. With [`LinkLayout::Split`] the link
//! columns are `link1..linkN` where N is the largest link count in the run,
//! so the header depends on the data.

use crate::models::JobRecord;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const BASE_COLUMNS: [&str; 6] = ["area", "institute", "date", "due", "status", "description"];

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayout {
    /// One `link` column, comma-joined.
    Joined,
    /// `link1`, `link2`, ... one URL per column.
    Split,
}

pub fn header(jobs: &[JobRecord], layout: LinkLayout) -> Vec<String> {
    let mut cols: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    match layout {
        LinkLayout::Joined => cols.push("link".to_string()),
        LinkLayout::Split => {
            let width = jobs.iter().map(|j| j.links.len()).max().unwrap_or(0);
            cols.extend((1..=width).map(|i| format!("link{}", i)));
        }
    }
    cols
}

fn row(job: &JobRecord, layout: LinkLayout, width: usize) -> Vec<String> {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();

    let mut cells = vec![
        job.area.clone(),
        opt(&job.institute),
        job.date.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default(),
        opt(&job.due),
        opt(&job.status),
        opt(&job.description),
    ];

    match layout {
        LinkLayout::Joined => cells.push(job.links.join(",")),
        LinkLayout::Split => {
            cells.extend((0..width).map(|i| job.links.get(i).cloned().unwrap_or_default()));
        }
    }
    cells
}

/// Serialize the sheet to any writer.
pub fn write_jobs<W: Write>(out: W, jobs: &[JobRecord], layout: LinkLayout) -> Result<()> {
    let header = header(jobs, layout);
    let width = header.len() - BASE_COLUMNS.len();

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&header)?;
    for job in jobs {
        writer.write_record(row(job, layout, width))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_sheet(path: &Path, jobs: &[JobRecord], layout: LinkLayout) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    write_jobs(file, jobs, layout).with_context(|| format!("Failed to write {:?}", path))?;
    info!("Wrote {} jobs to {:?}", jobs.len(), path);
    Ok(())
}
