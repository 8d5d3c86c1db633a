//! Pipeline orchestrator: ties page source → parser → sheet together.
//!
//! ## Run
//!
//! `run()`:
//!   1. Resolve the requested area codes (unknown code aborts before any fetch)
//!   2. Fetch the page once and parse it into a document tree
//!   3. For each area: locate its entries, parse each, keep complete records
//!   4. Sort by (area, date, institute) and write the CSV
//!
//! An area missing from the page contributes no rows. Entries that fail to
//! parse are logged and skipped.

use crate::config::AppConfig;
use crate::models::JobRecord;
use crate::scraper::cleaner::collapse_whitespace;
use crate::scraper::{AreaLocator, EntryParser, PageSource};
use crate::storage::{write_sheet, LinkLayout};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use scraper::Html;
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info, warn};

pub struct Pipeline<S: PageSource> {
    config: AppConfig,
    source: S,
}

impl<S: PageSource> Pipeline<S> {
    pub fn new(config: AppConfig, source: S) -> Self {
        Self { config, source }
    }

    pub async fn run(&self, area_codes: &[String], output: &Path, today: NaiveDate) -> Result<PipelineStats> {
        let areas = self
            .config
            .areas
            .resolve(area_codes)
            .context("Cannot select areas")?;
        info!("Scraping {} areas from {}", areas.len(), self.source.describe());

        let html = self.source.fetch_page().await?;
        let doc = Html::parse_document(&html);

        let locator = AreaLocator::new(&self.config.parser.heading_tag)?;
        let parser = EntryParser::new(&self.config.parser, today)?;

        let mut outcome = find_jobs(&doc, &areas, &locator, &parser);
        sort_jobs(&mut outcome.jobs);

        let layout = if self.config.parser.single_link {
            LinkLayout::Joined
        } else {
            LinkLayout::Split
        };
        write_sheet(output, &outcome.jobs, layout)?;

        let stats = PipelineStats {
            areas_requested: areas.len(),
            areas_missing: outcome.missing_areas.len(),
            jobs_written: outcome.jobs.len(),
            errors: outcome.errors,
        };
        info!(
            "=== Done: {} jobs | {} areas ({} missing) | {} entry errors ===",
            stats.jobs_written, stats.areas_requested, stats.areas_missing, stats.errors
        );
        Ok(stats)
    }
}

#[derive(Debug)]
pub struct PipelineStats {
    pub areas_requested: usize,
    pub areas_missing: usize,
    pub jobs_written: usize,
    pub errors: usize,
}

#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    pub jobs: Vec<JobRecord>,
    pub errors: usize,
    pub missing_areas: Vec<String>,
}

/// Complete records for one area, each tagged with it. `None` when the page
/// has no heading for the area.
pub fn find_area_jobs(
    doc: &Html,
    area: &str,
    locator: &AreaLocator,
    parser: &EntryParser,
) -> Option<(Vec<JobRecord>, usize)> {
    let entries = locator.find_area_jobs(doc, area)?;

    let mut jobs = Vec::new();
    let mut errors = 0usize;
    for entry in entries {
        match parser.parse(doc, entry) {
            Ok(Some(job)) if job.is_complete() => jobs.push(job.with_area(area)),
            Ok(_) => debug!("{}: skipping entry {:?}", area, entry_text(entry)),
            Err(e) => {
                warn!("Problem parsing entry: {} ({})", entry_text(entry), e);
                errors += 1;
            }
        }
    }

    info!("{}: {} jobs", area, jobs.len());
    Some((jobs, errors))
}

/// All areas, in the order given.
pub fn find_jobs(doc: &Html, areas: &[String], locator: &AreaLocator, parser: &EntryParser) -> ScrapeOutcome {
    let mut outcome = ScrapeOutcome::default();

    for area in areas {
        match find_area_jobs(doc, area, locator, parser) {
            Some((jobs, errors)) => {
                outcome.jobs.extend(jobs);
                outcome.errors += errors;
            }
            None => {
                warn!("Area {:?} not found on page", area);
                outcome.missing_areas.push(area.clone());
            }
        }
    }

    outcome
}

fn entry_text(entry: scraper::ElementRef<'_>) -> String {
    collapse_whitespace(&entry.text().collect::<String>())
}

/// Present values before absent ones.
fn cmp_present_first<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort by area, then date, then institute; undated entries and
/// entries without an institute go last within their group.
pub fn sort_jobs(jobs: &mut [JobRecord]) {
    jobs.sort_by(|a, b| {
        a.area
            .cmp(&b.area)
            .then_with(|| cmp_present_first(&a.date, &b.date))
            .then_with(|| cmp_present_first(&a.institute, &b.institute))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::loader::load_sheet;
    use crate::scraper::FileSource;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log lines for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    const PAGE: &str = r##"
<html><body>
<h1>Psychology Jobs 2024-2025</h1>
<h3>Developmental</h3>
<p><strong>Ohio State</strong> - Assistant Professor, infancy - <a href="https://osu.edu/j">ad</a> - Review begins Nov 1</p>
<p><a href="#utah">University of Utah (see Cognitive)</a></p>
<p><strong>Nowhere College</strong> - Lecturer - <em>no ad posted</em> - Dec 1</p>
<h3>Cognitive</h3>
<p><a name="utah"></a><strong>University of Utah</strong> - Open rank, cognition - <a href="https://utah.edu/1">one</a> <a href="https://utah.edu/2">two</a> - Dec 15 <strong>NEW</strong></p>
<p><strong>Yale</strong> - Postdoc - <a href="https://yale.edu/p">ad</a> - ongoing until filled</p>
<p><strong>Brown</strong> - Assistant Professor - <a href="https://brown.edu/a">ad</a> - Review begins Oct 1</p>
<p>see above</p>
<p><strong>Only Bold</strong> <a href="https://x.edu">x</a> -, -</p>
<h3>Health</h3>
</body></html>
"##;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
    }

    fn outcome(areas: &[&str]) -> ScrapeOutcome {
        let doc = Html::parse_document(PAGE);
        let locator = AreaLocator::new("h3").unwrap();
        let parser = EntryParser::new(&ParserConfig::default(), today()).unwrap();
        let areas: Vec<String> = areas.iter().map(|a| a.to_string()).collect();
        find_jobs(&doc, &areas, &locator, &parser)
    }

    fn job(area: &str, institute: Option<&str>, date: Option<(i32, u32, u32)>) -> JobRecord {
        JobRecord {
            area: area.into(),
            institute: institute.map(String::from),
            description: Some("d".into()),
            date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            ..JobRecord::default()
        }
    }

    #[test]
    fn test_find_jobs_tags_and_filters() {
        let out = outcome(&["Developmental", "Cognitive"]);

        let names: Vec<(&str, &str)> = out
            .jobs
            .iter()
            .map(|j| (j.area.as_str(), j.institute.as_deref().unwrap()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Developmental", "Ohio State"),
                ("Developmental", "University of Utah"),
                ("Cognitive", "University of Utah"),
                ("Cognitive", "Yale"),
                ("Cognitive", "Brown"),
            ]
        );
        // "Nowhere College" has no link; "see above" is too short to count
        assert_eq!(out.errors, 1);
        assert!(out.missing_areas.is_empty());
    }

    #[test]
    fn test_link_error_is_logged_with_entry_text() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let out = tracing::subscriber::with_default(subscriber, || outcome(&["Developmental", "Cognitive"]));
        assert_eq!(out.errors, 1);

        let text = logs.contents();
        assert!(text.contains(
            "Problem parsing entry: Nowhere College - Lecturer - no ad posted - Dec 1 (No link found)"
        ));
        assert!(!text.contains("see above"));
    }

    #[test]
    fn test_missing_area_contributes_no_rows() {
        let out = outcome(&["School", "Health"]);
        assert!(out.jobs.is_empty());
        assert_eq!(out.errors, 0);
        assert_eq!(out.missing_areas, vec!["School".to_string()]);
    }

    #[test]
    fn test_sort_groups_by_area_then_date_with_undated_last() {
        let mut jobs = vec![
            job("Health", None, Some((2024, 1, 1))),
            job("Cognitive", Some("B"), None),
            job("Cognitive", Some("Z"), Some((2024, 3, 1))),
            job("Health", Some("A"), None),
            job("Cognitive", Some("A"), None),
            job("Cognitive", Some("Y"), Some((2024, 1, 1))),
            job("Health", Some("C"), Some((2024, 1, 1))),
        ];
        sort_jobs(&mut jobs);

        let keys: Vec<(&str, Option<&str>, Option<String>)> = jobs
            .iter()
            .map(|j| (j.area.as_str(), j.institute.as_deref(), j.date.map(|d| d.to_string())))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Cognitive", Some("Y"), Some("2024-01-01".to_string())),
                ("Cognitive", Some("Z"), Some("2024-03-01".to_string())),
                ("Cognitive", Some("A"), None),
                ("Cognitive", Some("B"), None),
                ("Health", Some("C"), Some("2024-01-01".to_string())),
                ("Health", None, Some("2024-01-01".to_string())),
                ("Health", Some("A"), None),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_writes_sorted_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("page.html");
        let sheet = dir.path().join("jobs.csv");
        std::fs::write(&page, PAGE).unwrap();

        let pipeline = Pipeline::new(AppConfig::default(), FileSource::new(&page));
        let codes = vec!["dev".to_string(), "cog".to_string(), "school".to_string()];
        let stats = pipeline.run(&codes, &sheet, today()).await.unwrap();

        assert_eq!(stats.jobs_written, 5);
        assert_eq!(stats.areas_missing, 1);
        assert_eq!(stats.errors, 1);

        let header = std::fs::read_to_string(&sheet).unwrap();
        assert!(header.starts_with("area,institute,date,due,status,description,link1,link2\n"));

        let jobs = load_sheet(&sheet).unwrap();
        let order: Vec<&str> = jobs.iter().map(|j| j.institute.as_deref().unwrap()).collect();
        assert_eq!(
            order,
            vec!["Brown", "University of Utah", "Yale", "Ohio State", "University of Utah"]
        );

        let utah = &jobs[1];
        assert_eq!(utah.area, "Cognitive");
        assert_eq!(utah.status.as_deref(), Some("NEW"));
        assert_eq!(utah.description.as_deref(), Some("Open rank, cognition"));
        assert_eq!(utah.date, NaiveDate::from_ymd_opt(2024, 12, 15));
        assert_eq!(utah.links, vec!["https://utah.edu/1".to_string(), "https://utah.edu/2".to_string()]);

        assert_eq!(jobs[2].date, None);
        assert_eq!(jobs[2].due.as_deref(), Some("ongoing until filled"));
    }

    #[tokio::test]
    async fn test_unknown_area_code_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = dir.path().join("jobs.csv");

        let pipeline = Pipeline::new(AppConfig::default(), FileSource::new(dir.path().join("absent.html")));
        let err = pipeline
            .run(&["cog".to_string(), "astro".to_string()], &sheet, today())
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("unknown area code 'astro'"));
        assert!(!sheet.exists());
    }
}
