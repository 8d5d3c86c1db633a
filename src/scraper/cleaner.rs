use chrono::{Datelike, Days, NaiveDate, Weekday};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static RE_WORD_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w.*\w").expect("invalid regex: word span"));

static RE_DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<composite>\d{1,4}(?:[/.\-]\d{1,4}){1,2})|(?P<num>\d+)(?P<suffix>[[:alpha:]]+)?|(?P<word>[^\W\d_]+)|(?P<space>\s+)|(?P<other>.)",
    )
    .expect("invalid regex: date token")
});

// ── Text ──────────────────────────────────────────────────────────────────────

/// Substring from the first to the last word character on the first line.
/// "  - Assistant Professor, tenure track.\n" → "Assistant Professor, tenure track"
pub fn trim_to_words(s: &str) -> Option<String> {
    RE_WORD_SPAN.find(s).map(|m| m.as_str().to_string())
}

/// Collapse runs of whitespace for log output.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Fuzzy dates ───────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("string does not contain a date: {0:?}")]
    NoDate(String),
    #[error("month given more than once: {0:?}")]
    MonthTwice(String),
    #[error("date out of range: {year}-{month}-{day}")]
    OutOfRange { year: i32, month: u32, day: u32 },
}

/// A date pulled out of free text, plus the text around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyDate {
    pub date: NaiveDate,
    /// Runs of consecutive non-date tokens, in order, untrimmed.
    pub skipped: Vec<String>,
}

impl FuzzyDate {
    /// First surrounding fragment with any content, trimmed.
    pub fn leading_text(&self) -> Option<String> {
        self.skipped
            .iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Month(u32),
    Weekday(Weekday),
    /// Fully separated numeric date, parts in written order.
    Composite([Option<u32>; 3], [usize; 3]),
    /// Bare number and its digit count.
    Number(u32, usize),
    Skip,
}

struct Token<'a> {
    text: &'a str,
    kind: Kind,
    used: bool,
}

fn month_from_name(word: &str) -> Option<u32> {
    let m = match word.to_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(m)
}

fn weekday_from_name(word: &str) -> Option<Weekday> {
    let d = match word.to_lowercase().as_str() {
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tues" | "tuesday" => Weekday::Tue,
        "wed" | "wednesday" => Weekday::Wed,
        "thu" | "thur" | "thurs" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        "sun" | "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(d)
}

fn is_ordinal(suffix: &str) -> bool {
    matches!(
        suffix.to_lowercase().as_str(),
        "st" | "nd" | "rd" | "th"
    )
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    RE_DATE_TOKEN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let kind = if let Some(m) = caps.name("composite") {
                let mut parts = [None; 3];
                let mut widths = [0; 3];
                for (i, p) in m.as_str().split(['/', '.', '-']).take(3).enumerate() {
                    parts[i] = p.parse().ok();
                    widths[i] = p.len();
                }
                Kind::Composite(parts, widths)
            } else if let Some(m) = caps.name("num") {
                let plain = caps.name("suffix").map(|s| is_ordinal(s.as_str())).unwrap_or(true);
                match m.as_str().parse::<u32>() {
                    Ok(n) if plain && m.as_str().len() <= 4 => Kind::Number(n, m.as_str().len()),
                    _ => Kind::Skip,
                }
            } else if let Some(m) = caps.name("word") {
                month_from_name(m.as_str())
                    .map(Kind::Month)
                    .or_else(|| weekday_from_name(m.as_str()).map(Kind::Weekday))
                    .unwrap_or(Kind::Skip)
            } else {
                Kind::Skip
            };
            Some(Token {
                text: whole.as_str(),
                kind,
                used: false,
            })
        })
        .collect()
}

/// Two-digit years land within fifty years of the reference year.
fn expand_year(year: u32, width: usize, reference: NaiveDate) -> i32 {
    let year = year as i32;
    if width > 2 || year >= 100 {
        return year;
    }
    let ref_year = reference.year();
    let mut full = year + ref_year / 100 * 100;
    if full >= ref_year + 50 {
        full -= 100;
    } else if full < ref_year - 50 {
        full += 100;
    }
    full
}

#[derive(Debug, Default)]
struct Fields {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    weekday: Option<Weekday>,
}

impl Fields {
    fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.day.is_none() && self.weekday.is_none()
    }

    /// y/m/d when the first part is four digits, m/d/y otherwise.
    fn apply_composite(&mut self, parts: [Option<u32>; 3], widths: [usize; 3], reference: NaiveDate) -> bool {
        let [a, b, c] = parts;
        match (a, b, c) {
            (Some(y), Some(m), Some(d)) if widths[0] == 4 => {
                self.year = Some(y as i32);
                self.month = Some(m);
                self.day = Some(d);
            }
            (Some(m), Some(d), Some(y)) => {
                self.month = Some(m);
                self.day = Some(d);
                self.year = Some(expand_year(y, widths[2], reference));
            }
            (Some(y), Some(m), None) if widths[0] == 4 => {
                self.year = Some(y as i32);
                self.month = Some(m);
            }
            (Some(m), Some(y), None) if widths[1] == 4 => {
                self.month = Some(m);
                self.year = Some(y as i32);
            }
            (Some(m), Some(d), None) => {
                self.month = Some(m);
                self.day = Some(d);
            }
            _ => return false,
        }
        true
    }
}

/// Find a date inside free text.
///
/// Month and weekday names, numeric dates like `1/15/2025` or `2025-01-15`,
/// years, and day numbers (optionally `15th`) are date tokens; everything
/// else is collected into [`FuzzyDate::skipped`]. Fields the text does not
/// mention come from `reference`. A lone weekday means the next such day on
/// or after `reference`.
pub fn parse_fuzzy_date(text: &str, reference: NaiveDate) -> Result<FuzzyDate, DateError> {
    let mut tokens = tokenize(text);
    let mut fields = Fields::default();

    // Names first: they pin the month regardless of where numbers sit.
    for tok in tokens.iter_mut() {
        match tok.kind {
            Kind::Month(_) if fields.month.is_some() => {
                return Err(DateError::MonthTwice(text.to_string()));
            }
            Kind::Month(m) => {
                fields.month = Some(m);
                tok.used = true;
            }
            Kind::Weekday(d) if fields.weekday.is_none() => {
                fields.weekday = Some(d);
                tok.used = true;
            }
            _ => {}
        }
    }
    let month_named = fields.month.is_some();

    if month_named && tokens.iter().any(|t| matches!(t.kind, Kind::Composite(..))) {
        return Err(DateError::MonthTwice(text.to_string()));
    }

    if !month_named {
        if let Some(tok) = tokens
            .iter_mut()
            .find(|t| matches!(t.kind, Kind::Composite(..)))
        {
            if let Kind::Composite(parts, widths) = tok.kind {
                tok.used = fields.apply_composite(parts, widths, reference);
            }
        }
    }

    // Bare numbers in reading order.
    let numbers: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| matches!(t.kind, Kind::Number(..)))
        .map(|(i, _)| i)
        .collect();

    for (pos, &i) in numbers.iter().enumerate() {
        let Kind::Number(n, width) = tokens[i].kind else { continue };
        let next_small = numbers[pos + 1..].iter().any(|&j| {
            matches!(tokens[j].kind, Kind::Number(v, w) if w <= 2 && (1..=31).contains(&v))
        });

        let used = if width == 4 || n > 31 {
            if fields.year.is_none() {
                fields.year = Some(n as i32);
                true
            } else {
                false
            }
        } else if n == 0 {
            false
        } else if fields.month.is_none() && fields.day.is_none() && n <= 12 && next_small {
            fields.month = Some(n);
            true
        } else if fields.day.is_none() {
            fields.day = Some(n);
            true
        } else if fields.month.is_none() && n <= 12 {
            fields.month = Some(n);
            true
        } else if fields.year.is_none() && fields.month.is_some() {
            fields.year = Some(expand_year(n, width, reference));
            true
        } else {
            false
        };
        tokens[i].used = used;
    }

    if fields.is_empty() {
        return Err(DateError::NoDate(text.to_string()));
    }

    let date = build_date(&fields, reference)?;

    let mut skipped = Vec::new();
    let mut current = String::new();
    for tok in &tokens {
        if tok.used {
            if !current.is_empty() {
                skipped.push(std::mem::take(&mut current));
            }
        } else {
            current.push_str(tok.text);
        }
    }
    if !current.is_empty() {
        skipped.push(current);
    }

    Ok(FuzzyDate { date, skipped })
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(chrono::Months::new(1))?;
    Some(next.signed_duration_since(first).num_days() as u32)
}

fn build_date(fields: &Fields, reference: NaiveDate) -> Result<NaiveDate, DateError> {
    let year = fields.year.unwrap_or(reference.year());
    let month = fields.month.unwrap_or(reference.month());
    let out_of_range = |day| DateError::OutOfRange { year, month, day };

    let day = match fields.day {
        Some(d) => d,
        None => {
            let last = days_in_month(year, month).ok_or_else(|| out_of_range(reference.day()))?;
            reference.day().min(last)
        }
    };

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| out_of_range(day))?;

    match fields.weekday {
        Some(wd) if fields.day.is_none() => {
            let ahead = (7 + wd.num_days_from_monday() - date.weekday().num_days_from_monday()) % 7;
            date.checked_add_days(Days::new(ahead as u64))
                .ok_or_else(|| out_of_range(day))
        }
        _ => Ok(date),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
