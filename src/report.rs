use std::collections::HashMap;
use std::fmt::Write as _;

use crate::store::RecordStore;

/// Fields the summary tables track, in render order.
pub const COVERAGE_FIELDS: [&str; 8] = [
    "company_name",
    "area",
    "battery_storage",
    "detail_url",
    "website_url_primary",
    "website_domain_primary",
    "phone",
    "address",
];

pub const TOP_AREAS: usize = 15;

pub struct FieldCoverage {
    pub field: String,
    pub present: usize,
    pub missing: usize,
}

impl FieldCoverage {
    pub fn percent(&self) -> f64 {
        let total = self.present + self.missing;
        if total == 0 {
            0.0
        } else {
            100.0 * self.present as f64 / total as f64
        }
    }
}

pub struct CoverageReport {
    pub total: usize,
    pub fields: Vec<FieldCoverage>,
    /// Records carrying more than one discovered website.
    pub multi_website: usize,
    /// Most frequent grouping-field values, descending; ties keep
    /// first-seen order. Empty values group under "Unknown".
    pub top_areas: Vec<(String, usize)>,
}

pub fn coverage(
    store: &RecordStore,
    fields: &[&str],
    group_field: &str,
    top_n: usize,
) -> CoverageReport {
    let total = store.len();

    let fields = fields
        .iter()
        .map(|&field| {
            let present = (0..total)
                .filter(|&i| !store.get(i, field).is_empty())
                .count();
            FieldCoverage {
                field: field.to_string(),
                present,
                missing: total - present,
            }
        })
        .collect();

    let multi_website = (0..total)
        .filter(|&i| !store.get(i, "website_count").is_empty())
        .count();

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut areas: Vec<(String, usize)> = Vec::new();
    for i in 0..total {
        let value = store.get(i, group_field);
        let key = if value.is_empty() { "Unknown" } else { value };
        match seen.get(key) {
            Some(&slot) => areas[slot].1 += 1,
            None => {
                seen.insert(key.to_string(), areas.len());
                areas.push((key.to_string(), 1));
            }
        }
    }
    // Stable sort: equal counts stay in first-seen order.
    areas.sort_by(|a, b| b.1.cmp(&a.1));
    areas.truncate(top_n);

    CoverageReport {
        total,
        fields,
        multi_website,
        top_areas: areas,
    }
}

const RULE: &str =
    "================================================================================";
const THIN_RULE: &str =
    "--------------------------------------------------------------------------------";

pub fn render(report: &CoverageReport) -> String {
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "ENF Solar Directory Enrichment Summary");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Generated: {generated}");
    let _ = writeln!(out);
    let _ = writeln!(out, "TOTAL ENTRIES: {}", report.total);
    let _ = writeln!(out);
    let _ = writeln!(out, "FIELD COVERAGE:");
    let _ = writeln!(out, "{THIN_RULE}");
    let _ = writeln!(
        out,
        "  {:<24} | {:>7}      | {:>7}      | Coverage",
        "Field", "Present", "Missing"
    );
    let _ = writeln!(out, "{THIN_RULE}");
    for f in &report.fields {
        let _ = writeln!(
            out,
            "  {:<24} | {:>7}      | {:>7}      | {:>5.1}%",
            f.field,
            f.present,
            f.missing,
            f.percent()
        );
    }
    let _ = writeln!(out, "{THIN_RULE}");
    let _ = writeln!(out);
    let _ = writeln!(out, "MULTIPLE WEBSITES:");
    let _ = writeln!(
        out,
        "  Entries with multiple websites: {}",
        report.multi_website
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "TOP {} STATES/AREAS:", TOP_AREAS);
    for (area, count) in &report.top_areas {
        let pct = if report.total == 0 {
            0.0
        } else {
            100.0 * *count as f64 / report.total as f64
        };
        let _ = writeln!(out, "  {:<30} : {:>5} ({:>5.1}%)", area, count, pct);
    }
    let _ = writeln!(out, "{RULE}");
    out
}

/// Summary for a missing-only re-scrape pass.
pub fn render_rescrape(initially_missing: usize, newly_found: usize) -> String {
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let still_missing = initially_missing.saturating_sub(newly_found);
    let rate = if initially_missing == 0 {
        0.0
    } else {
        100.0 * newly_found as f64 / initially_missing as f64
    };

    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "ENF Solar Re-scrape Summary");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Generated: {generated}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Initially missing: {initially_missing}");
    let _ = writeln!(out, "Newly found: {newly_found}");
    let _ = writeln!(out, "Still missing: {still_missing}");
    let _ = writeln!(out, "Recovery rate: {rate:.1}%");
    let _ = writeln!(out, "{RULE}");
    out
}

// ── Tests ──
