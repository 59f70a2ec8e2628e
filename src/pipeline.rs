use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::info;

use crate::apify::ExtractionClient;
use crate::batch;
use crate::merge;
use crate::program::{ExtractionProgram, Submission};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::store::{RecordStore, BASE_COLUMNS, ENRICH_COLUMNS};

/// Chunking knobs for one enrichment run.
pub struct ChunkOptions {
    pub chunk_size: usize,
    pub chunk_pause: Duration,
}

pub struct EnrichOutcome {
    pub selected: usize,
    pub chunks: usize,
    pub gained: usize,
    pub skipped_no_url: usize,
}

/// All record indices, for a full enrichment pass.
pub fn select_all(store: &RecordStore) -> Vec<usize> {
    (0..store.len()).collect()
}

/// Only records still missing a primary website.
pub fn select_missing(store: &RecordStore) -> Vec<usize> {
    store.indices_missing("website_url_primary")
}

/// Run the chunked enrichment loop over `indices`.
///
/// Each chunk is one remote job: submit, poll, merge, checkpoint. A failed
/// chunk contributes nothing and the loop moves on; only store I/O aborts
/// the run. The store file is rewritten after every chunk, so a crash loses
/// at most the in-flight chunk.
pub async fn enrich(
    store: &mut RecordStore,
    client: &ExtractionClient,
    program: &ExtractionProgram,
    mut indices: Vec<usize>,
    limit: Option<usize>,
    opts: &ChunkOptions,
    sink: &mut dyn ProgressSink,
) -> Result<EnrichOutcome> {
    if let Some(limit) = limit {
        indices.truncate(limit);
    }
    store.ensure_columns(&ENRICH_COLUMNS);

    let chunks = batch::chunk_count(indices.len(), opts.chunk_size);
    sink.on_event(&ProgressEvent::RunStarted {
        records: indices.len(),
        chunks,
    });

    let mut total_gained = 0;
    let mut skipped_no_url = 0;

    for (i, chunk) in batch::plan(&indices, opts.chunk_size).enumerate() {
        let chunk_no = i + 1;

        let mut submissions = Vec::new();
        let mut skipped = 0;
        for &row in chunk {
            let url = store.get(row, "detail_url");
            if url.is_empty() {
                skipped += 1;
                continue;
            }
            submissions.push(Submission {
                url: url.to_string(),
                user_data: json!({
                    "entryIndex": row,
                    "company_name": store.get(row, "company_name"),
                }),
            });
        }
        skipped_no_url += skipped;
        sink.on_event(&ProgressEvent::ChunkStarted {
            chunk: chunk_no,
            chunks,
            submitted: submissions.len(),
            skipped,
        });
        if submissions.is_empty() {
            sink.on_event(&ProgressEvent::ChunkCompleted {
                chunk: chunk_no,
                gained: 0,
                total_gained,
            });
            continue;
        }

        let items = client.run_chunk(program, &submissions).await;
        let results = merge::index_results(&items, store);
        let gained = merge::apply(store, &results);
        total_gained += gained;

        store.save()?;
        sink.on_event(&ProgressEvent::ChunkCompleted {
            chunk: chunk_no,
            gained,
            total_gained,
        });

        if chunk_no < chunks {
            sleep(opts.chunk_pause).await;
        }
    }

    Ok(EnrichOutcome {
        selected: indices.len(),
        chunks,
        gained: total_gained,
        skipped_no_url,
    })
}

#[derive(Debug, Default, Deserialize)]
struct ListingRow {
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    area: String,
    #[serde(default)]
    battery_storage: String,
    #[serde(default)]
    detail_url: String,
    #[serde(default)]
    source_page: i64,
}

pub struct HarvestOutcome {
    pub pages: usize,
    pub rows: usize,
    pub unique: usize,
}

/// Build a fresh store from the directory listing: one remote job over the
/// whole page range, flattened and deduplicated by `detail_url` (first
/// occurrence wins; rows without a URL are kept).
pub async fn harvest_listing(
    store: &mut RecordStore,
    client: &ExtractionClient,
    base_url: &str,
    start_page: u32,
    end_page: u32,
) -> Result<HarvestOutcome> {
    let program = ExtractionProgram::listing();
    let submissions: Vec<Submission> = (start_page..=end_page)
        .map(|page| Submission {
            url: format!("{base_url}?page={page}"),
            user_data: json!({ "pageNum": page }),
        })
        .collect();
    let pages = submissions.len();

    let items = client.run_chunk(&program, &submissions).await;

    // Each item is one page's entry array; tolerate bare objects too.
    let mut rows: Vec<ListingRow> = Vec::new();
    for item in items {
        match item {
            Value::Array(entries) => {
                for entry in entries {
                    if let Ok(row) = serde_json::from_value(entry) {
                        rows.push(row);
                    }
                }
            }
            other => {
                if let Ok(row) = serde_json::from_value(other) {
                    rows.push(row);
                }
            }
        }
    }
    let total = rows.len();

    let mut seen = HashSet::new();
    let mut unique = 0;
    for row in rows {
        if row.company_name.is_empty() {
            continue;
        }
        if !row.detail_url.is_empty() && !seen.insert(row.detail_url.clone()) {
            continue;
        }
        store.push(&[
            ("company_name", row.company_name),
            ("area", row.area),
            ("battery_storage", row.battery_storage),
            ("detail_url", row.detail_url),
            ("source_page", row.source_page.to_string()),
        ]);
        unique += 1;
    }

    store.save()?;
    info!("harvested {} unique entries from {} pages", unique, pages);

    Ok(HarvestOutcome {
        pages,
        rows: total,
        unique,
    })
}

/// Empty store with the listing's base column set.
pub fn new_store(path: &std::path::Path) -> RecordStore {
    RecordStore::new(path, &BASE_COLUMNS)
}

// ── Tests ──
