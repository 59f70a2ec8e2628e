use indicatif::{ProgressBar, ProgressStyle};

/// Pipeline progress as data, so the core stays quiet and the CLI decides
/// how to draw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    RunStarted {
        records: usize,
        chunks: usize,
    },
    ChunkStarted {
        chunk: usize,
        chunks: usize,
        submitted: usize,
        /// Records in this chunk that had no URL to submit.
        skipped: usize,
    },
    /// Emitted after the chunk's results were merged and the store
    /// checkpointed.
    ChunkCompleted {
        chunk: usize,
        gained: usize,
        total_gained: usize,
    },
}

pub trait ProgressSink {
    fn on_event(&mut self, event: &ProgressEvent);
}

/// Renders a chunk-level bar plus per-batch status lines.
pub struct ConsoleSink {
    bar: Option<ProgressBar>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self { bar: None }
    }

    fn println(&self, msg: String) {
        match &self.bar {
            Some(bar) => bar.println(msg),
            None => println!("{msg}"),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleSink {
    fn on_event(&mut self, event: &ProgressEvent) {
        match *event {
            ProgressEvent::RunStarted { records, chunks } => {
                println!("Processing {records} records in {chunks} batches");
                let bar = ProgressBar::new(chunks as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("[{elapsed_precise}] {bar:40} {pos}/{len} batches (eta {eta})")
                        .unwrap()
                        .progress_chars("=> "),
                );
                self.bar = Some(bar);
            }
            ProgressEvent::ChunkStarted {
                chunk,
                chunks,
                submitted,
                skipped,
            } => {
                if skipped > 0 {
                    self.println(format!(
                        "Batch {chunk}/{chunks}: submitting {submitted} URLs ({skipped} records without URL)"
                    ));
                } else {
                    self.println(format!("Batch {chunk}/{chunks}: submitting {submitted} URLs"));
                }
            }
            ProgressEvent::ChunkCompleted {
                chunk,
                gained,
                total_gained,
            } => {
                self.println(format!(
                    "Batch {chunk} saved: {gained} new websites ({total_gained} total)"
                ));
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                    if bar.position() == bar.length().unwrap_or(0) {
                        bar.finish_and_clear();
                    }
                }
            }
        }
    }
}

/// Records events for assertions; test builds only.
#[cfg(test)]
pub struct RecordingSink(pub Vec<ProgressEvent>);

#[cfg(test)]
impl ProgressSink for RecordingSink {
    fn on_event(&mut self, event: &ProgressEvent) {
        self.0.push(event.clone());
    }
}

// ── Tests ──
