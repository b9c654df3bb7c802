//! Per-URL orchestration: parse, fetch, normalize, then a single ordered write.

use crate::api::ApiClient;
use crate::error::{Error, ErrorKind};
use crate::fetch::fetch_thread;
use crate::models::{ExtractionResult, PostReference};
use crate::normalize::normalize;
use crate::permalink;
use crate::sheet::{InputCells, SheetWriter};
use crate::transport::Transport;

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Where a URL got to. Every URL ends in `Written` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Parsed,
    Fetched,
    Normalized,
    Written,
    Failed(ErrorKind),
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub workers: usize,
    pub progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            progress: true,
        }
    }
}

/// One input row on its way through the pipeline.
#[derive(Debug)]
pub struct UrlJob {
    /// 1-based spreadsheet row.
    pub row: usize,
    pub raw: String,
    pub stage: Stage,
    parsed: Option<std::result::Result<PostReference, Error>>,
}

impl UrlJob {
    fn new(row: usize, raw: String) -> Self {
        Self {
            row,
            raw,
            stage: Stage::Pending,
            parsed: None,
        }
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(row = self.row, from = ?self.stage, to = ?next, "stage");
        self.stage = next;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    pub row: usize,
    pub url: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    /// Subset of `succeeded` whose post is deleted or gone.
    pub deleted: usize,
    pub skipped_header: bool,
    pub rows_written: usize,
    /// Final stage per processed URL, in input order.
    pub stages: Vec<(usize, Stage)>,
    /// Failed and partial URLs, in input order.
    pub failures: Vec<FailureEntry>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// True when at least one URL produced records.
    pub fn any_output(&self) -> bool {
        self.succeeded + self.partial > 0
    }
}

/// Turn raw first-column cells into jobs. The first row is data unless it does not
/// parse, in which case it is treated as a header and skipped.
pub fn plan(input: InputCells) -> (Vec<UrlJob>, bool) {
    let mut jobs = Vec::with_capacity(input.cells.len());
    let mut skipped_header = false;
    for (i, raw) in input.cells.into_iter().enumerate() {
        let mut job = UrlJob::new(input.first_row + i, raw);
        let parsed = permalink::parse(&job.raw);
        if i == 0 && parsed.is_err() {
            tracing::warn!(cell = %job.raw.trim(), "first row is not a post URL, treating it as a header");
            skipped_header = true;
            continue;
        }
        match &parsed {
            Ok(_) => job.advance(Stage::Parsed),
            Err(e) => job.advance(Stage::Failed(e.kind())),
        }
        job.parsed = Some(parsed);
        jobs.push(job);
    }
    (jobs, skipped_header)
}

#[derive(Debug)]
struct Finished {
    row: usize,
    stage: Stage,
    result: ExtractionResult,
}

impl Finished {
    fn aborted(row: usize, raw: String, why: String) -> Self {
        let error = Error::Aborted(why);
        tracing::error!(row, error = %error, "URL task died");
        Finished {
            row,
            stage: Stage::Failed(error.kind()),
            result: ExtractionResult::Failed { raw, error },
        }
    }
}

async fn process<T: Transport>(client: &ApiClient<T>, mut job: UrlJob) -> Finished {
    let reference = match job.parsed.take() {
        Some(Ok(r)) => r,
        Some(Err(error)) => {
            tracing::warn!(row = job.row, error = %error, "skipping malformed URL");
            return Finished {
                row: job.row,
                stage: job.stage,
                result: ExtractionResult::Failed { raw: job.raw, error },
            };
        }
        None => match permalink::parse(&job.raw) {
            Ok(r) => r,
            Err(error) => {
                job.advance(Stage::Failed(error.kind()));
                return Finished {
                    row: job.row,
                    stage: job.stage,
                    result: ExtractionResult::Failed { raw: job.raw, error },
                };
            }
        },
    };

    let thread = match fetch_thread(client, &reference).await {
        Ok(t) => t,
        Err(error) => {
            tracing::warn!(row = job.row, id = %reference.id, error = %error, "post fetch failed");
            job.advance(Stage::Failed(error.kind()));
            return Finished {
                row: job.row,
                stage: job.stage,
                result: ExtractionResult::Failed { raw: job.raw, error },
            };
        }
    };
    job.advance(Stage::Fetched);

    let records = normalize(&thread);
    job.advance(Stage::Normalized);
    tracing::info!(
        row = job.row,
        id = %reference.id,
        comments = thread.comments.len(),
        deleted = thread.post.deleted,
        "extracted"
    );

    let result = match thread.partial {
        None => ExtractionResult::Complete { reference, records },
        Some(error) => ExtractionResult::Partial {
            reference,
            records,
            error,
        },
    };
    Finished {
        row: job.row,
        stage: job.stage,
        result,
    }
}

/// Collect finished URLs until every worker hangs up, then write once in input order.
/// Planned rows that never arrived are recorded as aborted.
fn writer_thread(
    writer: SheetWriter,
    rx: Receiver<Finished>,
    planned: Vec<(usize, String)>,
) -> (Vec<(usize, Stage, ExtractionResult)>, crate::error::Result<usize>) {
    let mut done: BTreeMap<usize, Finished> = BTreeMap::new();
    while let Ok(f) = rx.recv() {
        done.insert(f.row, f);
    }
    for (row, raw) in planned {
        done.entry(row)
            .or_insert_with(|| Finished::aborted(row, raw, "no result reported".into()));
    }

    let mut stages = Vec::with_capacity(done.len());
    let mut ordered = Vec::with_capacity(done.len());
    for (row, f) in done {
        stages.push(f.stage);
        ordered.push((row, f.result));
    }
    let written = writer.write(&ordered);

    let out = ordered
        .into_iter()
        .zip(stages)
        .map(|((row, result), stage)| (row, stage, result))
        .collect();
    (out, written)
}

pub struct Pipeline<T> {
    client: Arc<ApiClient<T>>,
    options: RunOptions,
}

impl<T: Transport + 'static> Pipeline<T> {
    pub fn new(client: ApiClient<T>, options: RunOptions) -> Self {
        Self {
            client: Arc::new(client),
            options,
        }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    /// Process every cell and write the output workbook.
    ///
    /// Per-URL failures land in the summary. Only a failed output write is an error here.
    pub async fn run(&self, input: InputCells, writer: SheetWriter) -> Result<RunSummary> {
        let started = Instant::now();
        let (jobs, skipped_header) = plan(input);
        let total = jobs.len();

        let planned: Vec<(usize, String)> = jobs.iter().map(|j| (j.row, j.raw.clone())).collect();
        let (tx, rx) = unbounded::<Finished>();
        let wt = std::thread::spawn(move || writer_thread(writer, rx, planned));

        let pb = if self.options.progress {
            ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr())
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {pos}/{len} URLs {wide_msg}")?
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));

        let workers = self.options.workers.max(1).min(total.max(1));
        let mut slices: Vec<Vec<UrlJob>> = (0..workers).map(|_| Vec::new()).collect();
        for (i, job) in jobs.into_iter().enumerate() {
            slices[i % workers].push(job);
        }

        let mut js = JoinSet::new();
        for (w, slice) in slices.into_iter().enumerate() {
            if slice.is_empty() {
                continue;
            }
            let client = Arc::clone(&self.client);
            let txc = tx.clone();
            let pbc = pb.clone();
            js.spawn(async move {
                let mut sent = 0usize;
                for job in slice {
                    pbc.set_message(format!("w{w}: row {}", job.row));
                    let (row, raw) = (job.row, job.raw.clone());
                    // own task per URL so a panic costs one row, not the rest of the slice
                    let c = Arc::clone(&client);
                    let finished = match tokio::spawn(async move { process(&c, job).await }).await {
                        Ok(f) => f,
                        Err(e) => Finished::aborted(row, raw, e.to_string()),
                    };
                    pbc.inc(1);
                    if txc.send(finished).is_err() {
                        tracing::error!(worker = w, "writer went away");
                        break;
                    }
                    sent += 1;
                }
                sent
            });
        }
        drop(tx);

        while let Some(res) = js.join_next().await {
            if let Err(e) = res {
                tracing::error!(error = %e, "worker task failed");
            }
        }
        pb.finish_and_clear();

        let (results, written) = wt
            .join()
            .map_err(|_| anyhow!("writer thread panicked"))?;

        let mut summary = RunSummary {
            skipped_header,
            ..RunSummary::default()
        };
        for (row, mut stage, result) in results {
            match &result {
                ExtractionResult::Complete { .. } => {
                    summary.succeeded += 1;
                    if result.is_post_deleted() {
                        summary.deleted += 1;
                    }
                }
                ExtractionResult::Partial { error, .. } => {
                    summary.partial += 1;
                    summary.failures.push(FailureEntry {
                        row,
                        url: result.raw().trim().to_string(),
                        kind: ErrorKind::PartialResult,
                        message: error.to_string(),
                    });
                }
                ExtractionResult::Failed { error, .. } => {
                    summary.failed += 1;
                    summary.failures.push(FailureEntry {
                        row,
                        url: result.raw().trim().to_string(),
                        kind: error.kind(),
                        message: error.to_string(),
                    });
                }
            }
            if written.is_ok() && stage == Stage::Normalized {
                stage = Stage::Written;
            }
            summary.stages.push((row, stage));
        }
        summary.elapsed = started.elapsed();

        match written {
            Ok(rows) => summary.rows_written = rows,
            Err(e) => {
                tracing::error!(
                    succeeded = summary.succeeded,
                    partial = summary.partial,
                    "fetched data was not saved"
                );
                return Err(e.into());
            }
        }

        tracing::info!(
            succeeded = summary.succeeded,
            partial = summary.partial,
            failed = summary.failed,
            deleted = summary.deleted,
            rows = summary.rows_written,
            elapsed_s = summary.elapsed.as_secs_f64(),
            "run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_is_skipped_only_when_unparseable() {
        let (jobs, skipped) = plan(InputCells::from(vec![
            "URL".to_string(),
            "https://redd.it/abc".to_string(),
            "nonsense".to_string(),
        ]));
        assert!(skipped);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].row, 2);
        assert_eq!(jobs[0].stage, Stage::Parsed);
        assert_eq!(jobs[1].stage, Stage::Failed(ErrorKind::InvalidUrl));

        let (jobs, skipped) = plan(InputCells::from(vec!["https://redd.it/abc".to_string()]));
        assert!(!skipped);
        assert_eq!(jobs[0].row, 1);
    }

    #[test]
    fn rows_count_from_the_first_used_sheet_row() {
        let (jobs, skipped) = plan(InputCells {
            first_row: 4,
            cells: vec!["https://redd.it/abc".into(), "junk".into()],
        });
        assert!(!skipped);
        assert_eq!(jobs[0].row, 4);
        assert_eq!(jobs[1].row, 5);
        assert_eq!(jobs[1].stage, Stage::Failed(ErrorKind::InvalidUrl));
    }

    #[test]
    fn empty_input_plans_nothing() {
        let (jobs, skipped) = plan(InputCells::from(Vec::<String>::new()));
        assert!(jobs.is_empty());
        assert!(!skipped);
    }
}
