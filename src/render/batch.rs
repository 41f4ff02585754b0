//! Batch rendering: one template against many data rows.
//!
//! A job runs in two phases. The async phase prepares every row
//! sequentially, reusing the shared asset cache so a background shared
//! by all rows downloads once. The paint phase then rasterizes the
//! prepared rows on a bounded worker pool sized by the job's
//! `concurrency`. Rows are isolated: a row that fails in either phase
//! is recorded in the report and never disturbs its siblings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PlacardError, RenderPhase};
use crate::export::QualityTier;
use crate::render::{PreparedRender, RenderRequest, Renderer};
use crate::template::{FormData, Template};

/// One row of a batch job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRow {
    #[serde(default)]
    pub data: FormData,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// Replaces the template background for this row only.
    #[serde(default)]
    pub background: Option<String>,
}

fn default_concurrency() -> usize {
    4
}

/// A batch job: one template, many rows, one output size and tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub template: Template,
    #[serde(default)]
    pub rows: Vec<BatchRow>,
    pub target_width: u32,
    #[serde(default)]
    pub target_height: Option<u32>,
    #[serde(default)]
    pub quality: QualityTier,
    /// Worker pool size for the paint phase.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Outcome of one row.
#[derive(Debug, Clone, Serialize)]
pub struct RowResult {
    pub row: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Pipeline phase the row died in, when it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<RenderPhase>,
    /// Written file, when the job renders to a directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// Summary returned to the caller; failed rows carry enough to retry.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub job_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rows: Vec<RowResult>,
}

fn row_request(job: &BatchJob, row: &BatchRow) -> RenderRequest {
    let mut template = job.template.clone();
    if let Some(background) = &row.background {
        template.background = background.clone();
    }
    RenderRequest {
        template,
        data: row.data.clone(),
        variables: row.variables.clone(),
        target_width: job.target_width,
        target_height: job.target_height,
        quality: job.quality,
    }
}

/// Run a batch job. With `out_dir` set, each successful row writes
/// `row_NNNN.png` there; without it the job is a validation run that
/// renders and discards the bytes.
///
/// The returned error covers job-level problems only (worker pool,
/// output directory). Row failures live in the report.
pub async fn run(
    renderer: &Renderer,
    job: &BatchJob,
    out_dir: Option<&Path>,
) -> Result<BatchReport, PlacardError> {
    let job_id = Uuid::new_v4().to_string();
    log::info!(
        "batch {}: {} rows at {}x{:?}, concurrency {}",
        job_id,
        job.rows.len(),
        job.target_width,
        job.target_height,
        job.concurrency
    );

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)?;
    }

    // Async phase: prepare rows one at a time. The shared asset cache
    // makes repeated backgrounds a single fetch.
    let mut prepared: Vec<(usize, PreparedRender)> = Vec::new();
    let mut failures: Vec<RowResult> = Vec::new();
    for (index, row) in job.rows.iter().enumerate() {
        let request = row_request(job, row);
        match renderer.prepare(&request).await {
            Ok(p) => prepared.push((index, p)),
            Err(e) => {
                log::warn!("batch {}: row {} failed: {}", job_id, index, e);
                failures.push(RowResult {
                    row: index,
                    success: false,
                    phase: e.phase(),
                    error: Some(e.to_string()),
                    output: None,
                });
            }
        }
    }

    // Paint phase: pure CPU on a bounded pool.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(job.concurrency.max(1))
        .build()
        .map_err(|e| PlacardError::InvalidRequest(format!("worker pool: {}", e)))?;

    let fonts = renderer.fonts().clone();
    let mut painted: Vec<RowResult> = pool.install(|| {
        prepared
            .into_par_iter()
            .map(|(index, p)| {
                let outcome = p.rasterize(&fonts).and_then(|bytes| match out_dir {
                    Some(dir) => {
                        let path = dir.join(format!("row_{:04}.png", index));
                        std::fs::write(&path, &bytes)?;
                        Ok(Some(path))
                    }
                    None => Ok(None),
                });
                match outcome {
                    Ok(output) => RowResult {
                        row: index,
                        success: true,
                        error: None,
                        phase: None,
                        output,
                    },
                    Err(e) => RowResult {
                        row: index,
                        success: false,
                        phase: e.phase(),
                        error: Some(e.to_string()),
                        output: None,
                    },
                }
            })
            .collect()
    });

    let mut rows = failures;
    rows.append(&mut painted);
    rows.sort_by_key(|r| r.row);

    let succeeded = rows.iter().filter(|r| r.success).count();
    let failed = rows.len() - succeeded;
    log::info!("batch {}: {} succeeded, {} failed", job_id, succeeded, failed);

    Ok(BatchReport {
        job_id,
        total: rows.len(),
        succeeded,
        failed,
        rows,
    })
}
