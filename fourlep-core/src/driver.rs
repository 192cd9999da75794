//! Fan-out over data sources and merge of their final results.

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use futures::StreamExt;
use fourlep_common::{FourLepError, Result};

use crate::executor::{Executor, ResultStream};
use crate::histogram::HistogramPair;
use crate::processor::Processor;
use crate::scanner::DataSource;

/// Drain a cumulative result stream and keep its last element.
///
/// Any error, including a stream that ends without producing anything, is
/// reported as a source failure labelled with `category`.
pub async fn last_result(mut stream: ResultStream, category: &str) -> Result<HistogramPair> {
    let mut last = None;
    let mut updates = 0usize;
    while let Some(item) = stream.next().await {
        last = Some(item.map_err(|e| FourLepError::source_failure(category, e))?);
        updates += 1;
    }
    tracing::debug!(category, updates, "stream finished");
    last.ok_or_else(|| FourLepError::source_failure(category, FourLepError::EmptyStream))
}

/// Run `processor` over every source concurrently and sum the per-source results.
///
/// All streams are polled from the calling task. The first failure is returned
/// and every other in-flight stream is dropped, which cancels its producer.
pub async fn run_all<E>(
    executor: &E,
    processor: Arc<dyn Processor>,
    sources: &[DataSource],
) -> Result<HistogramPair>
where
    E: Executor + ?Sized,
{
    let t0 = Instant::now();
    tracing::info!(sources = sources.len(), "starting histogram production");
    let branches = sources.iter().map(|source| {
        let stream = executor.execute(processor.clone(), source.clone());
        async move {
            let res = last_result(stream, &source.category).await;
            match &res {
                Ok(_) => tracing::info!(category = %source.category, files = source.files.len(), "source done"),
                Err(e) => tracing::warn!(category = %source.category, error = %e, "source failed"),
            }
            res
        }
    });
    let per_source = try_join_all(branches).await?;

    let mut total = processor.empty_output()?;
    for partial in &per_source {
        total.merge(partial)?;
    }
    tracing::info!(elapsed_s = t0.elapsed().as_secs_f64(), "execution finished");
    Ok(total)
}
