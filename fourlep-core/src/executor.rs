//! Executors turn a processor and a data source into a stream of cumulative results.

use std::sync::Arc;

use futures::stream::{self, BoxStream};
use fourlep_common::{AnalysisConfig, FourLepError, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::histogram::HistogramPair;
use crate::processor::Processor;
use crate::reader::{fetch_file_bytes, EventBatchReader};
use crate::scanner::DataSource;
use crate::selection::LeptonQuery;

/// Each item is the running total over every batch processed so far.
pub type ResultStream = BoxStream<'static, Result<HistogramPair>>;

pub trait Executor: Send + Sync {
    fn execute(&self, processor: Arc<dyn Processor>, source: DataSource) -> ResultStream;
}

/// aborts the producer task once the consumer drops the stream
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Reads the source's files in order on the tokio runtime; Parquet decoding and
/// histogram filling run on the blocking pool. Emits one cumulative result per batch.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    query: LeptonQuery,
    batch_size: usize,
    s3_endpoint: Option<String>,
}

impl LocalExecutor {
    pub fn new(query: LeptonQuery, batch_size: usize, s3_endpoint: Option<String>) -> Self {
        Self { query, batch_size: batch_size.max(1), s3_endpoint }
    }

    pub fn from_config(cfg: &AnalysisConfig, s3_endpoint: Option<String>) -> Self {
        Self::new(LeptonQuery::default(), cfg.batch_size, s3_endpoint)
    }
}

async fn produce(
    executor: LocalExecutor,
    processor: Arc<dyn Processor>,
    source: DataSource,
    tx: mpsc::Sender<Result<HistogramPair>>,
) -> Result<()> {
    let mut total = processor.empty_output()?;
    for file in &source.files {
        let bytes = fetch_file_bytes(file, executor.s3_endpoint.as_deref()).await?;
        let reader = EventBatchReader::try_new(
            bytes,
            &executor.query,
            executor.batch_size,
            &source.category,
            file,
        )?;
        let proc = processor.clone();
        let partials = tokio::task::spawn_blocking(move || -> Result<Vec<HistogramPair>> {
            reader.map(|batch| proc.process(&batch?)).collect()
        })
        .await
        .map_err(|e| FourLepError::Other(format!("worker for {file} failed: {e}")))??;
        tracing::debug!(category = %source.category, file = %file, batches = partials.len(), "file processed");
        for p in &partials {
            total.merge(p)?;
            if tx.send(Ok(total.clone())).await.is_err() {
                return Ok(()); // consumer went away
            }
        }
    }
    Ok(())
}

impl Executor for LocalExecutor {
    fn execute(&self, processor: Arc<dyn Processor>, source: DataSource) -> ResultStream {
        let (tx, rx) = mpsc::channel(4);
        let executor = self.clone();
        let handle = tokio::spawn(async move {
            let err_tx = tx.clone();
            if let Err(e) = produce(executor, processor, source, tx).await {
                let _ = err_tx.send(Err(e)).await;
            }
        });
        let guard = AbortOnDrop(handle);
        Box::pin(stream::unfold((rx, guard), |(mut rx, guard)| async move {
            rx.recv().await.map(|item| (item, (rx, guard)))
        }))
    }
}
