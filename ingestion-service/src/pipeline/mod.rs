use std::{collections::HashSet, sync::Arc, time::SystemTime};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("config error: {0}")]
    Config(String),
}

/// Identity used to keep a batch free of duplicate keys.
pub trait BatchKey {
    fn batch_key(&self) -> &str;
}

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Envelope<T>>, PipelineError>;
}

/// Per-record mapping. `PipelineError::Validation` drops the record; any
/// other error aborts the run.
#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T: Sync>: Send + Sync {
    async fn write(&self, batch: &[Envelope<T>]) -> Result<WriteSummary, PipelineError>;
}

/// Aggregate outcome of one sink pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub attempted: usize,
    pub written: usize,
    pub already_exists: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput<T> {
    /// Records handed to the sink, in upstream order.
    pub records: Vec<T>,
    pub fetched: usize,
    pub rejected: usize,
    pub summary: WriteSummary,
}

pub struct Pipeline<S, I, O, K> {
    pub source: S,
    pub transform: Arc<dyn Transform<I, O> + Send + Sync>,
    pub sink: K,
}

impl<S, I, O, K> Pipeline<S, I, O, K>
where
    I: Send + 'static,
    O: BatchKey + Send + Sync + 'static,
    S: Source<I> + Send + Sync + 'static,
    K: Sink<O> + Send + Sync + 'static,
{
    pub async fn run(&self) -> Result<PipelineOutput<O>, PipelineError> {
        let raw = self.source.fetch().await?;
        let fetched = raw.len();

        let mut accepted: Vec<Envelope<O>> = Vec::with_capacity(fetched);
        let mut seen: HashSet<String> = HashSet::with_capacity(fetched);
        let mut rejected = 0;

        for env in raw {
            match self.transform.apply(env).await {
                Ok(out) => {
                    if seen.insert(out.payload.batch_key().to_owned()) {
                        accepted.push(out);
                    } else {
                        tracing::warn!(key = out.payload.batch_key(), "duplicate key in batch, keeping first");
                        rejected += 1;
                    }
                }
                Err(PipelineError::Validation(reason)) => {
                    tracing::warn!(%reason, "record dropped");
                    rejected += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if accepted.is_empty() {
            return Err(PipelineError::Upstream(
                "no record met minimum field requirements".to_string(),
            ));
        }

        let summary = self.sink.write(&accepted).await?;

        Ok(PipelineOutput {
            records: accepted.into_iter().map(|env| env.payload).collect(),
            fetched,
            rejected,
            summary,
        })
    }
}
