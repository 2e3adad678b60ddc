//! `explorium-engine`: entity resolution and batch enrichment pipeline.
//!
//! Pure engine crate: receives pre-loaded rows and remote collaborators
//! (behind the [`Matcher`], [`Enricher`] and page-fetch seams), returns
//! ordered outcomes with a summary. No CLI or network dependencies.

pub mod aggregate;
pub mod batch;
pub mod context;
pub mod error;
pub mod fanout;
pub mod model;
pub mod normalize;
pub mod paginate;
pub mod pipeline;
pub mod pool;
pub mod resolver;
pub mod retry;
pub mod rows;

pub use aggregate::{Aggregated, OutputMode, RowOutcome, Summary};
pub use batch::{Enricher, IdResult};
pub use context::RunContext;
pub use error::{InputError, NormalizeError, PipelineError, RemoteError};
pub use model::{
    EnrichmentItem, EnrichmentRequest, EntityKind, ItemError, MatchCandidate, MatchDescriptor,
    MatchOutcome, Payload, RawRow,
};
pub use paginate::{PageRequest, SearchPage};
pub use pool::{CancelToken, WorkerPool};
pub use resolver::Matcher;
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
