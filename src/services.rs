pub mod batch_service;
pub mod normalizer;
pub mod statistics_service;

pub use batch_service::{BatchService, CandidatePolicy, PipelineError};
pub use normalizer::RowNormalizer;
pub use statistics_service::{Aggregation, AggregationReadError, StatisticsService};
