pub mod pipeline;
pub mod source;
pub mod validation;

pub use pipeline::{IngestPipeline, PipelineError};
pub use source::{KafkaSource, RecordSource, SourceError};
pub use validation::{
    FieldViolation, OrderValidator, SchemaValidator, ValidationError, ValidationPolicy,
};
