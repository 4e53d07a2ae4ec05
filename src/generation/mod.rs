pub mod parse;
pub mod prompt;
pub mod service;

pub use prompt::ContentBrief;
pub use service::{
    AnalysisError, ConsistencyReport, ContentGenerator, GenerationRequest, PieceContext,
};
