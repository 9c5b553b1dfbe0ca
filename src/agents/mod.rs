//! LLM-backed stages and the orchestration loop that drives them.
//!
//! - [`PuzzleGenerator`] produces a candidate with its thinking trace
//! - [`UniquenessValidator`] compares it against recent history
//! - [`DifficultyCalibrator`] fuses proposed, structural and self-assessed difficulty
//! - [`QualityPipeline`] runs the review and adversarial stages
//! - [`MasterOrchestrator`] runs the bounded retry loop
//! - [`BatchGenerator`] runs many orchestrations with a difficulty progression

pub mod batch;
pub mod difficulty_calibrator;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod quality_pipeline;
pub mod types;
pub mod uniqueness_validator;

pub use batch::{
    BatchConfig, BatchGenerator, BatchItemFailure, BatchReport, DifficultyProgression,
};
pub use difficulty_calibrator::{
    CalibrationReport, CalibratorConfig, DifficultyCalibrator, SelfAssessment,
};
pub use error::{AgentError, AgentResult, StageOutcome};
pub use generator::{GeneratedPuzzle, GeneratorConfig, PuzzleGenerator};
pub use orchestrator::{
    degraded_choice, select_best, AttemptScore, MasterOrchestrator, MasterOrchestratorBuilder,
    OrchestratorConfig,
};
pub use quality_pipeline::{QualityPipeline, QualityPipelineConfig, QualityReport};
pub use types::{AcceptedPuzzle, AttemptOutcome, AttemptSummary, ForgeEvent, ForgeStage};
pub use uniqueness_validator::{
    Conflict, UniquenessAssessment, UniquenessConfig, UniquenessReport, UniquenessValidator,
};
