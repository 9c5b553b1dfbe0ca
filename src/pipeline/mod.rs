//! Configuration and service lifecycle.
//!
//! - **Config**: [`ForgeConfig`] from defaults, YAML and `FORGE_*` variables
//! - **Services**: [`ForgeServices`] owns the adapter, store, metrics and
//!   publish gate shared by every run
//!
//! # Example
//!
//! ```rust,ignore
//! use puzzle_forge::categories::PuzzleCategory;
//! use puzzle_forge::pipeline::{ForgeConfig, ForgeServices};
//! use puzzle_forge::puzzle::GenerationBrief;
//!
//! let services = ForgeServices::start(ForgeConfig::from_env()?).await?;
//! let orchestrator = services.orchestrator(None)?;
//! let puzzle = orchestrator
//!     .run(&GenerationBrief::new(PuzzleCategory::Movies, 4))
//!     .await?;
//! println!("{} -> {}", puzzle.candidate.content(), puzzle.candidate.answer());
//! services.shutdown().await?;
//! ```

pub mod config;
pub mod services;

pub use config::{ConfigError, ForgeConfig, OPENROUTER_API_BASE};
pub use services::{ForgeServices, ServicesError};
