//! Shared utility functions for puzzle-forge.

pub mod json_extraction;

pub use json_extraction::{
    analyze_json_structure, find_matching_brace, try_extract_json_from_response,
    JsonExtractionError, JsonExtractionResult, JsonStructureAnalysis,
};
