//! Category system for puzzles.
//!
//! This module provides the closed category taxonomy and the strategy registry
//! that supplies per-category generation behaviour.

mod strategy;
mod taxonomy;

pub use strategy::{
    AnimalsStrategy, BooksStrategy, CategoryRegistry, CategoryStrategy, FoodStrategy,
    IdiomsStrategy, MoviesStrategy, MusicStrategy, PlacesStrategy, ScienceStrategy,
};
pub use taxonomy::PuzzleCategory;
