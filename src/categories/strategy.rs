//! Per-category generation strategies.
//!
//! Each category contributes authoring guidance for the generator prompt, a
//! background-knowledge baseline for the structural difficulty profile, and
//! theme seeds for batch runs. Strategies are looked up through
//! [`CategoryRegistry`] by their [`PuzzleCategory`] tag.

use std::collections::HashMap;

use super::taxonomy::PuzzleCategory;

/// Behaviour that varies by puzzle category.
pub trait CategoryStrategy: Send + Sync {
    /// The category this strategy serves.
    fn category(&self) -> PuzzleCategory;

    /// What kind of answer the puzzle must encode, e.g. "a film title".
    fn answer_kind(&self) -> &'static str;

    /// Category-specific authoring rules appended to the generator prompt.
    fn generation_guidance(&self) -> &'static str;

    /// Baseline background-knowledge difficulty on the 1-10 scale.
    fn background_knowledge(&self) -> f64;

    /// Theme seeds used when a brief does not name a theme.
    fn sample_themes(&self) -> &'static [&'static str];
}

pub struct MoviesStrategy;

impl CategoryStrategy for MoviesStrategy {
    fn category(&self) -> PuzzleCategory {
        PuzzleCategory::Movies
    }

    fn answer_kind(&self) -> &'static str {
        "a well-known film title"
    }

    fn generation_guidance(&self) -> &'static str {
        "Encode the title's key nouns or plot hook, not the poster. Avoid symbols that spell out actor names."
    }

    fn background_knowledge(&self) -> f64 {
        4.0
    }

    fn sample_themes(&self) -> &'static [&'static str] {
        &["animated classics", "space adventures", "heist films", "romantic comedies"]
    }
}

pub struct MusicStrategy;

impl CategoryStrategy for MusicStrategy {
    fn category(&self) -> PuzzleCategory {
        PuzzleCategory::Music
    }

    fn answer_kind(&self) -> &'static str {
        "a popular song or band name"
    }

    fn generation_guidance(&self) -> &'static str {
        "Prefer songs whose titles are concrete images. Do not rely on lyrics beyond the title."
    }

    fn background_knowledge(&self) -> f64 {
        5.0
    }

    fn sample_themes(&self) -> &'static [&'static str] {
        &["80s hits", "weather songs", "one-hit wonders", "love ballads"]
    }
}

pub struct BooksStrategy;

impl CategoryStrategy for BooksStrategy {
    fn category(&self) -> PuzzleCategory {
        PuzzleCategory::Books
    }

    fn answer_kind(&self) -> &'static str {
        "a famous book title"
    }

    fn generation_guidance(&self) -> &'static str {
        "Choose widely read titles. Encode the title itself, never the author."
    }

    fn background_knowledge(&self) -> f64 {
        6.0
    }

    fn sample_themes(&self) -> &'static [&'static str] {
        &["children's classics", "dystopian novels", "fantasy series", "gothic fiction"]
    }
}

pub struct FoodStrategy;

impl CategoryStrategy for FoodStrategy {
    fn category(&self) -> PuzzleCategory {
        PuzzleCategory::Food
    }

    fn answer_kind(&self) -> &'static str {
        "a dish, drink or ingredient"
    }

    fn generation_guidance(&self) -> &'static str {
        "Build the answer from its parts (e.g. compound dish names). Avoid showing the dish emoji itself."
    }

    fn background_knowledge(&self) -> f64 {
        2.0
    }

    fn sample_themes(&self) -> &'static [&'static str] {
        &["breakfast", "desserts", "street food", "cocktails"]
    }
}

pub struct AnimalsStrategy;

impl CategoryStrategy for AnimalsStrategy {
    fn category(&self) -> PuzzleCategory {
        PuzzleCategory::Animals
    }

    fn answer_kind(&self) -> &'static str {
        "an animal species"
    }

    fn generation_guidance(&self) -> &'static str {
        "Describe the animal through habitat, behaviour or sound-alike parts of its name."
    }

    fn background_knowledge(&self) -> f64 {
        2.0
    }

    fn sample_themes(&self) -> &'static [&'static str] {
        &["ocean life", "birds", "nocturnal animals", "insects"]
    }
}

pub struct PlacesStrategy;

impl CategoryStrategy for PlacesStrategy {
    fn category(&self) -> PuzzleCategory {
        PuzzleCategory::Places
    }

    fn answer_kind(&self) -> &'static str {
        "a city, country or landmark"
    }

    fn generation_guidance(&self) -> &'static str {
        "Use landmarks or syllable puns. Never use the destination's flag emoji."
    }

    fn background_knowledge(&self) -> f64 {
        5.0
    }

    fn sample_themes(&self) -> &'static [&'static str] {
        &["european capitals", "wonders of the world", "islands", "us states"]
    }
}

pub struct IdiomsStrategy;

impl CategoryStrategy for IdiomsStrategy {
    fn category(&self) -> PuzzleCategory {
        PuzzleCategory::Idioms
    }

    fn answer_kind(&self) -> &'static str {
        "a common English idiom or phrase"
    }

    fn generation_guidance(&self) -> &'static str {
        "Depict the literal reading of the idiom so the figurative meaning clicks. Keep the wording canonical."
    }

    fn background_knowledge(&self) -> f64 {
        6.0
    }

    fn sample_themes(&self) -> &'static [&'static str] {
        &["weather idioms", "animal idioms", "money sayings", "body-part phrases"]
    }
}

pub struct ScienceStrategy;

impl CategoryStrategy for ScienceStrategy {
    fn category(&self) -> PuzzleCategory {
        PuzzleCategory::Science
    }

    fn answer_kind(&self) -> &'static str {
        "a scientific concept, phenomenon or instrument"
    }

    fn generation_guidance(&self) -> &'static str {
        "Target concepts taught in secondary school. Combine cause and effect symbols."
    }

    fn background_knowledge(&self) -> f64 {
        7.0
    }

    fn sample_themes(&self) -> &'static [&'static str] {
        &["astronomy", "weather phenomena", "human body", "chemistry basics"]
    }
}

/// Strategy lookup keyed by category tag.
pub struct CategoryRegistry {
    strategies: HashMap<PuzzleCategory, Box<dyn CategoryStrategy>>,
}

impl CategoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in strategy for every category.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MoviesStrategy));
        registry.register(Box::new(MusicStrategy));
        registry.register(Box::new(BooksStrategy));
        registry.register(Box::new(FoodStrategy));
        registry.register(Box::new(AnimalsStrategy));
        registry.register(Box::new(PlacesStrategy));
        registry.register(Box::new(IdiomsStrategy));
        registry.register(Box::new(ScienceStrategy));
        registry
    }

    /// Registers a strategy, replacing any previous one for the same category.
    pub fn register(&mut self, strategy: Box<dyn CategoryStrategy>) {
        self.strategies.insert(strategy.category(), strategy);
    }

    /// Returns the strategy for `category`.
    pub fn get(&self, category: PuzzleCategory) -> Option<&dyn CategoryStrategy> {
        self.strategies.get(&category).map(|s| s.as_ref())
    }

    /// Categories with a registered strategy, sorted.
    pub fn categories(&self) -> Vec<PuzzleCategory> {
        let mut categories: Vec<_> = self.strategies.keys().copied().collect();
        categories.sort();
        categories
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for CategoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryRegistry")
            .field("categories", &self.categories())
            .finish()
    }
}
