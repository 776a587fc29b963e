pub mod assignment;
pub mod combination;
pub mod engine;
pub mod fallback;
pub mod index;
pub mod reference;
pub mod scorer;

pub use assignment::BatchAssigner;
pub use combination::CombinationSearch;
pub use engine::ReconEngine;
pub use fallback::FallbackResolver;
pub use index::CandidateIndex;
pub use reference::ReferenceResolver;
pub use scorer::Scorer;
