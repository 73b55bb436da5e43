pub mod chunk;
pub mod collection;
pub mod conditions;
pub mod context;
pub mod keywords;

mod error;

pub use chunk::{Chunk, ChunkGroup, ChunkLink, LinkMode};
pub use collection::{ChunkCollection, ChunkEntry, CompiledKeyword};
pub use conditions::{CompiledConditions, ConditionLogic, ConditionRule, ConditionSet, Evaluation};
pub use context::{ContextMessage, SceneBoundary, SearchContext};
pub use error::{Error, Result};
pub use keywords::{KeywordMatcher, QueryTerms, TextMatcher};
