pub mod explainer;
pub mod faq;
pub mod judge;
pub mod language;
pub mod prompt;
pub mod web_search;

pub use explainer::LlmExplainer;
pub use faq::{FAQ_FALLBACK, FaqAnswer, PolicyFaq};
pub use judge::{LlmJudge, parse_judgment};
pub use language::{EnglishOnly, LlmLanguageNormalizer};
pub use web_search::SerpApiSearch;
