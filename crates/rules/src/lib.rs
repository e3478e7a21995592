pub mod policy;
pub mod tariff;
pub mod engine;

pub use policy::{ClaimProcess, HospitalizationWindow, PolicyKeywords, PolicyRules};
pub use tariff::Tariff;
pub use engine::{ClaimData, RulesEngine};
