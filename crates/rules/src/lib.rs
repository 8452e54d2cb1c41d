//! # Rules
//!
//! Character rules engine for live-action campaigns.
//!
//! A [`Ruleset`] is loaded from a directory of definition files, an
//! [`Engine`] binds it to character sheets, and a [`Character`] answers rule
//! questions and applies mutations transactionally. Campaign maxima and the
//! player award ledger live in [`campaign`] and [`records`].
//!
//! ```rust,no_run
//! use larp_rules::{Engine, RankMutation, load_ruleset};
//! use std::sync::Arc;
//!
//! let ruleset = load_ruleset("rules/tempest")?;
//! let engine = Engine::new(Arc::new(ruleset));
//! let mut character = engine.new_character("abc");
//! let decision = character.apply(&RankMutation::parse("fighter:2")?.into(), false);
//! assert!(decision.success, "{}", decision.reason.unwrap_or_default());
//! # Ok::<(), larp_rules::RulesError>(())
//! ```

pub mod campaign;
pub mod character;
pub mod decision;
pub mod defs;
pub mod engine;
mod error;
pub mod expr;
pub mod loader;
pub mod records;
pub mod requirement;
pub mod ruleset;
pub mod tables;

pub use campaign::{CampaignRecord, CampaignValues, EventRecord, Limits};
pub use character::model::{CharacterMetadata, CharacterModel, FeatureModel, Flag, FlagValue};
pub use character::mutation::{ChoiceMutation, Mutation, NoteMutation, PlotMutation, RankMutation};
pub use character::{Character, FeatureController, FeatureForm, FeatureGroup, Issue};
pub use decision::Decision;
pub use engine::Engine;
pub use error::{RulesError, RulesErrorExt};
pub use loader::{deserialize_ruleset, load_ruleset, load_ruleset_strict};
pub use records::{AwardRecord, CharacterRecord, PlayerRecord};
pub use ruleset::Ruleset;
