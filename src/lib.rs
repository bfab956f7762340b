//! A probabilistic chart parser: inside/outside passes over a binary/unary
//! grammar under composable per-sentence scoring functions, with optional
//! latent refinements and coarse-to-fine pruning.
//!
//! ```
//! use chartwright::{ChartBuilder, CoreAnchoring, GrammarBundle};
//!
//! let bundle: GrammarBundle = r#"
//!   S -> NP VP;
//!   NP -> "the dog";
//!   VP -> "barks";
//! "#
//! .parse()
//! .unwrap();
//!
//! let builder = ChartBuilder::new(bundle.grammar, bundle.lexicon);
//! let marginal = builder
//!   .marginal(&["the dog", "barks"], &CoreAnchoring::unconstrained())
//!   .unwrap();
//! assert_eq!(marginal.log_partition(), 0.0);
//! ```

#[macro_use]
extern crate lazy_static;

pub mod anchoring;
pub mod chart;
pub mod cky;
pub mod coarse_to_fine;
pub mod config;
pub mod constraints;
pub mod error;
pub mod grammar;
pub mod latent;
pub mod lexicon;
pub mod marginal;
pub mod parse_grammar;
pub mod refined;
pub mod rules;
pub mod syntree;
pub mod utils;
pub mod viterbi;

pub use crate::anchoring::{CoreAnchoring, SpanScorer};
pub use crate::chart::{Level, ParseChart, Semiring};
pub use crate::cky::ChartBuilder;
pub use crate::coarse_to_fine::{CoarseToFineParser, LabelProjection};
pub use crate::config::ParserConfig;
pub use crate::constraints::SparsityPattern;
pub use crate::error::{GrammarError, ParseError};
pub use crate::grammar::{Grammar, GrammarBuilder};
pub use crate::latent::LatentGrammar;
pub use crate::lexicon::{Lexicon, LexiconAnchor, SimpleLexicon};
pub use crate::marginal::ChartMarginal;
pub use crate::parse_grammar::GrammarBundle;
pub use crate::refined::RefinedAnchoring;
pub use crate::syntree::SynTree;
pub use crate::utils::Err;
