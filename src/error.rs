use std::fmt;

use thiserror::Error;

/// Problems detected while building a grammar, a projection or a refinement
/// model. These are configuration mistakes, never properties of a sentence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GrammarError {
  /// A rule or projection named a label the grammar doesn't know
  #[error("unknown label: {0}")]
  UnknownLabel(String),

  /// The unary rules contain a cycle (self-loops included). The chart applies
  /// exactly one unary step per span, and the bot -> top copy is implicit.
  #[error("unary rule cycle: {}", .0.join(" -> "))]
  UnaryCycle(Vec<String>),

  /// Two unary rules stack over the same span, e.g. `S -> VP` over
  /// `VP -> V`. Such chains must be collapsed into one rule beforehand.
  #[error("unary chain longer than one step: {}", .0.join(" -> "))]
  UnaryChain(Vec<String>),

  /// The root label has no rules with it as parent
  #[error("root label {0} heads no rules")]
  MissingRoot(String),

  #[error("grammar has no rules")]
  Empty,

  /// A label projection doesn't cover the fine label space
  #[error("label projection covers {got} labels, fine grammar has {expected}")]
  ProjectionMismatch { expected: usize, got: usize },

  /// A binary-rule operation was given a unary rule, or the other way round
  #[error("rule {rule} is not a {expected} rule")]
  WrongRuleKind { rule: usize, expected: &'static str },

  /// A refinement model was asked for a refinement that doesn't exist
  #[error("refinement {refinement} out of range for {what} (has {available})")]
  RefinementOutOfRange {
    what: String,
    refinement: usize,
    available: usize,
  },
}

/// The raw lexical scores for a token, kept for coverage diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable(pub Vec<(String, f64)>);

impl fmt::Display for ScoreTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{{")?;
    for (idx, (label, score)) in self.0.iter().enumerate() {
      if idx > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}: {}", label, score)?;
    }
    write!(f, "}}")
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
  /// No label has a finite lexical score for this token: the lexicon can't
  /// cover it, so no chart over this sentence is meaningful.
  #[error("no label covers token {token:?} at position {position}; lexical scores: {scores}")]
  Coverage {
    position: usize,
    token: String,
    scores: ScoreTable,
  },

  /// The coarse grammar assigns the sentence zero probability, so nothing
  /// can be pruned against it. Distinct from a fine-grammar parse failure.
  #[error("sentence is unparseable under the coarse grammar ({length} tokens)")]
  CoarseUnparseable { length: usize },

  #[error("cannot parse an empty sentence")]
  EmptySentence,

  /// The scorer's sparsity pattern was built for another sentence length or
  /// label set
  #[error("constraints cover {length} tokens and {labels} labels, sentence has {expected_length} tokens and grammar {expected_labels} labels")]
  ConstraintShape {
    length: usize,
    labels: usize,
    expected_length: usize,
    expected_labels: usize,
  },

  /// The cancellation hook asked the builder to stop
  #[error("parse cancelled at span length {span_length}")]
  Cancelled { span_length: usize },

  #[error(transparent)]
  Grammar(#[from] GrammarError),
}
