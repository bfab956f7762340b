//! Per-sentence scoring functions over rule and label occurrences, and the
//! algebra that combines them.
//!
//! All scores are log-potentials. `-inf` forbids a derivation step outright.
//! Two anchorings combine by product (scores add) or quotient (scores
//! subtract); the identity scores 0 on every site its sparsity pattern admits.
//! There is no "absent" anchoring: callers without a scorer pass
//! [`CoreAnchoring::unconstrained`].

use std::fmt;
use std::ops::{Div, Mul};
use std::sync::Arc;

use crate::constraints::{Level, SparsityPattern};
use crate::rules::{Label, RuleId};

/// A source of scores for rule and span occurrences in one sentence.
///
/// Implement this to inject an external scorer into a chart build; wrap it
/// with [`CoreAnchoring::scored`].
pub trait SpanScorer: fmt::Debug + Send + Sync {
  fn score_binary_rule(&self, begin: usize, split: usize, end: usize, rule: RuleId) -> f64;

  fn score_unary_rule(&self, begin: usize, end: usize, rule: RuleId) -> f64;

  fn score_span(&self, begin: usize, end: usize, label: Label) -> f64;
}

#[derive(Debug, Clone)]
pub enum AnchoringKind {
  /// Scores 0 wherever the pattern admits
  Identity,
  /// Delegates to an external scorer
  Base(Arc<dyn SpanScorer>),
  Product(Arc<CoreAnchoring>, Arc<CoreAnchoring>),
  Quotient(Arc<CoreAnchoring>, Arc<CoreAnchoring>),
  /// Scores 0 wherever the inner anchoring is finite, `-inf` elsewhere
  Support(Arc<CoreAnchoring>),
}

/// An unrefined anchoring: one score per label/rule occurrence, gated by a
/// sparsity pattern.
///
/// The pattern gates label occurrences: `score_span` is `-inf` where the bot
/// cell is forbidden, and [`CoreAnchoring::allows_top`] reports whether the top
/// cell may be entered. Rule scores are never gated by the pattern itself.
#[derive(Debug, Clone)]
pub struct CoreAnchoring {
  kind: AnchoringKind,
  pattern: SparsityPattern,
}

impl Default for CoreAnchoring {
  fn default() -> Self {
    Self::unconstrained()
  }
}

impl CoreAnchoring {
  pub fn identity(pattern: SparsityPattern) -> Self {
    Self {
      kind: AnchoringKind::Identity,
      pattern,
    }
  }

  /// The multiplicative unit with no constraints at all
  pub fn unconstrained() -> Self {
    Self::identity(SparsityPattern::unconstrained())
  }

  pub fn scored(scorer: Arc<dyn SpanScorer>) -> Self {
    Self {
      kind: AnchoringKind::Base(scorer),
      pattern: SparsityPattern::unconstrained(),
    }
  }

  pub fn kind(&self) -> &AnchoringKind {
    &self.kind
  }

  pub fn pattern(&self) -> &SparsityPattern {
    &self.pattern
  }

  pub fn is_identity(&self) -> bool {
    matches!(self.kind, AnchoringKind::Identity)
  }

  /// A copy of this anchoring with `pattern` intersected into its own
  pub fn with_constraints(&self, pattern: &SparsityPattern) -> Self {
    Self {
      kind: self.kind.clone(),
      pattern: self.pattern.intersect(pattern),
    }
  }

  /// Lexicon-derived tag view of the pattern
  pub fn is_allowed_tag(&self, pos: usize, label: Label) -> bool {
    self.pattern.is_allowed_tag(pos, label)
  }

  /// The labels allowed to tag `pos`; `None` when nothing constrains them
  pub fn tag_constraints(&self, pos: usize) -> Option<Vec<Label>> {
    self.pattern.allowed_tags(pos)
  }

  pub fn allows_top(&self, begin: usize, end: usize, label: Label) -> bool {
    self.pattern.is_allowed(begin, end, label, Level::Top)
  }

  pub fn score_span(&self, begin: usize, end: usize, label: Label) -> f64 {
    if !self.pattern.is_allowed(begin, end, label, Level::Bot) {
      return f64::NEG_INFINITY;
    }
    match &self.kind {
      AnchoringKind::Identity => 0.0,
      AnchoringKind::Base(scorer) => scorer.score_span(begin, end, label),
      AnchoringKind::Product(a, b) => {
        combine(|x| x.score_span(begin, end, label), a, b, |p, q| p + q)
      }
      AnchoringKind::Quotient(a, b) => {
        combine(|x| x.score_span(begin, end, label), a, b, |p, q| p - q)
      }
      AnchoringKind::Support(a) => support(a.score_span(begin, end, label)),
    }
  }

  pub fn score_binary_rule(&self, begin: usize, split: usize, end: usize, rule: RuleId) -> f64 {
    let score = |x: &CoreAnchoring| x.score_binary_rule(begin, split, end, rule);
    match &self.kind {
      AnchoringKind::Identity => 0.0,
      AnchoringKind::Base(scorer) => scorer.score_binary_rule(begin, split, end, rule),
      AnchoringKind::Product(a, b) => combine(score, a, b, |p, q| p + q),
      AnchoringKind::Quotient(a, b) => combine(score, a, b, |p, q| p - q),
      AnchoringKind::Support(a) => support(score(a)),
    }
  }

  pub fn score_unary_rule(&self, begin: usize, end: usize, rule: RuleId) -> f64 {
    let score = |x: &CoreAnchoring| x.score_unary_rule(begin, end, rule);
    match &self.kind {
      AnchoringKind::Identity => 0.0,
      AnchoringKind::Base(scorer) => scorer.score_unary_rule(begin, end, rule),
      AnchoringKind::Product(a, b) => combine(score, a, b, |p, q| p + q),
      AnchoringKind::Quotient(a, b) => combine(score, a, b, |p, q| p - q),
      AnchoringKind::Support(a) => support(score(a)),
    }
  }

  /// Log-space product. Identities are absorbed: only their patterns survive.
  pub fn product(&self, other: &CoreAnchoring) -> CoreAnchoring {
    match (self.is_identity(), other.is_identity()) {
      (true, true) => Self::identity(self.pattern.intersect(&other.pattern)),
      (true, false) => other.with_constraints(&self.pattern),
      (false, true) => self.with_constraints(&other.pattern),
      (false, false) => Self {
        pattern: self.pattern.intersect(&other.pattern),
        kind: AnchoringKind::Product(Arc::new(self.clone()), Arc::new(other.clone())),
      },
    }
  }

  /// Log-space quotient. Dividing an anchoring by itself (the same shared
  /// value, e.g. a clone) leaves 0 on its support and `-inf` elsewhere;
  /// dividing by an identity only intersects patterns. Everything else builds
  /// a quotient node.
  pub fn quotient(&self, other: &CoreAnchoring) -> CoreAnchoring {
    if self.same_value(other) {
      return match self.kind {
        AnchoringKind::Identity | AnchoringKind::Support(_) => self.clone(),
        _ => Self {
          pattern: self.pattern.clone(),
          kind: AnchoringKind::Support(Arc::new(self.clone())),
        },
      };
    }
    if other.is_identity() {
      return self.with_constraints(&other.pattern);
    }

    Self {
      pattern: self.pattern.intersect(&other.pattern),
      kind: AnchoringKind::Quotient(Arc::new(self.clone()), Arc::new(other.clone())),
    }
  }

  /// Whether both sides share the same underlying scorers and pattern
  fn same_value(&self, other: &CoreAnchoring) -> bool {
    let same_kind = match (&self.kind, &other.kind) {
      (AnchoringKind::Identity, AnchoringKind::Identity) => true,
      (AnchoringKind::Base(a), AnchoringKind::Base(b)) => Arc::ptr_eq(a, b),
      (AnchoringKind::Product(a1, b1), AnchoringKind::Product(a2, b2))
      | (AnchoringKind::Quotient(a1, b1), AnchoringKind::Quotient(a2, b2)) => {
        Arc::ptr_eq(a1, a2) && Arc::ptr_eq(b1, b2)
      }
      (AnchoringKind::Support(a), AnchoringKind::Support(b)) => Arc::ptr_eq(a, b),
      _ => false,
    };
    same_kind && self.pattern == other.pattern
  }
}

/// 0 on finite scores, `-inf` stays `-inf`
fn support(score: f64) -> f64 {
  if score == f64::NEG_INFINITY { score } else { 0.0 }
}

/// Scores a site on both operands; `-inf` on either side forbids the site
fn combine<F, G>(score: F, a: &CoreAnchoring, b: &CoreAnchoring, op: G) -> f64
where
  F: Fn(&CoreAnchoring) -> f64,
  G: Fn(f64, f64) -> f64,
{
  let left = score(a);
  if left == f64::NEG_INFINITY {
    return left;
  }
  let right = score(b);
  if right == f64::NEG_INFINITY {
    return right;
  }
  op(left, right)
}

impl Mul for &CoreAnchoring {
  type Output = CoreAnchoring;

  fn mul(self, other: &CoreAnchoring) -> CoreAnchoring {
    self.product(other)
  }
}

impl Div for &CoreAnchoring {
  type Output = CoreAnchoring;

  fn div(self, other: &CoreAnchoring) -> CoreAnchoring {
    self.quotient(other)
  }
}
