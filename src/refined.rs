//! Anchorings whose labels and rules carry latent refinements.
//!
//! A refined anchoring scores `(site, refinement)` pairs and describes which
//! refinements exist. Rule refinements are joint indices; the anchoring maps
//! them back to the refinement of each label the rule touches.

use crate::anchoring::CoreAnchoring;
use crate::rules::{Label, RuleId};

/// The only refinement of an unrefined site
static SINGLE_REFINEMENT: [usize; 1] = [0];

pub trait RefinedAnchoring {
  fn score_span(&self, begin: usize, end: usize, label: Label, refinement: usize) -> f64;

  fn score_binary_rule(&self, begin: usize, split: usize, end: usize, rule: RuleId, refinement: usize) -> f64;

  fn score_unary_rule(&self, begin: usize, end: usize, rule: RuleId, refinement: usize) -> f64;

  /// May the top cell of `label` at this span be entered at all?
  fn allows_top(&self, begin: usize, end: usize, label: Label) -> bool;

  fn num_label_refinements(&self, label: Label) -> usize;

  fn num_rule_refinements(&self, rule: RuleId) -> usize;

  fn valid_label_refinements(&self, begin: usize, end: usize, label: Label) -> &[usize];

  /// Rule refinements compatible with the parent's refinement
  fn valid_rule_refinements_given_parent(&self, begin: usize, end: usize, rule: RuleId, parent_ref: usize) -> &[usize];

  /// Unary rule refinements compatible with the parent's refinement
  fn valid_unary_rule_refinements_given_parent(&self, begin: usize, end: usize, rule: RuleId, parent_ref: usize) -> &[usize];

  /// Unary rule refinements compatible with the child's refinement
  fn valid_unary_rule_refinements_given_child(&self, begin: usize, end: usize, rule: RuleId, child_ref: usize) -> &[usize];

  fn parent_refinement(&self, rule: RuleId, rule_ref: usize) -> usize;

  fn left_child_refinement(&self, rule: RuleId, rule_ref: usize) -> usize;

  fn right_child_refinement(&self, rule: RuleId, rule_ref: usize) -> usize;

  /// Child refinement of a unary rule refinement
  fn child_refinement(&self, rule: RuleId, rule_ref: usize) -> usize;

  /// Widest refinement count over all labels, used to size chart cells
  fn max_label_refinements(&self, num_labels: usize) -> usize {
    (0..num_labels)
      .map(|l| self.num_label_refinements(l))
      .max()
      .unwrap_or(1)
  }
}

/// A core anchoring seen as a refined one, where every site has exactly the
/// refinement 0.
#[derive(Debug, Clone, Copy)]
pub struct LiftedAnchoring<'a> {
  core: &'a CoreAnchoring,
}

impl<'a> LiftedAnchoring<'a> {
  pub fn new(core: &'a CoreAnchoring) -> Self {
    Self { core }
  }

  pub fn core(&self) -> &CoreAnchoring {
    self.core
  }
}

impl CoreAnchoring {
  pub fn lift(&self) -> LiftedAnchoring<'_> {
    LiftedAnchoring::new(self)
  }
}

impl RefinedAnchoring for LiftedAnchoring<'_> {
  fn score_span(&self, begin: usize, end: usize, label: Label, _: usize) -> f64 {
    self.core.score_span(begin, end, label)
  }

  fn score_binary_rule(&self, begin: usize, split: usize, end: usize, rule: RuleId, _: usize) -> f64 {
    self.core.score_binary_rule(begin, split, end, rule)
  }

  fn score_unary_rule(&self, begin: usize, end: usize, rule: RuleId, _: usize) -> f64 {
    self.core.score_unary_rule(begin, end, rule)
  }

  fn allows_top(&self, begin: usize, end: usize, label: Label) -> bool {
    self.core.allows_top(begin, end, label)
  }

  fn num_label_refinements(&self, _: Label) -> usize {
    1
  }

  fn num_rule_refinements(&self, _: RuleId) -> usize {
    1
  }

  fn valid_label_refinements(&self, _: usize, _: usize, _: Label) -> &[usize] {
    &SINGLE_REFINEMENT
  }

  fn valid_rule_refinements_given_parent(&self, _: usize, _: usize, _: RuleId, _: usize) -> &[usize] {
    &SINGLE_REFINEMENT
  }

  fn valid_unary_rule_refinements_given_parent(&self, _: usize, _: usize, _: RuleId, _: usize) -> &[usize] {
    &SINGLE_REFINEMENT
  }

  fn valid_unary_rule_refinements_given_child(&self, _: usize, _: usize, _: RuleId, _: usize) -> &[usize] {
    &SINGLE_REFINEMENT
  }

  fn parent_refinement(&self, _: RuleId, _: usize) -> usize {
    0
  }

  fn left_child_refinement(&self, _: RuleId, _: usize) -> usize {
    0
  }

  fn right_child_refinement(&self, _: RuleId, _: usize) -> usize {
    0
  }

  fn child_refinement(&self, _: RuleId, _: usize) -> usize {
    0
  }

  fn max_label_refinements(&self, _: usize) -> usize {
    1
  }
}

/// The product of a refined anchoring with a core one. Refinement structure
/// comes from the refined side; the core side scores every refinement of a
/// site alike.
#[derive(Debug, Clone, Copy)]
pub struct RefinedProduct<'a, R> {
  refined: &'a R,
  core: &'a CoreAnchoring,
}

impl<'a, R: RefinedAnchoring> RefinedProduct<'a, R> {
  pub fn new(refined: &'a R, core: &'a CoreAnchoring) -> Self {
    Self { refined, core }
  }
}

/// Adds two log scores, keeping `-inf` absorbing without evaluating the second
fn then_add(first: f64, second: impl FnOnce() -> f64) -> f64 {
  if first == f64::NEG_INFINITY {
    first
  } else {
    first + second()
  }
}

impl<R: RefinedAnchoring> RefinedAnchoring for RefinedProduct<'_, R> {
  fn score_span(&self, begin: usize, end: usize, label: Label, refinement: usize) -> f64 {
    then_add(self.core.score_span(begin, end, label), || {
      self.refined.score_span(begin, end, label, refinement)
    })
  }

  fn score_binary_rule(&self, begin: usize, split: usize, end: usize, rule: RuleId, refinement: usize) -> f64 {
    then_add(self.core.score_binary_rule(begin, split, end, rule), || {
      self.refined.score_binary_rule(begin, split, end, rule, refinement)
    })
  }

  fn score_unary_rule(&self, begin: usize, end: usize, rule: RuleId, refinement: usize) -> f64 {
    then_add(self.core.score_unary_rule(begin, end, rule), || {
      self.refined.score_unary_rule(begin, end, rule, refinement)
    })
  }

  fn allows_top(&self, begin: usize, end: usize, label: Label) -> bool {
    self.core.allows_top(begin, end, label) && self.refined.allows_top(begin, end, label)
  }

  fn num_label_refinements(&self, label: Label) -> usize {
    self.refined.num_label_refinements(label)
  }

  fn num_rule_refinements(&self, rule: RuleId) -> usize {
    self.refined.num_rule_refinements(rule)
  }

  fn valid_label_refinements(&self, begin: usize, end: usize, label: Label) -> &[usize] {
    self.refined.valid_label_refinements(begin, end, label)
  }

  fn valid_rule_refinements_given_parent(&self, begin: usize, end: usize, rule: RuleId, parent_ref: usize) -> &[usize] {
    self.refined.valid_rule_refinements_given_parent(begin, end, rule, parent_ref)
  }

  fn valid_unary_rule_refinements_given_parent(&self, begin: usize, end: usize, rule: RuleId, parent_ref: usize) -> &[usize] {
    self
      .refined
      .valid_unary_rule_refinements_given_parent(begin, end, rule, parent_ref)
  }

  fn valid_unary_rule_refinements_given_child(&self, begin: usize, end: usize, rule: RuleId, child_ref: usize) -> &[usize] {
    self
      .refined
      .valid_unary_rule_refinements_given_child(begin, end, rule, child_ref)
  }

  fn parent_refinement(&self, rule: RuleId, rule_ref: usize) -> usize {
    self.refined.parent_refinement(rule, rule_ref)
  }

  fn left_child_refinement(&self, rule: RuleId, rule_ref: usize) -> usize {
    self.refined.left_child_refinement(rule, rule_ref)
  }

  fn right_child_refinement(&self, rule: RuleId, rule_ref: usize) -> usize {
    self.refined.right_child_refinement(rule, rule_ref)
  }

  fn child_refinement(&self, rule: RuleId, rule_ref: usize) -> usize {
    self.refined.child_refinement(rule, rule_ref)
  }

  fn max_label_refinements(&self, num_labels: usize) -> usize {
    self.refined.max_label_refinements(num_labels)
  }
}
