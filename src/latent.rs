//! A latent-variable refinement model: every label is split into a fixed
//! number of sub-categories, and every rule into all combinations of its
//! labels' sub-categories.

use std::sync::Arc;

use crate::error::GrammarError;
use crate::grammar::Grammar;
use crate::refined::RefinedAnchoring;
use crate::rules::{Label, Rule, RuleId};

#[derive(Debug, Clone)]
pub struct LatentGrammar {
  grammar: Arc<Grammar>,
  label_counts: Vec<usize>,
  label_refs: Vec<Vec<usize>>,
  /// Every joint refinement of each rule, in encoding order
  rule_refs: Vec<Vec<usize>>,
  /// For unary rules, joint refinements grouped by child refinement
  unary_by_child_ref: Vec<Vec<Vec<usize>>>,
  rule_scores: Vec<Vec<f64>>,
  span_scores: Vec<Vec<f64>>,
}

impl LatentGrammar {
  /// Splits every label except the root into `k` refinements, weighting
  /// refined rules so that summing out the children's refinements recovers
  /// the base grammar.
  pub fn split_uniform(grammar: Arc<Grammar>, k: usize) -> Self {
    let root = grammar.root();
    let counts = (0..grammar.num_labels())
      .map(|l| if l == root { 1 } else { k.max(1) })
      .collect();
    Self::with_refinements(grammar, counts)
  }

  /// Uses `counts[label]` refinements per label, uniformly weighted
  pub fn with_refinements(grammar: Arc<Grammar>, counts: Vec<usize>) -> Self {
    assert_eq!(counts.len(), grammar.num_labels(), "one refinement count per label");
    let label_refs = counts.iter().map(|&k| (0..k).collect()).collect();

    let mut rule_refs = Vec::with_capacity(grammar.num_rules());
    let mut unary_by_child_ref = Vec::with_capacity(grammar.num_rules());
    let mut rule_scores = Vec::with_capacity(grammar.num_rules());

    for rule in 0..grammar.num_rules() {
      match *grammar.rule(rule) {
        Rule::Binary { parent, left, right } => {
          let children = counts[left] * counts[right];
          rule_refs.push((0..counts[parent] * children).collect());
          unary_by_child_ref.push(Vec::new());
          rule_scores.push(vec![-(children as f64).ln(); counts[parent] * children]);
        }
        Rule::Unary { parent, child } => {
          let kc = counts[child];
          rule_refs.push((0..counts[parent] * kc).collect());
          unary_by_child_ref.push(
            (0..kc)
              .map(|c| (0..counts[parent]).map(|p| p * kc + c).collect())
              .collect(),
          );
          rule_scores.push(vec![-(kc as f64).ln(); counts[parent] * kc]);
        }
      }
    }

    let span_scores = counts.iter().map(|&k| vec![0.0; k]).collect();

    Self {
      grammar,
      label_counts: counts,
      label_refs,
      rule_refs,
      unary_by_child_ref,
      rule_scores,
      span_scores,
    }
  }

  pub fn grammar(&self) -> &Arc<Grammar> {
    &self.grammar
  }

  pub fn label_refinements(&self, label: Label) -> usize {
    self.label_counts[label]
  }

  fn check(&self, label: Label, refinement: usize) -> Result<(), GrammarError> {
    if refinement >= self.label_counts[label] {
      Err(GrammarError::RefinementOutOfRange {
        what: self.grammar.label_name(label).to_string(),
        refinement,
        available: self.label_counts[label],
      })
    } else {
      Ok(())
    }
  }

  pub fn set_binary_score(
    &mut self,
    rule: RuleId,
    parent_ref: usize,
    left_ref: usize,
    right_ref: usize,
    score: f64,
  ) -> Result<(), GrammarError> {
    let (parent, left, right) = match *self.grammar.rule(rule) {
      Rule::Binary { parent, left, right } => (parent, left, right),
      Rule::Unary { .. } => {
        return Err(GrammarError::WrongRuleKind {
          rule,
          expected: "binary",
        });
      }
    };
    self.check(parent, parent_ref)?;
    self.check(left, left_ref)?;
    self.check(right, right_ref)?;
    let (kl, kr) = (self.label_counts[left], self.label_counts[right]);
    self.rule_scores[rule][(parent_ref * kl + left_ref) * kr + right_ref] = score;
    Ok(())
  }

  pub fn set_unary_score(&mut self, rule: RuleId, parent_ref: usize, child_ref: usize, score: f64) -> Result<(), GrammarError> {
    let (parent, child) = match *self.grammar.rule(rule) {
      Rule::Unary { parent, child } => (parent, child),
      Rule::Binary { .. } => {
        return Err(GrammarError::WrongRuleKind {
          rule,
          expected: "unary",
        });
      }
    };
    self.check(parent, parent_ref)?;
    self.check(child, child_ref)?;
    self.rule_scores[rule][parent_ref * self.label_counts[child] + child_ref] = score;
    Ok(())
  }

  pub fn set_span_score(&mut self, label: Label, refinement: usize, score: f64) -> Result<(), GrammarError> {
    self.check(label, refinement)?;
    self.span_scores[label][refinement] = score;
    Ok(())
  }

  /// The model applied to a sentence. Refined scores here don't depend on
  /// position, so the anchoring only borrows the tables.
  pub fn anchor(&self, length: usize) -> LatentAnchoring<'_> {
    LatentAnchoring { model: self, length }
  }

  /// Product of the refinement counts of a binary rule's children
  fn child_width(&self, rule: RuleId) -> usize {
    match *self.grammar.rule(rule) {
      Rule::Binary { left, right, .. } => self.label_counts[left] * self.label_counts[right],
      Rule::Unary { child, .. } => self.label_counts[child],
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct LatentAnchoring<'a> {
  model: &'a LatentGrammar,
  length: usize,
}

impl LatentAnchoring<'_> {
  pub fn len(&self) -> usize {
    self.length
  }

  pub fn is_empty(&self) -> bool {
    self.length == 0
  }
}

impl RefinedAnchoring for LatentAnchoring<'_> {
  fn score_span(&self, _: usize, _: usize, label: Label, refinement: usize) -> f64 {
    self.model.span_scores[label][refinement]
  }

  fn score_binary_rule(&self, _: usize, _: usize, _: usize, rule: RuleId, refinement: usize) -> f64 {
    self.model.rule_scores[rule][refinement]
  }

  fn score_unary_rule(&self, _: usize, _: usize, rule: RuleId, refinement: usize) -> f64 {
    self.model.rule_scores[rule][refinement]
  }

  fn allows_top(&self, _: usize, end: usize, _: Label) -> bool {
    end <= self.length
  }

  fn num_label_refinements(&self, label: Label) -> usize {
    self.model.label_counts[label]
  }

  fn num_rule_refinements(&self, rule: RuleId) -> usize {
    self.model.rule_refs[rule].len()
  }

  fn valid_label_refinements(&self, _: usize, _: usize, label: Label) -> &[usize] {
    &self.model.label_refs[label]
  }

  fn valid_rule_refinements_given_parent(&self, _: usize, _: usize, rule: RuleId, parent_ref: usize) -> &[usize] {
    let width = self.model.child_width(rule);
    &self.model.rule_refs[rule][parent_ref * width..(parent_ref + 1) * width]
  }

  fn valid_unary_rule_refinements_given_parent(&self, begin: usize, end: usize, rule: RuleId, parent_ref: usize) -> &[usize] {
    self.valid_rule_refinements_given_parent(begin, end, rule, parent_ref)
  }

  fn valid_unary_rule_refinements_given_child(&self, _: usize, _: usize, rule: RuleId, child_ref: usize) -> &[usize] {
    &self.model.unary_by_child_ref[rule][child_ref]
  }

  fn parent_refinement(&self, rule: RuleId, rule_ref: usize) -> usize {
    rule_ref / self.model.child_width(rule)
  }

  fn left_child_refinement(&self, rule: RuleId, rule_ref: usize) -> usize {
    let right = self.model.grammar.right_child(rule);
    let left = self.model.grammar.left_child(rule);
    (rule_ref / self.model.label_counts[right]) % self.model.label_counts[left]
  }

  fn right_child_refinement(&self, rule: RuleId, rule_ref: usize) -> usize {
    let right = self.model.grammar.right_child(rule);
    rule_ref % self.model.label_counts[right]
  }

  fn child_refinement(&self, rule: RuleId, rule_ref: usize) -> usize {
    let child = self.model.grammar.child(rule);
    rule_ref % self.model.label_counts[child]
  }
}
