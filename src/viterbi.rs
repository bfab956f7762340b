use crate::chart::ParseChart;
use crate::grammar::Grammar;
use crate::refined::RefinedAnchoring;
use crate::rules::Label;
use crate::syntree::{Constituent, SynTree, Word};

const NEG_INF: f64 = f64::NEG_INFINITY;

/// Reads the best derivation back out of a Viterbi inside chart by
/// re-scoring the ways each cell could have been built and following the
/// best one.
pub struct ViterbiDecoder<'a> {
  grammar: &'a Grammar,
  chart: &'a ParseChart,
  anchoring: &'a dyn RefinedAnchoring,
}

enum TopStep {
  Copy,
  Unary { child: Label, child_ref: usize },
}

impl<'a> ViterbiDecoder<'a> {
  pub fn new(grammar: &'a Grammar, chart: &'a ParseChart, anchoring: &'a dyn RefinedAnchoring) -> Self {
    Self {
      grammar,
      chart,
      anchoring,
    }
  }

  /// The best tree rooted at the grammar's root over the whole sentence, and
  /// its score. `None` if the root cell is empty.
  pub fn decode(&self) -> Option<(SynTree<String, String>, f64)> {
    let n = self.chart.len();
    let root = self.grammar.root();
    let (best_ref, best) = argmax(
      self
        .anchoring
        .valid_label_refinements(0, n, root)
        .iter()
        .map(|&r| (r, self.chart.top.refined_score(0, n, root, r))),
    )?;
    let tree = self.decode_top(0, n, root, best_ref)?;
    Some((tree, best))
  }

  fn branch(&self, begin: usize, end: usize, label: Label, children: Vec<SynTree<String, String>>) -> SynTree<String, String> {
    SynTree::Branch(
      Constituent {
        value: self.grammar.label_name(label).to_string(),
        span: (begin, end),
      },
      children,
    )
  }

  fn decode_top(&self, begin: usize, end: usize, label: Label, refinement: usize) -> Option<SynTree<String, String>> {
    let g = self.grammar;
    let a = self.anchoring;
    let bot = &self.chart.bot;

    let mut candidates = Vec::new();
    if a.allows_top(begin, end, label) {
      candidates.push((TopStep::Copy, bot.refined_score(begin, end, label, refinement)));
    }
    for &rule in g.unary_rules_with_parent(label) {
      let child = g.child(rule);
      let base = g.rule_score(rule);
      for &rr in a.valid_unary_rule_refinements_given_parent(begin, end, rule, refinement) {
        let child_ref = a.child_refinement(rule, rr);
        let score = bot.refined_score(begin, end, child, child_ref) + base + a.score_unary_rule(begin, end, rule, rr);
        candidates.push((TopStep::Unary { child, child_ref }, score));
      }
    }

    match argmax(candidates.into_iter())?.0 {
      TopStep::Copy => self.decode_bot(begin, end, label, refinement),
      TopStep::Unary { child, child_ref } => {
        let below = self.decode_bot(begin, end, child, child_ref)?;
        Some(self.branch(begin, end, label, vec![below]))
      }
    }
  }

  fn decode_bot(&self, begin: usize, end: usize, label: Label, refinement: usize) -> Option<SynTree<String, String>> {
    if end - begin == 1 {
      let word = SynTree::Leaf(Word {
        value: self.chart.words()[begin].clone(),
        span: (begin, end),
      });
      return Some(self.branch(begin, end, label, vec![word]));
    }

    let g = self.grammar;
    let a = self.anchoring;
    let top = &self.chart.top;

    let mut candidates = Vec::new();
    for &rule in g.binary_rules_with_parent(label) {
      let (left, right) = (g.left_child(rule), g.right_child(rule));
      let base = g.rule_score(rule);
      for &rr in a.valid_rule_refinements_given_parent(begin, end, rule, refinement) {
        let (lr, rref) = (a.left_child_refinement(rule, rr), a.right_child_refinement(rule, rr));
        for split in top.feasible_splits(begin, end, left, right) {
          let score = top.refined_score(begin, split, left, lr)
            + top.refined_score(split, end, right, rref)
            + base
            + a.score_binary_rule(begin, split, end, rule, rr);
          candidates.push(((split, left, lr, right, rref), score));
        }
      }
    }

    let ((split, left, lr, right, rref), _) = argmax(candidates.into_iter())?;
    let children = vec![
      self.decode_top(begin, split, left, lr)?,
      self.decode_top(split, end, right, rref)?,
    ];
    Some(self.branch(begin, end, label, children))
  }
}

/// The first highest-scoring item, ignoring `-inf`
fn argmax<T>(items: impl Iterator<Item = (T, f64)>) -> Option<(T, f64)> {
  let mut best: Option<(T, f64)> = None;
  for (item, score) in items {
    if score == NEG_INF {
      continue;
    }
    if best.as_ref().is_none_or(|(_, b)| score > *b) {
      best = Some((item, score));
    }
  }
  best
}
