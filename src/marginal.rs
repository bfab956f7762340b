use crate::chart::{Level, ParseChart};
use crate::rules::Label;

/// A sentence's inside and outside charts, with its log partition.
///
/// When nothing derives the sentence the partition is `-inf`, every marginal
/// is `-inf`, and [`ChartMarginal::is_parseable`] is false. That is a result,
/// not an error.
#[derive(Debug, Clone)]
pub struct ChartMarginal {
  inside: ParseChart,
  outside: ParseChart,
  log_partition: f64,
}

impl ChartMarginal {
  pub fn new(inside: ParseChart, outside: ParseChart, root: Label) -> Self {
    let log_partition = inside.top.label_score(0, inside.len(), root);
    Self {
      inside,
      outside,
      log_partition,
    }
  }

  pub fn inside(&self) -> &ParseChart {
    &self.inside
  }

  pub fn outside(&self) -> &ParseChart {
    &self.outside
  }

  pub fn len(&self) -> usize {
    self.inside.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inside.is_empty()
  }

  /// Aggregate score of all full derivations (the best one's, under Viterbi)
  pub fn log_partition(&self) -> f64 {
    self.log_partition
  }

  pub fn is_parseable(&self) -> bool {
    self.log_partition != f64::NEG_INFINITY
  }

  /// Log posterior that `label` covers `[begin, end)` at `level`, summed
  /// over refinements.
  pub fn span_marginal(&self, begin: usize, end: usize, label: Label, level: Level) -> f64 {
    if !self.is_parseable() {
      return f64::NEG_INFINITY;
    }
    let inside = self.inside.level(level).refined_scores(begin, end, label);
    let outside = self.outside.level(level).refined_scores(begin, end, label);
    let joint: Vec<f64> = inside.iter().zip(outside).map(|(i, o)| i + o).collect();
    self.inside.semiring().sum(&joint) - self.log_partition
  }

  /// Posterior probability of the span/label, in `[0, 1]` under the sum semiring
  pub fn posterior(&self, begin: usize, end: usize, label: Label, level: Level) -> f64 {
    self.span_marginal(begin, end, label, level).exp()
  }

  /// Labels with a nonzero posterior over the span, with their log posteriors
  pub fn label_marginals(&self, begin: usize, end: usize, level: Level) -> Vec<(Label, f64)> {
    self
      .inside
      .level(level)
      .entered_labels(begin, end)
      .iter()
      .map(|&l| (l, self.span_marginal(begin, end, l, level)))
      .filter(|(_, m)| *m != f64::NEG_INFINITY)
      .collect()
  }
}
