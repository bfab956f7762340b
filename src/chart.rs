use std::fmt;
use std::ops::Range;

pub use crate::constraints::Level;
use crate::rules::Label;
use crate::utils::{log_sum, log_sum_slice, num_spans, span_index};

/// How scores arriving at the same cell combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Semiring {
  /// Best derivation only (max)
  Viterbi,
  /// All derivations (log-sum-exp)
  #[default]
  Sum,
}

impl Semiring {
  pub fn plus(self, a: f64, b: f64) -> f64 {
    match self {
      Self::Viterbi => a.max(b),
      Self::Sum => log_sum(a, b),
    }
  }

  pub fn sum(self, scores: &[f64]) -> f64 {
    match self {
      Self::Viterbi => scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
      Self::Sum => log_sum_slice(scores),
    }
  }
}

/// Buffers the scores for one cell so they're combined and entered at once
#[derive(Debug, Clone)]
pub struct ScoreAccumulator {
  semiring: Semiring,
  scores: Vec<f64>,
}

impl ScoreAccumulator {
  pub fn new(semiring: Semiring) -> Self {
    Self {
      semiring,
      scores: Vec::new(),
    }
  }

  /// Buffers a score; `-inf` is dropped
  pub fn add(&mut self, score: f64) {
    if score != f64::NEG_INFINITY {
      self.scores.push(score);
    }
  }

  pub fn is_empty(&self) -> bool {
    self.scores.is_empty()
  }

  pub fn total(&self) -> f64 {
    self.semiring.sum(&self.scores)
  }

  pub fn clear(&mut self) {
    self.scores.clear();
  }
}

/// One of a chart's two cell layers (top or bot)
#[derive(Debug, Clone)]
pub struct ChartLevel {
  length: usize,
  num_labels: usize,
  width: usize,
  semiring: Semiring,
  scores: Vec<f64>,
  entered: Vec<Vec<Label>>,
  is_entered: Vec<bool>,
  // extents of entered labels: for (begin, label) the nearest and farthest end,
  // for (end, label) the nearest and farthest begin
  narrow_right: Vec<usize>,
  wide_right: Vec<usize>,
  narrow_left: Vec<usize>,
  wide_left: Vec<usize>,
}

impl ChartLevel {
  fn new(length: usize, num_labels: usize, width: usize, semiring: Semiring) -> Self {
    let spans = num_spans(length);
    let positions = (length + 1) * num_labels;
    Self {
      length,
      num_labels,
      width,
      semiring,
      scores: vec![f64::NEG_INFINITY; spans * num_labels * width],
      entered: vec![Vec::new(); spans],
      is_entered: vec![false; spans * num_labels],
      narrow_right: vec![usize::MAX; positions],
      wide_right: vec![0; positions],
      narrow_left: vec![0; positions],
      wide_left: vec![usize::MAX; positions],
    }
  }

  fn slot(&self, begin: usize, end: usize, label: Label, refinement: usize) -> usize {
    debug_assert!(refinement < self.width);
    (span_index(begin, end) * self.num_labels + label) * self.width + refinement
  }

  /// Accumulates `score` into the cell with the chart's semiring
  pub fn enter(&mut self, begin: usize, end: usize, label: Label, refinement: usize, score: f64) {
    if score == f64::NEG_INFINITY {
      return;
    }
    let slot = self.slot(begin, end, label, refinement);
    self.scores[slot] = self.semiring.plus(self.scores[slot], score);

    let span_label = span_index(begin, end) * self.num_labels + label;
    if !self.is_entered[span_label] {
      self.is_entered[span_label] = true;
      self.entered[span_index(begin, end)].push(label);

      let at_begin = begin * self.num_labels + label;
      let at_end = end * self.num_labels + label;
      self.narrow_right[at_begin] = self.narrow_right[at_begin].min(end);
      self.wide_right[at_begin] = self.wide_right[at_begin].max(end);
      self.narrow_left[at_end] = self.narrow_left[at_end].max(begin);
      self.wide_left[at_end] = self.wide_left[at_end].min(begin);
    }
  }

  pub fn refined_score(&self, begin: usize, end: usize, label: Label, refinement: usize) -> f64 {
    if refinement >= self.width {
      return f64::NEG_INFINITY;
    }
    self.scores[self.slot(begin, end, label, refinement)]
  }

  /// Score of `label` with its refinements combined by the chart's semiring
  pub fn label_score(&self, begin: usize, end: usize, label: Label) -> f64 {
    let start = self.slot(begin, end, label, 0);
    self.semiring.sum(&self.scores[start..start + self.width])
  }

  /// All refinement scores for a cell
  pub fn refined_scores(&self, begin: usize, end: usize, label: Label) -> &[f64] {
    let start = self.slot(begin, end, label, 0);
    &self.scores[start..start + self.width]
  }

  /// Labels entered at the span, in the order they were first entered
  pub fn entered_labels(&self, begin: usize, end: usize) -> &[Label] {
    &self.entered[span_index(begin, end)]
  }

  pub fn is_entered(&self, begin: usize, end: usize, label: Label) -> bool {
    self.is_entered[span_index(begin, end) * self.num_labels + label]
  }

  /// Split points where `left` could cover `[begin, split)` and `right` could
  /// cover `[split, end)`, judged by the extents at which each was entered.
  /// Every split in the range still needs its cells checked.
  pub fn feasible_splits(&self, begin: usize, end: usize, left: Label, right: Label) -> Range<usize> {
    let at_begin = begin * self.num_labels + left;
    let at_end = end * self.num_labels + right;

    let lo = (begin + 1)
      .max(self.narrow_right[at_begin])
      .max(self.wide_left[at_end]);
    let hi = end.min(self.wide_right[at_begin] + 1).min(self.narrow_left[at_end] + 1);

    if lo < hi { lo..hi } else { lo..lo }
  }

  pub fn len(&self) -> usize {
    self.length
  }

  pub fn is_empty(&self) -> bool {
    self.length == 0
  }
}

/// The triangular dynamic-programming table: for every span `[begin, end)`
/// and label, a `bot` cell (before unary closure) and a `top` cell (after).
///
/// Holds inside scores after an inside pass and outside scores after an
/// outside pass; which one is up to the builder that filled it.
#[derive(Debug, Clone)]
pub struct ParseChart {
  pub top: ChartLevel,
  pub bot: ChartLevel,
  words: Vec<String>,
  label_names: Vec<String>,
  semiring: Semiring,
}

impl ParseChart {
  pub fn new(words: Vec<String>, label_names: Vec<String>, refinements: usize, semiring: Semiring) -> Self {
    let (length, num_labels) = (words.len(), label_names.len());
    let width = refinements.max(1);
    Self {
      top: ChartLevel::new(length, num_labels, width, semiring),
      bot: ChartLevel::new(length, num_labels, width, semiring),
      words,
      label_names,
      semiring,
    }
  }

  pub fn level(&self, level: Level) -> &ChartLevel {
    match level {
      Level::Top => &self.top,
      Level::Bot => &self.bot,
    }
  }

  pub fn len(&self) -> usize {
    self.words.len()
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }

  pub fn words(&self) -> &[String] {
    &self.words
  }

  pub fn num_labels(&self) -> usize {
    self.label_names.len()
  }

  pub fn label_name(&self, label: Label) -> &str {
    &self.label_names[label]
  }

  pub fn semiring(&self) -> Semiring {
    self.semiring
  }

  /// Width of each cell in refinements
  pub fn refinements(&self) -> usize {
    self.top.width
  }
}

impl fmt::Display for ParseChart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let n = self.len();
    for length in 1..=n {
      for begin in 0..=(n - length) {
        let end = begin + length;
        if self.top.entered_labels(begin, end).is_empty() && self.bot.entered_labels(begin, end).is_empty() {
          continue;
        }
        writeln!(f, "{}..{}: {}", begin, end, self.words[begin..end].join(" "))?;
        for (name, level) in [("bot", &self.bot), ("top", &self.top)] {
          for &label in level.entered_labels(begin, end) {
            writeln!(
              f,
              "  {} {}: {:.4}",
              name,
              self.label_names[label],
              level.label_score(begin, end, label)
            )?;
          }
        }
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chart(semiring: Semiring) -> ParseChart {
    let words = ["a", "b", "c", "d"].iter().map(|w| w.to_string()).collect();
    let labels = ["X", "Y"].iter().map(|w| w.to_string()).collect();
    ParseChart::new(words, labels, 2, semiring)
  }

  #[test]
  fn enter_accumulates_per_semiring() {
    let mut viterbi = chart(Semiring::Viterbi);
    viterbi.bot.enter(0, 2, 1, 0, -2.0);
    viterbi.bot.enter(0, 2, 1, 0, -1.0);
    assert_eq!(viterbi.bot.refined_score(0, 2, 1, 0), -1.0);

    let mut sum = chart(Semiring::Sum);
    sum.bot.enter(0, 2, 1, 0, 0.0);
    sum.bot.enter(0, 2, 1, 0, 0.0);
    sum.bot.enter(0, 2, 1, 1, 0.0);
    assert!((sum.bot.refined_score(0, 2, 1, 0) - 2f64.ln()).abs() < 1e-12);
    assert!((sum.bot.label_score(0, 2, 1) - 3f64.ln()).abs() < 1e-12);
    assert_eq!(sum.top.label_score(0, 2, 1), f64::NEG_INFINITY);
  }

  #[test]
  fn tracks_entered_labels() {
    let mut c = chart(Semiring::Sum);
    c.top.enter(1, 3, 1, 0, -0.5);
    c.top.enter(1, 3, 0, 1, -0.5);
    c.top.enter(1, 3, 1, 1, -0.5);
    c.top.enter(1, 3, 0, 0, f64::NEG_INFINITY);
    assert_eq!(c.top.entered_labels(1, 3), &[1, 0]);
    assert!(c.top.is_entered(1, 3, 0));
    assert!(!c.top.is_entered(0, 3, 0));
    assert!(c.bot.entered_labels(1, 3).is_empty());
  }

  #[test]
  fn feasible_splits_follow_entered_extents() {
    let mut c = chart(Semiring::Sum);
    // X over 0..1 and 0..2, Y over 2..4 only
    c.top.enter(0, 1, 0, 0, 0.0);
    c.top.enter(0, 2, 0, 0, 0.0);
    c.top.enter(2, 4, 1, 0, 0.0);

    assert_eq!(c.top.feasible_splits(0, 4, 0, 1), 2..3);
    assert!(c.top.feasible_splits(0, 4, 1, 0).is_empty());
    assert!(c.top.feasible_splits(0, 3, 0, 1).is_empty());

    c.top.enter(1, 4, 1, 0, 0.0);
    assert_eq!(c.top.feasible_splits(0, 4, 0, 1), 1..3);
  }

  #[test]
  fn accumulator_combines_batch() {
    let mut acc = ScoreAccumulator::new(Semiring::Sum);
    acc.add(f64::NEG_INFINITY);
    assert!(acc.is_empty());
    acc.add(-1.0);
    acc.add(-1.0);
    assert!((acc.total() - (-1.0 + 2f64.ln())).abs() < 1e-12);
    acc.clear();
    assert_eq!(acc.total(), f64::NEG_INFINITY);
  }
}
