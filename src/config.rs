use crate::chart::Semiring;

/// Pruning threshold used when none is configured: sites whose coarse
/// posterior log-probability is at or below this are pruned.
pub const DEFAULT_PRUNING_THRESHOLD: f64 = -10.0;

/// Knobs shared by chart builders and the coarse-to-fine parser
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParserConfig {
  /// Longest span the inside pass will try to build. Longer spans are never
  /// attempted, so sentences longer than this get no full parse. `None`
  /// means the sentence length.
  pub max_span_length: Option<usize>,
  pub pruning_threshold: f64,
  pub semiring: Semiring,
}

impl Default for ParserConfig {
  fn default() -> Self {
    Self {
      max_span_length: None,
      pruning_threshold: DEFAULT_PRUNING_THRESHOLD,
      semiring: Semiring::Sum,
    }
  }
}

impl ParserConfig {
  pub fn with_max_span_length(mut self, max: usize) -> Self {
    self.max_span_length = Some(max);
    self
  }

  pub fn with_pruning_threshold(mut self, threshold: f64) -> Self {
    self.pruning_threshold = threshold;
    self
  }

  pub fn with_semiring(mut self, semiring: Semiring) -> Self {
    self.semiring = semiring;
    self
  }

  /// The effective span cap for a sentence of `length` tokens
  pub fn span_cap(&self, length: usize) -> usize {
    self.max_span_length.map_or(length, |max| max.min(length))
  }
}
