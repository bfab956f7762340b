//! Two-pass parsing: a cheap coarse grammar's posteriors decide which fine
//! span/label sites the expensive fine chart may use.

use tracing::{debug, warn};

use crate::anchoring::CoreAnchoring;
use crate::chart::{ParseChart, Semiring};
use crate::cky::ChartBuilder;
use crate::constraints::{Level, SparsityPattern};
use crate::error::{GrammarError, ParseError};
use crate::grammar::Grammar;
use crate::marginal::ChartMarginal;
use crate::rules::Label;
use crate::syntree::SynTree;
use crate::utils::num_spans;

/// Maps each fine label to the coarse label it refines
#[derive(Debug, Clone, PartialEq)]
pub struct LabelProjection {
  map: Vec<Label>,
}

impl LabelProjection {
  /// Projects by name: `project` turns a fine label's name into the name of
  /// its coarse label, which must exist in `coarse`.
  pub fn new<F>(fine: &Grammar, coarse: &Grammar, project: F) -> Result<Self, GrammarError>
  where
    F: Fn(&str) -> String,
  {
    let map = fine
      .labels()
      .names()
      .iter()
      .map(|name| {
        let target = project(name);
        coarse
          .labels()
          .get(&target)
          .ok_or(GrammarError::UnknownLabel(target))
      })
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { map })
  }

  /// `map[fine]` is the coarse label of `fine`
  pub fn from_indices(map: Vec<Label>, coarse: &Grammar) -> Result<Self, GrammarError> {
    if let Some(&bad) = map.iter().find(|&&l| l >= coarse.num_labels()) {
      return Err(GrammarError::UnknownLabel(format!("#{}", bad)));
    }
    Ok(Self { map })
  }

  pub fn project(&self, fine: Label) -> Label {
    self.map[fine]
  }

  /// Number of fine labels covered
  pub fn len(&self) -> usize {
    self.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }
}

/// Parses with a fine builder restricted to the sites a coarse builder finds
/// plausible.
///
/// A fine site survives when the coarse log posterior of its projected label
/// at the same span and level is above the pruning threshold. Pruning only
/// ever acts on spans and labels; rules are scored 0 by the mask.
#[derive(Debug, Clone)]
pub struct CoarseToFineParser {
  coarse: ChartBuilder,
  fine: ChartBuilder,
  projection: LabelProjection,
  threshold: f64,
}

impl CoarseToFineParser {
  /// The coarse builder always runs with the sum semiring, since pruning
  /// needs true posteriors. The threshold comes from the fine builder's
  /// config.
  pub fn new(coarse: ChartBuilder, fine: ChartBuilder, projection: LabelProjection) -> Result<Self, GrammarError> {
    let expected = fine.grammar().num_labels();
    if projection.len() != expected {
      return Err(GrammarError::ProjectionMismatch {
        expected,
        got: projection.len(),
      });
    }

    let coarse_config = coarse.config().with_semiring(Semiring::Sum);
    let threshold = fine.config().pruning_threshold;
    Ok(Self {
      coarse: coarse.with_config(coarse_config),
      fine,
      projection,
      threshold,
    })
  }

  pub fn with_threshold(mut self, threshold: f64) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn threshold(&self) -> f64 {
    self.threshold
  }

  pub fn coarse(&self) -> &ChartBuilder {
    &self.coarse
  }

  pub fn fine(&self) -> &ChartBuilder {
    &self.fine
  }

  /// Runs the coarse pass and turns its posteriors into an identity
  /// anchoring over the fine label space that forbids every pruned site.
  pub fn pruning_mask(&self, words: &[&str]) -> Result<CoreAnchoring, ParseError> {
    let coarse = self.coarse.marginal(words, &CoreAnchoring::unconstrained())?;
    if !coarse.is_parseable() {
      warn!(length = words.len(), "coarse grammar cannot parse sentence");
      return Err(ParseError::CoarseUnparseable { length: words.len() });
    }

    let n = words.len();
    let fine_labels = self.projection.len();
    let coarse_labels = self.coarse.grammar().num_labels();
    let mut pattern = SparsityPattern::allow_all(n, fine_labels);
    let mut posteriors = vec![f64::NEG_INFINITY; coarse_labels];

    for length in 1..=n {
      for begin in 0..=(n - length) {
        let end = begin + length;
        for level in [Level::Top, Level::Bot] {
          self.coarse_posteriors(&coarse, begin, end, level, &mut posteriors);
          for fine in 0..fine_labels {
            if posteriors[self.projection.project(fine)] <= self.threshold {
              pattern.forbid(begin, end, fine, level);
            }
          }
        }
      }
    }

    let total = num_spans(n) * fine_labels;
    debug!(
      threshold = self.threshold,
      kept_bot = pattern.count_allowed(Level::Bot),
      kept_top = pattern.count_allowed(Level::Top),
      total,
      "pruning mask built"
    );
    Ok(CoreAnchoring::identity(pattern))
  }

  /// Fills `out` with the coarse log posterior of every coarse label
  fn coarse_posteriors(&self, coarse: &ChartMarginal, begin: usize, end: usize, level: Level, out: &mut [f64]) {
    out.fill(f64::NEG_INFINITY);
    for &label in coarse.inside().level(level).entered_labels(begin, end) {
      out[label] = coarse.span_marginal(begin, end, label, level);
    }
  }

  /// The fine scorer: the pruning mask times whatever the caller supplied
  fn fine_scorer(&self, words: &[&str], scorer: &CoreAnchoring) -> Result<CoreAnchoring, ParseError> {
    let mask = self.pruning_mask(words)?;
    Ok(&mask * scorer)
  }

  pub fn build_inside_chart(&self, words: &[&str], scorer: &CoreAnchoring) -> Result<ParseChart, ParseError> {
    let scorer = self.fine_scorer(words, scorer)?;
    self.fine.build_inside_chart(words, &scorer)
  }

  /// Fine marginals under pruning. A sentence the coarse grammar parses but
  /// the pruned fine grammar doesn't is a result with
  /// `is_parseable() == false`, not an error.
  pub fn marginal(&self, words: &[&str], scorer: &CoreAnchoring) -> Result<ChartMarginal, ParseError> {
    let scorer = self.fine_scorer(words, scorer)?;
    let marginal = self.fine.marginal(words, &scorer)?;
    if !marginal.is_parseable() {
      debug!(length = words.len(), threshold = self.threshold, "no fine parse survives pruning");
    }
    Ok(marginal)
  }

  pub fn best_parse(&self, words: &[&str], scorer: &CoreAnchoring) -> Result<Option<(SynTree<String, String>, f64)>, ParseError> {
    let scorer = self.fine_scorer(words, scorer)?;
    self.fine.best_parse(words, &scorer)
  }
}
