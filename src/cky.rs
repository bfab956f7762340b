//! Inside and outside passes over a binary/unary grammar.
//!
//! Both passes run over a [`RefinedAnchoring`]: either the lifted core
//! anchoring (one refinement per site) or a latent refinement model times the
//! core anchoring. The core anchoring is always the lexicon's tag constraints
//! times whatever scorer the caller supplied.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::anchoring::CoreAnchoring;
use crate::chart::{ParseChart, ScoreAccumulator, Semiring};
use crate::config::ParserConfig;
use crate::constraints::SparsityPattern;
use crate::error::ParseError;
use crate::grammar::Grammar;
use crate::latent::LatentGrammar;
use crate::lexicon::{Lexicon, LexiconAnchor};
use crate::marginal::ChartMarginal;
use crate::refined::{RefinedAnchoring, RefinedProduct};
use crate::rules::Label;
use crate::syntree::SynTree;
use crate::viterbi::ViterbiDecoder;

const NEG_INF: f64 = f64::NEG_INFINITY;

/// Checked once per span length; returning true aborts the pass
pub type CancelCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Builds inside and outside charts for one grammar and lexicon.
///
/// The builder holds only shared read-only state, so one builder can serve
/// any number of sentences on any number of threads.
#[derive(Clone)]
pub struct ChartBuilder {
  grammar: Arc<Grammar>,
  lexicon: Arc<dyn Lexicon>,
  refinements: Option<Arc<LatentGrammar>>,
  config: ParserConfig,
  cancel: Option<CancelCheck>,
}

impl fmt::Debug for ChartBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChartBuilder")
      .field("labels", &self.grammar.num_labels())
      .field("rules", &self.grammar.num_rules())
      .field("refined", &self.refinements.is_some())
      .field("config", &self.config)
      .field("cancellable", &self.cancel.is_some())
      .finish()
  }
}

impl ChartBuilder {
  pub fn new(grammar: Arc<Grammar>, lexicon: Arc<dyn Lexicon>) -> Self {
    Self {
      grammar,
      lexicon,
      refinements: None,
      config: ParserConfig::default(),
      cancel: None,
    }
  }

  pub fn with_config(mut self, config: ParserConfig) -> Self {
    self.config = config;
    self
  }

  /// Parses with latent refinements of the grammar's labels and rules
  pub fn with_refinements(mut self, model: Arc<LatentGrammar>) -> Self {
    assert_eq!(
      model.grammar().num_rules(),
      self.grammar.num_rules(),
      "refinement model built for a different grammar"
    );
    self.refinements = Some(model);
    self
  }

  pub fn with_cancellation<F>(mut self, check: F) -> Self
  where
    F: Fn() -> bool + Send + Sync + 'static,
  {
    self.cancel = Some(Arc::new(check));
    self
  }

  pub fn grammar(&self) -> &Arc<Grammar> {
    &self.grammar
  }

  pub fn config(&self) -> &ParserConfig {
    &self.config
  }

  /// Anchors the lexicon on `words` and folds its tag constraints into
  /// `scorer`. Fails if some token has no finite-scoring label.
  pub fn anchor(&self, words: &[&str], scorer: &CoreAnchoring) -> Result<(LexiconAnchor, CoreAnchoring), ParseError> {
    if words.is_empty() {
      return Err(ParseError::EmptySentence);
    }

    let lex = self.lexicon.anchor(words);
    for pos in 0..lex.len() {
      if lex.tags(pos).is_empty() {
        warn!(position = pos, token = lex.word(pos), "token not covered by lexicon");
        return Err(ParseError::Coverage {
          position: pos,
          token: lex.word(pos).to_string(),
          scores: lex.score_table(pos),
        });
      }
    }

    if let Some((length, labels)) = scorer.pattern().shape() {
      let expected_labels = self.grammar.num_labels();
      if length != lex.len() || labels != expected_labels {
        return Err(ParseError::ConstraintShape {
          length,
          labels,
          expected_length: lex.len(),
          expected_labels,
        });
      }
    }

    let tags = CoreAnchoring::identity(SparsityPattern::from_tags(&lex));
    let core = &tags * scorer;
    Ok((lex, core))
  }

  /// Runs `f` over the refined view of `core` this builder parses with
  fn with_anchoring<T>(&self, length: usize, core: &CoreAnchoring, f: impl FnOnce(&dyn RefinedAnchoring) -> T) -> T {
    match &self.refinements {
      Some(model) => {
        let latent = model.anchor(length);
        f(&RefinedProduct::new(&latent, core))
      }
      None => f(&core.lift()),
    }
  }

  pub fn build_inside_chart(&self, words: &[&str], scorer: &CoreAnchoring) -> Result<ParseChart, ParseError> {
    let (lex, core) = self.anchor(words, scorer)?;
    self.with_anchoring(lex.len(), &core, |anchoring| {
      self.inside(&lex, anchoring, self.config.semiring)
    })
  }

  /// Outside scores for a completed inside chart, under the same scorer the
  /// inside chart was built with.
  pub fn build_outside_chart(&self, inside: &ParseChart, scorer: &CoreAnchoring) -> Result<ParseChart, ParseError> {
    let words = inside.words().iter().map(|w| w.as_str()).collect::<Vec<_>>();
    let (_, core) = self.anchor(&words, scorer)?;
    self.with_anchoring(words.len(), &core, |anchoring| self.outside(inside, anchoring))
  }

  /// Inside and outside charts together, with the log partition
  pub fn marginal(&self, words: &[&str], scorer: &CoreAnchoring) -> Result<ChartMarginal, ParseError> {
    let (lex, core) = self.anchor(words, scorer)?;
    self.with_anchoring(lex.len(), &core, |anchoring| -> Result<_, ParseError> {
      let inside = self.inside(&lex, anchoring, self.config.semiring)?;
      let outside = self.outside(&inside, anchoring)?;
      Ok(ChartMarginal::new(inside, outside, self.grammar.root()))
    })
  }

  /// The best derivation and its score, or `None` if nothing derives the
  /// sentence. Always decodes over a Viterbi chart, whatever the configured
  /// semiring.
  pub fn best_parse(&self, words: &[&str], scorer: &CoreAnchoring) -> Result<Option<(SynTree<String, String>, f64)>, ParseError> {
    let (lex, core) = self.anchor(words, scorer)?;
    self.with_anchoring(lex.len(), &core, |anchoring| -> Result<_, ParseError> {
      let chart = self.inside(&lex, anchoring, Semiring::Viterbi)?;
      Ok(ViterbiDecoder::new(&self.grammar, &chart, anchoring).decode())
    })
  }

  fn check_cancelled(&self, span_length: usize) -> Result<(), ParseError> {
    match &self.cancel {
      Some(cancelled) if cancelled() => {
        debug!(span_length, "chart build cancelled");
        Err(ParseError::Cancelled { span_length })
      }
      _ => Ok(()),
    }
  }

  fn inside(&self, lex: &LexiconAnchor, anchoring: &dyn RefinedAnchoring, semiring: Semiring) -> Result<ParseChart, ParseError> {
    let g = &*self.grammar;
    let n = lex.len();
    let mut chart = ParseChart::new(
      lex.words().to_vec(),
      g.labels().names().to_vec(),
      anchoring.max_label_refinements(g.num_labels()),
      semiring,
    );
    debug!(length = n, labels = g.num_labels(), ?semiring, "building inside chart");

    for pos in 0..n {
      for &tag in lex.tags(pos) {
        let lex_score = lex.score(pos, tag);
        for &r in anchoring.valid_label_refinements(pos, pos + 1, tag) {
          let score = lex_score + anchoring.score_span(pos, pos + 1, tag, r);
          chart.bot.enter(pos, pos + 1, tag, r, score);
        }
      }
      self.inside_unaries(&mut chart, anchoring, pos, pos + 1);
    }

    let cap = self.config.span_cap(n);
    let mut acc = ScoreAccumulator::new(semiring);
    for length in 2..=cap {
      self.check_cancelled(length)?;
      trace!(length, "inside span length");

      for begin in 0..=(n - length) {
        let end = begin + length;
        for parent in 0..g.num_labels() {
          let rules = g.binary_rules_with_parent(parent);
          if rules.is_empty() {
            continue;
          }

          for &pr in anchoring.valid_label_refinements(begin, end, parent) {
            let span_score = anchoring.score_span(begin, end, parent, pr);
            if span_score == NEG_INF {
              continue;
            }

            acc.clear();
            for &rule in rules {
              let (left, right) = (g.left_child(rule), g.right_child(rule));
              let splits = chart.top.feasible_splits(begin, end, left, right);
              if splits.is_empty() {
                continue;
              }
              let base = g.rule_score(rule);

              for &rr in anchoring.valid_rule_refinements_given_parent(begin, end, rule, pr) {
                let lr = anchoring.left_child_refinement(rule, rr);
                let rref = anchoring.right_child_refinement(rule, rr);
                for split in splits.clone() {
                  let left_score = chart.top.refined_score(begin, split, left, lr);
                  if left_score == NEG_INF {
                    continue;
                  }
                  let right_score = chart.top.refined_score(split, end, right, rref);
                  if right_score == NEG_INF {
                    continue;
                  }
                  let rule_score = anchoring.score_binary_rule(begin, split, end, rule, rr);
                  acc.add(left_score + right_score + base + rule_score + span_score);
                }
              }
            }

            if !acc.is_empty() {
              chart.bot.enter(begin, end, parent, pr, acc.total());
            }
          }
        }

        self.inside_unaries(&mut chart, anchoring, begin, end);
      }
    }

    debug!(
      log_partition = chart.top.label_score(0, n, g.root()),
      "inside chart built"
    );
    Ok(chart)
  }

  /// Fills the top cells of a span from its bot cells: each label's own bot
  /// score, plus one application of every unary rule.
  fn inside_unaries(&self, chart: &mut ParseChart, anchoring: &dyn RefinedAnchoring, begin: usize, end: usize) {
    let g = &*self.grammar;
    let children: Vec<Label> = chart.bot.entered_labels(begin, end).to_vec();

    for child in children {
      for &cr in anchoring.valid_label_refinements(begin, end, child) {
        let score = chart.bot.refined_score(begin, end, child, cr);
        if score == NEG_INF {
          continue;
        }
        if anchoring.allows_top(begin, end, child) {
          chart.top.enter(begin, end, child, cr, score);
        }

        for &rule in g.unary_rules_with_child(child) {
          let parent = g.parent(rule);
          if !anchoring.allows_top(begin, end, parent) {
            continue;
          }
          let base = g.rule_score(rule);
          for &rr in anchoring.valid_unary_rule_refinements_given_child(begin, end, rule, cr) {
            let pr = anchoring.parent_refinement(rule, rr);
            let rule_score = anchoring.score_unary_rule(begin, end, rule, rr);
            chart.top.enter(begin, end, parent, pr, score + base + rule_score);
          }
        }
      }
    }
  }

  fn outside(&self, inside: &ParseChart, anchoring: &dyn RefinedAnchoring) -> Result<ParseChart, ParseError> {
    let g = &*self.grammar;
    let n = inside.len();
    let mut outside = ParseChart::new(
      inside.words().to_vec(),
      g.labels().names().to_vec(),
      inside.refinements(),
      inside.semiring(),
    );
    debug!(length = n, "building outside chart");

    let root = g.root();
    for &r in anchoring.valid_label_refinements(0, n, root) {
      if inside.top.refined_score(0, n, root, r) != NEG_INF {
        outside.top.enter(0, n, root, r, 0.0);
      }
    }

    let cap = self.config.span_cap(n);
    for length in (1..=cap).rev() {
      self.check_cancelled(length)?;
      trace!(length, "outside span length");

      for begin in 0..=(n - length) {
        let end = begin + length;
        self.outside_unaries(inside, &mut outside, anchoring, begin, end);
        if length > 1 {
          self.outside_binaries(inside, &mut outside, anchoring, begin, end);
        }
      }
    }

    Ok(outside)
  }

  /// Pushes top outside scores down to bot, mirroring `inside_unaries`
  fn outside_unaries(
    &self,
    inside: &ParseChart,
    outside: &mut ParseChart,
    anchoring: &dyn RefinedAnchoring,
    begin: usize,
    end: usize,
  ) {
    let g = &*self.grammar;
    let parents: Vec<Label> = outside.top.entered_labels(begin, end).to_vec();

    for parent in parents {
      if !anchoring.allows_top(begin, end, parent) {
        continue;
      }
      for &pr in anchoring.valid_label_refinements(begin, end, parent) {
        let out = outside.top.refined_score(begin, end, parent, pr);
        if out == NEG_INF {
          continue;
        }
        if inside.bot.refined_score(begin, end, parent, pr) != NEG_INF {
          outside.bot.enter(begin, end, parent, pr, out);
        }

        for &rule in g.unary_rules_with_parent(parent) {
          let child = g.child(rule);
          let base = g.rule_score(rule);
          for &rr in anchoring.valid_unary_rule_refinements_given_parent(begin, end, rule, pr) {
            let cr = anchoring.child_refinement(rule, rr);
            if inside.bot.refined_score(begin, end, child, cr) == NEG_INF {
              continue;
            }
            let rule_score = anchoring.score_unary_rule(begin, end, rule, rr);
            outside.bot.enter(begin, end, child, cr, out + base + rule_score);
          }
        }
      }
    }
  }

  /// Propagates a span's bot outside scores into the top outside scores of
  /// each binary child, weighted by the sibling's inside score.
  fn outside_binaries(
    &self,
    inside: &ParseChart,
    outside: &mut ParseChart,
    anchoring: &dyn RefinedAnchoring,
    begin: usize,
    end: usize,
  ) {
    let g = &*self.grammar;
    let parents: Vec<Label> = outside.bot.entered_labels(begin, end).to_vec();

    for parent in parents {
      let rules = g.binary_rules_with_parent(parent);
      if rules.is_empty() {
        continue;
      }

      for &pr in anchoring.valid_label_refinements(begin, end, parent) {
        let out = outside.bot.refined_score(begin, end, parent, pr);
        if out == NEG_INF || inside.bot.refined_score(begin, end, parent, pr) == NEG_INF {
          continue;
        }
        let span_score = anchoring.score_span(begin, end, parent, pr);
        if span_score == NEG_INF {
          continue;
        }

        for &rule in rules {
          let (left, right) = (g.left_child(rule), g.right_child(rule));
          let splits = inside.top.feasible_splits(begin, end, left, right);
          if splits.is_empty() {
            continue;
          }
          let base = g.rule_score(rule);

          for &rr in anchoring.valid_rule_refinements_given_parent(begin, end, rule, pr) {
            let lr = anchoring.left_child_refinement(rule, rr);
            let rref = anchoring.right_child_refinement(rule, rr);
            for split in splits.clone() {
              let left_inside = inside.top.refined_score(begin, split, left, lr);
              if left_inside == NEG_INF {
                continue;
              }
              let right_inside = inside.top.refined_score(split, end, right, rref);
              if right_inside == NEG_INF {
                continue;
              }
              let rule_score = anchoring.score_binary_rule(begin, split, end, rule, rr);
              if rule_score == NEG_INF {
                continue;
              }
              let common = out + span_score + base + rule_score;
              outside.top.enter(begin, split, left, lr, common + right_inside);
              outside.top.enter(split, end, right, rref, common + left_inside);
            }
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;
  use crate::anchoring::SpanScorer;
  use crate::constraints::Level;
  use crate::parse_grammar::GrammarBundle;
  use crate::rules::RuleId;
  use crate::utils::log_sum_slice;

  const TOY: &str = r#"
    S -> NP VP;
    NP -> "the dog";
    VP -> "barks";
  "#;

  /// Ambiguous PP attachment with unaries and nonzero scores
  const AMBIGUOUS: &str = r#"
    S -> NP VP;
    VP -> V NP -0.4;
    VP -> VP PP -1.1;
    NP -> NP PP -0.9;
    NP -> Det N -0.2;
    PP -> P NP;
    VP -> V -1.5;
    NP -> N -2.0;

    Det -> "the" 0.0;
    N -> "man" -1.2;
    N -> "telescope" -1.9;
    N -> "saw" -3.0;
    V -> "saw" -0.3;
    P -> "with" 0.0;
  "#;

  fn builder(src: &str) -> ChartBuilder {
    let bundle: GrammarBundle = src.parse().unwrap();
    ChartBuilder::new(bundle.grammar, bundle.lexicon)
  }

  fn sentence() -> Vec<&'static str> {
    "the man saw the man with the telescope".split(' ').collect()
  }

  #[test]
  fn toy_sentence_has_certain_parse() {
    let b = builder(TOY);
    let unit = CoreAnchoring::unconstrained();
    let inside = b.build_inside_chart(&["the dog", "barks"], &unit).unwrap();
    let s = b.grammar().labels().get("S").unwrap();
    assert_eq!(inside.top.label_score(0, 2, s), 0.0);

    let marginal = b.marginal(&["the dog", "barks"], &unit).unwrap();
    assert_eq!(marginal.log_partition(), 0.0);
  }

  #[test]
  fn uncovered_token_is_a_coverage_failure() {
    let b = builder(TOY);
    match b.build_inside_chart(&["the dog", "meows"], &CoreAnchoring::unconstrained()) {
      Err(ParseError::Coverage { position, token, scores }) => {
        assert_eq!(position, 1);
        assert_eq!(token, "meows");
        assert_eq!(scores.0.len(), 3);
        assert!(scores.0.iter().all(|(_, s)| *s == NEG_INF));
      }
      other => panic!("expected coverage failure, got {:?}", other),
    }
    assert_eq!(
      b.build_inside_chart(&[], &CoreAnchoring::unconstrained()).unwrap_err(),
      ParseError::EmptySentence
    );
  }

  /// Inside times outside, summed over every label and refinement of a cell
  fn cell_total(m: &ChartMarginal, begin: usize, end: usize, level: Level) -> f64 {
    let (inside, outside) = (m.inside().level(level), m.outside().level(level));
    let scores: Vec<f64> = (0..m.inside().num_labels())
      .flat_map(move |l| {
        inside
          .refined_scores(begin, end, l)
          .iter()
          .zip(outside.refined_scores(begin, end, l))
          .map(|(i, o)| i + o)
      })
      .collect();
    log_sum_slice(&scores)
  }

  /// Every derivation has exactly one bot and one top node over each token,
  /// so each token's cells carry the whole partition.
  fn assert_consistent(b: &ChartBuilder, words: &[&str], scorer: &CoreAnchoring) -> f64 {
    let m = b.marginal(words, scorer).unwrap();
    let log_z = m.log_partition();
    assert!(log_z.is_finite());

    let n = words.len();
    assert!((cell_total(&m, 0, n, Level::Top) - log_z).abs() < 1e-6);
    for pos in 0..n {
      for level in [Level::Top, Level::Bot] {
        let total = cell_total(&m, pos, pos + 1, level);
        assert!(
          (total - log_z).abs() < 1e-6,
          "position {} {:?}: {} vs {}",
          pos,
          level,
          total,
          log_z
        );
      }
    }
    log_z
  }

  #[test]
  fn inside_outside_are_consistent() {
    let b = builder(AMBIGUOUS);
    assert_consistent(&b, &sentence(), &CoreAnchoring::unconstrained());
  }

  #[test]
  fn inside_outside_are_consistent_under_an_external_scorer() {
    let b = builder(AMBIGUOUS);
    let plain = assert_consistent(&b, &sentence(), &CoreAnchoring::unconstrained());
    let boosted = assert_consistent(&b, &sentence(), &CoreAnchoring::scored(Arc::new(PreferLowAttachment)));
    assert!(boosted > plain);
  }

  #[test]
  fn inside_outside_are_consistent_under_weighted_refinements() {
    let bundle: GrammarBundle = AMBIGUOUS.parse().unwrap();
    let g = bundle.grammar.clone();
    let np = g.labels().get("NP").unwrap();

    // S -> NP VP, VP -> V, and NP itself all favor one refinement
    let mut model = LatentGrammar::split_uniform(g.clone(), 2);
    model.set_binary_score(0, 0, 1, 0, -0.3).unwrap();
    model.set_binary_score(0, 0, 0, 1, -2.5).unwrap();
    model.set_unary_score(6, 1, 0, -2.0).unwrap();
    model.set_span_score(np, 1, -0.7).unwrap();

    let b = ChartBuilder::new(g, bundle.lexicon).with_refinements(Arc::new(model));
    assert_consistent(&b, &sentence(), &CoreAnchoring::unconstrained());
  }

  #[test]
  fn misshapen_constraints_are_an_error() {
    let b = builder(AMBIGUOUS);
    let words = sentence();
    let labels = b.grammar().num_labels();

    let short = CoreAnchoring::identity(SparsityPattern::allow_all(3, labels));
    assert_eq!(
      b.marginal(&words, &short).unwrap_err(),
      ParseError::ConstraintShape {
        length: 3,
        labels,
        expected_length: 8,
        expected_labels: labels,
      }
    );

    let narrow = CoreAnchoring::identity(SparsityPattern::allow_all(8, 2));
    assert!(matches!(
      b.best_parse(&words, &narrow),
      Err(ParseError::ConstraintShape { labels: 2, .. })
    ));
  }

  #[test]
  fn ambiguity_sums_both_attachments() {
    let b = builder(AMBIGUOUS);
    let words = sentence();
    let unit = CoreAnchoring::unconstrained();
    let sum = b.marginal(&words, &unit).unwrap().log_partition();

    let viterbi = b
      .clone()
      .with_config(ParserConfig::default().with_semiring(Semiring::Viterbi))
      .marginal(&words, &unit)
      .unwrap()
      .log_partition();
    let (_, best) = b.best_parse(&words, &unit).unwrap().unwrap();

    assert!((viterbi - best).abs() < 1e-9);
    assert!(sum > best + 1e-3, "sum {} should exceed best {}", sum, best);
  }

  #[test]
  fn forbidden_sites_never_appear_in_the_best_parse() {
    let b = builder(AMBIGUOUS);
    let words = sentence();
    let np = b.grammar().labels().get("NP").unwrap();

    let (tree, _) = b.best_parse(&words, &CoreAnchoring::unconstrained()).unwrap().unwrap();
    let spans = tree.constituents();
    let attached = spans.iter().any(|(label, span)| *label == "NP" && *span == (3, 8));
    let forbidden = if attached { (3, 8) } else { (2, 8) };
    let forbidden_label = if attached { np } else { b.grammar().labels().get("VP").unwrap() };

    let mut pattern = SparsityPattern::allow_all(words.len(), b.grammar().num_labels());
    pattern.forbid(forbidden.0, forbidden.1, forbidden_label, Level::Bot);
    pattern.forbid(forbidden.0, forbidden.1, forbidden_label, Level::Top);
    let constrained = CoreAnchoring::identity(pattern);

    let (tree, _) = b.best_parse(&words, &constrained).unwrap().unwrap();
    let name = b.grammar().label_name(forbidden_label);
    assert!(
      !tree
        .constituents()
        .iter()
        .any(|(label, span)| *label == name && *span == forbidden),
      "{} over {:?} survived in\n{}",
      name,
      forbidden,
      tree
    );

    let inside = b.build_inside_chart(&words, &constrained).unwrap();
    assert_eq!(inside.bot.label_score(forbidden.0, forbidden.1, forbidden_label), NEG_INF);
    assert_eq!(inside.top.label_score(forbidden.0, forbidden.1, forbidden_label), NEG_INF);
  }

  /// Rewards any constituent over "the man with the telescope"
  #[derive(Debug)]
  struct PreferLowAttachment;

  impl SpanScorer for PreferLowAttachment {
    fn score_binary_rule(&self, _: usize, _: usize, _: usize, _: RuleId) -> f64 {
      0.0
    }

    fn score_unary_rule(&self, _: usize, _: usize, _: RuleId) -> f64 {
      0.0
    }

    fn score_span(&self, begin: usize, end: usize, _: Label) -> f64 {
      if begin == 3 && end == 8 { 5.0 } else { 0.0 }
    }
  }

  #[test]
  fn external_scorer_shifts_scores() {
    let b = builder(AMBIGUOUS);
    let words = sentence();
    let unit = CoreAnchoring::unconstrained();
    let scorer = CoreAnchoring::scored(Arc::new(PreferLowAttachment));

    let plain = b.marginal(&words, &unit).unwrap();
    let boosted = b.marginal(&words, &scorer).unwrap();
    let np = b.grammar().labels().get("NP").unwrap();
    assert!(boosted.span_marginal(3, 8, np, Level::Bot) > plain.span_marginal(3, 8, np, Level::Bot));
    assert!(boosted.log_partition() > plain.log_partition());
    assert!(boosted.log_partition() < plain.log_partition() + 5.0);
  }

  #[test]
  fn span_cap_limits_work() {
    let b = builder(AMBIGUOUS).with_config(ParserConfig::default().with_max_span_length(3));
    let words = sentence();
    let m = b.marginal(&words, &CoreAnchoring::unconstrained()).unwrap();
    assert!(!m.is_parseable());
    assert!(m.inside().bot.entered_labels(0, 4).is_empty());
    assert!(!m.inside().bot.entered_labels(0, 2).is_empty());
    assert!(b.best_parse(&words, &CoreAnchoring::unconstrained()).unwrap().is_none());
  }

  #[test]
  fn cancellation_stops_the_build() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let b = builder(AMBIGUOUS).with_cancellation(move || counter.fetch_add(1, Ordering::SeqCst) >= 2);

    let err = b
      .build_inside_chart(&sentence(), &CoreAnchoring::unconstrained())
      .unwrap_err();
    assert_eq!(err, ParseError::Cancelled { span_length: 4 });
  }

  #[test]
  fn uniform_latent_splits_preserve_the_partition() {
    let bundle: GrammarBundle = AMBIGUOUS.parse().unwrap();
    let plain = ChartBuilder::new(bundle.grammar.clone(), bundle.lexicon.clone());
    let model = Arc::new(LatentGrammar::split_uniform(bundle.grammar.clone(), 3));
    let latent = plain.clone().with_refinements(model);

    let words = sentence();
    let unit = CoreAnchoring::unconstrained();
    let expected = plain.marginal(&words, &unit).unwrap();
    let refined = latent.marginal(&words, &unit).unwrap();
    assert_eq!(refined.inside().refinements(), 3);
    assert!((expected.log_partition() - refined.log_partition()).abs() < 1e-9);

    let np = bundle.grammar.labels().get("NP").unwrap();
    let a = expected.span_marginal(3, 5, np, Level::Top);
    let b = refined.span_marginal(3, 5, np, Level::Top);
    assert!((a - b).abs() < 1e-9);
  }

  #[test]
  fn latent_weights_change_the_best_refinement() {
    let bundle: GrammarBundle = TOY.parse().unwrap();
    let g = bundle.grammar.clone();
    let mut model = LatentGrammar::split_uniform(g.clone(), 2);
    model.set_binary_score(0, 0, 1, 0, 0.0).unwrap();
    model.set_binary_score(0, 0, 0, 0, -5.0).unwrap();
    model.set_binary_score(0, 0, 0, 1, -5.0).unwrap();
    model.set_binary_score(0, 0, 1, 1, -5.0).unwrap();

    let b = ChartBuilder::new(g.clone(), bundle.lexicon.clone())
      .with_config(ParserConfig::default().with_semiring(Semiring::Viterbi))
      .with_refinements(Arc::new(model));
    let inside = b.build_inside_chart(&["the dog", "barks"], &CoreAnchoring::unconstrained()).unwrap();
    let s = g.labels().get("S").unwrap();
    assert_eq!(inside.top.refined_score(0, 2, s, 0), 0.0);
  }

  #[test]
  fn charts_build_concurrently_from_shared_builder() {
    let b = builder(AMBIGUOUS);
    let words = sentence();
    let expected = b
      .marginal(&words, &CoreAnchoring::unconstrained())
      .unwrap()
      .log_partition();

    std::thread::scope(|scope| {
      let handles: Vec<_> = (0..4)
        .map(|_| {
          scope.spawn(|| {
            b.marginal(&words, &CoreAnchoring::unconstrained())
              .unwrap()
              .log_partition()
          })
        })
        .collect();
      for h in handles {
        assert_eq!(h.join().unwrap(), expected);
      }
    });
  }
}
