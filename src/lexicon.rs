use std::collections::HashMap;
use std::fmt;

use crate::error::ScoreTable;
use crate::grammar::Grammar;
use crate::rules::Label;

/// Maps tokens to candidate labels with lexical (tag) log scores.
pub trait Lexicon: fmt::Debug + Send + Sync {
  /// Scores every token of the sentence against every label. Computed eagerly,
  /// once per sentence.
  fn anchor(&self, words: &[&str]) -> LexiconAnchor;
}

/// A lexicon applied to one sentence: a position x label table of scores,
/// plus the finite-scoring labels per position.
#[derive(Debug, Clone, PartialEq)]
pub struct LexiconAnchor {
  words: Vec<String>,
  label_names: Vec<String>,
  scores: Vec<Vec<f64>>,
  tags: Vec<Vec<Label>>,
}

impl LexiconAnchor {
  /// Builds an anchor from a full score table (`scores[pos][label]`)
  pub fn new(words: &[&str], label_names: Vec<String>, scores: Vec<Vec<f64>>) -> Self {
    assert_eq!(words.len(), scores.len(), "one score row per word");
    let tags = scores
      .iter()
      .map(|row| {
        row
          .iter()
          .enumerate()
          .filter(|(_, s)| s.is_finite())
          .map(|(l, _)| l)
          .collect()
      })
      .collect();

    Self {
      words: words.iter().map(|w| w.to_string()).collect(),
      label_names,
      scores,
      tags,
    }
  }

  pub fn len(&self) -> usize {
    self.words.len()
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }

  pub fn word(&self, pos: usize) -> &str {
    &self.words[pos]
  }

  pub fn words(&self) -> &[String] {
    &self.words
  }

  pub fn num_labels(&self) -> usize {
    self.label_names.len()
  }

  pub fn score(&self, pos: usize, label: Label) -> f64 {
    self.scores[pos][label]
  }

  /// Labels with a finite lexical score at `pos`
  pub fn tags(&self, pos: usize) -> &[Label] {
    &self.tags[pos]
  }

  /// The raw row of scores at `pos`, with label names, for diagnostics
  pub fn score_table(&self, pos: usize) -> ScoreTable {
    ScoreTable(
      self.scores[pos]
        .iter()
        .enumerate()
        .map(|(l, s)| (self.label_names[l].clone(), *s))
        .collect(),
    )
  }
}

/// Word -> (label, score) lookup, with an optional distribution for words it
/// has never seen.
#[derive(Debug, Clone, Default)]
pub struct SimpleLexicon {
  label_names: Vec<String>,
  entries: HashMap<String, Vec<(Label, f64)>>,
  unknown: Vec<(Label, f64)>,
}

impl SimpleLexicon {
  pub fn new(grammar: &Grammar) -> Self {
    Self {
      label_names: grammar.labels().names().to_vec(),
      ..Default::default()
    }
  }

  /// Adds (or replaces) the score of `label` for `word`
  pub fn add(&mut self, word: &str, label: Label, score: f64) {
    assert!(label < self.label_names.len(), "label {} out of range", label);
    let entry = self.entries.entry(word.to_string()).or_default();
    if let Some(existing) = entry.iter_mut().find(|(l, _)| *l == label) {
      existing.1 = score;
    } else {
      entry.push((label, score));
    }
  }

  /// Scores given to any word missing from the lexicon
  pub fn set_unknown(&mut self, scores: Vec<(Label, f64)>) {
    self.unknown = scores;
  }

  pub fn num_labels(&self) -> usize {
    self.label_names.len()
  }

  pub fn knows(&self, word: &str) -> bool {
    self.entries.contains_key(word)
  }
}

impl Lexicon for SimpleLexicon {
  fn anchor(&self, words: &[&str]) -> LexiconAnchor {
    let scores = words
      .iter()
      .map(|w| {
        let mut row = vec![f64::NEG_INFINITY; self.label_names.len()];
        let known = self.entries.get(*w).unwrap_or(&self.unknown);
        for &(label, score) in known.iter() {
          row[label] = score;
        }
        row
      })
      .collect();

    LexiconAnchor::new(words, self.label_names.clone(), scores)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::GrammarBuilder;

  fn grammar() -> Grammar {
    let mut b = GrammarBuilder::new();
    b.binary("S", "NP", "VP", 0.0);
    b.build("S").unwrap()
  }

  #[test]
  fn anchors_known_and_unknown_words() {
    let g = grammar();
    let np = g.labels().get("NP").unwrap();
    let vp = g.labels().get("VP").unwrap();

    let mut lex = SimpleLexicon::new(&g);
    lex.add("dogs", np, -0.2);
    lex.add("bark", vp, 0.0);
    lex.add("bark", np, -3.0);

    let anchor = lex.anchor(&["dogs", "bark", "loudly"]);
    assert_eq!(anchor.len(), 3);
    assert_eq!(anchor.score(0, np), -0.2);
    assert_eq!(anchor.score(0, vp), f64::NEG_INFINITY);
    assert_eq!(anchor.tags(1), &[np, vp]);
    assert!(anchor.tags(2).is_empty());

    lex.set_unknown(vec![(vp, -5.0)]);
    let anchor = lex.anchor(&["loudly"]);
    assert_eq!(anchor.tags(0), &[vp]);
  }

  #[test]
  fn add_replaces_existing_score() {
    let g = grammar();
    let np = g.labels().get("NP").unwrap();
    let mut lex = SimpleLexicon::new(&g);
    lex.add("dogs", np, -0.2);
    lex.add("dogs", np, -0.7);
    assert_eq!(lex.anchor(&["dogs"]).score(0, np), -0.7);
  }

  #[test]
  fn score_table_names_labels() {
    let g = grammar();
    let lex = SimpleLexicon::new(&g);
    let table = lex.anchor(&["x"]).score_table(0);
    assert_eq!(table.0.len(), 3);
    assert!(table.to_string().contains("NP: -inf"));
  }
}
