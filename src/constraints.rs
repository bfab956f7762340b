use std::sync::Arc;

use crate::lexicon::LexiconAnchor;
use crate::rules::Label;
use crate::utils::{num_spans, span_index};

/// Which of a span's two cells a score or constraint refers to: `Bot` holds
/// scores before unary closure, `Top` after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
  Top,
  Bot,
}

#[derive(Debug, Clone, PartialEq)]
struct Masks {
  length: usize,
  num_labels: usize,
  top: Vec<bool>,
  bot: Vec<bool>,
}

impl Masks {
  fn slot(&self, begin: usize, end: usize, label: Label) -> usize {
    span_index(begin, end) * self.num_labels + label
  }

  fn level(&self, level: Level) -> &Vec<bool> {
    match level {
      Level::Top => &self.top,
      Level::Bot => &self.bot,
    }
  }
}

/// Admissibility masks over (span, label) for the top and bot cells.
///
/// Patterns are persistent values: restricting one returns a new pattern and
/// clones are cheap. An unconstrained pattern admits everything and needs no
/// storage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparsityPattern {
  masks: Option<Arc<Masks>>,
}

impl SparsityPattern {
  pub fn unconstrained() -> Self {
    Self { masks: None }
  }

  /// A pattern that admits every site, with storage ready for `forbid`
  pub fn allow_all(length: usize, num_labels: usize) -> Self {
    let size = num_spans(length) * num_labels;
    Self {
      masks: Some(Arc::new(Masks {
        length,
        num_labels,
        top: vec![true; size],
        bot: vec![true; size],
      })),
    }
  }

  /// Restricts the bot cells of single-token spans to the labels the lexicon
  /// scores finitely.
  pub fn from_tags(anchor: &LexiconAnchor) -> Self {
    let mut pattern = Self::allow_all(anchor.len(), anchor.num_labels());
    for pos in 0..anchor.len() {
      for label in 0..anchor.num_labels() {
        if !anchor.score(pos, label).is_finite() {
          pattern.forbid(pos, pos + 1, label, Level::Bot);
        }
      }
    }
    pattern
  }

  /// Sentence length and label count the masks cover; `None` if unconstrained
  pub fn shape(&self) -> Option<(usize, usize)> {
    self.masks.as_ref().map(|m| (m.length, m.num_labels))
  }

  pub fn is_allowed(&self, begin: usize, end: usize, label: Label, level: Level) -> bool {
    match &self.masks {
      None => true,
      Some(m) => {
        if end > m.length || label >= m.num_labels {
          return false;
        }
        m.level(level)[m.slot(begin, end, label)]
      }
    }
  }

  /// The lexicon-derived view: may `label` tag the token at `pos`?
  pub fn is_allowed_tag(&self, pos: usize, label: Label) -> bool {
    self.is_allowed(pos, pos + 1, label, Level::Bot)
  }

  /// Labels that may tag the token at `pos`, or `None` if every label may
  pub fn allowed_tags(&self, pos: usize) -> Option<Vec<Label>> {
    let m = self.masks.as_ref()?;
    Some((0..m.num_labels).filter(|&l| self.is_allowed_tag(pos, l)).collect())
  }

  /// Excludes a site. Panics on an unconstrained pattern, which has no
  /// dimensions to forbid within.
  pub fn forbid(&mut self, begin: usize, end: usize, label: Label, level: Level) {
    let masks = Arc::make_mut(
      self
        .masks
        .as_mut()
        .expect("forbid on an unconstrained pattern; use allow_all"),
    );
    let slot = masks.slot(begin, end, label);
    match level {
      Level::Top => masks.top[slot] = false,
      Level::Bot => masks.bot[slot] = false,
    }
  }

  /// Sites admitted by both patterns
  pub fn intersect(&self, other: &Self) -> Self {
    match (&self.masks, &other.masks) {
      (None, _) => other.clone(),
      (_, None) => self.clone(),
      (Some(a), Some(b)) if Arc::ptr_eq(a, b) => self.clone(),
      (Some(a), Some(b)) => {
        assert_eq!(
          (a.length, a.num_labels),
          (b.length, b.num_labels),
          "intersecting patterns of different shapes"
        );
        let and = |x: &[bool], y: &[bool]| x.iter().zip(y).map(|(p, q)| *p && *q).collect();
        Self {
          masks: Some(Arc::new(Masks {
            length: a.length,
            num_labels: a.num_labels,
            top: and(&a.top, &b.top),
            bot: and(&a.bot, &b.bot),
          })),
        }
      }
    }
  }

  /// Number of admitted (span, label) sites at `level`, if constrained
  pub fn count_allowed(&self, level: Level) -> Option<usize> {
    self
      .masks
      .as_ref()
      .map(|m| m.level(level).iter().filter(|a| **a).count())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn with_forbidden(sites: &[(usize, usize, Label, Level)]) -> SparsityPattern {
    let mut p = SparsityPattern::allow_all(3, 2);
    for &(b, e, l, lv) in sites {
      p.forbid(b, e, l, lv);
    }
    p
  }

  #[test]
  fn unconstrained_admits_everything() {
    let p = SparsityPattern::unconstrained();
    assert!(p.is_allowed(0, 17, 40, Level::Top));
    assert_eq!(p.count_allowed(Level::Bot), None);
    assert_eq!(p.shape(), None);
    assert_eq!(SparsityPattern::allow_all(5, 3).shape(), Some((5, 3)));
  }

  #[test]
  fn intersection_never_readmits() {
    let a = with_forbidden(&[(0, 1, 0, Level::Bot), (1, 3, 1, Level::Top)]);
    let b = with_forbidden(&[(0, 2, 1, Level::Bot)]);
    let c = with_forbidden(&[(2, 3, 0, Level::Top)]);

    let ab = a.intersect(&b);
    assert!(!ab.is_allowed(0, 1, 0, Level::Bot));
    assert!(!ab.is_allowed(1, 3, 1, Level::Top));
    assert!(!ab.is_allowed(0, 2, 1, Level::Bot));
    assert!(ab.is_allowed(0, 2, 1, Level::Top));

    assert_eq!(ab, b.intersect(&a));
    assert_eq!(ab.intersect(&c), a.intersect(&b.intersect(&c)));
    assert_eq!(a.intersect(&SparsityPattern::unconstrained()), a);
    assert_eq!(ab.count_allowed(Level::Bot), Some(6 * 2 - 2));
  }

  #[test]
  fn forbid_does_not_leak_into_clones() {
    let a = SparsityPattern::allow_all(2, 1);
    let mut b = a.clone();
    b.forbid(0, 2, 0, Level::Top);
    assert!(a.is_allowed(0, 2, 0, Level::Top));
    assert!(!b.is_allowed(0, 2, 0, Level::Top));
  }

  #[test]
  fn tag_view_reads_single_token_bot_cells() {
    let p = with_forbidden(&[(1, 2, 0, Level::Bot), (0, 1, 1, Level::Top)]);
    assert_eq!(p.allowed_tags(1), Some(vec![1]));
    assert_eq!(p.allowed_tags(0), Some(vec![0, 1]));
    assert_eq!(SparsityPattern::unconstrained().allowed_tags(0), None);
  }
}
