use std::fmt;

/// A labeled span over the sentence: `[begin, end)`
#[derive(Debug, PartialEq, Clone)]
pub struct Constituent<T> {
  pub value: T,
  pub span: (usize, usize),
}

impl<T> fmt::Display for Constituent<T>
where
  T: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.span.0, self.span.1, self.value)
  }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Word<U> {
  pub value: U,
  pub span: (usize, usize),
}

impl<U> fmt::Display for Word<U>
where
  U: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.span.0, self.span.1, self.value)
  }
}

/// A derivation: branches are labeled constituents, leaves are tokens.
/// A unary chain shows up as a branch with a single branch child over the
/// same span.
#[derive(Debug, PartialEq, Clone)]
pub enum SynTree<T, U> {
  Branch(Constituent<T>, Vec<SynTree<T, U>>),
  Leaf(Word<U>),
}

impl<T, U> SynTree<T, U> {
  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf(_))
  }

  pub fn span(&self) -> (usize, usize) {
    match self {
      Self::Branch(c, _) => c.span,
      Self::Leaf(w) => w.span,
    }
  }

  /// Every branch's label and span, in preorder
  pub fn constituents(&self) -> Vec<(&T, (usize, usize))> {
    let mut out = Vec::new();
    self.collect_constituents(&mut out);
    out
  }

  fn collect_constituents<'a>(&'a self, out: &mut Vec<(&'a T, (usize, usize))>) {
    if let Self::Branch(c, children) = self {
      out.push((&c.value, c.span));
      for child in children {
        child.collect_constituents(out);
      }
    }
  }

  /// The tokens under the tree, left to right
  pub fn leaves(&self) -> Vec<&U> {
    match self {
      Self::Leaf(w) => vec![&w.value],
      Self::Branch(_, children) => children.iter().flat_map(|c| c.leaves()).collect(),
    }
  }
}

impl<T, U> fmt::Display for SynTree<T, U>
where
  T: fmt::Display,
  U: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(t) => write!(f, "{}", t),
      Self::Branch(t, ts) => {
        write!(f, "({}", t)?;
        if ts.len() == 1 && ts[0].is_leaf() {
          write!(f, " ({}))", ts[0])
        } else {
          for t in ts.iter() {
            let fmt = format!("{}", t);
            for line in fmt.lines() {
              write!(f, "\n  {}", line)?;
            }
          }
          write!(f, ")")
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn branch(label: &str, span: (usize, usize), children: Vec<SynTree<String, String>>) -> SynTree<String, String> {
    SynTree::Branch(
      Constituent {
        value: label.to_string(),
        span,
      },
      children,
    )
  }

  fn leaf(word: &str, pos: usize) -> SynTree<String, String> {
    SynTree::Leaf(Word {
      value: word.to_string(),
      span: (pos, pos + 1),
    })
  }

  #[test]
  fn walks_constituents_in_preorder() {
    let t = branch(
      "S",
      (0, 2),
      vec![
        branch("NP", (0, 1), vec![branch("N", (0, 1), vec![leaf("dogs", 0)])]),
        branch("V", (1, 2), vec![leaf("bark", 1)]),
      ],
    );
    let labels: Vec<_> = t.constituents().into_iter().map(|(l, s)| (l.as_str(), s)).collect();
    assert_eq!(labels, vec![("S", (0, 2)), ("NP", (0, 1)), ("N", (0, 1)), ("V", (1, 2))]);
    assert_eq!(t.leaves(), vec!["dogs", "bark"]);
    assert_eq!(t.span(), (0, 2));
  }

  #[test]
  fn displays_unary_chains_nested() {
    let t = branch("NP", (0, 1), vec![branch("N", (0, 1), vec![leaf("dogs", 0)])]);
    assert_eq!(format!("{}", t), "(0..1: NP\n  (0..1: N (0..1: dogs)))");
  }
}
