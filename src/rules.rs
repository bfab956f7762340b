use std::fmt;

/// Dense index of a label in a `Grammar`'s label table
pub type Label = usize;

/// Dense index of a rule (binary and unary share one index space)
pub type RuleId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
  Binary { parent: Label, left: Label, right: Label },
  Unary { parent: Label, child: Label },
}

impl Rule {
  pub fn parent(&self) -> Label {
    match self {
      Self::Binary { parent, .. } | Self::Unary { parent, .. } => *parent,
    }
  }

  /// The children in left to right order
  pub fn children(&self) -> Vec<Label> {
    match self {
      Self::Binary { left, right, .. } => vec![*left, *right],
      Self::Unary { child, .. } => vec![*child],
    }
  }

  /// Displays the rule with label names resolved through `names`
  pub fn display<'a>(&'a self, names: &'a [String]) -> RuleDisplay<'a> {
    RuleDisplay { rule: self, names }
  }
}

pub struct RuleDisplay<'a> {
  rule: &'a Rule,
  names: &'a [String],
}

impl fmt::Display for RuleDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ->", self.names[self.rule.parent()])?;
    for child in self.rule.children() {
      write!(f, " {}", self.names[child])?;
    }
    Ok(())
  }
}

/// A rule paired with its base (unrefined) log score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRule {
  pub rule: Rule,
  pub score: f64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn displays_with_names() {
    let names = vec!["S".to_string(), "NP".to_string(), "VP".to_string()];
    let rule = Rule::Binary {
      parent: 0,
      left: 1,
      right: 2,
    };
    assert_eq!(rule.display(&names).to_string(), "S -> NP VP");
    assert_eq!(
      Rule::Unary { parent: 0, child: 2 }.display(&names).to_string(),
      "S -> VP"
    );
  }
}
