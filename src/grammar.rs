use std::collections::HashMap;
use std::fmt;

use crate::error::GrammarError;
use crate::rules::{Label, Rule, RuleId, ScoredRule};

/// Bijection between label names and dense indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelIndex {
  names: Vec<String>,
  by_name: HashMap<String, Label>,
}

impl LabelIndex {
  pub fn new() -> Self {
    Default::default()
  }

  /// Returns the index for `name`, allocating a new one if it's unseen
  pub fn intern(&mut self, name: &str) -> Label {
    if let Some(&idx) = self.by_name.get(name) {
      return idx;
    }
    let idx = self.names.len();
    self.names.push(name.to_string());
    self.by_name.insert(name.to_string(), idx);
    idx
  }

  pub fn get(&self, name: &str) -> Option<Label> {
    self.by_name.get(name).copied()
  }

  pub fn name(&self, label: Label) -> &str {
    &self.names[label]
  }

  pub fn names(&self) -> &[String] {
    &self.names
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

/// Immutable grammar topology: labels, rules with base scores, and the
/// per-label rule lookups the chart builder's inner loops run over.
#[derive(Debug)]
pub struct Grammar {
  labels: LabelIndex,
  root: Label,
  rules: Vec<ScoredRule>,
  binary_by_parent: Vec<Vec<RuleId>>,
  binary_by_left: Vec<Vec<RuleId>>,
  binary_by_right: Vec<Vec<RuleId>>,
  unary_by_parent: Vec<Vec<RuleId>>,
  unary_by_child: Vec<Vec<RuleId>>,
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "//** root: {}", self.labels.name(self.root))?;
    write!(f, "//** labels:")?;
    for name in self.labels.names() {
      write!(f, " {}", name)?;
    }
    writeln!(f)?;

    for scored in self.rules.iter() {
      writeln!(f, "{} {};", scored.rule.display(self.labels.names()), scored.score)?;
    }

    Ok(())
  }
}

impl Grammar {
  pub fn labels(&self) -> &LabelIndex {
    &self.labels
  }

  pub fn num_labels(&self) -> usize {
    self.labels.len()
  }

  pub fn num_rules(&self) -> usize {
    self.rules.len()
  }

  pub fn label_name(&self, label: Label) -> &str {
    self.labels.name(label)
  }

  pub fn root(&self) -> Label {
    self.root
  }

  pub fn rule(&self, rule: RuleId) -> &Rule {
    &self.rules[rule].rule
  }

  pub fn rule_score(&self, rule: RuleId) -> f64 {
    self.rules[rule].score
  }

  pub fn parent(&self, rule: RuleId) -> Label {
    self.rules[rule].rule.parent()
  }

  /// Left child of a binary rule. Panics on a unary rule.
  pub fn left_child(&self, rule: RuleId) -> Label {
    match self.rules[rule].rule {
      Rule::Binary { left, .. } => left,
      Rule::Unary { .. } => panic!("left_child of unary rule {}", rule),
    }
  }

  /// Right child of a binary rule. Panics on a unary rule.
  pub fn right_child(&self, rule: RuleId) -> Label {
    match self.rules[rule].rule {
      Rule::Binary { right, .. } => right,
      Rule::Unary { .. } => panic!("right_child of unary rule {}", rule),
    }
  }

  /// Child of a unary rule. Panics on a binary rule.
  pub fn child(&self, rule: RuleId) -> Label {
    match self.rules[rule].rule {
      Rule::Unary { child, .. } => child,
      Rule::Binary { .. } => panic!("child of binary rule {}", rule),
    }
  }

  pub fn binary_rules_with_parent(&self, label: Label) -> &[RuleId] {
    &self.binary_by_parent[label]
  }

  pub fn binary_rules_with_left_child(&self, label: Label) -> &[RuleId] {
    &self.binary_by_left[label]
  }

  pub fn binary_rules_with_right_child(&self, label: Label) -> &[RuleId] {
    &self.binary_by_right[label]
  }

  pub fn unary_rules_with_parent(&self, label: Label) -> &[RuleId] {
    &self.unary_by_parent[label]
  }

  pub fn unary_rules_with_child(&self, label: Label) -> &[RuleId] {
    &self.unary_by_child[label]
  }

  /// Finds two unary rules where one's child is the other's parent, as
  /// `[parent, middle, child]`
  fn find_unary_chain(unary_by_parent: &[Vec<RuleId>], rules: &[ScoredRule]) -> Option<[Label; 3]> {
    rules.iter().find_map(|scored| match scored.rule {
      Rule::Unary { parent, child } => unary_by_parent[child]
        .first()
        .map(|&below| [parent, child, rules[below].rule.children()[0]]),
      Rule::Binary { .. } => None,
    })
  }

  /// Finds a cycle in the unary rule graph (child -> parent edges), if any
  fn find_unary_cycle(num_labels: usize, unary_by_child: &[Vec<RuleId>], rules: &[ScoredRule]) -> Option<Vec<Label>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
      Unvisited,
      OnStack,
      Done,
    }

    fn visit(
      label: Label,
      marks: &mut [Mark],
      stack: &mut Vec<Label>,
      unary_by_child: &[Vec<RuleId>],
      rules: &[ScoredRule],
    ) -> Option<Vec<Label>> {
      marks[label] = Mark::OnStack;
      stack.push(label);
      for &rule in unary_by_child[label].iter() {
        let parent = rules[rule].rule.parent();
        match marks[parent] {
          Mark::OnStack => {
            let start = stack.iter().position(|&l| l == parent).unwrap_or(0);
            let mut cycle = stack[start..].to_vec();
            cycle.push(parent);
            return Some(cycle);
          }
          Mark::Unvisited => {
            if let Some(cycle) = visit(parent, marks, stack, unary_by_child, rules) {
              return Some(cycle);
            }
          }
          Mark::Done => {}
        }
      }
      stack.pop();
      marks[label] = Mark::Done;
      None
    }

    let mut marks = vec![Mark::Unvisited; num_labels];
    let mut stack = Vec::new();
    for label in 0..num_labels {
      if marks[label] == Mark::Unvisited {
        if let Some(cycle) = visit(label, &mut marks, &mut stack, unary_by_child, rules) {
          return Some(cycle);
        }
      }
    }
    None
  }
}

/// Collects labels and rules, then validates and indexes them into a `Grammar`
#[derive(Debug, Default)]
pub struct GrammarBuilder {
  labels: LabelIndex,
  rules: Vec<ScoredRule>,
}

impl GrammarBuilder {
  pub fn new() -> Self {
    Default::default()
  }

  /// Registers a label without giving it rules (e.g. a preterminal)
  pub fn label(&mut self, name: &str) -> Label {
    self.labels.intern(name)
  }

  pub fn binary(&mut self, parent: &str, left: &str, right: &str, score: f64) -> RuleId {
    let rule = Rule::Binary {
      parent: self.labels.intern(parent),
      left: self.labels.intern(left),
      right: self.labels.intern(right),
    };
    self.push(rule, score)
  }

  pub fn unary(&mut self, parent: &str, child: &str, score: f64) -> RuleId {
    let rule = Rule::Unary {
      parent: self.labels.intern(parent),
      child: self.labels.intern(child),
    };
    self.push(rule, score)
  }

  fn push(&mut self, rule: Rule, score: f64) -> RuleId {
    self.rules.push(ScoredRule { rule, score });
    self.rules.len() - 1
  }

  pub fn build(self, root: &str) -> Result<Grammar, GrammarError> {
    if self.rules.is_empty() {
      return Err(GrammarError::Empty);
    }
    let root = self
      .labels
      .get(root)
      .ok_or_else(|| GrammarError::UnknownLabel(root.to_string()))?;

    let n = self.labels.len();
    let mut binary_by_parent = vec![Vec::new(); n];
    let mut binary_by_left = vec![Vec::new(); n];
    let mut binary_by_right = vec![Vec::new(); n];
    let mut unary_by_parent = vec![Vec::new(); n];
    let mut unary_by_child = vec![Vec::new(); n];

    for (idx, scored) in self.rules.iter().enumerate() {
      match scored.rule {
        Rule::Binary { parent, left, right } => {
          binary_by_parent[parent].push(idx);
          binary_by_left[left].push(idx);
          binary_by_right[right].push(idx);
        }
        Rule::Unary { parent, child } => {
          unary_by_parent[parent].push(idx);
          unary_by_child[child].push(idx);
        }
      }
    }

    if binary_by_parent[root].is_empty() && unary_by_parent[root].is_empty() {
      return Err(GrammarError::MissingRoot(self.labels.name(root).to_string()));
    }

    if let Some(cycle) = Grammar::find_unary_cycle(n, &unary_by_child, &self.rules) {
      let names = cycle.into_iter().map(|l| self.labels.name(l).to_string()).collect();
      return Err(GrammarError::UnaryCycle(names));
    }

    if let Some(chain) = Grammar::find_unary_chain(&unary_by_parent, &self.rules) {
      let names = chain.iter().map(|&l| self.labels.name(l).to_string()).collect();
      return Err(GrammarError::UnaryChain(names));
    }

    Ok(Grammar {
      labels: self.labels,
      root,
      rules: self.rules,
      binary_by_parent,
      binary_by_left,
      binary_by_right,
      unary_by_parent,
      unary_by_child,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn toy() -> Grammar {
    let mut b = GrammarBuilder::new();
    b.binary("S", "NP", "VP", 0.0);
    b.binary("NP", "Det", "N", -0.5);
    b.unary("VP", "V", -0.1);
    b.build("S").unwrap()
  }

  #[test]
  fn indexes_rules_by_role() {
    let g = toy();
    let s = g.labels().get("S").unwrap();
    let np = g.labels().get("NP").unwrap();
    let vp = g.labels().get("VP").unwrap();
    let v = g.labels().get("V").unwrap();

    assert_eq!(g.root(), s);
    assert_eq!(g.binary_rules_with_parent(s), &[0]);
    assert_eq!(g.binary_rules_with_left_child(np), &[0]);
    assert_eq!(g.binary_rules_with_right_child(vp), &[0]);
    assert_eq!(g.unary_rules_with_child(v), &[2]);
    assert_eq!(g.unary_rules_with_parent(vp), &[2]);
    assert_eq!(g.left_child(1), g.labels().get("Det").unwrap());
    assert_eq!(g.rule_score(1), -0.5);
    assert_eq!(g.child(2), v);
  }

  #[test]
  fn rejects_unary_cycles() {
    let mut b = GrammarBuilder::new();
    b.binary("S", "A", "A", 0.0);
    b.unary("A", "B", 0.0);
    b.unary("B", "C", 0.0);
    b.unary("C", "A", 0.0);
    match b.build("S") {
      Err(GrammarError::UnaryCycle(cycle)) => {
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
      }
      other => panic!("expected a unary cycle, got {:?}", other),
    }
  }

  #[test]
  fn rejects_unary_self_loop() {
    let mut b = GrammarBuilder::new();
    b.unary("S", "S", 0.0);
    assert!(matches!(b.build("S"), Err(GrammarError::UnaryCycle(_))));
  }

  #[test]
  fn rejects_unary_chains() {
    let mut b = GrammarBuilder::new();
    b.binary("S", "A", "A", 0.0);
    b.unary("A", "B", 0.0);
    b.unary("B", "C", 0.0);
    assert_eq!(
      b.build("S").unwrap_err(),
      GrammarError::UnaryChain(vec!["A".to_string(), "B".to_string(), "C".to_string()])
    );

    // one step each, over different spans, is fine
    let mut b = GrammarBuilder::new();
    b.binary("S", "A", "B", 0.0);
    b.unary("A", "C", 0.0);
    b.unary("B", "C", 0.0);
    assert!(b.build("S").is_ok());
  }

  #[test]
  fn rejects_missing_root() {
    let mut b = GrammarBuilder::new();
    b.binary("S", "A", "B", 0.0);
    assert_eq!(
      b.build("A").unwrap_err(),
      GrammarError::MissingRoot("A".to_string())
    );

    let mut b = GrammarBuilder::new();
    b.binary("S", "A", "B", 0.0);
    assert!(matches!(b.build("X"), Err(GrammarError::UnknownLabel(_))));

    assert_eq!(GrammarBuilder::new().build("S").unwrap_err(), GrammarError::Empty);
  }

  #[test]
  fn displays_rules() {
    let text = toy().to_string();
    assert!(text.starts_with("//** root: S\n"));
    assert!(text.contains("NP -> Det N -0.5;"));
  }
}
