//! Simple recursive-descent parsing of grammar files

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::grammar::{Grammar, GrammarBuilder};
use crate::lexicon::SimpleLexicon;
use crate::Err;

/// Stands in for every word the lexicon doesn't list
pub const UNKNOWN_WORD: &str = "<unk>";

/// A grammar and the lexicon that anchors it, read from one source.
///
/// ```text
/// // comments run to the end of the line
/// S -> NP VP;            // binary rule, score 0
/// S -> VP -0.7;          // unary rule with a log score
/// NP -> "the dog" 0.0;   // lexical entry
/// NP -> <unk> -5.0;      // score for words the lexicon doesn't list
/// ```
///
/// The first rule's parent is the root.
#[derive(Debug, Clone)]
pub struct GrammarBundle {
  pub grammar: Arc<Grammar>,
  pub lexicon: Arc<SimpleLexicon>,
}

impl GrammarBundle {
  pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Err> {
    fs::read_to_string(path)?.parse()
  }
}

#[derive(Debug, PartialEq)]
enum Body<'a> {
  Binary(&'a str, &'a str),
  Unary(&'a str),
  Word(&'a str),
  Unknown,
}

#[derive(Debug, PartialEq)]
struct Statement<'a> {
  parent: &'a str,
  body: Body<'a>,
  score: f64,
}

impl FromStr for GrammarBundle {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (statements, s) = parse_statements(s)?;
    assert!(s.is_empty());

    let root = match statements.first() {
      Some(first) => first.parent,
      None => return Err("empty grammar".into()),
    };

    let mut builder = GrammarBuilder::new();
    for st in statements.iter() {
      match st.body {
        Body::Binary(left, right) => {
          builder.binary(st.parent, left, right, st.score);
        }
        Body::Unary(child) => {
          builder.unary(st.parent, child, st.score);
        }
        Body::Word(_) | Body::Unknown => {
          builder.label(st.parent);
        }
      }
    }
    let grammar = builder.build(root)?;

    let mut lexicon = SimpleLexicon::new(&grammar);
    let mut unknown = Vec::new();
    for st in statements.iter() {
      // every parent was interned above
      let Some(label) = grammar.labels().get(st.parent) else {
        continue;
      };
      match st.body {
        Body::Word(word) => lexicon.add(word, label, st.score),
        Body::Unknown => unknown.push((label, st.score)),
        _ => {}
      }
    }
    lexicon.set_unknown(unknown);

    debug!(
      labels = grammar.num_labels(),
      rules = grammar.num_rules(),
      root = grammar.label_name(grammar.root()),
      "grammar loaded"
    );

    Ok(Self {
      grammar: Arc::new(grammar),
      lexicon: Arc::new(lexicon),
    })
  }
}

type Infallible<'a, T> = (T, &'a str);
type ParseResult<'a, T> = Result<(T, &'a str), Err>;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// Try to consume a regex, returning None if it doesn't match
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  match re.find(s) {
    Some(m) if m.start() == 0 => {
      let (_, rest) = s.split_at(m.end());
      (Some(m.as_str()), rest)
    }
    _ => (None, s),
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &'static Regex, s: &'a str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", re, context(s)).into())
  }
}

/// Try to consume a char, returning None if it doesn't match
fn optional_char(c: char, s: &str) -> Infallible<'_, Option<char>> {
  match s.strip_prefix(c) {
    Some(rest) => (Some(c), rest),
    None => (None, s),
  }
}

/// The start of the unparsed input, for error messages
fn context(s: &str) -> &str {
  let end = s.char_indices().nth(30).map_or(s.len(), |(idx, _)| idx);
  &s[..end]
}

/// Tries to skip whitespace and // comments
fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE_OR_COMMENT, r"^(\s|//[^\n]*)+");
  optional_re(&WHITESPACE_OR_COMMENT, s).1
}

/// Tries to parse a label name
fn parse_name(s: &str) -> ParseResult<'_, &str> {
  regex_static!(NAME, r"^[A-Za-z_][A-Za-z0-9\-_^@|+=']*");
  needed_re(&NAME, s).map_err(|err| format!("name: {}", err).into())
}

/// Parses an optional log score: a float, or -inf. A bare `inf` is a label.
fn parse_score(s: &str) -> ParseResult<'_, Option<f64>> {
  regex_static!(NUMBER, r"^([-+]inf\b|[-+]?[0-9]+(\.[0-9]*)?([eE][-+]?[0-9]+)?)");
  match optional_re(&NUMBER, s) {
    (Some(num), rest) => {
      let score = num
        .parse::<f64>()
        .map_err(|e| -> Err { format!("score {}: {}", num, e).into() })?;
      if score == f64::INFINITY {
        return Err(format!("score {}: log scores can't be +inf", num).into());
      }
      Ok((Some(score), rest))
    }
    (None, rest) => Ok((None, rest)),
  }
}

/// A double-quoted word, returned without its quotes
fn parse_word(s: &str) -> Infallible<'_, Option<&str>> {
  regex_static!(QUOTED, r#"^"[^"]*""#);
  match optional_re(&QUOTED, s) {
    (Some(quoted), rest) => (Some(&quoted[1..quoted.len() - 1]), rest),
    (None, rest) => (None, rest),
  }
}

fn parse_body(s: &str) -> ParseResult<'_, Body<'_>> {
  if let (Some(word), s) = parse_word(s) {
    return Ok((Body::Word(word), s));
  }
  if let Some(s) = s.strip_prefix(UNKNOWN_WORD) {
    return Ok((Body::Unknown, s));
  }

  let (first, s) = parse_name(s).map_err(|e| -> Err { format!("rule child: {}", e).into() })?;
  let rest = skip_whitespace(s);
  if parse_score(rest)?.0.is_some() || rest.starts_with(';') {
    return Ok((Body::Unary(first), s));
  }

  let (second, s) = parse_name(rest).map_err(|e| -> Err { format!("rule child: {}", e).into() })?;
  Ok((Body::Binary(first, second), s))
}

/// Parent, arrow, body and optional score, terminated by ;
fn parse_statement(s: &str) -> ParseResult<'_, Statement<'_>> {
  regex_static!(ARROW, "^->");

  let (parent, s) = parse_name(s).map_err(|e| -> Err { format!("rule parent: {}", e).into() })?;
  let s = skip_whitespace(s);
  let (_, s) = needed_re(&ARROW, s).map_err(|e| -> Err { format!("rule arrow: {}", e).into() })?;
  let s = skip_whitespace(s);
  let (body, s) = parse_body(s)?;
  let s = skip_whitespace(s);
  let (score, s) = parse_score(s)?;
  let s = skip_whitespace(s);

  match optional_char(';', s) {
    (Some(_), s) => Ok((
      Statement {
        parent,
        body,
        score: score.unwrap_or(0.0),
      },
      s,
    )),
    (None, s) => Err(
      format!(
        "rule for {}: expected ';' (rules have at most two children) at {}",
        parent,
        context(s)
      )
      .into(),
    ),
  }
}

fn parse_statements(s: &str) -> ParseResult<'_, Vec<Statement<'_>>> {
  let mut statements = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if rem.is_empty() {
      return Ok((statements, rem));
    }
    let (statement, s) = parse_statement(rem)?;
    statements.push(statement);
    rem = s;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexicon::Lexicon;

  #[test]
  fn parses_rules_words_and_scores() {
    let bundle: GrammarBundle = r#"
      // a comment before anything
      S -> NP VP;
      S -> VP -0.7;  // trailing comment
      NP^S -> Det N 1e-1;
      Det -> "the";
      N -> "dog" -0.5;
      N -> "hot dog" -inf;
      VP -> <unk> -4.0;
    "#
    .parse()
    .unwrap();

    let g = &bundle.grammar;
    assert_eq!(g.label_name(g.root()), "S");
    assert_eq!(g.num_rules(), 3);
    assert_eq!(g.rule_score(1), -0.7);
    assert_eq!(g.rule_score(2), 0.1);
    assert!(g.labels().get("NP^S").is_some());

    let anchor = bundle.lexicon.anchor(&["the", "dog", "hot dog", "runs"]);
    let det = g.labels().get("Det").unwrap();
    let n = g.labels().get("N").unwrap();
    let vp = g.labels().get("VP").unwrap();
    assert_eq!(anchor.tags(0), &[det]);
    assert_eq!(anchor.score(1, n), -0.5);
    assert!(anchor.tags(2).is_empty());
    assert_eq!(anchor.score(3, vp), -4.0);
  }

  #[test]
  fn rejects_malformed_rules() {
    assert!("".parse::<GrammarBundle>().is_err());
    assert!("S -> A B C;".parse::<GrammarBundle>().is_err());
    assert!("S -> A B".parse::<GrammarBundle>().is_err());
    assert!("S A B;".parse::<GrammarBundle>().is_err());
    assert!("S -> A; A -> B; B -> A;".parse::<GrammarBundle>().is_err());
    assert!("S -> A +inf;".parse::<GrammarBundle>().is_err());
  }

  #[test]
  fn rejects_stacked_unaries() {
    let err = r#"S -> A A; A -> B; B -> C; C -> "x";"#.parse::<GrammarBundle>().unwrap_err();
    assert_eq!(err.to_string(), "unary chain longer than one step: A -> B -> C");
  }

  #[test]
  fn inf_without_a_sign_is_a_label() {
    let bundle: GrammarBundle = "S -> A inf;\nS -> A -inf;\n".parse().unwrap();
    let g = &bundle.grammar;
    let inf = g.labels().get("inf").unwrap();
    assert_eq!(g.right_child(0), inf);
    assert_eq!(g.rule_score(0), 0.0);
    assert_eq!(g.child(1), g.labels().get("A").unwrap());
    assert_eq!(g.rule_score(1), f64::NEG_INFINITY);
  }

  #[test]
  fn reads_from_disk() {
    let path = std::env::temp_dir().join(format!("chartwright-{}.pcfg", std::process::id()));
    fs::write(&path, "S -> A A;\nA -> \"a\";\n").unwrap();
    let bundle = GrammarBundle::read_from_file(&path).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(bundle.grammar.num_labels(), 2);
    assert!(bundle.lexicon.knows("a"));
  }
}
