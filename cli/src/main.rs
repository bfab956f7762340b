use std::env;
use std::io;
use std::io::Write;
use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;

use chartwright::{
  ChartBuilder, CoarseToFineParser, CoreAnchoring, Err, GrammarBundle, LabelProjection, ParseError,
  ParserConfig,
};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} FILE [options]

Options:
  -h, --help              Print this message
  -c, --chart             Print the inside chart (defaults to not printing)
  -l, --max-span N        Don't build spans longer than N tokens
      --coarse FILE       Prune with a coarse grammar first. Fine labels are
                          projected by dropping everything from the first '^'
  -t, --threshold X       Coarse posterior log-probability below which fine
                          sites are pruned (defaults to -10)

Set RUST_LOG=debug to see what the parser is doing.",
    prog_name
  )
}

enum Parser {
  Plain(ChartBuilder),
  CoarseToFine(CoarseToFineParser),
}

impl Parser {
  fn marginal(&self, words: &[&str]) -> Result<chartwright::ChartMarginal, ParseError> {
    let unit = CoreAnchoring::unconstrained();
    match self {
      Self::Plain(b) => b.marginal(words, &unit),
      Self::CoarseToFine(p) => p.marginal(words, &unit),
    }
  }

  fn best_parse(&self, words: &[&str]) -> Result<Option<(chartwright::SynTree<String, String>, f64)>, ParseError> {
    let unit = CoreAnchoring::unconstrained();
    match self {
      Self::Plain(b) => b.best_parse(words, &unit),
      Self::CoarseToFine(p) => p.best_parse(words, &unit),
    }
  }
}

fn parse(parser: &Parser, sentence: &str, print_chart: bool) -> Result<(), Err> {
  let sentence = sentence.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>();

  let marginal = match parser.marginal(&sentence) {
    Ok(m) => m,
    Err(err @ (ParseError::Coverage { .. } | ParseError::CoarseUnparseable { .. } | ParseError::EmptySentence)) => {
      println!("{}\n", err);
      return Ok(());
    }
    Err(err) => return Err(err.into()),
  };

  if print_chart {
    println!("chart:\n{}\n", marginal.inside());
  }

  if !marginal.is_parseable() {
    println!("No parse\n");
    return Ok(());
  }
  println!("log partition: {:.6}", marginal.log_partition());

  if let Some((tree, score)) = parser.best_parse(&sentence)? {
    println!("best parse ({:.6}):\n{}", score, tree);
  }
  println!();

  Ok(())
}

struct Args {
  filename: String,
  coarse: Option<String>,
  print_chart: bool,
  max_span: Option<usize>,
  threshold: Option<f64>,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    if v.is_empty() {
      return Err(Self::make_error_message("bad argument vector", "chartwright"));
    }

    let args_len = v.len();
    let mut iter = v.into_iter();
    let prog_name = iter.next().unwrap_or_default();

    if args_len < 2 {
      return Err(Self::make_error_message("not enough arguments", prog_name));
    }

    let mut filename: Option<String> = None;
    let mut coarse: Option<String> = None;
    let mut print_chart = false;
    let mut max_span = None;
    let mut threshold = None;

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-c" || o == "--chart" {
        print_chart = true;
      } else if o == "-l" || o == "--max-span" {
        let n = iter.next().and_then(|n| n.parse().ok());
        if n.is_none() {
          return Err(Self::make_error_message("--max-span needs a number", prog_name));
        }
        max_span = n;
      } else if o == "-t" || o == "--threshold" {
        let x = iter.next().and_then(|x| x.parse().ok());
        if x.is_none() {
          return Err(Self::make_error_message("--threshold needs a number", prog_name));
        }
        threshold = x;
      } else if o == "--coarse" {
        coarse = iter.next();
        if coarse.is_none() {
          return Err(Self::make_error_message("--coarse needs a file", prog_name));
        }
      } else if filename.is_none() {
        filename = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    if let Some(filename) = filename {
      Ok(Self {
        filename,
        coarse,
        print_chart,
        max_span,
        threshold,
      })
    } else {
      Err(Self::make_error_message("missing filename", prog_name))
    }
  }

  fn config(&self) -> ParserConfig {
    let mut config = ParserConfig::default();
    if let Some(max) = self.max_span {
      config = config.with_max_span_length(max);
    }
    if let Some(threshold) = self.threshold {
      config = config.with_pruning_threshold(threshold);
    }
    config
  }
}

fn build_parser(opts: &Args) -> Result<Parser, Err> {
  let fine = GrammarBundle::read_from_file(&opts.filename)?;
  info!(
    file = %opts.filename,
    labels = fine.grammar.num_labels(),
    rules = fine.grammar.num_rules(),
    "loaded grammar"
  );
  let fine_builder = ChartBuilder::new(fine.grammar.clone(), fine.lexicon).with_config(opts.config());

  let Some(coarse_file) = &opts.coarse else {
    return Ok(Parser::Plain(fine_builder));
  };

  let coarse = GrammarBundle::read_from_file(coarse_file)?;
  info!(file = %coarse_file, labels = coarse.grammar.num_labels(), "loaded coarse grammar");
  let projection = LabelProjection::new(&fine.grammar, &coarse.grammar, |name| {
    name.split('^').next().unwrap_or(name).to_string()
  })?;
  let coarse_builder = ChartBuilder::new(coarse.grammar, coarse.lexicon).with_config(opts.config());
  Ok(Parser::CoarseToFine(CoarseToFineParser::new(
    coarse_builder,
    fine_builder,
    projection,
  )?))
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let parser = build_parser(&opts)?;

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        parse(&parser, input.trim(), opts.print_chart)?;
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
