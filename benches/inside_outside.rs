use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chartwright::{ChartBuilder, CoreAnchoring, GrammarBundle, LatentGrammar};

const GRAMMAR_SRC: &str = include_str!("./pp_attachment.pcfg");

fn criterion_benchmark(c: &mut Criterion) {
  let bundle = GRAMMAR_SRC.parse::<GrammarBundle>().unwrap();
  let builder = ChartBuilder::new(bundle.grammar.clone(), bundle.lexicon.clone());
  let latent = builder
    .clone()
    .with_refinements(Arc::new(LatentGrammar::split_uniform(bundle.grammar.clone(), 4)));
  let unit = CoreAnchoring::unconstrained();

  let simple_input = "the man saw the woman".split(' ').collect::<Vec<_>>();
  let complex_input = "the old man watched a tall woman in the park with the telescope"
    .split(' ')
    .collect::<Vec<_>>();

  c.bench_function("inside simple", |b| {
    b.iter(|| builder.build_inside_chart(black_box(&simple_input), &unit).unwrap())
  });

  c.bench_function("inside+outside complex", |b| {
    b.iter(|| builder.marginal(black_box(&complex_input), &unit).unwrap())
  });

  c.bench_function("viterbi complex", |b| {
    b.iter(|| builder.best_parse(black_box(&complex_input), &unit).unwrap())
  });

  c.bench_function("inside+outside complex, 4 latent splits", |b| {
    b.iter(|| latent.marginal(black_box(&complex_input), &unit).unwrap())
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
