use criterion::{criterion_group, criterion_main, Criterion};
use kc::{diagnostic::Diagnostics, lexer, token::TokenKind};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/sample.k");

fn lexer(input: &str) -> usize {
    let mut diagnostics = Diagnostics::new();
    lexer::tokenize(input, &mut diagnostics)
        .iter()
        .filter(|token| token.kind != TokenKind::Newline)
        .count()
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("lexer", |b| {
        b.iter(|| black_box(lexer(black_box(INPUT))));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
