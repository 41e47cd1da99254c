use criterion::{criterion_group, criterion_main, Criterion};
use searchcore::fingerprint::fingerprint;
use searchcore::tokenizer::{tokenize, Analyzer};

const TEXT: &str = "Inverted indexes map every term to the documents that contain it. \
    Postings are stored back to back in a single blob, and a small directory records \
    where each term's postings begin and how many bytes they span. Near-duplicate pages \
    are detected before indexing by hashing overlapping three-word shingles and keeping \
    the smallest hashes as a sketch of the page's content.";

fn bench_tokenize(c: &mut Criterion) {
    let text = TEXT.repeat(20);
    c.bench_function("tokenize_paragraphs", |b| b.iter(|| tokenize(&text)));
}

fn bench_fingerprint(c: &mut Criterion) {
    let text = TEXT.repeat(20);
    let analyzer = Analyzer::default();
    c.bench_function("fingerprint_paragraphs", |b| b.iter(|| fingerprint(&text, &analyzer, 50)));
}

criterion_group!(benches, bench_tokenize, bench_fingerprint);
criterion_main!(benches);
