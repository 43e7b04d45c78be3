// Throughput benchmarks for vectorization, blocking and pair scoring
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use matchx_core::{BlockingConfig, BlockingEngine, NoProgress, Record, RecordRef, TfidfVectorizer};
use matchx_similarity::{token_sort_ratio, PairScorer};
use rand::prelude::*;

const WORDS: &[&str] = &[
    "sumber", "makmur", "jaya", "abadi", "toko", "pt", "cv", "sinar", "terang", "maju",
    "bersama", "karya", "mandiri", "mitra", "usaha", "cahaya", "baru", "bintang", "timur",
    "sejahtera", "utama", "harapan", "indah", "apotek", "bengkel", "warung",
];

fn generate_names(n: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let len = rng.random_range(2..5);
            (0..len)
                .map(|_| *WORDS.choose(&mut rng).unwrap_or(&"toko"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn benchmark_vectorize(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectorize");

    for size in [100, 1000, 5000].iter() {
        let names = generate_names(*size, 7);
        group.bench_with_input(BenchmarkId::new("tfidf_char_wb", size), &names, |b, names| {
            let vectorizer = TfidfVectorizer::default();
            b.iter(|| black_box(vectorizer.fit_transform(names).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_blocking(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking");
    group.sample_size(10);

    let names = generate_names(4000, 11);
    let (_, matrix) = TfidfVectorizer::default().fit_transform(&names).unwrap();

    for chunk_size in [500, 1000, 4000].iter() {
        group.bench_with_input(BenchmarkId::new("chunked_knn", chunk_size), chunk_size, |b, &chunk_size| {
            let engine = BlockingEngine::new(BlockingConfig {
                chunk_size,
                ..Default::default()
            });
            b.iter(|| black_box(engine.candidates(&matrix, &NoProgress).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");

    let names = generate_names(2000, 13);
    let records: Vec<Record> = names
        .iter()
        .enumerate()
        .map(|(i, n)| Record::new(RecordRef::new("bench", i), vec![("name".to_string(), n.clone())]))
        .collect();
    let (_, matrix) = TfidfVectorizer::default().fit_transform(&names).unwrap();
    let candidates = BlockingEngine::default().candidates(&matrix, &NoProgress).unwrap();

    group.bench_function("token_sort_ratio", |b| {
        b.iter(|| black_box(token_sort_ratio(black_box(&names[0]), black_box(&names[1]))))
    });

    group.bench_function("score_all", |b| {
        let scorer = PairScorer::new("bench", &records);
        b.iter(|| black_box(scorer.score_all(&candidates, |_, _| true)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_vectorize, benchmark_blocking, benchmark_scoring);
criterion_main!(benches);
