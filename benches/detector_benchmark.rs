use criterion::{black_box, criterion_group, criterion_main, Criterion};
use langsniff::{LanguageDetector, ModelLoader, SklearnPipeline, RuntimeConfig};

const FIXTURE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/tiny");

fn setup_benchmark_detector() -> LanguageDetector {
    LanguageDetector::from_loader(&ModelLoader::from_dir(FIXTURE_DIR)).unwrap()
}

fn bench_detection(c: &mut Criterion) {
    let detector = setup_benchmark_detector();
    let mut group = c.benchmark_group("Detection");

    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    group.bench_function("short_text", |b| b.iter(|| {
        detector.detect(black_box("Hello there")).unwrap()
    }));

    group.bench_function("sentence", |b| b.iter(|| {
        detector.detect(black_box("The quick brown fox jumps over the lazy dog")).unwrap()
    }));

    let paragraph = "Der schnelle braune Fuchs springt über den faulen Hund. ".repeat(40);
    group.bench_function("long_text", |b| b.iter(|| {
        detector.detect(black_box(&paragraph)).unwrap()
    }));

    group.finish();
}

fn bench_vectorizer(c: &mut Criterion) {
    let pipeline = SklearnPipeline::from_file(
        format!("{}/pipeline.json", FIXTURE_DIR),
        &RuntimeConfig::default(),
    )
    .unwrap();
    let mut group = c.benchmark_group("Vectorizer");

    group.bench_function("transform", |b| b.iter(|| {
        pipeline
            .vectorizer()
            .transform(black_box("Быстрая коричневая лиса перепрыгивает через ленивую собаку"))
            .unwrap()
    }));

    group.finish();
}

fn bench_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("Loading");
    group.sample_size(20);

    // A fresh loader each iteration so the artifacts are parsed every time.
    group.bench_function("load_artifacts", |b| b.iter(|| {
        ModelLoader::from_dir(black_box(FIXTURE_DIR)).load().unwrap()
    }));

    group.finish();
}

criterion_group!(benches, bench_detection, bench_vectorizer, bench_loading);
criterion_main!(benches);
