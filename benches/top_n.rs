use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use tokio::runtime::Runtime;

use quiz_leaderboard::{ScoreBoard, ScoreSubmission, DEFAULT_TOP_N};

fn filled_board(rt: &Runtime, size: usize) -> ScoreBoard {
    let mut rng = rand::thread_rng();
    let board = ScoreBoard::new();
    rt.block_on(async {
        for _ in 0..size {
            let score: i64 = rng.gen_range(0..10_000);
            board.submit(ScoreSubmission::with_score(score)).await;
        }
    });
    board
}

fn bench_top_n(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("top_n");

    for size in [100usize, 10_000, 100_000] {
        let board = filled_board(&rt, size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &board, |b, board| {
            b.to_async(&rt).iter(|| async { black_box(board.top(DEFAULT_TOP_N).await) });
        });
    }

    group.finish();
}

fn bench_submit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let board = ScoreBoard::new();

    c.bench_function("submit", |b| {
        b.to_async(&rt).iter(|| async {
            board
                .submit(ScoreSubmission::with_score(42).named("bench").topic("math"))
                .await
        });
    });
}

criterion_group!(benches, bench_top_n, bench_submit);
criterion_main!(benches);
