use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pilates_booking::models::credit::raw_balance;
use pilates_booking::models::Credit;
use uuid::Uuid;

fn benchmark_raw_balance(c: &mut Criterion) {
    let now = Utc::now();
    let user = Uuid::new_v4();

    // A long-standing member: monthly packs of 8 plus one debit per class.
    let mut entries = Vec::new();
    for month in 0..36 {
        let granted = now - Duration::days(30 * (36 - month));
        entries.push(Credit::new(
            user,
            8,
            Some(granted + Duration::days(30)),
            granted,
        ));
        for class in 0..8 {
            entries.push(Credit::new(
                user,
                -1,
                None,
                granted + Duration::days(class * 3),
            ));
        }
    }

    let mut group = c.benchmark_group("ledger");

    group.bench_function("raw_balance_three_years", |b| {
        b.iter(|| raw_balance(black_box(&entries), black_box(now)))
    });

    group.bench_function("raw_balance_at_past_instant", |b| {
        let as_of = now - Duration::days(400);
        b.iter(|| raw_balance(black_box(&entries), black_box(as_of)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_raw_balance);
criterion_main!(benches);
