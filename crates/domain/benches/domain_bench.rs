use chrono::{Duration, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Money, refund_amount, validation};

fn bench_refund_policy(c: &mut Criterion) {
    let now = Utc::now();
    let total = Money::from_cents(100_000);

    c.bench_function("domain/refund_amount", |b| {
        b.iter(|| {
            for hours in [200, 100, 48, 10] {
                let start = now + Duration::hours(hours);
                std::hint::black_box(refund_amount(total, start, now));
            }
        });
    });
}

fn bench_validators(c: &mut Criterion) {
    let title = "Wheel Throwing for Beginners";
    let description = "An introduction to throwing clay on the wheel, \
                       covering centering, pulling, and trimming.";

    c.bench_function("domain/validate_fields", |b| {
        b.iter(|| {
            std::hint::black_box(validation::validate_title(title)).ok();
            std::hint::black_box(validation::validate_description(description)).ok();
            std::hint::black_box(validation::validate_price(Money::from_units(120))).ok();
            std::hint::black_box(validation::validate_capacity(12)).ok();
        });
    });
}

criterion_group!(benches, bench_refund_policy, bench_validators);
criterion_main!(benches);
