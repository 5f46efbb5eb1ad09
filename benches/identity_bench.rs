use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use solana_sdk::pubkey::Pubkey;
use swap_escrow::swap::derive_identity;
use swap_escrow::SwapItem;

fn items(n: usize) -> Vec<SwapItem> {
    (0..n)
        .map(|i| {
            let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
            if i % 2 == 0 {
                SwapItem::token(Pubkey::new_unique(), a, b, 1 + i as u64)
            } else {
                SwapItem::nft(Pubkey::new_unique(), b, a)
            }
        })
        .collect()
}

fn bench_derive_identity(c: &mut Criterion) {
    let program_id = Pubkey::new_unique();
    let mut group = c.benchmark_group("derive_identity");
    for n in [2usize, 8, 32] {
        let input = items(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &input, |b, input| {
            b.iter(|| derive_identity(black_box("0000"), black_box(input), &program_id))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_derive_identity);
criterion_main!(benches);
