//! Pipeline benchmark: request -> context -> per-dimension feature extraction, and fingerprinting.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use risk_scoring::features::{datetime, geo, ip, useragent, HistoryGeoResolver, IpIntel, ScoringContext};
use risk_scoring::fingerprint::fingerprint;
use risk_scoring::request::{AnalysisRequest, HistoryEntry, Location, LoginStatus, Session};

const UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15";

fn make_request(n: usize) -> AnalysisRequest {
    let now = 1_700_000_000_000i64;
    let cities = [
        ("United States", "New York", 40.7128, -74.006),
        ("United Kingdom", "London", 51.5074, -0.1278),
        ("Germany", "Berlin", 52.52, 13.405),
    ];
    AnalysisRequest {
        current_session: Session::new("203.0.113.9", UA, now),
        login_history: (0..n)
            .map(|i| {
                let (country, city, lat, lon) = cities[i % cities.len()];
                HistoryEntry {
                    ip: format!("203.0.113.{}", i % 200),
                    user_agent: UA.into(),
                    timestamp: now - (i as i64 + 1) * 7_200_000,
                    location: Location {
                        country: country.into(),
                        city: city.into(),
                        latitude: lat,
                        longitude: lon,
                    },
                    login_status: LoginStatus::Success,
                }
            })
            .collect(),
        user_id: "bench".into(),
    }
}

fn bench_feature_extraction(c: &mut Criterion) {
    let intel = IpIntel::default();
    let mut g = c.benchmark_group("feature_extract_all");
    for n in [0usize, 10, 100] {
        let req = make_request(n);
        g.bench_with_input(BenchmarkId::from_parameter(n), &req, |b, req| {
            b.iter(|| {
                let ctx = ScoringContext::new(black_box(req), &HistoryGeoResolver);
                black_box((
                    ip::extract(&ctx, &intel),
                    datetime::extract(&ctx),
                    useragent::extract(&ctx),
                    geo::extract(&ctx),
                ))
            })
        });
    }
    g.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let req = make_request(50);
    c.bench_function("fingerprint_50_history", |b| b.iter(|| fingerprint(black_box(&req))));
}

criterion_group!(benches, bench_feature_extraction, bench_fingerprint);
criterion_main!(benches);
