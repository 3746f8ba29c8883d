//! Benchmarks for record extraction and projection.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use siteharvest::driver::{HtmlPageDriver, StaticFetcher};
use siteharvest::extract::RecordExtractor;
use siteharvest::projection::project;
use siteharvest::testing::{company_schema, listing_page, CompanyCard};

fn listing(cards: usize) -> String {
    let cards: Vec<_> = (0..cards)
        .map(|i| {
            CompanyCard::new(format!("Company {i}"))
                .with_email(format!("info@company{i}.com"))
                .with_address(format!("{i} Main Street"))
        })
        .collect();
    listing_page(&cards, Some("/page/2"))
}

fn extraction_benchmark(c: &mut Criterion) {
    let extractor = RecordExtractor::new(company_schema());

    let mut group = c.benchmark_group("extract_cards");
    for cards in [100, 400, 1600] {
        let driver = HtmlPageDriver::new(StaticFetcher::new());
        driver.load_html("https://bench.test/", listing(cards));
        group.bench_with_input(BenchmarkId::from_parameter(cards), &driver, |b, driver| {
            b.iter(|| {
                let records = tokio_test::block_on(extractor.extract(driver)).unwrap();
                black_box(records)
            })
        });
    }
    group.finish();

    let driver = HtmlPageDriver::new(StaticFetcher::new());
    driver.load_html("https://bench.test/", listing(100));
    let records = tokio_test::block_on(extractor.extract(&driver)).unwrap();
    let columns = ["company_name", "address", "email", "website", "phone"];
    c.bench_function("project_100_records", |b| {
        b.iter(|| black_box(project(&records, &columns)))
    });
}

criterion_group!(benches, extraction_benchmark);
criterion_main!(benches);
