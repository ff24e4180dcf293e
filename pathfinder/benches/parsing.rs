use divan::{Bencher, black_box};
use pathfinder::{ParseContext, ParseOptions, RawBody, TrustPolicy, normalize};

fn main() {
    divan::main();
}

const BASE_URL: &str = "https://grafana.com/docs/grafana/latest/";

const PLAIN_DOC: &str = include_str!("../tests/roundtrip-cases/plain-doc.html");
const INTERACTIVE: &str = include_str!("../tests/roundtrip-cases/interactive-section.html");
const MULTISTEP: &str = include_str!("../tests/roundtrip-cases/multistep.html");

/// A long page built from the fixtures, repeated.
fn large_page() -> String {
    [PLAIN_DOC, INTERACTIVE, MULTISTEP].concat().repeat(50)
}

fn markdown_guide() -> String {
    let block = serde_json::json!({
        "type": "markdown",
        "content": "## Step\n\nRun `docker ps` then **check** the [docs](https://grafana.com/docs/).\n\n- one\n- two\n\n```bash\necho hi\n```",
    });
    serde_json::json!({
        "id": "bench",
        "title": "Bench",
        "blocks": vec![block; 100],
    })
    .to_string()
}

#[divan::bench(args = [PLAIN_DOC, INTERACTIVE, MULTISTEP])]
fn parse_html_fixture(bencher: Bencher, html: &str) {
    let policy = TrustPolicy::default();
    let options = ParseOptions::new(&policy).with_base_url(BASE_URL);
    bencher.bench_local(|| {
        let mut ctx = ParseContext::new();
        black_box(pathfinder::parse_html(black_box(html), &options, &mut ctx));
    });
}

#[divan::bench]
fn parse_html_large(bencher: Bencher) {
    let html = large_page();
    let policy = TrustPolicy::default();
    let options = ParseOptions::new(&policy).with_base_url(BASE_URL);
    bencher.bench_local(|| {
        let mut ctx = ParseContext::new();
        black_box(pathfinder::parse_html(black_box(&html), &options, &mut ctx));
    });
}

#[divan::bench]
fn parse_json_markdown(bencher: Bencher) {
    let guide = markdown_guide();
    let policy = TrustPolicy::default();
    let options = ParseOptions::new(&policy).with_base_url(BASE_URL);
    bencher.bench_local(|| {
        let mut ctx = ParseContext::new();
        black_box(pathfinder::parse_json_guide(black_box(&guide), &options, &mut ctx));
    });
}

// Normalize + parse, the path every fetched page takes
#[divan::bench]
fn full_pipeline_large(bencher: Bencher) {
    let html = large_page();
    let policy = TrustPolicy::default();
    let options = ParseOptions::new(&policy).with_base_url(BASE_URL);
    bencher.bench_local(|| {
        let normalized = normalize(RawBody::Html(html.clone()), BASE_URL, "Bench");
        let mut ctx = ParseContext::new();
        black_box(pathfinder::parse_json_guide(
            normalized.guide.as_str(),
            &options,
            &mut ctx,
        ));
    });
}
