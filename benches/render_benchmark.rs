//! Benchmarks for template rendering and emission.
//!
//! Run with: cargo bench
//!
//! The workload is a synthetic inspection report with a growing number of
//! pressure vessels.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use rendoc::engine::Engine;
use rendoc::{Section, TableTemplate, Template};

/// Creates a record with the given number of vessels.
fn create_record(vessels: usize) -> Value {
    let serbatoi: Vec<Value> = (0..vessels)
        .map(|i| {
            json!({
                "tipo": "serbatoio",
                "codice": format!("S{}", i + 1),
                "ps_pressione_max": 8 + (i % 12),
                "volume": 50 + i * 25,
            })
        })
        .collect();
    json!({
        "cliente": {"ragione_sociale": "Officine Rossi", "indirizzo": {"via": "Via Roma 1", "citta": "Milano"}},
        "data": "2026-03-14",
        "serbatoi": serbatoi,
    })
}

fn create_template() -> Template {
    Template::new(vec![
        Section::paragraph(
            "intestazione",
            "<h1>Verbale di verifica</h1><p class=\"ql-align-center\"><b>{{uppercase cliente.ragione_sociale}}</b><br>{{formatIndirizzo cliente.indirizzo}}</p><p>Data: {{formatDate data}}</p>",
        ),
        Section::paragraph(
            "esito",
            "{{#each serbatoi}}<p>Serbatoio <b>{{codice}}</b>: PS×V = {{psXvolume ps_pressione_max volume}} <i>({{tipoVerifica this}})</i></p>{{/each}}{{pageBreak}}",
        )
        .with_title("Esito"),
        Section::table(
            "riepilogo",
            TableTemplate::new(
                vec!["Codice".into(), "PS".into(), "Volume".into(), "Esito".into()],
                "{{#each serbatoi}}{{codice}}\t{{ps_pressione_max}}\t{{volume}}\t{{tipoVerifica this}}\n{{/each}}",
            ),
        )
        .with_title("Riepilogo"),
    ])
}

/// Benchmark template compilation.
fn bench_compile(c: &mut Criterion) {
    let engine = Engine::new();
    let template = create_template();
    let Some(rendoc::SectionTemplate::Text(source)) = template.sections.get(1).map(|s| &s.template)
    else {
        return;
    };

    c.bench_function("compile_section", |b| {
        b.iter(|| engine.compile(black_box(source)).unwrap());
    });
}

/// Benchmark full renders at various sizes.
fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let template = create_template();

    for vessels in [1, 10, 100].iter() {
        let record = create_record(*vessels);
        group.bench_function(format!("{}_vessels", vessels), |b| {
            b.iter(|| rendoc::render(black_box(&template), black_box(&record)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark the two document encodings.
fn bench_emit(c: &mut Criterion) {
    let rendered = rendoc::render(&create_template(), &create_record(50)).unwrap();

    c.bench_function("emit_docx", |b| {
        b.iter(|| black_box(&rendered).to_structured_document_bytes().unwrap());
    });

    c.bench_function("emit_fixed_layout_markup", |b| {
        b.iter(|| black_box(&rendered).to_fixed_layout_markup().unwrap());
    });
}

/// Benchmark batch rendering.
fn bench_batch(c: &mut Criterion) {
    let template = create_template();
    let records: Vec<Value> = (0..32).map(|_| create_record(10)).collect();

    c.bench_function("batch_32_records", |b| {
        b.iter(|| rendoc::render_batch(black_box(&template), black_box(&records)));
    });
}

criterion_group!(benches, bench_compile, bench_render, bench_emit, bench_batch);
criterion_main!(benches);
