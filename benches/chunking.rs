use criterion::{Criterion, criterion_group, criterion_main};
use mrm_rag::documents::{Document, DocumentMetadata};
use mrm_rag::embeddings::chunking::{EstimatedTokenCounter, chunk_documents};
use std::hint::black_box;

const PARAGRAPH: &str = "Model validation is the set of processes and activities intended to \
    verify that models are performing as expected, in line with their design objectives and \
    business uses. Effective validation helps ensure that models are sound, identifying \
    potential limitations and assumptions and assessing their possible impact.";

fn sample_documents() -> Vec<Document> {
    (0..20)
        .map(|page| Document {
            content: (0..12)
                .map(|i| format!("Section {}.{}\n\n{}", page, i, PARAGRAPH))
                .collect::<Vec<_>>()
                .join("\n\n"),
            metadata: DocumentMetadata {
                source: "sr11-7.pdf".to_string(),
                page,
                total_pages: 20,
            },
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let documents = sample_documents();
    let counter = EstimatedTokenCounter;

    c.bench_function("chunking", |b| {
        b.iter(|| chunk_documents(black_box(&documents), black_box(750), 0, &counter))
    });
    c.bench_function("chunking_small_overlap", |b| {
        b.iter(|| chunk_documents(black_box(&documents), black_box(200), 20, &counter))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
