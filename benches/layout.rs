use criterion::{black_box, criterion_group, criterion_main, Criterion};

use orthogram::diagram::diagram_from_str;
use orthogram::layout::{compute_layout, LayoutOptions};
use orthogram::render::render_svg;

fn mesh_definition() -> String {
    let mut yaml = String::from("rows:\n");
    for row in 0..5 {
        yaml.push_str("  - [");
        for col in 0..5 {
            if col > 0 {
                yaml.push_str(", ");
            }
            yaml.push_str(&format!("n{row}{col}"));
        }
        yaml.push_str("]\n");
    }
    yaml.push_str("connections:\n");
    for row in 0..5 {
        for col in 0..4 {
            yaml.push_str(&format!("  - start: n{row}{col}\n    end: n{row}{}\n", col + 1));
        }
    }
    for col in 0..5 {
        yaml.push_str(&format!("  - start: n0{col}\n    end: n4{col}\n"));
    }
    yaml
}

fn bench_pipeline(c: &mut Criterion) {
    let yaml = mesh_definition();
    let diagram = diagram_from_str(&yaml).expect("bench diagram");
    let options = LayoutOptions::default();

    c.bench_function("layout/mesh_5x5", |b| {
        b.iter(|| compute_layout(black_box(&diagram), &options).unwrap())
    });

    let layout = compute_layout(&diagram, &options).unwrap();
    c.bench_function("render/mesh_5x5", |b| {
        b.iter(|| render_svg(black_box(&diagram), black_box(&layout)))
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
