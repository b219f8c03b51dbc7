//! Benchmarks for graph traversal and pixel pulls
//!
//! Run with: cargo bench

use chromagraph::conversion::Conversion;
use chromagraph::geometry::{NormalizedRect, PixelRect};
use chromagraph::image::{Array2d, DataType, Image, PixelLayout};
use chromagraph::pipeline::nodes::{OutputNode, PassthroughNode, RootNode};
use chromagraph::pipeline::{FilterGraph, NodeId, PixelAccessTicket, Session, TraversalMask};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

fn gradient(width: usize, height: usize) -> Arc<Image> {
    let samples = (0..width * height * 3).map(|v| v as f32).collect();
    let pixels = Array2d::from_samples(DataType::Float, width * 3, height, samples)
        .expect("sample count matches");
    Arc::new(
        Image::new(width, height, PixelLayout::new(3, DataType::Float), "sRGB")
            .with_pixels(pixels)
            .expect("pixels match layout"),
    )
}

/// Root, `len` passthrough filters, output.
fn build_chain(len: usize, image: Arc<Image>) -> (Session, NodeId, NodeId) {
    let mut session = Session::new();
    let root = RootNode::attach(&mut session, image).expect("attach root");
    let mut last = root;
    for _ in 0..len {
        let next = session
            .create_node(Arc::new(PassthroughNode::new()))
            .expect("create filter");
        session.connect(last, None, next, None).expect("link filter");
        last = next;
    }
    let out = session
        .create_node(Arc::new(OutputNode))
        .expect("create output");
    session.connect(last, None, out, None).expect("link output");
    (session, root, out)
}

fn bench_graph_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_snapshot");

    for len in [8, 64, 256].iter() {
        let (session, root, out) = build_chain(*len, gradient(4, 4));
        group.throughput(Throughput::Elements(*len as u64 + 2));

        group.bench_with_input(BenchmarkId::new("downstream", len), len, |b, _| {
            b.iter(|| {
                let graph =
                    FilterGraph::from_node(&session, root, TraversalMask::DOWNSTREAM, None)
                        .expect("snapshot");
                black_box(graph.nodes().len())
            })
        });

        group.bench_with_input(BenchmarkId::new("both", len), len, |b, _| {
            b.iter(|| {
                let graph = FilterGraph::from_node(&session, out, TraversalMask::BOTH, None)
                    .expect("snapshot");
                black_box(graph.edges().len())
            })
        });
    }

    group.finish();
}

fn bench_pull(c: &mut Criterion) {
    let mut group = c.benchmark_group("pull");

    for size in [64, 256, 1024].iter() {
        let (mut session, root, out) = build_chain(4, gradient(*size, *size));
        let mut conversion = Conversion::new(root, out);
        group.throughput(Throughput::Elements((*size * *size) as u64));

        group.bench_with_input(BenchmarkId::new("full_image", size), size, |b, _| {
            b.iter(|| {
                let mut ticket = conversion
                    .create_ticket(&mut session)
                    .expect("ticket");
                conversion
                    .run_pixels(&mut session, Some(&mut ticket))
                    .expect("pull");
                black_box(ticket.array().map(|a| a.width()))
            })
        });
    }

    group.finish();
}

fn bench_roi_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("roi_conversion");
    let mut ticket = PixelAccessTicket::detached(Some(gradient(1920, 1080)));
    ticket.set_array(Some(Array2d::new(DataType::Float, 1920 * 3, 1080)), false);

    group.bench_function("roi_to_pixels", |b| {
        let roi = NormalizedRect::new(0.1, 0.05, 0.5, 0.25);
        b.iter(|| black_box(ticket.roi_to_pixels(Some(&roi))))
    });

    group.bench_function("pixels_to_roi", |b| {
        let rect = PixelRect::new(192, 108, 960, 540);
        b.iter(|| black_box(ticket.pixels_to_roi(Some(&rect))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_graph_snapshot,
    bench_pull,
    bench_roi_conversion
);
criterion_main!(benches);
