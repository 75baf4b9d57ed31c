//! Benchmark for cadstore archive I/O using a synthetic model.
//!
//! Builds layers, dimension styles, geometry and history records, then
//! writes the model at the current and the oldest archive version and
//! reads both back.

use std::time::Instant;

use cadstore::manifest::system::default_dimension_style_id;
use cadstore::{
    ArchiveVersion, Color, Component, ComponentType, DimensionStyle, HistoryRecord, Id, Layer,
    ModelGeometry, ReadOptions, Registry, WriteOptions,
};

const LAYER_COUNT: usize = 200;
const STYLE_COUNT: usize = 20;
const GEOMETRY_BYTES: usize = 96;

fn fresh_id() -> Id {
    *uuid::Uuid::now_v7().as_bytes()
}

// =============================================================================
// SYNTHETIC MODEL
// =============================================================================

fn build_model(geometry_count: usize) -> Registry {
    let mut model = Registry::new();

    // Ten root layers, the rest nested one level below them
    let mut layers = Vec::with_capacity(LAYER_COUNT);
    for i in 0..LAYER_COUNT {
        let mut component = Component::new(Layer {
            color: Color((i as u32).wrapping_mul(0x0001_0307)),
            plot_weight: 0.1 * (i % 7) as f64,
            ..Layer::default()
        })
        .with_id(fresh_id())
        .with_name(format!("Layer {:03}", i % 50));
        if i >= 10 {
            component = component.with_parent(layers[i % 10]);
        }
        let layer = model.add(component, true).expect("Failed to add layer");
        layers.push(layer.id().expect("layer handle is empty"));
    }

    for i in 0..STYLE_COUNT {
        let style = DimensionStyle {
            text_height: 2.5 + i as f64 * 0.25,
            ..DimensionStyle::default()
        };
        model
            .add(
                Component::new(style)
                    .with_id(fresh_id())
                    .with_name(format!("Style {i}"))
                    .with_parent(default_dimension_style_id()),
                true,
            )
            .expect("Failed to add dimension style");
    }

    let mut previous: Option<Id> = None;
    for i in 0..geometry_count {
        let geometry = ModelGeometry {
            layer_id: layers[i % layers.len()],
            geometry_kind: (i % 4) as u32,
            geometry: (0..GEOMETRY_BYTES).map(|b| (i + b) as u8).collect(),
            display_order: i as i32,
            ..ModelGeometry::default()
        };
        let id = fresh_id();
        model
            .add(Component::new(geometry).with_id(id), true)
            .expect("Failed to add geometry");

        // One history record per hundred objects
        if i % 100 == 0 {
            let record = HistoryRecord {
                command_id: fresh_id(),
                antecedents: previous.into_iter().collect(),
                descendants: vec![id],
            };
            model
                .add(Component::new(record).with_id(fresh_id()), true)
                .expect("Failed to add history record");
        }
        previous = Some(id);
    }

    model
}

fn run(model: &Registry, version: ArchiveVersion) {
    let write_start = Instant::now();
    let bytes = model
        .to_bytes(&WriteOptions::target(version).with_application("bench-model"))
        .expect("Failed to write archive");
    let write_time = write_start.elapsed();

    println!(
        "\n{:?}: {} bytes written in {:?}",
        version,
        bytes.len(),
        write_time
    );
    println!(
        "  Throughput: {:.2} MB/s",
        (bytes.len() as f64 / 1_000_000.0) / write_time.as_secs_f64()
    );

    let read_start = Instant::now();
    let (loaded, report) =
        Registry::from_bytes(&bytes, &ReadOptions::default()).expect("Failed to read archive");
    let read_time = read_start.elapsed();

    println!(
        "  Read {} components in {:?} ({:.2} MB/s)",
        report.loaded,
        read_time,
        (bytes.len() as f64 / 1_000_000.0) / read_time.as_secs_f64()
    );
    println!(
        "  {} warnings, {} errors, {} unresolved references",
        report.warning_count, report.error_count, report.unresolved_references
    );
    assert!(report.is_success(), "archive failed to load: {report:?}");
    assert_eq!(
        loaded.count(ComponentType::ModelGeometry),
        model.count(ComponentType::ModelGeometry)
    );
}

fn main() {
    let geometry_count = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<usize>().ok())
        .unwrap_or(100_000);

    let build_start = Instant::now();
    let model = build_model(geometry_count);
    let build_time = build_start.elapsed();

    println!(
        "Built model in {:?}: {} layers, {} styles, {} objects, {} history records",
        build_time,
        model.count(ComponentType::Layer),
        model.count(ComponentType::DimensionStyle),
        model.count(ComponentType::ModelGeometry),
        model.count(ComponentType::HistoryRecord)
    );
    println!(
        "  {} names disambiguated",
        model.manifest_map().len()
    );

    run(&model, ArchiveVersion::CURRENT);
    run(&model, ArchiveVersion::V4);
}
