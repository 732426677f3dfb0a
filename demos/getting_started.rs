//! Getting Started Example
//!
//! This example walks through the core index workflow: register polygon
//! features with attributes, run point searches against them, inspect the
//! decomposition statistics, and persist the index to disk.

use biotope::{AttributeValue, Attributes, IndexConfig, SpatialIndex};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("=== Biotope - Getting Started ===\n");

    // ========================================
    // 1. Build an in-memory index
    // ========================================
    println!("1. Building the index");
    println!("---------------------");

    let config = IndexConfig::new().with_min_cell_area(0.0001).with_max_depth(10);
    let mut index = SpatialIndex::memory_with_config(config)?;
    println!("   ✓ Created in-memory index\n");

    // A nature reserve with an irregular boundary...
    let mut reserve = Attributes::new();
    reserve.insert("name".to_string(), "Cypress Creek".into());
    reserve.insert("protected".to_string(), true.into());
    reserve.insert("iucn_category".to_string(), AttributeValue::Int(4));
    index.add_feature(
        "reserve_ccr",
        "POLYGON ((-89.35 37.55, -89.10 37.55, -89.10 37.70, -89.20 37.78, -89.35 37.70, -89.35 37.55))",
        reserve,
    )?;

    // ...inside a larger watershed boundary.
    let mut watershed = Attributes::new();
    watershed.insert("name".to_string(), "Big Muddy watershed".into());
    watershed.insert("protected".to_string(), false.into());
    index.add_feature(
        "watershed_bm",
        "POLYGON ((-89.60 37.40, -88.90 37.40, -88.90 37.90, -89.60 37.90, -89.60 37.40))",
        watershed,
    )?;

    let stats = index.stats();
    println!("   Features: {}", stats.feature_count);
    println!("   Cells: {}", stats.cell_count);
    println!("   Partial geometries: {}\n", stats.partial_geometry_count);

    // ========================================
    // 2. Point searches
    // ========================================
    println!("2. Searching");
    println!("------------");

    for (label, x, y) in [
        ("inside the reserve", -89.22, 37.62),
        ("watershed only", -89.50, 37.50),
        ("outside everything", -90.50, 38.50),
    ] {
        let hits = index.search(x, y);
        println!("   ({x:.2}, {y:.2}) {label}:");
        if hits.is_empty() {
            println!("     no features");
        }
        for (feature_id, attributes) in &hits {
            let name = attributes
                .get("name")
                .map(|v| v.to_string())
                .unwrap_or_default();
            println!("     {feature_id} -> {name}");
        }
    }
    println!();

    // ========================================
    // 3. Persistence
    // ========================================
    println!("3. Persistence");
    println!("--------------");

    let stem = std::env::temp_dir().join("biotope_getting_started");
    index.save_as(&stem)?;
    println!("   ✓ Saved artifacts at {}.*", stem.display());

    let reopened = SpatialIndex::open(&stem)?;
    let hits = reopened.search(-89.22, 37.62);
    println!(
        "   ✓ Reopened index answers {} feature(s) at the reserve probe",
        hits.len()
    );

    Ok(())
}
