//! Occurrence Cleaning Example
//!
//! This example runs a batch of raw species observations through a
//! JSON-configured wrangler pipeline, prints the per-wrangler reports, and
//! finishes by intersecting the survivors with an index of survey regions.

use biotope::wrangle::WranglerPipeline;
use biotope::{Attributes, Occurrence, SpatialIndex};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("=== Biotope - Occurrence Cleaning ===\n");

    // ========================================
    // 1. Raw observations
    // ========================================
    println!("1. Raw observations");
    println!("-------------------");

    let raw = vec![
        Occurrence::new("Quercus alba", -89.612, 37.817)?,
        Occurrence::new("Quercus alba", -89.612, 37.817)?, // duplicate locality
        Occurrence::new("quercus alba", -89.6, 37.8)?,     // imprecise coordinates
        Occurrence::new("Quercus alba", 4.912, 52.373)?,   // out of range
        Occurrence::new("Carya ovata", -89.514, 37.622)?,
        Occurrence::new("Carya ovata", -89.401, 37.733)?,
    ];
    println!("   {} records\n", raw.len());

    // ========================================
    // 2. Configure and run the pipeline
    // ========================================
    println!("2. Wrangling");
    println!("------------");

    let pipeline_json = r#"[
        {"wrangler_type": "bbox_filter",
         "min_x": -120.0, "min_y": 20.0, "max_x": -60.0, "max_y": 55.0},
        {"wrangler_type": "decimal_precision_filter", "decimal_precision": 2},
        {"wrangler_type": "unique_localities_filter"}
    ]"#;
    let mut pipeline = WranglerPipeline::from_json(pipeline_json)?;

    let cleaned = pipeline.wrangle(raw);
    for report in pipeline.reports() {
        println!(
            "   {} v{}: assessed {}, modified {}, filtered {}",
            report.name, report.version, report.assessed, report.modified, report.filtered
        );
    }
    println!("   ✓ {} records survive\n", cleaned.len());

    // ========================================
    // 3. Intersect survivors with survey regions
    // ========================================
    println!("3. Region lookup");
    println!("----------------");

    let mut index = SpatialIndex::memory();
    let mut region = Attributes::new();
    region.insert("region".to_string(), "Shawnee survey block".into());
    index.add_feature(
        "block_7",
        "POLYGON ((-90.0 37.5, -89.0 37.5, -89.0 38.0, -90.0 38.0, -90.0 37.5))",
        region,
    )?;

    for record in &cleaned {
        let hits = index.search(record.x(), record.y());
        let regions: Vec<String> = hits
            .values()
            .filter_map(|attributes| attributes.get("region").map(|v| v.to_string()))
            .collect();
        println!(
            "   {} ({:.3}, {:.3}) -> {}",
            record.species_name(),
            record.x(),
            record.y(),
            if regions.is_empty() {
                "no survey block".to_string()
            } else {
                regions.join(", ")
            }
        );
    }

    Ok(())
}
