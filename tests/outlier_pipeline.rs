//! Integration tests for the outlier detection pipeline.

use entity_outliers::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Two entity groups with distinct type profiles and value scales:
/// 12 "City" entities around 10,000 and 12 "Country" entities in the tens
/// of millions. Entity 11 is a city with an absurd value that is ordinary
/// on the global scale but anomalous within its own cluster.
fn two_scale_dataset() -> (AttributeTable, TypeTable) {
    let city_values = [
        10_000.0, 12_000.0, 11_000.0, 9_000.0, 13_000.0, 10_500.0, 11_500.0, 9_500.0, 12_500.0,
        10_000.0, 11_000.0, 5_000_000.0,
    ];
    let country_values = [
        30e6, 45e6, 52e6, 38e6, 61e6, 70e6, 44e6, 56e6, 49e6, 65e6, 33e6, 80e6,
    ];

    let mut ids = Vec::new();
    let mut values = Vec::new();
    let mut types = TypeTable::new();

    for (i, &v) in city_values.iter().enumerate() {
        let id = format!("city_{}", i);
        types.insert(&id, vec!["City".to_string()]);
        ids.push(id);
        values.push(v);
    }
    for (i, &v) in country_values.iter().enumerate() {
        let id = format!("country_{}", i);
        types.insert(&id, vec!["Country".to_string()]);
        ids.push(id);
        values.push(v);
    }

    (AttributeTable::new(ids, values).unwrap(), types)
}

#[test]
fn test_end_to_end_intersection_on_small_dataset() {
    let ids = (0..6).map(|i| format!("e{}", i)).collect();
    let table = AttributeTable::new(ids, vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap();

    let report = Pipeline::new()
        .name("small")
        .iqr(IqrParams {
            upper: 75.0,
            lower: 25.0,
            factor: 1.5,
        })
        .mad(MadParams::default())
        .run(&table, None)
        .unwrap();

    // Range-based detection flags exactly index 5; the intersection with
    // deviation-based detection is {5}.
    assert_eq!(report.detectors[0].indices, vec![5]);
    assert!(report.detectors[1].indices.contains(&5));
    assert_eq!(report.combined.unwrap().indices, vec![5]);
}

#[test]
fn test_cluster_conditioning_reveals_within_cluster_outlier() {
    let (table, types) = two_scale_dataset();
    let extraction = extract_features(table.entity_ids(), &types, 0.05).unwrap();
    assert_eq!(extraction.matrix.n_features(), 2);

    // Globally the deviant city value sits inside the country range and is
    // invisible to range-based detection.
    let global = detect_iqr(table.values(), &IqrParams::default());
    assert!(!global.contains(&11));

    let report = Pipeline::new()
        .name("two-scale")
        .iqr(IqrParams::default())
        .mad(MadParams::default())
        .cluster(SelectionConfig {
            max_components: 4,
            ..SelectionConfig::default()
        })
        .run(&table, Some(&extraction.matrix))
        .unwrap();

    let clustering = report.clustering.as_ref().unwrap();
    assert_eq!(clustering.n_clusters, 2);
    assert_eq!(clustering.sizes.iter().sum::<usize>(), 24);

    // Conditioned on the type clusters, every detector isolates the city.
    for detector in &report.detectors {
        assert!(
            detector.indices.contains(&11),
            "{} missed the within-cluster outlier",
            detector.detector
        );
    }
    let combined = report.combined.unwrap();
    assert!(combined.indices.contains(&11));
    assert!(combined.entity_ids.contains(&"city_11".to_string()));
}

#[test]
fn test_pipeline_from_yaml_config() {
    let yaml = r#"
name: population-scan
detectors:
  - method: iqr
    upper: 75.0
    lower: 25.0
    factor: 1.5
  - method: kde
    bandwidth: null
    threshold: 1.0
clustering: null
combine: true
"#;
    let config = PipelineConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.name, "population-scan");

    let ids = (0..6).map(|i| format!("e{}", i)).collect();
    let table = AttributeTable::new(ids, vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap();
    let report = Pipeline::from_config(&config).run(&table, None).unwrap();

    assert_eq!(report.detectors.len(), 2);
    assert!(report.detectors[0].indices.contains(&5));
    assert!(report.combined.is_some());
}

#[test]
fn test_tsv_inputs_flow_through_pipeline() {
    let mut data = NamedTempFile::new().unwrap();
    writeln!(data, "entity_id\tvalue").unwrap();
    for (i, v) in [120.0, 130.0, 110.0, 125.0, 115.0, 9000.0].iter().enumerate() {
        writeln!(data, "region_{}\t{}", i, v).unwrap();
    }
    writeln!(data, "region_bad\tnot-a-number").unwrap();
    data.flush().unwrap();

    let (table, failures) = AttributeTable::from_tsv(data.path()).unwrap();
    assert_eq!(table.n_entities(), 6);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].entity_id, "region_bad");

    let report = Pipeline::new()
        .iqr(IqrParams::default())
        .run(&table, None)
        .unwrap();
    assert_eq!(report.combined.unwrap().entity_ids, vec!["region_5"]);
}

#[test]
fn test_single_cluster_labels_match_global_for_all_methods() {
    let values = [5.0, 6.0, 5.5, 6.5, 7.0, 5.2, 6.8, 400.0, 5.9, 6.1];
    let labels = vec![0usize; values.len()];

    assert_eq!(
        detect_iqr(&values, &IqrParams::default()),
        detect_iqr_by_cluster(&values, &labels, &IqrParams::default()).unwrap()
    );
    assert_eq!(
        detect_mad(&values, &MadParams::default()),
        detect_mad_by_cluster(&values, &labels, &MadParams::default()).unwrap()
    );
    assert_eq!(
        detect_kde(&values, &KdeParams::default()),
        detect_kde_by_cluster(&values, &labels, &KdeParams::default()).unwrap()
    );
}

#[test]
fn test_index_space_survives_lookup_failures() {
    struct FlakyLookup(TypeTable);

    impl TypeLookup for FlakyLookup {
        fn types_for(&self, entity_id: &str) -> entity_outliers::error::Result<Vec<String>> {
            if entity_id.ends_with('3') {
                Err(OutlierError::Lookup {
                    entity: entity_id.to_string(),
                    reason: "timeout".to_string(),
                })
            } else {
                self.0.types_for(entity_id)
            }
        }
    }

    let (table, types) = two_scale_dataset();
    let lookup = FlakyLookup(types);
    let extraction = extract_features(table.entity_ids(), &lookup, 0.05).unwrap();

    // city_3 and country_3 fail, but every entity keeps its row.
    assert_eq!(extraction.failures.len(), 2);
    assert_eq!(extraction.matrix.n_entities(), table.n_entities());
}
