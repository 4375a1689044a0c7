//! Reader tests over synthetic GRIB1 and GRIB2 messages.

use bytes::Bytes;
use grib_parser::{
    DataKey, Field, GribError, GribReader, GridValues, KeyEntry, KeyValue, KeyedField,
    ParameterTables,
};
use test_utils::{assert_approx_eq, fixtures, require_test_file, Grib1Builder, Grib2Builder};

fn fields(data: Vec<u8>) -> Vec<Field> {
    let mut reader = GribReader::new(Bytes::from(data));
    let mut fields = Vec::new();
    while let Some(message) = reader.next_message().unwrap() {
        fields.extend(message.fields().unwrap());
    }
    fields
}

fn keyed_fields(data: Vec<u8>) -> Vec<KeyedField> {
    let tables = ParameterTables::builtin();
    fields(data).iter().map(|f| f.keys(&tables)).collect()
}

fn first_grid(data: Vec<u8>) -> GridValues {
    fields(data)[0].decode_values().expect("values decoded")
}

fn data_value(grid: &GridValues, key: DataKey) -> KeyValue {
    match key.resolve(grid, 9999.0) {
        KeyEntry::Value { value, .. } => value,
        other => panic!("{} did not resolve: {:?}", key.name(), other),
    }
}

fn text(field: &KeyedField, key: &str) -> String {
    match field.value(key) {
        Some(KeyValue::Str(s)) => s.clone(),
        other => panic!("{} is not text: {:?}", key, other),
    }
}

fn long(field: &KeyedField, key: &str) -> i64 {
    match field.value(key) {
        Some(KeyValue::Long(v)) => *v,
        other => panic!("{} is not a long: {:?}", key, other),
    }
}

#[test]
fn test_grib2_naming_and_level_keys() {
    let fields = keyed_fields(fixtures::temperature_2m());
    assert_eq!(fields.len(), 1);
    let field = &fields[0];

    assert_eq!(long(field, "editionNumber"), 2);
    assert_eq!(text(field, "centre"), "kwbc");
    assert_eq!(text(field, "shortName"), "t");
    assert_eq!(text(field, "name"), "Temperature");
    assert_eq!(text(field, "parameterName"), "Temperature");
    assert_eq!(text(field, "units"), "K");
    assert_eq!(text(field, "cfName"), "air_temperature");
    assert_eq!(text(field, "typeOfLevel"), "heightAboveGround");
    assert_eq!(long(field, "level"), 2);
    assert_eq!(text(field, "unitsOfFirstFixedSurface"), "m");
    assert_eq!(long(field, "dataDate"), 20240601);
    assert_eq!(long(field, "dataTime"), 0);
}

#[test]
fn test_grib2_isobaric_level_in_hpa() {
    let fields = keyed_fields(fixtures::relative_humidity_500());
    let field = &fields[0];

    assert_eq!(text(field, "shortName"), "r");
    assert_eq!(text(field, "typeOfLevel"), "isobaricInhPa");
    assert_eq!(long(field, "level"), 500);
    assert_eq!(text(field, "pressureUnits"), "hPa");
    assert_eq!(text(field, "unitsOfFirstFixedSurface"), "hPa");
}

#[test]
fn test_grib2_layer_levels() {
    let data = Grib2Builder::new_gfs().with_layer(106, 0, 10).build();
    let fields = keyed_fields(data);
    assert_eq!(text(&fields[0], "levels"), "0-10");
    assert_eq!(long(&fields[0], "level"), 0);
}

#[test]
fn test_grib2_values_and_statistics() {
    let data = Grib2Builder::new_gfs()
        .with_grid(3, 2)
        .with_data(vec![270.0, 275.0, 280.0, 285.0, 290.0, 295.0])
        .build();
    let keys = &keyed_fields(data.clone())[0];
    assert_eq!(keys.get("maximum"), Some(&KeyEntry::Data(DataKey::Maximum)));

    let grid = first_grid(data);
    assert_eq!(grid.rows().len(), 2);
    assert_eq!(grid.rows()[0].len(), 3);
    assert_approx_eq!(grid.values[0], 270.0, 0.01);
    assert_approx_eq!(grid.values[5], 295.0, 0.01);

    match data_value(&grid, DataKey::Maximum) {
        KeyValue::Double(max) => assert_approx_eq!(max, 295.0, 0.01),
        other => panic!("unexpected maximum {:?}", other),
    }
    assert_eq!(data_value(&grid, DataKey::NumberOfMissing), KeyValue::Long(0));
}

#[test]
fn test_grib2_bitmap_masks_points() {
    let data = Grib2Builder::new_gfs()
        .with_grid(2, 2)
        .with_data(vec![1.0, 2.0, 3.0, 4.0])
        .with_bitmap(vec![true, false, true, true])
        .build();
    let fields = keyed_fields(data.clone());
    let grid = first_grid(data);

    assert_approx_eq!(grid.values[0], 1.0, 0.001);
    assert_eq!(grid.values[1], 9999.0);
    assert_approx_eq!(grid.values[3], 4.0, 0.001);
    assert_eq!(data_value(&grid, DataKey::NumberOfMissing), KeyValue::Long(1));
    assert_eq!(long(&fields[0], "bitmapPresent"), 1);
}

#[test]
fn test_grib2_unknown_parameter() {
    let fields = keyed_fields(fixtures::unknown_parameter());
    let field = &fields[0];

    assert_eq!(text(field, "shortName"), "unknown");
    assert_eq!(text(field, "name"), "unknown");
    assert_eq!(text(field, "parameterName"), "250");
    assert!(field.get("units").is_none());
    assert!(field.get("cfName").is_none());
}

#[test]
fn test_grib2_ensemble_and_statistics_templates() {
    let ensemble = keyed_fields(Grib2Builder::new_gfs().with_ensemble(3, 4, 21).build());
    assert_eq!(long(&ensemble[0], "productDefinitionTemplateNumber"), 1);
    assert_eq!(long(&ensemble[0], "perturbationNumber"), 4);
    assert_eq!(long(&ensemble[0], "numberOfForecastsInEnsemble"), 21);

    let accumulated = keyed_fields(
        Grib2Builder::new_gfs()
            .with_parameter(1, 8)
            .with_level(1, 0)
            .with_forecast_hour(6)
            .with_statistics(1, 6)
            .build(),
    );
    let field = &accumulated[0];
    assert_eq!(long(field, "productDefinitionTemplateNumber"), 8);
    assert_eq!(text(field, "shortName"), "tp");
    assert_eq!(long(field, "typeOfStatisticalProcessing"), 1);
    assert_eq!(long(field, "lengthOfTimeRange"), 6);
    assert_eq!(long(field, "validityTime"), 1200);
}

#[test]
fn test_grib2_forecast_validity_time() {
    let fields = keyed_fields(
        Grib2Builder::new_gfs()
            .with_reference_time(2024, 6, 1, 18)
            .with_forecast_hour(12)
            .build(),
    );
    assert_eq!(long(&fields[0], "validityDate"), 20240602);
    assert_eq!(long(&fields[0], "validityTime"), 600);
}

#[test]
fn test_grib2_pv_array() {
    let fields = keyed_fields(Grib2Builder::new_gfs().with_pv(vec![0.0, 1.5, 3.0]).build());
    assert_eq!(long(&fields[0], "NV"), 3);
    assert_eq!(
        fields[0].value("pv"),
        Some(&KeyValue::DoubleArray(vec![0.0, 1.5, 3.0]))
    );
}

#[test]
fn test_constant_fields_of_any_packing() {
    for (template, packing) in [(2, "grid_complex"), (3, "grid_complex_spatial_differencing"), (40, "grid_jpeg")] {
        let data = Grib2Builder::new_gfs()
            .with_packing_template(template)
            .with_constant_value(250.5)
            .build();
        assert_eq!(text(&keyed_fields(data.clone())[0], "packingType"), packing);

        let grid = first_grid(data);
        assert_eq!(grid.values.len(), 12);
        assert!(grid.values.iter().all(|v| *v == 250.5), "{}", packing);
    }
}

#[test]
fn test_png_packed_values() {
    let data = Grib2Builder::new_gfs()
        .with_packing_template(41)
        .with_data((0..12).map(|i| 270.0 + i as f64 * 2.5).collect())
        .build();
    let keys = &keyed_fields(data.clone())[0];
    assert_eq!(text(keys, "packingType"), "grid_png");
    assert_eq!(long(keys, "bitsPerValue"), 16);

    let grid = first_grid(data);
    assert_eq!(grid.rows().len(), 3);
    for (i, value) in grid.values.iter().enumerate() {
        assert_approx_eq!(*value, 270.0 + i as f64 * 2.5, 0.01);
    }
}

#[test]
fn test_unknown_packing_keeps_metadata() {
    let data = Grib2Builder::new_gfs().with_packing_template(99).build();
    let field = &keyed_fields(data.clone())[0];

    assert_eq!(text(field, "packingType"), "unknown");
    assert_eq!(text(field, "shortName"), "t");
    assert!(matches!(
        fields(data)[0].decode_values(),
        Err(GribError::Unpacking(_))
    ));
}

#[test]
fn test_declared_points_beyond_data_rejected() {
    // Constant field: nothing in the message bounds the declared size
    let data = Grib2Builder::new_gfs().with_declared_points(u32::MAX).build();
    let field = &keyed_fields(data.clone())[0];
    assert_eq!(long(field, "numberOfDataPoints"), u32::MAX as i64);
    assert!(matches!(
        fields(data)[0].decode_values(),
        Err(GribError::Unpacking(_))
    ));

    // 16-bit packed data for 12 points cannot hold 13
    let data = Grib2Builder::new_gfs()
        .with_gradient(270.0, 300.0)
        .with_declared_points(13)
        .build();
    assert!(fields(data)[0].decode_values().is_err());
}

#[test]
fn test_coordinate_arrays_are_unsupported() {
    let fields = keyed_fields(fixtures::temperature_2m());
    for key in ["latitudes", "longitudes", "distinctLatitudes", "distinctLongitudes"] {
        assert!(matches!(fields[0].get(key), Some(KeyEntry::Unsupported(_))));
    }
}

#[test]
fn test_key_order_ends_with_marker() {
    let fields = keyed_fields(fixtures::temperature_2m());
    let names: Vec<&str> = fields[0].names().collect();

    assert_eq!(names.first(), Some(&"identifier"));
    assert_eq!(names.last(), Some(&"7777"));
    let edition = names.iter().position(|n| *n == "editionNumber").unwrap();
    let values = names.iter().position(|n| *n == "values").unwrap();
    assert!(edition < values);
}

#[test]
fn test_grib1_cape_keys() {
    let fields = keyed_fields(fixtures::cape_surface());
    let field = &fields[0];

    assert_eq!(long(field, "editionNumber"), 1);
    assert_eq!(text(field, "centre"), "kwbc");
    assert_eq!(text(field, "parameterName"), "157");
    assert_eq!(text(field, "shortName"), "cape");
    assert_eq!(text(field, "units"), "J kg**-1");
    assert!(field.get("cfName").is_none());
    assert_eq!(text(field, "typeOfLevel"), "surface");
    assert_eq!(long(field, "level"), 0);
    assert_eq!(long(field, "dataDate"), 20240601);

    let grid = first_grid(fixtures::cape_surface());
    assert_eq!((grid.ni, grid.nj), (3, 2));
    assert_approx_eq!(grid.values[4], 1000.0, 0.05);
}

#[test]
fn test_grib1_layer_and_isobaric_levels() {
    let layer = keyed_fields(Grib1Builder::new_cape().with_layer(106, 0, 30).build());
    assert_eq!(text(&layer[0], "typeOfLevel"), "heightAboveGroundLayer");
    assert_eq!(text(&layer[0], "levels"), "0-30");
    assert!(layer[0].get("level").is_none());

    let isobaric = keyed_fields(
        Grib1Builder::new_cape()
            .with_parameter(11)
            .with_level(100, 850)
            .build(),
    );
    assert_eq!(text(&isobaric[0], "shortName"), "t");
    assert_eq!(long(&isobaric[0], "level"), 850);
    assert_eq!(text(&isobaric[0], "pressureUnits"), "hPa");
}

#[test]
fn test_grib1_bitmap_and_negative_values() {
    let data = Grib1Builder::new_cape()
        .with_parameter(11)
        .with_grid(2, 2)
        .with_data(vec![-12.5, 0.0, 3.25, 7.0])
        .with_bitmap(vec![true, true, false, true])
        .build();
    let grid = first_grid(data);

    assert_approx_eq!(grid.values[0], -12.5, 0.01);
    assert_eq!(grid.values[2], 9999.0);
    assert_approx_eq!(grid.values[3], 7.0, 0.01);
}

#[test]
fn test_multi_field_message_splits() {
    let tables = ParameterTables::builtin();
    let mut reader = GribReader::new(Bytes::from(fixtures::multi_field_message()));
    let message = reader.next_message().unwrap().unwrap();

    assert_eq!(message.field_count().unwrap(), 2);
    let fields = message.fields().unwrap();
    let names: Vec<String> = fields
        .iter()
        .map(|f| text(&f.keys(&tables), "shortName"))
        .collect();
    assert_eq!(names, vec!["t", "r"]);
    assert!(reader.next_message().unwrap().is_none());
}

#[test]
fn test_three_message_file_from_path() {
    let dir = test_utils::temp_test_dir();
    let path = fixtures::three_message_file(dir.path());

    let reader = GribReader::from_path(&path).unwrap();
    let editions: Vec<u8> = reader.map(|m| m.unwrap().edition).collect();
    assert_eq!(editions, vec![2, 1, 2]);
}

#[test]
fn test_truncated_file_is_an_error() {
    let dir = test_utils::temp_test_dir();
    let path = fixtures::truncated_file(dir.path());

    let mut reader = GribReader::from_path(&path).unwrap();
    assert!(matches!(
        reader.next_message(),
        Err(GribError::Truncated { .. })
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let result = GribReader::from_path("/nonexistent/file.grib2".as_ref());
    assert!(matches!(result, Err(GribError::Io(_))));
}

#[test]
fn test_real_gfs_sample() {
    let path = require_test_file!("gfs_sample.grib2");
    let tables = ParameterTables::builtin();
    let mut reader = GribReader::from_path(&path).unwrap();
    let message = reader.next_message().unwrap().unwrap();
    let field = &message.fields().unwrap()[0];
    assert_eq!(field.edition(), 2);
    assert!(field.keys(&tables).get("shortName").is_some());
}
