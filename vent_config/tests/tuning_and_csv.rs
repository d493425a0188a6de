use vent_config::{FanTuning, PersistedTuning, load_curve_csv, load_toml, load_tuning, save_tuning};

#[test]
fn tuning_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tuning.toml");

    let tuning = PersistedTuning {
        fans: vec![FanTuning {
            name: "kitchen".to_owned(),
            dial_map: vec![(0, 0), (5, 2_000), (8, 3_030)],
            remote_map: vec![(0, 0), (4, 3_030)],
        }],
    };
    save_tuning(&path, &tuning).unwrap();

    let loaded = load_tuning(&path).unwrap();
    assert_eq!(loaded.fans.len(), 1);
    assert_eq!(loaded.fans[0].name, "kitchen");
    assert_eq!(loaded.fans[0].dial_map, tuning.fans[0].dial_map);
    assert_eq!(loaded.fans[0].remote_map, tuning.fans[0].remote_map);
}

#[test]
fn tuning_overlays_matching_fans_only() {
    let mut cfg = load_toml(
        r#"
[[fans]]
name = "kitchen"
[fans.dial]
level_map = [[0, 0], [8, 3030]]
[[fans]]
name = "bathroom"
"#,
    )
    .unwrap();

    cfg.apply_tuning(&PersistedTuning {
        fans: vec![
            FanTuning {
                name: "kitchen".to_owned(),
                dial_map: vec![(0, 0), (8, 2_500)],
                remote_map: vec![],
            },
            FanTuning {
                name: "attic".to_owned(), // no such fan; ignored
                dial_map: vec![(0, 0), (1, 1)],
                remote_map: vec![],
            },
        ],
    });

    let dial = cfg.fans[0].dial.as_ref().unwrap();
    assert_eq!(dial.level_map, vec![(0, 0), (8, 2_500)]);
    // Untouched fan keeps its config.
    assert!(cfg.fans[1].dial.is_some());
}

#[test]
fn missing_tuning_is_simply_absent() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_tuning(&dir.path().join("nope.toml")).is_none());
    let garbled = dir.path().join("garbled.toml");
    std::fs::write(&garbled, "[[[").unwrap();
    assert!(load_tuning(&garbled).is_none());
}

#[test]
fn curve_csv_loads_sorted_points() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sweep.csv");
    std::fs::write(&path, "rpm,pwm\n3030,64800\n310,6200\n1500,30000\n").unwrap();
    let points = load_curve_csv(&path).unwrap();
    assert_eq!(points, vec![(310, 6_200), (1_500, 30_000), (3_030, 64_800)]);
}

#[test]
fn curve_csv_enforces_headers_and_shape() {
    let dir = tempfile::tempdir().unwrap();

    let wrong_headers = dir.path().join("h.csv");
    std::fs::write(&wrong_headers, "speed,duty\n1,2\n3,4\n").unwrap();
    let err = load_curve_csv(&wrong_headers).unwrap_err();
    assert!(err.to_string().contains("rpm,pwm"), "{err}");

    let too_short = dir.path().join("s.csv");
    std::fs::write(&too_short, "rpm,pwm\n100,200\n").unwrap();
    assert!(load_curve_csv(&too_short).is_err());

    let duplicate = dir.path().join("d.csv");
    std::fs::write(&duplicate, "rpm,pwm\n100,200\n100,300\n").unwrap();
    assert!(load_curve_csv(&duplicate).is_err());

    let out_of_range = dir.path().join("r.csv");
    std::fs::write(&out_of_range, "rpm,pwm\n100,200\n500,70000\n").unwrap();
    assert!(load_curve_csv(&out_of_range).is_err());
}
