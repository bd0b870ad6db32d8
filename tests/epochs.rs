use pretty_assertions::assert_eq;
use tankdecode::{read_block, EpochValue, Options, TaggedNote, TankReader, Warning};
use tankdecode_test_support::TankBuilder;

use shared::{at, setup_tracing};

#[test]
fn onsets_and_offsets_pair_up() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 0.0, 1.0)
        .onset("Cue1", 1.0, 5.0)
        .offset("Cue/", "Cue1", 1.5)
        .onset("Tick", 2.0, 2.0)
        .onset("Cue1", 3.0, 6.0)
        .offset("Cue/", "Cue1", 3.5);
    let decoded = read_block(tank.write()).unwrap();
    assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);

    let epochs = &decoded.dataset.epochs;
    assert_eq!(
        epochs.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Cue1", "Tick"]
    );
    let cue = &epochs["Cue1"];
    assert_eq!(cue.onsets, vec![at(1.0), at(3.0)]);
    assert_eq!(cue.offsets, vec![at(1.5), at(3.5)]);
    assert_eq!(
        cue.values,
        vec![EpochValue::Number(5.0), EpochValue::Number(6.0)]
    );

    let tick = &epochs["Tick"];
    assert_eq!(tick.onsets, vec![0.0, at(2.0)]);
    assert_eq!(tick.offsets, vec![at(2.0), f64::INFINITY]);
}

#[test]
fn block_info_from_the_index() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 3.5, 1.0);
    let decoded = read_block(tank.write()).unwrap();

    let info = &decoded.dataset.info;
    assert_eq!(info.block_name, "Block-1");
    assert!(info.tank_path.ends_with("Tank"));
    let start = info.start_date.unwrap();
    assert_eq!(start.timestamp(), 1_600_000_000);
    // the stop marker is written one second after the last record
    assert_eq!(info.duration.unwrap().num_milliseconds(), 4500);
}

#[test]
fn offsets_without_onset_store() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.offset("Off/", "Onst", 2.0);
    let decoded = read_block(tank.write()).unwrap();

    let onst = &decoded.dataset.epochs["Onst"];
    assert_eq!(onst.onsets, vec![0.0]);
    assert_eq!(onst.offsets, vec![at(2.0)]);
    assert!(decoded.warnings.iter().any(|w| matches!(
        w,
        Warning::MissingBuddy { store, buddy } if store == "Off/" && buddy == "Onst"
    )));
}

#[test]
fn window_clips_intervals() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 0.0, 0.0)
        .onset("Tick", 5.0, 5.0)
        .onset("Tick", 10.0, 10.0);
    let options = Options::default().window(2.0, 7.0);
    let decoded = TankReader::new(options).read_block(tank.write()).unwrap();

    let tick = &decoded.dataset.epochs["Tick"];
    assert_eq!(tick.onsets, vec![2.0, at(5.0)]);
    assert_eq!(tick.offsets, vec![at(5.0), 7.0]);
    assert_eq!(
        tick.values,
        vec![EpochValue::Number(0.0), EpochValue::Number(5.0)]
    );
}

#[test]
fn experiment_notes_become_note_store() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0);
    tank.experiment_notes(
        "Experiment: fear\n\
         Subject: M12\n\
         Start: 10:22:01am 03/15/2021\n\
         Note-1 10:23:01am [freeze]\n\
         Note-2 10:25:11am [none] \"moved\"\n",
    );
    let decoded = read_block(tank.write()).unwrap();

    let info = &decoded.dataset.info;
    assert_eq!(info.experiment.as_deref(), Some("fear"));
    assert_eq!(info.subject.as_deref(), Some("M12"));
    assert_eq!(info.start.as_deref(), Some("10:22:01am 03/15/2021"));

    let notes = &decoded.dataset.epochs["Note"];
    assert_eq!(notes.onsets, vec![60.0, 190.0]);
    assert_eq!(notes.offsets, vec![190.0, f64::INFINITY]);
    assert_eq!(
        notes.values,
        vec![
            EpochValue::Text("freeze".to_owned()),
            EpochValue::Text("moved".to_owned())
        ]
    );
}

#[test]
fn note_store_only_when_requested() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0);
    tank.experiment_notes("Start: 10:22:01am 03/15/2021\nNote-1 10:23:01am [freeze]\n");
    let options = Options::default().stores(["Tick"]);
    let decoded = TankReader::new(options).read_block(tank.write()).unwrap();

    assert!(decoded.dataset.epochs.contains_key("Tick"));
    assert!(!decoded.dataset.epochs.contains_key("Note"));
}

#[test]
fn disabled_and_secondary_stores() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 0.5, 1.0)
        .onset("Cam1", 1.0, 1.0)
        .onset("Cam2", 1.0, 1.0)
        .onset("Cam1", 2.0, 2.0)
        .onset("Cam2", 2.5, 2.0)
        .onset("Cam1", 3.0, 3.0);
    tank.store_notes(&[
        ("Tick", &[("Enabled", "2")]),
        ("Cam2", &[("HeadName", "Cam1|Cam1")]),
    ]);
    let decoded = read_block(tank.write()).unwrap();

    let epochs = &decoded.dataset.epochs;
    assert!(!epochs.contains_key("Tick"));
    assert!(decoded
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::DisabledStore { store } if store == "Tick")));

    assert_eq!(epochs["Cam1"].offsets, vec![at(2.0), at(3.0), f64::INFINITY]);
    assert_eq!(epochs["Cam2"].onsets, vec![at(1.0), at(2.5)]);
    assert_eq!(epochs["Cam2"].offsets, vec![at(2.0), at(3.0)]);
}

#[test]
fn tagged_notes_attach_to_events() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.noted_onset("Tick", 1.0, 2).onset("Tick", 2.0, 4.0);
    tank.tagged_notes(&["first", "second"]);
    let decoded = read_block(tank.write()).unwrap();

    let tick = &decoded.dataset.epochs["Tick"];
    assert_eq!(tick.len(), 2);
    assert_eq!(
        tick.notes,
        vec![TaggedNote {
            timestamp: at(1.0),
            index: 2,
            text: "second".to_owned(),
        }]
    );
}

#[test]
fn scalars_split_per_channel() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.scalar("Scl1", 1, 1.0, 10.0)
        .scalar("Scl1", 2, 1.0, 20.0)
        .scalar("Scl1", 1, 2.0, 11.0)
        .scalar("Scl1", 2, 2.0, 21.0);
    let decoded = read_block(tank.write()).unwrap();
    assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);

    let scalars = &decoded.dataset.scalars["Scl1"];
    assert_eq!(scalars.channels, vec![1, 2]);
    assert_eq!(scalars.timestamps, vec![at(1.0), at(2.0)]);
    assert_eq!(scalars.values, vec![vec![10.0, 11.0], vec![20.0, 21.0]]);
}
