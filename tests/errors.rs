use std::fs;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use tankdecode::index::HeaderError;
use tankdecode::{
    read_block, CancelToken, Category, Error, Missing, Options, ProgressEvent, Store, TankReader,
    Warning,
};
use tankdecode_test_support::{waveform, TankBuilder};
use temp_dir::TempDir;

use shared::setup_tracing;

#[test]
fn block_directory_must_exist() {
    setup_tracing();
    let dir = TempDir::new().unwrap();
    let err = read_block(dir.child("Block-9")).unwrap_err();
    assert!(matches!(err, Error::NotFound { what: "block directory", .. }));
}

#[test]
fn empty_block_has_no_index() {
    setup_tracing();
    let dir = TempDir::new().unwrap();
    let err = read_block(dir.path()).unwrap_err();
    assert!(matches!(err, Error::NotFound { what: "an index file", .. }));
}

#[test]
fn two_index_files() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0);
    let block = tank.write();
    fs::copy(
        block.join("Tank_Block-1.tsq"),
        block.join("Tank_Block-2.tsq"),
    )
    .unwrap();

    let err = read_block(&block).unwrap_err();
    let Error::MultipleIndexFiles(paths) = &err else {
        panic!("expected multiple index files, got: {err}");
    };
    assert_eq!(paths.len(), 2);
}

#[test]
fn event_file_is_required() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0);
    let block = tank.write();
    fs::remove_file(block.join("Tank_Block-1.tev")).unwrap();

    let err = read_block(&block).unwrap_err();
    assert!(matches!(err, Error::NotFound { what: "the event file", .. }));
}

#[test]
fn index_too_short() {
    setup_tracing();
    let tank = TankBuilder::new();
    let block = tank.write();
    fs::write(block.join("Tank_Block-1.tsq"), [0u8; 50]).unwrap();

    let err = read_block(&block).unwrap_err();
    assert!(matches!(err, Error::MalformedHeader(HeaderError::TooShort(50))));
}

#[test]
fn index_without_start_marker() {
    setup_tracing();
    let tank = TankBuilder::new();
    let block = tank.write();
    fs::write(block.join("Tank_Block-1.tsq"), [0u8; 120]).unwrap();

    let err = read_block(&block).unwrap_err();
    assert!(matches!(err, Error::MalformedHeader(HeaderError::NoStartMarker(0))));
}

#[test]
fn unfinished_index_still_decodes() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0)
        .onset("Tick", 2.0, 2.0)
        .without_stop()
        .trailing_bytes(&[1, 2, 3]);
    let decoded = read_block(tank.write()).unwrap();

    assert_eq!(decoded.dataset.epochs["Tick"].len(), 2);
    assert_eq!(decoded.dataset.info.stop_date, None);
    assert_eq!(decoded.dataset.info.duration, None);
    let warnings = &decoded.warnings;
    assert!(warnings
        .iter()
        .any(|w| matches!(w, Warning::MissingStopMarker)));
    assert!(warnings
        .iter()
        .any(|w| matches!(w, Warning::TrailingBytes { bytes: 3 })));
}

#[test]
fn lost_event_data_spares_other_stores() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 0.5, 1.0);
    tank.snippet("eNe1", 1, 0, 1.0, 24414.0625, &waveform(1, 16));
    tank.snippet_at("eNe1", 1, 0, 2.0, 24414.0625, 1_000_000, 16);
    let decoded = read_block(tank.write()).unwrap();

    assert_eq!(decoded.dataset.epochs["Tick"].len(), 1);
    assert_eq!(decoded.dataset.snippets["eNe1"].len(), 1);
    let warnings = decoded.warnings.into_vec();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(matches!(
        &warnings[0],
        Warning::PartialData {
            missing: Missing::Snippets { dropped: 1, .. },
            ..
        }
    ));
}

#[test]
fn requested_store_not_in_block() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0);
    let options = Options::default().stores(["Tick", "Nope"]);
    let decoded = TankReader::new(options).read_block(tank.write()).unwrap();

    assert!(decoded.dataset.epochs.contains_key("Tick"));
    let warnings = decoded.warnings.into_vec();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(matches!(&warnings[0], Warning::StoreNotFound { store } if store == "Nope"));
}

#[test]
fn categories_filter_stores() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0);
    tank.snippet("eNe1", 1, 0, 1.0, 24414.0625, &waveform(1, 16));
    let options = Options::default().categories([Category::Snippet]);
    let decoded = TankReader::new(options).read_block(tank.write()).unwrap();

    assert!(decoded.dataset.epochs.is_empty());
    assert_eq!(decoded.dataset.snippets.len(), 1);
}

#[test]
fn cancelled_before_start() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0);
    let cancel = CancelToken::new();
    cancel.cancel();

    let events = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let sink = Arc::clone(&events);
    let mut reader = TankReader::default()
        .with_cancel(cancel)
        .with_progress(move |e: ProgressEvent| sink.lock().unwrap().push(e));
    let err = reader.read_block(tank.write()).unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(*events.lock().unwrap(), vec![ProgressEvent::Complete]);
}

#[test]
fn progress_per_store() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0);
    tank.snippet("eNe1", 1, 0, 1.0, 24414.0625, &waveform(1, 16));

    let events = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let sink = Arc::clone(&events);
    TankReader::default()
        .with_progress(move |e: ProgressEvent| sink.lock().unwrap().push(e))
        .read_block(tank.write())
        .unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            ProgressEvent::Update {
                processed: 1,
                total: 2
            },
            ProgressEvent::Update {
                processed: 2,
                total: 2
            },
            ProgressEvent::Complete,
        ]
    );
}

#[test]
fn headers_report_completion() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0);

    let events = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let sink = Arc::clone(&events);
    let headers = TankReader::default()
        .with_progress(move |e: ProgressEvent| sink.lock().unwrap().push(e))
        .read_headers(tank.write())
        .unwrap();

    assert_eq!(headers.stores.len(), 1);
    assert_eq!(*events.lock().unwrap(), vec![ProgressEvent::Complete]);
}

#[test]
fn decode_on_a_thread() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0);
    let block = tank.write();

    let (handle, progress) = TankReader::default().spawn(block);
    let decoded = handle.join().unwrap().unwrap();
    let events: Vec<ProgressEvent> = progress.iter().collect();

    assert!(decoded.dataset.epochs.contains_key("Tick"));
    assert_eq!(events.last(), Some(&ProgressEvent::Complete));
}

#[test]
fn headers_without_samples() {
    setup_tracing();
    let mut tank = TankBuilder::new();
    tank.onset("Tick", 1.0, 1.0);
    tank.snippet("eNe1", 2, 0, 1.0, 24414.0625, &waveform(1, 16));
    let headers = TankReader::default().read_headers(tank.write()).unwrap();

    assert!(headers.warnings.is_empty(), "{:?}", headers.warnings);
    assert_eq!(headers.info.block_name, "Block-1");
    let names: Vec<&str> = headers.stores.iter().map(Store::name).collect();
    assert_eq!(names, vec!["Tick", "eNe1"]);
    let Some(Store::Snippet(snippets)) = headers.stores.get(1) else {
        panic!("second store should hold snippets");
    };
    assert_eq!(snippets.channels, vec![2]);
    assert_eq!(snippets.info.category, Category::Snippet);
}

#[test]
fn options_from_file() {
    setup_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.child("options.ron");
    let options = Options::default().window(1.0, 2.0).stores(["Tick"]);
    fs::write(&path, options.to_ron().unwrap()).unwrap();

    let loaded = Options::load(&path).unwrap();
    assert_eq!(loaded, options);
}
