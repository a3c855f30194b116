mod common;

use std::fs;
use std::path::Path;

use rawbids::bids::{write_raw_bids, WriteOptions};
use rawbids::raw::{read_raw, AuxFiles, RawFormat};
use rawbids::{raw_to_bids, RawBidsError, RawToBidsConfig};

fn read_json(path: &Path) -> serde_json::Value {
    let text = fs::read_to_string(path).expect("read json");
    serde_json::from_str(&text).expect("parse json")
}

#[test]
fn writes_session_and_run_layout() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = common::write_fif(temp.path(), "raw.fif");
    let root = temp.path().join("bids");

    let mut config = RawToBidsConfig::new("02", "rest", &src, &root);
    config.session_id = Some("01".into());
    config.run = Some("1".into());
    let report = raw_to_bids(config).expect("convert");

    let folder = root.join("sub-02").join("ses-01").join("meg");
    assert_eq!(report.basename, "sub-02_ses-01_task-rest_run-1_meg.fif");
    assert_eq!(report.folder, folder);

    let data = folder.join("sub-02_ses-01_task-rest_run-1_meg.fif");
    assert_eq!(fs::read(&data).unwrap(), fs::read(&src).unwrap());
    assert!(folder.join("sub-02_ses-01_task-rest_run-1_channels.tsv").is_file());
    assert!(folder.join("sub-02_ses-01_task-rest_run-1_meg.json").is_file());
}

#[test]
fn refuses_existing_destination_without_overwrite() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = common::write_fif(temp.path(), "raw.fif");
    let root = temp.path().join("bids");
    let folder = root.join("sub-01").join("meg");
    fs::create_dir_all(&folder).unwrap();
    let dest = folder.join("sub-01_task-rest_meg.fif");
    fs::write(&dest, b"existing").unwrap();

    let err = raw_to_bids(RawToBidsConfig::new("01", "rest", &src, &root)).unwrap_err();
    match err {
        RawBidsError::DestinationExists { path } => assert_eq!(path, dest),
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(fs::read(&dest).unwrap(), b"existing");
    assert!(!folder.join("sub-01_task-rest_meg.json").exists());
    assert!(!root.join("participants.tsv").exists());
}

#[test]
fn overwrite_replaces_content() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = common::write_fif(temp.path(), "raw.fif");
    let root = temp.path().join("bids");
    let folder = root.join("sub-01").join("meg");
    fs::create_dir_all(&folder).unwrap();
    let dest = folder.join("sub-01_task-rest_meg.fif");
    fs::write(&dest, b"existing").unwrap();

    let mut config = RawToBidsConfig::new("01", "rest", &src, &root);
    config.overwrite = true;
    raw_to_bids(config).expect("overwrite");

    assert_eq!(fs::read(&dest).unwrap(), common::fif_bytes());
}

#[test]
fn same_stem_other_extension_fails_closed() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = common::write_fif(temp.path(), "raw.fif");
    let root = temp.path().join("bids");
    let folder = root.join("sub-01").join("meg");
    let ctf = folder.join("sub-01_task-rest_meg.ds");
    fs::create_dir_all(&ctf).unwrap();

    let err = raw_to_bids(RawToBidsConfig::new("01", "rest", &src, &root)).unwrap_err();
    assert!(matches!(err, RawBidsError::DestinationExists { ref path } if *path == ctf));
    assert!(!folder.join("sub-01_task-rest_meg.fif").exists());

    let mut config = RawToBidsConfig::new("01", "rest", &src, &root);
    config.overwrite = true;
    raw_to_bids(config).expect("overwrite ignores the conflict");
    assert!(folder.join("sub-01_task-rest_meg.fif").is_file());
    assert!(ctf.is_dir());
}

#[test]
fn meg_sidecar_describes_recording() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = common::write_fif(temp.path(), "raw.fif");
    let root = temp.path().join("bids");

    let mut config = RawToBidsConfig::new("01", "rest", &src, &root);
    config.line_freq = Some(50.0);
    raw_to_bids(config).expect("convert");

    let folder = root.join("sub-01").join("meg");
    let json = read_json(&folder.join("sub-01_task-rest_meg.json"));
    assert_eq!(json["TaskName"], "rest");
    assert_eq!(json["SamplingFrequency"], 1000.0);
    assert_eq!(json["PowerLineFrequency"], 50.0);
    assert_eq!(json["RecordingDuration"], 2.0);
    assert_eq!(json["MEGChannelCount"], 1);
    assert_eq!(json["EEGChannelCount"], 1);
    assert_eq!(json["TriggerChannelCount"], 1);

    let channels = fs::read_to_string(folder.join("sub-01_task-rest_channels.tsv")).unwrap();
    assert_eq!(
        channels,
        "name\ttype\tunits\tsampling_frequency\tstatus\n\
         MEG 0111\tMEGMAG\tT\t1000\tgood\n\
         EEG 001\tEEG\tV\t1000\tgood\n\
         STI 014\tTRIG\tV\t1000\tgood\n"
    );
}

#[test]
fn mne_events_are_relative_to_first_sample() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = common::write_fif(temp.path(), "raw.fif");
    let eve = temp.path().join("raw-eve.txt");
    fs::write(&eve, "1500 0 1\n2000 0 2\n1250 0 3\n").unwrap();
    let root = temp.path().join("bids");

    let mut config = RawToBidsConfig::new("01", "rest", &src, &root);
    config.events_data = Some(eve);
    config.event_id = Some("auditory=1,visual=2".parse().unwrap());
    let report = raw_to_bids(config).expect("convert");
    assert_eq!(report.events, 3);

    let text =
        fs::read_to_string(root.join("sub-01/meg/sub-01_task-rest_events.tsv")).unwrap();
    assert_eq!(
        text,
        "onset\tduration\ttrial_type\tvalue\tsample\n\
         0.25\t0\tn/a\t3\t250\n\
         0.5\t0\tauditory\t1\t500\n\
         1\t0\tvisual\t2\t1000\n"
    );
}

#[test]
fn brainvision_triplet_and_markers() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let vhdr = common::write_brainvision(temp.path(), "recording");
    let root = temp.path().join("bids");

    let raw = read_raw(&vhdr, &AuxFiles::default()).expect("read brainvision");
    let report = write_raw_bids(
        raw.as_ref(),
        "sub-01_task-oddball_eeg.vhdr",
        &root,
        None,
        &WriteOptions::default(),
    )
    .expect("write");

    let folder = root.join("sub-01").join("eeg");
    assert!(folder.join("sub-01_task-oddball_eeg.eeg").is_file());
    assert!(folder.join("sub-01_task-oddball_eeg.vmrk").is_file());
    let header = fs::read_to_string(folder.join("sub-01_task-oddball_eeg.vhdr")).unwrap();
    assert!(header.contains("DataFile=sub-01_task-oddball_eeg.eeg"));
    assert!(header.contains("MarkerFile=sub-01_task-oddball_eeg.vmrk"));

    assert_eq!(report.events, 3);
    let events = fs::read_to_string(folder.join("sub-01_task-oddball_events.tsv")).unwrap();
    let lines: Vec<&str> = events.lines().collect();
    assert_eq!(lines[1], "0\t0\tNew Segment\tn/a\t0");
    assert_eq!(lines[2], "0.1\t0\tStimulus/S  1\tn/a\t50");
    assert_eq!(lines[3], "0.15\t0.01\tStimulus/S  2\tn/a\t75");

    let json = read_json(&folder.join("sub-01_task-oddball_eeg.json"));
    assert_eq!(json["Manufacturer"], "BrainProducts");
    assert_eq!(json["EOGChannelCount"], 1);
    assert!(json.get("MEGChannelCount").is_none());
}

#[test]
fn timed_events_with_event_id() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let edf = common::write_edf(temp.path(), "sleep.edf");
    let events = temp.path().join("events.csv");
    fs::write(&events, "onset,duration,trial_type\n2.5,1,go\n0.5,n/a,stop\n").unwrap();
    let root = temp.path().join("bids");

    let mut config = RawToBidsConfig::new("07", "gonogo", &edf, &root);
    config.kind = rawbids::bids::Kind::Eeg;
    config.events_data = Some(events);
    config.event_id = Some("go=1,stop=2".parse().unwrap());
    raw_to_bids(config).expect("convert");

    let text =
        fs::read_to_string(root.join("sub-07/eeg/sub-07_task-gonogo_events.tsv")).unwrap();
    assert_eq!(
        text,
        "onset\tduration\ttrial_type\tvalue\tsample\n\
         0.5\t0\tstop\t2\tn/a\n\
         2.5\t1\tgo\t1\tn/a\n"
    );

    let json = read_json(&root.join("sub-07/eeg/sub-07_task-gonogo_eeg.json"));
    assert_eq!(json["SamplingFrequency"], 256.0);
    assert_eq!(json["RecordingDuration"], 10.0);
}

#[test]
fn bdf_recording_is_written_as_eeg() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let bdf = common::write_bdf(temp.path(), "rest.bdf");
    let root = temp.path().join("bids");

    let raw = read_raw(&bdf, &AuxFiles::default()).expect("read bdf");
    assert_eq!(raw.info().format, RawFormat::Bdf);
    assert_eq!(raw.info().sfreq, Some(256.0));

    let mut config = RawToBidsConfig::new("04", "rest", &bdf, &root);
    config.kind = rawbids::bids::Kind::Eeg;
    let report = raw_to_bids(config).expect("convert");
    assert_eq!(report.basename, "sub-04_task-rest_eeg.bdf");

    let folder = root.join("sub-04/eeg");
    assert_eq!(
        fs::read(folder.join("sub-04_task-rest_eeg.bdf")).unwrap(),
        fs::read(&bdf).unwrap()
    );
    let json = read_json(&folder.join("sub-04_task-rest_eeg.json"));
    assert_eq!(json["SamplingFrequency"], 256.0);
    assert_eq!(json["EEGChannelCount"], 2);
}

#[test]
fn unused_digitization_input_is_ignored() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = common::write_fif(temp.path(), "raw.fif");
    let hsp = temp.path().join("head.hsp");
    fs::write(&hsp, "hsp").unwrap();
    let root = temp.path().join("bids");

    let mut config = RawToBidsConfig::new("01", "rest", &src, &root);
    config.aux = AuxFiles {
        hsp: Some(hsp),
        ..AuxFiles::default()
    };
    let report = raw_to_bids(config).expect("convert");

    assert!(report.files.iter().all(|f| !f.path.ends_with("sub-01_headshape.hsp")));
    assert!(!root.join("sub-01/meg/sub-01_headshape.hsp").exists());
    assert!(root.join("sub-01/meg/sub-01_task-rest_meg.fif").is_file());
}

#[test]
fn kit_digitization_files_are_copied() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let sqd = temp.path().join("run.sqd");
    fs::write(&sqd, b"kit data").unwrap();
    let mrk = temp.path().join("coils.mrk");
    let elp = temp.path().join("points.elp");
    let hsp = temp.path().join("head.hsp");
    for (path, body) in [(&mrk, "mrk"), (&elp, "elp"), (&hsp, "hsp")] {
        fs::write(path, body).unwrap();
    }
    let root = temp.path().join("bids");

    let mut config = RawToBidsConfig::new("01", "rest", &sqd, &root);
    config.session_id = Some("a".into());
    config.aux = AuxFiles {
        hpi: Some(mrk),
        electrode: Some(elp),
        hsp: Some(hsp),
        config: None,
    };
    raw_to_bids(config).expect("convert");

    let folder = root.join("sub-01/ses-a/meg");
    assert_eq!(
        fs::read_to_string(folder.join("sub-01_ses-a_task-rest_markers.mrk")).unwrap(),
        "mrk"
    );
    assert_eq!(
        fs::read_to_string(folder.join("sub-01_ses-a_headshape.hsp")).unwrap(),
        "hsp"
    );
    assert!(folder.join("sub-01_ses-a_task-rest_meg.sqd").is_file());
}

#[test]
fn kit_partial_digitization_is_rejected() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let sqd = temp.path().join("run.sqd");
    fs::write(&sqd, b"kit data").unwrap();
    let mrk = temp.path().join("coils.mrk");
    fs::write(&mrk, b"mrk").unwrap();

    let mut config = RawToBidsConfig::new("01", "rest", &sqd, temp.path().join("bids"));
    config.aux.hpi = Some(mrk);
    let err = raw_to_bids(config).unwrap_err();
    assert!(matches!(err, RawBidsError::RecordingRead { .. }));
    assert!(!temp.path().join("bids").exists());
}

#[test]
fn dataset_files_are_shared_across_subjects() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = common::write_fif(temp.path(), "raw.fif");
    let root = temp.path().join("study");

    raw_to_bids(RawToBidsConfig::new("01", "rest", &src, &root)).expect("first");
    raw_to_bids(RawToBidsConfig::new("02", "rest", &src, &root)).expect("second");
    raw_to_bids(RawToBidsConfig::new("02", "memory", &src, &root)).expect("second task");

    assert_eq!(
        fs::read_to_string(root.join("participants.tsv")).unwrap(),
        "participant_id\nsub-01\nsub-02\n"
    );
    let description = read_json(&root.join("dataset_description.json"));
    assert_eq!(description["Name"], "study");
    assert_eq!(description["BIDSVersion"], "1.0.2");
}

#[test]
fn bti_run_is_stored_as_folder() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let src = temp.path().join("run1");
    fs::create_dir(&src).unwrap();
    for name in ["c,rfDC", "config", "hs_file"] {
        fs::write(src.join(name), name).unwrap();
    }
    let root = temp.path().join("bids");

    raw_to_bids(RawToBidsConfig::new("01", "rest", src.join("c,rfDC"), &root)).expect("convert");

    let run = root.join("sub-01/meg/sub-01_task-rest_meg");
    assert!(run.join("c,rfDC").is_file());
    assert!(run.join("config").is_file());
    assert!(run.join("hs_file").is_file());
    let json = read_json(&root.join("sub-01/meg/sub-01_task-rest_meg.json"));
    assert_eq!(json["Manufacturer"], "4D Magnes");
}
