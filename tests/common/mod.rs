#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

fn fif_tag(kind: i32, tag_type: i32, payload: &[u8], next: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + payload.len());
    out.extend_from_slice(&kind.to_be_bytes());
    out.extend_from_slice(&tag_type.to_be_bytes());
    out.extend_from_slice(&(payload.len() as i32).to_be_bytes());
    out.extend_from_slice(&next.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn fif_ch_info(name: &str, kind: i32, unit: i32) -> Vec<u8> {
    let mut out = vec![0u8; 96];
    out[8..12].copy_from_slice(&kind.to_be_bytes());
    out[72..76].copy_from_slice(&unit.to_be_bytes());
    out[80..80 + name.len()].copy_from_slice(name.as_bytes());
    out
}

/// A FIF file with one magnetometer, one EEG and one stim channel at
/// 1000 Hz, first sample 1000, 2000 samples.
pub fn fif_bytes() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(fif_tag(100, 31, &[0u8; 20], 0));
    out.extend(fif_tag(200, 3, &3i32.to_be_bytes(), 0));
    out.extend(fif_tag(201, 4, &1000f32.to_be_bytes(), 0));
    out.extend(fif_tag(203, 30, &fif_ch_info("MEG 0111", 1, 112), 0));
    out.extend(fif_tag(203, 30, &fif_ch_info("EEG 001", 2, 107), 0));
    out.extend(fif_tag(203, 30, &fif_ch_info("STI 014", 3, 107), 0));
    out.extend(fif_tag(208, 3, &1000i32.to_be_bytes(), 0));
    out.extend(fif_tag(300, 4, &vec![0u8; 3 * 4 * 2000], -1));
    out
}

pub fn write_fif(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, fif_bytes()).expect("write fif fixture");
    path
}

fn pad(value: &str, width: usize) -> Vec<u8> {
    let mut out = value.as_bytes().to_vec();
    out.resize(width, b' ');
    out
}

/// An EDF file with two 256 Hz EEG channels and ten one-second records.
pub fn write_edf(dir: &Path, name: &str) -> PathBuf {
    write_edf_like(dir, name, pad("0", 8), 2)
}

/// A BioSemi BDF file with the same layout as [`write_edf`]; 24-bit samples.
pub fn write_bdf(dir: &Path, name: &str) -> PathBuf {
    write_edf_like(dir, name, b"\xFFBIOSEMI".to_vec(), 3)
}

fn write_edf_like(dir: &Path, name: &str, version: Vec<u8>, bytes_per_sample: usize) -> PathBuf {
    let signals = [("Fp1", "uV"), ("Fp2", "uV")];
    let ns = signals.len();

    let mut out = version;
    out.extend(pad("X X X X", 80));
    out.extend(pad("Startdate X X X X", 80));
    out.extend(pad("01.01.20", 8));
    out.extend(pad("10.00.00", 8));
    out.extend(pad(&(256 * (ns + 1)).to_string(), 8));
    out.extend(pad("", 44));
    out.extend(pad("10", 8));
    out.extend(pad("1", 8));
    out.extend(pad(&ns.to_string(), 4));
    for (label, _) in signals {
        out.extend(pad(label, 16));
    }
    for _ in signals {
        out.extend(pad("", 80));
    }
    for (_, unit) in signals {
        out.extend(pad(unit, 8));
    }
    for _ in 0..4 {
        for _ in signals {
            out.extend(pad("0", 8));
        }
    }
    for _ in signals {
        out.extend(pad("", 80));
    }
    for _ in signals {
        out.extend(pad("256", 8));
    }
    for _ in signals {
        out.extend(pad("", 32));
    }
    out.resize(out.len() + bytes_per_sample * ns * 256 * 10, 0);

    let path = dir.join(name);
    fs::write(&path, out).expect("write edf fixture");
    path
}

/// Writes a BrainVision triplet `<stem>.vhdr/.eeg/.vmrk`: two channels at
/// 500 Hz, 100 samples, one segment marker and two stimulus markers.
pub fn write_brainvision(dir: &Path, stem: &str) -> PathBuf {
    let vhdr = format!(
        "Brain Vision Data Exchange Header File Version 1.0\r\n\
         \r\n\
         [Common Infos]\r\n\
         Codepage=UTF-8\r\n\
         DataFile={stem}.eeg\r\n\
         MarkerFile={stem}.vmrk\r\n\
         DataFormat=BINARY\r\n\
         DataOrientation=MULTIPLEXED\r\n\
         NumberOfChannels=2\r\n\
         SamplingInterval=2000\r\n\
         \r\n\
         [Binary Infos]\r\n\
         BinaryFormat=INT_16\r\n\
         \r\n\
         [Channel Infos]\r\n\
         Ch1=Fp1,,0.1,µV\r\n\
         Ch2=VEOG,,0.1,\r\n"
    );
    let vmrk = format!(
        "Brain Vision Data Exchange Marker File, Version 1.0\r\n\
         \r\n\
         [Common Infos]\r\n\
         Codepage=UTF-8\r\n\
         DataFile={stem}.eeg\r\n\
         \r\n\
         [Marker Infos]\r\n\
         Mk1=New Segment,,1,1,0\r\n\
         Mk2=Stimulus,S  1,51,1,0\r\n\
         Mk3=Stimulus,S  2,76,5,0\r\n"
    );

    let vhdr_path = dir.join(format!("{stem}.vhdr"));
    fs::write(&vhdr_path, vhdr).expect("write vhdr");
    fs::write(dir.join(format!("{stem}.vmrk")), vmrk).expect("write vmrk");
    fs::write(dir.join(format!("{stem}.eeg")), vec![0u8; 2 * 2 * 100]).expect("write eeg");
    vhdr_path
}
