use std::path::Path;

use apprt_loader::builder::ImageBuilder;
use apprt_loader::{LoadError, HEADER_SIZE};

use crate::{inspect, inspect_bytes, Formatter, InspectError, InspectOptions};

const BASE: u32 = 0x2001_0000;

fn options() -> InspectOptions {
    InspectOptions {
        base: BASE,
        arena_size: 4096,
        syscalls: 0x0800_4000,
    }
}

fn sample() -> (Vec<u8>, u32) {
    let mut builder = ImageBuilder::new("Weather").watchface();
    let code = builder.code(&[0x70, 0x47, 0x00, 0xbf]);
    let target = builder.word(0x1234_5678);
    builder.pointer(target);
    builder.entry(code).bss(32);
    (builder.build(), code)
}

#[test]
fn report_carries_the_header() {
    let (image, code) = sample();

    let report = inspect_bytes("weather.bin", &image, &options()).unwrap();

    assert_eq!(report.name, "Weather");
    assert_eq!(report.company, "apprt");
    assert_eq!(report.file_size, image.len());
    assert_eq!(report.entry_offset, code);
    assert_eq!(report.reloc_entries, 1);
    assert_eq!(report.flags, vec!["watchface".to_string()]);
    assert_eq!(report.uuid.len(), 32);
}

#[test]
fn dry_run_reports_the_relocated_layout() {
    let (image, code) = sample();

    let report = inspect_bytes("weather.bin", &image, &options()).unwrap();
    let load = report.load.clone().unwrap();

    assert!(report.loaded());
    assert_eq!(load.base, BASE);
    assert_eq!(load.entry, (BASE + code) | 1);
    assert_eq!(load.relocations, 1);
    assert_eq!(load.bss_start, u32::from(report.app_size));
    assert_eq!(load.bss_end, u32::from(report.virtual_size));
    assert_eq!(load.bss_end - load.bss_start, 32);
    assert!(load.arena_used >= usize::from(report.virtual_size));
}

#[test]
fn loader_failures_stay_in_the_report() {
    let (image, _) = sample();
    let cramped = InspectOptions {
        arena_size: HEADER_SIZE,
        ..options()
    };

    let report = inspect_bytes("weather.bin", &image, &cramped).unwrap();

    assert!(!report.loaded());
    assert!(report.load.unwrap_err().contains("arena cannot hold"));
}

#[test]
fn garbage_is_not_an_image() {
    let err = inspect_bytes("noise.bin", &[0xffu8; HEADER_SIZE], &options()).unwrap_err();

    assert!(matches!(err, InspectError::Header(LoadError::BadMagic)));
}

#[test]
fn truncated_header_is_a_short_read() {
    let (image, _) = sample();

    let err = inspect_bytes("cut.bin", &image[..40], &options()).unwrap_err();

    assert!(matches!(
        err,
        InspectError::Header(LoadError::ShortRead { got: 40, .. })
    ));
}

#[test]
fn missing_file_names_the_path() {
    let err = inspect(Path::new("/nonexistent/app.bin"), &options()).unwrap_err();

    assert!(matches!(err, InspectError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/app.bin"));
}

#[test]
fn json_output_is_machine_readable() {
    let (image, _) = sample();
    let report = inspect_bytes("weather.bin", &image, &options()).unwrap();

    let json = Formatter::new(true).render(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["name"], "Weather");
    assert_eq!(value["sdk_version"]["major"], 5);
    assert_eq!(value["load"]["Ok"]["base"], BASE);
}

#[test]
fn text_output_flags_failures() {
    colored::control::set_override(false);
    let (image, _) = sample();
    let cramped = InspectOptions {
        arena_size: HEADER_SIZE,
        ..options()
    };
    let report = inspect_bytes("weather.bin", &image, &cramped).unwrap();

    let text = Formatter::new(false).render(&report).unwrap();

    assert!(text.starts_with("Weather by apprt"));
    assert!(text.contains("load failed: arena cannot hold"));
}
