use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat};
use koma::input::CommandReader;
use koma::nav::{PairMode, ReadingDirection, Step};
use koma::preload::PreloadConfig;
use koma::session::{Session, SessionConfig, Spread};
use koma::sort::SortStrategy;
use koma::viewer::{self, ExitReason};

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(w, h)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("PNG encoding should succeed");
    buf.into_inner()
}

fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, png_bytes(w, h)).expect("fixture write should succeed");
    path
}

fn write_cbz(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let file = fs::File::create(path).expect("archive create should succeed");
    let mut zw = zip::ZipWriter::new(file);
    for (name, data) in entries {
        zw.start_file(*name, zip::write::SimpleFileOptions::default())
            .expect("zip entry should start");
        zw.write_all(data).expect("zip entry should write");
    }
    zw.finish().expect("zip should finish");
}

/// Preloading off so decode counts and cache contents are deterministic.
fn quiet_config(mode: PairMode) -> SessionConfig {
    SessionConfig {
        pair_mode: mode,
        preload: PreloadConfig {
            enabled: false,
            ..PreloadConfig::default()
        },
        ..SessionConfig::default()
    }
}

fn labels(spread: &Spread) -> Vec<String> {
    spread.pages().iter().map(|p| p.label().to_string()).collect()
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_directory_opens_in_natural_order() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["p10.png", "p2.png", "p1.png"] {
        write_png(dir.path(), name, 8, 12);
    }
    let session =
        Session::open(vec![dir.path().to_path_buf()], &quiet_config(PairMode::Single)).unwrap();
    let names: Vec<String> = session.pages().iter().map(|l| l.display_name()).collect();
    assert_eq!(names, ["p1.png", "p2.png", "p10.png"]);
}

#[test]
fn test_lexicographic_sort() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["p10.png", "p2.png", "p1.png"] {
        write_png(dir.path(), name, 8, 12);
    }
    let config = SessionConfig {
        sort: SortStrategy::Lexicographic,
        ..quiet_config(PairMode::Single)
    };
    let session = Session::open(vec![dir.path().to_path_buf()], &config).unwrap();
    let names: Vec<String> = session.pages().iter().map(|l| l.display_name()).collect();
    assert_eq!(names, ["p1.png", "p10.png", "p2.png"]);
}

#[test]
fn test_cbz_pages_decode() {
    let dir = tempfile::tempdir().unwrap();
    let cbz = dir.path().join("vol1.cbz");
    write_cbz(
        &cbz,
        &[
            ("001.png", png_bytes(20, 30)),
            ("notes.txt", b"skip me".to_vec()),
            ("002.png", png_bytes(40, 30)),
        ],
    );
    let session = Session::open(vec![cbz], &quiet_config(PairMode::Single)).unwrap();
    assert_eq!(session.len(), 2);

    let first = session.page_at(0).unwrap();
    assert_eq!(first.dimensions(), (20, 30));
    assert_eq!(first.label(), "vol1.cbz:001.png");
    assert_eq!(session.page_at(1).unwrap().dimensions(), (40, 30));
}

#[test]
fn test_book_mode_walk_with_wrap() {
    let dir = tempfile::tempdir().unwrap();
    for i in 1..=5 {
        write_png(dir.path(), &format!("{i}.png"), 80, 120);
    }
    let mut session =
        Session::open(vec![dir.path().to_path_buf()], &quiet_config(PairMode::Book)).unwrap();

    assert_eq!(labels(&session.current_spread()), ["1.png", "2.png"]);
    session.advance(Step::Next, false);
    assert_eq!(labels(&session.current_spread()), ["3.png", "4.png"]);
    session.advance(Step::Next, false);
    assert_eq!(labels(&session.current_spread()), ["5.png"]);

    session.jump_first().unwrap();
    session.advance(Step::Previous, false);
    assert_eq!(session.current_index(), 4);

    assert_eq!(session.toggle_reading_direction(), ReadingDirection::Rtl);
    session.advance(Step::Previous, true);
    assert_eq!(labels(&session.current_spread()), ["5.png", "4.png"]);
}

#[test]
fn test_book_mode_rejects_spread_page() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "1.png", 80, 120);
    write_png(dir.path(), "2.png", 240, 120);
    write_png(dir.path(), "3.png", 80, 120);
    let mut session =
        Session::open(vec![dir.path().to_path_buf()], &quiet_config(PairMode::Book)).unwrap();

    assert_eq!(labels(&session.current_spread()), ["1.png"]);
    session.advance(Step::Next, true);
    assert_eq!(labels(&session.current_spread()), ["2.png"]);
}

#[test]
fn test_corrupt_page_becomes_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "1.png", 8, 12);
    fs::write(dir.path().join("2.png"), b"definitely not a png").unwrap();
    let mut session =
        Session::open(vec![dir.path().to_path_buf()], &quiet_config(PairMode::Single)).unwrap();

    session.advance(Step::Next, false);
    let page = session.current_page().unwrap();
    assert!(page.is_placeholder());
    assert_eq!(page.dimensions(), (800, 1200));
    assert_eq!(page.label(), "2.png");

    // Cached: the second look is a hit, not another decode.
    let before = session.cache_stats();
    session.current_page().unwrap();
    assert_eq!(session.cache_stats().hits, before.hits + 1);
}

#[test]
fn test_missing_archive_entry_becomes_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let cbz = dir.path().join("a.cbz");
    write_cbz(&cbz, &[("1.png", png_bytes(8, 12)), ("2.png", png_bytes(8, 12))]);
    let session = Session::open(vec![cbz.clone()], &quiet_config(PairMode::Single)).unwrap();

    // Replace the archive underneath the session.
    write_cbz(&cbz, &[("1.png", png_bytes(8, 12))]);
    let page = session.page_at(1).unwrap();
    assert!(page.is_placeholder());
    assert!(page.failure().unwrap().contains("not found"), "{:?}", page.failure());
}

#[test]
fn test_preload_warms_pages_ahead() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..8 {
        write_png(dir.path(), &format!("{i}.png"), 8, 12);
    }
    let config = SessionConfig {
        preload: PreloadConfig {
            depth: 3,
            ..PreloadConfig::default()
        },
        ..SessionConfig::default()
    };
    let mut session = Session::open(vec![dir.path().to_path_buf()], &config).unwrap();
    session.advance(Step::Next, false);

    let keys: Vec<String> = (2..=4)
        .map(|i| session.pages().get(i).unwrap().key().to_string())
        .collect();
    wait_until("pages 2-4 preloaded", || {
        keys.iter().all(|k| session.cache().contains(k))
    });
    assert!(session.preload_stats().loaded >= 3);
    assert_eq!(session.preload_stats().failed, 0);
}

#[test]
fn test_preload_disabled_at_runtime() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..4 {
        write_png(dir.path(), &format!("{i}.png"), 8, 12);
    }
    let mut session =
        Session::open(vec![dir.path().to_path_buf()], &SessionConfig::default()).unwrap();
    session.set_preload_enabled(false);
    assert!(!session.preload_enabled());
    session.set_preload_enabled(true);
    assert!(session.preload_enabled());
}

#[test]
fn test_small_cache_evicts() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..6 {
        write_png(dir.path(), &format!("{i}.png"), 8, 12);
    }
    let config = SessionConfig {
        cache_capacity: 2,
        ..quiet_config(PairMode::Single)
    };
    let mut session = Session::open(vec![dir.path().to_path_buf()], &config).unwrap();
    for _ in 0..5 {
        session.current_page().unwrap();
        session.advance(Step::Next, false);
    }
    assert_eq!(session.cache().len(), 2);
    assert_eq!(session.cache_stats().evictions, 3);
}

#[test]
fn test_rescan_keeps_current_page() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "2.png", 8, 12);
    write_png(dir.path(), "3.png", 8, 12);
    let mut session =
        Session::open(vec![dir.path().to_path_buf()], &quiet_config(PairMode::Single)).unwrap();
    session.jump_to(2).unwrap();
    session.current_page().unwrap();
    assert_eq!(session.cache().len(), 1);

    write_png(dir.path(), "1.png", 8, 12);
    assert_eq!(session.rescan(), 3);
    assert_eq!(session.current_index(), 2);
    assert_eq!(session.current_page().unwrap().label(), "3.png");
    // Rescan released the old entries.
    assert_eq!(session.cache().len(), 1);
}

#[test]
fn test_rescan_clamps_when_page_removed() {
    let dir = tempfile::tempdir().unwrap();
    for i in 1..=3 {
        write_png(dir.path(), &format!("{i}.png"), 8, 12);
    }
    let mut session =
        Session::open(vec![dir.path().to_path_buf()], &quiet_config(PairMode::Single)).unwrap();
    session.jump_last().unwrap();
    fs::remove_file(dir.path().join("3.png")).unwrap();
    assert_eq!(session.rescan(), 2);
    assert_eq!(session.current_index(), 1);
}

#[test]
fn test_open_empty_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("readme.txt"), b"no pages here").unwrap();
    let err = Session::open(vec![dir.path().to_path_buf()], &SessionConfig::default())
        .err()
        .expect("empty input should fail");
    assert!(format!("{err:#}").contains("no pages found"));
}

#[test]
fn test_viewer_script() {
    let dir = tempfile::tempdir().unwrap();
    for i in 1..=4 {
        write_png(dir.path(), &format!("{i}.png"), 80, 120);
    }
    let mut session =
        Session::open(vec![dir.path().to_path_buf()], &quiet_config(PairMode::Single)).unwrap();
    let reader = CommandReader::from_reader(Cursor::new(b"n\nb\n4g\n9g\n5\nq\nn\n".to_vec()));
    let mut out = Vec::new();

    let exit = viewer::drive(&mut session, &reader, None, &mut out).unwrap();
    assert_eq!(exit, ExitReason::Quit);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        [
            "[1/4] single ltr | 1.png 80x120",
            "[2/4] single ltr | 2.png 80x120",
            "[2-3/4] book ltr | 2.png 80x120 | 3.png 80x120 | book mode",
            "[4/4] book ltr | 4.png 80x120",
            "[4/4] book ltr | 4.png 80x120 | page 9 out of range (1-4)",
            "[4/4] book ltr | 4.png 80x120 | 5_",
        ]
    );
}

#[test]
fn test_viewer_count_prefix_and_eof() {
    let dir = tempfile::tempdir().unwrap();
    for i in 1..=5 {
        write_png(dir.path(), &format!("{i}.png"), 80, 120);
    }
    let mut session =
        Session::open(vec![dir.path().to_path_buf()], &quiet_config(PairMode::Single)).unwrap();
    let reader = CommandReader::from_reader(Cursor::new(b"3n\nrb\n".to_vec()));
    let mut out = Vec::new();

    let exit = viewer::drive(&mut session, &reader, None, &mut out).unwrap();
    assert_eq!(exit, ExitReason::Eof);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[1], "[4/5] single ltr | 4.png 80x120");
    assert_eq!(
        lines[2],
        "[4-5/5] book rtl | 5.png 80x120 | 4.png 80x120 | book mode"
    );
}

#[test]
fn test_viewer_unknown_key_drops_count() {
    let dir = tempfile::tempdir().unwrap();
    for i in 1..=5 {
        write_png(dir.path(), &format!("{i}.png"), 80, 120);
    }
    let mut session =
        Session::open(vec![dir.path().to_path_buf()], &quiet_config(PairMode::Single)).unwrap();
    let reader = CommandReader::from_reader(Cursor::new(b"3z\nn\n".to_vec()));
    let mut out = Vec::new();

    let exit = viewer::drive(&mut session, &reader, None, &mut out).unwrap();
    assert_eq!(exit, ExitReason::Eof);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        [
            "[1/5] single ltr | 1.png 80x120",
            "[1/5] single ltr | 1.png 80x120",
            "[2/5] single ltr | 2.png 80x120",
        ]
    );
}
