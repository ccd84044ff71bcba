use crate::config::ExtractionConfig;
use crate::error::Error;
use crate::extraction::*;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a ZIP archive; names ending in '/' become directory entries
fn create_zip_archive(archive_path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            std::io::Write::write_all(&mut writer, content).unwrap();
        }
    }
    writer.finish().unwrap();
}

fn extractor() -> ZipExtractor {
    ZipExtractor::new(
        ExtractionConfig::default().junk_prefixes,
        Duration::from_millis(500),
    )
}

fn collect_progress() -> (
    Arc<Mutex<Vec<ExtractionProgress>>>,
    impl FnMut(ExtractionProgress) + Send + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |p| sink.lock().unwrap().push(p))
}

// ---------------------------------------------------------------------------
// Root folder detection
// ---------------------------------------------------------------------------

#[test]
fn root_folder_is_the_archive_top_level_directory() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("client.zip");
    create_zip_archive(
        &archive,
        &[
            ("Game/", b""),
            ("Game/WoW.exe", b"binary"),
            ("Game/Data/patch.mpq", b"patch data"),
        ],
    );
    let dest = temp.path().join("install");

    let summary = extractor()
        .extract(&archive, &dest, &CancellationToken::new(), |_| {})
        .unwrap();

    assert_eq!(summary.root_folder.as_deref(), Some("Game"));
    assert!(summary.consistent_root);
    assert_eq!(summary.entries, 3);
    assert_eq!(summary.bytes, 16);
    assert!(dest.join("Game/WoW.exe").is_file());
    assert_eq!(
        std::fs::read(dest.join("Game/Data/patch.mpq")).unwrap(),
        b"patch data"
    );
}

#[test]
fn root_folder_found_without_explicit_directory_entries() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("client.zip");
    create_zip_archive(&archive, &[("Game/WoW.exe", b"binary")]);

    let summary = extractor()
        .extract(
            &archive,
            &temp.path().join("out"),
            &CancellationToken::new(),
            |_| {},
        )
        .unwrap();

    assert_eq!(summary.root_folder.as_deref(), Some("Game"));
}

#[test]
fn macosx_entries_never_become_the_root() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("client.zip");
    create_zip_archive(
        &archive,
        &[
            ("__MACOSX/Game/._WoW.exe", b"resource fork"),
            ("Game/WoW.exe", b"binary"),
        ],
    );
    let dest = temp.path().join("install");

    let summary = extractor()
        .extract(&archive, &dest, &CancellationToken::new(), |_| {})
        .unwrap();

    assert_eq!(summary.root_folder.as_deref(), Some("Game"));
    assert!(summary.consistent_root);
    // Junk entries are still extracted
    assert!(dest.join("__MACOSX/Game/._WoW.exe").exists());
}

#[test]
fn archive_without_folders_has_no_root() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("loose.zip");
    create_zip_archive(&archive, &[("readme.txt", b"hi"), ("WoW.exe", b"bin")]);

    let summary = extractor()
        .extract(
            &archive,
            &temp.path().join("out"),
            &CancellationToken::new(),
            |_| {},
        )
        .unwrap();

    assert_eq!(summary.root_folder, None);
}

#[test]
fn multiple_top_level_folders_are_flagged() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("mixed.zip");
    create_zip_archive(
        &archive,
        &[("Game/WoW.exe", b"bin"), ("Extras/readme.txt", b"hi")],
    );

    let summary = extractor()
        .extract(
            &archive,
            &temp.path().join("out"),
            &CancellationToken::new(),
            |_| {},
        )
        .unwrap();

    assert_eq!(summary.root_folder.as_deref(), Some("Game"));
    assert!(!summary.consistent_root);
}

// ---------------------------------------------------------------------------
// Progress and cancellation
// ---------------------------------------------------------------------------

#[test]
fn progress_is_monotonic_and_ends_at_100() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("client.zip");
    let big = vec![7u8; 64 * 1024];
    let entries: Vec<(String, Vec<u8>)> = (0..20)
        .map(|i| (format!("Game/file{i}.bin"), big.clone()))
        .collect();
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, c)| (n.as_str(), c.as_slice()))
        .collect();
    create_zip_archive(&archive, &borrowed);

    // Zero interval: every entry reports
    let extractor = ZipExtractor::new(vec!["__MACOSX".into()], Duration::ZERO);
    let (seen, on_progress) = collect_progress();
    extractor
        .extract(
            &archive,
            &temp.path().join("out"),
            &CancellationToken::new(),
            on_progress,
        )
        .unwrap();

    let seen = seen.lock().unwrap();
    let percents: Vec<u8> = seen.iter().map(|p| p.percent.unwrap()).collect();
    assert!(percents.len() > 2);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.last(), Some(&100));
    assert_eq!(
        percents.iter().filter(|p| **p == 100).count(),
        1,
        "100% only once, on completion"
    );
}

#[test]
fn cancelled_extraction_stops_before_writing() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("client.zip");
    create_zip_archive(&archive, &[("Game/WoW.exe", b"binary")]);
    let dest = temp.path().join("out");

    let token = CancellationToken::new();
    token.cancel();

    let result = extractor().extract(&archive, &dest, &token, |_| {});

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(!dest.join("Game/WoW.exe").exists());
}

#[test]
fn corrupt_archive_is_an_extraction_error() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("broken.zip");
    std::fs::write(&archive, b"definitely not a zip").unwrap();

    let result = extractor().extract(
        &archive,
        &temp.path().join("out"),
        &CancellationToken::new(),
        |_| {},
    );

    match result {
        Err(Error::Extraction { archive: a, reason }) => {
            assert_eq!(a, archive);
            assert!(reason.contains("failed to read ZIP archive"));
        }
        other => panic!("expected extraction error, got {other:?}"),
    }
}

#[test]
fn is_zip_file_detects_containers() {
    let temp = TempDir::new().unwrap();
    let good = temp.path().join("good.zip");
    create_zip_archive(&good, &[("Game/a.txt", b"a")]);
    let bad = temp.path().join("bad.zip");
    std::fs::write(&bad, b"<html>error page</html>").unwrap();

    assert!(is_zip_file(&good));
    assert!(!is_zip_file(&bad));
    assert!(!is_zip_file(&temp.path().join("missing.zip")));
}

#[tokio::test]
async fn extract_archive_runs_on_blocking_pool() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("client.zip");
    create_zip_archive(&archive, &[("Game/WoW.exe", b"binary")]);
    let dest = temp.path().join("out");
    let (seen, on_progress) = collect_progress();

    let summary = extract_archive(
        &archive,
        &dest,
        &ExtractionConfig::default(),
        Duration::from_millis(500),
        CancellationToken::new(),
        on_progress,
    )
    .await
    .unwrap();

    assert_eq!(summary.root_folder.as_deref(), Some("Game"));
    let files: Vec<_> = walkdir::WalkDir::new(&dest)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    assert_eq!(files.len(), 1);
    assert_eq!(seen.lock().unwrap().last().unwrap().percent, Some(100));
}
