use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use mfe_core::locator::{self, LineSpan};
use mfe_core::patch::{self, PatchError, SaveMode, SaveOptions};
use mfe_core::record::Monster;
use mfe_core::source::SourceLines;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const CANONICAL: &str = "\
# Test monsters
name:Orc
speed:110
hit-points:11
blow:HIT:HURT:1d8

name:Troll
hit-points:40
blow:HIT:HURT:1d10
flags:EVIL

# big
name:Dragon
speed:130
hit-points:300

name:Imp
desc:A tiny demon.
";

fn write_data(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("monster.txt");
    fs::write(&path, text).expect("failed to write data file");
    path
}

fn other_files(dir: &Path, primary: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = fs::read_dir(dir)
        .expect("read_dir")
        .map(|e| e.expect("dir entry").path())
        .filter(|p| p != primary)
        .collect();
    out.sort();
    out
}

fn lines_of(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("read")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn locate_troll_spans_up_to_dragon() {
    let lines: Vec<&str> = "name:Orc\nspeed:1\nname:Troll\nspeed:2\n\nname:Dragon\n"
        .lines()
        .collect();
    assert_eq!(
        locator::locate(&lines, "Troll").expect("troll"),
        LineSpan { start: 2, end: 5 }
    );
}

#[test]
fn patch_one_leaves_other_records_byte_identical() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_data(&dir, CANONICAL);
    let before = lines_of(&path);

    let mut troll = Monster::new("Troll");
    troll.health = Some(99);
    troll.flags = vec!["EVIL".to_string(), "TROLL".to_string()];
    patch::patch_one(&path, "Troll", &troll, &SaveOptions::default()).expect("patch");

    let after = lines_of(&path);
    assert_eq!(after[..6], before[..6]);
    assert_eq!(
        after[6..10],
        ["name:Troll", "hit-points:99", "flags:EVIL", "flags:TROLL"]
    );
    assert_eq!(after[10..], before[10..]);
}

#[test]
fn saving_unchanged_record_is_byte_identical() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_data(&dir, CANONICAL);
    let records = mfe_core::parse_str(CANONICAL).expect("parse");

    for record in &records {
        patch::patch_one(&path, &record.name, record, &SaveOptions::default()).expect("patch");
        assert_eq!(fs::read_to_string(&path).expect("read"), CANONICAL);
    }

    let by_name: HashMap<String, Monster> =
        records.iter().map(|m| (m.name.clone(), m.clone())).collect();
    let report = patch::patch_batch(
        &path,
        by_name.keys().map(String::as_str),
        &by_name,
        &SaveOptions::default(),
    )
    .expect("batch");
    assert_eq!(report.applied.len(), 4);
    assert_eq!(fs::read_to_string(&path).expect("read"), CANONICAL);
}

#[test]
fn batch_save_takes_backup_of_previous_content() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_data(&dir, CANONICAL);

    let mut orc = Monster::new("Orc");
    orc.speed = Some(120);
    orc.health = Some(11);
    orc.blows = vec!["bite poison 1d4".to_string()];
    let by_name = HashMap::from([("Orc".to_string(), orc)]);

    let report =
        patch::patch_batch(&path, ["Orc"], &by_name, &SaveOptions::default()).expect("batch");
    let backup = report.backup.expect("in-place save keeps a backup");

    assert_eq!(fs::read_to_string(&backup).expect("backup"), CANONICAL);
    assert_eq!(report.written, path);
    let name = backup.file_name().and_then(|n| n.to_str()).expect("name");
    assert!(name.starts_with("monster_backup_"), "{name}");
    assert!(name.ends_with(".txt"), "{name}");

    let after = lines_of(&path);
    assert_eq!(
        after[1..5],
        ["name:Orc", "speed:120", "hit-points:11", "blow:BITE:POISON:1d4"]
    );
}

#[test]
fn consecutive_backups_get_distinct_names() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_data(&dir, CANONICAL);
    let orc = mfe_core::parse_str(CANONICAL).expect("parse").remove(0);

    let first = patch::patch_one(&path, "Orc", &orc, &SaveOptions::default()).expect("first");
    let second = patch::patch_one(&path, "Orc", &orc, &SaveOptions::default()).expect("second");
    assert_ne!(first.backup, second.backup);
    assert_eq!(other_files(dir.path(), &path).len(), 2);
}

#[test]
fn missing_record_fails_before_any_write() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_data(&dir, CANONICAL);

    let err = patch::patch_one(
        &path,
        "Balrog",
        &Monster::new("Balrog"),
        &SaveOptions::default(),
    )
    .expect_err("balrog is not in the file");
    assert!(matches!(err, PatchError::NotFound(_)), "{err:?}");
    assert_eq!(fs::read_to_string(&path).expect("read"), CANONICAL);
    assert!(other_files(dir.path(), &path).is_empty());
}

#[test]
fn failed_backup_leaves_primary_untouched() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_data(&dir, CANONICAL);
    let options = SaveOptions {
        backup_prefix: "no_such_dir/backup".to_string(),
        ..SaveOptions::default()
    };

    let mut orc = Monster::new("Orc");
    orc.speed = Some(1);
    let err = patch::patch_one(&path, "Orc", &orc, &options).expect_err("backup must fail");
    assert!(matches!(err, PatchError::Backup { .. }), "{err:?}");
    assert_eq!(fs::read_to_string(&path).expect("read"), CANONICAL);
}

#[test]
fn batch_reports_names_absent_from_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_data(&dir, CANONICAL);
    let by_name = HashMap::from([("Balrog".to_string(), Monster::new("Balrog"))]);

    let report =
        patch::patch_batch(&path, ["Balrog"], &by_name, &SaveOptions::default()).expect("batch");
    assert!(report.applied.is_empty());
    assert_eq!(report.missing, vec!["Balrog"]);
    assert_eq!(fs::read_to_string(&path).expect("read"), CANONICAL);
}

#[test]
fn derivative_mode_never_touches_primary() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_data(&dir, CANONICAL);
    let options = SaveOptions {
        mode: SaveMode::Derivative,
        ..SaveOptions::default()
    };

    let mut dragon = Monster::new("Dragon");
    dragon.speed = Some(140);
    let report = patch::patch_one(&path, "Dragon", &dragon, &options).expect("patch");

    assert!(report.backup.is_none());
    assert_ne!(report.written, path);
    assert_eq!(fs::read_to_string(&path).expect("read"), CANONICAL);
    let written = fs::read_to_string(&report.written).expect("derivative");
    assert!(written.contains("name:Dragon\nspeed:140\n\nname:Imp\n"));
}

#[test]
fn crlf_files_keep_their_line_endings() {
    let dir = TempDir::new().expect("tempdir");
    let text = CANONICAL.replace('\n', "\r\n");
    let path = write_data(&dir, &text);

    let mut troll = Monster::new("Troll");
    troll.health = Some(41);
    patch::patch_one(&path, "Troll", &troll, &SaveOptions::default()).expect("patch");

    let after = fs::read_to_string(&path).expect("read");
    assert!(after.contains("name:Troll\r\nhit-points:41\r\n\r\n# big\r\n"));
    assert_eq!(after.matches('\n').count(), after.matches("\r\n").count());
}

#[test]
fn source_lines_reproduce_fixture_exactly() {
    let source = patch::read_source(
        &PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures/monster.txt"),
    )
    .expect("fixture");
    let original = fs::read_to_string(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures/monster.txt"),
    )
    .expect("fixture");
    assert_eq!(source.to_text(), original);
    assert_eq!(SourceLines::from_text(&original), source);
}

#[test]
fn record_without_hit_points_saves_unchanged() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_data(&dir, CANONICAL);
    let imp = mfe_core::parse_str(CANONICAL)
        .expect("parse")
        .into_iter()
        .find(|m| m.name == "Imp")
        .expect("imp");
    assert_eq!(imp.health, Some(1));

    patch::patch_one(&path, "Imp", &imp, &SaveOptions::default()).expect("patch");
    assert_eq!(fs::read_to_string(&path).expect("read"), CANONICAL);

    let by_name = HashMap::from([("Imp".to_string(), imp)]);
    patch::patch_batch(&path, ["Imp"], &by_name, &SaveOptions::default()).expect("batch");
    assert_eq!(fs::read_to_string(&path).expect("read"), CANONICAL);
}

#[test]
fn large_integers_survive_a_save() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_data(&dir, CANONICAL);
    let mut orc = Monster::new("Orc");
    orc.experience = Some(3_000_000_000);
    patch::patch_one(&path, "Orc", &orc, &SaveOptions::default()).expect("patch");

    let reloaded = mfe_core::parse_str(&fs::read_to_string(&path).expect("read")).expect("parse");
    assert_eq!(reloaded[0].experience, Some(3_000_000_000));
}

#[test]
fn report_lists_unrecognised_lines_of_rewritten_record() {
    let dir = TempDir::new().expect("tempdir");
    let text = "name:Orc\nbase:orc\ndepth:5\nspeed:110\n\nname:Imp\ncolor:r\n";
    let path = write_data(&dir, text);

    let report =
        patch::patch_one(&path, "Orc", &Monster::new("Orc"), &SaveOptions::default())
            .expect("patch");
    assert_eq!(report.dropped, vec!["base:orc", "depth:5"]);
    assert_eq!(
        fs::read_to_string(&path).expect("read"),
        "name:Orc\n\nname:Imp\ncolor:r\n"
    );
}
