#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use btpage::primitives::pager::Descriptor;
use btpage::storage::btree::page::{FIRST_INTERNAL_LEVEL, LEAF_LEVEL};
use btpage::storage::btree::{OffPageRef, OverflowRef, PageHeader, PageType, PageWriter};
use btpage::storage::btree::{write_overflow_page, ItemType};
use btpage::Addr;
use serde_json::Value;
use tempfile::TempDir;

const UNIT: usize = 512;

fn setup_db(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(format!("{name}.bt"));
    seed_tree(&path).expect("seed tree");
    (dir, path)
}

/// Leaves at 0 and 1 under an internal root at 2; the second leaf's data
/// spills to an overflow page at 3.
fn seed_tree(path: &Path) -> btpage::Result<()> {
    let mut file = vec![0u8; 5 * UNIT];
    let (left, rest) = file.split_at_mut(UNIT);
    let (right, rest) = rest.split_at_mut(UNIT);
    let (root, ovfl) = rest.split_at_mut(UNIT);

    let mut writer = PageWriter::new(
        left,
        Addr::FIRST_PAGE,
        PageHeader::new(PageType::Leaf, LEAF_LEVEL).with_links(Addr(2), Addr::INVALID, Addr(1)),
    )?
    .with_descriptor(&Descriptor {
        root_addr: Addr(2),
        ..Descriptor::new(UNIT as u32, UNIT as u32)
    })?;
    writer.push_key(b"apple")?;
    writer.push_data(b"red")?;
    writer.push_key(b"kiwi")?;
    writer.push_data(b"green")?;
    writer.finish()?;

    let mut writer = PageWriter::new(
        right,
        Addr(1),
        PageHeader::new(PageType::Leaf, LEAF_LEVEL).with_links(Addr(2), Addr(0), Addr::INVALID),
    )?;
    writer.push_key(b"mango")?;
    writer.push_dup(b"ripe")?;
    writer.push_dup(b"unripe")?;
    writer.push_key(b"plum")?;
    writer.push_overflow(
        ItemType::DataOverflow,
        &OverflowRef {
            len: 700,
            addr: Addr(3),
        },
    )?;
    writer.finish()?;

    let mut writer = PageWriter::new(
        root,
        Addr(2),
        PageHeader::new(PageType::Internal, FIRST_INTERNAL_LEVEL),
    )?;
    for (key, records, child) in [(&b"a"[..], 2u64, 0u32), (&b"m"[..], 3, 1)] {
        writer.push_key(key)?;
        writer.push_offpage(&OffPageRef {
            records,
            addr: Addr(child),
            level: LEAF_LEVEL,
        })?;
    }
    writer.finish()?;

    write_overflow_page(ovfl, &[0x5A; 700])?;
    fs::write(path, file)?;
    Ok(())
}

fn json_of(args: &[&str], path: &Path) -> Value {
    let output = cargo_bin_cmd!("btpage")
        .args(["--format", "json"])
        .args(args)
        .arg(path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("valid json")
}

#[test]
fn create_writes_a_verifiable_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("new.bt");
    cargo_bin_cmd!("btpage")
        .args(["create", "--leaf-size", "1024", "--internal-size", "512"])
        .arg(&path)
        .assert()
        .success();
    assert_eq!(fs::metadata(&path).expect("metadata").len(), 1024);

    let info = json_of(&["info"], &path);
    assert_eq!(info["leaf_page_size"], 1024);
    assert_eq!(info["internal_page_size"], 512);
    assert_eq!(info["root_addr"], 0);
    assert!(info["free_addr"].is_null());
    assert_eq!(info["first_page_ok"], true);

    let verify = json_of(&["verify"], &path);
    assert_eq!(verify["success"], true);
    assert_eq!(verify["pages_checked"], 1);
}

#[test]
fn create_refuses_to_overwrite() {
    let (_dir, path) = setup_db("existing");
    cargo_bin_cmd!("btpage")
        .arg("create")
        .arg(&path)
        .assert()
        .failure()
        .code(1);
}

#[test]
fn page_reports_internal_entries() {
    let (_dir, path) = setup_db("internal");
    let output = cargo_bin_cmd!("btpage")
        .args(["--format", "json", "page"])
        .arg(&path)
        .arg("2")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let page: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(page["kind"], "internal");
    assert_eq!(page["entries"], 4);
    assert_eq!(page["checksum"]["ok"], true);
    assert_eq!(page["index"]["entries"], 2);
    assert_eq!(page["index"]["records"], 5);
    assert_eq!(page["items"][1]["reference"], "records=2 addr=0 level=0");
}

#[test]
fn first_page_holds_the_first_leaf() {
    let (_dir, path) = setup_db("first");
    let info = json_of(&["info"], &path);
    assert_eq!(info["root_addr"], 2);
    assert_eq!(info["first_page_ok"], true);

    let output = cargo_bin_cmd!("btpage")
        .args(["--format", "json", "page"])
        .arg(&path)
        .arg("0")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let page: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(page["kind"], "leaf");
    assert_eq!(page["level"], 0);
    assert_eq!(page["items"][0]["offset"], 96);
}

#[test]
fn page_text_shows_hex_previews() {
    let (_dir, path) = setup_db("text");
    let output = cargo_bin_cmd!("btpage")
        .arg("page")
        .arg(&path)
        .arg("1")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("type=leaf"), "{text}");
    assert!(text.contains(&hex::encode(b"mango")), "{text}");
    assert!(text.contains("len=700 addr=3"), "{text}");
    assert!(text.contains("records=3"), "{text}");
}

#[test]
fn verify_detects_damage() {
    let (_dir, path) = setup_db("damaged");
    assert_eq!(json_of(&["verify"], &path)["pages_checked"], 4);

    let mut bytes = fs::read(&path).expect("read db");
    bytes[UNIT + 100] ^= 0x80;
    fs::write(&path, &bytes).expect("write db");

    let output = cargo_bin_cmd!("btpage")
        .args(["--format", "json", "verify"])
        .arg(&path)
        .assert()
        .failure()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(report["success"], false);
    assert_eq!(report["findings"][0]["addr"], 1);
    assert_eq!(report["findings"][0]["severity"], "error");
}

#[test]
fn config_file_sets_the_allocation_unit() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        "[format]\nalloc_size = 1024\nleaf_page_size = 2048\ninternal_page_size = 1024\nextent_size = 8192\n",
    )
    .expect("write config");
    let path = dir.path().join("big.bt");
    cargo_bin_cmd!("btpage")
        .arg("--config")
        .arg(&config)
        .arg("create")
        .arg(&path)
        .assert()
        .success();
    assert_eq!(fs::metadata(&path).expect("metadata").len(), 2048);

    cargo_bin_cmd!("btpage")
        .env("BTPAGE_CONFIG", &config)
        .arg("verify")
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    cargo_bin_cmd!("btpage")
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("info")
        .arg(dir.path().join("absent.bt"))
        .assert()
        .failure()
        .code(1);
}
