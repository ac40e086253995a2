use std::fs;
use std::path::Path;

use tempfile::tempdir;

use super::*;
use crate::primitives::pager::{write_descriptor, Descriptor, FormatOptions};
use crate::storage::btree::page::{seal_page, FIRST_INTERNAL_LEVEL, LEAF_LEVEL};
use crate::storage::btree::{
    write_overflow_page, ItemType, OffPageRef, OverflowRef, PageHeader, PageType, PageWriter,
};
use crate::types::{Addr, BtPageError};

const UNIT: u32 = 512;

fn small_format() -> FormatOptions {
    FormatOptions::default()
        .alloc_size(UNIT)
        .leaf_page_size(UNIT)
        .internal_page_size(UNIT)
        .extent_size(UNIT * 8)
}

/// First leaf at 0 whose second value spills to an overflow page spanning
/// addresses 1..3, under an internal root at 3.
fn write_sample_tree(path: &Path) -> crate::types::Result<()> {
    let mut file = Vec::new();

    let mut leaf = vec![0u8; UNIT as usize];
    let mut writer = PageWriter::new(
        &mut leaf,
        Addr::FIRST_PAGE,
        PageHeader::new(PageType::Leaf, LEAF_LEVEL).with_links(
            Addr(3),
            Addr::INVALID,
            Addr::INVALID,
        ),
    )?
    .with_descriptor(&Descriptor {
        root_addr: Addr(3),
        ..Descriptor::new(UNIT, UNIT)
    })?;
    writer.push_key(b"apple")?;
    writer.push_data(b"red")?;
    writer.push_key(b"banana")?;
    writer.push_overflow(
        ItemType::DataOverflow,
        &OverflowRef {
            len: 600,
            addr: Addr(1),
        },
    )?;
    writer.finish()?;
    file.extend_from_slice(&leaf);

    let mut ovfl = vec![0u8; 2 * UNIT as usize];
    write_overflow_page(&mut ovfl, &[0xAB; 600])?;
    file.extend_from_slice(&ovfl);

    let mut root = vec![0u8; UNIT as usize];
    let mut writer = PageWriter::new(
        &mut root,
        Addr(3),
        PageHeader::new(PageType::Internal, FIRST_INTERNAL_LEVEL),
    )?;
    writer.push_key(b"a")?;
    writer.push_offpage(&OffPageRef {
        records: 2,
        addr: Addr::FIRST_PAGE,
        level: LEAF_LEVEL,
    })?;
    writer.finish()?;
    file.extend_from_slice(&root);

    fs::write(path, file)?;
    Ok(())
}

/// An internal page at address 0 carrying a descriptor, which the writer
/// refuses to produce.
fn write_internal_first_page(path: &Path) -> crate::types::Result<()> {
    let mut page = vec![0u8; UNIT as usize];
    let mut writer = PageWriter::new(
        &mut page,
        Addr::FIRST_PAGE,
        PageHeader::new(PageType::Internal, FIRST_INTERNAL_LEVEL),
    )?;
    writer.push_key(b"a")?;
    writer.push_offpage(&OffPageRef {
        records: 0,
        addr: Addr(1),
        level: LEAF_LEVEL,
    })?;
    writer.finish()?;
    write_descriptor(&mut page, &Descriptor::new(UNIT, UNIT))?;
    seal_page(&mut page)?;
    fs::write(path, page)?;
    Ok(())
}

#[test]
fn create_then_info() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("fresh.bt");
    let report = create(&path, &small_format())?;
    assert_eq!(report.file_size, u64::from(UNIT));
    assert_eq!(fs::metadata(&path)?.len(), u64::from(UNIT));

    let info = info(&path, UNIT)?;
    assert_eq!((info.major, info.minor), (1, 1));
    assert_eq!(info.leaf_page_size, UNIT);
    assert_eq!(info.root_addr, Some(0));
    assert_eq!(info.free_addr, None);
    assert!(info.first_page_ok);

    assert!(matches!(
        create(&path, &small_format()),
        Err(AdminError::AlreadyExists(_))
    ));
    Ok(())
}

#[test]
fn create_rejects_invalid_format() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("bad.bt");
    let opts = small_format().leaf_page_size(700);
    assert!(matches!(
        create(&path, &opts),
        Err(AdminError::Format(BtPageError::Invalid(_)))
    ));
    assert!(!path.exists());
    Ok(())
}

#[test]
fn missing_file_is_reported() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("absent.bt");
    assert!(matches!(
        info(&path, UNIT),
        Err(AdminError::MissingDatabase(_))
    ));
}

#[test]
fn inspect_reports_items_and_index() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("tree.bt");
    write_sample_tree(&path)?;

    let root = inspect_page(&path, UNIT, Addr(3))?;
    assert_eq!(root.kind, "internal");
    assert_eq!(root.entries, Some(2));
    assert!(root.checksum.ok);
    assert_eq!(root.items[0].offset, 32);
    assert_eq!(root.items[0].preview, "61");
    assert_eq!(
        root.items[1].reference.as_deref(),
        Some("records=2 addr=0 level=0")
    );
    let index = root.index.expect("index summary");
    assert_eq!(index.entries, 1);
    assert_eq!(index.records, 2);

    let ovfl = inspect_page(&path, UNIT, Addr(1))?;
    assert_eq!(ovfl.kind, "overflow");
    assert_eq!(ovfl.size, 2 * UNIT);
    assert_eq!(ovfl.data_len, Some(600));
    assert_eq!(ovfl.entries, None);
    assert!(ovfl.overflow_preview.as_deref().is_some_and(|p| p.starts_with("abab")));

    let leaf = inspect_page(&path, UNIT, Addr::FIRST_PAGE)?;
    assert_eq!(leaf.kind, "leaf");
    assert_eq!(leaf.parent, Some(3));
    assert_eq!(leaf.prev, None);
    assert_eq!(leaf.items.len(), 4);
    assert_eq!(leaf.items[0].offset, 96);
    assert_eq!(leaf.items[0].preview, hex::encode(b"apple"));
    assert_eq!(leaf.items[3].reference.as_deref(), Some("len=600 addr=1"));
    assert!(leaf.error.is_none());
    Ok(())
}

#[test]
fn verify_walks_every_page() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("tree.bt");
    write_sample_tree(&path)?;

    let report = verify(&path, UNIT)?;
    assert!(report.success, "findings: {:?}", report.findings);
    assert_eq!(report.pages_checked, 3);
    assert_eq!(report.pages_by_kind.get("overflow"), Some(&1));
    assert_eq!(report.pages_by_kind.get("leaf"), Some(&1));
    assert!(report.findings.is_empty());
    assert!(info(&path, UNIT)?.first_page_ok);
    Ok(())
}

#[test]
fn first_page_must_be_a_leaf() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("internal-first.bt");
    write_internal_first_page(&path)?;

    let report = verify(&path, UNIT)?;
    assert!(!report.success);
    assert_eq!(report.pages_by_kind.get("internal"), Some(&1));
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].addr, 0);
    assert_eq!(report.findings[0].severity, VerifySeverity::Error);
    assert!(
        report.findings[0].message.contains("first leaf"),
        "{}",
        report.findings[0].message
    );

    assert!(!info(&path, UNIT)?.first_page_ok);
    Ok(())
}

#[test]
fn verify_flags_damaged_pages() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("tree.bt");
    write_sample_tree(&path)?;
    let mut bytes = fs::read(&path)?;
    bytes[3 * UNIT as usize + 40] ^= 0x01;
    fs::write(&path, &bytes)?;

    let report = verify(&path, UNIT)?;
    assert!(!report.success);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].addr, 3);
    assert_eq!(report.findings[0].severity, VerifySeverity::Error);

    let page = inspect_page(&path, UNIT, Addr(3))?;
    assert!(!page.checksum.ok);
    Ok(())
}

#[test]
fn verify_skips_zeroed_space() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("tree.bt");
    write_sample_tree(&path)?;
    let mut bytes = fs::read(&path)?;
    bytes.extend(std::iter::repeat(0u8).take(UNIT as usize));
    fs::write(&path, &bytes)?;

    let report = verify(&path, UNIT)?;
    assert!(report.success);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].severity, VerifySeverity::Warning);
    assert_eq!(report.findings[0].addr, 4);
    Ok(())
}
