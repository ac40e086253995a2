use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::primitives::pager::{read_descriptor, FormatOptions};
use crate::storage::btree::page::{is_first_leaf, PAGE_HDR_LEN};
use crate::storage::btree::{PageType, PageView};
use crate::types::{Addr, BtPageError};

use crate::admin::error::Result;
use crate::admin::util::{display_path, PageFile};

const MAX_FINDINGS: usize = 32;

/// Indicates the severity level of a verification finding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySeverity {
    /// Space that holds no page, such as a zero-filled extent.
    Warning,
    /// Damage that fails verification.
    Error,
}

/// Represents a single issue discovered during verification.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyFinding {
    /// The severity level of this finding.
    pub severity: VerifySeverity,
    /// Address of the page the finding is about.
    pub addr: u32,
    /// Human-readable description of the issue.
    pub message: String,
}

/// Complete report of a verification walk.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// Path of the verified file.
    pub path: String,
    /// Whether no error-level finding was recorded.
    pub success: bool,
    /// Pages whose checksum and items were checked.
    pub pages_checked: u64,
    /// Checked pages by page type name.
    pub pages_by_kind: BTreeMap<&'static str, u64>,
    /// Issues discovered, capped at a fixed number.
    pub findings: Vec<VerifyFinding>,
    /// Findings dropped once the cap was reached.
    pub findings_truncated: u64,
}

struct Findings {
    list: Vec<VerifyFinding>,
    truncated: u64,
    errors: u64,
}

impl Findings {
    fn push(&mut self, severity: VerifySeverity, addr: Addr, message: impl Into<String>) {
        if severity == VerifySeverity::Error {
            self.errors += 1;
        }
        if self.list.len() >= MAX_FINDINGS {
            self.truncated += 1;
            return;
        }
        self.list.push(VerifyFinding {
            severity,
            addr: addr.0,
            message: message.into(),
        });
    }

    fn error(&mut self, addr: Addr, message: impl Into<String>) {
        self.push(VerifySeverity::Error, addr, message);
    }
}

/// Walks every page of the file from address 0, verifying each checksum and
/// building each page's index.
///
/// Pages are sized from their header: overflow pages by their data length,
/// other pages by the descriptor's leaf or internal size for their level.
/// Unreadable headers and type-0 pages advance by one allocation unit.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its descriptor is
/// unusable; page-level damage is reported in the [`VerifyReport`].
pub fn verify(path: impl AsRef<Path>, alloc_size: u32) -> Result<VerifyReport> {
    let path = path.as_ref();
    let mut file = PageFile::open(path, alloc_size)?;
    let (_, opts) = file.descriptor()?;
    let unit = file.unit();
    let mut findings = Findings {
        list: Vec::new(),
        truncated: 0,
        errors: 0,
    };
    let mut pages_by_kind = BTreeMap::new();
    let mut pages_checked = 0u64;

    let mut offset = 0u64;
    while offset < file.len() {
        let addr = unit.to_addr(offset)?;
        if file.len() - offset < PAGE_HDR_LEN as u64 {
            findings.error(addr, "trailing bytes shorter than a page header");
            break;
        }
        let step = match check_page(&mut file, addr, &opts) {
            Ok((kind, size)) => {
                pages_checked += 1;
                *pages_by_kind.entry(kind.name()).or_insert(0) += 1;
                size
            }
            Err(PageProblem::Unused) => {
                findings.push(VerifySeverity::Warning, addr, "no page here (type 0)");
                unit.size()
            }
            Err(PageProblem::Unsized(err)) => {
                findings.error(addr, format!("unreadable page header: {err}"));
                unit.size()
            }
            Err(PageProblem::Damaged { kind, size, err }) => {
                pages_checked += 1;
                *pages_by_kind.entry(kind.name()).or_insert(0) += 1;
                findings.error(addr, format!("{kind} page: {err}"));
                size
            }
            Err(PageProblem::Truncated(size)) => {
                findings.error(addr, format!("{size}-byte page extends past end of file"));
                break;
            }
        };
        offset += u64::from(step);
    }

    let success = findings.errors == 0;
    if success {
        debug!(path = %path.display(), pages_checked, "verification passed");
    } else {
        warn!(path = %path.display(), errors = findings.errors, "verification failed");
    }
    Ok(VerifyReport {
        path: display_path(path),
        success,
        pages_checked,
        pages_by_kind,
        findings: findings.list,
        findings_truncated: findings.truncated,
    })
}

enum PageProblem {
    Unused,
    Unsized(String),
    Truncated(u32),
    Damaged {
        kind: PageType,
        size: u32,
        err: BtPageError,
    },
}

fn check_page(
    file: &mut PageFile,
    addr: Addr,
    opts: &FormatOptions,
) -> std::result::Result<(PageType, u32), PageProblem> {
    let (header, size) = file
        .probe(addr, opts)
        .map_err(|err| PageProblem::Unsized(err.to_string()))?;
    if header.kind == PageType::Invalid {
        return Err(PageProblem::Unused);
    }
    let bytes = file
        .read_page(addr, size)
        .map_err(|_| PageProblem::Truncated(size))?;
    let damaged = |err| PageProblem::Damaged {
        kind: header.kind,
        size,
        err,
    };
    PageView::load(&bytes, addr).map_err(damaged)?;
    if addr == Addr::FIRST_PAGE {
        if !is_first_leaf(&header) {
            return Err(damaged(BtPageError::MalformedPage(
                "address 0 must hold the first leaf page",
            )));
        }
        read_descriptor(&bytes).map_err(damaged)?;
    }
    Ok((header.kind, size))
}
