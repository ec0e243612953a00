use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};

use super::{InsightPack, pack_from_value};

pub const DEFAULT_PACK_MEMO_CAPACITY: usize = 256;

/// Outcome of reading one pack. Failures never propagate past the loader.
#[derive(Debug, Clone, PartialEq)]
pub enum PackLoad {
    Ready(Rc<InsightPack>),
    Unreadable { reason: String },
}

impl PackLoad {
    /// The parsed pack, or an empty one when it could not be read.
    #[must_use]
    pub fn pack(&self) -> Rc<InsightPack> {
        match self {
            Self::Ready(pack) => Rc::clone(pack),
            Self::Unreadable { .. } => Rc::new(InsightPack::default()),
        }
    }

    /// True when there is nothing to show, either because reading failed or
    /// because the pack carries no findings.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Ready(pack) => pack.is_empty(),
            Self::Unreadable { .. } => true,
        }
    }
}

#[derive(Debug)]
struct MemoEntry {
    load: PackLoad,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Memo {
    entries: HashMap<String, MemoEntry>,
    tick: u64,
}

/// Path-keyed memo of pack reads, bounded with least-recently-used eviction.
/// A file changed after its first read keeps serving the memoized copy.
#[derive(Debug)]
pub struct PackLoader {
    capacity: usize,
    memo: RefCell<Memo>,
}

impl Default for PackLoader {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_PACK_MEMO_CAPACITY)
    }
}

impl PackLoader {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            memo: RefCell::new(Memo::default()),
        }
    }

    pub fn load(&self, path: &Path) -> PackLoad {
        let key = path.to_string_lossy().to_string();
        let mut memo = self.memo.borrow_mut();
        memo.tick += 1;
        let tick = memo.tick;

        if let Some(entry) = memo.entries.get_mut(&key) {
            entry.last_used = tick;
            return entry.load.clone();
        }

        let load = match read_pack(path) {
            Ok(pack) => PackLoad::Ready(Rc::new(pack)),
            Err(error) => PackLoad::Unreadable {
                reason: format!("{error:#}"),
            },
        };

        if memo.entries.len() >= self.capacity {
            let oldest = memo
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                memo.entries.remove(&oldest);
            }
        }
        memo.entries.insert(
            key,
            MemoEntry {
                load: load.clone(),
                last_used: tick,
            },
        );
        load
    }

    #[must_use]
    pub fn memoized(&self) -> usize {
        self.memo.borrow().entries.len()
    }
}

/// Reads and parses one pack file, failing loudly.
pub fn read_pack(path: &Path) -> Result<InsightPack> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pack: {}", path.display()))?;
    let value = serde_json::from_str::<serde_json::Value>(&text)
        .with_context(|| format!("pack is not valid JSON: {}", path.display()))?;
    pack_from_value(value).with_context(|| format!("unusable pack: {}", path.display()))
}
