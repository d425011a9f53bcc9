//! On-disk artifacts of a store directory `<dir>/<name>`:
//!
//! - `<name>.index`: the vector index blob
//! - `<name>.payload`: the key ledger, in position order
//! - `<name>.invpayload`: the key -> position map
//!
//! Every artifact is framed as `magic | body | crc32c(magic | body)`.
//! Each one is written to a `.tmp` sibling and renamed into place, so a
//! single artifact is never torn. The three renames are not atomic as a group.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::index::FlatL2Index;
use crate::ledger::{InverseLookup, KeyLedger};

pub(crate) const INDEX_MAGIC: &[u8; 8] = b"VSTIDX01";
pub(crate) const PAYLOAD_MAGIC: &[u8; 8] = b"VSTKEY01";
pub(crate) const INV_PAYLOAD_MAGIC: &[u8; 8] = b"VSTINV01";
const TRAILER_SIZE: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorePaths {
    pub dir: PathBuf,
    pub index: PathBuf,
    pub payload: PathBuf,
    pub inv_payload: PathBuf,
}

impl StorePaths {
    pub fn new(dir: &Path) -> Self {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        Self {
            dir: dir.to_path_buf(),
            index: dir.join(format!("{name}.index")),
            payload: dir.join(format!("{name}.payload")),
            inv_payload: dir.join(format!("{name}.invpayload")),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [
            self.index.as_path(),
            self.payload.as_path(),
            self.inv_payload.as_path(),
        ]
    }

    pub fn present(&self) -> usize {
        self.all().iter().filter(|p| p.exists()).count()
    }
}

/// What `load` found in the store directory.
pub(crate) enum Loaded {
    Absent,
    Found {
        index: FlatL2Index,
        ledger: KeyLedger,
        lookup: InverseLookup,
    },
}

pub(crate) fn frame(magic: &[u8; 8], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(magic.len() + body.len() + TRAILER_SIZE);
    out.extend_from_slice(magic);
    out.extend_from_slice(body);
    let crc = crc32c::crc32c(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

pub(crate) fn unframe<'a>(magic: &[u8; 8], data: &'a [u8], what: &str) -> Result<&'a [u8]> {
    if data.len() < magic.len() + TRAILER_SIZE {
        return Err(StoreError::corrupt(format!("{what}: file too small")));
    }
    let (framed, trailer) = data.split_at(data.len() - TRAILER_SIZE);
    if &framed[..magic.len()] != magic {
        return Err(StoreError::corrupt(format!("{what}: bad magic")));
    }
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if crc32c::crc32c(framed) != stored {
        return Err(StoreError::corrupt(format!("{what}: checksum mismatch")));
    }
    Ok(&framed[magic.len()..])
}

pub(crate) fn encode_index(index: &FlatL2Index) -> Result<Vec<u8>> {
    Ok(frame(INDEX_MAGIC, &index.encode()?))
}

pub(crate) fn decode_index(data: &[u8]) -> Result<FlatL2Index> {
    FlatL2Index::decode(unframe(INDEX_MAGIC, data, "index")?)
}

pub(crate) fn encode_ledger(ledger: &KeyLedger) -> Result<Vec<u8>> {
    Ok(frame(PAYLOAD_MAGIC, &bincode::serialize(ledger.as_slice())?))
}

pub(crate) fn decode_ledger(data: &[u8]) -> Result<KeyLedger> {
    let keys: Vec<String> = bincode::deserialize(unframe(PAYLOAD_MAGIC, data, "payload")?)?;
    Ok(KeyLedger::from_keys(keys))
}

pub(crate) fn encode_lookup(lookup: &InverseLookup) -> Result<Vec<u8>> {
    Ok(frame(INV_PAYLOAD_MAGIC, &bincode::serialize(&lookup.to_map())?))
}

pub(crate) fn decode_lookup(data: &[u8]) -> Result<InverseLookup> {
    let map: BTreeMap<String, u64> =
        bincode::deserialize(unframe(INV_PAYLOAD_MAGIC, data, "invpayload")?)?;
    Ok(InverseLookup::from_map(map))
}

pub(crate) fn load(paths: &StorePaths) -> Result<Loaded> {
    match paths.present() {
        0 => return Ok(Loaded::Absent),
        3 => {}
        n => {
            return Err(StoreError::corrupt(format!(
                "incomplete store at {}: {n} of 3 artifacts present",
                paths.dir.display()
            )))
        }
    }
    let index = decode_index(&std::fs::read(&paths.index)?)?;
    let ledger = decode_ledger(&std::fs::read(&paths.payload)?)?;
    let lookup = decode_lookup(&std::fs::read(&paths.inv_payload)?)?;
    Ok(Loaded::Found {
        index,
        ledger,
        lookup,
    })
}

/// Writes `data` to `path` through a temporary sibling and a rename.
pub(crate) fn write_atomic(path: &Path, data: &[u8], sync: bool) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(data)?;
        if sync {
            file.sync_data()?;
        }
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn fsync_dir(dir: &Path) -> Result<()> {
    let dir_fd = std::fs::File::open(dir)?;
    dir_fd.sync_all()?;
    Ok(())
}

/// Sizes in bytes of the three artifacts, in write order.
pub(crate) fn store(
    paths: &StorePaths,
    index: &FlatL2Index,
    ledger: &KeyLedger,
    lookup: &InverseLookup,
    sync: bool,
) -> Result<[usize; 3]> {
    let index_bytes = encode_index(index)?;
    let payload_bytes = encode_ledger(ledger)?;
    let inv_bytes = encode_lookup(lookup)?;
    write_atomic(&paths.index, &index_bytes, sync)?;
    write_atomic(&paths.payload, &payload_bytes, sync)?;
    write_atomic(&paths.inv_payload, &inv_bytes, sync)?;
    if sync {
        fsync_dir(&paths.dir)?;
    }
    Ok([index_bytes.len(), payload_bytes.len(), inv_bytes.len()])
}
