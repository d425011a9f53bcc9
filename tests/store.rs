use std::path::Path;

use tempfile::TempDir;
use vecstore::{OpenState, StoreError, StoreOptions, VectorDb};

fn options() -> StoreOptions {
    StoreOptions {
        fsync_writes: false,
        ..Default::default()
    }
}

fn open(path: &Path, dim: usize) -> anyhow::Result<VectorDb> {
    Ok(VectorDb::with_options(path, dim, options())?.open()?)
}

fn keys_of(db: &VectorDb) -> anyhow::Result<Vec<String>> {
    Ok(db.keys()?.to_vec())
}

fn seeded(path: &Path) -> anyhow::Result<VectorDb> {
    let mut db = open(path, 2)?;
    db.insert("a", &[0.0, 0.0])?;
    db.insert("b", &[1.0, 0.0])?;
    db.insert("c", &[5.0, 5.0])?;
    Ok(db)
}

#[test]
fn insert_is_idempotent() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mut db = seeded(&dir.path().join("s"))?;
    let before_keys = keys_of(&db)?;
    let before_nearest = db.nearest(&[4.0, 4.0], 3)?;

    assert!(!db.insert("b", &[100.0, 100.0])?);
    assert_eq!(db.len(), 3);
    assert_eq!(keys_of(&db)?, before_keys);
    assert_eq!(db.nearest(&[4.0, 4.0], 3)?, before_nearest);
    assert_eq!(db.search_vector("b")?, vec![1.0, 0.0]);
    Ok(())
}

#[test]
fn nearest_returns_keys_in_distance_order() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let db = seeded(&dir.path().join("s"))?;
    assert_eq!(db.nearest(&[0.1, 0.0], 2)?, vec!["a", "b"]);
    assert_eq!(db.nearest(&[4.0, 4.0], 1)?, vec!["c"]);
    assert_eq!(db.nearest(&[0.0, 0.0], 10)?.len(), 3);
    Ok(())
}

#[test]
fn nearest_breaks_ties_by_insertion_order() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mut db = open(&dir.path().join("s"), 1)?;
    db.insert("right", &[1.0])?;
    db.insert("left", &[-1.0])?;
    assert_eq!(db.nearest(&[0.0], 2)?, vec!["right", "left"]);
    Ok(())
}

#[test]
fn nearest_rejects_wrong_dimension() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let db = seeded(&dir.path().join("s"))?;
    let err = db.nearest(&[0.0, 0.0, 0.0], 1).unwrap_err();
    assert!(matches!(
        err,
        StoreError::DimensionMismatch {
            expected: 2,
            got: 3
        }
    ));
    Ok(())
}

#[test]
fn removal_renumbers_following_positions() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mut db = seeded(&dir.path().join("s"))?;
    assert!(db.remove_at(0)?);
    assert_eq!(keys_of(&db)?, vec!["b", "c"]);
    assert_eq!(db.search_vector("b")?, vec![1.0, 0.0]);
    assert_eq!(db.position_of("c")?, Some(1));
    assert!(!db.contains("a")?);
    assert_eq!(db.nearest(&[0.0, 0.0], 1)?, vec!["b"]);
    db.check()?;
    Ok(())
}

#[test]
fn remove_by_key_and_missing_key() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mut db = seeded(&dir.path().join("s"))?;
    assert!(db.remove_by_key("b")?);
    assert!(!db.remove_by_key("b")?);
    assert_eq!(keys_of(&db)?, vec!["a", "c"]);
    assert_eq!(db.search_vector("b")?, vec![0.0, 0.0]);
    db.check()?;
    Ok(())
}

#[test]
fn empty_store_queries_do_not_fail() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let db = open(&dir.path().join("s"), 3)?;
    assert_eq!(db.state(), OpenState::Fresh);
    assert!(!db.initialized()?);
    assert!(db.nearest(&[1.0, 2.0, 3.0], 5)?.is_empty());
    assert_eq!(db.search_vector("anything")?, vec![0.0; 3]);
    assert!(db.keys()?.is_empty());
    Ok(())
}

#[test]
fn write_and_reopen_round_trips() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("aspects");
    {
        let mut db = seeded(&path)?;
        db.insert("d", &[-2.5, 0.125])?;
        db.remove_by_key("b")?;
        db.write()?;
        // A second write overwrites in place.
        db.write()?;
    }

    let paths = vecstore::storage::StorePaths::new(&path);
    assert!(paths.index.ends_with("aspects.index"));
    assert!(paths.payload.exists() && paths.inv_payload.exists());

    let db = open(&path, 2)?;
    assert_eq!(db.state(), OpenState::Existing);
    assert!(db.initialized()?);
    assert_eq!(keys_of(&db)?, vec!["a", "c", "d"]);
    let expect = [("a", [0.0, 0.0]), ("c", [5.0, 5.0]), ("d", [-2.5, 0.125])];
    for (key, vector) in expect {
        let got = db.search_vector(key)?;
        for (g, e) in got.iter().zip(vector) {
            assert!((g - e).abs() < 1e-6, "{key}: {got:?}");
        }
    }
    assert_eq!(db.nearest(&[-2.0, 0.0], 1)?, vec!["d"]);
    db.check()?;
    Ok(())
}

#[test]
fn unwritten_mutations_are_lost() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("s");
    {
        let mut db = seeded(&path)?;
        db.write()?;
        db.insert("late", &[9.0, 9.0])?;
        assert!(db.is_dirty());
    }
    let db = open(&path, 2)?;
    assert_eq!(db.len(), 3);
    assert!(!db.contains("late")?);
    Ok(())
}

/// Overwrites the index artifact of `target` with the one from `donor`.
fn splice_index(donor: &Path, target: &Path) -> anyhow::Result<()> {
    let donor = vecstore::storage::StorePaths::new(donor);
    let target = vecstore::storage::StorePaths::new(target);
    std::fs::copy(&donor.index, &target.index)?;
    Ok(())
}

#[test]
fn row_count_mismatch_fails_open() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("s");
    let donor = dir.path().join("donor").join("s");
    {
        let mut db = seeded(&path)?;
        db.write()?;
        let mut small = open(&donor, 2)?;
        small.insert("only", &[0.0, 0.0])?;
        small.write()?;
    }
    splice_index(&donor, &path)?;

    let mut db = VectorDb::with_options(&path, 2, options())?;
    let err = db.open_in_place().unwrap_err();
    assert!(err.is_corruption());
    assert!(err.to_string().contains("row count mismatch"), "{err}");
    assert!(matches!(
        err,
        StoreError::Consistency {
            index_rows: 1,
            keys: 3,
            ..
        }
    ));
    assert_eq!(db.state(), OpenState::Failed);
    assert!(!db.initialized()?);
    assert_eq!(db.len(), 0);
    assert!(matches!(db.keys(), Err(StoreError::NotOpened)));
    assert!(matches!(
        db.insert("x", &[0.0, 0.0]),
        Err(StoreError::NotOpened)
    ));
    Ok(())
}

#[test]
fn stored_dimension_must_match() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("s");
    seeded(&path)?.write()?;
    let err = VectorDb::with_options(&path, 4, options())?
        .open()
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::DimensionMismatch {
            expected: 4,
            got: 2
        }
    ));
    Ok(())
}

#[test]
fn missing_artifact_is_corruption() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("s");
    let mut db = seeded(&path)?;
    db.write()?;
    std::fs::remove_file(&db.paths().payload)?;
    let err = db.open_in_place().unwrap_err();
    assert!(err.is_corruption());
    assert_eq!(db.state(), OpenState::Failed);
    Ok(())
}

#[test]
fn truncated_artifact_is_corruption() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("s");
    let mut db = seeded(&path)?;
    db.write()?;
    let payload = db.paths().payload.clone();
    let bytes = std::fs::read(&payload)?;
    std::fs::write(&payload, &bytes[..bytes.len() / 2])?;
    let err = db.open_in_place().unwrap_err();
    assert!(err.is_corruption(), "{err}");
    Ok(())
}

#[test]
fn reopen_after_failure_recovers_when_files_are_fixed() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("s");
    let mut db = seeded(&path)?;
    db.write()?;
    let payload = db.paths().payload.clone();
    let good = std::fs::read(&payload)?;
    std::fs::write(&payload, b"garbage")?;
    assert!(db.open_in_place().is_err());

    std::fs::write(&payload, good)?;
    db.open_in_place()?;
    assert_eq!(db.state(), OpenState::Existing);
    assert_eq!(db.len(), 3);
    Ok(())
}

fn assert_failed_consistency(path: &Path, detail: &str) -> anyhow::Result<()> {
    let mut db = VectorDb::with_options(path, 2, options())?;
    let err = db.open_in_place().unwrap_err();
    assert!(
        matches!(err, StoreError::Consistency { index_rows: 2, keys: 2, .. }),
        "{err}"
    );
    assert!(err.to_string().contains(detail), "{err}");
    assert_eq!(db.state(), OpenState::Failed);
    assert!(!db.initialized()?);
    assert!(matches!(db.keys(), Err(StoreError::NotOpened)));
    Ok(())
}

#[test]
fn inverse_lookup_disagreement_fails_open() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("s");
    let donor = dir.path().join("donor").join("s");
    {
        let mut db = open(&path, 2)?;
        db.insert("a", &[0.0, 0.0])?;
        db.insert("b", &[1.0, 0.0])?;
        db.write()?;
        let mut swapped = open(&donor, 2)?;
        swapped.insert("b", &[1.0, 0.0])?;
        swapped.insert("a", &[0.0, 0.0])?;
        swapped.write()?;
    }
    let donor = vecstore::storage::StorePaths::new(&donor);
    let target = vecstore::storage::StorePaths::new(&path);
    std::fs::copy(&donor.inv_payload, &target.inv_payload)?;

    assert_failed_consistency(&path, "inverse lookup disagrees with ledger at position 0")
}

/// Frames a payload body the way the store does: magic, body, crc32c LE.
fn framed_payload(keys: &[&str]) -> anyhow::Result<Vec<u8>> {
    let owned: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    let mut out = b"VSTKEY01".to_vec();
    out.extend_from_slice(&bincode::serialize(&owned)?);
    let crc = crc32c::crc32c(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

#[test]
fn duplicate_key_in_ledger_fails_open() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("s");
    {
        let mut db = open(&path, 2)?;
        db.insert("a", &[0.0, 0.0])?;
        db.insert("b", &[1.0, 0.0])?;
        db.write()?;
    }
    let paths = vecstore::storage::StorePaths::new(&path);
    // Sanity check on the framing helper: an identical payload still opens.
    std::fs::write(&paths.payload, framed_payload(&["a", "b"])?)?;
    assert_eq!(open(&path, 2)?.len(), 2);

    std::fs::write(&paths.payload, framed_payload(&["a", "a"])?)?;
    assert_failed_consistency(&path, "inverse lookup disagrees with ledger at position 1")
}
