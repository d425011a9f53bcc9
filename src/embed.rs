//! Glue between a `VectorDb` and whatever turns text into vectors.

use tracing::{debug, info};

use crate::db::VectorDb;
use crate::error::{Result, StoreError};

/// A text embedding model. Implementations must return vectors of exactly
/// `dimension()` floats.
pub trait Embedder {
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

impl<E: Embedder + ?Sized> Embedder for &E {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        (**self).embed(text)
    }
}

fn embed_checked<E: Embedder + ?Sized>(embedder: &E, text: &str) -> Result<Vec<f32>> {
    embedder.embed(text).map_err(|source| StoreError::Embedding {
        input: text.to_string(),
        source,
    })
}

/// Embeds and inserts every text not already stored. Returns how many were
/// inserted. Nothing is written to disk.
pub fn populate<E, I, S>(db: &mut VectorDb, embedder: &E, texts: I) -> Result<usize>
where
    E: Embedder + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if embedder.dimension() != db.dim() {
        return Err(StoreError::DimensionMismatch {
            expected: db.dim(),
            got: embedder.dimension(),
        });
    }
    let mut inserted = 0usize;
    for text in texts {
        let text = text.as_ref();
        if db.contains(text)? {
            continue;
        }
        let vector = embed_checked(embedder, text)?;
        if db.insert(text, &vector)? {
            inserted += 1;
        }
    }
    info!(inserted, total = db.len(), "populated store");
    Ok(inserted)
}

/// Maps a free-form query onto a stored key: the query itself when stored,
/// otherwise the key whose vector is nearest to the query's embedding.
pub fn resolve<E: Embedder + ?Sized>(
    db: &VectorDb,
    embedder: &E,
    query: &str,
) -> Result<Option<String>> {
    if db.contains(query)? {
        return Ok(Some(query.to_string()));
    }
    if db.is_empty() {
        return Ok(None);
    }
    let vector = embed_checked(embedder, query)?;
    let nearest = db.nearest(&vector, 1)?.into_iter().next();
    debug!(query, resolved = ?nearest, "resolved query to stored key");
    Ok(nearest)
}
