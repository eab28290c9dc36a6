use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use reelshop_model::{Product, ProductId};

use crate::error::Result;

/// Liked product ids, optionally persisted as a JSON array.
#[derive(Debug, Clone, Default)]
pub struct LikedProducts {
    ids: BTreeSet<ProductId>,
    path: Option<PathBuf>,
}

impl LikedProducts {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file yields an empty set; a malformed one
    /// is logged and treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ids = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<ProductId>>(&content) {
                Ok(ids) => ids.into_iter().filter(|id| !id.is_empty()).collect(),
                Err(err) => {
                    log::warn!(
                        "[Likes] ignoring malformed {}: {}",
                        path.display(),
                        err
                    );
                    BTreeSet::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(err) => return Err(err.into()),
        };

        log::debug!("[Likes] loaded {} liked products", ids.len());
        Ok(Self {
            ids,
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let ids: Vec<&ProductId> = self.ids.iter().collect();
        let content =
            serde_json::to_string(&ids).map_err(reelshop_model::ModelError::from)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Flip the liked state of `id` and persist. Returns the new state.
    pub fn toggle(&mut self, id: &ProductId) -> Result<bool> {
        let liked = if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        };
        self.save()?;
        Ok(liked)
    }

    pub fn is_liked(&self, id: &ProductId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProductId> {
        self.ids.iter()
    }

    /// Products from `products` that are liked, in their original order.
    pub fn filter<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        if self.ids.is_empty() {
            return Vec::new();
        }
        products
            .iter()
            .filter(|product| !product.product_id.is_empty() && self.is_liked(&product.product_id))
            .collect()
    }
}
