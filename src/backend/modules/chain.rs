//! Ordered list of locators consulted during resolution.

use std::path::PathBuf;

use tracing::debug;

use super::locator::{Locator, Resource};
use super::path::ModuleId;

/// Locators in registration order; the first one holding a module wins.
#[derive(Clone, Debug)]
pub struct ResolutionChain {
    locators: Vec<Locator>,
    default_root: PathBuf,
    extension: String,
}

impl ResolutionChain {
    /// A chain holding one directory locator for `default_root`.
    pub fn new(default_root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let default_root = default_root.into();
        Self {
            locators: vec![Locator::directory(default_root.clone())],
            default_root,
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn locators(&self) -> &[Locator] {
        &self.locators
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    pub fn add(&mut self, locator: Locator) {
        debug!(repository = %locator, "adding repository");
        self.locators.push(locator);
    }

    /// Remove the locator at `index`; out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<Locator> {
        if index >= self.locators.len() {
            return None;
        }
        let removed = self.locators.remove(index);
        debug!(repository = %removed, "removed repository");
        Some(removed)
    }

    /// Drop every locator and restore the single default directory.
    pub fn reset(&mut self) {
        self.locators.clear();
        self.locators.push(Locator::directory(self.default_root.clone()));
    }

    /// Find the first locator holding `id`.
    pub fn find(&self, id: &ModuleId) -> Option<Resource> {
        self.locate(id).map(|(_, resource)| resource)
    }

    /// Find the first locator holding `id`, with the id that matched there.
    pub fn locate(&self, id: &ModuleId) -> Option<(ModuleId, Resource)> {
        for locator in &self.locators {
            if let Some((matched, resource)) = locator.locate(id, &self.extension) {
                debug!(module = %id, uri = %resource, "module found");
                return Some((matched, resource));
            }
        }
        debug!(module = %id, repositories = self.locators.len(), "module not found");
        None
    }

    /// Normalize `raw` and find it; empty ids resolve to nothing.
    pub fn resolve(&self, raw: &str) -> Option<Resource> {
        self.find(&ModuleId::normalize(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo_with(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "").unwrap();
        }
        dir
    }

    #[test]
    fn test_first_registered_wins() {
        let a = repo_with(&["shared.sx", "only_a.sx"]);
        let b = repo_with(&["shared.sx", "only_b.sx"]);
        let mut chain = ResolutionChain::new(a.path(), ".sx");
        chain.add(Locator::directory(b.path()));

        assert_eq!(
            chain.resolve("shared"),
            Some(Resource::File(a.path().join("shared.sx")))
        );
        assert_eq!(
            chain.resolve("/only_b"),
            Some(Resource::File(b.path().join("only_b.sx")))
        );
        assert_eq!(chain.resolve("nowhere"), None);
        assert_eq!(chain.resolve("  "), None);
    }

    #[test]
    fn test_remove_is_exact_and_bounds_checked() {
        let a = repo_with(&[]);
        let mut chain = ResolutionChain::new(a.path(), ".sx");
        chain.add(Locator::directory("/one"));
        chain.add(Locator::directory("/two"));
        chain.add(Locator::directory("/three"));

        assert_eq!(chain.remove(2), Some(Locator::directory("/two")));
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.remove(10), None);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.locators()[2], Locator::directory("/three"));
    }

    #[test]
    fn test_reset_restores_default() {
        let mut chain = ResolutionChain::new("/default", ".sx");
        chain.add(Locator::directory("/extra"));
        chain.remove(0);
        chain.reset();
        assert_eq!(chain.locators(), &[Locator::directory("/default")]);
    }
}
