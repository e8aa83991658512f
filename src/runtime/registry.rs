use std::sync::Arc;

use rustc_hash::FxHashMap as HashMap;

use super::codelet::Codelet;

/// Explicit table of codelets, built when the runtime is constructed and
/// dropped with it. Operations are looked up by name at submission time;
/// there are no static registration tables.
#[derive(Debug, Default)]
pub struct Registry {
    codelets: HashMap<&'static str, Arc<Codelet>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, codelet: Codelet) {
        let name = codelet.name();
        if self.codelets.insert(name, Arc::new(codelet)).is_some() {
            log::warn!("codelet {name} replaced in registry");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Codelet>> {
        self.codelets.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.codelets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codelets.is_empty()
    }
}
