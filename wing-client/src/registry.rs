//! Name-to-id resolution for console parameters.
//!
//! Node ids are what the wire speaks, but callers address parameters by
//! slash-separated path names. A [`NameRegistry`] maps between the two and
//! is injected into a session rather than consulted as a global, so an
//! application talking to consoles with different id maps keeps them apart.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use wing_protocol::NodeId;

use crate::error::Error;

/// Well-known parameter paths of the stock console firmware.
///
/// Covers the handful of parameters most applications touch. A full map
/// for a specific firmware is built by walking the definition tree and
/// feeding the result to [`NameRegistry::from_entries`].
static BUILTIN: Lazy<NameRegistry> = Lazy::new(|| {
    NameRegistry::from_entries([
        ("/ch.1.fdr", 0x0001_8D01),
        ("/ch.1.mute", 0x0001_8D02),
        ("/ch.1.name", 0x0001_8D03),
        ("/ch.1.pan", 0x0001_8D04),
        ("/ch.2.fdr", 0x0001_8E01),
        ("/ch.2.mute", 0x0001_8E02),
        ("/ch.2.name", 0x0001_8E03),
        ("/ch.2.pan", 0x0001_8E04),
        ("/aux.1.fdr", 0x0002_1101),
        ("/aux.1.mute", 0x0002_1102),
        ("/bus.1.fdr", 0x0003_2101),
        ("/bus.1.mute", 0x0003_2102),
        ("/bus.1.name", 0x0003_2103),
        ("/main.1.fdr", 0x0004_3101),
        ("/main.1.mute", 0x0004_3102),
        ("/main.1.name", 0x0004_3103),
        ("/mtx.1.fdr", 0x0005_4101),
        ("/mtx.1.mute", 0x0005_4102),
        ("/dca.1.fdr", 0x0006_5101),
        ("/dca.1.mute", 0x0006_5102),
        ("/dca.1.name", 0x0006_5103),
        ("/cfg.clock", 0x0007_0001),
        ("/cfg.name", 0x0007_0002),
        ("/fx.1.mdl", 0x0008_0101),
    ])
});

/// Bidirectional map between parameter paths and node ids.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    by_name: HashMap<String, NodeId>,
    by_id: HashMap<NodeId, Vec<String>>,
}

impl NameRegistry {
    /// An empty registry; resolution falls back to numeric ids only.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table of well-known stock firmware paths.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    pub fn from_entries<N, I>(entries: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, NodeId)>,
    {
        let mut registry = Self::new();
        for (name, id) in entries {
            registry.insert(name, id);
        }
        registry
    }

    /// Register one mapping. Several names may map to one id; a name maps
    /// to exactly one id and a re-insert replaces the old binding.
    pub fn insert(&mut self, name: impl Into<String>, id: NodeId) {
        let name = name.into();
        if let Some(old) = self.by_name.insert(name.clone(), id) {
            if let Some(names) = self.by_id.get_mut(&old) {
                names.retain(|n| n != &name);
            }
        }
        self.by_id.entry(id).or_default().push(name);
    }

    /// Resolve a name to a node id.
    ///
    /// A string that parses as a decimal integer passes through as a raw
    /// id without touching the table, so callers can mix paths and ids in
    /// one code path.
    pub fn resolve(&self, name: &str) -> Result<NodeId, Error> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }
        if let Ok(id) = name.parse::<NodeId>() {
            return Ok(id);
        }
        Err(Error::NameNotFound(name.to_string()))
    }

    /// All names registered for an id, in insertion order.
    pub fn names_for(&self, id: NodeId) -> &[String] {
        self.by_id.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_names_and_numeric_ids() {
        let registry = NameRegistry::from_entries([("/ch.1.fdr", 1000)]);
        assert_eq!(registry.resolve("/ch.1.fdr").unwrap(), 1000);
        assert_eq!(registry.resolve("424242").unwrap(), 424242);
        assert_eq!(registry.resolve("-7").unwrap(), -7);
        assert!(matches!(
            registry.resolve("/ch.9.fdr"),
            Err(Error::NameNotFound(name)) if name == "/ch.9.fdr"
        ));
        // Numbers with junk are names, not ids.
        assert!(registry.resolve("12abc").is_err());
    }

    #[test]
    fn aliases_share_an_id_and_reinsert_rebinds() {
        let mut registry = NameRegistry::new();
        registry.insert("/ch.1.fdr", 1000);
        registry.insert("/ch.1.fader", 1000);
        assert_eq!(registry.names_for(1000), ["/ch.1.fdr", "/ch.1.fader"]);

        registry.insert("/ch.1.fdr", 2000);
        assert_eq!(registry.resolve("/ch.1.fdr").unwrap(), 2000);
        assert_eq!(registry.names_for(1000), ["/ch.1.fader"]);
        assert_eq!(registry.names_for(2000), ["/ch.1.fdr"]);
    }

    #[test]
    fn builtin_table_is_consistent() {
        let registry = NameRegistry::builtin();
        assert!(!registry.is_empty());
        for (name, &id) in &registry.by_name {
            assert!(registry.names_for(id).iter().any(|n| n == name));
        }
    }
}
