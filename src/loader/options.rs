use std::path::PathBuf;

use crate::container::endianness::Endianness;
use crate::container::header::MIN_VERSION;
use crate::prog::types::PayloadPass;

pub const DEFAULT_ENTRY_POINT: &str = "MAIN";

/// Knobs for a single load. Every field has a working default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// Order the loaded data blocks are converted to. Defaults to the native order.
    pub host_order: Endianness,
    pub min_version: u32,
    /// Procedure cached as the module's entry point, if present.
    pub entry_point: String,
    pub load_sources: bool,
    /// Directory relative source paths are resolved against.
    pub source_root: Option<PathBuf>,
    /// Bounds-check data blocks even when no swapping is needed.
    pub verify_payloads: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            host_order: Endianness::native(),
            min_version: MIN_VERSION,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            load_sources: true,
            source_root: None,
            verify_payloads: true,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host_order(mut self, order: Endianness) -> Self {
        self.host_order = order;
        self
    }

    pub fn with_min_version(mut self, version: u32) -> Self {
        self.min_version = version;
        self
    }

    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }

    pub fn with_sources(mut self, load: bool) -> Self {
        self.load_sources = load;
        self
    }

    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }

    pub fn with_payload_checks(mut self, verify: bool) -> Self {
        self.verify_payloads = verify;
        self
    }

    pub fn payload_pass(&self) -> PayloadPass {
        PayloadPass::for_host(self.host_order, self.verify_payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_native_host() {
        let options = LoadOptions::default();
        assert_eq!(options.host_order, Endianness::native());
        assert_eq!(options.entry_point, "MAIN");
        assert!(options.load_sources);
        assert_eq!(options.min_version, MIN_VERSION);
    }

    #[test]
    fn big_endian_host_always_swaps() {
        let options = LoadOptions::new()
            .with_host_order(Endianness::Big)
            .with_payload_checks(false);
        assert_eq!(options.payload_pass(), PayloadPass::Swap);
        let options = LoadOptions::new()
            .with_host_order(Endianness::Little)
            .with_payload_checks(false);
        assert_eq!(options.payload_pass(), PayloadPass::Skip);
    }
}
