//! Configuration.

use crate::error::{Error, Result};

/// Default branching factor.
pub const DEFAULT_MAX_CHILDREN: usize = 16;

/// Smallest branching factor that still splits into non-empty halves.
pub const MIN_MAX_CHILDREN: usize = 3;

/// Largest branching factor; child labels are four digits.
pub const MAX_MAX_CHILDREN: usize = 4096;

/// Configuration for a Merkle B-tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// A node splits once it holds this many entries.
    pub max_children: usize,
}

impl TreeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_MAX_CHILDREN..=MAX_MAX_CHILDREN).contains(&self.max_children) {
            return Err(Error::InvalidConfig(format!(
                "max_children must be in {}..={}, got {}",
                MIN_MAX_CHILDREN, MAX_MAX_CHILDREN, self.max_children
            )));
        }
        Ok(())
    }

    /// Fewest entries a non-root node may hold: `ceil(max_children / 2) - 1`.
    pub fn min_entries(&self) -> usize {
        (self.max_children + 1) / 2 - 1
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_children: DEFAULT_MAX_CHILDREN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TreeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_children, 16);
        assert_eq!(config.min_entries(), 7);
    }

    #[test]
    fn test_bounds() {
        assert!(TreeConfig { max_children: 2 }.validate().is_err());
        assert!(TreeConfig { max_children: 3 }.validate().is_ok());
        assert!(TreeConfig { max_children: 4096 }.validate().is_ok());
        assert!(matches!(
            TreeConfig { max_children: 4097 }.validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_min_entries() {
        assert_eq!(TreeConfig { max_children: 3 }.min_entries(), 1);
        assert_eq!(TreeConfig { max_children: 4 }.min_entries(), 1);
        assert_eq!(TreeConfig { max_children: 5 }.min_entries(), 2);
    }
}
