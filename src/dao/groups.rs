//! Permission-group directory consulted when validating the tier ladder.

/// Source of the group identifiers a tier may reference.
pub trait GroupDirectory: Send + Sync {
    /// Every group known to the permission backend.
    fn groups(&self) -> Vec<String>;
}

/// Directory backed by a fixed list, usually taken from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticGroupDirectory {
    groups: Vec<String>,
}

impl StaticGroupDirectory {
    /// Build a directory from group names; lookups are case-insensitive.
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups
                .into_iter()
                .map(|group| group.into().trim().to_lowercase())
                .collect(),
        }
    }
}

impl GroupDirectory for StaticGroupDirectory {
    fn groups(&self) -> Vec<String> {
        self.groups.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_normalised() {
        let directory = StaticGroupDirectory::new(["  Gold ", "SILVER"]);
        assert_eq!(directory.groups(), vec!["gold", "silver"]);
    }
}
