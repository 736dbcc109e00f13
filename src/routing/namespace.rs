//! Catalog namespace matching
//!
//! Tables under a catalog namespace (e.g. `iceberg_catalog.sales.orders`)
//! are readable by the local engine directly and never count as external.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

/// Case-insensitive glob set over catalog namespace names.
#[derive(Debug, Clone)]
pub struct CatalogNamespaces {
    patterns: Vec<String>,
    set: GlobSet,
}

impl CatalogNamespaces {
    pub fn new<I, S>(patterns: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            builder.add(compile(pattern)?);
            kept.push(pattern.to_string());
        }
        Ok(Self {
            patterns: kept,
            set: builder.build()?,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True if `name` is a catalog namespace.
    pub fn is_catalog(&self, name: &str) -> bool {
        self.set.is_match(name.trim_matches('"'))
    }

    /// True if the first segment of a dotted reference is a catalog namespace.
    pub fn qualifies(&self, reference: &str) -> bool {
        reference
            .split('.')
            .next()
            .is_some_and(|first| self.is_catalog(first.trim()))
    }
}

impl Default for CatalogNamespaces {
    fn default() -> Self {
        let mut builder = GlobSetBuilder::new();
        if let Ok(glob) = compile("iceberg_catalog") {
            builder.add(glob);
        }
        Self {
            patterns: vec!["iceberg_catalog".to_string()],
            set: builder.build().unwrap_or_else(|_| GlobSet::empty()),
        }
    }
}

fn compile(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).case_insensitive(true).build()
}
