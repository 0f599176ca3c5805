use crate::engine::build_tree;
use crate::entry::Entry;
use crate::error::PathError;
use crate::filter::Filter;

// ---------------------------------------------------------------------------
// TreeBuilder
// ---------------------------------------------------------------------------

/// Configures and runs a tree build or listing for one path expression.
///
/// Created via [`pathtree::tree()`](crate::tree). Configure with chained
/// builder methods, then call [`build()`](TreeBuilder::build) for the tree or
/// [`list()`](TreeBuilder::list) for a flat sequence.
///
/// # Example
///
/// ```rust,ignore
/// let files = pathtree::tree("~/Music/*")
///     .max_depth(3)
///     .filter(RegexFilter::from_pattern(r"\.mp3$")?)
///     .list()?;
/// ```
pub struct TreeBuilder {
    path:         String,
    filters:      Vec<Box<dyn Filter>>,
    max_depth:    usize,
    include_root: bool,
}

impl TreeBuilder {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self {
            path:         path.into(),
            filters:      Vec::new(),
            max_depth:    1,
            include_root: false,
        }
    }

    // ── Filters ───────────────────────────────────────────────────────────

    /// Add a filter. An entry must pass every filter to be kept.
    pub fn filter(mut self, f: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(f));
        self
    }

    /// Add several boxed filters at once.
    pub fn filters(mut self, fs: impl IntoIterator<Item = Box<dyn Filter>>) -> Self {
        self.filters.extend(fs);
        self
    }

    // ── Options ───────────────────────────────────────────────────────────

    /// Levels of children to materialize. `0` resolves the path only, `1`
    /// adds its immediate children, and so on. Defaults to `1`.
    pub fn max_depth(mut self, d: usize) -> Self {
        self.max_depth = d;
        self
    }

    /// Whether [`list()`](TreeBuilder::list) includes the root entry itself.
    /// Disabled by default.
    pub fn include_root(mut self, yes: bool) -> Self {
        self.include_root = yes;
        self
    }

    // ── Execute ───────────────────────────────────────────────────────────

    /// Build the entry tree.
    ///
    /// # Errors
    ///
    /// Any normalization, stat, directory read or filter failure aborts the
    /// build; no partial tree is returned.
    pub fn build(&self) -> Result<Entry, PathError> {
        build_tree(&self.path, self.max_depth, &self.filter_refs())
    }

    /// Build the tree and flatten it. See [`list`](crate::list).
    pub fn list(&self) -> Result<Vec<Entry>, PathError> {
        crate::list(&self.path, self.max_depth, self.include_root, &self.filter_refs())
    }

    fn filter_refs(&self) -> Vec<&dyn Filter> {
        self.filters.iter().map(|f| &**f).collect()
    }
}
