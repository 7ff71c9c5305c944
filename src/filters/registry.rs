//! Filter registry for managing available filter types.

use crate::core::action::FilterAction;
use crate::core::error::{ConfigResult, ConfigurationError};
use crate::core::metadata::{Category, FilterMetadata};
use crate::filters::{
    BlurFxFilter, CharcoalFilter, ConvolutionFilter, DistortionFilter, FilmGrainFilter, Filter,
    PixelFilter, RainDropFilter,
};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Factory function building a filter from an action.
pub type FilterFactory = Arc<dyn Fn(&FilterAction) -> ConfigResult<Filter> + Send + Sync>;

/// Registry entry containing metadata and factory.
#[derive(Clone)]
pub struct RegistryEntry {
    /// Factory function to create instances.
    pub factory: FilterFactory,
    /// Cached metadata.
    pub metadata: FilterMetadata,
    /// Whether this filter is enabled.
    pub enabled: bool,
    /// Tags for organization and search.
    pub tags: Vec<String>,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("id", &self.metadata.id)
            .field("enabled", &self.enabled)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Registry for all available filter types.
///
/// Filters are kept in registration order and indexed by category.
#[derive(Debug)]
pub struct FilterRegistry {
    /// Filters indexed by their unique ID.
    filters: IndexMap<String, RegistryEntry>,
    /// Filters grouped by category.
    categories: IndexMap<Category, Vec<String>>,
}

impl FilterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            filters: IndexMap::new(),
            categories: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with built-in filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_filter::<ConvolutionFilter>(&["kernel", "sharpen", "edge"]);
        registry.register_filter::<BlurFxFilter>(&["zoom", "radial", "motion", "mosaic"]);
        registry.register_filter::<DistortionFilter>(&["fisheye", "twirl", "polar", "waves", "tile"]);
        registry.register_filter::<RainDropFilter>(&["lens", "drops"]);
        registry.register_filter::<FilmGrainFilter>(&["noise", "grain"]);
        registry.register_filter::<CharcoalFilter>(&["sketch", "monochrome"]);
        registry
    }

    fn register_filter<F>(&mut self, tags: &[&str])
    where
        F: PixelFilter + Into<Filter> + 'static,
    {
        self.register_with_tags(
            F::metadata(),
            |action: &FilterAction| F::from_action(action).map(Into::into),
            tags.iter().map(|t| t.to_string()).collect(),
        );
    }

    /// Register a filter type.
    pub fn register<F>(&mut self, metadata: FilterMetadata, factory: F)
    where
        F: Fn(&FilterAction) -> ConfigResult<Filter> + Send + Sync + 'static,
    {
        self.register_with_tags(metadata, factory, Vec::new());
    }

    /// Register a filter with additional tags.
    pub fn register_with_tags<F>(&mut self, metadata: FilterMetadata, factory: F, tags: Vec<String>)
    where
        F: Fn(&FilterAction) -> ConfigResult<Filter> + Send + Sync + 'static,
    {
        let id = metadata.id.clone();
        let category = metadata.category;

        let entry = RegistryEntry {
            factory: Arc::new(factory),
            metadata,
            enabled: true,
            tags,
        };

        if self.filters.insert(id.clone(), entry).is_none() {
            self.categories.entry(category).or_default().push(id);
        }
    }

    /// Build a filter from an action.
    pub fn create(&self, action: &FilterAction) -> ConfigResult<Filter> {
        match self.filters.get(&action.identifier) {
            Some(entry) if entry.enabled => (entry.factory)(action),
            _ => Err(ConfigurationError::UnknownFilter(action.identifier.clone())),
        }
    }

    /// An action holding every default parameter of `id`.
    pub fn default_action(&self, id: &str) -> Option<FilterAction> {
        self.get_metadata(id).map(FilterMetadata::default_action)
    }

    /// Get metadata for a filter.
    pub fn get_metadata(&self, id: &str) -> Option<&FilterMetadata> {
        self.filters.get(id).map(|e| &e.metadata)
    }

    /// Get a registry entry.
    pub fn get_entry(&self, id: &str) -> Option<&RegistryEntry> {
        self.filters.get(id)
    }

    /// Check if a filter is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.filters.contains_key(id)
    }

    /// Get all registered filter IDs.
    pub fn filter_ids(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(|s| s.as_str())
    }

    /// Get filters by category.
    pub fn filters_by_category(&self, category: Category) -> Vec<&str> {
        self.categories
            .get(&category)
            .map(|ids| ids.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    /// Search filters by id, name, description or tag.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();

        self.filters
            .iter()
            .filter(|(_, entry)| {
                let name_match = entry.metadata.name.to_lowercase().contains(&query);
                let desc_match = entry.metadata.description.to_lowercase().contains(&query);
                let tag_match = entry.tags.iter().any(|t| t.to_lowercase().contains(&query));
                let id_match = entry.metadata.id.to_lowercase().contains(&query);

                name_match || desc_match || tag_match || id_match
            })
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Enable or disable a filter.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        if let Some(entry) = self.filters.get_mut(id) {
            entry.enabled = enabled;
            true
        } else {
            false
        }
    }

    /// Unregister a filter.
    pub fn unregister(&mut self, id: &str) -> bool {
        if let Some(entry) = self.filters.shift_remove(id) {
            if let Some(ids) = self.categories.get_mut(&entry.metadata.category) {
                ids.retain(|i| i != id);
            }
            true
        } else {
            false
        }
    }

    /// Get the total number of registered filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Enabled filters grouped by category, each group sorted by name.
    pub fn grouped_by_category(&self) -> IndexMap<Category, Vec<&FilterMetadata>> {
        let mut grouped: IndexMap<Category, Vec<&FilterMetadata>> = IndexMap::new();

        for entry in self.filters.values().filter(|e| e.enabled) {
            grouped
                .entry(entry.metadata.category)
                .or_default()
                .push(&entry.metadata);
        }

        for filters in grouped.values_mut() {
            filters.sort_by(|a, b| a.name.cmp(&b.name));
        }

        grouped
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
