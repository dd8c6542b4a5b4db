use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

/// Maps `(type, field)` to the ordered set of service URLs able to resolve it.
///
/// The first URL registered for a field is its preferred owner. The registry is
/// built once per composed schema and is only read while planning.
#[derive(Clone, Debug, Default)]
pub struct FieldLocationRegistry {
    locations: HashMap<String, IndexMap<String, IndexSet<String>>>,
}

impl FieldLocationRegistry {
    pub fn new() -> Self {
        FieldLocationRegistry::default()
    }

    /// Registering the same URL twice for a field is a no-op.
    pub fn register_url(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        url: impl Into<String>,
    ) {
        self.locations
            .entry(type_name.into())
            .or_default()
            .entry(field_name.into())
            .or_default()
            .insert(url.into());
    }

    pub fn urls_for(&self, type_name: &str, field_name: &str) -> Vec<&str> {
        self.locations
            .get(type_name)
            .and_then(|fields| fields.get(field_name))
            .map(|urls| urls.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Picks the URL a field should be fetched from. The active URL wins when it
    /// can resolve the field, so the field stays in the step being built;
    /// otherwise the first registered URL is used.
    pub fn preferred_url<'a>(
        &'a self,
        type_name: &str,
        field_name: &str,
        active_url: &str,
    ) -> Option<&'a str> {
        let urls = self.locations.get(type_name)?.get(field_name)?;
        urls.get(active_url)
            .or_else(|| urls.first())
            .map(String::as_str)
    }

    /// First URL registered for any field of the type.
    pub fn first_url_for_type(&self, type_name: &str) -> Option<&str> {
        self.locations
            .get(type_name)?
            .values()
            .find_map(|urls| urls.first())
            .map(String::as_str)
    }
}
