//! Resource list tables.
//!
//! Every resource list page is rendered from a [`DataTableConfig`]: its
//! columns, its select filters, the bulk actions offered for selected rows,
//! and what to show when nothing matches.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableColumn {
    pub key: String,
    pub label: String,
    /// Hidden columns are rendered with `hidden` and toggled client-side.
    pub default_visible: bool,
}

impl TableColumn {
    #[must_use]
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            default_visible: true,
        }
    }

    #[must_use]
    pub const fn visible(mut self, visible: bool) -> Self {
        self.default_visible = visible;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

impl FilterOption {
    #[must_use]
    pub fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

/// A `<select>` above the table. The empty "All" option is implied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableFilter {
    /// Query parameter the filter sets.
    pub key: String,
    pub label: String,
    pub options: Vec<FilterOption>,
}

impl TableFilter {
    #[must_use]
    pub fn select(key: &str, label: &str, options: Vec<FilterOption>) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            options,
        }
    }

    /// The `status` filter, from `(value, label)` pairs.
    #[must_use]
    pub fn status<'a>(label: &str, options: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let options = options
            .into_iter()
            .map(|(value, label)| FilterOption::new(value, label))
            .collect();
        Self::select("status", label, options)
    }
}

/// An action that can be run on the selected rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkAction {
    /// Posted as `action`.
    pub key: String,
    pub label: String,
    /// Phosphor icon class.
    pub icon: String,
    /// Asks for confirmation before submitting.
    pub destructive: bool,
}

impl BulkAction {
    #[must_use]
    pub fn new(key: &str, label: &str, icon: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            icon: icon.to_string(),
            destructive: false,
        }
    }

    #[must_use]
    pub const fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }

    #[must_use]
    pub fn delete() -> Self {
        Self::new("delete", "Delete", "ph-trash").destructive()
    }

    /// Activate/deactivate pair for resources with an `is_active` flag.
    #[must_use]
    pub fn activation() -> [Self; 2] {
        [
            Self::new("activate", "Activate", "ph-check-circle"),
            Self::new("deactivate", "Deactivate", "ph-prohibit"),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataTableConfig {
    /// DOM id of the table; the bulk form is `{table_id}-bulk`.
    pub table_id: String,
    pub columns: Vec<TableColumn>,
    pub filters: Vec<TableFilter>,
    pub bulk_actions: Vec<BulkAction>,
    pub search_placeholder: String,
    pub empty_icon: String,
    pub empty_title: String,
    pub empty_description: Option<String>,
    /// Whether the row checkboxes and action bar are shown.
    pub has_bulk_actions: bool,
}

impl DataTableConfig {
    #[must_use]
    pub fn new(table_id: &str) -> Self {
        Self {
            table_id: table_id.to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            bulk_actions: Vec::new(),
            search_placeholder: "Search...".to_string(),
            empty_icon: "ph-list".to_string(),
            empty_title: "Nothing here yet".to_string(),
            empty_description: None,
            has_bulk_actions: false,
        }
    }

    #[must_use]
    pub fn column(mut self, column: TableColumn) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: TableFilter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn bulk_action(mut self, action: BulkAction) -> Self {
        self.has_bulk_actions = true;
        self.bulk_actions.push(action);
        self
    }

    #[must_use]
    pub fn bulk_actions(self, actions: impl IntoIterator<Item = BulkAction>) -> Self {
        actions.into_iter().fold(self, Self::bulk_action)
    }

    #[must_use]
    pub fn search_placeholder(mut self, placeholder: &str) -> Self {
        self.search_placeholder = placeholder.to_string();
        self
    }

    #[must_use]
    pub fn empty_state(mut self, icon: &str, title: &str, description: Option<&str>) -> Self {
        self.empty_icon = icon.to_string();
        self.empty_title = title.to_string();
        self.empty_description = description.map(ToString::to_string);
        self
    }

    /// Whether `key` names one of the bulk actions.
    #[must_use]
    pub fn offers_action(&self, key: &str) -> bool {
        self.bulk_actions.iter().any(|a| a.key == key)
    }

    /// Drop bulk actions a read-only user cannot run.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.bulk_actions.clear();
        self.has_bulk_actions = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DataTableConfig {
        DataTableConfig::new("brands")
            .column(TableColumn::new("name", "Name"))
            .column(TableColumn::new("website", "Website").visible(false))
            .filter(TableFilter::status("Status", [("active", "Active"), ("inactive", "Inactive")]))
            .bulk_actions(BulkAction::activation())
            .bulk_action(BulkAction::delete())
            .search_placeholder("Search brands...")
    }

    #[test]
    fn test_builder() {
        let config = config();
        assert!(config.has_bulk_actions);
        assert_eq!(config.bulk_actions.len(), 3);
        assert!(config.bulk_actions[2].destructive);
        assert!(!config.columns[1].default_visible);
        assert_eq!(config.filters[0].key, "status");
        assert_eq!(config.filters[0].options[1], FilterOption::new("inactive", "Inactive"));
    }

    #[test]
    fn test_offers_action() {
        let config = config();
        assert!(config.offers_action("activate"));
        assert!(!config.offers_action("archive"));
        assert!(!config.read_only().offers_action("delete"));
    }

    #[test]
    fn test_empty_state() {
        let config = DataTableConfig::new("x").empty_state("ph-tag", "No brands", Some("Add one"));
        assert_eq!(config.empty_icon, "ph-tag");
        assert_eq!(config.empty_description.as_deref(), Some("Add one"));
    }
}
