//! Admin display configuration.
//!
//! Modules describe how their record types appear in an admin listing
//! (columns, field groups, inline children). The registry gathers the entries
//! into an [`AdminSite`] once at startup; nothing here is mutated afterwards.

use std::collections::BTreeMap;

use serde::Serialize;

/// Display configuration for one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelAdmin {
    pub model: String,
    pub list_display: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fieldsets: Vec<Fieldset>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inlines: Vec<Inline>,
}

/// A titled group of fields on the edit form. `None` is the untitled leading group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fieldset {
    pub title: Option<String>,
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
}

/// Child records edited alongside their parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inline {
    pub model: String,
    pub style: InlineStyle,
    /// Number of blank child forms offered
    pub extra: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineStyle {
    Stacked,
    Tabular,
}

impl ModelAdmin {
    /// Entry that lists records by their display string only.
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            list_display: vec!["__str__".to_string()],
            fieldsets: Vec::new(),
            inlines: Vec::new(),
        }
    }

    pub fn list_display(mut self, columns: &[&str]) -> Self {
        self.list_display = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn fieldset(mut self, title: Option<&str>, fields: &[&str]) -> Self {
        self.fieldsets.push(Fieldset {
            title: title.map(str::to_string),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            classes: Vec::new(),
        });
        self
    }

    /// Same as [`ModelAdmin::fieldset`], rendered collapsed.
    pub fn collapsed_fieldset(mut self, title: &str, fields: &[&str]) -> Self {
        self = self.fieldset(Some(title), fields);
        if let Some(last) = self.fieldsets.last_mut() {
            last.classes.push("collapse".to_string());
        }
        self
    }

    pub fn inline(mut self, model: &str, style: InlineStyle, extra: u8) -> Self {
        self.inlines.push(Inline {
            model: model.to_string(),
            style,
            extra,
        });
        self
    }
}

/// Startup-built table of every registered [`ModelAdmin`], keyed by `app.model`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AdminSite {
    entries: BTreeMap<String, ModelAdmin>,
}

impl AdminSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. A later registration for the same `app.model` replaces the earlier one.
    pub fn register(&mut self, app: &str, entry: ModelAdmin) {
        let key = format!("{}.{}", app, entry.model);
        if self.entries.insert(key.clone(), entry).is_some() {
            tracing::warn!(%key, "admin entry registered twice; keeping the latest");
        }
    }

    pub fn get(&self, app: &str, model: &str) -> Option<&ModelAdmin> {
        self.entries.get(&format!("{app}.{model}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelAdmin)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
