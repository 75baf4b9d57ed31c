//! Document-level tables: properties, settings and user strings.

use crate::model::id::{Id, NIL_ID};

/// Provenance of the model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelProperties {
    pub application_name: String,
    pub application_url: String,
    pub created_by: String,
    pub last_edited_by: String,
    pub revision_count: i32,
    pub notes: String,
}

/// Length unit of model coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum UnitSystem {
    None = 0,
    Microns = 1,
    #[default]
    Millimeters = 2,
    Centimeters = 3,
    Meters = 4,
    Kilometers = 5,
    Inches = 8,
    Feet = 9,
}

impl UnitSystem {
    pub fn from_u8(v: u8) -> Option<UnitSystem> {
        match v {
            0 => Some(UnitSystem::None),
            1 => Some(UnitSystem::Microns),
            2 => Some(UnitSystem::Millimeters),
            3 => Some(UnitSystem::Centimeters),
            4 => Some(UnitSystem::Meters),
            5 => Some(UnitSystem::Kilometers),
            8 => Some(UnitSystem::Inches),
            9 => Some(UnitSystem::Feet),
            _ => None,
        }
    }
}

/// Model-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub unit_system: UnitSystem,
    pub absolute_tolerance: f64,
    pub angle_tolerance: f64,
    pub relative_tolerance: f64,
    /// Layer new objects go on; nil means the default layer.
    pub current_layer_id: Id,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            unit_system: UnitSystem::Millimeters,
            absolute_tolerance: 0.001,
            angle_tolerance: std::f64::consts::PI / 180.0,
            relative_tolerance: 0.01,
            current_layer_id: NIL_ID,
        }
    }
}

/// Ordered key/value text pairs attached to the document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserStrings {
    entries: Vec<(String, String)>,
}

impl UserStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_strings_keep_order_and_replace() {
        let mut strings = UserStrings::new();
        strings.set("b", "1");
        strings.set("a", "2");
        strings.set("b", "3");
        assert_eq!(strings.iter().collect::<Vec<_>>(), vec![("b", "3"), ("a", "2")]);
        assert_eq!(strings.remove("b").as_deref(), Some("3"));
        assert_eq!(strings.get("b"), None);
        assert_eq!(strings.len(), 1);
    }

    #[test]
    fn test_unit_system_tags() {
        assert_eq!(UnitSystem::from_u8(8), Some(UnitSystem::Inches));
        assert_eq!(UnitSystem::from_u8(6), None);
    }
}
