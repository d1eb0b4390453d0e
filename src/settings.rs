//! Setting definitions exposed to a host UI, and the explicit "extend schema" operation
//! that adds the Z offset settings to a machine's `platform_adhesion` category.

use serde::{Deserialize, Serialize};

pub const PLATFORM_ADHESION_CATEGORY: &str = "platform_adhesion";
pub const Z_OFFSET_KEY: &str = "adhesion_z_offset";
pub const EXTENSIVE_Z_OFFSET_KEY: &str = "adhesion_extensive_z_offset";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Float,
    Bool,
}

/// A single user-visible setting. Expression fields are evaluated by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingDefinition {
    pub key: String,
    pub label: String,
    pub description: String,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub default_value: serde_json::Value,
    /// Expression form of the default, takes priority over `default_value` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_value_warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<String>,
    pub settable_per_mesh: bool,
    pub settable_per_extruder: bool,
    pub settable_per_meshgroup: bool,
}

impl SettingDefinition {
    /// The offset itself, in millimeters.
    pub fn z_offset() -> Self {
        Self {
            key: Z_OFFSET_KEY.to_string(),
            label: "Z Offset".to_string(),
            description: "An additional distance between the nozzle and the build platform."
                .to_string(),
            setting_type: SettingType::Float,
            unit: Some("mm".to_string()),
            default_value: serde_json::json!(0),
            value: None,
            minimum_value: Some("-(layer_height_0 + 0.15)".to_string()),
            maximum_value_warning: Some("layer_height_0".to_string()),
            enabled: None,
            settable_per_mesh: false,
            settable_per_extruder: false,
            settable_per_meshgroup: false,
        }
    }

    /// Extensive processing toggle. Defaults on for Griffin firmware.
    pub fn extensive_z_offset() -> Self {
        Self {
            key: EXTENSIVE_Z_OFFSET_KEY.to_string(),
            label: "Extensive Z Offset Processing".to_string(),
            description: "Apply the Z Offset throughout the Gcode file instead of affecting the coordinate system. Turning this option on will increase the processing time so it is recommended to leave it off.".to_string(),
            setting_type: SettingType::Bool,
            unit: None,
            default_value: serde_json::json!(false),
            value: Some(format!("machine_gcode_flavor == \"{}\"", crate::config::GRIFFIN_FLAVOR)),
            minimum_value: None,
            maximum_value_warning: None,
            enabled: Some(format!("{} != 0", Z_OFFSET_KEY)),
            settable_per_mesh: false,
            settable_per_extruder: false,
            settable_per_meshgroup: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SettingCategory {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub children: Vec<SettingDefinition>,
}

impl SettingCategory {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendOutcome {
    Added,
    AlreadyPresent,
    CategoryMissing,
}

/// A machine definition's setting tree, flattened to categories.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SettingSchema {
    #[serde(default)]
    pub categories: Vec<SettingCategory>,
}

impl SettingSchema {
    pub fn find_category(&self, key: &str) -> Option<&SettingCategory> {
        self.categories.iter().find(|c| c.key == key)
    }

    pub fn find_definition(&self, key: &str) -> Option<&SettingDefinition> {
        self.categories
            .iter()
            .flat_map(|c| c.children.iter())
            .find(|d| d.key == key)
    }

    /// Add `definition` under `category_key` unless the key is already defined anywhere.
    pub fn extend_category(
        &mut self,
        category_key: &str,
        definition: SettingDefinition,
    ) -> ExtendOutcome {
        if self.find_definition(&definition.key).is_some() {
            return ExtendOutcome::AlreadyPresent;
        }
        match self.categories.iter_mut().find(|c| c.key == category_key) {
            Some(category) => {
                tracing::debug!("Adding setting '{}' to '{}'", definition.key, category_key);
                category.children.push(definition);
                ExtendOutcome::Added
            }
            None => ExtendOutcome::CategoryMissing,
        }
    }
}

/// Register both Z offset settings with a machine definition.
pub fn register_z_offset_settings(schema: &mut SettingSchema) -> [ExtendOutcome; 2] {
    [
        schema.extend_category(PLATFORM_ADHESION_CATEGORY, SettingDefinition::z_offset()),
        schema.extend_category(
            PLATFORM_ADHESION_CATEGORY,
            SettingDefinition::extensive_z_offset(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adhesion_schema() -> SettingSchema {
        SettingSchema {
            categories: vec![
                SettingCategory::new("resolution", "Quality"),
                SettingCategory::new(PLATFORM_ADHESION_CATEGORY, "Build Plate Adhesion"),
            ],
        }
    }

    #[test]
    fn test_register_adds_once() {
        let mut schema = adhesion_schema();
        assert_eq!(
            register_z_offset_settings(&mut schema),
            [ExtendOutcome::Added, ExtendOutcome::Added]
        );
        assert_eq!(
            register_z_offset_settings(&mut schema),
            [ExtendOutcome::AlreadyPresent, ExtendOutcome::AlreadyPresent]
        );
        let category = schema.find_category(PLATFORM_ADHESION_CATEGORY).unwrap();
        assert_eq!(category.children.len(), 2);
        assert_eq!(schema.find_definition(Z_OFFSET_KEY).unwrap().unit.as_deref(), Some("mm"));
    }

    #[test]
    fn test_register_without_category() {
        let mut schema = SettingSchema::default();
        assert_eq!(
            register_z_offset_settings(&mut schema),
            [ExtendOutcome::CategoryMissing, ExtendOutcome::CategoryMissing]
        );
        assert!(schema.find_definition(Z_OFFSET_KEY).is_none());
    }

    #[test]
    fn test_serializes_type_field() {
        let json = serde_json::to_value(SettingDefinition::extensive_z_offset()).unwrap();
        assert_eq!(json["type"], "bool");
        assert_eq!(json["value"], "machine_gcode_flavor == \"Griffin\"");
        assert!(json.get("unit").is_none());
    }
}
