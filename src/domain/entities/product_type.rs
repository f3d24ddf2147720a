use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    Select,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Select => "select",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(FieldType::Text),
            "number" => Some(FieldType::Number),
            "boolean" => Some(FieldType::Boolean),
            "date" => Some(FieldType::Date),
            "select" => Some(FieldType::Select),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductType {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductFieldDefinition {
    pub id: Uuid,
    pub product_type_id: Uuid,
    pub field_name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub order_position: i32,
    /// Stored for front-ends; not evaluated server side.
    pub regex: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub multiple_values: bool,
    pub options: Vec<String>,
}

impl ProductFieldDefinition {
    pub fn validate_value(&self, value: &str) -> Result<(), String> {
        let name = &self.field_name;
        match self.field_type {
            FieldType::Text => Ok(()),
            FieldType::Number => {
                let number: f64 = value
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid number format for field '{name}'"))?;
                if let Some(min) = self.min_value
                    && number < min
                {
                    return Err(format!("Field '{name}' must be at least {min}"));
                }
                if let Some(max) = self.max_value
                    && number > max
                {
                    return Err(format!("Field '{name}' must be at most {max}"));
                }
                Ok(())
            }
            FieldType::Boolean => match value {
                "true" | "false" => Ok(()),
                _ => Err(format!("Invalid boolean value for field '{name}'")),
            },
            FieldType::Date => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map(|_| ())
                .map_err(|_| format!("Invalid date for field '{name}', expected YYYY-MM-DD")),
            FieldType::Select => {
                if self.options.iter().any(|o| o == value) {
                    Ok(())
                } else {
                    Err(format!(
                        "Invalid value '{value}' for field '{name}'. Allowed values: {}",
                        self.options.join(", ")
                    ))
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantOptionDefinition {
    pub id: Uuid,
    pub product_type_id: Uuid,
    pub option_name: String,
    pub required: bool,
    pub order_position: i32,
    pub allowed_values: Vec<String>,
}

/// A product type together with its field and variant option definitions.
#[derive(Debug, Clone, Serialize)]
pub struct ProductTypeDetails {
    #[serde(flatten)]
    pub product_type: ProductType,
    pub fields: Vec<ProductFieldDefinition>,
    pub variant_options: Vec<VariantOptionDefinition>,
}

impl ProductTypeDetails {
    /// Check product field values against the type's field definitions.
    pub fn validate_field_values(&self, values: &[(String, String)]) -> Result<(), String> {
        for (field_name, _) in values {
            if !self.fields.iter().any(|f| &f.field_name == field_name) {
                return Err(format!("Unknown field '{field_name}' for this product type"));
            }
        }

        for def in &self.fields {
            let matching: Vec<&str> = values
                .iter()
                .filter(|(name, _)| name == &def.field_name)
                .map(|(_, value)| value.as_str())
                .collect();

            if matching.is_empty() {
                if def.required {
                    return Err(format!("Required field '{}' is missing", def.field_name));
                }
                continue;
            }
            if matching.len() > 1 && !def.multiple_values {
                return Err(format!("Field '{}' accepts a single value", def.field_name));
            }
            for value in matching {
                def.validate_value(value)?;
            }
        }
        Ok(())
    }

    /// Check a variant's option values against the type's option definitions.
    pub fn validate_variant_options(&self, options: &HashMap<String, String>) -> Result<(), String> {
        for def in &self.variant_options {
            let value = options.get(&def.option_name);
            let blank = value.is_none_or(|v| v.trim().is_empty());
            if def.required && blank {
                return Err(format!("Required variant option '{}' is missing", def.option_name));
            }
            if let Some(value) = value
                && !def.allowed_values.is_empty()
                && !def.allowed_values.contains(value)
            {
                return Err(format!(
                    "Invalid value '{value}' for option '{}'. Allowed values: {}",
                    def.option_name,
                    def.allowed_values.join(", ")
                ));
            }
        }
        Ok(())
    }
}
