//! Fabric quality catalog.

use super::Entity;
use crate::error::FulfillmentError;
use crate::ids;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Numbered color variant of a quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub number: u32,
    pub name: String,
    pub hex: Option<String>,
    pub sample_image: Option<String>,
    pub pantone: Option<String>,
    pub fabric_type: Option<String>,
    pub notes: Option<String>,
}

impl Color {
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            hex: None,
            sample_image: None,
            pantone: None,
            fabric_type: None,
            notes: None,
        }
    }
}

/// Named fabric grade. Color numbers are unique within a quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub colors: Vec<Color>,
    pub created_utc: DateTime<Utc>,
}

impl Quality {
    pub fn new(name: impl Into<String>, colors: Vec<Color>) -> Result<Self, FulfillmentError> {
        let quality = Self {
            id: String::new(),
            name: name.into(),
            colors,
            created_utc: Utc::now(),
        };
        quality.validate()?;
        Ok(quality)
    }

    pub fn validate(&self) -> Result<(), FulfillmentError> {
        if self.name.trim().is_empty() {
            return Err(FulfillmentError::ValidationError(
                "quality name is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for color in &self.colors {
            if !seen.insert(color.number) {
                return Err(FulfillmentError::DuplicateColorNumber {
                    quality: self.name.clone(),
                    number: color.number,
                });
            }
        }
        Ok(())
    }

    pub fn add_color(&mut self, color: Color) -> Result<(), FulfillmentError> {
        if self.color(color.number).is_some() {
            return Err(FulfillmentError::DuplicateColorNumber {
                quality: self.name.clone(),
                number: color.number,
            });
        }
        self.colors.push(color);
        Ok(())
    }

    pub fn color(&self, number: u32) -> Option<&Color> {
        self.colors.iter().find(|c| c.number == number)
    }
}

impl Entity for Quality {
    const KIND: &'static str = "quality";
    const COLLECTION: &'static str = "qualities";
    const ID_PREFIX: &'static str = ids::QUALITY_PREFIX;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
