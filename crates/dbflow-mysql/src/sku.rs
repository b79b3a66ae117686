//! Pricing tier names
//!
//! The provider identifies a SKU by a single name of the form
//! `<tier prefix>_<family>_<capacity>`, e.g. `GP_Gen5_2`.

use crate::error::{MySqlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pricing tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkuTier {
    #[default]
    Basic,
    GeneralPurpose,
    MemoryOptimized,
}

impl SkuTier {
    /// Prefix used in SKU names
    pub fn prefix(&self) -> &'static str {
        match self {
            SkuTier::Basic => "B",
            SkuTier::GeneralPurpose => "GP",
            SkuTier::MemoryOptimized => "MO",
        }
    }

    pub fn from_prefix(prefix: &str) -> Result<Self> {
        match prefix {
            "B" => Ok(SkuTier::Basic),
            "GP" => Ok(SkuTier::GeneralPurpose),
            "MO" => Ok(SkuTier::MemoryOptimized),
            other => Err(MySqlError::InvalidTier(other.to_string())),
        }
    }
}

impl fmt::Display for SkuTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkuTier::Basic => write!(f, "Basic"),
            SkuTier::GeneralPurpose => write!(f, "GeneralPurpose"),
            SkuTier::MemoryOptimized => write!(f, "MemoryOptimized"),
        }
    }
}

impl FromStr for SkuTier {
    type Err = MySqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Basic" => Ok(SkuTier::Basic),
            "GeneralPurpose" => Ok(SkuTier::GeneralPurpose),
            "MemoryOptimized" => Ok(SkuTier::MemoryOptimized),
            other => Err(MySqlError::InvalidTier(other.to_string())),
        }
    }
}

/// Desired SKU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub tier: SkuTier,

    /// Compute units, e.g. vCores
    pub capacity: u32,

    /// Hardware generation, e.g. `Gen5`
    pub family: String,
}

impl Sku {
    pub fn new(tier: SkuTier, family: impl Into<String>, capacity: u32) -> Self {
        Self {
            tier,
            capacity,
            family: family.into(),
        }
    }

    /// Provider SKU name
    pub fn name(&self) -> String {
        format!("{}_{}_{}", self.tier.prefix(), self.family, self.capacity)
    }

    /// Parse a provider SKU name
    pub fn parse(name: &str) -> Result<Self> {
        let mut parts = name.split('_');
        let (Some(prefix), Some(family), Some(capacity), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            tracing::debug!("SKU name {:?} is not <tier>_<family>_<capacity>", name);
            return Err(MySqlError::InvalidSku(name.to_string()));
        };

        if family.is_empty() {
            return Err(MySqlError::InvalidSku(name.to_string()));
        }

        let tier = SkuTier::from_prefix(prefix)?;
        let capacity = capacity
            .parse()
            .map_err(|_| MySqlError::InvalidCapacity(capacity.to_string()))?;

        Ok(Self::new(tier, family, capacity))
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_name() {
        assert_eq!(Sku::new(SkuTier::GeneralPurpose, "Gen5", 2).name(), "GP_Gen5_2");
        assert_eq!(Sku::new(SkuTier::Basic, "Gen5", 1).name(), "B_Gen5_1");
        assert_eq!(Sku::new(SkuTier::MemoryOptimized, "Gen5", 32).to_string(), "MO_Gen5_32");
    }

    #[test]
    fn test_parse_sku_name() {
        let sku = Sku::parse("MO_Gen5_16").unwrap();
        assert_eq!(sku.tier, SkuTier::MemoryOptimized);
        assert_eq!(sku.family, "Gen5");
        assert_eq!(sku.capacity, 16);
    }

    #[test]
    fn test_parse_invalid_sku_name() {
        assert!(matches!(Sku::parse("GP_Gen5"), Err(MySqlError::InvalidSku(_))));
        assert!(matches!(Sku::parse("GP__2"), Err(MySqlError::InvalidSku(_))));
        assert!(matches!(Sku::parse("GP_Gen5_2_x"), Err(MySqlError::InvalidSku(_))));
        assert!(matches!(Sku::parse("XX_Gen5_2"), Err(MySqlError::InvalidTier(_))));
        assert!(matches!(
            Sku::parse("GP_Gen5_two"),
            Err(MySqlError::InvalidCapacity(_))
        ));
    }

    #[test]
    fn test_tier_from_str() {
        assert_eq!("GeneralPurpose".parse::<SkuTier>().unwrap(), SkuTier::GeneralPurpose);
        assert!("Premium".parse::<SkuTier>().is_err());
    }
}
