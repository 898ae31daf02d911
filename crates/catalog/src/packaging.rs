use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockline_core::DomainError;

/// Denomination of a transfer or ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackagingType {
    /// Sealed cartons.
    Box,
    /// Loose pieces.
    Unit,
}

impl PackagingType {
    pub fn as_str(self) -> &'static str {
        match self {
            PackagingType::Box => "box",
            PackagingType::Unit => "unit",
        }
    }
}

impl core::fmt::Display for PackagingType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackagingType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "box" | "boxes" => Ok(PackagingType::Box),
            "unit" | "units" => Ok(PackagingType::Unit),
            other => Err(DomainError::validation(format!(
                "packaging type must be one of: box, unit (got '{other}')"
            ))),
        }
    }
}

/// Which packaging types an item type may be moved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackagingRule {
    BoxOnly,
    UnitOnly,
    Both,
}

impl PackagingRule {
    pub fn allows(self, packaging: PackagingType) -> bool {
        matches!(
            (self, packaging),
            (PackagingRule::Both, _)
                | (PackagingRule::BoxOnly, PackagingType::Box)
                | (PackagingRule::UnitOnly, PackagingType::Unit)
        )
    }

    /// Whether `unitsPerBox` carries meaning for this rule.
    pub fn uses_boxes(self) -> bool {
        !matches!(self, PackagingRule::UnitOnly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PackagingRule::BoxOnly => "box_only",
            PackagingRule::UnitOnly => "unit_only",
            PackagingRule::Both => "both",
        }
    }
}

impl FromStr for PackagingRule {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "box_only" => Ok(PackagingRule::BoxOnly),
            "unit_only" => Ok(PackagingRule::UnitOnly),
            "both" => Ok(PackagingRule::Both),
            other => Err(DomainError::validation(format!(
                "packaging rule must be one of: box_only, unit_only, both (got '{other}')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_compatibility_matrix() {
        assert!(PackagingRule::Both.allows(PackagingType::Box));
        assert!(PackagingRule::Both.allows(PackagingType::Unit));
        assert!(PackagingRule::BoxOnly.allows(PackagingType::Box));
        assert!(!PackagingRule::BoxOnly.allows(PackagingType::Unit));
        assert!(PackagingRule::UnitOnly.allows(PackagingType::Unit));
        assert!(!PackagingRule::UnitOnly.allows(PackagingType::Box));
    }

    #[test]
    fn packaging_type_parses_plural_forms() {
        assert_eq!("Boxes".parse::<PackagingType>().unwrap(), PackagingType::Box);
        assert_eq!("unit".parse::<PackagingType>().unwrap(), PackagingType::Unit);
        assert!("crate".parse::<PackagingType>().is_err());
    }
}
