//! Historical direct stock fields (`n950Boxes`, `stcSimUnits`, ...).
//!
//! Older owner records carried one pair of counters per well-known item type
//! instead of generic `(owner, itemType)` rows. The field stems match the ids of
//! the seeded catalog entries, so after import the ledger can address them
//! uniformly by item type id.

use serde::{Deserialize, Serialize};

use stockline_catalog::ItemTypeId;
use stockline_core::{DomainError, DomainResult};

use crate::ledger::StockCounters;

macro_rules! legacy_fields {
    ($( $stem:literal => $boxes:ident / $units:ident ),+ $(,)?) => {
        /// Payload shape of a legacy owner record. Absent fields mean "never recorded".
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct LegacyStockFields {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $boxes: Option<i64>,
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $units: Option<i64>,
            )+
        }

        impl LegacyStockFields {
            fn raw(&self) -> Vec<(&'static str, Option<i64>, Option<i64>)> {
                vec![$( ($stem, self.$boxes, self.$units) ),+]
            }
        }
    };
}

legacy_fields! {
    "n950" => n950_boxes / n950_units,
    "i9000s" => i9000s_boxes / i9000s_units,
    "i9100" => i9100_boxes / i9100_units,
    "rollPaper" => roll_paper_boxes / roll_paper_units,
    "stickers" => stickers_boxes / stickers_units,
    "newBatteries" => new_batteries_boxes / new_batteries_units,
    "mobilySim" => mobily_sim_boxes / mobily_sim_units,
    "stcSim" => stc_sim_boxes / stc_sim_units,
    "zainSim" => zain_sim_boxes / zain_sim_units,
    "lebaraSim" => lebara_sim_boxes / lebara_sim_units,
}

impl LegacyStockFields {
    /// Item types that have at least one recorded counter, with the missing
    /// half of the pair read as zero.
    pub fn into_counters(self) -> DomainResult<Vec<(ItemTypeId, StockCounters)>> {
        let mut out = Vec::new();
        for (stem, boxes, units) in self.raw() {
            if boxes.is_none() && units.is_none() {
                continue;
            }
            let counters = StockCounters::new(boxes.unwrap_or(0), units.unwrap_or(0))
                .map_err(|_| DomainError::validation(format!("legacy field '{stem}' cannot be negative")))?;
            out.push((ItemTypeId::parse(stem)?, counters));
        }
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self == &LegacyStockFields::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_camel_case_field_names() {
        let fields: LegacyStockFields =
            serde_json::from_str(r#"{"n950Boxes":10,"stcSimUnits":40,"rollPaperBoxes":0}"#).unwrap();

        let counters = fields.into_counters().unwrap();
        assert_eq!(
            counters,
            vec![
                (ItemTypeId::parse("n950").unwrap(), StockCounters { boxes: 10, units: 0 }),
                (ItemTypeId::parse("rollPaper").unwrap(), StockCounters { boxes: 0, units: 0 }),
                (ItemTypeId::parse("stcSim").unwrap(), StockCounters { boxes: 0, units: 40 }),
            ]
        );
    }

    #[test]
    fn negative_legacy_value_is_rejected() {
        let fields = LegacyStockFields {
            zain_sim_units: Some(-1),
            ..Default::default()
        };
        let err = fields.into_counters().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("zainSim")));
    }

    #[test]
    fn unknown_fields_are_ignored_and_empty_means_nothing_recorded() {
        let fields: LegacyStockFields = serde_json::from_str(r#"{"name":"Main"}"#).unwrap();
        assert!(fields.is_empty());
        assert!(fields.into_counters().unwrap().is_empty());
    }
}
