//! Domain records owned by the record store. Core components hold only
//! transient copies while operating on them within a single logical operation.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::offset::{self, OffsetLimits, OffsetResult};

/// Pairing state of a weighing record. Transitions only
/// Unmatched → {Join | Out}; never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MatchedType {
    #[default]
    Unmatched,
    /// Entry side of a matched pair (earlier weighing).
    Join,
    /// Exit side of a matched pair (later weighing).
    Out,
}

/// Direction of a truck visit: a sending truck is weighed empty first, a
/// receiving truck full first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryType {
    Sending,
    Receiving,
}

/// One confirmed stable weighing event. Created exclusively by the stability
/// monitor; mutated exclusively by the matching engine when paired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeighingRecord {
    pub id: Uuid,
    /// Weight in centi-units; never negative.
    pub weight_centi: i64,
    pub plate_number: Option<String>,
    /// Filled in later by the operator, not by this core.
    pub provider_id: Option<String>,
    /// Filled in later by the operator, not by this core.
    pub material_id: Option<String>,
    pub photo_paths: Vec<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub matched_id: Option<Uuid>,
    pub matched_type: MatchedType,
}

impl WeighingRecord {
    pub fn new(
        weight_centi: i64,
        plate_number: Option<String>,
        photo_paths: Vec<PathBuf>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            weight_centi,
            plate_number,
            provider_id: None,
            material_id: None,
            photo_paths,
            created_at,
            matched_id: None,
            matched_type: MatchedType::Unmatched,
        }
    }

    pub fn is_unmatched(&self) -> bool {
        self.matched_type == MatchedType::Unmatched
    }
}

/// One completed truck visit: the paired entry and exit weighings with
/// derived weight and deviation figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waybill {
    pub id: Uuid,
    /// Human-readable, sortable, unique within a day:
    /// delivery prefix + join timestamp + 4-digit daily sequence.
    pub order_no: String,
    pub plate_number: Option<String>,
    pub delivery_type: DeliveryType,
    pub join_record_id: Uuid,
    pub out_record_id: Uuid,
    pub join_time: DateTime<Utc>,
    pub out_time: DateTime<Utc>,
    pub truck_weight_centi: i64,
    pub total_weight_centi: i64,
    /// total − truck; which of join/out maps to truck vs. total follows
    /// `delivery_type`.
    pub goods_weight_centi: i64,
    /// Attached later by the operator; triggers offset recomputation.
    pub plan_quantity_e4: Option<i64>,
    pub unit_rate_e4: Option<i64>,
    pub offset_rate_e4: Option<i64>,
    pub offset_result: OffsetResult,
}

impl Waybill {
    /// Attach plan data and recompute the deviation fields from the goods
    /// weight through the offset calculator.
    pub fn apply_plan(&mut self, plan_quantity_e4: i64, unit_rate_e4: i64, limits: OffsetLimits) {
        self.plan_quantity_e4 = Some(plan_quantity_e4);
        self.unit_rate_e4 = Some(unit_rate_e4);
        let calc = offset::calculate(
            Some(plan_quantity_e4),
            Some(unit_rate_e4),
            self.goods_weight_centi,
            limits,
        );
        self.offset_rate_e4 = calc.deviation_rate_e4;
        self.offset_result = calc.result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_unmatched() {
        let r = WeighingRecord::new(185_000, Some("京A12345".into()), vec![], Utc::now());
        assert!(r.is_unmatched());
        assert_eq!(r.matched_id, None);
    }

    #[test]
    fn apply_plan_recomputes_offset() {
        let mut bill = Waybill {
            id: Uuid::new_v4(),
            order_no: "sl202608270001".into(),
            plate_number: None,
            delivery_type: DeliveryType::Receiving,
            join_record_id: Uuid::new_v4(),
            out_record_id: Uuid::new_v4(),
            join_time: Utc::now(),
            out_time: Utc::now(),
            truck_weight_centi: 820_000,
            total_weight_centi: 1_850_000,
            goods_weight_centi: 1_030_000,
            plan_quantity_e4: None,
            unit_rate_e4: None,
            offset_rate_e4: None,
            offset_result: OffsetResult::Default,
        };
        // plan 10000 × 1.0 = 10000.00; actual 10300.00 -> +3.0000 %
        bill.apply_plan(100_000_000, 10_000, OffsetLimits {
            lower_e4: Some(-20_000),
            upper_e4: Some(20_000),
        });
        assert_eq!(bill.offset_rate_e4, Some(30_000));
        assert_eq!(bill.offset_result, OffsetResult::OverPositiveDeviation);
    }
}
