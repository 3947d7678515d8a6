//! Pairs entry and exit weighings into waybills.
//!
//! The whole match runs inside one store transaction, which serializes
//! concurrent triggers: the first one claims the candidate, the second sees
//! it already matched and reports no work done.

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::model::{DeliveryType, MatchedType, Waybill, WeighingRecord};
use crate::offset::OffsetResult;
use crate::store::{RecordStore, StoreTxn};

/// Matching policy.
#[derive(Debug, Clone)]
pub struct MatchCfg {
    /// Two weighings pair only when created within this many hours of each
    /// other.
    pub match_window_hours: i64,
    /// When the trigger record carries a plate, require the candidate's plate
    /// to be identical. A trigger without a plate always falls back to the
    /// time-window rule.
    pub require_plate_match: bool,
    pub sending_prefix: String,
    pub receiving_prefix: String,
    pub delivery_type: DeliveryType,
}

impl Default for MatchCfg {
    fn default() -> Self {
        Self {
            match_window_hours: 12,
            require_plate_match: true,
            sending_prefix: "fl".into(),
            receiving_prefix: "sl".into(),
            delivery_type: DeliveryType::Receiving,
        }
    }
}

enum Outcome {
    NotFound(Uuid),
    NoMatch,
    Matched,
}

/// Pairs weighing records and materializes waybills against a shared store.
pub struct MatchingEngine<S: RecordStore> {
    store: Arc<S>,
    cfg: MatchCfg,
}

impl<S: RecordStore> MatchingEngine<S> {
    pub fn new(store: Arc<S>, cfg: MatchCfg) -> Self {
        Self { store, cfg }
    }

    /// Attempt to pair `record_id` with an eligible earlier or later
    /// unmatched record. Returns `Ok(true)` when a waybill was created,
    /// `Ok(false)` when no eligible partner exists or the record is already
    /// matched. Idempotent: re-triggering a matched record is `Ok(false)`.
    pub fn auto_match(&self, record_id: Uuid) -> Result<bool> {
        let cfg = self.cfg.clone();
        let outcome = self.store.with_txn(|txn| {
            let Some(trigger) = txn.get_record(record_id) else {
                return Ok(Outcome::NotFound(record_id));
            };
            if !trigger.is_unmatched() {
                tracing::debug!(record_id = %record_id, "record already matched, nothing to do");
                return Ok(Outcome::NoMatch);
            }

            let Some(candidate) = pick_candidate(txn, &trigger, &cfg) else {
                tracing::debug!(record_id = %record_id, "no eligible partner in window");
                return Ok(Outcome::NoMatch);
            };

            let (mut join, mut out) = if trigger.created_at <= candidate.created_at {
                (trigger, candidate)
            } else {
                (candidate, trigger)
            };
            join.matched_type = MatchedType::Join;
            join.matched_id = Some(out.id);
            out.matched_type = MatchedType::Out;
            out.matched_id = Some(join.id);
            txn.update_record(&join)?;
            txn.update_record(&out)?;

            let waybill = build_waybill(txn, &join, &out, &cfg);
            let waybill_id = waybill.id;
            txn.insert_waybill(waybill)?;
            tracing::info!(
                waybill_id = %waybill_id,
                join_id = %join.id,
                out_id = %out.id,
                "waybill created"
            );
            Ok(Outcome::Matched)
        })?;

        match outcome {
            Outcome::NotFound(id) => Err(CoreError::RecordNotFound(id)),
            Outcome::NoMatch => Ok(false),
            Outcome::Matched => Ok(true),
        }
    }
}

/// Earliest-created eligible partner: unmatched, not the trigger itself,
/// inside the time window, and plate-compatible under the configured rule.
fn pick_candidate(
    txn: &dyn StoreTxn,
    trigger: &WeighingRecord,
    cfg: &MatchCfg,
) -> Option<WeighingRecord> {
    // try_hours: an out-of-range window yields no candidates instead of a
    // panic inside the store transaction.
    let window = Duration::try_hours(cfg.match_window_hours)?;
    let strict_plate = cfg.require_plate_match && trigger.plate_number.is_some();
    let candidates = txn.records_where(&|r: &WeighingRecord| {
        if r.id == trigger.id || !r.is_unmatched() {
            return false;
        }
        let gap = (r.created_at - trigger.created_at).abs();
        if gap > window {
            return false;
        }
        if strict_plate {
            r.plate_number == trigger.plate_number
        } else {
            true
        }
    });
    // Secondary id key keeps the pick deterministic when two candidates share
    // a creation time.
    candidates.into_iter().min_by_key(|r| (r.created_at, r.id))
}

/// Derive the waybill for a freshly paired join/out. Weight roles follow the
/// delivery direction: a sending truck arrives empty (join = truck weight), a
/// receiving truck arrives loaded (join = total weight).
fn build_waybill(
    txn: &dyn StoreTxn,
    join: &WeighingRecord,
    out: &WeighingRecord,
    cfg: &MatchCfg,
) -> Waybill {
    let (truck, total) = match cfg.delivery_type {
        DeliveryType::Sending => (join.weight_centi, out.weight_centi),
        DeliveryType::Receiving => (out.weight_centi, join.weight_centi),
    };
    let prefix = match cfg.delivery_type {
        DeliveryType::Sending => &cfg.sending_prefix,
        DeliveryType::Receiving => &cfg.receiving_prefix,
    };
    let order_no = next_order_no(txn, prefix, join);

    Waybill {
        id: Uuid::new_v4(),
        order_no,
        plate_number: join.plate_number.clone().or_else(|| out.plate_number.clone()),
        delivery_type: cfg.delivery_type,
        join_record_id: join.id,
        out_record_id: out.id,
        join_time: join.created_at,
        out_time: out.created_at,
        truck_weight_centi: truck,
        total_weight_centi: total,
        goods_weight_centi: total - truck,
        plan_quantity_e4: None,
        unit_rate_e4: None,
        offset_rate_e4: None,
        offset_result: OffsetResult::Default,
    }
}

/// `prefix + join timestamp + zero-padded daily sequence`, derived inside the
/// transaction so concurrent matches cannot collide on the sequence.
fn next_order_no(txn: &dyn StoreTxn, prefix: &str, join: &WeighingRecord) -> String {
    let day = join.created_at.date_naive();
    // Max existing suffix, not a count: an administratively deleted waybill
    // must not free its order number for reissue.
    let highest = txn
        .waybills_where(&|w: &Waybill| w.join_time.date_naive() == day)
        .iter()
        .filter_map(|w| {
            let no = &w.order_no;
            no.len().checked_sub(4).and_then(|i| no.get(i..))
        })
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!(
        "{}{}{:04}",
        prefix,
        join.created_at.format("%Y%m%d%H%M%S"),
        highest + 1
    )
}

/// Consumes match triggers from the stability monitor on its own thread.
pub struct MatchWorker {
    shutdown: Arc<std::sync::atomic::AtomicBool>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl MatchWorker {
    pub fn spawn<S: RecordStore + 'static>(
        engine: MatchingEngine<S>,
        triggers: crossbeam_channel::Receiver<Uuid>,
    ) -> Self {
        use std::sync::atomic::Ordering;
        let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let join = std::thread::spawn(move || {
            let poll = std::time::Duration::from_millis(100);
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                match triggers.recv_timeout(poll) {
                    Ok(record_id) => match engine.auto_match(record_id) {
                        Ok(true) => {}
                        Ok(false) => {
                            tracing::debug!(record_id = %record_id, "no match yet");
                        }
                        Err(e) => {
                            tracing::error!(record_id = %record_id, error = %e, "auto match failed");
                        }
                    },
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::trace!("match worker exiting");
        });
        Self {
            shutdown,
            join: Some(join),
        }
    }

    pub fn stop(&mut self) {
        use std::sync::atomic::Ordering;
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("match worker joined"),
                Err(e) => tracing::warn!(?e, "match worker panicked during shutdown"),
            }
        }
    }
}

impl Drop for MatchWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
