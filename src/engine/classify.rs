use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::models::order::{OrderRecord, OrderStatus};

/// How to choose among several candidate orders of the same kind.
///
/// The backend gives no ordering guarantee, so the choice is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// First candidate in the order the backend returned them.
    #[default]
    ListOrder,
    /// Oldest `createdAt`; records without a timestamp go last.
    EarliestCreated,
    LowestId,
}

impl TieBreak {
    pub fn pick<'a>(self, candidates: &[&'a OrderRecord]) -> Option<&'a OrderRecord> {
        match self {
            TieBreak::ListOrder => candidates.first().copied(),
            TieBreak::EarliestCreated => candidates
                .iter()
                .copied()
                .min_by_key(|record| (record.created_at.is_none(), record.created_at)),
            TieBreak::LowestId => candidates.iter().copied().min_by_key(|record| record.id),
        }
    }
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "list-order" => Ok(TieBreak::ListOrder),
            "earliest-created" => Ok(TieBreak::EarliestCreated),
            "lowest-id" => Ok(TieBreak::LowestId),
            other => Err(format!(
                "unknown tie-break: {other}, expected list-order/earliest-created/lowest-id"
            )),
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TieBreak::ListOrder => "list-order",
            TieBreak::EarliestCreated => "earliest-created",
            TieBreak::LowestId => "lowest-id",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification<'a> {
    Empty,
    Offer(&'a OrderRecord),
    Active(&'a OrderRecord),
}

fn is_offer_candidate(status: OrderStatus) -> bool {
    !status.is_active() && !status.is_terminal() && status != OrderStatus::Unknown
}

/// An active-panel order always wins over a pending offer, so a driver
/// with an order in progress is never shown a new one.
pub fn classify(orders: &[OrderRecord], tie_break: TieBreak) -> Classification<'_> {
    let active: Vec<&OrderRecord> = orders
        .iter()
        .filter(|record| record.status.is_active())
        .collect();

    if !active.is_empty() {
        if active.len() > 1 {
            warn!(
                candidates = active.len(),
                %tie_break,
                "multiple active orders for driver"
            );
        }
        return tie_break
            .pick(&active)
            .map_or(Classification::Empty, Classification::Active);
    }

    let offers: Vec<&OrderRecord> = orders
        .iter()
        .filter(|record| is_offer_candidate(record.status))
        .collect();

    if offers.len() > 1 {
        warn!(
            candidates = offers.len(),
            %tie_break,
            "multiple offer candidates for driver"
        );
    }

    tie_break
        .pick(&offers)
        .map_or(Classification::Empty, Classification::Offer)
}
