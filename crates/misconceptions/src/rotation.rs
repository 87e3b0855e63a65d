use chrono::{Datelike, Duration, NaiveDate};

/// 32-bit linear congruential step with the Numerical Recipes
/// constants. Small and fully deterministic, which matters more here
/// than statistical quality.
#[derive(Debug, Clone)]
struct Lcg {
    state: u32,
}

impl Lcg {
    fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        self.state
    }
}

/// How a date maps onto a collection index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStrategy {
    /// One hash step over the date digits. Nearby dates may repeat an
    /// index before the collection is exhausted.
    SimpleHash,
    /// Walks a per-cycle shuffle of the whole collection, so every
    /// index appears exactly once per `size` consecutive days.
    FullCycle,
}

/// One resolved day of a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledDay {
    pub date: NaiveDate,
    pub index: usize,
}

/// Deterministic date-to-index mapping. Holds no collection data;
/// callers pass the current size and look the record up themselves.
#[derive(Debug, Clone)]
pub struct RotationScheduler {
    strategy: RotationStrategy,
}

impl RotationScheduler {
    pub fn new(strategy: RotationStrategy) -> Self {
        Self { strategy }
    }

    /// Index shown on `date` for a collection of `size` entries, or
    /// `None` when the collection is empty.
    pub fn index_for_date(&self, date: NaiveDate, size: usize) -> Option<usize> {
        if size == 0 {
            return None;
        }
        let index = match self.strategy {
            RotationStrategy::SimpleHash => simple_hash_index(date, size),
            RotationStrategy::FullCycle => full_cycle_index(date, size),
        };
        Some(index)
    }

    /// Day-by-day schedule spanning `day_count` days. A negative count
    /// walks backwards from `start`; either way the result is ordered
    /// oldest first. Days past the calendar's edge are dropped, and a
    /// backward span whose oldest day falls before the calendar yields
    /// nothing.
    pub fn date_range_indices(
        &self,
        start: NaiveDate,
        day_count: i64,
        size: usize,
    ) -> Vec<ScheduledDay> {
        if size == 0 || day_count == 0 {
            return Vec::new();
        }
        let first = if day_count > 0 {
            Some(start)
        } else {
            day_count
                .checked_add(1)
                .and_then(Duration::try_days)
                .and_then(|span| start.checked_add_signed(span))
        };
        let Some(first) = first else {
            return Vec::new();
        };
        (0..day_count.unsigned_abs())
            .map_while(|offset| {
                let date = i64::try_from(offset)
                    .ok()
                    .and_then(Duration::try_days)
                    .and_then(|span| first.checked_add_signed(span))?;
                self.index_for_date(date, size)
                    .map(|index| ScheduledDay { date, index })
            })
            .collect()
    }
}

/// First day of the full-cycle calendar. Earlier dates produce
/// negative day numbers and still resolve through euclidean division.
fn rotation_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid epoch date")
}

fn full_cycle_index(date: NaiveDate, size: usize) -> usize {
    let day = (date - rotation_epoch()).num_days();
    let len = size as i64;
    let cycle = day.div_euclid(len);
    let position = day.rem_euclid(len) as usize;
    permutation_for_cycle(cycle, size)[position]
}

/// Fisher-Yates shuffle of `[0, size)` seeded with the cycle number.
/// A cycle's order is fixed; consecutive cycles reorder.
fn permutation_for_cycle(cycle: i64, size: usize) -> Vec<usize> {
    let mut rng = Lcg::new(cycle as u32);
    let mut permutation: Vec<usize> = (0..size).collect();
    for i in (1..size).rev() {
        let j = (rng.next_u32() as usize) % (i + 1);
        permutation.swap(i, j);
    }
    permutation
}

fn simple_hash_index(date: NaiveDate, size: usize) -> usize {
    let seed = date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64;
    let mut rng = Lcg::new(seed as u32);
    (rng.next_u32() as usize) % size
}
