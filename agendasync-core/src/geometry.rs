//! Slot geometry inside a block.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};

use crate::agenda::AgendaItem;

/// Contiguous fixed-length slots covering a block window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub starts: Vec<NaiveDateTime>,
    /// End of the last slot; never past the requested window end
    pub end: NaiveDateTime,
}

/// Cut `[start, end)` into `duration`-minute slots from `start`.
///
/// A trailing remainder shorter than `duration` is dropped. Returns `None`
/// when the duration is not positive or not even one slot fits.
pub fn partition(start: NaiveDateTime, end: NaiveDateTime, duration: i64) -> Option<Partition> {
    if duration <= 0 {
        return None;
    }

    let step = Duration::minutes(duration);
    let mut starts = Vec::new();
    let mut current = start;

    while current + step <= end {
        starts.push(current);
        current += step;
    }

    let last = *starts.last()?;
    Some(Partition {
        starts,
        end: last + step,
    })
}

/// Peak number of bookings sharing one identical interval.
pub fn block_parties(bookings: &[AgendaItem]) -> i64 {
    let mut counts: HashMap<(NaiveDateTime, NaiveDateTime), i64> = HashMap::new();
    let mut max = 0;

    for booking in bookings {
        let count = counts.entry((booking.start, booking.end)).or_insert(0);
        *count += 1;
        max = max.max(*count);
    }

    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExternalId, InternalType};
    use crate::window::parse_timestamp;

    fn at(time: &str) -> NaiveDateTime {
        parse_timestamp(&format!("2024-01-10 {time}")).unwrap()
    }

    fn booking(id: i64, start: &str, end: &str) -> AgendaItem {
        AgendaItem {
            id: ExternalId::from(id),
            kind: InternalType::Booking,
            type_name: "Bezichtiging".into(),
            start: at(start),
            end: at(end),
            status: None,
            project_code: None,
            relations: vec![],
        }
    }

    #[test]
    fn test_partition_covers_window_exactly() {
        let p = partition(at("09:00:00"), at("10:00:00"), 20).unwrap();

        assert_eq!(p.starts, vec![at("09:00:00"), at("09:20:00"), at("09:40:00")]);
        assert_eq!(p.end, at("10:00:00"));
    }

    #[test]
    fn test_partition_drops_short_remainder() {
        let p = partition(at("09:00:00"), at("10:10:00"), 20).unwrap();

        assert_eq!(p.starts.len(), 3);
        assert_eq!(p.end, at("10:00:00"));
        for pair in p.starts.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::minutes(20));
        }
    }

    #[test]
    fn test_partition_rejects_degenerate_input() {
        assert_eq!(partition(at("09:00:00"), at("10:00:00"), 0), None);
        assert_eq!(partition(at("09:00:00"), at("09:10:00"), 20), None);
    }

    #[test]
    fn test_parties_is_peak_not_total() {
        let bookings = vec![
            booking(1, "09:00:00", "09:20:00"),
            booking(2, "09:00:00", "09:20:00"),
            booking(3, "09:20:00", "09:40:00"),
            booking(4, "09:40:00", "10:00:00"),
        ];

        assert_eq!(block_parties(&bookings), 2);
        assert_eq!(block_parties(&[]), 0);
    }
}
