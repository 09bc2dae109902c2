use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use tourstay_api::entities::booking::BookingStatus;
use tourstay_api::services::slots::dates_in_range;
use tourstay_api::services::CatalogService;

const ALL_STATUSES: [BookingStatus; 7] = [
    BookingStatus::Pending,
    BookingStatus::Confirmed,
    BookingStatus::Completed,
    BookingStatus::CancelledByGuest,
    BookingStatus::CancelledByMerchant,
    BookingStatus::NoShow,
    BookingStatus::Refunded,
];

fn status_strategy() -> impl Strategy<Value = BookingStatus> {
    prop::sample::select(ALL_STATUSES.to_vec())
}

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    // A few decades around the epoch keeps date arithmetic comfortably in range.
    (0i64..20_000).prop_map(|days| {
        NaiveDate::from_ymd_opt(1990, 1, 1).unwrap() + chrono::Days::new(days as u64)
    })
}

proptest! {
    // total = base + fee + tax - discount holds for every quoted base amount.
    #[test]
    fn quoted_breakdown_is_always_consistent(cents in 0u64..100_000_000) {
        let catalog = CatalogService::new(
            Arc::new(DatabaseConnection::Disconnected),
            0.05,
            0.08,
            None,
        );
        let base = Decimal::new(cents as i64, 2);
        let breakdown = catalog.breakdown_from_base(base);

        prop_assert!(breakdown.is_consistent());
        prop_assert!(breakdown.service_fee >= Decimal::ZERO);
        prop_assert!(breakdown.tax_amount >= Decimal::ZERO);
        prop_assert!(breakdown.total_amount >= breakdown.base_amount);
        // Fee and tax are money: at most two decimal places.
        prop_assert!(breakdown.service_fee.scale() <= 2);
        prop_assert!(breakdown.tax_amount.scale() <= 2);
    }

    // Terminal states admit no transition except Completed -> Refunded.
    #[test]
    fn terminal_states_are_terminal(from in status_strategy(), to in status_strategy()) {
        if from.is_terminal() && from.can_transition_to(to) {
            prop_assert_eq!(from, BookingStatus::Completed);
            prop_assert_eq!(to, BookingStatus::Refunded);
        }
    }

    // No transition is a self-loop, and every transition out of a
    // capacity-holding state into a non-holding one is a cancellation,
    // no-show or refund.
    #[test]
    fn capacity_release_transitions(from in status_strategy(), to in status_strategy()) {
        if from.can_transition_to(to) {
            prop_assert_ne!(from, to);
            if from.holds_capacity() && !to.holds_capacity() {
                prop_assert!(matches!(
                    to,
                    BookingStatus::CancelledByGuest
                        | BookingStatus::CancelledByMerchant
                        | BookingStatus::NoShow
                        | BookingStatus::Refunded
                ));
            }
        }
    }

    // Status strings survive a round trip through storage form.
    #[test]
    fn status_round_trips(status in status_strategy()) {
        prop_assert_eq!(BookingStatus::from_str(status.as_str()), Some(status));
    }

    // The half-open range has exactly (check_out - check_in) days and
    // never contains the check-out date.
    #[test]
    fn date_range_is_half_open(start in date_strategy(), nights in 0i64..400) {
        let end = start + chrono::Days::new(nights as u64);
        let dates = dates_in_range(start, end);

        prop_assert_eq!(dates.len() as i64, nights);
        prop_assert!(!dates.contains(&end));
        if nights > 0 {
            prop_assert_eq!(dates[0], start);
            prop_assert_eq!(*dates.last().unwrap(), end - chrono::Days::new(1));
        }
        // Strictly ascending by one day.
        for pair in dates.windows(2) {
            prop_assert_eq!(pair[1], pair[0] + chrono::Days::new(1));
        }
    }
}
