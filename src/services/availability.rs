use std::collections::HashSet;

use chrono::NaiveDate;

use crate::errors::AppError;
use crate::models::time_slots::{format_date, parse_calendar_date};
use crate::models::TimeSlotCatalog;
use crate::services::storage::AppointmentStore;

#[derive(Debug, Clone, PartialEq)]
pub enum SlotLookup {
    /// The input already names a time, so there is nothing to offer.
    AlreadyScheduled,
    Open { date: NaiveDate, slots: Vec<String> },
}

/// Answers "which catalog labels are still free on this day".
pub struct AvailabilityResolver<'a> {
    store: &'a dyn AppointmentStore,
    catalog: &'a TimeSlotCatalog,
}

impl<'a> AvailabilityResolver<'a> {
    pub fn new(store: &'a dyn AppointmentStore, catalog: &'a TimeSlotCatalog) -> Self {
        Self { store, catalog }
    }

    pub fn lookup(&self, date_input: &str) -> Result<SlotLookup, AppError> {
        if self.catalog.split_scheduled(date_input).is_some() {
            return Ok(SlotLookup::AlreadyScheduled);
        }

        let date = parse_calendar_date(date_input)
            .ok_or_else(|| AppError::Validation(format!("unrecognised date: {date_input:?}")))?;

        Ok(SlotLookup::Open {
            date,
            slots: self.open_slots(date)?,
        })
    }

    /// Catalog labels with no booking on `date`, in catalog order.
    /// Emergency bookings hold no label and never block a slot.
    pub fn open_slots(&self, date: NaiveDate) -> Result<Vec<String>, AppError> {
        let appointments = self.store.list_all().map_err(|e| {
            tracing::warn!(error = %e, "could not read appointments for availability");
            AppError::AvailabilityUnknown(e.to_string())
        })?;

        let taken: HashSet<String> = appointments
            .iter()
            .filter_map(|a| {
                let (label, day) = self.catalog.split_scheduled(&a.preferred_time_slot)?;
                (parse_calendar_date(day)? == date).then(|| label.to_string())
            })
            .collect();

        let open = self.catalog.without(&taken);
        tracing::debug!(
            date = %format_date(date),
            taken = taken.len(),
            open = open.len(),
            "resolved availability"
        );
        Ok(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EMERGENCY_SLOT;
    use crate::services::test_support::{booked, memory_store, FailingStore};

    fn july_10() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 10).unwrap()
    }

    #[test]
    fn test_taken_labels_are_removed_in_catalog_order() {
        let store = memory_store();
        store.append(&booked("9:00 AM on Wed Jul 10 2024")).unwrap();
        store.append(&booked("2:00 PM on Wed Jul 10 2024")).unwrap();
        // different day, emergency and unrecognised slots never block
        store.append(&booked("11:00 AM on Thu Jul 11 2024")).unwrap();
        store.append(&booked(EMERGENCY_SLOT)).unwrap();
        store.append(&booked("3:15 PM on Wed Jul 10 2024")).unwrap();

        let catalog = TimeSlotCatalog::default();
        let resolver = AvailabilityResolver::new(&store, &catalog);
        assert_eq!(resolver.open_slots(july_10()).unwrap(), ["11:00 AM", "4:00 PM"]);
    }

    #[test]
    fn test_same_day_in_another_format_still_counts() {
        let store = memory_store();
        store.append(&booked("4:00 PM on 2024-07-10")).unwrap();

        let catalog = TimeSlotCatalog::default();
        let resolver = AvailabilityResolver::new(&store, &catalog);
        assert_eq!(
            resolver.open_slots(july_10()).unwrap(),
            ["9:00 AM", "11:00 AM", "2:00 PM"]
        );
    }

    #[test]
    fn test_lookup_with_time_already_present() {
        let store = memory_store();
        let catalog = TimeSlotCatalog::default();
        let resolver = AvailabilityResolver::new(&store, &catalog);
        assert_eq!(
            resolver.lookup("2:00 PM on Wed Jul 10 2024").unwrap(),
            SlotLookup::AlreadyScheduled
        );
        assert_eq!(
            resolver.lookup("Wed Jul 10 2024").unwrap(),
            SlotLookup::Open {
                date: july_10(),
                slots: catalog.labels().to_vec(),
            }
        );
        assert!(matches!(resolver.lookup("someday"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_store_failure_is_unknown_not_empty() {
        let catalog = TimeSlotCatalog::default();
        let resolver = AvailabilityResolver::new(&FailingStore, &catalog);
        assert!(matches!(
            resolver.open_slots(july_10()),
            Err(AppError::AvailabilityUnknown(_))
        ));
    }
}
