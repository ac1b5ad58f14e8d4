//! Page lifecycle: which date range is loaded and which date is current.
//!
//! # Responsibility
//! - Validate page ranges before they reach the directories.
//! - Own the application-lifetime `TagsDirectory` and the current page's
//!   `RecordsDirectory`, replacing the latter on every page reset.
//! - Route record saves/removals through the storage backend.
//!
//! # Invariants
//! - A failed page read keeps the previous page installed and leaves no tag
//!   behind that the read created.
//! - `CurrentDateChanged` is published only when the date actually changes.

use crate::directory::{DirectoryError, RecordSet, RecordsDirectory, TagsDirectory};
use crate::model::record::RecordHandle;
use crate::model::tag::TagHandle;
use crate::observe::{SubscriptionId, SubscriptionIds, Subscribers};
use crate::storage::{PageStorage, StorageError};
use chrono::{Days, NaiveDate};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Errors from page validation and coordination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// `first` is after `last`.
    InvalidRange { first: NaiveDate, last: NaiveDate },
    /// Year/month pair does not name a calendar month.
    InvalidMonth { year: i32, month: u32 },
    /// Operation needs a loaded page.
    NoCurrentPage,
    Storage(StorageError),
    Directory(DirectoryError),
}

impl Display for PageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRange { first, last } => {
                write!(f, "page range start {first} is after end {last}")
            }
            Self::InvalidMonth { year, month } => write!(f, "invalid month {year}-{month}"),
            Self::NoCurrentPage => write!(f, "no page is loaded"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Directory(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Directory(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for PageError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<DirectoryError> for PageError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

/// Inclusive, validated date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRange {
    first: NaiveDate,
    last: NaiveDate,
}

impl PageRange {
    pub fn new(first: NaiveDate, last: NaiveDate) -> Result<Self, PageError> {
        if first > last {
            return Err(PageError::InvalidRange { first, last });
        }
        Ok(Self { first, last })
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            first: date,
            last: date,
        }
    }

    /// Whole calendar month.
    pub fn month(year: i32, month: u32) -> Result<Self, PageError> {
        let invalid = PageError::InvalidMonth { year, month };
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(invalid.clone())?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let last = next.and_then(|next| next.pred_opt()).ok_or(invalid)?;
        Ok(Self { first, last })
    }

    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn last(&self) -> NaiveDate {
        self.last
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }

    pub fn num_days(&self) -> u64 {
        (self.last - self.first).num_days().unsigned_abs() + 1
    }

    /// Every day of the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.first;
        (0..self.num_days()).filter_map(move |offset| first.checked_add_days(Days::new(offset)))
    }
}

impl Display for PageRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.first, self.last)
    }
}

/// Page-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    PageReset(PageRange),
    CurrentDateChanged(NaiveDate),
}

struct LoadedPage {
    range: PageRange,
    records: RecordsDirectory,
}

/// Selects the current page and date and drives the storage backend.
pub struct PageCoordinator<S: PageStorage> {
    storage: S,
    tags: TagsDirectory,
    page: Option<LoadedPage>,
    current_date: NaiveDate,
    observers: Subscribers<PageEvent>,
    ids: SubscriptionIds,
}

impl<S: PageStorage> PageCoordinator<S> {
    pub fn new(storage: S, current_date: NaiveDate) -> Self {
        Self {
            storage,
            tags: TagsDirectory::new(),
            page: None,
            current_date,
            observers: Subscribers::new(),
            ids: SubscriptionIds::default(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn tags(&self) -> &TagsDirectory {
        &self.tags
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    /// Returns whether the date changed.
    pub fn set_current_date(&mut self, date: NaiveDate) -> bool {
        if self.current_date == date {
            return false;
        }
        self.current_date = date;
        debug!("event=current_date_changed module=page date={date}");
        self.publish(PageEvent::CurrentDateChanged(date));
        true
    }

    /// Loads `range` into a fresh records directory and makes it current.
    ///
    /// On failure the previous page stays current and tags created during
    /// the read are removed again; renames the backend applied to tags that
    /// already existed are kept.
    pub fn reset_page(&mut self, range: PageRange) -> Result<RecordsDirectory, PageError> {
        let known: HashSet<TagHandle> = self.tags.tags().into_iter().collect();
        let records = RecordsDirectory::new();
        if let Err(err) = self.storage.read_page(range, &records, &self.tags) {
            let discarded = self.discard_tags_except(&known);
            warn!(
                "event=page_reset module=page status=error range={range} discarded_tags={discarded} error={err}"
            );
            return Err(err.into());
        }

        info!(
            "event=page_reset module=page status=ok range={range} records={}",
            records.len()
        );
        self.page = Some(LoadedPage {
            range,
            records: records.clone(),
        });
        self.publish(PageEvent::PageReset(range));
        Ok(records)
    }

    fn discard_tags_except(&self, known: &HashSet<TagHandle>) -> usize {
        let mut discarded = 0;
        for tag in self.tags.tags() {
            if known.contains(&tag) {
                continue;
            }
            match self.tags.remove_tag(tag) {
                Ok(()) => discarded += 1,
                Err(err) => warn!("event=tag_discard module=page status=error error={err}"),
            }
        }
        discarded
    }

    pub fn current_page(&self) -> Option<&RecordsDirectory> {
        self.page.as_ref().map(|page| &page.records)
    }

    pub fn current_range(&self) -> Option<PageRange> {
        self.page.as_ref().map(|page| page.range)
    }

    fn require_page(&self) -> Result<&RecordsDirectory, PageError> {
        self.current_page().ok_or(PageError::NoCurrentPage)
    }

    /// Live set for the current date on the current page.
    pub fn current_records(&self) -> Result<RecordSet, PageError> {
        Ok(self.require_page()?.records_by_date(self.current_date))
    }

    /// Creates a record dated on the current date.
    pub fn create_record_on_current_date(&self) -> Result<RecordHandle, PageError> {
        let records = self.require_page()?;
        let record = records.create_record();
        records.set_date(record, Some(self.current_date))?;
        Ok(record)
    }

    pub fn save_record(&mut self, record: RecordHandle) -> Result<(), PageError> {
        let records = self.require_page()?.clone();
        self.storage.save_record(&records, &self.tags, record)?;
        Ok(())
    }

    /// Deletes from storage first, then from the page.
    pub fn remove_record(&mut self, record: RecordHandle) -> Result<(), PageError> {
        let records = self.require_page()?.clone();
        self.storage.remove_record(&records, record)?;
        records.remove_record(record)?;
        Ok(())
    }

    pub fn subscribe(&mut self, callback: impl Fn(&PageEvent) + 'static) -> SubscriptionId {
        let id = self.ids.next();
        self.observers.add(id, Rc::new(callback));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.remove(id)
    }

    fn publish(&self, event: PageEvent) {
        self.observers.notification(event).deliver(|_| true);
    }
}

#[cfg(test)]
mod tests {
    use super::{PageError, PageRange};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_covers_whole_calendar_month() {
        let feb = PageRange::month(2024, 2).unwrap();
        assert_eq!(feb.first(), date(2024, 2, 1));
        assert_eq!(feb.last(), date(2024, 2, 29));
        assert_eq!(feb.days().count(), 29);

        let dec = PageRange::month(2023, 12).unwrap();
        assert_eq!(dec.last(), date(2023, 12, 31));
    }

    #[test]
    fn rejects_invalid_month_and_reversed_range() {
        assert_eq!(
            PageRange::month(2024, 13).unwrap_err(),
            PageError::InvalidMonth {
                year: 2024,
                month: 13
            }
        );
        assert!(matches!(
            PageRange::new(date(2024, 3, 2), date(2024, 3, 1)),
            Err(PageError::InvalidRange { .. })
        ));
    }

    #[test]
    fn single_day_range_contains_only_that_day() {
        let range = PageRange::single_day(date(2024, 3, 1));
        assert!(range.contains(date(2024, 3, 1)));
        assert!(!range.contains(date(2024, 3, 2)));
        assert_eq!(range.num_days(), 1);
    }
}
