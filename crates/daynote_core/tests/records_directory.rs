use chrono::NaiveDate;
use daynote_core::{
    DirectoryError, PartitionKey, RecordEvent, RecordSetEvent, RecordsDirectory,
    RecordsDirectoryEvent, SubscriptionId, TagsDirectory,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn collect_set_events(
    records: &RecordsDirectory,
    date: Option<NaiveDate>,
) -> Rc<RefCell<Vec<RecordSetEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    records
        .record_set(PartitionKey::from(date))
        .subscribe(move |event| sink.borrow_mut().push(*event))
        .unwrap();
    events
}

#[test]
fn create_record_starts_undated_and_blank() {
    let records = RecordsDirectory::new();
    let record = records.create_record();

    let value = records.record(record).unwrap();
    assert_eq!(value.id(), None);
    assert_eq!(value.date(), None);
    assert_eq!(value.title(), "");
    assert_eq!(value.description(), "");
    assert!(!value.is_complete());
    assert!(value.tags().is_empty());
    assert_eq!(records.records_without_date().records(), vec![record]);
}

#[test]
fn every_record_is_in_exactly_one_set() {
    let records = RecordsDirectory::new();
    let a = records.create_record();
    let b = records.create_record();
    let c = records.get_or_create_record("c");

    records.set_date(a, Some(day(1))).unwrap();
    records.set_date(b, Some(day(1))).unwrap();
    records.set_date(b, Some(day(2))).unwrap();
    records.set_date(c, Some(day(2))).unwrap();
    records.set_date(c, None).unwrap();

    let dates = [day(1), day(2), day(3)];
    for record in records.records() {
        let expected = records.record(record).unwrap().date();
        let mut hits = 0;
        for date in dates {
            let contained = records.records_by_date(date).contains(record);
            assert_eq!(contained, expected == Some(date));
            hits += usize::from(contained);
        }
        let undated = records.records_without_date().contains(record);
        assert_eq!(undated, expected.is_none());
        hits += usize::from(undated);
        assert_eq!(hits, 1);
    }
    assert_eq!(records.records_by_date(day(1)).records(), vec![a]);
    assert_eq!(records.records_by_date(day(2)).records(), vec![b]);
    assert_eq!(records.records_without_date().records(), vec![c]);
}

#[test]
fn date_change_notifies_both_sets_once() {
    let records = RecordsDirectory::new();
    let tags = TagsDirectory::new();
    let work = tags.create_tag();
    let record = records.create_record();
    records.set_date(record, Some(day(1))).unwrap();
    records.set_tags(record, [work]).unwrap();

    let old_events = collect_set_events(&records, Some(day(1)));
    let new_events = collect_set_events(&records, Some(day(2)));

    records.set_date(record, Some(day(2))).unwrap();

    for events in [&old_events, &new_events] {
        let events = events.borrow();
        let membership = events
            .iter()
            .filter(|event| **event == RecordSetEvent::MembershipChanged)
            .count();
        assert_eq!(membership, 1);
        assert!(events.contains(&RecordSetEvent::TagsChanged));
    }
    assert!(records.records_by_date(day(1)).is_empty());
    assert_eq!(records.records_by_date(day(2)).records(), vec![record]);
}

#[test]
fn date_change_of_untagged_record_only_reports_membership() {
    let records = RecordsDirectory::new();
    let record = records.create_record();
    let undated = collect_set_events(&records, None);
    let dated = collect_set_events(&records, Some(day(4)));

    records.set_date(record, Some(day(4))).unwrap();
    records.set_date(record, Some(day(4))).unwrap();

    assert_eq!(*undated.borrow(), vec![RecordSetEvent::MembershipChanged]);
    assert_eq!(*dated.borrow(), vec![RecordSetEvent::MembershipChanged]);
}

#[test]
fn observers_see_post_mutation_state() {
    let records = RecordsDirectory::new();
    let record = records.create_record();
    records.set_date(record, Some(day(1))).unwrap();

    let observed = Rc::new(Cell::new(None));
    let probe = records.clone();
    let sink = Rc::clone(&observed);
    records
        .records_by_date(day(1))
        .subscribe(move |_| {
            let in_new = probe.records_by_date(day(2)).contains(record);
            let in_old = probe.records_by_date(day(1)).contains(record);
            sink.set(Some((in_old, in_new)));
        })
        .unwrap();

    records.set_date(record, Some(day(2))).unwrap();
    assert_eq!(observed.get(), Some((false, true)));
}

#[test]
fn get_or_create_record_is_idempotent() {
    let records = RecordsDirectory::new();
    let first = records.get_or_create_record("X");
    let second = records.get_or_create_record("X");
    assert_eq!(first, second);
    assert_eq!(records.len(), 1);
    assert_eq!(records.find_record("X"), Some(first));
}

#[test]
fn colliding_id_change_is_rejected_without_changes() {
    let records = RecordsDirectory::new();
    let a = records.get_or_create_record("a");
    let b = records.get_or_create_record("b");

    let err = records.set_id(b, "a").unwrap_err();
    assert_eq!(
        err,
        DirectoryError::DuplicateRecordId {
            id: "a".to_string(),
            existing: a,
        }
    );
    assert_eq!(records.record(a).unwrap().id(), Some("a"));
    assert_eq!(records.record(b).unwrap().id(), Some("b"));
    assert_eq!(records.find_record("a"), Some(a));
    assert_eq!(records.find_record("b"), Some(b));
}

#[test]
fn id_change_moves_index_entry() {
    let records = RecordsDirectory::new();
    let record = records.create_record();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    records
        .subscribe_record(record, move |event| sink.borrow_mut().push(event.clone()))
        .unwrap();

    records.set_id(record, "first").unwrap();
    records.set_id(record, "second").unwrap();

    assert_eq!(records.find_record("first"), None);
    assert_eq!(records.find_record("second"), Some(record));
    assert_eq!(
        events.borrow().last(),
        Some(&RecordEvent::IdChanged {
            old: Some("first".to_string()),
            new: Some("second".to_string()),
        })
    );
}

#[test]
fn ensure_id_assigns_once() {
    let records = RecordsDirectory::new();
    let record = records.create_record();
    let id = records.ensure_id(record).unwrap();
    assert!(!id.is_empty());
    assert_eq!(records.ensure_id(record).unwrap(), id);
    assert_eq!(records.find_record(&id), Some(record));
}

#[test]
fn removed_record_handle_is_stale() {
    let records = RecordsDirectory::new();
    let record = records.get_or_create_record("gone");
    records.set_date(record, Some(day(5))).unwrap();

    records.remove_record(record).unwrap();

    assert!(records.records_by_date(day(5)).is_empty());
    assert_eq!(records.find_record("gone"), None);
    assert_eq!(
        records.set_title(record, "late").unwrap_err(),
        DirectoryError::StaleRecord(record)
    );
    assert_eq!(
        records.remove_record(record).unwrap_err(),
        DirectoryError::StaleRecord(record)
    );
}

#[test]
fn clear_records_empties_sets_and_notifies() {
    let records = RecordsDirectory::new();
    let a = records.create_record();
    records.set_date(a, Some(day(1))).unwrap();
    records.create_record();

    let dated = collect_set_events(&records, Some(day(1)));
    let cleared = Rc::new(Cell::new(false));
    let flag = Rc::clone(&cleared);
    records.subscribe(move |event| {
        if *event == RecordsDirectoryEvent::RecordsCleared {
            flag.set(true);
        }
    });

    records.clear_records();

    assert!(records.is_empty());
    assert!(records.records_by_date(day(1)).is_empty());
    assert!(records.records_without_date().is_empty());
    assert_eq!(*dated.borrow(), vec![RecordSetEvent::MembershipChanged]);
    assert!(cleared.get());
    assert!(!records.contains(a));
}

#[test]
fn handler_may_remove_record_during_notification() {
    let records = RecordsDirectory::new();
    let record = records.create_record();
    records.set_date(record, Some(day(1))).unwrap();

    let directory = records.clone();
    records
        .records_by_date(day(1))
        .subscribe(move |event| {
            if *event == RecordSetEvent::StatesChanged {
                directory.remove_record(record).unwrap();
            }
        })
        .unwrap();

    records.set_complete(record, true).unwrap();

    assert!(records.is_empty());
    assert!(records.records_by_date(day(1)).is_empty());
}

#[test]
fn unsubscribe_inside_callback_stops_later_delivery() {
    let records = RecordsDirectory::new();
    let set = records.records_without_date();
    let victim: Rc<Cell<Option<SubscriptionId>>> = Rc::new(Cell::new(None));
    let victim_calls = Rc::new(Cell::new(0));

    let view = set.clone();
    let target = Rc::clone(&victim);
    set.subscribe(move |_| {
        if let Some(id) = target.get() {
            view.unsubscribe(id);
        }
    })
    .unwrap();
    let calls = Rc::clone(&victim_calls);
    let id = set.subscribe(move |_| calls.set(calls.get() + 1)).unwrap();
    victim.set(Some(id));

    records.create_record();
    records.create_record();

    assert_eq!(victim_calls.get(), 0);
    assert!(!set.unsubscribe(id));
}

#[test]
fn record_field_events_fire_only_on_change() {
    let records = RecordsDirectory::new();
    let record = records.create_record();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let id = records
        .subscribe_record(record, move |event| sink.borrow_mut().push(event.clone()))
        .unwrap();

    records.set_title(record, "Plan").unwrap();
    records.set_title(record, "Plan").unwrap();
    records.set_description(record, "details").unwrap();
    records.set_complete(record, true).unwrap();
    records.set_complete(record, true).unwrap();

    assert_eq!(
        *events.borrow(),
        vec![
            RecordEvent::TitleChanged("Plan".to_string()),
            RecordEvent::DescriptionChanged("details".to_string()),
            RecordEvent::CompleteChanged(true),
        ]
    );

    assert!(records.unsubscribe(id));
    records.set_title(record, "Other").unwrap();
    assert_eq!(events.borrow().len(), 3);
}

#[test]
fn strip_and_replace_tag_rewrite_links() {
    let tags = TagsDirectory::new();
    let old = tags.create_tag();
    let new = tags.create_tag();
    let other = tags.create_tag();
    let records = RecordsDirectory::new();
    let a = records.create_record();
    let b = records.create_record();
    records.set_tags(a, [old, other]).unwrap();
    records.set_tags(b, [new, old]).unwrap();

    assert_eq!(records.replace_tag(old, new), 2);
    assert_eq!(records.record(a).unwrap().tags(), &[new, other]);
    assert_eq!(records.record(b).unwrap().tags(), &[new]);

    assert_eq!(records.strip_tag(new), 2);
    assert_eq!(records.record(a).unwrap().tags(), &[other]);
    assert!(records.record(b).unwrap().tags().is_empty());
}

#[test]
fn add_and_remove_tag_report_changes() {
    let tags = TagsDirectory::new();
    let work = tags.create_tag();
    let records = RecordsDirectory::new();
    let record = records.create_record();

    assert!(records.add_tag(record, work).unwrap());
    assert!(!records.add_tag(record, work).unwrap());
    assert!(records.remove_tag(record, work).unwrap());
    assert!(!records.remove_tag(record, work).unwrap());
}

#[test]
fn empty_id_creates_unidentified_records() {
    let records = RecordsDirectory::new();
    let first = records.get_or_create_record("");
    let second = records.get_or_create_record("");

    assert_ne!(first, second);
    assert_eq!(records.record(first).unwrap().id(), None);
    assert_eq!(records.find_record(""), None);

    let id = records.ensure_id(first).unwrap();
    assert!(!id.is_empty());
    assert_eq!(records.find_record(&id), Some(first));
}

#[test]
fn foreign_subscription_ids_are_ignored() {
    let records = RecordsDirectory::new();
    let other = RecordsDirectory::new();
    let tags = TagsDirectory::new();
    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    let own = records.subscribe(move |_| counter.set(counter.get() + 1));

    let tag_id = tags.subscribe(|_| {});
    let other_id = other.subscribe(|_| {});
    assert!(!records.unsubscribe(tag_id));
    assert!(!records.unsubscribe(other_id));
    assert!(!records.records_without_date().unsubscribe(other_id));

    records.create_record();
    assert_eq!(hits.get(), 1);
    assert!(records.unsubscribe(own));
}
