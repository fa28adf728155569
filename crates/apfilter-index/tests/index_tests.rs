use std::sync::Arc;
use std::thread;

use apfilter_core::Checks;
use apfilter_index::{
    confirm_candidates, filters_from_checks, BasicFilter, CollectionIndex, Field, Index,
    IndexConfig, IndexError, PersistError,
};
use apfilter_vocab::{Item, Link, NaturalLanguageValues, Object};

fn note(id: &str, author: &str, content: &str) -> Item {
    let mut obj = Object::new(id, "Note");
    obj.attributed_to = Some(Item::link(author));
    obj.content = NaturalLanguageValues::und(content);
    obj.to = vec![Item::link(Link::public())];
    Item::object(obj)
}

fn person(id: &str, username: &str) -> Item {
    let mut obj = Object::new(id, "Person");
    obj.preferred_username = NaturalLanguageValues::und(username);
    Item::object(obj)
}

fn links(found: Vec<Link>) -> Vec<String> {
    let mut out: Vec<String> = found.into_iter().map(Link::into_string).collect();
    out.sort();
    out
}

fn populated() -> Index {
    let index = Index::default();
    for item in [
        note("https://ex.com/n/1", "https://ex.com/u/bob", "<p>Rust is fun</p>"),
        note("https://ex.com/n/2", "https://ex.com/u/alice", "Gardening tips"),
        person("https://ex.com/u/bob", "Bob"),
        person("https://ex.com/u/alice", "alice"),
    ] {
        index.add(&item).expect("add");
    }
    index
}

#[test]
fn test_query_string_through_bridge() {
    let index = populated();
    let checks = Checks::from_query("type=Note&content=~rust");
    let found = index.find(&filters_from_checks(&checks)).expect("find");
    assert_eq!(links(found), vec!["https://ex.com/n/1"]);
}

#[test]
fn test_names_match_preferred_username_case_insensitively() {
    let index = populated();
    let found = index
        .find(&[BasicFilter::equals(Field::Name, "BOB")])
        .expect("find");
    assert_eq!(links(found), vec!["https://ex.com/u/bob"]);
}

#[test]
fn test_recipients_field_sees_public() {
    let index = populated();
    let checks = Checks::from_query(&format!(
        "recipients={}",
        "https%3A%2F%2Fwww.w3.org%2Fns%2Factivitystreams%23Public"
    ));
    let found = index.find(&filters_from_checks(&checks)).expect("find");
    assert_eq!(links(found), vec!["https://ex.com/n/1", "https://ex.com/n/2"]);
}

#[test]
fn test_collection_scope() {
    let index = populated();
    let collections = CollectionIndex::new(index.config());
    collections.add_member("https://ex.com/u/alice/outbox", "https://ex.com/n/2");

    let scope = collections.members("https://ex.com/u/alice/outbox");
    let found = index
        .find_in(&scope, &[BasicFilter::equals(Field::Type, "Note")])
        .expect("find_in");
    assert_eq!(links(found), vec!["https://ex.com/n/2"]);

    let nothing = index
        .find_in(&collections.members("https://ex.com/unknown"), &[])
        .expect("find_in");
    assert!(nothing.is_empty());
}

#[test]
fn test_save_and_load_through_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("items.apfx");

    let index = populated();
    index.save(&path).expect("save");
    let back = Index::load(IndexConfig::default(), &path).expect("load");
    assert_eq!(back.len(), index.len());
    assert!(back.contains("https://ex.com/n/2"));

    std::fs::write(&path, b"garbage").expect("overwrite");
    assert!(matches!(
        Index::load(IndexConfig::default(), &path),
        Err(IndexError::Persist(PersistError::InvalidMagic))
    ));
}

#[test]
fn test_collection_bytes_are_not_a_field_index() {
    let collections = CollectionIndex::default();
    collections.add_member("https://ex.com/c", "https://ex.com/x");
    let bytes = collections.encode().expect("encode");
    assert!(matches!(
        Index::restore(IndexConfig::default(), &bytes),
        Err(IndexError::Persist(PersistError::WrongPayload { .. }))
    ));
}

#[test]
fn test_seed_is_part_of_identity() {
    let a = Index::new(IndexConfig::default().with_seed(1));
    let b = Index::new(IndexConfig::default().with_seed(2));
    assert_ne!(a.reference("https://ex.com/n/1"), b.reference("https://ex.com/n/1"));
}

#[test]
fn test_extraction_errors_are_reported_per_field() {
    let index = Index::new(IndexConfig::default().with_fields([Field::Type, Field::Actor]));
    let err = index.add(&Item::link("https://ex.com/bare")).unwrap_err();
    let errors = match err {
        IndexError::Extraction(errors) => errors,
        other => panic!("unexpected error {other}"),
    };
    let fields: Vec<Field> = errors.iter().map(|e| e.field).collect();
    assert_eq!(fields, vec![Field::Type, Field::Actor]);
}

#[test]
fn test_non_ascii_links_survive_the_bridge() {
    let index = Index::default();
    let cafe = note("https://ex.com/n/1", "https://ex.com/users/caf\u{e9}", "hi");
    let other = note("https://ex.com/n/2", "https://ex.com/users/bob", "hi");
    index.add(&cafe).expect("add");
    index.add(&other).expect("add");

    for query in [
        "attributedTo=~caf%C3%A9",
        "attributedTo=~users%2Fcaf\u{e9}",
        "attributedTo=https%3A%2F%2Fex.com%2Fusers%2Fcaf%C3%A9",
    ] {
        let checks = Checks::from_query(query);
        assert!(checks.matches(&cafe), "{query}");
        assert!(!checks.matches(&other), "{query}");
        let found = index.find(&filters_from_checks(&checks)).expect("find");
        assert_eq!(links(found), vec!["https://ex.com/n/1"], "{query}");
    }
}

#[test]
fn test_readers_share_the_index_with_a_writer() {
    const NOTES: usize = 200;
    let index = Arc::new(Index::default());

    let writer = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for i in 0..NOTES {
                let item = note(&format!("https://ex.com/n/{i}"), "https://ex.com/u/bob", "x");
                index.add(&item).expect("add");
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                let mut seen = 0;
                while seen < NOTES {
                    let found = index
                        .find(&[BasicFilter::equals(Field::Type, "Note")])
                        .expect("find");
                    assert!(found.len() >= seen, "answers never shrink");
                    assert!(found.len() <= NOTES);
                    seen = found.len();
                    thread::yield_now();
                }
            })
        })
        .collect();

    writer.join().expect("writer");
    for reader in readers {
        reader.join().expect("reader");
    }
    let found = index
        .find(&[
            BasicFilter::equals(Field::Type, "Note"),
            BasicFilter::equals(Field::AttributedTo, "https://ex.com/u/bob"),
        ])
        .expect("find");
    assert_eq!(found.len(), NOTES);
    assert_eq!(index.len(), NOTES);
}

#[test]
fn test_confirmed_candidates_are_paginated() {
    let items: Vec<Item> = (1..=6)
        .map(|i| note(&format!("https://ex.com/n/{i}"), "https://ex.com/u/bob", "hello"))
        .collect();
    let index = Index::default();
    for item in &items {
        index.add(item).expect("add");
    }

    let checks = Checks::from_query("type=Note&after=https://ex.com/n/2&maxItems=2");
    let candidates = index.find(&filters_from_checks(&checks)).expect("find");
    assert_eq!(candidates.len(), 6);

    let kept: Vec<String> = confirm_candidates(&checks, &candidates, &items)
        .iter()
        .filter_map(|it| it.id().map(|l| l.as_str().to_string()))
        .collect();
    assert_eq!(kept, vec!["https://ex.com/n/3", "https://ex.com/n/4"]);
}

#[test]
fn test_files_remember_their_seed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("seeded.apfx");
    let config = IndexConfig::default().with_seed(11);
    let index = Index::new(config.clone());
    index
        .add(&note("https://ex.com/n/1", "https://ex.com/u/bob", "hi"))
        .expect("add");
    index.save(&path).expect("save");

    assert!(Index::load(config.clone(), &path)
        .expect("load")
        .contains("https://ex.com/n/1"));
    assert!(matches!(
        Index::load(IndexConfig::default(), &path),
        Err(IndexError::Persist(PersistError::SeedMismatch { found: 11, .. }))
    ));
}
