//! Moving and linking entries across collections.

use std::sync::Arc;

use bujo_core::commands::{
    CommandHandler, CreateCollectionInput, CreateEntryInput, MembershipInput,
    MoveEntryToCollectionInput,
};
use bujo_core::config::AppConfig;
use bujo_core::models::CollectionType;
use bujo_core::JournalService;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

async fn journal() -> JournalService {
    let mut config = AppConfig::default();
    config.sync.background = false;
    JournalService::open_in_memory(None, config).await.unwrap()
}

async fn collection(journal: &JournalService, name: &str) -> String {
    let input = CreateCollectionInput::new(name, CollectionType::Custom);
    let id = input.id.clone();
    journal
        .handlers()
        .create_collection
        .handle(input)
        .await
        .unwrap();
    id
}

fn member_ids(journal: &JournalService, collection_id: &str) -> Vec<String> {
    journal
        .entries()
        .get_entries_by_collection(collection_id)
        .into_iter()
        .map(|entry| entry.id)
        .collect()
}

#[tokio::test]
async fn move_leaves_a_ghost_and_never_drops_the_entry() {
    let journal = journal().await;
    let work = collection(&journal, "Work").await;
    let home = collection(&journal, "Home").await;

    let input = CreateEntryInput::new("Fix the sink").in_collection(&work);
    let entry_id = input.id.clone();
    journal.handlers().create_task.handle(input).await.unwrap();

    let visible_somewhere = Arc::new(Mutex::new(Vec::new()));
    let _watch = {
        let entries = Arc::clone(journal.entries());
        let seen = Arc::clone(&visible_somewhere);
        let (entry_id, work, home) = (entry_id.clone(), work.clone(), home.clone());
        journal.entries().subscribe(move || {
            let entry = entries.get_entry(&entry_id);
            let visible = entry.is_some_and(|entry| entry.is_in(&work) || entry.is_in(&home));
            seen.lock().push(visible);
        })
    };

    journal
        .handlers()
        .move_to_collection
        .handle(MoveEntryToCollectionInput {
            entry_id: entry_id.clone(),
            from_collection_id: Some(work.clone()),
            to_collection_id: home.clone(),
        })
        .await
        .unwrap();

    let observed = visible_somewhere.lock().clone();
    assert_eq!(observed, vec![true, true]);
    assert_eq!(member_ids(&journal, &home), vec![entry_id.clone()]);
    assert!(member_ids(&journal, &work).is_empty());

    let work_view = journal.entries().get_collection_view(&work);
    assert_eq!(work_view.len(), 1);
    assert_eq!(work_view[0].entry.id, entry_id);
    assert_eq!(work_view[0].ghost_of.as_deref(), Some(home.as_str()));
    journal.shutdown().await;
}

#[tokio::test]
async fn link_keeps_the_entry_in_both_collections() {
    let journal = journal().await;
    let work = collection(&journal, "Work").await;
    let reading = collection(&journal, "Reading").await;

    let input = CreateEntryInput::new("Design patterns").in_collection(&work);
    let entry_id = input.id.clone();
    journal.handlers().create_note.handle(input).await.unwrap();

    journal
        .handlers()
        .add_to_collection
        .handle(MembershipInput::new(&entry_id, &reading))
        .await
        .unwrap();

    assert_eq!(member_ids(&journal, &work), vec![entry_id.clone()]);
    assert_eq!(member_ids(&journal, &reading), vec![entry_id.clone()]);
    assert!(journal
        .entries()
        .get_collection_view(&work)
        .iter()
        .all(|row| !row.is_ghost()));

    journal
        .handlers()
        .remove_from_collection
        .handle(MembershipInput::new(&entry_id, &work))
        .await
        .unwrap();
    assert!(journal.entries().get_collection_view(&work).is_empty());
    assert_eq!(member_ids(&journal, &reading), vec![entry_id]);
    journal.shutdown().await;
}
