//! Direct evaluation of a check list against in-memory items.

use apfilter_vocab::Item;

use crate::check::Checks;
use crate::cursor::Cursor;

/// Filter one item, or the members of a collection.
///
/// Collections (bare lists and collection objects) come back with only the
/// matching members and an updated count, then paginated by the cursor built
/// from the same checks. A single item comes back only when every check and
/// every cursor step accepts it.
pub fn filter_item(checks: &Checks, item: Item) -> Option<Item> {
    let mut cursor = Cursor::from_checks(checks);
    match item {
        Item::Collection(members) => {
            let mut out = Item::Collection(retain_matching(checks, members));
            cursor.apply(&mut out);
            Some(out)
        }
        Item::Object(mut obj) if obj.shape().is_collection() => {
            let members = obj.items.take().unwrap_or_default();
            obj.set_items(retain_matching(checks, members));
            let mut out = Item::Object(obj);
            cursor.apply(&mut out);
            Some(out)
        }
        item if checks.matches(&item) => cursor.apply_single(item),
        _ => None,
    }
}

/// Filter a slice of items, keeping order.
pub fn filter_items(checks: &Checks, items: &[Item]) -> Vec<Item> {
    let mut cursor = Cursor::from_checks(checks);
    items
        .iter()
        .filter(|it| checks.matches(it))
        .filter(|it| cursor.accept(it))
        .cloned()
        .collect()
}

fn retain_matching(checks: &Checks, members: Vec<Item>) -> Vec<Item> {
    members.into_iter().filter(|m| checks.matches(m)).collect()
}
