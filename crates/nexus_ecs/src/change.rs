//! Shadow-copy change detection.
//!
//! Queries that watch components keep a private duplicate of each watched
//! store (same lane layout, same capacity). A changed scan walks the
//! matched set, compares every watched field's live row against the shadow
//! row, records entities that differ, and resynchronises the shadow so the
//! next scan only reports fresh mutations.

use crate::entity::Entity;
use crate::store::ColumnStore;
use crate::world::{ComponentId, ComponentInfo};

/// One watched component's shadow buffer.
#[derive(Debug)]
pub(crate) struct WatchedComponent {
    pub(crate) component: ComponentId,
    pub(crate) shadow: ColumnStore,
}

/// Change-detection state for a single query.
#[derive(Debug)]
pub(crate) struct WatchState {
    pub(crate) watched: Vec<WatchedComponent>,
    changed: Vec<Entity>,
}

impl WatchState {
    pub(crate) fn new(watched: Vec<WatchedComponent>) -> Self {
        Self {
            watched,
            changed: Vec::new(),
        }
    }

    pub(crate) fn resize(&mut self, capacity: usize) {
        for wc in &mut self.watched {
            wc.shadow.resize(capacity);
        }
    }
}

/// Scan the matched set for watched-value mutations.
///
/// With `clear` the changed list is reset first, so the result holds exactly
/// the entities whose watched values differ from the last observation;
/// without it, results accumulate across scans. O(matched × watched fields).
pub(crate) fn scan(
    components: &[ComponentInfo],
    matched: &[Entity],
    watch: &mut WatchState,
    clear: bool,
) -> Vec<Entity> {
    if clear {
        watch.changed.clear();
    }
    for &entity in matched {
        let row = entity.index();
        let mut differs = false;
        for wc in &mut watch.watched {
            let live = &components[wc.component.index()].store;
            if !live.row_eq(&wc.shadow, row) {
                differs = true;
                wc.shadow.copy_row_from(live, row);
            }
        }
        if differs && !watch.changed.contains(&entity) {
            watch.changed.push(entity);
        }
    }
    watch.changed.clone()
}
