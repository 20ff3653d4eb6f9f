use storyreel_core::layout::{default_layout, normalize_layout, scale_layout, LayoutElement, LayoutSource};
use storyreel_core::types::{Resolution, StoryWithPages};
use tracing::{debug, warn};

use crate::storage::LayoutStore;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayout {
    /// Geometry on the 800x450 reference canvas.
    pub elements: Vec<LayoutElement>,
    pub source: LayoutSource,
}

impl ResolvedLayout {
    fn fallback(source: LayoutSource) -> Self {
        Self {
            elements: default_layout(),
            source,
        }
    }

    pub fn scaled(&self, target: Resolution) -> Vec<LayoutElement> {
        scale_layout(&self.elements, target)
    }
}

/// Load the story's saved layout, falling back to the built-in default when it
/// is unset, cannot be fetched, does not exist, or has no valid items.
pub async fn resolve(store: &dyn LayoutStore, story: &StoryWithPages) -> ResolvedLayout {
    let Some(layout_id) = story.settings.layout_id else {
        debug!(story_id = %story.id, "no layout set, using default");
        return ResolvedLayout::fallback(LayoutSource::DefaultUnset);
    };

    let raw = match store.get_layout(layout_id).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            warn!(story_id = %story.id, %layout_id, "layout not found, using default");
            return ResolvedLayout::fallback(LayoutSource::DefaultMissing);
        }
        Err(e) => {
            warn!(story_id = %story.id, %layout_id, error = %format!("{e:#}"), "layout fetch failed, using default");
            return ResolvedLayout::fallback(LayoutSource::DefaultFetchFailed);
        }
    };

    let elements = normalize_layout(&raw.items);
    if elements.is_empty() {
        warn!(story_id = %story.id, %layout_id, items = raw.items.len(), "layout has no valid items, using default");
        return ResolvedLayout::fallback(LayoutSource::DefaultEmpty);
    }

    debug!(story_id = %story.id, %layout_id, elements = elements.len(), "resolved saved layout");
    ResolvedLayout {
        elements,
        source: LayoutSource::Saved,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
