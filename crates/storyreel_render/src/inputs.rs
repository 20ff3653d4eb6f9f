use std::collections::BTreeMap;
use storyreel_core::types::Page;
use tracing::debug;

use crate::command::EncodeCommand;
use crate::storage::MediaStorage;

/// Single black frame used when no page has any media.
pub const PLACEHOLDER_SOURCE: &str = "color=c=black:s=2x2:r=1:d=1";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageInputs {
    pub image: Option<usize>,
    pub speech: Option<usize>,
}

/// Input indices per page position, built for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInputMap {
    pages: BTreeMap<usize, PageInputs>,
    placeholder: Option<usize>,
}

impl MediaInputMap {
    pub fn get(&self, page_index: usize) -> PageInputs {
        self.pages.get(&page_index).copied().unwrap_or_default()
    }

    pub fn image(&self, page_index: usize) -> Option<usize> {
        self.get(page_index).image
    }

    pub fn speech(&self, page_index: usize) -> Option<usize> {
        self.get(page_index).speech
    }

    pub fn placeholder(&self) -> Option<usize> {
        self.placeholder
    }

    /// Every registered index, ascending.
    pub fn indices(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self
            .pages
            .values()
            .flat_map(|p| p.image.into_iter().chain(p.speech))
            .chain(self.placeholder)
            .collect();
        all.sort_unstable();
        all
    }
}

/// Add every page's image (looped still) then finished narration to `command`.
///
/// Pages are taken in the order given. When nothing is registered, one
/// placeholder frame is added so the encoder always has an input.
pub fn register_all(
    command: &mut EncodeCommand,
    pages: &[&Page],
    storage: &dyn MediaStorage,
) -> MediaInputMap {
    let mut map = MediaInputMap::default();

    for (i, page) in pages.iter().enumerate() {
        let mut entry = PageInputs::default();
        if let Some(image) = &page.default_image {
            let index = command.add_input(&storage.media_path(&image.path), &["-loop", "1"]);
            debug!(page = page.page_number, input = index, "registered image");
            entry.image = Some(index);
        }
        if let Some(speech) = page.ready_speech() {
            let index = command.add_input(&storage.media_path(&speech.path), &[]);
            debug!(page = page.page_number, input = index, "registered speech");
            entry.speech = Some(index);
        }
        if entry != PageInputs::default() {
            map.pages.insert(i, entry);
        }
    }

    if command.inputs().is_empty() {
        map.placeholder = Some(command.add_lavfi(PLACEHOLDER_SOURCE));
        debug!("no page media, registered placeholder input");
    }

    map
}
