//! Remote-controls pages surfaced to hardware controllers.

use crate::error::{CoreError, Result};
use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use std::sync::Arc;

/// Parameter slots per page.
pub const REMOTE_CONTROLS_COUNT: usize = 8;

/// Size of the fixed name buffers on the ABI side, NUL included.
pub const NAME_SIZE: usize = 256;

/// Longest prefix of `name` that fits in `max_bytes` without splitting a character.
pub fn truncate_name(name: &str, max_bytes: usize) -> &str {
    if name.len() <= max_bytes {
        return name;
    }
    let mut end = max_bytes;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// A page of up to eight parameter slots. Slot value `0` means unassigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteControlsPage {
    pub section_name: String,
    pub page_id: u32,
    pub page_name: String,
    pub param_ids: [u32; REMOTE_CONTROLS_COUNT],
    pub is_for_preset: bool,
}

impl RemoteControlsPage {
    pub fn assigned(&self) -> impl Iterator<Item = u32> + '_ {
        self.param_ids.iter().copied().filter(|id| *id != 0)
    }
}

/// Builds a page, remembering the first error until [`PageBuilder::build`].
#[derive(Debug)]
pub struct PageBuilder {
    page: RemoteControlsPage,
    next: usize,
    error: Option<CoreError>,
}

impl PageBuilder {
    pub fn new(page_id: u32, page_name: impl Into<String>) -> Self {
        Self {
            page: RemoteControlsPage {
                page_id,
                page_name: page_name.into(),
                ..RemoteControlsPage::default()
            },
            next: 0,
            error: None,
        }
    }

    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.page.section_name = section.into();
        self
    }

    pub fn for_preset(mut self) -> Self {
        self.page.is_for_preset = true;
        self
    }

    pub fn add_parameter(mut self, param_id: u32) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.next >= REMOTE_CONTROLS_COUNT {
            self.error = Some(CoreError::PageFull(REMOTE_CONTROLS_COUNT));
            return self;
        }
        self.page.param_ids[self.next] = param_id;
        self.next += 1;
        self
    }

    /// All-or-nothing: nothing is written if the ids do not fit.
    pub fn add_parameters(mut self, param_ids: &[u32]) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.next + param_ids.len() > REMOTE_CONTROLS_COUNT {
            self.error = Some(CoreError::PageFull(REMOTE_CONTROLS_COUNT));
            return self;
        }
        for id in param_ids {
            self.page.param_ids[self.next] = *id;
            self.next += 1;
        }
        self
    }

    pub fn set_parameter(mut self, slot: usize, param_id: u32) -> Self {
        if self.error.is_some() {
            return self;
        }
        if slot >= REMOTE_CONTROLS_COUNT {
            self.error = Some(CoreError::SlotOutOfRange {
                slot,
                count: REMOTE_CONTROLS_COUNT,
            });
            return self;
        }
        self.page.param_ids[slot] = param_id;
        self.next = self.next.max(slot + 1);
        self
    }

    pub fn clear_slot(mut self, slot: usize) -> Self {
        if self.error.is_some() {
            return self;
        }
        if slot >= REMOTE_CONTROLS_COUNT {
            self.error = Some(CoreError::SlotOutOfRange {
                slot,
                count: REMOTE_CONTROLS_COUNT,
            });
            return self;
        }
        self.page.param_ids[slot] = 0;
        self
    }

    /// Fill every slot after the last written one with `param_id`.
    pub fn fill_remaining(mut self, param_id: u32) -> Self {
        if self.error.is_some() {
            return self;
        }
        for slot in &mut self.page.param_ids[self.next..] {
            *slot = param_id;
        }
        self.next = REMOTE_CONTROLS_COUNT;
        self
    }

    pub fn clear_remaining(self) -> Self {
        self.fill_remaining(0)
    }

    pub fn build(self) -> Result<RemoteControlsPage> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.page.page_name.is_empty() {
            return Err(CoreError::EmptyPageName);
        }
        if self.page.assigned().next().is_none() {
            return Err(CoreError::NoParameters(self.page.page_id));
        }
        Ok(self.page)
    }
}

/// Receives page notifications on behalf of the host.
pub trait RemoteControlsNotifier: Send + Sync {
    fn changed(&self);
    fn suggest_page(&self, page_id: u32);
}

/// Per-instance page list.
pub struct RemoteControlsManager {
    pages: RwLock<Vec<RemoteControlsPage>>,
    notifier: ArcSwapOption<Box<dyn RemoteControlsNotifier>>,
}

impl Default for RemoteControlsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteControlsManager {
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(Vec::new()),
            notifier: ArcSwapOption::empty(),
        }
    }

    pub fn add_page(&self, page: RemoteControlsPage) -> Result<()> {
        let mut pages = self.pages.write();
        if pages.iter().any(|p| p.page_id == page.page_id) {
            return Err(CoreError::DuplicatePageId(page.page_id));
        }
        pages.push(page);
        Ok(())
    }

    pub fn page_count(&self) -> u32 {
        self.pages.read().len() as u32
    }

    pub fn page(&self, index: u32) -> Option<RemoteControlsPage> {
        self.pages.read().get(index as usize).cloned()
    }

    pub fn pages(&self) -> Vec<RemoteControlsPage> {
        self.pages.read().clone()
    }

    pub fn remove_page(&self, page_id: u32) -> bool {
        let mut pages = self.pages.write();
        let before = pages.len();
        pages.retain(|p| p.page_id != page_id);
        pages.len() != before
    }

    pub fn clear(&self) {
        self.pages.write().clear();
    }

    pub fn set_notifier(&self, notifier: impl RemoteControlsNotifier + 'static) {
        self.notifier.store(Some(Arc::new(
            Box::new(notifier) as Box<dyn RemoteControlsNotifier>
        )));
    }

    pub fn clear_notifier(&self) {
        self.notifier.store(None);
    }

    /// Tell the host the page list changed. `false` when no host is listening.
    pub fn notify_changed(&self) -> bool {
        match &*self.notifier.load() {
            Some(notifier) => {
                notifier.changed();
                true
            }
            None => false,
        }
    }

    pub fn suggest_page(&self, page_id: u32) -> bool {
        match &*self.notifier.load() {
            Some(notifier) => {
                notifier.suggest_page(page_id);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for RemoteControlsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteControlsManager")
            .field("pages", &self.pages.read().len())
            .field("has_notifier", &self.notifier.load().is_some())
            .finish()
    }
}
