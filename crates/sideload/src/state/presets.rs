use sideload_core::PresetAppEntry;

/// Opens Play Store listings one after another: the first on `start`, each
/// following one when the user comes back to the app.
#[derive(Debug, Clone)]
pub struct PresetSequence {
    entries: &'static [PresetAppEntry],
    next: Option<usize>,
}

impl PresetSequence {
    pub fn new(entries: &'static [PresetAppEntry]) -> Self {
        Self {
            entries,
            next: None,
        }
    }

    pub fn start(&mut self) -> Option<&'static PresetAppEntry> {
        self.next = Some(0);
        self.take_next()
    }

    pub fn on_resume(&mut self) -> Option<&'static PresetAppEntry> {
        self.take_next()
    }

    pub fn is_active(&self) -> bool {
        self.next.is_some()
    }

    pub fn remaining(&self) -> usize {
        self.next
            .map_or(0, |index| self.entries.len().saturating_sub(index))
    }

    fn take_next(&mut self) -> Option<&'static PresetAppEntry> {
        let index = self.next?;
        let entries = self.entries;
        let Some(entry) = entries.get(index) else {
            self.next = None;
            return None;
        };

        let next = index + 1;
        self.next = (next < entries.len()).then_some(next);
        Some(entry)
    }
}
