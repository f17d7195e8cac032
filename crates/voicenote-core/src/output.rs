//! Caller-owned holder for the last finished composition.

use crate::error::Result;
use crate::pipeline::Composition;

/// Keeps the most recent successful [`Composition`] and whether it may be consumed.
///
/// Starting a run disables consumer actions (download/play). A successful run replaces
/// the artifact and re-enables them; a failed run keeps the old artifact but leaves
/// actions disabled until a later run succeeds.
#[derive(Debug, Default)]
pub struct OutputSlot {
    latest: Option<Composition>,
    enabled: bool,
}

impl OutputSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_run(&mut self) {
        self.enabled = false;
    }

    /// Record the outcome of a run and pass the error through, if any.
    pub fn finish(&mut self, result: Result<Composition>) -> Result<&Composition> {
        let composition = result?;
        self.enabled = true;
        Ok(&*self.latest.insert(composition))
    }

    /// The artifact, only while consumer actions are enabled.
    pub fn ready(&self) -> Option<&Composition> {
        self.latest.as_ref().filter(|_| self.enabled)
    }
}
