use serde::{Deserialize, Serialize};

use crate::error::SessionError;

use super::Session;
use super::diff::{DiffLine, line_diff};
use super::source::SourceBuffer;

/// How the document is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    /// The structured editing surface.
    #[default]
    RichText,
    /// Raw markdown, edited directly.
    Source,
    /// Raw markdown against the reference version.
    Diff,
}

impl ViewMode {
    /// Modes that show the raw text mirror instead of the structured tree.
    pub const fn shows_source(self) -> bool {
        matches!(self, Self::Source | Self::Diff)
    }
}

impl std::str::FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rich-text" | "rich" => Ok(Self::RichText),
            "source" => Ok(Self::Source),
            "diff" => Ok(Self::Diff),
            other => Err(format!("unknown view mode `{other}`")),
        }
    }
}

impl Session {
    pub fn view_mode(&self) -> ViewMode {
        self.inner.view_mode.get()
    }

    /// Switch presentation. Leaving the source or diff view re-imports the
    /// raw text first, so the tree is current before the mode flag moves.
    /// Entering one refreshes the raw text from the snapshot unless an
    /// import error is pending, in which case the failed text stays.
    ///
    /// # Errors
    /// As [`Session::set_markdown`].
    pub fn set_view_mode(&self, mode: ViewMode) -> Result<(), SessionError> {
        let current = self.view_mode();
        if current == mode {
            return Ok(());
        }
        if current.shows_source() {
            let raw = self.source_text();
            tracing::debug!(from = ?current, to = ?mode, bytes = raw.len(), "reconciling raw source");
            self.set_markdown(&raw)?;
        }
        self.inner.view_mode.set(mode);
        if mode.shows_source() && self.inner.error.borrow().is_none() {
            let snapshot = self.markdown();
            self.inner.source.borrow_mut().sync(&snapshot);
        }
        tracing::debug!(mode = ?mode, "view mode changed");
        Ok(())
    }

    /// Replace the raw text of the source view. The host is told about the
    /// new text; the structured tree waits for the next mode change.
    pub fn edit_source(&self, text: &str) {
        self.edit_source_with(|buffer| buffer.replace_all(text));
    }

    /// Edit the raw source buffer in place.
    pub fn edit_source_with(&self, edit: impl FnOnce(&mut SourceBuffer)) {
        let text = {
            let mut buffer = self.inner.source.borrow_mut();
            edit(&mut buffer);
            if !buffer.is_dirty() {
                return;
            }
            buffer.text()
        };
        self.emit_change(&text);
    }

    /// The reference markdown diffed against the raw text.
    pub fn diff_view(&self) -> Vec<DiffLine> {
        line_diff(&self.diff_markdown(), &self.source_text())
    }
}
