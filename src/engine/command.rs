//! Commands dispatched through editors.

use super::node::FormatKind;

/// Handler priority. Higher priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandPriority {
    Editor,
    Low,
    Normal,
    High,
    Critical,
}

/// Where a focus request should place the caret when nothing is selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefaultSelection {
    #[default]
    RootStart,
    RootEnd,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FocusOptions {
    pub default_selection: DefaultSelection,
    pub prevent_scroll: bool,
}

/// A blur notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlurEvent {
    /// Focus moved to something outside the root editing surface, as opposed
    /// to a nested editor or a popup owned by it.
    pub leaves_root: bool,
}

/// Modifier state of a key press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Cmd on macOS.
    pub const fn control_or_meta(self) -> bool {
        if cfg!(target_os = "macos") {
            self.meta
        } else {
            self.ctrl
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: char,
    pub modifiers: Modifiers,
}

/// Commands understood by the engine and its plugins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectionChange,
    Focus,
    Blur(BlurEvent),
    KeyDown(KeyEvent),
    FormatText(FormatKind),
    /// A nested editor changed content its parent mirrors.
    NestedEditorUpdated,
}

/// Discriminant used to key handler registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    SelectionChange,
    Focus,
    Blur,
    KeyDown,
    FormatText,
    NestedEditorUpdated,
}

impl Command {
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::SelectionChange => CommandKind::SelectionChange,
            Self::Focus => CommandKind::Focus,
            Self::Blur(_) => CommandKind::Blur,
            Self::KeyDown(_) => CommandKind::KeyDown,
            Self::FormatText(_) => CommandKind::FormatText,
            Self::NestedEditorUpdated => CommandKind::NestedEditorUpdated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priorities_order_critical_highest() {
        let mut priorities = vec![
            CommandPriority::Low,
            CommandPriority::Critical,
            CommandPriority::Editor,
            CommandPriority::High,
        ];
        priorities.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities[0], CommandPriority::Critical);
        assert_eq!(priorities[3], CommandPriority::Editor);
    }

    #[test]
    fn test_command_kind_matches_variant() {
        let cmd = Command::Blur(BlurEvent { leaves_root: true });
        assert_eq!(cmd.kind(), CommandKind::Blur);
    }
}
