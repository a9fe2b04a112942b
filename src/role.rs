//! Accessibility roles the navigation engines branch on.

/// Role of an accessible node, as reported by the bus.
///
/// This is the subset of the bus's role vocabulary that the navigation
/// engines actually make decisions about; everything else maps to
/// [`Role::Unknown`] and gets default treatment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Role {
    Application,
    Window,
    DocumentFrame,
    Section,
    Paragraph,
    Heading,
    Link,
    Text,
    Entry,
    Label,
    PushButton,
    ToggleButton,
    CheckBox,
    RadioButton,
    ComboBox,
    ListBox,
    List,
    ListItem,
    Table,
    TableCell,
    Image,
    ToolBar,
    MenuBar,
    Menu,
    MenuItem,
    PageTabList,
    PageTab,
    ScrollBar,
    ScrollPane,
    Panel,
    Separator,
    Unknown,
}

impl Role {
    /// Roles that mark a node as an atomic control: the caret never
    /// descends into their internal structure, though the node itself
    /// remains a valid stopping position.
    ///
    /// Entering these would strand the cursor inside native widget
    /// internals the toolkit never meant to expose as content.
    #[must_use]
    pub fn is_atomic_control(self) -> bool {
        matches!(
            self,
            Self::ComboBox
                | Self::ListBox
                | Self::PushButton
                | Self::ToggleButton
                | Self::CheckBox
                | Self::RadioButton
                | Self::TableCell
                | Self::MenuItem
                | Self::ScrollBar
        )
    }

    /// Roles that host a caret context of their own.
    #[must_use]
    pub fn is_document(self) -> bool {
        matches!(self, Self::DocumentFrame)
    }

    /// Roles that exist for layout only: they carry no content of
    /// their own and are not presented when they have nothing to say.
    #[must_use]
    pub fn is_layout_container(self) -> bool {
        matches!(
            self,
            Self::Application
                | Self::Window
                | Self::DocumentFrame
                | Self::Section
                | Self::Panel
                | Self::ScrollPane
                | Self::PageTabList
        )
    }

    /// Human-readable role name, as a presentation fallback.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Window => "window",
            Self::DocumentFrame => "document",
            Self::Section => "section",
            Self::Paragraph => "paragraph",
            Self::Heading => "heading",
            Self::Link => "link",
            Self::Text => "text",
            Self::Entry => "entry",
            Self::Label => "label",
            Self::PushButton => "button",
            Self::ToggleButton => "toggle button",
            Self::CheckBox => "check box",
            Self::RadioButton => "radio button",
            Self::ComboBox => "combo box",
            Self::ListBox => "list box",
            Self::List => "list",
            Self::ListItem => "list item",
            Self::Table => "table",
            Self::TableCell => "cell",
            Self::Image => "image",
            Self::ToolBar => "tool bar",
            Self::MenuBar => "menu bar",
            Self::Menu => "menu",
            Self::MenuItem => "menu item",
            Self::PageTabList => "page tab list",
            Self::PageTab => "page tab",
            Self::ScrollBar => "scroll bar",
            Self::ScrollPane => "scroll pane",
            Self::Panel => "panel",
            Self::Separator => "separator",
            Self::Unknown => "unknown",
        }
    }
}
