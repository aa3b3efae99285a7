//! Semantics tree produced by a composition.
//!
//! A composition describes what its content *means* (a button, a checked
//! checkbox, an editable text field) as a tree of [`SemanticsNode`]s. The
//! scene's accessibility mediator projects that tree into the platform's
//! accessibility hierarchy; it never mutates it.
//!
//! Properties form a closed enum. Each variant carries its value, and the
//! set of properties that make a node worth exposing is decided by an
//! exhaustive match in [`SemanticsProperty::is_meaningful`], so adding a
//! property forces a decision about it.

use crate::Rect;

/// Stable identifier of a semantics node inside one owner.
pub type SemanticsId = u64;

/// High‑level semantic role of a node, similar to ARIA roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Button,
    Checkbox,
    RadioButton,
    Switch,
    Tab,
    Image,
    DropdownList,
    Text,
    TextField,
    Slider,
    ProgressBar,
    Container,
}

impl Role {
    /// Roles that alone make a node worth exposing.
    pub fn is_meaningful(self) -> bool {
        match self {
            Role::Button
            | Role::Checkbox
            | Role::RadioButton
            | Role::Image
            | Role::DropdownList
            | Role::Switch => true,
            Role::Tab
            | Role::Text
            | Role::TextField
            | Role::Slider
            | Role::ProgressBar
            | Role::Container => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToggleableState {
    On,
    Off,
    Indeterminate,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollAxisRange {
    pub value: f32,
    pub max_value: f32,
    pub reverse_scrolling: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressBarRange {
    pub current: f32,
    pub start: f32,
    pub end: f32,
    /// Zero means continuous.
    pub steps: u32,
}

impl ProgressBarRange {
    /// Position of `current` inside the range, as a whole percentage.
    pub fn percent(&self) -> u32 {
        let span = self.end - self.start;
        if !span.is_finite() || span <= 0.0 {
            return 0;
        }
        let t = ((self.current - self.start) / span).clamp(0.0, 1.0);
        (t * 100.0).round() as u32
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CustomAction {
    pub label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LiveRegionMode {
    Polite,
    Assertive,
}

/// Discriminant of [`SemanticsProperty`], used as the map key and as the
/// unit of change in accessibility diffs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SemanticsKey {
    ContentDescription,
    Text,
    EditableText,
    TextSelectionRange,
    StateDescription,
    Role,
    OnClick,
    Heading,
    Focusable,
    Focused,
    Selected,
    Disabled,
    ToggleableState,
    LiveRegion,
    CustomActions,
    HorizontalScrollAxisRange,
    VerticalScrollAxisRange,
    ProgressBarRange,
    SetProgress,
    Password,
    TestTag,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SemanticsProperty {
    ContentDescription(String),
    Text(String),
    EditableText(String),
    TextSelectionRange(TextRange),
    StateDescription(String),
    Role(Role),
    /// The node reacts to clicks; the label is what a screen reader announces
    /// for the action, if any.
    OnClick(Option<String>),
    Heading,
    Focusable,
    Focused(bool),
    Selected(bool),
    Disabled,
    ToggleableState(ToggleableState),
    LiveRegion(LiveRegionMode),
    CustomActions(Vec<CustomAction>),
    HorizontalScrollAxisRange(ScrollAxisRange),
    VerticalScrollAxisRange(ScrollAxisRange),
    ProgressBarRange(ProgressBarRange),
    SetProgress,
    Password,
    TestTag(String),
}

impl SemanticsProperty {
    pub fn key(&self) -> SemanticsKey {
        match self {
            SemanticsProperty::ContentDescription(_) => SemanticsKey::ContentDescription,
            SemanticsProperty::Text(_) => SemanticsKey::Text,
            SemanticsProperty::EditableText(_) => SemanticsKey::EditableText,
            SemanticsProperty::TextSelectionRange(_) => SemanticsKey::TextSelectionRange,
            SemanticsProperty::StateDescription(_) => SemanticsKey::StateDescription,
            SemanticsProperty::Role(_) => SemanticsKey::Role,
            SemanticsProperty::OnClick(_) => SemanticsKey::OnClick,
            SemanticsProperty::Heading => SemanticsKey::Heading,
            SemanticsProperty::Focusable => SemanticsKey::Focusable,
            SemanticsProperty::Focused(_) => SemanticsKey::Focused,
            SemanticsProperty::Selected(_) => SemanticsKey::Selected,
            SemanticsProperty::Disabled => SemanticsKey::Disabled,
            SemanticsProperty::ToggleableState(_) => SemanticsKey::ToggleableState,
            SemanticsProperty::LiveRegion(_) => SemanticsKey::LiveRegion,
            SemanticsProperty::CustomActions(_) => SemanticsKey::CustomActions,
            SemanticsProperty::HorizontalScrollAxisRange(_) => {
                SemanticsKey::HorizontalScrollAxisRange
            }
            SemanticsProperty::VerticalScrollAxisRange(_) => SemanticsKey::VerticalScrollAxisRange,
            SemanticsProperty::ProgressBarRange(_) => SemanticsKey::ProgressBarRange,
            SemanticsProperty::SetProgress => SemanticsKey::SetProgress,
            SemanticsProperty::Password => SemanticsKey::Password,
            SemanticsProperty::TestTag(_) => SemanticsKey::TestTag,
        }
    }

    /// Whether carrying this property alone makes a node worth exposing to
    /// assistive technology.
    pub fn is_meaningful(&self) -> bool {
        match self {
            SemanticsProperty::ContentDescription(_)
            | SemanticsProperty::Text(_)
            | SemanticsProperty::EditableText(_)
            | SemanticsProperty::OnClick(_)
            | SemanticsProperty::Heading
            | SemanticsProperty::ToggleableState(_)
            | SemanticsProperty::LiveRegion(_)
            | SemanticsProperty::HorizontalScrollAxisRange(_)
            | SemanticsProperty::VerticalScrollAxisRange(_) => true,
            SemanticsProperty::CustomActions(actions) => !actions.is_empty(),
            SemanticsProperty::Role(role) => role.is_meaningful(),
            SemanticsProperty::TextSelectionRange(_)
            | SemanticsProperty::StateDescription(_)
            | SemanticsProperty::Focusable
            | SemanticsProperty::Focused(_)
            | SemanticsProperty::Selected(_)
            | SemanticsProperty::Disabled
            | SemanticsProperty::ProgressBarRange(_)
            | SemanticsProperty::SetProgress
            | SemanticsProperty::Password
            | SemanticsProperty::TestTag(_) => false,
        }
    }
}

/// Properties of one node, at most one per [`SemanticsKey`], kept in
/// insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SemanticsConfig {
    props: Vec<SemanticsProperty>,
}

impl SemanticsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property, replacing any previous value under the same key.
    pub fn set(&mut self, prop: SemanticsProperty) {
        let key = prop.key();
        match self.props.iter_mut().find(|p| p.key() == key) {
            Some(slot) => *slot = prop,
            None => self.props.push(prop),
        }
    }

    pub fn with(mut self, prop: SemanticsProperty) -> Self {
        self.set(prop);
        self
    }

    pub fn remove(&mut self, key: SemanticsKey) -> Option<SemanticsProperty> {
        let idx = self.props.iter().position(|p| p.key() == key)?;
        Some(self.props.remove(idx))
    }

    pub fn get(&self, key: SemanticsKey) -> Option<&SemanticsProperty> {
        self.props.iter().find(|p| p.key() == key)
    }

    pub fn contains(&self, key: SemanticsKey) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemanticsProperty> {
        self.props.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn is_meaningful(&self) -> bool {
        self.props.iter().any(SemanticsProperty::is_meaningful)
    }

    pub fn content_description(&self) -> Option<&str> {
        match self.get(SemanticsKey::ContentDescription) {
            Some(SemanticsProperty::ContentDescription(s)) => Some(s),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self.get(SemanticsKey::Text) {
            Some(SemanticsProperty::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn editable_text(&self) -> Option<&str> {
        match self.get(SemanticsKey::EditableText) {
            Some(SemanticsProperty::EditableText(s)) => Some(s),
            _ => None,
        }
    }

    pub fn state_description(&self) -> Option<&str> {
        match self.get(SemanticsKey::StateDescription) {
            Some(SemanticsProperty::StateDescription(s)) => Some(s),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self.get(SemanticsKey::Role) {
            Some(SemanticsProperty::Role(r)) => Some(*r),
            _ => None,
        }
    }

    pub fn toggleable_state(&self) -> Option<ToggleableState> {
        match self.get(SemanticsKey::ToggleableState) {
            Some(SemanticsProperty::ToggleableState(s)) => Some(*s),
            _ => None,
        }
    }

    pub fn selection(&self) -> Option<TextRange> {
        match self.get(SemanticsKey::TextSelectionRange) {
            Some(SemanticsProperty::TextSelectionRange(r)) => Some(*r),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<ProgressBarRange> {
        match self.get(SemanticsKey::ProgressBarRange) {
            Some(SemanticsProperty::ProgressBarRange(r)) => Some(*r),
            _ => None,
        }
    }

    pub fn custom_actions(&self) -> &[CustomAction] {
        match self.get(SemanticsKey::CustomActions) {
            Some(SemanticsProperty::CustomActions(a)) => a,
            _ => &[],
        }
    }

    pub fn is_focused(&self) -> bool {
        matches!(
            self.get(SemanticsKey::Focused),
            Some(SemanticsProperty::Focused(true))
        )
    }

    pub fn is_selected(&self) -> bool {
        matches!(
            self.get(SemanticsKey::Selected),
            Some(SemanticsProperty::Selected(true))
        )
    }

    pub fn is_enabled(&self) -> bool {
        !self.contains(SemanticsKey::Disabled)
    }

    pub fn is_clickable(&self) -> bool {
        self.contains(SemanticsKey::OnClick)
    }

    pub fn is_focusable(&self) -> bool {
        self.contains(SemanticsKey::Focusable)
            || self.contains(SemanticsKey::OnClick)
            || self.contains(SemanticsKey::EditableText)
    }

    pub fn is_scrollable(&self) -> bool {
        self.contains(SemanticsKey::HorizontalScrollAxisRange)
            || self.contains(SemanticsKey::VerticalScrollAxisRange)
    }
}

/// One node of the semantics tree. Bounds are in the owner's coordinate
/// space, in device pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct SemanticsNode {
    pub id: SemanticsId,
    pub bounds: Rect,
    pub config: SemanticsConfig,
    pub children: Vec<SemanticsNode>,
}

impl SemanticsNode {
    pub fn new(id: SemanticsId, bounds: Rect) -> Self {
        Self {
            id,
            bounds,
            config: SemanticsConfig::default(),
            children: Vec::new(),
        }
    }

    pub fn with(mut self, prop: SemanticsProperty) -> Self {
        self.config.set(prop);
        self
    }

    pub fn child(mut self, child: SemanticsNode) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first search by id.
    pub fn find(&self, id: SemanticsId) -> Option<&SemanticsNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// Actions a host can ask a semantics node to perform.
#[derive(Clone, Debug, PartialEq)]
pub enum SemanticsAction {
    Click,
    Focus,
    CustomAction(usize),
    ScrollForward,
    ScrollBackward,
    SetProgress(f32),
}
