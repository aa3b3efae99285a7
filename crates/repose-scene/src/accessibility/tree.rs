use std::collections::HashMap;

use bitflags::bitflags;
use repose_core::{
    LayoutDirection, Rect, Role, SemanticsConfig, SemanticsId, SemanticsKey, SemanticsNode,
    TextRange, ToggleableState, Vec2,
};

use crate::error::AccessibilityQueryError;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Traits: u16 {
        const BUTTON = 1 << 0;
        const HEADER = 1 << 1;
        const SELECTED = 1 << 2;
        const ADJUSTABLE = 1 << 3;
        const IMAGE = 1 << 4;
        const TEXT_FIELD = 1 << 5;
        const NOT_ENABLED = 1 << 6;
        const UPDATES_FREQUENTLY = 1 << 7;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ElementActions: u8 {
        const CLICK = 1 << 0;
        const FOCUS = 1 << 1;
        const SCROLL_FORWARD = 1 << 2;
        const SCROLL_BACKWARD = 1 << 3;
        const SET_PROGRESS = 1 << 4;
        const CUSTOM = 1 << 5;
    }
}

/// Role reported to desktop accessibility APIs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessibleRole {
    PushButton,
    CheckBox,
    RadioButton,
    ToggleButton,
    PageTab,
    Image,
    ComboBox,
    Slider,
    ProgressBar,
    PasswordText,
    ScrollPane,
    Text,
    Label,
    Panel,
}

impl AccessibleRole {
    fn of(config: &SemanticsConfig) -> Self {
        match config.role() {
            Some(Role::Button) => return AccessibleRole::PushButton,
            Some(Role::Checkbox) => return AccessibleRole::CheckBox,
            Some(Role::RadioButton) => return AccessibleRole::RadioButton,
            Some(Role::Switch) => return AccessibleRole::ToggleButton,
            Some(Role::Tab) => return AccessibleRole::PageTab,
            Some(Role::Image) => return AccessibleRole::Image,
            Some(Role::DropdownList) => return AccessibleRole::ComboBox,
            Some(Role::Slider) => return AccessibleRole::Slider,
            Some(Role::ProgressBar) => return AccessibleRole::ProgressBar,
            Some(Role::Text | Role::TextField | Role::Container) | None => {}
        }
        if config.contains(SemanticsKey::Password) {
            AccessibleRole::PasswordText
        } else if config.is_scrollable() {
            AccessibleRole::ScrollPane
        } else if config.editable_text().is_some() || config.role() == Some(Role::TextField) {
            AccessibleRole::Text
        } else if config.text().is_some() {
            AccessibleRole::Label
        } else {
            AccessibleRole::Panel
        }
    }
}

/// One projected semantics node. An element with children also acts as the
/// accessibility container of those children.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessibilityElement {
    pub id: SemanticsId,
    pub parent: Option<SemanticsId>,
    pub children: Vec<SemanticsId>,
    pub config: SemanticsConfig,
    pub bounds_in_window: Rect,
    pub role: AccessibleRole,
    pub label: Option<String>,
    pub value: Option<String>,
    pub traits: Traits,
    pub actions: ElementActions,
}

impl AccessibilityElement {
    fn project(node: &SemanticsNode, parent: Option<SemanticsId>, origin: Vec2) -> Self {
        let config = &node.config;
        let label = config
            .content_description()
            .or(config.editable_text())
            .or(config.text())
            .map(str::to_owned);
        let value = config
            .state_description()
            .map(str::to_owned)
            .or_else(|| config.progress().map(|p| format!("{}%", p.percent())))
            .or_else(|| {
                config.toggleable_state().map(|s| {
                    match s {
                        ToggleableState::On => "on",
                        ToggleableState::Off => "off",
                        ToggleableState::Indeterminate => "mixed",
                    }
                    .to_owned()
                })
            });

        let mut traits = Traits::empty();
        traits.set(
            Traits::BUTTON,
            config.is_clickable() || config.role() == Some(Role::Button),
        );
        traits.set(Traits::HEADER, config.contains(SemanticsKey::Heading));
        traits.set(Traits::SELECTED, config.is_selected());
        traits.set(
            Traits::ADJUSTABLE,
            config.progress().is_some() && config.contains(SemanticsKey::SetProgress),
        );
        traits.set(Traits::IMAGE, config.role() == Some(Role::Image));
        traits.set(Traits::TEXT_FIELD, config.editable_text().is_some());
        traits.set(Traits::NOT_ENABLED, !config.is_enabled());
        traits.set(
            Traits::UPDATES_FREQUENTLY,
            config.contains(SemanticsKey::LiveRegion),
        );

        let mut actions = ElementActions::empty();
        actions.set(ElementActions::CLICK, config.is_clickable());
        actions.set(ElementActions::FOCUS, config.is_focusable());
        actions.set(ElementActions::SCROLL_FORWARD, config.is_scrollable());
        actions.set(ElementActions::SCROLL_BACKWARD, config.is_scrollable());
        actions.set(
            ElementActions::SET_PROGRESS,
            config.contains(SemanticsKey::SetProgress),
        );
        actions.set(ElementActions::CUSTOM, !config.custom_actions().is_empty());

        Self {
            id: node.id,
            parent,
            children: Vec::new(),
            config: config.clone(),
            bounds_in_window: node.bounds.translate(origin),
            role: AccessibleRole::of(config),
            label,
            value,
            traits,
            actions,
        }
    }

    pub fn is_container(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_focusable(&self) -> bool {
        self.config.is_focusable() && self.config.is_enabled()
    }

    pub fn is_focused(&self) -> bool {
        self.config.is_focused()
    }
}

/// Point-in-time projection of one owner's semantics tree. Elements are kept
/// in an id-indexed arena; parent and child links are ids.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AccessibilityTree {
    root: Option<SemanticsId>,
    elements: HashMap<SemanticsId, AccessibilityElement>,
}

impl AccessibilityTree {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Projects `root` and its meaningful descendants. Non-meaningful nodes
    /// are skipped and their children attached to the nearest meaningful
    /// ancestor. `origin` is the owner's position in the window.
    pub fn build(root: &SemanticsNode, origin: Vec2, direction: LayoutDirection) -> Self {
        let mut tree = Self {
            root: Some(root.id),
            elements: HashMap::new(),
        };
        tree.elements
            .insert(root.id, AccessibilityElement::project(root, None, origin));
        for child in &root.children {
            tree.collect(child, root.id, origin);
        }
        let ids: Vec<SemanticsId> = tree.elements.keys().copied().collect();
        for id in ids {
            tree.sort_children(id, direction);
        }
        tree
    }

    fn collect(&mut self, node: &SemanticsNode, parent: SemanticsId, origin: Vec2) {
        let attach_to = if node.config.is_meaningful() && !self.elements.contains_key(&node.id) {
            self.elements.insert(
                node.id,
                AccessibilityElement::project(node, Some(parent), origin),
            );
            if let Some(p) = self.elements.get_mut(&parent) {
                p.children.push(node.id);
            }
            node.id
        } else {
            parent
        };
        for child in &node.children {
            self.collect(child, attach_to, origin);
        }
    }

    // Top to bottom, then in reading direction.
    fn sort_children(&mut self, id: SemanticsId, direction: LayoutDirection) {
        let Some(mut children) = self.elements.get(&id).map(|e| e.children.clone()) else {
            return;
        };
        let key = |c: &SemanticsId| {
            let b = self
                .elements
                .get(c)
                .map(|e| e.bounds_in_window)
                .unwrap_or_default();
            let x = match direction {
                LayoutDirection::Ltr => b.x,
                LayoutDirection::Rtl => -(b.x + b.w),
            };
            (b.y, x)
        };
        children.sort_by(|a, b| {
            let (ay, ax) = key(a);
            let (by, bx) = key(b);
            ay.total_cmp(&by).then(ax.total_cmp(&bx))
        });
        if let Some(e) = self.elements.get_mut(&id) {
            e.children = children;
        }
    }

    pub fn root(&self) -> Option<&AccessibilityElement> {
        self.root.and_then(|id| self.elements.get(&id))
    }

    pub fn get(&self, id: SemanticsId) -> Option<&AccessibilityElement> {
        self.elements.get(&id)
    }

    pub fn contains(&self, id: SemanticsId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SemanticsId> + '_ {
        self.elements.keys().copied()
    }

    fn element(&self, id: SemanticsId) -> Result<&AccessibilityElement, AccessibilityQueryError> {
        self.elements
            .get(&id)
            .ok_or(AccessibilityQueryError::UnknownElement(id))
    }

    pub fn children_count(&self, id: SemanticsId) -> Result<usize, AccessibilityQueryError> {
        Ok(self.element(id)?.children.len())
    }

    pub fn child_at(
        &self,
        id: SemanticsId,
        index: usize,
    ) -> Result<Option<&AccessibilityElement>, AccessibilityQueryError> {
        let parent = self.element(id)?;
        Ok(parent.children.get(index).and_then(|c| self.elements.get(c)))
    }

    pub fn index_of_child(
        &self,
        id: SemanticsId,
        child: SemanticsId,
    ) -> Result<Option<usize>, AccessibilityQueryError> {
        Ok(self.element(id)?.children.iter().position(|c| *c == child))
    }

    pub fn bounds_in_window(&self, id: SemanticsId) -> Result<Rect, AccessibilityQueryError> {
        Ok(self.element(id)?.bounds_in_window)
    }

    /// Element under `point` (window coordinates). A focusable element wins
    /// over its descendants.
    pub fn hit_test(&self, point: Vec2) -> Option<&AccessibilityElement> {
        self.hit_test_from(self.root?, point)
    }

    fn hit_test_from(&self, id: SemanticsId, point: Vec2) -> Option<&AccessibilityElement> {
        let el = self.elements.get(&id)?;
        let inside = el.bounds_in_window.contains(point);
        if inside && el.is_focusable() {
            return Some(el);
        }
        // Later children paint on top.
        for child in el.children.iter().rev() {
            if let Some(hit) = self.hit_test_from(*child, point) {
                return Some(hit);
            }
        }
        inside.then_some(el)
    }

    /// First focusable element in traversal order.
    pub fn find_focusable(&self) -> Option<&AccessibilityElement> {
        self.find_focusable_from(self.root?)
    }

    fn find_focusable_from(&self, id: SemanticsId) -> Option<&AccessibilityElement> {
        let el = self.elements.get(&id)?;
        if el.is_focusable() {
            return Some(el);
        }
        el.children
            .iter()
            .find_map(|c| self.find_focusable_from(*c))
    }

    pub fn focused(&self) -> Option<&AccessibilityElement> {
        self.elements.values().find(|e| e.is_focused())
    }

    /// Value an "increment" (or "decrement") gesture sets on a progress
    /// element: one step for stepped ranges, a tenth of the range otherwise.
    pub fn adjusted_progress(
        &self,
        id: SemanticsId,
        forward: bool,
    ) -> Result<f32, AccessibilityQueryError> {
        let range = self
            .element(id)?
            .config
            .progress()
            .ok_or(AccessibilityQueryError::NotImplemented)?;
        let span = range.end - range.start;
        let step = if range.steps == 0 {
            span / 10.0
        } else {
            span / (range.steps + 1) as f32
        };
        let next = if forward {
            range.current + step
        } else {
            range.current - step
        };
        Ok(next.clamp(range.start, range.end))
    }

    /// Text geometry queries need text layout, which the scene does not own.
    pub fn text_range_bounds(
        &self,
        id: SemanticsId,
        _range: TextRange,
    ) -> Result<Rect, AccessibilityQueryError> {
        self.element(id)?;
        Err(AccessibilityQueryError::NotImplemented)
    }
}
