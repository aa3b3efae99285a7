//! Draw-command sink handed to compositions during `render`.
//!
//! A canvas is borrowed for the duration of one draw pass and never retained.
//! Backends implement [`Canvas::draw`]; the helpers are provided on top of it.

use crate::{Color, Rect, Vec2};

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Rect {
        rect: Rect,
        color: Color,
        radius: f32,
    },
    Border {
        rect: Rect,
        color: Color,
        width: f32,
        radius: f32,
    },
    Text {
        rect: Rect,
        text: String,
        color: Color,
        size: f32,
    },
    PushClip {
        rect: Rect,
        radius: f32,
    },
    PopClip,
    PushTranslate(Vec2),
    PopTranslate,
}

pub trait Canvas {
    fn draw(&mut self, cmd: DrawCommand);

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.draw(DrawCommand::Rect {
            rect,
            color,
            radius: 0.0,
        });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32) {
        self.draw(DrawCommand::Border {
            rect,
            color,
            width,
            radius: 0.0,
        });
    }

    fn text(&mut self, rect: Rect, text: &str, color: Color, size: f32) {
        self.draw(DrawCommand::Text {
            rect,
            text: text.to_owned(),
            color,
            size,
        });
    }

    /// Moves the origin by `by` until the matching [`Canvas::pop_translate`].
    fn push_translate(&mut self, by: Vec2) {
        self.draw(DrawCommand::PushTranslate(by));
    }

    fn pop_translate(&mut self) {
        self.draw(DrawCommand::PopTranslate);
    }

    fn push_clip(&mut self, rect: Rect) {
        self.draw(DrawCommand::PushClip { rect, radius: 0.0 });
    }

    fn pop_clip(&mut self) {
        self.draw(DrawCommand::PopClip);
    }
}

/// Canvas that records commands, for tests and for backends that replay a
/// frame later.
#[derive(Clone, Debug, Default)]
pub struct RecordingCanvas {
    pub commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands that actually paint, ignoring clip/translate bookkeeping.
    pub fn paint_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    DrawCommand::Clear(_)
                        | DrawCommand::Rect { .. }
                        | DrawCommand::Border { .. }
                        | DrawCommand::Text { .. }
                )
            })
            .count()
    }
}

impl Canvas for RecordingCanvas {
    fn draw(&mut self, cmd: DrawCommand) {
        self.commands.push(cmd);
    }
}
