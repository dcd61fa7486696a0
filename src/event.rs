// event.rs — input events, decoded once at the platform boundary

use crate::camera::PixelPosition;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Char(char),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuAction {
    /// Replace the image set with the images in a folder (or a single file).
    OpenFolder(PathBuf),
    ClearPoi,
    NextImage,
    PrevImage,
    ShowAll,
    ShowPoiOnly,
    SetFov(f64),
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    PointerDown(PixelPosition),
    PointerUp(PixelPosition),
    /// Pointer left the image; abandons any drag in progress.
    PointerLeave,
    KeyPress(Key),
    MenuAction(MenuAction),
    /// Thumbnail clicked in the mosaic.
    Select(usize),
}

fn pixel(args: &[&str]) -> Option<PixelPosition> {
    match args {
        [x, y] => Some(PixelPosition::new(x.parse().ok()?, y.parse().ok()?)),
        _ => None,
    }
}

impl ViewerEvent {
    /// Decode one line of the text command protocol used by the headless binary, e.g.
    /// `press 10 20`, `release 90 120`, `key right`, `fov 62.5`, `open /data/photos`, `quit`.
    pub fn parse_command(line: &str) -> Option<Self> {
        // the folder path is the rest of the line and may contain spaces
        if let Some((cmd, rest)) = line.trim().split_once(char::is_whitespace) {
            if cmd.eq_ignore_ascii_case("open") && !rest.trim().is_empty() {
                let dir = PathBuf::from(rest.trim());
                return Some(ViewerEvent::MenuAction(MenuAction::OpenFolder(dir)));
            }
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        let (cmd, args) = words.split_first()?;

        let event = match (cmd.to_ascii_lowercase().as_str(), args) {
            ("press", a) => ViewerEvent::PointerDown(pixel(a)?),
            ("release", a) => ViewerEvent::PointerUp(pixel(a)?),
            ("leave", []) => ViewerEvent::PointerLeave,
            ("key", [k]) => ViewerEvent::KeyPress(match k.to_ascii_lowercase().as_str() {
                "left" => Key::Left,
                "right" => Key::Right,
                "up" => Key::Up,
                "down" => Key::Down,
                other => {
                    let mut chars = other.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Key::Char(c),
                        _ => return None,
                    }
                }
            }),
            ("next", []) => ViewerEvent::MenuAction(MenuAction::NextImage),
            ("prev", []) => ViewerEvent::MenuAction(MenuAction::PrevImage),
            ("clear", []) => ViewerEvent::MenuAction(MenuAction::ClearPoi),
            ("all", []) => ViewerEvent::MenuAction(MenuAction::ShowAll),
            ("poi-only", []) => ViewerEvent::MenuAction(MenuAction::ShowPoiOnly),
            ("fov", [v]) => ViewerEvent::MenuAction(MenuAction::SetFov(v.parse().ok()?)),
            ("quit", []) => ViewerEvent::MenuAction(MenuAction::Quit),
            ("select", [i]) => ViewerEvent::Select(i.parse().ok()?),
            _ => return None,
        };
        Some(event)
    }
}
