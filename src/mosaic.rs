// mosaic.rs — thumbnail grid peer of the viewer
//
// Mirrors the viewer's POIs, navigates the grid and filters thumbnails. Holds no image data;
// after every input it pushes title, status line and the highlighted thumbnail list to its
// `MosaicSurface`.

use crate::error::SettingsError;
use crate::event::{Key, MenuAction, ViewerEvent};
use crate::message::{Inbox, Outbox, SessionInput, ViewerMessage};
use crate::poi::Poi;
use crate::settings::check_fov;
use log::{debug, info, warn};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Current,
    HasPoi,
    Plain,
}

/// Whatever draws the thumbnail grid.
pub trait MosaicSurface {
    fn set_title(&mut self, title: &str);
    /// Empty when the current image has no POI.
    fn set_status(&mut self, status: &str);
    /// Thumbnails to lay out, in grid order.
    fn show_thumbnails(&mut self, thumbnails: &[(usize, Highlight)]);
}

pub struct MosaicState<M: MosaicSurface> {
    count: usize,
    index: usize,
    columns: usize,
    pois: BTreeMap<usize, Poi>,
    poi_only: bool,
    surface: M,
    peer: Option<Outbox>,
    closed: bool,
}

impl<M: MosaicSurface> MosaicState<M> {
    pub fn new(count: usize, columns: usize, surface: M, peer: Option<Outbox>) -> Self {
        let mut mosaic = Self {
            count,
            index: 0,
            columns: columns.max(1),
            pois: BTreeMap::new(),
            poi_only: false,
            surface,
            peer,
            closed: false,
        };
        mosaic.refresh();
        mosaic
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn poi(&self, index: usize) -> Option<&Poi> {
        self.pois.get(&index)
    }

    pub fn poi_only(&self) -> bool {
        self.poi_only
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn title(&self) -> String {
        format!("PicViewer Mosaic ({} of {})", self.index + 1, self.count)
    }

    /// Averaged POI position of the current image, or empty.
    pub fn status_text(&self) -> String {
        match self.pois.get(&self.index) {
            Some(poi) => {
                let c = poi.centre();
                format!(
                    "POI: {:.7} {:.7} {:.0}",
                    c.latitude, c.longitude, c.altitude
                )
            }
            None => String::new(),
        }
    }

    pub fn highlight(&self, index: usize) -> Highlight {
        if index == self.index {
            Highlight::Current
        } else if self.pois.contains_key(&index) {
            Highlight::HasPoi
        } else {
            Highlight::Plain
        }
    }

    /// Indices of the thumbnails shown, ascending.
    pub fn visible(&self) -> Vec<usize> {
        if self.poi_only {
            self.pois.range(..self.count).map(|(&i, _)| i).collect()
        } else {
            (0..self.count).collect()
        }
    }

    fn refresh(&mut self) {
        let thumbnails: Vec<(usize, Highlight)> = self
            .visible()
            .into_iter()
            .map(|i| (i, self.highlight(i)))
            .collect();
        let title = self.title();
        let status = self.status_text();
        self.surface.set_title(&title);
        self.surface.set_status(&status);
        self.surface.show_thumbnails(&thumbnails);
    }

    fn notify(&self, message: ViewerMessage) {
        if let Some(peer) = &self.peer {
            peer.post(message);
        }
    }

    /// Start over with a new set of `count` images; POIs of the old set are forgotten.
    fn open(&mut self, count: usize) {
        self.count = count;
        self.index = 0;
        self.pois.clear();
        self.poi_only = false;
    }

    fn set_index(&mut self, index: usize, notify: bool) {
        if index >= self.count {
            debug!(
                "mosaic: ignoring invalid image {index} (>{})",
                self.count.saturating_sub(1)
            );
            return;
        }
        self.index = index;
        if notify {
            self.notify(ViewerMessage::SetIndex { index });
        }
    }

    /// Move `by` places through the shown thumbnails. When the current image is filtered
    /// out, the nearest shown one in that direction is taken.
    fn step(&mut self, forward: bool, by: usize) {
        let visible = self.visible();
        let target = match visible.binary_search(&self.index) {
            Ok(pos) => {
                let pos = if forward {
                    pos.checked_add(by)
                } else {
                    pos.checked_sub(by)
                };
                pos.and_then(|p| visible.get(p).copied())
            }
            Err(pos) if forward => visible.get(pos).copied(),
            Err(pos) => pos.checked_sub(1).and_then(|p| visible.get(p).copied()),
        };
        match target {
            Some(i) => self.set_index(i, true),
            None => debug!("mosaic: no image in that direction"),
        }
    }

    pub fn set_fov(&self, fov_deg: f64) -> Result<(), SettingsError> {
        let fov_deg = check_fov(fov_deg)?;
        self.notify(ViewerMessage::SetFov { fov_deg });
        Ok(())
    }

    fn clear_current(&mut self) {
        if self.pois.remove(&self.index).is_some() {
            self.notify(ViewerMessage::ClearPoi { index: self.index });
        }
    }

    pub fn run(&mut self, inbox: &Inbox) {
        while !self.closed {
            match inbox.recv() {
                Some(input) => self.handle(input),
                None => break,
            }
        }
        debug!("mosaic finished");
    }

    pub fn handle(&mut self, input: SessionInput) {
        match input {
            SessionInput::Event(event) => self.handle_event(event),
            SessionInput::Message(message) => self.handle_message(message),
        }
    }

    pub fn handle_event(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::KeyPress(Key::Left) => self.step(false, 1),
            ViewerEvent::KeyPress(Key::Right) => self.step(true, 1),
            ViewerEvent::KeyPress(Key::Up) => self.step(false, self.columns),
            ViewerEvent::KeyPress(Key::Down) => self.step(true, self.columns),
            ViewerEvent::KeyPress(Key::Char('c' | 'C')) => self.clear_current(),
            ViewerEvent::KeyPress(Key::Char(_)) => {}
            ViewerEvent::Select(index) => self.set_index(index, true),
            ViewerEvent::MenuAction(action) => match action {
                MenuAction::OpenFolder(path) => {
                    self.notify(ViewerMessage::OpenFolder { path });
                }
                MenuAction::ShowAll => self.poi_only = false,
                MenuAction::ShowPoiOnly => self.poi_only = true,
                MenuAction::NextImage => self.step(true, 1),
                MenuAction::PrevImage => self.step(false, 1),
                MenuAction::ClearPoi => self.clear_current(),
                MenuAction::SetFov(fov) => {
                    if let Err(e) = self.set_fov(fov) {
                        warn!("ignoring FOV change: {e}");
                    }
                }
                MenuAction::Quit => {
                    self.notify(ViewerMessage::Close);
                    self.closed = true;
                    return;
                }
            },
            ViewerEvent::PointerDown(_) | ViewerEvent::PointerUp(_) | ViewerEvent::PointerLeave => {
                return;
            }
        }
        self.refresh();
    }

    pub fn handle_message(&mut self, message: ViewerMessage) {
        match message {
            ViewerMessage::SetIndex { index } => self.set_index(index, false),
            ViewerMessage::SetPoi { index, poi } => {
                let c = poi.centre();
                info!(
                    "POI for image {index}: {:.7} {:.7} {:.0}",
                    c.latitude, c.longitude, c.altitude
                );
                self.pois.insert(index, poi);
            }
            ViewerMessage::ClearPoi { index } => {
                self.pois.remove(&index);
            }
            ViewerMessage::Opened { count } => self.open(count),
            ViewerMessage::SetFov { .. } | ViewerMessage::OpenFolder { .. } => return,
            ViewerMessage::Close => {
                self.closed = true;
                return;
            }
        }
        self.refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PixelPosition;
    use crate::geo::Location;
    use crate::message::mailbox;
    use crate::poi::PoiCorner;

    #[derive(Default)]
    struct Grid {
        title: String,
        status: String,
        thumbnails: Vec<(usize, Highlight)>,
        refreshes: usize,
    }

    impl MosaicSurface for Grid {
        fn set_title(&mut self, title: &str) {
            self.title = title.to_string();
            self.refreshes += 1;
        }
        fn set_status(&mut self, status: &str) {
            self.status = status.to_string();
        }
        fn show_thumbnails(&mut self, thumbnails: &[(usize, Highlight)]) {
            self.thumbnails = thumbnails.to_vec();
        }
    }

    fn mosaic(count: usize, peer: Option<Outbox>) -> MosaicState<Grid> {
        MosaicState::new(count, 5, Grid::default(), peer)
    }

    fn poi() -> Poi {
        Poi {
            corner1: PoiCorner {
                pixel: PixelPosition::new(10, 10),
                location: Location::new(-35.0, 149.0, 600.0),
            },
            corner2: PoiCorner {
                pixel: PixelPosition::new(50, 60),
                location: Location::new(-35.0002, 149.0002, 602.0),
            },
        }
    }

    fn key(k: Key) -> ViewerEvent {
        ViewerEvent::KeyPress(k)
    }

    fn menu(action: MenuAction) -> ViewerEvent {
        ViewerEvent::MenuAction(action)
    }

    #[test]
    fn grid_navigation_stays_in_bounds() {
        let (viewer, inbox) = mailbox();
        let mut m = mosaic(12, Some(viewer));

        m.handle_event(key(Key::Left));
        assert_eq!(m.index(), 0);
        m.handle_event(key(Key::Up));
        assert_eq!(m.index(), 0);

        m.handle_event(key(Key::Down));
        assert_eq!(m.index(), 5);
        m.handle_event(key(Key::Down));
        assert_eq!(m.index(), 10);
        m.handle_event(key(Key::Down));
        assert_eq!(m.index(), 10);
        m.handle_event(key(Key::Right));
        m.handle_event(key(Key::Right));
        assert_eq!(m.index(), 11);
        assert_eq!(m.surface().title, "PicViewer Mosaic (12 of 12)");

        let sent: Vec<_> = std::iter::from_fn(|| inbox.try_recv()).collect();
        assert_eq!(sent.len(), 3);
        assert_eq!(
            sent.last(),
            Some(&SessionInput::Message(ViewerMessage::SetIndex { index: 11 }))
        );
    }

    #[test]
    fn peer_index_change_is_not_echoed() {
        let (viewer, inbox) = mailbox();
        let mut m = mosaic(4, Some(viewer));
        m.handle_message(ViewerMessage::SetIndex { index: 2 });
        assert_eq!(m.index(), 2);
        assert_eq!(m.surface().title, "PicViewer Mosaic (3 of 4)");
        assert_eq!(inbox.try_recv(), None);
    }

    #[test]
    fn surface_follows_pois_and_filter() {
        let mut m = mosaic(6, None);
        assert_eq!(m.surface().refreshes, 1);
        assert_eq!(m.surface().thumbnails.len(), 6);

        m.handle_message(ViewerMessage::SetPoi {
            index: 0,
            poi: poi(),
        });
        m.handle_message(ViewerMessage::SetPoi {
            index: 4,
            poi: poi(),
        });
        assert_eq!(m.surface().status, "POI: -35.0001000 149.0001000 601");
        assert_eq!(m.surface().thumbnails[0], (0, Highlight::Current));
        assert_eq!(m.surface().thumbnails[3], (3, Highlight::Plain));
        assert_eq!(m.surface().thumbnails[4], (4, Highlight::HasPoi));

        m.handle_event(menu(MenuAction::ShowPoiOnly));
        assert!(m.poi_only());
        assert_eq!(
            m.surface().thumbnails,
            vec![(0, Highlight::Current), (4, Highlight::HasPoi)]
        );

        m.handle_message(ViewerMessage::ClearPoi { index: 0 });
        assert_eq!(m.surface().thumbnails, vec![(4, Highlight::HasPoi)]);
        assert_eq!(m.surface().status, "");

        m.handle_event(menu(MenuAction::ShowAll));
        assert_eq!(m.surface().thumbnails.len(), 6);
    }

    #[test]
    fn filtered_navigation_skips_hidden_images() {
        let (viewer, inbox) = mailbox();
        let mut m = mosaic(20, Some(viewer));
        for index in [3, 8, 9, 15] {
            m.handle_message(ViewerMessage::SetPoi { index, poi: poi() });
        }
        m.handle_event(menu(MenuAction::ShowPoiOnly));

        // current image 0 is hidden: right goes to the first shown one
        m.handle_event(key(Key::Right));
        assert_eq!(m.index(), 3);
        m.handle_event(key(Key::Right));
        assert_eq!(m.index(), 8);
        m.handle_event(key(Key::Left));
        assert_eq!(m.index(), 3);
        // a row of five is longer than the filtered list
        m.handle_event(key(Key::Down));
        assert_eq!(m.index(), 3);
        m.handle_event(menu(MenuAction::NextImage));
        m.handle_event(menu(MenuAction::NextImage));
        m.handle_event(menu(MenuAction::NextImage));
        assert_eq!(m.index(), 15);
        m.handle_event(key(Key::Right));
        assert_eq!(m.index(), 15);

        let indices: Vec<_> = std::iter::from_fn(|| inbox.try_recv())
            .filter_map(|input| match input {
                SessionInput::Message(ViewerMessage::SetIndex { index }) => Some(index),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![3, 8, 3, 8, 9, 15]);
    }

    #[test]
    fn clear_key_tells_viewer() {
        let (viewer, inbox) = mailbox();
        let mut m = mosaic(3, Some(viewer));
        m.handle_event(key(Key::Char('c')));
        assert_eq!(inbox.try_recv(), None);

        m.handle_message(ViewerMessage::SetPoi {
            index: 0,
            poi: poi(),
        });
        m.handle_event(key(Key::Char('C')));
        assert!(m.poi(0).is_none());
        assert_eq!(
            inbox.try_recv(),
            Some(SessionInput::Message(ViewerMessage::ClearPoi { index: 0 }))
        );
    }

    #[test]
    fn fov_and_quit_go_to_viewer() {
        let (viewer, inbox) = mailbox();
        let mut m = mosaic(3, Some(viewer));
        m.handle_event(menu(MenuAction::SetFov(250.0)));
        assert_eq!(inbox.try_recv(), None);
        m.handle_event(menu(MenuAction::SetFov(45.0)));
        assert_eq!(
            inbox.try_recv(),
            Some(SessionInput::Message(ViewerMessage::SetFov { fov_deg: 45.0 }))
        );

        m.handle_event(menu(MenuAction::Quit));
        assert!(m.is_closed());
        assert_eq!(
            inbox.try_recv(),
            Some(SessionInput::Message(ViewerMessage::Close))
        );
    }

    #[test]
    fn open_goes_through_viewer() {
        let (viewer, inbox) = mailbox();
        let mut m = mosaic(3, Some(viewer));
        m.handle_message(ViewerMessage::SetPoi {
            index: 1,
            poi: poi(),
        });
        m.handle_event(ViewerEvent::Select(2));
        let _ = inbox.try_recv();

        m.handle_event(menu(MenuAction::OpenFolder("/data/run2".into())));
        assert_eq!(
            inbox.try_recv(),
            Some(SessionInput::Message(ViewerMessage::OpenFolder {
                path: "/data/run2".into()
            }))
        );
        assert_eq!(m.count(), 3);

        m.handle_message(ViewerMessage::Opened { count: 8 });
        assert_eq!((m.index(), m.count()), (0, 8));
        assert!(m.poi(1).is_none());
        assert_eq!(m.surface().title, "PicViewer Mosaic (1 of 8)");
        assert_eq!(m.surface().thumbnails.len(), 8);
    }
}
