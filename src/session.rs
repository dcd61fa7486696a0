// session.rs — single-image viewer session
//
// Owns everything one viewer window needs (file list, current image, camera model, POIs)
// and is driven by one thread draining its inbox. Drawing goes through `ViewerSurface`.

use crate::camera::{CameraModel, CameraParams, PixelPosition, Pose};
use crate::elevation::ElevationQuery;
use crate::error::{CaptureError, SessionError};
use crate::event::{Key, MenuAction, ViewerEvent};
use crate::exif::{read_geotag, Geotag};
use crate::files::image_list;
use crate::geo::Location;
use crate::message::{Inbox, Outbox, SessionInput, ViewerMessage};
use crate::overlay::draw_poi;
use crate::poi::{CaptureHandle, Poi, PoiStore};
use crate::projection::ProjectionEngine;
use crate::settings::{check_fov, Settings};
use image::io::Reader as ImageReader;
use image::RgbaImage;
use log::{debug, info, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn decode_image(path: &Path) -> Result<RgbaImage, image::ImageError> {
    let reader = BufReader::new(File::open(path)?);
    let mut reader = ImageReader::new(reader).with_guessed_format()?;
    reader.no_limits();
    Ok(reader.decode()?.to_rgba8())
}

/// Whatever displays the session: image window plus map.
pub trait ViewerSurface {
    fn set_title(&mut self, title: &str);
    fn show_image(&mut self, image: &RgbaImage);
    fn show_footprint(&mut self, footprint: &[Location]);
    fn clear_footprint(&mut self);
    fn show_poi_rectangle(&mut self, name: &str, ring: &[Location]);
    fn remove_poi_rectangle(&mut self, name: &str);
}

pub struct ViewerSession<S: ViewerSurface> {
    files: Vec<PathBuf>,
    index: usize,
    settings: Settings,
    terrain: Arc<dyn ElevationQuery + Send + Sync>,
    engine: Option<ProjectionEngine>,
    pois: PoiStore,
    capture: Option<CaptureHandle>,
    image: Option<RgbaImage>,
    geotag: Option<Geotag>,
    surface: S,
    peer: Option<Outbox>,
    closed: bool,
}

impl<S: ViewerSurface> ViewerSession<S> {
    pub fn new(
        files: Vec<PathBuf>,
        settings: Settings,
        terrain: Arc<dyn ElevationQuery + Send + Sync>,
        surface: S,
        peer: Option<Outbox>,
    ) -> Result<Self, SessionError> {
        if files.is_empty() {
            return Err(SessionError::NoImages);
        }
        settings.validate()?;

        let mut session = Self {
            files,
            index: 0,
            settings,
            terrain,
            engine: None,
            pois: PoiStore::new(),
            capture: None,
            image: None,
            geotag: None,
            surface,
            peer,
            closed: false,
        };
        session.load_current();
        Ok(session)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_file(&self) -> &Path {
        &self.files[self.index]
    }

    pub fn pois(&self) -> &PoiStore {
        &self.pois
    }

    pub fn engine(&self) -> Option<&ProjectionEngine> {
        self.engine.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn geotag(&self) -> Option<&Geotag> {
        self.geotag.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Camera pose of the current image: geotag position plus configured mount angles.
    pub fn pose(&self) -> Option<Pose> {
        self.geotag.map(|g| Pose::from_mount(g.location(), self.settings.mount))
    }

    /// Process inputs until the session is closed or every sender has gone.
    pub fn run(&mut self, inbox: &Inbox) {
        while !self.closed {
            match inbox.recv() {
                Some(input) => self.handle(input),
                None => break,
            }
        }
        debug!("viewer session finished");
    }

    pub fn handle(&mut self, input: SessionInput) {
        match input {
            SessionInput::Event(event) => self.handle_event(event),
            SessionInput::Message(message) => self.handle_message(message),
        }
    }

    pub fn handle_event(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::PointerDown(pixel) => self.poi_capture_start(pixel),
            ViewerEvent::PointerUp(pixel) => self.poi_capture_done(pixel),
            ViewerEvent::PointerLeave => self.poi_cancel(),
            ViewerEvent::KeyPress(Key::Left) => self.prev_image(),
            ViewerEvent::KeyPress(Key::Right) => self.next_image(),
            ViewerEvent::KeyPress(_) => {}
            ViewerEvent::MenuAction(action) => match action {
                MenuAction::OpenFolder(path) => self.open_folder(&path),
                MenuAction::ClearPoi => self.clear_poi(),
                MenuAction::NextImage => self.next_image(),
                MenuAction::PrevImage => self.prev_image(),
                MenuAction::SetFov(fov) => self.set_fov(fov),
                MenuAction::Quit => {
                    self.notify(ViewerMessage::Close);
                    self.closed = true;
                }
                MenuAction::ShowAll | MenuAction::ShowPoiOnly => {}
            },
            ViewerEvent::Select(index) => self.set_index(index, true),
        }
    }

    pub fn handle_message(&mut self, message: ViewerMessage) {
        match message {
            ViewerMessage::SetIndex { index } => self.set_index(index, false),
            ViewerMessage::SetFov { fov_deg } => self.set_fov(fov_deg),
            ViewerMessage::SetPoi { index, poi } => {
                if index >= self.files.len() {
                    warn!("ignoring POI for unknown image {index}");
                    return;
                }
                self.pois.insert(index, poi);
                self.show_poi_on_map(index, &poi);
                if index == self.index {
                    self.redraw_image();
                }
            }
            ViewerMessage::ClearPoi { index } => {
                if self.pois.clear(index) {
                    self.remove_poi_from_map(index);
                    if index == self.index {
                        self.redraw_image();
                    }
                }
            }
            ViewerMessage::OpenFolder { path } => self.open_folder(&path),
            ViewerMessage::Opened { count } => {
                debug!("ignoring peer image set of {count} images");
            }
            ViewerMessage::Close => self.closed = true,
        }
    }

    /// Replace the image set. POIs of the old set are dropped; a folder without images
    /// leaves the current set in place.
    pub fn open_folder(&mut self, path: &Path) {
        let files = match image_list(path) {
            Ok(files) if !files.is_empty() => files,
            Ok(_) => {
                warn!("no images found in {}", path.display());
                return;
            }
            Err(e) => {
                warn!("failed to open {}: {}", path.display(), e);
                return;
            }
        };

        let old: Vec<usize> = self.pois.indices().collect();
        for index in old {
            self.remove_poi_from_map(index);
        }
        self.capture = None;
        self.pois.clear_all();

        info!("opened {} ({} images)", path.display(), files.len());
        let count = files.len();
        self.files = files;
        self.index = 0;
        self.load_current();
        self.notify(ViewerMessage::Opened { count });
    }

    fn notify(&self, message: ViewerMessage) {
        if let Some(peer) = &self.peer {
            peer.post(message);
        }
    }

    fn poi_capture_start(&mut self, pixel: PixelPosition) {
        self.capture = Some(self.pois.begin_capture(pixel));
    }

    fn poi_cancel(&mut self) {
        self.capture = None;
        self.pois.cancel_capture();
    }

    fn poi_capture_done(&mut self, pixel: PixelPosition) {
        let Some(handle) = self.capture.take() else {
            return;
        };
        let (Some(engine), Some(pose)) = (self.engine.as_ref(), self.pose()) else {
            warn!(
                "POI capture failed: no camera pose for {}",
                self.current_file().display()
            );
            self.pois.cancel_capture();
            return;
        };

        let result = self.pois.complete_capture(handle, pixel, self.index, |p| {
            engine.get_latlonalt_for_pixel(p, &pose)
        });
        match result {
            Ok(poi) => {
                info!(
                    "POI set for image {}: {:.7} {:.7}",
                    self.index,
                    poi.centre().latitude,
                    poi.centre().longitude
                );
                self.redraw_image();
                self.show_poi_on_map(self.index, &poi);
                self.notify(ViewerMessage::SetPoi {
                    index: self.index,
                    poi,
                });
            }
            Err(CaptureError::Rejected { .. }) | Err(CaptureError::NoPendingCapture) => {
                debug!("POI capture ignored");
            }
            Err(e) => warn!("POI capture failed: {e}"),
        }
    }

    fn clear_poi(&mut self) {
        self.poi_cancel();
        if self.pois.clear(self.index) {
            self.redraw_image();
            self.remove_poi_from_map(self.index);
            self.notify(ViewerMessage::ClearPoi { index: self.index });
        }
    }

    fn next_image(&mut self) {
        self.set_index(self.index + 1, true);
    }

    fn prev_image(&mut self) {
        match self.index.checked_sub(1) {
            Some(i) => self.set_index(i, true),
            None => info!("already at first image"),
        }
    }

    /// Switch to image `index`; `notify` tells the peer about it.
    pub fn set_index(&mut self, index: usize, notify: bool) {
        if index >= self.files.len() {
            info!("already at last image {}", self.index);
            return;
        }
        self.poi_cancel();
        self.index = index;
        self.load_current();
        if notify {
            self.notify(ViewerMessage::SetIndex { index });
        }
    }

    pub fn set_fov(&mut self, fov_deg: f64) {
        match check_fov(fov_deg) {
            Ok(fov) => {
                self.settings.fov_deg = fov;
                self.update_camera();
                self.update_map();
            }
            Err(e) => warn!("ignoring FOV change: {e}"),
        }
    }

    fn map_name(&self, index: usize) -> String {
        self.files[index].display().to_string()
    }

    fn show_poi_on_map(&mut self, index: usize, poi: &Poi) {
        let name = self.map_name(index);
        self.surface.show_poi_rectangle(&name, &poi.ground_rectangle());
    }

    fn remove_poi_from_map(&mut self, index: usize) {
        let name = self.map_name(index);
        self.surface.remove_poi_rectangle(&name);
    }

    fn load_current(&mut self) {
        let path = self.files[self.index].clone();
        let base = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = format!("{} ({} of {})", base, self.index + 1, self.files.len());
        self.surface.set_title(&title);

        self.image = match decode_image(&path) {
            Ok(img) => {
                debug!(
                    "loaded {} ({}x{})",
                    path.display(),
                    img.width(),
                    img.height()
                );
                Some(img)
            }
            Err(e) => {
                warn!("failed to decode {}: {}", path.display(), e);
                None
            }
        };

        self.geotag = match read_geotag(&path) {
            Ok(Some(tag)) => Some(tag),
            Ok(None) => {
                warn!("{} has no GPS position", path.display());
                None
            }
            Err(e) => {
                warn!("failed to read exif from {}: {}", path.display(), e);
                None
            }
        };
        if let Some(tag) = &self.geotag {
            let ground = self.terrain.elevation(tag.latitude, tag.longitude);
            if ground.is_none() {
                warn!(
                    "failed terrain lookup for {:.7} {:.7}",
                    tag.latitude, tag.longitude
                );
            }
        }

        self.redraw_image();
        self.update_camera();
        self.update_map();
    }

    fn redraw_image(&mut self) {
        let Some(base) = &self.image else {
            return;
        };
        let mut shown = base.clone();
        if let Some(poi) = self.pois.get(self.index) {
            draw_poi(&mut shown, poi);
        }
        self.surface.show_image(&shown);
    }

    /// Rebuild the camera model for the current image size and FOV.
    fn update_camera(&mut self) {
        let Some((w, h)) = self.image.as_ref().map(|i| i.dimensions()) else {
            self.engine = None;
            return;
        };
        if let Some(engine) = &self.engine {
            let cam = engine.camera();
            if cam.width() == w
                && cam.height() == h
                && cam.horizontal_fov_deg() == self.settings.fov_deg
            {
                return;
            }
        }

        let params = CameraParams::new(w, h, self.settings.fov_deg)
            .with_vertical_fov(self.settings.vertical_fov);
        let camera = match CameraModel::new(params) {
            Ok(c) => c,
            Err(e) => {
                warn!("failed to update camera settings: {e}");
                self.engine = None;
                return;
            }
        };
        match &mut self.engine {
            Some(engine) => engine.set_camera(camera),
            None => {
                match ProjectionEngine::new(camera, self.terrain.clone(), self.settings.search) {
                    Ok(engine) => {
                        info!("projecting against {} terrain", engine.terrain_source());
                        self.engine = Some(engine);
                    }
                    Err(e) => warn!("failed to create projection: {e}"),
                }
            }
        }
    }

    fn update_map(&mut self) {
        let (Some(engine), Some(pose)) = (self.engine.as_ref(), self.pose()) else {
            self.surface.clear_footprint();
            return;
        };
        match engine.get_projection(&pose) {
            Ok(footprint) => self.surface.show_footprint(&footprint),
            Err(e) => {
                warn!("failed to add projection to map: {e}");
                self.surface.clear_footprint();
            }
        }
    }
}
