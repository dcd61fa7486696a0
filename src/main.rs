// main.rs — headless viewer: a viewer session and its mosaic, driven by commands on stdin
//
// Usage: picviewer [--config <file>] [--fov <deg>] [--terrain <dir>] [path]
// Each stdin line is a command for the viewer (`press 10 20`, `release 300 200`, `next`,
// `fov 50`, `open <dir>`, `quit`, ...) or, prefixed with `mosaic`, for the mosaic
// (`mosaic key down`). `send <json>` posts a raw message, e.g.
// `send {"type":"set_fov","fov_deg":50}`.

use clap::Parser;
use image::RgbaImage;
use log::{debug, error, info, warn};
use picviewer::elevation::{ElevationQuery, FlatTerrain, SrtmTiles};
use picviewer::event::ViewerEvent;
use picviewer::files::image_list;
use picviewer::geo::Location;
use picviewer::message::{mailbox, Outbox, ViewerMessage};
use picviewer::mosaic::{Highlight, MosaicState, MosaicSurface};
use picviewer::session::{ViewerSession, ViewerSurface};
use picviewer::settings::{resolve_settings, CliArgs};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

/// Reports what a window would display.
struct LogSurface;

fn describe(ring: &[Location]) -> String {
    ring.iter()
        .map(|l| format!("({:.7} {:.7} {:.0})", l.latitude, l.longitude, l.altitude))
        .collect::<Vec<_>>()
        .join(" ")
}

impl ViewerSurface for LogSurface {
    fn set_title(&mut self, title: &str) {
        info!("{title}");
    }

    fn show_image(&mut self, image: &RgbaImage) {
        info!("showing {}x{} image", image.width(), image.height());
    }

    fn show_footprint(&mut self, footprint: &[Location]) {
        info!("footprint: {}", describe(footprint));
    }

    fn clear_footprint(&mut self) {
        info!("footprint cleared");
    }

    fn show_poi_rectangle(&mut self, name: &str, ring: &[Location]) {
        info!("POI {name}: {}", describe(ring));
    }

    fn remove_poi_rectangle(&mut self, name: &str) {
        info!("POI {name} removed");
    }
}

/// Reports what the thumbnail grid would display.
struct MosaicLog;

impl MosaicSurface for MosaicLog {
    fn set_title(&mut self, title: &str) {
        info!("{title}");
    }

    fn set_status(&mut self, status: &str) {
        if !status.is_empty() {
            info!("{status}");
        }
    }

    fn show_thumbnails(&mut self, thumbnails: &[(usize, Highlight)]) {
        let marked = thumbnails
            .iter()
            .filter(|(_, h)| *h != Highlight::Plain)
            .map(|(i, h)| format!("{i}:{h:?}"))
            .collect::<Vec<_>>()
            .join(" ");
        debug!("{} thumbnails [{marked}]", thumbnails.len());
    }
}

fn forward_stdin(viewer: Outbox, mosaic: Outbox) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("failed to read stdin: {e}");
                break;
            }
        };
        let (target, command) = match line.trim().strip_prefix("mosaic ") {
            Some(rest) => (&mosaic, rest),
            None => (&viewer, line.trim()),
        };
        if command.is_empty() {
            continue;
        }
        if let Some(json) = command.strip_prefix("send ") {
            match ViewerMessage::from_json_line(json) {
                Ok(message) => {
                    if !target.post(message) {
                        break;
                    }
                }
                Err(e) => warn!("bad message {json}: {e}"),
            }
            continue;
        }
        match ViewerEvent::parse_command(command) {
            Some(event) => {
                if !target.post_event(event) {
                    break;
                }
            }
            None => warn!("unknown command: {command}"),
        }
    }
    // Each session holds the other's outbox, so end of input has to close them explicitly.
    viewer.post(ViewerMessage::Close);
    mosaic.post(ViewerMessage::Close);
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = CliArgs::parse();
    let settings = match resolve_settings(&cli, |k| std::env::var(k).ok()) {
        Ok(s) => s,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let path = cli.path.clone().unwrap_or_else(|| PathBuf::from("."));
    let files = match image_list(&path) {
        Ok(f) if !f.is_empty() => f,
        Ok(_) => {
            error!("no images found in {}", path.display());
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!("{} images", files.len());

    let terrain: Arc<dyn ElevationQuery + Send + Sync> = match &settings.terrain_dir {
        Some(dir) => Arc::new(SrtmTiles::new(settings.terrain_source.clone(), dir.clone())),
        None => {
            warn!("no terrain directory configured, assuming flat terrain at sea level");
            Arc::new(FlatTerrain::new(0.0))
        }
    };

    let (viewer_tx, viewer_rx) = mailbox();
    let (mosaic_tx, mosaic_rx) = mailbox();

    let mut mosaic = MosaicState::new(
        files.len(),
        settings.mosaic_columns,
        MosaicLog,
        Some(viewer_tx.clone()),
    );
    let mosaic_thread = thread::spawn(move || mosaic.run(&mosaic_rx));

    let session = ViewerSession::new(
        files,
        settings,
        terrain,
        LogSurface,
        Some(mosaic_tx.clone()),
    );
    let mut session = match session {
        Ok(s) => s,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let viewer_thread = thread::spawn(move || session.run(&viewer_rx));

    // Not joined: a blocking read on stdin cannot be interrupted.
    thread::spawn(move || forward_stdin(viewer_tx, mosaic_tx));

    if viewer_thread.join().is_err() {
        error!("viewer thread panicked");
        return ExitCode::FAILURE;
    }
    if mosaic_thread.join().is_err() {
        error!("mosaic thread panicked");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
