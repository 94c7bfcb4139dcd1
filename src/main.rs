use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use iced::widget::{button, column, container, image, row, slider, text, Column};
use iced::{Alignment, Element, Length, Task, Theme};
use rfd::FileDialog;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use frame_studio::raster::ingest::{ingest_file, UploadedImage};
use frame_studio::raster::pixmap_to_rgba;
use frame_studio::raster::template::FrameTemplate;
use frame_studio::session::{Product, SaveOutcome, StudioSession};
use frame_studio::state::interaction::{Action, CursorHint};
use frame_studio::state::library::CustomizationLibrary;
use frame_studio::upload::{AssetStore, HttpAssetStore, LocalAssetStore, Uploader};
use frame_studio::StudioConfig;

mod ui;

use ui::canvas::PointerEvent;

#[derive(Parser, Debug)]
#[command(author, version, about = "Place a photo in a frame and save the customization")]
struct Args {
    /// Product the customization is saved under
    #[arg(long, default_value = "demo-product")]
    product_id: String,

    /// URL-safe product name used in asset filenames
    #[arg(long, default_value = "custom-frame")]
    handle: String,

    /// Frame template URL or path; a placeholder frame is used when empty
    #[arg(long, default_value = "")]
    frame: String,

    /// Config file overriding the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Main application state
struct FrameStudio {
    product: Product,
    config: StudioConfig,
    /// None until the frame template has loaded
    session: Option<StudioSession>,
    uploader: Uploader,
    library: Arc<CustomizationLibrary>,
    /// Latest composite, ready for display
    surface: Option<image::Handle>,
    cursor: CursorHint,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    FrameLoaded(Result<Arc<FrameTemplate>, String>),
    Pointer(PointerEvent),
    ImageLoaded(Result<Arc<UploadedImage>, String>),
    ScaleChanged(f32),
    RotationChanged(f32),
    Reset,
    Save,
    SaveFinished(Result<SaveOutcome, String>),
}

impl FrameStudio {
    fn new(args: Args, config: StudioConfig, library: CustomizationLibrary) -> (Self, Task<Message>) {
        let store = asset_store(&config);
        let uploader = Uploader::new(store, &config.upload);
        let source = args.frame.clone();

        let studio = FrameStudio {
            product: Product {
                id: args.product_id,
                handle: args.handle,
            },
            config,
            session: None,
            uploader,
            library: Arc::new(library),
            surface: None,
            cursor: CursorHint::Pointer,
            status: "Loading frame...".to_string(),
        };

        let load = Task::perform(
            async move {
                FrameTemplate::load(&source)
                    .await
                    .map(Arc::new)
                    .map_err(|e| e.user_message())
            },
            Message::FrameLoaded,
        );
        (studio, load)
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::FrameLoaded(Err(message)) => {
                error!(%message, "no frame available");
                self.status = message;
                Task::none()
            }

            Message::FrameLoaded(Ok(frame)) => {
                self.status = if frame.fallback {
                    "Using fallback frame due to loading error.".to_string()
                } else {
                    "Click the canvas to choose a photo.".to_string()
                };
                let session = StudioSession::new(
                    self.product.clone(),
                    FrameTemplate::clone(&frame),
                    self.config.clone(),
                );
                self.session = Some(session);
                self.refresh_surface();
                Task::none()
            }

            Message::Pointer(event) => {
                let Some(session) = self.session.as_mut() else {
                    return Task::none();
                };
                let controller = session.controller_mut();
                let actions = match event {
                    PointerEvent::Down(p) => controller.on_pointer_down(to_canvas(p)),
                    PointerEvent::Moved(p) => controller.on_pointer_move(to_canvas(p)),
                    PointerEvent::Up => controller.on_pointer_up(),
                    PointerEvent::Left => controller.on_pointer_leave(),
                };
                self.apply(actions)
            }

            Message::ImageLoaded(Ok(photo)) => {
                let Some(session) = self.session.as_mut() else {
                    return Task::none();
                };
                let (width, height) = photo.dimensions();
                let actions = session.set_image(photo);
                self.status = format!("Photo loaded ({width}x{height}). Drag to position.");
                self.apply(actions)
            }

            Message::ImageLoaded(Err(message)) => {
                self.status = message;
                Task::none()
            }

            Message::ScaleChanged(scale) => self.with_controller(|c| c.set_scale(f64::from(scale))),

            Message::RotationChanged(degrees) => {
                self.with_controller(|c| c.set_rotation(f64::from(degrees)))
            }

            Message::Reset => self.with_controller(|c| c.reset()),

            Message::Save => {
                let Some(session) = self.session.as_mut() else {
                    return Task::none();
                };
                let job = match session.prepare_save() {
                    Ok(job) => job,
                    Err(e) => {
                        self.status = e.user_message();
                        return Task::none();
                    }
                };

                self.status = "Saving customization...".to_string();
                let uploader = self.uploader.clone();
                let library = Arc::clone(&self.library);
                Task::perform(
                    async move {
                        job.execute(&uploader, &library)
                            .await
                            .map_err(|e| e.user_message())
                    },
                    Message::SaveFinished,
                )
            }

            Message::SaveFinished(result) => {
                if let Some(session) = self.session.as_mut() {
                    session.finish_save();
                }
                self.status = match result {
                    Ok(outcome) => {
                        info!(complete = outcome.is_complete(), "save finished");
                        outcome.summary()
                    }
                    Err(message) => {
                        error!(%message, "save failed");
                        message
                    }
                };
                Task::none()
            }
        }
    }

    fn with_controller(
        &mut self,
        f: impl FnOnce(&mut frame_studio::state::interaction::InteractionController) -> Vec<Action>,
    ) -> Task<Message> {
        match self.session.as_mut() {
            Some(session) => {
                let actions = f(session.controller_mut());
                self.apply(actions)
            }
            None => Task::none(),
        }
    }

    /// Carry out controller actions
    fn apply(&mut self, actions: Vec<Action>) -> Task<Message> {
        let mut task = Task::none();
        for action in actions {
            match action {
                Action::Redraw => self.refresh_surface(),
                Action::SetCursor(cursor) => self.cursor = cursor,
                Action::RequestImage => task = self.pick_image(),
            }
        }
        task
    }

    fn pick_image(&mut self) -> Task<Message> {
        let picked = FileDialog::new()
            .set_title("Choose a photo")
            .add_filter("Images", &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"])
            .pick_file();

        let Some(path) = picked else {
            return Task::none();
        };

        self.status = format!("Loading {}...", path.display());
        let config = self.config.compression.clone();
        Task::perform(
            async move {
                ingest_file(&path, &config)
                    .await
                    .map_err(|e| e.user_message())
            },
            Message::ImageLoaded,
        )
    }

    fn refresh_surface(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        match session.render_view() {
            Ok(pixmap) => {
                let rgba = pixmap_to_rgba(&pixmap);
                let (width, height) = rgba.dimensions();
                self.surface = Some(image::Handle::from_rgba(width, height, rgba.into_raw()));
            }
            Err(e) => warn!(error = %e, "could not render the editor surface"),
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let Some(session) = self.session.as_ref() else {
            return container(text(&self.status).size(16))
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x(Length::Fill)
                .center_y(Length::Fill)
                .into();
        };

        let transform = session.controller().transform();
        let has_image = session.controller().has_image();

        let editor = ui::editor(self.surface.as_ref(), session.canvas(), self.cursor, has_image);

        let scale = slider(0.1..=3.0, transform.scale as f32, Message::ScaleChanged).step(0.01);
        let rotation = slider(
            -180.0..=180.0,
            (transform.rotation_degrees as f32).clamp(-180.0, 180.0),
            Message::RotationChanged,
        )
        .step(1.0);

        let save_label = if session.is_saving() { "Saving..." } else { "Save" };
        let save = button(save_label)
            .padding(10)
            .on_press_maybe(session.can_save().then_some(Message::Save));

        let controls: Column<Message> = column![
            text(format!("Scale {:.2}x", transform.scale)).size(14),
            scale,
            text(format!("Rotation {:.0}°", transform.rotation_degrees)).size(14),
            rotation,
            row![
                button("Reset")
                    .padding(10)
                    .on_press_maybe(has_image.then_some(Message::Reset)),
                save,
            ]
            .spacing(10),
        ]
        .spacing(10)
        .width(Length::Fixed(240.0));

        let content: Column<Message> = column![
            text(format!("Customize {}", self.product.handle)).size(28),
            row![editor, controls].spacing(30).align_y(Alignment::Start),
            text(&self.status).size(16),
        ]
        .spacing(20)
        .padding(40)
        .align_x(Alignment::Center);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn to_canvas(point: iced::Point) -> cgmath::Point2<f64> {
    cgmath::Point2::new(f64::from(point.x), f64::from(point.y))
}

/// Remote store when an endpoint is configured, local directory otherwise
fn asset_store(config: &StudioConfig) -> Arc<dyn AssetStore> {
    let upload = &config.upload;
    match &upload.endpoint {
        Some(endpoint) => {
            let delete = upload.delete_endpoint.clone().unwrap_or_else(|| endpoint.clone());
            info!(%endpoint, "uploading to remote asset store");
            Arc::new(
                HttpAssetStore::new(endpoint.clone(), delete, upload.original_limit)
                    .with_request_timeout(upload.timeout()),
            )
        }
        None => {
            let root = upload
                .local_dir
                .clone()
                .or_else(LocalAssetStore::default_root)
                .unwrap_or_else(|| PathBuf::from("frame-studio-assets"));
            info!(root = %root.display(), "uploading to local asset directory");
            Arc::new(LocalAssetStore::new(root, upload))
        }
    }
}

fn open_library(config: &StudioConfig) -> frame_studio::Result<CustomizationLibrary> {
    match config
        .storage
        .database_path
        .clone()
        .or_else(CustomizationLibrary::default_path)
    {
        Some(path) => CustomizationLibrary::open(&path),
        None => {
            warn!("no data directory, customizations will not outlive this run");
            CustomizationLibrary::open_in_memory()
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

fn main() -> iced::Result {
    init_tracing();
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => StudioConfig::load_from(path),
        None => StudioConfig::load(),
    };
    let config = loaded.unwrap_or_else(|e| {
        warn!(error = %e, "invalid config, using defaults");
        StudioConfig::default()
    });

    let library = match open_library(&config) {
        Ok(library) => library,
        Err(e) => {
            error!(error = %e, "cannot open the customization library");
            std::process::exit(1);
        }
    };

    iced::application("Frame Studio", FrameStudio::update, FrameStudio::view)
        .theme(FrameStudio::theme)
        .centered()
        .run_with(move || FrameStudio::new(args, config, library))
}
