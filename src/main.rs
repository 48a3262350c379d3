use anyhow::Result;
use clap::Parser;
use colored::*;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

mod args;

use args::Args;
use magic_booth::booth::{Booth, BoothContext};
use magic_booth::camera::{list_cameras, CameraSource};
use magic_booth::config::AppConfig;
use magic_booth::control::ControlPlane;
use magic_booth::delivery;
use magic_booth::delivery::print::{PrintWorker, SystemPrinter};
use magic_booth::delivery::spill::RetrySpill;
use magic_booth::delivery::supabase::SupabaseStore;
use magic_booth::delivery::upload::{self, UploadWorker};
use magic_booth::gate::CaptureGate;
use magic_booth::gesture::GestureDetector;
use magic_booth::http;
use magic_booth::inference::OnnxHandLandmarker;
use magic_booth::landmarks::{HandLandmarker, NoHandModel};
use magic_booth::output::WindowOutput;
use magic_booth::overlay::Overlay;
use magic_booth::session::SessionHandle;
use magic_booth::shutdown::Shutdown;
use magic_booth::storage::Storage;
use magic_booth::supervisor::Supervisor;
use magic_booth::ttf::FontRenderer;

fn init_logging(event_mode: bool) {
    let default = if event_mode { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_model(path: &Path, presence_threshold: f32) -> Box<dyn HandLandmarker> {
    if !path.exists() {
        tracing::warn!("Model {} not found, gestures disabled", path.display());
        return Box::new(NoHandModel);
    }
    match OnnxHandLandmarker::new(path, presence_threshold) {
        Ok(model) => Box::new(model),
        Err(e) => {
            tracing::error!("Failed to load model: {:#}", e);
            Box::new(NoHandModel)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.event_mode);

    if args.list {
        println!("Available Cameras:");
        println!("{:<5} | {:<30}", "Index", "Name");
        println!("{}", "-".repeat(40));
        for (index, name) in list_cameras()? {
            println!("{:<5} | {:<30}", index, name);
        }
        return Ok(());
    }

    // 0. Config + shutdown signal
    let config = AppConfig::load_from(&args.config)?;
    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            println!("{}", "Shutting down gracefully...".yellow());
            shutdown.trigger();
        })?;
    }
    if args.event_mode {
        println!("{}", "Event mode: settings locked".magenta().bold());
    }

    // 1. Delivery workers
    let storage = Storage::new(&config.storage.root, config.capture.jpeg_quality);
    let (dispatcher, queues) = delivery::queues();
    let mut workers = Vec::new();

    match args.supabase() {
        Some((url, key)) => {
            let store = SupabaseStore::new(url, key, &config.upload.bucket, &config.upload.table)?;
            let spill = RetrySpill::open(storage.retry_dir())?;
            let worker = UploadWorker::new(Box::new(store), spill, config.upload.max_records, config.upload.poll());
            workers.push(worker.spawn(queues.upload, shutdown.clone())?);
        }
        None => {
            println!("{}", "Warning: Missing Supabase credentials. Cloud sync disabled.".yellow());
            workers.push(upload::spawn_discard(queues.upload, config.upload.poll(), shutdown.clone())?);
        }
    }

    let printer = SystemPrinter::new(config.print.clone(), storage.temp_dir().join("spool"));
    workers.push(PrintWorker::new(Box::new(printer), config.print.poll()).spawn(queues.print, shutdown.clone())?);

    // 2. Control API on its own runtime
    let session = SessionHandle::default();
    let plane = ControlPlane::new(session.clone(), args.event_mode, dispatcher.print_sender(), storage.temp_dir())?;
    let addr = config.server.addr()?;
    let server = {
        let shutdown = shutdown.clone();
        thread::Builder::new().name("http".into()).spawn(move || {
            let result = tokio::runtime::Runtime::new().map_err(anyhow::Error::from).and_then(|rt| {
                rt.block_on(async move {
                    let listener = tokio::net::TcpListener::bind(addr).await?;
                    http::serve(listener, plane, shutdown).await
                })
            });
            if let Err(e) = result {
                tracing::error!("Control API stopped: {:#}", e);
            }
        })?
    };

    // 3. Capture loop, supervised, on the main thread (window + camera live here)
    let ctx = BoothContext {
        session,
        gate: Arc::new(CaptureGate::new()),
        dispatcher,
        storage,
        shutdown: shutdown.clone(),
        booth: config.booth.clone(),
        capture: config.capture.clone(),
        overlay: Overlay::new(
            FontRenderer::try_load(&config.ui.font_family),
            config.ui.font_size_pt,
            config.ui.text_scale,
        ),
    };
    let model_path = args.model.clone().unwrap_or_else(|| config.model.path.clone());

    println!("{}", "Starting photo booth...".green().bold());
    println!("Controls: [Thumbs up] Capture  [Q/ESC] Quit");

    let mut supervisor = Supervisor::new(config.supervisor.backoff(), shutdown.clone());
    supervisor.run(|| {
        let camera = CameraSource::open_preferred(args.cam_index)?;
        let window = WindowOutput::new(
            &config.booth.window_title,
            camera.width() as usize,
            camera.height() as usize,
        )?;
        let detector = GestureDetector::new(load_model(&model_path, config.model.presence_threshold));

        let mut booth = Booth::new(ctx.clone(), Box::new(camera), Box::new(window), detector);
        booth.run()
    });

    // 4. Wind down
    shutdown.trigger();
    for worker in workers {
        let _ = worker.join();
    }
    let _ = server.join();
    println!("{}", "Goodbye.".green());
    Ok(())
}
