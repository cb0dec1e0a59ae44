use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use room_scribe::audio::{AudioConstraints, MediaDevices, MediaStream};
use room_scribe::{
    create_router, AppState, BackendClient, Config, CredentialSource, JoinOutcome, MessageKind,
    NatsTransportFactory, SessionManager, SessionStore, WavCapture,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "room-scribe")]
#[command(about = "Join a real-time audio room and follow its live transcript")]
struct Args {
    /// Config file (extension optional, may be absent)
    #[arg(short, long, default_value = "config/room-scribe")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the local control API
    Serve {
        /// WAV file to publish as the microphone (overrides audio.file)
        #[arg(short, long)]
        audio: Option<PathBuf>,
    },

    /// Join a room and print the transcript until Ctrl-C
    Join {
        /// Room to join
        #[arg(short, long)]
        room: String,

        /// Participant name
        #[arg(short, long)]
        name: String,

        /// Use this token instead of asking the backend
        #[arg(short, long)]
        token: Option<String>,

        /// WAV file to publish as the microphone (overrides audio.file)
        #[arg(short, long)]
        audio: Option<PathBuf>,
    },
}

/// Used when no microphone source is configured
struct NoMicrophone;

#[async_trait::async_trait]
impl MediaDevices for NoMicrophone {
    async fn get_user_media(&self, _constraints: AudioConstraints) -> Result<MediaStream> {
        Ok(MediaStream::default())
    }

    fn name(&self) -> &str {
        "none"
    }
}

fn build_manager(cfg: &Config, audio: Option<PathBuf>) -> Arc<SessionManager> {
    let capture = audio
        .map(|path| WavCapture::new(path, cfg.audio.buffer_duration_ms))
        .or_else(|| cfg.audio.capture());
    let media: Arc<dyn MediaDevices> = match capture {
        Some(capture) => {
            info!("Microphone: {}", capture.path().display());
            Arc::new(capture)
        }
        None => {
            warn!("No audio file configured, recording will report no audio device");
            Arc::new(NoMicrophone)
        }
    };

    Arc::new(SessionManager::new(
        Arc::new(SessionStore::new()),
        Arc::new(BackendClient::new(cfg.backend.url.clone())),
        Arc::new(NatsTransportFactory),
        media,
        cfg.session_config(),
    ))
}

async fn serve(cfg: Config, audio: Option<PathBuf>) -> Result<()> {
    let manager = build_manager(&cfg, audio);
    let app = create_router(AppState::new(Arc::clone(&manager)));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("{} control API listening on {}", cfg.service.name, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("HTTP server failed")?;

    manager.disconnect().await;
    Ok(())
}

async fn join(
    cfg: Config,
    room: String,
    name: String,
    token: Option<String>,
    audio: Option<PathBuf>,
) -> Result<()> {
    let record = audio.is_some() || cfg.audio.file.is_some();
    let manager = build_manager(&cfg, audio);
    let mut transcript = manager.store().subscribe_transcript();

    let source = token
        .map(CredentialSource::Provided)
        .unwrap_or(CredentialSource::Backend);

    match manager.join_room(&room, &name, source).await? {
        JoinOutcome::Connected(session) => info!(
            "Joined {} as {} ({} participants)",
            session.room,
            session.local.identity,
            session.participants.len()
        ),
        other => {
            warn!("Join did not connect: {:?}", other);
            return Ok(());
        }
    }

    if record {
        manager.start_recording().await?;
    }

    let mut flags = manager.store().watch();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            msg = transcript.recv() => match msg {
                Ok(msg) => match msg.kind {
                    MessageKind::Transcription => println!("{}", msg.text),
                    _ => println!("[{}] {}", msg.timestamp.format("%H:%M:%S"), msg.text),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Skipped {} messages", n),
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = flags.changed() => {
                if changed.is_err() || !flags.borrow().connected {
                    warn!("Session ended: {:?}", flags.borrow().error);
                    break;
                }
            }
        }
    }

    manager.stop_recording().await;
    manager.disconnect().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Room Scribe v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", cfg.backend.url);
    info!("Transport: {}", cfg.transport.url);

    match args.command {
        Command::Serve { audio } => serve(cfg, audio).await,
        Command::Join {
            room,
            name,
            token,
            audio,
        } => join(cfg, room, name, token, audio).await,
    }
}
