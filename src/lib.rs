pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod progress;
pub mod session;
pub mod video;
pub mod view;

use anyhow::{bail, Context};
use api::{ApiClient, RetryPolicy};
use auth::{Access, Route, Tokens};
use catalog::CatalogLoader;
use clap::{Parser, Subcommand};
use config::AppConfig;
use notify::{drain, NoticeReceiver, Notifier};
use progress::{course_progress, LocalTier, ProgressStore};
use session::SessionState;
use std::path::PathBuf;
use std::sync::Arc;
use video::SimulatedMedia;
use view::LectureView;

#[derive(Parser)]
#[command(name = "lecture-player", author, version, about, long_about = None)]
pub struct Cli {
    /// API base URL, e.g. http://localhost:8080/api/v1/
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LECTURE_PLAYER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "LECTURE_PLAYER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show who is signed in
    Whoami,
    /// Exchange the refresh token for a new access token now
    Refresh,
    /// List published courses
    Courses {
        /// Courses you teach instead of the published catalog
        #[arg(long)]
        mine: bool,
    },
    /// Show one course's details
    Course { course_id: String },
    /// Show where a course would resume and how much of it is watched
    Progress { course_id: String },
    /// Watch a course's lectures in order
    Play {
        course_id: String,
        /// Jump to this lecture (0-based) after opening
        #[arg(long)]
        select: Option<usize>,
        /// Playback speed multiplier
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },
}

struct App {
    config_dir: PathBuf,
    data_dir: PathBuf,
    stored: AppConfig,
    settings: AppConfig,
    client: ApiClient,
}

pub async fn run() -> anyhow::Result<()> {
    // Load environment variables from .env file
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config_dir = config::config_dir()?;
    let data_dir = config::data_dir()?;
    let stored = config::load_or_create(&config_dir)?;
    let settings = stored
        .clone()
        .with_env_overrides()
        .with_overrides(cli.api_url.clone(), None);

    let _guard = logging::init(&logging::LogOptions {
        filter: settings.log_filter.clone(),
        file_dir: settings.log_to_file.then(|| config::log_dir(&data_dir)),
    })?;

    let session = config::decode_session(&stored);
    let client = ApiClient::new(&settings.api_base_url, settings.request_timeout(), session)?;

    let mut ctx = App {
        config_dir,
        data_dir,
        stored,
        settings,
        client,
    };

    let result = match cli.command {
        Command::Login { email, password } => login(&mut ctx, &email, &password).await,
        Command::Register {
            name,
            email,
            password,
        } => register(&mut ctx, &name, &email, &password).await,
        Command::Logout => logout(&mut ctx).await,
        Command::Whoami => whoami(&ctx).await,
        Command::Refresh => refresh(&ctx).await,
        Command::Courses { mine } => courses(&ctx, mine).await,
        Command::Course { course_id } => course(&ctx, &course_id).await,
        Command::Progress { course_id } => show_progress(&ctx, &course_id).await,
        Command::Play {
            course_id,
            select,
            speed,
        } => play(&ctx, &course_id, select, speed).await,
    };

    sync_stored_session(&mut ctx).await?;
    result
}

async fn login(ctx: &mut App, email: &str, password: &str) -> anyhow::Result<()> {
    let response = ctx.client.login(email, password).await.context("Login failed")?;
    println!("Signed in as {} ({})", response.user.name, response.user.role);
    ctx.client = ctx.client.with_session(response.into_session());
    Ok(())
}

async fn register(ctx: &mut App, name: &str, email: &str, password: &str) -> anyhow::Result<()> {
    let response = ctx
        .client
        .register(name, email, password)
        .await
        .context("Registration failed")?;
    println!("Account created for {} ({})", response.user.email, response.user.role);
    ctx.client = ctx.client.with_session(response.into_session());
    Ok(())
}

async fn logout(ctx: &mut App) -> anyhow::Result<()> {
    if !ctx.client.session().is_authenticated() {
        println!("Not signed in");
        return Ok(());
    }

    // Local sign-out happens even if the backend call fails.
    let _ = ctx.client.logout().await;
    ctx.client = ctx.client.with_session(auth::SessionContext::anonymous());
    println!("Signed out");
    Ok(())
}

async fn whoami(ctx: &App) -> anyhow::Result<()> {
    let session = ctx.client.session();
    let Some(user) = session.user() else {
        println!("Not signed in");
        return Ok(());
    };

    println!("{} <{}> ({})", user.name, user.email, user.role);
    if let Some(tokens) = session.tokens().get().await {
        let expired = auth::is_expired(&tokens.access_token, chrono::Utc::now());
        println!(
            "Access token {}{}",
            config::mask_token(&tokens.access_token),
            if expired { " (expired)" } else { "" }
        );
    }
    Ok(())
}

async fn refresh(ctx: &App) -> anyhow::Result<()> {
    require_route(ctx, &Route::Profile)?;
    ctx.client.refresh().await.context("Token refresh failed")?;
    println!("Session refreshed");
    Ok(())
}

async fn courses(ctx: &App, mine: bool) -> anyhow::Result<()> {
    let courses = if mine {
        require_route(ctx, &Route::TeacherDashboard)?;
        ctx.client.my_courses().await?
    } else {
        ctx.client.published_courses().await?
    };
    if courses.is_empty() {
        println!("No courses");
        return Ok(());
    }

    for course in courses {
        let level = course.course_level.as_deref().unwrap_or("-");
        let price = course
            .course_price
            .map(|price| format!("{:.2}", price))
            .unwrap_or_else(|| "free".to_string());
        println!("{}  {}  [{}]  {}", course.id, course.course_title, level, price);
    }
    Ok(())
}

async fn course(ctx: &App, course_id: &str) -> anyhow::Result<()> {
    let course = ctx
        .client
        .course(course_id)
        .await
        .with_context(|| format!("Could not load course {}", course_id))?;

    println!("{}", course.course_title);
    if let Some(sub_title) = &course.sub_title {
        println!("{}", sub_title);
    }
    println!(
        "Level: {}  Category: {}  Students: {}",
        course.course_level.as_deref().unwrap_or("-"),
        course.category.as_deref().unwrap_or("-"),
        course.enrolled_students.len()
    );
    if let Some(description) = &course.description {
        println!();
        println!("{}", description);
    }
    Ok(())
}

async fn show_progress(ctx: &App, course_id: &str) -> anyhow::Result<()> {
    let viewer = require_route(ctx, &Route::StudentDashboard)?;
    let loader = catalog_loader(ctx);
    let store = progress_store(ctx, Notifier::disabled()).await?;

    let lectures = loader.load(course_id).await?;
    let restored = store.restore(&viewer, course_id).await;

    match &restored.resume {
        Some(resume) => println!(
            "Resume at lecture {} ({:.0}s), from {:?} progress",
            resume.lecture_id, resume.elapsed_secs, restored.source
        ),
        None => println!("No progress yet"),
    }
    println!(
        "Course progress: {:.1}%",
        course_progress(&lectures, &restored.records)
    );

    for (index, lecture) in lectures.iter().enumerate() {
        let watched = restored.elapsed_for(&lecture.id).unwrap_or(0.0);
        println!(
            "{:>3}. {}  {:.0}/{}s",
            index, lecture.title, watched, lecture.duration_secs
        );
    }
    Ok(())
}

async fn play(ctx: &App, course_id: &str, select: Option<usize>, speed: f64) -> anyhow::Result<()> {
    let route = Route::CourseLectures {
        course_id: course_id.to_string(),
    };
    let viewer = require_route(ctx, &route)?;

    let (notifier, mut notices) = Notifier::channel();
    let store = progress_store(ctx, notifier.clone()).await?;
    let mut view = LectureView::new(
        &viewer,
        course_id,
        catalog_loader(ctx),
        store.clone(),
        notifier,
    );

    let (media, mut samples) =
        SimulatedMedia::new(ctx.settings.tick_interval(), speed).spawn();

    media.send_all(view.open().await);
    print_notices(&mut notices);

    match view.session().state() {
        SessionState::Failed { error } => bail!("Could not open course {}: {}", course_id, error),
        SessionState::Empty => {
            println!("This course has no lectures yet");
            return Ok(());
        }
        _ => {}
    }

    if let Some(index) = select {
        media.send_all(view.select(index));
        print_notices(&mut notices);
    }
    if matches!(view.session().state(), SessionState::Completed) {
        println!("Course already completed, pick a lecture with --select to rewatch it");
        return Ok(());
    }
    media.send_all(view.play());
    print_position(&view);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut current = view.session().current_index();

    loop {
        tokio::select! {
            sample = samples.recv() => {
                let Some(sample) = sample else { break };
                media.send_all(view.media_sample(sample));
                print_notices(&mut notices);

                if view.session().current_index() != current {
                    current = view.session().current_index();
                    print_position(&view);
                }
                if matches!(view.session().state(), SessionState::Completed) {
                    break;
                }
                if let Some(error) = view.session().playback_error() {
                    println!("{}", error);
                    break;
                }
            }
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, saving progress");
                break;
            }
        }
    }

    if let Err(e) = view.unload().await {
        tracing::warn!("Final progress flush failed: {}", e);
    }
    print_notices(&mut notices);
    store.local().sync().await?;

    let (succeeded, failed, skipped) = store.flush_counts(course_id);
    tracing::info!(
        "Progress flushes for course {}: {} ok, {} failed, {} skipped ({:.0}% success)",
        course_id,
        succeeded,
        failed,
        skipped,
        store.flush_success_rate(course_id) * 100.0
    );
    Ok(())
}

/// Signed-in viewer id if `route` lets the current role in.
fn require_route(ctx: &App, route: &Route) -> anyhow::Result<String> {
    let session = ctx.client.session();
    match route.authorize(session.role()) {
        Access::Allow => {}
        Access::Redirect(target) if target == auth::LOGIN_PATH => {
            bail!("Not signed in, run `lecture-player login` first")
        }
        Access::Redirect(_) => bail!(
            "{} is not available to the {} role",
            route.path(),
            session.role().map(|role| role.as_str()).unwrap_or("anonymous")
        ),
    }

    session
        .user_id()
        .map(str::to_string)
        .context("Signed-in session has no user id")
}

fn catalog_loader(ctx: &App) -> CatalogLoader {
    CatalogLoader::new(
        Arc::new(ctx.client.clone()),
        RetryPolicy::new(ctx.settings.catalog_max_retries),
    )
}

async fn progress_store(ctx: &App, notifier: Notifier) -> anyhow::Result<ProgressStore> {
    let local = LocalTier::open(config::progress_path(&ctx.data_dir)).await?;
    let store = ProgressStore::new(
        local,
        Arc::new(ctx.client.clone()),
        ctx.settings.flush_failure_threshold,
        notifier,
    );
    Ok(store)
}

fn print_position(view: &LectureView) {
    let session = view.session();
    if let (Some(index), Some(lecture)) = (session.current_index(), session.current_lecture()) {
        println!(
            "Lecture {}/{}: {} (from {:.0}s{})",
            index + 1,
            session.lectures().len(),
            lecture.title,
            session.elapsed(),
            if session.seeking_restricted() { ", seeking locked" } else { "" }
        );
    }
}

fn print_notices(notices: &mut NoticeReceiver) {
    for notice in drain(notices) {
        println!("[{:?}] {}", notice.level, notice.message);
    }
}

/// Write the session back if login, logout or a token refresh changed it.
async fn sync_stored_session(ctx: &mut App) -> anyhow::Result<()> {
    let session = ctx.client.session();
    let tokens: Option<Tokens> = session.tokens().get().await;

    let before = serde_json::to_value(&ctx.stored.session)?;
    match (session.user(), tokens) {
        (Some(user), Some(tokens)) => config::remember_session(&mut ctx.stored, user, &tokens),
        _ => config::forget_session(&mut ctx.stored),
    }

    if serde_json::to_value(&ctx.stored.session)? != before {
        config::save(&ctx.config_dir, &ctx.stored)?;
        tracing::debug!("Stored session updated");
    }
    Ok(())
}

