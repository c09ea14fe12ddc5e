use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use domain::TaskId;
use infrastructure::{AuthStore, PocketBaseClient};
use shared::{init_cli_tracing, Config};
use task_board::views::{DashboardView, StatField, TaskListView};
use task_board::{App, AppContext, Screen};

#[derive(Debug, Parser)]
#[command(name = "taskboard", about = "Task dashboard backed by PocketBase")]
struct Cli {
    /// PocketBase のURL（未指定時は POCKETBASE_URL）
    #[arg(long, global = true)]
    pocketbase_url: Option<String>,

    /// セッションの保存先（未指定時は SESSION_FILE）
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// メールアドレスとパスワードでログイン
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// 自分のタスク一覧
    Tasks,
    /// タスクを追加
    Add { title: String },
    /// タスクを削除
    Delete { id: String },
    /// ステータス別件数と円グラフ
    Dashboard,
    /// 入力した件数だけタスクを一括作成
    Set {
        #[arg(long, default_value = "0")]
        todo: String,
        #[arg(long, default_value = "0")]
        in_progress: String,
        #[arg(long, default_value = "0")]
        done: String,
    },
    /// 変更を監視して表示し続ける
    Watch {
        #[arg(value_enum, default_value = "dashboard")]
        view: WatchTarget,
    },
    /// 円グラフのデータを JSON で出力
    Chart,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum WatchTarget {
    Tasks,
    Dashboard,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_cli_tracing().map_err(|e| anyhow::anyhow!("failed to initialise tracing: {e}"))?;

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = cli.pocketbase_url {
        config.pocketbase_url = url.trim_end_matches('/').to_string();
    }
    if let Some(path) = cli.session_file {
        config.session_file = path;
    }

    let backend = PocketBaseClient::from_config(&config);
    let auth = AuthStore::open(&config.session_file)?;
    let mut app = App::new(AppContext::new(
        Arc::new(backend),
        auth,
        config.tasks_collection.clone(),
    ));

    match cli.command {
        Command::Login { email, password } => {
            let screen = app.login(&email, &password).await?;
            println!("Logged in as {email}");
            show(screen).await;
        }
        Command::Logout => {
            app.logout().await?;
            println!("Logged out");
        }
        Command::Tasks => {
            let view = tasks_view(&mut app).await?;
            print_tasks(&view);
            view.unmount().await;
        }
        Command::Add { title } => {
            let mut view = tasks_view(&mut app).await?;
            let result = view.create_task(&title).await;
            view.unmount().await;
            let task = result?;
            println!("{}  {}", task.id, task.summary_line());
        }
        Command::Delete { id } => {
            let id = TaskId::from_string(id).context("invalid task id")?;
            let mut view = tasks_view(&mut app).await?;
            let result = view.delete_task(&id).await;
            view.unmount().await;
            result?;
            println!("Deleted {id}");
        }
        Command::Dashboard => {
            let view = dashboard_view(&mut app).await?;
            print_dashboard(&view);
            view.unmount().await;
        }
        Command::Set {
            todo,
            in_progress,
            done,
        } => {
            let mut view = dashboard_view(&mut app).await?;
            view.set_input(StatField::Todo, &todo);
            view.set_input(StatField::InProgress, &in_progress);
            view.set_input(StatField::Done, &done);
            let result = view.submit().await;
            if let Ok(update) = &result {
                println!("{}", update.message());
                print_dashboard(&view);
            }
            view.unmount().await;
            result?;
        }
        Command::Watch { view } => match view {
            WatchTarget::Tasks => watch_tasks(tasks_view(&mut app).await?).await?,
            WatchTarget::Dashboard => watch_dashboard(dashboard_view(&mut app).await?).await,
        },
        Command::Chart => {
            let view = dashboard_view(&mut app).await?;
            println!("{}", serde_json::to_string_pretty(&view.chart())?);
            view.unmount().await;
        }
    }

    Ok(())
}

async fn tasks_view(app: &mut App) -> anyhow::Result<TaskListView> {
    match app.navigate("/tasks").await? {
        Screen::Tasks(view) => Ok(view),
        other => redirected(other).await,
    }
}

async fn dashboard_view(app: &mut App) -> anyhow::Result<DashboardView> {
    match app.navigate("/dashboard").await? {
        Screen::Dashboard(view) => Ok(view),
        other => redirected(other).await,
    }
}

async fn redirected<T>(screen: Screen) -> anyhow::Result<T> {
    let path = screen.route().path();
    show(screen).await;
    bail!("Not logged in, redirected to {path}. Run `taskboard login` first.")
}

async fn show(screen: Screen) {
    match screen {
        Screen::Login(view) => {
            if view.show_dashboard_link {
                println!("Already logged in. Go to Dashboard: taskboard dashboard");
            }
        }
        Screen::Tasks(view) => {
            print_tasks(&view);
            view.unmount().await;
        }
        Screen::Dashboard(view) => {
            print_dashboard(&view);
            view.unmount().await;
        }
    }
}

fn print_tasks(view: &TaskListView) {
    if view.tasks().is_empty() {
        println!("No tasks");
    }
    for (task, line) in view.tasks().iter().zip(view.lines()) {
        println!("{}  {line}", task.id);
    }
}

fn print_dashboard(view: &DashboardView) {
    let stats = view.stats();
    println!(
        "To-Do: {}  In-Progress: {}  Done: {}",
        stats.todo, stats.in_progress, stats.done
    );
    for line in view.chart().render_text() {
        println!("  {line}");
    }
    if let Some(notice) = view.notice() {
        eprintln!("{notice}");
    }
}

async fn watch_tasks(mut view: TaskListView) -> anyhow::Result<()> {
    print_tasks(&view);
    if !view.is_live() {
        view.unmount().await;
        bail!("Realtime updates are unavailable");
    }

    loop {
        tokio::select! {
            change = view.next_change() => match change {
                Some(Ok(_)) => {
                    println!("--");
                    print_tasks(&view);
                }
                Some(Err(e)) => eprintln!("{e}"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    view.unmount().await;
    Ok(())
}

async fn watch_dashboard(mut view: DashboardView) {
    print_dashboard(&view);
    loop {
        tokio::select! {
            change = view.next_change() => match change {
                Some(_) => {
                    println!("--");
                    print_dashboard(&view);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    view.unmount().await;
}
