//! A simple program demonstrates how to use `counsel` as a library.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use counsel::core::profile::{ProfileSchema, profile_completion};
use counsel::core::{Controller, Rejected, Snapshot, Status, UserContext};
use counsel::http::HttpServiceConfigBuilder;
use counsel::{ChatWidget, ChatWidgetBuilder, WidgetKind};
use counsel_model::{FitCategory, Role, Topic};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::time::{sleep, timeout};

const BAR_CHAR: &str = "▎";

const USAGE: &str = "usage: counsel <topic-id> [display name] \
                     [--category SAFETY|TARGET|REACH|SUPER_REACH] \
                     [--widget university|fit|counselor]";

const HELP: &str = "\
Type a question, or the number of an offered question.
  /new                  start a new conversation
  /history              list saved conversations
  /load <id>            continue a saved conversation
  /rename <id> <title>  rename a saved conversation
  /delete <id>          delete a saved conversation
  /retry                ask the last failed question again
  /profile <file>       check how complete a profile JSON file is
  /quit                 leave";

struct Args {
    topic: Topic,
    kind: WidgetKind,
}

fn parse_args() -> Result<Args, String> {
    let mut args = env::args().skip(1);
    let mut positional = vec![];
    let mut category = None;
    let mut kind = WidgetKind::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--category" => {
                let value = args.next().ok_or(USAGE)?;
                let value = value
                    .parse::<FitCategory>()
                    .map_err(|err| format!("{err}"))?;
                category = Some(value);
            }
            "--widget" => {
                let value = args.next().ok_or(USAGE)?;
                kind = value
                    .parse::<WidgetKind>()
                    .map_err(|err| format!("{err}"))?;
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let id = positional.next().ok_or(USAGE)?;
    let name = positional.collect::<Vec<_>>().join(" ");
    let name = if name.is_empty() { id.clone() } else { name };
    let mut topic = Topic::new(id, name);
    if let Some(category) = category {
        topic = topic.with_category(category);
    }
    Ok(Args { topic, kind })
}

enum Flow {
    Continue,
    Quit,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            return;
        }
    };
    let Ok(user_id) = env::var("COUNSEL_USER_ID") else {
        eprintln!("COUNSEL_USER_ID environment variable is not set");
        return;
    };

    let mut config = HttpServiceConfigBuilder::new();
    if let Ok(base_url) = env::var("COUNSEL_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Ok(api_token) = env::var("COUNSEL_API_TOKEN") {
        config = config.with_api_token(api_token);
    }
    let config = config.build();
    debug!("using {config:?}");

    let widget =
        ChatWidgetBuilder::with_http(args.kind, config, UserContext::new(user_id))
            .build();
    let greeting = match widget.open(args.topic).await {
        Ok(greeting) => greeting,
        Err(err) => {
            eprintln!("could not open the topic: {err}");
            return;
        }
    };

    println!("{}", widget.kind().title().bold());
    println!("{}🤖 {}", BAR_CHAR.bright_cyan(), greeting.bright_white());
    print_suggestions(&widget.controller().snapshot());

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match run_command(&widget, line).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(Rejected::Stopped) => {
                error!("the controller has stopped");
                break;
            }
            Err(rejected) => {
                println!("{}", format!("Not now: {rejected}").bright_black());
            }
        }
    }

    widget.controller().close();
}

async fn run_command(widget: &ChatWidget, line: &str) -> Result<Flow, Rejected> {
    let controller = widget.controller();

    let Some(command) = line.strip_prefix('/') else {
        // A bare number picks one of the offered questions.
        let offered = line
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| controller.snapshot().suggestions.get(i).cloned());
        match offered {
            Some(question) => {
                println!("{} {}", BAR_CHAR.bright_white(), question);
                controller.select_suggestion(question).await?;
            }
            None => controller.send(line).await?,
        }
        if let Some(snapshot) = wait_with_spinner(controller, "🤔 Thinking...").await {
            print_answer(&snapshot);
        }
        return Ok(Flow::Continue);
    };

    let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
    let arg = arg.trim();
    match name {
        "quit" | "exit" => return Ok(Flow::Quit),
        "help" => println!("{HELP}"),
        "new" => {
            controller.start_new().await?;
            println!("Started a new conversation.");
            print_suggestions(&controller.snapshot());
        }
        "history" => {
            let mut rx = controller.subscribe();
            rx.mark_unchanged();
            controller.refresh_history().await?;
            // The list is only republished if it changed.
            timeout(Duration::from_secs(1), rx.changed()).await.ok();
            print_history(&controller.snapshot());
        }
        "load" => {
            controller.load_conversation(arg).await?;
            if let Some(snapshot) = wait_with_spinner(controller, "Loading...").await {
                print_transcript(&snapshot);
            }
        }
        "rename" => {
            let (id, title) = arg.split_once(' ').unwrap_or((arg, ""));
            controller.rename(id, title).await?;
            wait_with_spinner(controller, "Saving...").await;
            println!("Renamed.");
        }
        "delete" => {
            controller.remove(arg).await?;
            wait_with_spinner(controller, "Deleting...").await;
            println!("Deleted.");
        }
        "retry" => {
            controller.retry().await?;
            if let Some(snapshot) = wait_with_spinner(controller, "🤔 Thinking...").await {
                print_answer(&snapshot);
            }
        }
        "profile" => print_profile(arg).await,
        _ => println!("Unknown command. Type /help for help."),
    }
    Ok(Flow::Continue)
}

/// Shows a spinner until the pending operation finishes.
async fn wait_with_spinner(
    controller: &Controller,
    message: &'static str,
) -> Option<Snapshot> {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .map(|style| style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style);
    progress_bar.set_message(message);

    let mut rx = controller.subscribe();
    let snapshot = loop {
        let snapshot = rx.borrow_and_update().clone();
        if !snapshot.is_pending() {
            break Some(snapshot);
        }
        progress_bar.inc(1);

        select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break None;
                }
            }
            _ = sleep(Duration::from_millis(100)) => {}
        }
    };

    // Finish the progress bar before printing anything else.
    progress_bar.finish_and_clear();
    snapshot
}

fn print_answer(snapshot: &Snapshot) {
    if let Some(msg) = snapshot.conversation.messages.last() {
        if msg.role() == Role::Assistant {
            match snapshot.status {
                Status::Failed(_) => {
                    println!("{}⚠️  {}", BAR_CHAR.bright_yellow(), msg.content());
                    println!("{}", "Type /retry to ask again.".bright_black());
                }
                _ => {
                    println!(
                        "{}🤖 {}",
                        BAR_CHAR.bright_cyan(),
                        msg.content().bright_white()
                    );
                }
            }
        }
    }
    print_suggestions(snapshot);
}

fn print_transcript(snapshot: &Snapshot) {
    if let Some(title) = &snapshot.conversation.title {
        println!("{}", title.bold());
    }
    for msg in &snapshot.conversation.messages {
        match msg.role() {
            Role::User => println!("{} {}", BAR_CHAR.bright_white(), msg.content()),
            Role::Assistant => println!(
                "{}🤖 {}",
                BAR_CHAR.bright_cyan(),
                msg.content().bright_white()
            ),
        }
    }
    print_suggestions(snapshot);
}

fn print_suggestions(snapshot: &Snapshot) {
    for (i, question) in snapshot.suggestions.iter().enumerate() {
        println!("{}", format!("  [{}] {question}", i + 1).bright_black());
    }
}

fn print_history(snapshot: &Snapshot) {
    if snapshot.summaries.is_empty() {
        println!("No saved conversations.");
        return;
    }
    for summary in &snapshot.summaries {
        let active = snapshot.conversation.conversation_id.as_deref()
            == Some(summary.conversation_id.as_str());
        let marker = if active { "*" } else { " " };
        println!(
            "{marker} {}  {}  {}",
            summary.conversation_id.bright_black(),
            summary.title,
            format!(
                "({} messages, {})",
                summary.message_count,
                summary.updated_at.format("%Y-%m-%d %H:%M")
            )
            .bright_black()
        );
    }
}

async fn print_profile(path: &str) {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) => {
            println!("Could not read {path}: {err}");
            return;
        }
    };
    let profile = match serde_json::from_str(&contents) {
        Ok(profile) => profile,
        Err(err) => {
            println!("{path} is not valid JSON: {err}");
            return;
        }
    };

    let completion = profile_completion(&profile, &ProfileSchema::admissions());
    println!(
        "Profile {}% complete ({}/{}).",
        completion.percentage.bold(),
        completion.filled,
        completion.total
    );
    if !completion.missing_labels.is_empty() {
        println!("Missing: {}", completion.missing_labels.join(", "));
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
