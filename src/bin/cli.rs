//! AutoGLM client - AI-powered Android phone automation
//!
//! This is the CLI entry point.
//! Run with: cargo run --bin autoglm-client -- "打开设置"

use anyhow::Context;
use autoglm_client::adb::{AdbConnection, AdbDevice, AdbScreenCapture};
use autoglm_client::logger::{Logger, StepLog};
use autoglm_client::{AgentController, AppSettings, Collaborators, ModelClient};
use std::env;
use std::io::{self, BufRead, Write};
use std::thread;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    // Step lines are printed by the log task, so keep tracing quiet by default
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    let mut settings = AppSettings::load();
    settings.apply_env();

    if args.first().map(String::as_str) == Some("--save-settings") {
        settings.save().context("Failed to save settings")?;
        if let Some(path) = AppSettings::settings_path() {
            println!("Settings written to {}", path.display());
        }
        return Ok(());
    }

    println!("🤖 AutoGLM client - AI-powered Android Automation");
    println!("================================================");
    println!("Model: {} @ {}", settings.model_name, settings.base_url);
    println!("Language: {}", settings.lang);
    println!("Max steps: {}", settings.max_steps);
    if !settings.device_id.is_empty() {
        println!("Device: {}", settings.device_id);
    }
    println!("================================================\n");

    let conn = AdbConnection::new().with_device(&settings.device_id);
    if settings.device_id.contains(':') {
        match conn.connect(&settings.device_id).await {
            Ok(message) => println!("🔌 {}", message),
            Err(e) => eprintln!("⚠️ Could not connect to {}: {}", settings.device_id, e),
        }
    }

    let capture = Arc::new(AdbScreenCapture::new(conn.clone()));
    let device = Arc::new(AdbDevice::new(conn));
    capture.probe().await;
    device.probe().await;

    let model = Arc::new(
        ModelClient::new(settings.to_model_config()).context("Failed to build model client")?,
    );

    let (log, mut entries) = StepLog::channel();
    let printer = tokio::spawn(async move {
        let mut logger = Logger::new();
        if let Some(path) = logger.log_file_path() {
            println!("📄 Session log: {}\n", path.display());
        }
        while let Some(entry) = entries.recv().await {
            println!("{}", entry.format_display());
            logger.record(entry);
        }
    });

    let controller = AgentController::new(
        Collaborators {
            capture,
            accessibility: device.clone(),
            apps: device,
        },
        model,
        settings.to_agent_config(),
    )
    .with_log(log);

    if let Err(e) = controller.check_ready() {
        eprintln!("❌ {}", e);
        eprintln!("   Check that a device is attached and authorized (adb devices).");
    }

    if !args.is_empty() {
        run_task(&controller, &args.join(" ")).await?;
    } else {
        // Interactive mode
        println!("Interactive mode. Type your task and press Enter.");
        println!("Press Ctrl-C during a run to stop it, or at the prompt to exit.");
        println!("Type 'quit' or 'exit' to exit.\n");

        let mut lines = spawn_stdin_reader();
        loop {
            print!("📝 Task: ");
            io::stdout().flush()?;

            // The run's Ctrl-C handler stays installed, so watch for it here too
            let line = tokio::select! {
                line = lines.recv() => line,
                _ = tokio::signal::ctrl_c() => {
                    println!("\nGoodbye! 👋");
                    break;
                }
            };
            let Some(line) = line else {
                break;
            };

            match PromptInput::parse(&line) {
                PromptInput::Empty => continue,
                PromptInput::Quit => {
                    println!("Goodbye! 👋");
                    break;
                }
                PromptInput::Task(task) => run_task(&controller, task).await?,
            }
        }
    }

    // Dropping the controller closes the log channel so the printer drains
    drop(controller);
    printer.await?;
    Ok(())
}

/// Start one run and wait for it, stopping it on Ctrl-C.
async fn run_task(controller: &AgentController, task: &str) -> anyhow::Result<()> {
    let handle = match controller.start(task) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("❌ {}", e);
            return Ok(());
        }
    };

    let cancel = handle.cancel_handle();
    let stopper = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n⏹️ Stopping after the current step...");
            cancel.stop();
        }
    });

    let outcome = handle.wait().await.context("Agent task panicked")?;
    stopper.abort();

    if outcome.is_success() {
        println!("\n✅ Result: {}\n", outcome);
    } else {
        println!("\n⚠️ Result: {}\n", outcome);
    }
    Ok(())
}

/// One line typed at the interactive prompt.
#[derive(Debug, PartialEq, Eq)]
enum PromptInput<'a> {
    Empty,
    Quit,
    Task(&'a str),
}

impl<'a> PromptInput<'a> {
    fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => PromptInput::Empty,
            "quit" | "exit" => PromptInput::Quit,
            task => PromptInput::Task(task),
        }
    }
}

/// Read stdin on a plain thread so the prompt can also wait on Ctrl-C.
///
/// The channel closes at end of input or on a read error.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
