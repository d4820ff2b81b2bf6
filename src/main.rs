// main.rs - Maximum Bot entry point
// Loads botconfig.txt, builds the module handler and runs the Discord client
// until Ctrl+C or a `quit` typed on the console.

mod commands;
mod config;
mod error;
mod grade;
mod handler;
mod selection;

use serenity::{client::Client, prelude::GatewayIntents};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;

use crate::config::load_bot_config;
use crate::handler::Handler;

// Console commands for stopping the bot without a signal
async fn handle_command_line(shutdown_tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match line.trim().to_lowercase().as_str() {
                "quit" | "q" | "exit" => {
                    if shutdown_tx.send("quit".to_string()).await.is_err() {
                        log::error!("Failed to send shutdown signal");
                    }
                    break;
                }
                "help" | "h" => {
                    println!("Available commands:");
                    println!("  quit, q, exit  - Stop the bot gracefully");
                    println!("  help, h        - Show this help message");
                }
                "" => {}
                other => println!("Unknown command: '{}'. Type 'help' for available commands.", other),
            },
            // stdin closed (e.g. running as a service)
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read console input: {}", e);
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = match load_bot_config() {
        Ok(config) => config,
        Err(error) => {
            log::error!("Failed to load botconfig.txt: {}", error);
            eprintln!("Create a botconfig.txt file in the project root with: DISCORD_TOKEN=your_token_here and NOTIFY_CHANNEL_ID=channel_id");
            return;
        }
    };

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(Handler::new(&config))
        .await
    {
        Ok(client) => client,
        Err(e) => {
            log::error!("Error creating Discord client: {:?}", e);
            eprintln!("Check your token in botconfig.txt file");
            return;
        }
    };

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<String>(1);
    let cmd_task = tokio::spawn(handle_command_line(shutdown_tx));
    let shard_manager = client.shard_manager.clone();

    log::info!("Bot is running. Type 'quit' or press Ctrl+C to stop.");
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Received SIGINT, stopping bot gracefully...");
        }
        shutdown_signal = shutdown_rx.recv() => {
            if let Some(signal) = shutdown_signal {
                log::info!("Received '{}' command, stopping bot gracefully...", signal);
            }
        }
        result = client.start() => {
            if let Err(why) = result {
                log::error!("Client error: {:?}", why);
            }
        }
    }

    shard_manager.lock().await.shutdown_all().await;
    cmd_task.abort();
    log::info!("Bot stopped");
}
