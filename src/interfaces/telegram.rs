use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{error, info, warn};

use crate::core::executor::{CompletionCallback, Executor};
use crate::core::lifecycle::LifecycleComponent;
use crate::core::notify::{Notifier, execution_report};
use crate::core::storage::Storage;

const PROJECTS_PAGE_SIZE: i64 = 10;

/// Best-effort fan-out of a message to every whitelisted chat. A missing bot
/// token turns every notification into a no-op.
pub struct TelegramNotifier {
    bot: Option<Bot>,
    chat_ids: Vec<i64>,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_ids: Vec<i64>) -> Self {
        let bot = if token.is_empty() {
            warn!("Telegram bot token not set, notifications disabled");
            None
        } else {
            Some(Bot::new(token))
        };
        if chat_ids.is_empty() {
            warn!("Telegram whitelist is empty");
        }
        Self { bot, chat_ids }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) {
        let Some(bot) = &self.bot else { return };
        for chat_id in &self.chat_ids {
            if let Err(e) = bot.send_message(ChatId(*chat_id), message).await {
                warn!("Failed to deliver notification to {}: {}", chat_id, e);
            }
        }
    }
}

/// Long-polling Telegram bot: project listing, on-demand runs and status
/// queries for whitelisted chats.
pub struct TelegramInterface {
    token: String,
    allowed_chat_ids: Vec<i64>,
    storage: Arc<Storage>,
    executor: Arc<Executor>,
    notifier: Arc<dyn Notifier>,
}

impl TelegramInterface {
    pub fn new(
        token: String,
        allowed_chat_ids: Vec<i64>,
        storage: Arc<Storage>,
        executor: Arc<Executor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            token,
            allowed_chat_ids,
            storage,
            executor,
            notifier,
        }
    }

    async fn start_bot(&self) -> Result<()> {
        let bot = Bot::new(&self.token);

        let commands = vec![
            teloxide::types::BotCommand::new("help", "Show all available commands"),
            teloxide::types::BotCommand::new("pp", "List projects (paged)"),
            teloxide::types::BotCommand::new("run", "Run a command against a project"),
            teloxide::types::BotCommand::new("status", "Show a project's last execution"),
        ];
        if let Err(e) = bot.set_my_commands(commands).await {
            error!("Failed to set telegram bot commands: {}", e);
        }

        let allowed = self.allowed_chat_ids.clone();
        let storage = self.storage.clone();
        let executor = self.executor.clone();
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            teloxide::repl(bot, move |bot: Bot, msg: Message| {
                let allowed = allowed.clone();
                let storage = storage.clone();
                let executor = executor.clone();
                let notifier = notifier.clone();
                async move {
                    let chat_id = msg.chat.id;
                    let Some(text) = msg.text() else {
                        return Ok(());
                    };
                    info!("Received telegram message from {}", chat_id);

                    // An empty whitelist denies everyone.
                    if !allowed.contains(&chat_id.0) {
                        warn!("Chat {} is not whitelisted", chat_id);
                        let _ = bot
                            .send_message(chat_id, "You are not authorized to use this bot.")
                            .await;
                        return Ok(());
                    }

                    let trimmed = text.trim();
                    if trimmed == "/help" {
                        let help_text = "Available commands:\n\
                            /pp [page] - List projects\n\
                            /run [project_name] [command] - Run command\n\
                            /status [project_name] - Check status";
                        let _ = bot.send_message(chat_id, help_text).await;
                    } else if trimmed == "/pp" || trimmed.starts_with("/pp ") {
                        let args = trimmed.strip_prefix("/pp").unwrap_or_default().trim();
                        handle_list_projects(&bot, chat_id, &storage, args).await;
                    } else if let Some(args) = trimmed.strip_prefix("/run ") {
                        handle_run(&bot, chat_id, &storage, &executor, notifier, args).await;
                    } else if trimmed == "/run" {
                        let _ = bot
                            .send_message(chat_id, "Usage: /run [project_name] [command]")
                            .await;
                    } else if trimmed == "/status" || trimmed.starts_with("/status ") {
                        let args = trimmed.strip_prefix("/status").unwrap_or_default().trim();
                        handle_status(&bot, chat_id, &storage, args).await;
                    } else if trimmed.starts_with('/') {
                        warn!("Unknown telegram command: {}", trimmed);
                        let _ = bot.send_message(chat_id, "Unknown command").await;
                    }
                    Ok(())
                }
            })
            .await;
        });
        Ok(())
    }
}

async fn handle_list_projects(bot: &Bot, chat_id: ChatId, storage: &Storage, args: &str) {
    let page = args
        .split_whitespace()
        .next()
        .and_then(|p| p.parse::<i64>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1);
    let offset = (page - 1) * PROJECTS_PAGE_SIZE;

    let (projects, total) = match storage.projects_page(offset, PROJECTS_PAGE_SIZE).await {
        Ok(result) => result,
        Err(e) => {
            error!("Failed to list projects: {}", e);
            let _ = bot.send_message(chat_id, "Failed to list projects").await;
            return;
        }
    };
    if projects.is_empty() {
        let _ = bot
            .send_message(chat_id, format!("No projects found on page {}.", page))
            .await;
        return;
    }

    let total_pages = (total + PROJECTS_PAGE_SIZE - 1) / PROJECTS_PAGE_SIZE;
    let mut response = format!("Projects (Page {}/{}):\n", page, total_pages);
    for project in projects {
        response.push_str(&format!(
            "- {} (ID: {})\n  {}\n",
            project.name, project.id, project.description
        ));
    }
    let _ = bot.send_message(chat_id, response).await;
}

async fn handle_run(
    bot: &Bot,
    chat_id: ChatId,
    storage: &Storage,
    executor: &Arc<Executor>,
    notifier: Arc<dyn Notifier>,
    args: &str,
) {
    let Some((project_name, command)) = args.trim().split_once(' ') else {
        let _ = bot
            .send_message(chat_id, "Usage: /run [project_name] [command]")
            .await;
        return;
    };

    let project = match storage.project_by_name(project_name).await {
        Ok(Some(project)) => project,
        _ => {
            let _ = bot.send_message(chat_id, "Project not found").await;
            return;
        }
    };

    let project_name = project.name.clone();
    let callback: CompletionCallback = Box::new(move |execution| {
        Box::pin(async move {
            notifier
                .notify(&execution_report(&project_name, &execution))
                .await;
        })
    });
    executor.execute(project.id, command.to_string(), Some(callback));
    let _ = bot.send_message(chat_id, "Command execution started.").await;
}

async fn handle_status(bot: &Bot, chat_id: ChatId, storage: &Storage, args: &str) {
    let project_name = args.trim();
    if project_name.is_empty() {
        let _ = bot
            .send_message(chat_id, "Usage: /status [project_name]")
            .await;
        return;
    }

    let project = match storage.project_by_name(project_name).await {
        Ok(Some(project)) => project,
        _ => {
            let _ = bot.send_message(chat_id, "Project not found").await;
            return;
        }
    };

    let execution = match storage.last_execution(project.id).await {
        Ok(Some(execution)) => execution,
        _ => {
            let _ = bot.send_message(chat_id, "No executions found").await;
            return;
        }
    };

    let mut response = format!(
        "Last Execution Status: {}\nStart Time: {}",
        execution.status,
        execution.start_time.to_rfc3339()
    );
    if let Some(end_time) = execution.end_time {
        response.push_str(&format!("\nEnd Time: {}", end_time.to_rfc3339()));
    }
    let _ = bot.send_message(chat_id, response).await;
}

#[async_trait]
impl LifecycleComponent for TelegramInterface {
    async fn on_init(&mut self) -> Result<()> {
        info!("Telegram Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        if self.token.is_empty() {
            warn!("Telegram bot token not set, skipping Telegram integration");
            return Ok(());
        }
        info!("Telegram Interface starting...");
        if let Err(e) = self.start_bot().await {
            error!("Telegram bot crashed: {}", e);
        }
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("Telegram Interface shutting down...");
        Ok(())
    }
}
