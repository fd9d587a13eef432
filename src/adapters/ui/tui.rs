//! Implements InputPort. Inquire-based interactive menu.
//!
//! Login (phone, code, 2FA), then a loop over the main menu until Exit.

use crate::adapters::export::ExportFormat;
use crate::adapters::ui::progress;
use crate::domain::{ConversationEntity, DomainError, EntityKind, ExportCategory, SpamAnalysis};
use crate::ports::InputPort;
use crate::usecases::{
    BatchHandle, BatchReport, ChatService, ConnectStatus, DeletionLog, ExportService,
    VerifyStatus, read_id_list,
};
use async_trait::async_trait;
use inquire::error::InquireError;
use inquire::ui::{Color, RenderConfig, StyleSheet, Styled};
use inquire::{Confirm, MultiSelect, Password, PasswordDisplayMode, Select, Text};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MAX_CODE_ATTEMPTS: usize = 3;

/// Neon prompts to match the banner.
pub fn apply_theme() {
    let purple = Color::rgb(0xbc, 0x13, 0xfe);
    let cyan = Color::rgb(0x0f, 0xf0, 0xfc);
    let mut cfg = RenderConfig::default();
    cfg.prompt_prefix = Styled::new("❯").with_fg(purple);
    cfg.highlighted_option_prefix = Styled::new("➤").with_fg(cyan);
    cfg.selected_checkbox = Styled::new("[x]").with_fg(cyan);
    cfg.answer = StyleSheet::new().with_fg(cyan);
    inquire::set_global_render_config(cfg);
}

fn kind_indicator(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Person => "[U]",
        EntityKind::BasicGroup => "[G]",
        EntityKind::Supergroup => "[S]",
        EntityKind::BroadcastChannel => "[C]",
        EntityKind::Unknown => "[?]",
    }
}

fn describe(entity: &ConversationEntity) -> String {
    let mut line = format!("{} {}", kind_indicator(entity.kind()), entity.display_name());
    if let Some(u) = entity.username() {
        line.push_str(&format!(" @{}", u));
    }
    if let Some(n) = entity.member_count() {
        line.push_str(&format!(" · {} members", n));
    }
    line.push_str(&format!(" ({})", entity.id()));
    line
}

fn prompt_err(e: InquireError) -> DomainError {
    DomainError::InvalidRequest(e.to_string())
}

fn is_cancel(e: &InquireError) -> bool {
    matches!(
        e,
        InquireError::OperationCanceled | InquireError::OperationInterrupted
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Stats,
    Analyze,
    List,
    Export,
    BulkDelete,
    DeleteFromFile,
    Refresh,
    Logout,
    Exit,
}

impl MenuAction {
    const ALL: [MenuAction; 9] = [
        MenuAction::Stats,
        MenuAction::Analyze,
        MenuAction::List,
        MenuAction::Export,
        MenuAction::BulkDelete,
        MenuAction::DeleteFromFile,
        MenuAction::Refresh,
        MenuAction::Logout,
        MenuAction::Exit,
    ];
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MenuAction::Stats => "Show statistics",
            MenuAction::Analyze => "Analyze users (spam check)",
            MenuAction::List => "List a category",
            MenuAction::Export => "Export a category",
            MenuAction::BulkDelete => "Bulk delete from a category",
            MenuAction::DeleteFromFile => "Delete chats listed in an exported file",
            MenuAction::Refresh => "Refresh dialogs",
            MenuAction::Logout => "Log out",
            MenuAction::Exit => "Exit",
        })
    }
}

/// TUI adapter. Inquire prompts over the chat and export services.
pub struct TuiInputPort {
    chats: Arc<ChatService>,
    exports: Arc<ExportService>,
}

impl TuiInputPort {
    pub fn new(chats: Arc<ChatService>, exports: Arc<ExportService>) -> Self {
        Self { chats, exports }
    }

    /// Reuse the saved session, or walk through phone / code / 2FA.
    async fn login(&self) -> Result<(), DomainError> {
        let session = self.chats.session();
        if session.auto_connect().await {
            return Ok(());
        }

        if session.stored_credentials().await?.is_none() {
            println!("Get api_id and api_hash at https://my.telegram.org");
            let api_id: i32 = Text::new("api_id:")
                .prompt()
                .map_err(prompt_err)?
                .trim()
                .parse()
                .map_err(|_| DomainError::InvalidRequest("api_id must be a number".into()))?;
            let api_hash = Text::new("api_hash:").prompt().map_err(prompt_err)?;
            session.save_credentials(api_id, &api_hash).await?;
        }

        let saved_phone = session.phone().await.unwrap_or_default();
        let phone = Text::new("Phone number (international format):")
            .with_default(&saved_phone)
            .prompt()
            .map_err(prompt_err)?;

        if session.connect(Some(phone.as_str())).await? == ConnectStatus::Connected {
            return Ok(());
        }

        let mut status = None;
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = Text::new("Login code:").prompt().map_err(prompt_err)?;
            match session.verify(Some(code.as_str()), None).await {
                Ok(s) => {
                    status = Some(s);
                    break;
                }
                Err(DomainError::Verification(msg)) if attempt < MAX_CODE_ATTEMPTS => {
                    println!("{}. Try again.", msg);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(VerifyStatus::PasswordRequired { hint }) = status {
            let label = match hint {
                Some(h) => format!("2FA password (hint: {}):", h),
                None => "2FA password:".to_string(),
            };
            let password = Password::new(&label)
                .with_display_mode(PasswordDisplayMode::Masked)
                .without_confirmation()
                .prompt()
                .map_err(prompt_err)?;
            session.verify(None, Some(password.as_str())).await?;
        }
        Ok(())
    }

    async fn show_stats(&self) -> Result<(), DomainError> {
        let s = self.chats.stats().await?;
        println!();
        println!("  Groups (all):   {}", s.groups);
        println!("    Supergroups:  {}", s.supergroups);
        println!("    Basic groups: {}", s.basic_groups);
        println!("  Channels:       {}", s.channels);
        println!("  Users:          {}", s.users);
        println!("  Unknown:        {}", s.unknown);
        println!("  Total:          {}", s.total);
        println!();
        Ok(())
    }

    async fn analyze(&self) -> Result<(), DomainError> {
        let users = self.chats.stats().await?.users as u64;
        let pb = progress::bar(users, "Analyzing users");
        let bar = pb.clone();
        let analysis = self
            .chats
            .analyze_with_progress(move |done, _| bar.set_position(done as u64))
            .await;
        pb.finish_and_clear();
        print_analysis(&analysis?);
        Ok(())
    }

    fn pick_category(&self, prompt: &str) -> Result<ExportCategory, InquireError> {
        Select::new(prompt, ExportCategory::ALL.to_vec())
            .with_page_size(14)
            .prompt()
    }

    async fn list(&self) -> Result<(), DomainError> {
        let category = self.pick_category("Category:").map_err(prompt_err)?;
        let entities = self.chats.entities(category).await?;
        println!();
        for e in &entities {
            println!("  {}", describe(e));
        }
        println!("  {} in {}\n", entities.len(), category);
        Ok(())
    }

    async fn export(&self) -> Result<(), DomainError> {
        let category = self.pick_category("Export which category?").map_err(prompt_err)?;
        let format = Select::new("Format:", vec![ExportFormat::Json, ExportFormat::Csv])
            .prompt()
            .map_err(prompt_err)?;
        let records = self.chats.records(category).await?;
        let path = self.exports.export(category, &records, format).await?;
        println!("Exported {} chats to {}", records.len(), path.display());
        Ok(())
    }

    async fn bulk_delete(&self) -> Result<(), DomainError> {
        let category = self.pick_category("Delete from which category?").map_err(prompt_err)?;
        let entities = self.chats.entities(category).await?;
        if entities.is_empty() {
            println!("Nothing in {}.", category);
            return Ok(());
        }
        let options: Vec<String> = entities.iter().map(describe).collect();
        let selected = MultiSelect::new("Select chats to delete:", options.clone())
            .with_page_size(15)
            .prompt()
            .map_err(prompt_err)?;
        let ids: Vec<i64> = entities
            .iter()
            .zip(&options)
            .filter(|(_, label)| selected.contains(label))
            .map(|(e, _)| e.id())
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.run_batch(&ids, category.name()).await
    }

    async fn delete_from_file(&self) -> Result<(), DomainError> {
        let path = Text::new("Path to exported JSON file:")
            .prompt()
            .map_err(prompt_err)?;
        let ids = read_id_list(path.trim()).await?;
        if ids.is_empty() {
            println!("The file lists no chats.");
            return Ok(());
        }
        // Resolve against the current dialogs; ids that are gone are skipped by the batch.
        self.chats.stats().await?;
        self.run_batch(&ids, path.trim()).await
    }

    /// Confirm, schedule, offer undo, then wait for the commit and write the log.
    async fn run_batch(&self, ids: &[i64], source: &str) -> Result<(), DomainError> {
        let proceed = Confirm::new(&format!("Delete {} chats?", ids.len()))
            .with_default(false)
            .prompt()
            .map_err(prompt_err)?;
        if !proceed {
            return Ok(());
        }

        let coordinator = self.chats.coordinator();
        let handle = coordinator.schedule_batch(ids).await?;
        if !handle.skipped.is_empty() {
            println!("Skipped {} chats that are no longer listed.", handle.skipped.len());
        }
        let undo = Confirm::new(&format!(
            "Deleting {} chats in {}s. Undo?",
            handle.scheduled.len(),
            coordinator.delay().as_secs()
        ))
        .with_default(false)
        .prompt()
        .map_err(prompt_err)?;
        if undo {
            if coordinator.undo_batch(handle.batch_id).await {
                println!("Undone. Nothing was deleted.");
                let _ = handle.report().await;
                return Ok(());
            }
            println!("Too late to undo: deletion already started.");
        }

        let report = self.wait_for_batch(handle).await;
        println!(
            "Deleted {}, failed {}, restored {}.",
            report.committed, report.failed, report.rolled_back
        );
        for err in report.errors() {
            println!("  {}", err);
        }
        let log = DeletionLog::from_report(source, ids.len(), &report);
        match self.exports.write_deletion_log(&log).await {
            Ok(path) => println!("Log written to {}", path.display()),
            Err(e) => warn!(error = %e, "could not write deletion log"),
        }
        Ok(())
    }

    async fn wait_for_batch(&self, handle: BatchHandle) -> BatchReport {
        let coordinator = Arc::clone(self.chats.coordinator());
        let batch_id = handle.batch_id;
        let total = handle.scheduled.len() as u64;
        let pb = progress::bar(total, "Deleting");
        let report = handle.report();
        tokio::pin!(report);
        loop {
            tokio::select! {
                r = &mut report => {
                    pb.finish_and_clear();
                    return r;
                }
                _ = tokio::time::sleep(Duration::from_millis(250)) => {
                    let left = coordinator
                        .pending()
                        .await
                        .iter()
                        .filter(|p| p.batch_id == Some(batch_id))
                        .count() as u64;
                    pb.set_position(total.saturating_sub(left));
                }
            }
        }
    }

    async fn logout(&self) -> Result<(), DomainError> {
        let sure = Confirm::new("Log out and delete this session?")
            .with_default(false)
            .prompt()
            .map_err(prompt_err)?;
        if sure {
            self.chats.clear().await;
            self.chats.session().logout().await?;
            println!("Logged out.");
        }
        Ok(())
    }
}

fn print_analysis(analysis: &SpamAnalysis) {
    let c = analysis.counts();
    println!();
    println!("  Deleted accounts: {}", c.deleted);
    println!("  Bots:             {}", c.bots);
    println!("  Scam:             {}", c.scam);
    println!("  Fake:             {}", c.fake);
    println!("  No messages:      {}", c.no_messages);
    println!("  Only incoming:    {}", c.only_incoming);
    println!("  Active:           {}", c.active);
    println!("  ({} history probes)", c.probed);
    println!();
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        self.login().await?;
        if let Ok(me) = self.chats.session().me().await {
            info!(id = me.id, "logged in");
            println!("Logged in as {}", me.first_name);
        }

        loop {
            let action = match Select::new("What next?", MenuAction::ALL.to_vec()).prompt() {
                Ok(a) => a,
                Err(e) if is_cancel(&e) => break,
                Err(e) => return Err(prompt_err(e)),
            };
            let result = match action {
                MenuAction::Stats => self.show_stats().await,
                MenuAction::Analyze => self.analyze().await,
                MenuAction::List => self.list().await,
                MenuAction::Export => self.export().await,
                MenuAction::BulkDelete => self.bulk_delete().await,
                MenuAction::DeleteFromFile => self.delete_from_file().await,
                MenuAction::Refresh => self.chats.refresh().await.map(|s| {
                    println!("{} dialogs loaded.", s.total);
                }),
                MenuAction::Logout => {
                    self.logout().await?;
                    if !self.chats.session().is_ready().await {
                        break;
                    }
                    Ok(())
                }
                MenuAction::Exit => break,
            };
            match result {
                Ok(()) => {}
                Err(DomainError::RateLimited { retry_after_secs }) => {
                    println!("Telegram asks to wait {} seconds. Try again later.", retry_after_secs);
                }
                Err(DomainError::InvalidRequest(msg)) if msg.contains("canceled") => {}
                Err(e) => println!("Error: {}", e),
            }
        }

        self.chats.coordinator().shutdown().await;
        Ok(())
    }
}
