//! Interactive browse session
//!
//! Each stdin line is parsed into a `SessionCommand` and run against one
//! `TransactionListController`. Controller errors are printed and the session
//! continues; only I/O failures end it early.

use anyhow::Result;
use chrono::NaiveDate;
use tally_core::{
    config::Config, Category, ControllerEvent, SortDirection, SortField, SortSpec,
    TransactionListController,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};

use super::{open_controller, print_page, print_statistics};

const HELP: &str = "\
Commands:
  page N                    Go to page N
  next | prev               Next / previous page
  sort FIELD [asc|desc]     Sort by date, description, amount or type
  search [TEXT]             Filter by text (no text clears)
  category [NAME]           Filter by category (no name clears)
  dates [FROM TO]           Filter by date range, YYYY-MM-DD (no dates clears)
  clear                     Clear all filters
  recat ID CATEGORY         Change a transaction's category
  delete ID                 Delete a transaction
  undo                      Undo the last delete or category change
  history                   Show undoable actions
  stats                     Show category statistics
  show                      Reprint the current page
  quit                      Leave the session";

/// One parsed line of the browse session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Page(u32),
    Next,
    Prev,
    Sort(SortSpec),
    Search(Option<String>),
    Category(Option<Category>),
    Dates(Option<(NaiveDate, NaiveDate)>),
    Clear,
    Recategorize { id: i64, category: Category },
    Delete(i64),
    Undo,
    History,
    Stats,
    Show,
    Help,
    Quit,
}

fn parse_id(arg: Option<&str>) -> Result<i64, String> {
    let arg = arg.ok_or("Missing transaction id")?;
    arg.parse::<i64>()
        .map_err(|_| format!("Invalid transaction id: {}", arg))
}

fn parse_date(arg: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(arg, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}' (use YYYY-MM-DD)", arg))
}

/// Parse one session line; `Ok(None)` for a blank line
pub fn parse_command(line: &str) -> Result<Option<SessionCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    // Category names may contain spaces ("Eating Out")
    let joined = |from: usize| rest.get(from..).map(|w| w.join(" ")).unwrap_or_default();

    let command = match verb.to_lowercase().as_str() {
        "page" | "p" => {
            let arg = rest.first().ok_or("Usage: page N")?;
            let page = arg
                .parse::<u32>()
                .map_err(|_| format!("Invalid page number: {}", arg))?;
            SessionCommand::Page(page)
        }
        "next" | "n" => SessionCommand::Next,
        "prev" | "previous" => SessionCommand::Prev,
        "sort" => {
            let field = rest
                .first()
                .ok_or("Usage: sort FIELD [asc|desc]")?
                .parse::<SortField>()?;
            let direction = match rest.get(1) {
                Some(d) => d.parse::<SortDirection>()?,
                None => SortDirection::default(),
            };
            SessionCommand::Sort(SortSpec::new(field, direction))
        }
        "search" | "s" => {
            let term = joined(0);
            SessionCommand::Search((!term.is_empty()).then_some(term))
        }
        "category" | "cat" => {
            let name = joined(0);
            if name.is_empty() {
                SessionCommand::Category(None)
            } else {
                SessionCommand::Category(Some(name.parse::<Category>()?))
            }
        }
        "dates" => match rest.as_slice() {
            [] => SessionCommand::Dates(None),
            [from, to] => SessionCommand::Dates(Some((parse_date(from)?, parse_date(to)?))),
            _ => return Err("Usage: dates FROM TO".to_string()),
        },
        "clear" => SessionCommand::Clear,
        "recat" | "recategorize" => {
            let id = parse_id(rest.first().copied())?;
            let name = joined(1);
            if name.is_empty() {
                return Err("Usage: recat ID CATEGORY".to_string());
            }
            SessionCommand::Recategorize {
                id,
                category: name.parse::<Category>()?,
            }
        }
        "delete" | "rm" => SessionCommand::Delete(parse_id(rest.first().copied())?),
        "undo" | "u" => SessionCommand::Undo,
        "history" => SessionCommand::History,
        "stats" => SessionCommand::Stats,
        "show" | "ls" => SessionCommand::Show,
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" | "q" => SessionCommand::Quit,
        other => return Err(format!("Unknown command '{}' (type 'help')", other)),
    };
    Ok(Some(command))
}

/// Run one command; returns `false` when the session should end
pub async fn execute(
    controller: &TransactionListController,
    command: SessionCommand,
) -> tally_core::Result<bool> {
    match command {
        SessionCommand::Page(n) => controller.set_page(n).await?,
        SessionCommand::Next => controller.next_page().await?,
        SessionCommand::Prev => controller.previous_page().await?,
        SessionCommand::Sort(sort) => controller.set_sort(sort).await?,
        SessionCommand::Search(term) => controller.set_search_term(term.as_deref()).await?,
        SessionCommand::Category(category) => controller.set_category_filter(category).await?,
        SessionCommand::Dates(range) => controller.set_date_range(range).await?,
        SessionCommand::Clear => controller.clear_filters().await?,
        SessionCommand::Recategorize { id, category } => {
            let updated = controller.update_category(id, category).await?;
            println!("✅ [{}] {} → {}", updated.id, updated.description, category);
        }
        SessionCommand::Delete(id) => {
            controller.delete_transaction(id).await?;
            println!("🗑️  Deleted transaction {} (type 'undo' to restore)", id);
        }
        SessionCommand::Undo => {
            let Some(action) = controller.last_action() else {
                println!("Nothing to undo.");
                return Ok(true);
            };
            if !action.is_reversible() {
                println!("Cannot undo {}: it had no previous category", action);
                return Ok(true);
            }
            if controller.undo().await? {
                println!("↩️  Undid {}", action);
            }
        }
        SessionCommand::History => {
            let history = controller.history();
            if history.is_empty() {
                println!("No undoable actions.");
            }
            for (i, action) in history.iter().rev().enumerate() {
                let marker = if i == 0 { "→" } else { " " };
                println!("   {} {}", marker, action);
            }
            return Ok(true);
        }
        SessionCommand::Stats => {
            print_statistics(&controller.statistics());
            return Ok(true);
        }
        SessionCommand::Help => {
            println!("{}", HELP);
            return Ok(true);
        }
        SessionCommand::Show => {}
        SessionCommand::Quit => return Ok(false),
    }

    print_page(controller);
    Ok(true)
}

/// Print background events that arrived since the last command
fn drain_events(events: &mut broadcast::Receiver<ControllerEvent>) {
    loop {
        match events.try_recv() {
            Ok(ControllerEvent::OverviewRefreshFailed { message }) => {
                println!("   ⚠️  Statistics overview refresh failed: {}", message);
            }
            Ok(ControllerEvent::OverviewRefreshed) => {}
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

pub async fn cmd_browse(config: &Config) -> Result<()> {
    let controller = open_controller(config, None)?;
    let mut events = controller.subscribe();

    if let Err(e) = controller.load().await {
        println!("⚠️  {}", e);
    }
    print_page(&controller);
    println!();
    println!("Type 'help' for commands.");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        drain_events(&mut events);
        stdout.write_all(b"tally> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match execute(&controller, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("❌ {}", e),
        }
    }

    controller.clear_history();
    Ok(())
}
