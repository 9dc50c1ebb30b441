mod api;
mod config;
mod logging;
mod poller;
mod query;
mod sync;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use tracing::{debug, info};

use api::types::{DateRange, Period, RatingRequest, TypeFilter};
use api::{DashboardClient, HttpTransport, TransactionQuery};
use query::LocalQuery;
use sync::{Fetched, MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore, SyncContext};

#[derive(Parser, Debug)]
#[command(name = "walletsync")]
#[command(about = "Throttled, cached access to a wallet dashboard service")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/walletsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Override the API base url
  #[arg(long)]
  url: Option<String>,

  /// Keep the session snapshot in memory only
  #[arg(long)]
  ephemeral: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the wallet summary
  Overview,
  /// Show balance growth
  Growth {
    #[arg(long, value_enum, default_value_t = Period::Daily)]
    period: Period,
  },
  /// List one page of transactions, optionally searched locally
  Transactions {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long)]
    per_page: Option<u32>,
    #[arg(long = "type", value_enum, default_value_t = TypeFilter::All)]
    type_filter: TypeFilter,
    /// Start date (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,
    /// End date (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
    /// Case-insensitive text search over the fetched page
    #[arg(short, long)]
    query: Option<String>,
  },
  /// Check whether the session is still authenticated
  Session,
  /// Forget the persisted session snapshot
  Logout,
  /// Rate another user
  Rate {
    recipient: String,
    #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
    stars: u8,
    #[arg(long)]
    comment: Option<String>,
  },
  /// Poll the wallet summary until interrupted
  Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override url if specified on command line
  if let Some(url) = args.url {
    config.api.url = url;
  }

  let log_dir = config.log_dir.clone().or_else(logging::default_log_dir);
  let _log_guard = logging::init(log_dir.as_deref())?;
  info!(url = %config.api.url, "walletsync starting");

  let snapshots: Arc<dyn SnapshotStore> = match &config.snapshot_path {
    _ if args.ephemeral => Arc::new(MemorySnapshotStore::new()),
    Some(path) => Arc::new(SqliteSnapshotStore::open(path)?),
    None => Arc::new(SqliteSnapshotStore::open_default()?),
  };
  let context = Arc::new(SyncContext::new(config.sync.cache_capacity, snapshots));
  let transport = HttpTransport::new(&config.api, config::Config::api_token())?;
  let dashboard = DashboardClient::connect(transport, context, &config.sync);

  match args.command {
    Command::Overview => {
      let fetched = dashboard.overview().await?;
      print_fetched(&fetched, |o| {
        format!(
          "Balance: {:.2} {}  (pending {:.2}, sent {:.2}, received {:.2}, {} transactions, as of {})",
          o.balance,
          o.currency,
          o.pending,
          o.total_sent,
          o.total_received,
          o.transaction_count,
          o.updated_at.format("%Y-%m-%d %H:%M")
        )
      });
    }
    Command::Growth { period } => {
      let fetched = dashboard.growth(period).await?;
      print_fetched(&fetched, |g| {
        let mut out = format!("{} growth, total {:.2}", g.period.as_str(), g.total);
        for point in &g.points {
          out.push_str(&format!("\n  {}  {:>12.2}", point.date, point.value));
        }
        out
      });
    }
    Command::Transactions {
      page,
      per_page,
      type_filter,
      from,
      to,
      query,
    } => {
      let mut local = LocalQuery::new(Duration::from_millis(config.sync.debounce_ms));
      local.set_type_filter(type_filter);
      local.set_date_range(from.zip(to).map(|(from, to)| DateRange::new(from, to)));
      let per_page = per_page.unwrap_or(config.sync.per_page);
      let request = TransactionQuery::from_filters(page, per_page, local.filters());

      let fetched = dashboard.transactions(&request).await?;
      let Some(result) = fetched.data() else {
        println!("Transactions unavailable right now, try again shortly");
        return Ok(());
      };

      local.set_page(Arc::new(result.page.clone()));
      if let Some(text) = query {
        local.set_query(text);
        local.settle().await;
      }

      for tx in local.filtered() {
        println!(
          "{}  {}  {:<8?}  {:>12} {}  {}  {}",
          tx.id,
          tx.formatted_date(),
          tx.direction,
          tx.formatted_amount(),
          tx.currency,
          tx.counterparty,
          tx.reason.as_deref().unwrap_or("")
        );
      }

      let summary = &result.summary;
      println!(
        "[{}] {} matching, {} on this page of {}, {} total (sent {:.2}, received {:.2}, {} transactions)",
        fetched.source().map(|s| s.label()).unwrap_or("-"),
        local.filtered().len(),
        result.page.items.len(),
        result.page.per_page,
        result.page.total_count,
        summary.total_sent,
        summary.total_received,
        summary.count
      );
      if let Some(cursor) = local.cursor() {
        let mut nav = format!("Page {}/{}", cursor.page(), cursor.total_pages());
        if let Some(prev) = cursor.prev() {
          nav.push_str(&format!("  previous: --page {}", prev));
        }
        if let Some(next) = cursor.next() {
          nav.push_str(&format!("  next: --page {}", next));
        }
        println!("{}", nav);
      }
    }
    Command::Session => match dashboard.check_session().await {
      Ok(fetched) => print_fetched(&fetched, |s| {
        if s.authenticated {
          format!("Authenticated as {}", s.user_id)
        } else {
          "Not authenticated".to_string()
        }
      }),
      Err(e) if e.is_auth() => println!("Session expired, please sign in again"),
      Err(e) => return Err(e.into()),
    },
    Command::Logout => {
      dashboard.forget_session()?;
      println!("Session snapshot cleared");
    }
    Command::Rate {
      recipient,
      stars,
      comment,
    } => {
      let ack = dashboard
        .submit_rating(RatingRequest {
          recipient_id: recipient,
          stars,
          comment,
        })
        .await?;
      if !ack.accepted {
        return Err(eyre!(
          "Rating rejected: {}",
          ack.message.unwrap_or_else(|| "no reason given".to_string())
        ));
      }
      println!("Rating submitted");
    }
    Command::Watch => watch(&dashboard, config.sync.poll_interval_secs).await?,
  }

  info!("walletsync shutting down");
  Ok(())
}

/// Poll the overview until Ctrl-C.
async fn watch(dashboard: &DashboardClient<HttpTransport>, interval_secs: u64) -> Result<()> {
  let client = dashboard.clone();
  let mut poller = poller::Poller::spawn(Duration::from_secs(interval_secs.max(1)), move || {
    let client = client.clone();
    async move { client.overview().await }
  });
  let mut updates = dashboard.coordinator().subscribe();

  loop {
    tokio::select! {
      result = poller.next() => match result {
        Some(Ok(fetched)) => {
          print_fetched(&fetched, |o| format!("Balance: {:.2} {}", o.balance, o.currency));
          let cache = &dashboard.coordinator().context().cache;
          let swept = cache.sweep();
          let stats = cache.stats();
          debug!(
            swept,
            hits = stats.hits,
            stale_hits = stats.stale_hits,
            misses = stats.misses,
            evictions = stats.evictions,
            entries = cache.len(),
            capacity = cache.capacity(),
            "Cache swept"
          );
        }
        Some(Err(e)) if e.is_auth() => {
          poller.stop();
          return Err(eyre!("Session expired, please sign in again"));
        }
        Some(Err(e)) => eprintln!("Refresh failed: {}", e),
        None => break,
      },
      Ok(update) = updates.recv() => info!(key = %update.key, "Cache updated"),
      _ = tokio::signal::ctrl_c() => break,
    }
  }

  poller.stop();
  Ok(())
}

fn print_fetched<T>(fetched: &Fetched<T>, render: impl FnOnce(&T) -> String) {
  match fetched {
    Fetched::Ready { data, source } => println!("[{}] {}", source.label(), render(data)),
    Fetched::Unavailable => println!("Unavailable right now (throttled), try again shortly"),
  }
}
