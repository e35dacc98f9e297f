//! Composition root: wires the store, cache, queue, monitor, dispatcher
//! and synchronizer together and implements the CLI commands.

use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use serde_json::{json, Value};

use crate::cache::CacheLayer;
use crate::config::Config;
use crate::dispatch::{Dispatcher, ExecOptions, ExecOutcome};
use crate::error::Error;
use crate::format;
use crate::model::{Card, Category, OpKind, Record};
use crate::queue::PendingQueue;
use crate::remote::client::RemoteClient;
use crate::remote::transport::HttpTransport;
use crate::remote::types::{CreatedRecord, ListRecordsResponse};
use crate::status::{ConnectivityMonitor, NetState, Reachability};
use crate::store::{Partition, Store};
use crate::sync::Synchronizer;

const RECORDS_CACHE_KEY: &str = "records";

pub struct App {
  config: Config,
  store: Arc<Store>,
  state: Arc<NetState>,
  cache: CacheLayer,
  queue: PendingQueue,
  client: RemoteClient<HttpTransport>,
  dispatcher: Dispatcher<HttpTransport>,
  syncer: Synchronizer<HttpTransport>,
  monitor: ConnectivityMonitor<HttpTransport>,
}

impl App {
  pub async fn new(config: Config) -> Result<Self> {
    let store = Arc::new(Store::open(&config.db_path()?)?);

    let transport = Arc::new(HttpTransport::new(
      &config.remote.url,
      Duration::from_secs(config.remote.timeout_secs),
    )?);

    // Seed the shared state from a live probe before anything consults it.
    let state = Arc::new(NetState::new(Reachability::Unreachable));
    let client = RemoteClient::new(transport, state.clone());
    if client.verify_connection().await {
      state.set_reachability(Reachability::Reachable);
    }

    let cache = CacheLayer::new(store.clone())
      .with_ttl(chrono::Duration::seconds(config.cache.ttl_secs as i64));
    let queue = PendingQueue::new(store.clone());
    state.set_pending(queue.len()?);

    let dispatcher = Dispatcher::new(client.clone(), queue.clone(), state.clone());
    let syncer = Synchronizer::new(
      client.clone(),
      queue.clone(),
      state.clone(),
      config.sync.warn_attempts,
    );
    let monitor = ConnectivityMonitor::new(
      client.clone(),
      state.clone(),
      Duration::from_secs(config.sync.probe_interval_secs),
    );

    Ok(Self {
      config,
      store,
      state,
      cache,
      queue,
      client,
      dispatcher,
      syncer,
      monitor,
    })
  }

  pub async fn add(
    &self,
    date: Option<String>,
    amount: String,
    description: String,
    category: Option<String>,
    card: Option<String>,
  ) -> Result<()> {
    let date = match date {
      Some(raw) => format::parse_date(&raw)?,
      None => chrono::Local::now().date_naive(),
    };

    let mut record = Record {
      id: 0,
      line: None,
      date,
      amount: format::parse_money(&amount)?,
      description,
      category,
      card,
    };

    // Local first: the record exists here before anywhere else.
    record.id = self
      .store
      .insert(Partition::Records, &serde_json::to_string(&record)?)?;
    self
      .store
      .replace(Partition::Records, record.id, &serde_json::to_string(&record)?)?;

    let outcome = self
      .dispatcher
      .execute(
        OpKind::CreateRecord,
        serde_json::to_value(&record)?,
        ExecOptions::default(),
      )
      .await?;

    match outcome {
      ExecOutcome::Completed(fields) => {
        if let Ok(created) = serde_json::from_value::<CreatedRecord>(fields) {
          record.line = Some(created.line);
          self
            .store
            .replace(Partition::Records, record.id, &serde_json::to_string(&record)?)?;
        }
        self.cache.invalidate(RECORDS_CACHE_KEY)?;
        println!(
          "Saved #{}: {} {} — {}",
          record.id,
          format::format_date(record.date),
          format::format_money(record.amount),
          record.description
        );
      }
      ExecOutcome::Queued(_) => {
        println!(
          "Saved offline #{} — will sync when the connection returns ({} pending).",
          record.id,
          self.state.pending()
        );
      }
    }

    Ok(())
  }

  pub async fn edit(
    &self,
    id: i64,
    date: Option<String>,
    amount: Option<String>,
    description: Option<String>,
    category: Option<String>,
    card: Option<String>,
  ) -> Result<()> {
    let mut record = self.local_record(id)?;

    if let Some(raw) = date {
      record.date = format::parse_date(&raw)?;
    }
    if let Some(raw) = amount {
      record.amount = format::parse_money(&raw)?;
    }
    if let Some(text) = description {
      record.description = text;
    }
    if category.is_some() {
      record.category = category;
    }
    if card.is_some() {
      record.card = card;
    }

    self
      .store
      .replace(Partition::Records, id, &serde_json::to_string(&record)?)?;

    let outcome = self
      .dispatcher
      .execute(
        OpKind::UpdateRecord,
        serde_json::to_value(&record)?,
        ExecOptions::default(),
      )
      .await?;

    match outcome {
      ExecOutcome::Completed(_) => {
        self.cache.invalidate(RECORDS_CACHE_KEY)?;
        println!("Updated #{id}.");
      }
      ExecOutcome::Queued(_) => {
        println!("Updated offline #{id} — will sync when the connection returns.");
      }
    }

    Ok(())
  }

  pub async fn remove(&self, id: i64) -> Result<()> {
    let record = self.local_record(id)?;
    self.store.delete(Partition::Records, id)?;

    let outcome = self
      .dispatcher
      .execute(
        OpKind::DeleteRecord,
        json!({ "id": id, "line": record.line }),
        ExecOptions::default(),
      )
      .await?;

    match outcome {
      ExecOutcome::Completed(_) => {
        self.cache.invalidate(RECORDS_CACHE_KEY)?;
        println!("Removed #{id}.");
      }
      ExecOutcome::Queued(_) => {
        println!("Removed offline #{id} — will sync when the connection returns.");
      }
    }

    Ok(())
  }

  pub async fn list(&self) -> Result<()> {
    if let Some(records) = self
      .cache
      .get_cached_data::<Vec<Record>>(RECORDS_CACHE_KEY)?
    {
      print_records(&records, "cached");
      self.print_unconfirmed()?;
      return Ok(());
    }

    match self.client.call("listRecords", Value::Null).await {
      Ok(fields) => {
        let parsed: ListRecordsResponse = serde_json::from_value(fields)
          .map_err(|e| Error::Protocol(format!("bad listRecords response: {e}")))?;

        let records: Vec<Record> = parsed
          .records
          .into_iter()
          .map(|r| Record {
            id: 0,
            line: Some(r.line),
            date: r.date,
            amount: r.amount,
            description: r.description,
            category: r.category,
            card: r.card,
          })
          .collect();

        self.cache.cache_data(RECORDS_CACHE_KEY, &records, None)?;
        print_records(&records, "remote");
        self.print_unconfirmed()?;
      }
      Err(e) if e.is_offline() => {
        println!("Offline — showing locally saved records.");
        print_records(&self.local_records()?, "local");
      }
      Err(e) => return Err(e.into()),
    }

    Ok(())
  }

  pub async fn sync_once(&self) -> Result<()> {
    let result = self.syncer.sync().await?;
    println!(
      "Sync finished: {} confirmed, {} failed, {} still pending.",
      result.synced,
      result.failed,
      self.state.pending()
    );
    Ok(())
  }

  pub async fn status(&self) -> Result<()> {
    let reach = self.monitor.probe().await;
    match reach {
      Reachability::Reachable => println!("Remote service: reachable"),
      Reachability::Unreachable => println!("Remote service: unreachable"),
    }

    if self.state.is_syncing() {
      println!("Sync in progress");
    }

    let ops = self.queue.list_all()?;
    println!("Pending operations: {}", ops.len());
    for op in &ops {
      println!(
        "  #{} {} attempts={} queued {}",
        op.id,
        op.kind,
        op.attempts,
        op.created_at.format("%Y-%m-%d %H:%M:%S")
      );
    }

    match self.cache.entry_meta(RECORDS_CACHE_KEY)? {
      Some(meta) if meta.expires_at > chrono::Utc::now() => {
        println!(
          "Records cache: fetched {}, fresh until {}",
          meta.created_at.format("%Y-%m-%d %H:%M:%S"),
          meta.expires_at.format("%Y-%m-%d %H:%M:%S")
        );
      }
      Some(_) => println!("Records cache: expired"),
      None => println!("Records cache: empty"),
    }

    Ok(())
  }

  pub async fn names(&self, category: Option<String>, card: Option<String>) -> Result<()> {
    let adding = category.is_some() || card.is_some();

    if let Some(name) = category {
      let entry = Category { id: 0, name };
      self
        .store
        .insert(Partition::Categories, &serde_json::to_string(&entry)?)?;
    }
    if let Some(name) = card {
      let entry = Card { id: 0, name };
      self
        .store
        .insert(Partition::Cards, &serde_json::to_string(&entry)?)?;
    }

    let categories: Vec<String> = self
      .store
      .get_all(Partition::Categories)?
      .into_iter()
      .filter_map(|(_, data)| serde_json::from_str::<Category>(&data).ok())
      .map(|c| c.name)
      .collect();
    let cards: Vec<String> = self
      .store
      .get_all(Partition::Cards)?
      .into_iter()
      .filter_map(|(_, data)| serde_json::from_str::<Card>(&data).ok())
      .map(|c| c.name)
      .collect();

    if adding {
      let outcome = self
        .dispatcher
        .execute(
          OpKind::SaveNames,
          json!({ "categories": categories, "cards": cards }),
          ExecOptions::default(),
        )
        .await?;

      match outcome {
        ExecOutcome::Completed(_) => println!("Names saved."),
        ExecOutcome::Queued(_) => {
          println!("Names saved offline — will sync when the connection returns.")
        }
      }
    }

    println!("Categories: {}", categories.join(", "));
    println!("Cards: {}", cards.join(", "));
    Ok(())
  }

  pub fn clear_cache(&self) -> Result<()> {
    self.cache.clear_all()?;
    println!("Response cache cleared.");
    Ok(())
  }

  /// Long-running mode: probe loop plus sync-on-reconnect, the CLI
  /// equivalent of the platform's online/offline handlers.
  pub async fn watch(&self) -> Result<()> {
    println!(
      "Watching connectivity (probe every {}s, settle delay {}ms). Ctrl-C to stop.",
      self.config.sync.probe_interval_secs, self.config.sync.settle_delay_ms
    );

    // Drain anything left over from previous offline work first.
    if self.state.is_online() {
      let result = self.syncer.sync().await?;
      if result.synced + result.failed > 0 {
        println!(
          "Initial sync: {} confirmed, {} failed.",
          result.synced, result.failed
        );
      }
    }

    let settle = Duration::from_millis(self.config.sync.settle_delay_ms);
    tokio::join!(self.monitor.run(), self.syncer.run_on_reconnect(settle));
    Ok(())
  }

  fn local_record(&self, id: i64) -> Result<Record> {
    let data = self
      .store
      .get(Partition::Records, id)?
      .ok_or_else(|| Error::InvalidInput(format!("no record with id {id}")))?;
    let mut record: Record = serde_json::from_str(&data).map_err(Error::from)?;
    record.id = id;
    Ok(record)
  }

  fn local_records(&self) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for (id, data) in self.store.get_all(Partition::Records)? {
      let mut record: Record = serde_json::from_str(&data).map_err(Error::from)?;
      record.id = id;
      records.push(record);
    }
    Ok(records)
  }

  /// Locally created records the remote service has not confirmed yet.
  fn print_unconfirmed(&self) -> Result<()> {
    let unconfirmed: Vec<Record> = self
      .local_records()?
      .into_iter()
      .filter(|r| r.line.is_none())
      .collect();

    if !unconfirmed.is_empty() {
      println!("Awaiting sync:");
      print_records(&unconfirmed, "local");
    }
    Ok(())
  }
}

fn print_records(records: &[Record], source: &str) {
  if records.is_empty() {
    println!("No records ({source}).");
    return;
  }

  println!("{} record(s) ({source}):", records.len());
  for record in records {
    let id = if record.id > 0 {
      format!("#{}", record.id)
    } else {
      format!("L{}", record.line.unwrap_or(0))
    };
    println!(
      "  {:>6}  {}  {:>14}  {}{}{}",
      id,
      format::format_date(record.date),
      format::format_money(record.amount),
      record.description,
      record
        .category
        .as_deref()
        .map(|c| format!("  [{c}]"))
        .unwrap_or_default(),
      record
        .card
        .as_deref()
        .map(|c| format!("  ({c})"))
        .unwrap_or_default(),
    );
  }
}
