use std::io::BufRead;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use lineboard::api::http::HttpBackend;
use lineboard::api::Backend;
use lineboard::charts::LoggingSurface;
use lineboard::config::Config;
use lineboard::controller::Controller;
use lineboard::live;
use lineboard::logging::{self, obj, v_str, Domain, Level};
use lineboard::model::{FilterState, ProcessMode};
use lineboard::ranking::top_performers;
use lineboard::storage::FilterStore;
use lineboard::trend::ComparisonPeriod;
use lineboard::view::UiEvent;

enum Command {
    Event(UiEvent),
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str, controller: &Controller) -> Command {
    let trimmed = line.trim();
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (trimmed, ""),
    };

    match head {
        "" => Command::Help,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "tab" => Command::Event(UiEvent::TabClicked(rest.to_string())),
        "mode" => match ProcessMode::from_label(rest) {
            Some(mode) => Command::Event(UiEvent::ModeChanged(mode)),
            None => Command::Unknown(trimmed.to_string()),
        },
        "range" => match rest.split_once(char::is_whitespace) {
            Some((start, end)) => Command::Event(UiEvent::ApplyFilters {
                start_date: start.trim().to_string(),
                end_date: end.trim().to_string(),
                workers: controller.filters.selected_workers.clone(),
            }),
            None => Command::Unknown(trimmed.to_string()),
        },
        "workers" => Command::Event(UiEvent::ApplyFilters {
            start_date: controller.filters.start_date.clone(),
            end_date: controller.filters.end_date.clone(),
            workers: rest
                .split(',')
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect(),
        }),
        "refresh" => Command::Event(UiEvent::ApplyFilters {
            start_date: controller.filters.start_date.clone(),
            end_date: controller.filters.end_date.clone(),
            workers: controller.filters.selected_workers.clone(),
        }),
        "shiprange" => match rest.split_once(char::is_whitespace) {
            Some((start, end)) => Command::Event(UiEvent::ApplyShippingRange {
                start_date: Some(start.trim().to_string()),
                end_date: Some(end.trim().to_string()),
            }),
            None => Command::Event(UiEvent::ApplyShippingRange {
                start_date: None,
                end_date: None,
            }),
        },
        "reset" => Command::Event(UiEvent::Reset),
        "sort" => Command::Event(UiEvent::SortChanged(rest.to_string())),
        "worker" => Command::Event(UiEvent::WorkerSelected(rest.to_string())),
        "toggle" => Command::Event(UiEvent::ToggleDetail(rest.to_string())),
        "page" => match rest.parse::<usize>() {
            Ok(page) => Command::Event(UiEvent::PageChanged(page)),
            Err(_) => Command::Unknown(trimmed.to_string()),
        },
        "period" => match ComparisonPeriod::from_label(rest) {
            Some(period) => Command::Event(UiEvent::ComparisonPeriodChanged(period)),
            None => Command::Unknown(trimmed.to_string()),
        },
        "trace" => {
            let mut parts = rest.split_whitespace();
            Command::Event(UiEvent::TraceSearch {
                wid: parts.next().unwrap_or("").to_string(),
                fpb: parts.next().unwrap_or("").to_string(),
                barcode: parts.next().unwrap_or("").to_string(),
            })
        }
        "barcode" => Command::Event(UiEvent::BarcodeSearch(rest.to_string())),
        "barcodes" => match rest.parse::<usize>() {
            Ok(row) => Command::Event(UiEvent::SessionBarcodes(row)),
            Err(_) => Command::Unknown(trimmed.to_string()),
        },
        "export" => Command::Event(UiEvent::ExportExcel),
        "top" => {
            // Quick-select: keep only the top 20% of workers by score.
            let workers = controller
                .data()
                .map(|d| top_performers(&d.worker_data, 0.2))
                .unwrap_or_default();
            Command::Event(UiEvent::ApplyFilters {
                start_date: controller.filters.start_date.clone(),
                end_date: controller.filters.end_date.clone(),
                workers,
            })
        }
        _ => Command::Unknown(trimmed.to_string()),
    }
}

fn print_help() {
    println!("commands:");
    println!("  tab <name>              switch tab (e.g. tab 상세 데이터)");
    println!("  mode <label>            switch process mode (검사실|이적실|포장실|전체 비교)");
    println!("  range <start> <end>     set the date filter (YYYY-MM-DD) and refetch");
    println!("  workers <a,b,c>         set the worker filter and refetch");
    println!("  refresh                 refetch with current filters");
    println!("  shiprange [start end]   set or clear the shipping-date window");
    println!("  reset                   reset filters to the full range");
    println!("  sort <label>            worker sort key (e.g. 이름순)");
    println!("  worker <name>           select a worker");
    println!("  toggle <detail-id>      expand/collapse a detail row");
    println!("  page <n>                detail-table page");
    println!("  period <label>          comparison period (일간|주간|월간|연간)");
    println!("  trace <wid> <fpb> <bc>  traceability search");
    println!("  barcode <code>          quick barcode lookup");
    println!("  barcodes <row>          barcode list for a trace result row");
    println!("  export                  export the current sessions to Excel");
    println!("  top                     keep only the top 20% of workers");
    println!("  quit");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    logging::log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("api_base", v_str(&cfg.api_base)),
            ("ws_url", v_str(&cfg.ws_url)),
        ]),
    );

    let mut store = FilterStore::new(&cfg.sqlite_path)?;
    store.init()?;

    let today = chrono::Local::now().date_naive();
    let today_str = today.format("%Y-%m-%d").to_string();
    let filters = store
        .load()?
        .unwrap_or_else(|| FilterState::for_today(&today_str));

    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&cfg)?);

    let (fetch_tx, mut fetch_rx) = mpsc::channel(16);
    let (detail_tx, mut detail_rx) = mpsc::channel(64);
    let (live_tx, mut live_rx) = mpsc::channel(16);
    let (line_tx, mut line_rx) = mpsc::channel::<String>(16);

    {
        let ws_url = cfg.ws_url.clone();
        let reconnect = cfg.live_reconnect_secs;
        tokio::spawn(async move {
            let _ = live::run_listener(ws_url, reconnect, live_tx).await;
        });
    }

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(|line| line.ok()) {
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let mut controller = Controller::new(
        cfg,
        backend,
        store,
        Box::new(LoggingSurface::default()),
        filters,
        today,
        fetch_tx,
        detail_tx,
    );
    controller.request_fetch();
    print_help();

    loop {
        tokio::select! {
            line = line_rx.recv() => match line {
                Some(line) => match parse_command(&line, &controller) {
                    Command::Event(event) => controller.handle_ui(event).await,
                    Command::Help => print_help(),
                    Command::Quit => break,
                    Command::Unknown(cmd) => println!("unknown command: {}", cmd),
                },
                None => break,
            },
            Some(outcome) = fetch_rx.recv() => controller.on_fetch(outcome).await,
            Some(outcome) = detail_rx.recv() => controller.on_detail(outcome).await,
            Some(event) = live_rx.recv() => controller.on_live(event).await,
        }
    }

    logging::log(Level::Info, Domain::System, "shutdown", obj(&[]));
    Ok(())
}
