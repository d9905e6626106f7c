//! Command-line comparison of TradeMaster instruments
//!
//! # Usage
//!
//! ```bash
//! export TRADEMASTER_API_URL="http://localhost:8000"
//!
//! trademaster compare NDA-FI.HE NOKIA.HE --range 3mo --chart
//! trademaster search nok --limit 5
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde_json::json;
use tracing::{info, warn};
use trademaster_core::projection::Tone;
use trademaster_core::{
    ChartRow, ComparisonClients, ComparisonRow, ComparisonSession, HistoryProvider, HistoryRange,
    Instrument, MAX_SELECTION, PLACEHOLDER, StockConfig, build_clients,
};
use trademaster_utils::{AppConfig, init_tracing_with};

#[derive(Parser, Debug)]
#[command(name = "trademaster")]
#[command(about = "Compare up to four instruments side by side", long_about = None)]
struct Cli {
    /// Backend base URL (overrides TRADEMASTER_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Backend bearer token (overrides TRADEMASTER_API_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Where price history is read from: backend or yahoo
    #[arg(long, global = true)]
    history_provider: Option<HistoryProvider>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and compare instruments
    Compare {
        /// Tickers to compare; anything past the fourth is ignored
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Chart range: 3mo, 6mo or 1y
        #[arg(short, long, default_value = "6mo")]
        range: HistoryRange,

        /// Also print the normalized price chart
        #[arg(long)]
        chart: bool,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Search the instrument universe
    Search {
        query: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
    /// List the sectors of the instrument universe
    Sectors,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app = AppConfig::from_env()?;

    let default_filter = if cli.verbose {
        "debug"
    } else if app.is_production() {
        "error"
    } else {
        "warn"
    };
    init_tracing_with(app.log_format, default_filter);
    info!(environment = %app.environment, "starting {}", app.app_name);

    let config = stock_config(&cli)?;
    let clients = build_clients(&config).context("failed to set up market data clients")?;

    match cli.command {
        Command::Compare {
            tickers,
            range,
            chart,
            json,
        } => compare(&clients, &tickers, range, chart, json).await,
        Command::Search { query, limit, json } => search(&clients, &query, limit, json).await,
        Command::Sectors => {
            for sector in clients.directory().sectors().await? {
                println!("{sector}");
            }
            Ok(())
        }
    }
}

fn stock_config(cli: &Cli) -> anyhow::Result<StockConfig> {
    let mut builder = StockConfig::builder();
    if let Some(url) = &cli.api_url {
        builder = builder.api_base_url(url.clone());
    }
    if let Some(token) = &cli.token {
        builder = builder.api_token(token.clone());
    }
    if let Some(provider) = cli.history_provider {
        builder = builder.history_provider(provider);
    }
    Ok(builder.with_env()?.build()?)
}

async fn compare(
    clients: &ComparisonClients,
    tickers: &[String],
    range: HistoryRange,
    with_chart: bool,
    as_json: bool,
) -> anyhow::Result<()> {
    let mut session = ComparisonSession::with_range(range);
    for ticker in tickers {
        if !session.add(ticker) {
            warn!(%ticker, max = MAX_SELECTION, "ticker ignored");
        }
    }
    session.refresh(&clients.orchestrator).await;

    let rows = session.comparison_rows();
    let chart = session.chart();
    let errors = session.errors();

    if as_json {
        let errors: Vec<_> = errors
            .iter()
            .map(|(ticker, message)| json!({ "ticker": ticker, "error": message }))
            .collect();
        let output = json!({
            "tickers": session.tickers(),
            "range": range,
            "rows": rows,
            "chart": with_chart.then_some(&chart),
            "errors": errors,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", grid_table(session.tickers(), &rows));
    if with_chart {
        println!("\nIndexed close, first sample = 100 ({range})");
        println!("{}", chart_table(session.tickers(), &chart));
    }
    for (ticker, message) in errors {
        eprintln!("{ticker}: {message}");
    }
    Ok(())
}

async fn search(
    clients: &ComparisonClients,
    query: &str,
    limit: usize,
    as_json: bool,
) -> anyhow::Result<()> {
    let found = clients.directory().search(query, limit).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else if found.is_empty() {
        println!("No instruments match '{query}'");
    } else {
        println!("{}", instrument_table(&found));
    }
    Ok(())
}

fn new_table(header: Vec<String>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn grid_table(tickers: &[String], rows: &[ComparisonRow]) -> Table {
    let header = std::iter::once("Metric".to_string())
        .chain(tickers.iter().cloned())
        .collect();
    let mut table = new_table(header);
    for row in rows {
        let cells = std::iter::once(Cell::new(row.label)).chain(row.cells.iter().map(|cell| {
            match cell.tone {
                Some(Tone::Positive) => Cell::new(&cell.text).fg(Color::Green),
                Some(Tone::Negative) => Cell::new(&cell.text).fg(Color::Red),
                _ => Cell::new(&cell.text),
            }
        }));
        table.add_row(cells.collect::<Vec<_>>());
    }
    table
}

fn chart_table(tickers: &[String], chart: &[ChartRow]) -> Table {
    let header = std::iter::once("Date".to_string())
        .chain(tickers.iter().cloned())
        .collect();
    let mut table = new_table(header);
    for row in chart {
        let mut cells = vec![row.date.clone()];
        cells.extend(tickers.iter().map(|ticker| {
            row.get(ticker)
                .map_or_else(|| PLACEHOLDER.to_string(), |value| format!("{value:.2}"))
        }));
        table.add_row(cells);
    }
    table
}

fn instrument_table(instruments: &[Instrument]) -> Table {
    let mut table = new_table(vec!["Ticker".into(), "Name".into(), "Sector".into()]);
    for instrument in instruments {
        table.add_row(vec![
            instrument.ticker.clone(),
            instrument.name.clone(),
            instrument.sector.clone(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::collections::BTreeMap;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compare() {
        let cli = Cli::try_parse_from([
            "trademaster",
            "compare",
            "NDA",
            "NOKIA",
            "--range",
            "3mo",
            "--history-provider",
            "yahoo",
        ])
        .unwrap();
        assert_eq!(cli.history_provider, Some(HistoryProvider::Yahoo));
        match cli.command {
            Command::Compare { tickers, range, .. } => {
                assert_eq!(tickers, ["NDA", "NOKIA"]);
                assert_eq!(range, HistoryRange::ThreeMonths);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_range() {
        assert!(Cli::try_parse_from(["trademaster", "compare", "NDA", "--range", "5y"]).is_err());
        assert!(Cli::try_parse_from(["trademaster", "compare"]).is_err());
    }

    #[test]
    fn test_chart_table_leaves_gaps() {
        let tickers = vec!["A".to_string(), "B".to_string()];
        let chart = vec![ChartRow {
            date: "2024-01-02".to_string(),
            values: BTreeMap::from([("A".to_string(), 100.0)]),
        }];
        let rendered = chart_table(&tickers, &chart).to_string();
        assert!(rendered.contains("100.00"));
        assert!(rendered.contains(PLACEHOLDER));
    }
}
