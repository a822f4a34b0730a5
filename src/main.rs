//! Coletor de Candles Históricos - Binance REST
//!
//! Este programa pagina o endpoint /api/v3/klines da Binance a partir de uma
//! data de início, acumula os candles em memória e grava o resultado em JSON:
//! um arquivo único por intervalo (modo `single`) ou uma série de chunks
//! numerados mais um índice metadata.json (modo `chunked`).
//!
//! Uso:
//!   binance-candles single --interval 1m --start "2025-02-07"
//!   binance-candles chunked --interval 15m --start "2024-08-07 00:00:00" --out-dir data
//!   START_DATE=2015-01-01 binance-candles single --interval 1d

mod collect;
mod config;
mod fetch;
mod types;
mod writer;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::collect::Collector;
use crate::config::{ChunkedArgs, Cli, Command, SingleArgs};
use crate::fetch::KlineClient;

// ============================================================================
// Pausas padrão entre páginas (rate limit da Binance)
// ============================================================================

/// Modo single: meio segundo entre páginas.
const SINGLE_DELAY_MS: u64 = 500;
/// Modo chunked: espera mais curta entre páginas.
const CHUNKED_DELAY_MS: u64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Single(args) => run_single(args).await,
        Command::Chunked(args) => run_chunked(args).await,
    }
}

// ============================================================================
// Modo single: coleta aparada + um JSON por intervalo
// ============================================================================

async fn run_single(args: SingleArgs) -> Result<()> {
    let cfg = args.common.validate(SINGLE_DELAY_MS)?;

    eprintln!("--- [Coleta {} iniciada] ---", cfg.interval);
    eprintln!("Par: {}  Início: {}", cfg.symbol, args.common.start);

    let client = KlineClient::new(&cfg.base_url)?;
    let raw = Collector::new(&client, &cfg).collect_trimmed().await?;
    let candles =
        writer::normalize_all(&raw).context("resposta da Binance com formato inesperado")?;
    let path = writer::write_single(&candles, &cfg.interval, &args.out_dir)?;

    if cfg.progress {
        println!();
    }
    eprintln!(
        "✅ Coleta concluída: {} candles salvos em {}",
        candles.len(),
        path.display()
    );
    Ok(())
}

// ============================================================================
// Modo chunked: coleta completa + chunks numerados + metadata.json
// ============================================================================

async fn run_chunked(args: ChunkedArgs) -> Result<()> {
    let cfg = args.common.validate(CHUNKED_DELAY_MS)?;
    if args.chunks == Some(0) {
        bail!("--chunks deve ser pelo menos 1");
    }
    let n_chunks = args
        .chunks
        .unwrap_or_else(|| writer::chunk_count_for(&cfg.interval));

    eprintln!("--- [Coleta {} iniciada] ---", cfg.interval);
    eprintln!(
        "Par: {}  Início: {}  Chunks: {}",
        cfg.symbol, args.common.start, n_chunks
    );

    let client = KlineClient::new(&cfg.base_url)?;
    let raw = Collector::new(&client, &cfg).collect_full().await?;
    let candles =
        writer::normalize_all(&raw).context("resposta da Binance com formato inesperado")?;
    let files = writer::write_chunked(&candles, &cfg.interval, n_chunks, &args.out_dir)?;

    if cfg.progress {
        println!();
    }
    eprintln!(
        "✅ Coleta concluída: {} candles em {} arquivo(s) sob {}",
        candles.len(),
        files.len(),
        args.out_dir.display()
    );
    Ok(())
}
