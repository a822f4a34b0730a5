//! Configuração via flags de linha de comando
//!
//! Os parâmetros que antes eram constantes editadas a cada execução viram
//! flags (com fallback em variável de ambiente), validados uma única vez na
//! partida e repassados ao pipeline como struct tipada.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Args, Parser, Subcommand};

use crate::fetch::RetryPolicy;

/// Teto de klines por requisição imposto pela Binance.
const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Parser)]
#[command(
    name = "binance-candles",
    version,
    about = "Coleta klines históricos da Binance e grava em JSON"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Grava toda a coleta em um único <interval>_candles.json
    Single(SingleArgs),
    /// Grava a coleta em chunks numerados mais um índice metadata.json
    Chunked(ChunkedArgs),
}

/// Parâmetros comuns aos dois modos de coleta.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Par a coletar (ex.: BTCUSDT)
    #[arg(long, env = "SYMBOL", default_value = "BTCUSDT")]
    pub symbol: String,

    /// Intervalo dos candles (1m, 15m, 1h, 1d, ...)
    #[arg(long, env = "INTERVAL", default_value = "1m")]
    pub interval: String,

    /// Início da coleta em UTC: "YYYY-MM-DD" ou "YYYY-MM-DD HH:MM:SS"
    #[arg(long, env = "START_DATE")]
    pub start: String,

    /// Máximo de klines por requisição (teto da Binance: 1000)
    #[arg(long, env = "LIMIT", default_value_t = 1000)]
    pub limit: u32,

    /// URL base da API
    #[arg(long, env = "BASE_URL", default_value = "https://api.binance.com")]
    pub base_url: String,

    /// Pausa entre páginas em ms (respeito ao rate limit; padrão por modo)
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Tentativas por página antes de abortar a coleta
    #[arg(long, default_value_t = 5)]
    pub max_retries: u32,

    /// Suprime a linha de progresso
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Debug, Args)]
pub struct SingleArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Diretório onde gravar o arquivo de saída
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct ChunkedArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Diretório onde gravar os chunks e o metadata.json
    #[arg(long, default_value = "data")]
    pub out_dir: PathBuf,

    /// Quantidade de chunks (padrão: tabela fixa por intervalo)
    #[arg(long)]
    pub chunks: Option<usize>,
}

/// Configuração validada de uma coleta.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub symbol: String,
    pub interval: String,
    /// Cursor inicial, em ms desde a época.
    pub start_ms: i64,
    pub limit: u32,
    pub base_url: String,
    /// Pausa entre páginas bem-sucedidas.
    pub delay: Duration,
    pub retry: RetryPolicy,
    pub progress: bool,
}

impl CommonArgs {
    /// Valida os flags e monta a configuração tipada da coleta.
    ///
    /// # Argumentos
    /// * `default_delay_ms` - pausa padrão do subcomando quando --delay-ms
    ///   não é informado (500 ms no modo single, 100 ms no chunked)
    pub fn validate(&self, default_delay_ms: u64) -> Result<FetchConfig> {
        if self.symbol.trim().is_empty() {
            bail!("--symbol não pode ser vazio");
        }
        if self.interval.trim().is_empty() {
            bail!("--interval não pode ser vazio");
        }
        if self.limit == 0 || self.limit > MAX_LIMIT {
            bail!(
                "--limit deve estar entre 1 e {} (recebido: {})",
                MAX_LIMIT,
                self.limit
            );
        }
        if self.max_retries == 0 {
            bail!("--max-retries deve ser pelo menos 1");
        }
        let start_ms = parse_start(&self.start)
            .with_context(|| format!("data de início inválida: '{}'", self.start))?;

        Ok(FetchConfig {
            symbol: self.symbol.trim().to_uppercase(),
            interval: self.interval.trim().to_string(),
            start_ms,
            limit: self.limit,
            base_url: self.base_url.clone(),
            delay: Duration::from_millis(self.delay_ms.unwrap_or(default_delay_ms)),
            retry: RetryPolicy {
                max_attempts: self.max_retries,
                ..RetryPolicy::default()
            },
            progress: !self.quiet,
        })
    }
}

/// Interpreta a data de início como UTC e devolve ms desde a época.
pub fn parse_start(texto: &str) -> Result<i64> {
    let texto = texto.trim();
    let datetime = NaiveDateTime::parse_from_str(texto, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(texto, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
        })
        .context("use o formato YYYY-MM-DD ou YYYY-MM-DD HH:MM:SS")?;
    Ok(datetime.and_utc().timestamp_millis())
}
