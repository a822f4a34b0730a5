//! Acumulação paginada de klines
//!
//! O loop de coleta pede página a página ao cliente e vai concatenando o
//! resultado em memória. As regras de término e de avanço do cursor são
//! funções puras, separadas do loop assíncrono, para poderem ser exercitadas
//! com páginas sintéticas.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use crate::config::FetchConfig;
use crate::fetch::KlineClient;
use crate::types::{ParseError, RawCandle};

/// Resultado de aplicar uma página à sequência acumulada.
#[derive(Debug, PartialEq)]
pub enum PageStep {
    /// Continua a coleta a partir do cursor indicado (ms).
    Continue(i64),
    /// Fim dos dados; a sequência acumulada está completa.
    Done,
}

/// Aplica uma página no modo "aparado" (pipeline de arquivo único).
///
/// O último kline de cada página volta como primeiro da página seguinte, por
/// isso ele é descartado aqui para não entrar duplicado. Páginas com menos de
/// 2 klines encerram a coleta: sem pelo menos 2, a regra de descarte ficaria
/// indefinida, então página vazia e página quase vazia valem ambas como fim.
///
/// # Retorno
/// `Continue` com o próximo cursor (close time do último kline + 1 ms), ou
/// `Done` quando a página sinaliza o fim dos dados.
pub fn apply_page_trimmed(
    all: &mut Vec<RawCandle>,
    page: Vec<RawCandle>,
) -> Result<PageStep, ParseError> {
    if page.len() < 2 {
        return Ok(PageStep::Done);
    }
    let next_cursor = match page.last() {
        Some(last) => last.close_time()? + 1,
        None => return Ok(PageStep::Done),
    };
    let keep = page.len() - 1;
    all.extend(page.into_iter().take(keep));
    Ok(PageStep::Continue(next_cursor))
}

/// Aplica uma página no modo "completo" (pipeline chunked).
///
/// Aqui a página inteira entra na sequência; o cursor avança para o open time
/// do último kline + 1 ms, de modo que a próxima requisição começa
/// estritamente depois de tudo que já foi acumulado e nenhum kline se repete.
pub fn apply_page_full(
    all: &mut Vec<RawCandle>,
    page: Vec<RawCandle>,
) -> Result<PageStep, ParseError> {
    let next_cursor = match page.last() {
        Some(last) => last.open_time()? + 1,
        None => return Ok(PageStep::Done),
    };
    all.extend(page);
    Ok(PageStep::Continue(next_cursor))
}

/// Relógio de parede em ms desde a época.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Loop de coleta sobre um cliente e uma configuração validada.
pub struct Collector<'a> {
    client: &'a KlineClient,
    cfg: &'a FetchConfig,
}

impl<'a> Collector<'a> {
    pub fn new(client: &'a KlineClient, cfg: &'a FetchConfig) -> Self {
        Self { client, cfg }
    }

    /// Coleta no modo aparado até a Binance devolver página curta.
    pub async fn collect_trimmed(&self) -> Result<Vec<RawCandle>> {
        let mut all = Vec::new();
        let mut cursor = self.cfg.start_ms;

        loop {
            let page = self.fetch(cursor).await?;
            match apply_page_trimmed(&mut all, page)
                .context("kline sem close time na resposta da Binance")?
            {
                PageStep::Continue(next) => {
                    cursor = next;
                    self.report_progress(&all);
                    tokio::time::sleep(self.cfg.delay).await;
                }
                PageStep::Done => break,
            }
        }

        Ok(all)
    }

    /// Coleta no modo completo até página vazia ou até alcançar o presente.
    pub async fn collect_full(&self) -> Result<Vec<RawCandle>> {
        let mut all = Vec::new();
        let mut cursor = self.cfg.start_ms;

        loop {
            let page = self.fetch(cursor).await?;
            match apply_page_full(&mut all, page)
                .context("kline sem open time na resposta da Binance")?
            {
                PageStep::Continue(next) => {
                    cursor = next;
                    self.report_progress(&all);
                    // Cursor já passou do relógio: chegamos ao presente
                    if cursor > now_ms() {
                        break;
                    }
                    tokio::time::sleep(self.cfg.delay).await;
                }
                PageStep::Done => break,
            }
        }

        Ok(all)
    }

    async fn fetch(&self, cursor: i64) -> Result<Vec<RawCandle>> {
        let page = self
            .client
            .fetch_page_with_retry(
                &self.cfg.symbol,
                &self.cfg.interval,
                cursor,
                self.cfg.limit,
                &self.cfg.retry,
            )
            .await?;
        Ok(page)
    }

    /// Linha de progresso reescrita no lugar (uma por página).
    fn report_progress(&self, all: &[RawCandle]) {
        if !self.cfg.progress {
            return;
        }
        let Some(last) = all.last() else {
            return;
        };
        let Ok(ts) = last.open_time() else {
            return;
        };
        print!("\r\x1b[K"); // ANSI: volta ao início da linha e limpa
        print!(
            "[{}] Candles coletados: {} (último: {})",
            self.cfg.interval,
            all.len(),
            fmt_ms(ts)
        );
        let _ = std::io::stdout().flush();
    }
}

/// Formata um timestamp em ms como data/hora legível (UTC).
fn fmt_ms(ts_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}
