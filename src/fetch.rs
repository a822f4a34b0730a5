//! Cliente HTTP do endpoint de klines da Binance

use std::time::Duration;

use thiserror::Error;

use crate::types::RawCandle;

/// Caminho do endpoint de klines (mercado spot).
const KLINES_PATH: &str = "/api/v3/klines";

/// Timeout de cada requisição.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Falhas ao buscar uma página de klines.
///
/// Página vazia NÃO é erro: é o sinal de fim dos dados, devolvido como
/// `Ok(vec![])`. Este tipo representa apenas requisições que falharam de
/// fato, para que quem chama nunca confunda "acabaram os dados" com
/// "a requisição falhou".
#[derive(Debug, Error)]
pub enum FetchError {
    /// Resposta com status diferente de 2xx.
    #[error("resposta HTTP {0} da Binance")]
    Status(reqwest::StatusCode),

    /// Timeout, falha de conexão ou JSON que não decodifica.
    #[error("falha de transporte: {0}")]
    Transport(#[from] reqwest::Error),

    /// Todas as tentativas da política de retry falharam.
    #[error("{attempts} tentativa(s) contra a Binance esgotadas; última falha: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

/// Política de retry com backoff exponencial limitado.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Número máximo de tentativas antes de desistir.
    pub max_attempts: u32,
    /// Espera após a primeira falha; dobra a cada falha seguinte.
    pub base_delay: Duration,
    /// Teto da espera entre tentativas.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Espera antes da tentativa `attempt` (1-based; a primeira não espera).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let fator = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(fator).min(self.max_delay)
    }
}

/// Cliente do endpoint de klines.
pub struct KlineClient {
    http: reqwest::Client,
    base_url: String,
}

impl KlineClient {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Busca uma única página de klines a partir do cursor (ms).
    ///
    /// # Retorno
    /// Klines brutos na ordem da Binance (open time crescente); array vazio
    /// significa que não há mais dados a partir do cursor.
    pub async fn fetch_page(
        &self,
        symbol: &str,
        interval: &str,
        start_time: i64,
        limit: u32,
    ) -> Result<Vec<RawCandle>, FetchError> {
        let url = format!("{}{}", self.base_url, KLINES_PATH);
        let start_time = start_time.to_string();
        let limit = limit.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("startTime", start_time.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let page = response.json::<Vec<RawCandle>>().await?;
        Ok(page)
    }

    /// Busca uma página repetindo em caso de falha transitória.
    ///
    /// Aplica backoff exponencial entre tentativas; depois de
    /// `max_attempts` falhas devolve `RetriesExhausted` em vez de insistir
    /// para sempre ou fingir que os dados acabaram.
    pub async fn fetch_page_with_retry(
        &self,
        symbol: &str,
        interval: &str,
        start_time: i64,
        limit: u32,
        retry: &RetryPolicy,
    ) -> Result<Vec<RawCandle>, FetchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.fetch_page(symbol, interval, start_time, limit).await {
                Ok(page) => return Ok(page),
                Err(err) if attempt >= retry.max_attempts => {
                    return Err(FetchError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    let espera = retry.delay_before(attempt + 1);
                    log::warn!(
                        "tentativa {}/{} falhou (startTime={}): {}; nova tentativa em {:?}",
                        attempt,
                        retry.max_attempts,
                        start_time,
                        err,
                        espera
                    );
                    tokio::time::sleep(espera).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 8,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        };
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(500));
        assert_eq!(policy.delay_before(3), Duration::from_secs(1));
        assert_eq!(policy.delay_before(4), Duration::from_secs(2));
        assert_eq!(policy.delay_before(5), Duration::from_secs(4));
        // Acima do teto fica no teto, mesmo com shift enorme
        assert_eq!(policy.delay_before(40), Duration::from_secs(4));
    }

    #[test]
    fn default_policy_is_bounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert!(policy.delay_before(policy.max_attempts) <= policy.max_delay);
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = KlineClient::new("https://api.binance.com/").unwrap();
        assert_eq!(client.base_url, "https://api.binance.com");
    }
}
