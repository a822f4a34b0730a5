//! Tipos e estruturas de dados

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Erro ao interpretar um campo de um kline bruto da Binance.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("campo '{0}' ausente ou inválido no kline recebido")]
    Campo(&'static str),
}

/// Kline bruto como a Binance devolve: array posicional
/// `[Open time, Open, High, Low, Close, Volume, Close time, ...]`.
///
/// Apenas os campos 0 (open time), 1 a 5 (OHLCV) e 6 (close time) são
/// interpretados; o restante do array é carregado sem uso.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCandle(pub Vec<serde_json::Value>);

impl RawCandle {
    /// Timestamp de abertura em milissegundos (campo 0).
    pub fn open_time(&self) -> Result<i64, ParseError> {
        self.0
            .first()
            .and_then(|v| v.as_i64())
            .ok_or(ParseError::Campo("open time"))
    }

    /// Timestamp de fechamento em milissegundos (campo 6).
    pub fn close_time(&self) -> Result<i64, ParseError> {
        self.0
            .get(6)
            .and_then(|v| v.as_i64())
            .ok_or(ParseError::Campo("close time"))
    }

    /// Lê um campo numérico. A Binance envia OHLCV como string ("42000.1"),
    /// mas aceitamos número puro também.
    fn numero(&self, idx: usize, nome: &'static str) -> Result<f64, ParseError> {
        let valor = self.0.get(idx).ok_or(ParseError::Campo(nome))?;
        match valor {
            serde_json::Value::String(s) => s.parse().map_err(|_| ParseError::Campo(nome)),
            outro => outro.as_f64().ok_or(ParseError::Campo(nome)),
        }
    }

    /// Converte para o formato normalizado dos arquivos de saída:
    /// `time` em segundos (open time / 1000) e OHLCV em ponto flutuante.
    pub fn normalize(&self) -> Result<Candle, ParseError> {
        Ok(Candle {
            time: self.open_time()? / 1000,
            open: self.numero(1, "open")?,
            high: self.numero(2, "high")?,
            low: self.numero(3, "low")?,
            close: self.numero(4, "close")?,
            volume: self.numero(5, "volume")?,
        })
    }
}

/// Candle normalizado, no formato que o front (Lightweight Charts) consome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Timestamp unix em segundos.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_completo() -> RawCandle {
        // Layout real de um kline da Binance: 12 campos
        serde_json::from_value(json!([
            1700000000000i64,
            "42000.1",
            "42100.0",
            "41900.5",
            "42050.0",
            "12.34",
            1700000059999i64,
            "519000.0",
            100,
            "6.0",
            "252000.0",
            "0"
        ]))
        .unwrap()
    }

    #[test]
    fn extracts_open_and_close_time() {
        let raw = raw_completo();
        assert_eq!(raw.open_time().unwrap(), 1700000000000);
        assert_eq!(raw.close_time().unwrap(), 1700000059999);
    }

    #[test]
    fn normalize_divides_open_time_to_seconds() {
        let candle = raw_completo().normalize().unwrap();
        assert_eq!(candle.time, 1700000000);
        assert_eq!(candle.open, 42000.1);
        assert_eq!(candle.high, 42100.0);
        assert_eq!(candle.low, 41900.5);
        assert_eq!(candle.close, 42050.0);
        assert_eq!(candle.volume, 12.34);
    }

    #[test]
    fn normalize_rejects_missing_field() {
        let raw = RawCandle(vec![json!(1700000000000i64), json!("42000.1")]);
        assert!(raw.normalize().is_err());
    }

    #[test]
    fn normalize_rejects_non_numeric_price() {
        let raw = RawCandle(vec![
            json!(1700000000000i64),
            json!("n/a"),
            json!("1"),
            json!("1"),
            json!("1"),
            json!("1"),
            json!(1700000059999i64),
        ]);
        assert!(raw.normalize().is_err());
    }

    #[test]
    fn candle_json_roundtrip() {
        let original = raw_completo().normalize().unwrap();
        let texto = serde_json::to_string(&original).unwrap();
        let relido: Candle = serde_json::from_str(&texto).unwrap();
        assert_eq!(relido, original);
    }
}
