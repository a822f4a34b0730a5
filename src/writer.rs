//! Gravação dos candles em JSON

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{Candle, ParseError, RawCandle};

/// Nome do arquivo de índice dos chunks.
const METADATA_FILE: &str = "metadata.json";

/// Chunks por intervalo; intervalos fora da tabela usam 1 (arquivo único).
const CHUNKS_PER_INTERVAL: &[(&str, usize)] = &[
    ("1m", 12),
    ("5m", 8),
    ("15m", 4),
    ("1h", 2),
    ("4h", 2),
    ("1d", 1),
];

/// Entrada do metadata.json para um intervalo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalMeta {
    pub chunks: usize,
    pub files: Vec<String>,
}

/// Número de chunks padrão para o intervalo.
pub fn chunk_count_for(interval: &str) -> usize {
    CHUNKS_PER_INTERVAL
        .iter()
        .find(|(nome, _)| *nome == interval)
        .map(|(_, n)| *n)
        .unwrap_or(1)
}

/// Converte a sequência bruta acumulada para o formato normalizado.
pub fn normalize_all(raw: &[RawCandle]) -> Result<Vec<Candle>, ParseError> {
    raw.iter().map(RawCandle::normalize).collect()
}

/// Particiona em até `n` fatias contíguas de teto(total/n) candles.
///
/// A concatenação das fatias reconstrói a sequência original na ordem;
/// nenhuma fatia parte um candle ao meio e fatia vazia não é gerada.
pub fn partition(candles: &[Candle], n: usize) -> Vec<&[Candle]> {
    if candles.is_empty() || n == 0 {
        return Vec::new();
    }
    let size = (candles.len() + n - 1) / n;
    candles.chunks(size).collect()
}

/// Grava a sequência inteira como `<interval>_candles.json` no diretório.
pub fn write_single(candles: &[Candle], interval: &str, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("criando diretório {}", out_dir.display()))?;
    let path = out_dir.join(format!("{}_candles.json", interval));
    let json = serde_json::to_string(candles)?;
    fs::write(&path, json).with_context(|| format!("gravando {}", path.display()))?;
    Ok(path)
}

/// Grava a sequência em chunks `<interval>_<n>.json` (1-based) e atualiza o
/// metadata.json do diretório.
///
/// # Retorno
/// Nomes dos arquivos gravados, na ordem dos chunks.
pub fn write_chunked(
    candles: &[Candle],
    interval: &str,
    n: usize,
    out_dir: &Path,
) -> Result<Vec<String>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("criando diretório {}", out_dir.display()))?;

    let mut files = Vec::new();
    for (idx, slice) in partition(candles, n).iter().enumerate() {
        let name = format!("{}_{}.json", interval, idx + 1);
        let path = out_dir.join(&name);
        let json = serde_json::to_string(slice)?;
        fs::write(&path, json).with_context(|| format!("gravando {}", path.display()))?;
        files.push(name);
    }

    update_metadata(out_dir, interval, &files)?;
    Ok(files)
}

/// Lê o metadata.json existente; ausente ou corrompido vale como vazio.
fn read_metadata(path: &Path) -> BTreeMap<String, IntervalMeta> {
    let Ok(conteudo) = fs::read_to_string(path) else {
        return BTreeMap::new();
    };
    match serde_json::from_str(&conteudo) {
        Ok(map) => map,
        Err(err) => {
            log::warn!("{} ilegível ({}); recomeçando índice do zero", path.display(), err);
            BTreeMap::new()
        }
    }
}

/// Substitui a entrada deste intervalo no índice, preservando as dos demais.
///
/// A troca é atômica: serializa em arquivo temporário no mesmo diretório e
/// renomeia por cima do metadata.json, para nunca deixar um índice pela
/// metade em disco.
pub fn update_metadata(out_dir: &Path, interval: &str, files: &[String]) -> Result<()> {
    let path = out_dir.join(METADATA_FILE);
    let mut metadata = read_metadata(&path);
    metadata.insert(
        interval.to_string(),
        IntervalMeta {
            chunks: files.len(),
            files: files.to_vec(),
        },
    );

    let tmp = out_dir.join(format!("{}.tmp", METADATA_FILE));
    fs::write(&tmp, serde_json::to_string_pretty(&metadata)?)
        .with_context(|| format!("gravando {}", tmp.display()))?;
    fs::rename(&tmp, &path)
        .with_context(|| format!("renomeando {} para {}", tmp.display(), path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                time: 1_700_000_000 + i as i64 * 60,
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn partition_2500_in_3_gives_834_834_832() {
        let dados = candles(2500);
        let fatias = partition(&dados, 3);
        let tamanhos: Vec<usize> = fatias.iter().map(|f| f.len()).collect();
        assert_eq!(tamanhos, vec![834, 834, 832]);

        // Concatenar reconstrói a sequência original, na ordem
        let juntado: Vec<Candle> = fatias.concat();
        assert_eq!(juntado, dados);
    }

    #[test]
    fn partition_never_yields_empty_slice() {
        let dados = candles(2);
        // Pedir mais chunks que candles produz menos fatias, nunca vazias
        let fatias = partition(&dados, 5);
        assert_eq!(fatias.len(), 2);
        assert!(fatias.iter().all(|f| !f.is_empty()));

        assert!(partition(&[], 3).is_empty());
    }

    #[test]
    fn chunk_table_defaults_to_one_for_unknown_interval() {
        assert_eq!(chunk_count_for("1m"), 12);
        assert_eq!(chunk_count_for("1d"), 1);
        assert_eq!(chunk_count_for("3w"), 1);
    }

    #[test]
    fn write_single_produces_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let dados = candles(10);

        let path = write_single(&dados, "1h", dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "1h_candles.json");

        let relido: Vec<Candle> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(relido, dados);
    }

    #[test]
    fn write_chunked_names_files_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let dados = candles(10);

        let files = write_chunked(&dados, "15m", 3, dir.path()).unwrap();
        assert_eq!(files, vec!["15m_1.json", "15m_2.json", "15m_3.json"]);

        // Cada chunk é um JSON válido e a soma bate com a entrada
        let mut total = 0;
        for name in &files {
            let relido: Vec<Candle> =
                serde_json::from_str(&fs::read_to_string(dir.path().join(name)).unwrap()).unwrap();
            total += relido.len();
        }
        assert_eq!(total, dados.len());
    }

    #[test]
    fn metadata_preserves_other_intervals() {
        let dir = tempfile::tempdir().unwrap();

        let files_4h = vec!["4h_1.json".to_string()];
        update_metadata(dir.path(), "4h", &files_4h).unwrap();

        let files_1h = vec!["1h_1.json".to_string(), "1h_2.json".to_string()];
        update_metadata(dir.path(), "1h", &files_1h).unwrap();

        let conteudo = fs::read_to_string(dir.path().join("metadata.json")).unwrap();
        let metadata: BTreeMap<String, IntervalMeta> = serde_json::from_str(&conteudo).unwrap();

        assert_eq!(metadata["4h"], IntervalMeta { chunks: 1, files: files_4h });
        assert_eq!(metadata["1h"], IntervalMeta { chunks: 2, files: files_1h });
    }

    #[test]
    fn metadata_overwrites_same_interval() {
        let dir = tempfile::tempdir().unwrap();

        update_metadata(dir.path(), "1h", &["1h_1.json".to_string()]).unwrap();
        let novos = vec!["1h_1.json".to_string(), "1h_2.json".to_string()];
        update_metadata(dir.path(), "1h", &novos).unwrap();

        let metadata: BTreeMap<String, IntervalMeta> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("metadata.json")).unwrap())
                .unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata["1h"].chunks, 2);
    }

    #[test]
    fn corrupt_metadata_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("metadata.json"), "{isso nao é json").unwrap();

        update_metadata(dir.path(), "1d", &["1d_1.json".to_string()]).unwrap();

        let metadata: BTreeMap<String, IntervalMeta> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("metadata.json")).unwrap())
                .unwrap();
        assert_eq!(metadata.len(), 1);
        assert!(metadata.contains_key("1d"));
    }

    #[test]
    fn write_chunked_with_empty_input_writes_no_chunk_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_chunked(&[], "1h", 4, dir.path()).unwrap();
        assert!(files.is_empty());

        // O índice ainda é gravado, registrando zero arquivos
        let metadata: BTreeMap<String, IntervalMeta> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("metadata.json")).unwrap())
                .unwrap();
        assert_eq!(metadata["1h"], IntervalMeta { chunks: 0, files: vec![] });
    }
}
