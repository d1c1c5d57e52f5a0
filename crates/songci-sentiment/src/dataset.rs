//! Working table: corpus rows plus per-row classification outcome
//!
//! The same CSV layout serves as output and checkpoint: original columns,
//! then `sentiment_class, sentiment_score, keywords, analysis, processed`.
//! Loading prefers an existing checkpoint, which is what makes a run resumable.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::model::{ClassificationResult, ERROR_SCORE, SentimentClass};

/// Columns appended to the original schema, in file order
pub const RESULT_COLUMNS: [&str; 5] = [
    "sentiment_class",
    "sentiment_score",
    "keywords",
    "analysis",
    "processed",
];

/// Separator used to join keywords into one cell
const KEYWORD_SEPARATOR: &str = ", ";

/// Error from loading or persisting the working table
#[derive(Debug)]
pub enum DatasetError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Csv {
        path: PathBuf,
        source: csv::Error,
    },
    MissingColumn {
        path: PathBuf,
        column: String,
    },
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: IO: {source}", path.display()),
            Self::Csv { path, source } => write!(f, "{}: CSV: {source}", path.display()),
            Self::MissingColumn { path, column } => {
                write!(f, "{}: missing column '{column}'", path.display())
            }
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::MissingColumn { .. } => None,
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> DatasetError + '_ {
    move |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> DatasetError + '_ {
    move |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// One corpus row.
///
/// `outcome` is `Some` exactly when the row is processed, so a processed row
/// always carries all four result fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    /// Original column values, aligned with [`Dataset::columns`]
    pub fields: Vec<String>,
    pub outcome: Option<ClassificationResult>,
}

impl DatasetRow {
    pub fn is_processed(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Ordered rows addressed by position.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    content_idx: usize,
    rows: Vec<DatasetRow>,
}

impl Dataset {
    /// Build from original columns and rows; `content_column` must be present.
    pub fn new(
        columns: Vec<String>,
        content_column: &str,
        rows: Vec<DatasetRow>,
    ) -> Option<Self> {
        let content_idx = columns.iter().position(|c| c == content_column)?;
        Some(Self {
            columns,
            content_idx,
            rows,
        })
    }

    /// Original column names (result columns excluded)
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Poem text of row `index`
    pub fn content(&self, index: usize) -> &str {
        self.rows[index]
            .fields
            .get(self.content_idx)
            .map_or("", String::as_str)
    }

    /// Record the final outcome of row `index`, replacing all result fields at once.
    pub fn commit(&mut self, index: usize, result: ClassificationResult) {
        self.rows[index].outcome = Some(result);
    }

    pub fn processed_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_processed()).count()
    }

    /// Indices of rows still waiting for a result, in table order
    pub fn pending_indices(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_processed())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Loads and persists [`Dataset`]s as CSV.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    content_column: String,
}

impl Default for DatasetStore {
    fn default() -> Self {
        Self::new("content")
    }
}

impl DatasetStore {
    pub fn new(content_column: impl Into<String>) -> Self {
        Self {
            content_column: content_column.into(),
        }
    }

    /// Resume from `checkpoint` if it exists, otherwise start fresh from `raw`.
    pub fn load(&self, raw: &Path, checkpoint: &Path) -> Result<Dataset, DatasetError> {
        if checkpoint.exists() {
            let dataset = self.load_checkpoint(checkpoint)?;
            log::info!(
                "Resuming from {} ({} of {} rows processed)",
                checkpoint.display(),
                dataset.processed_count(),
                dataset.len()
            );
            Ok(dataset)
        } else {
            let dataset = self.load_raw(raw)?;
            log::info!("Loaded {} rows from {}", dataset.len(), raw.display());
            Ok(dataset)
        }
    }

    /// Load the raw corpus: every row unprocessed.
    pub fn load_raw(&self, path: &Path) -> Result<Dataset, DatasetError> {
        let table = read_table(path)?;
        let keep = table.original_column_positions();
        let columns: Vec<String> = keep.iter().map(|&i| table.headers[i].clone()).collect();
        let rows = table
            .records
            .iter()
            .map(|record| DatasetRow {
                fields: keep.iter().map(|&i| cell(record, i).to_string()).collect(),
                outcome: None,
            })
            .collect();
        self.assemble(path, columns, rows)
    }

    /// Load a checkpoint, keeping processed flags and prior results.
    ///
    /// A row flagged processed whose result cells cannot be read back is
    /// demoted to unprocessed and will be classified again.
    pub fn load_checkpoint(&self, path: &Path) -> Result<Dataset, DatasetError> {
        let table = read_table(path)?;
        let keep = table.original_column_positions();
        let columns: Vec<String> = keep.iter().map(|&i| table.headers[i].clone()).collect();
        let result_pos: Vec<Option<usize>> = RESULT_COLUMNS
            .iter()
            .map(|name| table.position(name))
            .collect();

        let mut demoted = 0usize;
        let rows = table
            .records
            .iter()
            .map(|record| {
                let get = |k: usize| result_pos[k].map_or("", |i| cell(record, i));
                let outcome = if parse_flag(get(4)) {
                    let parsed = parse_outcome(get(0), get(1), get(2), get(3));
                    if parsed.is_none() {
                        demoted += 1;
                    }
                    parsed
                } else {
                    None
                };
                DatasetRow {
                    fields: keep.iter().map(|&i| cell(record, i).to_string()).collect(),
                    outcome,
                }
            })
            .collect();

        if demoted > 0 {
            log::warn!(
                "{}: {demoted} rows flagged processed had unreadable results, will redo",
                path.display()
            );
        }
        self.assemble(path, columns, rows)
    }

    fn assemble(
        &self,
        path: &Path,
        columns: Vec<String>,
        rows: Vec<DatasetRow>,
    ) -> Result<Dataset, DatasetError> {
        Dataset::new(columns, &self.content_column, rows).ok_or_else(|| {
            DatasetError::MissingColumn {
                path: path.to_path_buf(),
                column: self.content_column.clone(),
            }
        })
    }

    /// Write the full table to `path` via tmp file + rename, replacing any previous checkpoint.
    pub fn save(&self, dataset: &Dataset, path: &Path) -> Result<(), DatasetError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let tmp_path = tmp_path_for(path);

        let file = File::create(&tmp_path).map_err(io_err(&tmp_path))?;
        let mut writer = csv::Writer::from_writer(file);

        let header = dataset
            .columns
            .iter()
            .map(String::as_str)
            .chain(RESULT_COLUMNS);
        writer.write_record(header).map_err(csv_err(&tmp_path))?;

        for row in &dataset.rows {
            let results = result_cells(row.outcome.as_ref());
            let record = row
                .fields
                .iter()
                .map(String::as_str)
                .chain(results.iter().map(String::as_str));
            writer.write_record(record).map_err(csv_err(&tmp_path))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| io_err(&tmp_path)(e.into_error()))?;
        file.sync_all().map_err(io_err(&tmp_path))?;
        fs::rename(&tmp_path, path).map_err(io_err(path))?;
        Ok(())
    }
}

/// `<file>.tmp` beside the target
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Raw CSV contents: header plus records
struct Table {
    headers: Vec<String>,
    records: Vec<csv::StringRecord>,
}

impl Table {
    fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Header positions that are not result columns
    fn original_column_positions(&self) -> Vec<usize> {
        (0..self.headers.len())
            .filter(|&i| !RESULT_COLUMNS.contains(&self.headers[i].as_str()))
            .collect()
    }
}

fn read_table(path: &Path) -> Result<Table, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        // short rows read as blank trailing cells
        .flexible(true)
        .from_path(path)
        .map_err(csv_err(path))?;
    let headers = reader
        .headers()
        .map_err(csv_err(path))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            // Spreadsheet exports often start with a BOM
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.to_string()
        })
        .collect();
    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err(path))?;
    Ok(Table { headers, records })
}

fn cell(record: &csv::StringRecord, i: usize) -> &str {
    record.get(i).unwrap_or("")
}

/// Accepts `True`/`False` (data-frame style), `true`/`false` and `1`/`0`.
fn parse_flag(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

fn format_flag(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

/// Rebuild a result from its four cells; `None` if the class is unreadable
/// or a substantive row has no usable score.
fn parse_outcome(
    class: &str,
    score: &str,
    keywords: &str,
    analysis: &str,
) -> Option<ClassificationResult> {
    let class = SentimentClass::from_name(class)?;
    let score = match (score.trim().parse::<f64>(), class) {
        (Ok(s), _) if s.is_finite() => s,
        (_, SentimentClass::Error) => ERROR_SCORE,
        (_, SentimentClass::Skip) => 0.0,
        _ => return None,
    };
    let keywords = keywords
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect();
    Some(ClassificationResult::new(class, score, keywords, analysis))
}

fn result_cells(outcome: Option<&ClassificationResult>) -> [String; 5] {
    match outcome {
        Some(r) => [
            r.sentiment_class.as_str().to_string(),
            r.sentiment_score.to_string(),
            r.keywords.join(KEYWORD_SEPARATOR),
            r.analysis.clone(),
            format_flag(true).to_string(),
        ],
        None => [
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            format_flag(false).to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RAW: &str = "\
content,author,rhythmic
\"明月几时有，把酒问青天。\",苏轼,水调歌头
,佚名,浣溪沙
\"大江东去，浪淘尽，千古风流人物。\",苏轼,念奴娇
";

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn positive() -> ClassificationResult {
        ClassificationResult::new(
            SentimentClass::Positive,
            0.8,
            vec!["明月".into(), "青天".into()],
            "旷达",
        )
    }

    #[test]
    fn raw_load_starts_unprocessed() {
        let dir = TempDir::new().unwrap();
        let raw = write(&dir, "raw.csv", RAW);
        let ds = DatasetStore::default()
            .load(&raw, &dir.path().join("absent.csv"))
            .unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.columns(), ["content", "author", "rhythmic"]);
        assert_eq!(ds.processed_count(), 0);
        assert_eq!(ds.pending_indices(), vec![0, 1, 2]);
        assert_eq!(ds.content(0), "明月几时有，把酒问青天。");
        assert_eq!(ds.content(1), "");
    }

    #[test]
    fn missing_content_column() {
        let dir = TempDir::new().unwrap();
        let raw = write(&dir, "raw.csv", "title,author\na,b\n");
        let err = DatasetStore::default().load_raw(&raw).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { ref column, .. } if column == "content"));
    }

    #[test]
    fn custom_content_column_and_bom() {
        let dir = TempDir::new().unwrap();
        let raw = write(&dir, "raw.csv", "\u{feff}text,author\n晴,佚名\n");
        let ds = DatasetStore::new("text").load_raw(&raw).unwrap();
        assert_eq!(ds.content(0), "晴");
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let raw = write(&dir, "raw.csv", RAW);
        let ckpt = dir.path().join("out").join("ckpt.csv");
        let store = DatasetStore::default();

        let mut ds = store.load_raw(&raw).unwrap();
        ds.commit(0, positive());
        ds.commit(1, ClassificationResult::skip());
        store.save(&ds, &ckpt).unwrap();
        assert!(!tmp_path_for(&ckpt).exists());

        let reloaded = store.load(&raw, &ckpt).unwrap();
        assert_eq!(reloaded, ds);
        assert_eq!(reloaded.pending_indices(), vec![2]);

        // load -> save with no mutation reproduces the same logical content
        let ckpt2 = dir.path().join("ckpt2.csv");
        store.save(&reloaded, &ckpt2).unwrap();
        assert_eq!(store.load_checkpoint(&ckpt2).unwrap(), ds);
        assert_eq!(fs::read(&ckpt).unwrap(), fs::read(&ckpt2).unwrap());
    }

    #[test]
    fn comma_keywords_roundtrip() {
        let dir = TempDir::new().unwrap();
        let raw = write(&dir, "raw.csv", RAW);
        let ckpt = dir.path().join("ckpt.csv");
        let store = DatasetStore::default();

        let mut ds = store.load_raw(&raw).unwrap();
        let kw = ["春,风", "愁", "泪"].map(String::from).to_vec();
        ds.commit(0, ClassificationResult::new(SentimentClass::Negative, 0.6, kw, "伤春"));
        store.save(&ds, &ckpt).unwrap();

        let back = store.load_checkpoint(&ckpt).unwrap();
        assert_eq!(back, ds);
        assert_eq!(back.rows()[0].outcome.as_ref().unwrap().keywords.len(), 3);
        let ckpt2 = dir.path().join("ckpt2.csv");
        store.save(&back, &ckpt2).unwrap();
        assert_eq!(fs::read(&ckpt).unwrap(), fs::read(&ckpt2).unwrap());
    }

    #[test]
    fn short_rows_read_as_blank_cells() {
        let dir = TempDir::new().unwrap();
        let raw = write(&dir, "raw.csv", "author,rhythmic,content
苏轼,水调歌头,明月
佚名,浣溪沙
");
        let ds = DatasetStore::default().load_raw(&raw).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.content(0), "明月");
        assert_eq!(ds.content(1), "");
    }

    #[test]
    fn header_names_kept_verbatim() {
        let dir = TempDir::new().unwrap();
        let raw = write(&dir, "raw.csv", "content, author
晴,佚名
");
        let ckpt = dir.path().join("ckpt.csv");
        let store = DatasetStore::default();
        let ds = store.load_raw(&raw).unwrap();
        assert_eq!(ds.columns(), ["content", " author"]);
        store.save(&ds, &ckpt).unwrap();
        let back = store.load_checkpoint(&ckpt).unwrap();
        assert_eq!(back.columns(), ["content", " author"]);
    }

    #[test]
    fn chinese_labels_in_checkpoint_stay_processed() {
        let dir = TempDir::new().unwrap();
        let ckpt = write(
            &dir,
            "ckpt.csv",
            "content,sentiment_class,sentiment_score,keywords,analysis,processed
             晴,积极,0.9,晴,明快,True
             雨,消极,0.7,雨,凄清,True
",
        );
        let ds = DatasetStore::default().load_checkpoint(&ckpt).unwrap();
        assert_eq!(ds.processed_count(), 2);
        let class = |i: usize| ds.rows()[i].outcome.as_ref().unwrap().sentiment_class;
        assert_eq!(class(0), SentimentClass::Positive);
        assert_eq!(class(1), SentimentClass::Negative);
    }

    #[test]
    fn persisted_layout() {
        let dir = TempDir::new().unwrap();
        let raw = write(&dir, "raw.csv", RAW);
        let ckpt = dir.path().join("ckpt.csv");
        let store = DatasetStore::default();
        let mut ds = store.load_raw(&raw).unwrap();
        ds.commit(0, positive());
        ds.commit(2, ClassificationResult::retries_exhausted());
        store.save(&ds, &ckpt).unwrap();

        let text = fs::read_to_string(&ckpt).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "content,author,rhythmic,sentiment_class,sentiment_score,keywords,analysis,processed"
        );
        assert!(lines[1].ends_with(",positive,0.8,\"明月, 青天\",旷达,True"));
        assert_eq!(lines[2], ",佚名,浣溪沙,,,,,False");
        assert!(lines[3].ends_with(",error,-1,,retry budget exhausted,True"));
    }

    #[test]
    fn checkpoint_takes_priority_over_raw() {
        let dir = TempDir::new().unwrap();
        let raw = write(&dir, "raw.csv", RAW);
        let ckpt = write(
            &dir,
            "ckpt.csv",
            "content,author,rhythmic,sentiment_class,sentiment_score,keywords,analysis,processed\n\
             晴,佚名,如梦令,neutral,0.3,晴,平淡,true\n",
        );
        let ds = DatasetStore::default().load(&raw, &ckpt).unwrap();
        assert_eq!(ds.len(), 1);
        let outcome = ds.rows()[0].outcome.as_ref().unwrap();
        assert_eq!(outcome.sentiment_class, SentimentClass::Neutral);
        assert_eq!(outcome.keywords, vec!["晴"]);
    }

    #[test]
    fn unreadable_processed_rows_are_demoted() {
        let dir = TempDir::new().unwrap();
        let ckpt = write(
            &dir,
            "ckpt.csv",
            "content,sentiment_class,sentiment_score,keywords,analysis,processed\n\
             a,positive,0.5,,x,True\n\
             b,bogus,0.5,,x,True\n\
             c,negative,,,x,True\n\
             d,skip,,,,True\n\
             e,error,,,,1\n\
             f,positive,0.5,,x,False\n",
        );
        let ds = DatasetStore::default().load_checkpoint(&ckpt).unwrap();
        assert_eq!(ds.pending_indices(), vec![1, 2, 5]);
        assert_eq!(ds.rows()[3].outcome, Some(ClassificationResult::new(SentimentClass::Skip, 0.0, vec![], "")));
        assert_eq!(ds.rows()[4].outcome.as_ref().unwrap().sentiment_score, -1.0);
    }

    #[test]
    fn checkpoint_without_flag_column_is_all_pending() {
        let dir = TempDir::new().unwrap();
        let ckpt = write(&dir, "ckpt.csv", "content,author\n晴,佚名\n雨,佚名\n");
        let ds = DatasetStore::default().load_checkpoint(&ckpt).unwrap();
        assert_eq!(ds.processed_count(), 0);
    }

    #[test]
    fn raw_with_result_columns_drops_them() {
        let dir = TempDir::new().unwrap();
        let raw = write(
            &dir,
            "raw.csv",
            "content,sentiment_class,processed\n晴,positive,True\n",
        );
        let ds = DatasetStore::default().load_raw(&raw).unwrap();
        assert_eq!(ds.columns(), ["content"]);
        assert_eq!(ds.processed_count(), 0);
    }

    #[test]
    fn flags() {
        assert!(parse_flag("True"));
        assert!(parse_flag(" true "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("False"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("yes"));
    }
}
