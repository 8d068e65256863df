//! Human-readable, CSV and JSON renderings of a tuning run.

use crate::error::TuneError;
use crate::result::{best_result, TuningResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Prefixes for console report lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleTags {
    pub full: String,
    pub head: String,
    pub result: String,
    pub best: String,
    pub warning: String,
    pub failure: String,
}

impl ConsoleTags {
    /// ANSI-coloured tags.
    pub fn colored() -> Self {
        Self {
            full: green("[==========]"),
            head: green("[----------]"),
            result: green("[ RESULT   ]"),
            best: paint("35", "[     BEST ]"),
            warning: paint("33", "[  WARNING ]"),
            failure: paint("31", "[   FAILED ]"),
        }
    }

    /// The same tags without escape codes, for files and pipes.
    pub fn plain() -> Self {
        Self {
            full: "[==========]".into(),
            head: "[----------]".into(),
            result: "[ RESULT   ]".into(),
            best: "[     BEST ]".into(),
            warning: "[  WARNING ]".into(),
            failure: "[   FAILED ]".into(),
        }
    }
}

impl Default for ConsoleTags {
    fn default() -> Self {
        Self::colored()
    }
}

fn paint(code: &str, tag: &str) -> String {
    format!("\x1b[{code}m{tag}\x1b[0m")
}

fn green(tag: &str) -> String {
    paint("32", tag)
}

/// Results of one tuning run together with the device they were measured on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningReport {
    pub device: String,
    /// Free-form key/value notes, e.g. problem sizes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub descriptions: BTreeMap<String, String>,
    pub results: Vec<TuningResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<TuningResult>,
}

impl TuningReport {
    pub fn new(device: impl Into<String>, results: &[TuningResult]) -> Self {
        Self {
            device: device.into(),
            descriptions: BTreeMap::new(),
            results: results.to_vec(),
            best: best_result(results).cloned(),
        }
    }

    pub fn with_description(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptions.insert(key.into(), value.into());
        self
    }

    /// Lists every result, then the best one. Returns the best time, or
    /// `None` when no result was correct.
    pub fn print<W: Write>(&self, tags: &ConsoleTags, out: &mut W) -> io::Result<Option<f64>> {
        writeln!(out, "{} Printing results on {}", tags.full, self.device)?;
        for result in &self.results {
            let tag = if result.valid_time().is_some() {
                &tags.result
            } else if result.is_failed() {
                &tags.failure
            } else {
                &tags.warning
            };
            writeln!(out, "{tag} {}", describe(result))?;
        }

        writeln!(out, "{}", tags.head)?;
        match &self.best {
            Some(best) => {
                writeln!(out, "{} {}", tags.best, describe(best))?;
                Ok(best.valid_time())
            }
            None => {
                writeln!(out, "{} no correct result found", tags.warning)?;
                Ok(None)
            }
        }
    }

    /// Semicolon-separated listing of the correct results. Rows are grouped
    /// by kernel in order of first appearance, each group behind a header
    /// naming its parameters.
    pub fn write_csv<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut groups: Vec<(&str, Vec<(&TuningResult, f64)>)> = Vec::new();
        for result in &self.results {
            let Some(time) = result.valid_time() else {
                continue;
            };
            let name = result.kernel_name.as_str();
            match groups.iter_mut().find(|(kernel, _)| *kernel == name) {
                Some((_, rows)) => rows.push((result, time)),
                None => groups.push((name, vec![(result, time)])),
            }
        }

        for (_, rows) in &groups {
            write!(out, "name;time;threads;")?;
            for setting in &rows[0].0.configuration {
                write!(out, "{};", setting.name)?;
            }
            writeln!(out)?;
            for (result, time) in rows {
                write!(out, "{};{time:.2};{};", result.kernel_name, result.local_threads)?;
                for setting in &result.configuration {
                    write!(out, "{};", setting.value)?;
                }
                writeln!(out)?;
            }
        }
        Ok(())
    }

    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<(), TuneError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_csv(&mut out)?;
        out.flush()?;
        Ok(())
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), TuneError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TuneError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Best configuration as `{ "device", { {"NAME",VALUE}, ... } }`.
    pub fn database_entry(&self) -> Option<String> {
        self.best.as_ref().map(|best| {
            format!(
                "{{ \"{}\", {} }}",
                self.device,
                best.configuration.database_entry()
            )
        })
    }
}

fn describe(result: &TuningResult) -> String {
    let mut line = match result.time_ms {
        Some(time) => format!("{}; {time:>9.3} ms; {:>5} threads;", result.kernel_name, result.local_threads),
        None => format!("{}; {:>9} ms; {:>5} threads;", result.kernel_name, "-", "-"),
    };
    for setting in &result.configuration {
        line.push_str(&format!(" {setting};"));
    }
    line
}
