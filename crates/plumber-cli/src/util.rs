use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use plumber_env::Scenario;

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = Output::from_output_path(output_path)?;
        output.write_json(value)
    }

    pub fn from_output_path(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    pub fn write_json<T>(&mut self, value: T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut *self, &value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        writeln!(&mut *self).with_context(|| {
            format!(
                "Failed to write newline after JSON to {}",
                self.display_path()
            )
        })?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

/// Creates `dir` if needed and returns the path of `file_name` inside it.
pub fn data_file(dir: &Path, file_name: &str) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
    Ok(dir.join(file_name))
}

/// World and stage selectors shared by every command.
#[derive(Default, Debug, Clone, Copy, clap::Args)]
pub(crate) struct ScenarioArg {
    /// World to play (1-8); all stages when omitted together with --stage
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=8))]
    world: Option<u8>,
    /// Stage to play (1-4)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    stage: Option<u8>,
}

impl ScenarioArg {
    pub(crate) fn scenario(self) -> anyhow::Result<Scenario> {
        Scenario::from_selectors(self.world, self.stage)
            .context("Invalid world/stage selection")
    }
}

/// Append-only comma-separated log.
#[derive(Debug)]
pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    /// Creates (or truncates) the file and writes the header row.
    pub fn create(path: PathBuf, header: &[&str]) -> anyhow::Result<Self> {
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        writeln!(file, "{}", header.join(","))
            .with_context(|| format!("Failed to write CSV header to {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one line per row.
    pub fn append<I, R>(&self, rows: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = R>,
        R: CsvRow,
    {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open CSV file: {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            writeln!(writer, "{}", row.fields().join(","))
                .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(())
    }
}

/// A value written as one CSV line.
pub trait CsvRow {
    fn fields(&self) -> Vec<String>;
}

impl<T> CsvRow for &T
where
    T: CsvRow + ?Sized,
{
    fn fields(&self) -> Vec<String> {
        (**self).fields()
    }
}

/// Replaces `path` with the generation number on the first line and `body` after it.
pub fn overwrite_artifact(path: &Path, generation: usize, body: &str) -> anyhow::Result<()> {
    fs::write(path, format!("{generation}\n{body}"))
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::process;

    use super::*;

    struct Pair(u32, f64);

    impl CsvRow for Pair {
        fn fields(&self) -> Vec<String> {
            vec![self.0.to_string(), self.1.to_string()]
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("plumber-{name}-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_csv_header_then_appended_rows() {
        let dir = scratch_dir("csv");
        let log = CsvLog::create(dir.join("log.csv"), &["A", "B"]).unwrap();
        log.append([Pair(1, 0.5)]).unwrap();
        log.append(&[Pair(2, 1.5), Pair(3, -2.0)]).unwrap();
        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text, "A,B\n1,0.5\n2,1.5\n3,-2\n");
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_artifact_is_overwritten() {
        let dir = scratch_dir("artifact");
        let path = dir.join("best.txt");
        overwrite_artifact(&path, 3, "1, 2, 3").unwrap();
        overwrite_artifact(&path, 7, "0, 0").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "7\n0, 0");
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_append_to_missing_file_fails() {
        let dir = scratch_dir("missing");
        let log = CsvLog {
            path: dir.join("nope").join("log.csv"),
        };
        assert!(log.append([Pair(1, 1.0)]).is_err());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_scenario_selection() {
        let all = ScenarioArg::default().scenario().unwrap();
        assert_eq!(all, Scenario::AllStages);
        let one = ScenarioArg {
            world: Some(2),
            stage: Some(3),
        };
        assert_eq!(one.scenario().unwrap(), Scenario::stage(2, 3).unwrap());
    }
}
