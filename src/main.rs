//! tabless - a pager engine for tabular text.
//!
//! # Usage
//!
//! ```bash
//! psql -c 'select * from users' | tabless --sort name --desc
//! tabless --info report.txt
//! tabless --watch --search alice export.csv
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufWriter, IsTerminal, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use tabless::config::{
    CaseMode, ConfigFlags, FooterPolicy, InputFormat, clear_config_flags, global_config_path,
    load_config_flags, local_override_path, save_config_flags,
};
use tabless::detect::{DetectOptions, TableDescriptor};
use tabless::order::{SortDirection, SortRequest};
use tabless::perf;
use tabless::rows::RowSet;
use tabless::search::{SearchDirection, SearchQuery, SearchScope};
use tabless::session::{Session, SessionOptions};
use tabless::watcher::{InputChange, InputWatcher};

const WATCH_DEBOUNCE: Duration = Duration::from_millis(200);
const WATCH_POLL: Duration = Duration::from_millis(250);

/// A pager engine for tabular text: psql output, CSV, TSV and friends
#[derive(Parser, Debug)]
#[command(name = "tabless", version, about, long_about = None)]
struct Cli {
    /// Input file (standard input when omitted)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// How to interpret the input
    #[arg(long, value_enum)]
    format: Option<InputFormat>,

    /// Do not infer the format from the file suffix
    #[arg(long)]
    ignore_file_suffix: bool,

    /// Footer choice for tables with only an outer frame
    #[arg(long, value_enum)]
    footer_policy: Option<FooterPolicy>,

    /// Sort data rows by a column (name or 1-based number)
    #[arg(long, value_name = "COLUMN")]
    sort: Option<String>,

    /// Sort in descending order
    #[arg(long, requires = "sort")]
    desc: bool,

    /// Compare the sort column as numbers
    #[arg(long, requires = "sort", conflicts_with = "text")]
    numeric: bool,

    /// Compare the sort column as text
    #[arg(long, requires = "sort")]
    text: bool,

    /// Print the header and every data row matching PATTERN
    #[arg(long, value_name = "PATTERN")]
    search: Option<String>,

    /// Restrict --search to one column (name or 1-based number)
    #[arg(long, value_name = "COLUMN", requires = "search")]
    search_column: Option<String>,

    /// Case handling for --search
    #[arg(long = "case", value_enum)]
    case_mode: Option<CaseMode>,

    /// Print the detected table structure as JSON
    #[arg(long)]
    info: bool,

    /// Watch the file and print the table again when it changes
    #[arg(short, long)]
    watch: bool,

    /// Enable timing output on stderr
    #[arg(long)]
    perf: bool,

    /// Write engine debug events to a file
    #[arg(long, value_name = "PATH")]
    debug_log: Option<PathBuf>,

    /// Save the current flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

impl Cli {
    /// The flags that can be saved as defaults.
    fn config_flags(&self) -> ConfigFlags {
        ConfigFlags {
            watch: self.watch,
            perf: self.perf,
            ignore_file_suffix: self.ignore_file_suffix,
            format: self.format,
            footer_policy: self.footer_policy,
            case_mode: self.case_mode,
            debug_log: self.debug_log.clone(),
        }
    }

    fn sort_numeric(&self) -> Option<bool> {
        if self.numeric {
            Some(true)
        } else if self.text {
            Some(false)
        } else {
            None
        }
    }
}

#[derive(Serialize)]
struct Info<'a> {
    rows: usize,
    sort: Option<&'a SortRequest>,
    table: &'a TableDescriptor,
}

/// How far a file has been read.
#[derive(Debug, Clone, Copy)]
struct ReadState {
    len: u64,
    /// The last line read was terminated.
    complete: bool,
}

fn load<R: BufRead>(session: &mut Session, format: InputFormat, mut reader: R) -> Result<()> {
    match format {
        InputFormat::Csv => session.load_rows(&RowSet::from_delimited(reader, b',', true)?)?,
        InputFormat::Tsv => session.load_rows(&RowSet::from_delimited(reader, b'\t', true)?)?,
        InputFormat::Matrix => {
            let mut text = String::new();
            reader
                .read_to_string(&mut text)
                .context("Failed to read matrix input")?;
            session.load_rows(&RowSet::from_matrix(&text))?;
        }
        InputFormat::Auto | InputFormat::Plain => {
            session.read_from(reader)?;
        }
    }
    Ok(())
}

fn load_file(session: &mut Session, format: InputFormat, path: &Path) -> Result<ReadState> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    session.reload();
    load(session, format, bytes.as_slice())?;
    Ok(ReadState {
        len: bytes.len() as u64,
        complete: bytes.is_empty() || bytes.ends_with(b"\n"),
    })
}

/// Load `path` once, watching it from before the read when `watch` is set.
fn open_file(
    session: &mut Session,
    format: InputFormat,
    path: &Path,
    watch: bool,
) -> Result<(ReadState, Option<InputWatcher>)> {
    // nothing written during the load is missed
    let watcher = watch
        .then(|| InputWatcher::new(path, WATCH_DEBOUNCE))
        .transpose()
        .with_context(|| format!("Failed to watch {}", path.display()))?;
    let state = load_file(session, format, path)?;
    Ok((state, watcher))
}

fn load_appended(session: &mut Session, path: &Path, state: ReadState) -> Result<ReadState> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    file.seek(SeekFrom::Start(state.len))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    session.read_from(bytes.as_slice())?;
    Ok(ReadState {
        len: state.len + bytes.len() as u64,
        complete: bytes.is_empty() || bytes.ends_with(b"\n"),
    })
}

fn resolve_column(session: &Session, spec: &str) -> Result<usize> {
    if let Some(index) = session.column_index(spec) {
        return Ok(index);
    }
    match spec.parse::<usize>() {
        Ok(n) if (1..=session.descriptor().columns).contains(&n) => Ok(n - 1),
        _ => anyhow::bail!("Unknown column: {spec}"),
    }
}

fn print_table(session: &mut Session, cli: &Cli, out: &mut impl Write) -> Result<()> {
    if cli.info {
        let info = Info {
            rows: session.row_count(),
            sort: session.sort_request(),
            table: session.descriptor(),
        };
        serde_json::to_writer_pretty(&mut *out, &info)?;
        writeln!(out)?;
        return Ok(());
    }

    let Some(pattern) = &cli.search else {
        for line in session.rows() {
            writeln!(out, "{line}")?;
        }
        return Ok(());
    };

    let mut query = SearchQuery::new(pattern.as_str());
    if let Some(spec) = &cli.search_column {
        query = query.scope(SearchScope::Column(resolve_column(session, spec)?));
    }
    let mut hits = Vec::new();
    let mut found = session.search(&query)?;
    while let Some(hit) = found {
        hits.push(hit.position);
        found = session
            .search_next(SearchDirection::Forward)?
            .filter(|next| next.position != hits[0]);
    }
    hits.sort_unstable();

    let desc = session.descriptor();
    let header = desc.title_rows..desc.first_data_row;
    for line in session.iter() {
        if header.contains(&line.lineno) || hits.binary_search(&line.position).is_ok() {
            writeln!(out, "{}", line.text)?;
        }
    }
    Ok(())
}

fn render(session: &mut Session, cli: &Cli) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    print_table(session, cli, &mut out)?;
    out.flush().context("Failed to write output")
}

/// Print the loaded table, then again after every change to `path`.
fn watch(
    session: &mut Session,
    cli: &Cli,
    format: InputFormat,
    path: &Path,
    mut watcher: InputWatcher,
    mut state: ReadState,
) -> Result<()> {
    render(session, cli)?;

    loop {
        std::thread::sleep(WATCH_POLL);
        let Some(change) = watcher.poll_change() else {
            continue;
        };
        let tail = matches!(format, InputFormat::Auto | InputFormat::Plain) && state.complete;
        state = match change {
            InputChange::Removed => continue,
            InputChange::Grown { len } if tail && len > state.len => {
                load_appended(session, path, state)?
            }
            InputChange::Grown { .. } | InputChange::Replaced => load_file(session, format, path)?,
        };
        perf::log_event("watch.reload", format!("len={}", state.len));
        render(session, cli)?;
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = cli.config_flags();

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }
    if (cli.save || cli.clear) && cli.file.is_none() && io::stdin().is_terminal() {
        return Ok(());
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let debug_log_path = effective
        .debug_log
        .clone()
        .or_else(|| std::env::var_os("TABLESS_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_event_log_path(debug_log_path.as_deref()) {
        eprintln!(
            "[warn] Failed to initialize debug log {}: {}",
            debug_log_path
                .as_ref()
                .map_or_else(|| "<unset>".to_string(), |p| p.display().to_string()),
            err
        );
    }

    let format = effective.input_format(cli.file.as_deref());
    let mut session = Session::new(SessionOptions {
        detect: DetectOptions {
            format,
            footer_policy: effective.footer_policy.unwrap_or_default(),
        },
        case_mode: effective.case_mode.unwrap_or_default(),
        ..SessionOptions::default()
    });

    let mut watched = None;
    match &cli.file {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("File not found: {}", path.display());
            }
            session.set_filename(path.display().to_string());
            let (state, watcher) = open_file(&mut session, format, path, effective.watch)?;
            watched = watcher.map(|watcher| (path.as_path(), watcher, state));
        }
        None => load(&mut session, format, io::stdin().lock())?,
    }

    if let Some(spec) = &cli.sort {
        let request = SortRequest {
            column: resolve_column(&session, spec)?,
            direction: if cli.desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            },
            numeric: cli.sort_numeric(),
        };
        session.sort(request).context("Sort failed")?;
    }

    match watched {
        Some((path, watcher, state)) => watch(&mut session, &cli, format, path, watcher, state),
        None => {
            if effective.watch {
                tracing::warn!("--watch needs a file; reading standard input once");
            }
            render(&mut session, &cli)
        }
    }
}
