use knotwork::{
    FormatConfig, FormatError, FormatParams, FormatReport, Formatter, KnotRequest,
    apply_knot_requests, find_roots, format_all,
};
use knotwork_graph::{DocumentIndex, Graph, GraphDocument, GraphError, NodeId, Rect};
use serde::Serialize;
use std::io::Read;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Json(serde_json::Error),
    Graph(GraphError),
    Format(FormatError),
    NoRoot,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Graph(err) => write!(f, "{err}"),
            CliError::Format(err) => write!(f, "{err}"),
            CliError::NoRoot => write!(f, "No root node found in the document"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<GraphError> for CliError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

impl From<FormatError> for CliError {
    fn from(value: FormatError) -> Self {
        Self::Format(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Format,
    FormatAll,
    Check,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    root: Option<String>,
    keep_still: Option<String>,
    select: Vec<String>,
    ignore: Vec<String>,
    config: Option<String>,
    no_knots: bool,
    pretty: bool,
    verbose: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentOut {
    comment: String,
    bounds: Rect,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportOut {
    root: String,
    formatted: Vec<String>,
    comment_bounds: Vec<CommentOut>,
    ignored_comments: Vec<String>,
    knot_requests: usize,
    knots_created: usize,
    fast_path: bool,
}

#[derive(Serialize)]
struct FormatOut<'a> {
    document: &'a GraphDocument,
    report: ReportOut,
}

#[derive(Serialize)]
struct FormatAllOut<'a> {
    document: &'a GraphDocument,
    roots: Vec<String>,
    skipped: Vec<String>,
}

#[derive(Serialize)]
struct CheckOut {
    nodes: usize,
    links: usize,
    comments: usize,
    roots: Vec<String>,
}

fn usage() -> &'static str {
    "knotwork-cli\n\
\n\
USAGE:\n\
  knotwork-cli [format] [--root <id>] [--keep-still <id>] [--select <id,...>] [--ignore <id,...>] [--config <path>] [--no-knots] [--pretty] [--verbose] [<path>|-]\n\
  knotwork-cli format-all [--config <path>] [--no-knots] [--pretty] [--verbose] [<path>|-]\n\
  knotwork-cli check [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', the graph document is read from stdin.\n\
  - format picks the first event or entry node when --root is omitted.\n\
  - --config reads a JSON object; missing fields keep their defaults.\n\
  - Logs go to stderr; RUST_LOG overrides the default `warn` level.\n\
"
}

fn id_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "format" => args.command = Command::Format,
            "format-all" => args.command = Command::FormatAll,
            "check" => args.command = Command::Check,
            "--pretty" => args.pretty = true,
            "--verbose" | "-v" => args.verbose = true,
            "--no-knots" => args.no_knots = true,
            "--root" => {
                let Some(id) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.root = Some(id.clone());
            }
            "--keep-still" => {
                let Some(id) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.keep_still = Some(id.clone());
            }
            "--select" => {
                let Some(ids) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.select.extend(id_list(ids));
            }
            "--ignore" => {
                let Some(ids) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.ignore.extend(id_list(ids));
            }
            "--config" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.config = Some(path.clone());
            }
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            "-" => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some("-".to_string());
            }
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    println!();
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A subscriber may already be installed when embedded; keep the existing one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(args: &Args) -> Result<FormatConfig, CliError> {
    let mut config = match args.config.as_deref() {
        Some(path) => FormatConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => FormatConfig::default(),
    };
    if args.no_knots {
        config.create_knots = false;
    }
    Ok(config)
}

fn resolve_ids(index: &DocumentIndex, names: &[String]) -> Result<Vec<NodeId>, CliError> {
    names
        .iter()
        .map(|n| index.require(n).map_err(CliError::from))
        .collect()
}

fn names(index: &DocumentIndex, ids: &[NodeId]) -> Vec<String> {
    ids.iter().map(|id| index.name(*id)).collect()
}

fn apply_knots(
    graph: &mut Graph,
    requests: &[KnotRequest],
    config: &FormatConfig,
) -> Result<usize, CliError> {
    Ok(apply_knot_requests(graph, requests, config.knot_size)?.len())
}

fn report_out(index: &DocumentIndex, report: &FormatReport, knots_created: usize) -> ReportOut {
    ReportOut {
        root: index.name(report.root),
        formatted: names(index, &report.formatted),
        comment_bounds: report
            .comment_bounds
            .iter()
            .map(|c| CommentOut {
                comment: index.name(c.comment),
                bounds: c.bounds,
            })
            .collect(),
        ignored_comments: names(index, &report.ignored_comments),
        knot_requests: report.knot_requests.len(),
        knots_created,
        fast_path: report.fast_path,
    }
}

fn run(args: Args) -> Result<(), CliError> {
    init_tracing(args.verbose);
    let text = read_input(args.input.as_deref())?;
    let document = GraphDocument::from_json(&text)?;
    let (mut graph, index) = document.build()?;
    tracing::debug!(
        nodes = graph.node_count(),
        links = graph.link_count(),
        "loaded graph document"
    );

    match args.command {
        Command::Check => {
            graph.validate()?;
            let out = CheckOut {
                nodes: graph.node_count(),
                links: graph.link_count(),
                comments: graph.comments().count(),
                roots: names(&index, &find_roots(&graph, &FormatConfig::default())),
            };
            write_json(&out, args.pretty)
        }
        Command::Format => {
            let config = load_config(&args)?;
            let root = match args.root.as_deref() {
                Some(name) => index.require(name)?,
                None => find_roots(&graph, &config)
                    .first()
                    .copied()
                    .ok_or(CliError::NoRoot)?,
            };
            let params = FormatParams {
                nodes_to_format: resolve_ids(&index, &args.select)?,
                ignored_nodes: resolve_ids(&index, &args.ignore)?,
                node_to_keep_still: args
                    .keep_still
                    .as_deref()
                    .map(|n| index.require(n))
                    .transpose()?,
                cancel: None,
            };
            let report = Formatter::new(config.clone()).format(&mut graph, root, &params)?;
            let created = apply_knots(&mut graph, &report.knot_requests, &config)?;
            let document = GraphDocument::from_graph(&graph, &index);
            let out = FormatOut {
                document: &document,
                report: report_out(&index, &report, created),
            };
            write_json(&out, args.pretty)
        }
        Command::FormatAll => {
            let config = load_config(&args)?;
            let report = format_all(&mut graph, &config)?;
            for cluster in &report.clusters {
                apply_knots(&mut graph, &cluster.knot_requests, &config)?;
            }
            let document = GraphDocument::from_graph(&graph, &index);
            let out = FormatAllOut {
                document: &document,
                roots: names(&index, &report.roots),
                skipped: names(&index, &report.skipped),
            };
            write_json(&out, args.pretty)
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    match run(args) {
        Ok(()) => {}
        Err(err @ (CliError::NoRoot | CliError::Format(FormatError::InvalidRoot { .. }))) => {
            eprintln!("{err}");
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
