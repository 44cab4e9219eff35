use std::path::Path;
use std::sync::Arc;

use log::info;

use freqct_client::{ControllerHandle, HttpBackend, spawn_controller};
use freqct_core::{
    Alignment, ColorMapping, Command, CtFormModel, CtableError, CtableState, Dimension,
    ExportPayload, FlatExport, FlatSortColumn, FreqctConfig, MatrixExport, MinFreqType,
    Position, Quantity, SortCriterion, StaticSelection, ViewMode, load_config_from_path,
};

pub struct FetchCommandConfig<'a> {
    pub attr1: String,
    pub attr2: String,
    pub pos1: i8,
    pub align1: &'a str,
    pub pos2: i8,
    pub align2: &'a str,
    pub min_freq: String,
    pub min_freq_type: &'a str,
    pub alpha: Option<&'a str>,
    pub view: &'a str,
    pub sort_rows: Option<&'a str>,
    pub sort_cols: Option<&'a str>,
    pub flat_sort: &'a [String],
    pub hide_empty: bool,
    pub transpose: bool,
    pub quantity: &'a str,
    pub color_mapping: &'a str,
    pub export_path: Option<&'a str>,
    pub config_path: Option<&'a str>,
    pub server: Option<&'a str>,
    pub json: bool,
}

fn position_index(offset: i8, align: &str) -> Result<usize, CtableError> {
    let align: Alignment = align.parse()?;
    let position: Position = Position { offset, align }.to_string().parse()?;
    Ok(position.index())
}

fn load_config(cfg: &FetchCommandConfig) -> Result<FreqctConfig, CtableError> {
    let mut config = match cfg.config_path {
        Some(path) => load_config_from_path(Path::new(path))?,
        None => FreqctConfig::default(),
    };
    if let Some(server) = cfg.server {
        config.server_url = server.to_string();
    }
    Ok(config)
}

/// View commands requested on the command line, in the order they apply.
fn view_commands(cfg: &FetchCommandConfig) -> Result<Vec<Command>, CtableError> {
    let mut commands = vec![
        Command::SetViewMode(cfg.view.parse::<ViewMode>()?),
        Command::SetEmptyVectorVisibility(cfg.hide_empty),
        Command::SetDisplayQuantity(cfg.quantity.parse::<Quantity>()?),
        Command::SetColorMapping(cfg.color_mapping.parse::<ColorMapping>()?),
    ];
    if cfg.transpose {
        commands.push(Command::Transpose);
    }
    if let Some(criterion) = cfg.sort_rows {
        commands.push(Command::SortByDimension(
            Dimension::Rows,
            criterion.parse::<SortCriterion>()?,
        ));
    }
    if let Some(criterion) = cfg.sort_cols {
        commands.push(Command::SortByDimension(
            Dimension::Columns,
            criterion.parse::<SortCriterion>()?,
        ));
    }
    for column in cfg.flat_sort {
        commands.push(Command::SortFlat(column.parse::<FlatSortColumn>()?));
    }
    Ok(commands)
}

async fn apply(
    handle: &ControllerHandle<HttpBackend>,
    cmd: Command,
) -> Result<CtableState, CtableError> {
    let state = handle.dispatch(cmd).await?;
    match &state.error {
        Some(message) => Err(CtableError::Rejected(message.clone())),
        None => Ok(state),
    }
}

pub fn run(cfg: FetchCommandConfig) -> Result<(), CtableError> {
    let config = load_config(&cfg)?;

    let mut form = CtFormModel::with_config(cfg.attr1.clone(), cfg.attr2.clone(), &config);
    form.pos1 = position_index(cfg.pos1, cfg.align1)?;
    form.align1 = cfg.align1.parse()?;
    form.pos2 = position_index(cfg.pos2, cfg.align2)?;
    form.align2 = cfg.align2.parse()?;
    form.min_freq_input = cfg.min_freq.clone();
    form.min_freq_type = cfg.min_freq_type.parse::<MinFreqType>()?;
    if let Some(alpha) = cfg.alpha {
        form.alpha_level = super::parse_alpha(alpha)?;
    }
    let params = form.to_params(&config)?;
    let commands = view_commands(&cfg)?;

    let detector = StaticSelection::from_conc_args(&config.conc_args);
    let initial = CtableState::with_detector(params.clone(), &detector);
    let debounce = config.debounce();
    let backend = Arc::new(HttpBackend::new(config)?);
    info!(
        "fetching {} x {} from {}",
        params.attr1,
        params.attr2,
        backend.config().server_url
    );

    super::runtime()?.block_on(async move {
        let handle = spawn_controller(backend, initial, debounce);
        let result = async {
            handle.dispatch(Command::Submit(params)).await?;
            let mut state = handle.wait_idle().await?;
            if let Some(message) = &state.error {
                return Err(CtableError::Network(message.clone()));
            }
            for cmd in commands {
                state = apply(&handle, cmd).await?;
            }

            if let Some(warning) = &state.adhoc_warning {
                eprintln!("warning: {warning}");
            }
            let payload = state.export_payload();
            if cfg.json {
                let json = serde_json::to_string_pretty(&payload)
                    .map_err(|e| CtableError::Parse(e.to_string()))?;
                println!("{json}");
            } else {
                print!("{}", render(&payload, state.params().full_size));
            }

            if let Some(path) = cfg.export_path {
                let bytes = handle.export("csv").await?;
                std::fs::write(path, &bytes)?;
                println!("Exported {} bytes to {path}", bytes.len());
            }
            Ok(())
        }
        .await;
        handle.shutdown().await;
        result
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(payload: &ExportPayload, full_size: u64) -> String {
    match payload {
        ExportPayload::Matrix(matrix) => render_matrix(matrix, full_size),
        ExportPayload::Flat(flat) => render_flat(flat, full_size),
    }
}

fn fmt_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn render_matrix(matrix: &MatrixExport, full_size: u64) -> String {
    let corner = format!("{} \\ {}", matrix.attr1, matrix.attr2);
    let first = matrix
        .labels1
        .iter()
        .map(|l| l.chars().count())
        .chain(std::iter::once(corner.chars().count()))
        .max()
        .unwrap_or(0);
    let widths: Vec<usize> = matrix
        .labels2
        .iter()
        .enumerate()
        .map(|(j, label)| {
            matrix
                .data
                .iter()
                .filter_map(|row| row[j].as_ref())
                .map(|c| fmt_value(c.1).len())
                .chain(std::iter::once(label.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = format!(
        "{} x {}, min freq {} ({}), alpha {}, {} of {} cells shown\n\n",
        matrix.attr1,
        matrix.attr2,
        fmt_value(matrix.min_freq),
        matrix.min_freq_type,
        matrix.alpha_level,
        matrix.data.iter().flatten().flatten().count(),
        full_size
    );
    out.push_str(&format!("{corner:<first$}"));
    for (label, &width) in matrix.labels2.iter().zip(&widths) {
        out.push_str(&format!("  {label:>width$}"));
    }
    out.push('\n');
    for (label, row) in matrix.labels1.iter().zip(&matrix.data) {
        out.push_str(&format!("{label:<first$}"));
        for (cell, &width) in row.iter().zip(&widths) {
            let text = cell.as_ref().map(|c| fmt_value(c.1)).unwrap_or_default();
            out.push_str(&format!("  {text:>width$}"));
        }
        out.push('\n');
    }
    out
}

fn render_flat(flat: &FlatExport, full_size: u64) -> String {
    let mut out = format!(
        "min freq {} ({}), alpha {}, {} of {} cells shown\n\n",
        fmt_value(flat.min_freq),
        flat.min_freq_type,
        flat.alpha_level,
        flat.data.len(),
        full_size
    );
    let w1 = flat
        .data
        .iter()
        .map(|r| r.0.chars().count())
        .chain(flat.headings.first().map(|h| h.chars().count()))
        .max()
        .unwrap_or(0);
    let w2 = flat
        .data
        .iter()
        .map(|r| r.1.chars().count())
        .chain(flat.headings.get(1).map(|h| h.chars().count()))
        .max()
        .unwrap_or(0);

    let heading = |i: usize| flat.headings.get(i).map(String::as_str).unwrap_or("");
    out.push_str(&format!("{:<w1$}  {:<w2$}", heading(0), heading(1)));
    for i in 2..8 {
        out.push_str(&format!("  {:>10}", heading(i)));
    }
    out.push('\n');

    let opt = |v: Option<f64>| v.map(fmt_value).unwrap_or_else(|| "-".to_string());
    for row in &flat.data {
        out.push_str(&format!(
            "{:<w1$}  {:<w2$}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}\n",
            row.0,
            row.1,
            format!("{:.2}", row.2),
            row.3,
            format!("{:.2}", row.4),
            opt(row.5),
            opt(row.6),
            opt(row.7),
        ));
    }
    out
}
